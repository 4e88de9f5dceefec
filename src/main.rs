use clap::{Parser, Subcommand};
use imagejob::output::{Codec, FormatOptions};
use imagejob::{Engine, Pipeline, RustEngine, config, job, report};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imagejob")]
#[command(about = "Validate image transcoding jobs and run them")]
#[command(long_about = "\
Validate image transcoding jobs and run them

A job names an input, an output format with its options, and the metadata
to keep or attach. Every option is checked before anything is decoded, so a
bad value is reported with the parameter it belongs to.

Job file (JSON):

  {
    \"input\": \"photo.jpg\",
    \"options\": { \"fail_on\": \"error\" },
    \"output\": { \"format\": \"webp\", \"options\": { \"lossless\": true }, \"file\": \"out.webp\" },
    \"metadata\": { \"keep\": [\"exif\", \"icc\"] },
    \"timeout_seconds\": 30
  }

Relative paths in a job file are resolved against the job file's directory.
Set RUST_LOG=debug to trace dispatch decisions.

Run 'imagejob gen-config' to generate a documented imagejob.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file supplying job defaults
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a job file and print the output info
    Run { job: PathBuf },
    /// Print the resolved input descriptor and job options as JSON
    Plan { job: PathBuf },
    /// Convert one image, picking the format from the output extension
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Output format name or alias (overrides the extension)
        #[arg(long)]
        format: Option<String>,
        /// Encoder quality for formats that have one
        #[arg(long)]
        quality: Option<i64>,
    },
    /// Print image metadata
    Metadata { input: PathBuf },
    /// Print per-channel pixel statistics
    Stats { input: PathBuf },
    /// List format names and what the bundled engine supports
    Formats,
    /// Print a stock imagejob.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    execute(cli.command, &cli.config)
}

fn execute(command: Command, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        // Needs no config file, so it works before one exists.
        Command::GenConfig => print!("{}", config::stock_config_toml()),
        Command::Run { job } => {
            let (config, engine) = setup(config_path)?;
            let spec = job::JobSpec::load(&job)?;
            let info = spec.run(engine, &config)?;
            report::print_info(&info);
        }
        Command::Plan { job } => {
            let (config, engine) = setup(config_path)?;
            let spec = job::JobSpec::load(&job)?;
            let pipeline = spec.build(engine, &config)?;
            report::print_plan(&job::Plan {
                input: pipeline.input(),
                options: pipeline.options(),
            })?;
        }
        Command::Convert {
            input,
            output,
            format,
            quality,
        } => {
            let (config, engine) = setup(config_path)?;
            let mut pipeline =
                Pipeline::with_input_defaults(engine, input, None, config.input_defaults()?)?;
            pipeline.timeout(i64::from(config.output.timeout_seconds))?;
            let format = format.or_else(|| Codec::from_path(&output).map(|c| c.name().to_string()));
            if let Some(format) = format {
                let options = match (Codec::from_name(&format), quality) {
                    (Some(codec), Some(quality)) => {
                        FormatOptions::from_value(codec, serde_json::json!({ "quality": quality }))?
                    }
                    _ => FormatOptions::None,
                };
                pipeline.to_format(&format, options)?;
            }
            let info = pipeline.to_file(&output).wait()?;
            report::print_info(&info);
        }
        Command::Metadata { input } => {
            let (config, engine) = setup(config_path)?;
            let mut pipeline =
                Pipeline::with_input_defaults(engine, input, None, config.input_defaults()?)?;
            report::print_metadata(&pipeline.metadata().wait()?);
        }
        Command::Stats { input } => {
            let (config, engine) = setup(config_path)?;
            let mut pipeline =
                Pipeline::with_input_defaults(engine, input, None, config.input_defaults()?)?;
            report::print_stats(&pipeline.stats().wait()?);
        }
        Command::Formats => {
            let (_, engine) = setup(config_path)?;
            report::print_formats(&engine.capabilities());
        }
    }

    Ok(())
}

/// Load the config and size the worker pool before touching the engine.
fn setup(config_path: &Path) -> Result<(config::Config, Arc<RustEngine>), config::ConfigError> {
    let config = config::load_config(config_path)?;
    init_thread_pool(&config.processing);
    Ok((config, Arc::new(RustEngine::new())))
}

/// Size the global rayon pool the bundled engine runs on.
///
/// Caps at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
