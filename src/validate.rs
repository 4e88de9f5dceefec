//! Option predicates.
//!
//! Every resolver validates its fields through these helpers so that all
//! failures share the [`Error::InvalidParameter`] shape: the field name, a
//! human-readable constraint, and the value that was received.
//!
//! Keyword-valued options (chroma subsampling, layouts, compression schemes)
//! are declared with [`keyword_enum!`], which gives each enum its canonical
//! spelling and the list of accepted values used in error messages.

use crate::error::Error;

/// A closed set of string-spelled option values.
pub trait Keyword: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// `"one of: a, b, c"`, as used in error messages.
    fn expected() -> String {
        let names: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
        format!("one of: {}", names.join(", "))
    }
}

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $crate::validate::Keyword for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::validate::Keyword::as_str(*self))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str($crate::validate::Keyword::as_str(*self))
            }
        }
    };
}

pub(crate) use keyword_enum;

/// Parse a keyword option, case-sensitively.
pub fn keyword<K: Keyword>(name: &str, value: &str) -> Result<K, Error> {
    K::ALL
        .iter()
        .copied()
        .find(|k| k.as_str() == value)
        .ok_or_else(|| Error::invalid_parameter(name, K::expected(), value))
}

/// Integer in `min..=max`.
pub fn integer(name: &str, value: i64, min: i64, max: i64) -> Result<i64, Error> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(Error::invalid_parameter(
            name,
            format!("integer between {min} and {max}"),
            value,
        ))
    }
}

/// Number in `min..=max`. NaN never passes.
pub fn number(name: &str, value: f64, min: f64, max: f64) -> Result<f64, Error> {
    if value >= min && value <= max {
        Ok(value)
    } else {
        Err(Error::invalid_parameter(
            name,
            format!("number between {min:?} and {max:?}"),
            value,
        ))
    }
}

/// Integer greater than zero.
pub fn positive_integer(name: &str, value: i64) -> Result<i64, Error> {
    if value > 0 {
        Ok(value)
    } else {
        Err(Error::invalid_parameter(name, "positive integer", value))
    }
}

/// Finite number greater than zero.
pub fn positive_number(name: &str, value: f64) -> Result<f64, Error> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::invalid_parameter(name, "positive number", value))
    }
}

pub fn non_empty<'a>(name: &str, value: &'a str) -> Result<&'a str, Error> {
    if value.is_empty() {
        Err(Error::invalid_parameter(name, "non-empty string", value))
    } else {
        Ok(value)
    }
}

/// Pick between two spellings of the same option.
///
/// `first` wins when both are present, so callers order the arguments by
/// the precedence the option documents.
pub fn prefer<T>(first: Option<T>, second: Option<T>) -> Option<T> {
    first.or(second)
}

#[cfg(test)]
mod tests {
    use super::*;

    keyword_enum! {
        enum Fruit {
            Apple => "apple",
            Pear => "pear",
        }
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        assert_eq!(integer("q", 1, 1, 100).unwrap(), 1);
        assert_eq!(integer("q", 100, 1, 100).unwrap(), 100);
        assert!(integer("q", 0, 1, 100).is_err());
        assert!(integer("q", 101, 1, 100).is_err());
    }

    #[test]
    fn integer_error_describes_range() {
        let err = integer("effort", 11, 1, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected integer between 1 and 10 for effort but received 11"
        );
    }

    #[test]
    fn number_rejects_nan() {
        assert!(number("dither", f64::NAN, 0.0, 1.0).is_err());
        assert_eq!(number("dither", 0.5, 0.0, 1.0).unwrap(), 0.5);
    }

    #[test]
    fn keyword_lists_choices_in_declaration_order() {
        assert_eq!(keyword::<Fruit>("fruit", "pear").unwrap(), Fruit::Pear);
        let err = keyword::<Fruit>("fruit", "Pear").unwrap_err();
        assert!(err.to_string().contains("one of: apple, pear"));
    }

    #[test]
    fn keyword_serializes_as_its_spelling() {
        assert_eq!(serde_json::to_string(&Fruit::Apple).unwrap(), "\"apple\"");
        assert_eq!(Fruit::Pear.to_string(), "pear");
    }

    #[test]
    fn positive_checks() {
        assert!(positive_integer("w", 0).is_err());
        assert!(positive_integer("w", 1).is_ok());
        assert!(positive_number("d", 0.0).is_err());
        assert!(positive_number("d", f64::INFINITY).is_err());
        assert!(positive_number("d", 0.1).is_ok());
    }

    #[test]
    fn prefer_takes_first_defined() {
        assert_eq!(prefer(Some(1), Some(2)), Some(1));
        assert_eq!(prefer(None, Some(2)), Some(2));
        assert_eq!(prefer::<u8>(None, None), None);
        assert_eq!(non_empty("xmp", "").unwrap_err().parameter(), Some("xmp"));
    }
}
