// nml/src/value.rs

//! The NmlValue enum and its text representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value that can appear on the right-hand side of a namelist assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NmlValue {
    Integer(i64),
    Real(f64),
    Logical(bool),
    Character(String),
    Array(Vec<NmlValue>),
    Null,
}

impl NmlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            NmlValue::Integer(_) => "integer",
            NmlValue::Real(_) => "real",
            NmlValue::Logical(_) => "logical",
            NmlValue::Character(_) => "character",
            NmlValue::Array(_) => "array",
            NmlValue::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NmlValue::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            NmlValue::Integer(i) => Some(*i),
            NmlValue::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            NmlValue::Real(f) => Some(*f),
            NmlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            NmlValue::Logical(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_character(&self) -> Option<&str> {
        match self {
            NmlValue::Character(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[NmlValue]> {
        match self {
            NmlValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Parse a single unquoted token into a scalar value.
    ///
    /// Order matters: logicals first (they are alphabetic), then integers,
    /// then reals (with Fortran `d` exponent notation), falling back to a
    /// bare character string.
    pub fn parse_scalar(token: &str) -> NmlValue {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return NmlValue::Null;
        }

        match trimmed.to_ascii_lowercase().as_str() {
            ".true." | ".t." | "t" => return NmlValue::Logical(true),
            ".false." | ".f." | "f" => return NmlValue::Logical(false),
            _ => {}
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return NmlValue::Integer(i);
        }

        let normalized = trimmed.replace('d', "e").replace('D', "e");
        if let Ok(f) = normalized.parse::<f64>() {
            return NmlValue::Real(f);
        }

        NmlValue::Character(trimmed.to_string())
    }

    /// Format this value as namelist text.
    pub fn to_fortran_string(&self, uppercase: bool) -> String {
        match self {
            NmlValue::Integer(i) => i.to_string(),
            NmlValue::Real(f) => format_real(*f),
            NmlValue::Logical(b) => match (b, uppercase) {
                (true, false) => ".true.".to_string(),
                (false, false) => ".false.".to_string(),
                (true, true) => ".TRUE.".to_string(),
                (false, true) => ".FALSE.".to_string(),
            },
            NmlValue::Character(s) => format!("'{}'", s.replace('\'', "''")),
            NmlValue::Array(arr) => arr
                .iter()
                .map(|v| v.to_fortran_string(uppercase))
                .collect::<Vec<_>>()
                .join(", "),
            NmlValue::Null => String::new(),
        }
    }
}

// Reals always carry a decimal point so they read back as reals.
fn format_real(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    let s = value.to_string();
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{}.0", s)
    }
}

impl fmt::Display for NmlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fortran_string(false))
    }
}

impl From<i64> for NmlValue {
    fn from(value: i64) -> Self {
        NmlValue::Integer(value)
    }
}

impl From<i32> for NmlValue {
    fn from(value: i32) -> Self {
        NmlValue::Integer(value as i64)
    }
}

impl From<usize> for NmlValue {
    fn from(value: usize) -> Self {
        NmlValue::Integer(value as i64)
    }
}

impl From<f64> for NmlValue {
    fn from(value: f64) -> Self {
        NmlValue::Real(value)
    }
}

impl From<bool> for NmlValue {
    fn from(value: bool) -> Self {
        NmlValue::Logical(value)
    }
}

impl From<&str> for NmlValue {
    fn from(value: &str) -> Self {
        NmlValue::Character(value.to_string())
    }
}

impl From<String> for NmlValue {
    fn from(value: String) -> Self {
        NmlValue::Character(value)
    }
}

impl<T: Into<NmlValue>> From<Vec<T>> for NmlValue {
    fn from(values: Vec<T>) -> Self {
        NmlValue::Array(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_types() {
        assert_eq!(NmlValue::parse_scalar("42"), NmlValue::Integer(42));
        assert_eq!(NmlValue::parse_scalar("-1"), NmlValue::Integer(-1));
        assert_eq!(NmlValue::parse_scalar("2.5"), NmlValue::Real(2.5));
        assert_eq!(NmlValue::parse_scalar("1.0d0"), NmlValue::Real(1.0));
        assert_eq!(NmlValue::parse_scalar(".true."), NmlValue::Logical(true));
        assert_eq!(NmlValue::parse_scalar("F"), NmlValue::Logical(false));
        assert_eq!(
            NmlValue::parse_scalar("ARW"),
            NmlValue::Character("ARW".to_string())
        );
        assert_eq!(NmlValue::parse_scalar(""), NmlValue::Null);
    }

    #[test]
    fn test_real_formatting_keeps_decimal_point() {
        assert_eq!(NmlValue::Real(2.0).to_fortran_string(false), "2.0");
        assert_eq!(NmlValue::Real(2.5).to_fortran_string(false), "2.5");
    }

    #[test]
    fn test_character_quoting() {
        assert_eq!(
            NmlValue::from("it's").to_fortran_string(false),
            "'it''s'"
        );
    }

    #[test]
    fn test_array_from_vec() {
        let v: NmlValue = vec![1i64, 2, 3].into();
        assert_eq!(v.as_array().unwrap().len(), 3);
        assert_eq!(v.to_fortran_string(false), "1, 2, 3");
    }

    #[test]
    fn test_integer_real_crossover() {
        assert_eq!(NmlValue::Real(3.0).as_integer(), Some(3));
        assert_eq!(NmlValue::Real(3.5).as_integer(), None);
        assert_eq!(NmlValue::Integer(3).as_real(), Some(3.0));
    }
}
