// wrfrs/src/config/coerce.rs

//! Value coercion: embedded `eval(...)` expressions, list expansion and
//! typed reads against a caller supplied default.

use crate::config::{expr, ConfigError};
use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::{Mapping, Value};

lazy_static! {
    // arithmetic operators that disable bare-literal evaluation, so that
    // date-like strings ("2015-01-01") survive untouched
    static ref RE_OPERATOR: Regex = Regex::new(r"[+\-*/%]").unwrap();
    static ref RE_EVAL: Regex = Regex::new(r"eval\(([^)]*)\)").unwrap();
}

/// Evaluate embedded `eval(...)` expressions in a string.
///
/// When the whole string is a single `eval(...)`, the typed result is
/// returned directly. Otherwise each occurrence is replaced by its
/// stringified result. Without any marker, strings free of arithmetic
/// operators are tried as plain literals and kept as text on failure.
pub fn try_eval(value: &str) -> Result<Value, ConfigError> {
    if !RE_EVAL.is_match(value) {
        if !RE_OPERATOR.is_match(value) {
            if let Ok(literal) = expr::eval(value) {
                return Ok(literal);
            }
        }
        return Ok(Value::String(value.to_string()));
    }

    // a string that is exactly one eval(...) keeps its evaluated type
    let whole = RE_EVAL
        .captures(value.trim())
        .filter(|c| c.get(0).unwrap().as_str() == value.trim());
    if let Some(captures) = whole {
        return eval_inner(&captures[1]);
    }

    let mut result = String::new();
    let mut last = 0;
    for captures in RE_EVAL.captures_iter(value) {
        let m = captures.get(0).unwrap();
        result.push_str(&value[last..m.start()]);
        result.push_str(&scalar_to_string(&eval_inner(&captures[1])?).unwrap_or_default());
        last = m.end();
    }
    result.push_str(&value[last..]);
    Ok(Value::String(result))
}

fn eval_inner(inner: &str) -> Result<Value, ConfigError> {
    let trimmed = inner.trim();
    let stripped = strip_quotes(trimmed);
    expr::eval(stripped).map_err(|_| ConfigError::Expression(trimmed.to_string()))
}

// strip one pair of matching quotes, leaving unbalanced quotes in place so
// they fail evaluation and surface the offending text
fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Coerce a raw configuration value: evaluate expressions and expand
/// comma/asterisk list notation. Non-strings pass through unchanged.
pub fn coerce(value: &Value) -> Result<Value, ConfigError> {
    let text = match value {
        Value::String(s) => s,
        other => return Ok(other.clone()),
    };

    let evaluated = try_eval(text)?;
    let text = match &evaluated {
        Value::String(s) if s.contains(',') || s.contains('*') => s,
        other => return Ok(other.clone()),
    };

    // "1, 2, 3" and "2*3, text" become flat lists
    let mut items = Vec::new();
    for segment in text.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match try_eval(segment)? {
            Value::String(s) => expand_repeat(&s, &mut items)?,
            other => items.push(other),
        }
    }
    Ok(Value::Sequence(items))
}

// "3*4" expands to three 4s; anything else stays a single item
fn expand_repeat(segment: &str, items: &mut Vec<Value>) -> Result<(), ConfigError> {
    if let Some((count, literal)) = segment.split_once('*') {
        if let Ok(n) = count.trim().parse::<usize>() {
            let value = try_eval(literal.trim())?;
            items.extend(std::iter::repeat(value).take(n));
            return Ok(());
        }
    }
    items.push(Value::String(segment.to_string()));
    Ok(())
}

/// Coerce every string leaf held directly by a mapping, recursing through
/// nested mappings (items inside explicit YAML lists are left alone).
pub fn coerce_mapping(mapping: &Mapping) -> Result<Mapping, ConfigError> {
    let mut result = Mapping::new();
    for (key, value) in mapping {
        result.insert(key.clone(), coerce_nested(value)?);
    }
    Ok(result)
}

fn coerce_nested(value: &Value) -> Result<Value, ConfigError> {
    match value {
        Value::Mapping(m) => Ok(Value::Mapping(coerce_mapping(m)?)),
        Value::Sequence(items) => {
            let items = items
                .iter()
                .map(|item| match item {
                    Value::Mapping(m) => Ok(Value::Mapping(coerce_mapping(m)?)),
                    other => Ok(other.clone()),
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            Ok(Value::Sequence(items))
        }
        other => coerce(other),
    }
}

/// Render a scalar as substitution text; non-scalars yield None.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64().map(format_float)
            }
        }
        _ => None,
    }
}

fn format_float(f: f64) -> String {
    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Conversion from a coerced configuration value to a native type.
///
/// A typed read against a default converts the stored value to the
/// default's type, so `lookup_or("n", String::new())` on a numeric key
/// yields its decimal text.
pub trait ConfigValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl ConfigValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl ConfigValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for usize {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|i| usize::try_from(i).ok())
    }
}

impl ConfigValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl ConfigValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        scalar_to_string(value)
    }
}

impl<T: ConfigValue> ConfigValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => items.iter().map(T::from_value).collect(),
            scalar => Some(vec![T::from_value(scalar)?]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coerce_str(s: &str) -> Value {
        coerce(&Value::String(s.to_string())).unwrap()
    }

    #[test]
    fn test_plain_lists() {
        assert_eq!(coerce_str("1, 2, 3"), Value::from(vec![1i64, 2, 3]));
    }

    #[test]
    fn test_repeat_expansion() {
        assert_eq!(coerce_str("2*3"), Value::from(vec![3i64, 3]));
        assert_eq!(coerce_str("2*3, 4"), Value::from(vec![3i64, 3, 4]));
        let mixed = coerce_str("2*3, text");
        let items = mixed.as_sequence().unwrap();
        assert_eq!(items[0], Value::from(3i64));
        assert_eq!(items[1], Value::from(3i64));
        assert_eq!(items[2], Value::from("text"));
    }

    #[test]
    fn test_eval_markers() {
        assert_eq!(coerce_str("eval(3+4)"), Value::from(7i64));
        assert_eq!(coerce_str("eval( 8. / 2 )"), Value::from(4.0));
        assert_eq!(coerce_str("eval('3 * 4')"), Value::from(12i64));
    }

    #[test]
    fn test_malformed_eval_names_expression() {
        let err = coerce(&Value::String("eval( '3 + 4 )".to_string())).unwrap_err();
        match err {
            ConfigError::Expression(text) => assert!(text.contains("3 + 4")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_dates_survive() {
        assert_eq!(coerce_str("2015-01-01"), Value::from("2015-01-01"));
        assert_eq!(coerce_str("1-2"), Value::from("1-2"));
    }

    #[test]
    fn test_bare_literals() {
        assert_eq!(coerce_str("10"), Value::from(10i64));
        assert_eq!(coerce_str("true"), Value::from(true));
        assert_eq!(coerce_str("some text"), Value::from("some text"));
    }

    #[test]
    fn test_typed_conversion() {
        assert_eq!(String::from_value(&Value::from(1i64)), Some("1".to_string()));
        assert_eq!(i64::from_value(&Value::from("5")), Some(5));
        assert_eq!(f64::from_value(&Value::from(3i64)), Some(3.0));
        assert_eq!(
            Vec::<i64>::from_value(&Value::from(7i64)),
            Some(vec![7i64])
        );
    }
}
