//! Intermediate values produced while evaluating a formula

use calamine::{CellErrorType, Data};
use std::cmp::Ordering;

/// Scalar result of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Blank,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(CellErrorType),
}

impl From<&Data> for Value {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Value::Blank,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
            Data::Float(f) => Value::Number(*f),
            Data::Int(i) => Value::Number(*i as f64),
            Data::Bool(b) => Value::Bool(*b),
            Data::DateTime(d) => Value::Number(d.as_f64()),
            Data::Error(e) => Value::Error(e.clone()),
        }
    }
}

impl Value {
    /// Numeric reading: blank is 0, booleans are 1/0, text must parse
    pub fn as_number(&self) -> Result<f64, CellErrorType> {
        match self {
            Value::Blank => Ok(0.0),
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().map_err(|_| CellErrorType::Value),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Text reading as `&` and the text functions see it
    pub fn as_text(&self) -> Result<String, CellErrorType> {
        match self {
            Value::Blank => Ok(String::new()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Text(s) => Ok(s.clone()),
            Value::Bool(true) => Ok("TRUE".to_string()),
            Value::Bool(false) => Ok("FALSE".to_string()),
            Value::Error(e) => Err(e.clone()),
        }
    }

    /// Truth value for conditions
    pub fn as_bool(&self) -> Result<bool, CellErrorType> {
        match self {
            Value::Blank => Ok(false),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Bool(b) => Ok(*b),
            Value::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            Value::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            Value::Text(_) => Err(CellErrorType::Value),
            Value::Error(e) => Err(e.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Blank | Value::Number(_) | Value::Error(_) => 0,
            Value::Text(_) => 1,
            Value::Bool(_) => 2,
        }
    }
}

/// Order two non-error values the way comparison operators do.
///
/// Blank takes the zero value of the other side's type. Text compares
/// case-insensitively. Across types, numbers sort before text before booleans.
pub fn compare(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Blank, Value::Blank) => Ordering::Equal,
        (Value::Blank, other) => compare(&zero_like(other), other),
        (other, Value::Blank) => compare(other, &zero_like(other)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (a, b) => a.rank().cmp(&b.rank()),
    }
}

fn zero_like(value: &Value) -> Value {
    match value {
        Value::Text(_) => Value::Text(String::new()),
        Value::Bool(_) => Value::Bool(false),
        _ => Value::Number(0.0),
    }
}
