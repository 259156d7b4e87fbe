//! Worksheet functions over already evaluated arguments
//!
//! `IF` and `IFERROR` only evaluate the branch they pick, so the engine
//! handles them itself.

use super::value::Value;
use calamine::CellErrorType;

/// Evaluated function argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    /// Cells of a range, row by row
    Range(Vec<Value>),
}

pub type Function = fn(&[Arg]) -> Result<Value, CellErrorType>;

/// Look up a function by its upper-case name
pub fn lookup(name: &str) -> Option<Function> {
    let function: Function = match name {
        "SUM" => sum,
        "AVERAGE" => average,
        "MIN" => min,
        "MAX" => max,
        "COUNT" => count,
        "COUNTA" => counta,
        "AND" => and,
        "OR" => or,
        "NOT" => not,
        "TRUE" => true_value,
        "FALSE" => false_value,
        "CONCATENATE" | "CONCAT" => concat,
        "LEN" => len,
        "UPPER" => upper,
        "LOWER" => lower,
        "TRIM" => trim,
        "ROUND" => round,
        "ABS" => abs,
        "ISBLANK" => isblank,
        _ => return None,
    };
    Some(function)
}

fn single(args: &[Arg]) -> Result<&Value, CellErrorType> {
    match args {
        [Arg::Scalar(value)] => Ok(value),
        _ => Err(CellErrorType::Value),
    }
}

/// Numbers of the arguments; text and booleans inside ranges are skipped
fn numbers(args: &[Arg]) -> Result<Vec<f64>, CellErrorType> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            Arg::Scalar(Value::Blank) => {}
            Arg::Scalar(value) => numbers.push(value.as_number()?),
            Arg::Range(values) => {
                for value in values {
                    match value {
                        Value::Number(n) => numbers.push(*n),
                        Value::Error(e) => return Err(e.clone()),
                        _ => {}
                    }
                }
            }
        }
    }
    Ok(numbers)
}

/// Truth values of the arguments; text and blanks inside ranges are skipped
fn logicals(args: &[Arg]) -> Result<Vec<bool>, CellErrorType> {
    let mut logicals = Vec::new();
    for arg in args {
        match arg {
            Arg::Scalar(Value::Blank) => {}
            Arg::Scalar(value) => logicals.push(value.as_bool()?),
            Arg::Range(values) => {
                for value in values {
                    match value {
                        Value::Bool(b) => logicals.push(*b),
                        Value::Number(n) => logicals.push(*n != 0.0),
                        Value::Error(e) => return Err(e.clone()),
                        _ => {}
                    }
                }
            }
        }
    }
    if logicals.is_empty() {
        return Err(CellErrorType::Value);
    }
    Ok(logicals)
}

fn values(args: &[Arg]) -> impl Iterator<Item = &Value> {
    args.iter().flat_map(|arg| match arg {
        Arg::Scalar(value) => std::slice::from_ref(value),
        Arg::Range(values) => values.as_slice(),
    })
}

fn sum(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Number(numbers(args)?.iter().sum()))
}

fn average(args: &[Arg]) -> Result<Value, CellErrorType> {
    let numbers = numbers(args)?;
    if numbers.is_empty() {
        return Err(CellErrorType::Div0);
    }
    Ok(Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

fn min(args: &[Arg]) -> Result<Value, CellErrorType> {
    let min = numbers(args)?.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(Value::Number(min))
}

fn max(args: &[Arg]) -> Result<Value, CellErrorType> {
    let max = numbers(args)?.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(Value::Number(max))
}

fn count(args: &[Arg]) -> Result<Value, CellErrorType> {
    let count = args
        .iter()
        .map(|arg| match arg {
            Arg::Scalar(Value::Blank) => 0,
            Arg::Scalar(value) => usize::from(value.as_number().is_ok()),
            Arg::Range(values) => values
                .iter()
                .filter(|v| matches!(v, Value::Number(_)))
                .count(),
        })
        .sum::<usize>();
    Ok(Value::Number(count as f64))
}

fn counta(args: &[Arg]) -> Result<Value, CellErrorType> {
    let count = values(args).filter(|v| **v != Value::Blank).count();
    Ok(Value::Number(count as f64))
}

fn and(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Bool(logicals(args)?.into_iter().all(|b| b)))
}

fn or(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Bool(logicals(args)?.into_iter().any(|b| b)))
}

fn not(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Bool(!single(args)?.as_bool()?))
}

fn true_value(_: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Bool(true))
}

fn false_value(_: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Bool(false))
}

fn concat(args: &[Arg]) -> Result<Value, CellErrorType> {
    let mut text = String::new();
    for value in values(args) {
        text.push_str(&value.as_text()?);
    }
    Ok(Value::Text(text))
}

fn len(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Number(single(args)?.as_text()?.chars().count() as f64))
}

fn upper(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Text(single(args)?.as_text()?.to_uppercase()))
}

fn lower(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Text(single(args)?.as_text()?.to_lowercase()))
}

/// Strip leading and trailing spaces and collapse inner runs to one space
fn trim(args: &[Arg]) -> Result<Value, CellErrorType> {
    let text = single(args)?.as_text()?;
    Ok(Value::Text(text.split_whitespace().collect::<Vec<_>>().join(" ")))
}

/// Round half away from zero; negative digits round left of the decimal point
fn round(args: &[Arg]) -> Result<Value, CellErrorType> {
    let (value, digits) = match args {
        [Arg::Scalar(value)] => (value.as_number()?, 0),
        [Arg::Scalar(value), Arg::Scalar(digits)] => {
            (value.as_number()?, digits.as_number()?.trunc() as i32)
        }
        _ => return Err(CellErrorType::Value),
    };
    let rounded = if digits >= 0 {
        let factor = 10f64.powi(digits);
        (value * factor).round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        (value / factor).round() * factor
    };
    Ok(Value::Number(rounded))
}

fn abs(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Number(single(args)?.as_number()?.abs()))
}

fn isblank(args: &[Arg]) -> Result<Value, CellErrorType> {
    Ok(Value::Bool(matches!(args, [Arg::Scalar(Value::Blank)])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Arg>) -> Result<Value, CellErrorType> {
        lookup(name).unwrap()(&args)
    }

    fn num(n: f64) -> Arg {
        Arg::Scalar(Value::Number(n))
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_unknown_function() {
        assert!(lookup("VLOOKUP").is_none());
    }

    #[test]
    fn test_aggregates_skip_text_in_ranges() {
        let range = Arg::Range(vec![
            Value::Number(1.0),
            text("n/a"),
            Value::Blank,
            Value::Number(5.0),
            Value::Bool(true),
        ]);
        assert_eq!(call("SUM", vec![range.clone(), num(4.0)]), Ok(Value::Number(10.0)));
        assert_eq!(call("AVERAGE", vec![range.clone()]), Ok(Value::Number(3.0)));
        assert_eq!(call("MIN", vec![range.clone()]), Ok(Value::Number(1.0)));
        assert_eq!(call("MAX", vec![range.clone()]), Ok(Value::Number(5.0)));
        assert_eq!(call("COUNT", vec![range.clone()]), Ok(Value::Number(2.0)));
        assert_eq!(call("COUNTA", vec![range]), Ok(Value::Number(4.0)));
    }

    #[test]
    fn test_aggregate_errors() {
        assert_eq!(call("AVERAGE", vec![Arg::Range(vec![])]), Err(CellErrorType::Div0));
        assert_eq!(
            call("SUM", vec![Arg::Range(vec![Value::Error(CellErrorType::NA)])]),
            Err(CellErrorType::NA)
        );
        assert_eq!(
            call("SUM", vec![Arg::Scalar(text("abc"))]),
            Err(CellErrorType::Value)
        );
        assert_eq!(call("MAX", vec![Arg::Range(vec![])]), Ok(Value::Number(0.0)));
    }

    #[test]
    fn test_logical() {
        assert_eq!(
            call("AND", vec![Arg::Scalar(Value::Bool(true)), num(1.0)]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call("OR", vec![Arg::Range(vec![Value::Bool(false), text("x")])]),
            Ok(Value::Bool(false))
        );
        assert_eq!(call("AND", vec![Arg::Range(vec![text("x")])]), Err(CellErrorType::Value));
        assert_eq!(call("NOT", vec![num(0.0)]), Ok(Value::Bool(true)));
        assert_eq!(call("TRUE", vec![]), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_text() {
        assert_eq!(
            call("CONCATENATE", vec![Arg::Scalar(text("a")), num(1.0), Arg::Scalar(Value::Bool(true))]),
            Ok(text("a1TRUE"))
        );
        assert_eq!(call("LEN", vec![Arg::Scalar(text("héllo"))]), Ok(Value::Number(5.0)));
        assert_eq!(call("UPPER", vec![Arg::Scalar(text("abc"))]), Ok(text("ABC")));
        assert_eq!(call("LOWER", vec![Arg::Scalar(text("ABC"))]), Ok(text("abc")));
        assert_eq!(call("TRIM", vec![Arg::Scalar(text("  a   b "))]), Ok(text("a b")));
        assert_eq!(call("LEN", vec![]), Err(CellErrorType::Value));
    }

    #[test]
    fn test_math() {
        assert_eq!(call("ROUND", vec![num(2.5), num(0.0)]), Ok(Value::Number(3.0)));
        assert_eq!(call("ROUND", vec![num(-2.5)]), Ok(Value::Number(-3.0)));
        assert_eq!(call("ROUND", vec![num(1234.5), num(-2.0)]), Ok(Value::Number(1200.0)));
        assert_eq!(call("ROUND", vec![num(1.005), num(1.0)]), Ok(Value::Number(1.0)));
        assert_eq!(call("ABS", vec![num(-4.0)]), Ok(Value::Number(4.0)));
    }

    #[test]
    fn test_isblank() {
        assert_eq!(call("ISBLANK", vec![Arg::Scalar(Value::Blank)]), Ok(Value::Bool(true)));
        assert_eq!(call("ISBLANK", vec![Arg::Scalar(text(""))]), Ok(Value::Bool(false)));
    }
}
