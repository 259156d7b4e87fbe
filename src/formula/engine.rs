//! Evaluation of parsed formulas against the bound sheet

use super::functions::{self, Arg};
use super::parser::{parse_formula, BinaryOp, Expr};
use super::value::{compare, Value};
use crate::coerce::FormulaEvaluator;
use crate::error::{ExcelError, Result};
use crate::sheet::SheetData;
use crate::types::{Cell, CellRef};
use calamine::{CellErrorType, Data};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Why a formula produced no computed value
enum Stop {
    /// Outside the supported subset; the cached result stands in
    Unsupported(String),
    Failed(ExcelError),
}

type Eval<T> = std::result::Result<T, Stop>;

/// Computes formula cells of one sheet.
///
/// Formulas the engine cannot compute fall back to the result cached in the
/// file. Results of referenced formula cells are memoized for the lifetime
/// of the engine.
pub struct FormulaEngine<'a> {
    sheet: &'a SheetData,
    max_depth: usize,
    computed: RefCell<HashMap<CellRef, Value>>,
}

impl<'a> FormulaEngine<'a> {
    /// Engine over `sheet`; chains of formula references deeper than
    /// `max_depth` fail with [`ExcelError::FormulaDepthExceeded`]
    pub fn new(sheet: &'a SheetData, max_depth: usize) -> Self {
        FormulaEngine {
            sheet,
            max_depth,
            computed: RefCell::new(HashMap::new()),
        }
    }

    fn formula_value(&self, formula: &str, at: CellRef, depth: usize) -> Eval<Value> {
        if depth >= self.max_depth {
            return Err(Stop::Failed(ExcelError::FormulaDepthExceeded {
                cell: at.to_string(),
                depth: self.max_depth,
            }));
        }
        let expr = parse_formula(formula)
            .ok_or_else(|| Stop::Unsupported(format!("cannot parse '{}'", formula)))?;
        self.eval(&expr, depth)
    }

    fn cell_value(&self, at: CellRef, depth: usize) -> Eval<Value> {
        let Some(formula) = self.sheet.formula_at(at.row, at.col) else {
            return Ok(self.cached(at));
        };

        let memo = self.computed.borrow().get(&at).cloned();
        if let Some(value) = memo {
            return Ok(value);
        }

        let value = match self.formula_value(formula, at, depth + 1) {
            Ok(value) => value,
            Err(Stop::Unsupported(reason)) => {
                log::debug!("{} falls back to its cached result: {}", at, reason);
                self.cached(at)
            }
            Err(stop) => return Err(stop),
        };
        self.computed.borrow_mut().insert(at, value.clone());
        Ok(value)
    }

    fn cached(&self, at: CellRef) -> Value {
        self.sheet
            .value_at(at.row, at.col)
            .map(Value::from)
            .unwrap_or(Value::Blank)
    }

    /// Cells of a range; the part past the used area of the sheet is blank
    /// and left out
    fn range_values(&self, start: CellRef, end: CellRef, depth: usize) -> Eval<Vec<Value>> {
        let (Some(last_row), Some((_, last_col))) =
            (self.sheet.last_row(), self.sheet.column_span())
        else {
            return Ok(Vec::new());
        };
        let top = start.row.min(end.row);
        let bottom = start.row.max(end.row).min(last_row);
        let left = start.col.min(end.col);
        let right = start.col.max(end.col).min(last_col);

        let mut values = Vec::new();
        for row in top..=bottom {
            for col in left..=right {
                values.push(self.cell_value(CellRef::new(row, col), depth)?);
            }
        }
        Ok(values)
    }

    fn eval(&self, expr: &Expr, depth: usize) -> Eval<Value> {
        let value = match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Text(s) => Value::Text(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Error(e) => Value::Error(e.clone()),
            Expr::Missing => Value::Blank,
            Expr::Reference(at) => self.cell_value(*at, depth)?,
            Expr::Range { .. } => {
                return Err(Stop::Unsupported("range used as a single value".to_string()))
            }
            Expr::External(name) => {
                return Err(Stop::Unsupported(format!("'{}' is not on this sheet", name)))
            }
            Expr::Negate(inner) => match self.eval(inner, depth)?.as_number() {
                Ok(n) => Value::Number(-n),
                Err(e) => Value::Error(e),
            },
            Expr::Percent(inner) => match self.eval(inner, depth)?.as_number() {
                Ok(n) => Value::Number(n / 100.0),
                Err(e) => Value::Error(e),
            },
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, depth)?;
                let right = self.eval(right, depth)?;
                binary(*op, left, right)
            }
            Expr::Call { name, args } => self.call(name, args, depth)?,
        };
        Ok(value)
    }

    fn call(&self, name: &str, args: &[Expr], depth: usize) -> Eval<Value> {
        match name {
            "IF" => return self.if_value(args, depth),
            "IFERROR" => return self.iferror_value(args, depth),
            _ => {}
        }

        let Some(function) = functions::lookup(name) else {
            return Err(Stop::Unsupported(format!("function {} is not supported", name)));
        };
        let args = args
            .iter()
            .map(|arg| match arg {
                Expr::Range { start, end } => Ok(Arg::Range(self.range_values(*start, *end, depth)?)),
                other => Ok(Arg::Scalar(self.eval(other, depth)?)),
            })
            .collect::<Eval<Vec<_>>>()?;

        Ok(function(&args).unwrap_or_else(Value::Error))
    }

    fn if_value(&self, args: &[Expr], depth: usize) -> Eval<Value> {
        let (condition, then, otherwise) = match args {
            [condition, then] => (condition, then, None),
            [condition, then, otherwise] => (condition, then, Some(otherwise)),
            _ => return Ok(Value::Error(CellErrorType::Value)),
        };

        let branch = match self.eval(condition, depth)?.as_bool() {
            Ok(true) => then,
            Ok(false) => match otherwise {
                Some(otherwise) => otherwise,
                None => return Ok(Value::Bool(false)),
            },
            Err(e) => return Ok(Value::Error(e)),
        };
        self.eval(branch, depth)
    }

    fn iferror_value(&self, args: &[Expr], depth: usize) -> Eval<Value> {
        let [value, fallback] = args else {
            return Ok(Value::Error(CellErrorType::Value));
        };
        match self.eval(value, depth)? {
            Value::Error(_) => self.eval(fallback, depth),
            value => Ok(value),
        }
    }

    /// Cell holding `value` as the result of the formula at `at`
    fn result_cell(&self, value: Value, at: CellRef) -> Cell {
        match value {
            Value::Blank => Cell::Blank,
            Value::Number(n) if !n.is_finite() => Cell::Error(CellErrorType::Num),
            Value::Number(value) => Cell::Numeric {
                value,
                // the cell's number format decides, and calamine only
                // exposes it through the cached value
                datetime: if self.date_formatted(at) {
                    serial_to_datetime(value)
                } else {
                    None
                },
            },
            Value::Text(s) => Cell::String(s),
            Value::Bool(b) => Cell::Boolean(b),
            Value::Error(e) => Cell::Error(e),
        }
    }

    fn date_formatted(&self, at: CellRef) -> bool {
        matches!(
            self.sheet.value_at(at.row, at.col),
            Some(Data::DateTime(d)) if d.is_datetime()
        )
    }
}

impl FormulaEvaluator for FormulaEngine<'_> {
    fn evaluate_in_cell(&self, formula: &str, at: CellRef) -> Result<Option<Cell>> {
        match self.formula_value(formula, at, 0) {
            Ok(value) => Ok(Some(self.result_cell(value, at))),
            Err(Stop::Unsupported(reason)) => {
                log::debug!("{} falls back to its cached result: {}", at, reason);
                Ok(self.sheet.value_at(at.row, at.col).map(Cell::from))
            }
            Err(Stop::Failed(e)) => Err(e),
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    if let Value::Error(e) = &left {
        return Value::Error(e.clone());
    }
    if let Value::Error(e) = &right {
        return Value::Error(e.clone());
    }

    match op {
        BinaryOp::Concat => match (left.as_text(), right.as_text()) {
            (Ok(l), Ok(r)) => Value::Text(l + &r),
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
            let (l, r) = match (left.as_number(), right.as_number()) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(e), _) | (_, Err(e)) => return Value::Error(e),
            };
            arithmetic(op, l, r)
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&left, &right);
            Value::Bool(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::Ne => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn arithmetic(op: BinaryOp, l: f64, r: f64) -> Value {
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div if r == 0.0 => return Value::Error(CellErrorType::Div0),
        BinaryOp::Div => l / r,
        BinaryOp::Pow if l == 0.0 && r < 0.0 => return Value::Error(CellErrorType::Div0),
        _ => l.powf(r),
    };
    if result.is_finite() {
        Value::Number(result)
    } else {
        Value::Error(CellErrorType::Num)
    }
}

/// Date and time of a 1900-system serial number
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}
