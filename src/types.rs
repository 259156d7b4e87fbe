//! Type definitions for worksheet cells

use calamine::{CellErrorType, Data};
use chrono::NaiveDateTime;
use std::fmt;

/// A single cell of the bound sheet, classified by kind
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Blank cell, or a cell missing from an existing row
    Blank,
    /// Literal text
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Error value such as `#DIV/0!`
    Error(CellErrorType),
    /// Numeric value; `datetime` is set when the cell's number format encodes a date/time
    Numeric {
        value: f64,
        datetime: Option<NaiveDateTime>,
    },
    /// Whole number as stored by the container (xls RK records, ods integers)
    Integer(i64),
    /// Formula text; its result is obtained through a [`FormulaEvaluator`](crate::coerce::FormulaEvaluator)
    Formula { formula: String, at: CellRef },
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Blank,
            Data::String(s) => Cell::String(s.clone()),
            Data::Float(f) => Cell::Numeric {
                value: *f,
                datetime: None,
            },
            Data::Int(i) => Cell::Integer(*i),
            Data::Bool(b) => Cell::Boolean(*b),
            Data::DateTime(d) => Cell::Numeric {
                value: d.as_f64(),
                datetime: d.is_datetime().then(|| d.as_datetime()).flatten(),
            },
            Data::Error(e) => Cell::Error(e.clone()),
            Data::DateTimeIso(s) => Cell::String(s.clone()),
            Data::DurationIso(s) => Cell::String(s.clone()),
        }
    }
}

/// Zero-based (row, column) position of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based)
    pub col: u32,
}

impl CellRef {
    /// Create a new cell reference
    pub fn new(row: u32, col: u32) -> Self {
        CellRef { row, col }
    }

    /// Convert column index to Excel letter (0 -> A, 25 -> Z, 26 -> AA)
    fn col_to_letter(col: u32) -> String {
        let mut result = String::new();
        let mut col = col + 1;

        while col > 0 {
            col -= 1;
            result.insert(0, (b'A' + (col % 26) as u8) as char);
            col /= 26;
        }

        result
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::col_to_letter(self.col), self.row + 1)
    }
}

impl From<(u32, u32)> for CellRef {
    fn from((row, col): (u32, u32)) -> Self {
        CellRef { row, col }
    }
}
