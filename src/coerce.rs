//! Conversion of typed cells into their canonical string form
//!
//! Every cell kind renders to exactly one string:
//!
//! | Kind      | Rendering                                          |
//! |-----------|----------------------------------------------------|
//! | blank     | `""`                                               |
//! | string    | the literal text                                   |
//! | boolean   | `"true"` / `"false"`                               |
//! | error     | `"ERROR: "` followed by the error code (`#DIV/0!`) |
//! | numeric   | `f64` display (`30`, `1.5`), or the date/time      |
//! | formula   | the rendering of the evaluated result, `""` if none |
//!
//! Numbers use the shortest representation that round-trips, without an
//! exponent and without a trailing `.0`. Date/time cells render as
//! `YYYY-MM-DD HH:MM:SS`.

use crate::error::{ExcelError, Result};
use crate::types::{Cell, CellRef};

/// Default cap on nested formula results
pub const DEFAULT_MAX_FORMULA_DEPTH: usize = 16;

/// Capability that resolves a formula cell into its resulting cell
pub trait FormulaEvaluator {
    /// Evaluate the formula stored at `at`.
    ///
    /// Returns `Ok(None)` when the formula has no result.
    fn evaluate_in_cell(&self, formula: &str, at: CellRef) -> Result<Option<Cell>>;
}

/// Render a cell as a string, evaluating formulas through `evaluator`
///
/// # Examples
///
/// ```
/// use sheetrows::coerce::{string_value, FormulaEvaluator};
/// use sheetrows::types::{Cell, CellRef};
///
/// struct NoFormulas;
///
/// impl FormulaEvaluator for NoFormulas {
///     fn evaluate_in_cell(&self, _: &str, _: CellRef) -> sheetrows::Result<Option<Cell>> {
///         Ok(None)
///     }
/// }
///
/// assert_eq!(string_value(&Cell::Boolean(true), &NoFormulas).unwrap(), "true");
/// ```
pub fn string_value(cell: &Cell, evaluator: &dyn FormulaEvaluator) -> Result<String> {
    string_value_with_depth(cell, evaluator, DEFAULT_MAX_FORMULA_DEPTH)
}

/// Same as [`string_value`] with an explicit cap on nested formula results
pub fn string_value_with_depth(
    cell: &Cell,
    evaluator: &dyn FormulaEvaluator,
    max_depth: usize,
) -> Result<String> {
    coerce(cell, evaluator, 0, max_depth)
}

fn coerce(
    cell: &Cell,
    evaluator: &dyn FormulaEvaluator,
    depth: usize,
    max_depth: usize,
) -> Result<String> {
    let value = match cell {
        Cell::Blank => String::new(),
        Cell::String(s) => s.clone(),
        Cell::Boolean(b) => b.to_string(),
        Cell::Error(e) => format!("ERROR: {}", e),
        Cell::Numeric {
            datetime: Some(dt), ..
        } => dt.to_string(),
        Cell::Numeric { value, .. } => value.to_string(),
        Cell::Integer(i) => i.to_string(),
        Cell::Formula { formula, at } => {
            if depth >= max_depth {
                return Err(ExcelError::FormulaDepthExceeded {
                    cell: at.to_string(),
                    depth: max_depth,
                });
            }
            match evaluator.evaluate_in_cell(formula, *at)? {
                Some(result) => coerce(&result, evaluator, depth + 1, max_depth)?,
                None => String::new(),
            }
        }
    };

    Ok(value)
}
