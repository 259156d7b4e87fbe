//! Formula evaluation for the bound worksheet
//!
//! calamine decodes formula text but never calculates it, and the result a
//! file caches next to a formula may be missing or stale. [`FormulaEngine`]
//! parses the formula and computes it against the sheet, following
//! references into other formula cells.
//!
//! Supported:
//!
//! - literals: numbers, strings, `TRUE`/`FALSE`, error codes (`#N/A`)
//! - references on the bound sheet (`B2`, `$B$2`) and ranges (`A1:C3`)
//! - operators: `+ - * / ^ & %`, comparisons `= <> < > <= >=`
//! - functions: `SUM`, `AVERAGE`, `MIN`, `MAX`, `COUNT`, `COUNTA`, `IF`,
//!   `IFERROR`, `AND`, `OR`, `NOT`, `TRUE`, `FALSE`, `CONCATENATE`,
//!   `CONCAT`, `LEN`, `UPPER`, `LOWER`, `TRIM`, `ROUND`, `ABS`, `ISBLANK`
//!
//! A formula outside that subset (another sheet, a defined name, an unknown
//! function) resolves to the cached result stored in the file.

pub mod engine;
mod functions;
pub mod parser;
mod value;

pub use engine::FormulaEngine;
pub use parser::{parse_cell_ref, parse_formula, BinaryOp, Expr};
