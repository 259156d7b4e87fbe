//! Error types for the sheetrows library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sheetrows operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all worksheet session operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// The private working copy or the workbook could not be created
    #[error("Unable to create a workbook from '{}': {source}", path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: Box<ExcelError>,
    },

    /// Requested sheet index does not name a sheet of the workbook
    #[error("Sheet index {index} is out of range. Workbook has {sheet_count} sheet(s)")]
    InvalidSheetIndex { index: usize, sheet_count: usize },

    /// Row index outside `[0, row_count - 1]`
    #[error("Row index {index} is out of range. Active sheet has {row_count} row(s)")]
    RowOutOfRange { index: usize, row_count: usize },

    /// The private working copy exists but could not be removed
    #[error("Failed to delete '{}': {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Formula evaluation failed while reading from a session
    #[error("Failed to evaluate a cell in '{}': {source}", path.display())]
    Evaluation {
        path: PathBuf,
        #[source]
        source: Box<ExcelError>,
    },

    /// The evaluation capability reported a failure for a formula cell
    #[error("Formula in {cell} could not be evaluated: {message}")]
    FormulaError { cell: String, message: String },

    /// Formula results kept resolving to formulas
    #[error("Formula in {cell} exceeded the maximum evaluation depth of {depth}")]
    FormulaDepthExceeded { cell: String, depth: usize },

    /// The session was already closed
    #[error("Worksheet session is closed")]
    SessionClosed,

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Calamine error wrapper
    #[error("Calamine error: {0}")]
    CalamineError(String),
}

impl ExcelError {
    /// Wrap an error raised while opening `path`
    pub(crate) fn initialization(path: impl Into<PathBuf>, source: ExcelError) -> Self {
        ExcelError::Initialization {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Attach the session's file to an error coming out of formula evaluation
    pub(crate) fn in_session(self, path: impl Into<PathBuf>) -> Self {
        match self {
            err @ (ExcelError::FormulaError { .. } | ExcelError::FormulaDepthExceeded { .. }) => {
                ExcelError::Evaluation {
                    path: path.into(),
                    source: Box::new(err),
                }
            }
            other => other,
        }
    }
}

impl From<calamine::Error> for ExcelError {
    fn from(err: calamine::Error) -> Self {
        ExcelError::CalamineError(err.to_string())
    }
}
