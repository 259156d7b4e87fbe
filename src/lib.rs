//! # sheetrows
//!
//! Row-oriented string access to spreadsheet worksheets, built for
//! data-driven tests that keep their fixtures in Excel or OpenDocument files.
//!
//! ## Features
//!
//! - **Fixed-width rows**: every row comes back as exactly one string per header column
//! - **One string form per cell kind**: numbers, booleans, dates, errors and formula results
//! - **Formula evaluation**: formulas are computed against the sheet, falling back to results cached in the file
//! - **Private working copy**: the source file is copied and the copy is deleted on close
//! - **Guaranteed cleanup**: copies of sessions never closed are released on SIGINT/SIGTERM or an explicit release
//! - **Multiple Formats**: XLSX, XLSM, XLSB, XLS and ODS through calamine
//!
//! ## Quick Start
//!
//! ### Header from the first row
//!
//! ```rust,no_run
//! use sheetrows::ExcelReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = ExcelReader::open("users.xlsx")?;
//! assert_eq!(reader.header(), ["Name", "Age", "Active"]);
//!
//! for row in reader.rows() {
//!     let row = row?;
//!     println!("{} is {}", row[0], row[1]);
//! }
//!
//! reader.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Caller-supplied header
//!
//! ```rust,no_run
//! use sheetrows::ExcelReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = ExcelReader::open_sheet_with_headers("logins.xlsx", 1, ["user", "password"])?;
//!
//! // row 0 is data here
//! let first = reader.read_record(0)?;
//! println!("{}", first["user"]);
//!
//! reader.close()?;
//! # Ok(())
//! # }
//! ```

pub mod coerce;
pub mod error;
pub mod formula;
pub mod guard;
pub mod reader;
pub mod row;
pub mod sheet;
pub mod temp_copy;
pub mod types;

pub use error::{ExcelError, Result};
pub use reader::{ExcelReader, ExcelReaderBuilder, RowIterator};
pub use types::{Cell, CellRef};
