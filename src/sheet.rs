//! Random access to the cells of a single bound worksheet

use crate::formula::FormulaEngine;
use crate::types::{Cell, CellRef};
use calamine::{Data, Range};

/// Values and formulas of one worksheet, addressed by absolute (row, column)
///
/// calamine hands out two independent ranges for a sheet: the cached cell
/// values and the formula text. Either may start anywhere on the sheet.
#[derive(Debug, Clone)]
pub struct SheetData {
    values: Range<Data>,
    formulas: Range<String>,
}

impl SheetData {
    /// Bind a sheet from its value and formula ranges
    pub fn new(values: Range<Data>, formulas: Range<String>) -> Self {
        SheetData { values, formulas }
    }

    /// Highest row index holding a value or a formula
    pub fn last_row(&self) -> Option<u32> {
        let value_end = self.values.end().map(|(r, _)| r);
        let formula_end = self.formulas.end().map(|(r, _)| r);
        value_end.max(formula_end)
    }

    /// `last_row + 1`, or 0 for an empty sheet
    pub fn row_count(&self) -> usize {
        self.last_row().map(|r| r as usize + 1).unwrap_or(0)
    }

    /// Cell at (`row`, `col`); a cell missing from the sheet is [`Cell::Blank`]
    pub fn cell(&self, row: u32, col: u32) -> Cell {
        if let Some(formula) = self.formula_at(row, col) {
            return Cell::Formula {
                formula: formula.to_string(),
                at: CellRef::new(row, col),
            };
        }

        self.values
            .get_value((row, col))
            .map(Cell::from)
            .unwrap_or(Cell::Blank)
    }

    /// Whether anything was ever written to `row`
    pub fn row_exists(&self, row: u32) -> bool {
        self.physical_cells(row) > 0
    }

    /// Number of cells in `row` holding a value or a formula
    pub fn physical_cells(&self, row: u32) -> usize {
        let Some((first, last)) = self.column_span() else {
            return 0;
        };

        (first..=last)
            .filter(|&col| {
                self.formula_at(row, col).is_some()
                    || self
                        .values
                        .get_value((row, col))
                        .is_some_and(|v| !matches!(v, Data::Empty))
            })
            .count()
    }

    /// Value calamine decoded at (`row`, `col`); for a formula cell, the result cached in the file
    pub(crate) fn value_at(&self, row: u32, col: u32) -> Option<&Data> {
        self.values.get_value((row, col))
    }

    pub(crate) fn formula_at(&self, row: u32, col: u32) -> Option<&str> {
        self.formulas
            .get_value((row, col))
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }

    /// First and last column holding a value or a formula
    pub(crate) fn column_span(&self) -> Option<(u32, u32)> {
        let value_span = self.values.start().zip(self.values.end());
        let formula_span = self.formulas.start().zip(self.formulas.end());

        value_span
            .into_iter()
            .chain(formula_span)
            .map(|((_, first), (_, last))| (first, last))
            .reduce(|(a_first, a_last), (b_first, b_last)| {
                (a_first.min(b_first), a_last.max(b_last))
            })
    }

    /// Evaluation capability computing this sheet's formulas
    pub fn evaluator(&self, max_depth: usize) -> FormulaEngine<'_> {
        FormulaEngine::new(self, max_depth)
    }
}
