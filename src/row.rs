//! Fixed-width row materialization

use crate::coerce::{string_value_with_depth, FormulaEvaluator};
use crate::error::{ExcelError, Result};
use crate::sheet::SheetData;

/// Read row `index` of `sheet` as exactly `row_size` strings.
///
/// Rows inside the sheet that were never written come back as `row_size`
/// empty strings; cells missing from an existing row are read as blank.
/// Columns past `row_size` are ignored.
pub fn materialize(
    sheet: &SheetData,
    index: usize,
    row_size: usize,
    evaluator: &dyn FormulaEvaluator,
    max_formula_depth: usize,
) -> Result<Vec<String>> {
    let row_count = sheet.row_count();
    if index >= row_count {
        return Err(ExcelError::RowOutOfRange { index, row_count });
    }

    // row_count fits in u32 + 1, so any index below it fits in u32
    let row = index as u32;
    if !sheet.row_exists(row) {
        return Ok(empty_row(row_size));
    }

    (0..row_size)
        .map(|col| {
            let cell = sheet.cell(row, col as u32);
            string_value_with_depth(&cell, evaluator, max_formula_depth)
        })
        .collect()
}

/// `row_size` empty strings
pub fn empty_row(row_size: usize) -> Vec<String> {
    vec![String::new(); row_size]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::DEFAULT_MAX_FORMULA_DEPTH;
    use calamine::{Data, Range};

    fn sheet() -> SheetData {
        let mut values = Range::new((0, 0), (2, 3));
        values.set_value((0, 0), Data::String("a".to_string()));
        values.set_value((0, 1), Data::Float(2.0));
        values.set_value((0, 3), Data::Bool(false));
        values.set_value((2, 0), Data::String("c".to_string()));
        SheetData::new(values, Range::empty())
    }

    fn read(sheet: &SheetData, index: usize, row_size: usize) -> Result<Vec<String>> {
        materialize(
            sheet,
            index,
            row_size,
            &sheet.evaluator(DEFAULT_MAX_FORMULA_DEPTH),
            DEFAULT_MAX_FORMULA_DEPTH,
        )
    }

    #[test]
    fn test_pads_missing_cells() {
        let sheet = sheet();
        assert_eq!(read(&sheet, 0, 4).unwrap(), vec!["a", "2", "", "false"]);
        assert_eq!(read(&sheet, 2, 3).unwrap(), vec!["c", "", ""]);
    }

    #[test]
    fn test_ignores_extra_columns() {
        let sheet = sheet();
        assert_eq!(read(&sheet, 0, 2).unwrap(), vec!["a", "2"]);
    }

    #[test]
    fn test_absent_row_is_blank() {
        let sheet = sheet();
        assert_eq!(read(&sheet, 1, 3).unwrap(), vec!["", "", ""]);
    }

    #[test]
    fn test_out_of_range() {
        let sheet = sheet();
        let err = read(&sheet, 3, 3).unwrap_err();
        assert!(matches!(
            err,
            ExcelError::RowOutOfRange {
                index: 3,
                row_count: 3
            }
        ));
    }

    #[test]
    fn test_zero_width() {
        let sheet = sheet();
        assert!(read(&sheet, 0, 0).unwrap().is_empty());
    }
}
