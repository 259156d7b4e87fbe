//! Release of sessions that were never closed.
//!
//! Lives in its own test binary: `release_all` runs every pending guard in
//! the process.

use rust_xlsxwriter::Workbook;
use sheetrows::{guard, ExcelError, ExcelReader};
use tempfile::tempdir;

#[test]
fn test_release_all_deletes_unclosed_copies() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let path = dir.path().join("fixture.xlsx");
    {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "key").unwrap();
        sheet.write_string(1, 0, "value").unwrap();
        workbook.save(&path).unwrap();
    }

    let open = || {
        ExcelReader::builder(&path)
            .with_temp_dir(scratch.path())
            .build()
            .unwrap()
    };
    let mut first = open();
    let mut second = open();
    let copies = [first.file_name().to_path_buf(), second.file_name().to_path_buf()];
    assert!(copies.iter().all(|c| c.exists()));

    assert_eq!(guard::release_all(), 2);
    assert!(copies.iter().all(|c| !c.exists()));

    // released sessions behave as closed
    assert!(first.is_closed() && second.is_closed());
    assert!(matches!(first.read_row(1), Err(ExcelError::SessionClosed)));

    // nothing left to run
    assert_eq!(guard::release_all(), 0);

    // normal close after the guard ran is still clean
    first.close().unwrap();
    second.close().unwrap();
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
}
