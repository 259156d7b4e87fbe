//! A panic caught on the main thread must leave open sessions alone.
//!
//! Runs without the libtest harness: harness tests execute on worker
//! threads, and the panic has to happen on `main`.

use rust_xlsxwriter::Workbook;
use sheetrows::ExcelReader;
use std::panic;
use tempfile::tempdir;

fn main() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fixture.xlsx");
    {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "key").unwrap();
        sheet.write_string(1, 0, "value").unwrap();
        workbook.save(&path).unwrap();
    }

    let mut reader = ExcelReader::builder(&path)
        .with_temp_dir(dir.path())
        .build()
        .unwrap();
    let copy = reader.file_name().to_path_buf();

    assert_eq!(std::thread::current().name(), Some("main"));
    let caught = panic::catch_unwind(|| panic!("recovered on main"));
    assert!(caught.is_err());

    assert!(!reader.is_closed());
    assert!(copy.exists());
    assert_eq!(reader.read_row(1).unwrap(), ["value"]);

    reader.close().unwrap();
    assert!(!copy.exists());
    println!("caught_panic: ok");
}
