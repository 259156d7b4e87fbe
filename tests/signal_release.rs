//! Termination signals release the copies of sessions that were never closed.
//!
//! The test re-runs this binary as a child that opens a session and waits.
//! The parent sends it `SIGTERM` and checks that the copy is gone.

#![cfg(unix)]

use rust_xlsxwriter::Workbook;
use sheetrows::ExcelReader;
use std::env;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::tempdir;

const FIXTURE_VAR: &str = "SHEETROWS_SIGNAL_FIXTURE";
const SCRATCH_VAR: &str = "SHEETROWS_SIGNAL_SCRATCH";

/// Child side: open a session, report its copy, wait to be terminated
#[test]
fn hold_session_until_signalled() {
    let (Ok(fixture), Ok(scratch)) = (env::var(FIXTURE_VAR), env::var(SCRATCH_VAR)) else {
        return;
    };

    let reader = ExcelReader::builder(&fixture)
        .with_temp_dir(&scratch)
        .build()
        .unwrap();
    let mut stdout = std::io::stdout();
    writeln!(stdout, "copy={}", reader.file_name().display()).unwrap();
    stdout.flush().unwrap();

    // the parent's SIGTERM ends the process long before this
    std::thread::sleep(Duration::from_secs(30));
}

#[test]
fn test_sigterm_releases_unclosed_copies() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let fixture = dir.path().join("fixture.xlsx");
    {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "key").unwrap();
        sheet.write_string(1, 0, "value").unwrap();
        workbook.save(&fixture).unwrap();
    }

    let mut child = Command::new(env::current_exe().unwrap())
        .args(["hold_session_until_signalled", "--exact", "--nocapture", "--test-threads=1", "-q"])
        .env(FIXTURE_VAR, &fixture)
        .env(SCRATCH_VAR, scratch.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let copy = lines
        .by_ref()
        .map_while(Result::ok)
        .find_map(|line| line.strip_prefix("copy=").map(PathBuf::from))
        .expect("child reported no copy");
    assert!(copy.exists());

    // the shell builtin, /bin/kill is not always installed
    let kill = Command::new("sh")
        .arg("-c")
        .arg(format!("kill -TERM {}", child.id()))
        .status()
        .unwrap();
    assert!(kill.success());

    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(signal_hook::consts::SIGTERM));
    assert!(!copy.exists());
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
}
