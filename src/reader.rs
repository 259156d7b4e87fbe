//! Worksheet sessions: header-keyed, fixed-width string rows over one sheet

use crate::coerce::DEFAULT_MAX_FORMULA_DEPTH;
use crate::error::{ExcelError, Result};
use crate::guard::ResourceGuard;
use crate::row::materialize;
use crate::sheet::SheetData;
use crate::temp_copy::PrivateCopy;
use calamine::{open_workbook_auto, Range, Reader, Sheets};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Workbook = Sheets<BufReader<File>>;

/// Everything a session must release: the open workbook and its private file
struct SessionResources {
    workbook: Option<Workbook>,
    copy: PrivateCopy,
    released: bool,
}

impl SessionResources {
    fn release(&mut self) -> Result<()> {
        self.released = true;
        // the workbook holds the copy open, close it first
        self.workbook.take();
        self.copy.remove()
    }
}

/// A read session over one worksheet of a spreadsheet file.
///
/// Opening a session copies the source file to a private temp file and
/// decodes the workbook from that copy. Rows are handed out as `Vec<String>`
/// of exactly [`row_size`](Self::row_size) entries.
///
/// The header is either row 0 of the sheet (iteration then starts at row 1)
/// or supplied by the caller (iteration starts at row 0).
///
/// # Examples
///
/// ```no_run
/// use sheetrows::ExcelReader;
///
/// let mut reader = ExcelReader::open("users.xlsx")?;
/// println!("columns: {:?}", reader.header());
///
/// for row in reader.rows() {
///     let row = row?;
///     println!("{:?}", row);
/// }
///
/// reader.close()?;
/// # Ok::<(), sheetrows::ExcelError>(())
/// ```
pub struct ExcelReader {
    resources: Arc<Mutex<SessionResources>>,
    guard: ResourceGuard,
    sheet: SheetData,
    sheet_name: String,
    sheet_names: Vec<String>,
    active_sheet_index: usize,
    file_name: PathBuf,
    original_file_name: Option<PathBuf>,
    field_names: Vec<String>,
    row_size: usize,
    iterator_start: usize,
    max_formula_depth: usize,
    closed: bool,
}

impl ExcelReader {
    /// Open sheet 0 and take its first row as the header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ExcelReaderBuilder::new(path).build()
    }

    /// Open the sheet at `sheet_index` and take its first row as the header
    pub fn open_sheet<P: AsRef<Path>>(path: P, sheet_index: usize) -> Result<Self> {
        ExcelReaderBuilder::new(path)
            .with_sheet_index(sheet_index)
            .build()
    }

    /// Open sheet 0 with caller-supplied field names; row 0 is data
    pub fn with_headers<P, I, S>(path: P, headers: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExcelReaderBuilder::new(path).with_headers(headers).build()
    }

    /// Open the sheet at `sheet_index` with caller-supplied field names; row 0 is data
    pub fn open_sheet_with_headers<P, I, S>(
        path: P,
        sheet_index: usize,
        headers: I,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExcelReaderBuilder::new(path)
            .with_sheet_index(sheet_index)
            .with_headers(headers)
            .build()
    }

    /// Start configuring a session for `path`
    pub fn builder<P: AsRef<Path>>(path: P) -> ExcelReaderBuilder {
        ExcelReaderBuilder::new(path)
    }

    /// Number of rows in the active sheet, `last row index + 1`
    pub fn row_count(&self) -> usize {
        self.sheet.row_count()
    }

    /// Field names bound to this session
    pub fn header(&self) -> &[String] {
        &self.field_names
    }

    /// Width of every materialized row
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Read row `index` (0-based, counting the header row if there is one)
    pub fn read_row(&self, index: usize) -> Result<Vec<String>> {
        self.ensure_open()?;
        materialize(
            &self.sheet,
            index,
            self.row_size,
            &self.sheet.evaluator(self.max_formula_depth),
            self.max_formula_depth,
        )
        .map_err(|e| e.in_session(&self.file_name))
    }

    /// Read every row of the sheet, header row included
    pub fn read_all(&self) -> Result<Vec<Vec<String>>> {
        (0..self.row_count()).map(|i| self.read_row(i)).collect()
    }

    /// Read row `index` keyed by field name.
    ///
    /// Field names past the row width map to empty strings. When a name
    /// repeats, the first column carrying it wins.
    pub fn read_record(&self, index: usize) -> Result<IndexMap<String, String>> {
        let mut values = self.read_row(index)?.into_iter();
        let mut record = IndexMap::with_capacity(self.field_names.len());

        for name in &self.field_names {
            let value = values.next().unwrap_or_default();
            record.entry(name.clone()).or_insert(value);
        }

        Ok(record)
    }

    /// Iterate the data rows, skipping the header row when it came from the sheet.
    ///
    /// Every call starts a fresh pass.
    pub fn rows(&self) -> RowIterator<'_> {
        RowIterator::new(self, self.iterator_start)
    }

    /// Path of the private copy the session reads from
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Path the session was opened with; only recorded when the header was read from the sheet
    pub fn original_file_name(&self) -> Option<&Path> {
        self.original_file_name.as_deref()
    }

    /// Index of the bound sheet
    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet_index
    }

    /// Name of the bound sheet
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Names of all sheets in the workbook
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Whether the session was closed, or released by [`guard::release_all`](crate::guard::release_all)
    pub fn is_closed(&self) -> bool {
        self.closed || self.resources.lock().released
    }

    /// Close the workbook and delete the private copy.
    ///
    /// Calling it again is a no-op. Fails with [`ExcelError::Cleanup`] when the
    /// copy exists but cannot be removed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.guard.deregister();

        let result = self.resources.lock().release();
        log::debug!("closed worksheet session on '{}'", self.file_name.display());
        result
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ExcelError::SessionClosed);
        }
        Ok(())
    }
}

impl Drop for ExcelReader {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for ExcelReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcelReader")
            .field("file_name", &self.file_name)
            .field("sheet_name", &self.sheet_name)
            .field("active_sheet_index", &self.active_sheet_index)
            .field("row_size", &self.row_size)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Iterator over the rows of a session
pub struct RowIterator<'a> {
    reader: &'a ExcelReader,
    current_row: usize,
    max_row: usize,
}

impl<'a> RowIterator<'a> {
    fn new(reader: &'a ExcelReader, start: usize) -> Self {
        RowIterator {
            reader,
            current_row: start,
            max_row: reader.row_count(),
        }
    }
}

impl Iterator for RowIterator<'_> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.max_row {
            return None;
        }

        let row_idx = self.current_row;
        self.current_row += 1;

        Some(self.reader.read_row(row_idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.max_row.saturating_sub(self.current_row);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowIterator<'_> {}

/// Builder for configured worksheet sessions
pub struct ExcelReaderBuilder {
    path: PathBuf,
    sheet_index: usize,
    headers: Option<Vec<String>>,
    temp_dir: Option<PathBuf>,
    max_formula_depth: usize,
}

impl ExcelReaderBuilder {
    /// Create a new builder
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ExcelReaderBuilder {
            path: path.as_ref().to_path_buf(),
            sheet_index: 0,
            headers: None,
            temp_dir: None,
            max_formula_depth: DEFAULT_MAX_FORMULA_DEPTH,
        }
    }

    /// Bind the sheet at `index` instead of sheet 0
    pub fn with_sheet_index(mut self, index: usize) -> Self {
        self.sheet_index = index;
        self
    }

    /// Use these field names instead of reading row 0
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Directory for the private copy (default: the system temp directory)
    pub fn with_temp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Cap on nested formula results
    pub fn with_max_formula_depth(mut self, depth: usize) -> Self {
        self.max_formula_depth = depth;
        self
    }

    /// Open the session
    pub fn build(self) -> Result<ExcelReader> {
        let source = self.path.clone();
        self.open_session().inspect_err(|e| {
            log::error!("failed to open '{}': {}", source.display(), e);
        })
    }

    fn open_session(self) -> Result<ExcelReader> {
        let temp_dir = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let copy = PrivateCopy::create(&self.path, &temp_dir)
            .map_err(|e| ExcelError::initialization(&self.path, e))?;
        let file_name = copy.path().to_path_buf();

        // on any error below, dropping `copy` deletes the private file
        let mut workbook: Workbook = open_workbook_auto(&file_name)
            .map_err(|e| ExcelError::initialization(&self.path, e.into()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let sheet_count = sheet_names.len();
        if self.sheet_index >= sheet_count {
            return Err(ExcelError::InvalidSheetIndex {
                index: self.sheet_index,
                sheet_count,
            });
        }
        let sheet_name = sheet_names[self.sheet_index].clone();

        let values = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ExcelError::initialization(&self.path, e.into()))?;
        let formulas = workbook.worksheet_formula(&sheet_name).unwrap_or_else(|e| {
            log::warn!(
                "formulas of sheet '{}' unavailable, reading cached values: {}",
                sheet_name,
                e
            );
            Range::empty()
        });

        let sheet = SheetData::new(values, formulas);
        let row_size = sheet.physical_cells(0);

        let resources = Arc::new(Mutex::new(SessionResources {
            workbook: Some(workbook),
            copy,
            released: false,
        }));
        let guard = register_guard(&resources);

        let mut reader = ExcelReader {
            resources,
            guard,
            sheet,
            sheet_name,
            sheet_names,
            active_sheet_index: self.sheet_index,
            file_name,
            original_file_name: None,
            field_names: Vec::new(),
            row_size,
            iterator_start: 0,
            max_formula_depth: self.max_formula_depth,
            closed: false,
        };

        match self.headers {
            Some(headers) => reader.field_names = headers,
            None => {
                if reader.row_count() > 0 {
                    reader.field_names = reader.read_row(0)?;
                }
                reader.iterator_start = 1;
                reader.original_file_name = Some(self.path);
            }
        }

        log::debug!(
            "opened sheet '{}' of '{}': {} rows x {} columns",
            reader.sheet_name,
            reader.file_name.display(),
            reader.row_count(),
            reader.row_size
        );

        Ok(reader)
    }
}

/// Register a cleanup action that releases `resources` if the session is never closed
fn register_guard(resources: &Arc<Mutex<SessionResources>>) -> ResourceGuard {
    let resources = Arc::downgrade(resources);
    ResourceGuard::register(move || {
        let Some(resources) = resources.upgrade() else {
            return;
        };
        let mut resources = resources.lock();
        if resources.released {
            return;
        }
        if let Err(e) = resources.release() {
            log::warn!("{}", e);
        }
    })
}
