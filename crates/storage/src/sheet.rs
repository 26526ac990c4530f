use std::io::Write;
use std::path::{Path, PathBuf};

use billscan_core::schema::PAYMENT_MADE_TO;
use billscan_core::{FieldValue, Honorifics, Row, SchemaMismatch, TabularUnit};
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Display width applied to every column after each export.
pub const COLUMN_WIDTH: f64 = 30.0;

#[derive(Debug, Error)]
pub enum ExportError {
    /// The file exists but could not be read as a spreadsheet. A missing
    /// file is never reported here.
    #[error("Existing spreadsheet {path} is unreadable: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("Failed to build spreadsheet: {0}")]
    Write(#[from] XlsxError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    /// Rows on disk after the export.
    pub rows_total: usize,
    pub rows_appended: usize,
    /// Prior content, if any, was not carried over.
    pub started_fresh: bool,
}

/// Appends tabular units to `.xlsx` files.
///
/// Every export reads the whole sheet, merges in memory and replaces the file
/// in one rename. Concurrent exports to the same path are not coordinated;
/// the last writer wins.
#[derive(Debug, Clone)]
pub struct SheetExporter {
    honorifics: Honorifics,
    column_width: f64,
}

impl Default for SheetExporter {
    fn default() -> Self {
        Self { honorifics: Honorifics::default(), column_width: COLUMN_WIDTH }
    }
}

impl SheetExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_honorifics(mut self, honorifics: Honorifics) -> Self {
        self.honorifics = honorifics;
        self
    }

    pub fn export(
        &self,
        unit: TabularUnit,
        path: &Path,
        create_new: bool,
    ) -> Result<ExportSummary, ExportError> {
        let rows_appended = unit.len();
        let existing = if create_new { None } else { read_sheet(path)? };

        let (mut merged, started_fresh) = match existing {
            Some(existing) if existing.has_same_columns(unit.columns()) => {
                let mut merged = TabularUnit::new(unit.columns().to_vec());
                merged.append(existing)?;
                merged.append(unit)?;
                (merged, false)
            }
            Some(existing) => {
                tracing::warn!(
                    path = %path.display(),
                    found = ?existing.columns(),
                    expected = ?unit.columns(),
                    "existing spreadsheet has different columns; starting a fresh sheet"
                );
                (unit, true)
            }
            None => (unit, true),
        };

        let honorifics = &self.honorifics;
        merged.map_column(PAYMENT_MADE_TO, |value| match value {
            FieldValue::Text(s) => {
                let cleaned = honorifics.strip(&s);
                (!cleaned.is_empty()).then_some(FieldValue::Text(cleaned))
            }
            other => Some(other),
        });

        let bytes = render_workbook(&merged, self.column_width)?;
        replace_file(path, &bytes)?;

        tracing::info!(
            path = %path.display(),
            rows_appended,
            rows_total = merged.len(),
            started_fresh,
            "spreadsheet exported"
        );

        Ok(ExportSummary { rows_total: merged.len(), rows_appended, started_fresh })
    }
}

/// Read the first sheet at `path`: header row as columns, the rest as rows.
/// `Ok(None)` when the file does not exist.
pub fn read_sheet(path: &Path) -> Result<Option<TabularUnit>, ExportError> {
    if !path.exists() {
        return Ok(None);
    }
    let corrupt = |message: String| ExportError::Corrupt { path: path.to_path_buf(), message };

    let mut workbook = open_workbook_auto(path).map_err(|e| corrupt(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| corrupt("workbook has no sheets".to_string()))?
        .map_err(|e| corrupt(e.to_string()))?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .map(|c| c.to_string().trim().to_string())
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };
    // Trailing blank header cells are not columns.
    let width = columns.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    let mut unit = TabularUnit::new(columns[..width].to_vec());

    for row in rows {
        let mut cells: Row = row.iter().take(width).map(cell_value).collect();
        cells.resize(width, None);
        if cells.iter().all(Option::is_none) {
            continue;
        }
        unit.push_row(cells)?;
    }
    Ok(Some(unit))
}

fn cell_value(cell: &Data) -> Option<FieldValue> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(FieldValue::Text(s.clone())),
        Data::Int(n) => Some(FieldValue::Amount(*n)),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(FieldValue::Amount(*f as i64)),
        other => Some(FieldValue::Text(other.to_string())),
    }
}

fn render_workbook(unit: &TabularUnit, column_width: f64) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = Format::new().set_bold();

    for (col, name) in unit.columns().iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, name, &header)?;
        sheet.set_column_width(col, column_width)?;
    }

    for (idx, row) in unit.rows().iter().enumerate() {
        let r = idx as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Some(FieldValue::Text(s)) => sheet.write_string(r, col, s)?,
                Some(FieldValue::Amount(n)) => sheet.write_number(r, col, *n as f64)?,
                None => continue,
            };
        }
    }

    workbook.save_to_buffer()
}

/// Write to a sibling temp file and rename it over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Names of the `.xlsx` files directly inside `dir`, sorted.
pub fn list_spreadsheets(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.to_lowercase().ends_with(".xlsx") {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
