use std::path::{Path, PathBuf};
use thiserror::Error;

use billscan_core::{Record, TabularUnit};
use billscan_storage::{ExportError, SheetExporter};

use crate::extract::FieldEngine;
use crate::preprocess::PreprocessError;
use crate::recognizer::OcrError;
use crate::text::TextExtractor;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image could not be decoded: {0}")]
    Decode(#[from] PreprocessError),
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] OcrError),
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// The result of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub rows_exported: usize,
    pub destination: PathBuf,
}

/// Orchestrates: OCR → field extraction → one row per image → export.
///
/// Images are handled one at a time, in order. The first failure aborts the
/// batch before anything is written for it; rows exported by earlier batches
/// are left as they are.
pub struct BillPipeline {
    extractor: TextExtractor,
    engine: FieldEngine,
    exporter: SheetExporter,
}

impl BillPipeline {
    pub fn new(extractor: TextExtractor, engine: FieldEngine) -> Self {
        let exporter = SheetExporter::new().with_honorifics(engine.rules().honorifics().clone());
        Self { extractor, engine, exporter }
    }

    /// OCR and parse one image without exporting.
    pub fn parse_bytes(&self, data: &[u8]) -> Result<Record, PipelineError> {
        let transcript = self.extractor.extract(data)?;
        Ok(self.engine.parse(&transcript))
    }

    /// Process files on disk as one batch.
    pub fn process_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        destination: &Path,
        create_new: bool,
    ) -> Result<BatchOutcome, PipelineError> {
        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            tracing::info!("Processing bill image: {}", path.display());
            let bytes = std::fs::read(path)?;
            records.push(self.parse_bytes(&bytes)?);
        }
        self.export(&records, destination, create_new)
    }

    /// Process one in-memory image (an upload).
    pub fn process_bytes(
        &self,
        data: &[u8],
        destination: &Path,
        create_new: bool,
    ) -> Result<BatchOutcome, PipelineError> {
        let record = self.parse_bytes(data)?;
        self.export(std::slice::from_ref(&record), destination, create_new)
    }

    fn export(
        &self,
        records: &[Record],
        destination: &Path,
        create_new: bool,
    ) -> Result<BatchOutcome, PipelineError> {
        let unit = TabularUnit::concat(records.iter().map(TabularUnit::from_record))
            .map_err(ExportError::from)?;
        let Some(unit) = unit else {
            return Ok(BatchOutcome { rows_exported: 0, destination: destination.to_path_buf() });
        };
        let rows_exported = unit.len();
        self.exporter.export(unit, destination, create_new)?;
        tracing::info!(
            "Data exported to {} ({rows_exported} row(s))",
            destination.display()
        );
        Ok(BatchOutcome { rows_exported, destination: destination.to_path_buf() })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
