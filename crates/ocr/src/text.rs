use std::time::Duration;

use crate::config::{BackendKind, OcrConfig};
use crate::pipeline::PipelineError;
use crate::preprocess;
use crate::recognizer::tesseract_backend::TesseractRecognizer;
use crate::recognizer::vision_backend::VisionRecognizer;
use crate::recognizer::{OcrBackend, OcrError};

/// Turns image bytes into a transcript through one OCR backend.
pub struct TextExtractor {
    backend: Box<dyn OcrBackend>,
}

impl TextExtractor {
    pub fn new(backend: impl OcrBackend + 'static) -> Self {
        Self { backend: Box::new(backend) }
    }

    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let backend: Box<dyn OcrBackend> = match config.backend {
            BackendKind::Tesseract => {
                Box::new(TesseractRecognizer::new(&config.binary_path, &config.language))
            }
            BackendKind::Vision => {
                let key = config.api_key.as_deref().ok_or_else(|| {
                    OcrError::Unavailable("no API key configured for the vision backend".into())
                })?;
                Box::new(VisionRecognizer::new(
                    &config.endpoint,
                    key,
                    Duration::from_secs(config.timeout_secs),
                )?)
            }
        };
        Ok(Self { backend })
    }

    /// Binarize when the backend asks for it, then recognize. An empty
    /// transcript is a valid result.
    pub fn extract(&self, image_bytes: &[u8]) -> Result<String, PipelineError> {
        let text = if self.backend.needs_preprocessing() {
            let prepared = preprocess::prepare_for_ocr_from_bytes(image_bytes)?;
            self.backend.recognize(&prepared)?
        } else {
            self.backend.recognize(image_bytes)?
        };
        tracing::debug!(chars = text.len(), "OCR transcript received");
        Ok(text)
    }
}
