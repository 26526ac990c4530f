use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local Tesseract binary over a binarized image.
    #[default]
    Tesseract,
    /// Google Cloud Vision text detection over the raw upload.
    Vision,
}

/// Everything a [`crate::TextExtractor`] needs to build its backend.
///
/// Credentials and binary locations are passed in here; nothing in this crate
/// consults the process environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub backend: BackendKind,
    /// Tesseract executable; a bare name is resolved through `PATH`.
    pub binary_path: PathBuf,
    /// Tesseract language pack(s), e.g. `eng` or `eng+hin`.
    pub language: String,
    /// API key for the remote backend.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Tesseract,
            binary_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            api_key: None,
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            timeout_secs: 60,
        }
    }
}
