use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine ran and reported a failure. Never retried.
    #[error("OCR service error: {0}")]
    Service(String),
    #[error("OCR backend unavailable: {0}")]
    Unavailable(String),
    #[error("OCR transport error: {0}")]
    Transport(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstraction over an OCR backend.
/// Implementations accept image bytes and return the recognized text; an
/// engine that finds nothing returns an empty string rather than an error.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;

    /// Whether input should be binarized before it reaches [`Self::recognize`].
    fn needs_preprocessing(&self) -> bool {
        false
    }
}

impl<B: OcrBackend + ?Sized> OcrBackend for Box<B> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }

    fn needs_preprocessing(&self) -> bool {
        (**self).needs_preprocessing()
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string, or a pre-set service error, for every image.
pub struct MockRecognizer {
    result: Result<String, String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { result: Ok(text.into()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { result: Err(message.into()) }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        self.result.clone().map_err(OcrError::Service)
    }
}

// ── Tesseract backend (system binary) ─────────────────────────────────────────

pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use std::io::Write;
    use std::path::PathBuf;
    use std::process::{Command, Stdio};

    /// Runs `<binary> stdin stdout -l <lang>` and feeds the image over stdin.
    pub struct TesseractRecognizer {
        binary: PathBuf,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(binary: impl Into<PathBuf>, lang: &str) -> Self {
            Self { binary: binary.into(), lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut child = Command::new(&self.binary)
                .args(["stdin", "stdout", "-l", &self.lang])
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => OcrError::Unavailable(format!(
                        "{} not found (install tesseract-ocr or set binary_path)",
                        self.binary.display()
                    )),
                    _ => OcrError::Io(e),
                })?;

            // Tesseract may exit before draining stdin (bad language, bad
            // image); its exit status and stderr take precedence over EPIPE.
            let written = match child.stdin.take() {
                Some(mut stdin) => stdin.write_all(image_bytes),
                None => Ok(()),
            };
            let output = child.wait_with_output()?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(OcrError::Service(format!("tesseract failed: {}", stderr.trim())));
            }
            written?;
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }

        fn needs_preprocessing(&self) -> bool {
            true
        }
    }
}

// ── Google Cloud Vision backend (remote) ──────────────────────────────────────

pub mod vision_backend {
    use super::{OcrBackend, OcrError};
    use base64::Engine as _;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize)]
    struct AnnotateRequest {
        requests: Vec<AnnotateImageRequest>,
    }

    #[derive(Serialize)]
    struct AnnotateImageRequest {
        image: ImageContent,
        features: Vec<Feature>,
    }

    #[derive(Serialize)]
    struct ImageContent {
        content: String,
    }

    #[derive(Serialize)]
    struct Feature {
        #[serde(rename = "type")]
        kind: &'static str,
    }

    #[derive(Debug, Deserialize)]
    pub(crate) struct AnnotateResponse {
        #[serde(default)]
        responses: Vec<AnnotateImageResponse>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AnnotateImageResponse {
        #[serde(default)]
        text_annotations: Vec<EntityAnnotation>,
        error: Option<Status>,
    }

    #[derive(Debug, Deserialize)]
    struct EntityAnnotation {
        #[serde(default)]
        description: String,
    }

    #[derive(Debug, Deserialize)]
    struct Status {
        #[serde(default)]
        message: String,
    }

    /// The first text annotation is the full-page transcript.
    pub(crate) fn transcript_from_response(resp: AnnotateResponse) -> Result<String, OcrError> {
        let Some(first) = resp.responses.into_iter().next() else {
            return Ok(String::new());
        };
        if let Some(status) = first.error.filter(|s| !s.message.is_empty()) {
            return Err(OcrError::Service(status.message));
        }
        Ok(first
            .text_annotations
            .into_iter()
            .next()
            .map(|a| a.description)
            .unwrap_or_default())
    }

    pub struct VisionRecognizer {
        client: reqwest::blocking::Client,
        endpoint: String,
        api_key: String,
    }

    impl VisionRecognizer {
        pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, OcrError> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| OcrError::Transport(e.to_string()))?;
            Ok(Self {
                client,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
            })
        }
    }

    impl OcrBackend for VisionRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let body = AnnotateRequest {
                requests: vec![AnnotateImageRequest {
                    image: ImageContent {
                        content: base64::engine::general_purpose::STANDARD.encode(image_bytes),
                    },
                    features: vec![Feature { kind: "TEXT_DETECTION" }],
                }],
            };

            let response = self
                .client
                .post(&self.endpoint)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .map_err(|e| OcrError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().unwrap_or_default();
                return Err(OcrError::Service(format!("HTTP {status}: {}", text.trim())));
            }

            let parsed: AnnotateResponse = response
                .json()
                .map_err(|e| OcrError::Transport(format!("invalid response body: {e}")))?;
            transcript_from_response(parsed)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn parse(json: &str) -> Result<String, OcrError> {
            transcript_from_response(serde_json::from_str(json).unwrap())
        }

        #[test]
        fn first_annotation_is_transcript() {
            let json = r#"{"responses":[{"textAnnotations":[
                {"description":"PAYMENT VOUCHER\nTotal Rs. 100"},
                {"description":"PAYMENT"}
            ]}]}"#;
            assert_eq!(parse(json).unwrap(), "PAYMENT VOUCHER\nTotal Rs. 100");
        }

        #[test]
        fn no_annotations_is_empty_transcript() {
            assert_eq!(parse(r#"{"responses":[{}]}"#).unwrap(), "");
            assert_eq!(parse(r#"{}"#).unwrap(), "");
        }

        #[test]
        fn service_error_message_is_surfaced() {
            let json = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
            match parse(json) {
                Err(OcrError::Service(msg)) => assert_eq!(msg, "Bad image data."),
                other => panic!("expected service error, got {other:?}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("PAYMENT VOUCHER\nTotal Rs. 500");
        assert_eq!(r.recognize(b"fake image data").unwrap(), "PAYMENT VOUCHER\nTotal Rs. 500");
        assert!(!r.needs_preprocessing());
    }

    #[test]
    fn mock_failure_is_service_error() {
        let r = MockRecognizer::failing("quota exceeded");
        match r.recognize(b"") {
            Err(OcrError::Service(msg)) => assert_eq!(msg, "quota exceeded"),
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn missing_tesseract_binary_is_unavailable() {
        let r = tesseract_backend::TesseractRecognizer::new("/nonexistent/tesseract-bin", "eng");
        assert!(r.needs_preprocessing());
        assert!(matches!(r.recognize(b"x"), Err(OcrError::Unavailable(_))));
    }

    #[cfg(unix)]
    fn fake_tesseract(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn tesseract_early_exit_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(dir.path(), "echo \"Failed loading language 'xyz'\" >&2\nexit 1");
        let r = tesseract_backend::TesseractRecognizer::new(bin, "xyz");

        // Larger than a pipe buffer, so the write hits a closed pipe.
        let image = vec![0u8; 4 * 1024 * 1024];
        match r.recognize(&image) {
            Err(OcrError::Service(msg)) => assert!(msg.contains("Failed loading language"), "{msg}"),
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn tesseract_stdout_is_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(dir.path(), "cat >/dev/null\necho 'Total Rs. 500'");
        let r = tesseract_backend::TesseractRecognizer::new(bin, "eng");
        assert_eq!(r.recognize(b"png bytes").unwrap().trim(), "Total Rs. 500");
    }

    #[test]
    fn boxed_backend_delegates() {
        let r: Box<dyn OcrBackend> = Box::new(MockRecognizer::new("hello"));
        assert_eq!(r.recognize(b"").unwrap(), "hello");
    }
}
