pub mod config;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod rules;
pub mod text;
pub(crate) mod util;

pub use config::{BackendKind, OcrConfig};
pub use extract::{FieldEngine, Layout};
pub use pipeline::{BatchOutcome, BillPipeline, PipelineError};
pub use preprocess::{prepare_for_ocr_from_bytes, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError};
pub use rules::{CompiledRules, MatchType, RuleError, RuleSet};
pub use text::TextExtractor;
