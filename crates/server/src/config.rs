use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use billscan_ocr::{CompiledRules, Layout, OcrConfig, RuleSet};

pub const DEFAULT_CONFIG_PATH: &str = "billscan.toml";

/// Runtime settings for the `billscan` binary, read from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the spreadsheets offered to users.
    pub excel_dir: PathBuf,
    /// Where uploaded images are kept.
    pub upload_dir: PathBuf,
    pub bind: String,
    pub layout: Layout,
    /// Optional TOML file replacing the built-in rule tables.
    pub rules: Option<PathBuf>,
    /// Environment variable holding the Vision API key.
    pub api_key_env: String,
    pub ocr: OcrConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            excel_dir: PathBuf::from("excel_files"),
            upload_dir: PathBuf::from("uploads"),
            bind: "127.0.0.1:5000".to_string(),
            layout: Layout::default(),
            rules: None,
            api_key_env: "GOOGLE_VISION_API_KEY".to_string(),
            ocr: OcrConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read `path`. A missing file yields defaults unless `required` is set.
    pub fn load(path: &Path, required: bool) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Fill `ocr.api_key` from the configured variable when the file left it empty.
    pub fn resolve_api_key(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.ocr.api_key.is_none() {
            self.ocr.api_key = lookup(&self.api_key_env).filter(|k| !k.trim().is_empty());
        }
    }

    /// Load and compile the rule tables (built-in unless `rules` names a file).
    pub fn compiled_rules(&self) -> anyhow::Result<CompiledRules> {
        let rule_set = match &self.rules {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading rules {}", path.display()))?;
                RuleSet::from_toml(&content)
                    .with_context(|| format!("invalid rules {}", path.display()))?
            }
            None => RuleSet::default(),
        };
        Ok(rule_set.compile()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billscan_ocr::BackendKind;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.excel_dir, PathBuf::from("excel_files"));
        assert_eq!(cfg.layout, Layout::PaymentVoucher);
        assert_eq!(cfg.ocr.backend, BackendKind::Tesseract);
    }

    #[test]
    fn parses_full_config() {
        let cfg = AppConfig::from_toml(
            r#"
excel_dir = "/srv/sheets"
bind = "0.0.0.0:8080"
layout = "bill_register"
rules = "rules.toml"

[ocr]
backend = "vision"
timeout_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.excel_dir, PathBuf::from("/srv/sheets"));
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.layout, Layout::BillRegister);
        assert_eq!(cfg.rules, Some(PathBuf::from("rules.toml")));
        assert_eq!(cfg.ocr.backend, BackendKind::Vision);
        assert_eq!(cfg.ocr.timeout_secs, 10);
    }

    #[test]
    fn missing_optional_file_is_default_but_required_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(AppConfig::load(&path, false).is_ok());
        assert!(AppConfig::load(&path, true).is_err());
    }

    #[test]
    fn api_key_comes_from_named_variable() {
        let mut cfg = AppConfig::from_toml("api_key_env = \"MY_KEY\"").unwrap();
        cfg.resolve_api_key(|name| (name == "MY_KEY").then(|| "secret".to_string()));
        assert_eq!(cfg.ocr.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn api_key_in_file_wins() {
        let mut cfg = AppConfig::from_toml("[ocr]\napi_key = \"from-file\"").unwrap();
        cfg.resolve_api_key(|_| Some("from-env".to_string()));
        assert_eq!(cfg.ocr.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn bad_rules_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.toml");
        std::fs::write(&rules, "payee_patterns = ['(unclosed']\n").unwrap();
        let cfg = AppConfig { rules: Some(rules), ..AppConfig::default() };
        assert!(cfg.compiled_rules().is_err());
    }
}
