//! Declarative rule tables consumed by [`crate::FieldEngine`].
//!
//! Every heuristic that is a list of phrases (grant-head spellings, purpose
//! keywords, payee phrasings and cleanups, line labels) lives here as data.
//! A deployment can replace any table from TOML without touching the engine.

use billscan_core::schema::{
    BILL_NO, DATE, DEPARTMENT_NAME, PURCHASE_ORDER_NO, TOTAL_AMOUNT,
};
use billscan_core::Honorifics;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::levenshtein_distance;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid regex in {table} rule '{pattern}': {source}")]
    InvalidRegex {
        table: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Payee pattern '{0}' has no capture group")]
    MissingCapture(String),
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MatchType {
    #[default]
    Contains,
    Exact,
    Regex,
    /// Any window of words in the text within the given similarity (0.0–1.0).
    Fuzzy {
        threshold: f32,
    },
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(MatchType::Contains),
            "exact" => Ok(MatchType::Exact),
            "regex" => Ok(MatchType::Regex),
            s if s.starts_with("fuzzy:") => {
                let threshold = s[6..]
                    .parse::<f32>()
                    .map_err(|_| "Invalid fuzzy threshold".to_string())?;
                Ok(MatchType::Fuzzy { threshold })
            }
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Contains => write!(f, "contains"),
            MatchType::Exact => write!(f, "exact"),
            MatchType::Regex => write!(f, "regex"),
            MatchType::Fuzzy { threshold } => write!(f, "fuzzy:{threshold}"),
        }
    }
}

impl TryFrom<String> for MatchType {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for MatchType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MatchType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MatchType::try_from(s).map_err(serde::de::Error::custom)
    }
}

/// `Label: value` line rule. The value is the text after the last colon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineLabelRule {
    pub field: String,
    /// Case-insensitive regex for the label, e.g. `Bill\s*No`.
    pub pattern: String,
    /// Characters removed from the value.
    #[serde(default)]
    pub strip: String,
}

/// Any of `spellings` found in the text yields `label`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpellingRule {
    pub label: String,
    pub spellings: Vec<String>,
    #[serde(default)]
    pub match_type: MatchType,
}

/// All of `all_of` present in the text yields `label`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordRule {
    pub label: String,
    pub all_of: Vec<String>,
    #[serde(default)]
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CleanupAction {
    /// Delete every match.
    Remove,
    /// Cut the text at the first match.
    Truncate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupRule {
    pub pattern: String,
    pub action: CleanupAction,
}

/// The complete set of tables for one deployment. Missing tables in a TOML
/// file fall back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleSet {
    pub line_labels: Vec<LineLabelRule>,
    pub grant_heads: Vec<SpellingRule>,
    pub grant_head_fallback: String,
    pub purposes: Vec<KeywordRule>,
    /// Regexes with one capture group around the payee name.
    pub payee_patterns: Vec<String>,
    pub payee_cleanup: Vec<CleanupRule>,
    pub honorifics: Honorifics,
}

impl Default for RuleSet {
    fn default() -> Self {
        let label = |field: &str, pattern: &str, strip: &str| LineLabelRule {
            field: field.to_string(),
            pattern: pattern.to_string(),
            strip: strip.to_string(),
        };
        let keywords = |label: &str, all_of: &[&str]| KeywordRule {
            label: label.to_string(),
            all_of: all_of.iter().map(|s| s.to_string()).collect(),
            match_type: MatchType::Contains,
        };
        let cleanup = |pattern: &str, action| CleanupRule { pattern: pattern.to_string(), action };

        Self {
            line_labels: vec![
                label(DEPARTMENT_NAME, r"Department\s*Name", ""),
                label(BILL_NO, r"Bill\s*No", ""),
                label(PURCHASE_ORDER_NO, r"Purchase\s*Order\s*No", ""),
                label(DATE, r"Date", ""),
                label(TOTAL_AMOUNT, r"Total\s*Amount", "%"),
            ],
            grant_heads: vec![SpellingRule {
                label: "TEQIP".to_string(),
                spellings: ["teqip", "tequip", "teqlp", "tequlp", "teq-ip", "tekip"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                match_type: MatchType::Contains,
            }],
            grant_head_fallback: "Not Mentioned".to_string(),
            purposes: vec![
                keywords("Industrial Visit", &["industry"]),
                keywords("NPTEL Python Course Fee", &["nptel", "python"]),
                keywords("NPTEL Course Fee", &["nptel"]),
                keywords("Workshop", &["workshop"]),
                keywords("Conference Registration", &["conference"]),
            ],
            payee_patterns: vec![
                r"(?i)payment\s+(?:made\s+)?to\s*[:\-]?\s*([^\n]+)".to_string(),
                r"(?i)party\s+payment\s+to\s+shri\.?\s+([^\n]+)".to_string(),
                r"(?i)\bA/s\.?\s+([^\n]+)".to_string(),
            ],
            payee_cleanup: vec![
                cleanup(r"(?i)\s+(?:for|towards|being)\s+(?:the\s+)?(?:purpose|payment|amount)\b", CleanupAction::Truncate),
                cleanup(r"(?i)\s+vide\s+(?:bill|invoice)\b", CleanupAction::Truncate),
                cleanup(r"(?i)\s+(?:rs\.?|inr)\s*[\d,]", CleanupAction::Truncate),
                cleanup(r"(?i)\bthe\s+sum\s+of\b", CleanupAction::Remove),
                cleanup(r"[:;,\-]+\s*$", CleanupAction::Remove),
            ],
            honorifics: Honorifics::default(),
        }
    }
}

impl RuleSet {
    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn compile(&self) -> Result<CompiledRules, RuleError> {
        let line_labels = self
            .line_labels
            .iter()
            .map(|r| -> Result<CompiledLabel, RuleError> {
                Ok(CompiledLabel {
                    field: r.field.clone(),
                    label: compile("line_labels", &format!("(?i){}", r.pattern))?,
                    strip: r.strip.chars().collect(),
                })
            })
            .collect::<Result<_, RuleError>>()?;

        let grant_heads = self
            .grant_heads
            .iter()
            .map(|r| -> Result<CompiledSpelling, RuleError> {
                let any_of = r
                    .spellings
                    .iter()
                    .map(|s| KeywordMatcher::new("grant_heads", s, &r.match_type))
                    .collect::<Result<_, _>>()?;
                Ok(CompiledSpelling { label: r.label.clone(), any_of })
            })
            .collect::<Result<_, RuleError>>()?;

        let purposes = self
            .purposes
            .iter()
            .map(|r| -> Result<CompiledKeywords, RuleError> {
                let all_of = r
                    .all_of
                    .iter()
                    .map(|s| KeywordMatcher::new("purposes", s, &r.match_type))
                    .collect::<Result<_, _>>()?;
                Ok(CompiledKeywords { label: r.label.clone(), all_of })
            })
            .collect::<Result<_, RuleError>>()?;

        let payee_patterns = self
            .payee_patterns
            .iter()
            .map(|p| -> Result<Regex, RuleError> {
                let re = compile("payee_patterns", p)?;
                if re.captures_len() < 2 {
                    return Err(RuleError::MissingCapture(p.clone()));
                }
                Ok(re)
            })
            .collect::<Result<_, RuleError>>()?;

        let payee_cleanup = self
            .payee_cleanup
            .iter()
            .map(|r| Ok::<_, RuleError>((compile("payee_cleanup", &r.pattern)?, r.action)))
            .collect::<Result<_, RuleError>>()?;

        Ok(CompiledRules {
            line_labels,
            grant_heads,
            grant_head_fallback: self.grant_head_fallback.clone(),
            purposes,
            payee_patterns,
            payee_cleanup,
            honorifics: self.honorifics.clone(),
        })
    }
}

fn compile(table: &'static str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
        table,
        pattern: pattern.to_string(),
        source,
    })
}

// ── Compiled form ────────────────────────────────────────────────────────────

/// One keyword with its match strategy, regex precompiled when needed.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    pattern: String,
    match_type: MatchType,
    compiled_regex: Option<Regex>,
}

impl KeywordMatcher {
    fn new(table: &'static str, pattern: &str, match_type: &MatchType) -> Result<Self, RuleError> {
        let compiled_regex = match match_type {
            // Matched against lower-cased text, so the pattern's case must not matter.
            MatchType::Regex => Some(compile(table, &format!("(?i){pattern}"))?),
            _ => None,
        };
        Ok(Self {
            pattern: pattern.to_lowercase(),
            match_type: match_type.clone(),
            compiled_regex,
        })
    }

    /// `text_lower` must already be lower-cased.
    pub fn matches(&self, text_lower: &str) -> bool {
        match &self.match_type {
            MatchType::Contains => text_lower.contains(&self.pattern),
            MatchType::Exact => text_lower.trim() == self.pattern,
            MatchType::Regex => self
                .compiled_regex
                .as_ref()
                .is_some_and(|re| re.is_match(text_lower)),
            MatchType::Fuzzy { threshold } => fuzzy_contains(text_lower, &self.pattern, *threshold),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledLabel {
    pub field: String,
    pub label: Regex,
    pub strip: Vec<char>,
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledSpelling {
    pub label: String,
    pub any_of: Vec<KeywordMatcher>,
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledKeywords {
    pub label: String,
    pub all_of: Vec<KeywordMatcher>,
}

#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub(crate) line_labels: Vec<CompiledLabel>,
    pub(crate) grant_heads: Vec<CompiledSpelling>,
    pub(crate) grant_head_fallback: String,
    pub(crate) purposes: Vec<CompiledKeywords>,
    pub(crate) payee_patterns: Vec<Regex>,
    pub(crate) payee_cleanup: Vec<(Regex, CleanupAction)>,
    pub(crate) honorifics: Honorifics,
}

impl CompiledRules {
    /// First line rule whose label occurs in `line`.
    pub fn line_label(&self, line: &str) -> Option<(&str, &[char])> {
        self.line_labels
            .iter()
            .find(|r| r.label.is_match(line))
            .map(|r| (r.field.as_str(), r.strip.as_slice()))
    }

    /// Label of the first spelling rule that occurs in `text_lower`.
    pub fn grant_head(&self, text_lower: &str) -> Option<&str> {
        self.grant_heads
            .iter()
            .find(|r| r.any_of.iter().any(|k| k.matches(text_lower)))
            .map(|r| r.label.as_str())
    }

    pub fn grant_head_fallback(&self) -> &str {
        &self.grant_head_fallback
    }

    /// Label of the first keyword rule fully present in `text_lower`.
    pub fn purpose(&self, text_lower: &str) -> Option<&str> {
        self.purposes
            .iter()
            .find(|r| !r.all_of.is_empty() && r.all_of.iter().all(|k| k.matches(text_lower)))
            .map(|r| r.label.as_str())
    }

    pub fn payee_patterns(&self) -> &[Regex] {
        &self.payee_patterns
    }

    /// Apply the cleanup table in order, then drop honorifics.
    pub fn clean_payee(&self, name: &str) -> String {
        let mut out = name.to_string();
        for (re, action) in &self.payee_cleanup {
            out = match action {
                CleanupAction::Remove => re.replace_all(&out, "").into_owned(),
                CleanupAction::Truncate => match re.find(&out) {
                    Some(m) => out[..m.start()].to_string(),
                    None => out,
                },
            };
        }
        self.honorifics.strip(&out)
    }

    pub fn honorifics(&self) -> &Honorifics {
        &self.honorifics
    }
}

fn fuzzy_score(s1: &str, s2: &str) -> f32 {
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein_distance(s1, s2) as f32 / max_len as f32)
}

/// Compare `pattern` against every run of words in `text` of the same length.
fn fuzzy_contains(text: &str, pattern: &str, threshold: f32) -> bool {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let width = pattern.split_whitespace().count().max(1);
    if words.len() < width {
        return false;
    }
    words
        .windows(width)
        .any(|w| fuzzy_score(&w.join(" "), pattern) >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> CompiledRules {
        RuleSet::default().compile().unwrap()
    }

    #[test]
    fn default_rules_compile() {
        let r = rules();
        assert_eq!(r.line_labels.len(), 5);
        assert_eq!(r.payee_patterns().len(), 3);
    }

    #[test]
    fn match_type_parses_and_displays() {
        assert_eq!("contains".parse::<MatchType>().unwrap(), MatchType::Contains);
        assert_eq!(
            "fuzzy:0.8".parse::<MatchType>().unwrap(),
            MatchType::Fuzzy { threshold: 0.8 }
        );
        assert!("soundex".parse::<MatchType>().is_err());
        assert_eq!(MatchType::Regex.to_string(), "regex");
    }

    #[test]
    fn line_label_first_rule_wins_and_ignores_case() {
        let r = rules();
        assert_eq!(r.line_label("BILL   NO : 12").map(|l| l.0), Some(BILL_NO));
        assert_eq!(r.line_label("Total Amount: 50%").map(|l| l.1), Some(&['%'][..]));
        assert_eq!(r.line_label("nothing here"), None);
    }

    #[test]
    fn grant_head_catches_misspellings() {
        let r = rules();
        assert_eq!(r.grant_head("under tequip-iii funds"), Some("TEQIP"));
        assert_eq!(r.grant_head("teqlp grant"), Some("TEQIP"));
        assert_eq!(r.grant_head("college development fund"), None);
        assert_eq!(r.grant_head_fallback(), "Not Mentioned");
    }

    #[test]
    fn purpose_rules_are_ordered() {
        let r = rules();
        assert_eq!(r.purpose("nptel python certification"), Some("NPTEL Python Course Fee"));
        assert_eq!(r.purpose("nptel java"), Some("NPTEL Course Fee"));
        assert_eq!(r.purpose("industry visit with nptel"), Some("Industrial Visit"));
        assert_eq!(r.purpose("stationery"), None);
    }

    #[test]
    fn clean_payee_truncates_boilerplate_and_titles() {
        let r = rules();
        assert_eq!(
            r.clean_payee("SHRI Ramesh Kumar towards payment of bill"),
            "Ramesh Kumar"
        );
        assert_eq!(r.clean_payee("M/s Sai Stationers Rs. 4,500"), "Sai Stationers");
        assert_eq!(r.clean_payee("Dr. Meena Rao vide bill no 12"), "Meena Rao");
        assert_eq!(r.clean_payee("Anil Traders -"), "Anil Traders");
    }

    #[test]
    fn fuzzy_keyword_tolerates_ocr_noise() {
        let k = KeywordMatcher::new("purposes", "workshop", &MatchType::Fuzzy { threshold: 0.8 })
            .unwrap();
        assert!(k.matches("two day w0rkshop on iot"));
        assert!(!k.matches("two day seminar on iot"));
    }

    #[test]
    fn regex_keyword() {
        let k = KeywordMatcher::new("purposes", r"\bfdp\b", &MatchType::Regex).unwrap();
        assert!(k.matches("fdp on ml"));
        assert!(!k.matches("fdpx"));
    }

    #[test]
    fn upper_case_regex_rule_from_toml_matches() {
        let rules = RuleSet::from_toml(
            r#"
            [[purposes]]
            label = "Faculty Development Programme"
            all_of = ['\bFDP\b']
            match_type = "regex"
            "#,
        )
        .unwrap()
        .compile()
        .unwrap();
        assert_eq!(
            rules.purpose("registration for fdp on machine learning"),
            Some("Faculty Development Programme")
        );
    }

    #[test]
    fn toml_replaces_only_given_tables() {
        let set = RuleSet::from_toml(
            r#"
            grant_head_fallback = "NA"

            [[purposes]]
            label = "Lab Consumables"
            all_of = ["chemical"]
            "#,
        )
        .unwrap();
        assert_eq!(set.grant_head_fallback, "NA");
        assert_eq!(set.purposes.len(), 1);
        assert_eq!(set.purposes[0].match_type, MatchType::Contains);
        assert_eq!(set.grant_heads, RuleSet::default().grant_heads);
    }

    #[test]
    fn toml_fuzzy_match_type() {
        let set = RuleSet::from_toml(
            r#"
            [[grant_heads]]
            label = "RUSA"
            spellings = ["rusa"]
            match_type = "fuzzy:0.75"
            "#,
        )
        .unwrap();
        assert_eq!(set.grant_heads[0].match_type, MatchType::Fuzzy { threshold: 0.75 });
    }

    #[test]
    fn invalid_regex_is_reported() {
        let set = RuleSet {
            payee_patterns: vec!["(unclosed".to_string()],
            ..RuleSet::default()
        };
        assert!(matches!(set.compile(), Err(RuleError::InvalidRegex { .. })));
    }

    #[test]
    fn payee_pattern_without_capture_is_rejected() {
        let set = RuleSet {
            payee_patterns: vec!["payment to".to_string()],
            ..RuleSet::default()
        };
        assert!(matches!(set.compile(), Err(RuleError::MissingCapture(_))));
    }

    #[test]
    fn fuzzy_score_identical_is_one() {
        assert_eq!(fuzzy_score("teqip", "teqip"), 1.0);
        assert_eq!(fuzzy_score("", ""), 1.0);
    }
}
