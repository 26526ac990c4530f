use serde::{Deserialize, Serialize};

/// Title tokens that are dropped from payee names.
pub const DEFAULT_HONORIFICS: &[&str] = &[
    "shri", "sri", "shree", "smt", "kumari", "kum", "mr", "mrs", "ms", "dr", "m/s", "messrs",
];

/// Whitespace-token filter that removes honorifics such as `Shri`, `M/s.` or
/// `Dr.` wherever they appear. Comparison ignores case and trailing `.`/`,`.
/// Applying it twice gives the same result as applying it once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Honorifics(Vec<String>);

impl Honorifics {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(tokens.into_iter().map(|t| normalize(t.as_ref())).collect())
    }

    pub fn is_honorific(&self, token: &str) -> bool {
        let t = normalize(token);
        !t.is_empty() && self.0.iter().any(|h| *h == t)
    }

    /// Drop honorific tokens and collapse runs of whitespace.
    pub fn strip(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|tok| !self.is_honorific(tok))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Honorifics {
    fn default() -> Self {
        Self::new(DEFAULT_HONORIFICS)
    }
}

fn normalize(token: &str) -> String {
    token.trim_end_matches(['.', ',']).to_lowercase()
}
