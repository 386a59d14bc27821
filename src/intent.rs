//! Keyword routing between the coder and admin prompt templates.

use crate::models::Intent;

/// Phrases that route a request to the coder template.
pub const DEFAULT_CODER_PHRASES: &[&str] = &[
    "write code",
    "create script",
    "generate file",
    "napisz kod",
    "stwórz plik",
    "napisz skrypt",
    "program in",
    "python script",
    "bash script",
    "html file",
];

/// Case-insensitive substring match against a phrase list.
///
/// Any match selects [`Intent::Coder`]; no match selects [`Intent::Admin`].
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    phrases: Vec<String>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::with_phrases(DEFAULT_CODER_PHRASES.iter().copied())
    }
}

impl IntentClassifier {
    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// Built-in phrases plus `extra`.
    pub fn with_extra_phrases(extra: &[String]) -> Self {
        Self::with_phrases(
            DEFAULT_CODER_PHRASES
                .iter()
                .map(|p| p.to_string())
                .chain(extra.iter().cloned()),
        )
    }

    pub fn classify(&self, query: &str) -> Intent {
        let lowered = query.to_lowercase();
        if self.phrases.iter().any(|p| lowered.contains(p.as_str())) {
            Intent::Coder
        } else {
            Intent::Admin
        }
    }
}
