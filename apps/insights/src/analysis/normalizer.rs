use std::sync::Arc;

use crate::analysis::vocabulary::Vocabulary;

/// Canonicalizes near-duplicate phrases through the synonym table.
#[derive(Clone)]
pub struct Normalizer {
    vocabulary: Arc<Vocabulary>,
}

impl Normalizer {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    /// Lowercases, drops characters other than alphanumerics, whitespace,
    /// hyphens and periods, then maps through the synonym table.
    pub fn normalize(&self, phrase: &str) -> String {
        let cleaned = clean(phrase);
        match self.vocabulary.synonyms.get(&cleaned) {
            Some(canonical) => canonical.clone(),
            None => cleaned,
        }
    }
}

fn clean(phrase: &str) -> String {
    let kept: String = phrase
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '.')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
