//! Keyword scoring that places each term in one of the four categories.
//!
//! Per category: +3 for every keyword found in the term, +1 for every keyword
//! found in the joined context, plus the phrase bonus when one of its markers
//! shows up anywhere. Highest score wins; a tie at the top, or no signal at
//! all, falls back to `Responsibilities`.

use std::sync::Arc;

use crate::analysis::vocabulary::Vocabulary;
use crate::models::report::Category;

const TERM_WEIGHT: u32 = 3;
const CONTEXT_WEIGHT: u32 = 1;

#[derive(Clone)]
pub struct Categorizer {
    vocabulary: Arc<Vocabulary>,
}

impl Categorizer {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn categorize(&self, term: &str, context_sentences: &[String]) -> Category {
        let scores = self.scores(term, context_sentences);
        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        if best == 0 {
            return Category::Responsibilities;
        }

        let mut leaders = scores.iter().filter(|(_, s)| *s == best);
        match (leaders.next(), leaders.next()) {
            (Some((category, _)), None) => *category,
            _ => Category::Responsibilities,
        }
    }

    /// Raw score per category, canonical order.
    pub fn scores(&self, term: &str, context_sentences: &[String]) -> [(Category, u32); 4] {
        let term = term.to_lowercase();
        let context = context_sentences.join(" ").to_lowercase();
        let combined = format!("{term} {context}");

        Category::ALL.map(|category| {
            let keywords = self.vocabulary.category_keywords.for_category(category);
            let mut score = 0;
            for keyword in keywords {
                let keyword = keyword.to_lowercase();
                if contains_phrase(&term, &keyword) {
                    score += TERM_WEIGHT;
                }
                if contains_phrase(&context, &keyword) {
                    score += CONTEXT_WEIGHT;
                }
            }

            for bonus in self
                .vocabulary
                .phrase_bonuses
                .iter()
                .filter(|b| b.category == category)
            {
                if bonus
                    .markers
                    .iter()
                    .any(|m| contains_phrase(&combined, &m.to_lowercase()))
                {
                    score += bonus.bonus;
                }
            }

            (category, score)
        })
    }
}

/// True when `needle` occurs in `haystack` on word boundaries.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
