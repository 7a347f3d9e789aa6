//! Delegate extraction: hands the combined posting text to a generative
//! categorizer and reads its four-category JSON reply.
//!
//! The categorizer sits behind `GenerativeCategorizer` so the pipeline never
//! depends on a concrete HTTP client. Replies are parsed leniently: fenced
//! JSON first, then the first balanced `{...}` span in the text. Items that
//! do not look like `{term, count, context_sentences}` are skipped one by one.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::analysis::aggregator::{push_context, MAX_TERMS_PER_CATEGORY};
use crate::analysis::extractor::{MAX_PHRASE_CHARS, MIN_PHRASE_CHARS};
use crate::analysis::normalizer::Normalizer;
use crate::analysis::prompts::{categorize_prompt, categorize_system_prompt};
use crate::llm_client::{strip_json_fences, LlmClient, LlmError};
use crate::models::report::{AggregatedTerm, Category, ExtractionBackend, InsightReport};

/// Character budget for the text sent to the categorizer.
pub const COMBINED_TEXT_BUDGET: usize = 15_000;
pub const POSTING_SEPARATOR: &str = "\n\n--- JOB POSTING ---\n";

#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("delegate call failed: {0}")]
    Transport(#[from] LlmError),

    #[error("delegate reply contained no four-category JSON object")]
    Unparseable,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// A generative text service that answers one prompt with one text reply.
///
/// `LlmClient` is the production implementation; tests swap in doubles.
#[async_trait]
pub trait GenerativeCategorizer: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl GenerativeCategorizer for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.call_text(prompt, system).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Reply model
// ────────────────────────────────────────────────────────────────────────────

/// One item of a category array, as the categorizer reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateTerm {
    pub term: String,
    pub count: u32,
    pub context_sentences: Vec<String>,
}

impl DelegateTerm {
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let term = object.get("term")?.as_str()?.trim();
        if term.is_empty() {
            return None;
        }

        let count = match object.get("count") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .unwrap_or(1);

        let context_sentences = object
            .get("context_sentences")
            .and_then(Value::as_array)
            .map(|sentences| {
                sentences
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            term: term.to_string(),
            count: u32::try_from(count).unwrap_or(u32::MAX),
            context_sentences,
        })
    }
}

/// The categorizer's reply, keyed by category in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegateCategories {
    items: BTreeMap<Category, Vec<DelegateTerm>>,
}

impl DelegateCategories {
    /// Reads the four category arrays. `None` when the object carries none of them.
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut items: BTreeMap<Category, Vec<DelegateTerm>> =
            Category::ALL.into_iter().map(|c| (c, Vec::new())).collect();
        let mut recognized = false;

        for (key, entries) in object {
            let Some(category) = Category::from_key(&key.to_ascii_lowercase()) else {
                continue;
            };
            recognized = true;
            let entries = entries.as_array().map(Vec::as_slice).unwrap_or_default();
            let parsed: Vec<DelegateTerm> =
                entries.iter().filter_map(DelegateTerm::from_value).collect();
            if parsed.len() < entries.len() {
                debug!(
                    "Skipped {} malformed {} items in delegate reply",
                    entries.len() - parsed.len(),
                    category.as_str()
                );
            }
            items.insert(category, parsed);
        }

        recognized.then_some(Self { items })
    }

    pub fn get(&self, category: Category) -> &[DelegateTerm] {
        self.items.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.items.values().all(Vec::is_empty)
    }

    /// Normalizes the reply into report shape.
    ///
    /// Each term goes through the normalizer; duplicates within a category merge
    /// (highest count, first three distinct sentences); a term already placed in
    /// an earlier category is not repeated. Counts are clamped to `1..=total`,
    /// terms without context or outside the phrase length bounds are dropped.
    pub fn into_report(
        self,
        normalizer: &Normalizer,
        searched_title: &str,
        classification_code: &str,
        total_postings: usize,
    ) -> InsightReport {
        let mut report = InsightReport::empty(searched_title, classification_code, total_postings);
        report.extraction_backend = ExtractionBackend::Delegate;

        let ceiling = u32::try_from(total_postings.max(1)).unwrap_or(u32::MAX);
        let mut placed: HashSet<String> = HashSet::new();

        for (category, items) in self.items {
            let mut merged: IndexMap<String, AggregatedTerm> = IndexMap::new();
            for item in items {
                let term = normalizer.normalize(&item.term);
                let len = term.chars().count();
                if !(MIN_PHRASE_CHARS..=MAX_PHRASE_CHARS).contains(&len) || placed.contains(&term) {
                    continue;
                }
                let count = item.count.clamp(1, ceiling);
                let entry = merged
                    .entry(term.clone())
                    .or_insert_with(|| AggregatedTerm {
                        term,
                        count,
                        context_sentences: Vec::new(),
                    });
                entry.count = entry.count.max(count);
                for sentence in item.context_sentences {
                    push_context(&mut entry.context_sentences, sentence);
                }
            }

            let mut terms: Vec<AggregatedTerm> = merged
                .into_values()
                .filter(|t| !t.context_sentences.is_empty())
                .collect();
            terms.sort_by(|a, b| b.count.cmp(&a.count));
            terms.truncate(MAX_TERMS_PER_CATEGORY);

            placed.extend(terms.iter().map(|t| t.term.clone()));
            *report.terms_mut(category) = terms;
        }

        report
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extractor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DelegateExtractor {
    categorizer: Arc<dyn GenerativeCategorizer>,
}

impl DelegateExtractor {
    pub fn new(categorizer: Arc<dyn GenerativeCategorizer>) -> Self {
        Self { categorizer }
    }

    /// One categorizer call for the whole request. No retries.
    pub async fn extract(
        &self,
        combined_text: &str,
        searched_title: &str,
    ) -> Result<DelegateCategories, DelegateError> {
        let system = categorize_system_prompt();
        let prompt = categorize_prompt(searched_title, combined_text);

        let reply = self.categorizer.complete(&system, &prompt).await?;
        let categories = parse_reply(&reply)?;

        debug!(
            "Delegate reply parsed: {}",
            Category::ALL
                .iter()
                .map(|c| format!("{}={}", c.as_str(), categories.get(*c).len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(categories)
    }
}

/// Joins sanitized posting texts under the separator and cuts the result to
/// `budget` characters.
pub fn combine_texts<'a, I>(texts: I, budget: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut combined = String::new();
    for text in texts.into_iter().filter(|t| !t.is_empty()) {
        combined.push_str(POSTING_SEPARATOR);
        combined.push_str(text);
    }
    if let Some((cut, _)) = combined.char_indices().nth(budget) {
        combined.truncate(cut);
    }
    combined
}

/// Parses a categorizer reply: the whole (fence-stripped) text, else the first
/// balanced object embedded in it.
pub fn parse_reply(reply: &str) -> Result<DelegateCategories, DelegateError> {
    let value = serde_json::from_str::<Value>(strip_json_fences(reply))
        .ok()
        .filter(Value::is_object)
        .or_else(|| {
            first_balanced_object(reply).and_then(|span| serde_json::from_str::<Value>(span).ok())
        })
        .ok_or(DelegateError::Unparseable)?;

    DelegateCategories::from_value(&value).ok_or(DelegateError::Unparseable)
}

/// Finds the first `{...}` span whose braces balance, ignoring braces inside strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
