//! Drives one analysis request from postings to report.
//!
//! Flow: cache lookup → sanitize every posting → extract (delegate or
//! rule-based) → cache write. Nothing here returns an error: delegate and
//! cache failures degrade to a fallback or an emptier report.
//!
//! Sanitizing and rule-based extraction are CPU-bound and run inside
//! `tokio::task::spawn_blocking`, fanned out over rayon.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::analysis::aggregator::Aggregator;
use crate::analysis::categorizer::Categorizer;
use crate::analysis::delegate::{combine_texts, DelegateExtractor, COMBINED_TEXT_BUDGET};
use crate::analysis::extractor::RuleBasedExtractor;
use crate::analysis::normalizer::Normalizer;
use crate::analysis::sanitizer::Sanitizer;
use crate::analysis::vocabulary::Vocabulary;
use crate::cache::{CacheKey, CacheStats, ExtractionCache};
use crate::models::posting::RawPosting;
use crate::models::report::{CandidateTerm, ExtractionBackend, InsightReport};

/// Which extractor a pipeline runs, chosen once at startup.
#[derive(Clone)]
pub enum ExtractionMode {
    RuleBased,
    Delegate {
        extractor: DelegateExtractor,
        /// Run the rule-based path when the delegate fails or returns nothing.
        fallback: bool,
    },
}

impl ExtractionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionMode::RuleBased => "rule_based",
            ExtractionMode::Delegate { .. } => "delegate",
        }
    }
}

/// The CPU-bound stages. Shared with blocking tasks, so it sits behind an `Arc`.
struct RuleEngine {
    sanitizer: Sanitizer,
    extractor: RuleBasedExtractor,
    normalizer: Normalizer,
    aggregator: Aggregator,
}

impl RuleEngine {
    fn sanitize_all(&self, postings: &[RawPosting]) -> Vec<String> {
        postings
            .par_iter()
            .map(|p| self.sanitizer.sanitize(&p.analyzable_text()))
            .collect()
    }

    fn extract_and_aggregate(
        &self,
        postings: &[RawPosting],
        texts: &[String],
        searched_title: &str,
        classification_code: &str,
    ) -> InsightReport {
        let extracted: Vec<Vec<CandidateTerm>> = postings
            .par_iter()
            .zip(texts.par_iter())
            .map(|(posting, text)| {
                self.extractor
                    .extract(text)
                    .map(|candidate| CandidateTerm {
                        normalized_phrase: self.normalizer.normalize(&candidate.phrase),
                        source_sentence: candidate.sentence,
                        source_posting_id: posting.id.clone(),
                    })
                    .collect()
            })
            .collect();

        self.aggregator
            .aggregate(postings, extracted, searched_title, classification_code)
    }
}

pub struct InsightPipeline {
    engine: Arc<RuleEngine>,
    cache: ExtractionCache,
    mode: ExtractionMode,
}

impl InsightPipeline {
    pub fn new(
        vocabulary: Arc<Vocabulary>,
        cache: ExtractionCache,
        mode: ExtractionMode,
        min_support: usize,
    ) -> Self {
        Self {
            engine: Arc::new(RuleEngine {
                sanitizer: Sanitizer::new(),
                extractor: RuleBasedExtractor::new(vocabulary.clone()),
                normalizer: Normalizer::new(vocabulary.clone()),
                aggregator: Aggregator::new(
                    vocabulary.clone(),
                    Categorizer::new(vocabulary),
                    min_support,
                ),
            }),
            cache,
            mode,
        }
    }

    /// Produces the report for `postings`, serving it from cache when possible.
    pub async fn generate_report(
        &self,
        postings: &[RawPosting],
        searched_title: &str,
        classification_code: &str,
    ) -> InsightReport {
        if postings.is_empty() {
            info!("No postings for '{searched_title}' ({classification_code}); returning empty report");
            return InsightReport::empty(searched_title, classification_code, 0);
        }

        let key = CacheKey::for_report(classification_code, searched_title);
        if let Some(report) = self.cache.get(&key).await {
            info!("Serving cached analysis for '{searched_title}' ({classification_code})");
            return report;
        }

        info!(
            "Analyzing {} postings for '{searched_title}' ({classification_code}) with {} extraction",
            postings.len(),
            self.mode.name()
        );

        let postings: Arc<[RawPosting]> = postings.into();
        let report = match &self.mode {
            ExtractionMode::RuleBased => {
                self.rule_based(postings, None, searched_title, classification_code)
                    .await
            }
            ExtractionMode::Delegate {
                extractor,
                fallback,
            } => {
                self.delegated(
                    extractor,
                    *fallback,
                    postings,
                    searched_title,
                    classification_code,
                )
                .await
            }
        };

        info!(
            "Analysis complete for '{searched_title}': {} terms via {:?}",
            report.term_count(),
            report.extraction_backend
        );

        // A delegate-tagged report with no terms only comes from a failed call
        // with fallback disabled; that one is not worth remembering.
        let degraded = report.extraction_backend == ExtractionBackend::Delegate
            && report.term_count() == 0;
        if !degraded {
            self.cache
                .put(&key, classification_code, searched_title, &report)
                .await;
        }

        report
    }

    /// Sanitizes on the blocking pool. A failed task yields no text.
    async fn sanitize(&self, postings: Arc<[RawPosting]>) -> Vec<String> {
        let engine = self.engine.clone();
        let total = postings.len();
        tokio::task::spawn_blocking(move || engine.sanitize_all(&postings))
            .await
            .unwrap_or_else(|e| {
                warn!("spawn_blocking failed in sanitization: {e}");
                vec![String::new(); total]
            })
    }

    /// Rule-based path on the blocking pool. Reuses `texts` when the caller
    /// already sanitized.
    async fn rule_based(
        &self,
        postings: Arc<[RawPosting]>,
        texts: Option<Arc<[String]>>,
        searched_title: &str,
        classification_code: &str,
    ) -> InsightReport {
        let engine = self.engine.clone();
        let total = postings.len();
        let title = searched_title.to_string();
        let code = classification_code.to_string();

        tokio::task::spawn_blocking(move || {
            let texts = match texts {
                Some(texts) => texts,
                None => engine.sanitize_all(&postings).into(),
            };
            engine.extract_and_aggregate(&postings, &texts, &title, &code)
        })
        .await
        .unwrap_or_else(|e| {
            warn!("spawn_blocking failed in rule-based extraction: {e}");
            InsightReport::empty(searched_title, classification_code, total)
        })
    }

    async fn delegated(
        &self,
        extractor: &DelegateExtractor,
        fallback: bool,
        postings: Arc<[RawPosting]>,
        searched_title: &str,
        classification_code: &str,
    ) -> InsightReport {
        let texts: Arc<[String]> = self.sanitize(postings.clone()).await.into();
        let combined = combine_texts(texts.iter().map(String::as_str), COMBINED_TEXT_BUDGET);
        if combined.is_empty() {
            info!("No usable posting text for '{searched_title}'; skipping delegate call");
            return InsightReport::empty(searched_title, classification_code, postings.len());
        }

        match extractor.extract(&combined, searched_title).await {
            Ok(categories) => {
                let report = categories.into_report(
                    &self.engine.normalizer,
                    searched_title,
                    classification_code,
                    postings.len(),
                );
                if report.term_count() > 0 {
                    return report;
                }
                warn!("Delegate returned no usable terms for '{searched_title}'");
            }
            Err(e) => warn!("Delegate extraction failed for '{searched_title}': {e}"),
        }

        if fallback {
            info!("Falling back to rule-based extraction for '{searched_title}'");
            self.rule_based(postings, Some(texts), searched_title, classification_code)
                .await
        } else {
            let mut report =
                InsightReport::empty(searched_title, classification_code, postings.len());
            report.extraction_backend = ExtractionBackend::Delegate;
            report
        }
    }

    pub async fn get_cached_report(
        &self,
        classification_code: &str,
        title: &str,
    ) -> Option<InsightReport> {
        self.cache
            .get(&CacheKey::for_report(classification_code, title))
            .await
    }

    pub async fn put_cached_report(
        &self,
        classification_code: &str,
        title: &str,
        report: &InsightReport,
    ) -> bool {
        let key = CacheKey::for_report(classification_code, title);
        self.cache.put(&key, classification_code, title, report).await
    }

    /// Clears the entry for `(code, title)` when both are given, otherwise everything.
    pub async fn clear_cache(&self, classification_code: Option<&str>, title: Option<&str>) -> usize {
        match (classification_code, title) {
            (Some(code), Some(title)) => {
                self.cache
                    .clear(Some(&CacheKey::for_report(code, title)))
                    .await
            }
            _ => self.cache.clear(None).await,
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
