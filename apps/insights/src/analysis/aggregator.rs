//! Cross-posting aggregation: count, filter, categorize, rank.
//!
//! Work happens in two steps so postings can be processed in parallel:
//! `PostingTerms::collect` builds each posting's distinct term set on its own,
//! then the merge step folds those sets in posting order.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::analysis::categorizer::Categorizer;
use crate::analysis::extractor::{MAX_PHRASE_CHARS, MIN_PHRASE_CHARS};
use crate::analysis::vocabulary::Vocabulary;
use crate::models::posting::RawPosting;
use crate::models::report::{AggregatedTerm, CandidateTerm, Category, InsightReport};

pub const MAX_TERMS_PER_CATEGORY: usize = 15;
pub const MAX_CONTEXT_SENTENCES: usize = 3;
pub const DEFAULT_MIN_SUPPORT: usize = 2;

/// One posting's distinct terms, each with its first few sentences.
#[derive(Debug, Clone, Default)]
pub struct PostingTerms {
    terms: IndexMap<String, Vec<String>>,
}

impl PostingTerms {
    /// Collapses repeats so a term counts once for this posting.
    pub fn collect<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = CandidateTerm>,
    {
        let mut terms: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut posting_id: Option<String> = None;
        for candidate in candidates {
            if candidate.normalized_phrase.is_empty() {
                continue;
            }
            posting_id.get_or_insert(candidate.source_posting_id);
            let sentences = terms.entry(candidate.normalized_phrase).or_default();
            push_context(sentences, candidate.source_sentence);
        }
        if let Some(id) = &posting_id {
            trace!("Posting {id} contributed {} distinct terms", terms.len());
        }
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Default)]
struct Tally {
    count: u32,
    contexts: Vec<String>,
}

pub struct Aggregator {
    categorizer: Categorizer,
    generic_role_words: HashSet<String>,
    min_support: usize,
}

impl Aggregator {
    pub fn new(vocabulary: Arc<Vocabulary>, categorizer: Categorizer, min_support: usize) -> Self {
        Self {
            generic_role_words: vocabulary
                .generic_role_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
            categorizer,
            min_support: min_support.max(1),
        }
    }

    /// Builds a report from per-posting candidates (`extracted[i]` belongs to `postings[i]`).
    pub fn aggregate(
        &self,
        postings: &[RawPosting],
        extracted: Vec<Vec<CandidateTerm>>,
        searched_title: &str,
        classification_code: &str,
    ) -> InsightReport {
        let partitions: Vec<PostingTerms> = extracted
            .into_par_iter()
            .map(PostingTerms::collect)
            .collect();
        self.merge(postings.len(), &partitions, searched_title, classification_code)
    }

    /// Folds per-posting term sets in posting order.
    fn merge(
        &self,
        total_postings: usize,
        partitions: &[PostingTerms],
        searched_title: &str,
        classification_code: &str,
    ) -> InsightReport {
        let mut report = InsightReport::empty(searched_title, classification_code, total_postings);
        if total_postings == 0 {
            return report;
        }

        let mut tallies: IndexMap<&str, Tally> = IndexMap::new();
        for partition in partitions {
            for (term, sentences) in &partition.terms {
                let tally = tallies.entry(term.as_str()).or_default();
                tally.count += 1;
                for sentence in sentences {
                    push_context(&mut tally.contexts, sentence.clone());
                }
            }
        }

        let contributing = partitions.iter().filter(|p| !p.is_empty()).count();
        let threshold = self.min_support.min(contributing.max(1));
        debug!(
            "Merged {} distinct terms from {contributing} contributing postings (min support {threshold})",
            tallies.len()
        );

        for (term, tally) in tallies {
            if (tally.count as usize) < threshold
                || tally.contexts.is_empty()
                || !self.is_reportable(term)
            {
                continue;
            }
            let category = self.categorizer.categorize(term, &tally.contexts);
            report.terms_mut(category).push(AggregatedTerm {
                term: term.to_string(),
                count: tally.count,
                context_sentences: tally.contexts,
            });
        }

        for category in Category::ALL {
            let terms = report.terms_mut(category);
            // Stable: ties keep first-seen order.
            terms.sort_by(|a, b| b.count.cmp(&a.count));
            terms.truncate(MAX_TERMS_PER_CATEGORY);
        }

        report
    }

    fn is_reportable(&self, term: &str) -> bool {
        let len = term.chars().count();
        if !(MIN_PHRASE_CHARS..=MAX_PHRASE_CHARS).contains(&len) {
            return false;
        }
        !term
            .split_whitespace()
            .all(|word| self.generic_role_words.contains(word))
    }
}

pub(crate) fn push_context(contexts: &mut Vec<String>, sentence: String) {
    if contexts.len() < MAX_CONTEXT_SENTENCES && !sentence.is_empty() && !contexts.contains(&sentence) {
        contexts.push(sentence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aggregator(min_support: usize) -> Aggregator {
        let vocab = Arc::new(Vocabulary::default());
        Aggregator::new(vocab.clone(), Categorizer::new(vocab), min_support)
    }

    fn candidate(posting: &str, phrase: &str, sentence: &str) -> CandidateTerm {
        CandidateTerm {
            normalized_phrase: phrase.to_string(),
            source_sentence: sentence.to_string(),
            source_posting_id: posting.to_string(),
        }
    }

    fn postings(n: usize) -> Vec<RawPosting> {
        (0..n).map(|i| RawPosting::new(format!("p{i}"), "text")).collect()
    }

    #[test]
    fn test_repeats_within_posting_count_once() {
        let extracted = vec![
            vec![
                candidate("p0", "coordinating patient care", "Sentence one here."),
                candidate("p0", "coordinating patient care", "Sentence two here."),
            ],
            vec![candidate("p1", "coordinating patient care", "Sentence three here.")],
        ];
        let report = aggregator(2).aggregate(&postings(2), extracted, "Nurse", "29-1141.00");
        let term = &report.responsibilities[0];
        assert_eq!(term.count, 2);
        assert_eq!(
            term.context_sentences,
            vec!["Sentence one here.", "Sentence two here.", "Sentence three here."]
        );
    }

    #[test]
    fn test_context_sentences_capped_at_three_distinct() {
        let extracted: Vec<Vec<CandidateTerm>> = (0..5)
            .map(|i| {
                vec![
                    candidate("p", "maintaining patient records", "Same sentence."),
                    candidate("p", "maintaining patient records", &format!("Sentence {i}.")),
                ]
            })
            .collect();
        let report = aggregator(2).aggregate(&postings(5), extracted, "Clerk", "43-4071.00");
        let term = &report.responsibilities[0];
        assert_eq!(term.count, 5);
        assert_eq!(
            term.context_sentences,
            vec!["Same sentence.", "Sentence 0.", "Sentence 1."]
        );
    }

    #[test]
    fn test_single_posting_terms_dropped_when_support_available() {
        let extracted = vec![
            vec![
                candidate("p0", "installing and bending conduit", "Bend conduit daily."),
                candidate("p0", "troubleshooting control panels", "Troubleshoot panels."),
            ],
            vec![candidate("p1", "installing and bending conduit", "Install conduit.")],
        ];
        let report = aggregator(2).aggregate(&postings(2), extracted, "Electrician", "47-2111.00");
        assert!(report.category_of("installing and bending conduit").is_some());
        assert!(report.category_of("troubleshooting control panels").is_none());
    }

    #[test]
    fn test_single_contributing_posting_lowers_threshold() {
        let extracted = vec![vec![candidate(
            "p0",
            "installing and bending conduit",
            "Bend conduit daily.",
        )]];
        let report = aggregator(2).aggregate(&postings(1), extracted, "Electrician", "47-2111.00");
        assert_eq!(report.responsibilities.len(), 1);
    }

    #[test]
    fn test_short_and_generic_terms_dropped() {
        let extracted: Vec<Vec<CandidateTerm>> = (0..2)
            .map(|i| {
                vec![
                    candidate("p", "run wire", "Run wire."),
                    candidate("p", "registered nurse", "Registered nurse wanted."),
                    candidate("p", "monitoring vital signs and patient status", &format!("s{i}")),
                ]
            })
            .collect();
        let report = aggregator(2).aggregate(&postings(2), extracted, "Nurse", "29-1141.00");
        assert_eq!(report.term_count(), 1);
        assert!(report
            .category_of("monitoring vital signs and patient status")
            .is_some());
    }

    #[test]
    fn test_sorted_by_count_stable_on_ties() {
        let phrases = [
            "alpha work activity one",
            "bravo work activity two",
            "charlie work activity three",
        ];
        // counts: alpha 2, bravo 3, charlie 2
        let extracted = vec![
            vec![candidate("p0", phrases[0], "a"), candidate("p0", phrases[1], "b")],
            vec![candidate("p1", phrases[1], "b"), candidate("p1", phrases[2], "c")],
            vec![
                candidate("p2", phrases[0], "a"),
                candidate("p2", phrases[1], "b"),
                candidate("p2", phrases[2], "c"),
            ],
        ];
        let report = aggregator(2).aggregate(&postings(3), extracted, "X", "00-0000.00");
        let order: Vec<&str> = report.responsibilities.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(order, vec![phrases[1], phrases[0], phrases[2]]);
    }

    #[test]
    fn test_truncates_to_fifteen_per_category() {
        let extracted: Vec<Vec<CandidateTerm>> = (0..2)
            .map(|_| {
                (0..25)
                    .map(|i| candidate("p", &format!("general work activity {i:02}"), "ctx"))
                    .collect()
            })
            .collect();
        let report = aggregator(2).aggregate(&postings(2), extracted, "X", "00-0000.00");
        assert_eq!(report.responsibilities.len(), MAX_TERMS_PER_CATEGORY);
        assert_eq!(report.responsibilities[0].term, "general work activity 00");
    }

    #[test]
    fn test_terms_without_context_dropped() {
        let extracted: Vec<Vec<CandidateTerm>> = (0..2)
            .map(|_| vec![candidate("p", "maintaining patient records", "")])
            .collect();
        let report = aggregator(2).aggregate(&postings(2), extracted, "X", "00-0000.00");
        assert_eq!(report.term_count(), 0);
    }

    #[test]
    fn test_empty_postings_short_circuit() {
        let report = aggregator(2).aggregate(&[], vec![], "Nurse", "29-1141.00");
        assert_eq!(report.total_postings_analyzed, 0);
        assert_eq!(report.term_count(), 0);
    }

    #[test]
    fn test_total_counts_postings_without_candidates() {
        let extracted = vec![vec![], vec![], vec![]];
        let report = aggregator(2).aggregate(&postings(3), extracted, "Nurse", "29-1141.00");
        assert_eq!(report.total_postings_analyzed, 3);
        assert_eq!(report.term_count(), 0);
    }

    const POOL: &[&str] = &[
        "coordinating patient care",
        "maintaining patient records",
        "installing and bending conduit",
        "python programming experience",
        "bachelors degree required",
        "flexible remote schedule",
        "monitoring vital signs daily",
        "troubleshooting control panels",
        "preparing monthly budget reports",
        "supervising warehouse staff",
        "operating forklift equipment",
        "reviewing safety procedures",
        "documenting treatment plans",
        "scheduling patient appointments",
        "analyzing financial data sets",
        "developing web applications",
        "testing software releases",
        "managing vendor contracts",
        "training new team members",
        "repairing hvac equipment",
    ];

    proptest! {
        #[test]
        fn prop_report_respects_bounds(
            picks in prop::collection::vec(
                prop::collection::vec((0..POOL.len(), 0usize..5), 0..30),
                0..8,
            )
        ) {
            let total = picks.len();
            let extracted: Vec<Vec<CandidateTerm>> = picks
                .iter()
                .enumerate()
                .map(|(p, items)| {
                    items
                        .iter()
                        .map(|(t, s)| candidate(&format!("p{p}"), POOL[*t], &format!("sentence {s}")))
                        .collect()
                })
                .collect();
            let report = aggregator(2).aggregate(&postings(total), extracted, "X", "00-0000.00");

            prop_assert_eq!(report.total_postings_analyzed, total);
            for category in Category::ALL {
                let terms = report.terms(category);
                prop_assert!(terms.len() <= MAX_TERMS_PER_CATEGORY);
                for term in terms {
                    prop_assert!(term.count as usize <= total);
                    prop_assert!(!term.context_sentences.is_empty());
                    prop_assert!(term.context_sentences.len() <= MAX_CONTEXT_SENTENCES);
                }
                prop_assert!(terms.windows(2).all(|w| w[0].count >= w[1].count));
            }
        }
    }
}
