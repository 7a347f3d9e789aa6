//! Rule-based candidate extraction.
//!
//! Each usable sentence is scanned three ways, always in this order:
//! 1. responsibility patterns ("responsible for …", "duties include …",
//!    verb → work-object clauses),
//! 2. token windows of 3–10 words anchored on an action verb,
//! 3. gerund-led clauses that end on a work-object noun.
//!
//! Overlapping and repeated phrases are expected here; the aggregator dedupes.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use crate::analysis::vocabulary::Vocabulary;

pub const MIN_SENTENCE_CHARS: usize = 20;
pub const MIN_PHRASE_CHARS: usize = 15;
pub const MAX_PHRASE_CHARS: usize = 120;
const MIN_WINDOW: usize = 3;
const MAX_WINDOW: usize = 10;
/// Furthest a gerund may sit from the noun that closes its clause.
const GERUND_REACH: usize = 8;

const RESIDUAL_MARKUP: &[&str] = &["<", ">", "{", "}", "=\"", "();", "&#"];
const WEAK_TAIL: &[&str] = &["a", "an", "the", "our", "your", "their", "all", "any", "as"];

/// A phrase and the sentence it was found in, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub phrase: String,
    pub sentence: String,
}

pub struct RuleBasedExtractor {
    verb_forms: HashSet<String>,
    work_objects: HashSet<String>,
    connectives: HashSet<String>,
    artifacts: HashSet<String>,
    non_gerunds: HashSet<String>,
    bullet_split: Regex,
    sentence_end: Regex,
    responsibility_patterns: Vec<Regex>,
}

impl RuleBasedExtractor {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        let verb_forms: HashSet<String> = vocabulary
            .action_verbs
            .iter()
            .flat_map(|v| inflect(&v.to_lowercase()))
            .collect();
        let work_objects = lowered_set(&vocabulary.work_objects);

        let verb_alt = alternation(verb_forms.iter());
        let object_alt = alternation(
            work_objects
                .iter()
                .flat_map(|o| [o.clone(), format!("{o}s")]),
        );

        let mut responsibility_patterns = vec![
            Regex::new(r"responsible for ([^,;:]+)").expect("Invalid responsibility regex"),
            Regex::new(r"duties (?:include|includes|will include) ([^,;:]+)")
                .expect("Invalid duties regex"),
        ];
        if !verb_alt.is_empty() && !object_alt.is_empty() {
            responsibility_patterns.push(
                Regex::new(&format!(
                    r"\b((?:{verb_alt})\b[^,;:.!?]*?\b(?:{object_alt}))\b"
                ))
                .expect("Invalid verb-object regex"),
            );
        }

        Self {
            verb_forms,
            work_objects,
            connectives: lowered_set(&vocabulary.connectives),
            artifacts: lowered_set(&vocabulary.markup_artifacts),
            non_gerunds: lowered_set(&vocabulary.non_gerunds),
            bullet_split: Regex::new(r"[•▪·]|\s[-*]\s").expect("Invalid bullet regex"),
            sentence_end: Regex::new(r"[.!?]+(?:\s+|$)").expect("Invalid sentence regex"),
            responsibility_patterns,
        }
    }

    /// Lazily yields candidates sentence by sentence.
    pub fn extract<'a>(&'a self, text: &'a str) -> impl Iterator<Item = RawCandidate> + 'a {
        self.sentences(text)
            .into_iter()
            .filter(|s| is_usable_sentence(s))
            .flat_map(move |s| self.sentence_candidates(s).into_iter())
    }

    /// Splits on bullets and sentence terminators, keeping the terminator.
    pub fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        for block in self.bullet_split.split(text) {
            let mut start = 0;
            for boundary in self.sentence_end.find_iter(block) {
                push_trimmed(&mut sentences, &block[start..boundary.end()]);
                start = boundary.end();
            }
            push_trimmed(&mut sentences, &block[start..]);
        }
        sentences
    }

    fn sentence_candidates(&self, sentence: &str) -> Vec<RawCandidate> {
        let lowered = sentence.to_lowercase();
        let mut phrases = Vec::new();

        // (a) responsibility patterns
        for pattern in &self.responsibility_patterns {
            for caps in pattern.captures_iter(&lowered) {
                if let Some(span) = caps.get(1) {
                    phrases.push(tidy(span.as_str()));
                }
            }
        }

        let clauses: Vec<Vec<&str>> = lowered
            .split(&[',', ';', ':', '(', ')'][..])
            .map(|clause| {
                clause
                    .split_whitespace()
                    .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .collect();

        // (b) verb-anchored token windows
        for tokens in &clauses {
            for (i, token) in tokens.iter().enumerate() {
                if !self.verb_forms.contains(*token) {
                    continue;
                }
                for len in MIN_WINDOW..=MAX_WINDOW {
                    let Some(window) = tokens.get(i..i + len) else {
                        break;
                    };
                    if self.is_weak_tail(window[len - 1]) {
                        continue;
                    }
                    if window[1..]
                        .iter()
                        .any(|t| self.is_work_object(t) || self.connectives.contains(*t))
                    {
                        phrases.push(window.join(" "));
                    }
                }
            }
        }

        // (c) gerund-led clauses
        for tokens in &clauses {
            for (i, token) in tokens.iter().enumerate() {
                if !self.is_gerund(token) {
                    continue;
                }
                let reach = (i + GERUND_REACH).min(tokens.len().saturating_sub(1));
                if let Some(end) = (i + 1..=reach).find(|&j| self.is_work_object(tokens[j])) {
                    phrases.push(tokens[i..=end].join(" "));
                }
            }
        }

        phrases
            .into_iter()
            .filter(|p| self.is_acceptable_phrase(p))
            .map(|phrase| RawCandidate {
                phrase,
                sentence: sentence.to_string(),
            })
            .collect()
    }

    fn is_work_object(&self, token: &str) -> bool {
        self.work_objects.contains(token)
            || token
                .strip_suffix('s')
                .is_some_and(|singular| self.work_objects.contains(singular))
    }

    fn is_gerund(&self, token: &str) -> bool {
        token.len() >= 5
            && token.ends_with("ing")
            && token.chars().all(|c| c.is_ascii_alphabetic())
            && !self.non_gerunds.contains(token)
    }

    fn is_weak_tail(&self, token: &str) -> bool {
        self.connectives.contains(token) || WEAK_TAIL.contains(&token)
    }

    fn is_acceptable_phrase(&self, phrase: &str) -> bool {
        let len = phrase.chars().count();
        (MIN_PHRASE_CHARS..=MAX_PHRASE_CHARS).contains(&len)
            && !RESIDUAL_MARKUP.iter().any(|m| phrase.contains(m))
            && !phrase
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| self.artifacts.contains(word))
    }
}

fn lowered_set(list: &[String]) -> HashSet<String> {
    list.iter().map(|w| w.to_lowercase()).collect()
}

fn is_usable_sentence(sentence: &str) -> bool {
    sentence.chars().count() >= MIN_SENTENCE_CHARS
        && !RESIDUAL_MARKUP.iter().any(|m| sentence.contains(m))
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece);
    }
}

/// Trims boundary punctuation and collapses inner whitespace.
fn tidy(span: &str) -> String {
    span.trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn alternation<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut escaped: Vec<String> = words
        .into_iter()
        .filter(|w| !w.as_ref().is_empty())
        .map(|w| regex::escape(w.as_ref()))
        .collect();
    // Sorted for a stable pattern across runs.
    escaped.sort();
    escaped.dedup();
    escaped.join("|")
}

/// Common inflections of a base-form verb.
fn inflect(verb: &str) -> Vec<String> {
    let chars: Vec<char> = verb.chars().collect();
    let Some(&last) = chars.last() else {
        return vec![];
    };
    let is_vowel = |c: char| "aeiou".contains(c);

    if verb.ends_with("ee") {
        return vec![verb.to_string(), format!("{verb}s"), format!("{verb}ing")];
    }
    if last == 'e' {
        let stem = &verb[..verb.len() - 1];
        return vec![
            verb.to_string(),
            format!("{verb}s"),
            format!("{verb}d"),
            format!("{stem}ing"),
        ];
    }
    if last == 'y' && chars.len() > 1 && !is_vowel(chars[chars.len() - 2]) {
        let stem = &verb[..verb.len() - 1];
        return vec![
            verb.to_string(),
            format!("{stem}ies"),
            format!("{stem}ied"),
            format!("{verb}ing"),
        ];
    }

    let mut forms = vec![
        verb.to_string(),
        format!("{verb}s"),
        format!("{verb}es"),
        format!("{verb}ed"),
        format!("{verb}ing"),
    ];
    // run → running, plan → planned
    let short_cvc = chars.len() <= 4
        && chars.len() >= 3
        && !is_vowel(last)
        && !"wxy".contains(last)
        && is_vowel(chars[chars.len() - 2])
        && !is_vowel(chars[chars.len() - 3]);
    if short_cvc {
        forms.push(format!("{verb}{last}ing"));
        forms.push(format!("{verb}{last}ed"));
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> RuleBasedExtractor {
        RuleBasedExtractor::new(Arc::new(Vocabulary::default()))
    }

    fn phrases(text: &str) -> Vec<String> {
        extractor().extract(text).map(|c| c.phrase).collect()
    }

    #[test]
    fn test_inflections() {
        assert!(inflect("coordinate").contains(&"coordinating".to_string()));
        assert!(inflect("oversee").contains(&"overseeing".to_string()));
        assert!(inflect("run").contains(&"running".to_string()));
        assert!(inflect("verify").contains(&"verifies".to_string()));
        assert!(inflect("process").contains(&"processes".to_string()));
        assert!(!inflect("pull").contains(&"pullling".to_string()));
    }

    #[test]
    fn test_sentence_split_keeps_terminators_and_bullets() {
        let e = extractor();
        let sentences =
            e.sentences("Install conduit. Node.js is used! • Maintain records • Run wire?");
        assert_eq!(
            sentences,
            vec!["Install conduit.", "Node.js is used!", "Maintain records", "Run wire?"]
        );
    }

    #[test]
    fn test_responsible_for_pattern() {
        let found = phrases("Responsible for coordinating patient care and maintaining records.");
        assert!(found.contains(&"coordinating patient care and maintaining records".to_string()));
        assert!(found.contains(&"coordinating patient care".to_string()));
        assert!(found.contains(&"maintaining records".to_string()));
    }

    #[test]
    fn test_duties_include_pattern() {
        let found = phrases("Daily duties include inspecting electrical panels, then reporting.");
        assert!(found.contains(&"inspecting electrical panels".to_string()));
    }

    #[test]
    fn test_candidates_carry_source_sentence() {
        let e = extractor();
        let text = "Short one. You will troubleshoot network equipment for clients.";
        let candidates: Vec<RawCandidate> = e.extract(text).collect();
        assert!(!candidates.is_empty());
        assert!(candidates
            .iter()
            .all(|c| c.sentence == "You will troubleshoot network equipment for clients."));
    }

    #[test]
    fn test_token_windows_need_object_or_connective() {
        let found = phrases("Candidates should troubleshoot quickly and calmly when asked.");
        assert!(found.contains(&"troubleshoot quickly and calmly".to_string()));
        assert!(found.iter().all(|p| !p.ends_with(" and")));
    }

    #[test]
    fn test_gerund_clause_ends_on_work_object() {
        let found = phrases("Experience reading blueprints and technical drawings is a plus.");
        assert!(found.contains(&"reading blueprints and technical drawings".to_string()));
    }

    #[test]
    fn test_short_sentences_discarded() {
        assert!(phrases("Run wire daily.").is_empty());
    }

    #[test]
    fn test_markup_sentences_discarded() {
        assert!(phrases("function track() { maintain records for patients }").is_empty());
    }

    #[test]
    fn test_artifact_words_filtered() {
        let found = phrases("You will maintain the script library and website code daily.");
        assert!(found.iter().all(|p| !p.contains("script")));
    }

    #[test]
    fn test_phrase_length_bounds() {
        let text = "Responsible for coordinating patient care and maintaining records across departments daily.";
        for phrase in phrases(text) {
            let len = phrase.chars().count();
            assert!((MIN_PHRASE_CHARS..=MAX_PHRASE_CHARS).contains(&len), "{phrase}");
        }
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert_eq!(extractor().extract("").count(), 0);
    }
}
