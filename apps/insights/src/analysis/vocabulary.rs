//! Word lists and tables that drive rule-based extraction and categorization.
//!
//! Built once at startup and shared behind an `Arc`. Every field defaults to the
//! built-in list, so a JSON override only needs the fields it changes.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::report::Category;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Base forms of work verbs; inflections are derived.
    pub action_verbs: Vec<String>,
    /// Nouns that make a verb phrase a concrete work activity.
    pub work_objects: Vec<String>,
    pub connectives: Vec<String>,
    /// Words that mark a match as page chrome rather than content.
    pub markup_artifacts: Vec<String>,
    /// Words ending in -ing that never start an activity clause.
    pub non_gerunds: Vec<String>,
    /// Words that, on their own, only name the role being advertised.
    pub generic_role_words: Vec<String>,
    /// Many-to-one canonicalization, keyed by the cleaned phrase.
    pub synonyms: HashMap<String, String>,
    pub category_keywords: CategoryKeywords,
    pub phrase_bonuses: Vec<PhraseBonus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryKeywords {
    pub responsibilities: Vec<String>,
    pub skills: Vec<String>,
    pub qualifications: Vec<String>,
    pub unique_aspects: Vec<String>,
}

impl CategoryKeywords {
    pub fn for_category(&self, category: Category) -> &[String] {
        match category {
            Category::Responsibilities => &self.responsibilities,
            Category::Skills => &self.skills,
            Category::Qualifications => &self.qualifications,
            Category::UniqueAspects => &self.unique_aspects,
        }
    }
}

/// Extra score for a category when any marker phrase appears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseBonus {
    pub category: Category,
    pub markers: Vec<String>,
    pub bonus: u32,
}

impl Vocabulary {
    /// Loads a JSON override; missing fields keep their built-in values.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vocabulary file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Vocabulary file {} is not valid JSON", path.display()))
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            action_verbs: words(&[
                "administer", "analyze", "assess", "assist", "bend", "build", "calculate",
                "clean", "collaborate", "collect", "communicate", "compile", "complete",
                "conduct", "configure", "connect", "coordinate", "create", "deliver",
                "design", "develop", "diagnose", "document", "educate", "ensure", "evaluate",
                "examine", "execute", "facilitate", "implement", "improve", "inspect",
                "install", "instruct", "interpret", "investigate", "maintain", "manage",
                "monitor", "operate", "organize", "oversee", "perform", "plan", "prepare",
                "present", "process", "provide", "pull", "record", "repair", "report",
                "research", "review", "run", "schedule", "supervise", "support", "teach",
                "terminate", "test", "train", "troubleshoot", "update", "verify", "write",
            ]),
            work_objects: words(&[
                "accounts", "applications", "assessments", "budgets", "care", "charts",
                "circuits", "clients", "code", "compliance", "conduit", "contracts",
                "customers", "data", "database", "designs", "documentation", "documents",
                "drawings", "electrical", "equipment", "features", "fixtures", "infrastructure",
                "inspections", "inventory", "invoices", "lighting", "logs", "maintenance",
                "medication", "medications", "meetings", "models", "network", "nursing",
                "operations", "orders", "outlets", "panels", "patients", "pipelines",
                "plans", "policies", "procedures", "processes", "products", "projects",
                "protocols", "quality", "records", "repairs", "reports", "requirements",
                "safety", "schedules", "server", "services", "software", "solutions",
                "specifications", "staff", "students", "systems", "teams", "tests",
                "training", "treatment", "vendors", "website", "wire", "wiring",
            ]),
            connectives: words(&[
                "and", "or", "with", "to", "for", "of", "in", "on", "including", "across",
                "using", "through",
            ]),
            markup_artifacts: words(&[
                "script", "http", "https", "www", "javascript", "onclick", "function",
                "cookie", "cookies", "href", "src", "iframe", "div", "span", "css", "nbsp",
                "utm", "px",
            ]),
            non_gerunds: words(&[
                "during", "including", "regarding", "according", "concerning", "pending",
                "bring", "thing", "something", "anything", "nothing", "everything",
                "morning", "evening", "string", "spring", "king", "ring", "sing", "wing",
                "ceiling", "opening",
            ]),
            generic_role_words: words(&[
                "job", "jobs", "position", "positions", "role", "roles", "candidate",
                "candidates", "applicant", "applicants", "employee", "employees",
                "opportunity", "opportunities", "company", "team", "member", "staff",
                "nurse", "electrician", "developer", "engineer", "technician", "manager",
                "analyst", "assistant", "specialist", "associate", "worker", "registered",
                "licensed", "senior", "junior", "lead", "entry", "level", "full", "part",
                "time", "new", "hire", "the", "a", "an", "our", "we", "you",
            ]),
            synonyms: default_synonyms(),
            category_keywords: CategoryKeywords {
                responsibilities: words(&[
                    "coordinate", "coordinating", "maintain", "maintaining", "manage",
                    "managing", "monitor", "monitoring", "provide", "providing", "install",
                    "installing", "perform", "performing", "conduct", "conducting",
                    "develop", "developing", "analyze", "analyzing", "supervise",
                    "supervising", "prepare", "preparing", "document", "documenting",
                    "operate", "operating", "assist", "assisting", "ensure", "ensuring",
                    "patient care", "records", "reports", "daily", "tasks", "duties",
                ]),
                skills: words(&[
                    "python", "java", "javascript", "sql", "excel", "aws", "azure", "linux",
                    "react", "software", "programming", "coding", "microsoft office",
                    "autocad", "emr", "ehr", "epic", "cloud", "tools", "technical",
                    "proficiency", "proficient", "knowledge of", "ability to", "familiarity",
                    "communication skills", "skills", "data analysis", "troubleshooting",
                ]),
                qualifications: words(&[
                    "degree", "bachelor", "bachelors", "master", "masters", "diploma", "ged",
                    "experience", "years", "certification", "certified", "certificate",
                    "license", "licensed", "licensure", "required", "preferred", "minimum",
                    "rn", "bls", "cpr", "background check", "apprenticeship",
                ]),
                unique_aspects: words(&[
                    "benefits", "remote", "hybrid", "flexible", "culture", "salary", "bonus",
                    "pto", "paid time off", "401k", "health insurance", "dental", "vision",
                    "tuition", "relocation", "work-life balance", "career advancement",
                    "growth", "perks", "competitive pay", "equal opportunity",
                ]),
            },
            phrase_bonuses: vec![
                PhraseBonus {
                    category: Category::Qualifications,
                    markers: words(&["required", "degree", "years of experience", "certification"]),
                    bonus: 2,
                },
                PhraseBonus {
                    category: Category::UniqueAspects,
                    markers: words(&["benefits", "remote", "we offer", "perks"]),
                    bonus: 2,
                },
                PhraseBonus {
                    category: Category::Responsibilities,
                    markers: words(&["responsible for", "duties", "you will"]),
                    bonus: 2,
                },
            ],
        }
    }
}

fn default_synonyms() -> HashMap<String, String> {
    let table: &[(&str, &str)] = &[
        // Electrical trades
        ("running wire", "running and pulling electrical wire"),
        ("pulling wire", "running and pulling electrical wire"),
        ("wire running", "running and pulling electrical wire"),
        ("wire pulling", "running and pulling electrical wire"),
        ("run wire", "running and pulling electrical wire"),
        ("pull wire", "running and pulling electrical wire"),
        ("running and pulling wire", "running and pulling electrical wire"),
        ("bending conduit", "installing and bending conduit"),
        ("conduit bending", "installing and bending conduit"),
        ("bend conduit", "installing and bending conduit"),
        ("running conduit", "installing and bending conduit"),
        ("conduit installation", "installing and bending conduit"),
        ("installing lights", "installing lighting and electrical fixtures"),
        ("installing outlets", "installing lighting and electrical fixtures"),
        ("light installation", "installing lighting and electrical fixtures"),
        ("outlet installation", "installing lighting and electrical fixtures"),
        ("fixture installation", "installing lighting and electrical fixtures"),
        ("low voltage work", "low voltage systems installation"),
        ("low voltage installation", "low voltage systems installation"),
        ("low voltage systems", "low voltage systems installation"),
        ("industrial electrical", "industrial electrical maintenance"),
        ("industrial maintenance", "industrial electrical maintenance"),
        ("electrical terminations", "electrical connections and terminations"),
        ("wire terminations", "electrical connections and terminations"),
        ("cable terminations", "electrical connections and terminations"),
        // Healthcare
        ("patient care", "providing direct patient care"),
        ("providing patient care", "providing direct patient care"),
        ("administering medication", "medication administration and monitoring"),
        ("administering medications", "medication administration and monitoring"),
        ("medication administration", "medication administration and monitoring"),
        ("vital signs", "monitoring vital signs and patient status"),
        ("monitoring patients", "monitoring vital signs and patient status"),
        ("patient monitoring", "monitoring vital signs and patient status"),
        // Software
        ("javascript", "javascript programming"),
        ("js", "javascript programming"),
        ("python", "python programming"),
        ("java", "java programming"),
        ("react", "react development"),
        ("node.js", "node.js development"),
        ("nodejs", "node.js development"),
        // General
        ("data analysis", "analyzing and interpreting data"),
        ("data analytics", "analyzing and interpreting data"),
        ("project management", "managing projects and timelines"),
        ("customer service", "providing customer support and service"),
        ("troubleshooting", "diagnosing and troubleshooting issues"),
    ];
    table
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_has_keywords_for_every_category() {
        let vocab = Vocabulary::default();
        for category in Category::ALL {
            assert!(
                !vocab.category_keywords.for_category(category).is_empty(),
                "no keywords for {category:?}"
            );
        }
    }

    #[test]
    fn test_synonym_targets_are_not_themselves_keys() {
        let vocab = Vocabulary::default();
        for target in vocab.synonyms.values() {
            assert!(!vocab.synonyms.contains_key(target), "chained synonym: {target}");
        }
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"action_verbs": ["weld"]}}"#).unwrap();

        let vocab = Vocabulary::from_path(file.path()).unwrap();
        assert_eq!(vocab.action_verbs, vec!["weld".to_string()]);
        assert!(!vocab.work_objects.is_empty());
        assert_eq!(vocab.phrase_bonuses.len(), 3);
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Vocabulary::from_path(file.path()).is_err());
    }
}
