use serde::{Deserialize, Serialize};

/// The four fixed buckets every extracted term lands in.
///
/// Declaration order is the canonical emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Responsibilities,
    Skills,
    Qualifications,
    UniqueAspects,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Responsibilities,
        Category::Skills,
        Category::Qualifications,
        Category::UniqueAspects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Responsibilities => "responsibilities",
            Category::Skills => "skills",
            Category::Qualifications => "qualifications",
            Category::UniqueAspects => "unique_aspects",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

/// Which extractor produced a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionBackend {
    #[default]
    RuleBased,
    Delegate,
}

/// A phrase pulled from one posting, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTerm {
    pub normalized_phrase: String,
    pub source_sentence: String,
    pub source_posting_id: String,
}

/// A deduplicated term with the number of postings that mentioned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedTerm {
    pub term: String,
    /// Distinct postings mentioning the term.
    pub count: u32,
    /// Up to three example sentences, first-seen order.
    #[serde(default)]
    pub context_sentences: Vec<String>,
}

/// Final analysis for one (classification code, title) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightReport {
    pub searched_title: String,
    #[serde(alias = "soc_code")]
    pub classification_code: String,
    pub total_postings_analyzed: usize,
    #[serde(default)]
    pub extraction_backend: ExtractionBackend,
    #[serde(default)]
    pub responsibilities: Vec<AggregatedTerm>,
    #[serde(default)]
    pub skills: Vec<AggregatedTerm>,
    #[serde(default)]
    pub qualifications: Vec<AggregatedTerm>,
    #[serde(default)]
    pub unique_aspects: Vec<AggregatedTerm>,
}

impl InsightReport {
    /// A report with every category empty.
    pub fn empty(searched_title: &str, classification_code: &str, total: usize) -> Self {
        Self {
            searched_title: searched_title.to_string(),
            classification_code: classification_code.to_string(),
            total_postings_analyzed: total,
            extraction_backend: ExtractionBackend::RuleBased,
            responsibilities: vec![],
            skills: vec![],
            qualifications: vec![],
            unique_aspects: vec![],
        }
    }

    pub fn terms(&self, category: Category) -> &[AggregatedTerm] {
        match category {
            Category::Responsibilities => &self.responsibilities,
            Category::Skills => &self.skills,
            Category::Qualifications => &self.qualifications,
            Category::UniqueAspects => &self.unique_aspects,
        }
    }

    pub fn terms_mut(&mut self, category: Category) -> &mut Vec<AggregatedTerm> {
        match category {
            Category::Responsibilities => &mut self.responsibilities,
            Category::Skills => &mut self.skills,
            Category::Qualifications => &mut self.qualifications,
            Category::UniqueAspects => &mut self.unique_aspects,
        }
    }

    pub fn term_count(&self) -> usize {
        Category::ALL.iter().map(|c| self.terms(*c).len()).sum()
    }

    /// Finds which category holds `term`, if any.
    #[cfg(test)]
    pub fn category_of(&self, term: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.terms(*c).iter().any(|t| t.term == term))
    }
}
