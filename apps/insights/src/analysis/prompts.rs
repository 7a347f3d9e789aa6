// Prompt constants for delegate categorization.
// Reuses the JSON-only fragment from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// Role and output contract for the delegate categorizer.
pub const CATEGORIZE_SYSTEM_ROLE: &str =
    "You are a labor-market analyst. You read batches of job postings for one \
    occupation and extract the recurring responsibilities, skills, qualifications \
    and unique aspects that employers ask for.";

/// Categorization prompt template. Replace `{title}` and `{postings_text}` before sending.
pub const CATEGORIZE_PROMPT_TEMPLATE: &str = r#"Analyze the job postings below for the role "{title}".

Return a JSON object with this EXACT schema (exactly these four keys, no extra fields):
{
  "responsibilities": [
    {"term": "coordinating patient care plans", "count": 4, "context_sentences": ["Responsible for coordinating patient care plans with physicians."]}
  ],
  "skills": [],
  "qualifications": [],
  "unique_aspects": []
}

Rules:
- Return 10 to 15 items per category when the postings support it.
- Each "term" is a concise phrase of 15 to 80 characters, lowercase, no trailing punctuation.
- "count" is how many distinct postings mention the term.
- "context_sentences" holds 1 to 3 sentences copied verbatim from the postings.
- responsibilities: duties and day-to-day work activities.
- skills: tools, technologies and practical abilities.
- qualifications: degrees, certifications, licenses and years of experience.
- unique_aspects: benefits, schedules, work setting and anything unusual about the role.
- Skip company boilerplate, equal-opportunity statements and application instructions.

JOB POSTINGS:
{postings_text}"#;

/// Full system prompt: role plus the JSON-only fragment.
pub fn categorize_system_prompt() -> String {
    format!("{CATEGORIZE_SYSTEM_ROLE} {JSON_ONLY_SYSTEM}")
}

pub fn categorize_prompt(title: &str, postings_text: &str) -> String {
    CATEGORIZE_PROMPT_TEMPLATE
        .replace("{title}", title)
        .replace("{postings_text}", postings_text)
}
