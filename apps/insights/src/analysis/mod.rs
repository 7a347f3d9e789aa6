// Insight extraction: sanitize → extract → normalize → categorize → aggregate.
// The delegate extractor is the only code here that reaches the network, and
// it goes through the GenerativeCategorizer seam.

pub mod aggregator;
pub mod categorizer;
pub mod delegate;
pub mod extractor;
pub mod handlers;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod sanitizer;
pub mod vocabulary;
