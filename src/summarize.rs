//! Summarizer seam for query description generation
//!
//! Description text comes from an external language-model collaborator owned
//! by the host. The archive only depends on this trait; when no summarizer is
//! wired in (or it fails), new records fall back to the default description.

use regex::Regex;
use std::sync::OnceLock;

use crate::record::DEFAULT_DESCRIPTION;

/// Generates short human-readable descriptions for archived queries
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a query, returning `None` when no summary is available.
    /// Implementations must not error out of this path; a missing summary is
    /// a normal outcome.
    async fn describe(&self, query_text: &str) -> Option<String>;

    /// Check that the configured credentials are usable
    async fn verify_credentials(&self) -> std::result::Result<(), String>;
}

/// Summarizer used when no external collaborator is configured
pub struct NoSummarizer;

#[async_trait::async_trait]
impl Summarizer for NoSummarizer {
    async fn describe(&self, _query_text: &str) -> Option<String> {
        None
    }

    async fn verify_credentials(&self) -> std::result::Result<(), String> {
        Err("no summarizer credentials configured".to_string())
    }
}

/// Strip comments and collapse whitespace before handing a query to the
/// summarizer, so the prompt carries only the query itself.
pub fn clean_query_text(query: &str) -> String {
    static BLOCK_COMMENT: OnceLock<Regex> = OnceLock::new();
    static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let block = BLOCK_COMMENT.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
    let line = LINE_COMMENT.get_or_init(|| Regex::new(r"(?m)--.*$").unwrap());
    let ws = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());

    let cleaned = block.replace_all(query.trim(), "");
    let cleaned = line.replace_all(&cleaned, "");
    ws.replace_all(&cleaned, " ").trim().to_string()
}

/// Pick the stored description: the summary when one was generated, the
/// default otherwise.
pub fn description_or_default(summary: Option<String>) -> String {
    match summary {
        Some(s) if !s.trim().is_empty() => s,
        _ => DEFAULT_DESCRIPTION.to_string(),
    }
}
