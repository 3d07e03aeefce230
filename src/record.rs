//! Typed capture and archive record structs

use serde::{Deserialize, Serialize};

/// Fallback description for queries with no generated summary
pub const DEFAULT_DESCRIPTION: &str = "Untitled";

/// Prefix marking administrative/metadata queries that are never archived
pub const CONTROL_PREFIX: &str = ".";

/// Summary of the response observed alongside a captured query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponsePreview {
    pub has_results: bool,
    pub result_count: i64,
}

/// One query observation as reported by the capture layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedQuery {
    /// Raw query text
    pub query: String,
    /// Database the query ran against
    pub database: Option<String>,
    /// Cluster the query ran against
    pub cluster: Option<String>,
    /// Page the query was observed on
    pub url: Option<String>,
    /// Capture-reported observation time (RFC 3339)
    pub timestamp: Option<String>,
    /// Opaque request body, stored verbatim
    pub request_body: Option<serde_json::Value>,
    /// Result summary; captures without confirmed results are not archived
    pub response_preview: Option<ResponsePreview>,
}

impl CapturedQuery {
    /// True when the capture should be skipped rather than archived.
    ///
    /// Control queries (leading '.'), empty query text, and captures without
    /// confirmed results are all normal filtering outcomes, not errors.
    pub fn should_skip(&self) -> bool {
        if self.query.trim().is_empty() {
            return true;
        }
        if self.query.starts_with(CONTROL_PREFIX) {
            return true;
        }
        !matches!(&self.response_preview, Some(p) if p.has_results)
    }
}

/// One archived query row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    pub query_text: String,
    pub database_name: Option<String>,
    pub cluster_name: Option<String>,
    pub url: Option<String>,
    /// Observation time reported by the capture layer
    pub timestamp: Option<String>,
    /// First-persisted time
    pub created_at: Option<String>,
    /// Most recent re-observation time
    pub last_used_at: Option<String>,
    /// How many times this exact query has been observed
    pub runs_count: i64,
    pub description: String,
    pub request_body: Option<serde_json::Value>,
    pub response_preview: Option<ResponsePreview>,
}
