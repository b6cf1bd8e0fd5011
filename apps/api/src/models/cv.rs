use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata row for one uploaded CV. The blob itself lives in S3 under `s3_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvFileRow {
    pub id: Uuid,
    pub filename: String,
    pub file_size: i64,
    /// SHA-256 of the blob, hex encoded. Unique.
    pub file_hash: String,
    pub content_type: String,
    pub s3_key: String,
    pub job_description: Option<String>,
    pub match_score: Option<i32>,
    pub missing_skills: Option<Value>,
    pub alignment_summary: Option<String>,
    pub questions: Option<Value>,
    pub analysis_results: Option<Value>,
    pub upload_date: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Upload metadata supplied by the caller; size and hash are derived from the blob.
#[derive(Debug, Clone)]
pub struct NewCvFile {
    pub filename: String,
    pub content_type: String,
    pub job_description: Option<String>,
}

/// Every present field narrows the result; absent fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvSearchQuery {
    /// Case-insensitive substring.
    pub filename: Option<String>,
    pub min_match_score: Option<i32>,
    pub max_match_score: Option<i32>,
    /// Case-insensitive substring.
    pub job_description: Option<String>,
    pub upload_date_from: Option<DateTime<Utc>>,
    pub upload_date_to: Option<DateTime<Utc>>,
    pub has_analysis: Option<bool>,
}

impl CvSearchQuery {
    /// In-memory counterpart of the `PgCvStore::search` filter.
    #[cfg(test)]
    pub fn matches(&self, row: &CvFileRow) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };

        if let Some(name) = self.filename.as_deref() {
            if !contains(&row.filename, name) {
                return false;
            }
        }
        if let Some(jd) = self.job_description.as_deref() {
            match row.job_description.as_deref() {
                Some(text) if contains(text, jd) => {}
                _ => return false,
            }
        }
        // A score bound excludes rows that were never scored.
        if let Some(min) = self.min_match_score {
            if !row.match_score.is_some_and(|s| s >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_match_score {
            if !row.match_score.is_some_and(|s| s <= max) {
                return false;
            }
        }
        if self.upload_date_from.is_some_and(|from| row.upload_date < from) {
            return false;
        }
        if self.upload_date_to.is_some_and(|to| row.upload_date > to) {
            return false;
        }
        if let Some(has) = self.has_analysis {
            if row.analysis_results.is_some() != has {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvStats {
    pub total_count: i64,
    pub analyzed_count: i64,
    pub unanalyzed_count: i64,
    /// Mean match score over scored rows, two decimals; 0 when none.
    pub average_score: f64,
}
