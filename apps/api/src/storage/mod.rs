// CV persistence: metadata in Postgres, blobs in S3.
// Content-addressed: a blob whose SHA-256 already exists is rejected as a duplicate.

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::models::AnalysisReport;
use crate::models::cv::{CvFileRow, CvSearchQuery, CvStats, NewCvFile};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("A file with the same content already exists ({existing_id})")]
    DuplicateContent { existing_id: Uuid },

    #[error("CV file {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait CvStore: Send + Sync {
    /// Stores the blob and its metadata. Fails with `DuplicateContent` on a known hash.
    async fn put(&self, blob: Vec<u8>, file: NewCvFile) -> Result<Uuid, StorageError>;

    async fn get(&self, id: Uuid) -> Result<(Vec<u8>, CvFileRow), StorageError>;

    /// Returns `false` when no row has this id.
    async fn update_analysis(&self, id: Uuid, report: &AnalysisReport)
        -> Result<bool, StorageError>;

    /// Newest uploads first.
    async fn search(
        &self,
        query: &CvSearchQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CvFileRow>, StorageError>;

    /// Returns `false` when no row has this id.
    async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;

    async fn stats(&self) -> Result<CvStats, StorageError>;
}

/// Hex-encoded SHA-256 of the blob.
pub fn content_hash(blob: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob);
    format!("{:x}", hasher.finalize())
}

pub fn blob_key(id: Uuid) -> String {
    format!("cvs/{id}")
}

/// Column values written by `update_analysis`.
pub struct AnalysisColumns {
    pub match_score: i32,
    pub missing_skills: Value,
    pub alignment_summary: String,
    pub questions: Value,
    pub analysis_results: Value,
}

impl AnalysisColumns {
    pub fn from_report(report: &AnalysisReport) -> Result<Self, StorageError> {
        Ok(Self {
            match_score: report.score as i32,
            missing_skills: serde_json::to_value(&report.missing_skills)?,
            alignment_summary: report.alignment_summary.clone(),
            questions: serde_json::to_value(&report.questions)?,
            analysis_results: json!({
                "score": report.score,
                "provider_scores": report.provider_scores,
                "matching_skills": report.matching_skills,
                "outcome": report.outcome,
                "comparison_result_raw": report.comparison_result_raw,
                "questions_raw": report.questions_raw,
            }),
        })
    }
}

/// Two-decimal rounding for the stats average.
pub fn round_average(avg: Option<f64>) -> f64 {
    avg.map(|a| (a * 100.0).round() / 100.0).unwrap_or(0.0)
}
