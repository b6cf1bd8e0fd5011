//! In-process `CvStore` for handler and engine-integration tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{blob_key, content_hash, round_average, AnalysisColumns, CvStore, StorageError};
use crate::analysis::models::AnalysisReport;
use crate::models::cv::{CvFileRow, CvSearchQuery, CvStats, NewCvFile};

/// Same semantics as the Postgres store, kept in insertion order.
#[derive(Default)]
pub struct MemoryCvStore {
    files: Mutex<Vec<(Vec<u8>, CvFileRow)>>,
}

impl MemoryCvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CvStore for MemoryCvStore {
    async fn put(&self, blob: Vec<u8>, file: NewCvFile) -> Result<Uuid, StorageError> {
        let hash = content_hash(&blob);
        let mut files = self.files.lock().unwrap();
        if let Some((_, existing)) = files.iter().find(|(_, row)| row.file_hash == hash) {
            return Err(StorageError::DuplicateContent {
                existing_id: existing.id,
            });
        }

        let id = Uuid::new_v4();
        let row = CvFileRow {
            id,
            filename: file.filename,
            file_size: blob.len() as i64,
            file_hash: hash,
            content_type: file.content_type,
            s3_key: blob_key(id),
            job_description: file.job_description,
            match_score: None,
            missing_skills: None,
            alignment_summary: None,
            questions: None,
            analysis_results: None,
            upload_date: Utc::now(),
            analyzed_at: None,
        };
        files.push((blob, row));
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<(Vec<u8>, CvFileRow), StorageError> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(_, row)| row.id == id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        report: &AnalysisReport,
    ) -> Result<bool, StorageError> {
        let columns = AnalysisColumns::from_report(report)?;
        let mut files = self.files.lock().unwrap();
        let Some((_, row)) = files.iter_mut().find(|(_, row)| row.id == id) else {
            return Ok(false);
        };
        row.match_score = Some(columns.match_score);
        row.missing_skills = Some(columns.missing_skills);
        row.alignment_summary = Some(columns.alignment_summary);
        row.questions = Some(columns.questions);
        row.analysis_results = Some(columns.analysis_results);
        row.analyzed_at = Some(Utc::now());
        Ok(true)
    }

    async fn search(
        &self,
        query: &CvSearchQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CvFileRow>, StorageError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .rev()
            .map(|(_, row)| row)
            .filter(|row| query.matches(row))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        let mut files = self.files.lock().unwrap();
        let before = files.len();
        files.retain(|(_, row)| row.id != id);
        Ok(files.len() != before)
    }

    async fn stats(&self) -> Result<CvStats, StorageError> {
        let files = self.files.lock().unwrap();
        let total_count = files.len() as i64;
        let analyzed_count = files
            .iter()
            .filter(|(_, row)| row.analysis_results.is_some())
            .count() as i64;
        let scores: Vec<f64> = files
            .iter()
            .filter_map(|(_, row)| row.match_score)
            .map(f64::from)
            .collect();
        let average = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

        Ok(CvStats {
            total_count,
            analyzed_count,
            unanalyzed_count: total_count - analyzed_count,
            average_score: round_average(average),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::{AnalysisOutcome, MissingSkill};
    use crate::analysis::refinement::ConversationLog;

    fn upload(name: &str) -> NewCvFile {
        NewCvFile {
            filename: name.to_string(),
            content_type: "text/plain".to_string(),
            job_description: Some("Rust backend role".to_string()),
        }
    }

    fn report(score: u32) -> AnalysisReport {
        AnalysisReport {
            score,
            provider_scores: vec![],
            missing_skills: vec![MissingSkill {
                category: "Cloud".to_string(),
                description: "No AWS".to_string(),
            }],
            matching_skills: String::new(),
            alignment_summary: "ok".to_string(),
            questions: vec![],
            comparison_result_raw: format!("Match Score {score}/100"),
            questions_raw: None,
            outcome: AnalysisOutcome::LowMatch,
            conversation_history: ConversationLog::new(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_content_is_rejected() {
        let store = MemoryCvStore::new();
        let first = store.put(b"same bytes".to_vec(), upload("a.txt")).await.unwrap();
        let err = store
            .put(b"same bytes".to_vec(), upload("b.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateContent { existing_id } if existing_id == first));
    }

    #[tokio::test]
    async fn test_get_returns_blob_and_metadata() {
        let store = MemoryCvStore::new();
        let id = store.put(b"cv text".to_vec(), upload("cv.txt")).await.unwrap();
        let (blob, row) = store.get(id).await.unwrap();
        assert_eq!(blob, b"cv text");
        assert_eq!(row.file_size, 7);
        assert_eq!(row.s3_key, blob_key(id));
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_analysis_and_stats() {
        let store = MemoryCvStore::new();
        let a = store.put(b"a".to_vec(), upload("a.txt")).await.unwrap();
        let b = store.put(b"b".to_vec(), upload("b.txt")).await.unwrap();
        store.put(b"c".to_vec(), upload("c.txt")).await.unwrap();

        assert!(store.update_analysis(a, &report(80)).await.unwrap());
        assert!(store.update_analysis(b, &report(75)).await.unwrap());
        assert!(!store.update_analysis(Uuid::new_v4(), &report(1)).await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            CvStats {
                total_count: 3,
                analyzed_count: 2,
                unanalyzed_count: 1,
                average_score: 77.5,
            }
        );
    }

    #[tokio::test]
    async fn test_search_filters_and_paginates_newest_first() {
        let store = MemoryCvStore::new();
        for name in ["one.txt", "two.txt", "three.txt"] {
            store.put(name.as_bytes().to_vec(), upload(name)).await.unwrap();
        }

        let all = store.search(&CvSearchQuery::default(), 50, 0).await.unwrap();
        let names: Vec<_> = all.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["three.txt", "two.txt", "one.txt"]);

        let page = store.search(&CvSearchQuery::default(), 1, 1).await.unwrap();
        assert_eq!(page[0].filename, "two.txt");

        let query = CvSearchQuery {
            filename: Some("O".to_string()),
            ..Default::default()
        };
        assert_eq!(store.search(&query, 50, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryCvStore::new();
        let id = store.put(b"x".to_vec(), upload("x.txt")).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert_eq!(store.stats().await.unwrap().total_count, 0);
    }
}
