use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use super::{blob_key, content_hash, round_average, AnalysisColumns, CvStore, StorageError};
use crate::analysis::models::AnalysisReport;
use crate::models::cv::{CvFileRow, CvSearchQuery, CvStats, NewCvFile};

/// `cv_files` table plus one S3 object per row.
#[derive(Clone)]
pub struct PgCvStore {
    pool: PgPool,
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl PgCvStore {
    pub fn new(pool: PgPool, s3: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            pool,
            s3,
            bucket: bucket.into(),
        }
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<Uuid>, StorageError> {
        Ok(
            sqlx::query_scalar("SELECT id FROM cv_files WHERE file_hash = $1")
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

#[async_trait]
impl CvStore for PgCvStore {
    async fn put(&self, blob: Vec<u8>, file: NewCvFile) -> Result<Uuid, StorageError> {
        let hash = content_hash(&blob);
        if let Some(existing_id) = self.find_by_hash(&hash).await? {
            warn!("Duplicate upload of {} (matches {existing_id})", file.filename);
            return Err(StorageError::DuplicateContent { existing_id });
        }

        let id = Uuid::new_v4();
        let s3_key = blob_key(id);

        // Row first: the unique hash index settles concurrent uploads of the same blob.
        let inserted = sqlx::query(
            r#"
            INSERT INTO cv_files
                (id, filename, file_size, file_hash, content_type, s3_key, job_description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&file.filename)
        .bind(blob.len() as i64)
        .bind(&hash)
        .bind(&file.content_type)
        .bind(&s3_key)
        .bind(&file.job_description)
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    let existing_id = self.find_by_hash(&hash).await?.unwrap_or(id);
                    return Err(StorageError::DuplicateContent { existing_id });
                }
            }
            return Err(e.into());
        }

        let upload = self
            .s3
            .put_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .body(ByteStream::from(blob))
            .content_type(&file.content_type)
            .send()
            .await;

        if let Err(e) = upload {
            sqlx::query("DELETE FROM cv_files WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            return Err(StorageError::S3(format!("upload of {s3_key} failed: {e}")));
        }

        info!("Stored CV {} as {id} (s3://{}/{s3_key})", file.filename, self.bucket);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<(Vec<u8>, CvFileRow), StorageError> {
        let row: CvFileRow = sqlx::query_as("SELECT * FROM cv_files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound(id))?;

        let object = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(&row.s3_key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("download of {} failed: {e}", row.s3_key)))?;
        let blob = object
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("reading {} failed: {e}", row.s3_key)))?
            .into_bytes()
            .to_vec();

        Ok((blob, row))
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        report: &AnalysisReport,
    ) -> Result<bool, StorageError> {
        let columns = AnalysisColumns::from_report(report)?;
        let result = sqlx::query(
            r#"
            UPDATE cv_files
            SET match_score = $1, missing_skills = $2, alignment_summary = $3,
                questions = $4, analysis_results = $5, analyzed_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(columns.match_score)
        .bind(columns.missing_skills)
        .bind(columns.alignment_summary)
        .bind(columns.questions)
        .bind(columns.analysis_results)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!("Stored analysis results for CV {id}");
        } else {
            warn!("No CV {id} to attach analysis results to");
        }
        Ok(updated)
    }

    async fn search(
        &self,
        query: &CvSearchQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CvFileRow>, StorageError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM cv_files WHERE TRUE");

        if let Some(name) = &query.filename {
            builder
                .push(" AND POSITION(LOWER(")
                .push_bind(name)
                .push(") IN LOWER(filename)) > 0");
        }
        if let Some(jd) = &query.job_description {
            builder
                .push(" AND POSITION(LOWER(")
                .push_bind(jd)
                .push(") IN LOWER(job_description)) > 0");
        }
        if let Some(min) = query.min_match_score {
            builder.push(" AND match_score >= ").push_bind(min);
        }
        if let Some(max) = query.max_match_score {
            builder.push(" AND match_score <= ").push_bind(max);
        }
        if let Some(from) = query.upload_date_from {
            builder.push(" AND upload_date >= ").push_bind(from);
        }
        if let Some(to) = query.upload_date_to {
            builder.push(" AND upload_date <= ").push_bind(to);
        }
        match query.has_analysis {
            Some(true) => {
                builder.push(" AND analysis_results IS NOT NULL");
            }
            Some(false) => {
                builder.push(" AND analysis_results IS NULL");
            }
            None => {}
        }
        builder
            .push(" ORDER BY upload_date DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<CvFileRow>()
            .fetch_all(&self.pool)
            .await?;
        info!("Found {} CV files matching search criteria", rows.len());
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        let s3_key: Option<String> =
            sqlx::query_scalar("DELETE FROM cv_files WHERE id = $1 RETURNING s3_key")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(s3_key) = s3_key else {
            warn!("No CV {id} to delete");
            return Ok(false);
        };

        // Metadata is gone either way; an orphaned blob is only logged.
        if let Err(e) = self
            .s3
            .delete_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .send()
            .await
        {
            warn!("Deleted CV {id} but blob {s3_key} could not be removed: {e}");
        }
        info!("Deleted CV {id}");
        Ok(true)
    }

    async fn stats(&self) -> Result<CvStats, StorageError> {
        let (total_count, analyzed_count, average): (i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(analysis_results), AVG(match_score)::FLOAT8
            FROM cv_files
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CvStats {
            total_count,
            analyzed_count,
            unanalyzed_count: total_count - analyzed_count,
            average_score: round_average(average),
        })
    }
}
