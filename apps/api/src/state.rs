use std::sync::Arc;

use crate::analysis::engine::PipelineEngine;
use crate::storage::CvStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Immutable after startup: registry and engine config never change per request.
    pub engine: Arc<PipelineEngine>,
    /// Pluggable CV store. Default: PgCvStore (Postgres metadata + S3 blobs).
    pub store: Arc<dyn CvStore>,
}
