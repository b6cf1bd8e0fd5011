use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::models::AnalysisReport;
use crate::analysis::refinement::{RefinementOutcome, RefinementRequest};
use crate::errors::AppError;
use crate::llm_client::registry::ProviderInfo;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub resume_text: String,
    pub jd_text: String,
    /// Stored CV to attach the results to.
    #[serde(default)]
    pub content_id: Option<Uuid>,
}

/// POST /api/v1/analyses
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisReport>, AppError> {
    let report = state.engine.run(&req.resume_text, &req.jd_text).await?;

    if let Some(id) = req.content_id {
        // The analysis already succeeded; persisting it is best-effort.
        match state.store.update_analysis(id, &report).await {
            Ok(true) => info!("Attached analysis to CV {id}"),
            Ok(false) => warn!("Analysis finished but CV {id} does not exist"),
            Err(e) => warn!("Analysis finished but could not be stored for CV {id}: {e}"),
        }
    }

    Ok(Json(report))
}

/// POST /api/v1/analyses/refine
pub async fn handle_refine(
    State(state): State<AppState>,
    Json(req): Json<RefinementRequest>,
) -> Result<Json<RefinementOutcome>, AppError> {
    Ok(Json(state.engine.refine(req).await?))
}

/// GET /api/v1/providers
pub async fn handle_providers(State(state): State<AppState>) -> Json<ProviderInfo> {
    Json(state.engine.registry().describe())
}
