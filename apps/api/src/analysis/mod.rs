// Resume/JD analysis engine.
// Implements: stage sequencing, multi-provider consensus, free-text parsing, guarded refinement.
// All model calls go through llm_client; no direct backend calls here.

pub mod consensus;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod refinement;
pub mod state;

use thiserror::Error;

use crate::llm_client::ProviderCallFailed;
use state::Stage;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fatal to the current run; never retried by the engine.
    #[error(transparent)]
    ProviderCallFailed(#[from] ProviderCallFailed),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stage {stage:?} requires {missing}, which no earlier stage produced")]
    InvalidTransition { stage: Stage, missing: &'static str },
}
