//! Pipeline engine: runs the stage machine against the provider registry.
//!
//! ParseResume → ParseJd → Compare (fan-out) → Consensus → [GenerateQuestions] → End
//!
//! A provider failure at any stage aborts the run; the engine itself never retries.

use std::time::Duration;

use futures::future::try_join_all;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::analysis::models::{AnalysisReport, ProviderComparison};
use crate::analysis::prompts;
use crate::analysis::refinement::{
    current_question_count, evaluate_response, RefinementOutcome, RefinementRequest,
};
use crate::analysis::state::{consensus_of, next_stage, AnalysisState, Stage, StageUpdate};
use crate::analysis::PipelineError;
use crate::llm_client::registry::ProviderRegistry;
use crate::llm_client::{LlmError, PromptSections, ProviderAdapter, ProviderCallFailed};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum consensus score (inclusive) for question generation.
    pub acceptance_threshold: u32,
    pub question_count: usize,
    /// Upper bound on a single stage's provider call, retries included.
    pub stage_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 75,
            question_count: 5,
            stage_timeout: Duration::from_secs(180),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl EngineConfig {
    /// Share of the stage timeout a fallback primary gets before its secondary is tried.
    pub fn primary_budget(&self) -> Duration {
        self.stage_timeout / 2
    }
}

pub struct PipelineEngine {
    registry: ProviderRegistry,
    config: EngineConfig,
}

impl PipelineEngine {
    pub fn new(registry: ProviderRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run(
        &self,
        resume_text: &str,
        jd_text: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        if resume_text.trim().is_empty() {
            return Err(PipelineError::Validation(
                "resume_text must not be empty".to_string(),
            ));
        }
        if jd_text.trim().is_empty() {
            return Err(PipelineError::Validation(
                "jd_text must not be empty".to_string(),
            ));
        }

        let mut state = AnalysisState::new(resume_text, jd_text);
        let mut stage = Stage::ParseResume;

        while stage != Stage::End {
            let update = self.execute(stage, &state).await?;
            state = state.apply(update)?;
            stage = next_stage(stage, &state, &self.config);
        }

        let report = state.into_report()?;
        info!(
            score = report.score,
            outcome = ?report.outcome,
            questions = report.questions.len(),
            "Analysis run complete"
        );
        Ok(report)
    }

    async fn execute(
        &self,
        stage: Stage,
        state: &AnalysisState,
    ) -> Result<StageUpdate, PipelineError> {
        let primary = self.registry.primary();

        match stage {
            Stage::ParseResume => {
                info!(stage = stage.as_str(), provider = primary.name(), "Running stage");
                let sections = prompts::resume_analysis(state.resume_text());
                Ok(StageUpdate::ResumeAnalysis(self.call(primary, &sections).await?))
            }
            Stage::ParseJd => {
                info!(stage = stage.as_str(), provider = primary.name(), "Running stage");
                let sections = prompts::jd_analysis(state.jd_text());
                Ok(StageUpdate::JdAnalysis(self.call(primary, &sections).await?))
            }
            Stage::Compare => {
                let resume_analysis = state.resume_analysis().ok_or(
                    PipelineError::InvalidTransition {
                        stage,
                        missing: "resume_analysis",
                    },
                )?;
                let jd_analysis =
                    state
                        .jd_analysis()
                        .ok_or(PipelineError::InvalidTransition {
                            stage,
                            missing: "jd_analysis",
                        })?;
                let sections = prompts::comparison(resume_analysis, jd_analysis);
                let sections = &sections;

                // try_join_all yields in input order, not completion order
                let calls = self.registry.comparison().iter().map(|provider| async move {
                    info!(stage = stage.as_str(), provider = provider.name(), "Running stage");
                    let text = self.call(provider.as_ref(), sections).await?;
                    Ok::<_, PipelineError>(ProviderComparison {
                        provider: provider.name().to_string(),
                        text,
                    })
                });
                Ok(StageUpdate::Comparisons(try_join_all(calls).await?))
            }
            Stage::Consensus => {
                let score = consensus_of(state.comparisons());
                info!(stage = stage.as_str(), score, "Consensus reached");
                Ok(StageUpdate::Consensus(score))
            }
            Stage::GenerateQuestions => {
                let comparison =
                    state
                        .primary_comparison()
                        .ok_or(PipelineError::InvalidTransition {
                            stage,
                            missing: "comparisons",
                        })?;
                info!(stage = stage.as_str(), provider = primary.name(), "Running stage");
                let sections =
                    prompts::question_generation(&comparison.text, self.config.question_count);
                Ok(StageUpdate::Questions(self.call(primary, &sections).await?))
            }
            Stage::End => Err(PipelineError::InvalidTransition {
                stage,
                missing: "a runnable stage",
            }),
        }
    }

    /// One provider call bounded by the stage timeout.
    async fn call(
        &self,
        provider: &dyn ProviderAdapter,
        sections: &PromptSections,
    ) -> Result<String, PipelineError> {
        debug!(
            provider = provider.name(),
            prompt_chars = sections.total_len(),
            "Calling provider"
        );
        let generation =
            provider.generate(sections, self.config.temperature, self.config.max_tokens);

        match tokio::time::timeout(self.config.stage_timeout, generation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderCallFailed::new(
                provider.name(),
                LlmError::Timeout(self.config.stage_timeout),
            )
            .into()),
        }
    }

    /// One guarded refinement turn on the primary provider. Independent of `run`.
    #[instrument(skip_all, fields(history_len = request.conversation_history.len()))]
    pub async fn refine(
        &self,
        request: RefinementRequest,
    ) -> Result<RefinementOutcome, PipelineError> {
        request.validate()?;

        let count = current_question_count(
            &request.conversation_history,
            request.original_questions_raw.as_deref(),
            self.config.question_count,
        );
        let sections = prompts::refinement(
            &request.comparison_result_raw,
            request.original_questions_raw.as_deref(),
            &request.conversation_history,
            &request.user_message,
            count,
        );

        let primary = self.registry.primary();
        info!(provider = primary.name(), question_count = count, "Refining questions");
        let response = self.call(primary, &sections).await?;

        Ok(evaluate_response(
            &request.conversation_history,
            &request.user_message,
            &response,
        ))
    }
}
