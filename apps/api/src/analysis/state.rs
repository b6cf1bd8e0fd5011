//! Per-run pipeline state and the pure transition function.

use serde::Serialize;
use tracing::warn;

use crate::analysis::consensus::average_scores;
use crate::analysis::engine::EngineConfig;
use crate::analysis::models::{
    AnalysisOutcome, AnalysisReport, ProviderComparison, ProviderScore,
};
use crate::analysis::parser::{extract_score, has_match_score, parse_comparison, parse_questions};
use crate::analysis::refinement::ConversationLog;
use crate::analysis::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    ParseResume,
    ParseJd,
    Compare,
    Consensus,
    GenerateQuestions,
    End,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ParseResume => "parse_resume",
            Stage::ParseJd => "parse_jd",
            Stage::Compare => "compare",
            Stage::Consensus => "consensus",
            Stage::GenerateQuestions => "generate_questions",
            Stage::End => "end",
        }
    }
}

/// Output of one stage. Each variant fills exactly one field of `AnalysisState`.
#[derive(Debug, Clone)]
pub enum StageUpdate {
    ResumeAnalysis(String),
    JdAnalysis(String),
    /// One entry per comparison provider, in registry order.
    Comparisons(Vec<ProviderComparison>),
    Consensus(u32),
    Questions(String),
}

impl StageUpdate {
    pub fn stage(&self) -> Stage {
        match self {
            StageUpdate::ResumeAnalysis(_) => Stage::ParseResume,
            StageUpdate::JdAnalysis(_) => Stage::ParseJd,
            StageUpdate::Comparisons(_) => Stage::Compare,
            StageUpdate::Consensus(_) => Stage::Consensus,
            StageUpdate::Questions(_) => Stage::GenerateQuestions,
        }
    }
}

/// Threaded through one run and dropped once the report is extracted.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    resume_text: String,
    jd_text: String,
    resume_analysis: Option<String>,
    jd_analysis: Option<String>,
    comparisons: Vec<ProviderComparison>,
    consensus_score: Option<u32>,
    questions_raw: Option<String>,
    conversation_history: ConversationLog,
}

impl AnalysisState {
    pub fn new(resume_text: impl Into<String>, jd_text: impl Into<String>) -> Self {
        Self {
            resume_text: resume_text.into(),
            jd_text: jd_text.into(),
            resume_analysis: None,
            jd_analysis: None,
            comparisons: Vec::new(),
            consensus_score: None,
            questions_raw: None,
            conversation_history: ConversationLog::new(),
        }
    }

    /// Applies one stage's output. An update whose prerequisites are missing is rejected.
    pub fn apply(mut self, update: StageUpdate) -> Result<Self, PipelineError> {
        let stage = update.stage();
        let missing = |missing: &'static str| PipelineError::InvalidTransition { stage, missing };

        match update {
            StageUpdate::ResumeAnalysis(text) => {
                self.resume_analysis = Some(text);
            }
            StageUpdate::JdAnalysis(text) => {
                if self.resume_analysis.is_none() {
                    return Err(missing("resume_analysis"));
                }
                self.jd_analysis = Some(text);
            }
            StageUpdate::Comparisons(comparisons) => {
                if self.jd_analysis.is_none() {
                    return Err(missing("jd_analysis"));
                }
                if comparisons.is_empty() {
                    return Err(missing("at least one comparison"));
                }
                self.comparisons = comparisons;
            }
            StageUpdate::Consensus(score) => {
                if self.comparisons.is_empty() {
                    return Err(missing("comparisons"));
                }
                self.consensus_score = Some(score.min(100));
            }
            StageUpdate::Questions(text) => {
                if self.consensus_score.is_none() {
                    return Err(missing("consensus_score"));
                }
                self.questions_raw = Some(text);
            }
        }
        Ok(self)
    }

    pub fn resume_text(&self) -> &str {
        &self.resume_text
    }

    pub fn jd_text(&self) -> &str {
        &self.jd_text
    }

    pub fn resume_analysis(&self) -> Option<&str> {
        self.resume_analysis.as_deref()
    }

    pub fn jd_analysis(&self) -> Option<&str> {
        self.jd_analysis.as_deref()
    }

    pub fn comparisons(&self) -> &[ProviderComparison] {
        &self.comparisons
    }

    /// First comparison in registry order; drives the branch and question generation.
    pub fn primary_comparison(&self) -> Option<&ProviderComparison> {
        self.comparisons.first()
    }

    pub fn consensus_score(&self) -> Option<u32> {
        self.consensus_score
    }

    pub fn into_report(self) -> Result<AnalysisReport, PipelineError> {
        let score = self
            .consensus_score
            .ok_or(PipelineError::InvalidTransition {
                stage: Stage::End,
                missing: "consensus_score",
            })?;
        let primary = self
            .primary_comparison()
            .cloned()
            .ok_or(PipelineError::InvalidTransition {
                stage: Stage::End,
                missing: "comparisons",
            })?;

        let provider_scores = self
            .comparisons
            .iter()
            .map(|c| ProviderScore {
                provider: c.provider.clone(),
                score: extract_score(&c.text),
            })
            .collect();

        let parsed = parse_comparison(&primary.text);

        let (questions, outcome) = match &self.questions_raw {
            Some(raw) => {
                let questions = parse_questions(raw);
                if questions.is_empty() {
                    warn!("Question generation ran but no question blocks could be parsed");
                }
                (questions, AnalysisOutcome::QuestionsGenerated)
            }
            None => (Vec::new(), AnalysisOutcome::LowMatch),
        };

        Ok(AnalysisReport {
            score,
            provider_scores,
            missing_skills: parsed.missing_skills,
            matching_skills: parsed.matching_skills,
            alignment_summary: parsed.alignment_summary,
            questions,
            comparison_result_raw: primary.text,
            questions_raw: self.questions_raw,
            outcome,
            conversation_history: self.conversation_history,
        })
    }
}

/// Question generation runs only when the primary comparison kept the score format and the
/// consensus reached the threshold.
pub fn should_generate_questions(state: &AnalysisState, acceptance_threshold: u32) -> bool {
    let has_score_section = state
        .primary_comparison()
        .is_some_and(|c| has_match_score(&c.text));
    let accepted = state
        .consensus_score()
        .is_some_and(|score| score >= acceptance_threshold);
    has_score_section && accepted
}

pub fn next_stage(stage: Stage, state: &AnalysisState, config: &EngineConfig) -> Stage {
    match stage {
        Stage::ParseResume => Stage::ParseJd,
        Stage::ParseJd => Stage::Compare,
        Stage::Compare => Stage::Consensus,
        Stage::Consensus => {
            if should_generate_questions(state, config.acceptance_threshold) {
                Stage::GenerateQuestions
            } else {
                Stage::End
            }
        }
        Stage::GenerateQuestions | Stage::End => Stage::End,
    }
}

/// Consensus value for a set of comparison texts.
pub fn consensus_of(comparisons: &[ProviderComparison]) -> u32 {
    let scores: Vec<u32> = comparisons.iter().map(|c| extract_score(&c.text)).collect();
    average_scores(&scores)
}
