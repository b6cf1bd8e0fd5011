use serde::{Deserialize, Serialize};

use crate::analysis::refinement::ConversationLog;

/// One entry of the "Missing Skills" section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingSkill {
    pub category: String,
    pub description: String,
}

/// An interview question with the answer the interviewer should expect.
/// Always produced as an ordered `Vec`; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "question")]
    pub question_text: String,
    pub expected_answer: String,
}

/// Structured view over one comparison response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub matching_skills: String,
    pub missing_skills: Vec<MissingSkill>,
    pub alignment_summary: String,
    /// 0 – 100, 0 when the response carried no `N/100` score.
    pub score: u32,
}

/// Raw comparison text produced by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderComparison {
    pub provider: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderScore {
    pub provider: String,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    QuestionsGenerated,
    /// Consensus below the acceptance threshold, or the comparison ignored the score format.
    LowMatch,
}

/// Everything a caller extracts from one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Consensus score across all comparison providers.
    pub score: u32,
    pub provider_scores: Vec<ProviderScore>,
    pub missing_skills: Vec<MissingSkill>,
    pub matching_skills: String,
    pub alignment_summary: String,
    pub questions: Vec<Question>,
    /// Primary provider's comparison text; the input to later refinement calls.
    pub comparison_result_raw: String,
    pub questions_raw: Option<String>,
    pub outcome: AnalysisOutcome,
    /// Fresh, empty log for this run's refinement session.
    pub conversation_history: ConversationLog,
}
