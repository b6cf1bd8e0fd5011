//! Guarded refinement of a generated question set.
//!
//! The conversation log is immutable: appending returns a new log and the caller's copy is
//! never touched. A guard refusal leaves the history exactly as it came in.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::models::Question;
use crate::analysis::parser::parse_questions;
use crate::analysis::PipelineError;

/// Substring that identifies a guard refusal in a model response.
pub const REFUSAL_MARKER: &str = "I can only help with refining the interview questions.";

/// Canonical sentence the model is told to answer off-topic requests with.
pub const REFUSAL_MESSAGE: &str = "I can only help with refining the interview questions. \
    Please provide more information about the candidate or the role to help me improve the questions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only refinement history. Serializes as a plain JSON array of turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog(Vec<ConversationTurn>);

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// New log with one exchange added at the end.
    pub fn appended(&self, user: ConversationTurn, assistant: ConversationTurn) -> Self {
        let mut turns = Vec::with_capacity(self.0.len() + 2);
        turns.extend_from_slice(&self.0);
        turns.push(user);
        turns.push(assistant);
        Self(turns)
    }

    pub fn last_assistant(&self) -> Option<&ConversationTurn> {
        self.0.iter().rev().find(|t| t.role == Role::Assistant)
    }

    /// One `role: content` line per turn.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefinementRequest {
    pub comparison_result_raw: String,
    #[serde(default)]
    pub original_questions_raw: Option<String>,
    pub user_message: String,
    #[serde(default)]
    pub conversation_history: ConversationLog,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RefinementOutcome {
    /// Guard refusal; `conversation_history` is the caller's log, unchanged.
    Warning {
        warning: String,
        conversation_history: ConversationLog,
    },
    Refined {
        questions: Vec<Question>,
        questions_raw: String,
        conversation_history: ConversationLog,
    },
}

impl RefinementRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.user_message.trim().is_empty() {
            return Err(PipelineError::Validation(
                "user_message must not be empty".to_string(),
            ));
        }
        if self.comparison_result_raw.trim().is_empty() {
            return Err(PipelineError::Validation(
                "comparison_result_raw must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Question count the model should keep when the user names none: the latest assistant
/// answer, then the original set, then `default_count`. Sets that parse empty are skipped.
pub fn current_question_count(
    history: &ConversationLog,
    original_questions_raw: Option<&str>,
    default_count: usize,
) -> usize {
    let from_history = history
        .last_assistant()
        .map(|t| parse_questions(&t.content).len())
        .filter(|&n| n > 0);
    let from_original = || {
        original_questions_raw
            .map(|raw| parse_questions(raw).len())
            .filter(|&n| n > 0)
    };
    from_history.or_else(from_original).unwrap_or(default_count)
}

pub fn is_refusal(response: &str) -> bool {
    response.contains(REFUSAL_MARKER)
}

/// Turns the raw refinement response into an outcome against the caller's history.
pub fn evaluate_response(
    history: &ConversationLog,
    user_message: &str,
    response: &str,
) -> RefinementOutcome {
    if is_refusal(response) {
        info!("Refinement request refused by guard");
        return RefinementOutcome::Warning {
            warning: response.trim().to_string(),
            conversation_history: history.clone(),
        };
    }

    let questions = parse_questions(response);
    debug!("Refined question set parsed: {} question(s)", questions.len());

    RefinementOutcome::Refined {
        questions,
        questions_raw: response.to_string(),
        conversation_history: history.appended(
            ConversationTurn::new(Role::User, user_message),
            ConversationTurn::new(Role::Assistant, response),
        ),
    }
}
