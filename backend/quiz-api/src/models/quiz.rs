use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::AnswerOption;

/// Question id the client treats as "quiz complete".
pub const END_SENTINEL: &str = "END";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuestionRequest {
    #[serde(default)]
    pub repeat: bool,
}

/// Question delivery payload, or the END sentinel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionResponse {
    /// Canonical question uid, `END` once the quiz is over.
    pub uid: String,
    /// Attempt uid the answer must reference.
    pub cuid: String,
    pub text: String,
    pub options: Vec<AnswerOption>,
    pub multiple: bool,
    pub positive: f64,
    pub negative: f64,
    pub tags: Vec<String>,
    pub score: f64,
    pub time_taken: String,
    pub idx: usize,
    pub num_qns: usize,
}

impl QuestionResponse {
    pub fn end(score: f64) -> Self {
        Self {
            uid: END_SENTINEL.to_string(),
            score,
            ..Self::default()
        }
    }

    pub fn is_end(&self) -> bool {
        self.uid == END_SENTINEL
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, message = "cuid must not be empty"))]
    pub cuid: String,
    /// Empty means the candidate skipped the question.
    #[serde(default)]
    #[validate(length(max = 32, message = "too many options selected"))]
    pub option_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    pub skipped: bool,
    pub score_delta: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub time_left: String,
    pub quiz_started: bool,
    pub completed: bool,
}
