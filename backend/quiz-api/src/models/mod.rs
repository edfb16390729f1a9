pub mod question;
pub mod quiz;
pub mod session;

pub use question::{AnswerOption, Question, Tag};
pub use quiz::{
    NextQuestionRequest, PingResponse, QuestionResponse, SubmitAnswerRequest,
    SubmitAnswerResponse, END_SENTINEL,
};
pub use session::{CandidateSession, SessionState};
