use chrono::{DateTime, TimeDelta, Utc};

use crate::models::question::Question;
use crate::services::question_pool::QuestionPool;

/// Where a session stands when a delivery request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No question served yet, `quiz_start` unset.
    Uninitialized,
    Active,
    TimedOut,
    Completed,
}

/// In-memory progress of one candidate through their quiz.
#[derive(Debug, Clone)]
pub struct CandidateSession {
    pub candidate_id: String,
    pub name: String,
    pub email: String,
    /// Set once, on the first delivery request.
    pub quiz_start: Option<DateTime<Utc>>,
    pub quiz_duration: TimeDelta,
    pub level: u32,
    pub qns: QuestionPool,
    pub score: f64,
    pub quiz_threshold: f64,
    pub last_qn_asked: Option<DateTime<Utc>>,
    /// Canonical question uid of the last delivery.
    pub last_qn_uid: Option<String>,
    /// Attempt uid created for `last_qn_uid`.
    pub last_qn_cuid: Option<String>,
    pub last_qn_answered: bool,
    /// `time_taken` echoed with the last delivery, repeated on re-delivery.
    pub last_time_taken: String,
    pub num_questions: usize,
    pub qn_idx: usize,
    pub max_score: f64,
    pub completed: bool,
}

impl CandidateSession {
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        match self.quiz_start {
            None => SessionState::Uninitialized,
            Some(start) if now - start > self.quiz_duration => SessionState::TimedOut,
            Some(_) if self.completed => SessionState::Completed,
            Some(_) => SessionState::Active,
        }
    }

    /// Remaining time budget, the whole budget before the first question.
    pub fn time_left(&self, now: DateTime<Utc>) -> TimeDelta {
        match self.quiz_start {
            None => self.quiz_duration,
            Some(start) => (start + self.quiz_duration - now).max(TimeDelta::zero()),
        }
    }

    /// The question that must be served again instead of a new one.
    ///
    /// A delivery is pending re-delivery while its attempt is unanswered: the
    /// delivered question is still at the head of the current level queue and
    /// `last_qn_uid` names it. Duplicate or retried requests land here and
    /// reuse `last_qn_cuid` instead of creating a second attempt.
    pub fn pending_redelivery(&self) -> Option<&Question> {
        if self.last_qn_answered {
            return None;
        }
        let last_uid = self.last_qn_uid.as_deref()?;
        self.qns.peek().filter(|head| head.uid == last_uid)
    }

    /// Moves to the lowest level that still has questions.
    pub fn sync_level(&mut self) {
        if let Some(level) = self.qns.current_level() {
            if level != self.level {
                tracing::info!(
                    "Candidate {} advanced from level {} to level {}",
                    self.candidate_id,
                    self.level,
                    level
                );
                self.level = level;
            }
        }
    }

    pub fn below_threshold(&self) -> bool {
        self.score <= self.quiz_threshold
    }
}
