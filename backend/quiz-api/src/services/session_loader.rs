//! Rebuilds a [`CandidateSession`] from the durable store after a cache miss.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeSet, HashSet};

use crate::error::QuizError;
use crate::metrics::track_store_operation;
use crate::models::{AnswerOption, CandidateSession, Question, Tag};
use crate::services::question_pool::QuestionPool;
use crate::services::QuizSettings;
use crate::store::{GraphStore, Node};
use crate::utils::time::{format_elapsed, parse_timestamp};

/// One `candidate.question` attempt node.
#[derive(Debug, Clone)]
struct AttemptRecord {
    cuid: String,
    question_uid: String,
    asked: Option<DateTime<Utc>>,
    answered: bool,
    score: f64,
}

pub struct SessionLoader<'a> {
    store: &'a dyn GraphStore,
    settings: &'a QuizSettings,
}

impl<'a> SessionLoader<'a> {
    pub fn new(store: &'a dyn GraphStore, settings: &'a QuizSettings) -> Self {
        Self { store, settings }
    }

    pub async fn load(&self, candidate_id: &str) -> Result<CandidateSession, QuizError> {
        let candidate = self.node(candidate_id).await?.ok_or(QuizError::NotFound)?;

        let quiz_uid = candidate
            .edges("candidate.quiz")
            .first()
            .map(|uid| uid.to_string())
            .ok_or_else(|| {
                QuizError::inconsistent(format!("candidate {} has no quiz", candidate_id))
            })?;
        let quiz = self
            .node(&quiz_uid)
            .await?
            .ok_or_else(|| QuizError::inconsistent(format!("quiz {} not found", quiz_uid)))?;

        let quiz_threshold = quiz
            .parse::<f64>("quiz.threshold")
            .unwrap_or(self.settings.default_threshold);
        let quiz_duration = quiz
            .parse::<i64>("quiz.duration")
            .map(TimeDelta::minutes)
            .unwrap_or(self.settings.quiz_duration);

        let mut questions = Vec::new();
        for uid in quiz.edges("quiz.question") {
            questions.push(self.load_question(uid).await?);
        }

        let mut attempts = Vec::new();
        for cuid in candidate.edges("candidate.question") {
            match self.load_attempt(cuid).await? {
                Some(attempt) => attempts.push(attempt),
                None => tracing::warn!(
                    "Skipping attempt {} of candidate {}: no question recorded",
                    cuid,
                    candidate_id
                ),
            }
        }
        attempts.sort_by_key(|attempt| attempt.asked);

        let answered: HashSet<&str> = attempts
            .iter()
            .filter(|attempt| attempt.answered)
            .map(|attempt| attempt.question_uid.as_str())
            .collect();

        let num_questions = questions.len();
        let max_score = questions.iter().fold(0.0, |acc, q| acc + q.positive);
        let lowest_level = questions.iter().map(|q| q.level).min().unwrap_or(1);
        let qns = QuestionPool::from_questions(
            questions
                .into_iter()
                .filter(|q| !answered.contains(q.uid.as_str())),
        );

        let last_qn_uid = candidate
            .literal("candidate.lastqnuid")
            .filter(|uid| !uid.is_empty())
            .map(str::to_string);
        let last_attempt = last_qn_uid.as_deref().and_then(|uid| {
            attempts
                .iter()
                .rev()
                .find(|attempt| attempt.question_uid == uid)
        });

        let last_time_taken = match attempts.as_slice() {
            [.., previous, last] => match (previous.asked, last.asked) {
                (Some(previous), Some(last)) => format_elapsed(last - previous),
                _ => "0s".to_string(),
            },
            _ => "0s".to_string(),
        };

        let completed = candidate.literal("complete") == Some("true");
        let attempt_score = attempts
            .iter()
            .fold(0.0, |acc, attempt| acc + attempt.score);
        let score = if completed {
            candidate.parse::<f64>("score").unwrap_or(attempt_score)
        } else {
            attempt_score
        };

        let session = CandidateSession {
            candidate_id: candidate_id.to_string(),
            name: candidate.literal("name").unwrap_or_default().to_string(),
            email: candidate.literal("email").unwrap_or_default().to_string(),
            quiz_start: candidate.literal("quiz_start").and_then(parse_timestamp),
            quiz_duration,
            level: qns.current_level().unwrap_or(lowest_level),
            score,
            quiz_threshold,
            last_qn_asked: last_attempt.and_then(|attempt| attempt.asked),
            last_qn_cuid: last_attempt.map(|attempt| attempt.cuid.clone()),
            last_qn_answered: last_attempt.map(|attempt| attempt.answered).unwrap_or(false),
            last_qn_uid,
            last_time_taken,
            num_questions,
            qn_idx: attempts.len(),
            max_score,
            completed,
            qns,
        };

        tracing::info!(
            "Rehydrated candidate {}: qn_idx={}, remaining={}, score={}, completed={}",
            candidate_id,
            session.qn_idx,
            session.qns.remaining(),
            session.score,
            session.completed
        );
        Ok(session)
    }

    async fn node(&self, uid: &str) -> Result<Option<Node>, QuizError> {
        let node = track_store_operation("node", self.store.backend(), self.store.node(uid)).await?;
        Ok(node)
    }

    async fn load_question(&self, uid: &str) -> Result<Question, QuizError> {
        let node = self
            .node(uid)
            .await?
            .ok_or_else(|| QuizError::inconsistent(format!("question {} not found", uid)))?;

        let mut options = Vec::new();
        for option_uid in node.edges("question.option") {
            let option = self.node(option_uid).await?;
            options.push(AnswerOption {
                uid: option_uid.to_string(),
                name: option
                    .as_ref()
                    .and_then(|o| o.literal("name"))
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        let mut tags = Vec::new();
        for tag_uid in node.edges("question.tag") {
            if let Some(tag) = self.node(tag_uid).await? {
                tags.push(Tag {
                    uid: tag_uid.to_string(),
                    name: tag.literal("name").unwrap_or_default().to_string(),
                });
            }
        }

        let correct: BTreeSet<String> = node
            .edges("question.correct")
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(Question {
            uid: uid.to_string(),
            text: node.literal("text").unwrap_or_default().to_string(),
            options,
            correct,
            multiple: node.parse::<bool>("multiple").unwrap_or(false),
            positive: node.parse::<f64>("positive").unwrap_or(0.0),
            negative: node.parse::<f64>("negative").unwrap_or(0.0),
            level: node.parse::<u32>("level").unwrap_or(1),
            tags,
        })
    }

    /// `None` for an attempt edge whose node never got its question link.
    async fn load_attempt(&self, cuid: &str) -> Result<Option<AttemptRecord>, QuizError> {
        let Some(node) = self.node(cuid).await? else {
            return Ok(None);
        };
        let Some(question_uid) = node.edges("question.uid").first().map(|uid| uid.to_string())
        else {
            return Ok(None);
        };

        Ok(Some(AttemptRecord {
            cuid: cuid.to_string(),
            question_uid,
            asked: node.literal("question.asked").and_then(parse_timestamp),
            answered: node.literal("question.answered_at").is_some(),
            score: node.parse::<f64>("question.score").unwrap_or(0.0),
        }))
    }
}
