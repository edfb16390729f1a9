//! Quiz session state machine.
//!
//! Every request for a candidate runs under that candidate's cache lock, so
//! duplicate or racing requests observe each other's effects in order. The
//! engine works on a copy of the cached session and writes it back only after
//! the store accepted the step's mutation (write-through): a failed store call
//! leaves both the cache and the store where they were, and the client can
//! simply retry.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::QuizError;
use crate::metrics::{
    track_store_operation, ANSWERS_SUBMITTED_TOTAL, QUESTIONS_DELIVERED_TOTAL,
    QUIZZES_COMPLETED_TOTAL,
};
use crate::models::{
    CandidateSession, PingResponse, Question, QuestionResponse, SessionState,
    SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::services::notification_service::{CompletionReport, Notifier};
use crate::services::question_pool::shuffled_options;
use crate::services::session_cache::{SessionCache, SessionGuard};
use crate::services::session_loader::SessionLoader;
use crate::services::QuizSettings;
use crate::store::{GraphStore, Mutation, MutationResponse, Term};
use crate::utils::time::{format_elapsed, format_timestamp, now};
use crate::utils::to_fixed;

/// Blank label of the attempt node created by a delivery.
const ATTEMPT_LABEL: &str = "qn";

pub struct QuizEngine {
    store: Arc<dyn GraphStore>,
    sessions: Arc<SessionCache>,
    notifier: Arc<dyn Notifier>,
    settings: QuizSettings,
}

impl QuizEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        sessions: Arc<SessionCache>,
        notifier: Arc<dyn Notifier>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            store,
            sessions,
            notifier,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Serves the next question, re-serves the outstanding one, or ends the quiz.
    pub async fn next_question(
        &self,
        candidate_id: &str,
        repeat: bool,
    ) -> Result<QuestionResponse, QuizError> {
        let mut slot = self.sessions.lock(candidate_id).await;
        let mut session = self.hydrate(&mut slot, candidate_id).await?;
        let now = now();

        if session.state(now) == SessionState::Uninitialized {
            let mut m = Mutation::new();
            m.set_literal(Term::uid(candidate_id), "quiz_start", format_timestamp(now));
            self.mutate("quiz_start", &m).await?;

            session.quiz_start = Some(now);
            *slot = Some(session.clone());
            tracing::info!("Quiz started for candidate {}", candidate_id);
        }

        match session.state(now) {
            SessionState::TimedOut => {
                tracing::warn!("Candidate {} asked for a question after time ran out", candidate_id);
                return Err(QuizError::AlreadyTerminated);
            }
            SessionState::Completed => {
                record_delivery("terminal", repeat);
                return Ok(QuestionResponse::end(to_fixed(session.score, 2)));
            }
            SessionState::Uninitialized | SessionState::Active => {}
        }

        if let Some(question) = session.pending_redelivery() {
            let cuid = session.last_qn_cuid.clone().ok_or_else(|| {
                QuizError::inconsistent(format!(
                    "candidate {} has a delivered question without an attempt",
                    candidate_id
                ))
            })?;
            tracing::info!(
                "Re-delivering question {} (attempt {}) to candidate {}",
                question.uid,
                cuid,
                candidate_id
            );
            record_delivery("redelivered", repeat);
            return Ok(delivery_response(
                question,
                &cuid,
                &session,
                session.last_time_taken.clone(),
            ));
        }

        // The threshold only applies once at least one answer has been scored.
        session.sync_level();
        let below_threshold = session.qn_idx > 0 && session.below_threshold();
        if session.qns.is_exhausted() || below_threshold {
            let reason = if session.qns.is_exhausted() {
                "exhausted"
            } else {
                "threshold"
            };
            let end = self.complete(slot, session, reason, now).await?;
            record_delivery("terminal", repeat);
            return Ok(end);
        }

        self.deliver_new(slot, session, now, repeat).await
    }

    /// Scores the answer for the outstanding attempt.
    pub async fn submit_answer(
        &self,
        candidate_id: &str,
        req: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, QuizError> {
        let mut slot = self.sessions.lock(candidate_id).await;
        let mut session = self.hydrate(&mut slot, candidate_id).await?;
        let now = now();

        match session.state(now) {
            SessionState::TimedOut | SessionState::Completed => {
                return Err(QuizError::AlreadyTerminated)
            }
            SessionState::Uninitialized => {
                return Err(QuizError::validation("No question has been asked yet"))
            }
            SessionState::Active => {}
        }

        if session.last_qn_cuid.as_deref() != Some(req.cuid.as_str()) {
            return Err(QuizError::validation(format!(
                "Attempt {} is not the current question",
                req.cuid
            )));
        }
        if session.last_qn_answered {
            return Err(QuizError::validation(format!(
                "Attempt {} has already been answered",
                req.cuid
            )));
        }
        let question = session.pending_redelivery().cloned().ok_or_else(|| {
            QuizError::inconsistent(format!(
                "attempt {} has no pending question for candidate {}",
                req.cuid, candidate_id
            ))
        })?;

        let selected: BTreeSet<String> = req.option_ids.iter().cloned().collect();
        if let Some(unknown) = selected.iter().find(|id| !question.has_option(id)) {
            return Err(QuizError::validation(format!(
                "Option {} does not belong to this question",
                unknown
            )));
        }
        if !question.multiple && selected.len() > 1 {
            return Err(QuizError::validation(
                "This question only has a single correct answer",
            ));
        }

        let skipped = selected.is_empty();
        let correct = question.is_correct_selection(&selected);
        let score_delta = if skipped {
            0.0
        } else if correct {
            question.positive
        } else {
            -question.negative
        };
        let score = session.score + score_delta;

        let attempt = Term::uid(req.cuid.as_str());
        let mut m = Mutation::new();
        for option in &selected {
            m.set_edge(attempt.clone(), "question.answered", Term::uid(option.as_str()));
        }
        m.set_literal(attempt.clone(), "question.answered_at", format_timestamp(now))
            .set_literal(attempt, "question.score", score_delta)
            .set_literal(Term::uid(candidate_id), "score", score);
        self.mutate("answer", &m).await?;

        session.qns.pop_front();
        session.score = score;
        session.last_qn_answered = true;
        session.sync_level();
        *slot = Some(session);

        let outcome = if skipped {
            "skipped"
        } else if correct {
            "correct"
        } else {
            "incorrect"
        };
        ANSWERS_SUBMITTED_TOTAL.with_label_values(&[outcome]).inc();
        tracing::info!(
            "Candidate {} answered question {} ({}): delta={}, score={}",
            candidate_id,
            question.uid,
            outcome,
            score_delta,
            score
        );

        Ok(SubmitAnswerResponse {
            correct,
            skipped,
            score_delta,
            score: to_fixed(score, 2),
        })
    }

    /// Time left for the candidate; never mutates anything.
    pub async fn ping(&self, candidate_id: &str) -> Result<PingResponse, QuizError> {
        let mut slot = self.sessions.lock(candidate_id).await;
        let session = self.hydrate(&mut slot, candidate_id).await?;
        let now = now();

        let time_left = if session.completed {
            TimeDelta::zero()
        } else {
            session.time_left(now)
        };

        Ok(PingResponse {
            time_left: format_elapsed(time_left),
            quiz_started: session.quiz_start.is_some(),
            completed: session.completed,
        })
    }

    /// Cached session, loading it from the store on a miss.
    async fn hydrate(
        &self,
        slot: &mut SessionGuard,
        candidate_id: &str,
    ) -> Result<CandidateSession, QuizError> {
        if let Some(session) = &**slot {
            return Ok(session.clone());
        }

        let session = SessionLoader::new(self.store.as_ref(), &self.settings)
            .load(candidate_id)
            .await?;
        **slot = Some(session.clone());
        self.sessions.record_size();
        Ok(session)
    }

    async fn deliver_new(
        &self,
        mut slot: SessionGuard,
        mut session: CandidateSession,
        now: DateTime<Utc>,
        repeat: bool,
    ) -> Result<QuestionResponse, QuizError> {
        let question = session
            .qns
            .peek()
            .cloned()
            .ok_or_else(|| QuizError::inconsistent("question pool emptied during delivery"))?;
        let candidate = Term::uid(session.candidate_id.as_str());
        let attempt = Term::blank(ATTEMPT_LABEL);

        let mut m = Mutation::new();
        m.set_edge(candidate.clone(), "candidate.question", attempt.clone())
            .set_edge(attempt.clone(), "question.uid", Term::uid(question.uid.as_str()))
            .set_edge(
                Term::uid(question.uid.as_str()),
                "question.candidate",
                candidate.clone(),
            )
            .set_literal(attempt, "question.asked", format_timestamp(now))
            .set_literal(candidate, "candidate.lastqnuid", &question.uid);
        let res = self.mutate("deliver", &m).await?;

        let cuid = res.uid(ATTEMPT_LABEL).map(str::to_string).ok_or_else(|| {
            QuizError::inconsistent(format!(
                "store generated no attempt uid for question {}",
                question.uid
            ))
        })?;

        let time_taken = match session.last_qn_asked {
            None => "0s".to_string(),
            Some(previous) => format_elapsed(now - previous),
        };

        session.last_qn_uid = Some(question.uid.clone());
        session.last_qn_cuid = Some(cuid.clone());
        session.last_qn_asked = Some(now);
        session.last_qn_answered = false;
        session.last_time_taken = time_taken.clone();
        session.qn_idx += 1;
        *slot = Some(session.clone());

        tracing::info!(
            "Delivered question {} as attempt {} to candidate {} ({}/{})",
            question.uid,
            cuid,
            session.candidate_id,
            session.qn_idx,
            session.num_questions
        );
        record_delivery("new", repeat);
        Ok(delivery_response(&question, &cuid, &session, time_taken))
    }

    async fn complete(
        &self,
        mut slot: SessionGuard,
        mut session: CandidateSession,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<QuestionResponse, QuizError> {
        let score = to_fixed(session.score, 2);
        let candidate = Term::uid(session.candidate_id.as_str());

        // Completion is persisted before anyone is told about it.
        let mut m = Mutation::new();
        m.set_literal(candidate.clone(), "complete", true)
            .set_literal(candidate.clone(), "completed_at", format_timestamp(now))
            .set_literal(candidate, "score", score);
        self.mutate("complete", &m).await?;

        session.completed = true;
        *slot = Some(session.clone());
        QUIZZES_COMPLETED_TOTAL.with_label_values(&[reason]).inc();
        tracing::info!(
            "Quiz completed for candidate {} ({}): score={}",
            session.candidate_id,
            reason,
            score
        );

        let report = CompletionReport {
            candidate_id: session.candidate_id.clone(),
            name: session.name.clone(),
            email: session.email.clone(),
            score,
            max_score: session.max_score,
            report_id: session.candidate_id.clone(),
            report_url: format!(
                "{}/#/admin/invite/candidate-report/{}",
                self.settings.public_url.trim_end_matches('/'),
                session.candidate_id
            ),
        };
        self.notifier
            .notify_completion(&report)
            .await
            .map_err(|e| QuizError::Notification(e.to_string()))?;

        Ok(QuestionResponse::end(score))
    }

    async fn mutate(&self, step: &str, m: &Mutation) -> Result<MutationResponse, QuizError> {
        tracing::debug!("Store mutation ({}):\n{}", step, m.to_rdf());
        let res = track_store_operation(step, self.store.backend(), self.store.mutate(m)).await?;
        Ok(res)
    }
}

fn delivery_response(
    question: &Question,
    cuid: &str,
    session: &CandidateSession,
    time_taken: String,
) -> QuestionResponse {
    QuestionResponse {
        uid: question.uid.clone(),
        cuid: cuid.to_string(),
        text: question.text.clone(),
        options: shuffled_options(question),
        multiple: question.multiple,
        positive: question.positive,
        negative: question.negative,
        tags: question.tags.iter().map(|tag| tag.name.clone()).collect(),
        score: to_fixed(session.score, 2),
        time_taken,
        idx: session.qn_idx,
        num_qns: session.num_questions,
    }
}

fn record_delivery(kind: &str, repeat: bool) {
    QUESTIONS_DELIVERED_TOTAL
        .with_label_values(&[kind, if repeat { "true" } else { "false" }])
        .inc();
}
