use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use crate::error::QuizError;
use crate::extractors::AppJson;
use crate::middlewares::auth::JwtClaims;
use crate::models::{NextQuestionRequest, SubmitAnswerRequest};
use crate::services::AppState;

pub async fn next_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<NextQuestionRequest>,
) -> Result<impl IntoResponse, QuizError> {
    tracing::info!(
        "Question requested by candidate {} (repeat={})",
        claims.sub,
        req.repeat
    );

    let question = state.engine.next_question(&claims.sub, req.repeat).await?;
    Ok(Json(question))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    req.validate()
        .map_err(|e| QuizError::validation(e.to_string()))?;

    tracing::info!(
        "Answer submitted by candidate {} for attempt {}",
        claims.sub,
        req.cuid
    );

    let res = state.engine.submit_answer(&claims.sub, &req).await?;
    Ok(Json(res))
}

pub async fn ping(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, QuizError> {
    let res = state.engine.ping(&claims.sub).await?;
    Ok(Json(res))
}
