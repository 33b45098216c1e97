//! services/api/src/web/quiz.rs
//!
//! Quiz mode: answers submitted one at a time without adaptive sequencing,
//! then a diagnosis generated from all of them at once.

use crate::error::AppError;
use crate::web::discount::{issue_for_session, DiscountView};
use crate::web::parse_session_id;
use crate::web::response::ApiResponse;
use crate::web::state::{lead_update, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use diagnostic_core::domain::{Diagnosis, QuizAnswer};
use diagnostic_core::{i18n, quiz};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerRequest {
    pub session_id: String,
    pub question_id: u8,
    pub answer: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerView {
    pub question_id: u8,
    pub answer: String,
    pub points: u8,
    pub created_at: DateTime<Utc>,
}

impl From<QuizAnswer> for QuizAnswerView {
    fn from(answer: QuizAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            answer: answer.answer,
            points: answer.points,
            created_at: answer.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswersView {
    pub session_id: Uuid,
    pub answers: Vec<QuizAnswerView>,
    pub score: i32,
    pub percentage: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizDiagnosisView {
    pub session_id: Uuid,
    pub content: String,
    pub score: Option<i32>,
    pub percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<DiscountView>,
}

impl QuizDiagnosisView {
    fn new(diagnosis: Diagnosis, discount: Option<DiscountView>) -> Self {
        Self {
            session_id: diagnosis.session_id,
            content: diagnosis.content,
            score: diagnosis.score,
            percentage: diagnosis.percentage,
            created_at: diagnosis.created_at,
            discount,
        }
    }
}

/// Submit (or replace) the answer to one quiz question.
#[utoipa::path(
    post,
    path = "/api/quiz",
    request_body = QuizAnswerRequest,
    responses(
        (status = 200, description = "Stored answer with its points", body = QuizAnswerView),
        (status = 400, description = "Unknown question or empty answer"),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn submit_quiz_answer_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<QuizAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_session_id(&payload.session_id)?;
    quiz::validate_answer(payload.question_id, &payload.answer)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    app_state.active_session(session_id).await?;

    let answer = payload.answer.trim().to_string();
    let stored = app_state
        .db
        .save_quiz_answer(QuizAnswer {
            id: Uuid::new_v4(),
            session_id,
            question_id: payload.question_id,
            points: quiz::score_answer(&answer),
            answer,
            created_at: Utc::now(),
        })
        .await?;

    Ok(ApiResponse::ok(QuizAnswerView::from(stored)))
}

/// All quiz answers of a session with the running score.
#[utoipa::path(
    get,
    path = "/api/quiz/{sessionId}",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Answers and score", body = QuizAnswersView),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn get_quiz_answers_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .active_session(parse_session_id(&session_id)?)
        .await?;
    let answers = app_state.db.get_quiz_answers(session.id).await?;
    let (score, percentage) = quiz::total_score(&answers);

    Ok(ApiResponse::ok(QuizAnswersView {
        session_id: session.id,
        answers: answers.into_iter().map(QuizAnswerView::from).collect(),
        score,
        percentage,
    }))
}

/// Generate the diagnosis from the submitted quiz answers.
#[utoipa::path(
    post,
    path = "/api/quiz/{sessionId}/diagnosis",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Generated diagnosis", body = QuizDiagnosisView),
        (status = 400, description = "No answers submitted yet"),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn generate_quiz_diagnosis_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .active_session(parse_session_id(&session_id)?)
        .await?;
    let answers = app_state.db.get_quiz_answers(session.id).await?;
    if answers.is_empty() {
        return Err(AppError::Validation(
            "submit at least one quiz answer first".to_string(),
        ));
    }

    let language = session.language;
    let (score, percentage) = quiz::total_score(&answers);
    let answered = quiz::as_answered_questions(&answers, language);

    let content = match app_state
        .diagnoses
        .generate_diagnosis(
            session.user_name.as_deref(),
            &answered,
            session.image_analysis.as_deref(),
            language,
            None,
        )
        .await
    {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => i18n::diagnosis_fallback(language).to_string(),
        Err(e) => {
            tracing::warn!(
                session_id = %session.id,
                "Quiz diagnosis failed, using fallback: {}",
                e
            );
            i18n::diagnosis_fallback(language).to_string()
        }
    };

    let diagnosis = app_state
        .db
        .upsert_diagnosis(Diagnosis {
            id: Uuid::new_v4(),
            session_id: session.id,
            content,
            score: Some(score),
            percentage: Some(percentage),
            created_at: Utc::now(),
        })
        .await?;
    tracing::info!(session_id = %session.id, score, percentage, "Quiz diagnosis stored");

    let discount = issue_for_session(&app_state, session.id).await?;
    app_state.sync_lead(lead_update(
        &session,
        Some(diagnosis.content.clone()),
        Some(discount.code.clone()),
    ));

    Ok(ApiResponse::ok(QuizDiagnosisView::new(
        diagnosis,
        Some(DiscountView::from(discount)),
    )))
}

/// The stored diagnosis of a session.
#[utoipa::path(
    get,
    path = "/api/quiz/{sessionId}/diagnosis",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Stored diagnosis", body = QuizDiagnosisView),
        (status = 404, description = "No diagnosis yet")
    )
)]
pub async fn get_quiz_diagnosis_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_session_id(&session_id)?;
    let diagnosis = app_state.db.get_diagnosis_for_session(session_id).await?;
    Ok(ApiResponse::ok(QuizDiagnosisView::new(diagnosis, None)))
}
