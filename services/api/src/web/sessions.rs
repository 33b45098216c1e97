//! services/api/src/web/sessions.rs
//!
//! Session lifecycle endpoints: create, read and update contact details.

use crate::error::AppError;
use crate::web::response::ApiResponse;
use crate::web::parse_session_id;
use crate::web::state::{lead_update, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use diagnostic_core::domain::{FlowState, Language, NewSession, Session, SessionUpdate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use utoipa::ToSchema;
use uuid::Uuid;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

const MAX_NAME_LEN: usize = 100;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// `es` (default) or `en`.
    pub language: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub wordpress_lead_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub language: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub wordpress_lead_id: Option<String>,
}

/// A session as exposed to clients; the flow internals stay server-side.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub language: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub wordpress_lead_id: Option<String>,
    pub step: String,
    pub diagnostic_mode: String,
    pub engagement_score: u8,
    pub question_index: usize,
    pub has_image_analysis: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let state = &session.flow_state;
        Self {
            id: session.id,
            language: session.language.code().to_string(),
            user_name: session.user_name.clone(),
            user_email: session.user_email.clone(),
            wordpress_lead_id: session.wordpress_lead_id.clone(),
            step: state.step.name().to_string(),
            diagnostic_mode: state.mode.as_str().to_string(),
            engagement_score: state.engagement.total,
            question_index: state.current_question_index(),
            has_image_analysis: session.image_analysis.is_some(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

//=========================================================================================
// Validation helpers
//=========================================================================================

/// Trims optional text and drops it when blank.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn validate_name(name: Option<String>) -> Result<Option<String>, AppError> {
    let name = clean(name);
    if name.as_ref().is_some_and(|n| n.chars().count() > MAX_NAME_LEN) {
        return Err(AppError::Validation(format!(
            "userName must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name)
}

pub(crate) fn validate_email(email: Option<String>) -> Result<Option<String>, AppError> {
    let email = clean(email).map(|e| e.to_lowercase());
    if email.as_ref().is_some_and(|e| !EMAIL_RE.is_match(e)) {
        return Err(AppError::Validation("userEmail is not a valid email address".to_string()));
    }
    Ok(email)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Create a new diagnostic session.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 400, description = "Invalid name or email")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let language = payload
        .language
        .as_deref()
        .map(Language::from_code)
        .unwrap_or_default();
    let user_name = validate_name(payload.user_name)?;
    let new_session = NewSession {
        language,
        user_name: user_name.clone(),
        user_email: validate_email(payload.user_email)?,
        wordpress_lead_id: clean(payload.wordpress_lead_id),
    };

    let session = app_state
        .db
        .create_session(new_session, FlowState::new(language, user_name))
        .await?;
    tracing::info!(session_id = %session.id, language = language.code(), "Session created");

    Ok(ApiResponse::created(SessionView::from(&session)))
}

/// Fetch a session.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session", body = SessionView),
        (status = 400, description = "Malformed session id"),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.active_session(parse_session_id(&id)?).await?;
    Ok(ApiResponse::ok(SessionView::from(&session)))
}

/// Update a session's contact details.
#[utoipa::path(
    put,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionView),
        (status = 400, description = "Invalid name or email"),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn update_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    app_state.active_session(id).await?;

    let update = SessionUpdate {
        language: payload.language.as_deref().map(Language::from_code),
        user_name: validate_name(payload.user_name)?,
        user_email: validate_email(payload.user_email)?,
        wordpress_lead_id: clean(payload.wordpress_lead_id),
    };
    let email_added = update.user_email.is_some();
    let session = app_state.db.update_session_details(id, update).await?;

    if email_added {
        app_state.sync_lead(lead_update(&session, None, None));
    }
    Ok(ApiResponse::ok(SessionView::from(&session)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized_and_checked() {
        assert_eq!(
            validate_email(Some("  Ana@Example.com ".into())).unwrap().as_deref(),
            Some("ana@example.com")
        );
        assert!(validate_email(Some("not-an-email".into())).is_err());
        assert_eq!(validate_email(Some("   ".into())).unwrap(), None);
    }

    #[test]
    fn long_names_are_rejected() {
        assert!(validate_name(Some("x".repeat(101))).is_err());
        assert_eq!(validate_name(Some(" Ana ".into())).unwrap().as_deref(), Some("Ana"));
    }
}
