//! services/api/src/web/webhooks.rs
//!
//! Inbound WordPress webhooks, authenticated with the shared `x-api-key`.

use crate::adapters::wordpress::API_KEY_HEADER;
use crate::error::AppError;
use crate::web::parse_session_id;
use crate::web::response::ApiResponse;
use crate::web::sessions::{clean, validate_email, validate_name, SessionView};
use crate::web::state::AppState;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use diagnostic_core::domain::SessionUpdate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdateRequest {
    /// Session to update; when absent the session is looked up by `leadId`.
    pub session_id: Option<String>,
    pub lead_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub verified: bool,
}

fn require_api_key(app_state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = app_state
        .config
        .wordpress_api_key
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("webhook key not configured".to_string()))?;
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing API key".to_string()))?;
    if provided != expected {
        tracing::warn!("Rejected webhook call with a wrong API key");
        return Err(AppError::Unauthorized("invalid API key".to_string()));
    }
    Ok(())
}

/// WordPress pushes lead details for a session.
#[utoipa::path(
    post,
    path = "/api/webhooks/wordpress/lead-update",
    request_body = LeadUpdateRequest,
    params(("x-api-key" = String, Header, description = "Shared webhook key")),
    responses(
        (status = 200, description = "Session updated", body = SessionView),
        (status = 400, description = "Neither sessionId nor leadId given"),
        (status = 401, description = "Missing or wrong key"),
        (status = 404, description = "No matching session")
    )
)]
pub async fn lead_update_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LeadUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_api_key(&app_state, &headers)?;

    let lead_id = clean(payload.lead_id);
    let session = match (payload.session_id.as_deref(), lead_id.as_deref()) {
        (Some(raw), _) => app_state.db.get_session_by_id(parse_session_id(raw)?).await?,
        (None, Some(lead)) => app_state.db.find_session_by_lead_id(lead).await?,
        (None, None) => {
            return Err(AppError::Validation(
                "sessionId or leadId is required".to_string(),
            ))
        }
    };

    let update = SessionUpdate {
        language: None,
        user_name: validate_name(payload.name)?,
        user_email: validate_email(payload.email)?,
        wordpress_lead_id: lead_id,
    };
    let session = app_state.db.update_session_details(session.id, update).await?;
    tracing::info!(session_id = %session.id, "Session updated from WordPress");

    Ok(ApiResponse::ok(SessionView::from(&session)))
}

/// Lets WordPress check that its key is accepted.
#[utoipa::path(
    get,
    path = "/api/webhooks/wordpress/verify",
    params(("x-api-key" = String, Header, description = "Shared webhook key")),
    responses(
        (status = 200, description = "Key accepted", body = VerifyResponse),
        (status = 401, description = "Missing or wrong key")
    )
)]
pub async fn verify_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    require_api_key(&app_state, &headers)?;
    Ok(ApiResponse::ok(VerifyResponse { verified: true }))
}
