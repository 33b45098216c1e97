//! services/api/src/web/discount.rs
//!
//! Discount code endpoints and the issuing helper used when a chat completes.

use crate::error::AppError;
use crate::web::parse_session_id;
use crate::web::response::ApiResponse;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use diagnostic_core::discount::{self, normalize_code, DiscountError};
use diagnostic_core::domain::DiscountCode;
use diagnostic_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const ISSUE_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountView {
    pub code: String,
    pub percentage: u8,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<DiscountCode> for DiscountView {
    fn from(code: DiscountCode) -> Self {
        Self {
            code: code.code,
            percentage: code.percentage,
            expires_at: code.expires_at,
            used: code.used,
            used_at: code.used_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountValidityView {
    pub valid: bool,
    pub percentage: Option<u8>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub code: String,
}

/// Returns the session's code, issuing one on first call.
pub(crate) async fn issue_for_session(
    app_state: &AppState,
    session_id: Uuid,
) -> Result<DiscountCode, AppError> {
    match app_state.db.get_discount_for_session(session_id).await {
        Ok(existing) => return Ok(existing),
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let mut last_error = None;
    for _ in 0..ISSUE_ATTEMPTS {
        // A collision on the unique code column surfaces as `Unexpected`; draw again.
        match app_state
            .db
            .create_discount_code(DiscountCode::for_session(session_id, Utc::now()))
            .await
        {
            Ok(code) => {
                tracing::info!(%session_id, code = %code.code, "Discount code issued");
                return Ok(code);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error
        .map(AppError::from)
        .unwrap_or_else(|| AppError::Internal("could not issue discount code".to_string())))
}

/// Check a code without redeeming it.
#[utoipa::path(
    get,
    path = "/api/discount/validate/{code}",
    params(("code" = String, Path, description = "Discount code")),
    responses((status = 200, description = "Validity of the code", body = DiscountValidityView))
)]
pub async fn validate_discount_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let found = match app_state.db.get_discount_by_code(&normalize_code(&code)).await {
        Ok(found) => Some(found),
        Err(PortError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let validity = discount::validate(found.as_ref(), Utc::now());
    Ok(ApiResponse::ok(DiscountValidityView {
        valid: validity.valid,
        percentage: validity.percentage,
        expires_at: validity.expires_at,
        reason: validity.reason,
    }))
}

/// Redeem a code; each code works once.
#[utoipa::path(
    post,
    path = "/api/discount/redeem",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Code redeemed", body = DiscountView),
        (status = 400, description = "invalid code, code already used or code expired")
    )
)]
pub async fn redeem_discount_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RedeemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code = normalize_code(&payload.code);
    let found = match app_state.db.get_discount_by_code(&code).await {
        Ok(found) => found,
        Err(PortError::NotFound(_)) => return Err(DiscountError::InvalidCode.into()),
        Err(e) => return Err(e.into()),
    };
    let now = Utc::now();
    found.check_redeemable(now)?;

    let redeemed = match app_state.db.mark_discount_used(&code, now).await {
        Ok(redeemed) => redeemed,
        // Lost the race against a concurrent redemption.
        Err(PortError::NotFound(_)) => return Err(DiscountError::AlreadyUsed.into()),
        Err(e) => return Err(e.into()),
    };
    tracing::info!(code = %code, session_id = %redeemed.session_id, "Discount code redeemed");
    Ok(ApiResponse::ok(DiscountView::from(redeemed)))
}

/// The code issued to a session, if any.
#[utoipa::path(
    get,
    path = "/api/discount/session/{sessionId}",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session's code", body = DiscountView),
        (status = 404, description = "No code issued yet")
    )
)]
pub async fn session_discount_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_session_id(&session_id)?;
    let code = app_state.db.get_discount_for_session(session_id).await?;
    Ok(ApiResponse::ok(DiscountView::from(code)))
}
