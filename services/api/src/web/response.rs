//! services/api/src/web/response.rs
//!
//! The `{success, data?, error?}` envelope shared by every JSON endpoint.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    /// `201 Created` with the envelope.
    pub fn created(data: T) -> impl IntoResponse {
        (StatusCode::CREATED, Self::ok(data))
    }
}
