//! services/api/src/web/images.rs
//!
//! Photo upload and retrieval of the stored analysis text.

use crate::error::AppError;
use crate::web::parse_session_id;
use crate::web::response::ApiResponse;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use diagnostic_core::domain::ImageData;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisView {
    pub session_id: Uuid,
    pub image_analysis: Option<String>,
}

fn check_mime(mime_type: &str) -> Result<String, AppError> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    let mime_type = if mime_type == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        mime_type
    };
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(AppError::Validation(format!(
            "unsupported image type '{}'",
            mime_type
        )));
    }
    Ok(mime_type)
}

/// Accepts raw base64 or a `data:<mime>;base64,` URL and checks type and decoded size.
pub(crate) fn decode_image_payload(
    raw: &str,
    mime_type: Option<&str>,
    max_size: usize,
) -> Result<ImageData, AppError> {
    let raw = raw.trim();
    let (embedded_mime, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::Validation("malformed image data URL".to_string()))?;
            (header.strip_suffix(";base64"), data)
        }
        None => (None, raw),
    };

    let mime_type = mime_type
        .or(embedded_mime)
        .ok_or_else(|| AppError::Validation("image mimeType is required".to_string()))?;
    let mime_type = check_mime(mime_type)?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| AppError::Validation("image data is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("image data is empty".to_string()));
    }
    if bytes.len() > max_size {
        return Err(AppError::Validation(format!(
            "image exceeds the {} byte limit",
            max_size
        )));
    }

    Ok(ImageData {
        base64: payload.to_string(),
        mime_type,
    })
}

/// Upload a photo for analysis.
///
/// Multipart form with a `sessionId` text part and an `image` file part.
#[utoipa::path(
    post,
    path = "/api/images",
    request_body(content_type = "multipart/form-data", description = "`sessionId` and `image` parts."),
    responses(
        (status = 200, description = "Image analysed", body = ImageAnalysisView),
        (status = 400, description = "Missing part, bad type or too large"),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn upload_image_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = app_state.config.upload_max_size;
    let mut session_id = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("sessionId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read sessionId: {}", e)))?;
                session_id = Some(parse_session_id(&text)?);
            }
            Some("image") => {
                let mime_type = check_mime(field.content_type().unwrap_or_default())?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        AppError::Validation(format!("Failed to read image bytes: {}", e))
                    })?;
                if data.is_empty() {
                    return Err(AppError::Validation("image data is empty".to_string()));
                }
                if data.len() > max_size {
                    return Err(AppError::Validation(format!(
                        "image exceeds the {} byte limit",
                        max_size
                    )));
                }
                image = Some(ImageData {
                    base64: STANDARD.encode(&data),
                    mime_type,
                });
            }
            _ => {}
        }
    }

    let session_id =
        session_id.ok_or_else(|| AppError::Validation("sessionId part is required".to_string()))?;
    let image = image.ok_or_else(|| AppError::Validation("image part is required".to_string()))?;
    let session = app_state.active_session(session_id).await?;

    let analysis = app_state
        .images
        .analyze_image(&image, session.language)
        .await
        .map_err(|e| AppError::Internal(format!("image analysis failed: {}", e)))?;
    app_state.db.save_image_analysis(session_id, &analysis).await?;
    tracing::info!(%session_id, "Stored image analysis");

    Ok(ApiResponse::ok(ImageAnalysisView {
        session_id,
        image_analysis: Some(analysis),
    }))
}

/// Fetch the stored analysis of a session's photo.
#[utoipa::path(
    get,
    path = "/api/images/{sessionId}",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Stored analysis, null when none", body = ImageAnalysisView),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn get_image_analysis_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .active_session(parse_session_id(&session_id)?)
        .await?;
    Ok(ApiResponse::ok(ImageAnalysisView {
        session_id: session.id,
        image_analysis: session.image_analysis,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_and_raw_payloads_decode() {
        let encoded = STANDARD.encode(b"fake-png");
        let from_url =
            decode_image_payload(&format!("data:image/png;base64,{encoded}"), None, 1024).unwrap();
        assert_eq!(from_url.mime_type, "image/png");
        assert_eq!(from_url.base64, encoded);

        let raw = decode_image_payload(&encoded, Some("image/jpg"), 1024).unwrap();
        assert_eq!(raw.mime_type, "image/jpeg");
    }

    #[test]
    fn oversized_or_foreign_payloads_are_rejected() {
        let encoded = STANDARD.encode([0u8; 64]);
        assert!(decode_image_payload(&encoded, Some("image/png"), 32).is_err());
        assert!(decode_image_payload(&encoded, Some("application/pdf"), 1024).is_err());
        assert!(decode_image_payload("***", Some("image/png"), 1024).is_err());
        assert!(decode_image_payload(&encoded, None, 1024).is_err());
    }
}
