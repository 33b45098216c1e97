//! services/api/src/web/rest.rs
//!
//! The health endpoint and the master definition for the OpenAPI specification.

use crate::web::{chat, discount, images, quiz, sessions, webhooks};
use axum::{response::IntoResponse, Json};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        sessions::create_session_handler,
        sessions::get_session_handler,
        sessions::update_session_handler,
        chat::init_chat_handler,
        chat::chat_handler,
        chat::chat_history_handler,
        quiz::submit_quiz_answer_handler,
        quiz::get_quiz_answers_handler,
        quiz::generate_quiz_diagnosis_handler,
        quiz::get_quiz_diagnosis_handler,
        images::upload_image_handler,
        images::get_image_analysis_handler,
        discount::validate_discount_handler,
        discount::redeem_discount_handler,
        discount::session_discount_handler,
        webhooks::lead_update_handler,
        webhooks::verify_handler,
    ),
    components(
        schemas(
            HealthResponse,
            sessions::CreateSessionRequest,
            sessions::UpdateSessionRequest,
            sessions::SessionView,
            chat::InitChatRequest,
            chat::ChatRequest,
            chat::ImagePayload,
            chat::ChatReply,
            chat::QuestionPayload,
            chat::ChatHistory,
            chat::MessageView,
            quiz::QuizAnswerRequest,
            quiz::QuizAnswerView,
            quiz::QuizAnswersView,
            quiz::QuizDiagnosisView,
            images::ImageAnalysisView,
            discount::DiscountView,
            discount::DiscountValidityView,
            discount::RedeemRequest,
            webhooks::LeadUpdateRequest,
            webhooks::VerifyResponse,
        )
    ),
    tags(
        (name = "Digestive Diagnostic API", description = "Conversational and quiz diagnostics, discounts and CRM sync.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
