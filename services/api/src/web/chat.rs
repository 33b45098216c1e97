//! services/api/src/web/chat.rs
//!
//! The conversational diagnostic: start the flow, exchange messages, read history.
//! Each request loads the session, runs one flow step and writes the state back.

use crate::error::AppError;
use crate::web::discount::{issue_for_session, DiscountView};
use crate::web::images::decode_image_payload;
use crate::web::parse_session_id;
use crate::web::response::ApiResponse;
use crate::web::sessions::validate_name;
use crate::web::state::{lead_update, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use diagnostic_core::domain::{
    ChatMessage, Diagnosis, FlowState, Language, MessageRole, NewSession, Session, SessionUpdate,
};
use diagnostic_core::flow::{FlowResponse, IncomingMessage, ResponseType};
use diagnostic_core::i18n;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_MESSAGE_CHARS: usize = 2000;
const IMAGE_PLACEHOLDER: &str = "[image]";

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitChatRequest {
    /// Existing session to (re)start; a new one is created when absent.
    pub session_id: Option<String>,
    pub language: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Raw base64 or a `data:` URL.
    pub base64: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    #[serde(default)]
    pub message: String,
    pub language: Option<String>,
    pub image_data: Option<ImagePayload>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub id: u8,
    pub block: String,
    pub text: String,
    pub accepts_image: bool,
}

/// The assistant's reply plus the flow metadata the client renders.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: Uuid,
    pub message: String,
    /// `welcome`, `question`, `diagnosis`, `cta`, `completed` or `validation_error`.
    #[serde(rename = "type")]
    pub response_type: String,
    pub step: String,
    pub question_index: usize,
    pub next_question: Option<QuestionPayload>,
    pub diagnostic_mode: String,
    pub engagement_score: u8,
    pub is_complete: bool,
    pub diagnosis: Option<String>,
    pub image_analysis: Option<String>,
    pub discount: Option<DiscountView>,
}

impl ChatReply {
    fn new(session_id: Uuid, response: &FlowResponse, discount: Option<DiscountView>) -> Self {
        let state = &response.new_state;
        Self {
            session_id,
            message: response.message.clone(),
            response_type: response_type_name(response.response_type).to_string(),
            step: state.step.name().to_string(),
            question_index: state.current_question_index(),
            next_question: response.next_question.as_ref().map(|q| QuestionPayload {
                id: q.id,
                block: q.block.as_str().to_string(),
                text: q.text.clone(),
                accepts_image: q.accepts_image,
            }),
            diagnostic_mode: state.mode.as_str().to_string(),
            engagement_score: state.engagement.total,
            is_complete: response.is_complete,
            diagnosis: state.diagnosis_content().map(str::to_string),
            image_analysis: response.image_analysis.clone(),
            discount,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub session_id: Uuid,
    pub step: String,
    pub messages: Vec<MessageView>,
}

fn response_type_name(response_type: ResponseType) -> &'static str {
    match response_type {
        ResponseType::Welcome => "welcome",
        ResponseType::Question => "question",
        ResponseType::Diagnosis => "diagnosis",
        ResponseType::Cta => "cta",
        ResponseType::Completed => "completed",
        ResponseType::ValidationError => "validation_error",
    }
}

fn message(session_id: Uuid, role: MessageRole, content: &str) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        session_id,
        role,
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

/// Milliseconds since the last prompt was shown, zero when unknown.
fn elapsed_since(last_prompt_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    last_prompt_at
        .map(|at| (now - at).num_milliseconds().max(0) as u64)
        .unwrap_or(0)
}

/// The stored flow state with the session row's edits applied on top.
///
/// Name and language may change through `PUT /api/sessions` or the WordPress
/// webhook, and a photo may arrive through `POST /api/images`, after the flow
/// state was last written. A language sent with the message wins over the row.
fn resume_state(session: &Session, requested_language: Option<Language>) -> FlowState {
    let mut state = session.flow_state.clone();
    state.language = requested_language.unwrap_or(session.language);
    if session.user_name.is_some() {
        state.user_name = session.user_name.clone();
    }
    if state.collected_info.image_analysis.is_none() {
        state.collected_info.image_analysis = session.image_analysis.clone();
    }
    state
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Start (or restart) the diagnostic conversation and get the welcome message.
#[utoipa::path(
    post,
    path = "/api/chat/init",
    request_body = InitChatRequest,
    responses(
        (status = 200, description = "Welcome message", body = ChatReply),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn init_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<InitChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let requested_name = validate_name(payload.user_name)?;
    let requested_language = payload.language.as_deref().map(Language::from_code);

    let session = match payload.session_id.as_deref() {
        Some(raw) => {
            let session = app_state.active_session(parse_session_id(raw)?).await?;
            if requested_language.is_some() || requested_name.is_some() {
                let update = SessionUpdate {
                    language: requested_language,
                    user_name: requested_name.clone(),
                    ..Default::default()
                };
                app_state.db.update_session_details(session.id, update).await?
            } else {
                session
            }
        }
        None => {
            let language = requested_language.unwrap_or_default();
            let new_session = NewSession {
                language,
                user_name: requested_name.clone(),
                ..Default::default()
            };
            let initial = app_state.flow.initialize(language, requested_name.clone());
            app_state
                .db
                .create_session(new_session, initial.new_state)
                .await?
        }
    };

    let language = requested_language.unwrap_or(session.language);
    let user_name = requested_name.or_else(|| session.user_name.clone());
    let mut response = app_state.flow.initialize(language, user_name);
    response.new_state.last_prompt_at = Some(Utc::now());

    app_state
        .db
        .save_flow_state(session.id, &response.new_state, None)
        .await?;
    app_state
        .db
        .save_message(message(session.id, MessageRole::Assistant, &response.message))
        .await?;
    tracing::info!(session_id = %session.id, language = language.code(), "Chat initialized");

    Ok(ApiResponse::ok(ChatReply::new(session.id, &response, None)))
}

/// Send one user message and receive the next step of the conversation.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatReply),
        (status = 400, description = "Empty message, bad session id or bad image"),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_session_id(&payload.session_id)?;
    let session = app_state.active_session(session_id).await?;
    let flow_state = resume_state(
        &session,
        payload.language.as_deref().map(Language::from_code),
    );
    let language = flow_state.language;

    let image = payload
        .image_data
        .as_ref()
        .map(|img| {
            decode_image_payload(
                &img.base64,
                img.mime_type.as_deref(),
                app_state.config.upload_max_size,
            )
        })
        .transpose()?;

    let text = payload.message.trim();
    if text.is_empty() && image.is_none() {
        return Err(AppError::Validation(
            i18n::validation_feedback(language).to_string(),
        ));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let now = Utc::now();
    let incoming = IncomingMessage {
        text,
        image: image.as_ref(),
        elapsed_ms: elapsed_since(flow_state.last_prompt_at, now),
    };

    let stored_text = if text.is_empty() { IMAGE_PLACEHOLDER } else { text };
    app_state
        .db
        .save_message(message(session_id, MessageRole::User, stored_text))
        .await?;

    let mut response = app_state
        .flow
        .process_message(&flow_state, incoming)
        .await;
    tracing::debug!(
        %session_id,
        from = flow_state.step.name(),
        to = response.new_state.step.name(),
        "Flow step processed"
    );

    if response.response_type != ResponseType::ValidationError {
        response.new_state.last_prompt_at = Some(Utc::now());
        app_state
            .db
            .save_flow_state(
                session_id,
                &response.new_state,
                response.image_analysis.as_deref(),
            )
            .await?;
    }
    app_state
        .db
        .save_message(message(session_id, MessageRole::Assistant, &response.message))
        .await?;

    if response.response_type == ResponseType::Diagnosis {
        if let Some(content) = response.new_state.diagnosis_content() {
            app_state
                .db
                .upsert_diagnosis(Diagnosis {
                    id: Uuid::new_v4(),
                    session_id,
                    content: content.to_string(),
                    score: None,
                    percentage: None,
                    created_at: Utc::now(),
                })
                .await?;
        }
    }

    let discount = if response.is_complete {
        let code = issue_for_session(&app_state, session_id).await?;
        let mut synced = session.clone();
        synced.flow_state = response.new_state.clone();
        app_state.sync_lead(lead_update(
            &synced,
            synced.flow_state.diagnosis_content().map(str::to_string),
            Some(code.code.clone()),
        ));
        Some(DiscountView::from(code))
    } else {
        None
    };

    Ok(ApiResponse::ok(ChatReply::new(session_id, &response, discount)))
}

/// The conversation so far, oldest first.
#[utoipa::path(
    get,
    path = "/api/chat/{sessionId}",
    params(("sessionId" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Message history", body = ChatHistory),
        (status = 404, description = "Unknown session"),
        (status = 410, description = "Session expired")
    )
)]
pub async fn chat_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .active_session(parse_session_id(&session_id)?)
        .await?;
    let mut messages = app_state.db.get_messages_for_session(session.id).await?;
    messages.sort_by_key(|m| m.created_at);

    Ok(ApiResponse::ok(ChatHistory {
        session_id: session.id,
        step: session.flow_state.step.name().to_string(),
        messages: messages
            .into_iter()
            .map(|m| MessageView {
                id: m.id,
                role: m.role.as_str().to_string(),
                content: m.content,
                created_at: m.created_at,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_time_is_never_negative() {
        let now = Utc::now();
        assert_eq!(elapsed_since(None, now), 0);
        assert_eq!(elapsed_since(Some(now - Duration::seconds(5)), now), 5000);
        assert_eq!(elapsed_since(Some(now + Duration::seconds(5)), now), 0);
    }

    fn session_with(flow_state: FlowState) -> Session {
        let created_at = Utc::now();
        Session {
            id: Uuid::new_v4(),
            language: Language::En,
            user_name: Some("Lucía".to_string()),
            user_email: None,
            wordpress_lead_id: None,
            flow_state,
            image_analysis: Some("white coating".to_string()),
            created_at,
            expires_at: Session::expiry_from(created_at),
        }
    }

    #[test]
    fn session_edits_reach_the_flow_state() {
        let session = session_with(FlowState::new(Language::Es, Some("Ana".to_string())));

        let state = resume_state(&session, None);
        assert_eq!(state.language, Language::En);
        assert_eq!(state.user_name.as_deref(), Some("Lucía"));
        assert_eq!(
            state.collected_info.image_analysis.as_deref(),
            Some("white coating")
        );

        let state = resume_state(&session, Some(Language::Es));
        assert_eq!(state.language, Language::Es);
    }

    #[test]
    fn analysis_from_the_chat_is_not_overwritten() {
        let mut flow_state = FlowState::new(Language::Es, None);
        flow_state.collected_info.image_analysis = Some("red tip".to_string());
        let mut session = session_with(flow_state);
        session.user_name = None;
        session.flow_state.user_name = Some("Ana".to_string());

        let state = resume_state(&session, None);
        assert_eq!(state.collected_info.image_analysis.as_deref(), Some("red tip"));
        assert_eq!(state.user_name.as_deref(), Some("Ana"));
    }
}
