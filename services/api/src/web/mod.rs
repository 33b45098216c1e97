pub mod chat;
pub mod cors;
pub mod discount;
pub mod images;
pub mod quiz;
pub mod rate_limit;
pub mod response;
pub mod rest;
pub mod sessions;
pub mod state;
pub mod webhooks;

use crate::error::AppError;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use rest::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

/// Room for base64 inflation and the surrounding JSON or multipart framing.
fn body_limit(upload_max_size: usize) -> usize {
    upload_max_size / 3 * 4 + 64 * 1024
}

/// Parses a session id from a path or payload, answering 400 instead of axum's
/// plain-text rejection.
pub(crate) fn parse_session_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Validation("invalid session id".to_string()))
}

/// Builds the full application router.
///
/// Rate limiting needs the peer address, so it is left off for in-process tests.
pub fn build_router(app_state: Arc<AppState>, rate_limited: bool) -> Router {
    let mut chat_routes = Router::new().route("/chat", post(chat::chat_handler));
    if rate_limited {
        chat_routes = chat_routes.layer(rate_limit::chat_layer());
    }

    let mut api_routes = Router::new()
        .route("/sessions", post(sessions::create_session_handler))
        .route(
            "/sessions/{id}",
            get(sessions::get_session_handler).put(sessions::update_session_handler),
        )
        .route("/chat/init", post(chat::init_chat_handler))
        .route("/chat/{session_id}", get(chat::chat_history_handler))
        .merge(chat_routes)
        .route("/quiz", post(quiz::submit_quiz_answer_handler))
        .route("/quiz/{session_id}", get(quiz::get_quiz_answers_handler))
        .route(
            "/quiz/{session_id}/diagnosis",
            post(quiz::generate_quiz_diagnosis_handler).get(quiz::get_quiz_diagnosis_handler),
        )
        .route("/images", post(images::upload_image_handler))
        .route("/images/{session_id}", get(images::get_image_analysis_handler))
        .route("/discount/validate/{code}", get(discount::validate_discount_handler))
        .route("/discount/redeem", post(discount::redeem_discount_handler))
        .route(
            "/discount/session/{session_id}",
            get(discount::session_discount_handler),
        )
        .route(
            "/webhooks/wordpress/lead-update",
            post(webhooks::lead_update_handler),
        )
        .route("/webhooks/wordpress/verify", get(webhooks::verify_handler))
        .layer(DefaultBodyLimit::max(body_limit(
            app_state.config.upload_max_size,
        )));
    if rate_limited {
        api_routes = api_routes.layer(rate_limit::general_layer());
    }

    let cors = cors::build_cors_layer(&app_state.config.allowed_origins);
    let app = Router::new()
        .route("/health", get(rest::health_handler))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(app)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDb, NoopCrmAdapter};
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use diagnostic_core::domain::{
        AnsweredQuestion, CollectedInfo, DiscountCode, FlowState, ImageData, Language, Session,
    };
    use diagnostic_core::flow::DiagnosticFlow;
    use diagnostic_core::ports::{
        DatabaseService, DiagnosisGenerationService, EmpathyCommentService,
        ImageAnalysisService, PortError, PortResult,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use diagnostic_core::domain::FlowStep;
    use diagnostic_core::questions::IMAGE_QUESTION_ID;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Canned model replies; records what the diagnosis was generated from.
    #[derive(Default)]
    struct StubLlm {
        vision_ok: bool,
        diagnosis_inputs: Mutex<Vec<(Option<String>, Option<String>)>>,
    }

    #[async_trait]
    impl EmpathyCommentService for StubLlm {
        async fn generate_comment(&self, _q: &str, _a: &str, _l: Language) -> PortResult<String> {
            Ok("Gracias por contármelo.".to_string())
        }
    }

    #[async_trait]
    impl DiagnosisGenerationService for StubLlm {
        async fn generate_diagnosis(
            &self,
            user_name: Option<&str>,
            answers: &[AnsweredQuestion],
            image_analysis: Option<&str>,
            _language: Language,
            _info: Option<&CollectedInfo>,
        ) -> PortResult<String> {
            self.diagnosis_inputs.lock().unwrap().push((
                user_name.map(str::to_string),
                image_analysis.map(str::to_string),
            ));
            Ok(format!("Diagnóstico basado en {} respuestas.", answers.len()))
        }
    }

    #[async_trait]
    impl ImageAnalysisService for StubLlm {
        async fn analyze_image(&self, _image: &ImageData, _l: Language) -> PortResult<String> {
            if self.vision_ok {
                Ok("white coating".to_string())
            } else {
                Err(PortError::Unexpected("vision offline".to_string()))
            }
        }
    }

    fn test_app() -> (Router, Arc<InMemoryDb>) {
        let (app, db, _) = app_with(StubLlm::default());
        (app, db)
    }

    fn app_with(llm: StubLlm) -> (Router, Arc<InMemoryDb>, Arc<StubLlm>) {
        let db = Arc::new(InMemoryDb::new());
        let llm = Arc::new(llm);
        let config = Config::from_lookup(|key| match key {
            "WORDPRESS_API_KEY" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(config),
            flow: DiagnosticFlow::new(llm.clone(), llm.clone(), llm.clone()),
            diagnoses: llm.clone(),
            images: llm.clone(),
            crm: Arc::new(NoopCrmAdapter),
        });
        (build_router(state, false), db, llm)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn upload_photo(app: &Router, session_id: &str) -> (StatusCode, Value) {
        let boundary = "diagnostic-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"sessionId\"\r\n\r\n\
             {session_id}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"tongue.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             fake-png-bytes\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/images")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/sessions",
            Some(json!({ "userName": "Ana", "language": "es" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn session_can_be_created_and_read() {
        let (app, _) = test_app();
        let id = new_session(&app).await;

        let (status, body) = send(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["userName"], "Ana");
        assert_eq!(body["data"]["step"], "initial");

        let (status, body) = send(&app, "GET", "/api/sessions/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn empty_chat_message_is_rejected() {
        let (app, _) = test_app();
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({ "sessionId": id, "message": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn expired_session_answers_gone() {
        let (app, db) = test_app();
        let created = Utc::now() - Duration::hours(30);
        let session = Session {
            id: uuid::Uuid::new_v4(),
            language: Language::Es,
            user_name: None,
            user_email: None,
            wordpress_lead_id: None,
            flow_state: FlowState::new(Language::Es, None),
            image_analysis: None,
            created_at: created,
            expires_at: Session::expiry_from(created),
        };
        let id = session.id;
        db.insert_session(session).await;

        let (status, body) = send(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({ "sessionId": id, "message": "hola" })),
        )
        .await;
        assert_eq!(status, StatusCode::GONE);
    }

    #[tokio::test]
    async fn discount_code_redeems_only_once() {
        let (app, db) = test_app();
        let discount = DiscountCode::for_session(uuid::Uuid::new_v4(), Utc::now());
        let code = discount.code.clone();
        db.create_discount_code(discount).await.unwrap();

        let uri = format!("/api/discount/validate/{code}");
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["valid"], true);
        assert_eq!(body["data"]["percentage"], 30);

        let lowercase = code.to_lowercase();
        let (status, body) = send(
            &app,
            "POST",
            "/api/discount/redeem",
            Some(json!({ "code": lowercase })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["used"], true);

        let (status, body) = send(
            &app,
            "POST",
            "/api/discount/redeem",
            Some(json!({ "code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "code already used");

        let (status, body) = send(
            &app,
            "POST",
            "/api/discount/redeem",
            Some(json!({ "code": "DIAG-0000-0000" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid code");
    }

    #[tokio::test]
    async fn full_conversation_ends_with_diagnosis_and_discount() {
        let (app, _) = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/chat/init",
            Some(json!({ "userName": "Ana", "language": "es" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], "welcome");
        let id = body["data"]["sessionId"].as_str().unwrap().to_string();

        let mut last = Value::Null;
        for _ in 0..30 {
            let (status, body) = send(
                &app,
                "POST",
                "/api/chat",
                Some(json!({
                    "sessionId": id,
                    "message": "32 años y soy enfermera, me siento hinchada después de comer"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            last = body["data"].clone();
            if last["type"] == "diagnosis" {
                break;
            }
        }
        assert_eq!(last["type"], "diagnosis");
        assert_eq!(last["step"], "pdf_question");
        assert!(last["diagnosis"].as_str().is_some_and(|d| !d.is_empty()));
        assert!(last["discount"].is_null());

        let (status, body) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({ "sessionId": id, "message": "sí" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], "cta");
        assert_eq!(body["data"]["isComplete"], true);
        let code = body["data"]["discount"]["code"].as_str().unwrap().to_string();
        assert!(code.starts_with("DIAG-"));

        // Completing again hands back the same code.
        let (_, body) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({ "sessionId": id, "message": "gracias" })),
        )
        .await;
        assert_eq!(body["data"]["type"], "completed");
        assert_eq!(body["data"]["discount"]["code"], code);

        let (status, body) = send(&app, "GET", &format!("/api/chat/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["messages"].as_array().unwrap().len() > 4);
    }

    #[tokio::test]
    async fn quiz_scores_and_generates_diagnosis() {
        let (app, _) = test_app();
        let id = new_session(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/quiz/{id}/diagnosis"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for (question_id, answer) in [(2, "hinchazón siempre"), (3, "a veces")] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/quiz",
                Some(json!({ "sessionId": id, "questionId": question_id, "answer": answer })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = send(
            &app,
            "POST",
            "/api/quiz",
            Some(json!({ "sessionId": id, "questionId": 99, "answer": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "GET", &format!("/api/quiz/{id}"), None).await;
        assert_eq!(body["data"]["score"], 5);

        let (status, body) = send(&app, "POST", &format!("/api/quiz/{id}/diagnosis"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["score"], 5);
        assert!(body["data"]["discount"]["code"].is_string());

        let (status, _) = send(&app, "GET", &format!("/api/quiz/{id}/diagnosis"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn webhooks_require_the_shared_key() {
        let (app, _) = test_app();
        let (status, _) = send(&app, "GET", "/api/webhooks/wordpress/verify", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/api/webhooks/wordpress/verify")
            .header("x-api-key", "secret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn uploaded_photo_and_renamed_user_reach_the_diagnosis() {
        let (app, _, llm) = app_with(StubLlm {
            vision_ok: true,
            ..Default::default()
        });
        let (_, body) = send(
            &app,
            "POST",
            "/api/chat/init",
            Some(json!({ "userName": "Ana", "language": "es" })),
        )
        .await;
        let id = body["data"]["sessionId"].as_str().unwrap().to_string();

        let (status, body) = upload_photo(&app, &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["imageAnalysis"], "white coating");

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/sessions/{id}"),
            Some(json!({ "userName": "Lucía" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let mut last = Value::Null;
        for _ in 0..30 {
            let (status, body) = send(
                &app,
                "POST",
                "/api/chat",
                Some(json!({
                    "sessionId": id,
                    "message": "32 años y soy enfermera, me siento hinchada después de comer"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            last = body["data"].clone();
            assert_ne!(last["nextQuestion"]["id"], IMAGE_QUESTION_ID);
            if last["type"] == "diagnosis" {
                break;
            }
        }
        assert_eq!(last["type"], "diagnosis");

        let inputs = llm.diagnosis_inputs.lock().unwrap().clone();
        assert_eq!(
            inputs,
            vec![(Some("Lucía".to_string()), Some("white coating".to_string()))]
        );
    }

    #[tokio::test]
    async fn photo_sent_in_chat_is_analysed_and_stored() {
        let (app, db, llm) = app_with(StubLlm {
            vision_ok: true,
            ..Default::default()
        });
        let mut flow_state = FlowState::new(Language::Es, Some("Ana".into()));
        flow_state.asked_question_ids = (1..=IMAGE_QUESTION_ID).collect();
        flow_state.step = FlowStep::AskingQuestions {
            question_id: IMAGE_QUESTION_ID,
            question_index: 13,
        };
        let created = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4(),
            language: Language::Es,
            user_name: Some("Ana".into()),
            user_email: None,
            wordpress_lead_id: None,
            flow_state,
            image_analysis: None,
            created_at: created,
            expires_at: Session::expiry_from(created),
        };
        let id = session.id;
        db.insert_session(session).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/chat",
            Some(json!({
                "sessionId": id,
                "message": "",
                "imageData": {
                    "base64": STANDARD.encode(b"fake-png-bytes"),
                    "mimeType": "image/png"
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], "diagnosis");
        assert_eq!(body["data"]["imageAnalysis"], "white coating");
        assert_eq!(
            llm.diagnosis_inputs.lock().unwrap()[0].1.as_deref(),
            Some("white coating")
        );

        let (status, body) = send(&app, "GET", &format!("/api/images/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["imageAnalysis"], "white coating");
    }

    #[tokio::test]
    async fn failed_upload_analysis_is_a_server_error() {
        let (app, _) = test_app();
        let id = new_session(&app).await;

        let (status, body) = upload_photo(&app, &id).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        let (_, body) = send(&app, "GET", &format!("/api/images/{id}"), None).await;
        assert!(body["data"]["imageAnalysis"].is_null());
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
