//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diagnostic_core::domain::{
    ChatMessage, Diagnosis, DiscountCode, FlowState, Language, MessageRole, NewSession,
    QuizAnswer, Session, SessionUpdate,
};
use diagnostic_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SESSION_COLUMNS: &str = "id, language, user_name, user_email, wordpress_lead_id, flow_state, image_analysis, created_at, expires_at";

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    language: String,
    user_name: Option<String>,
    user_email: Option<String>,
    wordpress_lead_id: Option<String>,
    flow_state: Json<FlowState>,
    image_analysis: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            language: Language::from_code(&self.language),
            user_name: self.user_name,
            user_email: self.user_email,
            wordpress_lead_id: self.wordpress_lead_id,
            flow_state: self.flow_state.0,
            image_analysis: self.image_analysis,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            session_id: self.session_id,
            role: MessageRole::parse(&self.role).unwrap_or(MessageRole::Assistant),
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizAnswerRecord {
    id: Uuid,
    session_id: Uuid,
    question_id: i16,
    answer: String,
    points: i16,
    created_at: DateTime<Utc>,
}
impl QuizAnswerRecord {
    fn to_domain(self) -> QuizAnswer {
        QuizAnswer {
            id: self.id,
            session_id: self.session_id,
            question_id: self.question_id as u8,
            answer: self.answer,
            points: self.points as u8,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DiagnosisRecord {
    id: Uuid,
    session_id: Uuid,
    content: String,
    score: Option<i32>,
    percentage: Option<f64>,
    created_at: DateTime<Utc>,
}
impl DiagnosisRecord {
    fn to_domain(self) -> Diagnosis {
        Diagnosis {
            id: self.id,
            session_id: self.session_id,
            content: self.content,
            score: self.score,
            percentage: self.percentage,
            created_at: self.created_at,
        }
    }
}

const DISCOUNT_COLUMNS: &str = "id, session_id, code, percentage, expires_at, used, used_at, created_at";

#[derive(FromRow)]
struct DiscountRecord {
    id: Uuid,
    session_id: Uuid,
    code: String,
    percentage: i16,
    expires_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl DiscountRecord {
    fn to_domain(self) -> DiscountCode {
        DiscountCode {
            id: self.id,
            session_id: self.session_id,
            code: self.code,
            percentage: self.percentage as u8,
            expires_at: self.expires_at,
            used: self.used,
            used_at: self.used_at,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_session(
        &self,
        new_session: NewSession,
        flow_state: FlowState,
    ) -> PortResult<Session> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (id, language, user_name, user_email, wordpress_lead_id, flow_state, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_session.language.code())
        .bind(new_session.user_name)
        .bind(new_session.user_email)
        .bind(new_session.wordpress_lead_id)
        .bind(Json(flow_state))
        .bind(now)
        .bind(Session::expiry_from(now))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn find_session_by_lead_id(&self, lead_id: &str) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE wordpress_lead_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(lead_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("No session for lead {}", lead_id)))?;
        Ok(record.to_domain())
    }

    async fn update_session_details(
        &self,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE sessions SET \
                language = COALESCE($2, language), \
                user_name = COALESCE($3, user_name), \
                user_email = COALESCE($4, user_email), \
                wordpress_lead_id = COALESCE($5, wordpress_lead_id), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(update.language.map(|l| l.code()))
        .bind(update.user_name)
        .bind(update.user_email)
        .bind(update.wordpress_lead_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn save_flow_state(
        &self,
        session_id: Uuid,
        flow_state: &FlowState,
        image_analysis: Option<&str>,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE sessions SET flow_state = $2, image_analysis = COALESCE($3, image_analysis), updated_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .bind(Json(flow_state))
        .bind(image_analysis)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_image_analysis(&self, session_id: Uuid, image_analysis: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE sessions SET image_analysis = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(session_id)
        .bind(image_analysis)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn save_message(&self, message: ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(message.role.as_str())
        .bind(message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_messages_for_session(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, session_id, role, content, created_at FROM messages WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_quiz_answer(&self, answer: QuizAnswer) -> PortResult<QuizAnswer> {
        let record = sqlx::query_as::<_, QuizAnswerRecord>(
            "INSERT INTO quiz_answers (id, session_id, question_id, answer, points, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (session_id, question_id) DO UPDATE SET answer = EXCLUDED.answer, points = EXCLUDED.points \
             RETURNING id, session_id, question_id, answer, points, created_at",
        )
        .bind(answer.id)
        .bind(answer.session_id)
        .bind(i16::from(answer.question_id))
        .bind(answer.answer)
        .bind(i16::from(answer.points))
        .bind(answer.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_quiz_answers(&self, session_id: Uuid) -> PortResult<Vec<QuizAnswer>> {
        let records = sqlx::query_as::<_, QuizAnswerRecord>(
            "SELECT id, session_id, question_id, answer, points, created_at FROM quiz_answers WHERE session_id = $1 ORDER BY question_id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn upsert_diagnosis(&self, diagnosis: Diagnosis) -> PortResult<Diagnosis> {
        let record = sqlx::query_as::<_, DiagnosisRecord>(
            "INSERT INTO diagnoses (id, session_id, content, score, percentage, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (session_id) DO UPDATE SET content = EXCLUDED.content, score = EXCLUDED.score, \
                percentage = EXCLUDED.percentage, created_at = EXCLUDED.created_at \
             RETURNING id, session_id, content, score, percentage, created_at",
        )
        .bind(diagnosis.id)
        .bind(diagnosis.session_id)
        .bind(diagnosis.content)
        .bind(diagnosis.score)
        .bind(diagnosis.percentage)
        .bind(diagnosis.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_diagnosis_for_session(&self, session_id: Uuid) -> PortResult<Diagnosis> {
        let record = sqlx::query_as::<_, DiagnosisRecord>(
            "SELECT id, session_id, content, score, percentage, created_at FROM diagnoses WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("No diagnosis for session {}", session_id)))?;
        Ok(record.to_domain())
    }

    async fn create_discount_code(&self, discount: DiscountCode) -> PortResult<DiscountCode> {
        let record = sqlx::query_as::<_, DiscountRecord>(&format!(
            "INSERT INTO discount_codes (id, session_id, code, percentage, expires_at, used, used_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {DISCOUNT_COLUMNS}"
        ))
        .bind(discount.id)
        .bind(discount.session_id)
        .bind(discount.code)
        .bind(i16::from(discount.percentage))
        .bind(discount.expires_at)
        .bind(discount.used)
        .bind(discount.used_at)
        .bind(discount.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_discount_by_code(&self, code: &str) -> PortResult<DiscountCode> {
        let record = sqlx::query_as::<_, DiscountRecord>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE code = $1"
        ))
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Discount code {} not found", code)))?;
        Ok(record.to_domain())
    }

    async fn get_discount_for_session(&self, session_id: Uuid) -> PortResult<DiscountCode> {
        let record = sqlx::query_as::<_, DiscountRecord>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE session_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("No discount for session {}", session_id)))?;
        Ok(record.to_domain())
    }

    async fn mark_discount_used(
        &self,
        code: &str,
        used_at: DateTime<Utc>,
    ) -> PortResult<DiscountCode> {
        let record = sqlx::query_as::<_, DiscountRecord>(&format!(
            "UPDATE discount_codes SET used = TRUE, used_at = $2 WHERE code = $1 AND used = FALSE RETURNING {DISCOUNT_COLUMNS}"
        ))
        .bind(code)
        .bind(used_at)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Unused discount code {} not found", code)))?;
        Ok(record.to_domain())
    }
}
