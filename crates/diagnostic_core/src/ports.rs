//! crates/diagnostic_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the funnel's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! flow controller independent of the database, the language model and the CRM.

use crate::domain::{
    AnsweredQuestion, ChatMessage, CollectedInfo, Diagnosis, DiscountCode, FlowState, ImageData,
    Language, LeadUpdate, NewSession, QuizAnswer, Session, SessionUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Sessions ---
    async fn create_session(
        &self,
        new_session: NewSession,
        flow_state: FlowState,
    ) -> PortResult<Session>;

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session>;

    async fn find_session_by_lead_id(&self, lead_id: &str) -> PortResult<Session>;

    async fn update_session_details(
        &self,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session>;

    /// Writes back the flow state after a message. Not guarded against concurrent writers.
    async fn save_flow_state(
        &self,
        session_id: Uuid,
        flow_state: &FlowState,
        image_analysis: Option<&str>,
    ) -> PortResult<()>;

    async fn save_image_analysis(&self, session_id: Uuid, image_analysis: &str) -> PortResult<()>;

    // --- Chat history ---
    async fn save_message(&self, message: ChatMessage) -> PortResult<()>;

    async fn get_messages_for_session(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    // --- Quiz ---
    /// Stores a quiz answer, replacing an earlier answer to the same question.
    async fn save_quiz_answer(&self, answer: QuizAnswer) -> PortResult<QuizAnswer>;

    async fn get_quiz_answers(&self, session_id: Uuid) -> PortResult<Vec<QuizAnswer>>;

    // --- Diagnoses ---
    /// Inserts or replaces the single diagnosis of a session.
    async fn upsert_diagnosis(&self, diagnosis: Diagnosis) -> PortResult<Diagnosis>;

    async fn get_diagnosis_for_session(&self, session_id: Uuid) -> PortResult<Diagnosis>;

    // --- Discount codes ---
    async fn create_discount_code(&self, discount: DiscountCode) -> PortResult<DiscountCode>;

    async fn get_discount_by_code(&self, code: &str) -> PortResult<DiscountCode>;

    async fn get_discount_for_session(&self, session_id: Uuid) -> PortResult<DiscountCode>;

    /// Flags an unused code as redeemed; `NotFound` when missing or already used.
    async fn mark_discount_used(
        &self,
        code: &str,
        used_at: DateTime<Utc>,
    ) -> PortResult<DiscountCode>;
}

#[async_trait]
pub trait EmpathyCommentService: Send + Sync {
    /// Writes a short empathic reaction to an answer.
    async fn generate_comment(
        &self,
        question: &str,
        answer: &str,
        language: Language,
    ) -> PortResult<String>;
}

#[async_trait]
pub trait DiagnosisGenerationService: Send + Sync {
    /// Produces the final personalized diagnosis prose.
    async fn generate_diagnosis(
        &self,
        user_name: Option<&str>,
        answers: &[AnsweredQuestion],
        image_analysis: Option<&str>,
        language: Language,
        info: Option<&CollectedInfo>,
    ) -> PortResult<String>;
}

#[async_trait]
pub trait ImageAnalysisService: Send + Sync {
    /// Describes what a photo shows that is relevant to digestion.
    async fn analyze_image(&self, image: &ImageData, language: Language) -> PortResult<String>;
}

#[async_trait]
pub trait CrmSyncService: Send + Sync {
    /// Pushes the lead's progress to the CRM.
    async fn push_lead(&self, lead: &LeadUpdate) -> PortResult<()>;
}
