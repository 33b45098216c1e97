//! services/api/src/adapters/memory.rs
//!
//! A process-local `DatabaseService` used when no `DATABASE_URL` is configured
//! and by the router tests. Nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diagnostic_core::domain::{
    ChatMessage, Diagnosis, DiscountCode, FlowState, NewSession, QuizAnswer, Session,
    SessionUpdate,
};
use diagnostic_core::ports::{DatabaseService, PortError, PortResult};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    messages: Vec<ChatMessage>,
    quiz_answers: Vec<QuizAnswer>,
    diagnoses: HashMap<Uuid, Diagnosis>,
    discounts: HashMap<String, DiscountCode>,
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session as-is, e.g. one that is already expired.
    pub async fn insert_session(&self, session: Session) {
        self.tables.lock().await.sessions.insert(session.id, session);
    }
}

fn session_not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Session {} not found", id))
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_session(
        &self,
        new_session: NewSession,
        flow_state: FlowState,
    ) -> PortResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            language: new_session.language,
            user_name: new_session.user_name,
            user_email: new_session.user_email,
            wordpress_lead_id: new_session.wordpress_lead_id,
            flow_state,
            image_analysis: None,
            created_at: now,
            expires_at: Session::expiry_from(now),
        };
        self.tables
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session> {
        self.tables
            .lock()
            .await
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| session_not_found(session_id))
    }

    async fn find_session_by_lead_id(&self, lead_id: &str) -> PortResult<Session> {
        self.tables
            .lock()
            .await
            .sessions
            .values()
            .filter(|s| s.wordpress_lead_id.as_deref() == Some(lead_id))
            .max_by_key(|s| s.created_at)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No session for lead {}", lead_id)))
    }

    async fn update_session_details(
        &self,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> PortResult<Session> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        if let Some(language) = update.language {
            session.language = language;
        }
        if update.user_name.is_some() {
            session.user_name = update.user_name;
        }
        if update.user_email.is_some() {
            session.user_email = update.user_email;
        }
        if update.wordpress_lead_id.is_some() {
            session.wordpress_lead_id = update.wordpress_lead_id;
        }
        Ok(session.clone())
    }

    async fn save_flow_state(
        &self,
        session_id: Uuid,
        flow_state: &FlowState,
        image_analysis: Option<&str>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        session.flow_state = flow_state.clone();
        if let Some(analysis) = image_analysis {
            session.image_analysis = Some(analysis.to_string());
        }
        Ok(())
    }

    async fn save_image_analysis(&self, session_id: Uuid, image_analysis: &str) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| session_not_found(session_id))?;
        session.image_analysis = Some(image_analysis.to_string());
        Ok(())
    }

    async fn save_message(&self, message: ChatMessage) -> PortResult<()> {
        self.tables.lock().await.messages.push(message);
        Ok(())
    }

    async fn get_messages_for_session(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        Ok(self
            .tables
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn save_quiz_answer(&self, answer: QuizAnswer) -> PortResult<QuizAnswer> {
        let mut tables = self.tables.lock().await;
        tables
            .quiz_answers
            .retain(|a| a.session_id != answer.session_id || a.question_id != answer.question_id);
        tables.quiz_answers.push(answer.clone());
        Ok(answer)
    }

    async fn get_quiz_answers(&self, session_id: Uuid) -> PortResult<Vec<QuizAnswer>> {
        let mut answers: Vec<QuizAnswer> = self
            .tables
            .lock()
            .await
            .quiz_answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.question_id);
        Ok(answers)
    }

    async fn upsert_diagnosis(&self, diagnosis: Diagnosis) -> PortResult<Diagnosis> {
        self.tables
            .lock()
            .await
            .diagnoses
            .insert(diagnosis.session_id, diagnosis.clone());
        Ok(diagnosis)
    }

    async fn get_diagnosis_for_session(&self, session_id: Uuid) -> PortResult<Diagnosis> {
        self.tables
            .lock()
            .await
            .diagnoses
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No diagnosis for session {}", session_id)))
    }

    async fn create_discount_code(&self, discount: DiscountCode) -> PortResult<DiscountCode> {
        let mut tables = self.tables.lock().await;
        if tables.discounts.contains_key(&discount.code) {
            return Err(PortError::Unexpected(format!(
                "duplicate discount code {}",
                discount.code
            )));
        }
        tables
            .discounts
            .insert(discount.code.clone(), discount.clone());
        Ok(discount)
    }

    async fn get_discount_by_code(&self, code: &str) -> PortResult<DiscountCode> {
        self.tables
            .lock()
            .await
            .discounts
            .get(code)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Discount code {} not found", code)))
    }

    async fn get_discount_for_session(&self, session_id: Uuid) -> PortResult<DiscountCode> {
        self.tables
            .lock()
            .await
            .discounts
            .values()
            .filter(|d| d.session_id == session_id)
            .max_by_key(|d| d.created_at)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No discount for session {}", session_id)))
    }

    async fn mark_discount_used(
        &self,
        code: &str,
        used_at: DateTime<Utc>,
    ) -> PortResult<DiscountCode> {
        let mut tables = self.tables.lock().await;
        match tables.discounts.get_mut(code) {
            Some(discount) if !discount.used => {
                discount.used = true;
                discount.used_at = Some(used_at);
                Ok(discount.clone())
            }
            _ => Err(PortError::NotFound(format!(
                "Unused discount code {} not found",
                code
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnostic_core::domain::Language;

    #[tokio::test]
    async fn quiz_answers_are_replaced_per_question() {
        let db = InMemoryDb::new();
        let session_id = Uuid::new_v4();
        for text in ["a veces", "siempre"] {
            db.save_quiz_answer(QuizAnswer {
                id: Uuid::new_v4(),
                session_id,
                question_id: 2,
                answer: text.to_string(),
                points: 1,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        let answers = db.get_quiz_answers(session_id).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].answer, "siempre");
    }

    #[tokio::test]
    async fn discount_can_only_be_marked_once() {
        let db = InMemoryDb::new();
        let discount = DiscountCode::for_session(Uuid::new_v4(), Utc::now());
        let code = discount.code.clone();
        db.create_discount_code(discount).await.unwrap();

        assert!(db.mark_discount_used(&code, Utc::now()).await.unwrap().used);
        assert!(matches!(
            db.mark_discount_used(&code, Utc::now()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let db = InMemoryDb::new();
        let session = db
            .create_session(
                NewSession {
                    user_name: Some("Ana".into()),
                    ..Default::default()
                },
                FlowState::new(Language::Es, Some("Ana".into())),
            )
            .await
            .unwrap();
        let updated = db
            .update_session_details(
                session.id,
                SessionUpdate {
                    user_email: Some("ana@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user_name.as_deref(), Some("Ana"));
        assert_eq!(updated.user_email.as_deref(), Some("ana@example.com"));
    }
}
