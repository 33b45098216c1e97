//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the session helpers the handlers share.

use crate::config::Config;
use crate::error::AppError;
use chrono::Utc;
use diagnostic_core::domain::{LeadUpdate, Session};
use diagnostic_core::flow::DiagnosticFlow;
use diagnostic_core::ports::{
    CrmSyncService, DatabaseService, DiagnosisGenerationService, ImageAnalysisService,
};
use std::sync::Arc;
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub flow: DiagnosticFlow,
    /// Also used directly by the quiz diagnosis.
    pub diagnoses: Arc<dyn DiagnosisGenerationService>,
    /// Also used directly by the image upload endpoint.
    pub images: Arc<dyn ImageAnalysisService>,
    pub crm: Arc<dyn CrmSyncService>,
}

impl AppState {
    /// Loads a session, rejecting ones past their 24h window with `410 Gone`.
    pub async fn active_session(&self, session_id: Uuid) -> Result<Session, AppError> {
        let session = self.db.get_session_by_id(session_id).await?;
        if session.is_expired(Utc::now()) {
            return Err(AppError::SessionExpired);
        }
        Ok(session)
    }

    /// Pushes the lead to the CRM in the background; failures are only logged.
    pub fn sync_lead(&self, lead: LeadUpdate) {
        let crm = self.crm.clone();
        tokio::spawn(async move {
            if let Err(e) = crm.push_lead(&lead).await {
                tracing::warn!(session_id = %lead.session_id, "CRM sync failed: {}", e);
            }
        });
    }
}

/// Snapshot of a session for the CRM.
pub fn lead_update(
    session: &Session,
    diagnosis: Option<String>,
    discount_code: Option<String>,
) -> LeadUpdate {
    let state = &session.flow_state;
    LeadUpdate {
        session_id: session.id,
        wordpress_lead_id: session.wordpress_lead_id.clone(),
        user_name: session.user_name.clone(),
        user_email: session.user_email.clone(),
        language: session.language,
        diagnostic_mode: state.mode,
        engagement_score: state.engagement.total,
        collected_info: state.collected_info.clone(),
        diagnosis,
        discount_code,
    }
}
