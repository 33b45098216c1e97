//! services/api/src/adapters/wordpress.rs
//!
//! CRM adapters implementing `CrmSyncService`: a WordPress webhook client and a
//! no-op used when no webhook URL is configured.

use async_trait::async_trait;
use diagnostic_core::{
    domain::LeadUpdate,
    ports::{CrmSyncService, PortError, PortResult},
};
use std::time::Duration;

/// Header carrying the shared key on both outbound and inbound webhooks.
pub const API_KEY_HEADER: &str = "x-api-key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts lead updates as JSON to a WordPress endpoint.
#[derive(Clone)]
pub struct WordPressAdapter {
    http: reqwest::Client,
    webhook_url: String,
    api_key: Option<String>,
}

impl WordPressAdapter {
    pub fn new(webhook_url: String, api_key: Option<String>) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            http,
            webhook_url,
            api_key,
        })
    }
}

#[async_trait]
impl CrmSyncService for WordPressAdapter {
    async fn push_lead(&self, lead: &LeadUpdate) -> PortResult<()> {
        let mut request = self.http.post(&self.webhook_url).json(lead);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("WordPress request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "WordPress webhook returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(session_id = %lead.session_id, "Lead pushed to WordPress");
        Ok(())
    }
}

/// Drops every update.
#[derive(Clone, Copy, Default)]
pub struct NoopCrmAdapter;

#[async_trait]
impl CrmSyncService for NoopCrmAdapter {
    async fn push_lead(&self, lead: &LeadUpdate) -> PortResult<()> {
        tracing::debug!(session_id = %lead.session_id, "CRM sync disabled, skipping lead update");
        Ok(())
    }
}
