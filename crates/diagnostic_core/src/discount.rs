//! crates/diagnostic_core/src/discount.rs
//!
//! Discount codes handed out when a session completes the funnel.

use crate::domain::DiscountCode;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use uuid::Uuid;

pub const DISCOUNT_PERCENTAGE: u8 = 30;
pub const DISCOUNT_VALID_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscountError {
    #[error("invalid code")]
    InvalidCode,
    #[error("code already used")]
    AlreadyUsed,
    #[error("code expired")]
    Expired,
}

/// Read-only result of checking a code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountValidity {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Generates a code such as `DIAG-3F9A-07BC` from four random bytes.
pub fn generate_code() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "DIAG-{}-{}",
        hex::encode_upper(&bytes[..2]),
        hex::encode_upper(&bytes[2..])
    )
}

/// Normalizes user input before lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl DiscountCode {
    /// Issues a fresh 30% code for a session, valid for 7 days.
    pub fn for_session(session_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            code: generate_code(),
            percentage: DISCOUNT_PERCENTAGE,
            expires_at: now + Duration::days(DISCOUNT_VALID_DAYS),
            used: false,
            used_at: None,
            created_at: now,
        }
    }

    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), DiscountError> {
        if self.used {
            return Err(DiscountError::AlreadyUsed);
        }
        if now > self.expires_at {
            return Err(DiscountError::Expired);
        }
        Ok(())
    }
}

/// Checks a looked-up code without changing it. `None` means the lookup found nothing.
pub fn validate(code: Option<&DiscountCode>, now: DateTime<Utc>) -> DiscountValidity {
    let outcome = code
        .ok_or(DiscountError::InvalidCode)
        .and_then(|c| c.check_redeemable(now).map(|_| c));
    match outcome {
        Ok(c) => DiscountValidity {
            valid: true,
            percentage: Some(c.percentage),
            expires_at: Some(c.expires_at),
            reason: None,
        },
        Err(e) => DiscountValidity {
            valid: false,
            percentage: None,
            expires_at: None,
            reason: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn generated_codes_match_format() {
        let re = Regex::new(r"^DIAG-[0-9A-F]{4}-[0-9A-F]{4}$").unwrap();
        for _ in 0..200 {
            let code = generate_code();
            assert!(re.is_match(&code), "{code}");
        }
    }

    #[test]
    fn session_codes_are_thirty_percent_for_a_week() {
        let now = Utc::now();
        let code = DiscountCode::for_session(Uuid::new_v4(), now);
        assert_eq!(code.percentage, 30);
        assert_eq!(code.expires_at, now + Duration::days(7));
        assert!(!code.used);
    }

    #[test]
    fn redeemability_checks() {
        let now = Utc::now();
        let mut code = DiscountCode::for_session(Uuid::new_v4(), now);
        assert_eq!(code.check_redeemable(now), Ok(()));
        assert_eq!(
            code.check_redeemable(now + Duration::days(8)),
            Err(DiscountError::Expired)
        );
        code.used = true;
        assert_eq!(code.check_redeemable(now), Err(DiscountError::AlreadyUsed));
    }

    #[test]
    fn validate_reports_reason() {
        let now = Utc::now();
        let missing = validate(None, now);
        assert!(!missing.valid);
        assert_eq!(missing.reason.as_deref(), Some("invalid code"));

        let code = DiscountCode::for_session(Uuid::new_v4(), now);
        let ok = validate(Some(&code), now);
        assert!(ok.valid);
        assert_eq!(ok.percentage, Some(30));
    }

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_code("  diag-ab12-cd34 "), "DIAG-AB12-CD34");
    }
}
