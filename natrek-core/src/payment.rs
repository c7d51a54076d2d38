use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Status as reported by the external payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Approved,
    Declined,
    Error,
    Pending,
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "APPROVED" => Ok(ProviderStatus::Approved),
            "DECLINED" => Ok(ProviderStatus::Declined),
            "ERROR" => Ok(ProviderStatus::Error),
            "PENDING" => Ok(ProviderStatus::Pending),
            other => Err(CoreError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Payment record embedded in the booking once the provider has called back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub status: ProviderStatus,
    pub transaction_id: String,
    pub reference: String,
    pub amount: i64,
    pub tax: i64,
}

pub const REFERENCE_PREFIX: &str = "NTK";

/// Provider-facing reference, format `NTK-{bookingId}-{nonce}`. The booking
/// id embedded in it is the idempotency key for webhook confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReference {
    pub booking_id: Uuid,
    pub nonce: String,
}

impl PaymentReference {
    pub fn new(booking_id: Uuid) -> Self {
        let nonce = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self { booking_id, nonce }
    }

    pub fn parse(raw: &str) -> CoreResult<Self> {
        let rest = raw
            .strip_prefix("NTK-")
            .ok_or_else(|| CoreError::Validation(format!("malformed payment reference: {raw}")))?;

        // Hyphenated UUID is exactly 36 ASCII chars, then "-{nonce}".
        if rest.len() < 38 || !rest.is_char_boundary(36) {
            return Err(CoreError::Validation(format!(
                "malformed payment reference: {raw}"
            )));
        }
        let (id_part, tail) = rest.split_at(36);
        let booking_id = Uuid::parse_str(id_part)
            .map_err(|_| CoreError::Validation(format!("malformed payment reference: {raw}")))?;
        let nonce = tail
            .strip_prefix('-')
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoreError::Validation(format!("malformed payment reference: {raw}")))?;

        Ok(Self {
            booking_id,
            nonce: nonce.to_string(),
        })
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", REFERENCE_PREFIX, self.booking_id, self.nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_round_trip() {
        let booking_id = Uuid::new_v4();
        let reference = PaymentReference::new(booking_id);
        let parsed = PaymentReference::parse(&reference.to_string()).unwrap();
        assert_eq!(parsed.booking_id, booking_id);
        assert_eq!(parsed.nonce, reference.nonce);
    }

    #[test]
    fn test_malformed_references_rejected() {
        assert!(PaymentReference::parse("PSE-whatever").is_err());
        assert!(PaymentReference::parse("NTK-not-a-uuid-123").is_err());
        assert!(PaymentReference::parse(&format!("NTK-{}", Uuid::new_v4())).is_err());
        assert!(PaymentReference::parse(&format!("NTK-{}-", Uuid::new_v4())).is_err());
    }
}
