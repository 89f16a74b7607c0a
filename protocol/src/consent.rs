//! # Consent Message
//!
//! The exact text an account signs to attest that it links to a DID:
//!
//! ```text
//! Create a new account link to your identity.
//!
//! did:3:bafy... \nTimestamp: 1700000000
//! ```
//!
//! The timestamp suffix is optional. When present, the same integer is
//! carried in the proof's `timestamp` field, and [`ConsentMessage::with_timestamp`]
//! re-derives byte-identical text from `(did, timestamp)`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{CONSENT_DID_SEPARATOR, CONSENT_PREAMBLE, CONSENT_TIMESTAMP_LABEL};

/// A consent message and the timestamp embedded in it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl ConsentMessage {
    /// Build the consent message for `did`, stamping it with the current
    /// wall-clock time in whole seconds when `include_timestamp` is set.
    pub fn build(did: &str, include_timestamp: bool) -> Self {
        let timestamp = include_timestamp.then(|| Utc::now().timestamp().max(0) as u64);
        Self::with_timestamp(did, timestamp)
    }

    /// Deterministic form of [`ConsentMessage::build`].
    ///
    /// ```
    /// use account_link::consent::ConsentMessage;
    ///
    /// let consent = ConsentMessage::with_timestamp("did:3:abc", Some(42));
    /// assert_eq!(
    ///     consent.message,
    ///     "Create a new account link to your identity.\n\ndid:3:abc \nTimestamp: 42"
    /// );
    /// ```
    pub fn with_timestamp(did: &str, timestamp: Option<u64>) -> Self {
        let mut message = String::with_capacity(
            CONSENT_PREAMBLE.len() + CONSENT_DID_SEPARATOR.len() + did.len() + 32,
        );
        message.push_str(CONSENT_PREAMBLE);
        message.push_str(CONSENT_DID_SEPARATOR);
        message.push_str(did);
        if let Some(ts) = timestamp {
            message.push_str(CONSENT_TIMESTAMP_LABEL);
            message.push_str(&ts.to_string());
        }
        Self { message, timestamp }
    }

    /// `{"message": ..., "timestamp": ...}`, the payload Filecoin signs.
    pub fn to_json(&self) -> String {
        // A struct of a String and an Option<u64> always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_timestamp() {
        let consent = ConsentMessage::build("did:3:bafysdfwefwe", false);
        assert_eq!(
            consent.message,
            "Create a new account link to your identity.\n\ndid:3:bafysdfwefwe"
        );
        assert_eq!(consent.timestamp, None);
    }

    #[test]
    fn test_with_wall_clock_timestamp() {
        let before = Utc::now().timestamp() as u64;
        let consent = ConsentMessage::build("did:3:abc", true);
        let after = Utc::now().timestamp() as u64;

        let ts = consent.timestamp.unwrap();
        assert!(ts >= before && ts <= after);
        assert!(consent.message.ends_with(&format!(" \nTimestamp: {ts}")));
        assert_eq!(consent, ConsentMessage::with_timestamp("did:3:abc", Some(ts)));
    }

    #[test]
    fn test_did_is_substring() {
        let consent = ConsentMessage::with_timestamp("did:muport:Qm123", Some(7));
        assert!(consent.message.contains("did:muport:Qm123"));
    }

    #[test]
    fn test_json_payload() {
        let consent = ConsentMessage::with_timestamp("did:3:abc", Some(5));
        let value: serde_json::Value = serde_json::from_str(&consent.to_json()).unwrap();
        assert_eq!(value["timestamp"], 5);
        assert_eq!(value["message"], consent.message.as_str());

        let bare = ConsentMessage::with_timestamp("did:3:abc", None);
        assert!(!bare.to_json().contains("timestamp"));
    }
}
