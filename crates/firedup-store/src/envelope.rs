//! Versioned payload envelope
//!
//! Everything written to the store is wrapped as
//! `{"schema_version": N, "payload": ...}`. A payload without an envelope
//! must match the value's [`Persisted::Legacy`] layout and is upgraded from
//! it; any other bare payload is refused rather than read as an empty value.

use crate::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Schema version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Versioned wrapper around a persisted payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Layout version of `payload`
    pub schema_version: u32,
    /// The persisted value
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Wrap `payload` at the current schema version
    #[inline]
    #[must_use]
    pub fn current(payload: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            payload,
        }
    }
}

/// A value stored inside an envelope, together with the layout it replaced
pub trait Persisted: Serialize + DeserializeOwned {
    /// Bare layout written before envelopes existed
    type Legacy: DeserializeOwned;

    /// Convert a decoded legacy value
    ///
    /// # Errors
    /// - `PersistenceError::UnrecognizedLayout` if the legacy value cannot be carried over
    fn upgrade(legacy: Self::Legacy) -> Result<Self, PersistenceError>;
}

/// Serialize `payload` inside a current-version envelope
///
/// # Errors
/// - `PersistenceError::Serialization`
pub fn encode<T: Serialize>(payload: &T) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(&Envelope::current(payload))?)
}

/// Decode an envelope, or upgrade a legacy bare payload
///
/// # Errors
/// - `PersistenceError::UnsupportedSchema` for envelopes from a newer build
/// - `PersistenceError::Serialization` for malformed JSON or envelopes
/// - `PersistenceError::UnrecognizedLayout` for bare payloads in no known layout
pub fn decode<T: Persisted>(raw: &str) -> Result<T, PersistenceError> {
    let value: Value = serde_json::from_str(raw)?;
    match value.get("schema_version").and_then(Value::as_u64) {
        Some(found) => {
            let found = u32::try_from(found).unwrap_or(u32::MAX);
            if found > SCHEMA_VERSION {
                return Err(PersistenceError::UnsupportedSchema {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            let envelope: Envelope<T> = serde_json::from_value(value)?;
            Ok(envelope.payload)
        }
        None => {
            let legacy: T::Legacy = serde_json::from_value(value)
                .map_err(|err| PersistenceError::UnrecognizedLayout(err.to_string()))?;
            debug!("upgrading payload written without envelope");
            T::upgrade(legacy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firedup_ledger::Ledger;

    #[test]
    fn envelope_carries_version() {
        let raw = encode(&Ledger::new()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert!(value["payload"].is_object());
    }

    #[test]
    fn newer_schema_is_refused() {
        let raw = r#"{"schema_version": 7, "payload": {}}"#;
        assert!(matches!(
            decode::<Ledger>(raw),
            Err(PersistenceError::UnsupportedSchema {
                found: 7,
                supported: 1
            })
        ));
    }

    #[test]
    fn zustand_layout_is_upgraded() {
        let raw = r#"{"state": {"activeCauseId": "environmental", "nodeProgress": {}, "donationHistory": []}, "version": 0}"#;
        let ledger: Ledger = decode(raw).unwrap();
        assert_eq!(ledger.active_cause_id().map(|c| c.as_str()), Some("environmental"));
    }

    #[test]
    fn bare_objects_in_other_shapes_are_refused() {
        for raw in [
            r#"{"active_cause_id": "environmental", "progress": {}, "donations": []}"#,
            r#"{}"#,
            r#"{"state": {"activeCauseId": null}, "version": 0}"#,
            r#"{"state": {"nodeProgress": {}, "donationHistory": []}, "version": 3}"#,
        ] {
            assert!(
                matches!(
                    decode::<Ledger>(raw),
                    Err(PersistenceError::UnrecognizedLayout(_))
                ),
                "{raw} should be refused"
            );
        }
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            decode::<Ledger>("not json"),
            Err(PersistenceError::Serialization(_))
        ));
    }
}
