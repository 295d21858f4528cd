// src/models/credential.rs
//! Digital Tourist ID credential data model.
//!
//! A credential exists in two states, each its own type:
//! - [`UnsignedCredential`]: the attribute set, before a signature exists
//! - [`IssuedCredential`]: the attribute set plus the issuer signature, immutable
//!
//! Field declaration order is the canonical serialization order. Serde writes
//! struct fields in declaration order, so the JSON form of either type is
//! independent of the key order a client happened to send.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::Error;

/// W3C credentials context carried by every Tourist ID.
pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";
pub const DIGITAL_TOURIST_ID_TYPE: &str = "DigitalTouristID";

/// A UTC instant with millisecond precision.
///
/// Always serialized as `YYYY-MM-DDTHH:MM:SS.mmmZ`, so a timestamp has exactly one
/// textual form in canonical bytes. [`Timestamp::parse`] accepts any RFC 3339
/// offset and normalizes to UTC; deserializing a credential accepts only the
/// canonical form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Timestamp(instant.trunc_subsecs(3))
    }

    pub fn now() -> Self {
        Timestamp::new(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_canonical_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Timestamp::new(dt.with_timezone(&Utc)))
            .map_err(|e| Error::Validation(format!("invalid timestamp {:?}: {}", s, e)))
    }

    /// Parses a timestamp that must already be in canonical form.
    ///
    /// # Errors
    /// [`Error::Validation`] if `s` is not RFC 3339, or if normalizing it would
    /// change its text (extra sub-millisecond digits, a non-`Z` offset).
    pub fn parse_canonical(s: &str) -> Result<Self, Error> {
        let ts = Timestamp::parse(s)?;
        let canonical = ts.to_canonical_string();
        if canonical != s {
            return Err(Error::Validation(format!(
                "timestamp {:?} is not in canonical form {:?}",
                s, canonical
            )));
        }
        Ok(ts)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_canonical_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse_canonical(&s).map_err(serde::de::Error::custom)
    }
}

/// The attribute set of a Tourist ID, before any signature is attached.
///
/// This is the exact input of the signing message. Unknown keys are rejected
/// when deserializing so nothing unsigned can ride along in a presented credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnsignedCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    #[serde(rename = "type")]
    pub types: Vec<String>,

    pub tourist_name: String,

    pub issuing_authority: String,

    /// `0x`-prefixed SHA-256 of the off-band identity document.
    pub document_hash: String,

    pub valid_from: Timestamp,

    pub valid_until: Timestamp,

    pub emergency_contact: String,

    pub issued_at: Timestamp,
}

impl UnsignedCredential {
    /// Checks the invariants the type system cannot express.
    ///
    /// # Errors
    /// [`Error::Validation`] when a required field is empty or the validity
    /// window is inverted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.context.is_empty() {
            return Err(Error::Validation("@context must not be empty".into()));
        }
        if self.types.is_empty() {
            return Err(Error::Validation("type must not be empty".into()));
        }
        let required = [
            ("touristName", &self.tourist_name),
            ("issuingAuthority", &self.issuing_authority),
            ("documentHash", &self.document_hash),
            ("emergencyContact", &self.emergency_contact),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{} is required", name)));
            }
        }
        if self.valid_from > self.valid_until {
            return Err(Error::Validation(format!(
                "validFrom {} is after validUntil {}",
                self.valid_from, self.valid_until
            )));
        }
        Ok(())
    }

    /// Attaches an issuer signature, producing the immutable issued form.
    pub fn attach_signature(self, signature: String) -> IssuedCredential {
        IssuedCredential {
            body: self,
            signature,
        }
    }
}

/// A signed Tourist ID.
///
/// Fields are private: the only ways to obtain one are signing an
/// [`UnsignedCredential`] or parsing a presented JSON document, and there is
/// no way to mutate it afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "Value")]
pub struct IssuedCredential {
    #[serde(flatten)]
    body: UnsignedCredential,

    /// `0x`-prefixed 65-byte recoverable signature over the signing message.
    signature: String,
}

impl IssuedCredential {
    pub fn unsigned(&self) -> &UnsignedCredential {
        &self.body
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

}

impl TryFrom<Value> for IssuedCredential {
    type Error = Error;

    /// Validates a presented credential at the boundary.
    ///
    /// A missing signature is a [`Error::Validation`], not a failed verification.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::Validation(format!(
                    "credential must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let signature = match fields.remove("signature") {
            None | Some(Value::Null) => {
                return Err(Error::Validation("credential has no signature".into()))
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(Error::Validation("credential has an empty signature".into()))
            }
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(Error::Validation(format!(
                    "signature must be a string, got {}",
                    json_kind(&other)
                )))
            }
        };

        let body: UnsignedCredential = serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::Validation(format!("malformed credential: {}", e)))?;
        body.validate()?;

        Ok(body.attach_signature(signature))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Caller-supplied attributes for issuance. Every field is optional; omitted or
/// empty values are filled with defaults by the credential builder.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialAttributes {
    pub tourist_name: Option<String>,
    pub issuing_authority: Option<String>,
    pub document_hash: Option<String>,
    /// Raw document reference, hashed into `documentHash` when no hash is given.
    pub document: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Where a credential's validity window stands relative to an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidityStatus {
    NotYetValid,
    Valid,
    Expired,
}

impl UnsignedCredential {
    /// Evaluates the validity window; both bounds are inclusive.
    pub fn validity_at(&self, now: Timestamp) -> ValidityStatus {
        if now < self.valid_from {
            ValidityStatus::NotYetValid
        } else if now > self.valid_until {
            ValidityStatus::Expired
        } else {
            ValidityStatus::Valid
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_unsigned() -> UnsignedCredential {
        UnsignedCredential {
            context: vec![CREDENTIALS_CONTEXT_V1.to_string()],
            types: vec![
                VERIFIABLE_CREDENTIAL_TYPE.to_string(),
                DIGITAL_TOURIST_ID_TYPE.to_string(),
            ],
            tourist_name: "Asha Rao".into(),
            issuing_authority: "Ministry of Tourism".into(),
            document_hash: "0x7f0c7e0fbd4fbb9e1c8b9fb7a3f1ae7a03b2f4c17c1a0b3fa7c7b1f3c1c1b2a0".into(),
            valid_from: Timestamp::parse("2025-01-01T00:00:00.000Z").unwrap(),
            valid_until: Timestamp::parse("2025-01-31T00:00:00.000Z").unwrap(),
            emergency_contact: "+911234567890".into(),
            issued_at: Timestamp::parse("2025-01-01T00:00:00.000Z").unwrap(),
        }
    }

    #[test]
    fn timestamp_renders_with_milliseconds() {
        let ts = Timestamp::parse("2025-03-04T05:06:07Z").unwrap();
        assert_eq!(ts.to_canonical_string(), "2025-03-04T05:06:07.000Z");

        let ts = Timestamp::parse("2025-03-04T10:36:07.123456+05:30").unwrap();
        assert_eq!(ts.to_canonical_string(), "2025-03-04T05:06:07.123Z");
    }

    #[test]
    fn canonical_parse_rejects_other_renderings() {
        assert!(Timestamp::parse_canonical("2025-03-04T05:06:07.123Z").is_ok());
        for text in [
            "2025-03-04T05:06:07Z",
            "2025-03-04T05:06:07.123999Z",
            "2025-03-04T10:36:07.123+05:30",
            "2025-03-04T05:06:07.123+00:00",
        ] {
            let err = Timestamp::parse_canonical(text).unwrap_err();
            assert_eq!(err.kind(), "ValidationError", "{}", text);
        }
    }

    #[test]
    fn presented_with_non_canonical_timestamp_is_rejected() {
        let mut value = serde_json::to_value(sample_unsigned().attach_signature("0x00".into())).unwrap();
        value["validUntil"] = json!("2025-01-31T00:00:00.000999Z");
        let err = IssuedCredential::try_from(value).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("canonical"), "{}", err);
    }

    #[test]
    fn timestamp_rejects_garbage() {
        let err = Timestamp::parse("yesterday").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn serializes_in_schema_order() {
        let json = serde_json::to_string(&sample_unsigned()).unwrap();
        let keys = [
            "\"@context\"",
            "\"type\"",
            "\"touristName\"",
            "\"issuingAuthority\"",
            "\"documentHash\"",
            "\"validFrom\"",
            "\"validUntil\"",
            "\"emergencyContact\"",
            "\"issuedAt\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
    }

    #[test]
    fn issued_form_puts_signature_last() {
        let issued = sample_unsigned().attach_signature("0xfeed".into());
        let json = serde_json::to_string(&issued).unwrap();
        assert!(json.ends_with(",\"signature\":\"0xfeed\"}"), "{}", json);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut unsigned = sample_unsigned();
        std::mem::swap(&mut unsigned.valid_from, &mut unsigned.valid_until);
        assert_eq!(unsigned.validate().unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn empty_required_field_is_rejected() {
        let mut unsigned = sample_unsigned();
        unsigned.tourist_name = "  ".into();
        let err = unsigned.validate().unwrap_err();
        assert!(err.to_string().contains("touristName"));
    }

    #[test]
    fn presented_without_signature_is_validation_error() {
        let value = serde_json::to_value(sample_unsigned()).unwrap();
        let err = IssuedCredential::try_from(value).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("no signature"));
    }

    #[test]
    fn presented_with_unknown_field_is_rejected() {
        let mut value = serde_json::to_value(sample_unsigned().attach_signature("0x00".into())).unwrap();
        value["nationality"] = json!("IN");
        let err = IssuedCredential::try_from(value).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn presented_with_missing_field_is_rejected() {
        let mut value = serde_json::to_value(sample_unsigned().attach_signature("0x00".into())).unwrap();
        value.as_object_mut().unwrap().remove("issuedAt");
        assert!(IssuedCredential::try_from(value).is_err());
    }

    #[test]
    fn presented_round_trips_through_serde() {
        let issued = sample_unsigned().attach_signature("0xabc".into());
        let json = serde_json::to_string(&issued).unwrap();
        let parsed: IssuedCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, issued);
        assert_eq!(parsed.signature(), "0xabc");
    }

    #[test]
    fn validity_bounds_are_inclusive() {
        let unsigned = sample_unsigned();
        assert_eq!(unsigned.validity_at(unsigned.valid_from), ValidityStatus::Valid);
        assert_eq!(unsigned.validity_at(unsigned.valid_until), ValidityStatus::Valid);
        assert_eq!(
            unsigned.validity_at(Timestamp::parse("2024-12-31T23:59:59.999Z").unwrap()),
            ValidityStatus::NotYetValid
        );
        assert_eq!(
            unsigned.validity_at(Timestamp::parse("2025-01-31T00:00:00.001Z").unwrap()),
            ValidityStatus::Expired
        );
    }
}
