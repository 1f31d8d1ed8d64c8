//! Unverified decoding of bearer token claims.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Claims read from the payload segment of an access token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Subject: the user id the token was issued for.
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    /// Expiry time, when the token carries one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .map(|expires| expires <= Utc::now())
            .unwrap_or(false)
    }
}

/// Extract the claims of a three-segment bearer token.
///
/// The signature is NOT verified; that is the server's job. Any structural,
/// base64 or JSON problem yields `None`, never a panic, because the input is
/// external and untrusted.
pub fn decode(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    if payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))
        .ok()?;

    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn token_with(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_decode_reads_subject() {
        let token = token_with(json!({ "sub": "user-42", "exp": 4_102_444_800_i64 }));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.exp, Some(4_102_444_800));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_decode_accepts_padded_standard_alphabet() {
        let body = base64::engine::general_purpose::STANDARD.encode(r#"{"sub":"u?>"}"#);
        let token = format!("h.{body}.s");

        assert_eq!(decode(&token).unwrap().sub, "u?>");
    }

    #[test]
    fn test_decode_rejects_token_without_segments() {
        assert!(decode("not-a-jwt").is_none());
    }

    #[test]
    fn test_decode_rejects_empty_string() {
        assert!(decode("").is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_payload_segment() {
        assert!(decode("a.b").is_none());
        assert!(decode("a..c").is_none());
    }

    #[test]
    fn test_decode_rejects_payload_that_is_not_json() {
        let body = URL_SAFE_NO_PAD.encode("plain text");
        assert!(decode(&format!("h.{body}.s")).is_none());
    }

    #[test]
    fn test_decode_rejects_payload_without_subject() {
        let token = token_with(json!({ "name": "nobody" }));
        assert!(decode(&token).is_none());
    }

    #[test]
    fn test_expired_claims() {
        let token = token_with(json!({ "sub": "user-1", "exp": 1 }));
        assert!(decode(&token).unwrap().is_expired());
    }
}
