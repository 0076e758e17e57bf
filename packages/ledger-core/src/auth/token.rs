//! Unverified JWT payload decoding.
//!
//! Reads the claims of a `header.payload.signature` token for display
//! purposes. The signature is NOT checked and no standard claim (`exp`,
//! `nbf`, ...) is enforced, so nothing decoded here may drive an
//! authorization decision.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

/// Base64url that accepts the segment with or without `=` padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Conventional claim naming the token's subject (the username)
pub const SUBJECT_CLAIM: &str = "sub";

/// Claims decoded from a token payload. Untrusted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `sub` claim, if present and a string
    pub fn subject(&self) -> Option<&str> {
        self.get(SUBJECT_CLAIM).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<ClaimSet> for Value {
    fn from(claims: ClaimSet) -> Self {
        Value::Object(claims.0)
    }
}

/// Decode the payload segment of `token`.
///
/// Returns `None` unless the token has exactly three dot-separated segments,
/// the middle one is valid base64url, and it holds a JSON object.
pub fn decode(token: &str) -> Option<ClaimSet> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_LENIENT.decode(payload).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(map) => Some(ClaimSet(map)),
        _ => None,
    }
}

/// Username carried in the token's `sub` claim.
///
/// `None` for a malformed token, a missing claim or a non-string value.
pub fn subject(token: &str) -> Option<String> {
    decode(token)?.subject().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
    use serde_json::json;

    fn make_token(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.c2lnbmF0dXJl", header, body)
    }

    #[test]
    fn test_decode_round_trip() {
        let payload = json!({"sub": "alice", "exp": 123});
        let claims = decode(&make_token(&payload)).unwrap();

        assert_eq!(Value::from(claims.clone()), payload);
        assert_eq!(claims.len(), 2);
        assert_eq!(claims.get("exp"), Some(&json!(123)));
        assert_eq!(subject(&make_token(&payload)).as_deref(), Some("alice"));
    }

    #[test]
    fn test_decode_accepts_padded_payload() {
        // 7 bytes of JSON encode with two padding characters
        let payload = URL_SAFE.encode(br#"{"a":1}"#);
        assert!(payload.ends_with('='));
        let claims = decode(&format!("h.{}.s", payload)).unwrap();
        assert_eq!(claims.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_wrong_segment_count() {
        let token = make_token(&json!({"sub": "alice"}));
        let parts: Vec<&str> = token.split('.').collect();

        assert_eq!(decode(""), None);
        assert_eq!(decode("no-dots-at-all"), None);
        assert_eq!(decode(&format!("{}.{}", parts[0], parts[1])), None);
        assert_eq!(decode(&format!("{}.extra", token)), None);
        assert_eq!(decode(&format!("{}..", token)), None);
    }

    #[test]
    fn test_invalid_base64() {
        assert_eq!(decode("header.!!not-base64!!.sig"), None);
        // '+' and '/' belong to the standard alphabet, not base64url
        assert_eq!(decode("header.ab+/cd.sig"), None);
    }

    #[test]
    fn test_payload_must_be_json_object() {
        let array = URL_SAFE_NO_PAD.encode("[1,2,3]");
        let text = URL_SAFE_NO_PAD.encode("hello");
        assert_eq!(decode(&format!("h.{}.s", array)), None);
        assert_eq!(decode(&format!("h.{}.s", text)), None);

        let empty = URL_SAFE_NO_PAD.encode("{}");
        assert_eq!(decode(&format!("h.{}.s", empty)), Some(ClaimSet::default()));
    }

    #[test]
    fn test_subject_requires_string_claim() {
        assert_eq!(subject(&make_token(&json!({"sub": 42}))), None);
        assert_eq!(subject(&make_token(&json!({"name": "alice"}))), None);
        assert_eq!(subject("garbage"), None);
    }

    #[test]
    fn test_signature_is_not_checked() {
        let token = make_token(&json!({"sub": "mallory", "exp": 0}));
        let (unsigned, _) = token.rsplit_once('.').unwrap();
        let forged = format!("{}.forged", unsigned);
        assert_eq!(subject(&forged).as_deref(), Some("mallory"));
    }
}
