// 🔐 Session - Opaque token handed over by the sign-in flow
//
// The list store never looks at the token. It is only used to find out which
// user's purchase archive to query.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Malformed session token")]
    Malformed,

    #[error("Session token has no user id")]
    MissingUserId,
}

#[derive(Deserialize)]
struct Claims {
    user_id: Option<String>,
}

/// ID token issued by the identity provider (JWT)
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SessionError::NotLoggedIn);
        }
        Ok(SessionToken(raw.to_string()))
    }

    /// Token from an optional source (env var, header...)
    pub fn from_optional(raw: Option<&str>) -> Result<Self, SessionError> {
        match raw {
            Some(raw) => Self::new(raw),
            None => Err(SessionError::NotLoggedIn),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `user_id` claim of the token payload (signature is not verified here)
    pub fn user_id(&self) -> Result<String, SessionError> {
        let payload = self.0.split('.').nth(1).ok_or(SessionError::Malformed)?;

        // Tokens in the wild come both with and without padding
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| SessionError::Malformed)?;

        let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| SessionError::Malformed)?;

        claims
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingUserId)
    }
}

// Never print the raw token
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[cfg(test)]
pub(crate) fn token_for(user_id: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"user_id":"{}","email":"alex@example.com"}}"#, user_id));
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_token() {
        let token = SessionToken::new(token_for("user-42")).unwrap();
        assert_eq!(token.user_id(), Ok("user-42".to_string()));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"user_id":"u1"}"#);
        let token = SessionToken::new(format!("{}.{}.sig", header, payload)).unwrap();
        assert_eq!(token.user_id(), Ok("u1".to_string()));
    }

    #[test]
    fn test_empty_token_is_not_logged_in() {
        assert_eq!(SessionToken::new("  "), Err(SessionError::NotLoggedIn));
        assert_eq!(SessionToken::from_optional(None), Err(SessionError::NotLoggedIn));
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let token = SessionToken::new("not-a-jwt").unwrap();
        assert_eq!(token.user_id(), Err(SessionError::Malformed));

        let token = SessionToken::new("a.!!!.c").unwrap();
        assert_eq!(token.user_id(), Err(SessionError::Malformed));
    }

    #[test]
    fn test_missing_claim() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#);
        let token = SessionToken::new(format!("h.{}.s", payload)).unwrap();
        assert_eq!(token.user_id(), Err(SessionError::MissingUserId));
    }

    #[test]
    fn test_debug_hides_token() {
        let token = SessionToken::new(token_for("user-42")).unwrap();
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
    }

    #[test]
    fn test_error_messages_are_plain() {
        assert_eq!(SessionError::NotLoggedIn.to_string(), "Not logged in");
    }
}
