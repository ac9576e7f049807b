//! Session token codec.
//!
//! A token is `base64url(username:issued_at_millis:nonce)`. It is not signed:
//! decoding only recovers the claimed username, and a token grants nothing
//! until it is found in the session table.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::constants::MAX_USERNAME_LEN;
use crate::error::SharedError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub nonce: Uuid,
}

impl SessionClaims {
    pub fn new(username: &str) -> Result<Self, SharedError> {
        validate_username(username)?;
        // Millisecond precision so that decode(encode(x)) == x.
        let now = Utc::now();
        let issued_at = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);
        Ok(Self {
            username: username.to_string(),
            issued_at,
            nonce: Uuid::new_v4(),
        })
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}:{}",
            self.username,
            self.issued_at.timestamp_millis(),
            self.nonce
        );
        base64_url_encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self, SharedError> {
        let bytes = base64_url_decode(token)?;
        let raw = String::from_utf8(bytes).map_err(|_| SharedError::InvalidSessionToken)?;

        let mut parts = raw.rsplitn(3, ':');
        let nonce = parts.next().ok_or(SharedError::InvalidSessionToken)?;
        let millis = parts.next().ok_or(SharedError::InvalidSessionToken)?;
        let username = parts.next().ok_or(SharedError::InvalidSessionToken)?;

        validate_username(username).map_err(|_| SharedError::InvalidSessionToken)?;
        let millis: i64 = millis.parse().map_err(|_| SharedError::InvalidSessionToken)?;
        let issued_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or(SharedError::InvalidSessionToken)?;
        let nonce = Uuid::parse_str(nonce).map_err(|_| SharedError::InvalidSessionToken)?;

        Ok(Self {
            username: username.to_string(),
            issued_at,
            nonce,
        })
    }
}

/// Usernames are 1-64 characters of letters, digits, `-`, `_` or `.`.
pub fn validate_username(username: &str) -> Result<(), SharedError> {
    let valid = !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(SharedError::InvalidUsername(username.to_string()))
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, SharedError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD
        .decode(s.trim())
        .map_err(|_| SharedError::InvalidSessionToken)
}
