//! Session management: JWT access tokens
//!
//! Tokens are issued elsewhere; this server only validates them.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TOKEN_ISSUER;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String, // user id (UUID)
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
}

/// Create an HS256 access token for `user_id` valid for `ttl`
#[cfg(test)]
pub(crate) fn create_access_token(
    user_id: Uuid,
    secret: &[u8],
    ttl: chrono::Duration,
) -> jsonwebtoken::errors::Result<String> {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = chrono::Utc::now();

    let claims = Claims {
        iss: TOKEN_ISSUER.to_string(),
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an access token and return the owning user's id
pub fn validate_access_token(token: &str, secret: &[u8]) -> Result<Uuid, SessionError> {
    // HS256 only, to rule out algorithm confusion
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub", "iat", "iss"]);
    validation.set_issuer(&[TOKEN_ISSUER]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::InvalidToken,
        })?;

    Uuid::parse_str(&token_data.claims.sub).map_err(|_| SessionError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn token_round_trip_returns_user() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, SECRET, Duration::hours(1)).unwrap();
        assert_eq!(validate_access_token(&token, SECRET).unwrap(), user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_access_token(Uuid::new_v4(), SECRET, Duration::hours(1)).unwrap();
        assert!(matches!(
            validate_access_token(&token, b"other-secret"),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        // Past the default 60s leeway
        let token = create_access_token(Uuid::new_v4(), SECRET, Duration::minutes(-10)).unwrap();
        assert!(matches!(
            validate_access_token(&token, SECRET),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let now = Utc::now();
        let claims = Claims {
            iss: "someone-else".into(),
            sub: Uuid::new_v4().to_string(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert!(validate_access_token(&token, SECRET).is_err());
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let now = Utc::now();
        let claims = Claims {
            iss: TOKEN_ISSUER.into(),
            sub: "42".into(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        assert!(matches!(
            validate_access_token(&token, SECRET),
            Err(SessionError::InvalidToken)
        ));
    }
}
