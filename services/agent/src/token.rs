//! Room access tokens.
//!
//! Peers joining a room present an HS256 JWT issued by
//! `/api/connection-details`. The token names the room and grants the
//! participant permission to join it.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// How long an issued token stays valid.
pub const TOKEN_TTL: Duration = Duration::minutes(15);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to sign room token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid room token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("Token does not grant joining a room")]
    NotJoinable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomClaims {
    /// Issuer (the configured room API key).
    pub iss: String,
    /// Participant identity.
    pub sub: String,
    pub name: String,
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies room tokens with one shared secret.
#[derive(Clone)]
pub struct RoomTokenIssuer {
    api_key: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl RoomTokenIssuer {
    pub fn new(api_key: impl Into<String>, secret: &str) -> Self {
        Self {
            api_key: api_key.into(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, room: &str, identity: &str, name: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RoomClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            name: name.to_string(),
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
            iat: now.timestamp(),
            exp: (now + TOKEN_TTL).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Checks signature, expiry and issuer, and that the token grants `room_join`.
    pub fn verify(&self, token: &str) -> Result<RoomClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.api_key.as_str()]);
        let claims = decode::<RoomClaims>(token, &self.decoding_key, &validation)
            .map_err(TokenError::Invalid)?
            .claims;
        if !claims.room_join {
            return Err(TokenError::NotJoinable);
        }
        Ok(claims)
    }
}
