use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Role carried by an authenticated principal. The portal distinguishes the
/// staff side (`admin`) from customers (`client`); thread closure and reopen
/// are admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

/// Authenticated identity bound to a request or a realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub role: Role,
    pub exp: i64, // Expiration time
    pub iat: i64, // Issued at
    pub iss: String, // Issuer
}

/// Verifies bearer tokens for the HTTP API and the realtime handshake.
///
/// Token issuance belongs to the identity service; this manager only needs
/// the shared secret to verify, but can mint tokens for tooling and tests.
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_hours: i64,
    issuer: String,
}

impl AuthManager {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_ttl_hours: config.access_token_ttl_hours,
            issuer: config.jwt_issuer.clone(),
        }
    }

    pub fn create_token(&self, user_id: &Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::hours(self.access_token_ttl_hours)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Verify a token and resolve it to a principal.
    pub fn authenticate(&self, token: &str) -> AppResult<Principal> {
        let claims = self.verify_token(token)?;
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth("Invalid user id in token"))?;

        Ok(Principal {
            id,
            role: claims.role,
        })
    }
}
