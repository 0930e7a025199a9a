//! Session tokens: HS256 JWTs carrying `{id, username, role}`.
//!
//! Tokens are stateless. There is no revocation list, so a token stays valid
//! until `exp` even after the client logs out.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{Identity, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub role: Role,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            id: claims.id,
            username: claims.username,
            role: claims.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Invalid,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Invalid => f.write_str("Invalid token"),
            TokenError::Expired => f.write_str("Token expired"),
        }
    }
}

/// External identity provider whose tokens share our claim shape.
#[derive(Clone)]
pub struct TrustedIssuer {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TrustedIssuer {
    pub fn new(issuer: &str, secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    trusted: Option<TrustedIssuer>,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            trusted: None,
        }
    }

    /// Secret for deployments that did not configure one; tokens die with the process.
    pub fn ephemeral_secret() -> String {
        let secret_bytes: [u8; 32] = thread_rng().gen();

        let mut hasher: Sha256 = Digest::new();
        hasher.update(&secret_bytes);
        hex::encode(hasher.finalize())
    }

    pub fn with_trusted_issuer(mut self, issuer: TrustedIssuer) -> Self {
        self.trusted = Some(issuer);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            id: identity.id,
            username: identity.username.clone(),
            role: identity.role,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
            iss: None,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        match decode(token, &self.decoding_key, &self.validation) {
            Err(TokenError::Invalid) => match &self.trusted {
                Some(trusted) => decode(token, &trusted.decoding_key, &trusted.validation),
                None => Err(TokenError::Invalid),
            },
            other => other,
        }
    }
}

fn decode(token: &str, key: &DecodingKey, validation: &Validation) -> Result<Identity, TokenError> {
    jsonwebtoken::decode::<Claims>(token, key, validation)
        .map(|data| data.claims.into())
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}
