//! Access tokens from the identity service.
//!
//! The identity service signs short-lived HS256 tokens with a secret shared
//! with this server. Verification checks signature, audience and expiry (with
//! 30 s of leeway for clock skew). Minting exists for development and tests.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing access token")]
    Missing,
    #[error("invalid access token")]
    Invalid,
    #[error("access token expired")]
    Expired,
    #[error("jwt error: {0}")]
    Jwt(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => {
                tracing::debug!(error = %e, "Access token rejected");
                TokenError::Invalid
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtService {
    secret: SecretString,
    audience: String,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("secret", &"<secret>")
            .field("audience", &self.audience)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: SecretString, audience: impl Into<String>) -> Self {
        Self {
            secret,
            audience: audience.into(),
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = LEEWAY_SECS;
        validation.set_audience(&[self.audience.as_str()]);
        validation.required_spec_claims = HashSet::from([
            "sub".to_string(),
            "exp".to_string(),
            "aud".to_string(),
        ]);

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let claims = decode::<AccessTokenClaims>(token, &key, &validation)?.claims;

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;
        let display_name = match claims.name.trim() {
            "" => claims.email.clone(),
            name => name.to_string(),
        };

        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
            display_name,
            expires_at,
        })
    }

    pub fn mint(
        &self,
        user_id: Uuid,
        email: &str,
        name: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id,
            email: email.to_string(),
            name: name.to_string(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(TokenError::Jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(SecretString::from("a-test-secret-that-is-long-enough".to_string()), "kanban")
    }

    #[test]
    fn minted_token_verifies() {
        let jwt = service();
        let user_id = Uuid::new_v4();
        let token = jwt
            .mint(user_id, "ada@example.com", "Ada", Duration::minutes(15))
            .unwrap();

        let identity = jwt.verify(&token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.display_name, "Ada");
    }

    #[test]
    fn blank_name_falls_back_to_email() {
        let jwt = service();
        let token = jwt
            .mint(Uuid::new_v4(), "ada@example.com", "  ", Duration::minutes(5))
            .unwrap();
        assert_eq!(jwt.verify(&token).unwrap().display_name, "ada@example.com");
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = service();
        let token = jwt
            .mint(Uuid::new_v4(), "ada@example.com", "Ada", Duration::minutes(-10))
            .unwrap();
        assert!(matches!(jwt.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn expiry_within_leeway_is_accepted() {
        let jwt = service();
        let token = jwt
            .mint(Uuid::new_v4(), "ada@example.com", "Ada", Duration::seconds(-5))
            .unwrap();
        assert!(jwt.verify(&token).is_ok());
    }

    #[test]
    fn wrong_secret_or_audience_is_invalid() {
        let token = service()
            .mint(Uuid::new_v4(), "ada@example.com", "Ada", Duration::minutes(5))
            .unwrap();

        let other_secret = JwtService::new(SecretString::from("another-secret-entirely".to_string()), "kanban");
        assert!(matches!(other_secret.verify(&token), Err(TokenError::Invalid)));

        let other_audience = JwtService::new(
            SecretString::from("a-test-secret-that-is-long-enough".to_string()),
            "admin",
        );
        assert!(matches!(other_audience.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn empty_and_garbage_tokens() {
        let jwt = service();
        assert!(matches!(jwt.verify("  "), Err(TokenError::Missing)));
        assert!(matches!(jwt.verify("not.a.jwt"), Err(TokenError::Invalid)));
    }
}
