//! Signed session tokens.
//!
//! # Purpose
//! Mint and verify the HS256 JWT that identifies a logged-in user, and move it
//! in and out of HTTP headers (the `fleet_session` cookie or a bearer token).
//!
//! # Key invariants
//! - Tokens are HS256 only; `iss` must be [`SESSION_ISSUER`] and `exp` is enforced.
//! - `sub` carries the numeric user id as a string.
//! - Token values are never logged.
use crate::config::SessionConfig;
use axum::http::{HeaderMap, HeaderValue, header};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const SESSION_COOKIE: &str = "fleet_session";
pub const SESSION_ISSUER: &str = "fleetadmin";
const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> Result<i64, SessionError> {
        self.sub.parse().map_err(|_| SessionError::InvalidSubject)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("session subject is not a user id")]
    InvalidSubject,
}

/// Session signing material plus cookie policy, shared through `AppState`.
#[derive(Clone)]
pub struct SessionKeys {
    inner: Arc<SessionKeysInner>,
}

struct SessionKeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
    cookie_secure: bool,
}

/// A freshly minted token and its expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: i64,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            inner: Arc::new(SessionKeysInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl_secs: config.ttl_secs,
                cookie_secure: config.cookie_secure,
            }),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.inner.ttl_secs
    }

    pub fn mint(&self, user_id: i64, email: &str) -> Result<IssuedSession, SessionError> {
        self.mint_at(user_id, email, now_epoch_seconds())
    }

    fn mint_at(&self, user_id: i64, email: &str, now: i64) -> Result<IssuedSession, SessionError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iss: SESSION_ISSUER.to_string(),
            iat: now,
            exp: now.saturating_add(i64::try_from(self.inner.ttl_secs).unwrap_or(i64::MAX)),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.inner.encoding,
        )?;
        Ok(IssuedSession {
            token,
            expires_at: claims.exp,
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = LEEWAY_SECS;
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.inner.decoding, &validation)?;
        data.claims.user_id()?;
        Ok(data.claims)
    }

    /// `Set-Cookie` value carrying a new session.
    pub fn session_cookie(&self, token: &str) -> HeaderValue {
        self.cookie(token, self.inner.ttl_secs)
    }

    /// `Set-Cookie` value that expires the session immediately.
    pub fn clear_cookie(&self) -> HeaderValue {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> HeaderValue {
        let mut cookie =
            format!("{SESSION_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.inner.cookie_secure {
            cookie.push_str("; Secure");
        }
        // JWTs are base64url plus dots, so the value is always a valid header.
        HeaderValue::from_str(&cookie)
            .unwrap_or_else(|_| HeaderValue::from_static("fleet_session=; Path=/; Max-Age=0"))
    }
}

/// Session token from the `fleet_session` cookie, falling back to a bearer header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    session_cookie_value(headers).or_else(|| extract_bearer(headers))
}

fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str) -> SessionKeys {
        SessionKeys::new(&SessionConfig {
            secret: secret.to_string(),
            ttl_secs: 3600,
            cookie_secure: false,
        })
    }

    #[test]
    fn minted_token_verifies() {
        let keys = keys("secret-a");
        let issued = keys.mint(7, "ops@example.com").expect("mint");
        let claims = keys.verify(&issued.token).expect("verify");
        assert_eq!(claims.user_id().expect("id"), 7);
        assert_eq!(claims.email, "ops@example.com");
        assert_eq!(claims.exp, issued.expires_at);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issued = keys("secret-a").mint(7, "ops@example.com").expect("mint");
        assert!(keys("secret-b").verify(&issued.token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = keys("secret-a");
        let issued = keys
            .mint_at(7, "ops@example.com", now_epoch_seconds() - 10_000)
            .expect("mint");
        assert!(keys.verify(&issued.token).is_err());
    }

    #[test]
    fn oversized_ttl_saturates_expiry() {
        let keys = SessionKeys::new(&SessionConfig {
            secret: "secret-a".to_string(),
            ttl_secs: u64::MAX,
            cookie_secure: false,
        });
        let issued = keys.mint_at(7, "ops@example.com", 1_000).expect("mint");
        assert_eq!(issued.expires_at, i64::MAX);
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_session_token(&headers), Some("from-header"));
        headers.insert(
            header::COOKIE,
            "theme=dark; fleet_session=from-cookie".parse().unwrap(),
        );
        assert_eq!(extract_session_token(&headers), Some("from-cookie"));
    }

    #[test]
    fn cookies_carry_policy() {
        let keys = SessionKeys::new(&SessionConfig {
            secret: "s".to_string(),
            ttl_secs: 60,
            cookie_secure: true,
        });
        let set = keys.session_cookie("abc");
        let set = set.to_str().unwrap();
        assert!(set.starts_with("fleet_session=abc;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Max-Age=60"));
        assert!(set.ends_with("Secure"));
        assert!(keys.clear_cookie().to_str().unwrap().contains("Max-Age=0"));
    }
}
