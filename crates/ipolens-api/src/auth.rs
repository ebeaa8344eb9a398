use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use ipolens_core::{AuthConfig, IpoLensError, Result, User};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username, also mirrored in `username` for clients that read the
    /// payload directly.
    pub sub: String,
    pub username: String,
    pub admin: bool,
    pub iat: usize,
    pub exp: usize,
}

/// The verified caller, extracted from the Bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub admin: bool,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| IpoLensError::Auth(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.username.clone(),
        username: user.username.clone(),
        admin: user.is_admin,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(auth.token_ttl_hours)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| IpoLensError::Auth(format!("failed to sign token: {e}")))
}

pub fn verify_token(auth: &AuthConfig, token: &str) -> Result<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| IpoLensError::Auth("invalid or expired token".to_string()))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let claims = verify_token(&state.auth, token)?;
        Ok(AuthUser {
            username: claims.username,
            admin: claims.admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(admin: bool) -> User {
        User {
            username: "alice".into(),
            created_at: Utc::now(),
            is_premium: false,
            is_admin: admin,
            usage_count: 0,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trip() {
        let auth = AuthConfig::default();
        let token = issue_token(&auth, &test_user(true)).unwrap();
        let claims = verify_token(&auth, &token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.username, "alice");
        assert!(claims.admin);
    }

    #[test]
    fn wrong_secret_rejected() {
        let auth = AuthConfig::default();
        let token = issue_token(&auth, &test_user(false)).unwrap();
        let other = AuthConfig {
            jwt_secret: "different".into(),
            ..AuthConfig::default()
        };
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let auth = AuthConfig {
            token_ttl_hours: -1,
            ..AuthConfig::default()
        };
        let token = issue_token(&auth, &test_user(false)).unwrap();
        assert!(verify_token(&auth, &token).is_err());
    }
}
