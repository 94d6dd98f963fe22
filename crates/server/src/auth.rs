use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use chrono::Utc;
use supabase_jwt::{Claims, JwksCache};

use crate::error::AppError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn is_expired(exp: i64) -> bool {
    Utc::now().timestamp() > exp
}

/// Verifies the bearer token against the Supabase JWKS and returns the
/// user id (`sub`).
pub async fn verify_jwt(jwks_cache: &Arc<JwksCache>, headers: &HeaderMap) -> Result<String, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;

    match Claims::from_token(token, jwks_cache).await {
        Err(err) => {
            tracing::debug!("rejected token: {err:?}");
            Err(AppError::Unauthorized)
        }
        Ok(claims) if is_expired(claims.exp as i64) => Err(AppError::Unauthorized),
        Ok(claims) => Ok(claims.sub),
    }
}

/// Authenticated caller.
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        verify_jwt(&state.jwks_cache, &parts.headers).await.map(AuthUser)
    }
}

/// Caller if a valid token was sent; anonymous otherwise.
pub struct MaybeUser(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if bearer_token(&parts.headers).is_none() {
            return Ok(MaybeUser(None));
        }
        Ok(MaybeUser(verify_jwt(&state.jwks_cache, &parts.headers).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer eyJ.abc.def"));
        assert_eq!(bearer_token(&headers), Some("eyJ.abc.def"));
    }

    #[test]
    fn expiry_is_compared_to_now() {
        assert!(is_expired(Utc::now().timestamp() - 10));
        assert!(!is_expired(Utc::now().timestamp() + 60));
    }
}
