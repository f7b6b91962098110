use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use server_api::accounts::resolve_actor;
use shared::domain::{Actor, User, UserId};
use tracing::{debug, error};

use crate::app_state::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    iat: i64,
    exp: i64,
}

pub fn mint_session_token(
    cfg: &SessionConfig,
    user: &User,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub: format!("user:{}", user.id.0),
        name: user.username.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

/// The user id inside a valid, unexpired token.
pub fn session_user_id(cfg: &SessionConfig, token: &str) -> Option<UserId> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| debug!(error = %e, "rejected session token"))
    .ok()?;

    decoded
        .claims
        .sub
        .strip_prefix("user:")
        .and_then(|id| id.parse::<i64>().ok())
        .map(UserId)
}

pub fn session_cookie(cfg: &SessionConfig, token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        cfg.ttl_seconds
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Bearer header first, then the session cookie.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find(|token| !token.is_empty())
}

/// The actor behind a request. Missing or bad credentials mean anonymous.
pub struct CurrentActor(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentActor {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = session_token(&parts.headers)
            .and_then(|token| session_user_id(&state.sessions, token));
        let actor = resolve_actor(&state.api, user_id).await.map_err(|e| {
            error!(error = %e.message, "failed to resolve session user");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(e)).into_response()
        })?;
        Ok(CurrentActor(actor))
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
