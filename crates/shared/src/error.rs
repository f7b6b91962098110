use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The route needs a logged-in user; answered with a login redirect.
    Unauthenticated,
    /// Missing record, or a record the actor does not own.
    NotFound,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "login required")
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} not found"))
    }
}

/// Raised by the store when a username is already registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("username `{username}` is already taken")]
pub struct DuplicateUsername {
    pub username: String,
}

/// Raised by the store when a note slug collides with an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("slug `{slug}` is already taken")]
pub struct DuplicateSlug {
    pub slug: String,
}
