//! Access-control error taxonomy and protocol mapping helpers.
//! `AccessError` is what the session store and identity sources return; `AppError`
//! is the serializable shape the HTTP frontend and the interpreter report.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::identity::Denial;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Login found no identity for the given email, or the password was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Switch/restore referenced an id the identity source no longer has.
    #[error("identity not found: {0}")]
    IdentityNotFound(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(Denial),
    /// A newer login/switch/logout replaced this in-flight resolution.
    #[error("superseded by a newer session change")]
    Superseded,
    #[error("identity source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("session storage: {0}")]
    Storage(String),
}

pub type AccessResult<T> = Result<T, AccessError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        let message = err.to_string();
        match err {
            AccessError::InvalidCredentials => AppError::Auth { code: "invalid_credentials".into(), message },
            AccessError::Unauthenticated => AppError::Auth { code: "unauthenticated".into(), message },
            AccessError::IdentityNotFound(_) => AppError::NotFound { code: "identity_not_found".into(), message },
            AccessError::Forbidden(_) => AppError::Forbidden { code: "forbidden".into(), message },
            AccessError::Superseded => AppError::Conflict { code: "superseded".into(), message },
            AccessError::SourceUnavailable(_) => AppError::Unavailable { code: "identity_source_unavailable".into(), message },
            AccessError::Storage(_) => AppError::Internal { code: "storage_error".into(), message },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
