//! Unified error model for the access layer.
//! Fetchers and the edge authorizer convert every failure into one of these values
//! before it reaches a guard or the HTTP front, so nothing escapes as a panic.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// The identity endpoint could not be reached or answered mid-stream failure.
    Transport { code: String, message: String },
    /// A success body that is not the JSON we expect.
    Decode { code: String, message: String },
    Config { code: String, message: String },
    Io { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Transport { code, .. }
            | AppError::Decode { code, .. }
            | AppError::Config { code, .. }
            | AppError::Io { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Transport { message, .. }
            | AppError::Decode { message, .. }
            | AppError::Config { message, .. }
            | AppError::Io { message, .. } => message.as_str(),
        }
    }

    pub fn transport<S: Into<String>>(code: S, msg: S) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Decode { code: "decode_error".into(), message: err.to_string() }
        } else {
            AppError::Transport { code: "transport_error".into(), message: err.to_string() }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode { code: "decode_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}
