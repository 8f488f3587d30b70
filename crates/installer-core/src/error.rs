//! Request-terminal errors and their user-visible rendering.

use std::sync::LazyLock;

use installer_schema::SelectError;
use regex::Regex;
use reqwest::StatusCode;
use thiserror::Error;

use crate::github::FetchError;

/// Everything that can end a request. None of these are retried.
#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("Invalid path: {0}")]
    InvalidRoute(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous release: {0}")]
    Ambiguous(String),

    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Template error: {0}")]
    Template(String),
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 :]").expect("literal regex"));

/// Strip everything but letters, digits, space and colon, so a message can
/// be embedded in a generated script without changing its meaning.
pub fn sanitize(msg: &str) -> String {
    UNSAFE_CHARS.replace_all(msg, "").into_owned()
}

impl InstallerError {
    /// HTTP status to respond with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRoute(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Ambiguous(_) => StatusCode::CONFLICT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error message restricted to a safe character set.
    pub fn public_message(&self) -> String {
        sanitize(&self.to_string())
    }
}

impl From<FetchError> for InstallerError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(what) => Self::NotFound(what),
            FetchError::Transport(msg) => Self::Transport(msg),
        }
    }
}

impl From<SelectError> for InstallerError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::NotFound(_) => Self::NotFound(err.to_string()),
            SelectError::Ambiguous { .. } => Self::Ambiguous(err.to_string()),
        }
    }
}

impl From<minijinja::Error> for InstallerError {
    fn from(err: minijinja::Error) -> Self {
        Self::Template(err.to_string())
    }
}
