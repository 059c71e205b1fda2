//! Closed error taxonomy shared by the transport and its collaborators
//!
//! Every failure that can cross the wire is an [`AppError`] with a fixed
//! [`ErrorKind`]. The kind determines both the JSON-RPC error code and the
//! HTTP status of the response carrying it.

use serde_json::Value;
use thiserror::Error;

use crate::logging::{EventLog, LogLevel};

/// The closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    MethodNotFound,
    InvalidArgument,
    Internal,
    ParseError,
    NotReady,
    PermissionDenied,
    NotFound,
    RateLimited,
}

impl ErrorKind {
    /// JSON-RPC error code (reserved range plus a small custom extension).
    pub const fn code(self) -> i64 {
        match self {
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidArgument => -32602,
            Self::Internal => -32603,
            Self::ParseError => -32700,
            Self::NotReady => -32002,
            Self::PermissionDenied => -32003,
            Self::NotFound => -32004,
            Self::RateLimited => -32005,
        }
    }

    /// HTTP status of the response carrying an error of this kind.
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest
            | Self::MethodNotFound
            | Self::InvalidArgument
            | Self::ParseError => 400,
            Self::Internal => 500,
            Self::NotReady => 503,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::RateLimited => 429,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::MethodNotFound => "method_not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::Internal => "internal",
            Self::ParseError => "parse_error",
            Self::NotReady => "not_ready",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Error)]
#[error("{}: {message}", .kind.as_str())]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: Option<String>,
    pub detail: Option<Value>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            detail: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotReady, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Append this error to the in-process log collaborator, tagged with its
    /// kind. Called exactly once per mapped failure, at the call site that
    /// turns it into a wire envelope.
    pub fn log_to(&self, log: &dyn EventLog, source: &str) {
        log.append(LogLevel::Error, &self.message, source, self.kind.as_str());
    }
}
