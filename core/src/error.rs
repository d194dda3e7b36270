//! Error type for the request pipeline.
//!
//! # Design
//! Cancellation gets a dedicated variant because the dispatcher must tell
//! "the caller aborted" apart from every other failure: a cancellation is
//! never re-checked, re-transformed or re-wrapped. Adapter failures that
//! arrived with a response (`Status`, and optionally `Transport`) keep it
//! boxed so interceptors can still inspect status, headers and data.

use std::time::Duration;

use thiserror::Error;

use crate::cancel::Cancel;
use crate::http::Response;

/// Errors surfaced by `Client::request` and every stage of the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The request's cancel token was cancelled before it settled.
    #[error("{0}")]
    Cancelled(Cancel),

    /// The server answered, but `validate_status` rejected the status code.
    #[error("request failed with status code {}", .0.status)]
    Status(Box<Response>),

    /// The transport failed before or while exchanging the request.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        response: Option<Box<Response>>,
    },

    /// The transport gave up after the configured timeout.
    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    /// A request or response transform rejected its input.
    #[error("transform failed: {0}")]
    Transform(String),

    /// An interceptor handler rejected the value passing through it.
    #[error("interceptor failed: {0}")]
    Interceptor(String),

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transform(message: impl Into<String>) -> Self {
        Error::Transform(message.into())
    }

    pub fn interceptor(message: impl Into<String>) -> Self {
        Error::Interceptor(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            response: None,
        }
    }

    /// True if this failure is a cancellation rather than an ordinary error.
    pub fn is_cancel(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// The response that arrived alongside this failure, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Status(response) => Some(response),
            Error::Transport {
                response: Some(response),
                ..
            } => Some(response),
            _ => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        match self {
            Error::Status(response) => Some(response),
            Error::Transport {
                response: Some(response),
                ..
            } => Some(response),
            _ => None,
        }
    }
}

/// Classify any failure as a cancellation or an ordinary error.
pub fn is_cancel(error: &Error) -> bool {
    error.is_cancel()
}
