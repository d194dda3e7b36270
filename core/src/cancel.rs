//! Cooperative cancellation for in-flight requests.
//!
//! # Design
//! A `CancelToken` is a set-once cell for the reason plus a
//! `tokio_util` cancellation token for notification. The dispatcher reads
//! the cell synchronously at its two checkpoints; adapters await
//! `cancelled()` alongside their I/O to abort mid-flight. The reason is
//! stored before waiters are woken, so anyone woken by `cancelled()` always
//! sees it.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// The value a cancelled request fails with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    message: Option<String>,
}

impl Cancel {
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "request cancelled: {message}"),
            None => f.write_str("request cancelled"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    reason: OnceLock<Cancel>,
    notify: CancellationToken,
}

/// Handle used to abort one or more requests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token paired with the function that cancels it.
    pub fn source() -> CancelSource {
        let token = CancelToken::new();
        CancelSource {
            canceller: Canceller {
                token: token.clone(),
            },
            token,
        }
    }

    /// Request cancellation. Only the first call records its reason; returns
    /// whether this call was that first one.
    pub fn cancel(&self, message: Option<&str>) -> bool {
        let first = self
            .inner
            .reason
            .set(Cancel::new(message.map(str::to_string)))
            .is_ok();
        if first {
            tracing::debug!(reason = ?message, "cancel token cancelled");
            self.inner.notify.cancel();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<Cancel> {
        self.inner.reason.get().cloned()
    }

    /// Fail with `Error::Cancelled` once cancellation has been requested.
    pub fn throw_if_requested(&self) -> Result<()> {
        match self.inner.reason.get() {
            Some(reason) => Err(Error::Cancelled(reason.clone())),
            None => Ok(()),
        }
    }

    /// Resolves with the reason as soon as the token is cancelled.
    pub async fn cancelled(&self) -> Cancel {
        self.inner.notify.cancelled().await;
        self.reason().unwrap_or_else(|| Cancel::new(None))
    }
}

/// Cancels the token it was created with.
#[derive(Debug, Clone)]
pub struct Canceller {
    token: CancelToken,
}

impl Canceller {
    pub fn cancel(&self, message: Option<&str>) -> bool {
        self.token.cancel(message)
    }
}

#[derive(Debug, Clone)]
pub struct CancelSource {
    pub token: CancelToken,
    pub canceller: Canceller,
}
