// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal and optional deadline for a load.
///
/// The context is passed to the loader, which may use it to stop early, and is consulted by
/// [`Cache::load_cancellable`](crate::Cache::load_cancellable) to stop waiting. Clones share the
/// same cancellation token, so cancelling one clone cancels them all.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sfcache::LoadContext;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = LoadContext::new().with_timeout(Duration::from_secs(5));
/// assert!(!ctx.is_cancelled());
///
/// let clone = ctx.clone();
/// ctx.cancel();
/// assert!(clone.is_cancelled());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct LoadContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl LoadContext {
    /// Creates a context that is never cancelled unless [`cancel`](Self::cancel) is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` as the cancellation signal.
    ///
    /// This ties loads to an existing cancellation tree, for example a per-request token.
    #[must_use]
    pub fn with_token(self, token: CancellationToken) -> Self {
        Self { token, ..self }
    }

    /// Cancels the context at `deadline`.
    #[must_use]
    pub fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    /// Cancels the context `timeout` from now.
    ///
    /// # Panics
    ///
    /// Panics if the resulting deadline cannot be represented, like [`Instant`] addition does.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the context was cancelled or its deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|deadline| deadline <= Instant::now())
    }

    /// Completes once the context is cancelled or its deadline has passed.
    pub async fn cancelled(&self) {
        match self.deadline {
            None => self.token.cancelled().await,
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
        }
    }
}
