//! Push subscription handle -- the disposer returned by every listener.
//!
//! The reader task holds a [`SubscriptionGuard`]; the caller holds the
//! [`Subscription`]. Closing cancels the shared token, and the reader checks
//! the token immediately before every callback invocation.

use std::fmt;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Terminal state of a push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEnd {
    /// Closed locally via `close()` or drop.
    Disposed,
    /// The remote side closed the stream.
    Closed,
    /// Connection-level failure.
    Failed { reason: String },
}

impl fmt::Display for SubscriptionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionEnd::Disposed => f.write_str("disposed"),
            SubscriptionEnd::Closed => f.write_str("closed by remote"),
            SubscriptionEnd::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Caller-side handle. Dropping it closes the subscription.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    end: watch::Receiver<Option<SubscriptionEnd>>,
}

impl Subscription {
    /// Create a linked handle/guard pair. The guard belongs to whichever
    /// task delivers frames.
    pub fn pair() -> (Self, SubscriptionGuard) {
        let token = CancellationToken::new();
        let (end_tx, end_rx) = watch::channel(None);
        (
            Self {
                token: token.clone(),
                end: end_rx,
            },
            SubscriptionGuard { token, end: end_tx },
        )
    }

    /// Close the underlying connection. Idempotent.
    ///
    /// Once this returns, no further callback invocation will start.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("closing push subscription");
            self.token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.end.borrow().is_some()
    }

    /// Terminal state, if the reader has already stopped.
    pub fn end_state(&self) -> Option<SubscriptionEnd> {
        self.end.borrow().clone()
    }

    /// Wait for the reader to stop and report why.
    pub async fn closed(&self) -> SubscriptionEnd {
        let mut end = self.end.clone();
        let state = match end.wait_for(Option::is_some).await {
            Ok(state) => state.clone(),
            Err(_) => None,
        };
        state.unwrap_or_else(|| SubscriptionEnd::Failed {
            reason: "reader stopped without reporting".into(),
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Reader-side half of a subscription.
#[derive(Debug)]
pub struct SubscriptionGuard {
    token: CancellationToken,
    end: watch::Sender<Option<SubscriptionEnd>>,
}

impl SubscriptionGuard {
    /// False once the caller has closed or dropped the subscription.
    pub fn is_open(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Publish the terminal state.
    pub fn finish(self, end: SubscriptionEnd) {
        self.end.send_replace(Some(end));
    }
}
