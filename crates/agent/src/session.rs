//! Session capability surface.
//!
//! A UI adapter depends on [`ChatSession`] only. [`SessionHandle`] lets
//! another task cancel a turn while `send` holds the loop mutably.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::stream_event::AgentEvent;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without further tool calls.
    Completed { rounds: u32 },
    /// The round cap was hit; the notice was appended as assistant text.
    MaxRounds { rounds: u32 },
    /// `cancel` fired; history is back to where the round began.
    Cancelled,
    Failed { message: String },
}

/// The minimal interface the orchestration layer needs.
#[async_trait]
pub trait ChatSession: Send {
    /// Run one user turn, streaming events into `events`.
    async fn query(&mut self, text: &str, events: UnboundedSender<AgentEvent>) -> TurnOutcome;

    /// Stop the in-flight turn, if any.
    fn cancel(&self);

    /// True when no turn is running.
    fn is_ready(&self) -> bool;

    fn set_model(&mut self, model: &str);
}

#[derive(Debug, Default)]
struct Shared {
    cancel: Mutex<CancellationToken>,
    busy: AtomicBool,
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Cancel the current turn. A no-op while idle.
    pub fn cancel(&self) {
        if self.is_busy() {
            debug!("Cancelling in-flight turn");
            self.token().cancel();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    fn token(&self) -> CancellationToken {
        self.shared
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Mark a turn as started and hand out its cancellation token.
    pub(crate) fn begin(&self) -> TurnGuard {
        let token = CancellationToken::new();
        *self
            .shared
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token.clone();
        self.shared.busy.store(true, Ordering::SeqCst);
        TurnGuard {
            handle: self.clone(),
            token,
        }
    }
}

/// Clears the busy flag when the turn ends, however it ends.
pub(crate) struct TurnGuard {
    handle: SessionHandle,
    pub token: CancellationToken,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.handle.shared.busy.store(false, Ordering::SeqCst);
    }
}
