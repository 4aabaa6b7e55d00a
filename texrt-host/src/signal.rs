//! One-shot completion signal
//!
//! The module announces that its run is over exactly once, either by calling
//! the termination entry point or by asking for terminal input after the
//! terminal script is drained. The session awaits the other half.

use texrt_abi::CompletionReason;
use tokio::sync::oneshot;

/// Firing half, owned by the host functions
#[derive(Debug)]
pub struct CompletionSignal {
    sender: Option<oneshot::Sender<CompletionReason>>,
    fired: Option<CompletionReason>,
}

/// Awaiting half, owned by the session
#[derive(Debug)]
pub struct CompletionWaiter {
    receiver: oneshot::Receiver<CompletionReason>,
}

impl CompletionSignal {
    /// Create a connected signal/waiter pair
    pub fn new() -> (Self, CompletionWaiter) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Some(sender),
                fired: None,
            },
            CompletionWaiter { receiver },
        )
    }

    /// Fire the signal; returns false if it had already fired
    pub fn fire(&mut self, reason: CompletionReason) -> bool {
        if self.fired.is_some() {
            return false;
        }
        self.fired = Some(reason);
        if let Some(sender) = self.sender.take() {
            // The waiter may already be gone after a teardown
            let _ = sender.send(reason);
        }
        tracing::info!(?reason, "Completion signalled");
        true
    }

    /// The reason the signal fired with, if it has
    pub fn fired(&self) -> Option<CompletionReason> {
        self.fired
    }

    /// Give up without firing, releasing the waiter
    pub fn abandon(&mut self) {
        self.sender = None;
    }
}

impl CompletionWaiter {
    /// Wait for the signal; `None` if it was abandoned without firing
    pub async fn wait(self) -> Option<CompletionReason> {
        self.receiver.await.ok()
    }

    /// Check without waiting
    pub fn try_wait(&mut self) -> Option<CompletionReason> {
        self.receiver.try_recv().ok()
    }
}
