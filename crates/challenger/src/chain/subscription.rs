use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use xlayer_fp_primitives::OutputProposal;

/// Consumer end of a proposal stream.
#[derive(Debug)]
pub struct ProposalSubscription {
    rx: mpsc::Receiver<OutputProposal>,
    cancel: Arc<watch::Sender<bool>>,
    cancelled: watch::Receiver<bool>,
}

/// Producer end of a proposal stream.
#[derive(Debug, Clone)]
pub struct ProposalFeed {
    tx: mpsc::Sender<OutputProposal>,
    cancelled: watch::Receiver<bool>,
}

/// Cancels a [`ProposalSubscription`] from outside the task consuming it.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl ProposalSubscription {
    /// Linked producer and consumer with room for `capacity` undelivered
    /// proposals. A full buffer makes the producer wait.
    pub fn channel(capacity: usize) -> (ProposalFeed, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let (cancel, cancelled) = watch::channel(false);
        let feed = ProposalFeed { tx, cancelled: cancelled.clone() };
        (feed, Self { rx, cancel: Arc::new(cancel), cancelled })
    }

    /// Next proposal, or `None` once cancelled or the producer has stopped.
    pub async fn recv(&mut self) -> Option<OutputProposal> {
        let cancelled = *self.cancelled.borrow();
        if cancelled {
            return None;
        }
        tokio::select! {
            biased;
            () = wait_cancelled(&mut self.cancelled) => None,
            proposal = self.rx.recv() => proposal,
        }
    }

    /// Handle that cancels this subscription from another task.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle { cancel: Arc::clone(&self.cancel) }
    }

    /// Stop intake. Further `recv` calls return `None`.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

impl Drop for ProposalSubscription {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

impl SubscriptionHandle {
    /// Stop intake. Proposals already delivered are unaffected.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

impl ProposalFeed {
    /// Deliver `proposal`. Returns `false` once the consumer is gone or has
    /// cancelled, after which the producer should stop.
    pub async fn send(&self, proposal: OutputProposal) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(proposal).await.is_ok()
    }

    /// Whether the consumer has cancelled or gone away.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || self.tx.is_closed()
    }

    /// Resolves once the consumer cancels or is dropped.
    pub async fn cancelled(&mut self) {
        wait_cancelled(&mut self.cancelled).await;
    }
}

/// Resolves once the flag is raised or its sender is gone.
async fn wait_cancelled(flag: &mut watch::Receiver<bool>) {
    loop {
        let raised = *flag.borrow_and_update();
        if raised || flag.changed().await.is_err() {
            return;
        }
    }
}
