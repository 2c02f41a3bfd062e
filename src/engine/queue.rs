//! Expectation queue with completion tracking.
//!
//! Declarations push steps without suspending; `join` waits until every
//! pushed step has been processed by the evaluator (evaluated or skipped).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use super::step::Step;
use crate::error::{MockError, Result};

/// Count of steps pushed but not yet processed.
///
/// Claimed before a step is enqueued, completed after the evaluator is
/// done with it, so the count never underflows.
#[derive(Clone, Debug)]
pub(crate) struct CompletionTracker {
    outstanding: Arc<watch::Sender<usize>>,
}

impl CompletionTracker {
    pub(crate) fn new() -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            outstanding: Arc::new(outstanding),
        }
    }

    pub(crate) fn claim(&self, count: usize) {
        self.outstanding.send_modify(|n| *n += count);
    }

    pub(crate) fn complete(&self) {
        self.complete_many(1);
    }

    pub(crate) fn complete_many(&self, count: usize) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(count));
    }

    pub(crate) fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Resolve once nothing is outstanding
    pub(crate) async fn wait_drained(&self) {
        let mut rx = self.outstanding.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the expectation queue
pub(crate) struct ExpectationQueue {
    sender: Mutex<mpsc::UnboundedSender<Step>>,
    tracker: CompletionTracker,
}

impl ExpectationQueue {
    pub(crate) fn new(sender: mpsc::UnboundedSender<Step>, tracker: CompletionTracker) -> Self {
        Self {
            sender: Mutex::new(sender),
            tracker,
        }
    }

    pub(crate) fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    /// Enqueue `steps` back to back; no other declaration can interleave.
    pub(crate) fn push(&self, steps: Vec<Step>) -> Result<()> {
        let sender = self.sender.lock();
        let count = steps.len();
        self.tracker.claim(count);
        for (pushed, step) in steps.into_iter().enumerate() {
            if sender.send(step).is_err() {
                self.tracker.complete_many(count - pushed);
                return Err(MockError::unexpected("evaluator task has exited"));
            }
        }
        Ok(())
    }
}
