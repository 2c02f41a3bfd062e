//! The engine's long-lived tasks: acceptor, evaluator and executor.
//!
//! The evaluator drains the expectation queue, hands each step's action to
//! the executor, then awaits the step's evaluation. The executor drains the
//! action queue and publishes what each action produced. Once the error sink
//! is non-empty both keep draining but do no work, so `join` always returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::action::Action;
use super::queue::CompletionTracker;
use super::step::{EvalContext, Step};
use super::Shared;
use crate::error::MockError;
use crate::event::Event;

/// Pause after a failed `accept` so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

pub(crate) async fn run_evaluator(
    shared: Arc<Shared>,
    mut steps: mpsc::UnboundedReceiver<Step>,
    actions: mpsc::UnboundedSender<Action>,
    mut events: mpsc::UnboundedReceiver<Event>,
    tracker: CompletionTracker,
) {
    while let Some(step) = steps.recv().await {
        debug!(%step, "expectation dequeued");

        if shared.errors.is_empty() {
            let action = step.produce_action(&shared.config);
            if actions.send(action).is_err() {
                shared.errors.record(MockError::unexpected("executor task has exited"));
            } else {
                let mut ctx = EvalContext::new(&shared, &mut events);
                if let Err(err) = step.evaluate(&mut ctx).await {
                    debug!(%step, error = %err, "evaluation failed");
                    shared.errors.record(err);
                }
                shared.metrics.record_evaluated();
            }
        } else {
            debug!(%step, "errors recorded, expectation not evaluated");
            shared.metrics.record_skipped();
        }

        // Skipped steps count too, or `join` would wait forever.
        tracker.complete();
    }
    debug!("expectation queue closed, evaluator exiting");
}

pub(crate) async fn run_executor(shared: Arc<Shared>, mut actions: mpsc::UnboundedReceiver<Action>) {
    while let Some(action) = actions.recv().await {
        if !shared.errors.is_empty() {
            debug!(%action, "errors recorded, dropping action");
            shared.metrics.record_dropped();
            continue;
        }

        debug!(%action, "executing action");
        shared.metrics.record_executed();
        match action.execute(&shared).await {
            Ok(Some(event)) => shared.publish(event),
            Ok(None) => {}
            Err(err) => {
                debug!(error = %err, "action failed");
                let err = Arc::new(err);
                shared.errors.record_shared(err.clone());
                shared.publish(Event::ActionFailed(err));
            }
        }
    }
    debug!("action queue closed, executor exiting");
}

pub(crate) async fn run_acceptor(shared: Arc<Shared>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => shared.register_connection(stream, peer).await,
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
