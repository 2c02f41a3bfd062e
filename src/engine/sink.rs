//! Shared record of every failure; the first one decides the report.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::MockError;

/// Append-only. Non-empty means both background tasks stop doing work.
#[derive(Debug, Default)]
pub(crate) struct ErrorSink {
    errors: Mutex<Vec<Arc<MockError>>>,
}

impl ErrorSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, error: MockError) {
        self.record_shared(Arc::new(error));
    }

    pub(crate) fn record_shared(&self, error: Arc<MockError>) {
        self.errors.lock().push(error);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub(crate) fn first(&self) -> Option<Arc<MockError>> {
        self.errors.lock().first().cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<MockError>> {
        self.errors.lock().clone()
    }
}
