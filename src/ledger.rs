//! Cumulative record of bytes sent by the mock and consumed by the peer.

use crate::error::{MockError, Result};
use crate::event::Event;

/// `read` must always be a prefix of `sent`
#[derive(Debug, Default, Clone)]
pub struct ByteLedger {
    sent: Vec<u8>,
    read: Vec<u8>,
}

impl ByteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&mut self, bytes: &[u8]) {
        self.sent.extend_from_slice(bytes);
    }

    pub fn record_read(&mut self, bytes: &[u8]) {
        self.read.extend_from_slice(bytes);
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn read(&self) -> &[u8] {
        &self.read
    }

    /// Compare the two sides.
    ///
    /// Yields `NoUnreadData` or `UnreadData(suffix)`; a read side that is not a
    /// prefix of the sent side is reported as `LedgerCorrupted`.
    pub fn unread(&self) -> Result<Event> {
        if self.read == self.sent {
            return Ok(Event::NoUnreadData);
        }
        match self.sent.strip_prefix(self.read.as_slice()) {
            Some(rest) => Ok(Event::UnreadData(rest.to_vec())),
            None => Err(MockError::LedgerCorrupted {
                sent: self.sent.clone(),
                read: self.read.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_has_no_unread_data() {
        let ledger = ByteLedger::new();
        assert!(matches!(ledger.unread(), Ok(Event::NoUnreadData)));
    }

    #[test]
    fn test_partial_read_leaves_suffix() {
        let mut ledger = ByteLedger::new();
        ledger.record_sent(b"abc");
        ledger.record_read(b"a");
        match ledger.unread() {
            Ok(Event::UnreadData(rest)) => assert_eq!(rest, b"bc"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_reads_accumulate_across_sends() {
        let mut ledger = ByteLedger::new();
        ledger.record_sent(b"Hola!");
        ledger.record_sent(b"Adios!");
        ledger.record_read(b"Hola");
        ledger.record_read(b"!Adios!");
        assert!(matches!(ledger.unread(), Ok(Event::NoUnreadData)));
        assert_eq!(ledger.sent(), b"Hola!Adios!");
    }

    #[test]
    fn test_divergent_read_is_corruption() {
        let mut ledger = ByteLedger::new();
        ledger.record_sent(b"abc");
        ledger.record_read(b"x");
        assert!(matches!(ledger.unread(), Err(MockError::LedgerCorrupted { .. })));
    }
}
