//! Request sequencing for views.
//!
//! A view takes a ticket before each fetch and applies the result only if the
//! ticket is still the latest. Closing the view invalidates every ticket it
//! handed out, so a response that lands after the user moved on is dropped.

use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct RequestSeq {
    latest: Cell<u64>,
}

impl RequestSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        let next = self.latest.get() + 1;
        self.latest.set(next);
        Ticket(next)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest.get()
    }

    /// Invalidate all outstanding tickets
    pub fn invalidate(&self) {
        self.latest.set(self.latest.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let seq = RequestSeq::new();
        let first = seq.issue();
        let second = seq.issue();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
    }

    #[test]
    fn test_invalidate_drops_outstanding() {
        let seq = RequestSeq::new();
        let ticket = seq.issue();
        seq.invalidate();
        assert!(!seq.is_current(ticket));
        assert!(seq.is_current(seq.issue()));
    }
}
