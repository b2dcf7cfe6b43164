//! Trailing-edge debouncing with generation tickets.
//!
//! ```text
//! arm() → 1   arm() → 2   arm() → 3        fire(1) ✗  fire(2) ✗  fire(3) ✓
//! ```
//!
//! The timer itself lives in the event loop; only the latest ticket may act
//! when it elapses.

pub type Ticket = u64;

#[derive(Debug, Default, Clone)]
pub struct Debouncer {
    generation: Ticket,
    pending: Option<Ticket>,
}

impl Debouncer {
    /// Supersede any pending ticket and issue a new one.
    pub fn arm(&mut self) -> Ticket {
        self.generation += 1;
        self.pending = Some(self.generation);
        self.generation
    }

    /// Whether `ticket` is the live one. Consumes it on success.
    pub fn fire(&mut self, ticket: Ticket) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
