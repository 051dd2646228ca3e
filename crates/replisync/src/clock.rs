//! Order tokens and the per-replica clock that issues them.

use std::fmt;

use replisync_buffers::{Reader, Writer};
use replisync_schema::SchemaError;

// ── OrderToken ─────────────────────────────────────────────────────────────

/// A `(counter, replica)` stamp. Tokens are totally ordered: by counter
/// first, then by replica id, so two replicas that stamp the same counter
/// still agree on a winner.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderToken {
    pub counter: u64,
    pub replica: String,
}

impl OrderToken {
    pub fn new(counter: u64, replica: impl Into<String>) -> Self {
        Self {
            counter,
            replica: replica.into(),
        }
    }

    /// Writes `[counter: u64][replica: utf16 string]`.
    pub fn encode(&self, out: &mut Writer) {
        out.u64(self.counter);
        out.str_utf16(&self.replica);
    }

    pub fn decode(inp: &mut Reader<'_>) -> Result<Self, SchemaError> {
        let counter = inp.try_u64()?;
        let replica = inp.try_str_utf16()?;
        Ok(Self { counter, replica })
    }
}

impl fmt::Display for OrderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.replica, self.counter)
    }
}

// ── ReplicaClock ───────────────────────────────────────────────────────────

/// Lamport clock of one replica.
#[derive(Debug, Clone)]
pub struct ReplicaClock {
    replica: String,
    counter: u64,
}

impl ReplicaClock {
    pub fn new(replica: impl Into<String>) -> Self {
        Self::with_counter(replica, 0)
    }

    pub fn with_counter(replica: impl Into<String>, counter: u64) -> Self {
        Self {
            replica: replica.into(),
            counter,
        }
    }

    pub fn replica(&self) -> &str {
        &self.replica
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Advances the clock and returns the new stamp.
    pub fn tick(&mut self) -> OrderToken {
        self.counter += 1;
        OrderToken::new(self.counter, self.replica.clone())
    }

    /// Lifts the counter to at least `token`'s, so the next local stamp
    /// orders after everything observed. Idempotent.
    pub fn observe(&mut self, token: &OrderToken) {
        if token.counter > self.counter {
            self.counter = token.counter;
        }
    }
}
