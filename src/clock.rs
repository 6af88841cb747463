//! Logical clocks and operation identifiers.
//!
//! Every CRDT operation is identified by an [`Id`] — a `(session, time)`
//! pair in the global logical clock space. Runs of consecutive identifiers
//! (one per inserted character, byte, or array slot) are described by an
//! [`IdSpan`].

use std::collections::HashMap;
use std::fmt;

/// Reserved session IDs.
pub mod session {
    /// Reserved by the protocol — cannot be used by documents.
    pub const SYSTEM: u64 = 0;
    /// Maximum allowed session ID (53-bit safe integer).
    pub const MAX: u64 = 9007199254740991;
}

/// An immutable logical timestamp: `(session_id, logical_time)`.
///
/// Ordering is by time first, then session ID, which is the total order
/// used for all last-write-wins decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id {
    pub sid: u64,
    pub time: u64,
}

impl Id {
    pub const fn new(sid: u64, time: u64) -> Self {
        Self { sid, time }
    }

    /// The identifier `cycles` ticks after this one.
    #[inline]
    pub fn tick(self, cycles: u64) -> Id {
        Id::new(self.sid, self.time + cycles)
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.cmp(&other.time).then(self.sid.cmp(&other.sid))
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.sid.to_string();
        if s.len() > 4 {
            write!(f, "..{}.{}", &s[s.len() - 4..], self.time)
        } else {
            write!(f, "{}.{}", s, self.time)
        }
    }
}

/// A contiguous run of identifiers: `[time, time + len)` within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSpan {
    pub sid: u64,
    pub time: u64,
    pub len: u64,
}

impl IdSpan {
    pub const fn new(sid: u64, time: u64, len: u64) -> Self {
        Self { sid, time, len }
    }

    /// The identifier of the first element in the span.
    pub fn id(&self) -> Id {
        Id::new(self.sid, self.time)
    }

    /// Returns `true` if this span covers `id`.
    pub fn contains(&self, id: Id) -> bool {
        self.sid == id.sid && self.time <= id.time && id.time < self.time + self.len
    }
}

impl fmt::Display for IdSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.id(), self.len)
    }
}

/// The origin identifier — the bottom of the identifier lattice.
///
/// Addresses the document root register and serves as the "insert at the
/// beginning" anchor for RGA sequences.
pub const ORIGIN: Id = Id::new(session::SYSTEM, 0);

/// Sentinel for "no value set yet" registers.
pub const UNDEF: Id = Id::new(session::SYSTEM, 1);

// ── LogicalClock ──────────────────────────────────────────────────────────

/// A mutable logical clock that hands out consecutive identifiers.
#[derive(Debug, Clone)]
pub struct LogicalClock {
    pub sid: u64,
    pub time: u64,
}

impl LogicalClock {
    pub fn new(sid: u64, time: u64) -> Self {
        Self { sid, time }
    }

    /// Returns the current identifier and advances the clock by `cycles`.
    pub fn tick(&mut self, cycles: u64) -> Id {
        let stamp = Id::new(self.sid, self.time);
        self.time += cycles;
        stamp
    }
}

// ── ClockVector ───────────────────────────────────────────────────────────

/// A vector clock: the local logical clock plus the highest time observed
/// from every peer session.
#[derive(Debug, Clone)]
pub struct ClockVector {
    pub sid: u64,
    pub time: u64,
    pub peers: HashMap<u64, u64>,
}

impl ClockVector {
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            sid,
            time,
            peers: HashMap::new(),
        }
    }

    /// Returns the current identifier and advances the clock by `cycles`.
    pub fn tick(&mut self, cycles: u64) -> Id {
        let stamp = Id::new(self.sid, self.time);
        self.time += cycles;
        stamp
    }

    /// Advance local time past an observed operation. Idempotent.
    pub fn observe(&mut self, id: Id, span: u64) {
        let edge = id.time + span - 1;
        if id.sid != self.sid {
            let peer = self.peers.entry(id.sid).or_insert(edge);
            if edge > *peer {
                *peer = edge;
            }
        }
        if edge >= self.time {
            self.time = edge + 1;
        }
    }
}

impl fmt::Display for ClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock {}.{}", self.sid, self.time)?;
        for (sid, time) in &self.peers {
            write!(f, " [{}.{}]", sid, time)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_order_is_time_then_sid() {
        assert!(Id::new(1, 2) > Id::new(2, 1));
        assert!(Id::new(2, 1) > Id::new(1, 1));
        assert_eq!(Id::new(3, 7), Id::new(3, 7));
    }

    #[test]
    fn span_contains() {
        let span = IdSpan::new(5, 10, 3);
        assert!(span.contains(Id::new(5, 10)));
        assert!(span.contains(Id::new(5, 12)));
        assert!(!span.contains(Id::new(5, 13)));
        assert!(!span.contains(Id::new(6, 11)));
    }

    #[test]
    fn logical_clock_ticks() {
        let mut clock = LogicalClock::new(9, 1);
        assert_eq!(clock.tick(3), Id::new(9, 1));
        assert_eq!(clock.tick(1), Id::new(9, 4));
    }

    #[test]
    fn clock_vector_observes_peers() {
        let mut clock = ClockVector::new(1, 1);
        clock.observe(Id::new(2, 10), 5);
        assert_eq!(clock.time, 15);
        assert_eq!(clock.peers.get(&2), Some(&14));
        // Re-observing is a no-op.
        clock.observe(Id::new(2, 10), 5);
        assert_eq!(clock.time, 15);
    }
}
