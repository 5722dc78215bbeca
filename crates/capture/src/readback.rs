//! Outstanding readback bookkeeping.
//!
//! One slot per segment, indexed by segment number. A slot holds the token
//! of the request currently in flight; completions whose token no longer
//! matches are stale.

use std::time::{Duration, Instant};

use contracts::ReadbackToken;

#[derive(Debug, Clone, Copy)]
struct InFlight {
    token: ReadbackToken,
    submitted_at: Instant,
}

/// Slot arena of in-flight readbacks
#[derive(Debug, Clone, Default)]
pub struct ReadbackSlots {
    slots: Vec<Option<InFlight>>,
}

impl ReadbackSlots {
    pub fn new(segment_count: usize) -> Self {
        Self {
            slots: vec![None; segment_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupy the token's slot
    ///
    /// Returns the token that was still outstanding in that slot, if any;
    /// the caller is expected to cancel it.
    pub fn submit(&mut self, token: ReadbackToken) -> Option<ReadbackToken> {
        if token.segment >= self.slots.len() {
            self.slots.resize(token.segment + 1, None);
        }
        let previous = self.slots[token.segment].replace(InFlight {
            token,
            submitted_at: Instant::now(),
        });
        previous.map(|p| p.token)
    }

    /// Resolve a completion
    ///
    /// Returns the readback latency when `token` is the one outstanding for
    /// its segment, `None` for stale or unknown tokens.
    pub fn complete(&mut self, token: ReadbackToken) -> Option<Duration> {
        let slot = self.slots.get_mut(token.segment)?;
        match slot {
            Some(in_flight) if in_flight.token == token => {
                let latency = in_flight.submitted_at.elapsed();
                *slot = None;
                Some(latency)
            }
            _ => None,
        }
    }

    pub fn is_outstanding(&self, segment: usize) -> bool {
        matches!(self.slots.get(segment), Some(Some(_)))
    }

    /// Number of requests still in flight
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Abandon every outstanding request, returning their tokens
    pub fn drain(&mut self) -> Vec<ReadbackToken> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.take().map(|p| p.token))
            .collect()
    }

    /// Resize for a new segment plan; all outstanding requests are dropped
    pub fn reset(&mut self, segment_count: usize) -> Vec<ReadbackToken> {
        let abandoned = self.drain();
        self.slots = vec![None; segment_count];
        abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(segment: usize, cycle: u64) -> ReadbackToken {
        ReadbackToken { segment, cycle }
    }

    #[test]
    fn test_submit_and_complete() {
        let mut slots = ReadbackSlots::new(3);
        assert_eq!(slots.submit(token(1, 1)), None);
        assert!(slots.is_outstanding(1));
        assert_eq!(slots.outstanding(), 1);

        assert!(slots.complete(token(1, 1)).is_some());
        assert!(!slots.is_outstanding(1));
        assert_eq!(slots.outstanding(), 0);
    }

    #[test]
    fn test_resubmit_returns_previous_token() {
        let mut slots = ReadbackSlots::new(3);
        slots.submit(token(0, 1));
        assert_eq!(slots.submit(token(0, 2)), Some(token(0, 1)));

        // The older completion is stale now
        assert!(slots.complete(token(0, 1)).is_none());
        assert!(slots.complete(token(0, 2)).is_some());
    }

    #[test]
    fn test_complete_twice_is_stale() {
        let mut slots = ReadbackSlots::new(2);
        slots.submit(token(1, 5));
        assert!(slots.complete(token(1, 5)).is_some());
        assert!(slots.complete(token(1, 5)).is_none());
    }

    #[test]
    fn test_unknown_segment() {
        let mut slots = ReadbackSlots::new(2);
        assert!(slots.complete(token(7, 1)).is_none());
        assert!(!slots.is_outstanding(7));
    }

    #[test]
    fn test_drain_and_reset() {
        let mut slots = ReadbackSlots::new(3);
        slots.submit(token(0, 1));
        slots.submit(token(2, 1));

        let mut abandoned = slots.reset(5);
        abandoned.sort_by_key(|t| t.segment);
        assert_eq!(abandoned, vec![token(0, 1), token(2, 1)]);
        assert_eq!(slots.len(), 5);
        assert_eq!(slots.outstanding(), 0);
    }
}
