//! Per-key reduction of a sub-batch to one winning event.
//!
//! The winner of a group is the maximum of its events under the order defined by
//! [`precedence`]: source timestamp, then [`crate::types::Operation::priority`], then arrival
//! position. Arrival positions are unique within a batch, so the order is total and the
//! reduction gives the same winner whatever order the events are folded in.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::types::{CanonicalKey, DecodedEvent};

/// Sort key of an event: `(timestamp, operation priority, arrival position)`.
fn precedence(event: &DecodedEvent) -> (i64, u8, usize) {
    (event.timestamp, event.operation.priority(), event.position)
}

/// Compares two events by precedence.
pub fn compare_events(a: &DecodedEvent, b: &DecodedEvent) -> Ordering {
    precedence(a).cmp(&precedence(b))
}

/// Returns the event that takes precedence. Never looks at payload content.
pub fn pick_winner(a: DecodedEvent, b: DecodedEvent) -> DecodedEvent {
    match compare_events(&a, &b) {
        Ordering::Less => b,
        Ordering::Equal | Ordering::Greater => a,
    }
}

/// Winners per canonical key of a set of events.
#[derive(Debug, Default)]
pub struct Deduplicated {
    winners: HashMap<CanonicalKey, DecodedEvent>,
    events: usize,
}

impl Deduplicated {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the reduction.
    pub fn push(&mut self, event: DecodedEvent) {
        self.events += 1;
        self.offer(event);
    }

    /// Merges a reduction computed over a disjoint set of events.
    pub fn merge(&mut self, other: Deduplicated) {
        self.events += other.events;
        for (_, event) in other.winners {
            self.offer(event);
        }
    }

    fn offer(&mut self, event: DecodedEvent) {
        match self.winners.entry(event.key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(event);
            }
            Entry::Occupied(mut entry) => {
                if compare_events(&event, entry.get()) == Ordering::Greater {
                    entry.insert(event);
                }
            }
        }
    }

    /// Number of events folded in, merged reductions included.
    pub fn events(&self) -> usize {
        self.events
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    pub fn get(&self, key: &CanonicalKey) -> Option<&DecodedEvent> {
        self.winners.get(key)
    }

    /// Returns the winners ordered by arrival position.
    pub fn into_winners(self) -> Vec<DecodedEvent> {
        let mut winners: Vec<_> = self.winners.into_values().collect();
        winners.sort_by_key(|event| event.position);
        winners
    }
}

impl FromIterator<DecodedEvent> for Deduplicated {
    fn from_iter<I: IntoIterator<Item = DecodedEvent>>(iter: I) -> Self {
        let mut deduplicated = Deduplicated::new();
        for event in iter {
            deduplicated.push(event);
        }
        deduplicated
    }
}

/// Reduces `events` to one winner per canonical key.
pub fn deduplicate<I>(events: I) -> Deduplicated
where
    I: IntoIterator<Item = DecodedEvent>,
{
    events.into_iter().collect()
}
