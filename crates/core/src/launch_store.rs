//! In-memory record of launches awaiting their callback.
//!
//! Each `/launch` issues a random `state`; the matching callback must present it exactly once
//! and within [`LAUNCH_STATE_TTL`](crate::constants::LAUNCH_STATE_TTL). Entries live only in
//! this process and are never persisted.

use crate::constants::LAUNCH_STATE_BYTES;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Generate an unguessable URL-safe `state` value.
pub fn generate_state() -> String {
    let bytes: [u8; LAUNCH_STATE_BYTES] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Pending launch states keyed by value, each with its issue time.
///
/// Holds at most `capacity` states. Expired states are swept from the front of the issue
/// queue as new launches arrive, so each insert costs amortised constant time.
#[derive(Debug)]
pub struct PendingLaunches {
    ttl: Duration,
    capacity: usize,
    issued: Mutex<Issued>,
}

#[derive(Debug, Default)]
struct Issued {
    /// State to issue time and issue sequence number.
    by_state: HashMap<String, (Instant, u64)>,
    /// Issue order. May hold stale pairs for states already consumed or re-issued.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl Issued {
    fn is_live(&self, state: &str, seq: u64) -> bool {
        matches!(self.by_state.get(state), Some((_, live)) if *live == seq)
    }

    /// Drop stale and expired pairs from the front of the issue queue.
    fn sweep_expired(&mut self, now: Instant, ttl: Duration) {
        while let Some((state, seq)) = self.order.front() {
            let expired = match self.by_state.get(state) {
                Some((at, live)) if live == seq => now.duration_since(*at) >= ttl,
                _ => true,
            };
            if !expired {
                break;
            }
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some((state, seq)) = self.order.pop_front() {
            if self.is_live(&state, seq) {
                self.by_state.remove(&state);
            }
        }
    }
}

impl PendingLaunches {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            issued: Mutex::new(Issued::default()),
        }
    }

    /// Record a freshly issued state, evicting the oldest pending one when full.
    pub fn insert(&self, state: &str) {
        let now = Instant::now();
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);

        issued.sweep_expired(now, self.ttl);
        while issued.by_state.len() >= self.capacity && !issued.order.is_empty() {
            issued.pop_oldest();
        }

        let seq = issued.next_seq;
        issued.next_seq += 1;
        issued.by_state.insert(state.to_string(), (now, seq));
        issued.order.push_back((state.to_string(), seq));

        if issued.order.len() > 2 * self.capacity {
            let Issued { by_state, order, .. } = &mut *issued;
            order.retain(|(state, seq)| {
                matches!(by_state.get(state), Some((_, live)) if live == seq)
            });
        }
    }

    /// Redeem `state`. Returns `true` at most once per issued value, and only before expiry.
    pub fn consume(&self, state: &str) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        match issued.by_state.remove(state) {
            Some((at, _)) => at.elapsed() < self.ttl,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_state
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
