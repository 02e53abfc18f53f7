//! Per-media-buy notification sequence state
//!
//! Each media buy owns a counter that is advanced once per notification
//! attempt, whether or not the notification is delivered. Alongside it the
//! store tracks delivery health: consecutive notifications that reached no
//! receiver, and when a receiver last accepted one.
//!
//! State lives in a sharded concurrent map. Every operation on a key runs
//! while holding that key's shard lock, so allocations for one media buy are
//! strictly serialised while unrelated media buys rarely contend. No I/O is
//! performed under the lock.
//!
//! State is created lazily on first use and kept for the process lifetime
//! unless explicitly [`reset`](SequenceStore::reset).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Counters for one media buy
#[derive(Debug, Clone, Default)]
struct SequenceCounters {
    /// Last allocated sequence number, 0 before the first allocation
    sequence_number: u64,
    /// Notifications in a row that no receiver accepted
    consecutive_failures: u64,
    /// When a receiver last accepted a notification
    last_success_at: Option<DateTime<Utc>>,
}

/// Point-in-time copy of one media buy's sequence state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaBuySequenceState {
    pub media_buy_id: String,
    pub sequence_number: u64,
    pub consecutive_failures: u64,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Store of sequence state, keyed by media buy id
#[derive(Debug, Default)]
pub struct SequenceStore {
    states: DashMap<String, SequenceCounters>,
}

impl SequenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number for `media_buy_id`.
    ///
    /// The first allocation for a key returns 1. Numbers are never reused
    /// while the key's state exists.
    pub fn next_sequence(&self, media_buy_id: &str) -> u64 {
        let mut entry = self.states.entry(media_buy_id.to_owned()).or_default();
        entry.sequence_number += 1;
        entry.sequence_number
    }

    /// Record whether a notification reached at least one receiver.
    pub fn record_outcome(&self, media_buy_id: &str, delivered: bool) {
        let mut entry = self.states.entry(media_buy_id.to_owned()).or_default();
        if delivered {
            entry.consecutive_failures = 0;
            entry.last_success_at = Some(Utc::now());
        } else {
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        }
    }

    /// Forget everything about `media_buy_id`.
    ///
    /// Returns `true` if state existed. Resetting an unknown key is a no-op.
    pub fn reset(&self, media_buy_id: &str) -> bool {
        self.states.remove(media_buy_id).is_some()
    }

    /// Consecutive undelivered notifications, 0 for unknown keys.
    #[must_use]
    pub fn failure_count(&self, media_buy_id: &str) -> u64 {
        self.states
            .get(media_buy_id)
            .map_or(0, |entry| entry.consecutive_failures)
    }

    #[must_use]
    pub fn last_success(&self, media_buy_id: &str) -> Option<DateTime<Utc>> {
        self.states
            .get(media_buy_id)
            .and_then(|entry| entry.last_success_at)
    }

    /// Last allocated sequence number, 0 for unknown keys.
    #[must_use]
    pub fn sequence_number(&self, media_buy_id: &str) -> u64 {
        self.states
            .get(media_buy_id)
            .map_or(0, |entry| entry.sequence_number)
    }

    #[must_use]
    pub fn snapshot(&self, media_buy_id: &str) -> Option<MediaBuySequenceState> {
        self.states
            .get(media_buy_id)
            .map(|entry| MediaBuySequenceState {
                media_buy_id: entry.key().clone(),
                sequence_number: entry.sequence_number,
                consecutive_failures: entry.consecutive_failures,
                last_success_at: entry.last_success_at,
            })
    }

    /// Media buy ids that currently have state, sorted.
    #[must_use]
    pub fn tracked(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.iter().map(|entry| entry.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
