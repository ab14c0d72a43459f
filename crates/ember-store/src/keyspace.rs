use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::{DEFAULT_NODE_CAP, Quicklist, Value};

/// Keys sampled per active-expire pass unless overridden.
pub const DEFAULT_TTL_SAMPLE_SIZE: usize = 20;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// The key-value store plus its TTL index.
///
/// `deadlines` is an insertion-swap-delete array, not a sorted structure:
/// removal swaps the victim with the last entry and pops, and `position`
/// maps each tracked key to its current slot. For every key k with a TTL,
/// `deadlines[position[k]].0 == k`; keys without a TTL are absent from
/// `position`. Deadlines are absolute monotonic timestamps; `now` is always
/// supplied by the caller.
pub struct Keyspace {
    store: HashMap<Vec<u8>, Value>,
    deadlines: Vec<(Vec<u8>, Instant)>,
    position: HashMap<Vec<u8>, usize>,
    node_cap: usize,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::with_node_cap(DEFAULT_NODE_CAP)
    }
}

impl Keyspace {
    /// `node_cap` is handed to every quicklist this keyspace creates.
    pub fn with_node_cap(node_cap: usize) -> Self {
        Self {
            store: HashMap::new(),
            deadlines: Vec::new(),
            position: HashMap::new(),
            node_cap,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of keys currently carrying a deadline.
    #[inline]
    pub fn tracked_deadlines(&self) -> usize {
        self.deadlines.len()
    }

    /// Inserts or replaces `key`. With a TTL the key's deadline becomes
    /// `now + ttl`; without one any previous deadline is dropped, so a plain
    /// set never inherits an old expiry.
    pub fn set(&mut self, key: Vec<u8>, value: Value, ttl: Option<Duration>, now: Instant) {
        match ttl {
            Some(ttl) => {
                let deadline = now + ttl;
                if let Some(&slot) = self.position.get(&key) {
                    self.deadlines[slot].1 = deadline;
                } else {
                    self.position.insert(key.clone(), self.deadlines.len());
                    self.deadlines.push((key.clone(), deadline));
                }
            }
            None => self.drop_deadline(&key),
        }
        self.store.insert(key, value);
    }

    /// Lazy expiration happens here: a key whose deadline has passed is
    /// deleted before any observer sees it.
    pub fn get(&mut self, key: &[u8], now: Instant) -> Option<&Value> {
        if self.expire_if_due(key, now) {
            return None;
        }
        self.store.get(key)
    }

    /// Removes `key` from the store and the TTL index. Returns whether a
    /// value was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let removed = self.store.remove(key).is_some();
        self.drop_deadline(key);
        removed
    }

    /// One probabilistic expiration pass: scan up to `sample_size` entries
    /// forward from a random slot (clamped at the array end, no wrap) and
    /// delete the ones that are due. Collects first so the scan never walks
    /// an array it is mutating. Returns the number of keys removed.
    pub fn active_expire(&mut self, sample_size: usize, now: Instant) -> usize {
        if self.deadlines.is_empty() || sample_size == 0 {
            return 0;
        }
        let start = rand::rng().random_range(0..self.deadlines.len());
        let end = (start + sample_size).min(self.deadlines.len());
        let due: Vec<Vec<u8>> = self.deadlines[start..end]
            .iter()
            .filter(|(_, deadline)| now >= *deadline)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            self.delete(key);
        }
        if !due.is_empty() {
            debug!(expired = due.len(), "active expiration pass");
        }
        due.len()
    }

    /// Pushes `items` in input order onto the list at `key`, creating the
    /// list on a miss. Fails without touching anything if the key holds a
    /// non-list value.
    pub fn add_to_list(
        &mut self,
        key: &[u8],
        items: Vec<Vec<u8>>,
        prepend: bool,
        now: Instant,
    ) -> Result<usize, StoreError> {
        self.expire_if_due(key, now);
        let value = self
            .store
            .entry(key.to_vec())
            .or_insert_with(|| Value::List(Quicklist::with_node_cap(self.node_cap)));
        let Value::List(list) = value else {
            return Err(StoreError::WrongType);
        };
        for item in items {
            if prepend {
                list.push_front(item);
            } else {
                list.push_back(item);
            }
        }
        Ok(list.len())
    }

    /// List access for pop/len/range paths, with the same lazy expiration
    /// as `get`.
    pub fn get_list_mut(
        &mut self,
        key: &[u8],
        now: Instant,
    ) -> Result<Option<&mut Quicklist>, StoreError> {
        if self.expire_if_due(key, now) {
            return Ok(None);
        }
        match self.store.get_mut(key) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn expire_if_due(&mut self, key: &[u8], now: Instant) -> bool {
        let Some(&slot) = self.position.get(key) else {
            return false;
        };
        if now >= self.deadlines[slot].1 {
            self.delete(key);
            return true;
        }
        false
    }

    /// Swap-with-last removal from the TTL index, O(1).
    fn drop_deadline(&mut self, key: &[u8]) {
        let Some(slot) = self.position.remove(key) else {
            return;
        };
        let last = self.deadlines.len() - 1;
        if slot != last {
            self.deadlines.swap(slot, last);
            let moved = self.deadlines[slot].0.clone();
            self.position.insert(moved, slot);
        }
        self.deadlines.pop();
    }
}
