/// Ordered, append-only record of messages for one client handle.
///
/// Insertion order is arrival order. Entries are never mutated after append;
/// readers only ever receive clones. The store is cleared only by an explicit
/// `reset`.

use crate::models::{Direction, Message, Payload};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct StoreInner {
    entries: VecDeque<Message>,
    capacity: Option<usize>,
    next_seq: u64,
    evicted: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MessageStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that evicts its oldest entry once `capacity` entries are held.
    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        MessageStore {
            inner: Arc::new(RwLock::new(StoreInner {
                entries: VecDeque::with_capacity(capacity),
                capacity: Some(capacity),
                ..StoreInner::default()
            })),
        }
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a payload, assigning the next sequence number. Never fails.
    pub fn append(&self, direction: Direction, payload: Payload) -> Message {
        let mut inner = self.write();
        let message = Message::new(inner.next_seq, direction, payload);
        inner.next_seq += 1;

        if let Some(capacity) = inner.capacity {
            while inner.entries.len() >= capacity {
                inner.entries.pop_front();
                inner.evicted += 1;
            }
        }
        inner.entries.push_back(message.clone());
        message
    }

    /// Current contents in arrival order
    pub fn snapshot(&self) -> Vec<Message> {
        self.read().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.read().capacity
    }

    /// Number of entries dropped by a bounded store
    pub fn evicted(&self) -> u64 {
        self.read().evicted
    }

    /// Clear all entries. Sequence numbers keep counting so positions stay unique.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.evicted = 0;
    }
}
