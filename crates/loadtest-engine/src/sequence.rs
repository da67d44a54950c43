//! Per-identity sequence number (nonce) allocation.
//!
//! Both allocators hand out a contiguous, gap-free range starting at the
//! seed. [`OwnedSequence`] serves a single issuer, [`SharedSequence`] is
//! cloned into every concurrent task issuing for the same identity.
//!
//! Allocation does not order delivery: a task holding a higher nonce may
//! reach the network first, and a stalled lower nonce then holds back every
//! later transaction of that identity until it is included or times out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of monotonically increasing sequence numbers for one identity.
pub trait SequenceAllocator {
    /// Return the next unused sequence number.
    fn next(&mut self) -> u64;
}

/// Counter owned by the single task issuing for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedSequence {
    next: u64,
}

impl OwnedSequence {
    /// Start allocating at `start`.
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    /// The value the next call to `next` will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl SequenceAllocator for OwnedSequence {
    fn next(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }
}

/// Counter shared by concurrent tasks issuing for the same identity.
#[derive(Debug, Clone)]
pub struct SharedSequence {
    counter: Arc<AtomicU64>,
}

impl SharedSequence {
    /// Start allocating at `start`. Must be seeded before any task is spawned.
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
        }
    }

    /// The value the next allocation will return.
    pub fn peek(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl SequenceAllocator for SharedSequence {
    fn next(&mut self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}
