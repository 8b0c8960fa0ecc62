//! Identifier generation.
//!
//! The catalog never mints ids itself; the host injects an [`IdGenerator`] so
//! tests can use deterministic sequences while production uses random UUIDs.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::platform::PlatformSendSync;

/// Source of fresh, unique identifiers.
pub trait IdGenerator: PlatformSendSync {
    /// Return an identifier never returned before by this generator.
    fn next_id(&self) -> Uuid;
}

/// UUID v4 generator used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic generator producing `00000000-0000-0000-0000-000000000001`,
/// `...0002`, and so on.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    issued: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the sequence after `offset`, so the first id is `offset + 1`.
    pub fn starting_after(offset: u64) -> Self {
        Self {
            issued: AtomicU64::new(offset),
        }
    }

    /// Number of ids handed out so far (including the offset).
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Uuid {
        let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(n as u128)
    }
}
