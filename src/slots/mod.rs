pub mod store;

use std::fmt;

use uuid::Uuid;

use crate::fetch::Artifact;

pub use store::{
    lock_store, DiscardReason, FetchOutcome, FetchStart, FetchTicket, SharedSlotStore, SlotStore,
};

/// Stable identity of a slot. Unlike the index it survives removal and
/// reordering of other slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(Uuid);

impl SlotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Read-only copy of one grid cell's state.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub index: usize,
    pub id: SlotId,
    pub url: String,
    pub last_artifact: Option<Artifact>,
    pub consecutive_failures: u32,
}

impl Slot {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// True once enough consecutive fetches failed to flag the image as gone.
    pub fn is_missing(&self, max_failures: u32) -> bool {
        self.consecutive_failures >= max_failures
    }
}
