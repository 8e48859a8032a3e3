use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Slot, SlotId};
use crate::error::{FetchError, SlotError};
use crate::fetch::Artifact;

/// The store shared between the manager and every timer task. All writes
/// go through this one mutex.
pub type SharedSlotStore = Arc<Mutex<SlotStore>>;

/// Lock the shared store, recovering the data if a writer panicked.
pub fn lock_store(store: &SharedSlotStore) -> MutexGuard<'_, SlotStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SlotEntry {
    id: SlotId,
    url: String,
    last_artifact: Option<Artifact>,
    consecutive_failures: u32,
    /// Bumped for every fetch issued and every URL change. A completing
    /// fetch must present the current value to be applied.
    fetch_seq: u64,
}

impl SlotEntry {
    fn new(url: String) -> Self {
        Self {
            id: SlotId::new(),
            url,
            last_artifact: None,
            consecutive_failures: 0,
            fetch_seq: 0,
        }
    }
}

/// Proof that a fetch was dispatched for a slot at a given point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub slot: SlotId,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStart {
    Ready { ticket: FetchTicket, url: String },
    /// Empty URL: nothing to fetch this tick.
    Unconfigured,
    /// The slot was removed.
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    SlotRemoved,
    /// A newer fetch was issued or the URL changed after dispatch.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied {
        index: usize,
        consecutive_failures: u32,
    },
    Discarded(DiscardReason),
}

/// Ordered slot records. Index `i` is the i-th grid cell in row-major order.
#[derive(Default)]
pub struct SlotStore {
    slots: Vec<SlotEntry>,
    generation: u64,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: urls.into_iter().map(|u| SlotEntry::new(u.into())).collect(),
            generation: 0,
        }
    }

    pub fn into_shared(self) -> SharedSlotStore {
        Arc::new(Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bumped by every structural mutation (append, remove, move, grow).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn append(&mut self, url: impl Into<String>) -> usize {
        self.slots.push(SlotEntry::new(url.into()));
        self.generation += 1;
        self.slots.len() - 1
    }

    /// Remove the slot at `index`; every later slot moves down one and keeps
    /// its artifact and failure count.
    pub fn remove_at(&mut self, index: usize) -> Result<SlotId, SlotError> {
        self.check(index)?;
        let removed = self.slots.remove(index);
        self.generation += 1;
        Ok(removed.id)
    }

    pub fn move_slot(&mut self, from: usize, to: usize) -> Result<(), SlotError> {
        self.check(from)?;
        self.check(to)?;
        if from != to {
            let entry = self.slots.remove(from);
            self.slots.insert(to, entry);
            self.generation += 1;
        }
        Ok(())
    }

    /// Replace the URL. Artifact and failure count are left alone; any fetch
    /// still running against the old URL will be discarded.
    pub fn set_url(&mut self, index: usize, url: impl Into<String>) -> Result<(), SlotError> {
        self.check(index)?;
        let entry = &mut self.slots[index];
        let url = url.into();
        if entry.url != url {
            entry.url = url;
            entry.fetch_seq += 1;
        }
        Ok(())
    }

    /// Returns false when the index no longer exists.
    pub fn record_success(&mut self, index: usize, artifact: Artifact) -> bool {
        match self.slots.get_mut(index) {
            Some(entry) => {
                entry.last_artifact = Some(artifact);
                entry.consecutive_failures = 0;
                true
            }
            None => false,
        }
    }

    /// Returns false when the index no longer exists.
    pub fn record_failure(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(entry) => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Append empty slots until there are at least `min_len`. Returns how
    /// many were added.
    pub fn ensure_len(&mut self, min_len: usize) -> usize {
        let missing = min_len.saturating_sub(self.slots.len());
        if missing > 0 {
            self.slots
                .extend((0..missing).map(|_| SlotEntry::new(String::new())));
            self.generation += 1;
        }
        missing
    }

    pub fn id_at(&self, index: usize) -> Option<SlotId> {
        self.slots.get(index).map(|s| s.id)
    }

    pub fn index_of(&self, id: SlotId) -> Option<usize> {
        self.slots.iter().position(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<SlotId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.url.clone()).collect()
    }

    pub fn get(&self, index: usize) -> Option<Slot> {
        self.slots.get(index).map(|entry| Self::to_slot(index, entry))
    }

    pub fn snapshot(&self) -> Vec<Slot> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::to_slot(index, entry))
            .collect()
    }

    /// Issue a ticket for a fetch of the slot's current URL. Any ticket
    /// issued earlier for the same slot becomes stale.
    pub fn begin_fetch(&mut self, id: SlotId) -> FetchStart {
        let Some(entry) = self.slots.iter_mut().find(|s| s.id == id) else {
            return FetchStart::Gone;
        };
        if entry.url.trim().is_empty() {
            return FetchStart::Unconfigured;
        }
        entry.fetch_seq += 1;
        FetchStart::Ready {
            ticket: FetchTicket {
                slot: id,
                seq: entry.fetch_seq,
            },
            url: entry.url.clone(),
        }
    }

    /// Route a fetch result to the slot it was issued for, wherever that
    /// slot sits now.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Artifact, FetchError>,
    ) -> FetchOutcome {
        let Some(index) = self.index_of(ticket.slot) else {
            return FetchOutcome::Discarded(DiscardReason::SlotRemoved);
        };
        if self.slots[index].fetch_seq != ticket.seq {
            return FetchOutcome::Discarded(DiscardReason::Superseded);
        }

        match result {
            Ok(artifact) => self.record_success(index, artifact),
            Err(_) => self.record_failure(index),
        };

        FetchOutcome::Applied {
            index,
            consecutive_failures: self.slots[index].consecutive_failures,
        }
    }

    fn check(&self, index: usize) -> Result<(), SlotError> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(SlotError::OutOfRange {
                index,
                len: self.slots.len(),
            })
        }
    }

    fn to_slot(index: usize, entry: &SlotEntry) -> Slot {
        Slot {
            index,
            id: entry.id,
            url: entry.url.clone(),
            last_artifact: entry.last_artifact.clone(),
            consecutive_failures: entry.consecutive_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use image::DynamicImage;

    use super::*;

    fn artifact(url: &str) -> Artifact {
        Artifact::new(DynamicImage::new_rgba8(2, 2), url)
    }

    fn triple(slot: &Slot) -> (String, Option<Artifact>, u32) {
        (
            slot.url.clone(),
            slot.last_artifact.clone(),
            slot.consecutive_failures,
        )
    }

    fn store_of(n: usize) -> SlotStore {
        SlotStore::from_urls((0..n).map(|i| format!("https://cam/{}", i)))
    }

    #[test]
    fn test_append_returns_new_index() {
        let mut store = SlotStore::new();
        assert_eq!(store.append("https://a"), 0);
        assert_eq!(store.append(""), 1);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap[0].last_artifact.is_none());
        assert_eq!(snap[1].consecutive_failures, 0);
        assert!(!snap[1].is_configured());
    }

    #[test]
    fn test_failures_accumulate_then_reset_on_success() {
        let mut store = store_of(1);
        for _ in 0..4 {
            assert!(store.record_failure(0));
        }
        assert_eq!(store.get(0).unwrap().consecutive_failures, 4);

        let fresh = artifact("https://cam/0");
        assert!(store.record_success(0, fresh.clone()));
        let slot = store.get(0).unwrap();
        assert_eq!(slot.consecutive_failures, 0);
        assert_eq!(slot.last_artifact, Some(fresh));
    }

    #[test]
    fn test_record_on_missing_index_is_noop() {
        let mut store = store_of(2);
        assert!(!store.record_failure(2));
        assert!(!store.record_success(5, artifact("https://x")));
        assert!(store.snapshot().iter().all(|s| s.consecutive_failures == 0));
    }

    #[test]
    fn test_remove_shifts_following_slots_with_their_state() {
        let mut store = store_of(4);
        store.record_failure(2);
        store.record_success(3, artifact("https://cam/3"));
        store.record_failure(3);
        let before = store.snapshot();

        store.remove_at(1).unwrap();
        let after = store.snapshot();

        assert_eq!(after.len(), 3);
        assert_eq!(triple(&after[0]), triple(&before[0]));
        assert_eq!(triple(&after[1]), triple(&before[2]));
        assert_eq!(triple(&after[2]), triple(&before[3]));
        assert_eq!(after[2].index, 2);
        assert_eq!(after[2].id, before[3].id);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut store = store_of(2);
        assert_eq!(
            store.remove_at(2),
            Err(SlotError::OutOfRange { index: 2, len: 2 })
        );
        assert!(store.move_slot(0, 2).is_err());
        assert!(store.move_slot(7, 0).is_err());
        assert!(store.set_url(3, "https://x").is_err());
        assert_eq!(store.len(), 2);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_move_preserves_records() {
        let mut store = store_of(4);
        store.record_failure(0);
        let before = store.snapshot();

        store.move_slot(0, 3).unwrap();
        let after = store.snapshot();
        assert_eq!(after[3].id, before[0].id);
        assert_eq!(after[3].consecutive_failures, 1);
        assert_eq!(after[0].id, before[1].id);
        assert_eq!(after[2].id, before[3].id);

        store.move_slot(3, 1).unwrap();
        let back = store.snapshot();
        assert_eq!(back[1].id, before[0].id);
        assert_eq!(back[0].id, before[1].id);
    }

    #[test]
    fn test_set_url_keeps_state() {
        let mut store = store_of(1);
        let shown = artifact("https://cam/0");
        store.record_success(0, shown.clone());
        store.record_failure(0);

        store.set_url(0, "https://other").unwrap();
        let slot = store.get(0).unwrap();
        assert_eq!(slot.url, "https://other");
        assert_eq!(slot.consecutive_failures, 1);
        assert_eq!(slot.last_artifact, Some(shown));
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let mut store = store_of(2);
        let snap = store.snapshot();
        store.record_failure(0);
        store.remove_at(1).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].consecutive_failures, 0);
    }

    #[test]
    fn test_stale_fetch_after_removal_is_discarded() {
        let mut store = store_of(6);
        let id = store.id_at(3).unwrap();
        let FetchStart::Ready { ticket, url } = store.begin_fetch(id) else {
            panic!("slot 3 should be fetchable");
        };
        assert_eq!(url, "https://cam/3");

        store.record_failure(4);
        let successor = store.get(4).unwrap();
        store.remove_at(3).unwrap();

        let outcome = store.complete_fetch(ticket, Ok(artifact(&url)));
        assert_eq!(outcome, FetchOutcome::Discarded(DiscardReason::SlotRemoved));
        assert_eq!(triple(&store.get(3).unwrap()), triple(&successor));
    }

    #[test]
    fn test_fetch_follows_slot_after_reorder() {
        let mut store = store_of(3);
        let id = store.id_at(0).unwrap();
        let FetchStart::Ready { ticket, .. } = store.begin_fetch(id) else {
            panic!("slot 0 should be fetchable");
        };

        store.move_slot(0, 2).unwrap();
        let outcome = store.complete_fetch(ticket, Err(FetchError::Transport("refused".into())));

        assert_eq!(
            outcome,
            FetchOutcome::Applied {
                index: 2,
                consecutive_failures: 1
            }
        );
        assert_eq!(store.get(0).unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_url_change_supersedes_in_flight_fetch() {
        let mut store = store_of(1);
        let id = store.id_at(0).unwrap();
        let FetchStart::Ready { ticket, .. } = store.begin_fetch(id) else {
            panic!("slot 0 should be fetchable");
        };

        store.set_url(0, "https://cam/new").unwrap();
        let outcome = store.complete_fetch(ticket, Ok(artifact("https://cam/0")));
        assert_eq!(outcome, FetchOutcome::Discarded(DiscardReason::Superseded));
        assert!(store.get(0).unwrap().last_artifact.is_none());
    }

    #[test]
    fn test_only_latest_ticket_applies() {
        let mut store = store_of(1);
        let id = store.id_at(0).unwrap();
        let FetchStart::Ready { ticket: first, .. } = store.begin_fetch(id) else {
            panic!("slot 0 should be fetchable");
        };
        let FetchStart::Ready { ticket: second, .. } = store.begin_fetch(id) else {
            panic!("slot 0 should be fetchable");
        };

        assert_eq!(
            store.complete_fetch(first, Err(FetchError::Decode("bad".into()))),
            FetchOutcome::Discarded(DiscardReason::Superseded)
        );
        assert!(matches!(
            store.complete_fetch(second, Ok(artifact("https://cam/0"))),
            FetchOutcome::Applied { index: 0, .. }
        ));
    }

    #[test]
    fn test_unconfigured_and_gone_slots() {
        let mut store = SlotStore::from_urls(["", "https://cam/1"]);
        let empty = store.id_at(0).unwrap();
        assert_eq!(store.begin_fetch(empty), FetchStart::Unconfigured);

        store.remove_at(0).unwrap();
        assert_eq!(store.begin_fetch(empty), FetchStart::Gone);
    }

    #[test]
    fn test_ensure_len_grows_with_empty_slots() {
        let mut store = store_of(2);
        assert_eq!(store.ensure_len(5), 3);
        assert_eq!(store.ensure_len(4), 0);
        assert_eq!(store.len(), 5);
        assert_eq!(store.urls()[4], "");
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_random_mutations_match_model() {
        // Reference model: ordered ids plus the failure count each one carries.
        let mut store = store_of(8);
        let mut model: Vec<(SlotId, u32)> = store.ids().into_iter().map(|id| (id, 0)).collect();
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = |bound: usize| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % bound.max(1) as u64) as usize
        };

        for step in 0..400 {
            let len = model.len();
            match next(4) {
                0 => {
                    store.append(format!("https://cam/new/{}", step));
                    model.push((store.id_at(len).unwrap(), 0));
                }
                1 if len > 0 => {
                    let k = next(len);
                    store.remove_at(k).unwrap();
                    model.remove(k);
                }
                2 if len > 0 => {
                    let (from, to) = (next(len), next(len));
                    store.move_slot(from, to).unwrap();
                    let entry = model.remove(from);
                    model.insert(to, entry);
                }
                _ if len > 0 => {
                    let k = next(len);
                    store.record_failure(k);
                    model[k].1 += 1;
                }
                _ => {}
            }

            let snap = store.snapshot();
            assert_eq!(snap.len(), model.len());
            for (slot, (id, failures)) in snap.iter().zip(&model) {
                assert_eq!(slot.id, *id);
                assert_eq!(slot.consecutive_failures, *failures);
            }
        }
    }
}
