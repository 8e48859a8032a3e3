use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::fetch::Fetcher;
use crate::slots::{lock_store, FetchOutcome, FetchStart, SharedSlotStore, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerPhase {
    Idle = 0,
    Scheduled = 1,
    Fetching = 2,
    Cancelled = 3,
}

impl TimerPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TimerPhase::Idle,
            1 => TimerPhase::Scheduled,
            2 => TimerPhase::Fetching,
            _ => TimerPhase::Cancelled,
        }
    }
}

struct SlotTimer {
    handle: JoinHandle<()>,
    phase: Arc<AtomicU8>,
    cancelled: Arc<AtomicBool>,
}

impl SlotTimer {
    fn phase(&self) -> TimerPhase {
        TimerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Armed timers are aborted on the spot. A fetch already on the wire is
    /// left to finish; the task routes its result and then exits.
    fn cancel(self) {
        self.cancelled.store(true, Ordering::Release);
        if self.phase() != TimerPhase::Fetching {
            self.handle.abort();
            self.phase
                .store(TimerPhase::Cancelled as u8, Ordering::Release);
        }
    }
}

/// One periodic task per slot, keyed by slot id.
///
/// Must be started from within a Tokio runtime.
pub struct RefreshScheduler {
    store: SharedSlotStore,
    fetcher: Arc<dyn Fetcher>,
    timers: Mutex<HashMap<SlotId, SlotTimer>>,
    interval: Mutex<Option<Duration>>,
}

impl RefreshScheduler {
    pub fn new(store: SharedSlotStore, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            store,
            fetcher,
            timers: Mutex::new(HashMap::new()),
            interval: Mutex::new(None),
        }
    }

    /// Arm one fresh timer per slot in `[0, slot_count)`, cancelling any
    /// timers already running.
    pub fn start(&self, slot_count: usize, interval: Duration) {
        let mut timers = self.lock_timers();
        let cancelled = Self::cancel_all(&mut timers);

        let ids: Vec<SlotId> = lock_store(&self.store)
            .ids()
            .into_iter()
            .take(slot_count)
            .collect();

        for id in &ids {
            timers.insert(*id, self.spawn_timer(*id, interval));
        }
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner) = Some(interval);

        log::info!(
            "Refresh timers armed: {} slots every {:.1}s ({} cancelled)",
            ids.len(),
            interval.as_secs_f64(),
            cancelled
        );
    }

    /// Cancel every timer. Returns how many were running.
    pub fn stop(&self) -> usize {
        let cancelled = Self::cancel_all(&mut self.lock_timers());
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if cancelled > 0 {
            log::info!("Refresh timers stopped ({} cancelled)", cancelled);
        }
        cancelled
    }

    /// Cancel-all then re-arm. Call after any structural change to the slot
    /// list or a change of interval.
    pub fn resync(&self, slot_count: usize, interval: Duration) {
        log::debug!(
            "Resyncing refresh timers: {} slots, {:.1}s",
            slot_count,
            interval.as_secs_f64()
        );
        self.start(slot_count, interval);
    }

    pub fn is_running(&self) -> bool {
        !self.lock_timers().is_empty()
    }

    pub fn interval(&self) -> Option<Duration> {
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active_timers(&self) -> usize {
        self.lock_timers().len()
    }

    pub fn phase(&self, slot: SlotId) -> Option<TimerPhase> {
        self.lock_timers().get(&slot).map(SlotTimer::phase)
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<SlotId, SlotTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_all(timers: &mut HashMap<SlotId, SlotTimer>) -> usize {
        let count = timers.len();
        for (_, timer) in timers.drain() {
            timer.cancel();
        }
        count
    }

    fn spawn_timer(&self, slot: SlotId, interval: Duration) -> SlotTimer {
        let phase = Arc::new(AtomicU8::new(TimerPhase::Idle as u8));
        let cancelled = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(run_slot_timer(
            slot,
            interval,
            self.store.clone(),
            self.fetcher.clone(),
            phase.clone(),
            cancelled.clone(),
        ));

        SlotTimer {
            handle,
            phase,
            cancelled,
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        Self::cancel_all(&mut self.lock_timers());
    }
}

async fn run_slot_timer(
    slot: SlotId,
    interval: Duration,
    store: SharedSlotStore,
    fetcher: Arc<dyn Fetcher>,
    phase: Arc<AtomicU8>,
    cancelled: Arc<AtomicBool>,
) {
    loop {
        phase.store(TimerPhase::Scheduled as u8, Ordering::Release);
        tokio::time::sleep(interval).await;

        if cancelled.load(Ordering::Acquire) {
            break;
        }

        // URL is read at fire time, not when the timer was armed
        let start = lock_store(&store).begin_fetch(slot);
        let (ticket, url) = match start {
            FetchStart::Ready { ticket, url } => (ticket, url),
            FetchStart::Unconfigured => continue,
            FetchStart::Gone => {
                log::debug!("Slot {} no longer exists, timer exiting", slot);
                break;
            }
        };

        phase.store(TimerPhase::Fetching as u8, Ordering::Release);
        let result = fetcher.fetch(&url).await;
        if let Err(e) = &result {
            log::warn!("Slot {} fetch failed for {}: {}", slot, url, e);
        }

        let outcome = lock_store(&store).complete_fetch(ticket, result);
        match outcome {
            FetchOutcome::Applied {
                index,
                consecutive_failures,
            } => {
                log::debug!(
                    "Slot {} (index {}) refreshed, consecutive failures: {}",
                    slot,
                    index,
                    consecutive_failures
                );
            }
            FetchOutcome::Discarded(reason) => {
                log::debug!("Slot {} result discarded: {:?}", slot, reason);
            }
        }

        if cancelled.load(Ordering::Acquire) {
            break;
        }
    }

    phase.store(TimerPhase::Cancelled as u8, Ordering::Release);
}
