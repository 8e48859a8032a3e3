use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::scheduler::RefreshScheduler;
use super::types::{GridIntent, IntentOutcome};
use crate::error::{GridResult, PersistenceError, SlotError};
use crate::fetch::Fetcher;
use crate::grid::{AspectRatio, Color, Configuration, ContentKind, GridSize};
use crate::slots::{lock_store, SharedSlotStore, Slot, SlotId, SlotStore};
use crate::storage::ConfigStore;
use crate::view::GridProjection;

/// Owns the slot list, its refresh timers and the grid configuration.
///
/// Every mutation of slot state, from user intents and from timer tasks
/// alike, is serialized through the store's mutex. Structural edits resync
/// the timers while the grid is running.
pub struct GridManager {
    store: SharedSlotStore,
    scheduler: RefreshScheduler,
    config: RwLock<Configuration>,
    config_store: ConfigStore,
    fullscreen: Mutex<Option<SlotId>>,
    running: AtomicBool,
}

impl GridManager {
    pub fn new(config: Configuration, config_store: ConfigStore, fetcher: Arc<dyn Fetcher>) -> Self {
        let mut config = config;
        config.normalize();

        let store = SlotStore::from_urls(config.image_urls.iter().cloned()).into_shared();
        let scheduler = RefreshScheduler::new(store.clone(), fetcher);

        log::info!(
            "Grid manager ready: {}x{} grid, {} slots",
            config.grid_size.rows,
            config.grid_size.cols,
            config.image_urls.len()
        );

        Self {
            store,
            scheduler,
            config: RwLock::new(config),
            config_store,
            fullscreen: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Build from whatever is persisted; a missing or broken document
    /// yields the defaults.
    pub fn load(config_store: ConfigStore, fetcher: Arc<dyn Fetcher>) -> Self {
        let config = config_store.load();
        Self::new(config, config_store, fetcher)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Arm one timer per slot. Calling it again restarts every timer.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        let period = self.read_config().refresh_period();
        let count = lock_store(&self.store).len();
        self.scheduler.start(count, period);
    }

    /// Cancel every armed timer before returning. Fetches already in flight
    /// may still land; the store decides whether they apply.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.scheduler.stop();
    }

    /// Stop polling and persist the configuration.
    pub fn shutdown(&self) {
        self.stop();
        let _ = self.save_settings();
        log::info!("Grid manager shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Vec<Slot> {
        lock_store(&self.store).snapshot()
    }

    pub fn slot_count(&self) -> usize {
        lock_store(&self.store).len()
    }

    pub fn generation(&self) -> u64 {
        lock_store(&self.store).generation()
    }

    /// Current configuration with the URL list taken from the live slots.
    pub fn config(&self) -> Configuration {
        let mut config = self.read_config().clone();
        config.image_urls = lock_store(&self.store).urls();
        config
    }

    pub fn fullscreen_index(&self) -> Option<usize> {
        let id = (*self.lock_fullscreen())?;
        lock_store(&self.store).index_of(id)
    }

    pub fn projection(&self) -> GridProjection {
        let config = self.read_config().clone();
        let fullscreen = self.fullscreen_index();
        let slots = self.snapshot();
        GridProjection::project(&config, &slots, fullscreen)
    }

    // ── Slot edits ──────────────────────────────────────────────────────

    pub fn add_url(&self, url: impl Into<String>) -> usize {
        let index = lock_store(&self.store).append(url);
        log::info!("Slot {} added", index);
        self.resync_if_running();
        index
    }

    pub fn remove_at(&self, index: usize) -> GridResult<SlotId> {
        let cells = self.read_config().grid_size.cell_count();
        let removed = {
            let mut store = lock_store(&self.store);
            let removed = store.remove_at(index)?;
            // never leave a visible cell without a slot
            store.ensure_len(cells);
            removed
        };

        {
            let mut fullscreen = self.lock_fullscreen();
            if *fullscreen == Some(removed) {
                *fullscreen = None;
            }
        }

        log::info!("Slot {} removed (index {})", removed, index);
        self.resync_if_running();
        Ok(removed)
    }

    pub fn move_slot(&self, from: usize, to: usize) -> GridResult<()> {
        lock_store(&self.store).move_slot(from, to)?;
        log::info!("Slot moved from {} to {}", from, to);
        self.resync_if_running();
        Ok(())
    }

    /// Takes effect on the slot's next tick; no resync needed.
    pub fn set_url(&self, index: usize, url: impl Into<String>) -> GridResult<()> {
        lock_store(&self.store).set_url(index, url)?;
        Ok(())
    }

    // ── Configuration edits ─────────────────────────────────────────────

    pub fn set_grid_size(&self, rows: u32, cols: u32) -> GridResult<()> {
        let size = GridSize::new(rows, cols);
        self.write_config().set_grid_size(size)?;

        let added = lock_store(&self.store).ensure_len(size.cell_count());
        log::info!("Grid resized to {}x{} ({} slots added)", rows, cols, added);
        if added > 0 {
            self.resync_if_running();
        }
        Ok(())
    }

    pub fn set_refresh_interval(&self, secs: f64) -> GridResult<()> {
        self.write_config().set_refresh_interval(secs)?;
        log::info!("Refresh interval set to {}s", secs);
        self.resync_if_running();
        Ok(())
    }

    pub fn set_max_failures(&self, threshold: u32) -> GridResult<()> {
        self.write_config().set_max_failures(threshold)
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) {
        self.write_config().aspect_ratio = aspect_ratio;
    }

    pub fn set_content_kind(&self, content_kind: ContentKind) {
        self.write_config().content_type = content_kind;
    }

    pub fn set_border_color(&self, color: Color) {
        self.write_config().border_color = color;
    }

    pub fn set_border_color_hex(&self, hex: &str) -> GridResult<()> {
        let color = Color::from_hex(hex)?;
        self.set_border_color(color);
        Ok(())
    }

    // ── Fullscreen ──────────────────────────────────────────────────────

    pub fn open_fullscreen(&self, index: usize) -> GridResult<SlotId> {
        let store = lock_store(&self.store);
        let id = store.id_at(index).ok_or(SlotError::OutOfRange {
            index,
            len: store.len(),
        })?;
        drop(store);

        *self.lock_fullscreen() = Some(id);
        Ok(id)
    }

    pub fn close_fullscreen(&self) {
        *self.lock_fullscreen() = None;
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write the configuration. Failures are logged and returned.
    pub fn save_settings(&self) -> Result<(), PersistenceError> {
        let config = self.config();
        match self.config_store.save(&config) {
            Ok(()) => {
                log::info!("Settings saved to {}", self.config_store.path().display());
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to save settings: {}", e);
                Err(e)
            }
        }
    }

    // ── Intent dispatch ─────────────────────────────────────────────────

    pub fn apply(&self, intent: GridIntent) -> GridResult<IntentOutcome> {
        log::debug!("Applying intent {:?}", intent);
        let outcome = match intent {
            GridIntent::AddUrl(url) => IntentOutcome::Added(self.add_url(url)),
            GridIntent::RemoveAt(index) => IntentOutcome::Removed(self.remove_at(index)?),
            GridIntent::Move { from, to } => {
                self.move_slot(from, to)?;
                IntentOutcome::Applied
            }
            GridIntent::SetUrl { index, url } => {
                self.set_url(index, url)?;
                IntentOutcome::Applied
            }
            GridIntent::SetGridSize { rows, cols } => {
                self.set_grid_size(rows, cols)?;
                IntentOutcome::Applied
            }
            GridIntent::SetRefreshInterval(secs) => {
                self.set_refresh_interval(secs)?;
                IntentOutcome::Applied
            }
            GridIntent::SetAspectRatio(aspect_ratio) => {
                self.set_aspect_ratio(aspect_ratio);
                IntentOutcome::Applied
            }
            GridIntent::SetContentKind(content_kind) => {
                self.set_content_kind(content_kind);
                IntentOutcome::Applied
            }
            GridIntent::SetBorderColor(color) => {
                self.set_border_color(color);
                IntentOutcome::Applied
            }
            GridIntent::OpenFullscreen(index) => {
                self.open_fullscreen(index)?;
                IntentOutcome::Applied
            }
            GridIntent::CloseFullscreen => {
                self.close_fullscreen();
                IntentOutcome::Applied
            }
            GridIntent::Save => {
                self.save_settings()?;
                IntentOutcome::Saved
            }
        };
        Ok(outcome)
    }

    fn resync_if_running(&self) {
        if !self.is_running() {
            return;
        }
        let period = self.read_config().refresh_period();
        let count = lock_store(&self.store).len();
        self.scheduler.resync(count, period);
    }

    fn read_config(&self) -> std::sync::RwLockReadGuard<'_, Configuration> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> std::sync::RwLockWriteGuard<'_, Configuration> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_fullscreen(&self) -> std::sync::MutexGuard<'_, Option<SlotId>> {
        self.fullscreen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
