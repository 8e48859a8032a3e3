pub mod config;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod logging;
pub mod refresh;
pub mod slots;
pub mod storage;
pub mod view;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use fetch::HttpFetcher;
use refresh::GridManager;
use storage::ConfigStore;

/// Run the grid headless until Ctrl-C: load settings, poll every slot, log a
/// status line each refresh interval, then stop timers and save.
pub fn run() {
    let data_dir = config::data_dir();
    logging::init(&data_dir);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mediagrid")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return;
        }
    };

    runtime.block_on(run_grid(data_dir));
}

async fn run_grid(data_dir: PathBuf) {
    let fetcher = match HttpFetcher::new(config::FETCH_TIMEOUT) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            log::error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let manager = GridManager::load(ConfigStore::new(&data_dir), fetcher);
    manager.start();

    let mut status = tokio::time::interval(manager.config().refresh_period());
    status.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = status.tick() => {
                log::info!("{}", manager.projection().status_line());
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    log::warn!("Ctrl-C handler failed: {}", e);
                }
                log::info!("Shutdown requested");
                break;
            }
        }
    }

    manager.shutdown();
}
