use std::path::PathBuf;
use std::time::Duration;

/// Name of the configuration document inside the data directory.
/// Override at build time: MEDIAGRID_CONFIG_FILE=grid.json cargo build
pub const CONFIG_FILE_NAME: &str = match option_env!("MEDIAGRID_CONFIG_FILE") {
    Some(name) => name,
    None => "configuration.json",
};

/// Runtime override for where the configuration and log live.
pub const DATA_DIR_ENV: &str = "MEDIAGRID_DATA_DIR";

pub const DEFAULT_ROWS: u32 = 2;
pub const DEFAULT_COLS: u32 = 2;
pub const DEFAULT_SLOT_CAPACITY: usize = 16;
pub const DEFAULT_REFRESH_INTERVAL_SECS: f64 = 2.0;
/// Longest accepted refresh interval: one day.
pub const MAX_REFRESH_INTERVAL_SECS: f64 = 86_400.0;
/// Rows and columns are each limited to this many cells.
pub const MAX_GRID_DIMENSION: u32 = 4;
pub const DEFAULT_MAX_FAILURES: u32 = 3;
pub const DEFAULT_ARTIFACT_NAME: &str = "sample1";

/// Upper bound for a single image request, connect through body.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the data directory: `$MEDIAGRID_DATA_DIR`, then `~/.mediagrid`,
/// then the working directory.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".mediagrid");
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
