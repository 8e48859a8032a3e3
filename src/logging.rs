use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Env, Target};

const LOG_FILE_NAME: &str = "mediagrid.log";
const OLD_LOG_FILE_NAME: &str = "mediagrid.old.log";
const MAX_LOG_BYTES: u64 = 2 * 1024 * 1024;

/// Copies every formatted record to stderr and, when available, the log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Install the global logger. Filter defaults to `info`, override with
/// `RUST_LOG`. Safe to call more than once; later calls are ignored.
pub fn init(data_dir: &Path) {
    let _ = std::fs::create_dir_all(data_dir);
    let log_path = data_dir.join(LOG_FILE_NAME);

    // Rotate: if file is > 2MB, rename to .old and start fresh
    if let Ok(meta) = std::fs::metadata(&log_path) {
        if meta.len() > MAX_LOG_BYTES {
            let _ = std::fs::rename(&log_path, data_dir.join(OLD_LOG_FILE_NAME));
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();
    let has_file = file.is_some();

    let installed = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init();

    if installed.is_err() {
        return;
    }

    log::info!("=== mediagrid v{} started ===", env!("CARGO_PKG_VERSION"));
    log::info!("OS: {}", std::env::consts::OS);
    log::info!("Arch: {}", std::env::consts::ARCH);
    if has_file {
        log::info!("Log file: {}", log_path.display());
    } else {
        log::warn!("Could not open {}, logging to stderr only", log_path.display());
    }
}
