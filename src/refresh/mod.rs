pub mod manager;
pub mod scheduler;
pub mod types;

pub use manager::GridManager;
pub use scheduler::{RefreshScheduler, TimerPhase};
pub use types::{GridIntent, IntentOutcome};
