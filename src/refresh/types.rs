use crate::grid::{AspectRatio, Color, ContentKind};
use crate::slots::SlotId;

// ── Intents emitted by the render layer ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GridIntent {
    AddUrl(String),
    RemoveAt(usize),
    Move { from: usize, to: usize },
    SetUrl { index: usize, url: String },
    SetGridSize { rows: u32, cols: u32 },
    SetRefreshInterval(f64),
    SetAspectRatio(AspectRatio),
    SetContentKind(ContentKind),
    SetBorderColor(Color),
    OpenFullscreen(usize),
    CloseFullscreen,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    Applied,
    Added(usize),
    Removed(SlotId),
    Saved,
}
