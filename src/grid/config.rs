use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::color::Color;
use crate::config::{
    DEFAULT_ARTIFACT_NAME, DEFAULT_COLS, DEFAULT_MAX_FAILURES, DEFAULT_REFRESH_INTERVAL_SECS,
    DEFAULT_ROWS, DEFAULT_SLOT_CAPACITY, MAX_GRID_DIMENSION, MAX_REFRESH_INTERVAL_SECS,
};
use crate::error::{GridError, GridResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Number of visible cells. Zero when the grid is hidden.
    pub fn cell_count(&self) -> usize {
        (self.rows as usize).saturating_mul(self.cols as usize)
    }

    pub fn is_hidden(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn is_within_limit(&self) -> bool {
        self.rows <= MAX_GRID_DIMENSION && self.cols <= MAX_GRID_DIMENSION
    }

    /// Same grid with each dimension cut down to the limit.
    pub fn clamped(&self) -> Self {
        Self::new(self.rows.min(MAX_GRID_DIMENSION), self.cols.min(MAX_GRID_DIMENSION))
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "aspect4_3")]
    Aspect4x3,
    #[default]
    #[serde(rename = "aspect16_9")]
    Aspect16x9,
}

impl AspectRatio {
    /// Width divided by height.
    pub fn value(&self) -> f64 {
        match self {
            AspectRatio::Aspect4x3 => 4.0 / 3.0,
            AspectRatio::Aspect16x9 => 16.0 / 9.0,
        }
    }
}

/// What the cells are meant to show. Only a label: both kinds are polled
/// and decoded as still images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Image,
    Video,
}

/// Everything the grid needs to know besides per-slot runtime state.
///
/// The serialized form is the on-disk document; `max_failures` and
/// `default_artifact` are runtime-only and never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    #[serde(rename = "imageURLs")]
    pub image_urls: Vec<String>,
    pub grid_size: GridSize,
    pub content_type: ContentKind,
    pub aspect_ratio: AspectRatio,
    pub refresh_interval: f64,
    pub border_color: Color,
    #[serde(skip)]
    pub max_failures: u32,
    #[serde(skip)]
    pub default_artifact: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            image_urls: vec![String::new(); DEFAULT_SLOT_CAPACITY],
            grid_size: GridSize::default(),
            content_type: ContentKind::default(),
            aspect_ratio: AspectRatio::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            border_color: Color::default(),
            max_failures: DEFAULT_MAX_FAILURES,
            default_artifact: DEFAULT_ARTIFACT_NAME.to_string(),
        }
    }
}

impl Configuration {
    /// Build a configuration around a bare URL list (the oldest on-disk
    /// format), everything else defaulted.
    pub fn from_urls(image_urls: Vec<String>) -> Self {
        Self {
            image_urls,
            ..Self::default()
        }
    }

    /// Refresh period as a `Duration`; an invalid stored value falls back to
    /// the default interval.
    pub fn refresh_period(&self) -> Duration {
        interval_duration(self.refresh_interval)
            .or_else(|| interval_duration(DEFAULT_REFRESH_INTERVAL_SECS))
            .unwrap_or(Duration::from_secs(2))
    }

    /// Slot count required so that every visible cell has a slot.
    pub fn required_slots(&self) -> usize {
        self.grid_size.cell_count().max(self.image_urls.len())
    }

    pub fn set_refresh_interval(&mut self, secs: f64) -> GridResult<()> {
        if !is_valid_interval(secs) {
            return Err(GridError::InvalidInterval(secs));
        }
        self.refresh_interval = secs;
        Ok(())
    }

    pub fn set_grid_size(&mut self, size: GridSize) -> GridResult<()> {
        if !size.is_within_limit() {
            return Err(GridError::InvalidGridSize {
                rows: size.rows,
                cols: size.cols,
                max: MAX_GRID_DIMENSION,
            });
        }
        self.grid_size = size;
        Ok(())
    }

    pub fn set_max_failures(&mut self, threshold: u32) -> GridResult<()> {
        if threshold == 0 {
            return Err(GridError::InvalidFailureThreshold);
        }
        self.max_failures = threshold;
        Ok(())
    }

    /// Repair values a hand-edited document may carry.
    pub fn normalize(&mut self) {
        if !is_valid_interval(self.refresh_interval) {
            log::warn!(
                "Ignoring invalid refresh interval {} (using {}s)",
                self.refresh_interval,
                DEFAULT_REFRESH_INTERVAL_SECS
            );
            self.refresh_interval = DEFAULT_REFRESH_INTERVAL_SECS;
        }
        if !self.grid_size.is_within_limit() {
            let clamped = self.grid_size.clamped();
            log::warn!(
                "Grid size {}x{} is too large, using {}x{}",
                self.grid_size.rows,
                self.grid_size.cols,
                clamped.rows,
                clamped.cols
            );
            self.grid_size = clamped;
        }
        if self.max_failures == 0 {
            self.max_failures = DEFAULT_MAX_FAILURES;
        }
        let required = self.required_slots();
        if self.image_urls.len() < required {
            self.image_urls.resize(required, String::new());
        }
    }
}

fn is_valid_interval(secs: f64) -> bool {
    interval_duration(secs).is_some()
}

fn interval_duration(secs: f64) -> Option<Duration> {
    if secs.is_nan() || secs <= 0.0 || secs > MAX_REFRESH_INTERVAL_SECS {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
