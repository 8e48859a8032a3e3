//! Headless projection of the slot list onto the visible grid.
//!
//! A renderer walks `cells` in row-major order and draws either the artifact
//! or the placeholder, overlaying [`MISSING_MESSAGE`] on cells flagged
//! `missing`.

use crate::fetch::Artifact;
use crate::grid::{AspectRatio, Color, Configuration, ContentKind, GridSize};
use crate::slots::{Slot, SlotId};

pub const MISSING_MESSAGE: &str = "Image unavailable";

#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub row: u32,
    pub col: u32,
    pub index: usize,
    pub slot: SlotId,
    pub url: String,
    /// Latest decoded image, `None` until the first successful fetch.
    pub artifact: Option<Artifact>,
    /// Name of the fallback image drawn while `artifact` is `None`.
    pub placeholder: String,
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridProjection {
    pub grid_size: GridSize,
    pub aspect_ratio: AspectRatio,
    pub content_kind: ContentKind,
    pub border_color: Color,
    pub cells: Vec<CellView>,
    pub fullscreen: Option<CellView>,
}

impl GridProjection {
    pub fn project(config: &Configuration, slots: &[Slot], fullscreen: Option<usize>) -> Self {
        let grid_size = config.grid_size;
        let cell = |row: u32, col: u32, slot: &Slot| CellView {
            row,
            col,
            index: slot.index,
            slot: slot.id,
            url: slot.url.clone(),
            artifact: slot.last_artifact.clone(),
            placeholder: config.default_artifact.clone(),
            missing: slot.is_missing(config.max_failures),
        };

        let mut cells = Vec::with_capacity(grid_size.cell_count());
        if !grid_size.is_hidden() {
            for row in 0..grid_size.rows {
                for col in 0..grid_size.cols {
                    let index = row as usize * grid_size.cols as usize + col as usize;
                    // slot count covers the grid; a short list only drops cells
                    if let Some(slot) = slots.get(index) {
                        cells.push(cell(row, col, slot));
                    }
                }
            }
        }

        let fullscreen = fullscreen.and_then(|index| {
            let slot = slots.get(index)?;
            let (row, col) = if grid_size.cols == 0 {
                (0, 0)
            } else {
                (
                    (index / grid_size.cols as usize) as u32,
                    (index % grid_size.cols as usize) as u32,
                )
            };
            Some(cell(row, col, slot))
        });

        Self {
            grid_size,
            aspect_ratio: config.aspect_ratio,
            content_kind: config.content_type,
            border_color: config.border_color,
            cells,
            fullscreen,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.grid_size.is_hidden()
    }

    pub fn cell_at(&self, row: u32, col: u32) -> Option<&CellView> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Cell width and height for a grid laid out across `total_width`.
    pub fn cell_size(&self, total_width: f64) -> Option<(f64, f64)> {
        if self.is_hidden() {
            return None;
        }
        let width = total_width / self.grid_size.cols as f64;
        Some((width, width / self.aspect_ratio.value()))
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.missing).count()
    }

    /// One-line summary for logs.
    pub fn status_line(&self) -> String {
        if self.is_hidden() {
            return "Grid is hidden".to_string();
        }
        let loaded = self.cells.iter().filter(|c| c.artifact.is_some()).count();
        let configured = self.cells.iter().filter(|c| !c.url.trim().is_empty()).count();
        format!(
            "{}x{} grid: {}/{} cells configured, {} loaded, {} missing{}",
            self.grid_size.rows,
            self.grid_size.cols,
            configured,
            self.cells.len(),
            loaded,
            self.missing_count(),
            match &self.fullscreen {
                Some(cell) => format!(", fullscreen #{}", cell.index),
                None => String::new(),
            }
        )
    }
}
