pub mod color;
pub mod config;

pub use color::Color;
pub use config::{AspectRatio, Configuration, ContentKind, GridSize};
