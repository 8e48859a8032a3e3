use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use uuid::Uuid;

/// A decoded image ready for display.
///
/// Cloning shares the bitmap; nothing hands out a mutable reference to it,
/// so a clone held by a renderer can never observe a later fetch.
#[derive(Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub source_url: String,
    pub width: u32,
    pub height: u32,
    pub fetched_at: i64,
    image: Arc<DynamicImage>,
}

impl Artifact {
    pub fn new(image: DynamicImage, source_url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url: source_url.to_string(),
            width: image.width(),
            height: image.height(),
            fetched_at: Utc::now().timestamp_millis(),
            image: Arc::new(image),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.fetched_at)
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Artifact {}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id)
            .field("source_url", &self.source_url)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}
