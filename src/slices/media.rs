use serde::{Deserialize, Serialize};

use crate::collection::EntityCollection;
use crate::summary::Summary;
use crate::Record;

/// An image or video attached to a product gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "media")]
pub struct MediaItem {
    #[serde(default)]
    pub id: String,
    #[record(key)]
    pub product_id: String,
    #[record(key)]
    pub url: String,
    /// Gallery order.
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl MediaItem {
    pub fn new(product_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            product_id: product_id.into(),
            url: url.into(),
            position: 0,
            size_bytes: None,
        }
    }

    pub fn at(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MediaSummary {
    pub count: usize,
    /// Sum of known sizes.
    pub total_bytes: u64,
    /// Items whose upload is not confirmed yet.
    pub uploading: usize,
}

impl Summary<MediaItem> for MediaSummary {
    fn summarize(collection: &EntityCollection<MediaItem>) -> Self {
        let mut summary = MediaSummary::default();
        for entry in collection.iter() {
            summary.count += 1;
            summary.total_bytes = summary
                .total_bytes
                .saturating_add(entry.record.size_bytes.unwrap_or(0));
            if entry.is_pending() {
                summary.uploading += 1;
            }
        }
        summary
    }
}
