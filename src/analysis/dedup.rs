//! Capture Deduplication Registry
//!
//! Spatial + fuzzy-text index of confirmed captures. Entries are only ever
//! added by a confirmed capture.

use std::collections::HashMap;

use crate::vision::geometry::distance;
use crate::vision::text::fuzzy_eq;

/// Radius around a previous panel-label capture that counts as the same
/// label. Wide, since the camera moves between captures of one label.
pub const LABEL_DEDUP_RADIUS: f32 = 0.25;

/// Radius around a previous capture of any other class
pub const ITEM_DEDUP_RADIUS: f32 = 0.15;

/// Confirmed captures keyed by text
#[derive(Debug, Clone, Default)]
pub struct CaptureRegistry {
    entries: HashMap<String, Vec<(f32, f32)>>,
    fuzzy_distance: usize,
}

impl CaptureRegistry {
    pub fn new(fuzzy_distance: usize) -> Self {
        Self {
            entries: HashMap::new(),
            fuzzy_distance,
        }
    }

    pub fn set_fuzzy_distance(&mut self, fuzzy_distance: usize) {
        self.fuzzy_distance = fuzzy_distance;
    }

    /// Record a confirmed capture of `text` at `center`
    pub fn insert(&mut self, text: &str, center: (f32, f32)) {
        self.entries.entry(text.to_string()).or_default().push(center);
    }

    /// Whether `text` at `center` repeats an earlier capture
    pub fn is_duplicate(&self, text: &str, center: (f32, f32), is_fast_path: bool) -> bool {
        let radius = if is_fast_path {
            LABEL_DEDUP_RADIUS
        } else {
            ITEM_DEDUP_RADIUS
        };
        let near = |centers: &Vec<(f32, f32)>| centers.iter().any(|c| distance(*c, center) <= radius);

        if self.entries.get(text).is_some_and(|centers| near(centers)) {
            return true;
        }

        self.entries
            .iter()
            .filter(|(captured, _)| captured.as_str() != text)
            .filter(|(captured, _)| fuzzy_eq(captured, text, self.fuzzy_distance))
            .any(|(_, centers)| near(centers))
    }

    /// Total number of recorded capture points
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
