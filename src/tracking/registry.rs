//! Track Registry
//!
//! Online multi-object tracker. Associates each frame's detections with live
//! tracks, merges tracks that turn out to be the same physical item and
//! evicts tracks that have left the view.
//!
//! Association is greedy in detection order. Panel labels match on center
//! distance because their boxes drift asymmetrically as the camera moves
//! closer or further away; every other class matches on IOU.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::track::{Track, TrackId, TrackView};
use crate::config::TrackingSettings;
use crate::vision::text::fuzzy_eq;
use crate::vision::{Detection, DetectionClass};

/// Maximum center distance for a panel label to match a track
pub const LABEL_MATCH_DISTANCE: f32 = 0.15;

/// Minimum IOU for two same-class tracks to be merge candidates
pub const MERGE_IOU: f32 = 0.3;

/// Outcome of associating one frame of detections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// Tracks matched or created this frame, in detection order
    pub tracks: Vec<TrackId>,
    /// Subset of `tracks` created this frame
    pub created: Vec<TrackId>,
    /// Track assigned to each input detection (None when gated out)
    pub assignments: Vec<Option<TrackId>>,
}

/// A merge of two tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Merge {
    pub kept: TrackId,
    pub discarded: TrackId,
}

/// Owns the set of live tracks
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: BTreeMap<TrackId, Track>,
    next_id: TrackId,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Remove every track. Ids keep increasing so stale results never hit a
    /// new track.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn views(&self) -> Vec<TrackView> {
        self.tracks.values().map(Track::view).collect()
    }

    /// Count down every track's cooldown by one frame
    pub fn tick_cooldowns(&mut self) {
        for track in self.tracks.values_mut() {
            track.tick_cooldown();
        }
    }

    /// Associate a frame's detections with live tracks, creating tracks for
    /// unmatched detections.
    pub fn associate(
        &mut self,
        detections: &[Detection],
        frame_number: u64,
        settings: &TrackingSettings,
    ) -> Association {
        let mut result = Association::default();
        let mut matched: BTreeSet<TrackId> = BTreeSet::new();

        for detection in detections {
            if detection.confidence < settings.confidence.get(detection.class) {
                result.assignments.push(None);
                continue;
            }

            let id = match self.best_match(detection, &matched, settings) {
                Some(id) => {
                    if let Some(track) = self.tracks.get_mut(&id) {
                        track.update(detection, frame_number);
                    }
                    id
                }
                None => {
                    let id = self.spawn(detection, frame_number);
                    result.created.push(id);
                    id
                }
            };

            matched.insert(id);
            result.tracks.push(id);
            result.assignments.push(Some(id));
        }

        result
    }

    fn spawn(&mut self, detection: &Detection, frame_number: u64) -> TrackId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.tracks.insert(id, Track::new(id, detection, frame_number));
        debug!(track_id = id, class = %detection.class, "Track created");
        id
    }

    fn best_match(
        &self,
        detection: &Detection,
        taken: &BTreeSet<TrackId>,
        settings: &TrackingSettings,
    ) -> Option<TrackId> {
        let candidates = self
            .tracks
            .values()
            .filter(|t| t.class == detection.class && !taken.contains(&t.id));

        if detection.class == DetectionClass::PanelLabel {
            candidates
                .map(|t| (t.id, t.bbox.center_distance(&detection.bbox)))
                .filter(|(_, d)| *d <= LABEL_MATCH_DISTANCE)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        } else {
            let threshold = settings.iou.get(detection.class);
            candidates
                .map(|t| (t.id, t.bbox.iou(&detection.bbox)))
                .filter(|(_, iou)| *iou > threshold)
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id)
        }
    }

    /// Merge same-class tracks that overlap and read the same text.
    ///
    /// The lower smoothed-confidence track is discarded, except that
    /// `protected` (the track holding the pending confirmation) always
    /// survives. The survivor inherits the captured flag and the longer
    /// cooldown.
    pub fn merge_duplicates(&mut self, fuzzy_distance: usize, protected: Option<TrackId>) -> Vec<Merge> {
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        let mut removed: BTreeSet<TrackId> = BTreeSet::new();
        let mut merges = Vec::new();

        for (i, &a_id) in ids.iter().enumerate() {
            for &b_id in &ids[i + 1..] {
                if removed.contains(&a_id) {
                    break;
                }
                if removed.contains(&b_id) {
                    continue;
                }
                let (Some(a), Some(b)) = (self.tracks.get(&a_id), self.tracks.get(&b_id)) else {
                    continue;
                };
                if !is_duplicate_pair(a, b, fuzzy_distance) {
                    continue;
                }

                let (kept, discarded) = if Some(a_id) == protected {
                    (a_id, b_id)
                } else if Some(b_id) == protected {
                    (b_id, a_id)
                } else if b.smoothed_confidence > a.smoothed_confidence {
                    (b_id, a_id)
                } else {
                    (a_id, b_id)
                };

                if let Some(loser) = self.tracks.remove(&discarded) {
                    if let Some(winner) = self.tracks.get_mut(&kept) {
                        winner.captured |= loser.captured;
                        winner.cooldown = winner.cooldown.max(loser.cooldown);
                    }
                }
                debug!(kept, discarded, "Merged duplicate tracks");
                removed.insert(discarded);
                merges.push(Merge { kept, discarded });
            }
        }

        merges
    }

    /// Remove tracks unseen for at least `stale_frames`, except `keep_alive`.
    pub fn evict_stale(&mut self, current_frame: u64, stale_frames: u64, keep_alive: Option<TrackId>) -> Vec<TrackId> {
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| t.frames_unseen(current_frame) >= stale_frames && Some(t.id) != keep_alive)
            .map(|t| t.id)
            .collect();

        for id in &stale {
            self.tracks.remove(id);
            debug!(track_id = id, "Evicted stale track");
        }

        stale
    }
}

fn is_duplicate_pair(a: &Track, b: &Track, fuzzy_distance: usize) -> bool {
    if a.class != b.class || a.bbox.iou(&b.bbox) <= MERGE_IOU {
        return false;
    }
    match (&a.last_text, &b.last_text) {
        (Some(ta), Some(tb)) => fuzzy_eq(ta, tb, fuzzy_distance),
        _ => false,
    }
}
