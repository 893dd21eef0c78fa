use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;
use crate::model::{Segment, SegmentCategory};

/// A horizontal lane. Its index in the track list is its vertical rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: usize,
    pub name: String,
    pub is_preview: bool,
    pub height: f64,
    pub hue: f64,
    pub occupied: bool,
    pub visible: bool,
}

impl Track {
    /// An unoccupied prompt-height lane.
    pub fn empty(id: usize, config: &TimelineConfig) -> Self {
        Self {
            id,
            name: String::new(),
            is_preview: false,
            height: config.prompt_step_height_in_px,
            hue: SegmentCategory::Generic.hue(),
            occupied: false,
            visible: true,
        }
    }

    /// Height this track takes in the grid.
    pub fn effective_height(&self) -> f64 {
        if self.visible { self.height } else { 0.0 }
    }
}

/// Derive the track list from a segment set.
///
/// The list is at least `default_nb_tracks` long so that a sparse project
/// still fills the grid. Segments at or past `max_tracks` keep an unknown
/// track and never grow the list. A track is a preview track (and gets the
/// preview height) as soon as one of its segments is a storyboard or a video;
/// its name and hue come from its first segment.
pub fn build_tracks(segments: &[Segment], config: &TimelineConfig) -> Vec<Track> {
    let nb_tracks = nb_identified_tracks(segments, config.max_tracks).max(config.default_nb_tracks);

    let mut tracks: Vec<Track> = (0..nb_tracks).map(|id| Track::empty(id, config)).collect();

    for segment in segments {
        let Some(track) = tracks.get_mut(segment.track) else {
            continue;
        };
        if !track.occupied {
            track.occupied = true;
            track.name = segment.category.label().to_string();
            track.hue = segment.category.hue();
        }
        if segment.category.is_preview() && !track.is_preview {
            track.is_preview = true;
            track.height = config.preview_step_height_in_px;
        }
    }

    tracks
}

/// Highest referenced track index + 1. Indices at or past `max_tracks` are
/// unknown tracks and do not count.
pub fn nb_identified_tracks(segments: &[Segment], max_tracks: usize) -> usize {
    segments
        .iter()
        .filter(|s| s.track < max_tracks)
        .map(|s| s.track.saturating_add(1))
        .max()
        .unwrap_or(0)
}
