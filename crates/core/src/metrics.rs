//! Layout metrics derived from the tracks, the horizontal zoom and the
//! segment set. Everything here is pure: the store recomputes a fresh
//! [`ContentSizeMetrics`] when one of its inputs changes and never patches
//! one in place.

use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;
use crate::model::{Segment, Track, nb_identified_tracks};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSizeMetrics {
    /// Columns actually covered by segments.
    pub nb_max_shots: usize,
    pub nb_max_tracks: usize,
    /// Tracks referenced by at least one segment (highest index + 1), not
    /// counting indices past `max_tracks`.
    pub nb_identified_tracks: usize,
    pub content_width: f64,
    pub content_height: f64,
    pub tracks: Vec<Track>,
    pub cell_width: f64,
    pub default_cell_height: f64,
    pub default_segment_duration_in_steps: f64,
    pub default_segment_length_in_pixels: f64,
    pub default_media_ratio: f64,
    pub default_preview_height: f64,
}

/// Pixel placement of one cell in content space (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Width at the animated zoom, rounded so per-frame consumers only see
    /// integer changes.
    pub width_after_zoom: f64,
}

pub fn compute_content_size_metrics(
    tracks: &[Track],
    horizontal_zoom_level: f64,
    segments: &[Segment],
    config: &TimelineConfig,
) -> ContentSizeMetrics {
    let cell_width = horizontal_zoom_level;

    let last_end = segments
        .iter()
        .map(|s| s.end_time_in_ms)
        .fold(0.0_f64, f64::max);
    let nb_max_shots = (last_end / config.duration_in_ms_per_step).ceil() as usize;

    let nb_identified_tracks = nb_identified_tracks(segments, config.max_tracks);

    let content_width = nb_max_shots.max(config.nb_max_shots) as f64 * cell_width;
    let content_height = tracks.iter().map(Track::effective_height).sum();

    let default_segment_duration_in_steps = config.default_segment_duration_in_steps;

    ContentSizeMetrics {
        nb_max_shots,
        nb_max_tracks: tracks.len(),
        nb_identified_tracks,
        content_width,
        content_height,
        tracks: tracks.to_vec(),
        cell_width,
        default_cell_height: config.prompt_step_height_in_px,
        default_segment_duration_in_steps,
        default_segment_length_in_pixels: default_segment_duration_in_steps * cell_width,
        default_media_ratio: config.default_media_ratio,
        default_preview_height: config.preview_step_height_in_px,
    }
}

/// Sum of the heights of tracks `[start, end)`. Hidden tracks count as
/// zero; indices past the known tracks count as `default_height`.
pub fn vertical_cell_position(
    tracks: &[Track],
    start: usize,
    end: usize,
    default_height: f64,
) -> f64 {
    if end <= start {
        return 0.0;
    }
    let known_end = end.min(tracks.len());
    let known: f64 = tracks
        .get(start.min(known_end)..known_end)
        .unwrap_or_default()
        .iter()
        .map(Track::effective_height)
        .sum();
    let unknown = end - start.max(known_end);
    known + unknown as f64 * default_height
}

/// Configured height of a track, or `default_height` when the index is
/// unknown (a segment pointing past the track list).
pub fn cell_height(tracks: &[Track], track: Option<usize>, default_height: f64) -> f64 {
    track
        .and_then(|i| tracks.get(i))
        .map_or(default_height, |t| t.height)
}

impl ContentSizeMetrics {
    pub fn vertical_cell_position(&self, start: usize, end: usize) -> f64 {
        vertical_cell_position(&self.tracks, start, end, self.default_cell_height)
    }

    pub fn cell_height(&self, track: Option<usize>) -> f64 {
        cell_height(&self.tracks, track, self.default_cell_height)
    }

    /// Placement of a segment's cell. `current_zoom_level` is the animated
    /// zoom mirror, only used for `width_after_zoom`.
    pub fn cell_geometry(
        &self,
        segment: &Segment,
        duration_in_ms_per_step: f64,
        current_zoom_level: f64,
    ) -> CellGeometry {
        let start_in_steps = segment.start_time_in_ms / duration_in_ms_per_step;
        let duration_in_steps = segment.duration_in_ms() / duration_in_ms_per_step;
        CellGeometry {
            x: start_in_steps * self.cell_width,
            y: self.vertical_cell_position(0, segment.track),
            width: duration_in_steps * self.cell_width,
            height: self.cell_height(Some(segment.track)),
            width_after_zoom: (duration_in_steps * current_zoom_level).round(),
        }
    }
}
