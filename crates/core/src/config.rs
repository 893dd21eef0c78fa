//! Timeline configuration.
//!
//! Hosts usually embed the timeline with the defaults and override a handful
//! of fields. Configuration is plain JSON; missing keys fall back to the
//! values in [`crate::constants`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::TimelineError;
use crate::visibility::RenderingStrategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Duration covered by one grid column.
    pub duration_in_ms_per_step: f64,
    /// Column count of an empty grid.
    pub nb_max_shots: usize,
    /// Track count of an empty grid.
    pub default_nb_tracks: usize,
    /// Upper bound on derived and grown track lists, at most [`MAX_TRACKS`].
    pub max_tracks: usize,
    pub prompt_step_height_in_px: f64,
    pub preview_step_height_in_px: f64,

    pub min_horizontal_zoom_level: f64,
    pub max_horizontal_zoom_level: f64,
    pub initial_horizontal_zoom_level: f64,
    pub wheel_zoom_factor: f64,
    pub zoom_smoothing: f64,

    /// Quiet period after the last resize before `is_resizing` clears.
    pub resize_quiet_period_ms: u64,
    /// Debounce applied to grid line regeneration.
    pub grid_regeneration_delay_ms: u64,

    /// Width of the buffered band on either side of the scroll window.
    pub surrounding_margin_px: f64,
    pub storyboard_rendering_strategy: RenderingStrategy,
    pub video_rendering_strategy: RenderingStrategy,
    /// Upper bound on in-flight segment resolutions.
    pub max_concurrent_resolutions: usize,

    pub full_labels_min_cell_width: f64,
    pub major_labels_min_cell_width: f64,
    pub milliseconds_min_cell_width: f64,
    pub major_tick_unit: usize,

    pub left_bar_width: f64,
    pub top_bar_height: f64,

    pub default_media_ratio: f64,
    pub default_segment_duration_in_steps: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            duration_in_ms_per_step: DEFAULT_DURATION_IN_MS_PER_STEP,
            nb_max_shots: NB_MAX_SHOTS,
            default_nb_tracks: DEFAULT_NB_TRACKS,
            max_tracks: MAX_TRACKS,
            prompt_step_height_in_px: PROMPT_STEP_HEIGHT_IN_PX,
            preview_step_height_in_px: PREVIEW_STEP_HEIGHT_IN_PX,
            min_horizontal_zoom_level: DEFAULT_MIN_HORIZONTAL_ZOOM,
            max_horizontal_zoom_level: DEFAULT_MAX_HORIZONTAL_ZOOM,
            initial_horizontal_zoom_level: DEFAULT_HORIZONTAL_ZOOM,
            wheel_zoom_factor: DEFAULT_WHEEL_ZOOM_FACTOR,
            zoom_smoothing: DEFAULT_ZOOM_SMOOTHING,
            resize_quiet_period_ms: DEFAULT_RESIZE_QUIET_PERIOD_MS,
            grid_regeneration_delay_ms: DEFAULT_GRID_REGENERATION_DELAY_MS,
            surrounding_margin_px: DEFAULT_SURROUNDING_MARGIN_PX,
            storyboard_rendering_strategy: RenderingStrategy::OnScreenThenSurrounding,
            video_rendering_strategy: RenderingStrategy::OnScreenOnly,
            max_concurrent_resolutions: DEFAULT_MAX_CONCURRENT_RESOLUTIONS,
            full_labels_min_cell_width: FULL_LABELS_MIN_CELL_WIDTH,
            major_labels_min_cell_width: MAJOR_LABELS_MIN_CELL_WIDTH,
            milliseconds_min_cell_width: MILLISECONDS_MIN_CELL_WIDTH,
            major_tick_unit: MAJOR_TICK_UNIT,
            left_bar_width: LEFT_BAR_TRACK_SCALE_WIDTH,
            top_bar_height: TOP_BAR_TIME_SCALE_HEIGHT,
            default_media_ratio: DEFAULT_MEDIA_RATIO,
            default_segment_duration_in_steps: DEFAULT_SEGMENT_DURATION_IN_STEPS,
        }
    }
}

impl TimelineConfig {
    /// Parse a JSON config. Unknown keys are ignored, missing keys take
    /// their default, and the result is normalized.
    pub fn from_json_str(json: &str) -> Result<Self, TimelineError> {
        let config: Self = serde_json::from_str(json).map_err(TimelineError::Config)?;
        Ok(config.normalized())
    }

    /// Repair values that would make the layout degenerate: non-positive
    /// step duration, inverted zoom bounds, an initial zoom outside them.
    pub fn normalized(mut self) -> Self {
        if !is_positive(self.duration_in_ms_per_step) {
            log::warn!(
                "duration_in_ms_per_step {} is not positive, using {DEFAULT_DURATION_IN_MS_PER_STEP}",
                self.duration_in_ms_per_step
            );
            self.duration_in_ms_per_step = DEFAULT_DURATION_IN_MS_PER_STEP;
        }
        if !is_positive(self.min_horizontal_zoom_level) {
            self.min_horizontal_zoom_level = DEFAULT_MIN_HORIZONTAL_ZOOM;
        }
        if !is_positive(self.max_horizontal_zoom_level) {
            self.max_horizontal_zoom_level = DEFAULT_MAX_HORIZONTAL_ZOOM;
        }
        if self.max_horizontal_zoom_level < self.min_horizontal_zoom_level {
            std::mem::swap(
                &mut self.min_horizontal_zoom_level,
                &mut self.max_horizontal_zoom_level,
            );
        }
        self.initial_horizontal_zoom_level = self.initial_horizontal_zoom_level.clamp(
            self.min_horizontal_zoom_level,
            self.max_horizontal_zoom_level,
        );
        self.zoom_smoothing = self.zoom_smoothing.clamp(0.0, 1.0);
        self.major_tick_unit = self.major_tick_unit.max(1);
        self.max_concurrent_resolutions = self.max_concurrent_resolutions.max(1);
        self.max_tracks = self.max_tracks.clamp(1, MAX_TRACKS);
        self.default_nb_tracks = self.default_nb_tracks.min(self.max_tracks);
        self
    }

    pub fn resize_quiet_period(&self) -> Duration {
        Duration::from_millis(self.resize_quiet_period_ms)
    }

    pub fn grid_regeneration_delay(&self) -> Duration {
        Duration::from_millis(self.grid_regeneration_delay_ms)
    }
}

fn is_positive(value: f64) -> bool {
    value > 0.0
}
