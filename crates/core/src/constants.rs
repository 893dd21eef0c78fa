//! Grid constants. Every one of them can be overridden through
//! [`TimelineConfig`](crate::config::TimelineConfig); these are the defaults.

/// Duration of one grid step (one column).
pub const DEFAULT_DURATION_IN_MS_PER_STEP: f64 = 1000.0;

/// Minimum number of columns drawn, so an empty project still shows a grid.
pub const NB_MAX_SHOTS: usize = 256;

/// Minimum number of tracks drawn.
pub const DEFAULT_NB_TRACKS: usize = 8;

/// Ceiling for `max_tracks`. The track list never grows past it; segments on
/// later tracks keep the default height and position.
pub const MAX_TRACKS: usize = 1024;

/// Height of a text/prompt track.
pub const PROMPT_STEP_HEIGHT_IN_PX: f64 = 24.0;

/// Height of a track holding storyboards or videos.
pub const PREVIEW_STEP_HEIGHT_IN_PX: f64 = 120.0;

pub const DEFAULT_MIN_HORIZONTAL_ZOOM: f64 = 2.0;
pub const DEFAULT_MAX_HORIZONTAL_ZOOM: f64 = 240.0;
pub const DEFAULT_HORIZONTAL_ZOOM: f64 = 24.0;

/// Multiplier applied to wheel `delta_y` when zooming.
pub const DEFAULT_WHEEL_ZOOM_FACTOR: f64 = 0.3;

/// Fraction of the remaining distance the zoom mirror covers per frame.
pub const DEFAULT_ZOOM_SMOOTHING: f64 = 0.25;

pub const DEFAULT_RESIZE_QUIET_PERIOD_MS: u64 = 250;
pub const DEFAULT_GRID_REGENERATION_DELAY_MS: u64 = 50;

/// Pixel band around the scroll window where segments count as buffered.
pub const DEFAULT_SURROUNDING_MARGIN_PX: f64 = 1000.0;

/// Above this cell width every tick carries a label.
pub const FULL_LABELS_MIN_CELL_WIDTH: f64 = 40.0;
/// Above this cell width only major ticks carry a label.
pub const MAJOR_LABELS_MIN_CELL_WIDTH: f64 = 4.0;
/// Above this cell width labels include milliseconds.
pub const MILLISECONDS_MIN_CELL_WIDTH: f64 = 20.0;

/// Every n-th tick is a major tick.
pub const MAJOR_TICK_UNIT: usize = 10;

pub const LEFT_BAR_TRACK_SCALE_WIDTH: f64 = 100.0;
pub const TOP_BAR_TIME_SCALE_HEIGHT: f64 = 40.0;

pub const DEFAULT_MEDIA_RATIO: f64 = 1024.0 / 576.0;
pub const DEFAULT_SEGMENT_DURATION_IN_STEPS: f64 = 4.0;

pub const DEFAULT_MAX_CONCURRENT_RESOLUTIONS: usize = 4;
