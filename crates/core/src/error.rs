use thiserror::Error;

use crate::model::SegmentId;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid time range: end ({end_time_in_ms}ms) must be after start ({start_time_in_ms}ms)")]
    InvalidTimeRange {
        start_time_in_ms: f64,
        end_time_in_ms: f64,
    },
    #[error("track {track} is past the last allowed track ({max_tracks} tracks)")]
    TrackOutOfRange { track: usize, max_tracks: usize },
    #[error("no segment id left after {last}")]
    SegmentIdsExhausted { last: SegmentId },
    #[error("config: {0}")]
    Config(#[source] serde_json::Error),
    #[error("project: {0}")]
    Project(#[source] serde_json::Error),
}

/// Failure reported by a [`SegmentResolver`](crate::resolve::SegmentResolver).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("resolver failed: {0}")]
    Failed(String),
    #[error("resolver returned segment {returned} for request on {requested}")]
    Mismatch {
        requested: SegmentId,
        returned: SegmentId,
    },
}
