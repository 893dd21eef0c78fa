use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::model::{Segment, Track};

/// Immutable view of the host's project, as consumed by the timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Explicit track layout. When absent, tracks are derived from the
    /// segments.
    #[serde(default)]
    pub tracks: Option<Vec<Track>>,
}

impl ProjectSnapshot {
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            tracks: None,
        }
    }

    pub fn from_json_slice(data: &[u8]) -> Result<Self, TimelineError> {
        serde_json::from_slice(data).map_err(TimelineError::Project)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drop segments whose range is empty, inverted or not finite.
    pub fn sanitized(mut self) -> Self {
        let before = self.segments.len();
        self.segments.retain(|segment| {
            let valid = segment.has_valid_range();
            if !valid {
                log::warn!(
                    "dropping segment {} with invalid range [{}, {})",
                    segment.id,
                    segment.start_time_in_ms,
                    segment.end_time_in_ms
                );
            }
            valid
        });
        if self.segments.len() != before {
            log::warn!(
                "{} of {before} segments dropped while loading project",
                before - self.segments.len()
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentCategory;

    #[test]
    fn sanitize_drops_invalid_segments() {
        let project = ProjectSnapshot::from_segments(vec![
            Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0),
            Segment::new(2, SegmentCategory::Video, 0, 1000.0, 1000.0),
            Segment::new(3, SegmentCategory::Video, 0, 2000.0, 1500.0),
        ])
        .sanitized();
        let ids: Vec<_> = project.segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn parses_minimal_json() {
        let project =
            ProjectSnapshot::from_json_slice(br#"{ "segments": [] }"#).unwrap_or_default();
        assert!(project.is_empty());
        assert!(project.tracks.is_none());
    }

    #[test]
    fn invalid_json_is_a_project_error() {
        let err = ProjectSnapshot::from_json_slice(b"[1, 2").err();
        assert!(matches!(err, Some(TimelineError::Project(_))));
    }
}
