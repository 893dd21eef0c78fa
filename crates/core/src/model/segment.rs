use serde::{Deserialize, Serialize};

pub type SegmentId = u64;

/// What a segment holds. Drives track layout (preview tracks are taller),
/// cell coloring and which rendering strategy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentCategory {
    Storyboard,
    Video,
    Dialogue,
    Sound,
    Music,
    Camera,
    Character,
    Location,
    Action,
    Lighting,
    Style,
    Transition,
    Generic,
}

/// The two families that have their own rendering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFamily {
    Storyboard,
    Video,
}

impl SegmentCategory {
    /// Base hue (degrees) for cells and track labels of this category.
    pub fn hue(self) -> f64 {
        match self {
            Self::Storyboard => 210.0,
            Self::Video => 190.0,
            Self::Dialogue => 30.0,
            Self::Sound => 80.0,
            Self::Music => 100.0,
            Self::Camera => 250.0,
            Self::Character => 0.0,
            Self::Location => 150.0,
            Self::Action => 330.0,
            Self::Lighting => 55.0,
            Self::Style => 280.0,
            Self::Transition => 170.0,
            Self::Generic => 220.0,
        }
    }

    /// Storyboards and videos get tall preview tracks.
    pub fn is_preview(self) -> bool {
        matches!(self, Self::Storyboard | Self::Video)
    }

    /// Categories whose asset is produced by the host's segment resolver.
    pub fn is_renderable(self) -> bool {
        matches!(
            self,
            Self::Storyboard | Self::Video | Self::Dialogue | Self::Sound | Self::Music
        )
    }

    pub fn media_family(self) -> MediaFamily {
        match self {
            Self::Storyboard => MediaFamily::Storyboard,
            _ => MediaFamily::Video,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Storyboard => "STORYBOARD",
            Self::Video => "VIDEO",
            Self::Dialogue => "DIALOGUE",
            Self::Sound => "SOUND",
            Self::Music => "MUSIC",
            Self::Camera => "CAMERA",
            Self::Character => "CHARACTER",
            Self::Location => "LOCATION",
            Self::Action => "ACTION",
            Self::Lighting => "LIGHTING",
            Self::Style => "STYLE",
            Self::Transition => "TRANSITION",
            Self::Generic => "GENERIC",
        }
    }
}

/// A time-bounded clip placed on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    pub category: SegmentCategory,
    pub start_time_in_ms: f64,
    pub end_time_in_ms: f64,
    /// Index into the track list.
    pub track: usize,
    /// Resolved asset. Empty until the host's resolver fills it in.
    #[serde(default)]
    pub asset_url: String,
    /// Prompt or caption shown on text cells.
    #[serde(default)]
    pub label: String,
}

impl Segment {
    pub fn new(
        id: SegmentId,
        category: SegmentCategory,
        track: usize,
        start_time_in_ms: f64,
        end_time_in_ms: f64,
    ) -> Self {
        Self {
            id,
            category,
            start_time_in_ms,
            end_time_in_ms,
            track,
            asset_url: String::new(),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn duration_in_ms(&self) -> f64 {
        self.end_time_in_ms - self.start_time_in_ms
    }

    /// `end > start`, both finite.
    pub fn has_valid_range(&self) -> bool {
        self.start_time_in_ms.is_finite()
            && self.end_time_in_ms.is_finite()
            && self.end_time_in_ms > self.start_time_in_ms
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps(&self, start_time_in_ms: f64, end_time_in_ms: f64) -> bool {
        self.start_time_in_ms < end_time_in_ms && self.end_time_in_ms > start_time_in_ms
    }

    pub fn has_asset(&self) -> bool {
        !self.asset_url.is_empty()
    }

    /// Whether two versions of a segment occupy the same place on the grid.
    pub fn same_geometry(&self, other: &Segment) -> bool {
        self.track == other.track
            && self.start_time_in_ms == other.start_time_in_ms
            && self.end_time_in_ms == other.end_time_in_ms
    }
}
