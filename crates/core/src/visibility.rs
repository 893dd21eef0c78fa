//! Segment visibility classification.
//!
//! Each segment gets a priority class that tells the host which assets to
//! resolve first. Classification is horizontal only and works on a scroll
//! window snapped outwards to cell boundaries, so the result depends on the
//! cell the scroll position falls in rather than the exact pixel. That keeps
//! the output stable while the user scrolls inside one column and lets the
//! classifier skip work until a boundary is crossed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cursor::TimeScale;
use crate::model::{MediaFamily, Segment, SegmentCategory, SegmentId, Track};

/// Which off-screen segments get proactively resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderingStrategy {
    /// Only what the user asks for (hover, click).
    OnDemand,
    /// What is on screen, never anything else.
    OnScreenOnly,
    /// What is on screen first, then a band of neighbours.
    OnScreenThenSurrounding,
    /// What is on screen first, then everything. The resolve queue caps
    /// concurrency; the classifier does not.
    OnScreenThenAll,
}

impl RenderingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnDemand => "ON_DEMAND",
            Self::OnScreenOnly => "ON_SCREEN_ONLY",
            Self::OnScreenThenSurrounding => "ON_SCREEN_THEN_SURROUNDING",
            Self::OnScreenThenAll => "ON_SCREEN_THEN_ALL",
        }
    }

    /// Lenient parse used for host-supplied settings: anything unknown maps
    /// to `default`.
    pub fn parse_or(input: &str, default: RenderingStrategy) -> RenderingStrategy {
        input.parse().unwrap_or(default)
    }
}

impl fmt::Display for RenderingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rendering strategy {:?}", self.0)
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for RenderingStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ON_DEMAND" => Ok(Self::OnDemand),
            "ON_SCREEN_ONLY" => Ok(Self::OnScreenOnly),
            "ON_SCREEN_THEN_SURROUNDING" => Ok(Self::OnScreenThenSurrounding),
            "ON_SCREEN_THEN_ALL" => Ok(Self::OnScreenThenAll),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// One strategy per media family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderingStrategies {
    pub storyboard: RenderingStrategy,
    pub video: RenderingStrategy,
}

impl RenderingStrategies {
    pub fn for_category(&self, category: SegmentCategory) -> RenderingStrategy {
        match category.media_family() {
            MediaFamily::Storyboard => self.storyboard,
            MediaFamily::Video => self.video,
        }
    }
}

/// Priority class, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentVisibility {
    Hidden,
    Buffered,
    Visible,
    Demanded,
}

impl SegmentVisibility {
    pub fn priority(self) -> u8 {
        match self {
            Self::Hidden => 0,
            Self::Buffered => 1,
            Self::Visible => 2,
            Self::Demanded => 3,
        }
    }
}

/// Horizontal pixel window `[start, end)` in content space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollWindow {
    pub start: f64,
    pub end: f64,
}

impl ScrollWindow {
    /// The window `[scroll_x, scroll_x + width)` widened to whole cells.
    pub fn snapped(scroll_x: f64, width: f64, cell_width: f64) -> Self {
        let (first, last) = cell_span(scroll_x, width, cell_width);
        Self {
            start: first as f64 * cell_width,
            end: last as f64 * cell_width,
        }
    }

    fn intersects(&self, start: f64, end: f64) -> bool {
        start < self.end && end > self.start
    }

    fn within_margin(&self, start: f64, end: f64, margin: f64) -> bool {
        start <= self.end + margin && end >= self.start - margin
    }
}

/// First and one-past-last cell index touched by a scroll window.
fn cell_span(scroll_x: f64, width: f64, cell_width: f64) -> (i64, i64) {
    if cell_width <= 0.0 {
        return (0, 0);
    }
    let first = (scroll_x / cell_width).floor() as i64;
    let last = ((scroll_x + width.max(0.0)) / cell_width).ceil() as i64;
    (first, last.max(first))
}

/// Classify one segment. Pure and deterministic.
pub fn classify_segment(
    segment: &Segment,
    window: ScrollWindow,
    px_per_ms: f64,
    strategy: RenderingStrategy,
    surrounding_margin_px: f64,
    demanded: bool,
) -> SegmentVisibility {
    if demanded {
        return SegmentVisibility::Demanded;
    }
    if strategy == RenderingStrategy::OnDemand {
        return SegmentVisibility::Hidden;
    }

    let start = segment.start_time_in_ms * px_per_ms;
    let end = segment.end_time_in_ms * px_per_ms;
    if window.intersects(start, end) {
        return SegmentVisibility::Visible;
    }

    match strategy {
        RenderingStrategy::OnScreenThenAll => SegmentVisibility::Buffered,
        RenderingStrategy::OnScreenThenSurrounding
            if window.within_margin(start, end, surrounding_margin_px) =>
        {
            SegmentVisibility::Buffered
        }
        _ => SegmentVisibility::Hidden,
    }
}

/// Everything the classification depends on.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityInput {
    pub scroll_x: f64,
    pub width: f64,
    pub cell_width: f64,
    pub duration_in_ms_per_step: f64,
    pub surrounding_margin_px: f64,
    pub strategies: RenderingStrategies,
    /// `segments_changed` of the store.
    pub segments_version: u64,
    /// Version of the track layout (visibility toggles hide segments).
    pub tracks_version: u64,
    pub demanded: Option<SegmentId>,
}

/// Memo key: floats are compared by bit pattern, the scroll position only
/// through the cells it spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VisibilityKey {
    first_cell: i64,
    last_cell: i64,
    cell_width: u64,
    duration_in_ms_per_step: u64,
    surrounding_margin_px: u64,
    strategies: RenderingStrategies,
    segments_version: u64,
    tracks_version: u64,
    demanded: Option<SegmentId>,
}

impl VisibilityKey {
    fn new(input: &VisibilityInput) -> Self {
        let (first_cell, last_cell) = cell_span(input.scroll_x, input.width, input.cell_width);
        Self {
            first_cell,
            last_cell,
            cell_width: input.cell_width.to_bits(),
            duration_in_ms_per_step: input.duration_in_ms_per_step.to_bits(),
            surrounding_margin_px: input.surrounding_margin_px.to_bits(),
            strategies: input.strategies,
            segments_version: input.segments_version,
            tracks_version: input.tracks_version,
            demanded: input.demanded,
        }
    }
}

/// Output of one classification pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    classes: HashMap<SegmentId, SegmentVisibility>,
    /// Segments whose cell intersects the window, in segment order. This is
    /// geometric and ignores the strategy: it drives which cells are drawn.
    pub visible_segments: Vec<SegmentId>,
}

impl Classification {
    pub fn get(&self, id: SegmentId) -> SegmentVisibility {
        self.classes
            .get(&id)
            .copied()
            .unwrap_or(SegmentVisibility::Hidden)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SegmentId, SegmentVisibility)> + '_ {
        self.classes.iter().map(|(&id, &v)| (id, v))
    }

    pub fn count(&self, visibility: SegmentVisibility) -> usize {
        self.classes.values().filter(|&&v| v == visibility).count()
    }
}

impl FromIterator<(SegmentId, SegmentVisibility)> for Classification {
    fn from_iter<I: IntoIterator<Item = (SegmentId, SegmentVisibility)>>(iter: I) -> Self {
        Self {
            classes: iter.into_iter().collect(),
            visible_segments: Vec::new(),
        }
    }
}

/// Memoizing classifier owned by the store.
#[derive(Debug, Default)]
pub struct VisibilityClassifier {
    key: Option<VisibilityKey>,
    output: Classification,
    changes: Vec<(SegmentId, SegmentVisibility)>,
    recomputes: u64,
}

impl VisibilityClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reclassify when the memo key moved. Returns `true` when a pass ran
    /// and its result differs from the previous one.
    pub fn update(&mut self, input: &VisibilityInput, segments: &[Segment], tracks: &[Track]) -> bool {
        let key = VisibilityKey::new(input);
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.recomputes += 1;

        let window = ScrollWindow::snapped(input.scroll_x, input.width, input.cell_width);
        let px_per_ms = TimeScale::new(input.cell_width, input.duration_in_ms_per_step).px_per_ms();

        let mut output = Classification {
            classes: HashMap::with_capacity(segments.len()),
            visible_segments: Vec::new(),
        };
        for segment in segments {
            let track_hidden = tracks.get(segment.track).is_some_and(|t| !t.visible);
            let class = if track_hidden {
                SegmentVisibility::Hidden
            } else {
                classify_segment(
                    segment,
                    window,
                    px_per_ms,
                    input.strategies.for_category(segment.category),
                    input.surrounding_margin_px,
                    input.demanded == Some(segment.id),
                )
            };
            if !track_hidden
                && window.intersects(
                    segment.start_time_in_ms * px_per_ms,
                    segment.end_time_in_ms * px_per_ms,
                )
            {
                output.visible_segments.push(segment.id);
            }
            output.classes.insert(segment.id, class);
        }

        log::debug!(
            "visibility pass #{}: {} segments, {} on screen, cells [{}, {})",
            self.recomputes,
            segments.len(),
            output.visible_segments.len(),
            key.first_cell,
            key.last_cell
        );

        let mut changes: Vec<_> = output
            .iter()
            .filter(|&(id, class)| self.output.classes.get(&id) != Some(&class))
            .collect();
        changes.sort_unstable_by_key(|&(id, _)| id);

        let changed = output != self.output;
        self.output = output;
        self.changes = changes;
        changed
    }

    pub fn classification(&self) -> &Classification {
        &self.output
    }

    /// Segments whose class differs from the pass before the last one,
    /// sorted by id.
    pub fn last_changes(&self) -> &[(SegmentId, SegmentVisibility)] {
        &self.changes
    }

    /// Number of classification passes run so far.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }
}
