//! The viewport state store.
//!
//! [`TimelineStore`] is the single writer for everything the timeline
//! derives: the track list, layout metrics, zoom, scroll, container size,
//! cursor position and segment visibility. Every mutator is one synchronous
//! transition. Metrics are recomputed inside the transition (later steps of a
//! [`batch`](TimelineStore::batch) see them); visibility is refreshed and
//! events are delivered once, when the outermost transition commits.

use std::cell::RefCell;
use std::time::Instant;

use timeline_grid_protocol::Size;

use crate::config::TimelineConfig;
use crate::cursor::TimeScale;
use crate::error::{ResolveError, TimelineError};
use crate::metrics::{ContentSizeMetrics, compute_content_size_metrics};
use crate::model::{
    MediaFamily, ProjectSnapshot, Segment, SegmentCategory, SegmentId, Track, build_tracks,
};
use crate::resolve::{
    ResolutionOutcome, ResolutionTicket, ResolutionTracker, ResolveQueue, SegmentResolver,
};
use crate::scheduler::Debouncer;
use crate::visibility::{
    Classification, RenderingStrategies, RenderingStrategy, SegmentVisibility,
    VisibilityClassifier, VisibilityInput,
};

/// Zoom mirror snaps to its target once closer than this.
const ZOOM_MIRROR_EPSILON: f64 = 0.01;

/// Host playback transport.
///
/// The default [`LocalTransport`] only keeps a play flag; hosts with a real
/// player forward these calls to it.
pub trait Transport {
    /// Move the playhead. The store has already updated its cursor.
    fn jump_at(&mut self, _timestamp_in_ms: f64) {}

    /// Start (`Some(true)`), pause (`Some(false)`) or flip (`None`) playback.
    /// Returns whether it was playing before the call.
    fn toggle_playback(&mut self, play: Option<bool>) -> bool;

    fn is_playing(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct LocalTransport {
    playing: bool,
}

impl Transport for LocalTransport {
    fn toggle_playback(&mut self, play: Option<bool>) -> bool {
        let was_playing = self.playing;
        self.playing = play.unwrap_or(!was_playing);
        was_playing
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Notifications delivered to subscribers when a transition commits.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    ProjectLoaded {
        segments: usize,
        tracks: usize,
    },
    SegmentsChanged {
        version: u64,
    },
    /// A segment's asset changed, its geometry did not.
    SegmentUpdated {
        segment_id: SegmentId,
    },
    MetricsChanged {
        version: u64,
    },
    ZoomChanged {
        horizontal_zoom_level: f64,
    },
    ScrollChanged {
        scroll_x: f64,
        scroll_y: f64,
    },
    ContainerResized {
        width: f64,
        height: f64,
    },
    /// The resize quiet period elapsed.
    ResizeSettled,
    TrackVisibilityToggled {
        track_id: usize,
        visible: bool,
    },
    CursorMoved {
        timestamp_in_ms: f64,
    },
    CursorDragChanged {
        dragging: bool,
    },
    PlaybackChanged {
        playing: bool,
    },
    HoveredSegmentChanged {
        segment_id: Option<SegmentId>,
    },
    RenderingStrategyChanged {
        family: MediaFamily,
        strategy: RenderingStrategy,
    },
    /// Segments whose priority class changed in the last classification.
    VisibilityChanged {
        changes: Vec<(SegmentId, SegmentVisibility)>,
        visible_segments: usize,
    },
    ResolutionFailed {
        segment_id: SegmentId,
        error: ResolveError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Viewport part of the store, readable as one value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    /// Authoritative zoom, equal to the cell width.
    pub horizontal_zoom_level: f64,
    /// Animation mirror chasing `horizontal_zoom_level`. Never triggers a
    /// recompute.
    pub current_zoom_level: f64,
    pub min_horizontal_zoom_level: f64,
    pub max_horizontal_zoom_level: f64,
    pub is_resizing: bool,
    pub resize_started_at: Option<Instant>,
    pub cursor_timestamp_at_in_ms: f64,
    pub is_dragging_cursor: bool,
}

/// Recompute counters, for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub metrics_recomputes: u64,
    pub visibility_recomputes: u64,
    pub events_emitted: u64,
}

/// A segment to insert. Without a track the first free one is used.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDraft {
    pub category: SegmentCategory,
    pub start_time_in_ms: f64,
    pub end_time_in_ms: f64,
    pub track: Option<usize>,
    pub label: String,
}

impl SegmentDraft {
    pub fn new(category: SegmentCategory, start_time_in_ms: f64, end_time_in_ms: f64) -> Self {
        Self {
            category,
            start_time_in_ms,
            end_time_in_ms,
            track: None,
            label: String::new(),
        }
    }

    pub fn on_track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn validate(&self) -> Result<(), TimelineError> {
        let valid = self.start_time_in_ms.is_finite()
            && self.end_time_in_ms.is_finite()
            && self.end_time_in_ms > self.start_time_in_ms;
        if valid {
            Ok(())
        } else {
            Err(TimelineError::InvalidTimeRange {
                start_time_in_ms: self.start_time_in_ms,
                end_time_in_ms: self.end_time_in_ms,
            })
        }
    }
}

/// Wheel input in pixels. `zoom` is set when the zoom modifier is held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    /// Pointer position relative to the grid viewport, used as zoom pivot.
    pub pointer_x: f64,
    pub zoom: bool,
}

type Subscriber = Box<dyn FnMut(&TimelineEvent)>;

pub struct TimelineStore {
    config: TimelineConfig,

    tracks: Vec<Track>,
    segments: Vec<Segment>,
    /// `None` once the id space is used up.
    next_segment_id: Option<SegmentId>,
    segments_changed: u64,
    silent_changes_in_segments: u64,
    tracks_version: u64,

    metrics: ContentSizeMetrics,
    metrics_version: u64,

    viewport: ViewportState,
    strategies: RenderingStrategies,
    hovered_segment: Option<SegmentId>,
    classifier: VisibilityClassifier,
    resize_quiet: Debouncer,

    transport: Box<dyn Transport>,
    resolutions: ResolutionTracker,

    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    pending_events: Vec<TimelineEvent>,
    batch_depth: usize,
    stats: StoreStats,
}

impl std::fmt::Debug for TimelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineStore")
            .field("segments", &self.segments.len())
            .field("tracks", &self.tracks.len())
            .field("segments_changed", &self.segments_changed)
            .field("metrics_version", &self.metrics_version)
            .field("viewport", &self.viewport)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl Default for TimelineStore {
    fn default() -> Self {
        Self::new(TimelineConfig::default())
    }
}

impl TimelineStore {
    pub fn new(config: TimelineConfig) -> Self {
        Self::with_transport(config, Box::new(LocalTransport::default()))
    }

    pub fn with_transport(config: TimelineConfig, transport: Box<dyn Transport>) -> Self {
        let config = config.normalized();
        let tracks = build_tracks(&[], &config);
        let zoom = config.initial_horizontal_zoom_level;
        let metrics = compute_content_size_metrics(&tracks, zoom, &[], &config);
        Self {
            viewport: ViewportState {
                width: 0.0,
                height: 0.0,
                scroll_x: 0.0,
                scroll_y: 0.0,
                horizontal_zoom_level: zoom,
                current_zoom_level: zoom,
                min_horizontal_zoom_level: config.min_horizontal_zoom_level,
                max_horizontal_zoom_level: config.max_horizontal_zoom_level,
                is_resizing: false,
                resize_started_at: None,
                cursor_timestamp_at_in_ms: 0.0,
                is_dragging_cursor: false,
            },
            strategies: RenderingStrategies {
                storyboard: config.storyboard_rendering_strategy,
                video: config.video_rendering_strategy,
            },
            resize_quiet: Debouncer::new(config.resize_quiet_period()),
            tracks,
            segments: Vec::new(),
            next_segment_id: Some(1),
            segments_changed: 0,
            silent_changes_in_segments: 0,
            tracks_version: 0,
            metrics,
            metrics_version: 0,
            hovered_segment: None,
            classifier: VisibilityClassifier::new(),
            transport,
            resolutions: ResolutionTracker::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            pending_events: Vec::new(),
            batch_depth: 0,
            stats: StoreStats {
                metrics_recomputes: 1,
                ..StoreStats::default()
            },
            config,
        }
    }

    // ----- reads -----

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Segments sorted by start time.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments_changed(&self) -> u64 {
        self.segments_changed
    }

    pub fn silent_changes_in_segments(&self) -> u64 {
        self.silent_changes_in_segments
    }

    pub fn tracks_version(&self) -> u64 {
        self.tracks_version
    }

    pub fn metrics(&self) -> &ContentSizeMetrics {
        &self.metrics
    }

    /// Advances every time [`metrics`](Self::metrics) is replaced.
    pub fn metrics_version(&self) -> u64 {
        self.metrics_version
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn cell_width(&self) -> f64 {
        self.metrics.cell_width
    }

    pub fn time_scale(&self) -> TimeScale {
        TimeScale::new(self.metrics.cell_width, self.config.duration_in_ms_per_step)
    }

    pub fn strategies(&self) -> RenderingStrategies {
        self.strategies
    }

    pub fn hovered_segment(&self) -> Option<SegmentId> {
        self.hovered_segment
    }

    pub fn classification(&self) -> &Classification {
        self.classifier.classification()
    }

    pub fn visible_segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        let visible = &self.classifier.classification().visible_segments;
        self.segments.iter().filter(|s| visible.contains(&s.id))
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            visibility_recomputes: self.classifier.recomputes(),
            ..self.stats
        }
    }

    /// Size of the grid area, i.e. the container minus the two rulers.
    pub fn grid_viewport_size(&self) -> Size {
        Size::new(
            (self.viewport.width - self.config.left_bar_width).max(0.0),
            (self.viewport.height - self.config.top_bar_height).max(0.0),
        )
    }

    pub fn max_scroll(&self) -> (f64, f64) {
        let grid = self.grid_viewport_size();
        (
            (self.metrics.content_width - grid.width).max(0.0),
            (self.metrics.content_height - grid.height).max(0.0),
        )
    }

    /// Lowest track index holding no segment that overlaps
    /// `[start, end)`, or one past the last track. Never fails.
    pub fn find_free_track(&self, start_time_in_ms: f64, end_time_in_ms: f64) -> usize {
        let nb_tracks = self.tracks.len().max(self.metrics.nb_identified_tracks);
        (0..nb_tracks)
            .find(|&track| {
                !self
                    .segments
                    .iter()
                    .any(|s| s.track == track && s.overlaps(start_time_in_ms, end_time_in_ms))
            })
            .unwrap_or(nb_tracks)
    }

    /// Segments the host should resolve next, most urgent first, within the
    /// free concurrency slots.
    pub fn next_resolutions(&self) -> Vec<SegmentId> {
        ResolveQueue::new(self.config.max_concurrent_resolutions).next_batch(
            &self.segments,
            self.classifier.classification(),
            &self.resolutions,
        )
    }

    // ----- subscriptions -----

    pub fn subscribe(&mut self, subscriber: impl FnMut(&TimelineEvent) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Run several mutators as one transition: metrics stay current between
    /// steps, visibility and events are flushed once at the end.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        self.commit();
        result
    }

    // ----- project -----

    /// Replace the whole project. Invalid segments are dropped with a
    /// warning; tracks are derived unless the snapshot carries its own.
    pub fn set_project(&mut self, snapshot: ProjectSnapshot) {
        let ProjectSnapshot { mut segments, tracks } = snapshot.sanitized();
        segments.sort_by(|a, b| a.start_time_in_ms.total_cmp(&b.start_time_in_ms));

        self.tracks = match tracks {
            Some(mut tracks) if !tracks.is_empty() => {
                tracks.truncate(self.config.max_tracks);
                tracks
            }
            _ => build_tracks(&segments, &self.config),
        };
        self.next_segment_id = match segments.iter().map(|s| s.id).max() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        };
        self.segments = segments;
        self.hovered_segment = None;
        self.resolutions.clear();
        self.segments_changed += 1;
        self.tracks_version += 1;

        log::info!(
            "project loaded: {} segments on {} tracks",
            self.segments.len(),
            self.tracks.len()
        );
        self.pending_events.push(TimelineEvent::ProjectLoaded {
            segments: self.segments.len(),
            tracks: self.tracks.len(),
        });
        self.pending_events.push(TimelineEvent::SegmentsChanged {
            version: self.segments_changed,
        });
        self.recompute_metrics();
        self.commit();
    }

    /// Insert one segment, on its own track or the first free one.
    pub fn add_segment(&mut self, draft: SegmentDraft) -> Result<SegmentId, TimelineError> {
        draft.validate()?;
        self.check_track(draft.track)?;
        let id = self.reserve_segment_ids(1)?;
        self.insert_draft(id, draft)?;
        self.next_segment_id = id.checked_add(1);
        self.segments_inserted();
        Ok(id)
    }

    /// Insert several segments in one transition. Either all drafts are
    /// valid and inserted, or none is.
    pub fn add_segments(&mut self, drafts: Vec<SegmentDraft>) -> Result<Vec<SegmentId>, TimelineError> {
        for draft in &drafts {
            draft.validate()?;
            self.check_track(draft.track)?;
        }
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let first = self.reserve_segment_ids(drafts.len())?;

        let saved = (self.segments.clone(), self.tracks.clone());
        let mut ids = Vec::with_capacity(drafts.len());
        for (offset, draft) in (0..).zip(drafts) {
            match self.insert_draft(first.saturating_add(offset), draft) {
                Ok(id) => ids.push(id),
                Err(error) => {
                    (self.segments, self.tracks) = saved;
                    return Err(error);
                }
            }
        }
        self.next_segment_id = first.checked_add(ids.len() as SegmentId);
        self.segments_inserted();
        Ok(ids)
    }

    /// First of `count` consecutive free ids.
    fn reserve_segment_ids(&self, count: usize) -> Result<SegmentId, TimelineError> {
        let span = SegmentId::try_from(count.saturating_sub(1)).ok();
        self.next_segment_id
            .filter(|first| span.is_some_and(|span| first.checked_add(span).is_some()))
            .ok_or_else(|| TimelineError::SegmentIdsExhausted {
                last: self.segments.iter().map(|s| s.id).max().unwrap_or(0),
            })
    }

    fn check_track(&self, track: Option<usize>) -> Result<(), TimelineError> {
        match track {
            Some(track) if track >= self.config.max_tracks => Err(TimelineError::TrackOutOfRange {
                track,
                max_tracks: self.config.max_tracks,
            }),
            _ => Ok(()),
        }
    }

    fn insert_draft(&mut self, id: SegmentId, draft: SegmentDraft) -> Result<SegmentId, TimelineError> {
        let track = match draft.track {
            Some(track) => track,
            None => self.find_free_track(draft.start_time_in_ms, draft.end_time_in_ms),
        };
        self.check_track(Some(track))?;
        let segment = Segment::new(
            id,
            draft.category,
            track,
            draft.start_time_in_ms,
            draft.end_time_in_ms,
        )
        .with_label(draft.label);

        let nb_tracks = self.tracks.len();
        self.place_on_track(&segment);
        if self.tracks.len() != nb_tracks {
            log::debug!("track list grew from {nb_tracks} to {}", self.tracks.len());
        }
        let at = self
            .segments
            .partition_point(|s| s.start_time_in_ms <= segment.start_time_in_ms);
        self.segments.insert(at, segment);
        Ok(id)
    }

    fn segments_inserted(&mut self) {
        self.resolutions.clear_failures();
        self.segments_changed += 1;
        self.tracks_version += 1;
        self.pending_events.push(TimelineEvent::SegmentsChanged {
            version: self.segments_changed,
        });
        self.recompute_metrics();
        self.commit();
    }

    /// Grow the track list to reach `segment.track` and mark the track as
    /// holding it. Tracks at or past `max_tracks` are never created.
    fn place_on_track(&mut self, segment: &Segment) {
        if segment.track >= self.config.max_tracks {
            log::warn!(
                "segment {} is on track {}, past the last of {} tracks",
                segment.id,
                segment.track,
                self.config.max_tracks
            );
            return;
        }
        while self.tracks.len() <= segment.track {
            let id = self.tracks.len();
            self.tracks.push(Track::empty(id, &self.config));
        }
        let config = &self.config;
        if let Some(track) = self.tracks.get_mut(segment.track) {
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
    }

    pub fn toggle_track_visibility(&mut self, track_id: usize) -> bool {
        let Some(track) = self.tracks.iter_mut().find(|t| t.id == track_id) else {
            log::warn!("toggle_track_visibility: no track {track_id}");
            return false;
        };
        track.visible = !track.visible;
        let visible = track.visible;
        self.tracks_version += 1;
        self.pending_events
            .push(TimelineEvent::TrackVisibilityToggled { track_id, visible });
        self.recompute_metrics();
        self.commit();
        true
    }

    // ----- zoom & scroll -----

    /// Set the zoom (cell width), clamped to the configured bounds. The
    /// scroll offset is only re-clamped into the new content bounds.
    pub fn set_horizontal_zoom_level(&mut self, horizontal_zoom_level: f64) {
        if !horizontal_zoom_level.is_finite() {
            return;
        }
        let zoom = horizontal_zoom_level.clamp(
            self.viewport.min_horizontal_zoom_level,
            self.viewport.max_horizontal_zoom_level,
        );
        if zoom == self.viewport.horizontal_zoom_level {
            return;
        }
        self.viewport.horizontal_zoom_level = zoom;
        self.pending_events.push(TimelineEvent::ZoomChanged {
            horizontal_zoom_level: zoom,
        });
        self.recompute_metrics();
        self.commit();
    }

    /// Zoom keeping the time under `pivot_x` (grid-relative pixels) in place.
    pub fn zoom_about(&mut self, pivot_x: f64, horizontal_zoom_level: f64) {
        self.batch(|store| {
            let old_scale = store.time_scale();
            let scroll_y = store.viewport.scroll_y;
            let pivot_time = old_scale.pixel_to_time(pivot_x, store.viewport.scroll_x);
            store.set_horizontal_zoom_level(horizontal_zoom_level);
            let new_scale = store.time_scale();
            let scroll_x = new_scale.time_to_pixel(pivot_time, 0.0) - pivot_x;
            store.set_scroll(scroll_x, scroll_y);
        });
    }

    pub fn set_scroll(&mut self, scroll_x: f64, scroll_y: f64) {
        let (max_x, max_y) = self.max_scroll();
        let scroll_x = if scroll_x.is_finite() { scroll_x.clamp(0.0, max_x) } else { 0.0 };
        let scroll_y = if scroll_y.is_finite() { scroll_y.clamp(0.0, max_y) } else { 0.0 };
        if scroll_x != self.viewport.scroll_x || scroll_y != self.viewport.scroll_y {
            self.viewport.scroll_x = scroll_x;
            self.viewport.scroll_y = scroll_y;
            self.pending_events
                .push(TimelineEvent::ScrollChanged { scroll_x, scroll_y });
        }
        self.commit();
    }

    pub fn scroll_by(&mut self, dx: f64, dy: f64) {
        self.set_scroll(self.viewport.scroll_x + dx, self.viewport.scroll_y + dy);
    }

    /// Plain wheel scrolls; with the zoom modifier, vertical delta zooms
    /// about the pointer (wheel up zooms in).
    pub fn handle_mouse_wheel(&mut self, wheel: WheelInput) {
        log::trace!("wheel {wheel:?}");
        if wheel.zoom {
            let zoom = self.viewport.horizontal_zoom_level - self.config.wheel_zoom_factor * wheel.delta_y;
            self.zoom_about(wheel.pointer_x, zoom);
        } else {
            self.scroll_by(wheel.delta_x, wheel.delta_y);
        }
    }

    /// Feed the animated zoom reported by the renderer.
    pub fn set_current_zoom_level(&mut self, current_zoom_level: f64) {
        if current_zoom_level.is_finite() {
            self.viewport.current_zoom_level = current_zoom_level;
        }
    }

    // ----- container -----

    pub fn set_container_size(&mut self, size: Size, now: Instant) {
        let width = size.width.max(0.0);
        let height = size.height.max(0.0);
        self.viewport.is_resizing = true;
        self.viewport.resize_started_at = Some(now);
        self.resize_quiet.schedule(now);

        if width != self.viewport.width || height != self.viewport.height {
            self.viewport.width = width;
            self.viewport.height = height;
            self.pending_events
                .push(TimelineEvent::ContainerResized { width, height });
            // Re-clamp the scroll into the new bounds.
            let (x, y) = (self.viewport.scroll_x, self.viewport.scroll_y);
            self.batch(|store| store.set_scroll(x, y));
        } else {
            self.commit();
        }
    }

    /// Per-frame work: zoom mirror smoothing and resize quiet detection.
    /// Never touches metrics or visibility. Returns whether anything moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut moved = false;

        let target = self.viewport.horizontal_zoom_level;
        let current = self.viewport.current_zoom_level;
        if current != target {
            let next = current + (target - current) * self.config.zoom_smoothing;
            self.viewport.current_zoom_level = if (target - next).abs() < ZOOM_MIRROR_EPSILON {
                target
            } else {
                next
            };
            moved = true;
        }

        if self.resize_quiet.poll(now) {
            self.viewport.is_resizing = false;
            self.viewport.resize_started_at = None;
            self.pending_events.push(TimelineEvent::ResizeSettled);
            moved = true;
        }

        self.flush_events();
        moved
    }

    // ----- cursor & playback -----

    pub fn set_cursor_timestamp_at_in_ms(&mut self, timestamp_in_ms: f64) {
        if !timestamp_in_ms.is_finite() {
            return;
        }
        let timestamp_in_ms = timestamp_in_ms.max(0.0);
        if timestamp_in_ms != self.viewport.cursor_timestamp_at_in_ms {
            self.viewport.cursor_timestamp_at_in_ms = timestamp_in_ms;
            self.pending_events
                .push(TimelineEvent::CursorMoved { timestamp_in_ms });
        }
        self.commit();
    }

    /// Move the cursor and the host's playhead.
    pub fn jump_at(&mut self, timestamp_in_ms: f64) {
        self.set_cursor_timestamp_at_in_ms(timestamp_in_ms);
        let t = self.viewport.cursor_timestamp_at_in_ms;
        self.transport.jump_at(t);
    }

    /// See [`Transport::toggle_playback`]. Returns whether it was playing.
    pub fn toggle_playback(&mut self, play: Option<bool>) -> bool {
        let was_playing = self.transport.toggle_playback(play);
        let playing = self.transport.is_playing();
        if playing != was_playing {
            self.pending_events
                .push(TimelineEvent::PlaybackChanged { playing });
        }
        self.commit();
        was_playing
    }

    pub fn set_is_dragging_cursor(&mut self, dragging: bool) {
        if dragging != self.viewport.is_dragging_cursor {
            self.viewport.is_dragging_cursor = dragging;
            self.pending_events
                .push(TimelineEvent::CursorDragChanged { dragging });
        }
        self.commit();
    }

    // ----- visibility inputs -----

    /// The hovered segment is classified as demanded.
    pub fn set_hovered_segment(&mut self, segment_id: Option<SegmentId>) {
        if segment_id != self.hovered_segment {
            self.hovered_segment = segment_id;
            self.pending_events
                .push(TimelineEvent::HoveredSegmentChanged { segment_id });
        }
        self.commit();
    }

    pub fn set_rendering_strategy(&mut self, family: MediaFamily, strategy: RenderingStrategy) {
        let slot = match family {
            MediaFamily::Storyboard => &mut self.strategies.storyboard,
            MediaFamily::Video => &mut self.strategies.video,
        };
        if *slot != strategy {
            *slot = strategy;
            self.pending_events
                .push(TimelineEvent::RenderingStrategyChanged { family, strategy });
        }
        self.commit();
    }

    // ----- resolution -----

    /// Open a resolution request for a segment. A later request for the
    /// same segment supersedes this one.
    pub fn begin_resolution(&mut self, segment_id: SegmentId) -> Option<(ResolutionTicket, Segment)> {
        let segment = self.segment(segment_id)?.clone();
        Some((self.resolutions.begin(segment_id), segment))
    }

    /// Apply a finished resolution if its ticket is still the latest.
    pub fn complete_resolution(
        &mut self,
        ticket: ResolutionTicket,
        result: Result<Segment, ResolveError>,
    ) -> ResolutionOutcome {
        if !self.resolutions.finish(ticket) {
            log::debug!(
                "dropping stale resolution #{} of segment {}",
                ticket.seq,
                ticket.segment_id
            );
            return ResolutionOutcome::Stale;
        }

        let result = result.and_then(|segment| {
            if segment.id == ticket.segment_id {
                Ok(segment)
            } else {
                Err(ResolveError::Mismatch {
                    requested: ticket.segment_id,
                    returned: segment.id,
                })
            }
        });
        let resolved = match result {
            Ok(segment) if segment.has_valid_range() => segment,
            Ok(segment) => {
                let error = ResolveError::Failed(format!(
                    "invalid range [{}, {})",
                    segment.start_time_in_ms, segment.end_time_in_ms
                ));
                return self.fail_resolution(ticket.segment_id, error);
            }
            Err(error) => return self.fail_resolution(ticket.segment_id, error),
        };

        let Some(index) = self.segments.iter().position(|s| s.id == resolved.id) else {
            return ResolutionOutcome::Stale;
        };

        if self.segments[index].same_geometry(&resolved) {
            self.segments[index] = resolved;
            self.silent_changes_in_segments += 1;
            self.pending_events.push(TimelineEvent::SegmentUpdated {
                segment_id: ticket.segment_id,
            });
        } else {
            self.place_on_track(&resolved);
            self.segments.remove(index);
            let at = self
                .segments
                .partition_point(|s| s.start_time_in_ms <= resolved.start_time_in_ms);
            self.segments.insert(at, resolved);
            self.resolutions.clear_failures();
            self.segments_changed += 1;
            self.tracks_version += 1;
            self.pending_events.push(TimelineEvent::SegmentsChanged {
                version: self.segments_changed,
            });
            self.recompute_metrics();
        }
        self.commit();
        ResolutionOutcome::Applied
    }

    fn fail_resolution(&mut self, segment_id: SegmentId, error: ResolveError) -> ResolutionOutcome {
        log::warn!("resolution of segment {segment_id} failed: {error}");
        self.resolutions.mark_failed(segment_id);
        self.pending_events.push(TimelineEvent::ResolutionFailed {
            segment_id,
            error: error.clone(),
        });
        self.commit();
        ResolutionOutcome::Failed(error)
    }

    // ----- internals -----

    fn recompute_metrics(&mut self) {
        self.metrics = compute_content_size_metrics(
            &self.tracks,
            self.viewport.horizontal_zoom_level,
            &self.segments,
            &self.config,
        );
        self.metrics_version += 1;
        self.stats.metrics_recomputes += 1;
        log::debug!(
            "metrics v{}: {}x{} px, cell width {}",
            self.metrics_version,
            self.metrics.content_width,
            self.metrics.content_height,
            self.metrics.cell_width
        );
        self.pending_events.push(TimelineEvent::MetricsChanged {
            version: self.metrics_version,
        });

        let (max_x, max_y) = self.max_scroll();
        let scroll_x = self.viewport.scroll_x.min(max_x);
        let scroll_y = self.viewport.scroll_y.min(max_y);
        if scroll_x != self.viewport.scroll_x || scroll_y != self.viewport.scroll_y {
            self.viewport.scroll_x = scroll_x;
            self.viewport.scroll_y = scroll_y;
            self.pending_events
                .push(TimelineEvent::ScrollChanged { scroll_x, scroll_y });
        }
    }

    fn refresh_visibility(&mut self) {
        let input = VisibilityInput {
            scroll_x: self.viewport.scroll_x,
            width: self.grid_viewport_size().width,
            cell_width: self.metrics.cell_width,
            duration_in_ms_per_step: self.config.duration_in_ms_per_step,
            surrounding_margin_px: self.config.surrounding_margin_px,
            strategies: self.strategies,
            segments_version: self.segments_changed,
            tracks_version: self.tracks_version,
            demanded: self.hovered_segment,
        };
        if self.classifier.update(&input, &self.segments, &self.tracks) {
            let changes = self.classifier.last_changes().to_vec();
            let visible_segments = self.classifier.classification().visible_segments.len();
            self.pending_events.push(TimelineEvent::VisibilityChanged {
                changes,
                visible_segments,
            });
        }
    }

    /// End of a transition: refresh visibility (memoized) and deliver the
    /// queued events, unless a batch is still open.
    fn commit(&mut self) {
        if self.batch_depth > 0 {
            return;
        }
        self.refresh_visibility();
        self.flush_events();
    }

    fn flush_events(&mut self) {
        if self.batch_depth > 0 || self.pending_events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending_events);
        self.stats.events_emitted += events.len() as u64;
        for event in &events {
            for (_, subscriber) in &mut self.subscribers {
                subscriber(event);
            }
        }
    }
}

/// Resolve one segment through the host's resolver and apply the result.
///
/// The store is only borrowed around the await point, so other transitions
/// (including newer resolutions of the same segment) may run meanwhile.
/// Returns `None` for an unknown segment.
pub async fn resolve_segment<R: SegmentResolver>(
    store: &RefCell<TimelineStore>,
    resolver: &R,
    segment_id: SegmentId,
) -> Option<ResolutionOutcome> {
    let (ticket, segment) = store.borrow_mut().begin_resolution(segment_id)?;
    let result = resolver.resolve(segment).await;
    Some(store.borrow_mut().complete_resolution(ticket, result))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::model::SegmentCategory;

    fn store_with(segments: Vec<Segment>) -> TimelineStore {
        let mut store = TimelineStore::default();
        store.set_container_size(Size::new(1100.0, 600.0), Instant::now());
        store.set_project(ProjectSnapshot::from_segments(segments));
        store
    }

    fn recorded(store: &mut TimelineStore) -> Rc<RefCell<Vec<TimelineEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn zoom_is_clamped_and_idempotent() {
        let mut store = store_with(vec![]);
        let (min, max) = (
            store.viewport().min_horizontal_zoom_level,
            store.viewport().max_horizontal_zoom_level,
        );
        for raw in [min - 5.0, min, 13.7, max, max * 3.0] {
            store.set_horizontal_zoom_level(raw);
            let first = *store.viewport();
            let first_metrics = store.metrics().clone();
            let version = store.metrics_version();

            store.set_horizontal_zoom_level(raw);
            assert_eq!(*store.viewport(), first);
            assert_eq!(*store.metrics(), first_metrics);
            assert_eq!(store.metrics_version(), version, "no recompute for {raw}");
            assert!((min..=max).contains(&store.viewport().horizontal_zoom_level));
        }
    }

    #[test]
    fn zoom_does_not_move_scroll_inside_bounds() {
        let mut store = store_with(vec![]);
        store.set_scroll(500.0, 0.0);
        store.set_horizontal_zoom_level(store.viewport().horizontal_zoom_level * 2.0);
        assert!((store.viewport().scroll_x - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zoom_about_keeps_pivot_time_in_place() {
        let mut store = store_with(vec![]);
        store.set_horizontal_zoom_level(20.0);
        store.set_scroll(400.0, 0.0);
        let pivot = 300.0;
        let before = store.time_scale().pixel_to_time(pivot, store.viewport().scroll_x);

        store.zoom_about(pivot, 40.0);
        let after = store.time_scale().pixel_to_time(pivot, store.viewport().scroll_x);
        assert!((before - after).abs() < 1e-6);
        assert!((store.viewport().scroll_x - 1100.0).abs() < 1e-6);
    }

    #[test]
    fn wheel_scrolls_and_zooms() {
        let mut store = store_with(vec![]);
        store.handle_mouse_wheel(WheelInput {
            delta_x: 30.0,
            delta_y: 0.0,
            pointer_x: 0.0,
            zoom: false,
        });
        assert!((store.viewport().scroll_x - 30.0).abs() < f64::EPSILON);

        let zoom = store.viewport().horizontal_zoom_level;
        store.handle_mouse_wheel(WheelInput {
            delta_x: 0.0,
            delta_y: -10.0,
            pointer_x: 100.0,
            zoom: true,
        });
        assert!(store.viewport().horizontal_zoom_level > zoom);
    }

    #[test]
    fn scroll_is_clamped_to_content() {
        let mut store = store_with(vec![]);
        store.set_scroll(-50.0, -50.0);
        assert_eq!((store.viewport().scroll_x, store.viewport().scroll_y), (0.0, 0.0));
        store.set_scroll(f64::MAX, f64::MAX);
        assert_eq!(
            (store.viewport().scroll_x, store.viewport().scroll_y),
            store.max_scroll()
        );
    }

    #[test]
    fn toggling_track_visibility_round_trips_content_height() {
        let mut store = store_with(vec![
            Segment::new(1, SegmentCategory::Storyboard, 0, 0.0, 1000.0),
            Segment::new(2, SegmentCategory::Dialogue, 1, 0.0, 1000.0),
        ]);
        let original = store.metrics().content_height;

        assert!(store.toggle_track_visibility(0));
        let hidden = store.metrics().content_height;
        assert!((original - hidden - store.config().preview_step_height_in_px).abs() < f64::EPSILON);

        let tracks_version = store.tracks_version();
        assert!(store.toggle_track_visibility(0));
        assert_eq!(store.metrics().content_height, original);
        assert_eq!(store.tracks_version(), tracks_version + 1);
        assert!(!store.toggle_track_visibility(999));
        assert_eq!(store.tracks_version(), tracks_version + 1);
    }

    #[test]
    fn segments_on_hidden_tracks_are_not_on_screen() {
        let mut store = store_with(vec![
            Segment::new(1, SegmentCategory::Storyboard, 0, 0.0, 1000.0),
            Segment::new(2, SegmentCategory::Dialogue, 1, 0.0, 1000.0),
        ]);
        assert_eq!(store.visible_segments().count(), 2);
        store.toggle_track_visibility(1);
        let ids: Vec<_> = store.visible_segments().map(|s| s.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn find_free_track_policy() {
        let store = store_with(vec![]);
        assert_eq!(store.find_free_track(0.0, 1000.0), 0);

        let store = store_with(vec![Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        assert_eq!(store.find_free_track(0.0, 1000.0), 1);
        // Touching ranges do not overlap.
        assert_eq!(store.find_free_track(1000.0, 2000.0), 0);
    }

    #[test]
    fn find_free_track_returns_one_past_last_when_full() {
        let config = TimelineConfig {
            default_nb_tracks: 2,
            ..TimelineConfig::default()
        };
        let mut store = TimelineStore::new(config);
        store.set_project(ProjectSnapshot::from_segments(vec![
            Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0),
            Segment::new(2, SegmentCategory::Dialogue, 1, 500.0, 1500.0),
        ]));
        assert_eq!(store.find_free_track(0.0, 1000.0), 2);
    }

    #[test]
    fn add_segment_grows_tracks_and_bumps_version() {
        let config = TimelineConfig {
            default_nb_tracks: 1,
            ..TimelineConfig::default()
        };
        let mut store = TimelineStore::new(config);
        let v0 = store.segments_changed();

        let a = store.add_segment(SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0));
        let b = store.add_segment(SegmentDraft::new(SegmentCategory::Dialogue, 500.0, 900.0));
        assert!(matches!((a, b), (Ok(1), Ok(2))));
        assert_eq!(store.segments_changed(), v0 + 2);
        assert_eq!(store.tracks().len(), 2);
        assert_eq!(store.segment(2).map(|s| s.track), Some(1));
        assert!(store.tracks()[0].is_preview);
        assert_eq!(store.metrics().nb_identified_tracks, 2);
    }

    #[test]
    fn far_tracks_in_a_project_do_not_grow_the_track_list() {
        let store = store_with(vec![
            Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0),
            Segment::new(2, SegmentCategory::Dialogue, usize::MAX, 0.0, 1000.0),
            Segment::new(3, SegmentCategory::Music, 50_000_000, 0.0, 1000.0),
        ]);
        assert_eq!(store.segments().len(), 3);
        assert_eq!(store.tracks().len(), store.config().default_nb_tracks);
        assert_eq!(store.metrics().nb_identified_tracks, 1);
        assert!(store.metrics().content_height.is_finite());
        assert_eq!(store.find_free_track(0.0, 1000.0), 1);
    }

    #[test]
    fn explicit_track_past_the_limit_is_rejected() {
        let mut store = store_with(vec![]);
        let max_tracks = store.config().max_tracks;
        let version = store.segments_changed();

        let err = store
            .add_segment(SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0).on_track(usize::MAX))
            .err();
        assert!(matches!(
            err,
            Some(TimelineError::TrackOutOfRange { track: usize::MAX, max_tracks: m }) if m == max_tracks
        ));
        let err = store
            .add_segments(vec![
                SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0),
                SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0).on_track(max_tracks),
            ])
            .err();
        assert!(matches!(err, Some(TimelineError::TrackOutOfRange { .. })));
        assert!(store.segments().is_empty());
        assert_eq!(store.segments_changed(), version);

        let last = store.add_segment(
            SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0).on_track(max_tracks - 1),
        );
        assert!(last.is_ok());
        assert_eq!(store.tracks().len(), max_tracks);
    }

    #[test]
    fn auto_placement_stops_at_the_last_track() {
        let config = TimelineConfig {
            default_nb_tracks: 1,
            max_tracks: 2,
            ..TimelineConfig::default()
        };
        let mut store = TimelineStore::new(config);
        let drafts = vec![SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0); 2];
        assert!(store.add_segments(drafts).is_ok());

        // A third overlapping segment has nowhere to go; the batch is undone.
        let drafts = vec![
            SegmentDraft::new(SegmentCategory::Video, 2000.0, 3000.0),
            SegmentDraft::new(SegmentCategory::Video, 0.0, 1000.0),
        ];
        assert!(matches!(
            store.add_segments(drafts),
            Err(TimelineError::TrackOutOfRange { track: 2, max_tracks: 2 })
        ));
        assert_eq!(store.segments().len(), 2);
        assert_eq!(store.tracks().len(), 2);
    }

    #[test]
    fn segment_ids_follow_the_highest_loaded_id() {
        let mut store = store_with(vec![Segment::new(40, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        let ids = store.add_segments(vec![
            SegmentDraft::new(SegmentCategory::Video, 1000.0, 2000.0),
            SegmentDraft::new(SegmentCategory::Video, 2000.0, 3000.0),
        ]);
        assert!(matches!(ids.as_deref(), Ok([41, 42])));
        assert!(matches!(
            store.add_segment(SegmentDraft::new(SegmentCategory::Video, 0.0, 500.0)),
            Ok(43)
        ));
    }

    #[test]
    fn exhausted_segment_ids_are_an_error() {
        let mut store = store_with(vec![Segment::new(
            SegmentId::MAX,
            SegmentCategory::Video,
            0,
            0.0,
            1000.0,
        )]);
        let version = store.segments_changed();
        let err = store
            .add_segment(SegmentDraft::new(SegmentCategory::Video, 1000.0, 2000.0))
            .err();
        assert!(matches!(
            err,
            Some(TimelineError::SegmentIdsExhausted { last: SegmentId::MAX })
        ));
        assert_eq!(store.segments().len(), 1);
        assert_eq!(store.segments_changed(), version);

        let mut store = store_with(vec![Segment::new(
            SegmentId::MAX - 1,
            SegmentCategory::Video,
            0,
            0.0,
            1000.0,
        )]);
        let two = vec![SegmentDraft::new(SegmentCategory::Video, 1000.0, 2000.0); 2];
        assert!(matches!(
            store.add_segments(two),
            Err(TimelineError::SegmentIdsExhausted { .. })
        ));
        assert!(matches!(
            store.add_segment(SegmentDraft::new(SegmentCategory::Video, 1000.0, 2000.0)),
            Ok(id) if id == SegmentId::MAX
        ));
    }

    #[test]
    fn add_segments_keeps_start_order_and_rejects_invalid_batches() {
        let mut store = store_with(vec![]);
        let ids = store
            .add_segments(vec![
                SegmentDraft::new(SegmentCategory::Camera, 3000.0, 4000.0).on_track(2),
                SegmentDraft::new(SegmentCategory::Camera, 1000.0, 2000.0).on_track(2),
            ])
            .unwrap_or_default();
        assert_eq!(ids.len(), 2);
        let starts: Vec<_> = store.segments().iter().map(|s| s.start_time_in_ms).collect();
        assert_eq!(starts, vec![1000.0, 3000.0]);

        let version = store.segments_changed();
        let err = store.add_segments(vec![
            SegmentDraft::new(SegmentCategory::Camera, 0.0, 10.0),
            SegmentDraft::new(SegmentCategory::Camera, 50.0, 50.0),
        ]);
        assert!(matches!(err, Err(TimelineError::InvalidTimeRange { .. })));
        assert_eq!(store.segments().len(), 2);
        assert_eq!(store.segments_changed(), version);
    }

    #[test]
    fn batch_flushes_events_once() {
        let mut store = store_with(vec![]);
        let events = recorded(&mut store);
        store.batch(|s| {
            s.set_horizontal_zoom_level(40.0);
            s.set_scroll(100.0, 0.0);
            assert!(events.borrow().is_empty());
        });
        let events = events.borrow();
        assert!(events.contains(&TimelineEvent::ZoomChanged {
            horizontal_zoom_level: 40.0
        }));
        assert!(events.contains(&TimelineEvent::ScrollChanged {
            scroll_x: 100.0,
            scroll_y: 0.0
        }));
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let mut store = store_with(vec![]);
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let id = store.subscribe(move |_| *sink.borrow_mut() += 1);
        store.set_cursor_timestamp_at_in_ms(10.0);
        assert!(store.unsubscribe(id));
        store.set_cursor_timestamp_at_in_ms(20.0);
        assert_eq!(*count.borrow(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn resize_settles_after_quiet_period() {
        let t0 = Instant::now();
        let mut store = TimelineStore::default();
        store.set_container_size(Size::new(800.0, 400.0), t0);
        store.set_container_size(Size::new(900.0, 400.0), t0 + Duration::from_millis(100));
        assert!(store.viewport().is_resizing);

        let quiet = store.config().resize_quiet_period();
        store.tick(t0 + quiet);
        assert!(store.viewport().is_resizing);
        store.tick(t0 + Duration::from_millis(100) + quiet);
        assert!(!store.viewport().is_resizing);
        assert_eq!(store.viewport().resize_started_at, None);
    }

    #[test]
    fn tick_smooths_zoom_mirror_without_recompute() {
        let mut store = store_with(vec![]);
        store.set_horizontal_zoom_level(100.0);
        let stats = store.stats();
        let version = store.metrics_version();

        let now = Instant::now();
        for _ in 0..200 {
            store.tick(now);
        }
        assert_eq!(store.viewport().current_zoom_level, 100.0);
        assert_eq!(store.metrics_version(), version);
        assert_eq!(store.stats().visibility_recomputes, stats.visibility_recomputes);

        let later = now + Duration::from_secs(10);
        store.tick(later);
        assert!(!store.tick(later));
    }

    #[test]
    fn hovered_segment_is_demanded() {
        let mut store = store_with(vec![Segment::new(
            1,
            SegmentCategory::Video,
            0,
            900_000.0,
            901_000.0,
        )]);
        assert_eq!(store.classification().get(1), SegmentVisibility::Hidden);
        store.set_hovered_segment(Some(1));
        assert_eq!(store.classification().get(1), SegmentVisibility::Demanded);
        store.set_hovered_segment(None);
        assert_eq!(store.classification().get(1), SegmentVisibility::Hidden);
    }

    #[test]
    fn strategy_change_reclassifies() {
        let mut store = store_with(vec![Segment::new(
            1,
            SegmentCategory::Video,
            0,
            900_000.0,
            901_000.0,
        )]);
        let events = recorded(&mut store);
        store.set_rendering_strategy(MediaFamily::Video, RenderingStrategy::OnScreenThenAll);
        assert_eq!(store.classification().get(1), SegmentVisibility::Buffered);
        assert!(events.borrow().iter().any(|e| matches!(
            e,
            TimelineEvent::VisibilityChanged { changes, .. }
                if changes == &vec![(1, SegmentVisibility::Buffered)]
        )));
    }

    #[test]
    fn playback_transport_round_trip() {
        let mut store = store_with(vec![]);
        assert!(!store.is_playing());
        assert!(!store.toggle_playback(None));
        assert!(store.is_playing());
        assert!(store.toggle_playback(Some(false)));
        assert!(!store.is_playing());

        store.jump_at(-20.0);
        assert_eq!(store.viewport().cursor_timestamp_at_in_ms, 0.0);
    }

    #[test]
    fn stale_resolution_does_not_override_newer_result() {
        let mut store = store_with(vec![Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        let events = recorded(&mut store);

        let (first, segment) = store.begin_resolution(1).expect("segment is loaded");
        let (second, _) = store.begin_resolution(1).expect("segment is loaded");

        let mut newer = segment.clone();
        newer.asset_url = "second.mp4".into();
        let mut older = segment;
        older.asset_url = "first.mp4".into();

        let silent = store.silent_changes_in_segments();
        let version = store.segments_changed();
        assert_eq!(store.complete_resolution(second, Ok(newer)), ResolutionOutcome::Applied);
        assert_eq!(store.complete_resolution(first, Ok(older)), ResolutionOutcome::Stale);

        assert_eq!(store.segment(1).map(|s| s.asset_url.as_str()), Some("second.mp4"));
        assert_eq!(store.silent_changes_in_segments(), silent + 1);
        assert_eq!(store.segments_changed(), version);
        assert!(events.borrow().contains(&TimelineEvent::SegmentUpdated { segment_id: 1 }));
    }

    #[test]
    fn failed_resolution_leaves_segment_untouched() {
        let mut store = store_with(vec![Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        let events = recorded(&mut store);
        let before = store.segment(1).cloned();

        let (ticket, _) = store.begin_resolution(1).expect("segment is loaded");
        let error = ResolveError::Failed("backend offline".into());
        assert_eq!(
            store.complete_resolution(ticket, Err(error.clone())),
            ResolutionOutcome::Failed(error.clone())
        );
        assert_eq!(store.segment(1).cloned(), before);
        assert!(events.borrow().contains(&TimelineEvent::ResolutionFailed {
            segment_id: 1,
            error
        }));
    }

    #[test]
    fn failed_segment_is_not_requeued_until_segments_change() {
        let mut store = store_with(vec![Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        assert_eq!(store.next_resolutions(), vec![1]);

        let (ticket, _) = store.begin_resolution(1).expect("segment is loaded");
        store.complete_resolution(ticket, Err(ResolveError::Failed("offline".into())));
        assert!(store.next_resolutions().is_empty());
        assert!(store.next_resolutions().is_empty());

        assert!(
            store
                .add_segment(SegmentDraft::new(SegmentCategory::Sound, 0.0, 500.0))
                .is_ok()
        );
        assert!(store.next_resolutions().contains(&1));
    }

    #[test]
    fn resolution_onto_a_far_track_does_not_grow_tracks() {
        let mut store = store_with(vec![Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        let nb_tracks = store.tracks().len();
        let (ticket, mut segment) = store.begin_resolution(1).expect("segment is loaded");
        segment.track = usize::MAX;
        assert_eq!(store.complete_resolution(ticket, Ok(segment)), ResolutionOutcome::Applied);
        assert_eq!(store.tracks().len(), nb_tracks);
        assert_eq!(store.segment(1).map(|s| s.track), Some(usize::MAX));
        assert!(store.metrics().content_height.is_finite());
    }

    #[test]
    fn resolution_changing_geometry_bumps_segments_version() {
        let mut store = store_with(vec![Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0)]);
        let (ticket, mut segment) = store.begin_resolution(1).expect("segment is loaded");
        segment.end_time_in_ms = 3000.0;
        let version = store.segments_changed();
        assert_eq!(store.complete_resolution(ticket, Ok(segment)), ResolutionOutcome::Applied);
        assert_eq!(store.segments_changed(), version + 1);
        assert_eq!(store.metrics().nb_max_shots, 3);
    }

    #[test]
    fn resolver_returning_another_segment_is_a_failure() {
        let mut store = store_with(vec![
            Segment::new(1, SegmentCategory::Video, 0, 0.0, 1000.0),
            Segment::new(2, SegmentCategory::Video, 0, 1000.0, 2000.0),
        ]);
        let (ticket, _) = store.begin_resolution(1).expect("segment is loaded");
        let other = store.segment(2).cloned().expect("segment is loaded");
        assert_eq!(
            store.complete_resolution(ticket, Ok(other)),
            ResolutionOutcome::Failed(ResolveError::Mismatch {
                requested: 1,
                returned: 2
            })
        );
        assert!(store.begin_resolution(42).is_none());
    }

    #[test]
    fn async_resolution_applies_through_refcell() {
        let store = RefCell::new(store_with(vec![Segment::new(
            1,
            SegmentCategory::Storyboard,
            0,
            0.0,
            1000.0,
        )]));
        let resolver = |mut segment: Segment| async move {
            segment.asset_url = format!("storyboard-{}.png", segment.id);
            Ok(segment)
        };
        let outcome = futures::executor::block_on(resolve_segment(&store, &resolver, 1));
        assert_eq!(outcome, Some(ResolutionOutcome::Applied));
        assert_eq!(
            store.borrow().segment(1).map(|s| s.asset_url.clone()),
            Some("storyboard-1.png".to_string())
        );
    }
}
