use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use timeline_grid_protocol::{Point, Rect, RenderCommand, Size};

use crate::config::TimelineConfig;
use crate::cursor::CursorDrag;
use crate::grid::GridCache;
use crate::listeners::{ListenerGuard, WindowEvents, WindowPointerEvent};
use crate::model::SegmentId;
use crate::scene::build_scene;
use crate::store::{TimelineStore, WheelInput};

/// Pointer and container input, positions in container pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Resize(Size),
    Wheel {
        position: Point,
        delta_x: f64,
        delta_y: f64,
        /// Zoom modifier held.
        zoom: bool,
    },
    PointerDown {
        position: Point,
    },
    PointerMove {
        position: Point,
        buttons: u8,
    },
    PointerUp {
        position: Point,
    },
    PointerLeave,
}

/// Area of the widget a position falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Corner,
    TimeScale,
    TrackScale,
    Grid,
}

/// The embeddable timeline: store, cursor drag, grid cache and the window
/// listener that keeps a drag alive outside the widget.
#[derive(Debug)]
pub struct Timeline {
    store: TimelineStore,
    cursor: CursorDrag,
    grid: GridCache,
    window_listener: Option<ListenerGuard>,
}

impl Timeline {
    pub fn new(config: TimelineConfig) -> Self {
        Self::with_store(TimelineStore::new(config))
    }

    pub fn with_store(store: TimelineStore) -> Self {
        Self {
            grid: GridCache::new(store.config()),
            cursor: CursorDrag::new(),
            window_listener: None,
            store,
        }
    }

    pub fn store(&self) -> &TimelineStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TimelineStore {
        &mut self.store
    }

    pub fn grid(&self) -> &GridCache {
        &self.grid
    }

    /// Register the window-level pointer listener. It holds the timeline
    /// weakly and is removed when the timeline (or its guard) is dropped.
    pub fn attach_window(this: &Rc<RefCell<Self>>, window: &WindowEvents) -> bool {
        let weak = Rc::downgrade(this);
        let guard = window.listen(move |event| {
            let Some(timeline) = weak.upgrade() else {
                return;
            };
            if let Ok(mut timeline) = timeline.try_borrow_mut() {
                timeline.on_window_pointer_move(event);
            }
        });
        match this.try_borrow_mut() {
            Ok(mut timeline) => {
                timeline.window_listener = Some(guard);
                true
            }
            Err(_) => false,
        }
    }

    pub fn detach_window(&mut self) {
        self.window_listener = None;
    }

    pub fn is_attached(&self) -> bool {
        self.window_listener.is_some()
    }

    pub fn region_at(&self, position: Point) -> Region {
        let config = self.store.config();
        let in_left = position.x < config.left_bar_width;
        let in_top = position.y < config.top_bar_height;
        match (in_left, in_top) {
            (true, true) => Region::Corner,
            (false, true) => Region::TimeScale,
            (true, false) => Region::TrackScale,
            (false, false) => Region::Grid,
        }
    }

    /// Container position to content position.
    fn to_content(&self, position: Point) -> Point {
        let config = self.store.config();
        let viewport = self.store.viewport();
        Point::new(
            position.x - config.left_bar_width + viewport.scroll_x,
            position.y - config.top_bar_height + viewport.scroll_y,
        )
    }

    fn grid_x(&self, position: Point) -> f64 {
        position.x - self.store.config().left_bar_width
    }

    /// On-screen segment under a container position.
    pub fn segment_at(&self, position: Point) -> Option<SegmentId> {
        if self.region_at(position) != Region::Grid {
            return None;
        }
        let p = self.to_content(position);
        let metrics = self.store.metrics();
        let step = self.store.config().duration_in_ms_per_step;
        let zoom = self.store.viewport().current_zoom_level;
        self.store
            .visible_segments()
            .find(|s| {
                let cell = metrics.cell_geometry(s, step, zoom);
                Rect::new(cell.x, cell.y, cell.width, cell.height).contains(p)
            })
            .map(|s| s.id)
    }

    /// Visible track row under a container position.
    pub fn track_at(&self, position: Point) -> Option<usize> {
        let y = self.to_content(position).y;
        let mut top = 0.0;
        for track in self.store.tracks().iter().filter(|t| t.visible) {
            if y >= top && y < top + track.height {
                return Some(track.id);
            }
            top += track.height;
        }
        None
    }

    /// Route one input event. Returns whether the event was consumed.
    pub fn handle(&mut self, event: InputEvent, now: Instant) -> bool {
        log::trace!("input {event:?}");
        match event {
            InputEvent::Resize(size) => {
                self.store.set_container_size(size, now);
                true
            }
            InputEvent::Wheel {
                position,
                delta_x,
                delta_y,
                zoom,
            } => {
                self.store.handle_mouse_wheel(WheelInput {
                    delta_x,
                    delta_y,
                    pointer_x: self.grid_x(position),
                    zoom,
                });
                true
            }
            InputEvent::PointerDown { position } => match self.region_at(position) {
                Region::TimeScale => {
                    let x = self.grid_x(position);
                    self.cursor.pointer_down(&mut self.store, x)
                }
                Region::TrackScale => self
                    .track_at(position)
                    .is_some_and(|track| self.store.toggle_track_visibility(track)),
                Region::Grid => {
                    let hit = self.segment_at(position);
                    self.store.set_hovered_segment(hit);
                    hit.is_some()
                }
                Region::Corner => false,
            },
            InputEvent::PointerMove { position, buttons } => {
                if self.cursor.is_active(&self.store) {
                    let x = self.grid_x(position);
                    return self.cursor.pointer_move(&mut self.store, x, buttons != 0);
                }
                let hit = self.segment_at(position);
                self.store.set_hovered_segment(hit);
                hit.is_some()
            }
            InputEvent::PointerUp { .. } => {
                self.cursor.is_active(&self.store) && self.cursor.pointer_up(&mut self.store)
            }
            InputEvent::PointerLeave => {
                self.store.set_hovered_segment(None);
                false
            }
        }
    }

    pub fn on_window_pointer_move(&mut self, event: &WindowPointerEvent) {
        let x = self.grid_x(Point::new(event.x, event.y));
        self.cursor
            .window_pointer_move(&mut self.store, x, event.buttons);
    }

    /// Per-frame work. Returns whether the scene should be redrawn.
    pub fn tick(&mut self, now: Instant) -> bool {
        let moved = self.store.tick(now);
        let regenerated = self.grid.sync(&self.store, now);
        moved || regenerated
    }

    pub fn scene(&self) -> Vec<RenderCommand> {
        build_scene(&self.store, self.grid.geometry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectSnapshot, Segment, SegmentCategory};

    fn timeline() -> Timeline {
        let mut timeline = Timeline::new(TimelineConfig::default());
        let now = Instant::now();
        timeline.handle(InputEvent::Resize(Size::new(1100.0, 600.0)), now);
        timeline.store_mut().set_project(ProjectSnapshot::from_segments(vec![
            Segment::new(1, SegmentCategory::Storyboard, 0, 0.0, 4000.0),
            Segment::new(2, SegmentCategory::Dialogue, 1, 1000.0, 3000.0),
        ]));
        timeline.tick(now);
        timeline
    }

    #[test]
    fn regions_follow_the_bars() {
        let t = timeline();
        assert_eq!(t.region_at(Point::new(10.0, 10.0)), Region::Corner);
        assert_eq!(t.region_at(Point::new(300.0, 10.0)), Region::TimeScale);
        assert_eq!(t.region_at(Point::new(10.0, 300.0)), Region::TrackScale);
        assert_eq!(t.region_at(Point::new(300.0, 300.0)), Region::Grid);
    }

    #[test]
    fn hover_hit_tests_cells() {
        let mut t = timeline();
        let now = Instant::now();
        // Track 0 is a 120px preview track; the dialogue cell sits below it.
        let over_dialogue = Point::new(100.0 + 30.0, 40.0 + 130.0);
        assert!(t.handle(
            InputEvent::PointerMove {
                position: over_dialogue,
                buttons: 0
            },
            now
        ));
        assert_eq!(t.store().hovered_segment(), Some(2));

        t.handle(InputEvent::PointerLeave, now);
        assert_eq!(t.store().hovered_segment(), None);
    }

    #[test]
    fn clicking_track_bar_toggles_visibility() {
        let mut t = timeline();
        let height = t.store().metrics().content_height;
        assert!(t.handle(
            InputEvent::PointerDown {
                position: Point::new(20.0, 40.0 + 10.0)
            },
            Instant::now()
        ));
        assert!(!t.store().tracks()[0].visible);
        assert!(t.store().metrics().content_height < height);
    }

    #[test]
    fn ruler_drag_moves_cursor_through_window_listener() {
        let timeline = Rc::new(RefCell::new(timeline()));
        let window = WindowEvents::new();
        assert!(Timeline::attach_window(&timeline, &window));
        let now = Instant::now();

        timeline.borrow_mut().handle(
            InputEvent::PointerDown {
                position: Point::new(100.0 + 24.0, 20.0),
            },
            now,
        );
        assert!(timeline.borrow().store().viewport().is_dragging_cursor);

        window.dispatch(&WindowPointerEvent {
            x: 100.0 + 72.0,
            y: 500.0,
            buttons: 1,
        });
        let t = timeline.borrow().store().viewport().cursor_timestamp_at_in_ms;
        assert!((t - 3000.0).abs() < 1e-9);

        window.dispatch(&WindowPointerEvent {
            x: 0.0,
            y: 0.0,
            buttons: 0,
        });
        assert!(!timeline.borrow().store().viewport().is_dragging_cursor);
    }

    #[test]
    fn dropping_the_timeline_removes_its_window_listener() {
        let window = WindowEvents::new();
        let timeline = Rc::new(RefCell::new(timeline()));
        Timeline::attach_window(&timeline, &window);
        assert_eq!(window.listener_count(), 1);
        drop(timeline);
        assert_eq!(window.listener_count(), 0);
    }

    #[test]
    fn detaching_stops_window_events() {
        let window = WindowEvents::new();
        let timeline = Rc::new(RefCell::new(timeline()));
        assert!(!timeline.borrow().is_attached());
        assert!(Timeline::attach_window(&timeline, &window));
        assert!(timeline.borrow().is_attached());

        timeline.borrow_mut().detach_window();
        assert!(!timeline.borrow().is_attached());
        assert_eq!(window.listener_count(), 0);
        window.dispatch(&WindowPointerEvent {
            x: 0.0,
            y: 0.0,
            buttons: 0,
        });
    }

    #[test]
    fn wheel_with_modifier_zooms_about_pointer() {
        let mut t = timeline();
        let now = Instant::now();
        let zoom = t.store().viewport().horizontal_zoom_level;
        t.handle(
            InputEvent::Wheel {
                position: Point::new(600.0, 300.0),
                delta_x: 0.0,
                delta_y: -20.0,
                zoom: true,
            },
            now,
        );
        assert!(t.store().viewport().horizontal_zoom_level > zoom);
        assert!(t.grid().is_stale(t.store()));
    }
}
