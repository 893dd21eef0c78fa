//! Time scale, playback cursor and the time ruler.
//!
//! Pixel positions handed to this module are relative to the grid viewport
//! (the container minus the left track bar); the camera offset is the
//! store's `scroll_x`.

use timeline_grid_protocol::{Point, Rect, RenderCommand, TextAlign, ThemeToken};

use crate::config::TimelineConfig;
use crate::grid::{Graduation, GridLine};
use crate::store::TimelineStore;

const MAJOR_LABEL_FONT_SIZE: f64 = 12.0;
const MINOR_LABEL_FONT_SIZE: f64 = 10.0;
const MAJOR_GRADUATION_HEIGHT: f64 = 12.0;
const MINOR_GRADUATION_HEIGHT: f64 = 6.0;
const MINOR_GRADUATION_OPACITY: f32 = 0.7777;
const LABEL_Y_FROM_TOP: f64 = 16.0;
const CURSOR_LINE_COUNT: usize = 3;

/// Linear mapping between timeline pixels and milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    pub cell_width: f64,
    pub duration_in_ms_per_step: f64,
}

impl TimeScale {
    pub fn new(cell_width: f64, duration_in_ms_per_step: f64) -> Self {
        Self {
            cell_width,
            duration_in_ms_per_step,
        }
    }

    pub fn px_per_ms(&self) -> f64 {
        self.cell_width / self.duration_in_ms_per_step
    }

    pub fn pixel_to_time(&self, pixel_x: f64, camera_offset_x: f64) -> f64 {
        (pixel_x + camera_offset_x) / self.cell_width * self.duration_in_ms_per_step
    }

    pub fn time_to_pixel(&self, timestamp_in_ms: f64, camera_offset_x: f64) -> f64 {
        timestamp_in_ms / self.duration_in_ms_per_step * self.cell_width - camera_offset_x
    }
}

/// Which ruler ticks get a text label at a given cell width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickLabelDensity {
    All,
    MajorOnly,
    None,
}

impl TickLabelDensity {
    pub fn for_cell_width(cell_width: f64, config: &TimelineConfig) -> Self {
        if cell_width > config.full_labels_min_cell_width {
            Self::All
        } else if cell_width > config.major_labels_min_cell_width {
            Self::MajorOnly
        } else {
            Self::None
        }
    }

    /// Tick 0 is never labeled.
    pub fn is_labeled(self, index: usize, major_tick_unit: usize) -> bool {
        if index == 0 {
            return false;
        }
        match self {
            Self::All => true,
            Self::MajorOnly => index % major_tick_unit == 0,
            Self::None => false,
        }
    }
}

/// Ruler label for a tick: minutes on major ticks, milliseconds when the
/// cells are wide enough.
pub fn format_tick_label(timestamp_in_ms: f64, with_minutes: bool, with_milliseconds: bool) -> String {
    let total_ms = timestamp_in_ms.max(0.0).round() as u64;
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    let mut label = if with_minutes {
        format!("{minutes:02}:{seconds:02}")
    } else {
        // Without a minutes field the seconds keep counting past 59.
        format!("{:02}", total_ms / 1000)
    };
    if with_milliseconds {
        label.push_str(&format!(".{millis:03}"));
    }
    if !with_minutes {
        label.push('s');
    }
    label
}

/// Drag-to-scrub on the time ruler.
///
/// Pressing pauses playback and remembers whether it was running; releasing
/// (on the ruler, or anywhere once all buttons are up) restores it. Every
/// handler is a no-op on an empty project.
#[derive(Debug, Default)]
pub struct CursorDrag {
    was_playing: Option<bool>,
}

impl CursorDrag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, store: &TimelineStore) -> bool {
        store.viewport().is_dragging_cursor
    }

    pub fn pointer_down(&mut self, store: &mut TimelineStore, pixel_x: f64) -> bool {
        if store.is_empty() {
            return false;
        }
        store.batch(|store| {
            self.was_playing = Some(store.toggle_playback(Some(false)));
            seek(store, pixel_x);
            store.set_is_dragging_cursor(true);
        });
        true
    }

    /// Pointer move over the ruler itself, `pressed` when a button or pen
    /// pressure is down.
    pub fn pointer_move(&mut self, store: &mut TimelineStore, pixel_x: f64, pressed: bool) -> bool {
        if store.is_empty() || !pressed {
            return false;
        }
        seek(store, pixel_x);
        true
    }

    /// Pointer move anywhere in the window while a drag is active. A move
    /// with no button held means the button was released outside the widget.
    pub fn window_pointer_move(&mut self, store: &mut TimelineStore, pixel_x: f64, buttons: u8) -> bool {
        if store.is_empty() || !store.viewport().is_dragging_cursor {
            return false;
        }
        if buttons != 0 {
            seek(store, pixel_x);
        } else {
            self.end(store);
        }
        true
    }

    pub fn pointer_up(&mut self, store: &mut TimelineStore) -> bool {
        if store.is_empty() {
            return false;
        }
        self.end(store);
        true
    }

    fn end(&mut self, store: &mut TimelineStore) {
        store.batch(|store| {
            store.set_is_dragging_cursor(false);
            if self.was_playing.take() == Some(true) {
                store.toggle_playback(Some(true));
            }
        });
    }
}

fn seek(store: &mut TimelineStore, pixel_x: f64) {
    let timestamp = store
        .time_scale()
        .pixel_to_time(pixel_x, store.viewport().scroll_x);
    store.jump_at(timestamp);
}

/// Ruler commands in content space: the bar occupies
/// `[-top_bar_height, 0)` vertically. Only graduations near the visible
/// range are emitted.
pub fn time_scale_commands(store: &TimelineStore, graduations: &[Graduation]) -> Vec<RenderCommand> {
    let config = store.config();
    let metrics = store.metrics();
    let viewport = store.viewport();
    let top = -config.top_bar_height;
    let cell_width = metrics.cell_width;

    let visible_from = viewport.scroll_x - cell_width;
    let visible_to = viewport.scroll_x + store.grid_viewport_size().width + cell_width;

    let mut commands = Vec::with_capacity(graduations.len() * 2 + 1);
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, top, metrics.content_width, config.top_bar_height),
        color: ThemeToken::TimeScaleBackground,
        hue: None,
        border_color: None,
        opacity: if store.is_empty() { 0.5 } else { 1.0 },
        segment_id: None,
    });

    let in_view = || {
        graduations
            .iter()
            .filter(move |g| g.x >= visible_from && g.x <= visible_to)
    };

    for g in in_view() {
        let height = if g.major {
            MAJOR_GRADUATION_HEIGHT
        } else {
            MINOR_GRADUATION_HEIGHT
        };
        commands.push(RenderCommand::DrawLine {
            from: Point::new(g.x, -height),
            to: Point::new(g.x, 0.0),
            color: ThemeToken::TimeScaleLine,
            width: 1.0,
            opacity: if g.major { 1.0 } else { MINOR_GRADUATION_OPACITY },
        });
    }

    if viewport.is_resizing {
        return commands;
    }

    let density = TickLabelDensity::for_cell_width(cell_width, config);
    let with_milliseconds = cell_width > config.milliseconds_min_cell_width;
    for g in in_view().filter(|g| g.x < metrics.content_width) {
        if !density.is_labeled(g.index, config.major_tick_unit) {
            continue;
        }
        let timestamp = g.index as f64 * config.duration_in_ms_per_step;
        commands.push(RenderCommand::DrawText {
            position: Point::new(g.x, top + LABEL_Y_FROM_TOP),
            text: format_tick_label(timestamp, g.major, with_milliseconds),
            color: ThemeToken::TimeScaleText,
            font_size: if g.major {
                MAJOR_LABEL_FONT_SIZE
            } else {
                MINOR_LABEL_FONT_SIZE
            },
            align: TextAlign::Center,
        });
    }
    commands
}

/// The cursor's vertical lines, relative to the cursor position: one pixel
/// apart, `height` tall.
pub fn cursor_lines(height: f64) -> Vec<GridLine> {
    (0..CURSOR_LINE_COUNT)
        .map(|i| GridLine {
            from: Point::new(i as f64, 0.0),
            to: Point::new(i as f64, height),
        })
        .collect()
}
