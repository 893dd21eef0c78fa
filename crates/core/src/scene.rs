//! Scene assembly.
//!
//! Produces the declarative scene for one frame, in container pixels:
//!
//! ```text
//! grid         content, scrolled both ways           z 0
//! time-scale   top ruler, scrolled horizontally      z 2
//! track-scale  left bar, scrolled vertically         z 3
//! corner       covers the ruler/bar overlap          z 4
//! cursor       sticky, drawn over the ruler          z 5
//! ```

use timeline_grid_protocol::{Point, Rect, RenderCommand, TextAlign, ThemeToken};

use crate::cursor::{cursor_lines, time_scale_commands};
use crate::grid::{GridGeometry, GridLine};
use crate::model::SegmentCategory;
use crate::store::TimelineStore;

pub const GRID_GROUP: &str = "grid";
pub const TIME_SCALE_GROUP: &str = "time-scale";
pub const TRACK_SCALE_GROUP: &str = "track-scale";
pub const CORNER_GROUP: &str = "corner";
pub const CURSOR_GROUP: &str = "cursor";

const CELL_LABEL_FONT_SIZE: f64 = 11.0;
const CELL_LABEL_PADDING: f64 = 4.0;
const TRACK_LABEL_FONT_SIZE: f64 = 12.0;
const TRACK_LABEL_PADDING: f64 = 8.0;

pub fn cell_token(category: SegmentCategory) -> ThemeToken {
    match category {
        SegmentCategory::Storyboard => ThemeToken::CellStoryboard,
        SegmentCategory::Video => ThemeToken::CellVideo,
        SegmentCategory::Sound | SegmentCategory::Music => ThemeToken::CellAudio,
        _ => ThemeToken::CellText,
    }
}

fn lines(commands: &mut Vec<RenderCommand>, geometry: &[GridLine], color: ThemeToken) {
    commands.extend(geometry.iter().map(|l| RenderCommand::DrawLine {
        from: l.from,
        to: l.to,
        color,
        width: 1.0,
        opacity: 1.0,
    }));
}

fn begin(commands: &mut Vec<RenderCommand>, id: &str, translate: Point, z: f64) {
    commands.push(RenderCommand::BeginGroup {
        id: id.into(),
        translate,
        z,
        visible: true,
    });
}

pub fn build_scene(store: &TimelineStore, grid: &GridGeometry) -> Vec<RenderCommand> {
    let config = store.config();
    let metrics = store.metrics();
    let viewport = store.viewport();
    let (left, top) = (config.left_bar_width, config.top_bar_height);

    let mut commands = Vec::with_capacity(
        grid.horizontal.len() + grid.vertical.len() + grid.graduations.len() * 2 + 64,
    );

    // Grid and cells.
    begin(
        &mut commands,
        GRID_GROUP,
        Point::new(left - viewport.scroll_x, top - viewport.scroll_y),
        0.0,
    );
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, 0.0, metrics.content_width, metrics.content_height),
        color: ThemeToken::Background,
        hue: None,
        border_color: None,
        opacity: 1.0,
        segment_id: None,
    });
    lines(&mut commands, &grid.vertical, ThemeToken::GridLine);
    lines(&mut commands, &grid.horizontal, ThemeToken::TrackSeparator);

    let step = config.duration_in_ms_per_step;
    for segment in store.visible_segments() {
        let cell = metrics.cell_geometry(segment, step, viewport.current_zoom_level);
        let hovered = store.hovered_segment() == Some(segment.id);
        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(cell.x, cell.y, cell.width, cell.height),
            color: cell_token(segment.category),
            hue: Some(segment.category.hue()),
            border_color: hovered.then_some(ThemeToken::CellHoverBorder),
            opacity: 1.0,
            segment_id: Some(segment.id),
        });
        if !viewport.is_resizing && !segment.label.is_empty() {
            commands.push(RenderCommand::DrawText {
                position: Point::new(cell.x + CELL_LABEL_PADDING, cell.y + cell.height / 2.0),
                text: segment.label.clone(),
                color: ThemeToken::CellLabel,
                font_size: CELL_LABEL_FONT_SIZE,
                align: TextAlign::Left,
            });
        }
    }
    commands.push(RenderCommand::EndGroup);

    // Time ruler.
    begin(
        &mut commands,
        TIME_SCALE_GROUP,
        Point::new(left - viewport.scroll_x, top),
        2.0,
    );
    commands.extend(time_scale_commands(store, &grid.graduations));
    commands.push(RenderCommand::EndGroup);

    // Track bar.
    begin(
        &mut commands,
        TRACK_SCALE_GROUP,
        Point::new(0.0, top - viewport.scroll_y),
        3.0,
    );
    let mut y = 0.0;
    for track in &metrics.tracks {
        if !track.visible {
            // Collapsed tracks keep a marker so they can be found again.
            commands.push(RenderCommand::DrawLine {
                from: Point::new(0.0, y),
                to: Point::new(left, y),
                color: ThemeToken::TrackScaleHidden,
                width: 2.0,
                opacity: 1.0,
            });
            continue;
        }
        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(0.0, y, left, track.height),
            color: ThemeToken::TrackScaleBackground,
            hue: track.occupied.then_some(track.hue),
            border_color: Some(ThemeToken::TrackSeparator),
            opacity: 1.0,
            segment_id: None,
        });
        let name = if track.name.is_empty() {
            format!("Track {}", track.id + 1)
        } else {
            track.name.clone()
        };
        commands.push(RenderCommand::DrawText {
            position: Point::new(TRACK_LABEL_PADDING, y + track.height / 2.0),
            text: name,
            color: ThemeToken::TrackScaleText,
            font_size: TRACK_LABEL_FONT_SIZE,
            align: TextAlign::Left,
        });
        y += track.height;
    }
    commands.push(RenderCommand::EndGroup);

    begin(&mut commands, CORNER_GROUP, Point::default(), 4.0);
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(0.0, 0.0, left, top),
        color: ThemeToken::TimeScaleBackground,
        hue: None,
        border_color: None,
        opacity: 1.0,
        segment_id: None,
    });
    commands.push(RenderCommand::EndGroup);

    // Cursor.
    let cursor_x = store
        .time_scale()
        .time_to_pixel(viewport.cursor_timestamp_at_in_ms, viewport.scroll_x);
    let height = top + (metrics.content_height - viewport.scroll_y).max(0.0);
    commands.push(RenderCommand::BeginGroup {
        id: CURSOR_GROUP.into(),
        translate: Point::new(left + cursor_x, 0.0),
        z: 5.0,
        visible: cursor_x >= 0.0 && cursor_x <= store.grid_viewport_size().width,
    });
    lines(&mut commands, &cursor_lines(height), ThemeToken::Cursor);
    commands.push(RenderCommand::EndGroup);

    commands
}
