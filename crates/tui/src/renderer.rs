use std::cell::RefCell;
use std::io::stdout;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    cursor::Show,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Paragraph},
};
use timeline_grid_core::{
    InputEvent, ResolutionOutcome, ResolutionTicket, Segment, SegmentVisibility, Timeline,
    WindowEvents, WindowPointerEvent, cursor::format_tick_label,
};
use timeline_grid_protocol::{Point, RenderCommand, Size, ThemeToken};

/// Timeline pixels per terminal column and row.
const PX_PER_COL: f64 = 8.0;
const PX_PER_ROW: f64 = 12.0;
/// Wheel notch, in timeline pixels.
const WHEEL_STEP_PX: f64 = 24.0;
const KEY_ZOOM_FACTOR: f64 = 1.25;
const FRAME: Duration = Duration::from_millis(33);

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::Background => Color::Black,
        ThemeToken::GridLine => Color::Rgb(40, 40, 40),
        ThemeToken::TrackSeparator => Color::DarkGray,
        ThemeToken::CellStoryboard => Color::Rgb(60, 100, 160),
        ThemeToken::CellVideo => Color::Rgb(50, 130, 150),
        ThemeToken::CellAudio => Color::Rgb(90, 140, 60),
        ThemeToken::CellText => Color::Rgb(110, 90, 70),
        ThemeToken::CellHoverBorder => Color::LightYellow,
        ThemeToken::CellLabel => Color::White,
        ThemeToken::TimeScaleBackground => Color::Rgb(25, 25, 30),
        ThemeToken::TimeScaleLine => Color::Gray,
        ThemeToken::TimeScaleText => Color::White,
        ThemeToken::TrackScaleBackground => Color::Rgb(30, 30, 35),
        ThemeToken::TrackScaleText => Color::Gray,
        ThemeToken::TrackScaleHidden => Color::Red,
        ThemeToken::Cursor => Color::White,
    }
}

fn fill_color(token: ThemeToken, hue: Option<f64>) -> Color {
    match hue {
        Some(hue) => {
            let c = timeline_grid_protocol::Color::from_hsl(hue, 0.45, 0.3);
            Color::Rgb(
                (c.r * 255.0) as u8,
                (c.g * 255.0) as u8,
                (c.b * 255.0) as u8,
            )
        }
        None => theme_to_color(token),
    }
}

/// Paints a command list into a buffer region, keeping the group transform
/// and visibility stacks.
struct Painter<'a> {
    buf: &'a mut Buffer,
    area: Rect,
    offsets: Vec<Point>,
    hidden_depth: usize,
}

impl<'a> Painter<'a> {
    fn new(buf: &'a mut Buffer, area: Rect) -> Self {
        Self {
            buf,
            area,
            offsets: vec![Point::default()],
            hidden_depth: 0,
        }
    }

    fn offset(&self) -> Point {
        self.offsets.last().copied().unwrap_or_default()
    }

    fn cell(&mut self, x: f64, y: f64) -> Option<&mut ratatui::buffer::Cell> {
        let col = (x / PX_PER_COL).floor();
        let row = (y / PX_PER_ROW).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as u16, row as u16);
        if col >= self.area.width || row >= self.area.height {
            return None;
        }
        Some(&mut self.buf[(self.area.x + col, self.area.y + row)])
    }

    fn paint(&mut self, commands: &[RenderCommand]) {
        for cmd in commands {
            match cmd {
                RenderCommand::BeginGroup {
                    translate, visible, ..
                } => {
                    let base = self.offset();
                    self.offsets
                        .push(Point::new(base.x + translate.x, base.y + translate.y));
                    if !visible || self.hidden_depth > 0 {
                        self.hidden_depth += 1;
                    }
                }
                RenderCommand::EndGroup => {
                    if self.offsets.len() > 1 {
                        self.offsets.pop();
                    }
                    self.hidden_depth = self.hidden_depth.saturating_sub(1);
                }
                _ if self.hidden_depth > 0 => {}
                RenderCommand::DrawRect {
                    rect,
                    color,
                    hue,
                    border_color,
                    ..
                } => {
                    let o = self.offset();
                    let bg = fill_color(*color, *hue);
                    let border = border_color.map(theme_to_color);
                    let mut y = rect.y;
                    while y < rect.bottom() {
                        let mut x = rect.x;
                        while x < rect.right() {
                            let edge = x == rect.x || x + PX_PER_COL >= rect.right();
                            if let Some(cell) = self.cell(o.x + x, o.y + y) {
                                cell.set_char(' ').set_bg(bg);
                                if let (Some(border), true) = (border, edge) {
                                    cell.set_char('▌').set_fg(border);
                                }
                            }
                            x += PX_PER_COL;
                        }
                        y += PX_PER_ROW;
                    }
                }
                RenderCommand::DrawLine {
                    from, to, color, ..
                } => {
                    let o = self.offset();
                    let fg = theme_to_color(*color);
                    if (from.x - to.x).abs() < f64::EPSILON {
                        let (top, bottom) = (from.y.min(to.y), from.y.max(to.y));
                        let mut y = top;
                        while y < bottom {
                            if let Some(cell) = self.cell(o.x + from.x, o.y + y) {
                                cell.set_char('│').set_fg(fg);
                            }
                            y += PX_PER_ROW;
                        }
                    } else {
                        let (left, right) = (from.x.min(to.x), from.x.max(to.x));
                        let mut x = left;
                        while x < right {
                            if let Some(cell) = self.cell(o.x + x, o.y + from.y) {
                                cell.set_char('─').set_fg(fg);
                            }
                            x += PX_PER_COL;
                        }
                    }
                }
                RenderCommand::DrawText {
                    position,
                    text,
                    color,
                    ..
                } => {
                    let o = self.offset();
                    let fg = theme_to_color(*color);
                    for (i, ch) in text.chars().enumerate() {
                        let x = o.x + position.x + i as f64 * PX_PER_COL;
                        if let Some(cell) = self.cell(x, o.y + position.y) {
                            cell.set_char(ch).set_fg(fg);
                        }
                    }
                }
            }
        }
    }
}

/// Terminal position to container pixels, relative to the content area.
fn to_container(col: u16, row: u16, area: Rect) -> Point {
    Point::new(
        (f64::from(col.saturating_sub(area.x)) + 0.5) * PX_PER_COL,
        (f64::from(row.saturating_sub(area.y)) + 0.5) * PX_PER_ROW,
    )
}

fn mouse_input(mouse: MouseEvent, area: Rect) -> Option<(InputEvent, Option<u8>)> {
    let position = to_container(mouse.column, mouse.row, area);
    let zoom = mouse.modifiers.contains(KeyModifiers::CONTROL);
    let wheel = |delta_x: f64, delta_y: f64| InputEvent::Wheel {
        position,
        delta_x,
        delta_y,
        zoom,
    };
    let event = match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => (InputEvent::PointerDown { position }, None),
        MouseEventKind::Drag(MouseButton::Left) => (
            InputEvent::PointerMove {
                position,
                buttons: 1,
            },
            Some(1),
        ),
        MouseEventKind::Up(MouseButton::Left) => (InputEvent::PointerUp { position }, Some(0)),
        MouseEventKind::Moved => (
            InputEvent::PointerMove {
                position,
                buttons: 0,
            },
            Some(0),
        ),
        MouseEventKind::ScrollDown => (wheel(0.0, WHEEL_STEP_PX), None),
        MouseEventKind::ScrollUp => (wheel(0.0, -WHEEL_STEP_PX), None),
        MouseEventKind::ScrollRight => (wheel(WHEEL_STEP_PX, 0.0), None),
        MouseEventKind::ScrollLeft => (wheel(-WHEEL_STEP_PX, 0.0), None),
        _ => return None,
    };
    Some(event)
}

/// Stand-in for a real asset backend: resolutions requested on one frame
/// complete on the next.
#[derive(Default)]
struct DemoResolver {
    in_flight: Vec<(ResolutionTicket, Segment)>,
    resolved: usize,
}

impl DemoResolver {
    fn step(&mut self, timeline: &mut Timeline) {
        let store = timeline.store_mut();
        for (ticket, mut segment) in std::mem::take(&mut self.in_flight) {
            segment.asset_url = format!("demo://{}/{}", segment.category.label(), segment.id);
            let outcome = store.complete_resolution(ticket, Ok(segment));
            if outcome == ResolutionOutcome::Applied {
                self.resolved += 1;
            }
        }
        for id in store.next_resolutions() {
            if let Some(request) = store.begin_resolution(id) {
                self.in_flight.push(request);
            }
        }
    }
}

fn status_line(timeline: &Timeline, resolver: &DemoResolver) -> String {
    let store = timeline.store();
    let classification = store.classification();
    let viewport = store.viewport();
    format!(
        " {} segments | visible {} buffered {} demanded {} | resolved {} | zoom {:.0} | {} {} | ←→↑↓ scroll  +/- zoom  1-9 tracks  space play  q quit ",
        store.segments().len(),
        classification.count(SegmentVisibility::Visible),
        classification.count(SegmentVisibility::Buffered),
        classification.count(SegmentVisibility::Demanded),
        resolver.resolved,
        viewport.horizontal_zoom_level,
        if store.is_playing() { "▶" } else { "❚❚" },
        format_tick_label(viewport.cursor_timestamp_at_in_ms, true, true),
    )
}

/// Returns `false` when the user asked to quit.
fn handle_key(timeline: &mut Timeline, code: KeyCode) -> bool {
    let store = timeline.store_mut();
    let cell_width = store.cell_width();
    let pivot = store.grid_viewport_size().width / 2.0;
    let zoom = store.viewport().horizontal_zoom_level;
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Left => store.scroll_by(-cell_width * 4.0, 0.0),
        KeyCode::Right => store.scroll_by(cell_width * 4.0, 0.0),
        KeyCode::Up => store.scroll_by(0.0, -PX_PER_ROW * 2.0),
        KeyCode::Down => store.scroll_by(0.0, PX_PER_ROW * 2.0),
        KeyCode::Char('+' | '=') => store.zoom_about(pivot, zoom * KEY_ZOOM_FACTOR),
        KeyCode::Char('-') => store.zoom_about(pivot, zoom / KEY_ZOOM_FACTOR),
        KeyCode::Char(' ') => {
            store.toggle_playback(None);
        }
        KeyCode::Home => store.jump_at(0.0),
        KeyCode::Char(c @ '1'..='9') => {
            let track = c as usize - '1' as usize;
            store.toggle_track_visibility(track);
        }
        _ => {}
    }
    true
}

/// Runs its closure when dropped, so the terminal is restored on every exit
/// path, `?` included.
struct OnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}

fn restore_terminal() {
    if let Err(err) = disable_raw_mode() {
        log::warn!("leaving raw mode: {err}");
    }
    if let Err(err) = execute!(stdout(), LeaveAlternateScreen, DisableMouseCapture, Show) {
        log::warn!("restoring terminal: {err}");
    }
}

pub fn render_tui(timeline: Timeline) -> Result<()> {
    enable_raw_mode()?;
    let _restore = OnDrop(restore_terminal);
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let timeline = Rc::new(RefCell::new(timeline));
    let window = WindowEvents::new();
    Timeline::attach_window(&timeline, &window);

    let mut resolver = DemoResolver::default();
    let mut last_frame = Instant::now();
    let mut content_area = Rect::default();

    loop {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(last_frame).as_secs_f64() * 1000.0;
        last_frame = now;

        let term_size = terminal.size()?;
        let area = Rect::new(0, 1, term_size.width, term_size.height.saturating_sub(1));
        {
            let mut t = timeline.borrow_mut();
            if area != content_area {
                content_area = area;
                let size = Size::new(
                    f64::from(area.width) * PX_PER_COL,
                    f64::from(area.height) * PX_PER_ROW,
                );
                t.handle(InputEvent::Resize(size), now);
            }
            let store = t.store_mut();
            if store.is_playing() && !store.viewport().is_dragging_cursor {
                let at = store.viewport().cursor_timestamp_at_in_ms + elapsed_ms;
                store.jump_at(at);
            }
            resolver.step(&mut t);
            t.tick(now);
        }

        let (scene, status) = {
            let t = timeline.borrow();
            (t.scene(), status_line(&t, &resolver))
        };

        terminal.draw(|frame| {
            let full = frame.area();
            let header = Paragraph::new(status)
                .block(Block::default())
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, Rect::new(0, 0, full.width, 1));

            let buf = frame.buffer_mut();
            Painter::new(buf, content_area).paint(&scene);
        })?;

        if !event::poll(FRAME)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if !handle_key(&mut timeline.borrow_mut(), key.code) {
                    break;
                }
            }
            Event::Mouse(mouse) => {
                let Some((input, window_buttons)) = mouse_input(mouse, content_area) else {
                    continue;
                };
                timeline.borrow_mut().handle(input, Instant::now());
                if let Some(buttons) = window_buttons {
                    let p = to_container(mouse.column, mouse.row, content_area);
                    window.dispatch(&WindowPointerEvent {
                        x: p.x,
                        y: p.y,
                        buttons,
                    });
                }
            }
            _ => {}
        }
    }

    timeline.borrow_mut().detach_window();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use anyhow::bail;

    use super::*;

    #[test]
    fn cleanup_runs_when_the_loop_fails() {
        let restored = Cell::new(0);
        let run = || -> Result<()> {
            let _restore = OnDrop(|| restored.set(restored.get() + 1));
            bail!("terminal went away");
        };
        assert!(run().is_err());
        assert_eq!(restored.get(), 1);
    }

    #[test]
    fn terminal_cells_map_to_pixel_centers() {
        let area = Rect::new(0, 1, 80, 24);
        let p = to_container(10, 1, area);
        assert!((p.x - 10.5 * PX_PER_COL).abs() < f64::EPSILON);
        assert!((p.y - 0.5 * PX_PER_ROW).abs() < f64::EPSILON);
        // The header row clamps to the first content row.
        assert_eq!(to_container(10, 0, area), p);
    }
}
