mod renderer;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use timeline_grid_core::{ProjectSnapshot, Segment, SegmentCategory, Timeline, TimelineConfig};

const USAGE: &str = "Usage: timeline-grid [--config <config.json>] [project.json]";

/// A few minutes of storyboard, video, dialogue and music for trying the
/// grid without a project file.
fn demo_project() -> ProjectSnapshot {
    const SHOT_MS: f64 = 4_000.0;
    const SHOTS: u64 = 60;

    let mut segments = Vec::new();
    let mut id = 0;
    let mut next_id = || {
        id += 1;
        id
    };
    for shot in 0..SHOTS {
        let start = shot as f64 * SHOT_MS;
        segments.push(
            Segment::new(next_id(), SegmentCategory::Storyboard, 0, start, start + SHOT_MS)
                .with_label(format!("shot {}", shot + 1)),
        );
        if shot % 3 != 2 {
            segments.push(Segment::new(
                next_id(),
                SegmentCategory::Video,
                1,
                start,
                start + SHOT_MS,
            ));
        }
        if shot % 2 == 0 {
            segments.push(
                Segment::new(
                    next_id(),
                    SegmentCategory::Dialogue,
                    2,
                    start + 500.0,
                    start + SHOT_MS * 1.5,
                )
                .with_label(format!("line {}", shot / 2 + 1)),
            );
        }
    }
    let total = SHOTS as f64 * SHOT_MS;
    let mut start = 0.0;
    while start < total {
        let end = (start + 30_000.0).min(total);
        segments.push(
            Segment::new(next_id(), SegmentCategory::Music, 3, start, end).with_label("score"),
        );
        start = end;
    }
    ProjectSnapshot::from_segments(segments)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut config_path: Option<PathBuf> = None;
    let mut project_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    bail!("--config needs a path\n{USAGE}");
                };
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                eprintln!("{USAGE}");
                return Ok(());
            }
            _ if project_path.is_none() => project_path = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument {arg:?}\n{USAGE}"),
        }
    }

    let config = match config_path {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            TimelineConfig::from_json_str(&json)?
        }
        None => TimelineConfig::default(),
    };

    let project = match project_path {
        Some(path) => {
            let data =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            ProjectSnapshot::from_json_slice(&data)?
        }
        None => demo_project(),
    };
    log::info!("loaded {} segments", project.segments.len());

    let mut timeline = Timeline::new(config);
    timeline.store_mut().set_project(project);
    renderer::render_tui(timeline)?;
    Ok(())
}
