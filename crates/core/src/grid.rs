//! Guide geometry: track separators, step columns and ruler graduations.
//!
//! Generating these walks every track and every column, so [`GridCache`]
//! only regenerates when the metrics version moved, and then through a
//! debouncer. While a regeneration is pending the previous lines are served.

use std::time::Instant;

use timeline_grid_protocol::Point;

use crate::config::TimelineConfig;
use crate::metrics::ContentSizeMetrics;
use crate::scheduler::Debouncer;
use crate::store::TimelineStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLine {
    pub from: Point,
    pub to: Point,
}

/// One ruler tick, at the left edge of column `index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Graduation {
    pub index: usize,
    pub x: f64,
    pub major: bool,
}

/// One line per track boundary, `0..=tracks.len()`, across the content
/// width.
pub fn horizontal_grid_lines(metrics: &ContentSizeMetrics) -> Vec<GridLine> {
    (0..=metrics.tracks.len())
        .map(|i| {
            let y = metrics.vertical_cell_position(0, i);
            GridLine {
                from: Point::new(0.0, y),
                to: Point::new(metrics.content_width, y),
            }
        })
        .collect()
}

fn column_count(metrics: &ContentSizeMetrics) -> usize {
    if metrics.cell_width <= 0.0 {
        return 0;
    }
    (metrics.content_width / metrics.cell_width).round() as usize
}

/// One line at the left edge of every step column, down the content height.
pub fn vertical_grid_lines(metrics: &ContentSizeMetrics) -> Vec<GridLine> {
    (0..column_count(metrics))
        .map(|i| {
            let x = i as f64 * metrics.cell_width;
            GridLine {
                from: Point::new(x, 0.0),
                to: Point::new(x, metrics.content_height),
            }
        })
        .collect()
}

/// Ruler ticks, one per column; every `major_tick_unit`-th is major.
pub fn time_scale_graduations(metrics: &ContentSizeMetrics, major_tick_unit: usize) -> Vec<Graduation> {
    let unit = major_tick_unit.max(1);
    (0..column_count(metrics))
        .map(|index| Graduation {
            index,
            x: index as f64 * metrics.cell_width,
            major: index % unit == 0,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridGeometry {
    pub horizontal: Vec<GridLine>,
    pub vertical: Vec<GridLine>,
    pub graduations: Vec<Graduation>,
}

impl GridGeometry {
    pub fn generate(metrics: &ContentSizeMetrics, config: &TimelineConfig) -> Self {
        Self {
            horizontal: horizontal_grid_lines(metrics),
            vertical: vertical_grid_lines(metrics),
            graduations: time_scale_graduations(metrics, config.major_tick_unit),
        }
    }
}

/// Grid geometry memoized on the store's metrics version.
#[derive(Debug)]
pub struct GridCache {
    debouncer: Debouncer,
    built_for: Option<u64>,
    requested: Option<u64>,
    geometry: GridGeometry,
    regenerations: u64,
}

impl GridCache {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            debouncer: Debouncer::new(config.grid_regeneration_delay()),
            built_for: None,
            requested: None,
            geometry: GridGeometry::default(),
            regenerations: 0,
        }
    }

    /// Bring the cache up to date with `store`. The first generation is
    /// immediate; later ones wait for the debounce delay after the last
    /// metrics change. Returns whether the geometry was regenerated.
    pub fn sync(&mut self, store: &TimelineStore, now: Instant) -> bool {
        let version = store.metrics_version();
        if self.built_for == Some(version) {
            self.debouncer.cancel();
            self.requested = None;
            return false;
        }

        if self.built_for.is_some() {
            if self.requested != Some(version) {
                self.requested = Some(version);
                self.debouncer.schedule(now);
            }
            if !self.debouncer.poll(now) {
                return false;
            }
        }

        self.geometry = GridGeometry::generate(store.metrics(), store.config());
        self.built_for = Some(version);
        self.requested = None;
        self.regenerations += 1;
        log::debug!(
            "grid regenerated for metrics v{version}: {} rows, {} columns",
            self.geometry.horizontal.len(),
            self.geometry.vertical.len()
        );
        true
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Whether the served geometry predates the store's current metrics.
    pub fn is_stale(&self, store: &TimelineStore) -> bool {
        self.built_for != Some(store.metrics_version())
    }

    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::metrics::compute_content_size_metrics;
    use crate::model::build_tracks;

    fn metrics(zoom: f64) -> ContentSizeMetrics {
        let config = TimelineConfig {
            nb_max_shots: 12,
            default_nb_tracks: 3,
            ..TimelineConfig::default()
        };
        let tracks = build_tracks(&[], &config);
        compute_content_size_metrics(&tracks, zoom, &[], &config)
    }

    #[test]
    fn horizontal_lines_cover_every_boundary() {
        let m = metrics(10.0);
        let lines = horizontal_grid_lines(&m);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].from.y, 0.0);
        assert!((lines[3].from.y - m.content_height).abs() < f64::EPSILON);
        assert!(lines.iter().all(|l| l.to.x == m.content_width));
    }

    #[test]
    fn vertical_lines_one_per_column() {
        let m = metrics(10.0);
        let lines = vertical_grid_lines(&m);
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[11].from.x, 110.0);
        assert!(lines.iter().all(|l| l.to.y == m.content_height));
    }

    #[test]
    fn graduations_mark_major_ticks() {
        let graduations = time_scale_graduations(&metrics(10.0), 5);
        let majors: Vec<_> = graduations.iter().filter(|g| g.major).map(|g| g.index).collect();
        assert_eq!(majors, vec![0, 5, 10]);
    }

    #[test]
    fn cache_builds_immediately_then_debounces() {
        let t0 = Instant::now();
        let mut store = TimelineStore::default();
        let mut cache = GridCache::new(store.config());
        let delay = store.config().grid_regeneration_delay();

        assert!(cache.sync(&store, t0));
        assert!(!cache.sync(&store, t0));
        let first = cache.geometry().clone();

        store.set_horizontal_zoom_level(store.viewport().horizontal_zoom_level * 2.0);
        assert!(!cache.sync(&store, t0));
        assert!(cache.is_stale(&store));
        assert_eq!(*cache.geometry(), first);

        // A second change while pending pushes the deadline out.
        let t1 = t0 + delay / 2;
        store.set_horizontal_zoom_level(store.viewport().horizontal_zoom_level * 2.0);
        assert!(!cache.sync(&store, t1));
        assert!(!cache.sync(&store, t0 + delay));

        assert!(cache.sync(&store, t1 + delay));
        assert!(!cache.is_stale(&store));
        assert_eq!(cache.regenerations(), 2);
        assert_ne!(*cache.geometry(), first);
    }

    #[test]
    fn zero_delay_regenerates_on_next_sync() {
        let config = TimelineConfig {
            grid_regeneration_delay_ms: 0,
            ..TimelineConfig::default()
        };
        let now = Instant::now();
        let mut store = TimelineStore::new(config.clone());
        let mut cache = GridCache::new(&config);
        cache.sync(&store, now);
        store.toggle_track_visibility(0);
        assert!(cache.sync(&store, now + Duration::from_millis(1)));
    }
}
