pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod grid;
pub mod listeners;
pub mod metrics;
pub mod model;
pub mod resolve;
pub mod scene;
pub mod scheduler;
pub mod store;
pub mod visibility;
pub mod widget;

pub use config::TimelineConfig;
pub use cursor::{CursorDrag, TickLabelDensity, TimeScale};
pub use error::{ResolveError, TimelineError};
pub use grid::{GridCache, GridGeometry};
pub use listeners::{ListenerGuard, WindowEvents, WindowPointerEvent};
pub use metrics::{CellGeometry, ContentSizeMetrics, compute_content_size_metrics};
pub use model::{MediaFamily, ProjectSnapshot, Segment, SegmentCategory, SegmentId, Track};
pub use resolve::{ResolutionOutcome, ResolutionTicket, ResolveQueue, SegmentResolver};
pub use scene::build_scene;
pub use store::{
    LocalTransport, SegmentDraft, TimelineEvent, TimelineStore, Transport, ViewportState,
    WheelInput, resolve_segment,
};
pub use visibility::{RenderingStrategies, RenderingStrategy, SegmentVisibility};
pub use widget::{InputEvent, Region, Timeline};
