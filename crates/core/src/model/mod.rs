pub mod project;
pub mod segment;
pub mod track;

pub use project::ProjectSnapshot;
pub use segment::{MediaFamily, Segment, SegmentCategory, SegmentId};
pub use track::{Track, build_tracks, nb_identified_tracks};
