//! Segment resolution bookkeeping.
//!
//! Resolving a segment (producing its storyboard image, its video, its
//! audio) is the host's business and is asynchronous. The timeline only
//! decides *what* to resolve next ([`ResolveQueue`]) and *whether* a finished
//! resolution may still be applied ([`ResolutionTracker`]): each request
//! gets a sequence number, and only the latest request for a segment wins,
//! whatever order the futures complete in.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::error::ResolveError;
use crate::model::{Segment, SegmentId};
use crate::visibility::{Classification, SegmentVisibility};

/// Host strategy that turns a segment into its resolved version.
pub trait SegmentResolver {
    fn resolve(&self, segment: Segment) -> impl Future<Output = Result<Segment, ResolveError>>;
}

impl<F, Fut> SegmentResolver for F
where
    F: Fn(Segment) -> Fut,
    Fut: Future<Output = Result<Segment, ResolveError>>,
{
    fn resolve(&self, segment: Segment) -> impl Future<Output = Result<Segment, ResolveError>> {
        self(segment)
    }
}

/// Proof that a resolution was requested; hand it back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolutionTicket {
    pub segment_id: SegmentId,
    pub seq: u64,
}

/// What happened to a completed resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// The result was the latest for its segment and has been applied.
    Applied,
    /// A newer request exists (or the segment is gone); the result was dropped.
    Stale,
    /// The latest request failed; the segment was left untouched.
    Failed(ResolveError),
}

/// Sequence numbers of in-flight resolutions, per segment, and the
/// segments whose latest resolution failed.
#[derive(Debug, Default)]
pub struct ResolutionTracker {
    next_seq: u64,
    latest: HashMap<SegmentId, u64>,
    failed: HashSet<SegmentId>,
}

impl ResolutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request; it supersedes any in-flight one for the
    /// same segment.
    pub fn begin(&mut self, segment_id: SegmentId) -> ResolutionTicket {
        self.failed.remove(&segment_id);
        self.next_seq += 1;
        let seq = self.next_seq;
        self.latest.insert(segment_id, seq);
        ResolutionTicket { segment_id, seq }
    }

    pub fn is_current(&self, ticket: ResolutionTicket) -> bool {
        self.latest.get(&ticket.segment_id) == Some(&ticket.seq)
    }

    /// Close the request if it is still the latest. Returns whether the
    /// caller may apply its result.
    pub fn finish(&mut self, ticket: ResolutionTicket) -> bool {
        if self.is_current(ticket) {
            self.latest.remove(&ticket.segment_id);
            true
        } else {
            false
        }
    }

    pub fn is_in_flight(&self, segment_id: SegmentId) -> bool {
        self.latest.contains_key(&segment_id)
    }

    pub fn in_flight(&self) -> usize {
        self.latest.len()
    }

    /// Park a segment after a failed resolution. It is not queued again
    /// until [`clear_failures`](Self::clear_failures) or an explicit
    /// [`begin`](Self::begin).
    pub fn mark_failed(&mut self, segment_id: SegmentId) {
        self.failed.insert(segment_id);
    }

    pub fn has_failed(&self, segment_id: SegmentId) -> bool {
        self.failed.contains(&segment_id)
    }

    /// Make failed segments eligible again, e.g. after the segment set
    /// changed.
    pub fn clear_failures(&mut self) {
        self.failed.clear();
    }

    /// Drop every pending request and failure, e.g. when the project is
    /// replaced.
    pub fn clear(&mut self) {
        self.latest.clear();
        self.failed.clear();
    }
}

/// Picks the next segments to resolve from a classification.
///
/// Candidates are renderable segments without an asset that are not already
/// in flight, have not just failed, and are not hidden; they come out by priority (demanded first) and
/// then by start time, and never more than the free concurrency slots.
#[derive(Debug, Clone, Copy)]
pub struct ResolveQueue {
    max_concurrent: usize,
}

impl ResolveQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn next_batch(
        &self,
        segments: &[Segment],
        classification: &Classification,
        tracker: &ResolutionTracker,
    ) -> Vec<SegmentId> {
        let free = self.max_concurrent.saturating_sub(tracker.in_flight());
        if free == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<(u8, f64, SegmentId)> = segments
            .iter()
            .filter(|s| s.category.is_renderable() && !s.has_asset())
            .filter(|s| !tracker.is_in_flight(s.id) && !tracker.has_failed(s.id))
            .map(|s| (classification.get(s.id).priority(), s.start_time_in_ms, s.id))
            .filter(|&(priority, _, _)| priority > SegmentVisibility::Hidden.priority())
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));
        candidates.into_iter().take(free).map(|(_, _, id)| id).collect()
    }
}
