use std::time::{Duration, Instant};

/// Trailing-edge debouncer driven by the host's frame clock.
///
/// At most one execution is pending. Scheduling while one is pending moves
/// the deadline instead of queueing a second run; [`poll`](Self::poll)
/// reports the run exactly once when the deadline has passed.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Schedule (or reschedule) the pending execution `delay` after `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` when the pending execution is due; it is then consumed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn fires_once_after_quiet_period() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(100 * MS);
        d.schedule(t0);
        assert!(!d.poll(t0 + 99 * MS));
        assert!(d.poll(t0 + 100 * MS));
        assert!(!d.poll(t0 + 200 * MS));
        assert!(!d.is_pending());
    }

    #[test]
    fn rescheduling_moves_the_single_deadline() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(100 * MS);
        d.schedule(t0);
        d.schedule(t0 + 80 * MS);
        assert!(!d.poll(t0 + 120 * MS));
        assert_eq!(d.deadline(), Some(t0 + 180 * MS));
        assert!(d.poll(t0 + 180 * MS));
        assert!(!d.poll(t0 + 181 * MS));
    }

    #[test]
    fn cancel_drops_pending_run() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(10 * MS);
        d.schedule(t0);
        d.cancel();
        assert!(!d.poll(t0 + 50 * MS));
    }
}
