//! Debounced reading-progress saves

use std::time::{Duration, Instant};

/// Single-flight debounce timer for the current page.
///
/// Every noted change replaces the pending save; the save fires once the
/// page has been stable for `delay`.
#[derive(Debug)]
pub struct ProgressDebouncer {
    delay: Duration,
    pending: Option<(usize, Instant)>,
}

impl ProgressDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Restart the timer for `page`
    pub fn note(&mut self, page: usize, now: Instant) {
        self.pending = Some((page, now + self.delay));
    }

    /// Page to save if the timer elapsed
    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        match self.pending {
            Some((page, deadline)) if now >= deadline => {
                self.pending = None;
                Some(page)
            }
            _ => None,
        }
    }

    /// Take the pending page regardless of the deadline
    pub fn flush(&mut self) -> Option<usize> {
        self.pending.take().map(|(page, _)| page)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, deadline)| deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn burst_coalesces_into_last_page() {
        let start = Instant::now();
        let mut debouncer = ProgressDebouncer::new(SECOND);
        debouncer.note(3, start);
        debouncer.note(4, start + Duration::from_millis(100));
        debouncer.note(9, start + Duration::from_millis(200));

        let mut saves = Vec::new();
        for ms in (0..=3000).step_by(50) {
            saves.extend(debouncer.poll(start + Duration::from_millis(ms)));
        }
        assert_eq!(saves, vec![9]);
    }

    #[test]
    fn waits_for_quiet_period() {
        let start = Instant::now();
        let mut debouncer = ProgressDebouncer::new(SECOND);
        debouncer.note(2, start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(999)), None);
        assert_eq!(debouncer.poll(start + SECOND), Some(2));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn restarting_moves_deadline() {
        let start = Instant::now();
        let mut debouncer = ProgressDebouncer::new(SECOND);
        debouncer.note(2, start);
        debouncer.note(3, start + Duration::from_millis(800));
        assert_eq!(debouncer.poll(start + SECOND), None);
        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(1800))
        );
    }

    #[test]
    fn flush_takes_pending_page() {
        let mut debouncer = ProgressDebouncer::new(SECOND);
        debouncer.note(5, Instant::now());
        assert_eq!(debouncer.flush(), Some(5));
        assert_eq!(debouncer.flush(), None);
    }
}
