use std::time::{Duration, Instant};

/// Single-flight delay polled by the host's tick.
///
/// Each [`schedule`](Self::schedule) replaces the pending deadline, so only
/// the last of a burst of inputs fires.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + self.delay);
        self.generation
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

    /// Fire once the deadline has passed; returns the generation that fired.
    pub fn tick(&mut self, now: Instant) -> Option<u64> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(self.generation)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fires_once_after_delay() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        let generation = d.schedule(start);

        assert_eq!(d.tick(start + Duration::from_millis(50)), None);
        assert_eq!(d.tick(start + Duration::from_millis(100)), Some(generation));
        assert_eq!(d.tick(start + Duration::from_millis(200)), None);
    }

    #[test]
    fn test_reschedule_pushes_deadline() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.schedule(start);
        let last = d.schedule(start + Duration::from_millis(80));

        assert_eq!(d.tick(start + Duration::from_millis(120)), None);
        assert_eq!(d.tick(start + Duration::from_millis(180)), Some(last));
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::ZERO);
        d.schedule(start);
        d.cancel();
        assert!(!d.is_pending());
        assert_eq!(d.tick(start), None);
    }
}
