//! Wall-clock reference clock for sim graphs, in seconds

use std::time::Instant;

use parking_lot::Mutex;

use crate::framework::{FrameworkResult, PositionControl};

struct ClockInner {
    base: f64,
    started: Option<Instant>,
    duration: Option<f64>,
}

pub struct SimClock {
    inner: Mutex<ClockInner>,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ClockInner {
                base: 0.0,
                started: None,
                duration: None,
            }),
        }
    }

    fn now(inner: &ClockInner) -> f64 {
        let elapsed = inner
            .started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let position = inner.base + elapsed;
        match inner.duration {
            Some(d) => position.min(d),
            None => position,
        }
    }

    pub(crate) fn set_duration(&self, duration: Option<f64>) {
        self.inner.lock().duration = duration;
    }

    pub(crate) fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.started.is_none() {
            inner.started = Some(Instant::now());
        }
    }

    /// Freeze at the current position
    pub(crate) fn halt(&self) {
        let mut inner = self.inner.lock();
        inner.base = Self::now(&inner);
        inner.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().started.is_some()
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionControl for SimClock {
    fn duration(&self) -> FrameworkResult<f64> {
        Ok(self.inner.lock().duration.unwrap_or(0.0))
    }

    fn current_position(&self) -> FrameworkResult<f64> {
        Ok(Self::now(&self.inner.lock()))
    }

    fn set_current_position(&self, position: f64) -> FrameworkResult<()> {
        let mut inner = self.inner.lock();
        let mut position = position.max(0.0);
        if let Some(d) = inner.duration {
            position = position.min(d);
        }
        inner.base = position;
        if inner.started.is_some() {
            inner.started = Some(Instant::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halted_clock_holds_position() {
        let clock = SimClock::new();
        clock.set_duration(Some(60.0));
        clock.set_current_position(12.5).unwrap();
        assert_eq!(clock.current_position().unwrap(), 12.5);
        assert_eq!(clock.duration().unwrap(), 60.0);
    }

    #[test]
    fn test_seek_is_clamped() {
        let clock = SimClock::new();
        clock.set_duration(Some(10.0));
        clock.set_current_position(-3.0).unwrap();
        assert_eq!(clock.current_position().unwrap(), 0.0);
        clock.set_current_position(99.0).unwrap();
        assert_eq!(clock.current_position().unwrap(), 10.0);
    }

    #[test]
    fn test_running_clock_advances_then_halts() {
        let clock = SimClock::new();
        clock.start();
        std::thread::sleep(std::time::Duration::from_millis(20));
        clock.halt();
        let held = clock.current_position().unwrap();
        assert!(held > 0.0);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(clock.current_position().unwrap(), held);
        assert!(!clock.is_running());
    }
}
