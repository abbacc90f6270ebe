use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous drawn frame. Zero for the first frame
    /// after a restart.
    pub dt: Duration,

    /// Time elapsed since the clock was last restarted.
    pub elapsed: Duration,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Frames drawn since the clock was created. Never reset.
    pub frame_index: u64,
}

impl FrameTime {
    /// `dt` in seconds, for animation math.
    pub fn dt_secs(&self) -> f32 {
        self.dt.as_secs_f32()
    }
}

/// Produces `FrameTime` snapshots for a single render loop.
///
/// `dt` is capped at `max_dt` so a stalled thread (debugger, slow present)
/// does not make animations jump.
#[derive(Debug, Clone)]
pub struct FrameClock {
    origin: Instant,
    last: Option<Instant>,
    frame_index: u64,
    max_dt: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_max_dt(Duration::from_millis(250))
    }

    pub fn with_max_dt(max_dt: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last: None,
            frame_index: 0,
            max_dt,
        }
    }

    /// Restarts `elapsed` and makes the next tick report a zero `dt`.
    pub fn restart(&mut self) {
        self.origin = Instant::now();
        self.last = None;
    }

    /// Advances the clock by one frame.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = self
            .last
            .map(|last| now.saturating_duration_since(last).min(self.max_dt))
            .unwrap_or(Duration::ZERO);

        self.last = Some(now);
        let time = FrameTime {
            dt,
            elapsed: now.saturating_duration_since(self.origin),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }

    /// Current time without advancing the frame counter.
    pub fn peek(&self) -> FrameTime {
        let now = Instant::now();
        FrameTime {
            dt: Duration::ZERO,
            elapsed: now.saturating_duration_since(self.origin),
            now,
            frame_index: self.frame_index,
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn first_tick_has_zero_dt() {
        let mut clock = FrameClock::new();
        let t = clock.tick();
        assert_eq!(t.dt, Duration::ZERO);
        assert_eq!(t.frame_index, 0);
    }

    #[test]
    fn frame_index_survives_restart() {
        let mut clock = FrameClock::new();
        clock.tick();
        clock.tick();
        clock.restart();
        let t = clock.tick();
        assert_eq!(t.frame_index, 2);
        assert_eq!(t.dt, Duration::ZERO);
    }

    #[test]
    fn dt_is_capped() {
        let mut clock = FrameClock::with_max_dt(Duration::from_millis(1));
        clock.tick();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.tick().dt, Duration::from_millis(1));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut clock = FrameClock::new();
        clock.tick();
        assert_eq!(clock.peek().frame_index, 1);
        assert_eq!(clock.tick().frame_index, 1);
    }
}
