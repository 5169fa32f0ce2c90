use std::time::{Duration, Instant};

/// Frame clock tracking elapsed shader time.
///
/// Unlike a wall clock, the elapsed time stops advancing while the clock is
/// paused, so shaders reading the time see a frozen frame. Rendering itself is
/// not halted.
pub struct FrameClock {
    last_update: Instant,
    /// Time since last tick (zero while paused)
    pub delta: Duration,
    /// Total unpaused time since creation
    pub elapsed: Duration,
    /// Total number of unpaused ticks
    pub frame_count: u64,
    paused: bool,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Creates a new running clock starting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
            paused: false,
        }
    }

    /// Advances the clock. Called once at the start of every frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if self.paused {
            self.delta = Duration::ZERO;
        } else {
            self.delta = now - self.last_update;
            self.elapsed += self.delta;
            self.frame_count += 1;
        }
        self.last_update = now;
    }

    /// Freezes or resumes the clock.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            // time spent paused never counts towards `elapsed`
            self.last_update = Instant::now();
            self.paused = paused;
        }
    }

    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_clock_does_not_advance() {
        let mut clock = FrameClock::new();
        clock.set_paused(true);
        std::thread::sleep(Duration::from_millis(5));
        clock.tick();
        assert_eq!(clock.delta, Duration::ZERO);
        assert_eq!(clock.elapsed, Duration::ZERO);
        assert_eq!(clock.frame_count, 0);
    }

    #[test]
    fn test_running_clock_accumulates() {
        let mut clock = FrameClock::new();
        std::thread::sleep(Duration::from_millis(2));
        clock.tick();
        clock.tick();
        assert_eq!(clock.frame_count, 2);
        assert!(clock.elapsed >= Duration::from_millis(2));
    }
}
