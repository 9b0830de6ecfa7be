//! Simulated clock.
//!
//! Advances time by whole render frames and tells the caller how many fixed
//! physics steps fit in each one. Time is simulated, never read from the
//! wall clock, so runs are reproducible.

/// Fixed steps allowed per frame before the accumulator is dropped.
const MAX_STEPS_PER_FRAME: u32 = 10;

/// Frame clock with a fixed-step accumulator.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Current simulation time in seconds
    now: f64,
    /// Seconds per render frame
    frame_dt: f64,
    /// Seconds per physics step
    fixed_dt: f64,
    /// Unconsumed physics time
    accumulator: f64,
    /// Frames advanced so far
    frames: u64,
    /// Physics steps handed out so far
    steps: u64,
}

impl SimClock {
    /// Create a clock for the given rates.
    #[must_use]
    pub fn new(render_fps: u32, physics_hz: u32) -> Self {
        Self {
            now: 0.0,
            frame_dt: 1.0 / f64::from(render_fps.max(1)),
            fixed_dt: 1.0 / f64::from(physics_hz.max(1)),
            accumulator: 0.0,
            frames: 0,
            steps: 0,
        }
    }

    /// Advance one render frame.
    /// Returns the number of fixed updates that should be performed.
    pub fn advance(&mut self) -> u32 {
        self.now += self.frame_dt;
        self.frames += 1;
        self.accumulate(self.frame_dt)
    }

    fn accumulate(&mut self, dt: f64) -> u32 {
        self.accumulator += dt;
        let mut count = 0;

        while self.accumulator >= self.fixed_dt && count < MAX_STEPS_PER_FRAME {
            self.accumulator -= self.fixed_dt;
            count += 1;
        }

        // Still behind after the cap: drop the backlog
        if self.accumulator > self.fixed_dt * 2.0 {
            self.accumulator = 0.0;
        }

        self.steps += u64::from(count);
        count
    }

    /// Current simulation time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Seconds per physics step.
    #[must_use]
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Seconds per render frame.
    #[must_use]
    pub fn frame_dt(&self) -> f64 {
        self.frame_dt
    }

    /// Frames advanced so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Physics steps handed out so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(60, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_rates_step_once_per_frame() {
        let mut clock = SimClock::new(50, 50);
        for _ in 0..100 {
            assert_eq!(clock.advance(), 1);
        }
        assert_eq!(clock.steps(), 100);
        assert!((clock.now() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_steps_track_elapsed_time() {
        let mut clock = SimClock::new(60, 50);
        let mut total = 0;
        for _ in 0..600 {
            total += clock.advance();
        }
        // 10 seconds at 50 Hz, give or take the step still accumulating
        assert!((499..=500).contains(&total));
        assert_eq!(clock.frames(), 600);
        assert!(clock.accumulator < clock.fixed_dt());
    }

    #[test]
    fn test_slow_frames_are_capped() {
        let mut clock = SimClock::new(1, 1000);
        assert_eq!(clock.advance(), MAX_STEPS_PER_FRAME);
        assert!(clock.accumulator.abs() < f64::EPSILON);
    }

    #[test]
    fn test_fast_frames_skip_steps() {
        let mut clock = SimClock::new(120, 60);
        let counts: Vec<u32> = (0..4).map(|_| clock.advance()).collect();
        assert_eq!(counts.iter().sum::<u32>(), 2);
        assert!(counts.iter().all(|&c| c <= 1));
    }
}
