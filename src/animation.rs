//! Pseudo-random duty-cycle blink timers
//!
//! Each timer is an independent state machine sampled once per render tick;
//! there is no shared scheduler and no timer thread. Sampling is safe at
//! arbitrary, irregular intervals.

use std::time::{Duration, Instant};

use rand::Rng;

/// Blinker that flips between on and off phases whose combined length is
/// drawn uniformly from `[cycle_min, cycle_max]` each phase change and split
/// by the duty cycle (fraction of the cycle spent on).
///
/// With `cycle_min == cycle_max` the cycle length is fixed. Zero-length
/// cycles must not be passed.
#[derive(Debug, Clone)]
pub struct RandomBlink {
    cycle_min: Duration,
    cycle_max: Duration,
    duty_cycle: f64,
    state: bool,
    phase_start: Instant,
    up_duration: Duration,
    down_duration: Duration,
}

impl RandomBlink {
    #[must_use]
    pub fn new(cycle_min: Duration, cycle_max: Duration, duty_cycle: f64) -> Self {
        Self::new_at(cycle_min, cycle_max, duty_cycle, Instant::now())
    }

    fn new_at(cycle_min: Duration, cycle_max: Duration, duty_cycle: f64, now: Instant) -> Self {
        debug_assert!(cycle_min <= cycle_max);
        debug_assert!((0.0..=1.0).contains(&duty_cycle));
        let mut blink = Self {
            cycle_min,
            cycle_max,
            duty_cycle,
            state: false,
            phase_start: now,
            up_duration: Duration::ZERO,
            down_duration: Duration::ZERO,
        };
        let cycle = blink.draw_cycle();
        blink.split_cycle(cycle);
        blink
    }

    /// Uniform draw in `[cycle_min, cycle_max]`
    fn draw_cycle(&self) -> Duration {
        let min = self.cycle_min.as_secs_f64();
        let max = self.cycle_max.as_secs_f64();
        let secs = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        Duration::from_secs_f64(secs)
    }

    fn split_cycle(&mut self, cycle: Duration) {
        self.up_duration = cycle.mul_f64(self.duty_cycle);
        self.down_duration = cycle.saturating_sub(self.up_duration);
    }

    /// Advance the state machine to the current instant and return the state
    pub fn sample(&mut self) -> bool {
        self.sample_at(Instant::now())
    }

    /// Clock-injected variant of [`RandomBlink::sample`]
    pub fn sample_at(&mut self, now: Instant) -> bool {
        let phase = if self.state {
            self.up_duration
        } else {
            self.down_duration
        };
        if now.saturating_duration_since(self.phase_start) > phase {
            self.state = !self.state;
            self.phase_start = now;
            let cycle = self.draw_cycle();
            self.split_cycle(cycle);
        }
        self.state
    }
}

/// Blinker whose slow outer cycle contains a fast inner flicker.
///
/// During the outer on-phase a nested [`RandomBlink`] (created on phase entry,
/// dropped on exit) provides the rapid flashes; the off-phase is always dark.
/// Used for the flickering-lightning effect: long quiet periods punctuated by
/// bursts.
#[derive(Debug, Clone)]
pub struct BurstBlink {
    cycle_min: Duration,
    cycle_max: Duration,
    cycle_duty: f64,
    burst_min: Duration,
    burst_max: Duration,
    burst_duty: f64,
    active: bool,
    state: bool,
    phase_start: Instant,
    up_duration: Duration,
    down_duration: Duration,
    burst: Option<RandomBlink>,
}

impl BurstBlink {
    #[must_use]
    #[allow(clippy::similar_names)]
    pub fn new(
        cycle_min: Duration,
        cycle_max: Duration,
        cycle_duty: f64,
        burst_min: Duration,
        burst_max: Duration,
        burst_duty: f64,
    ) -> Self {
        debug_assert!(cycle_min <= cycle_max);
        let mut blink = Self {
            cycle_min,
            cycle_max,
            cycle_duty,
            burst_min,
            burst_max,
            burst_duty,
            active: false,
            state: false,
            phase_start: Instant::now(),
            up_duration: Duration::ZERO,
            down_duration: Duration::ZERO,
            burst: None,
        };
        blink.redraw_cycle();
        blink
    }

    fn redraw_cycle(&mut self) {
        let min = self.cycle_min.as_secs_f64();
        let max = self.cycle_max.as_secs_f64();
        let secs = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        let cycle = Duration::from_secs_f64(secs);
        self.up_duration = cycle.mul_f64(self.cycle_duty);
        self.down_duration = cycle.saturating_sub(self.up_duration);
    }

    /// Advance the state machine to the current instant and return the state
    pub fn sample(&mut self) -> bool {
        self.sample_at(Instant::now())
    }

    /// Clock-injected variant of [`BurstBlink::sample`]
    pub fn sample_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.phase_start);
        if self.active {
            if elapsed < self.up_duration {
                let burst = self.burst.get_or_insert_with(|| {
                    RandomBlink::new_at(self.burst_min, self.burst_max, self.burst_duty, now)
                });
                self.state = burst.sample_at(now);
            } else {
                self.burst = None;
                self.active = false;
                self.state = false;
                self.phase_start = now;
            }
        } else if elapsed < self.down_duration {
            self.state = false;
        } else {
            self.active = true;
            self.redraw_cycle();
            self.phase_start = now;
        }
        self.state
    }
}
