//! Clock and random implementations.

use crate::infrastructure::ports::{ClockPort, RandomPort};
use chrono::{DateTime, Utc};

/// System clock - uses real time.
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// System random - uses real randomness.
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPort for SystemRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        use rand::Rng;
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn gen_unit(&self) -> f64 {
        use rand::Rng;
        rand::thread_rng().gen::<f64>()
    }
}

/// Fixed clock for testing.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl ClockPort for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Fixed random for testing. Never falls under a sampling rate below 0.5.
#[cfg(test)]
pub struct FixedRandom(pub i32);

#[cfg(test)]
impl RandomPort for FixedRandom {
    fn gen_range(&self, _min: i32, _max: i32) -> i32 {
        self.0
    }

    fn gen_unit(&self) -> f64 {
        0.5
    }
}

/// Replays queued values, then falls back to the lower bound.
#[cfg(test)]
pub struct SequenceRandom {
    ranges: std::sync::Mutex<std::collections::VecDeque<i32>>,
    units: std::sync::Mutex<std::collections::VecDeque<f64>>,
}

#[cfg(test)]
impl SequenceRandom {
    pub fn new(ranges: impl IntoIterator<Item = i32>) -> Self {
        Self {
            ranges: std::sync::Mutex::new(ranges.into_iter().collect()),
            units: std::sync::Mutex::new(std::collections::VecDeque::new()),
        }
    }

    pub fn with_units(self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units.lock().unwrap().extend(units);
        self
    }
}

#[cfg(test)]
impl RandomPort for SequenceRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        self.ranges
            .lock()
            .unwrap()
            .pop_front()
            .map_or(min, |value| value.clamp(min, max.max(min)))
    }

    fn gen_unit(&self) -> f64 {
        self.units.lock().unwrap().pop_front().unwrap_or(0.99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_random_stays_in_bounds() {
        let random = SystemRandom::new();
        for _ in 0..200 {
            let value = random.gen_range(1, 6);
            assert!((1..=6).contains(&value));
        }
        assert_eq!(random.gen_range(4, 4), 4);
        let unit = random.gen_unit();
        assert!((0.0..1.0).contains(&unit));
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::minutes(31));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(31));
    }

    #[test]
    fn sequence_random_replays_then_defaults() {
        let random = SequenceRandom::new([3, 17, 40]).with_units([0.001]);
        assert_eq!(random.gen_range(1, 20), 3);
        assert_eq!(random.gen_range(1, 20), 17);
        assert_eq!(random.gen_range(1, 20), 20);
        assert_eq!(random.gen_range(1, 20), 1);
        assert_eq!(random.gen_unit(), 0.001);
        assert_eq!(random.gen_unit(), 0.99);
    }
}
