//! World clock and day/night cycle.
//!
//! Tracks elapsed real seconds and derives the in-game hour from them. Spawn
//! tables only distinguish day and night; [`DayPeriod`] adds dawn and dusk for
//! presentation.

use serde::{Deserialize, Serialize};
use tileworld_core::SimTick;

use crate::config::ClockConfig;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Coarse time of day used by creature tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeOfDay {
    Day,
    Night,
}

/// Finer split of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayPeriod {
    Night,
    Dawn,
    Day,
    Dusk,
}

/// Simulation clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldClock {
    /// Ticks advanced so far.
    pub tick: SimTick,
    elapsed_secs: f64,
    config: ClockConfig,
}

impl WorldClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            tick: SimTick::ZERO,
            elapsed_secs: 0.0,
            config,
        }
    }

    /// Advance by one tick of `delta` seconds.
    pub fn advance(&mut self, delta: f32) {
        self.tick = self.tick.advance(1);
        self.elapsed_secs += delta.max(0.0) as f64;
    }

    /// Real seconds since the world started.
    pub fn seconds(&self) -> f64 {
        self.elapsed_secs
    }

    /// In-game minutes since midnight of day zero.
    pub fn game_minutes(&self) -> f64 {
        let per_minute = self.config.seconds_per_game_minute.max(f64::EPSILON);
        self.config.start_hour * 60.0 + self.elapsed_secs / per_minute
    }

    /// Hour of the current day in `[0, 24)`.
    pub fn hour_of_day(&self) -> f64 {
        self.game_minutes().rem_euclid(MINUTES_PER_DAY) / 60.0
    }

    /// Real seconds in one in-game day.
    pub fn day_length_secs(&self) -> f64 {
        self.config.seconds_per_game_minute * MINUTES_PER_DAY
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        let hour = self.hour_of_day();
        if (6.0..18.0).contains(&hour) {
            TimeOfDay::Day
        } else {
            TimeOfDay::Night
        }
    }

    pub fn period(&self) -> DayPeriod {
        let hour = self.hour_of_day();
        if !(5.0..19.0).contains(&hour) {
            DayPeriod::Night
        } else if hour < 6.0 {
            DayPeriod::Dawn
        } else if hour < 18.0 {
            DayPeriod::Day
        } else {
            DayPeriod::Dusk
        }
    }

    /// Twelve-hour clock, e.g. `7:05 PM`.
    pub fn clock_string(&self) -> String {
        let minutes = self.game_minutes().rem_euclid(MINUTES_PER_DAY) as u32;
        let hour = minutes / 60;
        let minute = minutes % 60;
        let suffix = if hour < 12 { "AM" } else { "PM" };
        let display_hour = match hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", display_hour, minute, suffix)
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(hour: f64) -> WorldClock {
        WorldClock::new(ClockConfig {
            seconds_per_game_minute: 1.0,
            start_hour: hour,
        })
    }

    #[test]
    fn day_and_night_split_at_six() {
        assert_eq!(clock_at(5.99).time_of_day(), TimeOfDay::Night);
        assert_eq!(clock_at(6.0).time_of_day(), TimeOfDay::Day);
        assert_eq!(clock_at(17.99).time_of_day(), TimeOfDay::Day);
        assert_eq!(clock_at(18.0).time_of_day(), TimeOfDay::Night);
    }

    #[test]
    fn periods_cover_dawn_and_dusk() {
        assert_eq!(clock_at(4.5).period(), DayPeriod::Night);
        assert_eq!(clock_at(5.5).period(), DayPeriod::Dawn);
        assert_eq!(clock_at(12.0).period(), DayPeriod::Day);
        assert_eq!(clock_at(18.5).period(), DayPeriod::Dusk);
        assert_eq!(clock_at(20.0).period(), DayPeriod::Night);
    }

    #[test]
    fn hour_wraps_at_midnight() {
        let mut clock = clock_at(23.0);
        // 90 real seconds at one second per minute.
        for _ in 0..90 {
            clock.advance(1.0);
        }
        assert!((clock.hour_of_day() - 0.5).abs() < 1e-6);
        assert_eq!(clock.tick, SimTick(90));
    }

    #[test]
    fn clock_string_uses_twelve_hour_format() {
        assert_eq!(clock_at(0.0).clock_string(), "12:00 AM");
        assert_eq!(clock_at(12.0).clock_string(), "12:00 PM");
        let mut evening = clock_at(19.0);
        for _ in 0..5 {
            evening.advance(1.0);
        }
        assert_eq!(evening.clock_string(), "7:05 PM");
    }

    #[test]
    fn day_length_follows_config() {
        let clock = WorldClock::default();
        assert!((clock.day_length_secs() - 720.0).abs() < 1e-9);
    }
}
