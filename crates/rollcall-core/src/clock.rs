//! Civil wall-clock time.
//!
//! Schedules and attendance timestamps are stored timezone-naive, in one
//! civil timezone for the whole deployment. All "now" values in the
//! system come from a [`Clock`] so that the attendance rules can be
//! exercised at any instant in tests.

use crate::{Result, error::Error};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current civil date and time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in the deployment's civil timezone.
    fn now(&self) -> NaiveDateTime;

    /// Current civil date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Clock reading the system time converted to a fixed civil timezone
#[derive(Debug, Clone, Copy)]
pub struct CivilClock {
    tz: Tz,
}

impl CivilClock {
    /// Create a clock for the given timezone.
    #[must_use]
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Create a clock from an IANA timezone name such as `Asia/Dhaka`.
    ///
    /// # Errors
    /// Returns `Error::UnknownTimezone` if the name is not in the tz database.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(parse_timezone(name)?))
    }

    /// The timezone this clock reports in.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Clock for CivilClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct FixedClock {
    // Whole seconds since the epoch of the naive civil time.
    secs: AtomicI64,
}

impl FixedClock {
    /// Create a clock frozen at `at`.
    #[must_use]
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            secs: AtomicI64::new(at.and_utc().timestamp()),
        }
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: NaiveDateTime) {
        self.secs.store(at.and_utc().timestamp(), Ordering::SeqCst);
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        self.secs.fetch_add(delta.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        let secs = self.secs.load(Ordering::SeqCst);
        DateTime::from_timestamp(secs, 0)
            .unwrap_or_default()
            .naive_utc()
    }
}

/// Parse an IANA timezone name.
///
/// # Errors
/// Returns `Error::UnknownTimezone` if the name is not in the tz database.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::UnknownTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TIMEZONE;
    use chrono::{Duration, Timelike};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_fixed_clock_set_and_advance() {
        let clock = FixedClock::new(at(10, 0));
        assert_eq!(clock.now(), at(10, 0));

        clock.advance(Duration::minutes(12));
        assert_eq!(clock.now(), at(10, 12));

        clock.set(at(8, 30));
        assert_eq!(clock.now().hour(), 8);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn test_civil_clock_default_timezone() {
        let clock = CivilClock::from_name(DEFAULT_TIMEZONE).unwrap();
        assert_eq!(clock.timezone(), chrono_tz::Asia::Dhaka);

        // Dhaka has observed UTC+6 without DST since 2009
        let utc = Utc::now().naive_utc();
        let offset = clock.now() - utc;
        assert!((offset - Duration::hours(6)).num_seconds().abs() < 5);
    }

    #[test]
    fn test_unknown_timezone() {
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(Error::UnknownTimezone(_))
        ));
    }
}
