//! Injectable time source.

use chrono::{DateTime, Utc};

/// Wall clock seen by the core.
///
/// Upload path discriminators and access URL expiry checks read the time
/// through this trait so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Pinned(DateTime<Utc>);

    impl Clock for Pinned {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_millis_follow_now() {
        let clock = Pinned(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
        assert_eq!(clock.unix_timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_system_clock_is_past_2023() {
        assert!(SystemClock.unix_timestamp_millis() > 1_700_000_000_000);
    }
}
