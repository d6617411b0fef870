use chrono::{DateTime, FixedOffset, Utc};

/// IST offset from UTC, in seconds (+05:30).
pub const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

/// The fixed civil time zone every stored and compared timestamp uses.
/// Single-region deployment; host time zone must never leak into behavior.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECONDS).expect("IST offset is in range")
}

pub fn to_ist(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    instant.with_timezone(&ist())
}

/// Source of "now", normalized to IST. Injected into anything that compares
/// against the current instant so tests can pin time instead of racing the
/// wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock, expressed in IST.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        to_ist(Utc::now())
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn at(instant: DateTime<FixedOffset>) -> Self {
        Self { instant }
    }

    /// Convenience for tests working from an RFC 3339 literal.
    pub fn at_rfc3339(value: &str) -> Self {
        let instant = DateTime::parse_from_rfc3339(value)
            .expect("valid RFC 3339 instant")
            .with_timezone(&ist());
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ist_offset_is_five_thirty() {
        let midnight_utc = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let in_ist = to_ist(midnight_utc);
        assert_eq!(in_ist.format("%H:%M").to_string(), "05:30");
    }

    #[test]
    fn fixed_clock_returns_pinned_instant() {
        let clock = FixedClock::at_rfc3339("2025-06-01T10:00:00+05:30");
        assert_eq!(clock.now().to_rfc3339(), "2025-06-01T10:00:00+05:30");
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn fixed_clock_normalizes_foreign_offsets() {
        let clock = FixedClock::at_rfc3339("2025-06-01T04:30:00+00:00");
        assert_eq!(clock.now().to_rfc3339(), "2025-06-01T10:00:00+05:30");
    }
}
