use chrono::{DateTime, Duration, FixedOffset};

use appointment_cell::services::policy::CancellationPolicy;

fn instant(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).expect("valid RFC 3339 instant")
}

#[test]
fn cancelling_23_hours_before_is_late() {
    let policy = CancellationPolicy::default();
    let scheduled_at = instant("2025-07-10T10:00:00+05:30");

    assert!(policy.is_late(scheduled_at, scheduled_at - Duration::hours(23)));
}

#[test]
fn cancelling_25_hours_before_is_on_time() {
    let policy = CancellationPolicy::default();
    let scheduled_at = instant("2025-07-10T10:00:00+05:30");

    assert!(!policy.is_late(scheduled_at, scheduled_at - Duration::hours(25)));
}

#[test]
fn exactly_24_hours_before_is_on_time() {
    // The boundary itself is outside the late window
    let policy = CancellationPolicy::default();
    let scheduled_at = instant("2025-07-10T10:00:00+05:30");

    assert!(!policy.is_late(scheduled_at, scheduled_at - Duration::hours(24)));
    assert!(policy.is_late(
        scheduled_at,
        scheduled_at - Duration::hours(24) + Duration::seconds(1)
    ));
}

#[test]
fn cancelling_after_the_scheduled_time_is_late() {
    let policy = CancellationPolicy::default();
    let scheduled_at = instant("2025-07-10T10:00:00+05:30");

    assert!(policy.is_late(scheduled_at, scheduled_at + Duration::hours(1)));
}

#[test]
fn window_is_tunable() {
    let policy = CancellationPolicy::with_window_hours(48);
    let scheduled_at = instant("2025-07-10T10:00:00+05:30");

    assert!(policy.is_late(scheduled_at, scheduled_at - Duration::hours(25)));
    assert!(!policy.is_late(scheduled_at, scheduled_at - Duration::hours(49)));
    assert_eq!(policy.late_window(), Duration::hours(48));
}

#[test]
fn default_window_is_24_hours() {
    assert_eq!(CancellationPolicy::default().late_window(), Duration::hours(24));
}

#[test]
fn evaluation_is_offset_agnostic() {
    // The same two instants expressed in different offsets decide identically
    let policy = CancellationPolicy::default();
    let scheduled_ist = instant("2025-07-10T10:00:00+05:30");
    let cancelled_utc = instant("2025-07-09T12:30:00+00:00"); // 16h before

    assert!(policy.is_late(scheduled_ist, cancelled_utc));
}
