// libs/appointment-cell/src/validation.rs
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

use shared_utils::clock::ist;

use crate::models::{AppointmentError, MAX_NOTES_CHARS, MAX_REASON_FOR_VISIT_CHARS};

/// 24-hour clock time with an optional uppercase meridiem suffix. This is the
/// exact shape the mobile clients send; lowercase suffixes are rejected.
fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])\s?(AM|PM)?$").expect("valid time pattern")
    })
}

/// Parse a clock-time string into a `NaiveTime`.
///
/// The meridiem is applied with 12-hour semantics only when the hour is in
/// 1..=12 (12 AM is midnight); for hours 13..=23 the value is already
/// unambiguous on the 24-hour clock and the suffix is ignored.
pub fn parse_appointment_time(raw: &str) -> Result<NaiveTime, AppointmentError> {
    let captures = time_pattern().captures(raw).ok_or_else(|| {
        AppointmentError::InvalidTime(format!(
            "'{}' must be HH:MM, optionally followed by AM or PM",
            raw
        ))
    })?;

    let mut hour: u32 = captures[1].parse().expect("pattern guarantees digits");
    let minute: u32 = captures[2].parse().expect("pattern guarantees digits");

    match captures.get(3).map(|m| m.as_str()) {
        Some("AM") if hour == 12 => hour = 0,
        Some("PM") if (1..=11).contains(&hour) => hour += 12,
        _ => {}
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppointmentError::InvalidTime(format!("'{}' is out of range", raw)))
}

/// Combine an IST civil date and clock time into the stored instant.
pub fn combine_ist(
    date: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<FixedOffset>, AppointmentError> {
    ist()
        .from_local_datetime(&date.and_time(time))
        .single()
        .ok_or_else(|| {
            AppointmentError::InvalidTime(format!("{} {} is not a valid instant", date, time))
        })
}

/// Midnight opening the given IST civil day.
pub fn start_of_civil_day(date: NaiveDate) -> Result<DateTime<FixedOffset>, AppointmentError> {
    combine_ist(date, NaiveTime::MIN)
}

pub fn ensure_future(
    scheduled_at: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Result<(), AppointmentError> {
    if scheduled_at < now {
        return Err(AppointmentError::Validation(
            "Appointment must be scheduled for a future time".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_reason_for_visit(reason: Option<&str>) -> Result<(), AppointmentError> {
    if let Some(text) = reason {
        if text.chars().count() > MAX_REASON_FOR_VISIT_CHARS {
            return Err(AppointmentError::Validation(format!(
                "Reason for visit exceeds {} characters",
                MAX_REASON_FOR_VISIT_CHARS
            )));
        }
    }
    Ok(())
}

pub fn validate_notes(notes: Option<&str>) -> Result<(), AppointmentError> {
    if let Some(text) = notes {
        if text.chars().count() > MAX_NOTES_CHARS {
            return Err(AppointmentError::Validation(format!(
                "Notes exceed {} characters",
                MAX_NOTES_CHARS
            )));
        }
    }
    Ok(())
}
