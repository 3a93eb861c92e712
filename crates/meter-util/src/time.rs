//! Time utilities for meterd
//!
//! All persisted timestamps are UTC wall-clock time. Billing cadence is
//! driven by the scheduler's interval timer, not by comparing timestamps.
//!
//! Debug builds read `METERD_MOCK_TIME` (`YYYY-MM-DD HH:MM:SS`, UTC) to
//! shift the clock, e.g. to stamp sessions on a fixed day during demos.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::sync::OnceLock;

/// Environment variable that shifts the clock (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "METERD_MOCK_TIME";

/// Expected format of [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Clock shift, resolved once. The shifted clock keeps ticking at real speed.
static CLOCK_SHIFT: OnceLock<Option<TimeDelta>> = OnceLock::new();

/// Shift that makes `real` read as the `YYYY-MM-DD HH:MM:SS` value in `spec`
fn shift_from(spec: &str, real: DateTime<Utc>) -> Option<TimeDelta> {
    NaiveDateTime::parse_from_str(spec.trim(), MOCK_TIME_FORMAT)
        .ok()
        .map(|target| target.and_utc() - real)
}

#[allow(clippy::disallowed_methods)]
fn clock_shift() -> Option<TimeDelta> {
    *CLOCK_SHIFT.get_or_init(|| {
        if !cfg!(debug_assertions) {
            return None;
        }
        let spec = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
        let shift = shift_from(&spec, Utc::now());
        match shift {
            Some(delta) => tracing::info!(
                mock_time = %spec,
                shift_secs = delta.num_seconds(),
                "Clock shifted"
            ),
            None => tracing::warn!(
                mock_time = %spec,
                expected = MOCK_TIME_FORMAT,
                "Ignoring unparseable mock time"
            ),
        }
        shift
    })
}

/// Whether the clock is shifted by [`MOCK_TIME_ENV_VAR`]
pub fn is_mock_time_active() -> bool {
    clock_shift().is_some()
}

/// Current UTC time, shifted in debug builds when mock time is set
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Utc> {
    let real = Utc::now();
    clock_shift().map_or(real, |shift| real + shift)
}

/// Format a number of seconds as `1h 5m` or `4m 10s`
pub fn format_duration_secs(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_as_minutes_or_hours() {
        assert_eq!(format_duration_secs(0), "0m 0s");
        assert_eq!(format_duration_secs(61), "1m 1s");
        assert_eq!(format_duration_secs(250), "4m 10s");
        assert_eq!(format_duration_secs(3900), "1h 5m");
    }

    #[test]
    fn shift_moves_real_time_to_target() {
        let real = NaiveDateTime::parse_from_str("2025-01-01 00:00:00", MOCK_TIME_FORMAT)
            .unwrap()
            .and_utc();
        let shift = shift_from(" 2025-01-02 00:00:30 ", real).unwrap();
        assert_eq!(shift.num_seconds(), 86_430);
        assert!(shift_from("tomorrow", real).is_none());
    }

    #[test]
    fn clock_moves_forward() {
        let before = now();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(now() > before);
        // Resolved once per process; must not panic either way
        let _ = is_mock_time_active();
    }
}
