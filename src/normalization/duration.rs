//! Decision duration handling.
//!
//! Upstream reports `duration` in Go duration syntax (`3h59m12.5s`, `-1m2s`).
//! Whether that value is the original sentence or what remains of it at
//! response time is not settled, so the interpretation is a configuration
//! choice ([`DurationStrategy`]) and is named in the metric help text.

use chrono::{DateTime, TimeDelta, Utc};
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt::Write;

use crate::models::decision::parse_timestamp;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const MILLIS_PER_MINUTE: i64 = 60_000;

/// How the `duration` label of a decision is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DurationStrategy {
    /// `remaining + (now - reference)`, rounded to the nearest minute.
    #[default]
    Remaining,
    /// `until - created_at`.
    Window,
    /// The upstream string, unchanged.
    Raw,
}

impl DurationStrategy {
    /// Sentence used in the metric help text.
    pub fn describe(&self) -> &'static str {
        match self {
            DurationStrategy::Remaining => {
                "duration is the original ban length, reconstructed as remaining duration plus time elapsed since alert creation, rounded to the minute"
            }
            DurationStrategy::Window => "duration is the decision window, until minus created_at",
            DurationStrategy::Raw => "duration is passed through as reported by the local API",
        }
    }
}

/// Timestamps and the raw value a duration is derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationInputs<'a> {
    /// Upstream `duration` string.
    pub reported: &'a str,
    /// Decision `created_at`, or the owning alert's when the decision has none.
    pub created_at: &'a str,
    pub until: &'a str,
    /// Instant the remaining duration is measured from (alert creation).
    pub reference: &'a str,
}

/// Applies `strategy`; returns an empty string when the inputs do not support it.
pub fn reconcile(strategy: DurationStrategy, inputs: DurationInputs<'_>, now: DateTime<Utc>) -> String {
    match strategy {
        DurationStrategy::Remaining => original_from_remaining(inputs.reported, inputs.reference, now)
            .map(format_duration)
            .unwrap_or_default(),
        DurationStrategy::Window => window(inputs.created_at, inputs.until)
            .map(format_duration)
            .unwrap_or_default(),
        DurationStrategy::Raw => inputs.reported.to_string(),
    }
}

/// `remaining + (now - reference)`, rounded to the nearest minute so that
/// near-identical poll cycles produce the same label.
pub fn original_from_remaining(remaining: &str, reference: &str, now: DateTime<Utc>) -> Option<TimeDelta> {
    if remaining.is_empty() {
        return None;
    }
    let remaining = parse_go_duration(remaining)?;
    let reference = parse_timestamp(reference)?;
    let elapsed = now.signed_duration_since(reference);
    remaining.checked_add(&elapsed).map(round_to_minute)
}

pub fn window(created_at: &str, until: &str) -> Option<TimeDelta> {
    let created_at = parse_timestamp(created_at)?;
    let until = parse_timestamp(until)?;
    Some(until.signed_duration_since(created_at))
}

/// Rounds half away from zero, like Go's `Duration.Round(time.Minute)`.
pub fn round_to_minute(d: TimeDelta) -> TimeDelta {
    let ms = d.num_milliseconds();
    let rem = ms % MILLIS_PER_MINUTE;
    let mut rounded = ms - rem;
    if rem.abs() * 2 >= MILLIS_PER_MINUTE {
        rounded += MILLIS_PER_MINUTE * rem.signum();
    }
    TimeDelta::milliseconds(rounded)
}

/// Parses Go duration syntax: an optional sign followed by one or more
/// `<number><unit>` pairs, units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
pub fn parse_go_duration(input: &str) -> Option<TimeDelta> {
    let s = input.trim();
    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest == "0" {
        return Some(TimeDelta::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let scale: i128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3_600 * NANOS_PER_SECOND,
            _ => return None,
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut value = whole.checked_mul(scale)?;
        if !fraction.is_empty() {
            let digits: i128 = fraction.parse().ok()?;
            let denominator = 10i128.checked_pow(fraction.len() as u32)?;
            value = value.checked_add(digits.checked_mul(scale)? / denominator)?;
        }
        total = total.checked_add(value)?;
    }

    let nanos = i64::try_from(if negative { -total } else { total }).ok()?;
    Some(TimeDelta::nanoseconds(nanos))
}

/// Compact rendering: only non-zero hour, minute and second components
/// (`1h`, `1h30m`, `45m`, `1.5s`), `0s` for zero. Millisecond resolution.
pub fn format_duration(d: TimeDelta) -> String {
    let total_ms = d.num_milliseconds();
    if total_ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    if total_ms < 0 {
        out.push('-');
    }
    let ms = total_ms.unsigned_abs();
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1_000) % 60;
    let millis = ms % 1_000;

    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    if millis > 0 {
        let fraction = format!("{:03}", millis);
        let _ = write!(out, "{}.{}s", seconds, fraction.trim_end_matches('0'));
    } else if seconds > 0 {
        let _ = write!(out, "{}s", seconds);
    }
    out
}
