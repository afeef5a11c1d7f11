//! Pattern duration estimation
//!
//! Infers an expected playback duration from pattern source text without
//! executing it, so an automatic full-pattern capture knows how long to
//! run. This is a best-effort scan for numeric literals, not a semantic
//! interpreter of the pattern language: computed or non-literal rate/slow
//! expressions are invisible to it, and callers must not treat the output
//! as exact for such patterns.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tempo assumed when the text sets none
pub const DEFAULT_CPM: f64 = 60.0;

/// Cycle-length factor assumed when the text stretches nothing
pub const DEFAULT_CYCLE_FACTOR: f64 = 1.0;

fn cpm_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"setcpm\s*\(\s*([0-9]+(?:\.[0-9]+)?)").unwrap())
}

fn slow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.slow\s*\(\s*([0-9]+(?:\.[0-9]+)?)").unwrap())
}

/// Estimated playback duration of a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationEstimate {
    pub cycles_per_minute: f64,
    /// The largest slow-down factor found; the longest sub-pattern is
    /// assumed to determine total loop length
    pub cycle_count: f64,
    /// Estimated duration in seconds, 2 decimals
    pub seconds: f64,
    /// `minutes:seconds`, seconds zero-padded to 2 digits
    ///
    /// Built from the total rounded to whole seconds, so the seconds field
    /// carries into the minutes: 59.6s reads "1:00", never "0:60".
    pub formatted: String,
}

/// Errors from duration estimation
///
/// Absence of rate/slow calls is not an error; the estimate degrades to
/// defaults instead.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    #[error("cycles per minute must be positive, got {0}")]
    NonPositiveTempo(f64),

    #[error("malformed numeric literal: {0}")]
    Malformed(String),
}

/// Estimate total playback duration from pattern source text
pub fn estimate(source: &str) -> Result<DurationEstimate, EstimateError> {
    let cycles_per_minute = match cpm_regex().captures(source) {
        Some(caps) => parse_literal(&caps[1])?,
        None => DEFAULT_CPM,
    };
    if cycles_per_minute <= 0.0 {
        return Err(EstimateError::NonPositiveTempo(cycles_per_minute));
    }

    let mut cycle_count = DEFAULT_CYCLE_FACTOR;
    for caps in slow_regex().captures_iter(source) {
        cycle_count = cycle_count.max(parse_literal(&caps[1])?);
    }

    let seconds = round2(cycle_count / cycles_per_minute * 60.0);
    let total = seconds.round() as i64;
    let formatted = format!("{}:{:02}", total / 60, total % 60);

    debug!(
        cycles_per_minute,
        cycle_count, seconds, "estimated pattern duration"
    );

    Ok(DurationEstimate {
        cycles_per_minute,
        cycle_count,
        seconds,
        formatted,
    })
}

fn parse_literal(text: &str) -> Result<f64, EstimateError> {
    text.parse::<f64>()
        .map_err(|_| EstimateError::Malformed(text.to_string()))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
