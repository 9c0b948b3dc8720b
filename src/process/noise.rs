//! Stderr noise filtering.
//!
//! The external tool prints bare progress counters on stderr. Those lines are
//! logged like any other but never count as evidence of a failure.

use regex::Regex;
use std::sync::LazyLock;

static DIGITS_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// Whether a stderr line carries no diagnostic content.
pub fn is_noise(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || DIGITS_ONLY.is_match(trimmed)
}

/// Keep only the lines that count as real error output.
pub fn filter_stderr(raw: &str) -> String {
    raw.lines()
        .filter(|line| !is_noise(line))
        .collect::<Vec<_>>()
        .join("\n")
}
