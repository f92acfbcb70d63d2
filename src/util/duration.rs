//! Duration parser for CLI arguments.
//!
//! Supports compound Go-style durations:
//! - Single unit: `300ms`, `5s`, `30m`, `1h`
//! - Compound: `1h30m`, `2m30s`
//! - Zero: `0`

use std::time::Duration;

/// Error type for duration parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationParseError {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to parse duration '{}': {}",
            self.input, self.message
        )
    }
}

impl std::error::Error for DurationParseError {}

/// Parses a duration such as `300ms`, `1s`, `2m`, `1h30m` or `0`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use slurmtop::util::parse_duration;
///
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let input = input.trim();
    let error = |message: &str| DurationParseError {
        input: input.to_string(),
        message: message.to_string(),
    };

    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(error("empty input"));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| error("missing unit, use ms, s, m or h"))?;
        if digits == 0 {
            return Err(error("expected a number"));
        }
        let number: u64 = rest[..digits]
            .parse()
            .map_err(|_| error("number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let secs = |factor: u64| {
            number
                .checked_mul(factor)
                .map(Duration::from_secs)
                .ok_or_else(|| error("number out of range"))
        };
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(number),
            "s" => Duration::from_secs(number),
            "m" => secs(60)?,
            "h" => secs(3600)?,
            _ => return Err(error("unknown unit, use ms, s, m or h")),
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| error("number out of range"))?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}

/// Formats a duration compactly, e.g. `1h30m`, `45s`, `300ms`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.subsec_millis());
    }

    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}s", s));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_compound() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(
            parse_duration("2m30s500ms").unwrap(),
            Duration::from_millis(150_500)
        );
    }

    #[test]
    fn test_zero() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_formats() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("m5").is_err());
    }

    #[test]
    fn test_out_of_range_is_error() {
        let err = parse_duration("6000000000000000h").unwrap_err();
        assert_eq!(err.message, "number out of range");
        let err = parse_duration("18446744073709551615s1s").unwrap_err();
        assert_eq!(err.message, "number out of range");
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_millis(300)), "300ms");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
    }
}
