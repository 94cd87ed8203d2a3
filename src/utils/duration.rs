use crate::error::{AppError, Result};
use std::time::Duration;

/// Parse a human duration such as `500ms`, `10s`, `2m`, `1h` or bare seconds
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AppError::parse("Duration cannot be empty"));
    }
    // Reject signs and radix prefixes that str::parse would otherwise accept or mangle
    if s.starts_with('+') || s.starts_with('-') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(AppError::parse(format!("Invalid duration: {}", input)));
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| AppError::parse(format!("Invalid duration: {}", input)))?;

    let seconds = match unit.trim() {
        "" | "s" | "sec" | "secs" => value,
        "ms" => value / 1000.0,
        "m" | "min" | "mins" => value * 60.0,
        "h" | "hr" | "hrs" => value * 3600.0,
        other => {
            return Err(AppError::parse(format!(
                "Invalid duration unit '{}' in '{}' (use ms, s, m or h)",
                other, input
            )))
        }
    };

    if !seconds.is_finite() {
        return Err(AppError::parse(format!("Invalid duration: {}", input)));
    }

    Duration::try_from_secs_f64(seconds)
        .map_err(|_| AppError::parse(format!("Duration out of range: {}", input)))
}

/// Parse a `--duration` value; `None` means the explicit `infinite` opt-in
pub fn parse_run_duration(input: &str) -> Result<Option<Duration>> {
    match input.trim().to_lowercase().as_str() {
        "infinite" | "inf" | "forever" => Ok(None),
        _ => {
            let duration = parse_duration(input)?;
            if duration.is_zero() {
                return Err(AppError::parse("Run duration must be greater than 0"));
            }
            Ok(Some(duration))
        }
    }
}

/// Format a duration compactly for summaries and progress lines
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let whole = duration.as_secs();
        format!("{}m{:02}s", whole / 60, whole % 60)
    }
}
