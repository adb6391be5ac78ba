//! Parsing for human-written durations (`1ms`, `2.5s`, `10m`) and data sizes
//! (`0B`, `1kB`, `512MB`).

use std::time::Duration;

/// Parse a duration of the form `<number><unit>`.
///
/// Units: `ns`, `us`, `ms`, `s`, `m`, `h`, `d`. Fractional values are allowed.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let (value, unit) = split_value_unit(s)?;
    let nanos_per_unit: f64 = match unit {
        "ns" => 1.0,
        "us" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        "h" => 3_600.0 * 1_000_000_000.0,
        "d" => 86_400.0 * 1_000_000_000.0,
        _ => return None,
    };
    let nanos = value * nanos_per_unit;
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}

/// Parse a data size of the form `<number><unit>` into bytes.
///
/// Units are 1024-based: `B`, `kB`, `MB`, `GB`, `TB`, `PB`.
pub fn parse_data_size(s: &str) -> Option<u64> {
    let (value, unit) = split_value_unit(s)?;
    let multiplier: f64 = match unit {
        "B" => 1.0,
        "kB" | "KB" => 1024.0,
        "MB" => 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        "TB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "PB" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    let bytes = value * multiplier;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return None;
    }
    Some(bytes.round() as u64)
}

fn split_value_unit(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let split = s.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (num, unit) = s.split_at(split);
    if num.is_empty() {
        return None;
    }
    let value: f64 = num.parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some((value, unit.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1ms"), Some(Duration::from_millis(1)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration(" 250us "), Some(Duration::from_micros(250)));
    }

    #[test]
    fn durations_invalid() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("30"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("5 weeks"), None);
        assert_eq!(parse_duration("1.2.3s"), None);
    }

    #[test]
    fn data_sizes() {
        assert_eq!(parse_data_size("0B"), Some(0));
        assert_eq!(parse_data_size("1B"), Some(1));
        assert_eq!(parse_data_size("1kB"), Some(1024));
        assert_eq!(parse_data_size("1.5MB"), Some(1024 * 1024 + 512 * 1024));
        assert_eq!(parse_data_size("2GB"), Some(2 * 1024 * 1024 * 1024));
    }

    #[test]
    fn data_sizes_invalid() {
        assert_eq!(parse_data_size("10"), None);
        assert_eq!(parse_data_size("10 bytes"), None);
        assert_eq!(parse_data_size("-1B"), None);
    }
}
