use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Parsing of configuration values from their environment-variable string
/// form. A value that fails to parse falls back to the built-in default with
/// a warning rather than aborting startup.
pub trait ParseConfigValue: Sized {
    fn parse_config(field: &str, raw: Option<String>, default: Self) -> Self;
}

fn parse_with<T, F>(field: &str, raw: Option<String>, default: T, parse: F) -> T
where
    F: FnOnce(&str) -> Option<T>,
{
    let Some(raw) = raw else {
        return default;
    };
    match parse(raw.trim()) {
        Some(v) => v,
        None => {
            warn!("Ignoring unparsable value {raw:?} for config field {field}; using the default");
            default
        },
    }
}

macro_rules! impl_parse_via_from_str {
    ($($t:ty),+) => {
        $(
            impl ParseConfigValue for $t {
                fn parse_config(field: &str, raw: Option<String>, default: Self) -> Self {
                    parse_with(field, raw, default, |s| <$t>::from_str(s).ok())
                }
            }
        )+
    };
}

impl_parse_via_from_str!(bool, i64, u64, usize, f64, String);

/// Durations accept an integer with an optional unit suffix: `ns`, `us`,
/// `ms`, or `s`. A bare integer is taken as milliseconds.
impl ParseConfigValue for Duration {
    fn parse_config(field: &str, raw: Option<String>, default: Self) -> Self {
        parse_with(field, raw, default, parse_duration_str)
    }
}

fn parse_duration_str(s: &str) -> Option<Duration> {
    let (digits, to_duration): (&str, fn(u64) -> Duration) = if let Some(v) = s.strip_suffix("ns") {
        (v, Duration::from_nanos)
    } else if let Some(v) = s.strip_suffix("us") {
        (v, Duration::from_micros)
    } else if let Some(v) = s.strip_suffix("ms") {
        (v, Duration::from_millis)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, Duration::from_secs)
    } else {
        (s, Duration::from_millis)
    };
    digits.trim().parse::<u64>().ok().map(to_duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_suffixes() {
        assert_eq!(parse_duration_str("50ms"), Some(Duration::from_millis(50)));
        assert_eq!(parse_duration_str("1us"), Some(Duration::from_micros(1)));
        assert_eq!(parse_duration_str("250ns"), Some(Duration::from_nanos(250)));
        assert_eq!(parse_duration_str("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration_str("75"), Some(Duration::from_millis(75)));
        assert_eq!(parse_duration_str("abc"), None);
    }

    #[test]
    fn unparsable_value_falls_back_to_default() {
        let v = i64::parse_config("min_budget", Some("not-a-number".into()), 1024);
        assert_eq!(v, 1024);
    }

    #[test]
    fn missing_value_keeps_default() {
        let v = bool::parse_config("activated", None, true);
        assert!(v);
    }
}
