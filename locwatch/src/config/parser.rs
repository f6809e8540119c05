//! INI parsing logic for converting `Ini` → `ServiceConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.
//! Unknown sections and keys are ignored.

use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ServiceConfig;
use crate::permission::PermissionLevel;
use crate::session::RetryPolicy;

/// Parse an `Ini` object into a `ServiceConfig`.
///
/// Starts from `ServiceConfig::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ServiceConfig, ConfigFileError> {
    let mut config = ServiceConfig::default();

    // [accuracy] section
    if let Some(section) = ini.section(Some("accuracy")) {
        for (key, slot) in [
            ("best_meters", &mut config.accuracy.best),
            ("balanced_meters", &mut config.accuracy.balanced),
            ("low_meters", &mut config.accuracy.low),
            (
                "significant_change_meters",
                &mut config.accuracy.significant_change,
            ),
        ] {
            if let Some(v) = section.get(key) {
                *slot = parse_positive_f64("accuracy", key, v)?;
            }
        }
        if !config.accuracy.is_consistent() {
            return Err(ConfigFileError::InvalidValue {
                section: "accuracy".to_string(),
                key: "best_meters".to_string(),
                value: format!(
                    "{}/{}/{}/{}",
                    config.accuracy.best,
                    config.accuracy.balanced,
                    config.accuracy.low,
                    config.accuracy.significant_change
                ),
                reason: "thresholds must satisfy best <= balanced <= low <= significant_change"
                    .to_string(),
            });
        }
    }

    // [permission] section
    if let Some(section) = ini.section(Some("permission")) {
        if let Some(v) = section.get("default_level") {
            config.default_permission_level =
                PermissionLevel::from_str(v).map_err(|_| ConfigFileError::InvalidValue {
                    section: "permission".to_string(),
                    key: "default_level".to_string(),
                    value: v.to_string(),
                    reason: "must be 'when_in_use' or 'always'".to_string(),
                })?;
        }
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        let (mut max_attempts, mut initial_delay, mut max_delay, mut multiplier) =
            config.retry_parts();

        if let Some(v) = section.get("max_attempts") {
            max_attempts = parse_value("retry", "max_attempts", v, "must be an integer >= 1")?;
            if max_attempts == 0 {
                return Err(invalid("retry", "max_attempts", v, "must be an integer >= 1"));
            }
        }
        if let Some(v) = section.get("initial_delay_ms") {
            let ms: u64 = parse_value(
                "retry",
                "initial_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
            initial_delay = Duration::from_millis(ms);
        }
        if let Some(v) = section.get("max_delay_ms") {
            let ms: u64 = parse_value(
                "retry",
                "max_delay_ms",
                v,
                "must be a non-negative integer (milliseconds)",
            )?;
            max_delay = Duration::from_millis(ms);
        }
        if let Some(v) = section.get("multiplier") {
            multiplier = parse_value("retry", "multiplier", v, "must be a number >= 1.0")?;
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid("retry", "multiplier", v, "must be a number >= 1.0"));
            }
        }

        config.start_retry = RetryPolicy::ExponentialBackoff {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier,
        };
    }

    // [events] section
    if let Some(section) = ini.section(Some("events")) {
        if let Some(v) = section.get("channel_capacity") {
            let capacity: usize =
                parse_value("events", "channel_capacity", v, "must be a positive integer")?;
            if capacity == 0 {
                return Err(invalid(
                    "events",
                    "channel_capacity",
                    v,
                    "must be a positive integer",
                ));
            }
            config.event_channel_capacity = capacity;
        }
    }

    Ok(config)
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive_f64(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    let reason = "must be a positive number (meters)";
    let parsed: f64 = parse_value(section, key, value, reason)?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(invalid(section, key, value, reason));
    }
    Ok(parsed)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
