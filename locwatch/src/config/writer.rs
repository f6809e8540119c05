//! INI serialization logic for converting `ServiceConfig` → INI string.

use super::settings::ServiceConfig;

/// Convert a `ServiceConfig` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ServiceConfig) -> String {
    let (max_attempts, initial_delay, max_delay, multiplier) = config.retry_parts();

    format!(
        r#"[accuracy]
; Worst acceptable horizontal accuracy per tier, in meters.
; Fixes less accurate than the subscriber's tier are withheld.
best_meters = {}
balanced_meters = {}
low_meters = {}
significant_change_meters = {}

[permission]
; Level requested when a subscription needs a permission prompt:
;   when_in_use - access while the application is in use
;   always      - access at all times
default_level = {}

[retry]
; Retries for starting location updates while the signal is unavailable.
; max_attempts includes the first attempt (1 = never retry).
max_attempts = {}
initial_delay_ms = {}
max_delay_ms = {}
multiplier = {}

[events]
; Capacity of the service-wide event broadcast.
channel_capacity = {}
"#,
        config.accuracy.best,
        config.accuracy.balanced,
        config.accuracy.low,
        config.accuracy.significant_change,
        config.default_permission_level,
        max_attempts,
        initial_delay.as_millis(),
        max_delay.as_millis(),
        multiplier,
        config.event_channel_capacity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionLevel;

    #[test]
    fn test_written_config_parses_back() {
        let config = ServiceConfig::default()
            .with_default_permission_level(PermissionLevel::Always)
            .with_event_channel_capacity(16);
        let text = to_config_string(&config);
        let ini = ini::Ini::load_from_str(&text).unwrap();
        assert_eq!(super::super::parser::parse_ini(&ini).unwrap(), config);
    }

    #[test]
    fn test_contains_all_sections() {
        let text = to_config_string(&ServiceConfig::default());
        for section in ["[accuracy]", "[permission]", "[retry]", "[events]"] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("default_level = when_in_use"));
    }
}
