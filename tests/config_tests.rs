// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration handling

use camctl::Config;
use std::time::Duration;

#[test]
fn default_poll_timeout_is_one_second() {
    let config = Config::default();
    assert_eq!(config.poll_timeout(), Duration::from_secs(1));
    assert!(config.device.is_none());
}

#[test]
fn zero_timeout_is_never_a_busy_wait() {
    let config = Config {
        device: None,
        poll_timeout_ms: 0,
    };
    assert!(config.poll_timeout() >= Duration::from_millis(1));
}

#[test]
fn config_round_trips_through_json() {
    let config = Config {
        device: Some("/dev/video2".to_string()),
        poll_timeout_ms: 250,
    };
    let raw = serde_json::to_string(&config).unwrap();
    let parsed: Config = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let parsed: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed, Config::default());
}
