// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the public control model helpers

use camctl::controls::{parse_bool, to_text_id};
use camctl::{ControlValue, CtrlError};

#[test]
fn kernel_names_normalize_to_stable_ids() {
    // names as reported by real drivers
    assert_eq!(to_text_id("Backlight Compensation"), "backlight_compensation");
    assert_eq!(to_text_id("Exposure (Absolute)"), "exposure_absolute");
    assert_eq!(to_text_id("Power Line Frequency"), "power_line_frequency");
    assert_eq!(to_text_id("White Balance Temperature, Auto"), "white_balance_temperature_auto");
    assert_eq!(to_text_id("Focus, Automatic Continuous"), "focus_automatic_continuous");
}

#[test]
fn boolean_vocabulary_is_forgiving() {
    assert!(parse_bool("ON"));
    assert!(parse_bool("1"));
    assert!(!parse_bool("off"));
    assert!(!parse_bool("maybe"));
}

#[test]
fn values_render_for_display() {
    assert_eq!(ControlValue::Int(-42).to_string(), "-42");
    assert_eq!(ControlValue::Bool(true).to_string(), "1");
    assert_eq!(ControlValue::Menu("wide".to_string()).to_string(), "wide");
    assert_eq!(ControlValue::Info("sRGB".to_string()).to_string(), "sRGB");
}

#[test]
fn errors_carry_the_device_path() {
    let err = CtrlError::NotCaptureDevice("/dev/video7".to_string());
    assert!(err.to_string().contains("/dev/video7"));
}
