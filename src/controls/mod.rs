// SPDX-License-Identifier: GPL-3.0-only

//! Polymorphic control model
//!
//! One [`Control`] describes one configurable device parameter, whichever
//! surface it lives on. The kind is decided once at discovery time and the
//! variant payload is immutable afterwards; only `value` and `enabled` track
//! the device. Provider addressing stays crate-private so consumers can
//! never bypass the registry.

use crate::device::CtrlChange;
use std::fmt;

pub mod brio;
pub mod fmt_ctrls;
pub mod kiyo;
pub mod logitech;
pub mod logitech_motor;
pub mod v4l2_ctrls;

/// Control kind, fixed at discovery time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Integer,
    Boolean,
    Menu,
    Button,
    Info,
}

/// Current or default value of a control
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Int(i32),
    Bool(bool),
    /// Symbolic id of the active menu entry
    Menu(String),
    /// Display-only string
    Info(String),
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Int(v) => write!(f, "{}", v),
            ControlValue::Bool(v) => write!(f, "{}", if *v { "1" } else { "0" }),
            ControlValue::Menu(id) => write!(f, "{}", id),
            ControlValue::Info(text) => write!(f, "{}", text),
        }
    }
}

/// Device-side payload of one menu entry; what a provider writes when the
/// entry is selected.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MenuPayload {
    /// Menu index of the generic registry
    Index(i32),
    /// Single byte at the owning control's buffer offset
    Byte(u8),
    /// Complete buffer sent via SET_CUR, optionally preceded by a staging
    /// buffer (the Kiyo FoV two-phase write)
    Bytes {
        value: &'static [u8],
        before: Option<&'static [u8]>,
    },
    /// The entry id itself is the wire value (format menus)
    Label,
}

#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    pub(crate) payload: MenuPayload,
}

impl MenuEntry {
    pub(crate) fn new(id: &str, label: &str, payload: MenuPayload) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            payload,
        }
    }
}

/// Crate-private provider addressing; the opaque back-reference of the
/// control model.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlAddr {
    V4l2(u32),
    PixelFormat,
    Resolution,
    FrameRate,
    Colorspace,
    /// Value byte at `offset` inside the `len`-byte buffer of `selector`
    XuByte { selector: u8, len: u16, offset: usize },
    /// Whole-buffer writes; the payload lives in the menu entries
    XuBytes { selector: u8 },
}

/// One configurable device parameter, normalized across protocols
#[derive(Debug, Clone)]
pub struct Control {
    /// Stable symbolic id, unique within a device session
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub kind: ControlKind,
    pub value: Option<ControlValue>,
    pub default: Option<ControlValue>,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub step: Option<i32>,
    pub menu: Vec<MenuEntry>,
    /// False while the device disallows writes (e.g. absolute exposure
    /// under auto exposure)
    pub enabled: bool,
    /// Changing this control only takes effect after the handle is closed
    /// and reopened
    pub requires_reopen: bool,
    /// Changing this control may flip the enabled state of others
    pub updater: bool,
    pub tooltip: Option<&'static str>,
    pub(crate) addr: ControlAddr,
}

impl Control {
    pub(crate) fn new(id: &str, name: &str, kind: ControlKind, addr: ControlAddr) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            value: None,
            default: None,
            min: None,
            max: None,
            step: None,
            menu: Vec::new(),
            enabled: true,
            requires_reopen: false,
            updater: false,
            tooltip: None,
            addr,
        }
    }

    pub fn menu_entry(&self, id: &str) -> Option<&MenuEntry> {
        self.menu.iter().find(|entry| entry.id == id)
    }

    pub(crate) fn menu_entry_by_index(&self, index: i32) -> Option<&MenuEntry> {
        self.menu
            .iter()
            .find(|entry| entry.payload == MenuPayload::Index(index))
    }

    pub(crate) fn menu_entry_by_byte(&self, byte: u8) -> Option<&MenuEntry> {
        self.menu
            .iter()
            .find(|entry| entry.payload == MenuPayload::Byte(byte))
    }
}

/// Discovery and mutation strategy for one control surface.
///
/// A provider whose hardware class is absent exposes an empty control set;
/// that is never an error.
pub trait ControlProvider: Send {
    /// Short tag used in warnings and log lines
    fn tag(&self) -> &'static str;

    fn controls(&self) -> &[Control];

    /// Apply one assignment if this provider owns `id`.
    ///
    /// Returns `None` when the id is not one of this provider's controls,
    /// `Some(reopen_needed)` otherwise; failures append to `errs` and count
    /// as `Some(false)`.
    fn apply_one(&mut self, id: &str, value: &str, errs: &mut Vec<String>) -> Option<bool>;

    /// Refresh volatile metadata (enabled flags) from the device.
    fn refresh(&mut self) {}

    /// Apply a device-pushed change notification; returns the updated
    /// control when this provider owns it.
    fn handle_event(&mut self, change: &CtrlChange) -> Option<Control> {
        let _ = change;
        None
    }

    /// Re-poll controls that never emit change notifications; returns the id
    /// of the first one that differs from the cached state.
    fn poll_reopen(&mut self) -> Option<String> {
        None
    }
}

// ===== Name normalization and value parsing =====

/// Derive the stable symbolic id from a human-readable control name:
/// lowercase, whitespace and dashes collapsed to underscores, punctuation
/// dropped.
pub fn to_text_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            ' ' | '-' => id.push('_'),
            ',' | '&' | '(' | '.' | ')' | '/' => {}
            _ => id.extend(ch.to_lowercase()),
        }
    }
    while id.contains("__") {
        id = id.replace("__", "_");
    }
    id
}

/// Boolean vocabulary accepted by mutation calls
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "y" | "yes" | "t" | "true" | "on" | "1"
    )
}

/// Snap a value onto the control's step grid, anchored at `min`.
pub(crate) fn snap_to_step(value: i32, min: i32, step: i32) -> i32 {
    if step <= 1 {
        return value;
    }
    let offset = value as i64 - min as i64;
    let step = step as i64;
    let snapped = min as i64 + ((offset + step / 2) / step) * step;
    snapped as i32
}

/// Resolve the string form of an Integer assignment: a plain number, the
/// `"default"` token, or `"<n>%"` meaning `min + (default - min) * pct * 2`
/// clamped to the control's range.
pub(crate) fn resolve_int(ctrl: &Control, raw: &str) -> Result<i32, String> {
    if raw == "default" {
        return match ctrl.default {
            Some(ControlValue::Int(v)) => Ok(v),
            _ => Err(format!("{} has no known default", ctrl.id)),
        };
    }

    if let Some(pct_str) = raw.strip_suffix('%') {
        let pct: f64 = pct_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid percentage '{}' for {}", raw, ctrl.id))?;
        let (Some(min), Some(max), Some(ControlValue::Int(default))) =
            (ctrl.min, ctrl.max, ctrl.default.clone())
        else {
            return Err(format!("{} does not support percentages", ctrl.id));
        };
        let value = min as f64 + (default - min) as f64 * pct * 2.0 / 100.0;
        let value = (value.round() as i64).clamp(min as i64, max as i64) as i32;
        return Ok(snap_to_step(value, min, ctrl.step.unwrap_or(1)));
    }

    raw.parse::<i32>()
        .map_err(|_| format!("invalid value '{}' for {}", raw, ctrl.id))
}

pub(crate) fn find_control_mut<'a>(ctrls: &'a mut [Control], id: &str) -> Option<&'a mut Control> {
    ctrls.iter_mut().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer_ctrl(min: i32, max: i32, step: i32, default: i32) -> Control {
        let mut ctrl = Control::new("gain", "Gain", ControlKind::Integer, ControlAddr::V4l2(1));
        ctrl.min = Some(min);
        ctrl.max = Some(max);
        ctrl.step = Some(step);
        ctrl.default = Some(ControlValue::Int(default));
        ctrl
    }

    #[test]
    fn text_id_normalization() {
        assert_eq!(to_text_id("Brightness"), "brightness");
        assert_eq!(
            to_text_id("White Balance Temperature, Auto"),
            "white_balance_temperature_auto"
        );
        assert_eq!(to_text_id("Exposure (Absolute)"), "exposure_absolute");
        assert_eq!(to_text_id("Pan/Tilt Reset"), "pantilt_reset");
    }

    #[test]
    fn bool_vocabulary() {
        for raw in ["y", "Yes", "t", "TRUE", "on", "1"] {
            assert!(parse_bool(raw), "{raw} should parse true");
        }
        for raw in ["n", "no", "off", "0", "2", ""] {
            assert!(!parse_bool(raw), "{raw} should parse false");
        }
    }

    #[test]
    fn percent_is_relative_to_default() {
        let ctrl = integer_ctrl(0, 100, 1, 50);
        assert_eq!(resolve_int(&ctrl, "75%").unwrap(), 75);
        assert_eq!(resolve_int(&ctrl, "50%").unwrap(), 50);
        assert_eq!(resolve_int(&ctrl, "0%").unwrap(), 0);
        // 100% lands at twice the default, clamped to the range
        assert_eq!(resolve_int(&ctrl, "100%").unwrap(), 100);
    }

    #[test]
    fn percent_clamps_and_snaps() {
        let ctrl = integer_ctrl(-10, 10, 5, 0);
        // 90% of the default-relative span is 8, snapped onto the grid
        assert_eq!(resolve_int(&ctrl, "90%").unwrap(), 10);
        let wide = integer_ctrl(0, 255, 1, 200);
        // 2 * default exceeds the range
        assert_eq!(resolve_int(&wide, "100%").unwrap(), 255);
    }

    #[test]
    fn default_token_and_plain_numbers() {
        let ctrl = integer_ctrl(0, 100, 1, 42);
        assert_eq!(resolve_int(&ctrl, "default").unwrap(), 42);
        assert_eq!(resolve_int(&ctrl, "7").unwrap(), 7);
        assert!(resolve_int(&ctrl, "up").is_err());
    }

    #[test]
    fn step_snapping() {
        assert_eq!(snap_to_step(7, 0, 5), 5);
        assert_eq!(snap_to_step(8, 0, 5), 10);
        assert_eq!(snap_to_step(7, 2, 5), 7);
        assert_eq!(snap_to_step(123, 0, 1), 123);
    }
}
