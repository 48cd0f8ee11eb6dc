// SPDX-License-Identifier: GPL-3.0-only

//! Preset resolver
//!
//! A preset is a named look: a batch of assignments over generic control
//! ids, written as percentages of each target control's own range so one
//! table fits cameras with different ranges. The resolver rewrites a preset
//! into a concrete batch and hands it to the registry; it never touches the
//! device itself. A look is only offered when every one of its target
//! controls exists on the open device, so a preset can never apply halfway.

use crate::controls::{Control, ControlValue};
use crate::registry::CameraCtrls;
use tracing::debug;

/// The distinguished preset resetting tracked controls to device defaults
pub const DEFAULT_PRESET: &str = "default";

pub struct Preset {
    pub name: &'static str,
    pub assignments: &'static [(&'static str, &'static str)],
}

const LOOKS: &[Preset] = &[
    Preset {
        name: "vivid",
        assignments: &[
            ("contrast", "65%"),
            ("saturation", "72%"),
            ("sharpness", "60%"),
        ],
    },
    Preset {
        name: "soft",
        assignments: &[
            ("contrast", "42%"),
            ("saturation", "46%"),
            ("sharpness", "25%"),
        ],
    },
    Preset {
        name: "bright",
        assignments: &[("brightness", "62%"), ("contrast", "55%")],
    },
    Preset {
        name: "mono",
        assignments: &[("saturation", "0%")],
    },
];

pub struct PresetResolver {
    looks: &'static [Preset],
}

impl Default for PresetResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetResolver {
    pub fn new() -> Self {
        Self { looks: LOOKS }
    }

    /// Generic control ids the resolver tracks: the union of all look
    /// targets. The `default` preset resets exactly this subset.
    pub fn tracked(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = Vec::new();
        for look in self.looks {
            for (id, _) in look.assignments {
                if !ids.contains(id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Presets applicable to this device. A look is listed only when every
    /// target control resolved; `default` is listed when any tracked
    /// control exists.
    pub fn available(&self, ctrls: &CameraCtrls) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .looks
            .iter()
            .filter(|look| {
                look.assignments
                    .iter()
                    .all(|(id, _)| ctrls.control(id).is_some())
            })
            .map(|look| look.name)
            .collect();
        if self.tracked().iter().any(|id| ctrls.control(id).is_some()) {
            names.insert(0, DEFAULT_PRESET);
        }
        names
    }

    /// Apply a preset by name; returns false when the preset does not exist
    /// or is not offered on this device.
    pub fn apply(&self, ctrls: &mut CameraCtrls, name: &str, errs: &mut Vec<String>) -> bool {
        if name == DEFAULT_PRESET {
            let params: Vec<(String, String)> = self
                .tracked()
                .iter()
                .filter(|id| ctrls.control(id).is_some())
                .map(|id| (id.to_string(), "default".to_string()))
                .collect();
            if params.is_empty() {
                errs.push("no tracked controls present to reset".to_string());
                return false;
            }
            debug!(count = params.len(), "Resetting tracked controls to defaults");
            ctrls.setup_ctrls(&params, errs);
            return true;
        }

        let Some(look) = self.looks.iter().find(|look| look.name == name) else {
            errs.push(format!("unknown preset '{}'", name));
            return false;
        };
        if !self.available(ctrls).contains(&look.name) {
            errs.push(format!("preset '{}' is not available on this device", name));
            return false;
        }

        let params: Vec<(String, String)> = look
            .assignments
            .iter()
            .map(|(id, value)| (id.to_string(), value.to_string()))
            .collect();
        ctrls.setup_ctrls(&params, errs);
        true
    }

    /// Whether every tracked control currently sits at its reported
    /// default. Computed on demand, never cached.
    pub fn is_default_active(&self, ctrls: &CameraCtrls) -> bool {
        self.tracked()
            .iter()
            .filter_map(|id| ctrls.control(id))
            .all(at_default)
    }
}

fn at_default(ctrl: &Control) -> bool {
    match (&ctrl.value, &ctrl.default) {
        (Some(ControlValue::Int(value)), Some(ControlValue::Int(default))) => value == default,
        (Some(ControlValue::Bool(value)), Some(ControlValue::Bool(default))) => value == default,
        (Some(ControlValue::Menu(value)), Some(ControlValue::Menu(default))) => value == default,
        // no reported default: nothing to deviate from
        (_, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;
    use crate::v4l2::*;
    use std::sync::Arc;

    fn full_camera() -> CameraCtrls {
        CameraCtrls::new(Arc::new(
            FakeIo::new()
                .with_int_ctrl(V4L2_CID_BRIGHTNESS, "Brightness", 0, 255, 1, 128, 128)
                .with_int_ctrl(V4L2_CID_CONTRAST, "Contrast", 0, 100, 1, 50, 50)
                .with_int_ctrl(V4L2_CID_SATURATION, "Saturation", 0, 200, 1, 100, 100)
                .with_int_ctrl(V4L2_CID_SHARPNESS, "Sharpness", 0, 10, 1, 4, 4),
        ))
    }

    fn no_sharpness_camera() -> CameraCtrls {
        CameraCtrls::new(Arc::new(
            FakeIo::new()
                .with_int_ctrl(V4L2_CID_BRIGHTNESS, "Brightness", 0, 255, 1, 128, 128)
                .with_int_ctrl(V4L2_CID_CONTRAST, "Contrast", 0, 100, 1, 50, 50)
                .with_int_ctrl(V4L2_CID_SATURATION, "Saturation", 0, 200, 1, 100, 100),
        ))
    }

    #[test]
    fn looks_require_every_target_control() {
        let resolver = PresetResolver::new();
        let available = resolver.available(&no_sharpness_camera());
        assert!(available.contains(&"bright"));
        assert!(available.contains(&"mono"));
        assert!(
            !available.contains(&"vivid"),
            "vivid needs sharpness, partial applicability is not allowed"
        );
        assert!(available.contains(&DEFAULT_PRESET));
    }

    #[test]
    fn unavailable_preset_is_refused_whole() {
        let mut ctrls = no_sharpness_camera();
        let resolver = PresetResolver::new();
        let mut errs = Vec::new();
        assert!(!resolver.apply(&mut ctrls, "vivid", &mut errs));
        assert_eq!(errs.len(), 1);
        // nothing was touched
        assert_eq!(
            ctrls.control("contrast").unwrap().value,
            Some(ControlValue::Int(50))
        );
    }

    #[test]
    fn apply_uses_percent_of_each_range() {
        let mut ctrls = full_camera();
        let resolver = PresetResolver::new();
        let mut errs = Vec::new();
        assert!(resolver.apply(&mut ctrls, "vivid", &mut errs));
        assert!(errs.is_empty(), "{errs:?}");
        // contrast 65%: 0 + 50 * 0.65 * 2 = 65
        assert_eq!(
            ctrls.control("contrast").unwrap().value,
            Some(ControlValue::Int(65))
        );
        // saturation 72%: 0 + 100 * 0.72 * 2 = 144
        assert_eq!(
            ctrls.control("saturation").unwrap().value,
            Some(ControlValue::Int(144))
        );
    }

    #[test]
    fn default_preset_resets_and_active_is_computed() {
        let mut ctrls = full_camera();
        let resolver = PresetResolver::new();
        assert!(resolver.is_default_active(&ctrls));

        let mut errs = Vec::new();
        resolver.apply(&mut ctrls, "mono", &mut errs);
        assert!(!resolver.is_default_active(&ctrls));

        assert!(resolver.apply(&mut ctrls, DEFAULT_PRESET, &mut errs));
        assert!(errs.is_empty(), "{errs:?}");
        assert!(resolver.is_default_active(&ctrls));
        assert_eq!(
            ctrls.control("saturation").unwrap().value,
            Some(ControlValue::Int(100))
        );
    }
}
