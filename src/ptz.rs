// SPDX-License-Identifier: GPL-3.0-only

//! PTZ unification layer
//!
//! Cameras disagree wildly about motion control: some expose continuous
//! speed controls, some absolute positions, some only vendor relative-step
//! commands. [`PtzController`] inspects the registry once at construction
//! and routes every operation to the best primitive the device has, in the
//! order speed > absolute-with-software-stepping > vendor step. An axis with
//! no primitive turns the operation into a no-op that reports nothing
//! changed.
//!
//! Numbered presets are a device-independent convention: a slot snapshots
//! the current absolute position in process memory and can be recalled
//! within the same session. Nothing is stored on the device.

use crate::constants::PTZ_PRESET_SLOTS;
use crate::controls::ControlValue;
use crate::registry::CameraCtrls;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Outcome of one PTZ operation
#[derive(Debug, Default)]
pub struct PtzResult {
    /// Whether any control changed; false for no-ops on missing primitives
    pub changed: bool,
    pub warnings: Vec<String>,
}

impl PtzResult {
    fn noop() -> Self {
        Self::default()
    }
}

/// Which physical primitives the open device offers, derived once
#[derive(Debug, Clone, Copy, Default)]
pub struct PtzCaps {
    pub pan_speed: bool,
    pub tilt_speed: bool,
    pub pan_absolute: bool,
    pub tilt_absolute: bool,
    pub zoom_absolute: bool,
    pub pan_step_vendor: bool,
    pub tilt_step_vendor: bool,
    pub reset_vendor: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct PtzPosition {
    pan: Option<i32>,
    tilt: Option<i32>,
    zoom: Option<i32>,
}

pub struct PtzController {
    ctrls: Arc<Mutex<CameraCtrls>>,
    caps: PtzCaps,
    slots: HashMap<u8, PtzPosition>,
}

impl PtzController {
    pub fn new(ctrls: Arc<Mutex<CameraCtrls>>) -> Self {
        let caps = match ctrls.lock() {
            Ok(ctrls) => PtzCaps {
                pan_speed: ctrls.control("pan_speed").is_some(),
                tilt_speed: ctrls.control("tilt_speed").is_some(),
                pan_absolute: ctrls.control("pan_absolute").is_some(),
                tilt_absolute: ctrls.control("tilt_absolute").is_some(),
                zoom_absolute: ctrls.control("zoom_absolute").is_some(),
                pan_step_vendor: ctrls.control("logitech_pan_step").is_some(),
                tilt_step_vendor: ctrls.control("logitech_tilt_step").is_some(),
                reset_vendor: ctrls.control("logitech_pantilt_reset").is_some(),
            },
            Err(_) => PtzCaps::default(),
        };
        debug!(?caps, "PTZ capabilities");
        Self {
            ctrls,
            caps,
            slots: HashMap::new(),
        }
    }

    pub fn caps(&self) -> PtzCaps {
        self.caps
    }

    // ===== step operations =====

    pub fn pan_step(&mut self, delta: i32) -> PtzResult {
        if self.caps.pan_absolute {
            return self.step_absolute("pan_absolute", delta, 1);
        }
        if self.caps.pan_step_vendor {
            return self.step_vendor("logitech_pan_step", delta, "left", "right");
        }
        PtzResult::noop()
    }

    pub fn tilt_step(&mut self, delta: i32) -> PtzResult {
        if self.caps.tilt_absolute {
            return self.step_absolute("tilt_absolute", delta, 1);
        }
        if self.caps.tilt_step_vendor {
            return self.step_vendor("logitech_tilt_step", delta, "down", "up");
        }
        PtzResult::noop()
    }

    pub fn zoom_step(&mut self, delta: i32) -> PtzResult {
        if self.caps.zoom_absolute {
            return self.step_absolute("zoom_absolute", delta, 100);
        }
        PtzResult::noop()
    }

    /// Coarse zoom stepping for jog wheels and page keys
    pub fn zoom_step_big(&mut self, delta: i32) -> PtzResult {
        if self.caps.zoom_absolute {
            return self.step_absolute("zoom_absolute", delta, 10);
        }
        PtzResult::noop()
    }

    // ===== speed operations =====

    pub fn pan_speed(&mut self, rate: i32) -> PtzResult {
        if !self.caps.pan_speed {
            return PtzResult::noop();
        }
        self.set_clamped("pan_speed", rate)
    }

    pub fn tilt_speed(&mut self, rate: i32) -> PtzResult {
        if !self.caps.tilt_speed {
            return PtzResult::noop();
        }
        self.set_clamped("tilt_speed", rate)
    }

    // ===== percent operations =====

    pub fn pan_percent(&mut self, fraction: f64) -> PtzResult {
        if !self.caps.pan_absolute {
            return PtzResult::noop();
        }
        self.set_percent("pan_absolute", fraction)
    }

    pub fn tilt_percent(&mut self, fraction: f64) -> PtzResult {
        if !self.caps.tilt_absolute {
            return PtzResult::noop();
        }
        self.set_percent("tilt_absolute", fraction)
    }

    pub fn zoom_percent(&mut self, fraction: f64) -> PtzResult {
        if !self.caps.zoom_absolute {
            return PtzResult::noop();
        }
        self.set_percent("zoom_absolute", fraction)
    }

    // ===== reset and presets =====

    /// Return every available axis to its home position.
    pub fn reset(&mut self) -> PtzResult {
        let mut params: Vec<(String, String)> = Vec::new();
        for (available, id) in [
            (self.caps.pan_absolute, "pan_absolute"),
            (self.caps.tilt_absolute, "tilt_absolute"),
            (self.caps.zoom_absolute, "zoom_absolute"),
        ] {
            if available {
                params.push((id.to_string(), "default".to_string()));
            }
        }
        if !params.is_empty() {
            return self.apply(params);
        }
        if self.caps.reset_vendor {
            return self.apply(vec![(
                "logitech_pantilt_reset".to_string(),
                "both".to_string(),
            )]);
        }
        PtzResult::noop()
    }

    /// Snapshot the current absolute position into a numbered slot.
    pub fn store_preset(&mut self, slot: u8) -> PtzResult {
        if !(1..=PTZ_PRESET_SLOTS).contains(&slot) {
            return PtzResult {
                changed: false,
                warnings: vec![format!("preset slot {} is out of range", slot)],
            };
        }
        let position = {
            let Ok(ctrls) = self.ctrls.lock() else {
                return poisoned();
            };
            PtzPosition {
                pan: int_value(&ctrls, "pan_absolute"),
                tilt: int_value(&ctrls, "tilt_absolute"),
                zoom: int_value(&ctrls, "zoom_absolute"),
            }
        };
        if position.pan.is_none() && position.tilt.is_none() && position.zoom.is_none() {
            return PtzResult {
                changed: false,
                warnings: vec!["no absolute position controls to store".to_string()],
            };
        }
        debug!(slot, ?position, "Storing PTZ preset");
        self.slots.insert(slot, position);
        PtzResult {
            changed: true,
            warnings: Vec::new(),
        }
    }

    /// Move back to a stored slot; empty slots only warn.
    pub fn recall_preset(&mut self, slot: u8) -> PtzResult {
        if !(1..=PTZ_PRESET_SLOTS).contains(&slot) {
            return PtzResult {
                changed: false,
                warnings: vec![format!("preset slot {} is out of range", slot)],
            };
        }
        let Some(position) = self.slots.get(&slot).copied() else {
            return PtzResult {
                changed: false,
                warnings: vec![format!("preset slot {} is empty", slot)],
            };
        };
        let mut params: Vec<(String, String)> = Vec::new();
        for (value, id) in [
            (position.pan, "pan_absolute"),
            (position.tilt, "tilt_absolute"),
            (position.zoom, "zoom_absolute"),
        ] {
            if let Some(value) = value {
                params.push((id.to_string(), value.to_string()));
            }
        }
        self.apply(params)
    }

    // ===== primitives =====

    fn apply(&self, params: Vec<(String, String)>) -> PtzResult {
        let mut warnings = Vec::new();
        let Ok(mut ctrls) = self.ctrls.lock() else {
            return poisoned();
        };
        ctrls.setup_ctrls(&params, &mut warnings);
        PtzResult {
            changed: warnings.is_empty(),
            warnings,
        }
    }

    /// Software stepping over an absolute control: current + delta steps,
    /// clamped to the control's range. `range_divisor` coarsens axes whose
    /// driver step is far finer than one useful nudge.
    fn step_absolute(&self, id: &str, delta: i32, range_divisor: i32) -> PtzResult {
        if delta == 0 {
            return PtzResult::noop();
        }
        let target = {
            let Ok(ctrls) = self.ctrls.lock() else {
                return poisoned();
            };
            let Some(ctrl) = ctrls.control(id) else {
                return PtzResult::noop();
            };
            let (Some(min), Some(max), Some(ControlValue::Int(current))) =
                (ctrl.min, ctrl.max, ctrl.value.clone())
            else {
                return PtzResult::noop();
            };
            let step = ctrl.step.unwrap_or(1).max(1) as i64;
            let unit = if range_divisor > 1 {
                step.max((max as i64 - min as i64) / range_divisor as i64)
            } else {
                step
            };
            let target = (current as i64 + delta as i64 * unit).clamp(min as i64, max as i64);
            if target == current as i64 {
                return PtzResult::noop();
            }
            target
        };
        self.apply(vec![(id.to_string(), target.to_string())])
    }

    fn step_vendor(&self, id: &str, delta: i32, negative: &str, positive: &str) -> PtzResult {
        if delta == 0 {
            return PtzResult::noop();
        }
        let entry = if delta < 0 { negative } else { positive };
        self.apply(vec![(id.to_string(), entry.to_string())])
    }

    fn set_clamped(&self, id: &str, value: i32) -> PtzResult {
        let clamped = {
            let Ok(ctrls) = self.ctrls.lock() else {
                return poisoned();
            };
            let Some(ctrl) = ctrls.control(id) else {
                return PtzResult::noop();
            };
            let (Some(min), Some(max)) = (ctrl.min, ctrl.max) else {
                return PtzResult::noop();
            };
            value.clamp(min, max)
        };
        self.apply(vec![(id.to_string(), clamped.to_string())])
    }

    fn set_percent(&self, id: &str, fraction: f64) -> PtzResult {
        let fraction = fraction.clamp(0.0, 1.0);
        let target = {
            let Ok(ctrls) = self.ctrls.lock() else {
                return poisoned();
            };
            let Some(ctrl) = ctrls.control(id) else {
                return PtzResult::noop();
            };
            let (Some(min), Some(max)) = (ctrl.min, ctrl.max) else {
                return PtzResult::noop();
            };
            (min as f64 + (max - min) as f64 * fraction).round() as i64
        };
        self.apply(vec![(id.to_string(), target.to_string())])
    }
}

fn poisoned() -> PtzResult {
    PtzResult {
        changed: false,
        warnings: vec!["control registry lock is poisoned".to_string()],
    }
}

fn int_value(ctrls: &CameraCtrls, id: &str) -> Option<i32> {
    match ctrls.control(id)?.value {
        Some(ControlValue::Int(value)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::logitech_motor::LOGITECH_MOTOR_GUID;
    use crate::testio::FakeIo;
    use crate::v4l2::*;

    fn registry(io: Arc<FakeIo>) -> Arc<Mutex<CameraCtrls>> {
        Arc::new(Mutex::new(CameraCtrls::new(io)))
    }

    fn absolute_camera() -> Arc<FakeIo> {
        Arc::new(
            FakeIo::new()
                .with_int_ctrl(V4L2_CID_PAN_ABSOLUTE, "Pan, Absolute", -36000, 36000, 3600, 0, 0)
                .with_int_ctrl(V4L2_CID_TILT_ABSOLUTE, "Tilt, Absolute", -36000, 36000, 3600, 0, 0)
                .with_int_ctrl(V4L2_CID_ZOOM_ABSOLUTE, "Zoom, Absolute", 100, 500, 1, 100, 100),
        )
    }

    #[test]
    fn step_only_device_falls_back_to_vendor_steps() {
        let io = Arc::new(
            FakeIo::new()
                .with_xu_unit(&LOGITECH_MOTOR_GUID, 9)
                .with_xu_buffer(9, 0x03, vec![0; 6])
                .with_xu_buffer(9, 0x01, vec![0; 4])
                .with_xu_buffer(9, 0x02, vec![0]),
        );
        let mut ptz = PtzController::new(registry(io.clone()));

        let speed = ptz.pan_speed(3);
        assert!(!speed.changed, "no speed control: must be a no-op");
        assert!(speed.warnings.is_empty());

        let step = ptz.pan_step(-2);
        assert!(step.changed);
        assert!(step.warnings.is_empty());
        assert_eq!(io.xu_writes(9, 0x01).len(), 1);
    }

    #[test]
    fn absolute_stepping_moves_by_driver_step() {
        let mut ptz = PtzController::new(registry(absolute_camera()));
        let result = ptz.pan_step(2);
        assert!(result.changed);

        let ctrls = ptz.ctrls.lock().unwrap();
        assert_eq!(
            ctrls.control("pan_absolute").unwrap().value,
            Some(ControlValue::Int(7200))
        );
    }

    #[test]
    fn zoom_percent_and_big_steps() {
        let mut ptz = PtzController::new(registry(absolute_camera()));

        let result = ptz.zoom_percent(0.5);
        assert!(result.changed);
        assert_eq!(
            int_value(&ptz.ctrls.lock().unwrap(), "zoom_absolute"),
            Some(300)
        );

        // big step: a tenth of the range per notch
        ptz.zoom_step_big(1);
        assert_eq!(
            int_value(&ptz.ctrls.lock().unwrap(), "zoom_absolute"),
            Some(340)
        );
    }

    #[test]
    fn preset_slots_snapshot_and_recall_in_memory() {
        let mut ptz = PtzController::new(registry(absolute_camera()));
        ptz.pan_percent(0.75);
        ptz.zoom_percent(1.0);
        assert!(ptz.store_preset(3).changed);

        ptz.reset();
        assert_eq!(int_value(&ptz.ctrls.lock().unwrap(), "pan_absolute"), Some(0));

        let recalled = ptz.recall_preset(3);
        assert!(recalled.changed, "{:?}", recalled.warnings);
        assert_eq!(
            int_value(&ptz.ctrls.lock().unwrap(), "pan_absolute"),
            Some(18000)
        );
        assert_eq!(
            int_value(&ptz.ctrls.lock().unwrap(), "zoom_absolute"),
            Some(500)
        );

        let empty = ptz.recall_preset(4);
        assert!(!empty.changed);
        assert_eq!(empty.warnings.len(), 1);

        let bad = ptz.store_preset(9);
        assert!(!bad.changed);
    }
}
