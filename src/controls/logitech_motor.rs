// SPDX-License-Identifier: GPL-3.0-only

//! Logitech motor-control provider
//!
//! Mechanical Logitech cameras (Orbit/Sphere family, BCC/PTZ conference
//! units) expose their motors through the motor-control extension unit:
//! a motorized focus register, plus relative pan/tilt stepping and a homing
//! reset that exist nowhere in the generic registry. The relative commands
//! are transient motions, modeled as button controls whose entries carry
//! the complete command buffer; focus is a readable register with ranges
//! and write verification.

use super::logitech::{discover_xu_byte, write_xu_byte};
use super::{Control, ControlAddr, ControlKind, ControlProvider, ControlValue, MenuEntry, MenuPayload, resolve_int};
use crate::device::ControlIo;
use crate::v4l2::UVC_SET_CUR;
use std::sync::Arc;
use tracing::{debug, warn};

// Logitech motor control GUID 63610682-5070-49ab-b8cc-b3855e8d221d
pub const LOGITECH_MOTOR_GUID: [u8; 16] = [
    0x82, 0x06, 0x61, 0x63, 0x70, 0x50, 0xab, 0x49, 0xb8, 0xcc, 0xb3, 0x85, 0x5e, 0x8d, 0x22,
    0x1d,
];

const SEL_PANTILT_RELATIVE: u8 = 0x01;
const SEL_PANTILT_RESET: u8 = 0x02;
const SEL_FOCUS_MOTOR: u8 = 0x03;

// one mechanical step, in the unit's 1/64 degree increments, as the two
// little-endian i16 fields of the relative command
const PAN_LEFT: &[u8] = &[0x80, 0xff, 0x00, 0x00];
const PAN_RIGHT: &[u8] = &[0x80, 0x00, 0x00, 0x00];
const TILT_UP: &[u8] = &[0x00, 0x00, 0x80, 0x00];
const TILT_DOWN: &[u8] = &[0x00, 0x00, 0x80, 0xff];

const RESET_PAN: &[u8] = &[0x01];
const RESET_TILT: &[u8] = &[0x02];
const RESET_BOTH: &[u8] = &[0x03];

pub struct LogitechMotorCtrls {
    io: Arc<dyn ControlIo>,
    unit: u8,
    ctrls: Vec<Control>,
}

impl LogitechMotorCtrls {
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let unit = io.xu_unit_id(&LOGITECH_MOTOR_GUID);
        let mut provider = Self {
            io,
            unit,
            ctrls: Vec::new(),
        };
        if unit != 0 {
            debug!(device = provider.io.path(), unit, "Logitech motor unit present");
            provider.discover();
        }
        provider
    }

    fn discover(&mut self) {
        let focus = Control::new(
            "logitech_motor_focus",
            "Motor Focus",
            ControlKind::Integer,
            ControlAddr::XuByte {
                selector: SEL_FOCUS_MOTOR,
                len: 0,
                offset: 0,
            },
        );
        if let Some(focus) = discover_xu_byte(self.io.as_ref(), self.unit, focus) {
            self.ctrls.push(focus);
        }

        self.ctrls.push(button(
            "logitech_pan_step",
            "Pan Step",
            SEL_PANTILT_RELATIVE,
            &[("left", "Left", PAN_LEFT), ("right", "Right", PAN_RIGHT)],
        ));
        self.ctrls.push(button(
            "logitech_tilt_step",
            "Tilt Step",
            SEL_PANTILT_RELATIVE,
            &[("up", "Up", TILT_UP), ("down", "Down", TILT_DOWN)],
        ));
        self.ctrls.push(button(
            "logitech_pantilt_reset",
            "Pan/Tilt Reset",
            SEL_PANTILT_RESET,
            &[
                ("pan", "Pan", RESET_PAN),
                ("tilt", "Tilt", RESET_TILT),
                ("both", "Both", RESET_BOTH),
            ],
        ));
    }

    fn send(&self, selector: u8, payload: &[u8], errs: &mut Vec<String>) -> bool {
        let len = match self.io.xu_len(self.unit, selector) {
            Ok(len) if len as usize >= payload.len() => len,
            Ok(len) => {
                warn!(unit = self.unit, selector, len, "Motor request shorter than command");
                payload.len() as u16
            }
            Err(err) => {
                errs.push(format!("logitech_motor: can't query request length ({})", err));
                return false;
            }
        };
        let mut data = vec![0u8; len as usize];
        data[..payload.len()].copy_from_slice(payload);
        if let Err(err) = self.io.xu_query(self.unit, selector, UVC_SET_CUR, &mut data) {
            errs.push(format!("logitech_motor: command failed ({})", err));
            return false;
        }
        true
    }
}

fn button(id: &str, name: &str, selector: u8, entries: &[(&str, &str, &'static [u8])]) -> Control {
    let mut ctrl = Control::new(id, name, ControlKind::Button, ControlAddr::XuBytes { selector });
    ctrl.menu = entries
        .iter()
        .map(|(id, label, value)| {
            MenuEntry::new(id, label, MenuPayload::Bytes {
                value,
                before: None,
            })
        })
        .collect();
    ctrl
}

impl ControlProvider for LogitechMotorCtrls {
    fn tag(&self) -> &'static str {
        "logitech_motor"
    }

    fn controls(&self) -> &[Control] {
        &self.ctrls
    }

    fn apply_one(&mut self, id: &str, raw: &str, errs: &mut Vec<String>) -> Option<bool> {
        let index = self.ctrls.iter().position(|c| c.id == id)?;
        let ctrl = &self.ctrls[index];

        match ctrl.kind {
            ControlKind::Integer => {
                let desired = match resolve_int(ctrl, raw) {
                    Ok(v) if (0..=255).contains(&v) => v,
                    Ok(v) => {
                        errs.push(format!("value {} out of range for {}", v, id));
                        return Some(false);
                    }
                    Err(msg) => {
                        errs.push(msg);
                        return Some(false);
                    }
                };
                if write_xu_byte(self.io.as_ref(), self.unit, ctrl, desired as u8, raw, errs)
                    .is_some()
                {
                    self.ctrls[index].value = Some(ControlValue::Int(desired));
                }
                Some(false)
            }
            ControlKind::Button => {
                let Some(entry) = ctrl.menu_entry(raw) else {
                    let known: Vec<&str> = ctrl.menu.iter().map(|m| m.id.as_str()).collect();
                    errs.push(format!(
                        "can't find '{}' for {} (values: {})",
                        raw,
                        id,
                        known.join(", ")
                    ));
                    return Some(false);
                };
                let MenuPayload::Bytes { value, .. } = entry.payload else {
                    return Some(false);
                };
                let ControlAddr::XuBytes { selector } = ctrl.addr else {
                    return Some(false);
                };
                self.send(selector, value, errs);
                Some(false)
            }
            _ => Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;

    fn fake() -> Arc<FakeIo> {
        Arc::new(
            FakeIo::new()
                .with_xu_unit(&LOGITECH_MOTOR_GUID, 9)
                .with_xu_buffer_ranges(
                    9,
                    SEL_FOCUS_MOTOR,
                    vec![0x3c, 0, 0, 0, 0, 0],
                    vec![0x00, 0, 0, 0, 0, 0],
                    vec![0xff, 0, 0, 0, 0, 0],
                )
                .with_xu_buffer(9, SEL_PANTILT_RELATIVE, vec![0; 4])
                .with_xu_buffer(9, SEL_PANTILT_RESET, vec![0]),
        )
    }

    #[test]
    fn absent_unit_yields_empty_set() {
        let provider = LogitechMotorCtrls::new(Arc::new(FakeIo::new()));
        assert!(provider.controls().is_empty());
    }

    #[test]
    fn discovers_focus_and_step_buttons() {
        let provider = LogitechMotorCtrls::new(fake());
        let ids: Vec<&str> = provider.controls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "logitech_motor_focus",
                "logitech_pan_step",
                "logitech_tilt_step",
                "logitech_pantilt_reset"
            ]
        );
        assert_eq!(provider.controls()[0].value, Some(ControlValue::Int(0x3c)));
    }

    #[test]
    fn pan_step_sends_relative_command() {
        let io = fake();
        let mut provider = LogitechMotorCtrls::new(io.clone());
        let mut errs = Vec::new();
        provider.apply_one("logitech_pan_step", "left", &mut errs);
        assert!(errs.is_empty());
        assert_eq!(io.xu_writes(9, SEL_PANTILT_RELATIVE), vec![PAN_LEFT.to_vec()]);
    }
}
