// SPDX-License-Identifier: GPL-3.0-only

//! Logitech peripheral provider
//!
//! Newer Logitech webcams route LED behaviour through a peripheral extension
//! unit: one selector, a small buffer, one meaningful byte per control. The
//! unit reports min/max/current through the regular GET requests, so unlike
//! the Kiyo ISP commands these controls are discovered with real ranges and
//! verified by reading back after every write.

use super::{
    Control, ControlAddr, ControlKind, ControlProvider, ControlValue, MenuEntry, MenuPayload,
    resolve_int,
};
use crate::device::ControlIo;
use crate::v4l2::{UVC_GET_CUR, UVC_GET_MAX, UVC_GET_MIN, UVC_SET_CUR};
use std::sync::Arc;
use tracing::{debug, warn};

// Logitech peripheral GUID ffe52d21-8030-4e2c-82d9-f587d00540bd
pub const LOGITECH_PERIPHERAL_GUID: [u8; 16] = [
    0x21, 0x2d, 0xe5, 0xff, 0x30, 0x80, 0x2c, 0x4e, 0x82, 0xd9, 0xf5, 0x87, 0xd0, 0x05, 0x40,
    0xbd,
];

const LED1_SEL: u8 = 0x09;
const LED1_MODE_OFFSET: usize = 1;
const LED1_FREQUENCY_OFFSET: usize = 3;

const LED1_MODE_OFF: u8 = 0x00;
const LED1_MODE_ON: u8 = 0x01;
const LED1_MODE_BLINK: u8 = 0x02;
const LED1_MODE_AUTO: u8 = 0x03;

pub struct LogitechCtrls {
    io: Arc<dyn ControlIo>,
    unit: u8,
    ctrls: Vec<Control>,
}

impl LogitechCtrls {
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let unit = io.xu_unit_id(&LOGITECH_PERIPHERAL_GUID);
        let mut provider = Self {
            io,
            unit,
            ctrls: Vec::new(),
        };
        if unit != 0 {
            debug!(device = provider.io.path(), unit, "Logitech peripheral unit present");
            provider.discover();
        }
        provider
    }

    fn discover(&mut self) {
        let mut mode = Control::new(
            "logitech_led1_mode",
            "LED1 Mode",
            ControlKind::Menu,
            ControlAddr::XuByte {
                selector: LED1_SEL,
                len: 0,
                offset: LED1_MODE_OFFSET,
            },
        );
        mode.menu = vec![
            MenuEntry::new("off", "Off", MenuPayload::Byte(LED1_MODE_OFF)),
            MenuEntry::new("on", "On", MenuPayload::Byte(LED1_MODE_ON)),
            MenuEntry::new("blink", "Blink", MenuPayload::Byte(LED1_MODE_BLINK)),
            MenuEntry::new("auto", "Auto", MenuPayload::Byte(LED1_MODE_AUTO)),
        ];

        let frequency = Control::new(
            "logitech_led1_frequency",
            "LED1 Frequency",
            ControlKind::Integer,
            ControlAddr::XuByte {
                selector: LED1_SEL,
                len: 0,
                offset: LED1_FREQUENCY_OFFSET,
            },
        );

        for ctrl in [mode, frequency] {
            if let Some(ctrl) = discover_xu_byte(self.io.as_ref(), self.unit, ctrl) {
                self.ctrls.push(ctrl);
            }
        }
    }
}

/// Read min/max/current for an offset-addressed control and fill the model;
/// any transport failure skips just this control.
pub(crate) fn discover_xu_byte(
    io: &dyn ControlIo,
    unit: u8,
    mut ctrl: Control,
) -> Option<Control> {
    let ControlAddr::XuByte { selector, offset, .. } = ctrl.addr else {
        return None;
    };

    let len = match io.xu_len(unit, selector) {
        Ok(len) if (offset as u16) < len => len,
        Ok(len) => {
            warn!(ctrl = %ctrl.id, len, offset, "Request too short for control offset");
            return None;
        }
        Err(err) => {
            warn!(ctrl = %ctrl.id, %err, "GET_LEN failed, skipping control");
            return None;
        }
    };
    ctrl.addr = ControlAddr::XuByte { selector, len, offset };

    let read = |code: u8| -> Option<u8> {
        let mut buf = vec![0u8; len as usize];
        match io.xu_query(unit, selector, code, &mut buf) {
            Ok(()) => Some(buf[offset]),
            Err(err) => {
                warn!(ctrl = %ctrl.id, code, %err, "Extension query failed, skipping control");
                None
            }
        }
    };

    let minimum = read(UVC_GET_MIN)?;
    let maximum = read(UVC_GET_MAX)?;
    let current = read(UVC_GET_CUR)?;

    match ctrl.kind {
        ControlKind::Integer => {
            ctrl.min = Some(minimum as i32);
            ctrl.max = Some(maximum as i32);
            ctrl.step = Some(1);
            ctrl.value = Some(ControlValue::Int(current as i32));
        }
        ControlKind::Menu => {
            ctrl.value = ctrl
                .menu_entry_by_byte(current)
                .map(|entry| ControlValue::Menu(entry.id.clone()));
        }
        _ => {}
    }
    Some(ctrl)
}

/// Read-modify-write one byte of a selector buffer, then read back and
/// verify; on mismatch the cache keeps the device's value and a warning is
/// recorded. Returns the verified new cache value.
pub(crate) fn write_xu_byte(
    io: &dyn ControlIo,
    unit: u8,
    ctrl: &Control,
    desired: u8,
    raw: &str,
    errs: &mut Vec<String>,
) -> Option<u8> {
    let ControlAddr::XuByte { selector, len, offset } = ctrl.addr else {
        return None;
    };

    let mut buf = vec![0u8; len as usize];
    if let Err(err) = io.xu_query(unit, selector, UVC_GET_CUR, &mut buf) {
        errs.push(format!("can't read {} ({})", ctrl.id, err));
        return None;
    }
    buf[offset] = desired;
    if let Err(err) = io.xu_query(unit, selector, UVC_SET_CUR, &mut buf) {
        errs.push(format!("can't set {} to {} ({})", ctrl.id, raw, err));
        return None;
    }
    if let Err(err) = io.xu_query(unit, selector, UVC_GET_CUR, &mut buf) {
        errs.push(format!("can't read back {} ({})", ctrl.id, err));
        return None;
    }

    let current = buf[offset];
    if current != desired {
        errs.push(format!(
            "can't set {} to {}, device kept {}",
            ctrl.id, raw, current
        ));
        return None;
    }
    Some(current)
}

impl ControlProvider for LogitechCtrls {
    fn tag(&self) -> &'static str {
        "logitech"
    }

    fn controls(&self) -> &[Control] {
        &self.ctrls
    }

    fn apply_one(&mut self, id: &str, raw: &str, errs: &mut Vec<String>) -> Option<bool> {
        let index = self.ctrls.iter().position(|c| c.id == id)?;
        let ctrl = &self.ctrls[index];

        let (desired, new_value) = match ctrl.kind {
            ControlKind::Menu => {
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
                let MenuPayload::Byte(byte) = entry.payload else {
                    return Some(false);
                };
                (byte, ControlValue::Menu(entry.id.clone()))
            }
            ControlKind::Integer => match resolve_int(ctrl, raw) {
                Ok(v) if (0..=255).contains(&v) => (v as u8, ControlValue::Int(v)),
                Ok(v) => {
                    errs.push(format!("value {} out of range for {}", v, id));
                    return Some(false);
                }
                Err(msg) => {
                    errs.push(msg);
                    return Some(false);
                }
            },
            _ => return Some(false),
        };

        if write_xu_byte(self.io.as_ref(), self.unit, ctrl, desired, raw, errs).is_some() {
            self.ctrls[index].value = Some(new_value);
        }
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;

    fn fake() -> Arc<FakeIo> {
        Arc::new(
            FakeIo::new()
                .with_xu_unit(&LOGITECH_PERIPHERAL_GUID, 6)
                .with_xu_buffer_ranges(
                    6,
                    LED1_SEL,
                    vec![0x00, 0x01, 0x00, 0x04, 0x00],
                    vec![0x00; 5],
                    vec![0x00, 0x03, 0x00, 0xff, 0x00],
                ),
        )
    }

    #[test]
    fn discovery_reads_ranges_and_values() {
        let provider = LogitechCtrls::new(fake());
        let mode = &provider.controls()[0];
        assert_eq!(mode.value, Some(ControlValue::Menu("on".to_string())));
        let freq = &provider.controls()[1];
        assert_eq!(freq.min, Some(0));
        assert_eq!(freq.max, Some(255));
        assert_eq!(freq.value, Some(ControlValue::Int(4)));
    }

    #[test]
    fn menu_write_is_read_modify_write() {
        let io = fake();
        let mut provider = LogitechCtrls::new(io.clone());
        let mut errs = Vec::new();
        provider.apply_one("logitech_led1_mode", "blink", &mut errs);
        assert!(errs.is_empty());
        // the frequency byte must survive the mode write
        assert_eq!(io.xu_current(6, LED1_SEL), vec![0x00, 0x02, 0x00, 0x04, 0x00]);
        assert_eq!(
            provider.controls()[0].value,
            Some(ControlValue::Menu("blink".to_string()))
        );
    }

    #[test]
    fn verification_mismatch_keeps_cache() {
        let io = fake();
        let mut provider = LogitechCtrls::new(io.clone());
        io.stick_xu_buffer(6, LED1_SEL);

        let mut errs = Vec::new();
        provider.apply_one("logitech_led1_frequency", "9", &mut errs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("logitech_led1_frequency"));
        assert_eq!(provider.controls()[1].value, Some(ControlValue::Int(4)));
    }
}
