// SPDX-License-Identifier: GPL-3.0-only

//! Razer Kiyo Pro provider
//!
//! The Kiyo Pro hides autofocus behaviour, HDR and field of view behind its
//! EU1 extension unit: each setting is a fixed 8-byte ISP command rather
//! than a readable register. The command buffers are compile-time constants;
//! switching FoV needs a staging command first. Presence is gated on both
//! the extension GUID and the exact USB id, since the EU1 GUID is not
//! unique to this device family.

use super::{Control, ControlAddr, ControlKind, ControlProvider, ControlValue, MenuEntry, MenuPayload};
use crate::device::ControlIo;
use crate::v4l2::UVC_SET_CUR;
use std::sync::Arc;
use tracing::{debug, warn};

// UVC EU1 extension GUID 23e49ed0-1178-4f31-ae52-d2fb8a8d3b48
pub const UVC_EU1_GUID: [u8; 16] = [
    0xd0, 0x9e, 0xe4, 0x23, 0x78, 0x11, 0x31, 0x4f, 0xae, 0x52, 0xd2, 0xfb, 0x8a, 0x8d, 0x3b,
    0x48,
];

const EU1_SET_ISP: u8 = 0x01;

const KIYO_PRO_USB_ID: &str = "1532:0e05";

const AF_RESPONSIVE: &[u8] = b"\xff\x06\x00\x00\x00\x00\x00\x00";
const AF_PASSIVE: &[u8] = b"\xff\x06\x01\x00\x00\x00\x00\x00";

const HDR_OFF: &[u8] = b"\xff\x02\x00\x00\x00\x00\x00\x00";
const HDR_ON: &[u8] = b"\xff\x02\x01\x00\x00\x00\x00\x00";

const HDR_DARK: &[u8] = b"\xff\x07\x00\x00\x00\x00\x00\x00";
const HDR_BRIGHT: &[u8] = b"\xff\x07\x01\x00\x00\x00\x00\x00";

const FOV_WIDE: &[u8] = b"\xff\x01\x00\x03\x00\x00\x00\x00";
const FOV_MEDIUM_PRE: &[u8] = b"\xff\x01\x00\x03\x01\x00\x00\x00";
const FOV_MEDIUM: &[u8] = b"\xff\x01\x01\x03\x01\x00\x00\x00";
const FOV_NARROW_PRE: &[u8] = b"\xff\x01\x00\x03\x02\x00\x00\x00";
const FOV_NARROW: &[u8] = b"\xff\x01\x01\x03\x02\x00\x00\x00";

// persist the current values into camera flash
const SAVE: &[u8] = b"\xc0\x03\xa8\x00\x00\x00\x00\x00";

pub struct KiyoProCtrls {
    io: Arc<dyn ControlIo>,
    unit: u8,
    ctrls: Vec<Control>,
}

impl KiyoProCtrls {
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let unit = io.xu_unit_id(&UVC_EU1_GUID);
        let supported = unit != 0 && io.usb_ids() == KIYO_PRO_USB_ID;
        let ctrls = if supported {
            debug!(device = io.path(), unit, "Kiyo Pro extension unit present");
            build_controls()
        } else {
            Vec::new()
        };
        Self { io, unit, ctrls }
    }

    fn send(&self, buf: &'static [u8], errs: &mut Vec<String>) -> bool {
        let len = match self.io.xu_len(self.unit, EU1_SET_ISP) {
            Ok(len) if len as usize >= buf.len() => len,
            Ok(len) => {
                warn!(unit = self.unit, len, "ISP request shorter than command");
                buf.len() as u16
            }
            Err(err) => {
                errs.push(format!("kiyo_pro: can't query request length ({})", err));
                return false;
            }
        };
        let mut data = vec![0u8; len as usize];
        data[..buf.len()].copy_from_slice(buf);
        if let Err(err) = self.io.xu_query(self.unit, EU1_SET_ISP, UVC_SET_CUR, &mut data) {
            errs.push(format!("kiyo_pro: command failed ({})", err));
            return false;
        }
        true
    }
}

fn menu(id: &str, name: &str, entries: &[(&str, &str, &'static [u8], Option<&'static [u8]>)]) -> Control {
    let mut ctrl = Control::new(id, name, ControlKind::Menu, ControlAddr::XuBytes {
        selector: EU1_SET_ISP,
    });
    ctrl.menu = entries
        .iter()
        .map(|(id, label, value, before)| {
            MenuEntry::new(id, label, MenuPayload::Bytes {
                value,
                before: *before,
            })
        })
        .collect();
    ctrl
}

fn build_controls() -> Vec<Control> {
    let mut save = Control::new(
        "kiyo_pro_save",
        "Save settings to Kiyo Pro",
        ControlKind::Button,
        ControlAddr::XuBytes { selector: EU1_SET_ISP },
    );
    save.menu = vec![MenuEntry::new("save", "Save", MenuPayload::Bytes {
        value: SAVE,
        before: None,
    })];

    vec![
        menu("kiyo_pro_af_mode", "AF Mode", &[
            ("passive", "Passive", AF_PASSIVE, None),
            ("responsive", "Responsive", AF_RESPONSIVE, None),
        ]),
        menu("kiyo_pro_hdr", "HDR", &[
            ("off", "Off", HDR_OFF, None),
            ("on", "On", HDR_ON, None),
        ]),
        menu("kiyo_pro_hdr_mode", "HDR Mode", &[
            ("bright", "Bright", HDR_BRIGHT, None),
            ("dark", "Dark", HDR_DARK, None),
        ]),
        menu("kiyo_pro_fov", "FoV", &[
            ("wide", "Wide", FOV_WIDE, None),
            ("medium", "Medium", FOV_MEDIUM, Some(FOV_MEDIUM_PRE)),
            ("narrow", "Narrow", FOV_NARROW, Some(FOV_NARROW_PRE)),
        ]),
        save,
    ]
}

impl ControlProvider for KiyoProCtrls {
    fn tag(&self) -> &'static str {
        "kiyo_pro"
    }

    fn controls(&self) -> &[Control] {
        &self.ctrls
    }

    fn apply_one(&mut self, id: &str, raw: &str, errs: &mut Vec<String>) -> Option<bool> {
        let index = self.ctrls.iter().position(|c| c.id == id)?;

        let Some(entry) = self.ctrls[index].menu_entry(raw) else {
            let known: Vec<&str> = self.ctrls[index].menu.iter().map(|m| m.id.as_str()).collect();
            errs.push(format!(
                "can't find '{}' for {} (values: {})",
                raw,
                id,
                known.join(", ")
            ));
            return Some(false);
        };
        let MenuPayload::Bytes { value, before } = entry.payload else {
            return Some(false);
        };
        let entry_id = entry.id.clone();

        if let Some(before) = before
            && !self.send(before, errs)
        {
            return Some(false);
        }
        if !self.send(value, errs) {
            return Some(false);
        }

        // The ISP protocol is write-only, the commands can't be read back.
        let ctrl = &mut self.ctrls[index];
        if ctrl.kind == ControlKind::Menu {
            ctrl.value = Some(ControlValue::Menu(entry_id));
        }
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;

    #[test]
    fn absent_unit_yields_empty_set() {
        let provider = KiyoProCtrls::new(Arc::new(FakeIo::new()));
        assert!(provider.controls().is_empty());
    }

    #[test]
    fn wrong_usb_id_yields_empty_set() {
        let io = FakeIo::new()
            .with_xu_unit(&UVC_EU1_GUID, 4)
            .with_xu_buffer(4, EU1_SET_ISP, vec![0; 8])
            .with_usb_ids("046d:085e");
        let provider = KiyoProCtrls::new(Arc::new(io));
        assert!(provider.controls().is_empty());
    }

    #[test]
    fn fov_sends_staging_command_first() {
        let io = Arc::new(
            FakeIo::new()
                .with_xu_unit(&UVC_EU1_GUID, 4)
                .with_xu_buffer(4, EU1_SET_ISP, vec![0; 8])
                .with_usb_ids(KIYO_PRO_USB_ID),
        );
        let mut provider = KiyoProCtrls::new(io.clone());

        let mut errs = Vec::new();
        assert_eq!(provider.apply_one("kiyo_pro_fov", "narrow", &mut errs), Some(false));
        assert!(errs.is_empty());

        let writes = io.xu_writes(4, EU1_SET_ISP);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], FOV_NARROW_PRE);
        assert_eq!(writes[1], FOV_NARROW);

        let fov = provider.controls().iter().find(|c| c.id == "kiyo_pro_fov").unwrap();
        assert_eq!(fov.value, Some(ControlValue::Menu("narrow".to_string())));
    }
}
