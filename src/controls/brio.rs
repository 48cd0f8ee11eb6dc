// SPDX-License-Identifier: GPL-3.0-only

//! Wide-angle lens provider (BRIO-class companion unit)
//!
//! BRIO-generation cameras carry a wide-angle lens and expose the digital
//! field-of-view crop on their companion extension unit. The companion GUID
//! is shared across several product lines that do not all have the lens, so
//! unit presence alone proves nothing; the provider additionally probes
//! whether the FoV selector answers at all and stays silent when it does
//! not.

use super::logitech::{discover_xu_byte, write_xu_byte};
use super::{Control, ControlAddr, ControlKind, ControlProvider, ControlValue, MenuEntry, MenuPayload};
use crate::device::ControlIo;
use std::sync::Arc;
use tracing::debug;

// Logitech companion GUID 49e40215-f434-47fe-b158-0e885023e51b
pub const LOGITECH_COMPANION_GUID: [u8; 16] = [
    0x15, 0x02, 0xe4, 0x49, 0x34, 0xf4, 0xfe, 0x47, 0xb1, 0x58, 0x0e, 0x88, 0x50, 0x23, 0xe5,
    0x1b,
];

const SEL_FOV: u8 = 0x05;

const FOV_WIDE: u8 = 0x00;
const FOV_MEDIUM: u8 = 0x02;
const FOV_NARROW: u8 = 0x01;

pub struct BrioCtrls {
    io: Arc<dyn ControlIo>,
    unit: u8,
    ctrls: Vec<Control>,
}

impl BrioCtrls {
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let unit = io.xu_unit_id(&LOGITECH_COMPANION_GUID);
        let mut provider = Self {
            io,
            unit,
            ctrls: Vec::new(),
        };
        if unit != 0 {
            provider.discover();
        }
        provider
    }

    fn discover(&mut self) {
        let mut fov = Control::new(
            "logitech_brio_fov",
            "FoV",
            ControlKind::Menu,
            ControlAddr::XuByte {
                selector: SEL_FOV,
                len: 0,
                offset: 0,
            },
        );
        fov.menu = vec![
            MenuEntry::new("wide", "90\u{b0}", MenuPayload::Byte(FOV_WIDE)),
            MenuEntry::new("medium", "78\u{b0}", MenuPayload::Byte(FOV_MEDIUM)),
            MenuEntry::new("narrow", "65\u{b0}", MenuPayload::Byte(FOV_NARROW)),
        ];

        // discovery doubles as the capability probe
        if let Some(fov) = discover_xu_byte(self.io.as_ref(), self.unit, fov) {
            debug!(device = self.io.path(), unit = self.unit, "Wide-angle FoV selector present");
            self.ctrls.push(fov);
        }
    }
}

impl ControlProvider for BrioCtrls {
    fn tag(&self) -> &'static str {
        "brio"
    }

    fn controls(&self) -> &[Control] {
        &self.ctrls
    }

    fn apply_one(&mut self, id: &str, raw: &str, errs: &mut Vec<String>) -> Option<bool> {
        let index = self.ctrls.iter().position(|c| c.id == id)?;
        let ctrl = &self.ctrls[index];

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
        let entry_id = entry.id.clone();

        if write_xu_byte(self.io.as_ref(), self.unit, ctrl, byte, raw, errs).is_some() {
            self.ctrls[index].value = Some(ControlValue::Menu(entry_id));
        }
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;

    #[test]
    fn unit_without_fov_selector_yields_empty_set() {
        // companion unit present, but GET_LEN on the FoV selector fails
        let io = FakeIo::new().with_xu_unit(&LOGITECH_COMPANION_GUID, 12);
        let provider = BrioCtrls::new(Arc::new(io));
        assert!(provider.controls().is_empty());
    }

    #[test]
    fn fov_round_trips_through_menu_bytes() {
        let io = Arc::new(
            FakeIo::new()
                .with_xu_unit(&LOGITECH_COMPANION_GUID, 12)
                .with_xu_buffer(12, SEL_FOV, vec![FOV_MEDIUM]),
        );
        let mut provider = BrioCtrls::new(io);
        assert_eq!(
            provider.controls()[0].value,
            Some(ControlValue::Menu("medium".to_string()))
        );

        let mut errs = Vec::new();
        provider.apply_one("logitech_brio_fov", "wide", &mut errs);
        assert!(errs.is_empty());
        assert_eq!(
            provider.controls()[0].value,
            Some(ControlValue::Menu("wide".to_string()))
        );
    }
}
