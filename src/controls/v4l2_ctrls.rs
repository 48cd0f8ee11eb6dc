// SPDX-License-Identifier: GPL-3.0-only

//! Generic V4L2 control registry provider
//!
//! Discovers every control the kernel reports through the enumerate-next
//! protocol, classifies it into the closed control model, and mutates it
//! with echoed-write verification. Discovery order from the device carries
//! no logical grouping, so a fixed reorder table moves each "auto" toggle
//! next to the absolute control it gates.

use super::{
    Control, ControlAddr, ControlKind, ControlProvider, ControlValue, MenuEntry, MenuPayload,
    find_control_mut, parse_bool, resolve_int, to_text_id,
};
use crate::constants::control_meta;
use crate::device::{ControlIo, CtrlChange};
use crate::v4l2::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Auto-toggle controls whose change flips the inactive state of others.
/// The INACTIVE-notifying UPDATE flag is unreliable on the uvcvideo driver,
/// so membership is pinned here.
const UPDATER_CIDS: [u32; 4] = [
    V4L2_CID_EXPOSURE_AUTO,
    V4L2_CID_FOCUS_AUTO,
    V4L2_CID_AUTO_WHITE_BALANCE,
    V4L2_CID_ISO_SENSITIVITY_AUTO,
];

/// (auto toggle, the absolute control it gates): the toggle is moved
/// directly before its dependent in iteration order.
const REORDER_PAIRS: [(u32, u32); 3] = [
    (V4L2_CID_FOCUS_AUTO, V4L2_CID_FOCUS_ABSOLUTE),
    (V4L2_CID_AUTO_WHITE_BALANCE, V4L2_CID_WHITE_BALANCE_TEMPERATURE),
    (V4L2_CID_EXPOSURE_AUTO, V4L2_CID_EXPOSURE_ABSOLUTE),
];

pub struct V4l2Ctrls {
    io: Arc<dyn ControlIo>,
    ctrls: Vec<Control>,
}

impl V4l2Ctrls {
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let ctrls = discover(io.as_ref());
        Self { io, ctrls }
    }

    fn cid_of(ctrl: &Control) -> Option<u32> {
        match ctrl.addr {
            ControlAddr::V4l2(cid) => Some(cid),
            _ => None,
        }
    }
}

fn discover(io: &dyn ControlIo) -> Vec<Control> {
    let mut ctrls = Vec::new();
    let next_flags = V4L2_CTRL_FLAG_NEXT_CTRL | V4L2_CTRL_FLAG_NEXT_COMPOUND;
    let mut probe = next_flags;

    while let Ok(qctrl) = io.query_ctrl(probe) {
        probe = qctrl.cid | next_flags;

        if qctrl.is_disabled() {
            continue;
        }
        if let Some(ctrl) = build_control(io, &qctrl) {
            ctrls.push(ctrl);
        }
    }

    // move the controls of the auto groups near each other
    for (what_cid, where_cid) in REORDER_PAIRS {
        let what = ctrls
            .iter()
            .position(|c| c.addr == ControlAddr::V4l2(what_cid));
        let place = ctrls
            .iter()
            .position(|c| c.addr == ControlAddr::V4l2(where_cid));
        if let (Some(what), Some(place)) = (what, place) {
            let ctrl = ctrls.remove(what);
            ctrls.insert(if what < place { place - 1 } else { place }, ctrl);
        }
    }

    debug!(count = ctrls.len(), "Discovered generic V4L2 controls");
    ctrls
}

fn build_control(io: &dyn ControlIo, qctrl: &crate::device::QueryCtrl) -> Option<Control> {
    let mut kind = match qctrl.ctrl_type {
        V4L2_CTRL_TYPE_INTEGER => ControlKind::Integer,
        V4L2_CTRL_TYPE_BOOLEAN => ControlKind::Boolean,
        V4L2_CTRL_TYPE_MENU | V4L2_CTRL_TYPE_INTEGER_MENU => ControlKind::Menu,
        V4L2_CTRL_TYPE_BUTTON => ControlKind::Button,
        other => {
            debug!(cid = qctrl.cid, ctrl_type = other, "Skipping unsupported control type");
            return None;
        }
    };
    // drivers commonly report on/off switches as 0..1 integers
    if kind == ControlKind::Integer
        && qctrl.minimum == 0
        && qctrl.maximum == 1
        && qctrl.step == 1
    {
        kind = ControlKind::Boolean;
    }

    let meta = control_meta(qctrl.cid);
    let text_id = meta
        .map(|m| m.text_id.to_string())
        .unwrap_or_else(|| to_text_id(&qctrl.name));

    let mut ctrl = Control::new(&text_id, &qctrl.name, kind, ControlAddr::V4l2(qctrl.cid));
    ctrl.tooltip = meta.map(|m| m.tooltip);
    ctrl.enabled = !qctrl.is_inactive();
    ctrl.updater = UPDATER_CIDS.contains(&qctrl.cid);

    let current = if kind == ControlKind::Button {
        None
    } else {
        match io.get_ctrl(qctrl.cid) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(ctrl = %text_id, %err, "Can't read control value, skipping");
                return None;
            }
        }
    };

    match kind {
        ControlKind::Integer => {
            ctrl.min = Some(qctrl.minimum);
            ctrl.max = Some(qctrl.maximum);
            ctrl.step = Some(qctrl.step);
            ctrl.default = Some(ControlValue::Int(qctrl.default_value));
            ctrl.value = current.map(ControlValue::Int);
        }
        ControlKind::Boolean => {
            ctrl.default = Some(ControlValue::Bool(qctrl.default_value != 0));
            ctrl.value = current.map(|v| ControlValue::Bool(v != 0));
        }
        ControlKind::Menu => {
            let int_menu = qctrl.ctrl_type == V4L2_CTRL_TYPE_INTEGER_MENU;
            for index in qctrl.minimum..=qctrl.maximum {
                let Ok(item) = io.query_menu(qctrl.cid, index as u32) else {
                    // menus may have holes
                    continue;
                };
                let (entry_id, label) = if int_menu {
                    (item.value.to_string(), item.value.to_string())
                } else {
                    (to_text_id(&item.name), item.name.clone())
                };
                if current == Some(index) {
                    ctrl.value = Some(ControlValue::Menu(entry_id.clone()));
                }
                if qctrl.default_value == index {
                    ctrl.default = Some(ControlValue::Menu(entry_id.clone()));
                }
                ctrl.menu
                    .push(MenuEntry::new(&entry_id, &label, MenuPayload::Index(index)));
            }
        }
        ControlKind::Button => {}
        ControlKind::Info => unreachable!(),
    }

    Some(ctrl)
}

impl ControlProvider for V4l2Ctrls {
    fn tag(&self) -> &'static str {
        "v4l2"
    }

    fn controls(&self) -> &[Control] {
        &self.ctrls
    }

    fn apply_one(&mut self, id: &str, raw: &str, errs: &mut Vec<String>) -> Option<bool> {
        let ctrl = find_control_mut(&mut self.ctrls, id)?;
        let Some(cid) = Self::cid_of(ctrl) else {
            return None;
        };

        let (requested, new_value) = match ctrl.kind {
            ControlKind::Integer => match resolve_int(ctrl, raw) {
                Ok(v) => (v, ControlValue::Int(v)),
                Err(msg) => {
                    errs.push(msg);
                    return Some(false);
                }
            },
            ControlKind::Boolean => {
                let on = if raw == "default" {
                    match ctrl.default {
                        Some(ControlValue::Bool(b)) => b,
                        _ => {
                            errs.push(format!("{} has no known default", id));
                            return Some(false);
                        }
                    }
                } else if raw.ends_with('%') {
                    errs.push(format!("percentage not valid for boolean {}", id));
                    return Some(false);
                } else {
                    parse_bool(raw)
                };
                (on as i32, ControlValue::Bool(on))
            }
            ControlKind::Menu => {
                let entry_id = if raw == "default" {
                    match &ctrl.default {
                        Some(ControlValue::Menu(entry_id)) => entry_id.clone(),
                        _ => {
                            errs.push(format!("{} has no known default", id));
                            return Some(false);
                        }
                    }
                } else {
                    raw.to_string()
                };
                let Some(entry) = ctrl.menu_entry(&entry_id) else {
                    let known: Vec<&str> = ctrl.menu.iter().map(|m| m.id.as_str()).collect();
                    errs.push(format!(
                        "can't find '{}' for {} (values: {})",
                        raw,
                        id,
                        known.join(", ")
                    ));
                    return Some(false);
                };
                let MenuPayload::Index(index) = entry.payload else {
                    return Some(false);
                };
                (index, ControlValue::Menu(entry_id))
            }
            ControlKind::Button => (1, ControlValue::Int(1)),
            ControlKind::Info => {
                errs.push(format!("{} is informational and can't be set", id));
                return Some(false);
            }
        };

        let echoed = match self.io.set_ctrl(cid, requested) {
            Ok(echoed) => echoed,
            Err(err) => {
                errs.push(format!("can't set {} to {} ({})", id, raw, err));
                return Some(false);
            }
        };
        if echoed != requested {
            // The driver accepted the write but kept or clamped the value;
            // the cache must keep reflecting what the device holds.
            errs.push(format!(
                "can't set {} to {}, device used {} instead of {}",
                id, raw, echoed, requested
            ));
            return Some(false);
        }

        if ctrl.kind != ControlKind::Button {
            ctrl.value = Some(new_value);
        }
        let updater = ctrl.updater;
        if updater {
            self.refresh();
        }
        Some(false)
    }

    fn refresh(&mut self) {
        for ctrl in &mut self.ctrls {
            let Some(cid) = Self::cid_of(ctrl) else {
                continue;
            };
            match self.io.query_ctrl(cid) {
                Ok(qctrl) => ctrl.enabled = !qctrl.is_inactive(),
                Err(err) => {
                    warn!(ctrl = %ctrl.id, %err, "Can't refresh control state");
                }
            }
        }
    }

    fn handle_event(&mut self, change: &CtrlChange) -> Option<Control> {
        let index = self
            .ctrls
            .iter()
            .position(|c| c.addr == ControlAddr::V4l2(change.cid))?;

        {
            let ctrl = &mut self.ctrls[index];
            if change.changes & V4L2_EVENT_CTRL_CH_VALUE != 0 {
                ctrl.value = match ctrl.kind {
                    ControlKind::Integer => Some(ControlValue::Int(change.value)),
                    ControlKind::Boolean => Some(ControlValue::Bool(change.value != 0)),
                    ControlKind::Menu => ctrl
                        .menu_entry_by_index(change.value)
                        .map(|entry| ControlValue::Menu(entry.id.clone())),
                    ControlKind::Button | ControlKind::Info => None,
                };
            }
            if change.changes & V4L2_EVENT_CTRL_CH_FLAGS != 0 {
                ctrl.enabled = !change.inactive;
            }
        }

        if self.ctrls[index].updater {
            // dependent controls may have been (de)activated by this change
            self.refresh();
        }
        Some(self.ctrls[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;

    #[test]
    fn zero_one_integer_becomes_boolean() {
        let io = Arc::new(FakeIo::new().with_int_ctrl(V4L2_CID_GAIN, "Gain", 0, 1, 1, 0, 1));
        let provider = V4l2Ctrls::new(io);
        assert_eq!(provider.controls()[0].kind, ControlKind::Boolean);
        assert_eq!(
            provider.controls()[0].value,
            Some(ControlValue::Bool(true))
        );
    }

    #[test]
    fn auto_toggle_is_reordered_before_dependent() {
        let io = Arc::new(
            FakeIo::new()
                .with_int_ctrl(V4L2_CID_FOCUS_ABSOLUTE, "Focus, Absolute", 0, 255, 5, 0, 10)
                .with_int_ctrl(V4L2_CID_BRIGHTNESS, "Brightness", 0, 255, 1, 128, 128)
                .with_bool_ctrl(V4L2_CID_FOCUS_AUTO, "Focus, Automatic Continuous", true, true),
        );
        let provider = V4l2Ctrls::new(io);
        let ids: Vec<&str> = provider.controls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            ["focus_automatic_continuous", "focus_absolute", "brightness"]
        );
    }

    #[test]
    fn percentage_on_boolean_warns_instead_of_coercing() {
        let io = Arc::new(FakeIo::new().with_bool_ctrl(
            V4L2_CID_FOCUS_AUTO,
            "Focus, Automatic Continuous",
            true,
            true,
        ));
        let mut provider = V4l2Ctrls::new(io);

        let mut errs = Vec::new();
        let outcome = provider.apply_one("focus_automatic_continuous", "50%", &mut errs);
        assert_eq!(outcome, Some(false));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("focus_automatic_continuous"));
        assert_eq!(
            provider.controls()[0].value,
            Some(ControlValue::Bool(true)),
            "a percentage typo must not flip the control"
        );
    }

    #[test]
    fn clamped_echo_keeps_cache_and_warns() {
        let io = Arc::new(
            FakeIo::new().with_int_ctrl(V4L2_CID_BRIGHTNESS, "Brightness", 0, 100, 1, 50, 50),
        );
        let mut provider = V4l2Ctrls::new(io.clone());
        io.clamp_writes_to(V4L2_CID_BRIGHTNESS, 80);

        let mut errs = Vec::new();
        assert_eq!(provider.apply_one("brightness", "90", &mut errs), Some(false));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("brightness"));
        assert_eq!(
            provider.controls()[0].value,
            Some(ControlValue::Int(50)),
            "cache must not take the requested value"
        );
    }
}
