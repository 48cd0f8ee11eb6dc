// SPDX-License-Identifier: GPL-3.0-only

//! Control registry
//!
//! [`CameraCtrls`] owns the provider list for one open device handle and is
//! the only mutation path into the control model. Batch mutation is best
//! effort: assignments are applied in mapping order, every failure is
//! reported as a warning, and processing always continues with the next
//! entry. Unknown ids are reported once after the whole batch.

use crate::controls::brio::BrioCtrls;
use crate::controls::fmt_ctrls::FmtCtrls;
use crate::controls::kiyo::KiyoProCtrls;
use crate::controls::logitech::LogitechCtrls;
use crate::controls::logitech_motor::LogitechMotorCtrls;
use crate::controls::v4l2_ctrls::V4l2Ctrls;
use crate::controls::{Control, ControlAddr, ControlProvider};
use crate::device::{ControlIo, CtrlChange};
use std::sync::Arc;
use tracing::{debug, warn};

/// One presentation page of grouped controls
pub struct CtrlPage {
    pub title: &'static str,
    pub categories: Vec<CtrlCategory>,
}

pub struct CtrlCategory {
    pub title: &'static str,
    pub ctrls: Vec<Control>,
}

pub struct CameraCtrls {
    providers: Vec<Box<dyn ControlProvider>>,
    pending_reopen: bool,
}

impl CameraCtrls {
    /// Build the provider list and run discovery across every surface.
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let providers: Vec<Box<dyn ControlProvider>> = vec![
            Box::new(V4l2Ctrls::new(io.clone())),
            Box::new(FmtCtrls::new(io.clone())),
            Box::new(KiyoProCtrls::new(io.clone())),
            Box::new(LogitechCtrls::new(io.clone())),
            Box::new(LogitechMotorCtrls::new(io.clone())),
            Box::new(BrioCtrls::new(io)),
        ];

        let registry = Self {
            providers,
            pending_reopen: false,
        };

        let mut seen: Vec<&str> = Vec::new();
        for ctrl in registry.controls() {
            if seen.contains(&ctrl.id.as_str()) {
                warn!(ctrl = %ctrl.id, "Duplicate control id across providers");
            }
            seen.push(&ctrl.id);
        }
        debug!(count = seen.len(), "Registry ready");

        registry
    }

    /// Aggregated control set, in provider then discovery order
    pub fn controls(&self) -> Vec<&Control> {
        self.providers
            .iter()
            .flat_map(|provider| provider.controls().iter())
            .collect()
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.providers
            .iter()
            .flat_map(|provider| provider.controls().iter())
            .find(|ctrl| ctrl.id == id)
    }

    /// Apply a batch of `(control id, value string)` assignments.
    ///
    /// Returns true when at least one applied control requires the handle to
    /// be closed and reopened; the flag also stays latched in
    /// [`CameraCtrls::pending_reopen`] until the caller performs the reopen.
    pub fn setup_ctrls(&mut self, params: &[(String, String)], errs: &mut Vec<String>) -> bool {
        let mut reopen = false;
        let mut unknown: Vec<&str> = Vec::new();

        for (id, value) in params {
            let mut handled = false;
            for provider in &mut self.providers {
                if let Some(needs_reopen) = provider.apply_one(id, value, errs) {
                    debug!(provider = provider.tag(), ctrl = %id, "Applied assignment");
                    reopen |= needs_reopen;
                    handled = true;
                    break;
                }
            }
            if !handled {
                unknown.push(id);
            }
        }

        if !unknown.is_empty() {
            errs.push(format!("can't find controls: {}", unknown.join(", ")));
        }
        if reopen {
            self.pending_reopen = true;
        }
        reopen
    }

    /// True while a reopen-required control change is awaiting the caller's
    /// reopen.
    pub fn pending_reopen(&self) -> bool {
        self.pending_reopen
    }

    pub fn clear_pending_reopen(&mut self) {
        self.pending_reopen = false;
    }

    /// Refresh volatile control state (enabled flags) from the device.
    pub fn refresh(&mut self) {
        for provider in &mut self.providers {
            provider.refresh();
        }
    }

    /// Route a device-pushed change notification to its owning provider.
    pub(crate) fn handle_event(&mut self, change: &CtrlChange) -> Option<Control> {
        self.providers
            .iter_mut()
            .find_map(|provider| provider.handle_event(change))
    }

    /// Re-poll the notification-less controls; first changed id wins.
    pub(crate) fn poll_reopen(&mut self) -> Option<String> {
        self.providers
            .iter_mut()
            .find_map(|provider| provider.poll_reopen())
    }

    /// Generic control ids the listener subscribes to.
    pub(crate) fn event_cids(&self) -> Vec<u32> {
        self.controls()
            .iter()
            .filter_map(|ctrl| match ctrl.addr {
                ControlAddr::V4l2(cid) => Some(cid),
                _ => None,
            })
            .collect()
    }

    /// Whether any pan/tilt/zoom primitive is available at all.
    pub fn has_ptz(&self) -> bool {
        const PTZ_IDS: [&str; 7] = [
            "pan_absolute",
            "tilt_absolute",
            "zoom_absolute",
            "pan_speed",
            "tilt_speed",
            "logitech_pan_step",
            "logitech_tilt_step",
        ];
        self.controls()
            .iter()
            .any(|ctrl| PTZ_IDS.contains(&ctrl.id.as_str()))
    }

    /// Group the aggregated set into presentation pages. Controls from
    /// different providers that belong together logically (an auto toggle
    /// and the vendor override of the same function) land in one category.
    pub fn pages(&self) -> Vec<CtrlPage> {
        let mut rest: Vec<Control> = self.controls().into_iter().cloned().collect();

        let mut pages = vec![
            CtrlPage {
                title: "Basic",
                categories: vec![
                    CtrlCategory {
                        title: "Exposure",
                        ctrls: pop_by_prefixes(
                            &mut rest,
                            &["auto_exposure", "exposure", "backlight_compensation", "gain", "kiyo_pro_hdr"],
                        ),
                    },
                    CtrlCategory {
                        title: "Image",
                        ctrls: pop_by_prefixes(
                            &mut rest,
                            &["brightness", "contrast", "saturation", "sharpness", "hue", "gamma"],
                        ),
                    },
                    CtrlCategory {
                        title: "White Balance",
                        ctrls: pop_by_prefixes(&mut rest, &["white_balance"]),
                    },
                ],
            },
            CtrlPage {
                title: "Advanced",
                categories: vec![
                    CtrlCategory {
                        title: "Power Line",
                        ctrls: pop_by_prefixes(&mut rest, &["power_line_frequency"]),
                    },
                    CtrlCategory {
                        title: "Pan/Tilt/Zoom/FoV",
                        ctrls: pop_by_prefixes(
                            &mut rest,
                            &["pan", "tilt", "zoom", "logitech_pan", "logitech_tilt", "logitech_pantilt", "kiyo_pro_fov", "logitech_brio_fov"],
                        ),
                    },
                    CtrlCategory {
                        title: "Focus",
                        ctrls: pop_by_prefixes(
                            &mut rest,
                            &["focus", "logitech_motor_focus", "kiyo_pro_af_mode"],
                        ),
                    },
                    CtrlCategory {
                        title: "ISO",
                        ctrls: pop_by_prefixes(&mut rest, &["iso"]),
                    },
                    CtrlCategory {
                        title: "Color Effects",
                        ctrls: pop_by_prefixes(&mut rest, &["color_effects"]),
                    },
                    CtrlCategory {
                        title: "Rotate/Flip",
                        ctrls: pop_by_prefixes(&mut rest, &["rotate", "horizontal_flip", "vertical_flip"]),
                    },
                    CtrlCategory {
                        title: "LED",
                        ctrls: pop_by_prefixes(&mut rest, &["logitech_led"]),
                    },
                ],
            },
            CtrlPage {
                title: "Compression",
                categories: vec![
                    CtrlCategory {
                        title: "H264",
                        ctrls: pop_by_prefixes(
                            &mut rest,
                            &["h264", "video_bitrate", "repeat_sequence_header"],
                        ),
                    },
                    CtrlCategory {
                        title: "JPEG",
                        ctrls: pop_by_prefixes(&mut rest, &["compression_quality"]),
                    },
                ],
            },
            CtrlPage {
                title: "Capture",
                categories: vec![CtrlCategory {
                    title: "Capture",
                    ctrls: pop_by_prefixes(&mut rest, &["pixelformat", "resolution", "fps", "colorspace"]),
                }],
            },
            CtrlPage {
                title: "Settings",
                categories: vec![CtrlCategory {
                    title: "Save",
                    ctrls: pop_by_prefixes(&mut rest, &["kiyo_pro_save"]),
                }],
            },
        ];

        // everything unmatched lands on the Advanced page
        if !rest.is_empty() {
            pages[1].categories.push(CtrlCategory {
                title: "Other",
                ctrls: rest,
            });
        }

        for page in &mut pages {
            page.categories.retain(|category| !category.ctrls.is_empty());
        }
        pages.retain(|page| !page.categories.is_empty());
        pages
    }
}

/// Remove and return controls whose id starts with any of the prefixes, in
/// prefix order.
fn pop_by_prefixes(ctrls: &mut Vec<Control>, prefixes: &[&str]) -> Vec<Control> {
    let mut picked = Vec::new();
    for prefix in prefixes {
        while let Some(index) = ctrls.iter().position(|c| c.id.starts_with(prefix)) {
            picked.push(ctrls.remove(index));
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ControlKind, ControlValue};
    use crate::testio::FakeIo;
    use crate::v4l2::*;

    fn plain_camera() -> Arc<FakeIo> {
        Arc::new(
            FakeIo::new()
                .with_int_ctrl(V4L2_CID_BRIGHTNESS, "Brightness", 0, 255, 1, 128, 128)
                .with_int_ctrl(V4L2_CID_CONTRAST, "Contrast", 0, 100, 1, 50, 50)
                .with_menu_ctrl(
                    V4L2_CID_POWER_LINE_FREQUENCY,
                    "Power Line Frequency",
                    &["Disabled", "50 Hz", "60 Hz"],
                    1,
                    1,
                )
                .with_formats(&[b"YUYV"])
                .with_current_format(b"YUYV", 640, 480, 8),
        )
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn vendor_absence_is_silent() {
        let registry = CameraCtrls::new(plain_camera());
        let ids: Vec<String> = registry.controls().iter().map(|c| c.id.clone()).collect();
        assert!(ids.contains(&"brightness".to_string()));
        assert!(!ids.iter().any(|id| id.starts_with("kiyo_pro")));
        assert!(!ids.iter().any(|id| id.starts_with("logitech")));
    }

    #[test]
    fn partial_failure_is_isolated() {
        let mut registry = CameraCtrls::new(plain_camera());
        let mut errs = Vec::new();
        registry.setup_ctrls(
            &params(&[("brightness", "200"), ("bogus_ctrl", "1")]),
            &mut errs,
        );

        assert_eq!(errs.len(), 1, "exactly one warning: {errs:?}");
        assert!(errs[0].contains("bogus_ctrl"));
        assert!(!errs[0].contains("brightness"));
        assert_eq!(
            registry.control("brightness").unwrap().value,
            Some(ControlValue::Int(200))
        );
    }

    #[test]
    fn reapplying_is_idempotent_and_quiet() {
        let mut registry = CameraCtrls::new(plain_camera());
        let batch = params(&[("brightness", "70%"), ("power_line_frequency", "50_hz")]);

        let mut errs = Vec::new();
        registry.setup_ctrls(&batch, &mut errs);
        assert!(errs.is_empty(), "{errs:?}");
        let first: Vec<Option<ControlValue>> = registry
            .controls()
            .iter()
            .map(|c| c.value.clone())
            .collect();

        let mut errs = Vec::new();
        registry.setup_ctrls(&batch, &mut errs);
        assert!(errs.is_empty(), "second apply must not warn: {errs:?}");
        let second: Vec<Option<ControlValue>> = registry
            .controls()
            .iter()
            .map(|c| c.value.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn menu_value_round_trips_through_discovery() {
        let io = plain_camera();
        let mut registry = CameraCtrls::new(io.clone());
        let mut errs = Vec::new();
        registry.setup_ctrls(&params(&[("power_line_frequency", "60_hz")]), &mut errs);
        assert!(errs.is_empty());

        // a fresh discovery over the same device reports the same entry id
        let rediscovered = CameraCtrls::new(io);
        assert_eq!(
            rediscovered.control("power_line_frequency").unwrap().value,
            Some(ControlValue::Menu("60_hz".to_string()))
        );
    }

    #[test]
    fn reopen_control_latches_pending_flag() {
        let io = Arc::new(
            FakeIo::new()
                .with_formats(&[b"YUYV", b"MJPG"])
                .with_current_format(b"YUYV", 640, 480, 8),
        );
        let mut registry = CameraCtrls::new(io.clone());
        assert!(!registry.pending_reopen());

        let mut errs = Vec::new();
        let reopen = registry.setup_ctrls(&params(&[("pixelformat", "MJPG")]), &mut errs);
        assert!(reopen);
        assert!(errs.is_empty());
        assert!(registry.pending_reopen());
        // the cache reflects the request; the live format only changes on
        // the caller's reopen
        assert_eq!(
            registry.control("pixelformat").unwrap().value,
            Some(ControlValue::Menu("MJPG".to_string()))
        );

        registry.clear_pending_reopen();
        assert!(!registry.pending_reopen());
    }

    #[test]
    fn unknown_ids_reported_once_after_batch() {
        let mut registry = CameraCtrls::new(plain_camera());
        let mut errs = Vec::new();
        registry.setup_ctrls(
            &params(&[("ghost_a", "1"), ("brightness", "10"), ("ghost_b", "2")]),
            &mut errs,
        );
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("ghost_a") && errs[0].contains("ghost_b"));
    }

    #[test]
    fn pages_group_related_controls() {
        let registry = CameraCtrls::new(plain_camera());
        let pages = registry.pages();
        let basic = pages.iter().find(|p| p.title == "Basic").unwrap();
        let image = basic.categories.iter().find(|c| c.title == "Image").unwrap();
        let ids: Vec<&str> = image.ctrls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["brightness", "contrast"]);
        assert!(pages.iter().any(|p| p.title == "Capture"));
        // nothing vendor-specific on this camera, so no Settings page
        assert!(!pages.iter().any(|p| p.title == "Settings"));
    }

    #[test]
    fn info_controls_reject_writes() {
        let mut registry = CameraCtrls::new(plain_camera());
        let info = registry.control("colorspace").unwrap();
        assert_eq!(info.kind, ControlKind::Info);

        let mut errs = Vec::new();
        registry.setup_ctrls(&params(&[("colorspace", "sRGB")]), &mut errs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("colorspace"));
    }
}
