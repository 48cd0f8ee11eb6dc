// SPDX-License-Identifier: GPL-3.0-only

//! Curated control metadata and engine-wide tuning constants
//!
//! The metadata table supplies a stable text id and a tooltip for a known
//! subset of generic controls. Kernel control names have been renamed across
//! releases ("Exposure, Auto" became "Auto Exposure", "White Balance
//! Temperature, Auto" became "White Balance, Automatic"), so ids derived
//! from the name alone are not stable; table entries pin them. Absence from
//! the table is not an error, the normalized name is used instead.

use crate::v4l2::*;
use std::time::Duration;

/// Curated metadata for one generic control
pub struct ControlMeta {
    pub cid: u32,
    pub text_id: &'static str,
    pub tooltip: &'static str,
}

pub const CONTROL_METADATA: &[ControlMeta] = &[
    ControlMeta {
        cid: V4L2_CID_BRIGHTNESS,
        text_id: "brightness",
        tooltip: "Picture brightness, or the black level",
    },
    ControlMeta {
        cid: V4L2_CID_CONTRAST,
        text_id: "contrast",
        tooltip: "Picture contrast or luma gain",
    },
    ControlMeta {
        cid: V4L2_CID_SATURATION,
        text_id: "saturation",
        tooltip: "Picture color saturation or chroma gain",
    },
    ControlMeta {
        cid: V4L2_CID_HUE,
        text_id: "hue",
        tooltip: "Hue or color balance",
    },
    ControlMeta {
        cid: V4L2_CID_GAMMA,
        text_id: "gamma",
        tooltip: "Gamma adjustment",
    },
    ControlMeta {
        cid: V4L2_CID_GAIN,
        text_id: "gain",
        tooltip: "Sensor gain",
    },
    ControlMeta {
        cid: V4L2_CID_SHARPNESS,
        text_id: "sharpness",
        tooltip: "Edge enhancement strength",
    },
    ControlMeta {
        cid: V4L2_CID_BACKLIGHT_COMPENSATION,
        text_id: "backlight_compensation",
        tooltip: "Brightens backlit subjects",
    },
    ControlMeta {
        cid: V4L2_CID_POWER_LINE_FREQUENCY,
        text_id: "power_line_frequency",
        tooltip: "Flicker filter for artificial lighting",
    },
    ControlMeta {
        cid: V4L2_CID_AUTO_WHITE_BALANCE,
        text_id: "white_balance_automatic",
        tooltip: "Let the device measure white balance continuously",
    },
    ControlMeta {
        cid: V4L2_CID_WHITE_BALANCE_TEMPERATURE,
        text_id: "white_balance_temperature",
        tooltip: "Color temperature in Kelvin",
    },
    ControlMeta {
        cid: V4L2_CID_EXPOSURE_AUTO,
        text_id: "auto_exposure",
        tooltip: "Exposure time and iris mode",
    },
    ControlMeta {
        cid: V4L2_CID_EXPOSURE_ABSOLUTE,
        text_id: "exposure_time_absolute",
        tooltip: "Exposure time in 100 microsecond units",
    },
    ControlMeta {
        cid: V4L2_CID_FOCUS_ABSOLUTE,
        text_id: "focus_absolute",
        tooltip: "Focus distance, smaller values focus closer",
    },
    ControlMeta {
        cid: V4L2_CID_FOCUS_AUTO,
        text_id: "focus_automatic_continuous",
        tooltip: "Continuous autofocus",
    },
    ControlMeta {
        cid: V4L2_CID_PAN_ABSOLUTE,
        text_id: "pan_absolute",
        tooltip: "Horizontal camera angle",
    },
    ControlMeta {
        cid: V4L2_CID_TILT_ABSOLUTE,
        text_id: "tilt_absolute",
        tooltip: "Vertical camera angle",
    },
    ControlMeta {
        cid: V4L2_CID_ZOOM_ABSOLUTE,
        text_id: "zoom_absolute",
        tooltip: "Optical zoom position",
    },
    ControlMeta {
        cid: V4L2_CID_PAN_SPEED,
        text_id: "pan_speed",
        tooltip: "Continuous horizontal movement speed",
    },
    ControlMeta {
        cid: V4L2_CID_TILT_SPEED,
        text_id: "tilt_speed",
        tooltip: "Continuous vertical movement speed",
    },
];

/// Look up curated metadata by control id
pub fn control_meta(cid: u32) -> Option<&'static ControlMeta> {
    CONTROL_METADATA.iter().find(|meta| meta.cid == cid)
}

/// Bounded wait of one listener tick; also bounds how long a cooperative
/// stop may take.
pub const LISTENER_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of in-memory PTZ preset slots
pub const PTZ_PRESET_SLOTS: u8 = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_ids_are_unique() {
        for (i, meta) in CONTROL_METADATA.iter().enumerate() {
            for other in &CONTROL_METADATA[i + 1..] {
                assert_ne!(meta.cid, other.cid);
                assert_ne!(meta.text_id, other.text_id);
            }
        }
    }

    #[test]
    fn metadata_lookup() {
        assert_eq!(
            control_meta(V4L2_CID_EXPOSURE_AUTO).map(|m| m.text_id),
            Some("auto_exposure")
        );
        assert!(control_meta(0xdead_beef).is_none());
    }
}
