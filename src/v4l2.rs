// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 and UVC kernel ABI
//!
//! Wire-level structures and ioctl numbers for the two control surfaces the
//! engine talks to: the standard V4L2 control registry and the UVC
//! extension-unit byte protocol. All ioctl numbers are the x86-64 values,
//! precomputed as `(dir << 30) | (size << 16) | (type << 8) | nr` and
//! annotated with the struct size they encode.

// ===== Control Classes =====

pub const V4L2_CTRL_CLASS_USER: u32 = 0x0098_0000;
pub const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a_0000;

pub const V4L2_CID_BASE: u32 = V4L2_CTRL_CLASS_USER | 0x900;
pub const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

// ===== Control IDs (User Class) =====

pub const V4L2_CID_BRIGHTNESS: u32 = V4L2_CID_BASE;
pub const V4L2_CID_CONTRAST: u32 = V4L2_CID_BASE + 1;
pub const V4L2_CID_SATURATION: u32 = V4L2_CID_BASE + 2;
pub const V4L2_CID_HUE: u32 = V4L2_CID_BASE + 3;
pub const V4L2_CID_AUTO_WHITE_BALANCE: u32 = V4L2_CID_BASE + 12;
pub const V4L2_CID_GAMMA: u32 = V4L2_CID_BASE + 16;
pub const V4L2_CID_GAIN: u32 = V4L2_CID_BASE + 19;
pub const V4L2_CID_POWER_LINE_FREQUENCY: u32 = V4L2_CID_BASE + 24;
pub const V4L2_CID_WHITE_BALANCE_TEMPERATURE: u32 = V4L2_CID_BASE + 26;
pub const V4L2_CID_SHARPNESS: u32 = V4L2_CID_BASE + 27;
pub const V4L2_CID_BACKLIGHT_COMPENSATION: u32 = V4L2_CID_BASE + 28;

// ===== Control IDs (Camera Class) =====

pub const V4L2_CID_EXPOSURE_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 1;
pub const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 2;
pub const V4L2_CID_PAN_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 8;
pub const V4L2_CID_TILT_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 9;
pub const V4L2_CID_FOCUS_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 10;
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;
pub const V4L2_CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;
pub const V4L2_CID_ISO_SENSITIVITY_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 24;
pub const V4L2_CID_PAN_SPEED: u32 = V4L2_CID_CAMERA_CLASS_BASE + 32;
pub const V4L2_CID_TILT_SPEED: u32 = V4L2_CID_CAMERA_CLASS_BASE + 33;

// ===== Control Types =====

pub const V4L2_CTRL_TYPE_INTEGER: u32 = 1;
pub const V4L2_CTRL_TYPE_BOOLEAN: u32 = 2;
pub const V4L2_CTRL_TYPE_MENU: u32 = 3;
pub const V4L2_CTRL_TYPE_BUTTON: u32 = 4;
pub const V4L2_CTRL_TYPE_INTEGER_MENU: u32 = 9;

// ===== Control Flags =====

pub const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
pub const V4L2_CTRL_FLAG_INACTIVE: u32 = 0x0010;
pub const V4L2_CTRL_FLAG_NEXT_CTRL: u32 = 0x8000_0000;
pub const V4L2_CTRL_FLAG_NEXT_COMPOUND: u32 = 0x4000_0000;

// ===== Capabilities =====

pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;

// ===== Frame size / interval enumeration types =====

pub const V4L2_FRMSIZE_TYPE_DISCRETE: u32 = 1;
pub const V4L2_FRMIVAL_TYPE_DISCRETE: u32 = 1;

// ===== Control Events =====

pub const V4L2_EVENT_CTRL: u32 = 3;
pub const V4L2_EVENT_CTRL_CH_VALUE: u32 = 0x0001;
pub const V4L2_EVENT_CTRL_CH_FLAGS: u32 = 0x0002;

// ===== UVC Class-Specific Request Codes (linux/usb/video.h A.8) =====

pub const UVC_SET_CUR: u8 = 0x01;
pub const UVC_GET_CUR: u8 = 0x81;
pub const UVC_GET_MIN: u8 = 0x82;
pub const UVC_GET_MAX: u8 = 0x83;
pub const UVC_GET_LEN: u8 = 0x85;

// ===== ioctl Numbers =====

/// Query device capabilities (v4l2_capability: 104 bytes)
pub const VIDIOC_QUERYCAP: libc::c_ulong = 0x8068_5600;
/// Enumerate pixel formats (v4l2_fmtdesc: 64 bytes)
pub const VIDIOC_ENUM_FMT: libc::c_ulong = 0xc040_5602;
/// Get current format (v4l2_format: 208 bytes)
pub const VIDIOC_G_FMT: libc::c_ulong = 0xc0d0_5604;
/// Set format (v4l2_format: 208 bytes)
pub const VIDIOC_S_FMT: libc::c_ulong = 0xc0d0_5605;
/// Get stream parameters (v4l2_streamparm: 204 bytes)
pub const VIDIOC_G_PARM: libc::c_ulong = 0xc0cc_5615;
/// Set stream parameters (v4l2_streamparm: 204 bytes)
pub const VIDIOC_S_PARM: libc::c_ulong = 0xc0cc_5616;
/// Get control value (v4l2_control: 8 bytes)
pub const VIDIOC_G_CTRL: libc::c_ulong = 0xc008_561b;
/// Set control value (v4l2_control: 8 bytes)
pub const VIDIOC_S_CTRL: libc::c_ulong = 0xc008_561c;
/// Query control info (v4l2_queryctrl: 68 bytes)
pub const VIDIOC_QUERYCTRL: libc::c_ulong = 0xc044_5624;
/// Query menu item (v4l2_querymenu: 44 bytes, packed)
pub const VIDIOC_QUERYMENU: libc::c_ulong = 0xc02c_5625;
/// Enumerate frame sizes (v4l2_frmsizeenum: 44 bytes)
pub const VIDIOC_ENUM_FRAMESIZES: libc::c_ulong = 0xc02c_564a;
/// Enumerate frame intervals (v4l2_frmivalenum: 52 bytes)
pub const VIDIOC_ENUM_FRAMEINTERVALS: libc::c_ulong = 0xc034_564b;
/// Dequeue a pending event (v4l2_event: 136 bytes)
pub const VIDIOC_DQEVENT: libc::c_ulong = 0x8088_5659;
/// Subscribe to an event source (v4l2_event_subscription: 32 bytes)
pub const VIDIOC_SUBSCRIBE_EVENT: libc::c_ulong = 0x4020_565a;
/// UVC extension-unit query (uvc_xu_control_query: 16 bytes)
pub const UVCIOC_CTRL_QUERY: libc::c_ulong = 0xc010_7521;

// ===== ioctl Structures =====

#[repr(C)]
pub struct V4l2Capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
pub struct V4l2Control {
    pub id: u32,
    pub value: i32,
}

#[repr(C)]
pub struct V4l2Queryctrl {
    pub id: u32,
    pub ctrl_type: u32,
    pub name: [u8; 32],
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
    pub reserved: [u32; 2],
}

/// The 32-byte payload is a union of a UTF-8 name (menu) and an i64 value
/// (integer menu); accessors below pick the right view.
#[repr(C, packed)]
pub struct V4l2Querymenu {
    pub id: u32,
    pub index: u32,
    pub data: [u8; 32],
    pub reserved: u32,
}

impl V4l2Querymenu {
    pub fn name(&self) -> String {
        extract_name(&self.data)
    }

    pub fn value(&self) -> i64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[..8]);
        i64::from_le_bytes(raw)
    }
}

#[repr(C)]
pub struct V4l2PixFormat {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub private: u32,
}

/// v4l2_format with the 200-byte union reduced to the single-planar capture
/// view; `_align` keeps `pix` at offset 8 like the C union (which contains
/// pointers on 64-bit).
#[repr(C)]
pub struct V4l2Format {
    pub buf_type: u32,
    _align: u32,
    pub pix: V4l2PixFormat,
    _rest: [u8; 168],
}

impl V4l2Format {
    pub fn capture() -> Self {
        let mut fmt: Self = unsafe { std::mem::zeroed() };
        fmt.buf_type = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        fmt
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct V4l2Fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
pub struct V4l2CaptureParm {
    pub capability: u32,
    pub capturemode: u32,
    pub timeperframe: V4l2Fract,
    pub extendedmode: u32,
    pub readbuffers: u32,
    pub reserved: [u32; 4],
}

/// v4l2_streamparm reduced to the capture view of its 200-byte union.
#[repr(C)]
pub struct V4l2StreamParm {
    pub buf_type: u32,
    pub capture: V4l2CaptureParm,
    _rest: [u8; 160],
}

impl V4l2StreamParm {
    pub fn capture() -> Self {
        let mut parm: Self = unsafe { std::mem::zeroed() };
        parm.buf_type = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        parm
    }
}

#[repr(C)]
pub struct V4l2Fmtdesc {
    pub index: u32,
    pub buf_type: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub reserved: [u32; 4],
}

/// v4l2_frmsizeenum with the union reduced to the discrete view.
#[repr(C)]
pub struct V4l2Frmsizeenum {
    pub index: u32,
    pub pixel_format: u32,
    pub size_type: u32,
    pub width: u32,
    pub height: u32,
    _stepwise_rest: [u32; 4],
    pub reserved: [u32; 2],
}

/// v4l2_frmivalenum with the union reduced to the discrete view.
#[repr(C)]
pub struct V4l2Frmivalenum {
    pub index: u32,
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub interval_type: u32,
    pub discrete: V4l2Fract,
    _stepwise_rest: [u32; 4],
    pub reserved: [u32; 2],
}

#[repr(C)]
pub struct V4l2EventSubscription {
    pub event_type: u32,
    pub id: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

/// v4l2_event_ctrl; the value union is kept as i64, the i32 member occupies
/// its low bytes on little-endian.
#[repr(C)]
pub struct V4l2EventCtrl {
    pub changes: u32,
    pub ctrl_type: u32,
    pub value64: i64,
    pub flags: u32,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
}

impl V4l2EventCtrl {
    pub fn value(&self) -> i32 {
        self.value64 as i32
    }
}

/// v4l2_event with the 64-byte payload union reduced to the control view.
#[repr(C)]
pub struct V4l2Event {
    pub event_type: u32,
    _align: u32,
    pub ctrl: V4l2EventCtrl,
    _u_rest: [u8; 24],
    pub pending: u32,
    pub sequence: u32,
    pub timestamp: [i64; 2],
    pub id: u32,
    pub reserved: [u32; 8],
}

#[repr(C)]
pub struct UvcXuControlQuery {
    pub unit: u8,
    pub selector: u8,
    pub query: u8,
    pub size: u16,
    pub data: *mut u8,
}

// ===== Helpers =====

/// Extract a null-terminated string from a fixed-size byte array
pub fn extract_name(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).to_string()
}

/// Pack a four-character pixel format code, e.g. `fourcc(b"MJPG")`
pub fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Render a pixel format code as its four-character string
pub fn fourcc_to_string(pxf: u32) -> String {
    pxf.to_le_bytes().iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn control_id_values() {
        assert_eq!(V4L2_CID_BRIGHTNESS, 0x0098_0900);
        assert_eq!(V4L2_CID_WHITE_BALANCE_TEMPERATURE, 0x0098_091a);
        assert_eq!(V4L2_CID_EXPOSURE_AUTO, 0x009a_0901);
        assert_eq!(V4L2_CID_FOCUS_AUTO, 0x009a_090c);
        assert_eq!(V4L2_CID_PAN_SPEED, 0x009a_0920);
        assert_eq!(V4L2_CID_ZOOM_ABSOLUTE, 0x009a_090d);
    }

    #[test]
    fn struct_sizes_match_ioctl_encodings() {
        // The size field baked into each ioctl number must match the struct
        // we hand the kernel, or the copy in/out is silently truncated.
        assert_eq!(size_of::<V4l2Capability>(), 104);
        assert_eq!(size_of::<V4l2Control>(), 8);
        assert_eq!(size_of::<V4l2Queryctrl>(), 68);
        assert_eq!(size_of::<V4l2Querymenu>(), 44);
        assert_eq!(size_of::<V4l2Format>(), 208);
        assert_eq!(size_of::<V4l2StreamParm>(), 204);
        assert_eq!(size_of::<V4l2Fmtdesc>(), 64);
        assert_eq!(size_of::<V4l2Frmsizeenum>(), 44);
        assert_eq!(size_of::<V4l2Frmivalenum>(), 52);
        assert_eq!(size_of::<V4l2EventSubscription>(), 32);
        assert_eq!(size_of::<V4l2Event>(), 136);
        assert_eq!(size_of::<UvcXuControlQuery>(), 16);
    }

    #[test]
    fn fourcc_round_trip() {
        let mjpg = fourcc(b"MJPG");
        assert_eq!(fourcc_to_string(mjpg), "MJPG");
        assert_eq!(fourcc(b"YUYV"), 0x5659_5559);
    }
}
