// SPDX-License-Identifier: GPL-3.0-only

//! Device handles and the control transport contract
//!
//! [`Device`] owns one opened V4L2 device node and implements every wire
//! operation the control providers consume. The [`ControlIo`] trait is the
//! boundary between the engine and the kernel: providers only ever see this
//! trait, which also lets the test suite substitute a scripted fake.

use crate::errors::CtrlError;
use crate::v4l2::*;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata reported for one control by the generic registry
#[derive(Debug, Clone)]
pub struct QueryCtrl {
    pub cid: u32,
    pub ctrl_type: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl QueryCtrl {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    pub fn is_inactive(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_INACTIVE != 0
    }
}

/// One entry of a menu-type control
#[derive(Debug, Clone)]
pub struct QueryMenuItem {
    pub name: String,
    pub value: i64,
}

/// Current capture format as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub pixelformat: u32,
    pub width: u32,
    pub height: u32,
    pub colorspace: u32,
}

/// A decoded device-pushed control change notification
#[derive(Debug, Clone, Copy)]
pub struct CtrlChange {
    pub cid: u32,
    pub changes: u32,
    pub value: i32,
    pub inactive: bool,
}

/// Transport contract between the engine and one open device handle.
///
/// Covers the generic control registry, the format/streaming parameters, the
/// UVC extension-unit byte protocol, the sysfs discovery attributes, and the
/// control event queue. Every call blocks for at most one round trip except
/// [`ControlIo::next_event`], which blocks up to its timeout.
pub trait ControlIo: Send + Sync {
    fn path(&self) -> &str;

    fn query_ctrl(&self, cid: u32) -> io::Result<QueryCtrl>;
    fn get_ctrl(&self, cid: u32) -> io::Result<i32>;
    /// Write a control value; returns the value the driver echoed back,
    /// which may differ from the requested one when the driver clamps.
    fn set_ctrl(&self, cid: u32, value: i32) -> io::Result<i32>;
    fn query_menu(&self, cid: u32, index: u32) -> io::Result<QueryMenuItem>;

    fn current_format(&self) -> io::Result<PixelFormat>;
    fn set_format(&self, pixelformat: u32, width: u32, height: u32) -> io::Result<PixelFormat>;
    fn current_frame_rate(&self) -> io::Result<u32>;
    fn set_frame_rate(&self, fps: u32) -> io::Result<u32>;
    fn formats(&self) -> Vec<u32>;
    fn frame_sizes(&self, pixelformat: u32) -> Vec<(u32, u32)>;
    fn frame_rates(&self, pixelformat: u32, width: u32, height: u32) -> Vec<u32>;

    /// Extension unit id for a descriptor GUID, 0 when the unit is absent
    fn xu_unit_id(&self, guid: &[u8; 16]) -> u8;
    /// `"vendor:product"` from sysfs, empty when unavailable
    fn usb_ids(&self) -> String;
    /// GET_LEN for one (unit, selector); must precede any other request
    fn xu_len(&self, unit: u8, selector: u8) -> io::Result<u16>;
    fn xu_query(&self, unit: u8, selector: u8, code: u8, data: &mut [u8]) -> io::Result<()>;

    fn subscribe_ctrl_events(&self, cid: u32) -> io::Result<()>;
    /// Wait up to `timeout_ms` for a control change; `Ok(None)` on timeout.
    fn next_event(&self, timeout_ms: i32) -> io::Result<Option<CtrlChange>>;
}

/// An open V4L2 capture device node
pub struct Device {
    path: String,
    file: File,
}

impl Device {
    /// Open a device node read-write and verify it is a capture device.
    pub fn open(path: &str) -> Result<Self, CtrlError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| CtrlError::DeviceOpen {
                path: path.to_string(),
                source,
            })?;

        let device = Self {
            path: path.to_string(),
            file,
        };

        let caps = device.device_caps()?;
        if caps & V4L2_CAP_VIDEO_CAPTURE == 0 {
            return Err(CtrlError::NotCaptureDevice(path.to_string()));
        }

        debug!(path, "Opened capture device");
        Ok(device)
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
        let result = unsafe { libc::ioctl(self.fd(), request as _, arg as *mut T) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn device_caps(&self) -> io::Result<u32> {
        let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
        self.ioctl(VIDIOC_QUERYCAP, &mut cap)?;
        Ok(if cap.device_caps != 0 {
            cap.device_caps
        } else {
            cap.capabilities
        })
    }

    /// Directory of this device's USB interface in sysfs, where the
    /// descriptor blob and the id attributes live.
    fn sysfs_usb_dir(&self) -> Option<PathBuf> {
        let resolved = std::fs::canonicalize(&self.path).ok()?;
        let name = resolved.file_name()?.to_string_lossy().to_string();
        Some(PathBuf::from(format!(
            "/sys/class/video4linux/{}/../../..",
            name
        )))
    }
}

impl ControlIo for Device {
    fn path(&self) -> &str {
        &self.path
    }

    fn query_ctrl(&self, cid: u32) -> io::Result<QueryCtrl> {
        let mut qctrl: V4l2Queryctrl = unsafe { std::mem::zeroed() };
        qctrl.id = cid;
        self.ioctl(VIDIOC_QUERYCTRL, &mut qctrl)?;
        Ok(QueryCtrl {
            cid: qctrl.id,
            ctrl_type: qctrl.ctrl_type,
            name: extract_name(&qctrl.name),
            minimum: qctrl.minimum,
            maximum: qctrl.maximum,
            step: qctrl.step,
            default_value: qctrl.default_value,
            flags: qctrl.flags,
        })
    }

    fn get_ctrl(&self, cid: u32) -> io::Result<i32> {
        let mut ctrl = V4l2Control { id: cid, value: 0 };
        self.ioctl(VIDIOC_G_CTRL, &mut ctrl).inspect_err(|err| {
            debug!(path = %self.path, cid, %err, "VIDIOC_G_CTRL failed");
        })?;
        Ok(ctrl.value)
    }

    fn set_ctrl(&self, cid: u32, value: i32) -> io::Result<i32> {
        let mut ctrl = V4l2Control { id: cid, value };
        self.ioctl(VIDIOC_S_CTRL, &mut ctrl).inspect_err(|err| {
            debug!(path = %self.path, cid, value, %err, "VIDIOC_S_CTRL failed");
        })?;
        Ok(ctrl.value)
    }

    fn query_menu(&self, cid: u32, index: u32) -> io::Result<QueryMenuItem> {
        let mut qmenu: V4l2Querymenu = unsafe { std::mem::zeroed() };
        qmenu.id = cid;
        qmenu.index = index;
        self.ioctl(VIDIOC_QUERYMENU, &mut qmenu)?;
        Ok(QueryMenuItem {
            name: qmenu.name(),
            value: qmenu.value(),
        })
    }

    fn current_format(&self) -> io::Result<PixelFormat> {
        let mut fmt = V4l2Format::capture();
        self.ioctl(VIDIOC_G_FMT, &mut fmt)?;
        Ok(PixelFormat {
            pixelformat: fmt.pix.pixelformat,
            width: fmt.pix.width,
            height: fmt.pix.height,
            colorspace: fmt.pix.colorspace,
        })
    }

    fn set_format(&self, pixelformat: u32, width: u32, height: u32) -> io::Result<PixelFormat> {
        let mut fmt = V4l2Format::capture();
        self.ioctl(VIDIOC_G_FMT, &mut fmt)?;
        fmt.pix.pixelformat = pixelformat;
        fmt.pix.width = width;
        fmt.pix.height = height;
        self.ioctl(VIDIOC_S_FMT, &mut fmt)?;
        Ok(PixelFormat {
            pixelformat: fmt.pix.pixelformat,
            width: fmt.pix.width,
            height: fmt.pix.height,
            colorspace: fmt.pix.colorspace,
        })
    }

    fn current_frame_rate(&self) -> io::Result<u32> {
        let mut parm = V4l2StreamParm::capture();
        self.ioctl(VIDIOC_G_PARM, &mut parm)?;
        let tf = parm.capture.timeperframe;
        if tf.numerator == 0 || tf.denominator == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid time per frame",
            ));
        }
        Ok(tf.denominator / tf.numerator)
    }

    fn set_frame_rate(&self, fps: u32) -> io::Result<u32> {
        let mut parm = V4l2StreamParm::capture();
        parm.capture.timeperframe = V4l2Fract {
            numerator: 1,
            denominator: fps,
        };
        self.ioctl(VIDIOC_S_PARM, &mut parm)?;
        let tf = parm.capture.timeperframe;
        if tf.numerator == 0 || tf.denominator == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "driver reported invalid frame rate",
            ));
        }
        Ok(tf.denominator / tf.numerator)
    }

    fn formats(&self) -> Vec<u32> {
        let mut formats = Vec::new();
        let mut desc: V4l2Fmtdesc = unsafe { std::mem::zeroed() };
        desc.buf_type = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        while self.ioctl(VIDIOC_ENUM_FMT, &mut desc).is_ok() {
            formats.push(desc.pixelformat);
            desc.index += 1;
        }
        formats
    }

    fn frame_sizes(&self, pixelformat: u32) -> Vec<(u32, u32)> {
        let mut sizes = Vec::new();
        let mut frm: V4l2Frmsizeenum = unsafe { std::mem::zeroed() };
        frm.pixel_format = pixelformat;
        while self.ioctl(VIDIOC_ENUM_FRAMESIZES, &mut frm).is_ok() {
            if frm.size_type != V4L2_FRMSIZE_TYPE_DISCRETE {
                break;
            }
            sizes.push((frm.width, frm.height));
            frm.index += 1;
        }
        sizes
    }

    fn frame_rates(&self, pixelformat: u32, width: u32, height: u32) -> Vec<u32> {
        let mut rates = Vec::new();
        let mut frmi: V4l2Frmivalenum = unsafe { std::mem::zeroed() };
        frmi.pixel_format = pixelformat;
        frmi.width = width;
        frmi.height = height;
        while self.ioctl(VIDIOC_ENUM_FRAMEINTERVALS, &mut frmi).is_ok() {
            if frmi.interval_type != V4L2_FRMIVAL_TYPE_DISCRETE {
                break;
            }
            if frmi.discrete.numerator != 0 {
                rates.push(frmi.discrete.denominator / frmi.discrete.numerator);
            }
            frmi.index += 1;
        }
        rates
    }

    fn xu_unit_id(&self, guid: &[u8; 16]) -> u8 {
        // The USB descriptors file holds the raw descriptor blob; the byte
        // immediately preceding the extension GUID is the unit id.
        let Some(dir) = self.sysfs_usb_dir() else {
            return 0;
        };
        let descriptors = match std::fs::read(dir.join("descriptors")) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %self.path, %err, "Failed to read USB descriptors");
                return 0;
            }
        };
        match descriptors.windows(guid.len()).position(|w| w == guid) {
            Some(pos) if pos > 0 => descriptors[pos - 1],
            _ => 0,
        }
    }

    fn usb_ids(&self) -> String {
        let Some(dir) = self.sysfs_usb_dir() else {
            return String::new();
        };
        let read_id = |name: &str| -> String {
            std::fs::read_to_string(dir.join(name))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let vendor = read_id("idVendor");
        let product = read_id("idProduct");
        if vendor.is_empty() || product.is_empty() {
            return String::new();
        }
        format!("{}:{}", vendor, product)
    }

    fn xu_len(&self, unit: u8, selector: u8) -> io::Result<u16> {
        let mut len: u16 = 0;
        let mut query = UvcXuControlQuery {
            unit,
            selector,
            query: UVC_GET_LEN,
            size: 2,
            data: &mut len as *mut u16 as *mut u8,
        };
        self.ioctl(UVCIOC_CTRL_QUERY, &mut query)?;
        Ok(len)
    }

    fn xu_query(&self, unit: u8, selector: u8, code: u8, data: &mut [u8]) -> io::Result<()> {
        let mut query = UvcXuControlQuery {
            unit,
            selector,
            query: code,
            size: data.len() as u16,
            data: data.as_mut_ptr(),
        };
        self.ioctl(UVCIOC_CTRL_QUERY, &mut query).inspect_err(|err| {
            warn!(path = %self.path, unit, selector, code, %err, "UVCIOC_CTRL_QUERY failed");
        })
    }

    fn subscribe_ctrl_events(&self, cid: u32) -> io::Result<()> {
        let mut sub: V4l2EventSubscription = unsafe { std::mem::zeroed() };
        sub.event_type = V4L2_EVENT_CTRL;
        sub.id = cid;
        self.ioctl(VIDIOC_SUBSCRIBE_EVENT, &mut sub)
    }

    fn next_event(&self, timeout_ms: i32) -> io::Result<Option<CtrlChange>> {
        // Control events are signaled as an exceptional condition.
        let mut pfd = libc::pollfd {
            fd: self.fd(),
            events: libc::POLLPRI,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(None);
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device handle is no longer usable",
            ));
        }

        let mut event: V4l2Event = unsafe { std::mem::zeroed() };
        self.ioctl(VIDIOC_DQEVENT, &mut event)?;
        if event.event_type != V4L2_EVENT_CTRL {
            return Ok(None);
        }
        Ok(Some(CtrlChange {
            cid: event.id,
            changes: event.ctrl.changes,
            value: event.ctrl.value(),
            inactive: event.ctrl.flags & V4L2_CTRL_FLAG_INACTIVE != 0,
        }))
    }
}

/// Enumerate video capture device nodes.
///
/// Prefers the stable `/dev/v4l/by-id/` and `/dev/v4l/by-path/` names over
/// bare `/dev/videoN` nodes; entries resolving to the same node are listed
/// once.
pub fn list_devices() -> Vec<String> {
    let search: [(&str, &str); 3] = [
        ("/dev/v4l/by-id/", ""),
        ("/dev/v4l/by-path/", ""),
        ("/dev/", "video"),
    ];

    let mut devices = Vec::new();
    let mut resolved_seen: Vec<PathBuf> = Vec::new();

    for (dir, prefix) in search {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(prefix) {
                continue;
            }
            let path = format!("{}{}", dir, name);
            let resolved = std::fs::canonicalize(&path)
                .unwrap_or_else(|_| PathBuf::from(&path));
            if resolved_seen.contains(&resolved) {
                continue;
            }
            if !is_capture_device(&path) {
                continue;
            }
            resolved_seen.push(resolved);
            devices.push(path);
        }
    }

    devices.sort();
    devices
}

fn is_capture_device(path: &str) -> bool {
    if !Path::new(path).exists() {
        return false;
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result =
        unsafe { libc::ioctl(file.as_raw_fd(), VIDIOC_QUERYCAP as _, &mut cap as *mut _) };
    if result < 0 {
        return false;
    }
    let caps = if cap.device_caps != 0 {
        cap.device_caps
    } else {
        cap.capabilities
    };
    caps & V4L2_CAP_VIDEO_CAPTURE != 0
}
