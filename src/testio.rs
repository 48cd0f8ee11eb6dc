// SPDX-License-Identifier: GPL-3.0-only

//! Scripted fake transport for the test suite
//!
//! Implements [`ControlIo`] over in-memory state so discovery, mutation,
//! verification and the listener can be exercised without hardware. Builder
//! methods script the device; the `&self` mutators change device state from
//! "outside" mid-test (another process grabbing the camera, a driver
//! clamping a write, the device disappearing).

use crate::device::{ControlIo, CtrlChange, PixelFormat, QueryCtrl, QueryMenuItem};
use crate::v4l2::*;
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

struct FakeCtrl {
    cid: u32,
    name: String,
    ctrl_type: u32,
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    current: i32,
    flags: u32,
    menu: Vec<String>,
    /// forced echo value emulating a driver that clamps or refuses writes
    forced_echo: Option<i32>,
}

struct XuBuffer {
    unit: u8,
    selector: u8,
    cur: Vec<u8>,
    min: Vec<u8>,
    max: Vec<u8>,
    stuck: bool,
    writes: Vec<Vec<u8>>,
}

struct Inner {
    ctrls: Vec<FakeCtrl>,
    formats: Vec<u32>,
    frame_sizes: Vec<(u32, u32)>,
    frame_rates: Vec<u32>,
    current: PixelFormat,
    fps: u32,
    xu_units: Vec<([u8; 16], u8)>,
    xu_buffers: Vec<XuBuffer>,
    usb_ids: String,
    subscriptions: Vec<u32>,
    events: VecDeque<CtrlChange>,
    events_dead: bool,
}

pub struct FakeIo {
    inner: Mutex<Inner>,
}

impl FakeIo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                ctrls: Vec::new(),
                formats: Vec::new(),
                frame_sizes: Vec::new(),
                frame_rates: Vec::new(),
                current: PixelFormat {
                    pixelformat: 0,
                    width: 0,
                    height: 0,
                    colorspace: 0,
                },
                fps: 0,
                xu_units: Vec::new(),
                xu_buffers: Vec::new(),
                usb_ids: String::new(),
                subscriptions: Vec::new(),
                events: VecDeque::new(),
                events_dead: false,
            }),
        }
    }

    // ===== builders =====

    pub fn with_int_ctrl(
        self,
        cid: u32,
        name: &str,
        minimum: i32,
        maximum: i32,
        step: i32,
        default_value: i32,
        current: i32,
    ) -> Self {
        self.inner.lock().unwrap().ctrls.push(FakeCtrl {
            cid,
            name: name.to_string(),
            ctrl_type: V4L2_CTRL_TYPE_INTEGER,
            minimum,
            maximum,
            step,
            default_value,
            current,
            flags: 0,
            menu: Vec::new(),
            forced_echo: None,
        });
        self
    }

    pub fn with_bool_ctrl(self, cid: u32, name: &str, default: bool, current: bool) -> Self {
        self.inner.lock().unwrap().ctrls.push(FakeCtrl {
            cid,
            name: name.to_string(),
            ctrl_type: V4L2_CTRL_TYPE_BOOLEAN,
            minimum: 0,
            maximum: 1,
            step: 1,
            default_value: default as i32,
            current: current as i32,
            flags: 0,
            menu: Vec::new(),
            forced_echo: None,
        });
        self
    }

    pub fn with_menu_ctrl(
        self,
        cid: u32,
        name: &str,
        entries: &[&str],
        default_index: i32,
        current_index: i32,
    ) -> Self {
        self.inner.lock().unwrap().ctrls.push(FakeCtrl {
            cid,
            name: name.to_string(),
            ctrl_type: V4L2_CTRL_TYPE_MENU,
            minimum: 0,
            maximum: entries.len() as i32 - 1,
            step: 1,
            default_value: default_index,
            current: current_index,
            flags: 0,
            menu: entries.iter().map(|e| e.to_string()).collect(),
            forced_echo: None,
        });
        self
    }

    pub fn with_formats(self, formats: &[&[u8; 4]]) -> Self {
        self.inner.lock().unwrap().formats = formats.iter().map(|f| fourcc(f)).collect();
        self
    }

    pub fn with_frame_sizes(self, sizes: &[(u32, u32)]) -> Self {
        self.inner.lock().unwrap().frame_sizes = sizes.to_vec();
        self
    }

    pub fn with_frame_rates(self, rates: &[u32]) -> Self {
        self.inner.lock().unwrap().frame_rates = rates.to_vec();
        self
    }

    pub fn with_current_format(self, code: &[u8; 4], width: u32, height: u32, colorspace: u32) -> Self {
        self.inner.lock().unwrap().current = PixelFormat {
            pixelformat: fourcc(code),
            width,
            height,
            colorspace,
        };
        self
    }

    pub fn with_frame_rate(self, fps: u32) -> Self {
        self.inner.lock().unwrap().fps = fps;
        self
    }

    pub fn with_xu_unit(self, guid: &[u8; 16], unit: u8) -> Self {
        self.inner.lock().unwrap().xu_units.push((*guid, unit));
        self
    }

    pub fn with_xu_buffer(self, unit: u8, selector: u8, cur: Vec<u8>) -> Self {
        let len = cur.len();
        self.with_xu_buffer_ranges(unit, selector, cur, vec![0x00; len], vec![0xff; len])
    }

    pub fn with_xu_buffer_ranges(
        self,
        unit: u8,
        selector: u8,
        cur: Vec<u8>,
        min: Vec<u8>,
        max: Vec<u8>,
    ) -> Self {
        self.inner.lock().unwrap().xu_buffers.push(XuBuffer {
            unit,
            selector,
            cur,
            min,
            max,
            stuck: false,
            writes: Vec::new(),
        });
        self
    }

    pub fn with_usb_ids(self, ids: &str) -> Self {
        self.inner.lock().unwrap().usb_ids = ids.to_string();
        self
    }

    // ===== mid-test device behaviour =====

    /// Make writes to `cid` echo `value` without changing device state.
    pub fn clamp_writes_to(&self, cid: u32, value: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ctrl) = inner.ctrls.iter_mut().find(|c| c.cid == cid) {
            ctrl.forced_echo = Some(value);
        }
    }

    /// Change the live capture format behind the engine's back.
    pub fn set_device_format(&self, code: &[u8; 4], width: u32, height: u32, colorspace: u32) {
        self.inner.lock().unwrap().current = PixelFormat {
            pixelformat: fourcc(code),
            width,
            height,
            colorspace,
        };
    }

    pub fn set_device_frame_rate(&self, fps: u32) {
        self.inner.lock().unwrap().fps = fps;
    }

    pub fn push_event(&self, change: CtrlChange) {
        self.inner.lock().unwrap().events.push_back(change);
    }

    /// Simulate device removal: every further wait fails.
    pub fn kill_events(&self) {
        self.inner.lock().unwrap().events_dead = true;
    }

    /// Make SET_CUR on a selector buffer a silent no-op.
    pub fn stick_xu_buffer(&self, unit: u8, selector: u8) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(buf) = inner
            .xu_buffers
            .iter_mut()
            .find(|b| b.unit == unit && b.selector == selector)
        {
            buf.stuck = true;
        }
    }

    pub fn xu_writes(&self, unit: u8, selector: u8) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner
            .xu_buffers
            .iter()
            .find(|b| b.unit == unit && b.selector == selector)
            .map(|b| b.writes.clone())
            .unwrap_or_default()
    }

    pub fn xu_current(&self, unit: u8, selector: u8) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner
            .xu_buffers
            .iter()
            .find(|b| b.unit == unit && b.selector == selector)
            .map(|b| b.cur.clone())
            .unwrap_or_default()
    }

    pub fn subscriptions(&self) -> Vec<u32> {
        self.inner.lock().unwrap().subscriptions.clone()
    }
}

fn not_found() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "no such control")
}

impl ControlIo for FakeIo {
    fn path(&self) -> &str {
        "/dev/video-fake"
    }

    fn query_ctrl(&self, cid: u32) -> io::Result<QueryCtrl> {
        let inner = self.inner.lock().unwrap();
        let next_flags = V4L2_CTRL_FLAG_NEXT_CTRL | V4L2_CTRL_FLAG_NEXT_COMPOUND;

        let ctrl = if cid & next_flags != 0 {
            let base = cid & !next_flags;
            if base == 0 {
                inner.ctrls.first()
            } else {
                let position = inner.ctrls.iter().position(|c| c.cid == base);
                position.and_then(|p| inner.ctrls.get(p + 1))
            }
        } else {
            inner.ctrls.iter().find(|c| c.cid == cid)
        };

        let ctrl = ctrl.ok_or_else(not_found)?;
        Ok(QueryCtrl {
            cid: ctrl.cid,
            ctrl_type: ctrl.ctrl_type,
            name: ctrl.name.clone(),
            minimum: ctrl.minimum,
            maximum: ctrl.maximum,
            step: ctrl.step,
            default_value: ctrl.default_value,
            flags: ctrl.flags,
        })
    }

    fn get_ctrl(&self, cid: u32) -> io::Result<i32> {
        let inner = self.inner.lock().unwrap();
        inner
            .ctrls
            .iter()
            .find(|c| c.cid == cid)
            .map(|c| c.current)
            .ok_or_else(not_found)
    }

    fn set_ctrl(&self, cid: u32, value: i32) -> io::Result<i32> {
        let mut inner = self.inner.lock().unwrap();
        let ctrl = inner
            .ctrls
            .iter_mut()
            .find(|c| c.cid == cid)
            .ok_or_else(not_found)?;
        if let Some(echo) = ctrl.forced_echo {
            return Ok(echo);
        }
        let clamped = value.clamp(ctrl.minimum, ctrl.maximum);
        ctrl.current = clamped;
        Ok(clamped)
    }

    fn query_menu(&self, cid: u32, index: u32) -> io::Result<QueryMenuItem> {
        let inner = self.inner.lock().unwrap();
        let ctrl = inner
            .ctrls
            .iter()
            .find(|c| c.cid == cid)
            .ok_or_else(not_found)?;
        let name = ctrl.menu.get(index as usize).ok_or_else(not_found)?;
        Ok(QueryMenuItem {
            name: name.clone(),
            value: index as i64,
        })
    }

    fn current_format(&self) -> io::Result<PixelFormat> {
        let inner = self.inner.lock().unwrap();
        if inner.current.pixelformat == 0 {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "no format"));
        }
        Ok(inner.current)
    }

    fn set_format(&self, pixelformat: u32, width: u32, height: u32) -> io::Result<PixelFormat> {
        let mut inner = self.inner.lock().unwrap();
        inner.current.pixelformat = pixelformat;
        inner.current.width = width;
        inner.current.height = height;
        Ok(inner.current)
    }

    fn current_frame_rate(&self) -> io::Result<u32> {
        let inner = self.inner.lock().unwrap();
        if inner.fps == 0 {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "no frame rate"));
        }
        Ok(inner.fps)
    }

    fn set_frame_rate(&self, fps: u32) -> io::Result<u32> {
        let mut inner = self.inner.lock().unwrap();
        inner.fps = fps;
        Ok(fps)
    }

    fn formats(&self) -> Vec<u32> {
        self.inner.lock().unwrap().formats.clone()
    }

    fn frame_sizes(&self, _pixelformat: u32) -> Vec<(u32, u32)> {
        self.inner.lock().unwrap().frame_sizes.clone()
    }

    fn frame_rates(&self, _pixelformat: u32, _width: u32, _height: u32) -> Vec<u32> {
        self.inner.lock().unwrap().frame_rates.clone()
    }

    fn xu_unit_id(&self, guid: &[u8; 16]) -> u8 {
        let inner = self.inner.lock().unwrap();
        inner
            .xu_units
            .iter()
            .find(|(g, _)| g == guid)
            .map(|(_, unit)| *unit)
            .unwrap_or(0)
    }

    fn usb_ids(&self) -> String {
        self.inner.lock().unwrap().usb_ids.clone()
    }

    fn xu_len(&self, unit: u8, selector: u8) -> io::Result<u16> {
        let inner = self.inner.lock().unwrap();
        inner
            .xu_buffers
            .iter()
            .find(|b| b.unit == unit && b.selector == selector)
            .map(|b| b.cur.len() as u16)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no such selector"))
    }

    fn xu_query(&self, unit: u8, selector: u8, code: u8, data: &mut [u8]) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let buf = inner
            .xu_buffers
            .iter_mut()
            .find(|b| b.unit == unit && b.selector == selector)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no such selector"))?;

        match code {
            UVC_GET_MIN => copy_into(data, &buf.min),
            UVC_GET_MAX => copy_into(data, &buf.max),
            UVC_GET_CUR => copy_into(data, &buf.cur),
            UVC_SET_CUR => {
                buf.writes.push(data.to_vec());
                if !buf.stuck {
                    buf.cur = data.to_vec();
                }
            }
            _ => return Err(io::Error::new(io::ErrorKind::Unsupported, "bad request")),
        }
        Ok(())
    }

    fn subscribe_ctrl_events(&self, cid: u32) -> io::Result<()> {
        self.inner.lock().unwrap().subscriptions.push(cid);
        Ok(())
    }

    fn next_event(&self, timeout_ms: i32) -> io::Result<Option<CtrlChange>> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.events_dead {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device removed"));
            }
            if let Some(change) = inner.events.pop_front() {
                return Ok(Some(change));
            }
        }
        // emulate the bounded wait without stalling the test suite
        std::thread::sleep(Duration::from_millis((timeout_ms as u64).min(5)));
        Ok(None)
    }
}

fn copy_into(data: &mut [u8], src: &[u8]) {
    let len = data.len().min(src.len());
    data[..len].copy_from_slice(&src[..len]);
}
