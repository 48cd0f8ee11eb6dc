// SPDX-License-Identifier: GPL-3.0-only

//! Capture format provider
//!
//! Pixel format, resolution and frame rate presented as menu controls. All
//! three lock the device while streaming, so changing any of them requires
//! the caller to close and reopen the handle; the controls are flagged
//! accordingly and the engine only ever updates the cached value plus the
//! pending-reopen signal. None of them emit change events, which is why the
//! listener re-polls them through [`ControlProvider::poll_reopen`].

use super::{
    Control, ControlAddr, ControlKind, ControlProvider, ControlValue, MenuEntry, MenuPayload,
};
use crate::device::ControlIo;
use crate::v4l2::{fourcc, fourcc_to_string};
use std::sync::Arc;
use tracing::warn;

pub struct FmtCtrls {
    io: Arc<dyn ControlIo>,
    ctrls: Vec<Control>,
}

impl FmtCtrls {
    pub fn new(io: Arc<dyn ControlIo>) -> Self {
        let ctrls = discover(io.as_ref());
        Self { io, ctrls }
    }

    fn cached_value(&self, id: &str) -> Option<String> {
        self.ctrls
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.value.as_ref())
            .map(|v| v.to_string())
    }

    fn update_cached(&mut self, id: &str, value: ControlValue) {
        if let Some(ctrl) = self.ctrls.iter_mut().find(|c| c.id == id) {
            ctrl.value = Some(value);
        }
    }
}

fn discover(io: &dyn ControlIo) -> Vec<Control> {
    let fmt = match io.current_format() {
        Ok(fmt) => fmt,
        Err(err) => {
            warn!(device = io.path(), %err, "Can't read capture format");
            return Vec::new();
        }
    };

    let pixelformat = fourcc_to_string(fmt.pixelformat);
    let resolution = format!("{}x{}", fmt.width, fmt.height);

    let mut formats: Vec<String> = io.formats().iter().map(|&f| fourcc_to_string(f)).collect();
    if !formats.contains(&pixelformat) {
        formats.push(pixelformat.clone());
    }
    let mut ctrls = vec![menu_ctrl(
        "pixelformat",
        "Pixel format",
        ControlAddr::PixelFormat,
        &formats,
        &pixelformat,
    )];

    let resolutions: Vec<String> = io
        .frame_sizes(fmt.pixelformat)
        .iter()
        .map(|&(w, h)| format!("{}x{}", w, h))
        .collect();
    if !resolutions.is_empty() {
        let mut resolutions = resolutions;
        if !resolutions.contains(&resolution) {
            resolutions.push(resolution.clone());
        }
        ctrls.push(menu_ctrl(
            "resolution",
            "Resolution",
            ControlAddr::Resolution,
            &resolutions,
            &resolution,
        ));
    }

    let rates: Vec<String> = io
        .frame_rates(fmt.pixelformat, fmt.width, fmt.height)
        .iter()
        .map(|fps| fps.to_string())
        .collect();
    if !rates.is_empty() {
        let fps = io
            .current_frame_rate()
            .map(|fps| fps.to_string())
            .unwrap_or_else(|_| rates[0].clone());
        let mut rates = rates;
        if !rates.contains(&fps) {
            rates.push(fps.clone());
        }
        ctrls.push(menu_ctrl("fps", "FPS", ControlAddr::FrameRate, &rates, &fps));
    }

    let mut info = Control::new(
        "colorspace",
        "Colorspace",
        ControlKind::Info,
        ControlAddr::Colorspace,
    );
    info.value = Some(ControlValue::Info(colorspace_name(fmt.colorspace)));
    info.enabled = false;
    ctrls.push(info);

    ctrls
}

fn menu_ctrl(
    id: &str,
    name: &str,
    addr: ControlAddr,
    entries: &[String],
    current: &str,
) -> Control {
    let mut ctrl = Control::new(id, name, ControlKind::Menu, addr);
    ctrl.requires_reopen = true;
    ctrl.value = Some(ControlValue::Menu(current.to_string()));
    ctrl.menu = entries
        .iter()
        .map(|entry| MenuEntry::new(entry, entry, MenuPayload::Label))
        .collect();
    ctrl
}

fn colorspace_name(colorspace: u32) -> String {
    match colorspace {
        1 => "SMPTE 170M".to_string(),
        3 => "Rec. 709".to_string(),
        7 => "JPEG".to_string(),
        8 => "sRGB".to_string(),
        10 => "BT.2020".to_string(),
        0 => "Default".to_string(),
        other => format!("Colorspace {}", other),
    }
}

fn parse_resolution(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

impl ControlProvider for FmtCtrls {
    fn tag(&self) -> &'static str {
        "format"
    }

    fn controls(&self) -> &[Control] {
        &self.ctrls
    }

    fn apply_one(&mut self, id: &str, raw: &str, errs: &mut Vec<String>) -> Option<bool> {
        let ctrl = self.ctrls.iter().find(|c| c.id == id)?;
        let addr = ctrl.addr.clone();

        if addr == ControlAddr::Colorspace {
            errs.push(format!("{} is informational and can't be set", id));
            return Some(false);
        }
        if ctrl.menu_entry(raw).is_none() {
            let known: Vec<&str> = ctrl.menu.iter().map(|m| m.id.as_str()).collect();
            errs.push(format!(
                "can't find '{}' for {} (values: {})",
                raw,
                id,
                known.join(", ")
            ));
            return Some(false);
        }

        match addr {
            ControlAddr::PixelFormat => {
                let Ok(code) = <[u8; 4]>::try_from(raw.as_bytes()) else {
                    errs.push(format!("invalid pixel format '{}'", raw));
                    return Some(false);
                };
                let current = match self.io.current_format() {
                    Ok(fmt) => fmt,
                    Err(err) => {
                        errs.push(format!("can't read format ({})", err));
                        return Some(false);
                    }
                };
                match self
                    .io
                    .set_format(fourcc(&code), current.width, current.height)
                {
                    Ok(result) if fourcc_to_string(result.pixelformat) == raw => {
                        self.update_cached(id, ControlValue::Menu(raw.to_string()));
                        Some(true)
                    }
                    Ok(result) => {
                        errs.push(format!(
                            "can't set {} to {}, device used {}",
                            id,
                            raw,
                            fourcc_to_string(result.pixelformat)
                        ));
                        Some(false)
                    }
                    Err(err) => {
                        errs.push(format!("can't set {} to {} ({})", id, raw, err));
                        Some(false)
                    }
                }
            }
            ControlAddr::Resolution => {
                let Some((width, height)) = parse_resolution(raw) else {
                    errs.push(format!("invalid resolution '{}'", raw));
                    return Some(false);
                };
                let current = match self.io.current_format() {
                    Ok(fmt) => fmt,
                    Err(err) => {
                        errs.push(format!("can't read format ({})", err));
                        return Some(false);
                    }
                };
                match self.io.set_format(current.pixelformat, width, height) {
                    Ok(result) if (result.width, result.height) == (width, height) => {
                        self.update_cached(id, ControlValue::Menu(raw.to_string()));
                        Some(true)
                    }
                    Ok(result) => {
                        errs.push(format!(
                            "can't set {} to {}, device used {}x{}",
                            id, raw, result.width, result.height
                        ));
                        Some(false)
                    }
                    Err(err) => {
                        errs.push(format!("can't set {} to {} ({})", id, raw, err));
                        Some(false)
                    }
                }
            }
            ControlAddr::FrameRate => {
                let Ok(fps) = raw.parse::<u32>() else {
                    errs.push(format!("invalid frame rate '{}'", raw));
                    return Some(false);
                };
                match self.io.set_frame_rate(fps) {
                    Ok(result) if result == fps => {
                        self.update_cached(id, ControlValue::Menu(raw.to_string()));
                        Some(true)
                    }
                    Ok(result) => {
                        errs.push(format!(
                            "can't set {} to {}, device used {}",
                            id, raw, result
                        ));
                        Some(false)
                    }
                    Err(err) => {
                        errs.push(format!("can't set {} to {} ({})", id, raw, err));
                        Some(false)
                    }
                }
            }
            _ => Some(false),
        }
    }

    fn poll_reopen(&mut self) -> Option<String> {
        let fmt = self.io.current_format().ok()?;

        let pixelformat = fourcc_to_string(fmt.pixelformat);
        if let Some(cached) = self.cached_value("pixelformat")
            && cached != pixelformat
        {
            self.update_cached("pixelformat", ControlValue::Menu(pixelformat));
            return Some("pixelformat".to_string());
        }

        let resolution = format!("{}x{}", fmt.width, fmt.height);
        if let Some(cached) = self.cached_value("resolution")
            && cached != resolution
        {
            self.update_cached("resolution", ControlValue::Menu(resolution));
            return Some("resolution".to_string());
        }

        if let Ok(fps) = self.io.current_frame_rate() {
            let fps = fps.to_string();
            if let Some(cached) = self.cached_value("fps")
                && cached != fps
            {
                self.update_cached("fps", ControlValue::Menu(fps));
                return Some("fps".to_string());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testio::FakeIo;

    fn fake() -> Arc<FakeIo> {
        Arc::new(
            FakeIo::new()
                .with_formats(&[b"MJPG", b"YUYV"])
                .with_frame_sizes(&[(1920, 1080), (1280, 720)])
                .with_frame_rates(&[30, 60])
                .with_current_format(b"MJPG", 1920, 1080, 8)
                .with_frame_rate(30),
        )
    }

    #[test]
    fn discovers_reopen_menus_and_info() {
        let provider = FmtCtrls::new(fake());
        let ids: Vec<&str> = provider.controls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["pixelformat", "resolution", "fps", "colorspace"]);
        for ctrl in provider.controls() {
            if ctrl.kind == ControlKind::Menu {
                assert!(ctrl.requires_reopen);
            }
        }
        let info = provider.controls().last().unwrap();
        assert_eq!(info.kind, ControlKind::Info);
        assert_eq!(info.value, Some(ControlValue::Info("sRGB".to_string())));
    }

    #[test]
    fn set_updates_cache_and_requests_reopen() {
        let io = fake();
        let mut provider = FmtCtrls::new(io);
        let mut errs = Vec::new();
        let reopen = provider.apply_one("resolution", "1280x720", &mut errs);
        assert_eq!(reopen, Some(true));
        assert!(errs.is_empty());
        assert_eq!(
            provider.cached_value("resolution").as_deref(),
            Some("1280x720")
        );
    }

    #[test]
    fn poll_reports_first_changed_control_only() {
        let io = fake();
        let mut provider = FmtCtrls::new(io.clone());
        // another process changed both the format and the frame rate
        io.set_device_format(b"YUYV", 1280, 720, 8);
        io.set_device_frame_rate(60);

        assert_eq!(provider.poll_reopen().as_deref(), Some("pixelformat"));
        assert_eq!(provider.poll_reopen().as_deref(), Some("resolution"));
        assert_eq!(provider.poll_reopen().as_deref(), Some("fps"));
        assert_eq!(provider.poll_reopen(), None);
    }
}
