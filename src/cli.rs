// SPDX-License-Identifier: GPL-3.0-only

//! CLI command implementations

use camctl::controls::ControlKind;
use camctl::{
    CameraCtrls, Config, ControlEvent, ControlIo, ControlListener, Device, PresetResolver,
    PtzController, PtzResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Device from the command line, the config file, or the usual default.
pub fn resolve_device(arg: Option<String>) -> String {
    arg.or_else(|| Config::load().device)
        .unwrap_or_else(|| "/dev/video0".to_string())
}

/// List all video capture devices
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = camctl::list_devices();
    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

fn open_registry(device: &str) -> Result<(Arc<Device>, CameraCtrls), Box<dyn std::error::Error>> {
    let device = Arc::new(Device::open(device)?);
    let ctrls = CameraCtrls::new(device.clone() as Arc<dyn ControlIo>);
    Ok((device, ctrls))
}

/// Print every control with its value, range and menu entries
pub fn list_controls(device: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_device, ctrls) = open_registry(device)?;

    for page in ctrls.pages() {
        for category in &page.categories {
            println!("{} / {}", page.title, category.title);
            for ctrl in &category.ctrls {
                print!(" {}", ctrl.id);
                match ctrl.kind {
                    ControlKind::Menu => {
                        let value = ctrl
                            .value
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        print!(" = {}\t( ", value);
                        if let Some(default) = &ctrl.default {
                            print!("default: {} ", default);
                        }
                        let entries: Vec<&str> =
                            ctrl.menu.iter().map(|m| m.id.as_str()).collect();
                        print!("values: {} )", entries.join(", "));
                    }
                    ControlKind::Button => {
                        let entries: Vec<&str> =
                            ctrl.menu.iter().map(|m| m.id.as_str()).collect();
                        print!("\t\t( buttons: {} )", entries.join(", "));
                    }
                    ControlKind::Integer | ControlKind::Boolean => {
                        let value = ctrl
                            .value
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        print!(" = {}\t(", value);
                        if let Some(default) = &ctrl.default {
                            print!(" default: {}", default);
                        }
                        if let (Some(min), Some(max)) = (ctrl.min, ctrl.max) {
                            print!(" min: {} max: {}", min, max);
                        }
                        if let Some(step) = ctrl.step
                            && step != 1
                        {
                            print!(" step: {}", step);
                        }
                        print!(" )");
                    }
                    ControlKind::Info => {
                        let value = ctrl
                            .value
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        print!(" = {}", value);
                    }
                }
                if ctrl.requires_reopen {
                    print!(" | reopens");
                }
                if !ctrl.enabled {
                    print!(" | inactive");
                }
                println!();
            }
        }
    }
    Ok(())
}

/// Apply a comma-separated `control=value` batch
pub fn set_controls(device: &str, controls: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut params: Vec<(String, String)> = Vec::new();
    for assignment in controls.split(',') {
        match assignment.split_once('=') {
            Some((id, value)) if !id.is_empty() => {
                params.push((id.trim().to_string(), value.trim().to_string()));
            }
            _ => eprintln!("invalid assignment: {}", assignment),
        }
    }

    let (_device, mut ctrls) = open_registry(device)?;
    let mut errs = Vec::new();
    ctrls.setup_ctrls(&params, &mut errs);
    for err in &errs {
        eprintln!("{}", err);
    }
    if ctrls.pending_reopen() {
        println!("note: some changes take effect after the device is reopened");
    }
    Ok(())
}

/// Apply a preset, or list the presets this device supports
pub fn preset(device: &str, name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let (_device, mut ctrls) = open_registry(device)?;
    let resolver = PresetResolver::new();

    let Some(name) = name else {
        for preset in resolver.available(&ctrls) {
            if preset == camctl::DEFAULT_PRESET && resolver.is_default_active(&ctrls) {
                println!("{} (active)", preset);
            } else {
                println!("{}", preset);
            }
        }
        return Ok(());
    };

    let mut errs = Vec::new();
    resolver.apply(&mut ctrls, name, &mut errs);
    for err in &errs {
        eprintln!("{}", err);
    }
    Ok(())
}

pub enum PtzOp {
    PanStep(i32),
    TiltStep(i32),
    ZoomStep(i32),
    ZoomStepBig(i32),
    PanSpeed(i32),
    TiltSpeed(i32),
    PanPercent(f64),
    TiltPercent(f64),
    ZoomPercent(f64),
    Reset,
    Store(u8),
    Recall(u8),
}

/// Run one PTZ operation
pub fn ptz(device: &str, op: PtzOp) -> Result<(), Box<dyn std::error::Error>> {
    let (_device, ctrls) = open_registry(device)?;
    if !ctrls.has_ptz() {
        return Err(format!("{} cannot do PTZ", device).into());
    }

    let mut ptz = PtzController::new(Arc::new(Mutex::new(ctrls)));
    let result: PtzResult = match op {
        PtzOp::PanStep(delta) => ptz.pan_step(delta),
        PtzOp::TiltStep(delta) => ptz.tilt_step(delta),
        PtzOp::ZoomStep(delta) => ptz.zoom_step(delta),
        PtzOp::ZoomStepBig(delta) => ptz.zoom_step_big(delta),
        PtzOp::PanSpeed(rate) => ptz.pan_speed(rate),
        PtzOp::TiltSpeed(rate) => ptz.tilt_speed(rate),
        PtzOp::PanPercent(value) => ptz.pan_percent(value),
        PtzOp::TiltPercent(value) => ptz.tilt_percent(value),
        PtzOp::ZoomPercent(value) => ptz.zoom_percent(value),
        PtzOp::Reset => ptz.reset(),
        PtzOp::Store(slot) => ptz.store_preset(slot),
        PtzOp::Recall(slot) => ptz.recall_preset(slot),
    };

    for warning in &result.warnings {
        eprintln!("{}", warning);
    }
    if !result.changed && result.warnings.is_empty() {
        println!("nothing to do on this device");
    }
    Ok(())
}

/// Print control changes as the device reports them, until Ctrl+C
pub fn watch(device: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let (device, ctrls) = open_registry(device)?;
    let ctrls = Arc::new(Mutex::new(ctrls));

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = running.clone();
    ctrlc::set_handler(move || {
        running_ctrlc.store(false, Ordering::SeqCst);
    })?;

    let mut listener = ControlListener::start(
        device,
        ctrls,
        config.poll_timeout(),
        |event| match event {
            ControlEvent::Changed(ctrl) => {
                let value = ctrl
                    .value
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                let state = if ctrl.enabled { "" } else { " (inactive)" };
                println!("{} = {}{}", ctrl.id, value, state);
            }
            ControlEvent::ReopenRequired(id) => {
                println!("{} changed, reopen required", id);
            }
        },
        |err| {
            eprintln!("{}", err);
        },
    );

    while running.load(Ordering::SeqCst) && listener.is_running() {
        std::thread::sleep(Duration::from_millis(100));
    }
    listener.stop();
    Ok(())
}
