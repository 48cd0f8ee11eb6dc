// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the control engine
//!
//! Only whole-operation failures surface here (a device that cannot be
//! opened, a listener whose transport died). Per-control failures inside a
//! mutation batch are collected as human-readable warnings instead, so one
//! bad assignment never aborts its siblings.

use std::fmt;

/// Result type alias using CtrlError
pub type CtrlResult<T> = Result<T, CtrlError>;

#[derive(Debug)]
pub enum CtrlError {
    /// Opening the device node failed
    DeviceOpen { path: String, source: std::io::Error },
    /// The device is not a video capture device
    NotCaptureDevice(String),
    /// Transport became unusable (device removed, handle closed)
    TransportLost(String),
    /// Configuration load/store errors
    Config(String),
}

impl fmt::Display for CtrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtrlError::DeviceOpen { path, source } => {
                write!(f, "Failed to open {}: {}", path, source)
            }
            CtrlError::NotCaptureDevice(path) => {
                write!(f, "{} is not a video capture device", path)
            }
            CtrlError::TransportLost(msg) => write!(f, "Device transport lost: {}", msg),
            CtrlError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CtrlError {}

impl From<std::io::Error> for CtrlError {
    fn from(err: std::io::Error) -> Self {
        CtrlError::TransportLost(err.to_string())
    }
}
