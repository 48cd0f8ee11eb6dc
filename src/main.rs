// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "camctl")]
#[command(about = "Camera controls for V4L2 capture devices")]
#[command(version)]
struct Cli {
    /// Device to use (default: configured device, then /dev/video0)
    #[arg(short, long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List video capture devices
    ListDevices,

    /// List the controls of a device with values and ranges
    List,

    /// Set controls, e.g. -c brightness=128,kiyo_pro_hdr=on,contrast=70%
    Set {
        /// Comma-separated control=value pairs
        controls: String,
    },

    /// Apply a named preset, or list the available ones
    Preset {
        /// Preset name; omit to list what this device offers
        name: Option<String>,
    },

    /// Pan/tilt/zoom operations
    Ptz {
        #[command(subcommand)]
        action: PtzAction,
    },

    /// Watch the device and print control changes as they happen
    Watch,
}

#[derive(Subcommand)]
enum PtzAction {
    /// Step pan by the given number of steps (negative is left)
    PanStep {
        #[arg(allow_negative_numbers = true)]
        delta: i32,
    },
    /// Step tilt by the given number of steps (negative is down)
    TiltStep {
        #[arg(allow_negative_numbers = true)]
        delta: i32,
    },
    /// Step zoom; --big moves a tenth of the range per step
    ZoomStep {
        #[arg(allow_negative_numbers = true)]
        delta: i32,
        #[arg(long)]
        big: bool,
    },
    /// Set continuous pan speed (0 stops)
    PanSpeed {
        #[arg(allow_negative_numbers = true)]
        rate: i32,
    },
    /// Set continuous tilt speed (0 stops)
    TiltSpeed {
        #[arg(allow_negative_numbers = true)]
        rate: i32,
    },
    /// Move pan to a fraction of its range (0.0 to 1.0)
    PanPercent { value: f64 },
    /// Move tilt to a fraction of its range (0.0 to 1.0)
    TiltPercent { value: f64 },
    /// Move zoom to a fraction of its range (0.0 to 1.0)
    ZoomPercent { value: f64 },
    /// Return every axis to its home position
    Reset,
    /// Store the current position in a slot (1-8, this session only)
    Store { slot: u8 },
    /// Recall a stored position (1-8)
    Recall { slot: u8 },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=camctl=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();
    let device = cli::resolve_device(args.device);

    match args.command {
        Commands::ListDevices => cli::list_devices(),
        Commands::List => cli::list_controls(&device),
        Commands::Set { controls } => cli::set_controls(&device, &controls),
        Commands::Preset { name } => cli::preset(&device, name.as_deref()),
        Commands::Ptz { action } => {
            let op = match action {
                PtzAction::PanStep { delta } => cli::PtzOp::PanStep(delta),
                PtzAction::TiltStep { delta } => cli::PtzOp::TiltStep(delta),
                PtzAction::ZoomStep { delta, big: false } => cli::PtzOp::ZoomStep(delta),
                PtzAction::ZoomStep { delta, big: true } => cli::PtzOp::ZoomStepBig(delta),
                PtzAction::PanSpeed { rate } => cli::PtzOp::PanSpeed(rate),
                PtzAction::TiltSpeed { rate } => cli::PtzOp::TiltSpeed(rate),
                PtzAction::PanPercent { value } => cli::PtzOp::PanPercent(value),
                PtzAction::TiltPercent { value } => cli::PtzOp::TiltPercent(value),
                PtzAction::ZoomPercent { value } => cli::PtzOp::ZoomPercent(value),
                PtzAction::Reset => cli::PtzOp::Reset,
                PtzAction::Store { slot } => cli::PtzOp::Store(slot),
                PtzAction::Recall { slot } => cli::PtzOp::Recall(slot),
            };
            cli::ptz(&device, op)
        }
        Commands::Watch => cli::watch(&device),
    }
}
