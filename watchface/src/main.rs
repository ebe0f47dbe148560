use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use tokio::signal::unix::{signal, Signal, SignalKind};
use watchface::{
    apps::{battery::CAPACITY_PATH, Layout},
    face::Face,
    fb::{Device, DEFAULT_DEVICE},
    scheduler::{Handle, Scheduler, DEFAULT_PERIOD},
    text::{Font, DEFAULT_FONT},
};

/// Paints a clock and the battery level onto a framebuffer.
///
/// Send SIGHUP to switch between layouts.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Framebuffer device
    #[arg(long, env = "WATCHFACE_DEVICE", default_value = DEFAULT_DEVICE)]
    device: PathBuf,

    /// TrueType font
    #[arg(long, env = "WATCHFACE_FONT", default_value = DEFAULT_FONT)]
    font: PathBuf,

    /// Battery capacity file
    #[arg(long, env = "WATCHFACE_BATTERY", default_value = CAPACITY_PATH)]
    battery: PathBuf,

    #[arg(long, env = "WATCHFACE_LAYOUT", value_enum, default_value_t)]
    layout: Layout,

    /// Tick period, in milliseconds
    #[arg(
        long,
        default_value_t = DEFAULT_PERIOD.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    period_ms: u64,

    /// Skip the blank/unblank sequence when opening the device
    #[arg(long)]
    no_blank: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    debug!("{args:?}");

    let font = Font::load(&args.font)?;
    let device = Device::open_with(&args.device, !args.no_blank)?;
    let screen = device.into_surface().context("framebuffer geometry")?;

    let face = Face::new(screen, Arc::new(font));
    face.clear();

    let (mut scheduler, handle) = Scheduler::new(face, Duration::from_millis(args.period_ms));
    scheduler.launch(args.layout.apps(&args.battery)).await?;

    let hup = signal(SignalKind::hangup()).context("listening for SIGHUP")?;
    let term = signal(SignalKind::terminate()).context("listening for SIGTERM")?;
    tokio::spawn(watch_signals(Signals { hup, term }, handle, args.layout, args.battery));

    info!("Init complete. Ticking...");
    let face = scheduler.run().await?;
    face.into_screen().into_inner().close();
    Ok(())
}

struct Signals {
    hup: Signal,
    term: Signal,
}

async fn watch_signals(signals: Signals, handle: Handle, mut layout: Layout, battery: PathBuf) {
    let Signals { mut hup, mut term } = signals;
    loop {
        tokio::select! {
            _ = hup.recv() => {
                layout = layout.toggle();
                info!("[signals] switching to {layout}");
                if let Err(e) = handle.launch(layout.apps(&battery)).await {
                    error!("[signals] {e}");
                }
            }
            _ = term.recv() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    info!("[signals] shutting down");
    handle.shutdown().await;
}
