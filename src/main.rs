//! depthcast: window capture to depth estimation, JSON-lines bridge on stdio.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use depthcast::capture::{CaptureMethod, SyntheticWindows};
use depthcast::inference::{DepthEngine, EngineLoader, LuminanceDepth};
use depthcast::pipeline::{ControlChannel, Outbound};
use depthcast::{Config, System};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "depthcast", about = "Capture a window and stream depth estimates")]
struct Args {
    /// TOML configuration file; missing is fine.
    #[arg(long, default_value = "depthcast.toml")]
    config: PathBuf,

    /// Title of the window to capture.
    #[arg(long)]
    window: Option<String>,

    #[arg(long)]
    fps: Option<u32>,

    /// compat, performant or modern.
    #[arg(long, value_parser = parse_method)]
    method: Option<CaptureMethod>,

    /// Size of the built-in demo window.
    #[arg(long, default_value_t = 640)]
    demo_width: u32,

    #[arg(long, default_value_t = 360)]
    demo_height: u32,
}

fn parse_method(value: &str) -> std::result::Result<CaptureMethod, String> {
    match value.to_ascii_lowercase().as_str() {
        "compat" | "0" => Ok(CaptureMethod::Compat),
        "performant" | "1" => Ok(CaptureMethod::Performant),
        "modern" | "2" => Ok(CaptureMethod::Modern),
        other => Err(format!("unknown capture method {other:?}")),
    }
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("depthcast=info"));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::uptime());

    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);
    #[cfg(feature = "profiling")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());
    registry.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let args = Args::parse();
    info!("depthcast launching...");

    let mut config = Config::load(Some(args.config.as_path()))?;
    if let Some(window) = args.window {
        config.capture.window_name = window;
    }
    if let Some(fps) = args.fps {
        config.capture.fps = fps;
    }
    if let Some(method) = args.method {
        config.capture.method = method;
    }
    debug!(?config, "Configuration loaded");

    // Demo environment: one animated window under the configured title.
    let windows = Arc::new(SyntheticWindows::new());
    let target = windows.open(&config.capture.window_name, args.demo_width, args.demo_height);
    info!(window = %config.capture.window_name, %target, "Demo window opened");

    let presenter = windows.clone();
    let present_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(16));
        loop {
            tick.tick().await;
            presenter.present_all();
        }
    });

    let settings = config.inference.clone();
    let loader: EngineLoader = Box::new(move || {
        let engine = LuminanceDepth::load(&settings)?;
        Ok(Box::new(engine) as Box<dyn DepthEngine>)
    });

    let mut system = System::new(config, windows)?;

    let (out_tx, out_rx) = flume::bounded::<Outbound>(64);
    let control = ControlChannel::new(system.coordinator().clone());
    let reply_tx = out_tx.clone();
    reply_tx
        .send_async(Outbound::Text(control.init_message().to_json()?))
        .await
        .map_err(|_| eyre!("output channel closed"))?;

    system.start(loader, vec![Box::new(out_tx)])?;

    let writer_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Ok(message) = out_rx.recv_async().await {
            match message {
                Outbound::Text(text) => {
                    if stdout.write_all(text.as_bytes()).await.is_err()
                        || stdout.write_all(b"\n").await.is_err()
                    {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Outbound::Binary(packet) => debug!(bytes = packet.len(), "Depth packet ready"),
            }
        }
    });

    let (line_tx, line_rx) = flume::unbounded::<String>();
    let stdin_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send_async(line).await.is_err() {
                break;
            }
        }
    });

    let control_task = tokio::spawn(async move {
        while let Ok(line) = line_rx.recv_async().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match control.handle_text(line) {
                Ok(Some(reply)) => match reply.to_json() {
                    Ok(text) => {
                        if reply_tx.send_async(Outbound::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to encode reply: {}", e),
                },
                Ok(None) => {}
                Err(e) => warn!("Ignoring control message: {}", e),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    stdin_task.abort();
    control_task.abort();
    present_task.abort();
    tokio::task::spawn_blocking(move || system.stop()).await?;
    writer_task.abort();

    info!("depthcast shut down");
    Ok(())
}
