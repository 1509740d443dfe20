use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tryon", about = "Virtual eyewear try-on CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Compute the live placement transform for the current frame
    Preview,
    /// Capture one still and composite every overlay asset against it
    Capture {
        /// Directory to write the composited PNGs into
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List session captures
    List,
    /// Fetch one capture at full resolution (the enlarge view)
    Show {
        /// Capture ID from `tryon list`
        id: String,
        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Drop all session captures
    Clear,
    /// Run camera diagnostics (bypasses the daemon)
    Test,
}

// `#[zbus::proxy]` generates the async `TryonProxy` used below.
#[zbus::proxy(
    interface = "dev.tryon.TryOn1",
    default_service = "dev.tryon.TryOn1",
    default_path = "/dev/tryon/TryOn1"
)]
trait Tryon {
    async fn status(&self) -> zbus::Result<String>;
    async fn preview(&self) -> zbus::Result<String>;
    async fn capture(&self) -> zbus::Result<String>;
    async fn list_captures(&self) -> zbus::Result<String>;
    async fn get_capture(&self, id: &str) -> zbus::Result<Vec<u8>>;
    async fn clear_captures(&self) -> zbus::Result<u32>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Diagnostics don't need the daemon at all.
    if let Commands::Test = cli.command {
        return run_camera_test();
    }

    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    let proxy = TryonProxy::new(&conn)
        .await
        .context("is tryond running?")?;

    match cli.command {
        Commands::Status => {
            println!("{}", pretty(&proxy.status().await?)?);
        }
        Commands::Preview => {
            println!("{}", pretty(&proxy.preview().await?)?);
        }
        Commands::Capture { out } => {
            let summary: serde_json::Value = serde_json::from_str(&proxy.capture().await?)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if let Some(dir) = out {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let slots = summary["slots"].as_array().cloned().unwrap_or_default();
                for slot in slots {
                    let Some(id) = slot["id"].as_str() else {
                        continue; // failed slot, already reported in the summary
                    };
                    let asset = slot["asset"].as_str().unwrap_or("capture");
                    let png = proxy.get_capture(id).await?;
                    let path = dir.join(format!("{asset}-{id}.png"));
                    std::fs::write(&path, png)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("wrote {}", path.display());
                }
            }
        }
        Commands::List => {
            println!("{}", pretty(&proxy.list_captures().await?)?);
        }
        Commands::Show { id, out } => {
            let png = proxy.get_capture(&id).await?;
            std::fs::write(&out, png)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {}", out.display());
        }
        Commands::Clear => {
            let removed = proxy.clear_captures().await?;
            println!("removed {removed} capture(s)");
        }
        Commands::Test => unreachable!("handled before connecting"),
    }

    Ok(())
}

fn pretty(json: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Enumerate capture devices and try one frame from the configured one.
fn run_camera_test() -> Result<()> {
    let devices = tryon_hw::Camera::list_devices();
    if devices.is_empty() {
        bail!("no V4L2 capture devices found");
    }
    for d in &devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }

    let device = std::env::var("TRYON_CAMERA_DEVICE").unwrap_or_else(|_| devices[0].path.clone());
    let camera = tryon_hw::Camera::open(&device)
        .with_context(|| format!("failed to open {device}"))?;
    let frame = camera.capture_frame().context("failed to capture a frame")?;
    println!(
        "captured {}x{} frame from {} ({} bytes, seq {})",
        frame.width,
        frame.height,
        device,
        frame.data.len(),
        frame.sequence
    );
    Ok(())
}
