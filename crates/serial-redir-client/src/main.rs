//! Serial redirection client entry point.
//!
//! # Usage
//!
//! ```text
//! serial-redir [--config PATH] serve
//! serial-redir [--config PATH] add-device --name NAME --path PATH [--baud-rate N]
//! serial-redir [--config PATH] probe [--device NAME | --path PATH | --loopback] [--message TEXT]
//! ```
//!
//! - `serve` registers every `[[devices]]` entry from the config file, keeps
//!   the worker threads running, and tears everything down on Ctrl+C.
//! - `add-device` writes a `[[devices]]` entry into the config file,
//!   replacing any entry with the same name.
//! - `probe` pushes one Create, Write, Read, and Close through a device and
//!   prints each completion status.  With `--loopback` no hardware is needed.
//!
//! # Logging
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the config's
//! `general.log_level`.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use serial_redir_client::application::comm::CommDriver;
use serial_redir_client::application::irp::IrpCompletion;
use serial_redir_client::application::manager::DeviceManager;
use serial_redir_client::infrastructure::comm::serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use serial_redir_client::infrastructure::comm::{LoopbackDriver, SerialPortDriver};
use serial_redir_client::infrastructure::storage::config::{
    default_config_path, load_config, save_config, AppConfig, DeviceConfig,
};
use serial_redir_core::protocol::pdu::IoRequestHeader;
use serial_redir_core::protocol::wire::{CreateRequest, ReadRequest, WriteRequest};
use serial_redir_core::{MajorFunction, NtStatus};

const DEFAULT_READ_TIMEOUT_MS: u64 = DEFAULT_READ_TIMEOUT.as_millis() as u64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Redirects local serial ports to a remote-desktop server.
#[derive(Debug, Parser)]
#[command(name = "serial-redir", about = "Serial-port redirection client", version)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config directory.
    #[arg(long, global = true, env = "SERIAL_REDIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register every configured device and run until Ctrl+C.
    Serve,

    /// Add or replace a device entry in the config file.
    AddDevice {
        /// DOS name announced to the server, e.g. `COM1`.
        #[arg(long)]
        name: String,

        /// Local device path, e.g. `/dev/ttyUSB0`.
        #[arg(long)]
        path: String,

        #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
        baud_rate: u32,

        /// How long a Read waits for data, in milliseconds.
        #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_MS)]
        read_timeout_ms: u64,
    },

    /// Run Create, Write, Read, Close against one device and print the results.
    Probe {
        /// Name of a configured device to probe.
        #[arg(long, conflicts_with_all = ["path", "loopback"])]
        device: Option<String>,

        /// Device path to probe with default settings.
        #[arg(long, conflicts_with = "loopback")]
        path: Option<String>,

        /// Probe an in-memory loopback device instead of hardware.
        #[arg(long)]
        loopback: bool,

        /// Bytes written during the probe.
        #[arg(long, default_value = "PING")]
        message: String,

        /// How long to wait for each completion, in milliseconds.
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path().context("no --config given")?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    info!(config = %config_path.display(), "serial-redir starting");

    match cli.command {
        Command::Serve => serve(config).await,
        Command::AddDevice {
            name,
            path,
            baud_rate,
            read_timeout_ms,
        } => add_device(
            config,
            &config_path,
            DeviceConfig {
                name,
                path,
                baud_rate,
                read_timeout_ms,
            },
        ),
        Command::Probe {
            device,
            path,
            loopback,
            message,
            timeout_ms,
        } => {
            let target = ProbeTarget::resolve(&config, device, path, loopback)?;
            let timeout = Duration::from_millis(timeout_ms);
            tokio::task::spawn_blocking(move || probe(&config, target, message.as_bytes(), timeout))
                .await
                .context("probe task panicked")?
        }
    }
}

// ── serve ─────────────────────────────────────────────────────────────────────

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if config.devices.is_empty() {
        warn!("no devices configured; nothing to redirect");
    }

    let mut manager = DeviceManager::new();
    for entry in &config.devices {
        let id = manager
            .register_serial(
                &entry.name,
                &entry.path,
                Box::new(entry.driver()),
                config.general.shutdown_policy,
            )
            .with_context(|| format!("failed to register {}", entry.name))?;
        if let Some(device) = manager.get(id) {
            info!(
                device_id = id,
                name = device.name(),
                device_type = device.device_type(),
                announce_len = device.announce_data().len(),
                "announced"
            );
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Ctrl+C received, shutting down");

    // Joining worker threads blocks.
    tokio::task::spawn_blocking(move || manager.teardown_all())
        .await
        .context("teardown task panicked")?;
    Ok(())
}

// ── add-device ────────────────────────────────────────────────────────────────

fn add_device(
    mut config: AppConfig,
    config_path: &Path,
    device: DeviceConfig,
) -> anyhow::Result<()> {
    if device.name.is_empty() || device.name.starts_with('*') || device.path.is_empty() {
        bail!("a device needs a concrete name and a non-empty path");
    }
    let name = device.name.clone();
    let replaced = config.upsert_device(device);
    save_config(&config, config_path)
        .with_context(|| format!("failed to save config to {}", config_path.display()))?;
    info!(name = %name, replaced, config = %config_path.display(), "device entry saved");
    Ok(())
}

// ── probe ─────────────────────────────────────────────────────────────────────

enum ProbeTarget {
    Loopback,
    Hardware {
        name: String,
        path: String,
        driver: SerialPortDriver,
    },
}

impl ProbeTarget {
    fn resolve(
        config: &AppConfig,
        device: Option<String>,
        path: Option<String>,
        loopback: bool,
    ) -> anyhow::Result<Self> {
        if loopback {
            return Ok(Self::Loopback);
        }
        if let Some(path) = path {
            return Ok(Self::Hardware {
                name: "COM1".to_string(),
                path,
                driver: SerialPortDriver::default(),
            });
        }
        let entry = match device {
            Some(name) => config
                .devices
                .iter()
                .find(|d| d.name == name)
                .with_context(|| format!("device {name:?} is not in the config"))?,
            None => config
                .devices
                .first()
                .context("no devices configured; pass --path or --loopback")?,
        };
        Ok(Self::Hardware {
            name: entry.name.clone(),
            path: entry.path.clone(),
            driver: entry.driver(),
        })
    }
}

fn probe(
    config: &AppConfig,
    target: ProbeTarget,
    message: &[u8],
    timeout: Duration,
) -> anyhow::Result<()> {
    let (name, path, driver) = match target {
        ProbeTarget::Loopback => {
            let driver: Box<dyn CommDriver> = Box::new(LoopbackDriver::new());
            ("COM1".to_string(), "loopback".to_string(), driver)
        }
        ProbeTarget::Hardware { name, path, driver } => {
            let driver: Box<dyn CommDriver> = Box::new(driver);
            (name, path, driver)
        }
    };

    let mut manager = DeviceManager::new();
    let device_id = manager.register_serial(&name, &path, driver, config.general.shutdown_policy)?;
    let length = u32::try_from(message.len()).context("message too long")?;

    let steps: [(MajorFunction, Vec<u8>); 4] = [
        (MajorFunction::Create, CreateRequest::default().encode()),
        (
            MajorFunction::Write,
            WriteRequest { length, offset: 0, data: message }.encode(),
        ),
        (MajorFunction::Read, ReadRequest { length, offset: 0 }.encode()),
        (MajorFunction::Close, vec![0u8; 32]),
    ];

    let (tx, rx) = mpsc::channel::<IrpCompletion>();
    let mut file_id = 0;
    for (completion_id, (major, input)) in (1u32..).zip(steps) {
        let header = IoRequestHeader {
            device_id,
            file_id,
            completion_id,
            major_function: major as u32,
            minor_function: 0,
        };
        let tx = tx.clone();
        manager.submit_pdu(&header.encode_with_input(&input), move |c| {
            let _ = tx.send(c);
        })?;

        let completion = rx
            .recv_timeout(timeout)
            .with_context(|| format!("{major:?} did not complete within {timeout:?}"))?;
        println!(
            "{:<8} {}  output={}",
            format!("{major:?}"),
            completion.status,
            hex(&completion.output)
        );
        if major == MajorFunction::Create {
            if completion.status != NtStatus::Success {
                bail!("Create failed on {path}");
            }
            file_id = completion
                .output
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_le_bytes)
                .unwrap_or_default();
        }
    }

    manager.teardown_all();
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
