//! sbard - Status bar overlay service daemon
//!
//! Owns the overlay bar, listens for platform signals delivered over the
//! control socket, and serves remote control requests from clients.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! sbard start
//!
//! # Start the daemon (background/daemonized)
//! sbard start -d
//!
//! # Stop the daemon
//! sbard stop
//!
//! # Check daemon status
//! sbard status
//! ```

use std::fs::{self, File};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sbard::config::DaemonConfig;
use sbard::notice::NoticeBoard;
use sbard::server::ControlServer;
use sbard::service::{spawn_service, ServiceContext};

/// sbard - persistent overlay status bar service
#[derive(Parser, Debug)]
#[command(name = "sbard", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("sbar")
}

/// PID file guarding against a second daemon instance.
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn new() -> Self {
        Self {
            path: state_dir().join("sbard.pid"),
        }
    }

    fn read(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        fs::write(&self.path, process::id().to_string()).context("Failed to write PID file")
    }

    fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }

    /// PID of a live daemon. A stale file is removed.
    fn running(&self) -> Option<u32> {
        let pid = self.read()?;
        if is_alive(pid) {
            Some(pid)
        } else {
            self.remove();
            None
        }
    }
}

fn is_alive(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn send_sigterm(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let pid = i32::try_from(pid).context("PID out of range")?;
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

/// Sends SIGTERM and waits up to five seconds for the process to exit.
fn stop(pid: u32) -> Result<bool> {
    send_sigterm(pid)?;
    for _ in 0..50 {
        if !is_alive(pid) {
            return Ok(true);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Ok(false)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let pid_file = PidFile::new();

    match args.command.unwrap_or(Command::Start { daemon: false }) {
        Command::Start { daemon } => {
            if let Some(pid) = pid_file.running() {
                eprintln!("sbard is already running (PID {pid})");
                eprintln!("Use 'sbard stop' to stop it first.");
                process::exit(1);
            }

            let config = DaemonConfig::load().context("Failed to load configuration")?;

            if daemon {
                daemonize()?;
            }

            pid_file.write()?;
            let result = run_daemon(config);
            pid_file.remove();
            result
        }
        Command::Stop => match pid_file.running() {
            Some(pid) => {
                println!("Stopping sbard (PID {pid})...");
                if stop(pid)? {
                    println!("sbard stopped.");
                    Ok(())
                } else {
                    eprintln!("sbard did not stop within 5 seconds.");
                    process::exit(1);
                }
            }
            None => {
                println!("sbard is not running.");
                Ok(())
            }
        },
        Command::Status => {
            let Some(pid) = pid_file.running() else {
                println!("sbard is not running.");
                process::exit(1);
            };
            println!("sbard is running (PID {pid})");

            if let Ok(config) = DaemonConfig::load() {
                if config.socket_path.exists() {
                    println!("Socket: {}", config.socket_path.display());
                }
            }
            Ok(())
        }
    }
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = state_dir().join("sbard.log");

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sbard=info".parse()?)
                .add_directive("sbar_core=info".parse()?)
                .add_directive("sbar_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "sbar daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let notices = Arc::new(NoticeBoard::new());
    let service = spawn_service(ServiceContext::from_config(&config, notices));
    info!("Service actor started");

    // The daemon's own start brings the overlay up.
    match service.create().await {
        Ok(state) => info!(state = %state, "Overlay created at boot"),
        Err(e) => warn!(error = %e, "Overlay unavailable at boot"),
    }

    let server = ControlServer::new(config.socket_path.clone(), service.clone(), cancel_token);

    info!(socket = %config.socket_path.display(), "Starting server");

    let served = server.run().await;

    if let Err(e) = service.destroy().await {
        warn!(error = %e, "Destroy on shutdown failed");
    }

    if let Err(e) = served {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("sbar daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
