//! sbar - Control client for the status bar service
//!
//! Binds to the running daemon and issues one remote call per invocation.
//!
//! # Usage
//!
//! ```text
//! sbar toggle                  # Show or hide the bar
//! sbar height                  # Bar height in pixels
//! sbar status                  # Full service status
//! sbar signal android.intent.action.SCREEN_OFF
//! sbar signal com.futonredemption.nokeyguard.lockstate --active
//! sbar watch                   # Print lifecycle and foreground events
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sbar_client::ServiceConnection;
use sbar_core::signal::EXTRA_IS_ACTIVE;
use sbar_core::Broadcast;
use sbar_protocol::{DaemonMessage, ServiceStatus};
use sbard::config::DaemonConfig;

// ============================================================================
// CLI Arguments
// ============================================================================

/// sbar - control the status bar service
#[derive(Parser, Debug)]
#[command(name = "sbar", version, about)]
struct Args {
    /// Control socket (defaults to the daemon's configured socket)
    #[arg(long, short = 's', global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the overlay
    Create,
    /// Tear the overlay down
    Destroy,
    /// Make the bar visible
    Show,
    /// Make the bar invisible
    Hide,
    /// Show if hidden, hide if visible
    Toggle,
    /// Drop the indicators
    Drop,
    /// Print whether the indicators are dropped
    IsDropped,
    /// Disallow the expand gesture
    DisableExpand,
    /// Allow the expand gesture
    EnableExpand,
    /// Print the configured icon color
    IconColor,
    /// Print the current background color
    BackgroundColor,
    /// Print the bar height in pixels
    Height,
    /// Make the background fully transparent
    Transparent,
    /// Restore the preferred background color
    RestoreBackground,
    /// Print the full service status
    Status,
    /// Deliver a platform broadcast to the service
    Signal {
        /// Broadcast action name
        action: String,
        /// Set the `isActive` extra (No Lock Screen state)
        #[arg(long)]
        active: bool,
    },
    /// Subscribe and print lifecycle and foreground-app events
    Watch,
    /// Check that the service answers
    Ping,
}

fn socket_path(args: &Args) -> Result<PathBuf> {
    match args.socket {
        Some(ref path) => Ok(path.clone()),
        None => Ok(DaemonConfig::load()
            .context("Failed to load configuration")?
            .socket_path),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sbar_client=warn".parse()?),
        )
        .init();

    let mut conn = ServiceConnection::new(socket_path(&args)?).with_client_id(format!(
        "sbar-cli-{}",
        std::process::id()
    ));
    conn.bind().await.context("Is the daemon running? Try 'sbard start'")?;

    let result = run(&mut conn, args.command).await;
    conn.unbind().await;
    result
}

async fn run(conn: &mut ServiceConnection, command: Command) -> Result<()> {
    match command {
        Command::Create => conn.create().await?,
        Command::Destroy => conn.destroy().await?,
        Command::Show => conn.show().await?,
        Command::Hide => conn.hide().await?,
        Command::Toggle => conn.toggle().await?,
        Command::Drop => conn.drop_indicators().await?,
        Command::IsDropped => println!("{}", conn.is_dropped().await?),
        Command::DisableExpand => conn.disable_expand().await?,
        Command::EnableExpand => conn.enable_expand().await?,
        Command::IconColor => println!("{}", conn.icon_color().await?),
        Command::BackgroundColor => println!("{}", conn.background_color().await?),
        Command::Height => println!("{}", conn.height().await?),
        Command::Transparent => conn.make_background_transparent().await?,
        Command::RestoreBackground => conn.restore_background_color().await?,
        Command::Status => print_status(&conn.status().await?),
        Command::Signal { action, active } => {
            let mut broadcast = Broadcast::new(action);
            if active {
                broadcast = broadcast.with_bool(EXTRA_IS_ACTIVE, true);
            }
            conn.deliver(broadcast).await?;
        }
        Command::Watch => watch(conn).await?,
        Command::Ping => {
            let seq = conn.ping().await?;
            println!("pong {seq}");
        }
    }
    Ok(())
}

fn print_status(status: &ServiceStatus) {
    println!("State:            {}", status.state);
    println!("Overlay attached: {}", status.overlay_attached);
    println!("Visible:          {}", status.visible);
    println!("Expand enabled:   {}", status.expand_enabled);
    println!("Dropped:          {}", status.dropped);
    println!("Screen on:        {}", status.screen_on);
    println!("Expand eligible:  {}", status.expand_eligible);
    println!("Monitor running:  {}", status.monitor_running);
    println!(
        "Listeners:        screen={} lock={}",
        status.screen_listener, status.lock_listener
    );
    if let Some(ref notice) = status.notice {
        println!("Notice:           {} - {}", notice.title, notice.text);
    }
}

async fn watch(conn: &mut ServiceConnection) -> Result<()> {
    conn.subscribe().await?;

    loop {
        tokio::select! {
            event = conn.next_event() => match event? {
                DaemonMessage::Lifecycle { signal } => println!("lifecycle {}", signal.action()),
                DaemonMessage::ForegroundChanged { app } => println!("foreground {app}"),
                _ => {}
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
