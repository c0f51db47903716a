//! wagate CLI
//!
//! Admin relay for a running gateway: status, QR, send, logout, restart and a
//! readiness probe for scripts.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use colored::Colorize;
use wagate_core::ConnectionState;
use wagate_server::relay::{GatewayStatus, RelayClient};

/// wagate - WhatsApp gateway admin CLI
#[derive(Parser)]
#[command(name = "wagate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Admin CLI for the wagate WhatsApp gateway")]
struct Cli {
    /// Gateway base URL
    #[arg(long, env = "WAGATE_URL", default_value = "http://localhost:3000", global = true)]
    url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway and session status
    Status,

    /// Fetch the current pairing QR
    Qr {
        /// Write the QR image to this file instead of printing the data URL
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Send a text message
    Send {
        /// Recipient number (leading 0 gets the default country code)
        #[arg(long)]
        to: String,
        /// Message text
        #[arg(long)]
        text: String,
    },

    /// Log the session out; a new QR follows
    Logout,

    /// Restart the session client
    Restart,

    /// Wait until the gateway answers, optionally until the session is connected
    WaitReady {
        /// Give up after this many seconds
        #[arg(long = "wait", default_value_t = 30)]
        wait_secs: u64,
        /// Also wait for a connected session
        #[arg(long)]
        connected: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = RelayClient::new(&cli.url, Duration::from_secs(cli.timeout.max(1)))?;

    match cli.command {
        Commands::Status => run_status(&client).await,
        Commands::Qr { out } => run_qr(&client, out).await,
        Commands::Send { to, text } => run_send(&client, &to, &text).await,
        Commands::Logout => run_logout(&client).await,
        Commands::Restart => run_restart(&client).await,
        Commands::WaitReady {
            wait_secs,
            connected,
        } => run_wait_ready(&client, Duration::from_secs(wait_secs), connected).await,
    }
}

fn colored_state(state: ConnectionState) -> String {
    let name = state.as_str();
    match state {
        ConnectionState::Connected => name.green().bold().to_string(),
        ConnectionState::QrReady | ConnectionState::Authenticated | ConnectionState::Loading => {
            name.yellow().bold().to_string()
        }
        ConnectionState::Disconnected | ConnectionState::AuthFailed | ConnectionState::Error => {
            name.red().bold().to_string()
        }
        _ => name.cyan().to_string(),
    }
}

fn print_status(status: &GatewayStatus) {
    println!("{}", "=== wagate Gateway Status ===".cyan().bold());
    println!();
    println!("{}: {}", "Server".white().bold(), status.server);
    println!("{}: {}", "WhatsApp".white().bold(), colored_state(status.whatsapp));
    println!("{}: {}", "Ready".white().bold(), status.ready);
    println!("{}: {}", "QR Available".white().bold(), status.qr_available);
    println!("{}: {}", "Client Initialized".white().bold(), status.client_initialized);
    println!(
        "{}: {}",
        "Timestamp".white().bold(),
        status.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

async fn run_status(client: &RelayClient) -> anyhow::Result<()> {
    let status = client.status().await?;
    print_status(&status);
    Ok(())
}

async fn run_qr(client: &RelayClient, out: Option<PathBuf>) -> anyhow::Result<()> {
    let data_url = client.qr().await?;

    let Some(path) = out else {
        println!("{}", data_url);
        return Ok(());
    };

    let Some((_, encoded)) = data_url.split_once(";base64,") else {
        bail!("unexpected QR payload format");
    };
    let bytes = STANDARD.decode(encoded).context("QR payload is not valid base64")?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} {}", "QR written to".green(), path.display());
    Ok(())
}

async fn run_send(client: &RelayClient, to: &str, text: &str) -> anyhow::Result<()> {
    let recipient = client.send(to, text).await?;
    println!("{} {}", "Message sent to".green().bold(), recipient);
    Ok(())
}

async fn run_logout(client: &RelayClient) -> anyhow::Result<()> {
    let reply = client.logout().await?;
    println!(
        "{}",
        reply.message.unwrap_or_else(|| "Logged out".to_string()).green()
    );
    Ok(())
}

async fn run_restart(client: &RelayClient) -> anyhow::Result<()> {
    let reply = client.restart().await?;
    println!(
        "{}",
        reply.message.unwrap_or_else(|| "Restarting".to_string()).green()
    );
    Ok(())
}

async fn run_wait_ready(client: &RelayClient, wait: Duration, connected: bool) -> anyhow::Result<()> {
    let target = if connected { " (connected session)" } else { "" };
    println!("{} {}{}", "Waiting for".dimmed(), client.base_url(), target.dimmed());
    let status = client.wait_ready(wait, connected).await?;
    print_status(&status);
    Ok(())
}
