//! Server configuration
//!
//! Flags with environment fallbacks (`PORT` is honoured for drop-in
//! compatibility with process managers), validated into a [`ServerConfig`].

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::Parser;
use directories::ProjectDirs;
use wagate_core::CoordinatorConfig;

use crate::sidecar::SidecarConfig;

/// Configuration error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid host '{0}': expected an IP address")]
    InvalidHost(String),
    #[error("Invalid country code '{0}': digits only")]
    InvalidCountryCode(String),
    #[error("Invalid CORS origin '{0}'")]
    InvalidOrigin(String),
    #[error("Sidecar command must not be empty")]
    EmptySidecarCommand,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// wagate server - WhatsApp session gateway
#[derive(Debug, Clone, Parser)]
#[command(name = "wagate-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "WhatsApp session gateway: HTTP control API and realtime status for viewers")]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "WAGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Program that runs the session sidecar
    #[arg(long = "sidecar", env = "WAGATE_SIDECAR_CMD", default_value = "node")]
    pub sidecar_program: String,

    /// Arguments for the sidecar program (repeat, or space-separated in the env var)
    #[arg(
        long = "sidecar-arg",
        env = "WAGATE_SIDECAR_ARGS",
        value_delimiter = ' ',
        default_value = "sidecar/wa-sidecar.js"
    )]
    pub sidecar_args: Vec<String>,

    /// Where the sidecar keeps its login session
    #[arg(long, env = "WAGATE_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Timeout for sidecar requests (send, logout, destroy)
    #[arg(long, env = "WAGATE_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// Pause between tearing a client down and starting the next one
    #[arg(long, env = "WAGATE_REINIT_DELAY_MS", default_value_t = 2000)]
    pub reinit_delay_ms: u64,

    /// Viewer event buffer per subscriber
    #[arg(long, env = "WAGATE_BROADCAST_CAPACITY", default_value_t = 256)]
    pub broadcast_capacity: usize,

    /// Country code replacing a leading 0 in recipient numbers (empty to disable)
    #[arg(long, env = "WAGATE_COUNTRY_CODE", default_value = "62")]
    pub country_code: String,

    /// Allowed CORS origins (repeat or comma-separated); any origin when unset
    #[arg(long = "cors-origin", env = "WAGATE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Open the control panel in a browser once listening
    #[arg(long)]
    pub open: bool,

    /// Log as JSON lines
    #[arg(long, env = "WAGATE_LOG_JSON")]
    pub log_json: bool,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub sidecar: SidecarConfig,
    pub coordinator: CoordinatorConfig,
    /// Empty means any origin
    pub cors_origins: Vec<HeaderValue>,
    pub open_browser: bool,
}

impl ServerConfig {
    pub fn from_args(args: ServerArgs) -> Result<Self, ConfigError> {
        let ip: IpAddr = args
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(args.host.clone()))?;

        if args.sidecar_program.trim().is_empty() {
            return Err(ConfigError::EmptySidecarCommand);
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request timeout"));
        }
        if args.broadcast_capacity == 0 {
            return Err(ConfigError::Zero("broadcast capacity"));
        }

        let country_code = args.country_code.trim().to_string();
        if !country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidCountryCode(country_code));
        }

        let cors_origins = args
            .cors_origins
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(|o| o.parse::<HeaderValue>().map_err(|_| ConfigError::InvalidOrigin(o.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let session_dir = args.session_dir.unwrap_or_else(default_session_dir);

        Ok(Self {
            addr: SocketAddr::new(ip, args.port),
            sidecar: SidecarConfig {
                program: args.sidecar_program,
                args: args.sidecar_args.into_iter().filter(|a| !a.is_empty()).collect(),
                session_dir,
                request_timeout: Duration::from_secs(args.request_timeout_secs),
            },
            coordinator: CoordinatorConfig {
                reinit_delay: Duration::from_millis(args.reinit_delay_ms),
                broadcast_capacity: args.broadcast_capacity,
                default_country_code: (!country_code.is_empty()).then_some(country_code),
            },
            cors_origins,
            open_browser: args.open,
        })
    }
}

/// Platform data directory, falling back to `./wa-session`.
fn default_session_dir() -> PathBuf {
    ProjectDirs::from("", "", "wagate")
        .map(|dirs| dirs.data_dir().join("session"))
        .unwrap_or_else(|| PathBuf::from("wa-session"))
}
