use std::{fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Server {
    ///
    /// gateway listen interfaces
    ///
    /// The addresses and ports the gateway accepts WebSocket upgrades
    /// on. Multiple addresses can be bound at the same time; ipv4 and
    /// ipv6 are both supported.
    ///
    #[serde(default = "Server::listen")]
    pub listen: Vec<SocketAddr>,
    ///
    /// Maximum payload size accepted in a single WebSocket message.
    ///
    /// A frame announcing more than this is refused with a close
    /// handshake before any of its payload is buffered.
    ///
    #[serde(default = "Server::max_payload_size")]
    pub max_payload_size: u64,
    ///
    /// Maximum number of threads the gateway can use.
    ///
    #[serde(default = "Server::max_threads")]
    pub max_threads: usize,
}

impl Server {
    fn listen() -> Vec<SocketAddr> {
        vec!["127.0.0.1:8080".parse().unwrap()]
    }

    fn max_payload_size() -> u64 {
        service::framing::DEFAULT_PAYLOAD_LIMIT
    }

    fn max_threads() -> usize {
        num_cpus::get()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
            max_payload_size: Self::max_payload_size(),
            max_threads: Self::max_threads(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Backend {
    ///
    /// database server address
    ///
    /// Every upgraded connection opens its own TCP connection to this
    /// address; bytes from completed client messages are written to it
    /// verbatim and bytes it produces are framed and relayed back to the
    /// client.
    ///
    pub address: SocketAddr,
    ///
    /// Relay database bytes to the client as BINARY frames instead of
    /// TEXT frames.
    ///
    #[serde(default)]
    pub binary: bool,
    ///
    /// Seconds to wait for the database server connection before the
    /// upgrade is refused.
    ///
    #[serde(default = "Backend::connect_timeout")]
    pub connect_timeout: u64,
}

impl Backend {
    fn connect_timeout() -> u64 {
        5
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    ///
    /// log level
    ///
    /// An enum representing the available verbosity levels of the logger.
    ///
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    pub backend: Backend,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Cli {
    ///
    /// Specify the configuration file path
    ///
    /// Example: wsgate-server --config /etc/wsgate/config.toml
    ///
    #[arg(long, short)]
    config: String,
}

impl Config {
    ///
    /// Load configure from config file and command line parameters.
    ///
    /// Load command line parameters, the configuration is read from the
    /// configuration file at the specified path; fields not present in
    /// the file take their defaults.
    ///
    pub fn load() -> Result<Self> {
        Ok(toml::from_str::<Self>(&read_to_string(
            &Cli::parse().config,
        )?)?)
    }
}
