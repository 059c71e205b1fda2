use std::{env, net::SocketAddr};

use thiserror::Error;

pub const DEFAULT_MAX_PARALLEL: usize = 32;
pub const DEFAULT_STREAM_QUEUE: usize = 64;
pub const DEFAULT_SNAPSHOT_URI: &str = "resource://scenes";
pub const DEFAULT_SNAPSHOT_EVENT: &str = "scenes";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub max_parallel_requests: usize,
    pub stream_queue_capacity: usize,
    pub snapshot_uri: String,
    pub snapshot_event: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_MAX_PARALLEL must be a positive integer")]
    InvalidMaxParallel,
    #[error("MCP_STREAM_QUEUE must be a positive integer")]
    InvalidStreamQueue,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let max_parallel_requests = parse_positive(
            env::var("MCP_MAX_PARALLEL").ok(),
            DEFAULT_MAX_PARALLEL,
            ConfigError::InvalidMaxParallel,
        )?;
        let stream_queue_capacity = parse_positive(
            env::var("MCP_STREAM_QUEUE").ok(),
            DEFAULT_STREAM_QUEUE,
            ConfigError::InvalidStreamQueue,
        )?;
        let snapshot_uri = env::var("MCP_SNAPSHOT_URI")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_URI.to_string());
        let snapshot_event = env::var("MCP_SNAPSHOT_EVENT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_EVENT.to_string());

        let config = Self {
            bind_addr,
            bind_port,
            max_parallel_requests,
            stream_queue_capacity,
            snapshot_uri,
            snapshot_event,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8080,
            max_parallel_requests: DEFAULT_MAX_PARALLEL,
            stream_queue_capacity: DEFAULT_STREAM_QUEUE,
            snapshot_uri: DEFAULT_SNAPSHOT_URI.to_string(),
            snapshot_event: DEFAULT_SNAPSHOT_EVENT.to_string(),
        }
    }
}

fn parse_positive(
    value: Option<String>,
    default: usize,
    error: ConfigError,
) -> Result<usize, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(error),
    }
}
