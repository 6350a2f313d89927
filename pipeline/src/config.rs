//! Runtime configuration loaded from environment variables
//!
//! Every knob has a sensible default; `VIRTA_*` environment variables
//! override them. Parse failures are configuration errors, not panics.

use crate::error::{PipelineError, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development
    Pretty,
    /// Line-delimited JSON, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(PipelineError::Config(format!(
                "invalid log format '{other}', expected 'pretty' or 'json'"
            ))),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP intake listen address (`VIRTA_HTTP_ADDR`)
    pub http_addr: SocketAddr,
    /// Metrics server listen address (`VIRTA_METRICS_ADDR`)
    pub metrics_addr: SocketAddr,
    /// Queue between intake and the validator (`VIRTA_ORDERS_QUEUE`)
    pub orders_queue: String,
    /// Queue between the validator and the finalizer (`VIRTA_PROCESSED_QUEUE`)
    pub processed_queue: String,
    /// Worker slots per stage runner (`VIRTA_MAX_CONCURRENT`)
    pub max_concurrent_calls: usize,
    /// Deliveries before the transport dead-letters (`VIRTA_MAX_DELIVERY_COUNT`)
    pub max_delivery_count: u32,
    /// Default tracing filter (`VIRTA_LOG_LEVEL`)
    pub log_level: String,
    /// Log output format (`VIRTA_LOG_FORMAT`)
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            orders_queue: "orders".to_string(),
            processed_queue: "orders-processed".to_string(),
            max_concurrent_calls: 8,
            max_delivery_count: 5,
            log_level: "virta=info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// `PipelineError::Config` when a set variable fails to parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(v) = env::var("VIRTA_HTTP_ADDR") {
            config.http_addr = v
                .parse()
                .map_err(|e| PipelineError::Config(format!("VIRTA_HTTP_ADDR '{v}': {e}")))?;
        }
        if let Ok(v) = env::var("VIRTA_METRICS_ADDR") {
            config.metrics_addr = v
                .parse()
                .map_err(|e| PipelineError::Config(format!("VIRTA_METRICS_ADDR '{v}': {e}")))?;
        }
        if let Ok(v) = env::var("VIRTA_ORDERS_QUEUE") {
            config.orders_queue = v;
        }
        if let Ok(v) = env::var("VIRTA_PROCESSED_QUEUE") {
            config.processed_queue = v;
        }
        if let Ok(v) = env::var("VIRTA_MAX_CONCURRENT") {
            config.max_concurrent_calls = v
                .parse()
                .map_err(|e| PipelineError::Config(format!("VIRTA_MAX_CONCURRENT '{v}': {e}")))?;
        }
        if let Ok(v) = env::var("VIRTA_MAX_DELIVERY_COUNT") {
            config.max_delivery_count = v.parse().map_err(|e| {
                PipelineError::Config(format!("VIRTA_MAX_DELIVERY_COUNT '{v}': {e}"))
            })?;
        }
        if let Ok(v) = env::var("VIRTA_LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = env::var("VIRTA_LOG_FORMAT") {
            config.log_format = v.parse()?;
        }

        Ok(config)
    }
}
