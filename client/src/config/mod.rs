//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the REST backend base URL, the message broker address and its connection
//! timing, and the path of the persisted token file.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub broker_url: String,
    pub broker_keep_alive_secs: u64,
    pub broker_reconnect_secs: u64,
    pub broker_connect_timeout_secs: u64,
    pub token_store_path: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        let broker_url =
            env::var("BROKER_URL").unwrap_or_else(|_| "ws://localhost:9001".to_string());

        let broker_keep_alive_secs = env::var("BROKER_KEEP_ALIVE_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("BROKER_KEEP_ALIVE_SECS must be a valid number")?;

        let broker_reconnect_secs = env::var("BROKER_RECONNECT_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u64>()
            .context("BROKER_RECONNECT_SECS must be a valid number")?;

        let broker_connect_timeout_secs = env::var("BROKER_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("BROKER_CONNECT_TIMEOUT_SECS must be a valid number")?;

        let token_store_path = env::var("TOKEN_STORE_PATH")
            .unwrap_or_else(|_| ".timekeeper/tokens.json".to_string());

        Ok(Config {
            api_base_url,
            broker_url,
            broker_keep_alive_secs,
            broker_reconnect_secs,
            broker_connect_timeout_secs,
            token_store_path,
        })
    }
}
