use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::tracker::ClockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerBackend {
    #[default]
    Sqlite,
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(LedgerBackend::Sqlite),
            "memory" => Ok(LedgerBackend::Memory),
            other => Err(format!("unknown ledger backend: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadLimiterConfig {
    pub server_host: String,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub ledger_backend: LedgerBackend,
    pub hour_clock: ClockKind,
    pub warm_cache: bool,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for UploadLimiterConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            data_dir: PathBuf::from("data/limiter"),
            ledger_backend: LedgerBackend::Sqlite,
            hour_clock: ClockKind::Local,
            warm_cache: false,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl UploadLimiterConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("LIMITER_HOST") {
            cfg.server_host = host;
        }
        if let Ok(port) = env::var("LIMITER_PORT") {
            cfg.server_port = port.parse().context("LIMITER_PORT must be a valid u16")?;
        }
        if let Ok(dir) = env::var("LIMITER_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(backend) = env::var("LEDGER_BACKEND") {
            cfg.ledger_backend = backend
                .parse()
                .map_err(anyhow::Error::msg)
                .context("LEDGER_BACKEND must be `sqlite` or `memory`")?;
        }
        if let Ok(clock) = env::var("HOUR_CLOCK") {
            cfg.hour_clock = clock
                .parse()
                .map_err(anyhow::Error::msg)
                .context("HOUR_CLOCK must be `local` or `utc`")?;
        }
        if let Ok(flag) = env::var("WARM_CACHE") {
            cfg.warm_cache =
                parse_bool(&flag).with_context(|| format!("WARM_CACHE is invalid: {flag}"))?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout_secs = timeout
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_host.trim().is_empty() {
            anyhow::bail!("LIMITER_HOST must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        if self.ledger_backend == LedgerBackend::Sqlite {
            ensure_directory(&self.data_dir)?;
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create data directory {}", path.display()))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => anyhow::bail!("invalid boolean value {value}"),
    }
}
