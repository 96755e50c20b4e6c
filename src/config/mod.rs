use crate::{Error, Result};
use std::path::Path;

pub mod loader;

pub const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";
pub const DEFAULT_BUCKET: &str = "bike-test";
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_POLL_EVERY_TICKS: u32 = 50;
pub const DEFAULT_QUERY_ATTEMPTS: u32 = 3;
pub const DEFAULT_PANEL_WIDTH: u16 = 64;
pub const DEFAULT_PANEL_HEIGHT: u16 = 32;
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 500;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 10_000;
const CONFIG_DIR_NAME: &str = ".pedalpanel";
const CONFIG_FILE_NAME: &str = "config.toml";

const MIN_TICK_MS: u64 = 10;
const MAX_TICK_MS: u64 = 1_000;
const MAX_QUERY_ATTEMPTS: u32 = 10;

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub influx_url: String,
    pub bucket: String,
    pub tick_ms: u64,
    pub poll_every_ticks: u32,
    pub query_attempts: u32,
    pub panel_width: u16,
    pub panel_height: u16,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            influx_url: DEFAULT_INFLUX_URL.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            tick_ms: DEFAULT_TICK_MS,
            poll_every_ticks: DEFAULT_POLL_EVERY_TICKS,
            query_attempts: DEFAULT_QUERY_ATTEMPTS,
            panel_width: DEFAULT_PANEL_WIDTH,
            panel_height: DEFAULT_PANEL_HEIGHT,
            backoff_initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }
}

/// Range checks shared by the loader and CLI overrides.
pub fn validate(cfg: &Config) -> Result<()> {
    if cfg.bucket.trim().is_empty() {
        return Err(Error::InvalidArgs("bucket must not be empty".into()));
    }
    if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&cfg.tick_ms) {
        return Err(Error::InvalidArgs(format!(
            "tick_ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}"
        )));
    }
    if cfg.poll_every_ticks == 0 {
        return Err(Error::InvalidArgs(
            "poll_every_ticks must be at least 1".into(),
        ));
    }
    if cfg.query_attempts == 0 || cfg.query_attempts > MAX_QUERY_ATTEMPTS {
        return Err(Error::InvalidArgs(format!(
            "query_attempts must be between 1 and {MAX_QUERY_ATTEMPTS}"
        )));
    }
    if cfg.panel_width < DEFAULT_PANEL_WIDTH || cfg.panel_height < DEFAULT_PANEL_HEIGHT {
        return Err(Error::InvalidArgs(format!(
            "panel must be at least {DEFAULT_PANEL_WIDTH}x{DEFAULT_PANEL_HEIGHT} pixels"
        )));
    }
    if cfg.backoff_initial_ms == 0 || cfg.backoff_initial_ms > cfg.backoff_max_ms {
        return Err(Error::InvalidArgs(
            "backoff_initial_ms must be non-zero and not exceed backoff_max_ms".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn rejects_tick_outside_range() {
        let cfg = Config {
            tick_ms: 5,
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(format!("{err}").contains("tick_ms must"));
    }

    #[test]
    fn rejects_zero_poll_every() {
        let cfg = Config {
            poll_every_ticks: 0,
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(format!("{err}").contains("poll_every_ticks"));
    }

    #[test]
    fn rejects_panel_smaller_than_layout() {
        let cfg = Config {
            panel_width: 32,
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(format!("{err}").contains("panel must"));
    }

    #[test]
    fn rejects_inverted_backoff() {
        let cfg = Config {
            backoff_initial_ms: 20_000,
            ..Config::default()
        };
        assert!(validate(&cfg).is_err());
    }
}
