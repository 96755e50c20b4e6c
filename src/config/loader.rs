use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, Result};

use super::{Config, CONFIG_DIR_NAME, CONFIG_FILE_NAME};

pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    parse(&raw)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = format!(
        "# pedalpanel config\n\
influx_url = \"{}\"\n\
bucket = \"{}\"\n\
tick_ms = {}\n\
poll_every_ticks = {}\n\
query_attempts = {}\n\
panel_width = {}\n\
panel_height = {}\n\
backoff_initial_ms = {}\n\
backoff_max_ms = {}\n",
        config.influx_url,
        config.bucket,
        config.tick_ms,
        config.poll_every_ticks,
        config.query_attempts,
        config.panel_width,
        config.panel_height,
        config.backoff_initial_ms,
        config.backoff_max_ms
    );
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            Error::InvalidArgs(format!("invalid config line {}: '{}'", idx + 1, line))
        })?;

        let key = key.trim();
        let value = value.trim().trim_matches('"');
        let line_no = idx + 1;
        match key {
            "influx_url" => cfg.influx_url = value.to_string(),
            "bucket" => cfg.bucket = value.to_string(),
            "tick_ms" => cfg.tick_ms = parse_number(key, value, line_no)?,
            "poll_every_ticks" => cfg.poll_every_ticks = parse_number(key, value, line_no)?,
            "query_attempts" => cfg.query_attempts = parse_number(key, value, line_no)?,
            "panel_width" => cfg.panel_width = parse_number(key, value, line_no)?,
            "panel_height" => cfg.panel_height = parse_number(key, value, line_no)?,
            "backoff_initial_ms" => {
                cfg.backoff_initial_ms = parse_number(key, value, line_no)?;
            }
            "backoff_max_ms" => cfg.backoff_max_ms = parse_number(key, value, line_no)?,
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown config key '{}' on line {}",
                    other, line_no
                )));
            }
        }
    }

    super::validate(&cfg)?;
    Ok(cfg)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str, line_no: usize) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidArgs(format!("invalid {key} value on line {line_no}")))
}

fn config_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| Error::InvalidArgs("HOME not set; cannot locate config directory".into()))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
