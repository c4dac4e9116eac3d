use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tally_extract::ExtractConfig;
use tracing::debug;

use crate::state::{ensure_tally_home, tally_home};

pub fn config_path() -> Result<PathBuf> {
    Ok(tally_home()?.join("config.toml"))
}

/// The config file if present, defaults otherwise.
pub fn load_config() -> Result<ExtractConfig> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(ExtractConfig::default());
    }
    debug!(path = %p.display(), "loading config");
    read_config(&p)
}

pub fn read_config(path: &Path) -> Result<ExtractConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(cfg: &ExtractConfig) -> Result<PathBuf> {
    let p = ensure_tally_home()?.join("config.toml");
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let written = save_config(&ExtractConfig::default())?;
    println!("Wrote {}", written.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    let mut shown = cfg.clone();
    if shown.key.api_key.is_some() {
        shown.key.api_key = Some("********".to_string());
    }
    if shown.key.service_token.is_some() {
        shown.key.service_token = Some("********".to_string());
    }
    println!("# {}", config_path()?.display());
    print!("{}", toml::to_string_pretty(&shown).context("serialize config")?);
    Ok(())
}
