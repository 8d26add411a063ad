//! CLI argument definitions for the Tandem application.
//!
//! Uses `clap` with derive macros. Priority resolution:
//! CLI args > env vars > config file > defaults. Beyond these startup
//! flags there is no scripted CLI; the UI drives the session.

use clap::Parser;
use std::path::PathBuf;

/// Tandem — a meeting assistant that listens, remembers, and answers as a
/// virtual team member.
#[derive(Parser, Debug)]
#[command(name = "tandem", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// UI surface port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Directory holding the reference-store snapshot.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path, and whether it was explicitly
    /// requested (an explicit path that fails to load is fatal; a missing
    /// default path falls back to built-in defaults).
    ///
    /// Priority: --config flag > TANDEM_CONFIG env var > ~/.tandem/config.toml.
    pub fn resolve_config_path(&self) -> (PathBuf, bool) {
        if let Some(ref p) = self.config {
            return (p.clone(), true);
        }
        if let Ok(p) = std::env::var("TANDEM_CONFIG") {
            return (PathBuf::from(p), true);
        }
        (default_config_path(), false)
    }

    /// Resolve the UI surface port.
    ///
    /// Priority: --port flag > TANDEM_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("TANDEM_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tandem").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tandem").join("config.toml");
    }
    PathBuf::from("config.toml")
}
