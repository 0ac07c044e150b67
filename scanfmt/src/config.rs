use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG: &str = "scanfmt.yaml";

#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct SqliteConfig {
    pub dsn: Option<String>,
    pub scan_identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Filter expressions applied when none are given on the command line.
    #[serde(default)]
    pub filters: Vec<String>,
    pub skip_down_hosts: Option<bool>,
    pub sqlite: Option<SqliteConfig>,
}

/// Load `path`, or `./scanfmt.yaml` when no path is given.
///
/// A missing default file is not an error; an explicit path that cannot be read is.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(cfg))
}
