//! Optional `pbala.toml` defaults layer (SPEC_FULL.md §10.3). Looked up in
//! the current directory first, then `$XDG_CONFIG_HOME/pbala/config.toml`;
//! an absent file is not an error, it just leaves every default `None`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Defaults {
    pub max_mem_size: Option<u64>,
    pub create_errfiles: Option<bool>,
    pub create_memfiles: Option<bool>,
    pub create_slavefile: Option<bool>,
}

impl Defaults {
    /// Search order: `./pbala.toml`, then
    /// `$XDG_CONFIG_HOME/pbala/config.toml`. Malformed TOML in a file that
    /// does exist is reported to stderr and treated as "no defaults"
    /// rather than aborting the run — this is a convenience layer, not a
    /// required input.
    pub fn load() -> Self {
        if let Some(path) = Self::cwd_candidate() {
            if let Some(d) = Self::read(&path) {
                return d;
            }
        }
        if let Some(path) = Self::xdg_candidate() {
            if let Some(d) = Self::read(&path) {
                return d;
            }
        }
        Defaults::default()
    }

    fn cwd_candidate() -> Option<PathBuf> {
        let path = PathBuf::from("pbala.toml");
        path.is_file().then_some(path)
    }

    fn xdg_candidate() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")?;
        let path = Path::new(&base).join("pbala").join("config.toml");
        path.is_file().then_some(path)
    }

    fn read(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(d) => Some(d),
            Err(e) => {
                eprintln!("warning: ignoring malformed {}: {e}", path.display());
                None
            }
        }
    }
}
