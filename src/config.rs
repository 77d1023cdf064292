use std::env;
use std::path::PathBuf;

use tracing::{info, warn};

pub const WORKSPACE_VAR: &str = "RESULTSD_WORKSPACE";
pub const LOG_VAR: &str = "RESULTSD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "resultsd=info";

pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            workspace: optional_path(WORKSPACE_VAR),
        }
    }
}

fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) => {
            warn!("{key} is blank, ignoring");
            None
        }
        Err(env::VarError::NotPresent) => None,
        Err(e) => {
            warn!("Environment variable {key} unreadable: {e}");
            None
        }
    }
}

fn optional_path(key: &str) -> Option<PathBuf> {
    let v = var(key)?;
    info!("{key} set, using {v}");
    Some(PathBuf::from(v))
}
