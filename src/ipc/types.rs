use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::model::ResultRecord;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The results form currently open in the admin UI.
#[derive(Debug, Clone)]
pub struct Draft {
    /// None until the draft is first saved.
    pub result_id: Option<String>,
    pub record: ResultRecord,
    pub dirty: bool,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub draft: Option<Draft>,
}
