use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Cfg;
use crate::service::session::Caller;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session token from `session.login`; role-gated methods need it.
    #[serde(default)]
    pub token: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub cfg: Cfg,
}

impl AppState {
    pub fn new(cfg: Cfg) -> Self {
        Self {
            workspace: None,
            db: None,
            cfg,
        }
    }
}

/// What a handler family sees once a workspace is open and the guard passed.
pub struct Ctx<'a> {
    pub conn: &'a Connection,
    pub cfg: &'a Cfg,
    pub caller: Option<&'a Caller>,
}
