use crate::config::Config;
use crate::error::BankResult;
use crate::question::ReplicatorRegistry;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub registry: ReplicatorRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> BankResult<Self> {
        Ok(Self {
            workspace: None,
            db: None,
            registry: ReplicatorRegistry::new()?,
            config,
        })
    }
}
