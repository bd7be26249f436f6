//! JSON configuration store.
//!
//! All configuration lives as JSON documents under one root directory
//! (`CONFIG_DIR`, default `./config`): `Settings.json`, `Events.json`,
//! `Emails.json` and `Credentials.json`. Documents are read wholesale at
//! session start; the events list is re-read and re-written wholesale on
//! every mutation — there are no partial updates.

use common::model::email::EmailTemplate;
use common::model::event::Event;
use common::model::settings::Settings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{env, fs};

pub const SETTINGS_FILE: &str = "Settings.json";
pub const EVENTS_FILE: &str = "Events.json";
pub const EMAILS_FILE: &str = "Emails.json";
pub const CREDENTIALS_FILE: &str = "Credentials.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path:?} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Remote API access material. Obtaining and refreshing the token is out of
/// scope; the operator provisions it. `base_url` overrides the endpoint for
/// proxies and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub api_token: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        FileStore { base: base.into() }
    }

    pub fn from_env() -> Self {
        let base = env::var("CONFIG_DIR").unwrap_or_else(|_| "./config".to_string());
        FileStore::new(base)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        let path = self.base.join(name);
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), ConfigError> {
        let path = self.base.join(name);
        let json = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| ConfigError::Write { path, source })
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.load(SETTINGS_FILE)
    }

    pub fn events(&self) -> Result<Vec<Event>, ConfigError> {
        self.load(EVENTS_FILE)
    }

    pub fn save_events(&self, events: &[Event]) -> Result<(), ConfigError> {
        self.save(EVENTS_FILE, &events)
    }

    pub fn email_templates(&self) -> Result<Vec<EmailTemplate>, ConfigError> {
        self.load(EMAILS_FILE)
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.load(CREDENTIALS_FILE)
    }
}
