//! Per-session context.
//!
//! Everything an operation needs — the config store, the loaded settings
//! and templates, the spreadsheet client and the mail transport — travels
//! in one explicit `Session` value injected as Actix app data. No ambient
//! or global mutable state.

use crate::config::FileStore;
use crate::mailer::transport::MailTransport;
use crate::sheets::client::{HttpSheetsClient, SheetsApi};
use common::model::email::EmailTemplate;
use common::model::event::Event;
use common::model::settings::Settings;
use log::{info, warn};
use std::sync::Arc;

pub struct Session {
    pub store: FileStore,
    pub settings: Settings,
    pub templates: Vec<EmailTemplate>,
    pub api: Arc<dyn SheetsApi>,
    pub mailer: Arc<MailTransport>,
}

impl Session {
    /// Loads every configuration document and wires up the external
    /// clients. Configuration errors are fatal — no partial session.
    pub fn build(store: FileStore) -> Result<Session, String> {
        let settings = store.settings().map_err(|e| e.to_string())?;
        let templates = store.email_templates().map_err(|e| e.to_string())?;
        let credentials = store.credentials().map_err(|e| e.to_string())?;

        let api: Arc<dyn SheetsApi> = Arc::new(match credentials.base_url {
            Some(base_url) => HttpSheetsClient::with_base_url(credentials.api_token, base_url),
            None => HttpSheetsClient::new(credentials.api_token),
        });

        let mailer = MailTransport::new(&settings.mailer, &settings.test_mail_recipient)
            .map_err(|e| e.to_string())?;
        if mailer.connection_ok() {
            info!("mail connectivity self-test passed");
        } else {
            warn!("mail connectivity self-test failed; sending will be retried per message");
        }

        Ok(Session {
            store,
            settings,
            templates,
            api,
            mailer: Arc::new(mailer),
        })
    }

    pub fn event_by_name(&self, name: &str) -> Result<Option<Event>, String> {
        let events = self.store.events().map_err(|e| e.to_string())?;
        Ok(events.into_iter().find(|event| event.name == name))
    }
}
