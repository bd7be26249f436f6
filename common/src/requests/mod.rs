use crate::model::email::EmailType;
use serde::{Deserialize, Serialize};

/// Request payload for operations that target one event by name
/// (tab generation, tab clearing, registration sync).
#[derive(Debug, Serialize, Deserialize)]
pub struct EventRequest {
    pub event_name: String,
}

/// Request payload for the email dispatch endpoint. `email_type` may be
/// `All` to fan out over every concrete type; `is_test` reroutes every
/// message to the configured test recipient.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmailsRequest {
    pub event_name: String,
    pub email_type: EmailType,
    #[serde(default)]
    pub is_test: bool,
}
