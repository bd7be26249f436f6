//! Templated email dispatch.
//!
//! `template` merges a student's enrollment data into the tagged template
//! fragments, `transport` wraps the SMTP submission, and `dispatch` decides
//! who is due which email, sends with bounded retries and writes the sent
//! markers back into the summary tab.

pub mod dispatch;
pub mod template;
pub mod transport;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("message could not be built: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("no template named {0:?}")]
    MissingTemplate(String),
    #[error("template pattern broke: {0}")]
    Pattern(#[from] regex::Error),
}
