//! SMTP submission.

use super::MailError;
use common::model::settings::MailerSettings;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};

/// Wraps the configured SMTP relay. Test mode reroutes every message to
/// the fixed test recipient and prefixes the subject, nothing else.
pub struct MailTransport {
    transport: SmtpTransport,
    from: String,
    test_recipient: String,
}

impl MailTransport {
    pub fn new(settings: &MailerSettings, test_recipient: &str) -> Result<Self, MailError> {
        let transport = SmtpTransport::relay(&settings.server_name)?
            .credentials(Credentials::new(
                settings.mail.clone(),
                settings.password.clone(),
            ))
            .port(settings.server_port)
            .build();
        Ok(MailTransport {
            transport,
            from: settings.mail.clone(),
            test_recipient: test_recipient.to_string(),
        })
    }

    /// Eager connectivity self-test, run once at session start.
    pub fn connection_ok(&self) -> bool {
        self.transport.test_connection().unwrap_or(false)
    }

    pub fn send(
        &self,
        to_name: &str,
        to_address: &str,
        subject: &str,
        html_body: String,
        is_test: bool,
    ) -> Result<(), MailError> {
        let from: Mailbox = self.from.parse()?;
        let mut builder = Message::builder().from(from.clone());

        if is_test {
            builder = builder
                .to(Mailbox::new(None, self.test_recipient.parse::<Address>()?))
                .subject(format!("[TEST] {subject}"));
        } else {
            builder = builder
                .to(Mailbox::new(
                    Some(to_name.to_string()),
                    to_address.parse::<Address>()?,
                ))
                .cc(from)
                .subject(subject.to_string());
        }

        let message = builder.header(ContentType::TEXT_HTML).body(html_body)?;
        self.transport.send(&message)?;
        Ok(())
    }
}
