//! Dispatch orchestration.
//!
//! A (student, email type) pair is due when the student has at least one
//! course carrying that status and the type is not among the already-sent
//! flags. The sent marker is written back only after the transport accepted
//! the message; a failed message is retried a bounded number of times and
//! then recorded in the batch report — one exhausted message never stops
//! the batch.

use super::template;
use super::transport::MailTransport;
use super::MailError;
use crate::sheets::client::SheetsError;
use crate::sheets::Engine;
use chrono::Local;
use common::model::email::{EmailTemplate, EmailType};
use common::model::student::Student;
use log::{info, warn};
use serde::Serialize;

/// Attempts per message before giving up on it.
pub const SEND_MAX_ATTEMPTS: u32 = 5;

enum SendOutcome {
    Sent,
    RetryableFailure(MailError),
    PermanentFailure(MailError),
}

#[derive(Debug, Serialize)]
pub struct DispatchFailure {
    pub email: String,
    pub email_type: EmailType,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct DispatchReport {
    pub sent: u32,
    pub failures: Vec<DispatchFailure>,
}

/// Indices of the students due the given email type.
pub(crate) fn due_indices(students: &[Student], email_type: EmailType) -> Vec<usize> {
    students
        .iter()
        .enumerate()
        .filter(|(_, student)| {
            student.has_course_with_status(email_type)
                && !student.already_sent.contains(&email_type)
        })
        .map(|(index, _)| index)
        .collect()
}

pub struct Dispatcher<'a> {
    transport: &'a MailTransport,
    templates: &'a [EmailTemplate],
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a MailTransport, templates: &'a [EmailTemplate]) -> Self {
        Dispatcher {
            transport,
            templates,
        }
    }

    /// Sends one email type (or all of them) to every student due it.
    /// `progress` is called after each handled message with (done, total).
    pub fn send_batch(
        &self,
        engine: &mut Engine,
        students: &mut [Student],
        email_type: EmailType,
        is_test: bool,
        mut progress: impl FnMut(u32, u32),
    ) -> Result<DispatchReport, SheetsError> {
        let types: Vec<EmailType> = if email_type == EmailType::All {
            EmailType::CONCRETE.to_vec()
        } else {
            vec![email_type]
        };

        let total: u32 = types
            .iter()
            .map(|&t| due_indices(students, t).len() as u32)
            .sum();
        let mut done = 0;
        let mut report = DispatchReport::default();

        for t in types {
            for index in due_indices(students, t) {
                match self.send_one(&students[index], t, is_test) {
                    Ok(()) => {
                        engine.mark_email_sent(&students[index], t, Local::now().date_naive())?;
                        students[index].already_sent.push(t);
                        report.sent += 1;
                    }
                    Err(error) => {
                        warn!(
                            "sending {t:?} to {} failed for good: {error}",
                            students[index].email
                        );
                        report.failures.push(DispatchFailure {
                            email: students[index].email.clone(),
                            email_type: t,
                            error: error.to_string(),
                        });
                    }
                }
                done += 1;
                progress(done, total);
            }
        }

        info!(
            "dispatch finished: {} sent, {} failed",
            report.sent,
            report.failures.len()
        );
        Ok(report)
    }

    fn send_one(
        &self,
        student: &Student,
        email_type: EmailType,
        is_test: bool,
    ) -> Result<(), MailError> {
        let template = self
            .templates
            .iter()
            .find(|template| template.name == email_type.template_name())
            .ok_or_else(|| MailError::MissingTemplate(email_type.template_name().to_string()))?;
        let body = template::render(template, email_type, student)?;
        let to_name = format!("{} {}", student.first_name, student.last_name);

        match self.send_with_retry(&to_name, &student.email, &template.title, body, is_test) {
            SendOutcome::Sent => Ok(()),
            SendOutcome::RetryableFailure(error) | SendOutcome::PermanentFailure(error) => {
                Err(error)
            }
        }
    }

    fn send_with_retry(
        &self,
        to_name: &str,
        to_address: &str,
        subject: &str,
        body: String,
        is_test: bool,
    ) -> SendOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .transport
                .send(to_name, to_address, subject, body.clone(), is_test)
            {
                Ok(()) => return SendOutcome::Sent,
                Err(MailError::Smtp(error)) if error.is_permanent() => {
                    return SendOutcome::PermanentFailure(MailError::Smtp(error));
                }
                Err(MailError::Smtp(error)) if attempt < SEND_MAX_ATTEMPTS => {
                    warn!(
                        "send attempt {attempt}/{SEND_MAX_ATTEMPTS} to {to_address} failed: {error}"
                    );
                }
                Err(MailError::Smtp(error)) => {
                    return SendOutcome::RetryableFailure(MailError::Smtp(error));
                }
                // render/address/build problems never get better on retry
                Err(error) => return SendOutcome::PermanentFailure(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use common::model::course::Course;

    fn course(status: EmailType) -> Course {
        Course {
            id: 0,
            name: "Tango".into(),
            code: "T1".into(),
            start: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 12, 14).unwrap(),
            day_of_week: String::new(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            location: String::new(),
            additional_comment: String::new(),
            is_solo: false,
            is_shorter: false,
            role: None,
            status: Some(status),
            email_commentary: String::new(),
        }
    }

    fn student(email: &str, status: EmailType, already_sent: Vec<EmailType>) -> Student {
        Student {
            id: 0,
            email: email.into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            payment_amount: 0,
            installments: false,
            courses: vec![course(status)],
            already_sent,
        }
    }

    #[test]
    fn due_requires_a_matching_course_status() {
        let students = vec![
            student("a@b.com", EmailType::Confirmation, vec![]),
            student("b@c.com", EmailType::WaitingList, vec![]),
        ];
        assert_eq!(due_indices(&students, EmailType::Confirmation), vec![0]);
        assert_eq!(due_indices(&students, EmailType::WaitingList), vec![1]);
        assert_eq!(due_indices(&students, EmailType::FullClass), Vec::<usize>::new());
    }

    #[test]
    fn already_sent_types_are_excluded() {
        let students = vec![
            student(
                "a@b.com",
                EmailType::Confirmation,
                vec![EmailType::Confirmation],
            ),
            student("b@c.com", EmailType::Confirmation, vec![EmailType::WaitingList]),
        ];
        assert_eq!(due_indices(&students, EmailType::Confirmation), vec![1]);
    }
}
