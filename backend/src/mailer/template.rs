//! Merge-field rendering of email templates.
//!
//! Pure string transformation: fragments are concatenated per email type,
//! placeholder tokens are substituted with literal values, and the two
//! conditional block tags plus the commentary tag are resolved last. No
//! HTML escaping happens anywhere — template text and substituted values
//! are organizer-controlled.

use super::MailError;
use common::model::course::Course;
use common::model::email::{EmailTemplate, EmailType};
use common::model::student::Student;
use regex::Regex;

/// Renders the full message body for one student and email type.
pub fn render(
    template: &EmailTemplate,
    email_type: EmailType,
    student: &Student,
) -> Result<String, MailError> {
    let course_list = student.merged_course_names(email_type);
    let header = substitute_common(&template.header_merged(), student, &course_list);

    let mut output = match email_type {
        EmailType::Confirmation => {
            header
                + &payment_fragment(template, student, &course_list)
                + &course_blocks(template, student, email_type)
                + &template.footer_merged()
        }
        EmailType::WaitingList | EmailType::NotEnoughPeople | EmailType::FullClass => {
            header + &course_blocks(template, student, email_type) + &template.footer_merged()
        }
        EmailType::MissingPartner => header + &template.footer_merged(),
        // dispatch fans All out into concrete types before rendering
        EmailType::All => return Ok(String::new()),
    };

    if email_type == EmailType::Confirmation {
        output = apply_installment_tag(student, &output)?;
        output = apply_couple_tag(student, &output)?;
    }
    output = apply_commentary_tag(student, email_type, &output);
    Ok(output)
}

fn substitute_common(fragment: &str, student: &Student, course_list: &str) -> String {
    fragment
        .replace("<STUDENT_FIRST_NAME>", &student.first_name)
        .replace("<COURSE_LIST>", course_list)
}

fn payment_fragment(template: &EmailTemplate, student: &Student, course_list: &str) -> String {
    let installment_amount = student.payment_amount / 2;
    let displayed_amount = if student.installments {
        installment_amount
    } else {
        student.payment_amount
    };
    template
        .payment_info_merged()
        .replace("<STUDENT_FIRST_NAME>", &student.first_name)
        .replace("<STUDENT_LAST_NAME>", &student.last_name)
        .replace("<COURSE_LIST>", course_list)
        .replace("<PAYMENT_AMOUNT>", &displayed_amount.to_string())
        .replace("<INSTALLMENT_AMOUNT>", &installment_amount.to_string())
}

/// The course-info fragment repeated once per course carrying the status.
fn course_blocks(template: &EmailTemplate, student: &Student, status: EmailType) -> String {
    let fragment = template.course_info_merged();
    student
        .courses
        .iter()
        .filter(|course| course.status == Some(status))
        .map(|course| course_block(&fragment, course))
        .collect()
}

fn course_block(fragment: &str, course: &Course) -> String {
    let role = course
        .role
        .map(|role| role.to_string())
        .unwrap_or_default();
    let comment = if course.additional_comment.is_empty() {
        String::new()
    } else {
        format!("{}<br>", course.additional_comment)
    };
    fragment
        .replace("<COURSE_NAME>", &course.name)
        .replace("<COURSE_START>", &course.start.format("%d/%m").to_string())
        .replace("<COURSE_END>", &course.end.format("%d/%m").to_string())
        .replace("<ROLE>", &role)
        .replace("<COURSE_LOCATION>", &course.location)
        .replace("<COURSE_DAY_OF_WEEK>", &course.day_of_week)
        .replace("<COURSE_TIME>", &course.formatted_time())
        .replace("<ADDITIONAL_COMMENT>", &comment)
}

/// `<INSTALLMENT>...</INSTALLMENT>`: tags stripped but content kept when
/// the student pays in installments, block removed entirely otherwise.
fn apply_installment_tag(student: &Student, output: &str) -> Result<String, MailError> {
    if student.installments {
        Ok(output
            .replace("<INSTALLMENT>", "")
            .replace("</INSTALLMENT>", ""))
    } else {
        let block = Regex::new(r"(?s)<INSTALLMENT>.*?</INSTALLMENT>")?;
        Ok(block.replace_all(output, "").into_owned())
    }
}

/// `<COUPLE>...</COUPLE>`: kept when any enrolled course is partnered.
fn apply_couple_tag(student: &Student, output: &str) -> Result<String, MailError> {
    if student.courses.iter().any(|course| !course.is_solo) {
        Ok(output.replace("<COUPLE>", "").replace("</COUPLE>", ""))
    } else {
        let block = Regex::new(r"(?s)<COUPLE>.*?</COUPLE>")?;
        Ok(block.replace_all(output, "").into_owned())
    }
}

/// `<COMMENTARY/>`: replaced with the bolded per-course commentary when
/// any matched course carries one, removed otherwise.
fn apply_commentary_tag(student: &Student, status: EmailType, output: &str) -> String {
    let merged = student.merged_commentary(status);
    output.replace("<COMMENTARY/>", &merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn course(name: &str, status: EmailType) -> Course {
        Course {
            id: 0,
            name: name.into(),
            code: name[..1].to_string(),
            start: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 12, 14).unwrap(),
            day_of_week: "Monday".into(),
            time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            location: "Studio A".into(),
            additional_comment: String::new(),
            is_solo: false,
            is_shorter: false,
            role: None,
            status: Some(status),
            email_commentary: String::new(),
        }
    }

    fn student() -> Student {
        Student {
            id: 0,
            email: "a@b.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            payment_amount: 340,
            installments: false,
            courses: vec![course("Tango", EmailType::Confirmation)],
            already_sent: Vec::new(),
        }
    }

    fn confirmation_template() -> EmailTemplate {
        EmailTemplate {
            name: "Confirmation".into(),
            title: "See you in class".into(),
            header: vec!["Hi <STUDENT_FIRST_NAME>, you are in: <COURSE_LIST>. ".into()],
            payment_info: vec![
                "Pay <PAYMENT_AMOUNT>.<INSTALLMENT> First installment: <INSTALLMENT_AMOUNT>.</INSTALLMENT> ".into(),
            ],
            course_info: vec![
                "<COURSE_NAME> starts <COURSE_START> (<COURSE_DAY_OF_WEEK> <COURSE_TIME>, <COURSE_LOCATION>). ".into(),
            ],
            footer: vec!["<COMMENTARY/>Bye!".into()],
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let body = render(&confirmation_template(), EmailType::Confirmation, &student()).unwrap();
        assert!(body.contains("Hi Jane, you are in: Tango."));
        assert!(body.contains("Pay 340."));
        assert!(body.contains("Tango starts 07/09 (Monday 19:30, Studio A)."));
        assert!(body.ends_with("Bye!"));
    }

    #[test]
    fn installment_block_is_removed_for_full_payers() {
        let body = render(&confirmation_template(), EmailType::Confirmation, &student()).unwrap();
        assert!(!body.contains("First installment"));
        assert!(!body.contains("<INSTALLMENT>"));
    }

    #[test]
    fn installment_block_is_kept_for_installment_payers() {
        let mut payer = student();
        payer.installments = true;
        let body = render(&confirmation_template(), EmailType::Confirmation, &payer).unwrap();
        // the shown amount halves and the inner text survives without tags
        assert!(body.contains("Pay 170."));
        assert!(body.contains("First installment: 170."));
        assert!(!body.contains("<INSTALLMENT>"));
        assert!(!body.contains("</INSTALLMENT>"));
    }

    #[test]
    fn couple_block_is_dropped_for_solo_only_students() {
        let mut template = confirmation_template();
        template.footer = vec!["<COUPLE>Bring your partner. </COUPLE>Bye!".into()];
        let mut solo = student();
        solo.courses[0].is_solo = true;
        let body = render(&template, EmailType::Confirmation, &solo).unwrap();
        assert!(!body.contains("Bring your partner"));

        let partnered = student();
        let body = render(&template, EmailType::Confirmation, &partnered).unwrap();
        assert!(body.contains("Bring your partner. Bye!"));
    }

    #[test]
    fn commentary_tag_resolves_to_bolded_notes_or_nothing() {
        let body = render(&confirmation_template(), EmailType::Confirmation, &student()).unwrap();
        assert!(!body.contains("<COMMENTARY/>"));
        assert!(!body.contains("<b>"));

        let mut noted = student();
        noted.courses[0].email_commentary = "doors open 15 min early".into();
        let body = render(&confirmation_template(), EmailType::Confirmation, &noted).unwrap();
        assert!(body.contains("<b><br><br>doors open 15 min early</b>Bye!"));
    }

    #[test]
    fn waiting_list_render_skips_payment_info() {
        let template = EmailTemplate {
            name: "WaitingList".into(),
            title: "Waitlisted".into(),
            header: vec!["Hi <STUDENT_FIRST_NAME>. ".into()],
            payment_info: vec!["NEVER ".into()],
            course_info: vec!["<COURSE_NAME> is full for now. ".into()],
            footer: vec!["Bye.".into()],
        };
        let mut waitlisted = student();
        waitlisted.courses = vec![course("Salsa", EmailType::WaitingList)];
        let body = render(&template, EmailType::WaitingList, &waitlisted).unwrap();
        assert_eq!(body, "Hi Jane. Salsa is full for now. Bye.");
    }

    #[test]
    fn missing_partner_render_is_header_and_footer_only() {
        let template = EmailTemplate {
            name: "MissingPartner".into(),
            title: "Partner needed".into(),
            header: vec!["Hi <STUDENT_FIRST_NAME>, no partner yet for <COURSE_LIST>. ".into()],
            course_info: vec!["NEVER".into()],
            footer: vec!["Bye.".into()],
            ..Default::default()
        };
        let mut alone = student();
        alone.courses = vec![course("Zouk", EmailType::MissingPartner)];
        let body = render(&template, EmailType::MissingPartner, &alone).unwrap();
        assert_eq!(body, "Hi Jane, no partner yet for Zouk. Bye.");
    }

    #[test]
    fn course_blocks_repeat_per_matching_course() {
        let mut two = student();
        two.courses = vec![
            course("Tango", EmailType::Confirmation),
            course("Salsa", EmailType::Confirmation),
            course("Zouk", EmailType::WaitingList),
        ];
        let body = render(&confirmation_template(), EmailType::Confirmation, &two).unwrap();
        assert!(body.contains("Tango starts"));
        assert!(body.contains("Salsa starts"));
        assert!(!body.contains("Zouk starts"));
    }
}
