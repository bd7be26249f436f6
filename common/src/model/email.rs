use serde::{Deserialize, Serialize};

/// Enrollment outcomes; each one selects a template and a sent-marker
/// column in the summary tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailType {
    Confirmation,
    WaitingList,
    NotEnoughPeople,
    FullClass,
    MissingPartner,
    /// Dispatch-request value only; fans out over the five concrete types
    /// and is never a course status.
    All,
}

impl EmailType {
    /// The five concrete types, in dispatch order.
    pub const CONCRETE: [EmailType; 5] = [
        EmailType::Confirmation,
        EmailType::WaitingList,
        EmailType::NotEnoughPeople,
        EmailType::FullClass,
        EmailType::MissingPartner,
    ];

    /// Template name used to look up the matching entry of `Emails.json`.
    pub fn template_name(self) -> &'static str {
        match self {
            EmailType::Confirmation => "Confirmation",
            EmailType::WaitingList => "WaitingList",
            EmailType::NotEnoughPeople => "NotEnoughPeople",
            EmailType::FullClass => "FullClass",
            EmailType::MissingPartner => "MissingPartner",
            EmailType::All => "All",
        }
    }

    /// Column header of both the sent-marker column in the summary tab and
    /// the commentary column in the registration tab.
    pub fn column_header(self) -> &'static str {
        match self {
            EmailType::Confirmation => "Confirmation",
            EmailType::WaitingList => "Waiting List",
            EmailType::NotEnoughPeople => "Not Enough People",
            EmailType::FullClass => "Full Class",
            EmailType::MissingPartner => "Missing Partner",
            EmailType::All => "",
        }
    }

    /// Text of the dated marker written back after a successful send.
    pub fn sent_marker_text(self) -> &'static str {
        match self {
            EmailType::Confirmation => "CONFIRMATION",
            EmailType::WaitingList => "WAITING LIST",
            EmailType::NotEnoughPeople => "NOT ENOUGH PEOPLE",
            EmailType::FullClass => "CLASS IS FULL",
            EmailType::MissingPartner => "MISSING PARTNER",
            EmailType::All => "",
        }
    }

    /// Resolves the status letter organizers write into the per-course
    /// summary columns. Anything unrecognized leaves the status unset.
    pub fn from_status_letter(value: &str) -> Option<EmailType> {
        match value.trim().to_lowercase().as_str() {
            "1" => Some(EmailType::Confirmation),
            "w" => Some(EmailType::WaitingList),
            "nep" => Some(EmailType::NotEnoughPeople),
            "fc" => Some(EmailType::FullClass),
            "bp" => Some(EmailType::MissingPartner),
            _ => None,
        }
    }
}

/// One named template from `Emails.json`. The four fragment lists are
/// stored split for readability of the JSON file and concatenated before
/// rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub header: Vec<String>,
    #[serde(default)]
    pub payment_info: Vec<String>,
    #[serde(default)]
    pub course_info: Vec<String>,
    #[serde(default)]
    pub footer: Vec<String>,
}

impl EmailTemplate {
    pub fn header_merged(&self) -> String {
        self.header.concat()
    }

    pub fn payment_info_merged(&self) -> String {
        self.payment_info.concat()
    }

    pub fn course_info_merged(&self) -> String {
        self.course_info.concat()
    }

    pub fn footer_merged(&self) -> String {
        self.footer.concat()
    }
}
