use serde::{Deserialize, Serialize};

/// Mail submission endpoint and account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailerSettings {
    pub mail: String,
    pub password: String,
    pub server_name: String,
    pub server_port: u16,
}

fn default_installment_surcharge() -> i64 {
    20
}

/// Session-wide configuration loaded once from `Settings.json`.
///
/// `prices` holds the tiered course pricing: first course, second course,
/// every further course; an optional fourth entry is the discounted price
/// for "shorter" courses and enables the Sum Cheaper summary column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub mailer: MailerSettings,
    pub raw_data_tab_name: String,
    pub registration_tab_name: String,
    pub summary_tab_name: String,
    pub group_balance_tab_name: String,
    pub leader_text: String,
    pub follower_text: String,
    pub solo_text: String,
    pub prices: Vec<i64>,
    #[serde(default = "default_installment_surcharge")]
    pub installment_surcharge: i64,
    pub test_mail_recipient: String,
}

impl Settings {
    /// Whether the pricing has the discounted "shorter" tier.
    pub fn has_cheaper_tier(&self) -> bool {
        self.prices.len() > 3
    }
}
