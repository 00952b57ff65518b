//! The acting user, as resolved by the hosting service's auth layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-company settings copied onto collections and messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfiguration {
    pub company_id: Uuid,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Display name used as SMS originator
    #[serde(default)]
    pub sms_sender: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// Process-wide messaging settings handed to every sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfiguration {
    pub signing_base_url: String,
    pub download_base_url: String,
    pub email_from: String,
    pub sms_sender: String,
}

impl Default for AppConfiguration {
    fn default() -> Self {
        Self {
            signing_base_url: "https://sign.getsignatures.org/s".to_string(),
            download_base_url: "https://getsignatures.org/download".to_string(),
            email_from: "GetSignatures <noreply@getsignatures.org>".to_string(),
            sms_sender: "DocSign".to_string(),
        }
    }
}

/// The authenticated user an operation runs on behalf of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// License end; `None` means no expiry
    #[serde(default)]
    pub program_expires_at: Option<DateTime<Utc>>,
    pub company: CompanyConfiguration,
}

impl Caller {
    pub fn program_expired(&self, now: DateTime<Utc>) -> bool {
        self.program_expires_at.is_some_and(|end| end <= now)
    }
}
