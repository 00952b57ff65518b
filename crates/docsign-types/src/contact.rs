//! Contacts that signer slots point at

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::SendingMethod;

/// A registered contact, owned by one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub default_sending_method: SendingMethod,
}

/// Details used to find or create a contact on attach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ContactDraft {
    /// Address for the given channel, if the draft has one
    pub fn means(&self, method: SendingMethod) -> Option<&str> {
        match method {
            SendingMethod::Sms => self.phone.as_deref(),
            SendingMethod::Email | SendingMethod::Tablet => self.email.as_deref(),
        }
    }
}

/// Lookup criteria for the contact registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactCriteria {
    pub id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactCriteria {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Email or phone within one group
    pub fn by_means(group_id: Uuid, draft: &ContactDraft) -> Self {
        Self {
            id: None,
            group_id: Some(group_id),
            email: draft.email.as_ref().map(|e| e.trim().to_lowercase()),
            phone: draft.phone.as_ref().map(|p| normalize_phone(p)),
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        if let Some(id) = self.id {
            return contact.id == id;
        }
        if self.group_id.is_some_and(|g| g != contact.group_id) {
            return false;
        }
        let email_hit = match (&self.email, &contact.email) {
            (Some(wanted), Some(have)) => wanted.eq_ignore_ascii_case(have.trim()),
            _ => false,
        };
        let phone_hit = match (&self.phone, &contact.phone) {
            (Some(wanted), Some(have)) => *wanted == normalize_phone(have),
            _ => false,
        };
        email_hit || phone_hit
    }
}

/// Strips everything but digits and a leading plus
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (i == 0 && c == '+') {
            out.push(c);
        }
    }
    out
}
