//! Document collections, their documents and signers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::contact::ContactDraft;

/// How the signers of a collection are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Signers act one after the other, in list order
    OrderedGroupSign,
    /// Every signer is notified at once
    GroupSign,
    /// Signing happens in front of the sender, links are returned not sent
    Online,
    /// The sender is the only signer
    SelfSign,
}

/// Lifecycle status of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Created,
    Sent,
    Viewed,
    Signed,
    Declined,
    SendingFailed,
    Deleted,
    Canceled,
    ExtraServerSigned,
}

impl CollectionStatus {
    /// Signed documents, with or without the extra server signature
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Signed | Self::ExtraServerSigned)
    }

    /// Still waiting on at least one signer
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Sent | Self::Viewed)
    }

    /// States the workflow never leaves on its own
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Signed | Self::ExtraServerSigned | Self::Canceled | Self::Deleted | Self::Declined
        )
    }

    /// States an explicit reactivate may bring back to `Sent`
    pub fn can_reactivate(self) -> bool {
        matches!(self, Self::Canceled | Self::Declined | Self::SendingFailed)
    }
}

impl std::fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Signed => "signed",
            Self::Declined => "declined",
            Self::SendingFailed => "sending_failed",
            Self::Deleted => "deleted",
            Self::Canceled => "canceled",
            Self::ExtraServerSigned => "extra_server_signed",
        };
        write!(f, "{}", name)
    }
}

/// Status of a single signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    Sent,
    Viewed,
    Signed,
    Rejected,
}

impl SignerStatus {
    /// The signer has finished acting on the collection
    pub fn is_final(self) -> bool {
        matches!(self, Self::Signed | Self::Rejected)
    }
}

/// Channel used to reach a signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendingMethod {
    Email,
    Sms,
    Tablet,
}

/// Reference to the contact behind a signer slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContactRef {
    /// Already registered contact
    Id { id: Uuid },
    /// Resolved by email/phone or created on attach
    New { draft: ContactDraft },
}

impl ContactRef {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Id { id } => Some(*id),
            Self::New { .. } => None,
        }
    }
}

/// A value assigned to one template field for one signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerField {
    pub template_id: Uuid,
    pub field_name: String,
    #[serde(default)]
    pub field_value: Option<String>,
}

/// How a signer proves identity before signing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerAuthentication {
    /// One-time code sent over the signer's channel
    #[serde(default)]
    pub otp_required: bool,
    /// Video/photo identification, billed separately
    #[serde(default)]
    pub visual_identification: bool,
    /// Failed attempts since the last (re)send
    #[serde(default)]
    pub attempts: u32,
}

impl SignerAuthentication {
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }
}

/// A party required to act on a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    pub id: Uuid,
    pub contact: ContactRef,
    pub status: SignerStatus,
    pub sending_method: SendingMethod,
    #[serde(default)]
    pub signer_fields: Vec<SignerField>,
    #[serde(default)]
    pub authentication: SignerAuthentication,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Signer {
    /// A fresh, not yet notified signer slot
    pub fn new(contact: ContactRef, sending_method: SendingMethod) -> Self {
        Self {
            id: Uuid::nil(),
            contact,
            status: SignerStatus::Sent,
            sending_method,
            signer_fields: Vec::new(),
            authentication: SignerAuthentication::default(),
            sent_at: None,
            viewed_at: None,
            signed_at: None,
            rejected_at: None,
        }
    }

    /// Whether a notification has gone out to this signer
    pub fn is_notified(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Puts the slot back to "waiting for a notification"
    pub fn reset_pending(&mut self) {
        self.status = SignerStatus::Sent;
        self.sent_at = None;
        self.viewed_at = None;
        self.rejected_at = None;
        self.authentication.reset_attempts();
    }
}

/// One PDF inside a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SignerField>,
    #[serde(default)]
    pub pages_count: u32,
}

/// What the sender wants to hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub notify_on_signed: bool,
    #[serde(default)]
    pub notify_on_viewed: bool,
    #[serde(default)]
    pub attach_signed_document: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            notify_on_signed: true,
            notify_on_viewed: false,
            attach_signed_document: false,
        }
    }
}

/// A smart-card or server-assisted signature started on close and not
/// yet confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSigning {
    /// Split-signing token or identity-provider state
    pub reference: String,
    pub started_at: DateTime<Utc>,
}

/// The aggregate: documents sent to signers under one workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCollection {
    pub id: Uuid,
    pub name: String,
    pub mode: CollectionMode,
    pub status: CollectionStatus,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub signed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub distribution_id: Option<Uuid>,
    pub documents: Vec<Document>,
    pub signers: Vec<Signer>,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub pending_signing: Option<PendingSigning>,
}

/// Raised when an ordered signer is addressed before its predecessor signed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signer at position {index} is waiting for signer {blocking_signer} to sign")]
pub struct OrderViolation {
    pub index: usize,
    pub blocking_signer: Uuid,
}

impl DocumentCollection {
    /// Ownership rule shared by every operation
    pub fn is_accessible_by(&self, user_id: Uuid, group_id: Uuid) -> bool {
        self.group_id == group_id
            || (self.mode == CollectionMode::SelfSign && self.user_id == user_id)
    }

    pub fn signer_index(&self, signer_id: Uuid) -> Option<usize> {
        self.signers.iter().position(|s| s.id == signer_id)
    }

    pub fn signer(&self, signer_id: Uuid) -> Option<&Signer> {
        self.signers.iter().find(|s| s.id == signer_id)
    }

    pub fn signer_mut(&mut self, signer_id: Uuid) -> Option<&mut Signer> {
        self.signers.iter_mut().find(|s| s.id == signer_id)
    }

    /// In ordered mode, signer `index` may only be addressed once the
    /// signer before it has signed
    pub fn check_signing_order(&self, index: usize) -> Result<(), OrderViolation> {
        if self.mode != CollectionMode::OrderedGroupSign || index == 0 {
            return Ok(());
        }
        match self.signers.get(index - 1) {
            Some(previous) if previous.status != SignerStatus::Signed => Err(OrderViolation {
                index,
                blocking_signer: previous.id,
            }),
            _ => Ok(()),
        }
    }

    /// Signers that may be notified right now
    pub fn signers_ready_for_dispatch(&self) -> Vec<usize> {
        match self.mode {
            CollectionMode::GroupSign => self
                .signers
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.status.is_final())
                .map(|(i, _)| i)
                .collect(),
            CollectionMode::OrderedGroupSign => self
                .signers
                .iter()
                .position(|s| s.status != SignerStatus::Signed)
                .filter(|&i| self.signers[i].status != SignerStatus::Rejected)
                .into_iter()
                .collect(),
            CollectionMode::Online | CollectionMode::SelfSign => Vec::new(),
        }
    }

    pub fn all_signers_signed(&self) -> bool {
        !self.signers.is_empty() && self.signers.iter().all(|s| s.status == SignerStatus::Signed)
    }

    pub fn any_signer_rejected(&self) -> bool {
        self.signers.iter().any(|s| s.status == SignerStatus::Rejected)
    }

    /// Distinct templates used by the documents
    pub fn template_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.documents.iter().map(|d| d.template_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Number of signers requiring visual identification
    pub fn visual_identification_count(&self) -> u32 {
        self.signers
            .iter()
            .filter(|s| s.authentication.visual_identification)
            .count() as u32
    }
}
