//! Error taxonomy for the signing workflow
//!
//! Every variant maps to a stable numeric result code. The codes are part of
//! the contract with the presentation layer and must never be renumbered.

use chrono::{DateTime, Utc};
use docsign_types::{CollectionStatus, FieldValueError, OrderViolation};
use thiserror::Error;
use uuid::Uuid;

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl PortError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }
}

pub type PortResult<T> = Result<T, PortError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("document collection {0} not found")]
    CollectionNotFound(Uuid),

    #[error("document collection {0} does not belong to the caller's group")]
    CollectionNotInGroup(Uuid),

    #[error("distribution {0} not found")]
    DistributionNotFound(Uuid),

    #[error("distribution {0} does not belong to the caller's group")]
    DistributionNotInGroup(Uuid),

    #[error("template {0} not found")]
    TemplateNotFound(Uuid),

    #[error("template {0} does not belong to the caller's group")]
    TemplateNotInGroup(Uuid),

    #[error("contact {0} not found")]
    ContactNotFound(Uuid),

    #[error("contact {0} does not belong to the caller's group")]
    ContactNotInGroup(Uuid),

    #[error("contact has no address for the selected sending method")]
    ContactMissingMeans,

    #[error("field '{field}' does not exist in template {template_id}")]
    FieldNotInTemplate { template_id: Uuid, field: String },

    #[error("field '{0}' does not exist in the document")]
    FieldNotFound(String),

    #[error("invalid field value: {0}")]
    InvalidFieldValue(#[from] FieldValueError),

    #[error("mandatory fields are not filled: {}", .0.join(", "))]
    MandatoryFieldsMissing(Vec<String>),

    #[error("program expired")]
    ProgramExpired,

    #[error("document quota exceeded")]
    DocumentQuotaExceeded,

    #[error("sms quota exceeded")]
    SmsQuotaExceeded,

    #[error("visual identification quota exceeded")]
    VisualIdentificationQuotaExceeded,

    #[error("cannot cancel signed document")]
    CannotCancelSignedDocument,

    #[error("document already canceled")]
    AlreadyCanceled,

    #[error("document already deleted")]
    AlreadyDeleted,

    #[error("document is not signed")]
    DocumentNotSigned,

    #[error("document is {0} and can no longer change")]
    CollectionLocked(CollectionStatus),

    #[error("document already signed")]
    CollectionAlreadySigned,

    #[error("a signature started at {0} is still waiting to complete")]
    SigningInProgress(DateTime<Utc>),

    #[error("signer {0} not found")]
    SignerNotFound(Uuid),

    #[error(transparent)]
    SignerOrder(#[from] OrderViolation),

    #[error("signer {0} already signed or rejected")]
    SignerAlreadyFinished(Uuid),

    #[error("cannot move document from {from} to {to}")]
    IllegalStatusTransition {
        from: CollectionStatus,
        to: CollectionStatus,
    },

    #[error("signature fields mix incompatible signing types")]
    MixedSigningTypes,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("sending failed: {0}")]
    SendingFailed(String),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("archive error: {0}")]
    Archive(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// Stable numeric result code
    pub fn code(&self) -> u32 {
        match self {
            Self::CollectionNotFound(_) => 101,
            Self::CollectionNotInGroup(_) => 102,
            Self::DistributionNotFound(_) => 103,
            Self::DistributionNotInGroup(_) => 104,
            Self::TemplateNotFound(_) => 110,
            Self::TemplateNotInGroup(_) => 111,
            Self::ContactNotFound(_) => 120,
            Self::ContactNotInGroup(_) => 121,
            Self::ContactMissingMeans => 122,
            Self::FieldNotInTemplate { .. } => 130,
            Self::FieldNotFound(_) => 131,
            Self::InvalidFieldValue(_) => 132,
            Self::MandatoryFieldsMissing(_) => 133,
            Self::ProgramExpired => 140,
            Self::DocumentQuotaExceeded => 141,
            Self::SmsQuotaExceeded => 142,
            Self::VisualIdentificationQuotaExceeded => 143,
            Self::CannotCancelSignedDocument => 150,
            Self::AlreadyCanceled => 151,
            Self::AlreadyDeleted => 152,
            Self::DocumentNotSigned => 153,
            Self::IllegalStatusTransition { .. } => 154,
            Self::CollectionLocked(_) => 155,
            Self::CollectionAlreadySigned => 156,
            Self::SigningInProgress(_) => 157,
            Self::SignerNotFound(_) => 160,
            Self::SignerOrder(_) => 161,
            Self::SignerAlreadyFinished(_) => 162,
            Self::MixedSigningTypes => 170,
            Self::UnsupportedFileType(_) => 171,
            Self::InvalidInput(_) => 180,
            Self::SendingFailed(_) => 190,
            Self::Port(_) => 900,
            Self::Archive(_) => 910,
        }
    }

    /// Failures caused by the caller rather than by a collaborator
    pub fn is_business_rule(&self) -> bool {
        !matches!(
            self,
            Self::Port(_) | Self::SendingFailed(_) | Self::Archive(_)
        )
    }
}
