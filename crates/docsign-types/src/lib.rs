//! Shared domain model for the document signing workflow
//!
//! Collections, documents, signers, PDF field sets, contacts and the
//! resolved caller context. Everything here is plain data plus the
//! invariants that can be checked without touching a collaborator.

pub mod caller;
pub mod collection;
pub mod contact;
pub mod fields;

pub use caller::{AppConfiguration, Caller, CompanyConfiguration};
pub use collection::{
    CollectionMode, CollectionStatus, ContactRef, Document, DocumentCollection,
    NotificationSettings, OrderViolation, PendingSigning, SendingMethod, Signer,
    SignerAuthentication, SignerField, SignerStatus,
};
pub use contact::{Contact, ContactCriteria, ContactDraft};
pub use fields::{FieldKind, FieldSet, FieldValueError, PageRange, PdfField, SignatureSigningType};
