//! Document collection signing workflow
//!
//! Drives multi-party e-signature collections from creation to completion:
//! group and ordered signing, bulk distribution to many recipients,
//! resend/reactivate, and self-signing with pluggable signing back-ends.
//!
//! Storage, PDF processing, messaging and quotas are collaborators behind
//! the traits in [`ports`]. [`WorkflowEngine`] wires them to the
//! controllers:
//!
//! - [`DocumentWorkflow`]: create, read, update, cancel, delete, download,
//!   resend, reactivate, replace signer, share, export
//! - [`DistributionOrchestrator`]: one template sent to many rows
//! - [`SelfSignController`]: the sender signs their own upload

pub mod batch;
pub mod cache;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod guard;
pub mod links;
pub mod ports;
pub mod saga;
pub mod self_sign;
pub mod workflow;

pub use batch::{BatchReport, ItemFailure};
pub use cache::{InMemoryNegativeCache, NegativeKey, NegativeReason, NegativeResultCache, TtlCache};
pub use config::EngineConfig;
pub use distribution::{
    DistributionOrchestrator, DistributionReport, DistributionRequest, DistributionRow, RowFailure,
};
pub use engine::WorkflowEngine;
pub use error::{PortError, PortResult, WorkflowError, WorkflowResult};
pub use guard::DocumentUpdateGuard;
pub use links::{HmacLinkGenerator, LinkClaims, LinkTokenError};
pub use self_sign::{
    SelfSignController, SelfSignOperation, SelfSignOutcome, SelfSignUpload, SigningBackend,
    SigningStarted,
};
pub use workflow::{
    CollectionDraft, CreatedCollection, DispatchReport, DocumentDraft, DocumentFieldValues,
    DocumentSource, DocumentWorkflow, DownloadBatch, DownloadedFile, ExportedField,
    ExportedFields, FieldValue, ShareRecipient, SignerAction, SignerDraft, SmsBatch,
};
