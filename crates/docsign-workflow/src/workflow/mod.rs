//! Document workflow controller
//!
//! Validates preconditions, enforces ownership and signing order, and
//! drives collections through their lifecycle. The distribution and
//! self-sign controllers reuse the primitives defined here.

mod create;
mod dispatch;
mod download;
mod fields;
mod lifecycle;
mod resend;
mod share;

use std::sync::Arc;

use docsign_types::{
    Caller, CollectionStatus, Contact, ContactCriteria, ContactRef, DocumentCollection,
    SendingMethod, Signer,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{NegativeKey, NegativeReason, NegativeResultCache};
use crate::config::EngineConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::guard::DocumentUpdateGuard;
use crate::ports::{CollaboratorsRef, CollectionFilter, CollectionNotification, NotificationKind};

pub(crate) use dispatch::unmark_notified;

pub use create::{CollectionDraft, CreatedCollection, DocumentDraft, DocumentSource, SignerDraft};
pub use dispatch::{DispatchReport, SmsBatch};
pub use download::{DownloadBatch, DownloadedFile};
pub use fields::{DocumentFieldValues, ExportedField, ExportedFields, FieldValue};
pub use lifecycle::SignerAction;
pub use share::ShareRecipient;

pub struct DocumentWorkflow {
    ports: CollaboratorsRef,
    config: Arc<EngineConfig>,
    negative_cache: Arc<dyn NegativeResultCache>,
    guard: Arc<DocumentUpdateGuard>,
}

impl DocumentWorkflow {
    pub fn new(
        ports: CollaboratorsRef,
        config: Arc<EngineConfig>,
        negative_cache: Arc<dyn NegativeResultCache>,
    ) -> Self {
        Self {
            ports,
            config,
            negative_cache,
            guard: Arc::new(DocumentUpdateGuard::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn ports(&self) -> &CollaboratorsRef {
        &self.ports
    }

    /// Reads a collection the caller may act on
    ///
    /// Not-found and not-in-group outcomes are remembered per caller; a
    /// repeat within the TTL returns the same error without a store read.
    pub async fn read(&self, caller: &Caller, id: Uuid) -> WorkflowResult<DocumentCollection> {
        if let Some(reason) = self.negative_cache.lookup(id, caller.user_id).await {
            debug!(collection_id = %id, user_id = %caller.user_id, ?reason, "Rejected from negative cache");
            return Err(reason.to_error(id));
        }

        match self.fetch_owned(caller, id).await {
            Ok(collection) => Ok(collection),
            Err(err) => {
                if let Some(reason) = NegativeReason::of(&err) {
                    warn!(collection_id = %id, user_id = %caller.user_id, ?reason, "Invalid collection reference");
                    self.negative_cache
                        .remember(NegativeKey {
                            collection_id: id,
                            user_id: caller.user_id,
                            reason,
                        })
                        .await;
                }
                Err(err)
            }
        }
    }

    async fn fetch_owned(&self, caller: &Caller, id: Uuid) -> WorkflowResult<DocumentCollection> {
        let collection = self.fetch(id).await?;
        if !collection.is_accessible_by(caller.user_id, caller.group_id) {
            return Err(WorkflowError::CollectionNotInGroup(id));
        }
        Ok(collection)
    }

    /// Store read without an ownership check
    pub(crate) async fn fetch(&self, id: Uuid) -> WorkflowResult<DocumentCollection> {
        self.ports
            .store
            .read_collection(&CollectionFilter::by_id(id))
            .await?
            .ok_or(WorkflowError::CollectionNotFound(id))
    }

    /// Re-reads the collection under its update guard, applies `change` and
    /// writes the result back
    ///
    /// Aggregate writes never start from a copy read outside the guard, so
    /// signer actions recorded in between survive. `change` may refuse by
    /// returning an error, in which case nothing is written.
    pub(crate) async fn commit<T, F>(
        &self,
        id: Uuid,
        change: F,
    ) -> WorkflowResult<(DocumentCollection, T)>
    where
        F: FnOnce(&mut DocumentCollection) -> WorkflowResult<T>,
    {
        let _held = self.guard.lock(id).await;
        let mut collection = self.fetch(id).await?;
        let outcome = change(&mut collection)?;
        self.ports.store.update_collection(&collection).await?;
        Ok((collection, outcome))
    }

    pub(crate) async fn save_status(&self, id: Uuid, status: CollectionStatus) -> WorkflowResult<()> {
        let _held = self.guard.lock(id).await;
        self.ports.store.update_status(id, status).await?;
        Ok(())
    }

    /// Finds the contact behind a reference, creating it from a draft when
    /// nothing in the caller's group matches
    pub(crate) async fn resolve_contact(
        &self,
        caller: &Caller,
        contact: &ContactRef,
        method: SendingMethod,
    ) -> WorkflowResult<Contact> {
        match contact {
            ContactRef::Id { id } => self.owned_contact(caller, *id).await,
            ContactRef::New { draft } => {
                if method != SendingMethod::Tablet && draft.means(method).is_none() {
                    return Err(WorkflowError::ContactMissingMeans);
                }
                let criteria = ContactCriteria::by_means(caller.group_id, draft);
                if let Some(mut existing) = self.ports.contacts.read(&criteria).await? {
                    let mut changed = false;
                    if existing.email.is_none() && draft.email.is_some() {
                        existing.email = draft.email.clone();
                        changed = true;
                    }
                    if existing.phone.is_none() && draft.phone.is_some() {
                        existing.phone = draft.phone.clone();
                        changed = true;
                    }
                    if changed {
                        self.ports.contacts.update(&existing).await?;
                    }
                    return Ok(existing);
                }
                let created = self
                    .ports
                    .contacts
                    .create(caller.group_id, draft, method)
                    .await?;
                debug!(contact_id = %created.id, group_id = %caller.group_id, "Created contact");
                Ok(created)
            }
        }
    }

    /// Contact by id, checked against the caller's group
    pub(crate) async fn owned_contact(&self, caller: &Caller, id: Uuid) -> WorkflowResult<Contact> {
        let contact = self
            .ports
            .contacts
            .read(&ContactCriteria::by_id(id))
            .await?
            .ok_or(WorkflowError::ContactNotFound(id))?;
        if contact.group_id != caller.group_id {
            return Err(WorkflowError::ContactNotInGroup(id));
        }
        Ok(contact)
    }

    /// Contact of an already attached signer
    pub(crate) async fn signer_contact(&self, signer: &Signer) -> WorkflowResult<Contact> {
        let id = signer.contact.id().ok_or_else(|| {
            WorkflowError::InvalidInput(format!("signer {} has an unresolved contact", signer.id))
        })?;
        self.ports
            .contacts
            .read(&ContactCriteria::by_id(id))
            .await?
            .ok_or(WorkflowError::ContactNotFound(id))
    }

    /// Notification failures are logged, never surfaced
    pub(crate) async fn publish(&self, kind: NotificationKind, collection: &DocumentCollection) {
        let notification = CollectionNotification::new(kind, collection);
        if let Err(e) = self.ports.notifications.publish(&notification).await {
            warn!(collection_id = %collection.id, ?kind, error = %e, "Failed to publish notification");
        }
    }
}
