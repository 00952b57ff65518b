//! Collection creation
//!
//! Validation runs to completion before anything is written. The writes
//! that follow (quota counters, store row, PDF artifacts) are tracked by a
//! [`Saga`] and undone newest-first if a later step fails.

use std::collections::HashMap;

use chrono::Utc;
use docsign_types::{
    Caller, CollectionMode, CollectionStatus, ContactRef, Document, DocumentCollection, FieldSet,
    NotificationSettings, PageRange, SendingMethod, Signer, SignerAuthentication, SignerField,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dispatch::DispatchReport;
use super::fields::FieldValue;
use super::DocumentWorkflow;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::Template;
use crate::saga::{Compensation, Saga};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub template_id: Uuid,
    /// Defaults to the template name
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerDraft {
    pub contact: ContactRef,
    pub sending_method: SendingMethod,
    #[serde(default)]
    pub signer_fields: Vec<SignerField>,
    #[serde(default)]
    pub authentication: SignerAuthentication,
}

/// A collection as submitted by the sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDraft {
    pub name: String,
    pub mode: CollectionMode,
    pub documents: Vec<DocumentDraft>,
    pub signers: Vec<SignerDraft>,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Where the bytes of a new document come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Copy of the document's template
    Template,
    /// Already converted upload
    Upload(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedCollection {
    pub collection: DocumentCollection,
    /// Signers notified on create; for online collections only the links
    pub dispatch: DispatchReport,
}

impl DocumentWorkflow {
    /// Validates, persists and (for group modes) sends a new collection
    ///
    /// `read_only_fields` are written into the matching documents and
    /// locked before any signer sees them.
    #[instrument(skip(self, caller, draft, read_only_fields), fields(user_id = %caller.user_id, mode = ?draft.mode))]
    pub async fn create(
        &self,
        caller: &Caller,
        draft: CollectionDraft,
        read_only_fields: Vec<SignerField>,
    ) -> WorkflowResult<CreatedCollection> {
        if draft.mode == CollectionMode::SelfSign {
            return Err(WorkflowError::InvalidInput(
                "self-sign collections are created from an upload".to_string(),
            ));
        }
        if draft.documents.is_empty() {
            return Err(WorkflowError::InvalidInput("collection has no documents".to_string()));
        }
        if draft.signers.is_empty() {
            return Err(WorkflowError::InvalidInput("collection has no signers".to_string()));
        }
        if caller.program_expired(Utc::now()) {
            return Err(WorkflowError::ProgramExpired);
        }
        if !self
            .ports
            .quota
            .can_add_document(caller.group_id, draft.documents.len() as u32)
            .await?
        {
            return Err(WorkflowError::DocumentQuotaExceeded);
        }

        let mut templates: HashMap<Uuid, (Template, FieldSet)> = HashMap::new();
        for document in &draft.documents {
            if templates.contains_key(&document.template_id) {
                continue;
            }
            let template = self.owned_template(caller, document.template_id).await?;
            let fields = self
                .ports
                .pdf
                .get_all_fields(template.id, PageRange::All)
                .await?;
            templates.insert(template.id, (template, fields));
        }

        for signer in &draft.signers {
            match &signer.contact {
                ContactRef::Id { id } => {
                    self.owned_contact(caller, *id).await?;
                }
                ContactRef::New { draft: contact } => {
                    if signer.sending_method != SendingMethod::Tablet
                        && contact.means(signer.sending_method).is_none()
                    {
                        return Err(WorkflowError::ContactMissingMeans);
                    }
                }
            }
        }

        let requested = draft
            .signers
            .iter()
            .flat_map(|s| s.signer_fields.iter())
            .chain(read_only_fields.iter());
        for field in requested {
            let known = templates
                .get(&field.template_id)
                .is_some_and(|(_, fields)| fields.contains(&field.field_name));
            if !known {
                return Err(WorkflowError::FieldNotInTemplate {
                    template_id: field.template_id,
                    field: field.field_name.clone(),
                });
            }
        }

        let visual = draft
            .signers
            .iter()
            .filter(|s| s.authentication.visual_identification)
            .count() as u32;
        if visual > 0
            && !self
                .ports
                .quota
                .can_add_visual_identification(caller.group_id, visual)
                .await?
        {
            return Err(WorkflowError::VisualIdentificationQuotaExceeded);
        }

        let sms = sms_to_notify(&draft);
        if sms > 0 && !self.ports.quota.can_add_sms(caller.group_id, sms).await? {
            return Err(WorkflowError::SmsQuotaExceeded);
        }

        let mut signers = Vec::with_capacity(draft.signers.len());
        for signer in &draft.signers {
            let contact = self
                .resolve_contact(caller, &signer.contact, signer.sending_method)
                .await?;
            let mut slot = Signer::new(ContactRef::Id { id: contact.id }, signer.sending_method);
            slot.id = Uuid::new_v4();
            slot.signer_fields = signer.signer_fields.clone();
            slot.authentication = signer.authentication.clone();
            slot.authentication.reset_attempts();
            signers.push(slot);
        }

        let documents: Vec<Document> = draft
            .documents
            .iter()
            .map(|d| Document {
                id: Uuid::new_v4(),
                template_id: d.template_id,
                name: d
                    .name
                    .clone()
                    .or_else(|| templates.get(&d.template_id).map(|(t, _)| t.name.clone()))
                    .unwrap_or_default(),
                fields: read_only_fields
                    .iter()
                    .filter(|f| f.template_id == d.template_id)
                    .cloned()
                    .collect(),
                pages_count: 0,
            })
            .collect();
        let sources = vec![DocumentSource::Template; documents.len()];

        let mut collection = DocumentCollection {
            id: Uuid::new_v4(),
            name: draft.name,
            mode: draft.mode,
            status: CollectionStatus::Created,
            group_id: caller.group_id,
            user_id: caller.user_id,
            creation_time: Utc::now(),
            signed_time: None,
            callback_url: draft.callback_url.or_else(|| caller.company.callback_url.clone()),
            redirect_url: draft.redirect_url.or_else(|| caller.company.redirect_url.clone()),
            distribution_id: None,
            documents,
            signers,
            notifications: draft.notifications,
            pending_signing: None,
        };

        self.persist_new(&mut collection, sources, &read_only_fields, true)
            .await?;

        let dispatch = match collection.mode {
            CollectionMode::Online => {
                let mut report = DispatchReport::default();
                for index in 0..collection.signers.len() {
                    report
                        .links
                        .push(self.issue_link(&collection, index, &caller.company).await?);
                }
                report
            }
            _ => {
                let targets = collection.signers_ready_for_dispatch();
                self.dispatch(&mut collection, &targets, &caller.company)
                    .await?
            }
        };

        Ok(CreatedCollection {
            collection,
            dispatch,
        })
    }

    /// Template by id, checked against the caller's group
    pub(crate) async fn owned_template(&self, caller: &Caller, id: Uuid) -> WorkflowResult<Template> {
        let template = self
            .ports
            .templates
            .read_template(id)
            .await?
            .ok_or(WorkflowError::TemplateNotFound(id))?;
        if template.group_id != caller.group_id {
            return Err(WorkflowError::TemplateNotInGroup(id));
        }
        Ok(template)
    }

    /// Writes a validated collection and its PDFs, or nothing at all
    ///
    /// `preset` values are written into the documents of their template,
    /// and locked when `lock_preset` is set.
    pub(crate) async fn persist_new(
        &self,
        collection: &mut DocumentCollection,
        sources: Vec<DocumentSource>,
        preset: &[SignerField],
        lock_preset: bool,
    ) -> WorkflowResult<()> {
        if sources.len() != collection.documents.len() {
            return Err(WorkflowError::InvalidInput(format!(
                "{} documents but {} sources",
                collection.documents.len(),
                sources.len()
            )));
        }

        let mut saga = Saga::new(collection.id);
        match self
            .run_persist(collection, sources, preset, lock_preset, &mut saga)
            .await
        {
            Ok(()) => {
                saga.commit();
                info!(
                    collection_id = %collection.id,
                    documents = collection.documents.len(),
                    signers = collection.signers.len(),
                    "Collection created"
                );
                Ok(())
            }
            Err(e) => {
                warn!(collection_id = %collection.id, error = %e, "Create failed, compensating");
                saga.compensate(&self.ports).await;
                Err(e)
            }
        }
    }

    async fn run_persist(
        &self,
        collection: &mut DocumentCollection,
        sources: Vec<DocumentSource>,
        preset: &[SignerField],
        lock_preset: bool,
        saga: &mut Saga,
    ) -> WorkflowResult<()> {
        let group_id = collection.group_id;
        let count = collection.documents.len() as u32;
        self.ports.quota.add_document(group_id, count).await?;
        saga.record(Compensation::ReleaseDocumentQuota { group_id, count });

        let visual = collection.visual_identification_count();
        if visual > 0 {
            self.ports
                .quota
                .add_visual_identification(group_id, visual)
                .await?;
            saga.record(Compensation::ReleaseVisualIdentification {
                group_id,
                count: visual,
            });
        }

        self.ports.store.create_collection(collection).await?;
        saga.record(Compensation::RemoveCollection(collection.id));

        for (document, source) in collection.documents.iter_mut().zip(sources) {
            let pages = match source {
                DocumentSource::Template => {
                    self.ports
                        .pdf
                        .materialize(document.id, document.template_id)
                        .await?
                }
                DocumentSource::Upload(bytes) => self.ports.pdf.import_pdf(document.id, bytes).await?,
            };
            saga.record(Compensation::DeleteDocument(document.id));
            document.pages_count = pages;

            let values: Vec<FieldValue> = preset
                .iter()
                .filter(|f| f.template_id == document.template_id)
                .filter_map(|f| {
                    f.field_value.as_ref().map(|v| FieldValue {
                        name: f.field_name.clone(),
                        value: v.clone(),
                    })
                })
                .collect();
            if !values.is_empty() {
                self.write_values(document.id, &values, lock_preset)
                    .await?;
            }
        }

        self.ports.store.update_collection(collection).await?;
        Ok(())
    }
}

/// SMS signers the first dispatch will reach
fn sms_to_notify(draft: &CollectionDraft) -> u32 {
    match draft.mode {
        CollectionMode::GroupSign => draft
            .signers
            .iter()
            .filter(|s| s.sending_method == SendingMethod::Sms)
            .count() as u32,
        CollectionMode::OrderedGroupSign => draft
            .signers
            .first()
            .filter(|s| s.sending_method == SendingMethod::Sms)
            .map_or(0, |_| 1),
        CollectionMode::Online | CollectionMode::SelfSign => 0,
    }
}
