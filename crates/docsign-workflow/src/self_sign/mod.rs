//! Self-sign: the sender is the only signer
//!
//! A self-sign collection starts from an upload, sits in `Viewed` while the
//! user fills it in, and is closed into one of the signing back-ends.

mod backend;

use std::sync::Arc;

use chrono::Utc;
use docsign_types::{
    Caller, CollectionMode, CollectionStatus, ContactDraft, ContactRef, Document,
    DocumentCollection, FieldSet, NotificationSettings, PageRange, PendingSigning, SendingMethod,
    Signer, SignerStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{NotificationKind, UploadKind};
use crate::workflow::{DocumentFieldValues, DocumentSource, DocumentWorkflow};

pub use backend::{
    BeginSigning, LocalSigning, ServerAssistedSigning, SigningBackend, SigningContext,
    SigningStarted, SmartCardSigning,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfSignUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Defaults to the file name without extension
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfSignOperation {
    /// Keep the values, no validation
    Save,
    /// Validate, lock and sign
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelfSignOutcome {
    pub collection: DocumentCollection,
    /// Set on close
    pub started: Option<SigningStarted>,
}

pub struct SelfSignController {
    workflow: Arc<DocumentWorkflow>,
}

impl SelfSignController {
    pub fn new(workflow: Arc<DocumentWorkflow>) -> Self {
        Self { workflow }
    }

    /// Converts the upload to PDF and opens a collection for the caller
    #[instrument(skip(self, caller, upload), fields(user_id = %caller.user_id, file_name = %upload.file_name))]
    pub async fn create(
        &self,
        caller: &Caller,
        upload: SelfSignUpload,
    ) -> WorkflowResult<DocumentCollection> {
        if caller.program_expired(Utc::now()) {
            return Err(WorkflowError::ProgramExpired);
        }
        let kind = UploadKind::from_file_name(&upload.file_name)
            .ok_or_else(|| WorkflowError::UnsupportedFileType(upload.file_name.clone()))?;
        if upload.bytes.is_empty() {
            return Err(WorkflowError::InvalidInput("uploaded file is empty".to_string()));
        }
        let ports = self.workflow.ports();
        if !ports.quota.can_add_document(caller.group_id, 1).await? {
            return Err(WorkflowError::DocumentQuotaExceeded);
        }

        let pdf = match kind {
            UploadKind::Pdf => upload.bytes,
            other => ports.converter.to_pdf(other, upload.bytes).await?,
        };

        let me = ContactDraft {
            name: caller.name.clone(),
            email: Some(caller.email.clone()),
            phone: caller.phone.clone(),
        };
        let contact = self
            .workflow
            .resolve_contact(caller, &ContactRef::New { draft: me }, SendingMethod::Email)
            .await?;

        let now = Utc::now();
        let mut signer = Signer::new(ContactRef::Id { id: contact.id }, SendingMethod::Email);
        signer.id = Uuid::new_v4();
        signer.status = SignerStatus::Viewed;
        signer.sent_at = Some(now);
        signer.viewed_at = Some(now);

        let name = upload.name.unwrap_or_else(|| {
            upload
                .file_name
                .rsplit_once('.')
                .map_or(upload.file_name.as_str(), |(stem, _)| stem)
                .to_string()
        });
        let mut collection = DocumentCollection {
            id: Uuid::new_v4(),
            name: name.clone(),
            mode: CollectionMode::SelfSign,
            status: CollectionStatus::Viewed,
            group_id: caller.group_id,
            user_id: caller.user_id,
            creation_time: now,
            signed_time: None,
            callback_url: caller.company.callback_url.clone(),
            redirect_url: caller.company.redirect_url.clone(),
            distribution_id: None,
            documents: vec![Document {
                id: Uuid::new_v4(),
                template_id: Uuid::nil(),
                name,
                fields: Vec::new(),
                pages_count: 0,
            }],
            signers: vec![signer],
            notifications: NotificationSettings::default(),
            pending_signing: None,
        };

        self.workflow
            .persist_new(&mut collection, vec![DocumentSource::Upload(pdf)], &[], false)
            .await?;
        Ok(collection)
    }

    /// Saves values, or closes the collection into a signing back-end
    #[instrument(skip(self, caller, values), fields(user_id = %caller.user_id))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        values: Vec<DocumentFieldValues>,
        operation: SelfSignOperation,
    ) -> WorkflowResult<SelfSignOutcome> {
        let collection = self.workflow.read(caller, id).await?;
        if collection.mode != CollectionMode::SelfSign {
            return Err(WorkflowError::InvalidInput(format!(
                "collection {} is not a self-sign collection",
                id
            )));
        }
        if collection.status != CollectionStatus::Viewed {
            return Err(WorkflowError::CollectionLocked(collection.status));
        }
        if let Some(pending) = &collection.pending_signing {
            return Err(WorkflowError::SigningInProgress(pending.started_at));
        }

        match operation {
            SelfSignOperation::Save => {
                let collection = self
                    .workflow
                    .update_fields(caller, id, values, false)
                    .await?;
                Ok(SelfSignOutcome {
                    collection,
                    started: None,
                })
            }
            SelfSignOperation::Close => self.close(caller, collection, values).await,
        }
    }

    async fn close(
        &self,
        caller: &Caller,
        collection: DocumentCollection,
        values: Vec<DocumentFieldValues>,
    ) -> WorkflowResult<SelfSignOutcome> {
        let ports = self.workflow.ports();
        if let Some(stray) = values
            .iter()
            .find(|v| !collection.documents.iter().any(|d| d.id == v.document_id))
        {
            return Err(WorkflowError::InvalidInput(format!(
                "document {} is not part of collection {}",
                stray.document_id, collection.id
            )));
        }

        let mut filled: Vec<(Uuid, FieldSet)> = Vec::with_capacity(collection.documents.len());
        for document in &collection.documents {
            let mut fields = ports.pdf.get_all_fields(document.id, PageRange::All).await?;
            for update in values.iter().filter(|v| v.document_id == document.id) {
                for v in &update.values {
                    fields
                        .find_mut(&v.name)
                        .ok_or_else(|| WorkflowError::FieldNotFound(v.name.clone()))?
                        .set_value(&v.value)?;
                }
            }
            filled.push((document.id, fields));
        }

        let missing: Vec<String> = filled
            .iter()
            .flat_map(|(_, fields)| fields.missing_mandatory())
            .map(|f| f.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(WorkflowError::MandatoryFieldsMissing(missing));
        }

        let mut types = Vec::new();
        for (_, fields) in &filled {
            for t in fields.signing_types() {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
        }
        let backend = SigningBackend::select(&types)?;

        for (document_id, fields) in &mut filled {
            fields.set_all_read_only();
            ports.pdf.write_fields(*document_id, fields).await?;
        }

        let started = backend
            .begin(&SigningContext {
                ports,
                caller,
                collection: &collection,
            })
            .await?;

        let now = Utc::now();
        let pending = started.pending_reference().map(str::to_string);
        let (collection, ()) = self
            .workflow
            .commit(collection.id, |stored| {
                if stored.status != CollectionStatus::Viewed {
                    return Err(WorkflowError::CollectionLocked(stored.status));
                }
                if let Some(outstanding) = &stored.pending_signing {
                    return Err(WorkflowError::SigningInProgress(outstanding.started_at));
                }
                match pending {
                    None => {
                        if let Some(signer) = stored.signers.first_mut() {
                            signer.status = SignerStatus::Signed;
                            signer.signed_at = Some(now);
                        }
                        stored.status = CollectionStatus::Signed;
                        stored.signed_time = Some(now);
                    }
                    Some(reference) => {
                        stored.pending_signing = Some(PendingSigning {
                            reference,
                            started_at: now,
                        });
                    }
                }
                Ok(())
            })
            .await?;
        if collection.status == CollectionStatus::Signed {
            self.workflow
                .publish(NotificationKind::DocumentSigned, &collection)
                .await;
        }

        info!(
            collection_id = %collection.id,
            backend = backend.name(),
            status = %collection.status,
            "Self-sign collection closed"
        );
        Ok(SelfSignOutcome {
            collection,
            started: Some(started),
        })
    }
}
