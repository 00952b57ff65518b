//! Bulk sending: one template, many independent collections
//!
//! Every row of a distribution becomes its own `GroupSign` collection with
//! a single signer. Rows run in isolation; a bad row is logged and
//! reported, the others carry on. SMS for all rows leave in one batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use docsign_types::{
    Caller, CollectionMode, CollectionStatus, ContactDraft, ContactRef, Document,
    DocumentCollection, FieldSet, NotificationSettings, PageRange, SendingMethod, Signer,
    SignerField,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::batch::BatchReport;
use crate::cache::TtlCache;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{DistributionCounters, NotificationKind, Template};
use crate::workflow::{unmark_notified, DocumentSource, DocumentWorkflow, FieldValue, SmsBatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub contact: ContactDraft,
    pub sending_method: SendingMethod,
    /// Per-recipient values for the shared template
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub name: String,
    pub template_id: Uuid,
    pub rows: Vec<DistributionRow>,
    /// Write each row's values into its PDF before sending
    #[serde(default)]
    pub push_field_values: bool,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based, as the sender numbered the rows
    pub row: usize,
    pub contact: String,
    pub code: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistributionReport {
    pub distribution_id: Uuid,
    pub created: Vec<Uuid>,
    pub failures: Vec<RowFailure>,
    /// The final SMS flush failed; affected collections are `SendingFailed`
    pub sms_batch_failed: bool,
}

impl DistributionReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Shared per-request state for the rows of one distribution
struct RowContext<'a> {
    caller: &'a Caller,
    request: &'a DistributionRequest,
    template: &'a Template,
    template_fields: &'a FieldSet,
    distribution_id: Uuid,
}

pub struct DistributionOrchestrator {
    workflow: Arc<DocumentWorkflow>,
    histograms: TtlCache<Uuid, DistributionCounters>,
}

impl DistributionOrchestrator {
    pub fn new(workflow: Arc<DocumentWorkflow>, histogram_ttl: Duration) -> Self {
        Self {
            workflow,
            histograms: TtlCache::new(histogram_ttl),
        }
    }

    /// Creates and sends one collection per row
    ///
    /// Request-level checks fail the call; row-level errors only fail
    /// their row.
    #[instrument(skip(self, caller, request), fields(user_id = %caller.user_id, template_id = %request.template_id, rows = request.rows.len()))]
    pub async fn send_documents_using_distribution_mechanism(
        &self,
        caller: &Caller,
        request: DistributionRequest,
    ) -> WorkflowResult<DistributionReport> {
        if request.rows.is_empty() {
            return Err(WorkflowError::InvalidInput("distribution has no rows".to_string()));
        }
        if caller.program_expired(Utc::now()) {
            return Err(WorkflowError::ProgramExpired);
        }
        let template = self
            .workflow
            .owned_template(caller, request.template_id)
            .await?;
        let template_fields = self
            .workflow
            .ports()
            .pdf
            .get_all_fields(template.id, PageRange::All)
            .await?;

        let ctx = RowContext {
            caller,
            request: &request,
            template: &template,
            template_fields: &template_fields,
            distribution_id: Uuid::new_v4(),
        };
        let mut report = DistributionReport {
            distribution_id: ctx.distribution_id,
            ..Default::default()
        };
        let mut sms = SmsBatch::new();
        let mut awaiting_sms: Vec<DocumentCollection> = Vec::new();

        for (index, row) in request.rows.iter().enumerate() {
            match self.send_row(&ctx, row, &mut sms).await {
                Ok((collection, queued)) => {
                    report.created.push(collection.id);
                    if queued {
                        awaiting_sms.push(collection);
                    }
                }
                Err(e) => {
                    let contact = row_label(row);
                    error!(
                        distribution_id = %ctx.distribution_id,
                        row = index + 1,
                        contact = %contact,
                        code = e.code(),
                        error = %e,
                        "Distribution row failed, skipping"
                    );
                    report.failures.push(RowFailure {
                        row: index + 1,
                        contact,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.workflow.flush_sms(&caller.company, &sms).await {
            warn!(distribution_id = %ctx.distribution_id, messages = sms.len(), error = %e, "Distribution SMS batch failed");
            report.sms_batch_failed = true;
            for collection in awaiting_sms {
                let signer_ids: Vec<Uuid> = collection.signers.iter().map(|s| s.id).collect();
                let marked = self
                    .workflow
                    .commit(collection.id, |stored| {
                        unmark_notified(stored, &signer_ids);
                        if !stored.status.is_terminal()
                            && !stored.signers.iter().any(|s| s.is_notified())
                        {
                            stored.status = CollectionStatus::SendingFailed;
                        }
                        Ok(())
                    })
                    .await;
                if let Err(e) = marked {
                    error!(collection_id = %collection.id, error = %e, "Failed to mark collection as undeliverable");
                }
            }
        }

        info!(
            distribution_id = %report.distribution_id,
            created = report.created_count(),
            failed = report.failure_count(),
            "Distribution finished"
        );
        Ok(report)
    }

    /// One row end to end; returns the collection and whether its SMS is
    /// still waiting on the batch flush
    async fn send_row(
        &self,
        ctx: &RowContext<'_>,
        row: &DistributionRow,
        sms: &mut SmsBatch,
    ) -> WorkflowResult<(DocumentCollection, bool)> {
        let caller = ctx.caller;
        let method = row.sending_method;
        if method != SendingMethod::Tablet && row.contact.means(method).is_none() {
            return Err(WorkflowError::ContactMissingMeans);
        }
        for value in &row.fields {
            if !ctx.template_fields.contains(&value.name) {
                return Err(WorkflowError::FieldNotInTemplate {
                    template_id: ctx.template.id,
                    field: value.name.clone(),
                });
            }
        }

        let ports = self.workflow.ports();
        if !ports.quota.can_add_document(caller.group_id, 1).await? {
            return Err(WorkflowError::DocumentQuotaExceeded);
        }
        if method == SendingMethod::Sms && !ports.quota.can_add_sms(caller.group_id, 1).await? {
            return Err(WorkflowError::SmsQuotaExceeded);
        }

        let contact = self
            .workflow
            .resolve_contact(
                caller,
                &ContactRef::New {
                    draft: row.contact.clone(),
                },
                method,
            )
            .await?;

        let preset: Vec<SignerField> = row
            .fields
            .iter()
            .map(|v| SignerField {
                template_id: ctx.template.id,
                field_name: v.name.clone(),
                field_value: Some(v.value.clone()),
            })
            .collect();

        let mut signer = Signer::new(ContactRef::Id { id: contact.id }, method);
        signer.id = Uuid::new_v4();
        signer.signer_fields = ctx
            .template_fields
            .unsigned()
            .filter(|f| !row.fields.iter().any(|v| f.matches(&v.name)))
            .map(|f| SignerField {
                template_id: ctx.template.id,
                field_name: f.name.clone(),
                field_value: None,
            })
            .collect();

        let mut collection = DocumentCollection {
            id: Uuid::new_v4(),
            name: ctx.request.name.clone(),
            mode: CollectionMode::GroupSign,
            status: CollectionStatus::Created,
            group_id: caller.group_id,
            user_id: caller.user_id,
            creation_time: Utc::now(),
            signed_time: None,
            callback_url: caller.company.callback_url.clone(),
            redirect_url: caller.company.redirect_url.clone(),
            distribution_id: Some(ctx.distribution_id),
            documents: vec![Document {
                id: Uuid::new_v4(),
                template_id: ctx.template.id,
                name: ctx.template.name.clone(),
                fields: preset.clone(),
                pages_count: 0,
            }],
            signers: vec![signer],
            notifications: ctx.request.notifications.clone(),
            pending_signing: None,
        };

        let pushed: &[SignerField] = if ctx.request.push_field_values {
            &preset
        } else {
            &[]
        };
        self.workflow
            .persist_new(&mut collection, vec![DocumentSource::Template], pushed, false)
            .await?;

        let queued_before = sms.len();
        let report = self
            .workflow
            .notify_signers(&mut collection, &[0], &caller.company, sms)
            .await;
        if let Err(e) = self.workflow.persist_dispatch(&mut collection, &report).await {
            // The row is reported as failed, so its SMS must not go out
            sms.truncate(queued_before);
            if let Err(cleanup) = ports.tokens.remove_for_collection(collection.id).await {
                warn!(collection_id = %collection.id, error = %cleanup, "Failed to drop links of a failed row");
            }
            return Err(e);
        }
        if report.reached_anyone() {
            self.workflow
                .publish(NotificationKind::DocumentSent, &collection)
                .await;
        }
        Ok((collection, sms.len() > queued_before))
    }

    /// Status histogram of a distribution, served from a short-lived cache
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn distribution_status(
        &self,
        caller: &Caller,
        distribution_id: Uuid,
    ) -> WorkflowResult<DistributionCounters> {
        let counters = match self.histograms.get(&distribution_id).await {
            Some(cached) => cached,
            None => {
                let fresh = self
                    .workflow
                    .ports()
                    .store
                    .read_distribution_item_counters(distribution_id)
                    .await?
                    .ok_or(WorkflowError::DistributionNotFound(distribution_id))?;
                self.histograms.insert(distribution_id, fresh.clone()).await;
                fresh
            }
        };
        if counters.group_id != caller.group_id {
            return Err(WorkflowError::DistributionNotInGroup(distribution_id));
        }
        Ok(counters)
    }

    /// Collections of a distribution, optionally narrowed to some statuses
    pub async fn list_distribution(
        &self,
        caller: &Caller,
        distribution_id: Uuid,
        statuses: &[CollectionStatus],
    ) -> WorkflowResult<Vec<DocumentCollection>> {
        let collections = self
            .workflow
            .ports()
            .store
            .read_by_distribution_id(distribution_id, statuses)
            .await?;
        if collections
            .iter()
            .any(|c| !c.is_accessible_by(caller.user_id, caller.group_id))
        {
            return Err(WorkflowError::DistributionNotInGroup(distribution_id));
        }
        Ok(collections)
    }

    /// Resends every collection still waiting on a signature
    pub async fn resend_unsigned(
        &self,
        caller: &Caller,
        distribution_id: Uuid,
    ) -> WorkflowResult<BatchReport> {
        self.resend_in_status(
            caller,
            distribution_id,
            &[
                CollectionStatus::Sent,
                CollectionStatus::Viewed,
                CollectionStatus::SendingFailed,
            ],
        )
        .await
    }

    /// Resends or reactivates every collection currently in `statuses`
    ///
    /// Reactivatable collections are reactivated; in-progress ones get a
    /// resend for each signer allowed to act. Each collection succeeds or
    /// fails on its own.
    #[instrument(skip(self, caller, statuses), fields(user_id = %caller.user_id))]
    pub async fn resend_in_status(
        &self,
        caller: &Caller,
        distribution_id: Uuid,
        statuses: &[CollectionStatus],
    ) -> WorkflowResult<BatchReport> {
        if statuses.is_empty() {
            return Err(WorkflowError::InvalidInput("no statuses selected".to_string()));
        }
        let collections = self
            .list_distribution(caller, distribution_id, statuses)
            .await?;

        let mut report = BatchReport::default();
        for collection in collections {
            match self.resend_one(caller, &collection).await {
                Ok(()) => report.record_success(collection.id),
                Err(e) => report.record_failure("resend", collection.id, &e),
            }
        }
        self.histograms.remove(&distribution_id).await;
        info!(
            distribution_id = %distribution_id,
            resent = report.success_count(),
            failed = report.failure_count(),
            "Distribution resend finished"
        );
        Ok(report)
    }

    async fn resend_one(&self, caller: &Caller, collection: &DocumentCollection) -> WorkflowResult<()> {
        if collection.status.can_reactivate() {
            self.workflow
                .reactivate_document(caller, collection.id, None)
                .await?;
            return Ok(());
        }
        if !collection.status.is_in_progress() {
            return Err(WorkflowError::IllegalStatusTransition {
                from: collection.status,
                to: CollectionStatus::Sent,
            });
        }
        for index in collection.signers_ready_for_dispatch() {
            let signer_id = collection.signers[index].id;
            self.workflow
                .resend_document(caller, collection.id, signer_id)
                .await?;
        }
        Ok(())
    }
}

fn row_label(row: &DistributionRow) -> String {
    row.contact
        .email
        .clone()
        .or_else(|| row.contact.phone.clone())
        .unwrap_or_else(|| row.contact.name.clone())
}
