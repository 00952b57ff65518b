//! Signer notification
//!
//! Email and tablet signers are notified one at a time. SMS messages are
//! collected into an [`SmsBatch`] and handed to the gateway in a single
//! `send_batch` call.

use chrono::Utc;
use docsign_types::{
    Caller, CollectionMode, CollectionStatus, CompanyConfiguration, DocumentCollection,
    SendingMethod, SignerStatus,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::DocumentWorkflow;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{MessageInfo, MessageKind, NotificationKind, SignerLink};

/// SMS messages waiting for one gateway call
#[derive(Debug, Clone, Default)]
pub struct SmsBatch {
    messages: Vec<MessageInfo>,
}

impl SmsBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: MessageInfo) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[MessageInfo] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops everything queued after the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Collection and signer of every queued message
    pub fn pending(&self) -> impl Iterator<Item = (Uuid, Option<Uuid>)> + '_ {
        self.messages.iter().map(|m| (m.collection_id, m.signer_id))
    }
}

/// What happened to each signer addressed by one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Notified immediately (email, tablet)
    pub sent: Vec<Uuid>,
    /// Queued into an SMS batch
    pub queued: Vec<Uuid>,
    pub failed: Vec<Uuid>,
    pub links: Vec<SignerLink>,
}

impl DispatchReport {
    pub fn reached_anyone(&self) -> bool {
        !self.sent.is_empty() || !self.queued.is_empty()
    }

    pub fn link_for(&self, signer_id: Uuid) -> Option<&SignerLink> {
        self.links.iter().find(|l| l.signer_id == signer_id)
    }
}

impl DocumentWorkflow {
    /// Fresh link for one signer, registered in the token store
    pub(crate) async fn issue_link(
        &self,
        collection: &DocumentCollection,
        index: usize,
        company: &CompanyConfiguration,
    ) -> WorkflowResult<SignerLink> {
        let signer = collection
            .signers
            .get(index)
            .ok_or_else(|| WorkflowError::InvalidInput(format!("no signer at position {}", index)))?;
        let link = self
            .ports
            .links
            .generate_signing_link(collection, signer, company)
            .await?;
        self.ports.tokens.put(&link, collection.id).await?;
        Ok(link)
    }

    /// Sends or queues the signature request for each target signer
    ///
    /// Signers that were reached get status `Sent` and a sent timestamp.
    /// SMS messages land in `sms` and are only marked reached here; the
    /// caller owns the flush.
    pub(crate) async fn notify_signers(
        &self,
        collection: &mut DocumentCollection,
        targets: &[usize],
        company: &CompanyConfiguration,
        sms: &mut SmsBatch,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for &index in targets {
            let Some(signer_id) = collection.signers.get(index).map(|s| s.id) else {
                continue;
            };
            match self.notify_one(collection, index, company, sms).await {
                Ok((link, queued)) => {
                    if let Some(signer) = collection.signers.get_mut(index) {
                        signer.status = SignerStatus::Sent;
                        signer.sent_at = Some(Utc::now());
                    }
                    if queued {
                        report.queued.push(signer_id);
                    } else {
                        report.sent.push(signer_id);
                    }
                    report.links.push(link);
                }
                Err(e) => {
                    warn!(
                        collection_id = %collection.id,
                        signer_id = %signer_id,
                        code = e.code(),
                        error = %e,
                        "Failed to notify signer"
                    );
                    report.failed.push(signer_id);
                }
            }
        }
        report
    }

    async fn notify_one(
        &self,
        collection: &DocumentCollection,
        index: usize,
        company: &CompanyConfiguration,
        sms: &mut SmsBatch,
    ) -> WorkflowResult<(SignerLink, bool)> {
        let signer = collection
            .signers
            .get(index)
            .ok_or_else(|| WorkflowError::InvalidInput(format!("no signer at position {}", index)))?;
        let contact = self.signer_contact(signer).await?;
        let address = match signer.sending_method {
            SendingMethod::Email => contact.email.clone(),
            SendingMethod::Sms => contact.phone.clone(),
            SendingMethod::Tablet => Some(contact.email.clone().unwrap_or_default()),
        }
        .ok_or(WorkflowError::ContactMissingMeans)?;

        let link = self.issue_link(collection, index, company).await?;
        let message = MessageInfo {
            kind: MessageKind::SignatureRequest,
            collection_id: collection.id,
            signer_id: Some(signer.id),
            recipient_name: contact.name,
            recipient_address: address,
            subject: format!("Signature requested: {}", collection.name),
            link: link.url.clone(),
        };

        if signer.sending_method == SendingMethod::Sms {
            sms.push(message);
            return Ok((link, true));
        }

        self.ports
            .messaging
            .sender(signer.sending_method)
            .send(&self.config.app, company, &message)
            .await
            .map_err(|e| WorkflowError::SendingFailed(e.to_string()))?;
        debug!(collection_id = %collection.id, signer_id = %signer.id, method = ?signer.sending_method, "Signer notified");
        Ok((link, false))
    }

    /// Hands every queued SMS to the gateway in one call
    pub(crate) async fn flush_sms(
        &self,
        company: &CompanyConfiguration,
        batch: &SmsBatch,
    ) -> WorkflowResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.ports
            .messaging
            .sender(SendingMethod::Sms)
            .send_batch(&self.config.app, company, batch.messages())
            .await
            .map_err(|e| WorkflowError::SendingFailed(e.to_string()))?;
        info!(messages = batch.len(), "SMS batch sent");
        Ok(())
    }

    /// Notifies `targets`, flushes their SMS and persists the outcome
    pub(crate) async fn dispatch(
        &self,
        collection: &mut DocumentCollection,
        targets: &[usize],
        company: &CompanyConfiguration,
    ) -> WorkflowResult<DispatchReport> {
        if targets.is_empty() {
            return Ok(DispatchReport::default());
        }

        let mut sms = SmsBatch::new();
        let mut report = self.notify_signers(collection, targets, company, &mut sms).await;
        if let Err(e) = self.flush_sms(company, &sms).await {
            warn!(collection_id = %collection.id, messages = sms.len(), error = %e, "SMS batch failed");
            let queued = std::mem::take(&mut report.queued);
            unmark_notified(collection, &queued);
            report.failed.extend(queued);
        }

        self.persist_dispatch(collection, &report).await?;
        if report.reached_anyone() {
            self.publish(NotificationKind::DocumentSent, collection).await;
        }
        info!(
            collection_id = %collection.id,
            sent = report.sent.len(),
            queued = report.queued.len(),
            failed = report.failed.len(),
            status = %collection.status,
            "Dispatch finished"
        );
        Ok(report)
    }

    /// Writes what a dispatch did on top of the stored collection
    ///
    /// Only the addressed signer slots and the resulting status are
    /// applied. A slot that finished while the messages were going out is
    /// left as stored. `collection` is replaced by what was written.
    pub(crate) async fn persist_dispatch(
        &self,
        collection: &mut DocumentCollection,
        report: &DispatchReport,
    ) -> WorkflowResult<()> {
        let working = &*collection;
        let (stored, ()) = self
            .commit(working.id, |stored| {
                merge_dispatched(stored, working, report);
                apply_dispatch_outcome(stored, report);
                Ok(())
            })
            .await?;
        *collection = stored;
        Ok(())
    }

    /// Links for every signer allowed to act right now
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn generate_signing_links(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> WorkflowResult<Vec<SignerLink>> {
        let collection = self.read(caller, id).await?;
        ensure_open(&collection)?;

        let eligible: Vec<usize> = match collection.mode {
            CollectionMode::Online => collection
                .signers
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.status.is_final())
                .map(|(i, _)| i)
                .collect(),
            _ => collection.signers_ready_for_dispatch(),
        };

        let mut links = Vec::with_capacity(eligible.len());
        for index in eligible {
            links.push(self.issue_link(&collection, index, &caller.company).await?);
        }
        Ok(links)
    }

    /// Link for one signer, refused while an earlier ordered signer is pending
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn generate_signer_link(
        &self,
        caller: &Caller,
        id: Uuid,
        signer_id: Uuid,
    ) -> WorkflowResult<SignerLink> {
        let collection = self.read(caller, id).await?;
        ensure_open(&collection)?;

        let index = collection
            .signer_index(signer_id)
            .ok_or(WorkflowError::SignerNotFound(signer_id))?;
        if collection.signers[index].status.is_final() {
            return Err(WorkflowError::SignerAlreadyFinished(signer_id));
        }
        collection.check_signing_order(index)?;

        self.issue_link(&collection, index, &caller.company).await
    }
}

/// Collections that can still take signer activity
pub(crate) fn ensure_open(collection: &DocumentCollection) -> WorkflowResult<()> {
    if collection.status.is_terminal() {
        return Err(WorkflowError::CollectionLocked(collection.status));
    }
    Ok(())
}

pub(crate) fn unmark_notified(collection: &mut DocumentCollection, signer_ids: &[Uuid]) {
    for id in signer_ids {
        if let Some(signer) = collection.signer_mut(*id) {
            signer.sent_at = None;
        }
    }
}

/// Copies the notification state of every addressed signer from `working`
fn merge_dispatched(
    stored: &mut DocumentCollection,
    working: &DocumentCollection,
    report: &DispatchReport,
) {
    for id in report.sent.iter().chain(&report.queued).chain(&report.failed) {
        let (Some(from), Some(to)) = (working.signer(*id), stored.signer_mut(*id)) else {
            continue;
        };
        if to.status.is_final() {
            continue;
        }
        to.status = from.status;
        to.sent_at = from.sent_at;
    }
}

/// `Sent` once anyone was reached; `SendingFailed` when nobody ever was.
/// Terminal collections keep their status.
pub(crate) fn apply_dispatch_outcome(collection: &mut DocumentCollection, report: &DispatchReport) {
    if collection.status.is_terminal() {
        return;
    }
    if report.reached_anyone() {
        if collection.status != CollectionStatus::Viewed {
            collection.status = CollectionStatus::Sent;
        }
    } else if !report.failed.is_empty() && !collection.signers.iter().any(|s| s.is_notified()) {
        collection.status = CollectionStatus::SendingFailed;
    }
}
