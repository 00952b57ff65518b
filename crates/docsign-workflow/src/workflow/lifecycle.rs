//! Status transitions: cancel, delete, reactivate, signer actions

use chrono::Utc;
use docsign_types::{
    Caller, CollectionMode, CollectionStatus, CompanyConfiguration, DocumentCollection,
    SignerStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::dispatch::DispatchReport;
use super::DocumentWorkflow;
use crate::batch::BatchReport;
use crate::error::{PortError, WorkflowError, WorkflowResult};
use crate::ports::{NotificationKind, SigningInfo, SigningKind};

/// What a signer did on the signing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerAction {
    Viewed,
    Signed,
    Rejected,
}

impl SignerAction {
    fn target(self) -> SignerStatus {
        match self {
            Self::Viewed => SignerStatus::Viewed,
            Self::Signed => SignerStatus::Signed,
            Self::Rejected => SignerStatus::Rejected,
        }
    }

    /// The signer already reflects this action (or moved past it)
    fn already_applied(self, current: SignerStatus) -> bool {
        match self {
            Self::Viewed => current != SignerStatus::Sent,
            Self::Signed | Self::Rejected => current == self.target(),
        }
    }
}

impl DocumentWorkflow {
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn cancel(&self, caller: &Caller, id: Uuid) -> WorkflowResult<DocumentCollection> {
        let mut collection = self.read(caller, id).await?;
        match collection.status {
            status if status.is_signed() => return Err(WorkflowError::CannotCancelSignedDocument),
            CollectionStatus::Canceled => return Err(WorkflowError::AlreadyCanceled),
            CollectionStatus::Deleted => {
                return Err(WorkflowError::IllegalStatusTransition {
                    from: CollectionStatus::Deleted,
                    to: CollectionStatus::Canceled,
                })
            }
            _ => {}
        }

        self.ports.tokens.remove_for_collection(id).await?;
        self.save_status(id, CollectionStatus::Canceled).await?;
        collection.status = CollectionStatus::Canceled;
        info!(collection_id = %id, "Collection canceled");
        self.publish(NotificationKind::DocumentCanceled, &collection)
            .await;
        Ok(collection)
    }

    /// Soft delete; the row stays with status `Deleted`
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> WorkflowResult<DocumentCollection> {
        let mut collection = self.read(caller, id).await?;
        if collection.status == CollectionStatus::Deleted {
            return Err(WorkflowError::AlreadyDeleted);
        }

        self.ports.tokens.remove_for_collection(id).await?;
        self.save_status(id, CollectionStatus::Deleted).await?;
        collection.status = CollectionStatus::Deleted;
        info!(collection_id = %id, "Collection deleted");
        self.publish(NotificationKind::DocumentDeleted, &collection)
            .await;
        Ok(collection)
    }

    /// Deletes every id it can; failures are reported, not raised
    #[instrument(skip(self, caller, ids), fields(user_id = %caller.user_id, count = ids.len()))]
    pub async fn delete_batch(&self, caller: &Caller, ids: &[Uuid]) -> BatchReport {
        let mut report = BatchReport::default();
        for &id in ids {
            match self.delete(caller, id).await {
                Ok(_) => report.record_success(id),
                Err(e) => report.record_failure("delete", id, &e),
            }
        }
        report
    }

    /// Brings a canceled, declined or undeliverable collection back to `Sent`
    ///
    /// Every signer that has not signed goes back to pending. With a
    /// `signer_id` only that signer is notified, subject to signing order;
    /// otherwise whoever the mode allows.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn reactivate_document(
        &self,
        caller: &Caller,
        id: Uuid,
        signer_id: Option<Uuid>,
    ) -> WorkflowResult<DispatchReport> {
        let collection = self.read(caller, id).await?;
        if !collection.status.can_reactivate() {
            return Err(WorkflowError::IllegalStatusTransition {
                from: collection.status,
                to: CollectionStatus::Sent,
            });
        }
        if collection.mode == CollectionMode::SelfSign {
            return Err(WorkflowError::InvalidInput(
                "self-sign collections cannot be reactivated".to_string(),
            ));
        }

        let (mut collection, targets) = self
            .commit(id, |stored| {
                if !stored.status.can_reactivate() {
                    return Err(WorkflowError::IllegalStatusTransition {
                        from: stored.status,
                        to: CollectionStatus::Sent,
                    });
                }
                for signer in stored
                    .signers
                    .iter_mut()
                    .filter(|s| s.status != SignerStatus::Signed)
                {
                    signer.reset_pending();
                }

                let targets = match signer_id {
                    Some(signer_id) => {
                        let index = stored
                            .signer_index(signer_id)
                            .ok_or(WorkflowError::SignerNotFound(signer_id))?;
                        if stored.signers[index].status.is_final() {
                            return Err(WorkflowError::SignerAlreadyFinished(signer_id));
                        }
                        stored.check_signing_order(index)?;
                        vec![index]
                    }
                    None => stored.signers_ready_for_dispatch(),
                };
                stored.status = CollectionStatus::Sent;
                Ok(targets)
            })
            .await?;

        self.ports.tokens.remove_for_collection(id).await?;
        let report = if targets.is_empty() {
            DispatchReport::default()
        } else {
            self.dispatch(&mut collection, &targets, &caller.company)
                .await?
        };

        info!(collection_id = %id, status = %collection.status, "Collection reactivated");
        self.publish(NotificationKind::DocumentReactivated, &collection)
            .await;
        Ok(report)
    }

    /// Records what a signer did, then notifies whoever comes next
    ///
    /// The write happens under the collection's update guard and is
    /// confirmed by reading it back before the next ordered signer is
    /// dispatched. Repeating an action is a no-op.
    #[instrument(skip(self, company))]
    pub async fn record_signer_action(
        &self,
        company: &CompanyConfiguration,
        id: Uuid,
        signer_id: Uuid,
        action: SignerAction,
    ) -> WorkflowResult<DocumentCollection> {
        let held = self.guard.lock(id).await;
        let mut collection = self.fetch(id).await?;
        let index = collection
            .signer_index(signer_id)
            .ok_or(WorkflowError::SignerNotFound(signer_id))?;

        let current = collection.signers[index].status;
        if action.already_applied(current) {
            debug!(collection_id = %id, signer_id = %signer_id, ?action, "Signer action already recorded");
            return Ok(collection);
        }
        if collection.status.is_terminal() {
            return Err(WorkflowError::CollectionLocked(collection.status));
        }
        if current.is_final() {
            return Err(WorkflowError::SignerAlreadyFinished(signer_id));
        }
        collection.check_signing_order(index)?;

        let now = Utc::now();
        let signer = &mut collection.signers[index];
        signer.status = action.target();
        match action {
            SignerAction::Viewed => signer.viewed_at = Some(now),
            SignerAction::Signed => {
                signer.viewed_at.get_or_insert(now);
                signer.signed_at = Some(now);
            }
            SignerAction::Rejected => signer.rejected_at = Some(now),
        }

        if collection.all_signers_signed() {
            collection.status = CollectionStatus::Signed;
            collection.signed_time = Some(now);
            collection.pending_signing = None;
        } else if collection.any_signer_rejected() {
            collection.status = CollectionStatus::Declined;
        } else if collection.status == CollectionStatus::Sent {
            collection.status = CollectionStatus::Viewed;
        }

        self.ports.store.update_collection(&collection).await?;
        let stored = self.fetch(id).await?;
        let confirmed = stored
            .signer(signer_id)
            .is_some_and(|s| s.status == action.target());
        if !confirmed {
            return Err(PortError::unavailable(
                "store",
                format!("signer {} update not visible on read-back", signer_id),
            )
            .into());
        }
        drop(held);

        info!(
            collection_id = %id,
            signer_id = %signer_id,
            ?action,
            status = %collection.status,
            "Signer action recorded"
        );

        match collection.status {
            CollectionStatus::Signed => {
                self.publish(NotificationKind::DocumentSigned, &collection)
                    .await
            }
            CollectionStatus::Declined => {
                self.ports.tokens.remove_for_collection(id).await?;
                self.publish(NotificationKind::DocumentDeclined, &collection)
                    .await
            }
            _ => {
                if action == SignerAction::Signed
                    && collection.mode == CollectionMode::OrderedGroupSign
                {
                    let targets = collection.signers_ready_for_dispatch();
                    self.dispatch(&mut collection, &targets, company).await?;
                }
            }
        }
        Ok(collection)
    }

    /// Adds the organisation's server signature to a signed collection
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn extra_server_signing(
        &self,
        caller: &Caller,
        id: Uuid,
    ) -> WorkflowResult<DocumentCollection> {
        let mut collection = self.read(caller, id).await?;
        match collection.status {
            CollectionStatus::Signed => {}
            CollectionStatus::ExtraServerSigned => {
                return Err(WorkflowError::IllegalStatusTransition {
                    from: collection.status,
                    to: CollectionStatus::ExtraServerSigned,
                })
            }
            _ => return Err(WorkflowError::DocumentNotSigned),
        }

        let info = SigningInfo {
            kind: SigningKind::Server,
            signer_name: caller.name.clone(),
            signer_email: Some(caller.email.clone()),
            reason: format!("Server signature for {}", collection.name),
        };
        for document in &collection.documents {
            self.ports.pdf.sign(document.id, &info).await?;
        }

        self.save_status(id, CollectionStatus::ExtraServerSigned)
            .await?;
        collection.status = CollectionStatus::ExtraServerSigned;
        info!(collection_id = %id, documents = collection.documents.len(), "Server signature applied");
        Ok(collection)
    }
}
