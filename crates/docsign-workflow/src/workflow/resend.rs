//! Resending to a signer and replacing one

use docsign_types::{
    Caller, CollectionMode, CollectionStatus, ContactRef, DocumentCollection, SendingMethod,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dispatch::DispatchReport;
use super::DocumentWorkflow;
use crate::error::{WorkflowError, WorkflowResult};

impl DocumentWorkflow {
    /// Sends a fresh link to a signer who has not finished yet
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn resend_document(
        &self,
        caller: &Caller,
        id: Uuid,
        signer_id: Uuid,
    ) -> WorkflowResult<DispatchReport> {
        let collection = self.read(caller, id).await?;
        if matches!(collection.mode, CollectionMode::Online | CollectionMode::SelfSign) {
            return Err(WorkflowError::InvalidInput(format!(
                "{:?} collections are signed in place and cannot be resent",
                collection.mode
            )));
        }
        let index = resendable_signer(&collection, signer_id)?;
        if collection.signers[index].sending_method == SendingMethod::Sms
            && !self.ports.quota.can_add_sms(caller.group_id, 1).await?
        {
            return Err(WorkflowError::SmsQuotaExceeded);
        }

        let (mut collection, index) = self
            .commit(id, |stored| {
                let index = resendable_signer(stored, signer_id)?;
                stored.signers[index].authentication.reset_attempts();
                Ok(index)
            })
            .await?;
        self.ports.tokens.remove_for_signer(id, signer_id).await?;
        let report = self
            .dispatch(&mut collection, &[index], &caller.company)
            .await?;
        if report.failed.contains(&signer_id) {
            return Err(WorkflowError::SendingFailed(format!(
                "signer {} could not be notified",
                signer_id
            )));
        }
        info!(collection_id = %id, signer_id = %signer_id, "Signer notified again");
        Ok(report)
    }

    /// Points a pending signer slot at another contact
    ///
    /// The new contact is notified right away when the collection is in
    /// progress and signing order allows it.
    #[instrument(skip(self, caller, contact), fields(user_id = %caller.user_id))]
    pub async fn replace_signer(
        &self,
        caller: &Caller,
        id: Uuid,
        signer_id: Uuid,
        contact: ContactRef,
        sending_method: Option<SendingMethod>,
    ) -> WorkflowResult<DocumentCollection> {
        let collection = self.read(caller, id).await?;
        let index = replaceable_signer(&collection, signer_id)?;
        let method = sending_method.unwrap_or(collection.signers[index].sending_method);
        let resolved = self.resolve_contact(caller, &contact, method).await?;

        let (mut collection, (index, send_now)) = self
            .commit(id, |stored| {
                let index = replaceable_signer(stored, signer_id)?;
                let signer = &mut stored.signers[index];
                signer.contact = ContactRef::Id { id: resolved.id };
                signer.sending_method = method;
                signer.reset_pending();
                let send_now = stored.status.is_in_progress()
                    && matches!(
                        stored.mode,
                        CollectionMode::GroupSign | CollectionMode::OrderedGroupSign
                    )
                    && stored.check_signing_order(index).is_ok();
                Ok((index, send_now))
            })
            .await?;
        self.ports.tokens.remove_for_signer(id, signer_id).await?;
        info!(collection_id = %id, signer_id = %signer_id, contact_id = %resolved.id, send_now, "Signer replaced");

        if send_now {
            self.dispatch(&mut collection, &[index], &caller.company)
                .await?;
        }
        Ok(collection)
    }
}

/// Position of a signer that may be sent a fresh link
fn resendable_signer(collection: &DocumentCollection, signer_id: Uuid) -> WorkflowResult<usize> {
    if !collection.status.is_in_progress() {
        return Err(WorkflowError::IllegalStatusTransition {
            from: collection.status,
            to: CollectionStatus::Sent,
        });
    }
    let index = collection
        .signer_index(signer_id)
        .ok_or(WorkflowError::SignerNotFound(signer_id))?;
    if collection.signers[index].status.is_final() {
        return Err(WorkflowError::SignerAlreadyFinished(signer_id));
    }
    collection.check_signing_order(index)?;
    Ok(index)
}

/// Position of a signer slot that may be pointed at another contact
fn replaceable_signer(collection: &DocumentCollection, signer_id: Uuid) -> WorkflowResult<usize> {
    if collection.status.is_signed() {
        return Err(WorkflowError::CollectionAlreadySigned);
    }
    if matches!(
        collection.status,
        CollectionStatus::Canceled | CollectionStatus::Deleted
    ) {
        return Err(WorkflowError::CollectionLocked(collection.status));
    }
    let index = collection
        .signer_index(signer_id)
        .ok_or(WorkflowError::SignerNotFound(signer_id))?;
    if collection.signers[index].status.is_final() {
        return Err(WorkflowError::SignerAlreadyFinished(signer_id));
    }
    Ok(index)
}
