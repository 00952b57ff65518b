//! Sharing a signed collection's download link

use docsign_types::{Caller, SendingMethod};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dispatch::SmsBatch;
use super::DocumentWorkflow;
use crate::batch::BatchReport;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{MessageInfo, MessageKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecipient {
    pub name: String,
    pub method: SendingMethod,
    /// Email address or phone number
    pub address: String,
}

impl DocumentWorkflow {
    /// Sends the download link to extra recipients
    ///
    /// Emails go out one by one; SMS recipients share a single batch call.
    /// The report is keyed by the collection id, one entry per recipient.
    #[instrument(skip(self, caller, recipients), fields(user_id = %caller.user_id, recipients = recipients.len()))]
    pub async fn share_document(
        &self,
        caller: &Caller,
        id: Uuid,
        recipients: Vec<ShareRecipient>,
    ) -> WorkflowResult<BatchReport> {
        let collection = self.read(caller, id).await?;
        if !collection.status.is_signed() {
            return Err(WorkflowError::DocumentNotSigned);
        }
        if recipients.is_empty() {
            return Err(WorkflowError::InvalidInput("no recipients".to_string()));
        }
        if recipients
            .iter()
            .any(|r| r.method == SendingMethod::Tablet || r.address.trim().is_empty())
        {
            return Err(WorkflowError::ContactMissingMeans);
        }
        let sms_count = recipients
            .iter()
            .filter(|r| r.method == SendingMethod::Sms)
            .count() as u32;
        if sms_count > 0 && !self.ports.quota.can_add_sms(caller.group_id, sms_count).await? {
            return Err(WorkflowError::SmsQuotaExceeded);
        }

        let link = format!(
            "{}/{}",
            self.config.app.download_base_url.trim_end_matches('/'),
            collection.id
        );
        let mut report = BatchReport::default();
        let mut sms = SmsBatch::new();
        for recipient in recipients {
            let message = MessageInfo {
                kind: MessageKind::ShareDocument,
                collection_id: collection.id,
                signer_id: None,
                recipient_name: recipient.name,
                recipient_address: recipient.address.trim().to_string(),
                subject: format!("{} has been signed", collection.name),
                link: link.clone(),
            };
            if recipient.method == SendingMethod::Sms {
                sms.push(message);
                continue;
            }
            match self
                .ports
                .messaging
                .sender(recipient.method)
                .send(&self.config.app, &caller.company, &message)
                .await
            {
                Ok(()) => report.record_success(collection.id),
                Err(e) => {
                    let err = WorkflowError::SendingFailed(e.to_string());
                    report.record_failure("share", collection.id, &err);
                }
            }
        }

        match self.flush_sms(&caller.company, &sms).await {
            Ok(()) => (0..sms.len()).for_each(|_| report.record_success(collection.id)),
            Err(e) => {
                warn!(collection_id = %collection.id, messages = sms.len(), "Share SMS batch failed");
                (0..sms.len()).for_each(|_| report.record_failure("share", collection.id, &e));
            }
        }

        info!(
            collection_id = %collection.id,
            delivered = report.success_count(),
            failed = report.failure_count(),
            "Collection shared"
        );
        Ok(report)
    }
}
