//! Collaborators the workflow consumes
//!
//! Persistence, PDF processing, messaging, quotas and the signing
//! back-ends live outside this crate. The engine only sees these traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsign_types::{
    AppConfiguration, Caller, CollectionStatus, CompanyConfiguration, Contact, ContactCriteria,
    ContactDraft, DocumentCollection, FieldSet, PageRange, SendingMethod, Signer,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortResult;

/// Selects one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionFilter {
    pub id: Uuid,
}

impl CollectionFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self { id }
    }
}

/// Status histogram of one distribution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionCounters {
    pub group_id: Uuid,
    pub counters: BTreeMap<CollectionStatus, u64>,
}

impl DistributionCounters {
    pub fn total(&self) -> u64 {
        self.counters.values().sum()
    }
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn read_collection(
        &self,
        filter: &CollectionFilter,
    ) -> PortResult<Option<DocumentCollection>>;

    async fn create_collection(&self, collection: &DocumentCollection) -> PortResult<()>;

    async fn update_collection(&self, collection: &DocumentCollection) -> PortResult<()>;

    async fn update_status(&self, id: Uuid, status: CollectionStatus) -> PortResult<()>;

    /// Collections of one distribution; an empty status list means all
    async fn read_by_distribution_id(
        &self,
        distribution_id: Uuid,
        statuses: &[CollectionStatus],
    ) -> PortResult<Vec<DocumentCollection>>;

    /// `None` when no collection carries this distribution id
    async fn read_distribution_item_counters(
        &self,
        distribution_id: Uuid,
    ) -> PortResult<Option<DistributionCounters>>;

    /// Physical removal, used only to compensate a half-finished create
    async fn remove_collection(&self, id: Uuid) -> PortResult<()>;
}

/// How the PDF engine should apply a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningKind {
    /// Signer's graphic signature, sealed with the platform certificate
    Local,
    /// Additional organisational server signature
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfo {
    pub kind: SigningKind,
    pub signer_name: String,
    #[serde(default)]
    pub signer_email: Option<String>,
    pub reason: String,
}

#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Copies the template PDF into a new document, returns its page count
    async fn materialize(&self, document_id: Uuid, template_id: Uuid) -> PortResult<u32>;

    /// Stores an uploaded PDF as a document, returns its page count
    async fn import_pdf(&self, document_id: Uuid, pdf: Vec<u8>) -> PortResult<u32>;

    /// Fields of a document or template
    async fn get_all_fields(&self, source_id: Uuid, range: PageRange) -> PortResult<FieldSet>;

    async fn write_fields(&self, document_id: Uuid, fields: &FieldSet) -> PortResult<()>;

    async fn set_all_fields_read_only(&self, document_id: Uuid) -> PortResult<()>;

    async fn sign(&self, document_id: Uuid, info: &SigningInfo) -> PortResult<()>;

    async fn read_bytes(&self, document_id: Uuid) -> PortResult<Vec<u8>>;

    async fn delete(&self, document_id: Uuid) -> PortResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
}

#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn read_template(&self, id: Uuid) -> PortResult<Option<Template>>;

    async fn increment_use(&self, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ContactRegistry: Send + Sync {
    async fn read(&self, criteria: &ContactCriteria) -> PortResult<Option<Contact>>;

    async fn create(
        &self,
        group_id: Uuid,
        draft: &ContactDraft,
        method: SendingMethod,
    ) -> PortResult<Contact>;

    async fn update(&self, contact: &Contact) -> PortResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    SignatureRequest,
    ShareDocument,
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub kind: MessageKind,
    pub collection_id: Uuid,
    #[serde(default)]
    pub signer_id: Option<Uuid>,
    pub recipient_name: String,
    /// Email address or phone number, per channel
    pub recipient_address: String,
    pub subject: String,
    pub link: String,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        app: &AppConfiguration,
        company: &CompanyConfiguration,
        message: &MessageInfo,
    ) -> PortResult<()>;

    async fn send_batch(
        &self,
        app: &AppConfiguration,
        company: &CompanyConfiguration,
        messages: &[MessageInfo],
    ) -> PortResult<()>;
}

pub trait MessagingGateway: Send + Sync {
    fn sender(&self, channel: SendingMethod) -> Arc<dyn MessageSender>;
}

#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn can_add_document(&self, group_id: Uuid, count: u32) -> PortResult<bool>;

    async fn can_add_sms(&self, group_id: Uuid, count: u32) -> PortResult<bool>;

    async fn can_add_visual_identification(&self, group_id: Uuid, count: u32)
        -> PortResult<bool>;

    async fn add_document(&self, group_id: Uuid, count: u32) -> PortResult<()>;

    async fn add_visual_identification(&self, group_id: Uuid, count: u32) -> PortResult<()>;

    async fn release_document(&self, group_id: Uuid, count: u32) -> PortResult<()>;

    async fn release_visual_identification(&self, group_id: Uuid, count: u32)
        -> PortResult<()>;
}

/// A tokenized link a signer uses to open the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerLink {
    pub signer_id: Uuid,
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait LinkGenerator: Send + Sync {
    async fn generate_signing_link(
        &self,
        collection: &DocumentCollection,
        signer: &Signer,
        company: &CompanyConfiguration,
    ) -> PortResult<SignerLink>;
}

/// Token -> (collection, signer) mappings that let a link resolve
#[async_trait]
pub trait SignerTokenStore: Send + Sync {
    async fn put(&self, link: &SignerLink, collection_id: Uuid) -> PortResult<()>;

    async fn remove_for_collection(&self, collection_id: Uuid) -> PortResult<()>;

    async fn remove_for_signer(&self, collection_id: Uuid, signer_id: Uuid) -> PortResult<()>;
}

/// A file a signer attached while signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub signer_id: Uuid,
    pub name: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn list(&self, collection_id: Uuid) -> PortResult<Vec<Attachment>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    DocumentSent,
    DocumentCanceled,
    DocumentDeleted,
    DocumentSigned,
    DocumentDeclined,
    DocumentReactivated,
}

/// Event pushed to the sender / company callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionNotification {
    pub kind: NotificationKind,
    pub collection_id: Uuid,
    pub group_id: Uuid,
    #[serde(default)]
    pub callback_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl CollectionNotification {
    pub fn new(kind: NotificationKind, collection: &DocumentCollection) -> Self {
        Self {
            kind,
            collection_id: collection.id,
            group_id: collection.group_id,
            callback_url: collection.callback_url.clone(),
            occurred_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: &CollectionNotification) -> PortResult<()>;
}

/// Source format of a self-sign upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Pdf,
    Word,
    Image,
}

impl UploadKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" | "docx" => Some(Self::Word),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" => Some(Self::Image),
            _ => None,
        }
    }
}

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn to_pdf(&self, kind: UploadKind, bytes: Vec<u8>) -> PortResult<Vec<u8>>;
}

/// Smart-card split signing: the card holder completes it later
#[async_trait]
pub trait SplitSigning: Send + Sync {
    async fn begin(
        &self,
        token: &str,
        collection_id: Uuid,
        document_ids: &[Uuid],
        signer_name: &str,
    ) -> PortResult<()>;
}

/// Identity-proofed remote signing reached through a redirect
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authorization_url(
        &self,
        state: &str,
        collection_id: Uuid,
        caller: &Caller,
    ) -> PortResult<String>;
}

/// Everything the controllers talk to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn CollectionStore>,
    pub pdf: Arc<dyn PdfEngine>,
    pub templates: Arc<dyn TemplateCatalog>,
    pub contacts: Arc<dyn ContactRegistry>,
    pub messaging: Arc<dyn MessagingGateway>,
    pub quota: Arc<dyn QuotaService>,
    pub links: Arc<dyn LinkGenerator>,
    pub tokens: Arc<dyn SignerTokenStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub notifications: Arc<dyn NotificationSink>,
    pub converter: Arc<dyn DocumentConverter>,
    pub split_signing: Arc<dyn SplitSigning>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub type CollaboratorsRef = Arc<Collaborators>;
