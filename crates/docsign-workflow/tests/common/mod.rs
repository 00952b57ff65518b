//! In-memory collaborators for the workflow integration tests
//!
//! Every fake records what it was asked to do so tests can assert on side
//! effects (store reads, batch sends, quota movements) and not only on
//! return values.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use docsign_types::{
    AppConfiguration, Caller, CollectionMode, CollectionStatus, CompanyConfiguration, Contact,
    ContactCriteria, ContactDraft, ContactRef, Document, DocumentCollection, FieldKind, FieldSet,
    NotificationSettings, PageRange, PdfField, SendingMethod, SignatureSigningType, Signer,
    SignerAuthentication, SignerStatus,
};
use docsign_workflow::ports::{
    Attachment, AttachmentStore, Collaborators, CollectionFilter, CollectionNotification,
    CollectionStore, ContactRegistry, DistributionCounters, DocumentConverter, IdentityProvider,
    MessageInfo, MessageSender, MessagingGateway, NotificationSink, PdfEngine, QuotaService,
    SignerLink, SignerTokenStore, SigningInfo, SplitSigning, Template, TemplateCatalog, UploadKind,
};
use docsign_workflow::{
    CollectionDraft, DocumentDraft, EngineConfig, HmacLinkGenerator, PortError, PortResult,
    SignerDraft, WorkflowEngine,
};
use uuid::Uuid;

// ============================================================================
// Store
// ============================================================================

type UpdateFilter = Box<dyn Fn(&DocumentCollection) -> bool + Send + Sync>;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<Uuid, DocumentCollection>>,
    pub reads: AtomicUsize,
    pub counter_reads: AtomicUsize,
    /// Aggregate writes matching this are refused
    reject_updates: Mutex<Option<UpdateFilter>>,
}

impl MemoryStore {
    pub fn insert(&self, collection: DocumentCollection) {
        self.rows.lock().unwrap().insert(collection.id, collection);
    }

    pub fn get(&self, id: Uuid) -> Option<DocumentCollection> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn reject_updates_where(
        &self,
        filter: impl Fn(&DocumentCollection) -> bool + Send + Sync + 'static,
    ) {
        *self.reject_updates.lock().unwrap() = Some(Box::new(filter));
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn read_collection(
        &self,
        filter: &CollectionFilter,
    ) -> PortResult<Option<DocumentCollection>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(filter.id))
    }

    async fn create_collection(&self, collection: &DocumentCollection) -> PortResult<()> {
        self.insert(collection.clone());
        Ok(())
    }

    async fn update_collection(&self, collection: &DocumentCollection) -> PortResult<()> {
        if let Some(reject) = self.reject_updates.lock().unwrap().as_ref() {
            if reject(collection) {
                return Err(PortError::unavailable("store", "write refused"));
            }
        }
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&collection.id) {
            return Err(PortError::rejected("store", "unknown collection"));
        }
        rows.insert(collection.id, collection.clone());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: CollectionStatus) -> PortResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| PortError::rejected("store", "unknown collection"))?;
        row.status = status;
        Ok(())
    }

    async fn read_by_distribution_id(
        &self,
        distribution_id: Uuid,
        statuses: &[CollectionStatus],
    ) -> PortResult<Vec<DocumentCollection>> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<DocumentCollection> = rows
            .values()
            .filter(|c| c.distribution_id == Some(distribution_id))
            .filter(|c| statuses.is_empty() || statuses.contains(&c.status))
            .cloned()
            .collect();
        found.sort_by_key(|c| c.creation_time);
        Ok(found)
    }

    async fn read_distribution_item_counters(
        &self,
        distribution_id: Uuid,
    ) -> PortResult<Option<DistributionCounters>> {
        self.counter_reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        let mut counters = BTreeMap::new();
        let mut group_id = None;
        for c in rows
            .values()
            .filter(|c| c.distribution_id == Some(distribution_id))
        {
            group_id = Some(c.group_id);
            *counters.entry(c.status).or_insert(0) += 1;
        }
        Ok(group_id.map(|group_id| DistributionCounters { group_id, counters }))
    }

    async fn remove_collection(&self, id: Uuid) -> PortResult<()> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// PDF engine
// ============================================================================

#[derive(Default)]
pub struct MemoryPdf {
    pub templates: Mutex<HashMap<Uuid, FieldSet>>,
    pub documents: Mutex<HashMap<Uuid, FieldSet>>,
    /// Fields reported for imported (self-sign) uploads
    pub upload_fields: Mutex<FieldSet>,
    pub signed: Mutex<Vec<(Uuid, SigningInfo)>>,
    pub fail_materialize: AtomicBool,
}

impl MemoryPdf {
    pub fn document(&self, id: Uuid) -> Option<FieldSet> {
        self.documents.lock().unwrap().get(&id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn signatures(&self) -> Vec<(Uuid, SigningInfo)> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfEngine for MemoryPdf {
    async fn materialize(&self, document_id: Uuid, template_id: Uuid) -> PortResult<u32> {
        if self.fail_materialize.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("pdf", "renderer offline"));
        }
        let fields = self
            .templates
            .lock()
            .unwrap()
            .get(&template_id)
            .cloned()
            .ok_or_else(|| PortError::rejected("pdf", "unknown template"))?;
        self.documents.lock().unwrap().insert(document_id, fields);
        Ok(2)
    }

    async fn import_pdf(&self, document_id: Uuid, pdf: Vec<u8>) -> PortResult<u32> {
        if pdf.is_empty() {
            return Err(PortError::rejected("pdf", "empty file"));
        }
        let fields = self.upload_fields.lock().unwrap().clone();
        self.documents.lock().unwrap().insert(document_id, fields);
        Ok(1)
    }

    async fn get_all_fields(&self, source_id: Uuid, range: PageRange) -> PortResult<FieldSet> {
        let fields = self
            .documents
            .lock()
            .unwrap()
            .get(&source_id)
            .cloned()
            .or_else(|| self.templates.lock().unwrap().get(&source_id).cloned())
            .ok_or_else(|| PortError::rejected("pdf", "unknown source"))?;
        Ok(fields.restrict(range))
    }

    async fn write_fields(&self, document_id: Uuid, fields: &FieldSet) -> PortResult<()> {
        self.documents
            .lock()
            .unwrap()
            .insert(document_id, fields.clone());
        Ok(())
    }

    async fn set_all_fields_read_only(&self, document_id: Uuid) -> PortResult<()> {
        if let Some(fields) = self.documents.lock().unwrap().get_mut(&document_id) {
            fields.set_all_read_only();
        }
        Ok(())
    }

    async fn sign(&self, document_id: Uuid, info: &SigningInfo) -> PortResult<()> {
        self.signed.lock().unwrap().push((document_id, info.clone()));
        Ok(())
    }

    async fn read_bytes(&self, document_id: Uuid) -> PortResult<Vec<u8>> {
        if !self.documents.lock().unwrap().contains_key(&document_id) {
            return Err(PortError::rejected("pdf", "unknown document"));
        }
        Ok(format!("%PDF-1.7 {}", document_id).into_bytes())
    }

    async fn delete(&self, document_id: Uuid) -> PortResult<()> {
        self.documents.lock().unwrap().remove(&document_id);
        Ok(())
    }
}

// ============================================================================
// Templates and contacts
// ============================================================================

#[derive(Default)]
pub struct MemoryTemplates {
    pub templates: Mutex<HashMap<Uuid, Template>>,
    pub uses: Mutex<HashMap<Uuid, u32>>,
}

#[async_trait]
impl TemplateCatalog for MemoryTemplates {
    async fn read_template(&self, id: Uuid) -> PortResult<Option<Template>> {
        Ok(self.templates.lock().unwrap().get(&id).cloned())
    }

    async fn increment_use(&self, id: Uuid) -> PortResult<()> {
        *self.uses.lock().unwrap().entry(id).or_insert(0) += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryContacts {
    pub contacts: Mutex<Vec<Contact>>,
}

impl MemoryContacts {
    pub fn all(&self) -> Vec<Contact> {
        self.contacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactRegistry for MemoryContacts {
    async fn read(&self, criteria: &ContactCriteria) -> PortResult<Option<Contact>> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| criteria.matches(c))
            .cloned())
    }

    async fn create(
        &self,
        group_id: Uuid,
        draft: &ContactDraft,
        method: SendingMethod,
    ) -> PortResult<Contact> {
        let contact = Contact {
            id: Uuid::new_v4(),
            group_id,
            name: draft.name.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            default_sending_method: method,
        };
        self.contacts.lock().unwrap().push(contact.clone());
        Ok(contact)
    }

    async fn update(&self, contact: &Contact) -> PortResult<()> {
        let mut contacts = self.contacts.lock().unwrap();
        if let Some(existing) = contacts.iter_mut().find(|c| c.id == contact.id) {
            *existing = contact.clone();
        }
        Ok(())
    }
}

// ============================================================================
// Messaging
// ============================================================================

type SendHook = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<MessageInfo>>,
    pub batches: Mutex<Vec<Vec<MessageInfo>>>,
    pub fail: AtomicBool,
    /// Runs once, inside the next `send`, before the message is recorded
    during_next_send: Mutex<Option<SendHook>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<MessageInfo> {
        self.sent.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<MessageInfo>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn fail_from_now_on(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Lets a test act while a message is on its way out
    pub fn during_next_send(&self, hook: impl Future<Output = ()> + Send + 'static) {
        *self.during_next_send.lock().unwrap() = Some(Box::pin(hook));
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        _app: &AppConfiguration,
        _company: &CompanyConfiguration,
        message: &MessageInfo,
    ) -> PortResult<()> {
        let hook = self.during_next_send.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("messaging", "gateway down"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn send_batch(
        &self,
        _app: &AppConfiguration,
        _company: &CompanyConfiguration,
        messages: &[MessageInfo],
    ) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("messaging", "gateway down"));
        }
        self.batches.lock().unwrap().push(messages.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMessaging {
    pub email: Arc<RecordingSender>,
    pub sms: Arc<RecordingSender>,
    pub tablet: Arc<RecordingSender>,
}

impl MessagingGateway for RecordingMessaging {
    fn sender(&self, channel: SendingMethod) -> Arc<dyn MessageSender> {
        match channel {
            SendingMethod::Email => self.email.clone() as Arc<dyn MessageSender>,
            SendingMethod::Sms => self.sms.clone(),
            SendingMethod::Tablet => self.tablet.clone(),
        }
    }
}

// ============================================================================
// Quota
// ============================================================================

pub struct MemoryQuota {
    pub document_limit: AtomicU32,
    pub documents_used: AtomicU32,
    pub visual_limit: AtomicU32,
    pub visual_used: AtomicU32,
    pub sms_allowed: AtomicBool,
}

impl Default for MemoryQuota {
    fn default() -> Self {
        Self {
            document_limit: AtomicU32::new(100),
            documents_used: AtomicU32::new(0),
            visual_limit: AtomicU32::new(10),
            visual_used: AtomicU32::new(0),
            sms_allowed: AtomicBool::new(true),
        }
    }
}

impl MemoryQuota {
    pub fn documents_used(&self) -> u32 {
        self.documents_used.load(Ordering::SeqCst)
    }

    pub fn visual_used(&self) -> u32 {
        self.visual_used.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuotaService for MemoryQuota {
    async fn can_add_document(&self, _group_id: Uuid, count: u32) -> PortResult<bool> {
        Ok(self.documents_used() + count <= self.document_limit.load(Ordering::SeqCst))
    }

    async fn can_add_sms(&self, _group_id: Uuid, _count: u32) -> PortResult<bool> {
        Ok(self.sms_allowed.load(Ordering::SeqCst))
    }

    async fn can_add_visual_identification(
        &self,
        _group_id: Uuid,
        count: u32,
    ) -> PortResult<bool> {
        Ok(self.visual_used() + count <= self.visual_limit.load(Ordering::SeqCst))
    }

    async fn add_document(&self, _group_id: Uuid, count: u32) -> PortResult<()> {
        self.documents_used.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    async fn add_visual_identification(&self, _group_id: Uuid, count: u32) -> PortResult<()> {
        self.visual_used.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    async fn release_document(&self, _group_id: Uuid, count: u32) -> PortResult<()> {
        self.documents_used.fetch_sub(count, Ordering::SeqCst);
        Ok(())
    }

    async fn release_visual_identification(
        &self,
        _group_id: Uuid,
        count: u32,
    ) -> PortResult<()> {
        self.visual_used.fetch_sub(count, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Tokens, attachments, notifications, back-ends
// ============================================================================

#[derive(Default)]
pub struct MemoryTokens {
    /// (token, collection, signer)
    pub tokens: Mutex<Vec<(String, Uuid, Uuid)>>,
}

impl MemoryTokens {
    pub fn for_collection(&self, collection_id: Uuid) -> usize {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c, _)| *c == collection_id)
            .count()
    }
}

#[async_trait]
impl SignerTokenStore for MemoryTokens {
    async fn put(&self, link: &SignerLink, collection_id: Uuid) -> PortResult<()> {
        self.tokens
            .lock()
            .unwrap()
            .push((link.token.clone(), collection_id, link.signer_id));
        Ok(())
    }

    async fn remove_for_collection(&self, collection_id: Uuid) -> PortResult<()> {
        self.tokens
            .lock()
            .unwrap()
            .retain(|(_, c, _)| *c != collection_id);
        Ok(())
    }

    async fn remove_for_signer(&self, collection_id: Uuid, signer_id: Uuid) -> PortResult<()> {
        self.tokens
            .lock()
            .unwrap()
            .retain(|(_, c, s)| !(*c == collection_id && *s == signer_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAttachments {
    pub files: Mutex<HashMap<Uuid, Vec<Attachment>>>,
}

impl MemoryAttachments {
    pub fn add(&self, collection_id: Uuid, name: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .entry(collection_id)
            .or_default()
            .push(Attachment {
                signer_id: Uuid::new_v4(),
                name: name.to_string(),
                bytes: bytes.to_vec(),
            });
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachments {
    async fn list(&self, collection_id: Uuid) -> PortResult<Vec<Attachment>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&collection_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    pub published: Mutex<Vec<CollectionNotification>>,
}

impl RecordingNotifications {
    pub fn kinds_for(&self, collection_id: Uuid) -> Vec<docsign_workflow::ports::NotificationKind> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.collection_id == collection_id)
            .map(|n| n.kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifications {
    async fn publish(&self, notification: &CollectionNotification) -> PortResult<()> {
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeConverter {
    pub converted: Mutex<Vec<UploadKind>>,
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn to_pdf(&self, kind: UploadKind, _bytes: Vec<u8>) -> PortResult<Vec<u8>> {
        self.converted.lock().unwrap().push(kind);
        Ok(b"%PDF-1.7 converted".to_vec())
    }
}

#[derive(Default)]
pub struct RecordingSplitSigning {
    /// (token, collection, documents)
    pub started: Mutex<Vec<(String, Uuid, Vec<Uuid>)>>,
}

#[async_trait]
impl SplitSigning for RecordingSplitSigning {
    async fn begin(
        &self,
        token: &str,
        collection_id: Uuid,
        document_ids: &[Uuid],
        _signer_name: &str,
    ) -> PortResult<()> {
        self.started
            .lock()
            .unwrap()
            .push((token.to_string(), collection_id, document_ids.to_vec()));
        Ok(())
    }
}

pub struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn authorization_url(
        &self,
        state: &str,
        collection_id: Uuid,
        _caller: &Caller,
    ) -> PortResult<String> {
        Ok(format!(
            "https://id.example.org/authorize?state={}&doc={}",
            state, collection_id
        ))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: WorkflowEngine,
    pub caller: Caller,
    pub store: Arc<MemoryStore>,
    pub pdf: Arc<MemoryPdf>,
    pub templates: Arc<MemoryTemplates>,
    pub contacts: Arc<MemoryContacts>,
    pub messaging: Arc<RecordingMessaging>,
    pub quota: Arc<MemoryQuota>,
    pub tokens: Arc<MemoryTokens>,
    pub attachments: Arc<MemoryAttachments>,
    pub notifications: Arc<RecordingNotifications>,
    pub converter: Arc<FakeConverter>,
    pub split_signing: Arc<RecordingSplitSigning>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn caller_in(group_id: Uuid) -> Caller {
    Caller {
        user_id: Uuid::new_v4(),
        group_id,
        name: "Avery Sender".to_string(),
        email: "avery@example.com".to_string(),
        phone: Some("+15550100".to_string()),
        program_expires_at: None,
        company: CompanyConfiguration {
            company_id: Uuid::new_v4(),
            callback_url: Some("https://acme.example.com/hooks/docsign".to_string()),
            redirect_url: None,
            sms_sender: Some("Acme".to_string()),
            language: "en".to_string(),
        },
    }
}

/// Full name (mandatory text), an agreement checkbox and a graphic signature
pub fn lease_fields() -> FieldSet {
    let mut name = PdfField::new("FullName", FieldKind::Text);
    name.description = "Tenant name".to_string();
    name.mandatory = true;
    let agree = PdfField::new("Agree", FieldKind::CheckBox);
    let mut sig = PdfField::new(
        "Sig1",
        FieldKind::Signature {
            signing_type: SignatureSigningType::Graphic,
        },
    );
    sig.mandatory = true;
    sig.page = 2;
    FieldSet::new(vec![name, agree, sig])
}

pub fn signature_field(name: &str, signing_type: SignatureSigningType) -> PdfField {
    let mut field = PdfField::new(name, FieldKind::Signature { signing_type });
    field.mandatory = true;
    field
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig {
            link_secret: "integration-test-secret".to_string(),
            ..EngineConfig::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::default());
        let pdf = Arc::new(MemoryPdf::default());
        let templates = Arc::new(MemoryTemplates::default());
        let contacts = Arc::new(MemoryContacts::default());
        let messaging = Arc::new(RecordingMessaging::default());
        let quota = Arc::new(MemoryQuota::default());
        let tokens = Arc::new(MemoryTokens::default());
        let attachments = Arc::new(MemoryAttachments::default());
        let notifications = Arc::new(RecordingNotifications::default());
        let converter = Arc::new(FakeConverter::default());
        let split_signing = Arc::new(RecordingSplitSigning::default());

        let ports = Collaborators {
            store: store.clone(),
            pdf: pdf.clone(),
            templates: templates.clone(),
            contacts: contacts.clone(),
            messaging: messaging.clone(),
            quota: quota.clone(),
            links: Arc::new(HmacLinkGenerator::new(
                &config.link_secret,
                Duration::from_secs(3600),
                config.app.clone(),
            )),
            tokens: tokens.clone(),
            attachments: attachments.clone(),
            notifications: notifications.clone(),
            converter: converter.clone(),
            split_signing: split_signing.clone(),
            identity: Arc::new(FakeIdentity),
        };

        Self {
            engine: WorkflowEngine::new(ports, config),
            caller: caller_in(Uuid::new_v4()),
            store,
            pdf,
            templates,
            contacts,
            messaging,
            quota,
            tokens,
            attachments,
            notifications,
            converter,
            split_signing,
        }
    }

    /// Registers a template owned by the harness caller's group
    pub fn template(&self, name: &str, fields: FieldSet) -> Uuid {
        self.template_in(self.caller.group_id, name, fields)
    }

    pub fn template_in(&self, group_id: Uuid, name: &str, fields: FieldSet) -> Uuid {
        let id = Uuid::new_v4();
        self.templates.templates.lock().unwrap().insert(
            id,
            Template {
                id,
                group_id,
                name: name.to_string(),
            },
        );
        self.pdf.templates.lock().unwrap().insert(id, fields);
        id
    }

    /// Stores a contact in the caller's group
    pub fn contact(&self, name: &str, email: Option<&str>, phone: Option<&str>) -> Contact {
        let contact = Contact {
            id: Uuid::new_v4(),
            group_id: self.caller.group_id,
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            default_sending_method: SendingMethod::Email,
        };
        self.contacts.contacts.lock().unwrap().push(contact.clone());
        contact
    }

    pub fn stored(&self, id: Uuid) -> DocumentCollection {
        self.store.get(id).expect("collection should be stored")
    }

    /// Inserts a collection directly, bypassing create
    pub fn seed(
        &self,
        mode: CollectionMode,
        status: CollectionStatus,
        signer_statuses: &[SignerStatus],
    ) -> DocumentCollection {
        let template_id = self.template("seeded", lease_fields());
        let document_id = Uuid::new_v4();
        self.pdf
            .documents
            .lock()
            .unwrap()
            .insert(document_id, lease_fields());

        let signers = signer_statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let contact = self.contact(
                    &format!("Signer {}", i + 1),
                    Some(&format!("signer{}@example.com", i + 1)),
                    None,
                );
                let mut signer =
                    Signer::new(ContactRef::Id { id: contact.id }, SendingMethod::Email);
                signer.id = Uuid::new_v4();
                signer.status = *status;
                signer.sent_at = Some(Utc::now());
                if *status == SignerStatus::Signed {
                    signer.signed_at = Some(Utc::now());
                }
                signer
            })
            .collect();

        let collection = DocumentCollection {
            id: Uuid::new_v4(),
            name: "Seeded lease".to_string(),
            mode,
            status,
            group_id: self.caller.group_id,
            user_id: self.caller.user_id,
            creation_time: Utc::now(),
            signed_time: None,
            callback_url: None,
            redirect_url: None,
            distribution_id: None,
            documents: vec![Document {
                id: document_id,
                template_id,
                name: "Lease".to_string(),
                fields: Vec::new(),
                pages_count: 2,
            }],
            signers,
            notifications: NotificationSettings::default(),
            pending_signing: None,
        };
        self.store.insert(collection.clone());
        collection
    }
}

pub fn new_contact(name: &str, email: Option<&str>, phone: Option<&str>) -> ContactRef {
    ContactRef::New {
        draft: ContactDraft {
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
        },
    }
}

pub fn signer(contact: ContactRef, sending_method: SendingMethod) -> SignerDraft {
    SignerDraft {
        contact,
        sending_method,
        signer_fields: Vec::new(),
        authentication: SignerAuthentication::default(),
    }
}

pub fn draft(mode: CollectionMode, template_id: Uuid, signers: Vec<SignerDraft>) -> CollectionDraft {
    CollectionDraft {
        name: "Lease agreement".to_string(),
        mode,
        documents: vec![DocumentDraft {
            template_id,
            name: None,
        }],
        signers,
        notifications: NotificationSettings::default(),
        callback_url: None,
        redirect_url: None,
    }
}
