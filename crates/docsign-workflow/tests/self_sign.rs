//! Self-sign: upload, fill, close into a signing back-end

mod common;

use common::{lease_fields, signature_field, Harness};
use docsign_types::{
    CollectionMode, CollectionStatus, FieldKind, FieldSet, PdfField, SignatureSigningType,
    SignerStatus,
};
use docsign_workflow::ports::{NotificationKind, SigningKind, UploadKind};
use docsign_workflow::{
    DocumentFieldValues, FieldValue, SelfSignOperation, SelfSignUpload, SignerAction,
    SigningStarted, WorkflowError,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

fn upload(file_name: &str) -> SelfSignUpload {
    SelfSignUpload {
        file_name: file_name.to_string(),
        bytes: b"file-bytes".to_vec(),
        name: None,
    }
}

fn values(document_id: Uuid, pairs: &[(&str, &str)]) -> Vec<DocumentFieldValues> {
    vec![DocumentFieldValues {
        document_id,
        values: pairs.iter().map(|(n, v)| FieldValue::new(*n, *v)).collect(),
    }]
}

fn with_signature(signing_types: &[SignatureSigningType]) -> FieldSet {
    let mut fields = vec![PdfField::new("Notes", FieldKind::Text)];
    for (i, t) in signing_types.iter().enumerate() {
        fields.push(signature_field(&format!("Sig{}", i + 1), *t));
    }
    FieldSet::new(fields)
}

#[tokio::test]
async fn word_upload_is_converted_and_opened_for_the_caller() {
    let h = Harness::new();

    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("Offer Letter.docx"))
        .await
        .unwrap();

    assert_eq!(*h.converter.converted.lock().unwrap(), vec![UploadKind::Word]);
    assert_eq!(collection.mode, CollectionMode::SelfSign);
    assert_eq!(collection.status, CollectionStatus::Viewed);
    assert_eq!(collection.name, "Offer Letter");
    assert!(collection.documents[0].template_id.is_nil());
    assert_eq!(collection.signers.len(), 1);
    assert_eq!(collection.signers[0].status, SignerStatus::Viewed);

    let me = h.contacts.all();
    assert_eq!(me.len(), 1);
    assert_eq!(me[0].email.as_deref(), Some("avery@example.com"));
    assert_eq!(h.stored(collection.id).status, CollectionStatus::Viewed);
    assert_eq!(h.quota.documents_used(), 1);
}

#[tokio::test]
async fn pdf_upload_skips_conversion() {
    let h = Harness::new();
    h.engine
        .self_sign
        .create(&h.caller, upload("scan.PDF"))
        .await
        .unwrap();
    assert!(h.converter.converted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unusable_uploads_are_rejected() {
    let h = Harness::new();

    let err = h
        .engine
        .self_sign
        .create(&h.caller, upload("archive.zip"))
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::UnsupportedFileType("archive.zip".to_string()));

    let mut empty = upload("lease.pdf");
    empty.bytes.clear();
    let err = h.engine.self_sign.create(&h.caller, empty).await.unwrap_err();
    assert_eq!(err.code(), 180);
    assert_eq!(h.store.len(), 0);
}

#[tokio::test]
async fn save_keeps_values_without_validation() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() = lease_fields();
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();
    let document_id = collection.documents[0].id;

    let outcome = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(document_id, &[("Agree", "on")]),
            SelfSignOperation::Save,
        )
        .await
        .unwrap();

    assert_eq!(outcome.started, None);
    assert_eq!(outcome.collection.status, CollectionStatus::Viewed);
    let fields = h.pdf.document(document_id).unwrap();
    assert_eq!(fields.find("Agree").unwrap().value.as_deref(), Some("true"));
    assert!(!fields.find("Agree").unwrap().read_only);
}

#[tokio::test]
async fn close_requires_mandatory_fields() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() = lease_fields();
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();

    let err = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(collection.documents[0].id, &[("Agree", "yes")]),
            SelfSignOperation::Close,
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        WorkflowError::MandatoryFieldsMissing(vec!["FullName".to_string(), "Sig1".to_string()])
    );
    assert!(h.pdf.signatures().is_empty());
    assert_eq!(h.stored(collection.id).status, CollectionStatus::Viewed);
}

#[tokio::test]
async fn close_with_graphic_signature_signs_locally() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() = lease_fields();
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();
    let document_id = collection.documents[0].id;

    let outcome = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(document_id, &[("FullName", "Avery Sender"), ("Sig1", "data:image/png;base64,AAAA")]),
            SelfSignOperation::Close,
        )
        .await
        .unwrap();

    assert_eq!(outcome.started, Some(SigningStarted::Completed));
    assert_eq!(outcome.collection.status, CollectionStatus::Signed);
    assert_eq!(outcome.collection.signers[0].status, SignerStatus::Signed);

    let signatures = h.pdf.signatures();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].1.kind, SigningKind::Local);
    assert!(h
        .pdf
        .document(document_id)
        .unwrap()
        .fields
        .iter()
        .all(|f| f.read_only));
    assert_eq!(h.stored(collection.id).status, CollectionStatus::Signed);
    assert!(h
        .notifications
        .kinds_for(collection.id)
        .contains(&NotificationKind::DocumentSigned));

    let err = h
        .engine
        .self_sign
        .update(&h.caller, collection.id, Vec::new(), SelfSignOperation::Save)
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::CollectionLocked(CollectionStatus::Signed));
}

#[tokio::test]
async fn smart_card_signature_waits_for_the_card() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() =
        with_signature(&[SignatureSigningType::Graphic, SignatureSigningType::SmartCard]);
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();

    let outcome = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(collection.documents[0].id, &[("Sig1", "ink"), ("Sig2", "card")]),
            SelfSignOperation::Close,
        )
        .await
        .unwrap();

    let token = match outcome.started {
        Some(SigningStarted::AwaitingSmartCard { token }) => token,
        other => panic!("expected smart card flow, got {:?}", other),
    };
    let started = h.split_signing.started.lock().unwrap().clone();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].0, token);
    assert_eq!(started[0].1, collection.id);
    assert_eq!(outcome.collection.status, CollectionStatus::Viewed);
    assert!(h.pdf.signatures().is_empty());
}

#[tokio::test]
async fn close_is_refused_while_a_signature_is_outstanding() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() = with_signature(&[SignatureSigningType::SmartCard]);
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();
    let document_id = collection.documents[0].id;

    let outcome = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(document_id, &[("Sig1", "card")]),
            SelfSignOperation::Close,
        )
        .await
        .unwrap();
    let token = match outcome.started {
        Some(SigningStarted::AwaitingSmartCard { token }) => token,
        other => panic!("expected smart card flow, got {:?}", other),
    };
    let pending = h.stored(collection.id).pending_signing.unwrap();
    assert_eq!(pending.reference, token);

    let err = h
        .engine
        .self_sign
        .update(&h.caller, collection.id, Vec::new(), SelfSignOperation::Close)
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::SigningInProgress(pending.started_at));
    assert_eq!(err.code(), 157);
    assert_eq!(h.split_signing.started.lock().unwrap().len(), 1);

    let signed = h
        .engine
        .workflow
        .record_signer_action(
            &h.caller.company,
            collection.id,
            collection.signers[0].id,
            SignerAction::Signed,
        )
        .await
        .unwrap();
    assert_eq!(signed.status, CollectionStatus::Signed);
    assert_eq!(h.stored(collection.id).pending_signing, None);
}

#[tokio::test]
async fn server_signature_redirects_to_identity_provider() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() = with_signature(&[SignatureSigningType::Server]);
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();

    let outcome = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(collection.documents[0].id, &[("Sig1", "remote")]),
            SelfSignOperation::Close,
        )
        .await
        .unwrap();

    match outcome.started {
        Some(SigningStarted::Redirect { url, state }) => {
            assert!(url.starts_with(&format!(
                "https://id.example.org/authorize?state={}",
                state
            )));
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn mixed_smart_card_and_server_fields_are_refused() {
    let h = Harness::new();
    *h.pdf.upload_fields.lock().unwrap() =
        with_signature(&[SignatureSigningType::SmartCard, SignatureSigningType::Server]);
    let collection = h
        .engine
        .self_sign
        .create(&h.caller, upload("lease.pdf"))
        .await
        .unwrap();
    let document_id = collection.documents[0].id;

    let err = h
        .engine
        .self_sign
        .update(
            &h.caller,
            collection.id,
            values(document_id, &[("Sig1", "card"), ("Sig2", "remote")]),
            SelfSignOperation::Close,
        )
        .await
        .unwrap_err();

    assert_eq!(err, WorkflowError::MixedSigningTypes);
    assert!(h.split_signing.started.lock().unwrap().is_empty());
    assert!(h
        .pdf
        .document(document_id)
        .unwrap()
        .fields
        .iter()
        .all(|f| !f.read_only));
}

#[tokio::test]
async fn group_collections_are_not_self_signable() {
    let h = Harness::new();
    let seeded = h.seed(CollectionMode::GroupSign, CollectionStatus::Viewed, &[SignerStatus::Viewed]);

    let err = h
        .engine
        .self_sign
        .update(&h.caller, seeded.id, Vec::new(), SelfSignOperation::Close)
        .await
        .unwrap_err();
    assert_eq!(err.code(), 180);
}
