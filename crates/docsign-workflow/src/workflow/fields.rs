//! Field values: writing them into documents and exporting them

use std::collections::BTreeSet;

use docsign_types::{Caller, Document, DocumentCollection, FieldSet, PageRange, SignerField};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::DocumentWorkflow;
use crate::error::{WorkflowError, WorkflowResult};

/// A value for one field, addressed by name or description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFieldValues {
    pub document_id: Uuid,
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedField {
    pub document_id: Uuid,
    pub document_name: String,
    pub name: String,
    pub description: String,
    pub kind: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportedFields {
    pub collection_id: Uuid,
    pub fields: Vec<ExportedField>,
}

impl ExportedFields {
    /// One row per field, RFC 4180 quoting
    pub fn to_csv(&self) -> String {
        let mut out = String::from("document,field,description,type,value\r\n");
        for f in &self.fields {
            let row = [
                f.document_name.as_str(),
                f.name.as_str(),
                f.description.as_str(),
                f.kind.as_str(),
                f.value.as_deref().unwrap_or(""),
            ];
            let cells: Vec<String> = row.iter().map(|c| csv_cell(c)).collect();
            out.push_str(&cells.join(","));
            out.push_str("\r\n");
        }
        out
    }
}

/// Keeps the collection's copy of a field value in step with the PDF
fn record_value(document: &mut Document, name: String, value: Option<String>) {
    let template_id = document.template_id;
    match document
        .fields
        .iter_mut()
        .find(|f| f.field_name.eq_ignore_ascii_case(&name))
    {
        Some(existing) => existing.field_value = value,
        None => document.fields.push(SignerField {
            template_id,
            field_name: name,
            field_value: value,
        }),
    }
}

fn csv_cell(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl DocumentWorkflow {
    /// Applies `values` to the document's live fields and writes them back
    ///
    /// Every value is checked before anything is written; an unknown name
    /// fails the whole call.
    pub(crate) async fn write_values(
        &self,
        document_id: Uuid,
        values: &[FieldValue],
        read_only: bool,
    ) -> WorkflowResult<FieldSet> {
        let mut fields = self
            .ports
            .pdf
            .get_all_fields(document_id, PageRange::All)
            .await?;
        for v in values {
            let field = fields
                .find_mut(&v.name)
                .ok_or_else(|| WorkflowError::FieldNotFound(v.name.clone()))?;
            field.set_value(&v.value)?;
            if read_only {
                field.read_only = true;
            }
        }
        self.ports.pdf.write_fields(document_id, &fields).await?;
        debug!(document_id = %document_id, values = values.len(), read_only, "Fields written");
        Ok(fields)
    }

    /// Merges signer-supplied values into the collection's PDFs
    #[instrument(skip(self, caller, updates), fields(user_id = %caller.user_id))]
    pub async fn update_fields(
        &self,
        caller: &Caller,
        id: Uuid,
        updates: Vec<DocumentFieldValues>,
        increment_template_use: bool,
    ) -> WorkflowResult<DocumentCollection> {
        let collection = self.read(caller, id).await?;
        if collection.status.is_terminal() {
            return Err(WorkflowError::CollectionLocked(collection.status));
        }

        let mut written_values: Vec<(Uuid, String, Option<String>)> = Vec::new();
        for update in &updates {
            if !collection.documents.iter().any(|d| d.id == update.document_id) {
                return Err(WorkflowError::InvalidInput(format!(
                    "document {} is not part of collection {}",
                    update.document_id, id
                )));
            }
            let written = self
                .write_values(update.document_id, &update.values, false)
                .await?;
            for v in &update.values {
                let (name, value) = match written.find(&v.name) {
                    Some(field) => (field.name.clone(), field.value.clone()),
                    None => (v.name.clone(), Some(v.value.clone())),
                };
                written_values.push((update.document_id, name, value));
            }
        }

        let (collection, ()) = self
            .commit(id, |stored| {
                if stored.status.is_terminal() {
                    return Err(WorkflowError::CollectionLocked(stored.status));
                }
                for (document_id, name, value) in written_values {
                    if let Some(document) = stored.documents.iter_mut().find(|d| d.id == document_id) {
                        record_value(document, name, value);
                    }
                }
                Ok(())
            })
            .await?;

        if increment_template_use {
            let templates: BTreeSet<Uuid> = collection
                .documents
                .iter()
                .filter(|d| updates.iter().any(|u| u.document_id == d.id))
                .map(|d| d.template_id)
                .filter(|t| !t.is_nil())
                .collect();
            for template_id in templates {
                if let Err(e) = self.ports.templates.increment_use(template_id).await {
                    warn!(template_id = %template_id, error = %e, "Failed to increment template use");
                }
            }
        }

        Ok(collection)
    }

    /// Live fields of one document of a collection
    pub async fn document_fields(
        &self,
        caller: &Caller,
        id: Uuid,
        document_id: Uuid,
        range: PageRange,
    ) -> WorkflowResult<FieldSet> {
        let collection = self.read(caller, id).await?;
        if !collection.documents.iter().any(|d| d.id == document_id) {
            return Err(WorkflowError::InvalidInput(format!(
                "document {} is not part of collection {}",
                document_id, id
            )));
        }
        let fields = self.ports.pdf.get_all_fields(document_id, range).await?;
        Ok(fields.restrict(range))
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn export_fields(&self, caller: &Caller, id: Uuid) -> WorkflowResult<ExportedFields> {
        let collection = self.read(caller, id).await?;
        let mut exported = ExportedFields {
            collection_id: collection.id,
            fields: Vec::new(),
        };
        for document in &collection.documents {
            let fields = self
                .ports
                .pdf
                .get_all_fields(document.id, PageRange::All)
                .await?;
            exported
                .fields
                .extend(fields.fields.into_iter().map(|f| ExportedField {
                    document_id: document.id,
                    document_name: document.name.clone(),
                    kind: f.kind.label().to_string(),
                    name: f.name,
                    description: f.description,
                    value: f.value,
                }));
        }
        Ok(exported)
    }
}
