//! Signed document download, single and multi-select

use std::collections::HashSet;
use std::io::{Cursor, Write};

use docsign_types::{Caller, DocumentCollection};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::DocumentWorkflow;
use crate::batch::BatchReport;
use crate::error::{WorkflowError, WorkflowResult};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Result of a multi-select download
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadBatch {
    /// `None` when every selected collection was skipped
    pub file: Option<DownloadedFile>,
    pub report: BatchReport,
}

/// One file headed for the response
struct Entry {
    name: String,
    bytes: Vec<u8>,
}

impl DocumentWorkflow {
    /// Raw PDF for a one-document collection, a zip otherwise
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn download(&self, caller: &Caller, id: Uuid) -> WorkflowResult<DownloadedFile> {
        let collection = self.downloadable(caller, id).await?;
        let entries = self.collect_entries(&collection).await?;
        pack(entries, &collection.name)
    }

    /// Downloads every selected collection it can; the rest are skipped
    #[instrument(skip(self, caller, ids), fields(user_id = %caller.user_id, count = ids.len()))]
    pub async fn download_all_selected(&self, caller: &Caller, ids: &[Uuid]) -> DownloadBatch {
        let mut report = BatchReport::default();
        let mut per_collection: Vec<(DocumentCollection, Vec<Entry>)> = Vec::new();

        for &id in ids {
            let loaded = async {
                let collection = self.downloadable(caller, id).await?;
                let entries = self.collect_entries(&collection).await?;
                Ok::<_, WorkflowError>((collection, entries))
            }
            .await;
            match loaded {
                Ok(item) => {
                    report.record_success(id);
                    per_collection.push(item);
                }
                Err(e) => report.record_failure("download", id, &e),
            }
        }

        let file = match per_collection.len() {
            0 => None,
            1 => {
                let (collection, entries) = per_collection.remove(0);
                Some(pack(entries, &collection.name))
            }
            _ => {
                let mut folders = HashSet::new();
                let mut entries = Vec::new();
                for (collection, files) in per_collection {
                    let folder = unique_name(&mut folders, &sanitize(&collection.name));
                    entries.extend(files.into_iter().map(|e| Entry {
                        name: format!("{}/{}", folder, e.name),
                        bytes: e.bytes,
                    }));
                }
                Some(zip_entries(entries, "documents"))
            }
        };

        let file = match file.transpose() {
            Ok(file) => file,
            Err(e) => {
                // Packing failed after every item loaded; nothing to return
                for id in std::mem::take(&mut report.succeeded) {
                    report.record_failure("download", id, &e);
                }
                None
            }
        };
        DownloadBatch { file, report }
    }

    async fn downloadable(&self, caller: &Caller, id: Uuid) -> WorkflowResult<DocumentCollection> {
        let collection = self.read(caller, id).await?;
        if !collection.status.is_signed() {
            return Err(WorkflowError::DocumentNotSigned);
        }
        Ok(collection)
    }

    async fn collect_entries(&self, collection: &DocumentCollection) -> WorkflowResult<Vec<Entry>> {
        let mut names = HashSet::new();
        let mut entries = Vec::with_capacity(collection.documents.len());
        for document in &collection.documents {
            let bytes = self.ports.pdf.read_bytes(document.id).await?;
            let base = sanitize(&document.name);
            let base = base.strip_suffix(".pdf").unwrap_or(&base).to_string();
            entries.push(Entry {
                name: unique_name(&mut names, &format!("{}.pdf", base)),
                bytes,
            });
        }

        let attachments = self.ports.attachments.list(collection.id).await?;
        for attachment in attachments {
            let name = unique_name(&mut names, &format!("attachments/{}", sanitize(&attachment.name)));
            entries.push(Entry {
                name,
                bytes: attachment.bytes,
            });
        }
        debug!(collection_id = %collection.id, files = entries.len(), "Collected download entries");
        Ok(entries)
    }
}

fn pack(mut entries: Vec<Entry>, archive_name: &str) -> WorkflowResult<DownloadedFile> {
    if entries.len() == 1 && entries[0].name.ends_with(".pdf") {
        let entry = entries.remove(0);
        return Ok(DownloadedFile {
            file_name: entry.name,
            content_type: PDF_CONTENT_TYPE.to_string(),
            bytes: entry.bytes,
        });
    }
    zip_entries(entries, archive_name)
}

fn zip_entries(entries: Vec<Entry>, archive_name: &str) -> WorkflowResult<DownloadedFile> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        zip.start_file(entry.name, options).map_err(archive_error)?;
        zip.write_all(&entry.bytes).map_err(archive_error)?;
    }
    let bytes = zip.finish().map_err(archive_error)?.into_inner();

    Ok(DownloadedFile {
        file_name: format!("{}.zip", sanitize(archive_name)),
        content_type: ZIP_CONTENT_TYPE.to_string(),
        bytes,
    })
}

fn archive_error(e: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::Archive(e.to_string())
}

/// Path separators and control characters become `_`
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// `name`, or `name (n)` before the extension when already taken
fn unique_name(taken: &mut HashSet<String>, name: &str) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => (stem, format!(".{}", ext)),
        _ => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry(name: &str, bytes: &[u8]) -> Entry {
        Entry {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn single_pdf_is_returned_raw() {
        let file = pack(vec![entry("lease.pdf", b"%PDF-1.7")], "lease").unwrap();
        assert_eq!(file.content_type, PDF_CONTENT_TYPE);
        assert_eq!(file.file_name, "lease.pdf");
        assert_eq!(file.bytes, b"%PDF-1.7");
    }

    #[test]
    fn several_files_are_zipped() {
        let file = pack(
            vec![entry("a.pdf", b"one"), entry("attachments/id.png", b"two")],
            "lease/2024",
        )
        .unwrap();
        assert_eq!(file.content_type, ZIP_CONTENT_TYPE);
        assert_eq!(file.file_name, "lease_2024.zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(file.bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("attachments/id.png")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "two");
    }

    #[test]
    fn duplicate_names_get_a_counter() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name(&mut taken, "nda.pdf"), "nda.pdf");
        assert_eq!(unique_name(&mut taken, "nda.pdf"), "nda (2).pdf");
        assert_eq!(unique_name(&mut taken, "nda.pdf"), "nda (3).pdf");
        assert_eq!(unique_name(&mut taken, "readme"), "readme");
        assert_eq!(unique_name(&mut taken, "readme"), "readme (2)");
    }
}
