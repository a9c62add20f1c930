//! Case evidence file schema
//!
//! Metadata for uploaded evidence; the bytes themselves live on disk under
//! the configured upload directory. `storage_path` is server-private and is
//! never serialized to clients.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for case files
pub const CASE_FILE_COLLECTION: &str = "case_files";

/// Evidence file attached to a case
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CaseFileDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning case
    pub case_id: ObjectId,

    /// Original file name as supplied by the uploader
    pub file_name: String,

    /// Size in bytes
    pub size: u64,

    /// Declared MIME type
    pub mime_type: String,

    /// Path on local disk; server-internal
    pub storage_path: String,

    /// Uploading principal
    pub uploaded_by: ObjectId,

    /// Upload time
    pub uploaded_at: DateTime,
}

impl CaseFileDoc {
    pub fn new(
        case_id: ObjectId,
        file_name: String,
        size: u64,
        mime_type: String,
        storage_path: String,
        uploaded_by: ObjectId,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            case_id,
            file_name,
            size,
            mime_type,
            storage_path,
            uploaded_by,
            uploaded_at: DateTime::now(),
        }
    }
}

// `bson::DateTime` carries no Default; the typed collection wrapper needs
// one, so it is written out with a current timestamp.
impl Default for CaseFileDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            case_id: ObjectId::new(),
            file_name: String::new(),
            size: 0,
            mime_type: String::new(),
            storage_path: String::new(),
            uploaded_by: ObjectId::new(),
            uploaded_at: DateTime::now(),
        }
    }
}

impl IntoIndexes for CaseFileDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "case_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("case_file_case_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CaseFileDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_produces_empty_record() {
        let file = CaseFileDoc::default();
        assert!(file._id.is_none());
        assert!(file.file_name.is_empty());
        assert_eq!(file.size, 0);
        assert!(file.storage_path.is_empty());
    }

    #[test]
    fn test_new_stamps_upload_time() {
        let before = DateTime::now();
        let file = CaseFileDoc::new(
            ObjectId::new(),
            "invoice.pdf".into(),
            1024,
            "application/pdf".into(),
            "/var/uploads/abc/invoice.pdf".into(),
            ObjectId::new(),
        );
        assert!(file.uploaded_at >= before);
        assert_eq!(file.file_name, "invoice.pdf");
    }
}
