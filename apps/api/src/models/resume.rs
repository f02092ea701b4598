use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resume file as selected by the user, before upload.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ResumeFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension including the leading dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
    }
}

/// Record returned by the backend once a resume is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// May be empty when the backend stored the file without issuing an id;
    /// extraction is skipped in that case.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, alias = "storage_reference", alias = "url")]
    pub storage_reference: Option<String>,
}

/// Structured resume data. Its shape belongs to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailoredResume {
    #[serde(default, alias = "download_url")]
    pub download_url: Option<String>,
}
