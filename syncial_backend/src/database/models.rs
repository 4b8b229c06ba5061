use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub content_id: String,
    pub backend: String,
    pub file_name: Option<String>,
    pub mime: Option<String>,
    pub size_bytes: i64,
    pub uploaded_at: String,
}
