// Workspace data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored source file record as serialized by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: i64,
    /// Owning user id; read-only on the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
    pub name: String,
    pub c_code: String,
    pub rust_code: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating a file record
#[derive(Debug, Clone, Serialize)]
pub struct NewFile {
    pub name: String,
    pub c_code: String,
    pub rust_code: String,
}

/// Body of a transpilation request
#[derive(Debug, Serialize)]
pub struct TranspileRequest {
    pub code: String,
}

/// Transpilation result
#[derive(Debug, Deserialize)]
pub struct TranspileResponse {
    pub rust_code: String,
}
