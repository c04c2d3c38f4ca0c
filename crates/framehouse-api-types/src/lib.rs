//! Request and response bodies for the framehouse HTTP API.
//!
//! Field names follow the wire format (camelCase); every response carries a
//! `success` flag so clients can branch without inspecting the status code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderVideoRequest {
    pub composition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_props: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStillRequest {
    pub composition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_props: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_cache: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResponse {
    pub success: bool,
    pub filename: String,
    pub url: String,
    pub cached: bool,
}

/// Body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSummary {
    pub id: String,
    pub default_props: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionsResponse {
    pub success: bool,
    pub compositions: Vec<CompositionSummary>,
    pub public_file_tree: Vec<FileTreeNode>,
}

/// One node of the public directory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileTreeNode {
    Directory {
        name: String,
        path: String,
        children: Vec<FileTreeNode>,
    },
    File {
        name: String,
        path: String,
        size: u64,
        #[serde(with = "time::serde::rfc3339")]
        modified: OffsetDateTime,
    },
}

impl FileTreeNode {
    pub fn name(&self) -> &str {
        match self {
            FileTreeNode::Directory { name, .. } | FileTreeNode::File { name, .. } => name,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileTreeNode::Directory { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFileType {
    Video,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderFileSummary {
    pub filename: String,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    #[serde(rename = "type")]
    pub file_type: RenderFileType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendersResponse {
    pub success: bool,
    pub files: Vec<RenderFileSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageRequest {
    pub base64_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadImageResponse {
    pub success: bool,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub name: String,
    pub path: String,
    pub url: String,
    pub size: u64,
    pub size_formatted: String,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    pub extension: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetGroups {
    pub videos: Vec<AssetEntry>,
    pub backdrops: Vec<AssetEntry>,
    pub avatars: Vec<AssetEntry>,
    pub other: Vec<AssetEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub files: u64,
    pub bytes: u64,
    pub size: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetUsage {
    pub videos: UsageSummary,
    pub backdrops: UsageSummary,
    pub avatars: UsageSummary,
    pub other: UsageSummary,
    pub total: UsageSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsResponse {
    pub success: bool,
    pub assets: AssetGroups,
    pub usage: AssetUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
