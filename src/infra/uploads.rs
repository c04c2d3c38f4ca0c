//! Content-addressed storage for inline image uploads.

use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use metrics::counter;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

pub(crate) const METRIC_UPLOAD_SAVED: &str = "framehouse_upload_saved_total";

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";
const UPLOAD_PREFIX: &str = "uploaded_";

/// Standard alphabet; trailing `=` padding is optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors that can occur while storing an inline upload.
#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid image payload: {0}")]
    InvalidImagePayload(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UploadStorageError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidImagePayload(reason.into())
    }
}

/// Result of storing an inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub filename: String,
    pub path: PathBuf,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Filesystem-backed upload storage rooted at the public directory.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode a `data:image/<subtype>;base64,<data>` payload and store it under its content hash.
    ///
    /// Identical bytes always map to the same `uploaded_{sha256}.{ext}` file,
    /// which is simply rewritten on repeat uploads.
    pub async fn save_inline_image(&self, payload: &str) -> Result<SavedImage, UploadStorageError> {
        let started_at = Instant::now();
        let (extension, bytes) = decode_data_url(payload)?;

        let checksum = hex::encode(Sha256::digest(&bytes));
        let filename = format!("{UPLOAD_PREFIX}{checksum}.{extension}");
        let path = self.root.join(&filename);

        fs::create_dir_all(&self.root).await?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        counter!(METRIC_UPLOAD_SAVED).increment(1);
        info!(
            target = "infra::uploads",
            op = "uploads::save_inline_image",
            result = "ok",
            filename = %filename,
            size_bytes = bytes.len() as u64,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Inline image stored"
        );

        Ok(SavedImage {
            filename,
            path,
            checksum,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Split a data URL into a file extension and decoded bytes.
fn decode_data_url(payload: &str) -> Result<(String, Vec<u8>), UploadStorageError> {
    let rest = payload
        .trim()
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| UploadStorageError::invalid("expected a data:image/...;base64 URL"))?;
    let (subtype, data) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| UploadStorageError::invalid("missing ;base64, marker"))?;

    let subtype = subtype.trim().to_ascii_lowercase();
    let well_formed = subtype.starts_with(|ch: char| ch.is_ascii_alphanumeric())
        && subtype
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '-'));
    let extension = subtype
        .split('+')
        .next()
        .filter(|_| well_formed)
        .filter(|ext| ext.chars().any(|ch| ch.is_ascii_alphanumeric()))
        .map(|ext| ext.trim_matches(['.', '-']).to_string())
        .ok_or_else(|| UploadStorageError::invalid(format!("unsupported image type `{subtype}`")))?;

    let bytes = PAYLOAD_ENGINE
        .decode(data.trim())
        .map_err(|err| UploadStorageError::invalid(format!("base64 decode failed: {err}")))?;
    if bytes.is_empty() {
        return Err(UploadStorageError::invalid("image payload is empty"));
    }

    Ok((extension, bytes))
}
