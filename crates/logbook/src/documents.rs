//! Content-addressed document store.
//!
//! Bytes are immutable once written. Every file lands under
//! `documents/{property_id}/{document_type}/{filename}` with a sidecar
//! manifest carrying its SHA-256 and size; reads re-hash the bytes and
//! fail loudly on disagreement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum accepted document size (10 MiB).
pub const MAX_DOCUMENT_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Allowed file extensions for document upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "tiff"];

/// Document categories for a property submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    TitleRegister,
    Epc,
    FloorPlan,
    Lease,
    PlanningApproval,
    Other,
}

impl DocumentType {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "title_register" | "title register" => Some(Self::TitleRegister),
            "epc" => Some(Self::Epc),
            "floor_plan" | "floor plan" => Some(Self::FloorPlan),
            "lease" => Some(Self::Lease),
            "planning_approval" | "planning approval" => Some(Self::PlanningApproval),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Directory segment under the property's document tree.
    pub fn dir_segment(&self) -> &'static str {
        match self {
            Self::TitleRegister => "title_register",
            Self::Epc => "epc",
            Self::FloorPlan => "floor_plan",
            Self::Lease => "lease",
            Self::PlanningApproval => "planning_approval",
            Self::Other => "other",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TitleRegister => "TITLE_REGISTER",
            Self::Epc => "EPC",
            Self::FloorPlan => "FLOOR_PLAN",
            Self::Lease => "LEASE",
            Self::PlanningApproval => "PLANNING_APPROVAL",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from document operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("file of {0} bytes exceeds the {MAX_DOCUMENT_SIZE_BYTES} byte limit")]
    FileTooLarge(usize),

    #[error("document content is empty")]
    EmptyFile,

    #[error("stored content no longer matches its recorded hash: {0}")]
    HashMismatchOnRead(String),

    #[error("document not found: {0}")]
    NotFound(Uuid),

    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl DocumentError {
    /// Stable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::FileTooLarge(_) => "FILE_TOO_LARGE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::HashMismatchOnRead(_) => "HASH_MISMATCH_ON_READ",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) | Self::Manifest(_) => "DOCUMENT_STORE_ERROR",
        }
    }
}

/// Stored document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentRecord {
    pub document_id: Uuid,
    pub property_id: String,
    pub document_type: DocumentType,
    pub filename: String,
    pub sha256_hex: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Sidecar manifest written next to each stored file.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    sha256_hex: String,
    size_bytes: u64,
}

/// Filesystem-backed content-addressed document store.
#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    records: RwLock<Vec<DocumentRecord>>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            records: RwLock::new(Vec::new()),
        })
    }

    /// Store a document, validating format and size.
    ///
    /// Replacement uploads create new records; prior records and their
    /// bytes are retained.
    pub fn put(
        &self,
        property_id: &str,
        document_type: DocumentType,
        bytes: &[u8],
        filename: &str,
    ) -> Result<DocumentRecord, DocumentError> {
        if bytes.is_empty() {
            return Err(DocumentError::EmptyFile);
        }
        if bytes.len() > MAX_DOCUMENT_SIZE_BYTES {
            return Err(DocumentError::FileTooLarge(bytes.len()));
        }

        let extension = extension_of(filename)
            .ok_or_else(|| DocumentError::UnsupportedFormat(filename.to_string()))?;
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(DocumentError::UnsupportedFormat(extension));
        }
        // The declared extension and the sniffed magic bytes must agree.
        let sniffed = sniff(bytes).ok_or_else(|| {
            DocumentError::UnsupportedFormat("unrecognised file signature".to_string())
        })?;
        if !sniffed.matches_extension(&extension) {
            return Err(DocumentError::UnsupportedFormat(format!(
                "extension .{extension} does not match {} content",
                sniffed.canonical_extension()
            )));
        }

        let sha256_hex = hash_bytes(bytes);
        let dir = self
            .root
            .join(sanitise_segment(property_id))
            .join(document_type.dir_segment());
        fs::create_dir_all(&dir)?;

        let safe_name = sanitise_filename(filename, &extension);
        let path = unique_path(&dir, &safe_name, &sha256_hex, &extension);
        fs::write(&path, bytes)?;

        let manifest = Manifest {
            sha256_hex: sha256_hex.clone(),
            size_bytes: bytes.len() as u64,
        };
        let manifest_path = sidecar_path(&path);
        fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)?;

        let record = DocumentRecord {
            document_id: Uuid::new_v4(),
            property_id: property_id.to_string(),
            document_type,
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(safe_name),
            sha256_hex,
            size_bytes: bytes.len() as u64,
            content_type: sniffed.content_type().to_string(),
            uploaded_at: Utc::now(),
        };
        tracing::info!(
            property_id,
            document_type = %document_type,
            sha256 = %record.sha256_hex,
            size = record.size_bytes,
            "document stored"
        );
        self.records
            .write()
            .expect("document records lock poisoned")
            .push(record.clone());
        Ok(record)
    }

    /// Read a document back, verifying its content hash.
    pub fn get(&self, document_id: &Uuid) -> Result<Vec<u8>, DocumentError> {
        let record = self
            .record(document_id)
            .ok_or(DocumentError::NotFound(*document_id))?;
        let path = self
            .root
            .join(sanitise_segment(&record.property_id))
            .join(record.document_type.dir_segment())
            .join(&record.filename);
        let bytes = fs::read(&path)?;
        if hash_bytes(&bytes) != record.sha256_hex {
            return Err(DocumentError::HashMismatchOnRead(record.filename.clone()));
        }
        Ok(bytes)
    }

    pub fn record(&self, document_id: &Uuid) -> Option<DocumentRecord> {
        self.records
            .read()
            .expect("document records lock poisoned")
            .iter()
            .find(|r| &r.document_id == document_id)
            .cloned()
    }

    /// All records for a property, oldest first. Replaced documents remain
    /// listed.
    pub fn records_for(&self, property_id: &str) -> Vec<DocumentRecord> {
        self.records
            .read()
            .expect("document records lock poisoned")
            .iter()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn extension_of(filename: &str) -> Option<String> {
    let ext = filename.rsplit('.').next()?;
    if ext == filename || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Keep only the basename with safe characters; path separators and dot
/// segments cannot escape the store.
fn sanitise_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn sanitise_filename(filename: &str, extension: &str) -> String {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = basename
        .strip_suffix(&format!(".{extension}"))
        .or_else(|| {
            // Extension comparison is case-insensitive.
            let idx = basename.rfind('.')?;
            Some(&basename[..idx])
        })
        .unwrap_or(basename);
    format!("{}.{extension}", sanitise_segment(stem))
}

/// Disambiguate name collisions with the short content hash; identical
/// content may reuse its path (bytes are immutable once written).
fn unique_path(dir: &Path, safe_name: &str, sha256_hex: &str, extension: &str) -> PathBuf {
    let direct = dir.join(safe_name);
    if !direct.exists() {
        return direct;
    }
    if let Ok(existing) = fs::read(&direct) {
        if hash_bytes(&existing) == sha256_hex {
            return direct;
        }
    }
    let stem = safe_name
        .strip_suffix(&format!(".{extension}"))
        .unwrap_or(safe_name);
    dir.join(format!("{stem}-{}.{extension}", &sha256_hex[..8]))
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".manifest.json");
    path.with_file_name(name)
}

/// Recognised file signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SniffedFormat {
    Pdf,
    Jpeg,
    Png,
    Tiff,
}

impl SniffedFormat {
    fn matches_extension(&self, extension: &str) -> bool {
        matches!(
            (self, extension),
            (Self::Pdf, "pdf")
                | (Self::Jpeg, "jpg")
                | (Self::Jpeg, "jpeg")
                | (Self::Png, "png")
                | (Self::Tiff, "tiff")
        )
    }

    fn canonical_extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
        }
    }
}

fn sniff(bytes: &[u8]) -> Option<SniffedFormat> {
    if bytes.starts_with(b"%PDF-") {
        return Some(SniffedFormat::Pdf);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SniffedFormat::Jpeg);
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(SniffedFormat::Png);
    }
    if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
        return Some(SniffedFormat::Tiff);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pdf_bytes(payload: &str) -> Vec<u8> {
        format!("%PDF-1.4\n{payload}\n%%EOF").into_bytes()
    }

    fn store() -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("documents")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_get_roundtrip_preserves_hash_and_bytes() {
        let (_guard, store) = store();
        let bytes = pdf_bytes("title register");
        let record = store
            .put("PROP-0011aabbccdd", DocumentType::TitleRegister, &bytes, "title.pdf")
            .unwrap();

        assert_eq!(record.size_bytes, bytes.len() as u64);
        assert_eq!(record.content_type, "application/pdf");
        assert_eq!(record.sha256_hex.len(), 64);

        let read_back = store.get(&record.document_id).unwrap();
        assert_eq!(read_back, bytes);
        assert_eq!(hash_bytes(&read_back), record.sha256_hex);
    }

    #[test]
    fn test_identical_content_has_identical_hash() {
        let (_guard, store) = store();
        let bytes = pdf_bytes("same");
        let a = store
            .put("PROP-0011aabbccdd", DocumentType::Epc, &bytes, "epc-a.pdf")
            .unwrap();
        let b = store
            .put("PROP-99ffeeddccbb", DocumentType::Epc, &bytes, "epc-b.pdf")
            .unwrap();
        assert_eq!(a.sha256_hex, b.sha256_hex);
        assert_ne!(a.document_id, b.document_id);
    }

    #[test]
    fn test_empty_file_rejected() {
        let (_guard, store) = store();
        let err = store
            .put("PROP-0011aabbccdd", DocumentType::Epc, &[], "epc.pdf")
            .unwrap_err();
        assert_eq!(err.code(), "EMPTY_FILE");
    }

    #[test]
    fn test_oversized_file_rejected() {
        let (_guard, store) = store();
        let mut bytes = pdf_bytes("big");
        bytes.resize(MAX_DOCUMENT_SIZE_BYTES + 1, b' ');
        let err = store
            .put("PROP-0011aabbccdd", DocumentType::Epc, &bytes, "epc.pdf")
            .unwrap_err();
        assert_eq!(err.code(), "FILE_TOO_LARGE");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let (_guard, store) = store();
        let err = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::Epc,
                &pdf_bytes("x"),
                "epc.docx",
            )
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_extension_content_mismatch_rejected() {
        let (_guard, store) = store();
        // PDF bytes with a .png name must not pass.
        let err = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::FloorPlan,
                &pdf_bytes("plan"),
                "plan.png",
            )
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_png_magic_accepted() {
        let (_guard, store) = store();
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"fake image data");
        let record = store
            .put("PROP-0011aabbccdd", DocumentType::FloorPlan, &bytes, "plan.png")
            .unwrap();
        assert_eq!(record.content_type, "image/png");
    }

    #[test]
    fn test_layout_and_manifest() {
        let (_guard, store) = store();
        let record = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::TitleRegister,
                &pdf_bytes("t"),
                "title.pdf",
            )
            .unwrap();
        let path = store
            .root()
            .join("PROP-0011aabbccdd")
            .join("title_register")
            .join(&record.filename);
        assert!(path.exists());

        let manifest_path = path.with_file_name(format!("{}.manifest.json", record.filename));
        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["sha256_hex"], record.sha256_hex.as_str());
        assert_eq!(manifest["size_bytes"], record.size_bytes);
    }

    #[test]
    fn test_replacement_keeps_prior_record() {
        let (_guard, store) = store();
        let first = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::FloorPlan,
                &pdf_bytes("v1"),
                "plan.pdf",
            )
            .unwrap();
        let second = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::FloorPlan,
                &pdf_bytes("v2"),
                "plan.pdf",
            )
            .unwrap();

        assert_ne!(first.sha256_hex, second.sha256_hex);
        // Same upload name, different content: disambiguated on disk.
        assert_ne!(first.filename, second.filename);

        let records = store.records_for("PROP-0011aabbccdd");
        assert_eq!(records.len(), 2);
        assert_eq!(store.get(&first.document_id).unwrap(), pdf_bytes("v1"));
        assert_eq!(store.get(&second.document_id).unwrap(), pdf_bytes("v2"));
    }

    #[test]
    fn test_tampered_bytes_fail_on_read() {
        let (_guard, store) = store();
        let record = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::Epc,
                &pdf_bytes("original"),
                "epc.pdf",
            )
            .unwrap();
        let path = store
            .root()
            .join("PROP-0011aabbccdd")
            .join("epc")
            .join(&record.filename);
        fs::write(&path, pdf_bytes("tampered")).unwrap();

        let err = store.get(&record.document_id).unwrap_err();
        assert_eq!(err.code(), "HASH_MISMATCH_ON_READ");
    }

    #[test]
    fn test_path_traversal_is_neutralised() {
        let (_guard, store) = store();
        let record = store
            .put(
                "PROP-0011aabbccdd",
                DocumentType::Other,
                &pdf_bytes("x"),
                "../../escape.pdf",
            )
            .unwrap();
        assert!(!record.filename.contains(".."));
        assert!(!record.filename.contains('/'));
        assert!(store.get(&record.document_id).is_ok());
    }
}
