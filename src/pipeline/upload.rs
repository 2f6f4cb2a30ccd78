//! Upload gate: accept one file, check it, stage it on disk.
//!
//! The file is streamed chunk by chunk into a temp file inside the upload
//! directory, so the size ceiling is enforced without buffering the whole
//! body in memory. The staged file is a [`tempfile::TempPath`]: it is removed
//! when [`UploadedFile::discard`] is called, and again (as a fallback) when
//! the value is dropped.

use crate::error::TimetableError;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Multipart field that carries the document.
pub const FILE_FIELD: &str = "file";

/// File types accepted by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedMime {
    Pdf,
    Docx,
    Png,
    Jpeg,
    /// Non-standard `image/jpg`, sent by some clients.
    Jpg,
}

impl SupportedMime {
    pub const ALL: [SupportedMime; 5] = [
        SupportedMime::Pdf,
        SupportedMime::Docx,
        SupportedMime::Png,
        SupportedMime::Jpeg,
        SupportedMime::Jpg,
    ];

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == mime)
    }

    /// Guess from a file extension (used for local files, which carry no MIME type).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SupportedMime::Pdf),
            "docx" => Some(SupportedMime::Docx),
            "png" => Some(SupportedMime::Png),
            "jpeg" | "jpg" => Some(SupportedMime::Jpeg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedMime::Pdf => "application/pdf",
            SupportedMime::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            SupportedMime::Png => "image/png",
            SupportedMime::Jpeg => "image/jpeg",
            SupportedMime::Jpg => "image/jpg",
        }
    }
}

/// Limits applied by the gate.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub upload_dir: PathBuf,
    pub max_bytes: u64,
}

/// A staged upload, owned by one request.
#[derive(Debug)]
pub struct UploadedFile {
    storage_path: TempPath,
    mime: SupportedMime,
    original_name: String,
    size_bytes: u64,
}

impl UploadedFile {
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime.as_str()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Delete the staged file. Failures are logged and otherwise ignored.
    pub fn discard(self) {
        let path = self.storage_path.to_path_buf();
        match self.storage_path.close() {
            Ok(()) => debug!("Removed staged upload {}", path.display()),
            Err(e) => debug!("Ignoring cleanup failure for {}: {}", path.display(), e),
        }
    }
}

/// Incremental writer for one staged upload.
///
/// Writing past `max_bytes` fails with [`TimetableError::FileTooLarge`]; the
/// partial file is removed when the sink is dropped.
pub struct UploadSink {
    file: File,
    path: TempPath,
    written: u64,
    max_bytes: u64,
}

impl UploadSink {
    /// Create the upload directory if needed and open a fresh temp file in it.
    pub async fn create(limits: &UploadLimits) -> Result<Self, TimetableError> {
        let dir = limits.upload_dir.clone();
        let io_err = |source| TimetableError::Io {
            path: limits.upload_dir.clone(),
            source,
        };
        let named = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            tempfile::Builder::new().prefix("upload-").tempfile_in(&dir)
        })
        .await
        .map_err(|e| io_err(std::io::Error::other(e)))?
        .map_err(io_err)?;

        let (file, path) = named.into_parts();
        Ok(Self {
            file: File::from_std(file),
            path,
            written: 0,
            max_bytes: limits.max_bytes,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TimetableError> {
        self.written += chunk.len() as u64;
        if self.written > self.max_bytes {
            return Err(TimetableError::FileTooLarge {
                limit_bytes: self.max_bytes,
            });
        }
        self.file
            .write_all(chunk)
            .await
            .map_err(|source| TimetableError::Io {
                path: self.path.to_path_buf(),
                source,
            })
    }

    pub async fn finish(
        mut self,
        original_name: String,
        mime: SupportedMime,
    ) -> Result<UploadedFile, TimetableError> {
        self.file
            .flush()
            .await
            .map_err(|source| TimetableError::Io {
                path: self.path.to_path_buf(),
                source,
            })?;
        Ok(UploadedFile {
            storage_path: self.path,
            mime,
            original_name,
            size_bytes: self.written,
        })
    }
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> TimetableError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        TimetableError::FileTooLarge {
            limit_bytes: max_bytes,
        }
    } else {
        TimetableError::MalformedUpload(e.body_text())
    }
}

/// Read the `file` part of `multipart`, validate it and stage it on disk.
///
/// Parts with other names are skipped. No remote call happens here, so a
/// rejected upload never reaches OCR.
pub async fn receive_upload(
    multipart: &mut Multipart,
    limits: &UploadLimits,
) -> Result<UploadedFile, TimetableError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limits.max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        return stage_field(field, limits).await;
    }
    Err(TimetableError::MissingFile)
}

async fn stage_field(mut field: Field<'_>, limits: &UploadLimits) -> Result<UploadedFile, TimetableError> {
    let declared = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let mime = SupportedMime::from_mime(&declared)
        .ok_or(TimetableError::UnsupportedType { mime_type: declared })?;
    let original_name = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or("upload")
        .to_string();

    let mut sink = UploadSink::create(limits).await?;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, limits.max_bytes))?
    {
        sink.write_chunk(&chunk).await?;
    }
    let upload = sink.finish(original_name, mime).await?;

    debug!(
        "Staged '{}' ({}, {} bytes) at {}",
        upload.original_name,
        upload.mime_type(),
        upload.size_bytes,
        upload.path().display()
    );
    Ok(upload)
}
