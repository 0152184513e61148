//! Archive upload handling
//!
//! Streams the `zipFile` multipart field into the uploads directory,
//! checking the extension, the zip signature and the size limit as bytes
//! arrive. A rejected upload never leaves a partial file behind.

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::service::submission::StoredUpload;

/// Multipart field carrying the archive
pub const UPLOAD_FIELD: &str = "zipFile";

/// Local file header, and the end-of-central-directory record that starts an
/// empty archive
const ZIP_SIGNATURES: [&[u8; 4]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded or invalid file type.")]
    Missing,

    #[error("Only .zip archives are accepted: {0}")]
    NotZip(String),

    #[error("Archive exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("Failed to store upload at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Store the archive from `multipart` under `uploads_dir`
///
/// Fields other than [`UPLOAD_FIELD`] are skipped.
pub async fn store_upload(
    multipart: &mut Multipart,
    uploads_dir: &Path,
    max_bytes: usize,
) -> Result<StoredUpload, UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or(UploadError::Missing)?;

        if !has_zip_extension(&original_file_name) {
            return Err(UploadError::NotZip(original_file_name));
        }

        let (path, mut file) = create_target(uploads_dir, &original_file_name).await?;

        match write_field(&mut field, &mut file, &original_file_name, max_bytes).await {
            Ok(size) => {
                tracing::debug!(
                    file = %original_file_name,
                    "Stored upload {} ({} bytes)",
                    path.display(),
                    size
                );
                return Ok(StoredUpload {
                    path,
                    original_file_name,
                });
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove partial upload {}: {}", path.display(), rm);
                }
                return Err(match e {
                    UploadError::Io { source, .. } => UploadError::Io { path, source },
                    other => other,
                });
            }
        }
    }

    Err(UploadError::Missing)
}

async fn write_field(
    field: &mut Field<'_>,
    file: &mut File,
    original_file_name: &str,
    max_bytes: usize,
) -> Result<usize, UploadError> {
    let io_err = |source| UploadError::Io {
        path: PathBuf::new(),
        source,
    };

    let mut header: Vec<u8> = Vec::with_capacity(4);
    let mut written = 0usize;

    while let Some(chunk) = field.chunk().await? {
        if header.len() < 4 {
            let take = (4 - header.len()).min(chunk.len());
            header.extend_from_slice(&chunk[..take]);
            if header.len() == 4 && !is_zip_signature(&header) {
                return Err(UploadError::NotZip(original_file_name.to_string()));
            }
        }

        written += chunk.len();
        if written > max_bytes {
            return Err(UploadError::TooLarge { limit: max_bytes });
        }

        file.write_all(&chunk).await.map_err(io_err)?;
    }

    if header.len() < 4 {
        return Err(UploadError::NotZip(original_file_name.to_string()));
    }

    file.flush().await.map_err(io_err)?;
    Ok(written)
}

/// Open a fresh file named `<stem>-<unix millis>.zip`
async fn create_target(
    uploads_dir: &Path,
    original_file_name: &str,
) -> Result<(PathBuf, File), UploadError> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(|source| UploadError::Io {
            path: uploads_dir.to_path_buf(),
            source,
        })?;

    let stem = sanitize_stem(original_file_name);
    let millis = Utc::now().timestamp_millis();

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}-{}.zip", stem, millis)
        } else {
            format!("{}-{}-{}.zip", stem, millis, attempt)
        };
        let path = uploads_dir.join(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                attempt += 1;
            }
            Err(source) => return Err(UploadError::Io { path, source }),
        }
    }
}

fn has_zip_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn is_zip_signature(header: &[u8]) -> bool {
    ZIP_SIGNATURES.iter().any(|sig| header == sig.as_slice())
}

/// File stem reduced to `[A-Za-z0-9._-]`
fn sanitize_stem(file_name: &str) -> String {
    // Client-supplied names may carry directory parts
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = Path::new(base)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
