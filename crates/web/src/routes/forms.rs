//! Multipart pet submissions.
//!
//! Text fields are collected into a [`PetForm`]; the `avatar` file part is
//! streamed to a scratch file so large images are never buffered in memory.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use petes_pets_core::PetForm;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::pets::discard_upload;

/// Largest accepted multipart body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Name of the file field.
const AVATAR_FIELD: &str = "avatar";

/// A parsed multipart create request.
#[derive(Debug, Default)]
pub struct PetSubmission {
    pub form: PetForm,
    /// Scratch copy of the uploaded avatar, if one was sent
    pub avatar: Option<PathBuf>,
}

impl PetSubmission {
    /// Drop the scratch avatar, if any.
    pub async fn discard_avatar(&mut self) {
        if let Some(path) = self.avatar.take() {
            discard_upload(path).await;
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

/// Read every part of a pet submission.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a malformed body and
/// `AppError::Internal` if the scratch file cannot be written. No scratch
/// file is left behind on error.
pub async fn read_pet_submission(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> Result<PetSubmission, AppError> {
    let mut submission = PetSubmission::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                submission.discard_avatar().await;
                return Err(e.into());
            }
        };

        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        let result = if name == AVATAR_FIELD {
            match stash_avatar(field, upload_dir).await {
                Ok(Some(path)) => {
                    // Last avatar part wins.
                    if let Some(previous) = submission.avatar.replace(path) {
                        discard_upload(previous).await;
                    }
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            field
                .text()
                .await
                .map(|value| submission.form.set(&name, value))
                .map_err(AppError::from)
        };

        if let Err(e) = result {
            submission.discard_avatar().await;
            return Err(e);
        }
    }

    Ok(submission)
}

/// Stream a file part to disk. Returns `None` for an empty file input.
async fn stash_avatar(mut field: Field<'_>, upload_dir: &Path) -> Result<Option<PathBuf>, AppError> {
    if field.file_name().is_none_or(str::is_empty) {
        return Ok(None);
    }

    let path = upload_dir.join(format!("upload-{}", Uuid::new_v4()));
    let written = match write_field(&mut field, &path).await {
        Ok(written) => written,
        Err(e) => {
            discard_upload(path).await;
            return Err(e);
        }
    };

    if written == 0 {
        discard_upload(path).await;
        return Ok(None);
    }

    tracing::debug!(path = %path.display(), bytes = written, "Avatar received");
    Ok(Some(path))
}

async fn write_field(field: &mut Field<'_>, path: &Path) -> Result<u64, AppError> {
    let io_error = |e: std::io::Error| AppError::Internal(format!("failed to store upload: {e}"));

    let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}
