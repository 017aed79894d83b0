//! Avatar uploads: derive resized versions of a source image and store them.
//!
//! Every version of one upload shares a key stem and differs only in its
//! suffix, e.g. `pets/avatar/<uuid>-standard.jpg` and
//! `pets/avatar/<uuid>-square.jpg`. Stripping the suffix from any returned
//! URL yields the canonical avatar URL saved on the pet.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use super::storage::ObjectStorage;

/// Errors that can occur while uploading an avatar.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The local file could not be read.
    #[error("failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not an image we can decode.
    #[error("uploaded file is not a supported image: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP request to storage failed.
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage returned an error response.
    #[error("storage rejected upload: {status} - {message}")]
    Storage { status: u16, message: String },

    /// The storage request could not be signed.
    #[error("could not sign storage request: {0}")]
    Signing(String),

    /// The resize task did not complete.
    #[error("image processing failed: {0}")]
    Processing(String),
}

/// One derived size of an uploaded avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageVersion {
    pub suffix: &'static str,
    pub max_width: u32,
    /// Width:height ratio the source is center-cropped to.
    pub aspect: (u32, u32),
}

/// Versions produced for every pet avatar.
pub const AVATAR_VERSIONS: [ImageVersion; 2] = [
    ImageVersion {
        suffix: "-standard",
        max_width: 400,
        aspect: (16, 10),
    },
    ImageVersion {
        suffix: "-square",
        max_width: 300,
        aspect: (1, 1),
    },
];

/// A stored version of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedImage {
    pub url: String,
    pub suffix: String,
    pub width: u32,
    pub height: u32,
}

/// Encoded bytes for one version, before storage.
#[derive(Debug)]
pub struct RenderedVersion {
    pub version: ImageVersion,
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

/// Recover the version-independent URL by removing the trailing `-suffix`.
///
/// Returns `None` when the last path segment carries no suffix.
#[must_use]
pub fn canonical_url(url: &str) -> Option<String> {
    let (base, suffix) = url.rsplit_once('-')?;
    if suffix.contains('/') || base.ends_with('/') {
        return None;
    }
    Some(base.to_owned())
}

/// Resizes avatars and writes them to object storage.
#[derive(Clone)]
pub struct AvatarUploader {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
    versions: Vec<ImageVersion>,
}

impl AvatarUploader {
    /// Create an uploader that stores objects under `prefix`.
    #[must_use]
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            versions: AVATAR_VERSIONS.to_vec(),
        }
    }

    /// Upload a local image file as a set of derived versions.
    ///
    /// The local file is removed afterwards whether or not the upload succeeded.
    ///
    /// # Errors
    ///
    /// Returns `UploadError` if the file cannot be read or decoded, or if
    /// storage rejects any version.
    #[instrument(skip(self))]
    pub async fn upload(&self, local: &Path) -> Result<Vec<DerivedImage>, UploadError> {
        let result = self.store_versions(local).await;

        if let Err(e) = tokio::fs::remove_file(local).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %local.display(), error = %e, "Failed to remove uploaded file");
        }

        match &result {
            Ok(images) => tracing::info!(versions = images.len(), "Avatar uploaded"),
            Err(e) => tracing::warn!(error = %e, "Avatar upload failed"),
        }
        result
    }

    async fn store_versions(&self, local: &Path) -> Result<Vec<DerivedImage>, UploadError> {
        let source = tokio::fs::read(local).await?;
        let versions = self.versions.clone();

        let rendered = tokio::task::spawn_blocking(move || render_versions(&source, &versions))
            .await
            .map_err(|e| UploadError::Processing(e.to_string()))??;

        let stem = Uuid::new_v4();
        let mut derived = Vec::with_capacity(rendered.len());
        for image in rendered {
            let key = format!("{}/{stem}{}.jpg", self.prefix, image.version.suffix);
            let url = self
                .storage
                .put_object(&key, image.jpeg, "image/jpeg")
                .await?;
            derived.push(DerivedImage {
                url,
                suffix: image.version.suffix.to_owned(),
                width: image.width,
                height: image.height,
            });
        }
        Ok(derived)
    }
}

/// Decode `source` and produce one JPEG per version.
///
/// # Errors
///
/// Returns `UploadError::Image` if the bytes cannot be decoded or encoded.
pub fn render_versions(
    source: &[u8],
    versions: &[ImageVersion],
) -> Result<Vec<RenderedVersion>, UploadError> {
    let image = image::load_from_memory(source)?;
    versions.iter().map(|v| render_version(&image, *v)).collect()
}

fn render_version(image: &DynamicImage, version: ImageVersion) -> Result<RenderedVersion, UploadError> {
    let (aspect_w, aspect_h) = (u64::from(version.aspect.0), u64::from(version.aspect.1));
    let (width, height) = (u64::from(image.width()), u64::from(image.height()));

    // Center-crop to the target aspect ratio
    let (crop_w, crop_h) = if width * aspect_h > height * aspect_w {
        (height * aspect_w / aspect_h, height)
    } else {
        (width, width * aspect_h / aspect_w)
    };
    let (crop_w, crop_h) = (clamp_dimension(crop_w), clamp_dimension(crop_h));
    let x = (image.width() - crop_w) / 2;
    let y = (image.height() - crop_h) / 2;
    let mut output = image.crop_imm(x, y, crop_w, crop_h);

    // Downscale only
    if crop_w > version.max_width {
        let target_h = clamp_dimension(u64::from(version.max_width) * aspect_h / aspect_w);
        output = output.resize_exact(version.max_width, target_h, FilterType::Lanczos3);
    }

    let rgb = DynamicImage::ImageRgb8(output.to_rgb8());
    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;

    Ok(RenderedVersion {
        version,
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
    })
}

fn clamp_dimension(value: u64) -> u32 {
    u32::try_from(value.max(1)).unwrap_or(u32::MAX)
}
