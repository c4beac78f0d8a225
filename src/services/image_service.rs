//! Image assets tied to catalog records.
//!
//! An `ImageService` owns one bucket and a path prefix inside it. Uploads are
//! checked against a small allowlist of image types and a size cap before they
//! reach the store. Deletes are soft: a failure is reported in the returned
//! [`DeleteOutcome`] and logged, never raised, so a missing or stuck object
//! does not block the record mutation that triggered it.

use crate::{
    errors::{ShopError, ShopResult},
    services::storage_service::{ObjectStore, StorageError},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Upload size cap.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const PRODUCT_BUCKET: &str = "product-images";
pub const PRODUCT_PREFIX: &str = "products/";
pub const HERO_BUCKET: &str = "hero-images";
pub const HERO_PREFIX: &str = "banners/";

/// Accepted MIME types and the extension each is stored under.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Raw image payload awaiting upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub content_type: String,
    /// Extension of the client's file name, without the dot.
    pub extension: Option<String>,
}

impl ImageUpload {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            extension: None,
        }
    }

    /// Build an upload from a multipart file part. A missing content type is
    /// inferred from the file name.
    pub fn from_file(bytes: Bytes, content_type: Option<&str>, file_name: Option<&str>) -> Self {
        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty());
        let content_type = match content_type {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
            _ => file_name
                .map(crate::services::storage_service::content_type_for_path)
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        Self {
            bytes,
            content_type,
            extension,
        }
    }

    /// Decode a `data:image/<type>;base64,<payload>` URL.
    pub fn from_data_url(data_url: &str) -> ShopResult<Self> {
        let invalid = || ShopError::Upload("Invalid image data: expected a base64 data URL".into());

        let rest = data_url.trim().strip_prefix("data:").ok_or_else(invalid)?;
        let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
        let content_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
        if content_type.is_empty() {
            return Err(invalid());
        }

        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|_| invalid())?;
        Ok(Self::new(bytes, content_type.to_ascii_lowercase()))
    }
}

/// Where an uploaded image landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub file_name: String,
    pub file_path: String,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DeleteOutcome {
    fn deleted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }

    /// Warning text for callers that surface failed cleanups.
    pub fn warning(&self, what: &str) -> Option<String> {
        if self.success {
            return None;
        }
        Some(match &self.reason {
            Some(reason) => format!("{what} could not be deleted: {reason}"),
            None => format!("{what} could not be deleted"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub stored: StoredImage,
    pub warning: Option<String>,
}

/// Uploads, replaces and deletes images inside one bucket.
#[derive(Clone)]
pub struct ImageService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
}

impl ImageService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn products(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, PRODUCT_BUCKET, PRODUCT_PREFIX)
    }

    pub fn hero(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, HERO_BUCKET, HERO_PREFIX)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Storage path of a public URL in this bucket: everything after the
    /// `/{bucket}/` segment, without query string or fragment.
    pub fn path_from_url(&self, url: &str) -> Option<String> {
        let marker = format!("/{}/", self.bucket);
        let (_, tail) = url.split_once(&marker)?;
        let path = tail.split(['?', '#']).next().unwrap_or_default();
        if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        }
    }

    #[instrument(skip(self, upload), fields(bucket = %self.bucket, size = upload.bytes.len()))]
    pub async fn upload(&self, upload: ImageUpload) -> ShopResult<StoredImage> {
        let extension = check_upload(&upload)?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let file_path = format!("{}{}", self.prefix, file_name);
        self.store
            .put(&self.bucket, &file_path, &upload.content_type, upload.bytes)
            .await?;

        let public_url = self.store.public_url(&self.bucket, &file_path);
        info!(path = %file_path, "image uploaded");
        Ok(StoredImage {
            file_name,
            file_path,
            public_url,
        })
    }

    /// Best-effort delete of the object behind a public URL.
    pub async fn delete_by_url(&self, url: &str) -> DeleteOutcome {
        match self.path_from_url(url) {
            Some(path) => self.delete_by_path(&path).await,
            None => {
                warn!(url, bucket = %self.bucket, "image URL does not point into bucket");
                DeleteOutcome::failed("image URL does not point into this bucket")
            }
        }
    }

    /// Best-effort delete of an object by storage path.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_by_path(&self, path: &str) -> DeleteOutcome {
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            return DeleteOutcome::failed("empty image path");
        }
        match self.store.remove(&self.bucket, path).await {
            Ok(()) => {
                debug!(path, "image deleted");
                DeleteOutcome::deleted()
            }
            Err(err @ StorageError::ObjectNotFound { .. }) => {
                warn!(path, "image to delete was not found");
                DeleteOutcome::failed(err.to_string())
            }
            Err(err) => {
                warn!(path, error = %err, "image delete failed");
                DeleteOutcome::failed(err.to_string())
            }
        }
    }

    /// Upload `upload`, then drop `old_url` when it names a different image.
    pub async fn replace(
        &self,
        old_url: Option<&str>,
        upload: ImageUpload,
    ) -> ShopResult<ReplaceOutcome> {
        let stored = self.upload(upload).await?;
        let warning = match old_url {
            Some(old) if old != stored.public_url => {
                self.delete_by_url(old).await.warning("Old image")
            }
            _ => None,
        };
        Ok(ReplaceOutcome { stored, warning })
    }

    /// Remove a freshly uploaded image whose owning record was never written.
    pub async fn discard(&self, stored: &StoredImage) {
        let outcome = self.delete_by_path(&stored.file_path).await;
        if !outcome.success {
            warn!(path = %stored.file_path, "orphaned upload left in storage");
        }
    }
}

/// Validate type and size, returning the extension to store under.
fn check_upload(upload: &ImageUpload) -> ShopResult<String> {
    if upload.bytes.is_empty() {
        return Err(ShopError::Upload("Image file is empty".into()));
    }
    if upload.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ShopError::Upload(format!(
            "Image exceeds the {} MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    let content_type = upload.content_type.to_ascii_lowercase();
    let Some((_, default_ext)) = ALLOWED_TYPES.iter().find(|(ct, _)| *ct == content_type) else {
        return Err(ShopError::Upload(
            "Only image files are allowed (jpeg, jpg, png, gif, webp)".into(),
        ));
    };

    match upload.extension.as_deref() {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext) => Ok(ext.to_string()),
        Some(_) => Err(ShopError::Upload(
            "Only image files are allowed (jpeg, jpg, png, gif, webp)".into(),
        )),
        None => Ok((*default_ext).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage_service::{LocalObjectStore, MockObjectStore};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn local(dir: &tempfile::TempDir) -> (ImageService, Arc<LocalObjectStore>) {
        let store = Arc::new(LocalObjectStore::new(dir.path(), "http://localhost:3000"));
        (ImageService::products(store.clone()), store)
    }

    #[tokio::test]
    async fn upload_stores_under_prefix_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let (images, store) = local(&dir);

        let stored = images
            .upload(ImageUpload::new(PNG.to_vec(), "image/png"))
            .await
            .unwrap();

        assert!(stored.file_path.starts_with("products/"));
        assert!(stored.file_name.ends_with(".png"));
        assert_eq!(
            stored.public_url,
            format!(
                "http://localhost:3000/storage/v1/object/public/product-images/{}",
                stored.file_path
            )
        );
        assert!(store.exists(PRODUCT_BUCKET, &stored.file_path).await.unwrap());
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_or_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let (images, _) = local(&dir);

        let pdf = ImageUpload::new(b"%PDF".to_vec(), "application/pdf");
        assert!(matches!(images.upload(pdf).await, Err(ShopError::Upload(_))));

        let mut renamed = ImageUpload::new(PNG.to_vec(), "image/png");
        renamed.extension = Some("exe".into());
        assert!(matches!(
            images.upload(renamed).await,
            Err(ShopError::Upload(_))
        ));

        let huge = ImageUpload::new(vec![0u8; MAX_IMAGE_BYTES + 1], "image/jpeg");
        assert!(matches!(images.upload(huge).await, Err(ShopError::Upload(_))));

        let empty = ImageUpload::new(Vec::new(), "image/jpeg");
        assert!(matches!(images.upload(empty).await, Err(ShopError::Upload(_))));
    }

    #[test]
    fn path_is_extracted_from_public_url() {
        let images = ImageService::products(Arc::new(MockObjectStore::new()));
        assert_eq!(
            images.path_from_url(
                "https://cdn.example/storage/v1/object/public/product-images/products/old.png?t=1"
            ),
            Some("products/old.png".to_string())
        );
        assert_eq!(images.path_from_url("https://elsewhere.example/x.png"), None);
        assert_eq!(
            images.path_from_url("https://cdn.example/public/product-images/"),
            None
        );
    }

    #[test]
    fn data_urls_are_decoded() {
        let encoded = general_purpose::STANDARD.encode(PNG);
        let upload = ImageUpload::from_data_url(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(&upload.bytes[..], PNG);

        assert!(ImageUpload::from_data_url("image/png;base64,AAAA").is_err());
        assert!(ImageUpload::from_data_url("data:image/png,AAAA").is_err());
        assert!(ImageUpload::from_data_url("data:image/png;base64,***").is_err());
    }

    #[test]
    fn file_parts_infer_missing_content_type() {
        let upload = ImageUpload::from_file(Bytes::from_static(PNG), None, Some("Photo.JPG"));
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.extension.as_deref(), Some("jpg"));
    }

    #[tokio::test]
    async fn replace_uploads_new_then_deletes_old() {
        let dir = tempfile::tempdir().unwrap();
        let (images, store) = local(&dir);
        let old = images
            .upload(ImageUpload::new(PNG.to_vec(), "image/png"))
            .await
            .unwrap();

        let outcome = images
            .replace(
                Some(old.public_url.as_str()),
                ImageUpload::new(PNG.to_vec(), "image/png"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.warning, None);
        assert!(!store.exists(PRODUCT_BUCKET, &old.file_path).await.unwrap());
        assert!(store
            .exists(PRODUCT_BUCKET, &outcome.stored.file_path)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_objects_are_soft_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (images, _) = local(&dir);

        let outcome = images.delete_by_path("products/nope.png").await;
        assert!(!outcome.success);
        assert!(outcome.warning("Image").unwrap().contains("could not be deleted"));

        let outcome = images.delete_by_url("http://localhost:3000/other/x.png").await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn storage_errors_on_delete_are_reported_not_raised() {
        let mut store = MockObjectStore::new();
        store.expect_remove().returning(|_, _| {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        });
        let images = ImageService::products(Arc::new(store));

        let outcome = images.delete_by_path("products/a.png").await;
        assert_eq!(
            outcome,
            DeleteOutcome {
                success: false,
                reason: Some("disk unavailable".into())
            }
        );
    }
}
