//! src/services/storage_service.rs
//!
//! Object storage for catalog images. `ObjectStore` is the seam the rest of
//! the service talks to; `LocalObjectStore` keeps payloads on local disk,
//! sharded beneath `base_path/{bucket}/{shard}/{shard}/{path}`, and hands out
//! public URLs that the HTTP surface serves back under
//! `/storage/v1/object/public/{bucket}/{path}`.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Route prefix under which public object URLs resolve.
pub const PUBLIC_OBJECT_ROUTE: &str = "/storage/v1/object/public";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{path}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, path: String },
    #[error("object `{path}` already exists in bucket `{bucket}`")]
    ObjectExists { bucket: String, path: String },
    #[error("invalid object path")]
    InvalidObjectPath,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub size_bytes: i64,
    pub etag: String,
}

/// Blob storage addressed by `(bucket, path)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a new object. Never overwrites an existing one.
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject>;

    /// Open an object for reading, returning the handle and its length.
    async fn open(&self, bucket: &str, path: &str) -> StorageResult<(File, u64)>;

    /// Remove an object. Missing objects yield `ObjectNotFound`.
    async fn remove(&self, bucket: &str, path: &str) -> StorageResult<()>;

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool>;

    /// Browser-fetchable URL for an object.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Write, read back and delete a probe file. Used by readiness checks.
    async fn probe(&self) -> StorageResult<()>;
}

const MAX_OBJECT_PATH_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Disk-backed `ObjectStore`.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,

    /// Origin prepended to public object URLs, e.g. `http://localhost:3000`.
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Basic path validation to avoid trivial path traversal vectors.
    ///
    /// Rejects paths that begin with `/` or contain `..`, control characters
    /// or backslashes.
    fn ensure_path_safe(&self, path: &str) -> StorageResult<()> {
        if path.is_empty() || path.len() > MAX_OBJECT_PATH_LEN {
            return Err(StorageError::InvalidObjectPath);
        }
        if path.starts_with('/') || path.ends_with('/') || path.contains("..") {
            return Err(StorageError::InvalidObjectPath);
        }
        if path
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectPath);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StorageResult<()> {
        let invalid = |reason: &str| StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }
        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }
        if is_ipv4_like(name) {
            return Err(invalid("must not be formatted like an IP address"));
        }
        Ok(())
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Two-level shard identifiers from MD5(bucket/path), as lowercase hex.
    fn object_shards(bucket: &str, path: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, path));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// `base_path/bucket/{shard}/{shard}/{path}`. Parents may not exist yet.
    fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, path);
        let mut full = self.bucket_root(bucket);
        full.push(shard_a);
        full.push(shard_b);
        for segment in path.split('/') {
            full.push(segment);
        }
        full
    }

    fn checked_object_path(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_path_safe(path)?;
        Ok(self.object_path(bucket, path))
    }

    /// Remove empty directories from `start` up to (excluding) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Write bytes to a temp file, fsync, then rename into place.
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        let file_path = self.checked_object_path(bucket, path)?;
        if fs::try_exists(&file_path).await? {
            return Err(StorageError::ObjectExists {
                bucket: bucket.to_string(),
                path: path.to_string(),
            });
        }

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!(
            bucket,
            path,
            content_type,
            size = data.len(),
            "stored object at {}",
            file_path.display()
        );

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size_bytes: data.len() as i64,
            etag: format!("{:x}", md5::compute(&data)),
        })
    }

    async fn open(&self, bucket: &str, path: &str) -> StorageResult<(File, u64)> {
        let file_path = self.checked_object_path(bucket, path)?;
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    async fn remove(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let file_path = self.checked_object_path(bucket, path)?;
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                });
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }
        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let file_path = self.checked_object_path(bucket, path)?;
        Ok(fs::try_exists(&file_path).await?)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.public_base_url, PUBLIC_OBJECT_ROUTE, bucket, path
        )
    }

    async fn probe(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(StorageError::Io(io::Error::other("file content mismatch")));
        }
        Ok(())
    }
}

/// MIME type for a stored object, derived from its extension.
pub fn content_type_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
