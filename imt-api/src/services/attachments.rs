//! Attachment object storage
//!
//! Anomaly attachments live behind a small object-store trait: upload by
//! key, retrieval by signed URL. The default implementation keeps objects
//! on the local filesystem; an S3-style backend slots in behind the same
//! trait.

use async_trait::async_trait;
use chrono::Utc;
use imt_common::Result;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Default lifetime of signed URLs
pub const DEFAULT_URL_TTL_SECS: u64 = 3600;

/// Object storage for anomaly attachments
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store an object under `key`, replacing any previous content
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Produce a URL granting read access to `key` for `ttl_secs` seconds
    async fn sign_url(&self, key: &str, ttl_secs: u64) -> Result<String>;
}

/// Filesystem-backed store. Signed URLs carry an expiry timestamp and a
/// SHA-256 token over key, expiry, and the signing secret.
pub struct LocalAttachmentStore {
    root: PathBuf,
    signing_secret: String,
}

impl LocalAttachmentStore {
    pub fn new(root: PathBuf, signing_secret: String) -> Self {
        Self {
            root,
            signing_secret,
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        // Keys embed the anomaly id and original filename; flatten any
        // separators so a key cannot escape the store root
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(safe)
    }

    fn token(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(expires.to_string().as_bytes());
        hasher.update(self.signing_secret.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.object_path(key), bytes).await?;
        tracing::debug!(key = %key, bytes = bytes.len(), "stored attachment");
        Ok(())
    }

    async fn sign_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        let expires = Utc::now().timestamp() + ttl_secs as i64;
        let token = self.token(key, expires);
        Ok(format!(
            "file://{}?expires={}&token={}",
            self.object_path(key).display(),
            expires,
            token
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalAttachmentStore {
        LocalAttachmentStore::new(dir.path().to_path_buf(), "test-secret".to_string())
    }

    #[tokio::test]
    async fn test_put_writes_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);

        store.put("7_report.xlsx", b"contents").await.expect("put");
        let written = std::fs::read(dir.path().join("7_report.xlsx")).expect("read back");
        assert_eq!(written, b"contents");
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);

        store.put("../../etc/passwd", b"nope").await.expect("put");
        assert!(dir.path().join(".._.._etc_passwd").exists());
    }

    #[tokio::test]
    async fn test_signed_url_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);

        let url = store.sign_url("7_report.xlsx", 3600).await.expect("sign");
        assert!(url.starts_with("file://"));
        assert!(url.contains("expires="));
        assert!(url.contains("token="));
    }

    #[tokio::test]
    async fn test_token_depends_on_key_and_expiry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);

        assert_ne!(store.token("a", 100), store.token("b", 100));
        assert_ne!(store.token("a", 100), store.token("a", 101));
    }
}
