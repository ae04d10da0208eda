use anyhow::{anyhow, Context, Result};
use blake3::Hasher;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Result of storing bytes in a blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Store-relative key, used to fetch or delete the blob later.
    pub path: String,
    /// Durable URL a client can fetch the blob from.
    pub url: String,
    pub size_bytes: i64,
    pub checksum: String,
}

/// Stores uploaded bytes and hands back a durable location.
pub trait BlobStore: Clone + Send + Sync + 'static {
    fn upload(&self, data: &[u8], path: &str) -> impl Future<Output = Result<StoredBlob>> + Send;
    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
    fn delete(&self, path: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let clean = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !clean {
            return Err(anyhow!("invalid blob path: {path}"));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    async fn upload(&self, data: &[u8], path: &str) -> Result<StoredBlob> {
        if data.is_empty() {
            return Err(anyhow!("blob data may not be empty"));
        }
        let absolute_path = self.resolve(path)?;
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create blob directory {}", parent.display())
            })?;
        }
        fs::write(&absolute_path, data)
            .await
            .with_context(|| format!("failed to write blob to {}", absolute_path.display()))?;

        let mut hasher = Hasher::new();
        hasher.update(data);
        let checksum = format!("blake3:{}", hasher.finalize().to_hex());

        Ok(StoredBlob {
            path: path.to_string(),
            url: format!("{}/blobs/{}", self.public_url, path),
            size_bytes: data.len() as i64,
            checksum,
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let absolute_path = self.resolve(path)?;
        fs::read(&absolute_path)
            .await
            .with_context(|| format!("failed to read blob {}", absolute_path.display()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let absolute_path = self.resolve(path)?;
        fs::remove_file(&absolute_path)
            .await
            .with_context(|| format!("failed to delete blob {}", absolute_path.display()))
    }
}

pub fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|file| file.to_str())
        .unwrap_or("upload")
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
