//! Artifact persistence collaborators.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::spec::SpecArtifactDescriptor;

/// Destination of finished workbooks.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `size_bytes` bytes read from `payload` under `name`.
    async fn store(
        &self,
        name: &str,
        payload: &mut (dyn AsyncRead + Unpin + Send),
        size_bytes: u64,
    ) -> Result<SpecArtifactDescriptor, String>;
}

fn derive_prefixed_name(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(c_prefix) if !c_prefix.is_empty() => format!("{c_prefix}{name}"),
        _ => name.to_string(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region FilesystemStore

/// Stores artifacts as files below a root directory.
///
/// Bytes land in `<name>.partial` first and are renamed once complete.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir_root: PathBuf,
    prefix: Option<String>,
}

impl FsArtifactStore {
    pub fn new(dir_root: impl Into<PathBuf>) -> Self {
        Self {
            dir_root: dir_root.into(),
            prefix: None,
        }
    }

    /// Prepend `prefix` to every stored name (`reports/` writes into a subdirectory).
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(
        &self,
        name: &str,
        payload: &mut (dyn AsyncRead + Unpin + Send),
        size_bytes: u64,
    ) -> Result<SpecArtifactDescriptor, String> {
        let c_name = derive_prefixed_name(self.prefix.as_deref(), name);
        let path_final = self.dir_root.join(&c_name);
        let mut c_path_partial = path_final.clone().into_os_string();
        c_path_partial.push(".partial");
        let path_partial = PathBuf::from(c_path_partial);

        if let Some(dir_parent) = path_final.parent() {
            tokio::fs::create_dir_all(dir_parent)
                .await
                .map_err(|err| format!("Failed to create {}: {err}", dir_parent.display()))?;
        }

        let res_copy = async {
            let mut file = tokio::fs::File::create(&path_partial).await?;
            let n_bytes = tokio::io::copy(payload, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(n_bytes)
        }
        .await;

        let n_bytes = match res_copy {
            Ok(n_bytes) if n_bytes == size_bytes => n_bytes,
            Ok(n_bytes) => {
                let _ = tokio::fs::remove_file(&path_partial).await;
                return Err(format!(
                    "Short write for {c_name}: expected {size_bytes} bytes, got {n_bytes}."
                ));
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&path_partial).await;
                return Err(format!("Failed to write {}: {err}", path_partial.display()));
            }
        };

        tokio::fs::rename(&path_partial, &path_final)
            .await
            .map_err(|err| format!("Failed to commit {}: {err}", path_final.display()))?;

        let path_abs = tokio::fs::canonicalize(&path_final)
            .await
            .unwrap_or_else(|_| path_final.clone());
        debug!(path = %path_abs.display(), n_bytes, "artifact stored");

        Ok(SpecArtifactDescriptor {
            name: c_name,
            location: self.dir_root.display().to_string(),
            access_uri: format!("file://{}", path_abs.display()),
            size_bytes: n_bytes,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemoryStore

/// Keeps artifacts in memory, keyed by stored name.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    prefix: Option<String>,
    dict_blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `prefix` to every stored name.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Copy of the bytes stored under `name`.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.dict_blobs.lock().get(name).cloned()
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.dict_blobs.lock().keys().cloned().collect()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.dict_blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_blobs.lock().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(
        &self,
        name: &str,
        payload: &mut (dyn AsyncRead + Unpin + Send),
        size_bytes: u64,
    ) -> Result<SpecArtifactDescriptor, String> {
        let c_name = derive_prefixed_name(self.prefix.as_deref(), name);
        let mut v_bytes = Vec::with_capacity(usize::try_from(size_bytes).unwrap_or_default());
        payload
            .read_to_end(&mut v_bytes)
            .await
            .map_err(|err| format!("Failed to read payload for {c_name}: {err}"))?;

        let n_bytes = v_bytes.len() as u64;
        self.dict_blobs.lock().insert(c_name.clone(), v_bytes);

        Ok(SpecArtifactDescriptor {
            access_uri: format!("memory://{c_name}"),
            name: c_name,
            location: "memory".to_string(),
            size_bytes: n_bytes,
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_keeps_bytes_under_prefixed_name() {
        let store = MemoryArtifactStore::new().with_prefix(Some("exports/".to_string()));
        let mut payload: &[u8] = b"hello";
        let artifact = store.store("a.xlsx", &mut payload, 5).await.unwrap();

        assert_eq!(artifact.name, "exports/a.xlsx");
        assert_eq!(artifact.access_uri, "memory://exports/a.xlsx");
        assert_eq!(artifact.size_bytes, 5);
        assert_eq!(store.get("exports/a.xlsx").as_deref(), Some(&b"hello"[..]));
        assert_eq!(store.names(), vec!["exports/a.xlsx".to_string()]);
    }

    #[tokio::test]
    async fn test_fs_store_commits_file_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).with_prefix(Some("out/".to_string()));
        let mut payload: &[u8] = b"0123456789";
        let artifact = store.store("b.xlsx", &mut payload, 10).await.unwrap();

        let path_final = dir.path().join("out").join("b.xlsx");
        assert_eq!(std::fs::read(&path_final).unwrap(), b"0123456789");
        assert!(!dir.path().join("out").join("b.xlsx.partial").exists());
        assert_eq!(artifact.name, "out/b.xlsx");
        assert_eq!(artifact.size_bytes, 10);
        assert!(artifact.access_uri.starts_with("file://"));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_short_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let mut payload: &[u8] = b"abc";
        let err = store.store("c.xlsx", &mut payload, 4).await.unwrap_err();

        assert!(err.contains("Short write"));
        assert!(!dir.path().join("c.xlsx").exists());
        assert!(!dir.path().join("c.xlsx.partial").exists());
    }
}
