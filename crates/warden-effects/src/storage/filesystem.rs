//! Filesystem storage handler
//!
//! One file per key under a root directory. File names are the hex of the
//! key, so arbitrary keys (origins contain `:` and `/`) map to safe names.
//! Keys too long for a file name are stored under the SHA-256 of the key
//! instead, with the key itself framed ahead of the value.
//!
//! Writes go to a temporary file unique to the write and are renamed into
//! place, so concurrent writers of one key never share a temporary.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use warden_core::effects::StorageEffects;
use warden_core::{Result, WardenError};

const SUFFIX: &str = "rec";
const HASHED_SUFFIX: &str = "hrec";

/// Longest hex stem used as a file name; common filesystems cap names at 255 bytes
const MAX_HEX_STEM: usize = 240;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn is_hashed(key: &str) -> bool {
    key.len() * 2 > MAX_HEX_STEM
}

fn frame(key: &str, value: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(key.len())
        .map_err(|_| WardenError::storage("storage key exceeds 4 GiB"))?;
    let mut out = Vec::with_capacity(4 + key.len() + value.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(value);
    Ok(out)
}

/// Split a hashed record into its key and value
fn unframe(bytes: &[u8]) -> Option<(&str, &[u8])> {
    let len = u32::from_be_bytes(bytes.get(..4)?.try_into().ok()?) as usize;
    let key = bytes.get(4..4 + len)?;
    Some((std::str::from_utf8(key).ok()?, &bytes[4 + len..]))
}

/// Durable key/value store in a directory
#[derive(Debug, Clone)]
pub struct FilesystemStorageHandler {
    root: PathBuf,
}

impl FilesystemStorageHandler {
    /// Store under `root`, creating it if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            WardenError::storage(format!("cannot create {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        if is_hashed(key) {
            let digest = Sha256::digest(key.as_bytes());
            self.root
                .join(format!("{}.{HASHED_SUFFIX}", hex::encode(digest)))
        } else {
            self.root.join(format!("{}.{SUFFIX}", hex::encode(key)))
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".tmp-{}-{seq}", std::process::id()))
    }

    fn key_for(file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(SUFFIX)?.strip_suffix('.')?;
        String::from_utf8(hex::decode(stem).ok()?).ok()
    }

    async fn hashed_key_for(path: &Path) -> Result<Option<String>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(unframe(&bytes).map(|(key, _)| key.to_string()))
    }
}

#[async_trait]
impl StorageEffects for FilesystemStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.tmp_path();
        let contents = if is_hashed(key) {
            frame(key, &value)?
        } else {
            value
        };
        tokio::fs::write(&tmp, &contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let bytes = match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !is_hashed(key) {
            return Ok(Some(bytes));
        }
        match unframe(&bytes) {
            Some((stored, value)) if stored == key => Ok(Some(value.to_vec())),
            Some(_) => Ok(None),
            None => Err(WardenError::storage(format!(
                "malformed record for long key {}...",
                key.chars().take(32).collect::<String>()
            ))),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let key = if name.ends_with(&format!(".{HASHED_SUFFIX}")) {
                Self::hashed_key_for(&entry.path()).await?
            } else {
                Self::key_for(name)
            };
            let Some(key) = key else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::open(dir.path()).await.unwrap();
        storage
            .store("permissions/https://app.example", b"grant".to_vec())
            .await
            .unwrap();
        storage.store("capability/1", b"cap".to_vec()).await.unwrap();

        let reopened = FilesystemStorageHandler::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened
                .retrieve("permissions/https://app.example")
                .await
                .unwrap(),
            Some(b"grant".to_vec())
        );
        assert_eq!(
            reopened.list_keys("permissions/").await.unwrap(),
            vec!["permissions/https://app.example".to_string()]
        );
        assert!(reopened.remove("capability/1").await.unwrap());
        assert_eq!(reopened.retrieve("capability/1").await.unwrap(), None);
        assert!(!reopened.remove("capability/1").await.unwrap());
    }

    #[tokio::test]
    async fn long_keys_get_hashed_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::open(dir.path()).await.unwrap();
        let key = format!("permissions/https://{}.example", "a".repeat(400));
        storage.store(&key, b"grant".to_vec()).await.unwrap();
        storage.store("permissions/short", b"s".to_vec()).await.unwrap();

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            assert!(entry.unwrap().file_name().len() <= 255);
        }
        assert_eq!(
            storage.retrieve(&key).await.unwrap(),
            Some(b"grant".to_vec())
        );
        assert_eq!(
            storage.list_keys("permissions/").await.unwrap(),
            vec![key.clone(), "permissions/short".to_string()]
        );
        assert!(storage.remove(&key).await.unwrap());
        assert_eq!(storage.retrieve(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_writers_of_one_key_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::open(dir.path()).await.unwrap();
        let writers: Vec<_> = (0..16u8)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.store("capability/1", vec![i; 64]).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let value = storage.retrieve("capability/1").await.unwrap().unwrap();
        assert_eq!(value.len(), 64);
        assert!(value.iter().all(|b| *b == value[0]));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
    }
}
