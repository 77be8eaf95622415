//! Key-value engines underneath [`FlatStore`](super::FlatStore).
//!
//! An engine stores opaque string values under string keys and can enumerate keys by
//! prefix. Nothing more is required of it; the flat store owns the key layout and the
//! serialization.

use crate::errors::{Result, StoreResultExt};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, btree_map::Entry},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::RwLock};
use uuid::Uuid;

const FILE_EXTENSION: &str = "json";
const KEY_EXTENSION: &str = "key";
const TMP_SUFFIX: &str = "tmp";
/// Longest escaped key used verbatim as a file stem; longer keys are hashed.
const MAX_FILE_STEM: usize = 160;
/// Never produced by `urlencoding::encode`, so it marks hashed stems.
const HASHED_MARKER: char = '!';

/// Minimal string key-value storage.
#[async_trait]
pub trait KeyValueEngine: Send + Sync {
    /// Returns the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;
    /// Stores `value` only if `key` is empty, atomically. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool>;
    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
    /// Lists every key starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Process-local engine, used for tests and for the flat backend without a data dir.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    entries: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl KeyValueEngine for MemoryEngine {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool> {
        match self.entries.write().await.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// Engine keeping one JSON file per key inside a directory.
///
/// Keys are percent-encoded into file names, so any key is accepted. A key whose
/// encoding would not fit a file name is stored under a hashed name instead, with the
/// full key kept in a `.key` file beside the value. Writes go through a temporary file
/// followed by a rename.
#[derive(Debug, Clone)]
pub struct FileEngine {
    root: PathBuf,
}

impl FileEngine {
    /// Opens (creating if needed) the engine rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.store_op("open_data_dir")?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{FILE_EXTENSION}", file_stem(key)))
    }

    /// A temporary path next to `path`, unique per call.
    fn tmp_path(path: &Path) -> PathBuf {
        path.with_extension(format!("{}.{TMP_SUFFIX}", Uuid::new_v4().simple()))
    }

    /// Writes the sidecar holding the full key of a hashed file name.
    async fn write_key_file(key: &str, path: &Path) -> Result<()> {
        if !is_hashed(path) {
            return Ok(());
        }
        let key_path = path.with_extension(KEY_EXTENSION);
        let tmp = Self::tmp_path(&key_path);
        fs::write(&tmp, key).await.store_op("write_key")?;
        fs::rename(&tmp, &key_path).await.store_op("write_key")
    }

    async fn key_of(path: &Path) -> Result<Option<String>> {
        if !is_hashed(path) {
            return Ok(path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| urlencoding::decode(stem).ok())
                .map(|key| key.into_owned()));
        }
        match fs::read_to_string(path.with_extension(KEY_EXTENSION)).await {
            Ok(key) => Ok(Some(key)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).store_op("list_keys"),
        }
    }
}

#[async_trait]
impl KeyValueEngine for FileEngine {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).store_op("read_key"),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        Self::write_key_file(key, &path).await?;
        let tmp = Self::tmp_path(&path);
        fs::write(&tmp, value).await.store_op("write_key")?;
        fs::rename(&tmp, &path).await.store_op("write_key")
    }

    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool> {
        let path = self.path_for(key);
        Self::write_key_file(key, &path).await?;
        let tmp = Self::tmp_path(&path);
        fs::write(&tmp, value).await.store_op("write_key")?;
        // Linking fails if the target exists, so exactly one writer wins.
        let linked = fs::hard_link(&tmp, &path).await;
        fs::remove_file(&tmp).await.store_op("write_key")?;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).store_op("write_key"),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).store_op("remove_key"),
        }
        if is_hashed(&path) {
            match fs::remove_file(path.with_extension(KEY_EXTENSION)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e).store_op("remove_key"),
            }
        }
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await.store_op("list_keys")?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.store_op("list_keys")? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(key) = Self::key_of(&path).await? {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// File stem of `key`: its percent-encoding, or a readable head plus a hash when the
/// encoding is too long for a file name.
fn file_stem(key: &str) -> String {
    let encoded = urlencoding::encode(key);
    if encoded.len() <= MAX_FILE_STEM {
        return encoded.into_owned();
    }
    let head: String = encoded.chars().take(MAX_FILE_STEM / 2).collect();
    let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).simple();
    format!("{head}{HASHED_MARKER}{hash}")
}

fn is_hashed(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.contains(HASHED_MARKER))
}
