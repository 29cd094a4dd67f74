// ─── Metadata Cache ───
// Per-source read-through cache for remote metadata documents.
//
// Layout under the cache root:
//   index.json                    source id → { key, blobs, updatedAt }
//   <source>-<hash><ext>          one file per cached blob

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::key::{KeyDecoder, SourceKey};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::verify::compute_sha256_hex;

pub const CACHE_DIR_NAME: &str = "metacache";
pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    key: serde_json::Value,
    #[serde(default)]
    blobs: BTreeMap<String, String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SourceEntry {
    /// `None` until a resolution completes, or while blobs are being rewritten.
    key: Option<SourceKey>,
    /// Blob name → file name under the cache root.
    blobs: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Cache of resolved metadata for every source, backed by one index file.
#[derive(Debug)]
pub struct MetadataCache {
    root: PathBuf,
    entries: HashMap<String, SourceEntry>,
}

impl MetadataCache {
    /// Load the index under `root`. A missing or corrupt index yields an
    /// empty cache; entries whose source id `registry` doesn't know are dropped.
    pub async fn load(
        root: &Path,
        registry: fn(&str) -> Option<KeyDecoder>,
    ) -> LauncherResult<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| LauncherError::io(root, e))?;

        let mut cache = Self {
            root: root.to_path_buf(),
            entries: HashMap::new(),
        };

        let index_path = cache.index_path();
        let raw = match tokio::fs::read_to_string(&index_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => {
                warn!("Cannot read metadata cache index {:?}: {}", index_path, e);
                return Ok(cache);
            }
        };

        let stored: HashMap<String, StoredEntry> = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to load metadata cache index, starting empty: {}", e);
                return Ok(cache);
            }
        };

        for (source_id, entry) in stored {
            let Some(decode) = registry(&source_id) else {
                warn!("Couldn't find jar source {}, dropping its cache entry", source_id);
                continue;
            };
            match decode(entry.key) {
                Ok(key) => {
                    cache.entries.insert(
                        source_id,
                        SourceEntry {
                            key: Some(key),
                            blobs: entry.blobs,
                            updated_at: entry.updated_at,
                        },
                    );
                }
                Err(e) => warn!("Corrupt cache key for source {}: {}", source_id, e),
            }
        }

        debug!("Loaded metadata cache with {} sources", cache.entries.len());
        Ok(cache)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    /// The key stored for `source_id` by its last completed resolution.
    pub fn stored_key(&self, source_id: &str) -> Option<&SourceKey> {
        self.entries.get(source_id).and_then(|e| e.key.as_ref())
    }

    pub fn updated_at(&self, source_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(source_id).and_then(|e| e.updated_at)
    }

    /// Open a view of `source_id`'s cache, checked against `key`.
    pub fn view(&mut self, source_id: &str, key: SourceKey) -> CacheView<'_> {
        self.entries.entry(source_id.to_string()).or_default();
        CacheView {
            cache: self,
            source_id: source_id.to_string(),
            key,
        }
    }

    async fn save(&self) -> LauncherResult<()> {
        let mut stored = BTreeMap::new();
        for (source_id, entry) in &self.entries {
            let Some(key) = &entry.key else {
                continue;
            };
            stored.insert(
                source_id.clone(),
                StoredEntry {
                    key: key.to_value()?,
                    blobs: entry.blobs.clone(),
                    updated_at: entry.updated_at,
                },
            );
        }

        let json = serde_json::to_string_pretty(&stored)?;
        let index_path = self.index_path();
        let tmp_path = self.root.join(format!("{}.tmp", INDEX_FILE_NAME));
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| LauncherError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &index_path)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;
        Ok(())
    }
}

/// Stable, filesystem-safe file name for a blob of a source.
fn blob_file_name(source_id: &str, blob_name: &str) -> String {
    let safe_source: String = source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let extension = blob_name
        .rfind('.')
        .map(|idx| &blob_name[idx..])
        .filter(|ext| ext.len() > 1 && ext[1..].chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(".json");

    let hash = compute_sha256_hex(blob_name);
    format!("{}-{}{}", safe_source, &hash[..16], extension)
}

/// One source's slice of the cache for the duration of a resolution.
pub struct CacheView<'a> {
    cache: &'a mut MetadataCache,
    source_id: String,
    key: SourceKey,
}

impl CacheView<'_> {
    fn entry(&self) -> Option<&SourceEntry> {
        self.cache.entries.get(&self.source_id)
    }

    fn entry_mut(&mut self) -> &mut SourceEntry {
        self.cache
            .entries
            .entry(self.source_id.clone())
            .or_default()
    }

    /// Path a blob is (or would be) stored at.
    pub fn path(&self, blob_name: &str) -> PathBuf {
        let file_name = self
            .entry()
            .and_then(|e| e.blobs.get(blob_name).cloned())
            .unwrap_or_else(|| blob_file_name(&self.source_id, blob_name));
        self.cache.root.join(file_name)
    }

    /// True only if the stored key validates against this view's key and the
    /// blob is recorded and still on disk.
    pub fn is_valid(&self, blob_name: &str) -> bool {
        let Some(entry) = self.entry() else {
            return false;
        };
        let Some(stored) = &entry.key else {
            return false;
        };
        if !self.key.is_valid(stored) {
            return false;
        }
        match entry.blobs.get(blob_name) {
            Some(file) => self.cache.root.join(file).is_file(),
            None => false,
        }
    }

    pub async fn get_bytes<F, Fut>(&mut self, blob_name: &str, supplier: F) -> LauncherResult<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LauncherResult<Vec<u8>>>,
    {
        self.read_through(
            blob_name,
            |raw| Some(raw.to_vec()),
            |bytes| Ok(bytes.clone()),
            supplier,
        )
        .await
    }

    pub async fn get_string<F, Fut>(&mut self, blob_name: &str, supplier: F) -> LauncherResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LauncherResult<String>>,
    {
        self.read_through(
            blob_name,
            |raw| String::from_utf8(raw.to_vec()).ok(),
            |s| Ok(s.as_bytes().to_vec()),
            supplier,
        )
        .await
    }

    /// Read-through for structured metadata stored as JSON.
    pub async fn get_object<T, F, Fut>(&mut self, blob_name: &str, supplier: F) -> LauncherResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = LauncherResult<T>>,
    {
        self.read_through(
            blob_name,
            |raw| serde_json::from_slice(raw).ok(),
            |value| Ok(serde_json::to_vec_pretty(value)?),
            supplier,
        )
        .await
    }

    async fn read_through<T, D, E, F, Fut>(
        &mut self,
        blob_name: &str,
        decode: D,
        encode: E,
        supplier: F,
    ) -> LauncherResult<T>
    where
        D: Fn(&[u8]) -> Option<T>,
        E: Fn(&T) -> LauncherResult<Vec<u8>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = LauncherResult<T>>,
    {
        if self.is_valid(blob_name) {
            let path = self.path(blob_name);
            match tokio::fs::read(&path).await {
                Ok(raw) => match decode(&raw) {
                    Some(value) => {
                        debug!("Metadata cache hit: {}/{}", self.source_id, blob_name);
                        return Ok(value);
                    }
                    None => warn!("Cached blob {:?} is unreadable, refetching", path),
                },
                Err(e) => warn!("Cannot read cached blob {:?}: {}", path, e),
            }
        }

        debug!("Metadata cache miss: {}/{}", self.source_id, blob_name);
        let value = supplier().await?;
        self.store(blob_name, &encode(&value)?).await?;
        Ok(value)
    }

    /// Write a blob and mark the source stale until [`CacheView::complete_update`].
    async fn store(&mut self, blob_name: &str, bytes: &[u8]) -> LauncherResult<()> {
        let file_name = blob_file_name(&self.source_id, blob_name);
        let path = self.cache.root.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;

        let entry = self.entry_mut();
        entry.blobs.insert(blob_name.to_string(), file_name);
        if entry.key.take().is_some() {
            self.cache.save().await?;
        }
        Ok(())
    }

    /// Record this view's key as current and persist the index.
    pub async fn complete_update(&mut self) -> LauncherResult<()> {
        let key = self.key.clone();
        let entry = self.entry_mut();
        entry.key = Some(key);
        entry.updated_at = Some(Utc::now());
        self.cache.save().await?;
        info!("Metadata cache updated for source {}", self.source_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::key::{FolderKey, RuntimeKey};
    use crate::core::environment::Side;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn decode_runtime(value: serde_json::Value) -> serde_json::Result<SourceKey> {
        serde_json::from_value(value).map(SourceKey::Runtime)
    }

    fn decode_folder(value: serde_json::Value) -> serde_json::Result<SourceKey> {
        serde_json::from_value(value).map(SourceKey::Folder)
    }

    fn registry(source_id: &str) -> Option<KeyDecoder> {
        match source_id {
            "minecraft" => Some(decode_runtime as KeyDecoder),
            "folder" => Some(decode_folder as KeyDecoder),
            _ => None,
        }
    }

    fn runtime_key(version: &str) -> SourceKey {
        SourceKey::Runtime(RuntimeKey {
            game_version: version.into(),
            side: Side::Client,
            os: "linux".into(),
        })
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        main_class: String,
    }

    async fn fetch_doc(calls: &AtomicUsize) -> LauncherResult<Doc> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Doc {
            main_class: "a.Main".into(),
        })
    }

    #[tokio::test]
    async fn completed_update_is_a_hit_on_next_load() {
        let dir = tempfile::tempdir().unwrap();
        let calls = AtomicUsize::new(0);

        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        let mut view = cache.view("minecraft", runtime_key("1.20"));
        assert!(!view.is_valid("minecraft.json"));
        let doc: Doc = view.get_object("minecraft.json", || fetch_doc(&calls)).await.unwrap();
        view.complete_update().await.unwrap();
        assert_eq!(doc.main_class, "a.Main");

        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        assert!(cache.updated_at("minecraft").is_some());
        let mut view = cache.view("minecraft", runtime_key("1.20"));
        assert!(view.is_valid("minecraft.json"));
        let again: Doc = view.get_object("minecraft.json", || fetch_doc(&calls)).await.unwrap();
        assert_eq!(again, doc);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_key_invalidates_only_that_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();

        let mut view = cache.view("minecraft", runtime_key("1.20"));
        view.get_string("minecraft.json", || async { Ok("{}".to_string()) })
            .await
            .unwrap();
        view.complete_update().await.unwrap();

        let mut view = cache.view("folder", SourceKey::Folder(FolderKey {}));
        view.get_string("listing.txt", || async { Ok("a.jar".to_string()) })
            .await
            .unwrap();
        view.complete_update().await.unwrap();

        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        assert!(!cache.view("minecraft", runtime_key("1.21")).is_valid("minecraft.json"));
        assert!(cache.view("minecraft", runtime_key("1.20")).is_valid("minecraft.json"));
        assert!(cache
            .view("folder", SourceKey::Folder(FolderKey {}))
            .is_valid("listing.txt"));
    }

    #[tokio::test]
    async fn missing_complete_update_leaves_cache_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        let mut view = cache.view("minecraft", runtime_key("1.20"));
        view.get_bytes("minecraft.json", || async { Ok(b"{}".to_vec()) })
            .await
            .unwrap();
        assert!(!view.is_valid("minecraft.json"));

        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        assert!(!cache.view("minecraft", runtime_key("1.20")).is_valid("minecraft.json"));
    }

    #[tokio::test]
    async fn deleted_blob_is_not_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        let mut view = cache.view("minecraft", runtime_key("1.20"));
        view.get_bytes("minecraft.json", || async { Ok(b"{}".to_vec()) })
            .await
            .unwrap();
        view.complete_update().await.unwrap();
        let blob = view.path("minecraft.json");
        assert!(view.is_valid("minecraft.json"));

        std::fs::remove_file(blob).unwrap();
        assert!(!view.is_valid("minecraft.json"));
    }

    #[tokio::test]
    async fn corrupt_or_unknown_index_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE_NAME), "not json").unwrap();
        let cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        assert!(cache.stored_key("minecraft").is_none());

        std::fs::write(
            dir.path().join(INDEX_FILE_NAME),
            r#"{"mystery": {"key": {}, "blobs": {}},
                "minecraft": {"key": {"gameVersion": "1.20", "side": "client", "os": "linux"}}}"#,
        )
        .unwrap();
        let cache = MetadataCache::load(dir.path(), registry).await.unwrap();
        assert!(cache.stored_key("mystery").is_none());
        assert_eq!(cache.stored_key("minecraft"), Some(&runtime_key("1.20")));
    }

    #[test]
    fn blob_names_are_filesystem_safe() {
        let name = blob_file_name("my/source", "../../etc/passwd");
        assert!(name.starts_with("my_source-"));
        assert!(!name.contains('/'));
        assert!(name.ends_with(".json"));
        assert!(blob_file_name("fabric", "fabric.json").ends_with(".json"));
        assert!(blob_file_name("fabric", "notes.txt").ends_with(".txt"));
    }
}
