//! Named caches persisted on disk.
//!
//! Layout: `<root>/<cache name>/<sha256(key)>.json` holds the response
//! metadata and `<sha256(key)>.body` holds the raw body bytes. A cache is
//! only ever removed as a whole; there is no per-entry eviction.
//! `<root>/ACTIVE` names the generation that was last activated.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CacheError, Request, Response};

/// File under the root recording the last activated generation
const ACTIVE_MARKER: &str = "ACTIVE";

/// A response read back from a cache, with the time it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.stored_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    #[serde(flatten)]
    response: Response,
    stored_at: DateTime<Utc>,
}

/// Root of all named caches.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(self.root.join(name))
        } else {
            Err(CacheError::InvalidName(name.to_string()))
        }
    }

    /// Open a named cache, creating it if needed.
    pub fn open(&self, name: &str) -> Result<Cache, CacheError> {
        let dir = self.cache_dir(name)?;
        fs::create_dir_all(&dir)?;
        Ok(Cache {
            name: name.to_string(),
            dir,
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.cache_dir(name).map(|d| d.is_dir()).unwrap_or(false)
    }

    /// Names of all existing caches, sorted.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a whole named cache. Returns false if it did not exist.
    pub fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let dir = self.cache_dir(name)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    /// Record `name` as the activated generation.
    pub fn set_active(&self, name: &str) -> Result<(), CacheError> {
        self.cache_dir(name)?;
        write_atomic(&self.root.join(ACTIVE_MARKER), name.as_bytes())
    }

    /// The last activated generation, if its cache still exists.
    pub fn active(&self) -> Option<String> {
        let name = fs::read_to_string(self.root.join(ACTIVE_MARKER)).ok()?;
        let name = name.trim();
        self.has(name).then(|| name.to_string())
    }

    /// Look the request up in every named cache, in name order.
    pub fn match_request(&self, request: &Request) -> Result<Option<CacheEntry>, CacheError> {
        for name in self.keys()? {
            let cache = Cache {
                dir: self.root.join(&name),
                name,
            };
            if let Some(entry) = cache.match_request(request)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

/// A single named cache.
#[derive(Debug, Clone)]
pub struct Cache {
    name: String,
    dir: PathBuf,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        // SHA256 for stable, filesystem-safe file names
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = hex::encode(hasher.finalize());
        (
            self.dir.join(format!("{}.json", hash)),
            self.dir.join(format!("{}.body", hash)),
        )
    }

    pub fn match_request(&self, request: &Request) -> Result<Option<CacheEntry>, CacheError> {
        let key = request.cache_key();
        let (meta_path, body_path) = self.entry_paths(&key);
        if !meta_path.exists() {
            return Ok(None);
        }

        let meta: EntryMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        if meta.key != key {
            debug!(cache = %self.name, key = %key, "Cache key hash collision, ignoring entry");
            return Ok(None);
        }

        let mut response = meta.response;
        response.body = fs::read(&body_path)?;

        Ok(Some(CacheEntry {
            response,
            stored_at: meta.stored_at,
        }))
    }

    /// Store a response under the request's key, replacing any previous entry.
    pub fn put(&self, request: &Request, response: &Response) -> Result<(), CacheError> {
        let key = request.cache_key();
        let (meta_path, body_path) = self.entry_paths(&key);

        let meta = EntryMeta {
            key,
            response: response.clone(),
            stored_at: Utc::now(),
        };

        // Body first, then metadata: an entry is only visible once both exist.
        write_atomic(&body_path, &response.body)?;
        write_atomic(&meta_path, serde_json::to_string_pretty(&meta)?.as_bytes())?;
        Ok(())
    }

    /// Number of stored entries
    pub fn len(&self) -> Result<usize, CacheError> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            if entry?.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CacheError> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or_default()
    ));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
