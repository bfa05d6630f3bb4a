use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::transpile::Transpiler;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub hash: String,
    pub code: String,
}

/// Content-addressed store of transpiled output, one JSON entry per output
/// file. Entries are only reused when every input that shapes the output
/// (source text, output location, router location, env values, virtual
/// specifiers) is unchanged.
pub struct IncrementalCache {
    cache_dir: PathBuf,
    fingerprint: String,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl Into<PathBuf>, transpiler: &Transpiler) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            if let Err(e) = fs::create_dir_all(&cache_dir) {
                tracing::warn!(dir = %cache_dir.display(), "Transpile cache unavailable: {e}");
            }
        }
        Self {
            cache_dir,
            fingerprint: Self::fingerprint(transpiler),
        }
    }

    pub fn compute_hash(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    fn fingerprint(transpiler: &Transpiler) -> String {
        let specifiers = transpiler.specifiers();
        let mut parts = vec![
            env!("CARGO_PKG_VERSION"),
            specifiers.router.as_str(),
            specifiers.styles.as_str(),
            specifiers.ui_library.as_str(),
        ];
        for (key, value) in transpiler.env() {
            parts.push(key);
            parts.push(value);
        }
        Self::compute_hash(&parts)
    }

    fn entry_hash(&self, source: &str, output_path: &Path, router_path: &Path) -> String {
        Self::compute_hash(&[
            &self.fingerprint,
            &output_path.to_string_lossy(),
            &router_path.to_string_lossy(),
            source,
        ])
    }

    fn get_cache_path(&self, output_path: &Path) -> PathBuf {
        let name = Self::compute_hash(&[&output_path.to_string_lossy()]);
        self.cache_dir.join(format!("{}.json", name))
    }

    pub fn get(&self, source: &str, output_path: &Path, router_path: &Path) -> Option<String> {
        let cache_path = self.get_cache_path(output_path);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(file = %output_path.display(), "Discarding corrupt cache entry: {e}");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == self.entry_hash(source, output_path, router_path) {
            Some(entry.code)
        } else {
            None
        }
    }

    pub fn set(&self, source: &str, output_path: &Path, router_path: &Path, code: &str) {
        let cache_path = self.get_cache_path(output_path);
        let entry = CacheEntry {
            hash: self.entry_hash(source, output_path, router_path),
            code: code.to_string(),
        };

        if let Ok(data) = serde_json::to_string(&entry) {
            if let Err(e) = fs::write(&cache_path, data) {
                tracing::debug!(file = %cache_path.display(), "Cache write skipped: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvValues, Specifiers};

    fn transpiler(api: &str) -> Transpiler {
        let mut env = EnvValues::new();
        env.insert("API".to_string(), api.to_string());
        Transpiler::new(Specifiers::default(), env)
    }

    #[test]
    fn test_hit_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path(), &transpiler("a"));
        let out = Path::new("/c/pages/index.js");
        let router = Path::new("/c/router.js");

        assert_eq!(cache.get("src", out, router), None);
        cache.set("src", out, router, "compiled");
        assert_eq!(cache.get("src", out, router).as_deref(), Some("compiled"));
        assert_eq!(cache.get("changed", out, router), None);
    }

    #[test]
    fn test_env_change_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let out = Path::new("/c/pages/index.js");
        let router = Path::new("/c/router.js");

        IncrementalCache::new(dir.path(), &transpiler("a")).set("src", out, router, "v1");
        let cache = IncrementalCache::new(dir.path(), &transpiler("b"));
        assert_eq!(cache.get("src", out, router), None);
    }

    #[test]
    fn test_corrupt_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path(), &transpiler("a"));
        let out = Path::new("/c/a.js");
        let router = Path::new("/c/router.js");

        let path = cache.get_cache_path(out);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(cache.get("src", out, router), None);
        assert!(!path.exists());
    }
}
