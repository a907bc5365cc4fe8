use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::warn;

use opt_types::{Dimension, Settings, Trial};

/// A resumable snapshot of one session's search state (spec.md §4.6): the
/// space it was built from, the working bounds the sampler has narrowed to
/// so far, and every trial observed. Replayed through [`crate::Session::warm_start`]
/// to rebuild a `Session` without repeating the initial design.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub config_fingerprint: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub working_ranges: HashMap<String, (f64, f64)>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub history: Vec<Trial>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

/// Derives a 12-hex-character session id from a fingerprint of the
/// incoming configuration plus the current time, so identical configs
/// started seconds apart still get distinct ids.
pub fn generate_session_id(config_fingerprint: &str) -> String {
    let mut hasher = DefaultHasher::new();
    config_fingerprint.hash(&mut hasher);
    Utc::now().timestamp_nanos_opt().unwrap_or(0).hash(&mut hasher);
    format!("{:012x}", hasher.finish() & 0xFFFF_FFFF_FFFF)
}

/// Process-wide registry of live and persisted sessions. Mirrors the
/// in-memory-map-plus-JSON-file pattern used for routine storage elsewhere
/// in this codebase, scoped to one file per session instead of one shared
/// file, since sessions are created and retired far more often than
/// routines are.
pub struct SessionRegistry {
    state_dir: PathBuf,
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl SessionRegistry {
    pub fn new(state_dir: PathBuf) -> Self {
        SessionRegistry {
            state_dir,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.state_dir.join("sessions").join(format!("{id}.json"))
    }

    pub async fn create(&self, record: SessionRecord) {
        let mut guard = self.sessions.write().await;
        guard.insert(record.id.clone(), record);
    }

    pub async fn get(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.write().await.remove(id)
    }

    pub async fn list(&self) -> Vec<SessionRecord> {
        let mut rows: Vec<SessionRecord> = self.sessions.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    /// Writes a session's record to disk and updates the in-memory copy.
    /// A failed write leaves the in-memory copy untouched.
    pub async fn save(&self, record: SessionRecord) -> anyhow::Result<()> {
        let path = self.path_for(&record.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_string_pretty(&record)?;
        fs::write(&path, payload).await?;
        self.sessions.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    /// Loads a session's record from disk into the in-memory map, if a
    /// file for it exists. A corrupt file is logged and skipped rather
    /// than failing the caller.
    pub async fn load(&self, id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).await?;
        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => {
                self.sessions.write().await.insert(id.to_string(), record.clone());
                Ok(Some(record))
            }
            Err(error) => {
                warn!(session_id = id, %error, "discarding unreadable session record");
                Ok(None)
            }
        }
    }

    /// Loads every `*.json` file under the registry's session directory
    /// into the in-memory map, used at process startup to recover
    /// in-flight sessions across a restart.
    pub async fn load_all(&self) -> anyhow::Result<()> {
        let dir = self.state_dir.join("sessions");
        if !dir.exists() {
            return Ok(());
        }
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            self.load(id).await?;
        }
        Ok(())
    }

    pub async fn remove_file(&self, id: &str) -> anyhow::Result<()> {
        let path = self.path_for(id);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            config_fingerprint: "fp".to_string(),
            dimensions: Vec::new(),
            working_ranges: HashMap::new(),
            settings: None,
            history: Vec::new(),
            created_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn session_id_is_twelve_hex_chars() {
        let id = generate_session_id("fingerprint");
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path().to_path_buf());
        registry.save(record("abc123")).await.unwrap();

        let fresh = SessionRegistry::new(dir.path().to_path_buf());
        let loaded = fresh.load("abc123").await.unwrap();
        assert_eq!(loaded.unwrap().id, "abc123");
    }

    #[tokio::test]
    async fn remove_drops_the_in_memory_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path().to_path_buf());
        registry.create(record("x")).await;
        assert!(registry.get("x").await.is_some());
        registry.remove("x").await;
        assert!(registry.get("x").await.is_none());
    }
}
