use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use crate::settings::types::Preferences;

/// File name of the preferences file inside the config directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Preference load/save failures.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("preferences I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed preferences file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent preferences store with debounced saving.
pub struct PreferencesStore {
    path: PathBuf,
    data: Mutex<Preferences>,
    save_notify: Notify,
    is_dirty: AtomicBool,
}

impl PreferencesStore {
    /// Create a new store, loading from disk if the file exists.
    ///
    /// A malformed file is logged and replaced by defaults on the next save.
    pub fn new(path: PathBuf) -> Self {
        let data = Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("ignoring {}: {e}", path.display());
            Preferences::default()
        });
        Self {
            path,
            data: Mutex::new(data),
            save_notify: Notify::new(),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Load preferences from a JSON file, returning default on missing file.
    pub fn load(path: &Path) -> Result<Preferences, PreferencesError> {
        if !path.exists() {
            return Ok(Preferences::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save current preferences to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<(), PreferencesError> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string_pretty(&data)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current preferences.
    pub fn get(&self) -> Preferences {
        self.data.lock().clone()
    }

    /// Change preferences in place. Triggers a debounced save.
    pub fn update(&self, change: impl FnOnce(&mut Preferences)) {
        change(&mut *self.data.lock());
        self.is_dirty.store(true, Ordering::Release);
        self.save_notify.notify_one();
    }

    /// Whether there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Write pending changes now, if any.
    pub fn flush(&self) -> Result<(), PreferencesError> {
        if self.is_dirty.swap(false, Ordering::AcqRel) {
            self.save()?;
        }
        Ok(())
    }

    /// Start the debounce task: waits for dirty notification, sleeps 500ms, then saves.
    ///
    /// Uses an `AtomicBool` dirty flag to avoid losing notifications that arrive
    /// between `save()` completing and `notified().await` re-registering.
    pub fn start_debounce_task(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        runtime.spawn(async move {
            loop {
                store.save_notify.notified().await;
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                if let Err(e) = store.flush() {
                    tracing::warn!("Failed to save preferences: {e}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Helper: create a store backed by a temp directory.
    fn temp_store() -> (PreferencesStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        let store = PreferencesStore::new(path);
        (store, dir)
    }

    #[test]
    fn load_returns_default_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.json");
        let result = PreferencesStore::load(&path).unwrap();
        assert_eq!(result, Preferences::default());
    }

    #[test]
    fn load_parses_valid_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, r#"{"camera_host":"10.0.0.7","select_thumbnail":true}"#).unwrap();

        let result = PreferencesStore::load(&path).unwrap();
        assert_eq!(result.camera_host.as_deref(), Some("10.0.0.7"));
        assert!(result.select_thumbnail);
    }

    #[test]
    fn load_returns_error_for_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "not valid json!!!").unwrap();

        assert!(matches!(
            PreferencesStore::load(&path),
            Err(PreferencesError::Json(_))
        ));
    }

    #[test]
    fn new_falls_back_to_defaults_on_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        std::fs::write(&path, "{").unwrap();

        let store = PreferencesStore::new(path);
        assert_eq!(store.get(), Preferences::default());
    }

    #[test]
    fn save_round_trips_through_load() {
        let (store, dir) = temp_store();
        store.update(|p| {
            p.camera_host = Some("printer.local".to_string());
            p.last_thumbnail_folder = Some(dir.path().to_path_buf());
        });
        store.save().unwrap();

        let loaded = PreferencesStore::load(&dir.path().join(PREFERENCES_FILE)).unwrap();
        assert_eq!(loaded, store.get());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deep").join(PREFERENCES_FILE);
        let store = PreferencesStore::new(path.clone());
        store.save().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn save_is_atomic() {
        let (store, dir) = temp_store();
        store.save().unwrap();

        // After a successful save, no .tmp file should remain
        let tmp_path = dir.path().join("preferences.json.tmp");
        assert!(
            !tmp_path.exists(),
            ".tmp file should be cleaned up after rename"
        );
    }

    #[test]
    fn update_marks_dirty_and_flush_clears_it() {
        let (store, dir) = temp_store();
        assert!(!store.is_dirty());

        store.update(|p| p.camera_port = 8080);
        assert!(store.is_dirty());

        store.flush().unwrap();
        assert!(!store.is_dirty());
        let loaded = PreferencesStore::load(&dir.path().join(PREFERENCES_FILE)).unwrap();
        assert_eq!(loaded.camera_port, 8080);
    }

    #[test]
    fn flush_without_changes_writes_nothing() {
        let (store, dir) = temp_store();
        store.flush().unwrap();
        assert!(!dir.path().join(PREFERENCES_FILE).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_task_saves_after_delay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        let store = Arc::new(PreferencesStore::new(path.clone()));
        let task = store.start_debounce_task(&tokio::runtime::Handle::current());

        store.update(|p| p.select_thumbnail = true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!path.exists(), "save must wait for the debounce delay");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(path.exists());
        assert!(PreferencesStore::load(&path).unwrap().select_thumbnail);
        task.abort();
    }
}
