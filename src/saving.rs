use bincode::{deserialize_from, serialize_into};
use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::downloader::ExportFormat;
use crate::error::{GraphError, GraphResult};
use crate::settings::TestSettings;
use crate::validation::is_valid_username;

lazy_static! {
    /// Serializes read-modify-write cycles on history index files
    static ref HISTORY_LOCK: Mutex<()> = Mutex::new(());
}

const INDEX_FILE: &str = "list.json";

/// Writes settings as gzip-compressed bincode
///
/// This function serializes the settings with bincode and compresses the
/// stream with gzip. The gzip trailer is written before returning, so the
/// file is complete once this succeeds.
///
/// # Arguments
/// * `settings` - Settings to store
/// * `path` - Destination file, created or truncated
///
/// # Returns
/// * `GraphResult<()>` - Success or an I/O / encoding error
///
/// # Examples
/// ```
/// use pressure_graph::saving::{load_settings, save_settings};
/// use pressure_graph::settings::{TestSettings, resolve_date_time};
///
/// let settings = TestSettings::new(
///     resolve_date_time("2025-10-31", "10:00:00").unwrap(),
///     resolve_date_time("2025-10-31", "14:00:00").unwrap(),
///     50.0,
///     60.0,
/// );
/// let path = std::env::temp_dir().join("pressure-graph-doc.bin.gz");
/// save_settings(&settings, &path).unwrap();
/// assert_eq!(load_settings(&path).unwrap(), settings);
/// # std::fs::remove_file(&path).ok();
/// ```
pub fn save_settings(settings: &TestSettings, path: impl AsRef<Path>) -> GraphResult<()> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, settings)?;
    writer.flush()?;
    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;

    Ok(())
}

/// Reads settings written by [`save_settings`]
///
/// # Arguments
/// * `path` - File to read
///
/// # Returns
/// * `GraphResult<TestSettings>` - The stored settings
///
/// # Errors
/// * [`GraphError::Io`] if the file cannot be opened or is not gzip
/// * [`GraphError::Encoding`] if the payload does not decode as settings
pub fn load_settings(path: impl AsRef<Path>) -> GraphResult<TestSettings> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let settings: TestSettings = deserialize_from(&mut reader)?;

    Ok(settings)
}

/// One generated graph in a user's history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub title: String,
    pub format: ExportFormat,
    pub created_at: NaiveDateTime,
    /// Size in bytes of the exported file
    pub file_size: u64,
}

/// File-backed history of generated graphs, one directory per user
///
/// Only the settings are stored; points are regenerated on demand.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, username: &str) -> GraphResult<PathBuf> {
        if !is_valid_username(username) {
            return Err(GraphError::NotFound(format!("user '{}'", username)));
        }
        Ok(self.root.join(username))
    }

    /// Canonical (lowercase, hyphenated) form of an entry id
    fn entry_id(id: &str) -> GraphResult<String> {
        Uuid::parse_str(id.trim())
            .map(|uuid| uuid.to_string())
            .map_err(|_| GraphError::NotFound(format!("history entry '{}'", id)))
    }

    fn settings_path(&self, username: &str, id: &str) -> GraphResult<PathBuf> {
        let id = Self::entry_id(id)?;
        Ok(self.user_dir(username)?.join(format!("{}.bin.gz", id)))
    }

    fn read_index(dir: &Path) -> GraphResult<Vec<HistoryEntry>> {
        let list_path = dir.join(INDEX_FILE);
        if !list_path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&list_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_index(dir: &Path, entries: &[HistoryEntry]) -> GraphResult<()> {
        fs::write(dir.join(INDEX_FILE), serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }

    /// Stores the settings behind a newly exported graph
    ///
    /// Writes `<id>.bin.gz` into the user's directory and appends an entry
    /// to its `list.json` index.
    ///
    /// # Arguments
    /// * `username` - Owner of the entry
    /// * `settings` - Settings the export was generated from
    /// * `format` - Format that was exported
    /// * `file_size` - Size of the exported file in bytes
    ///
    /// # Returns
    /// * `GraphResult<HistoryEntry>` - The new entry, with a fresh UUID
    pub fn record(
        &self,
        username: &str,
        settings: &TestSettings,
        format: ExportFormat,
        file_size: u64,
    ) -> GraphResult<HistoryEntry> {
        let dir = self.user_dir(username)?;
        let _guard = HISTORY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        create_dir_all(&dir)?;

        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            title: settings.display_title(),
            format,
            created_at: chrono::Utc::now().naive_utc(),
            file_size,
        };
        save_settings(settings, dir.join(format!("{}.bin.gz", entry.id)))?;

        let mut entries = Self::read_index(&dir)?;
        entries.push(entry.clone());
        Self::write_index(&dir, &entries)?;

        log::info!("Recorded history entry {} for {}", entry.id, username);
        Ok(entry)
    }

    /// Lists a user's history, newest first
    pub fn list(&self, username: &str) -> GraphResult<Vec<HistoryEntry>> {
        let dir = self.user_dir(username)?;
        let _guard = HISTORY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = Self::read_index(&dir)?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Loads the settings of one history entry
    pub fn load_settings(&self, username: &str, id: &str) -> GraphResult<TestSettings> {
        let path = self.settings_path(username, id)?;
        if !path.exists() {
            return Err(GraphError::NotFound(format!("history entry '{}'", id)));
        }
        load_settings(path)
    }

    /// Removes a history entry and its stored settings
    ///
    /// # Errors
    /// * [`GraphError::NotFound`] if the user has no entry with this id
    pub fn delete(&self, username: &str, id: &str) -> GraphResult<()> {
        let path = self.settings_path(username, id)?;
        let dir = self.user_dir(username)?;
        let id = Self::entry_id(id)?;
        let _guard = HISTORY_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = Self::read_index(&dir)?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Err(GraphError::NotFound(format!("history entry '{}'", id)));
        }
        Self::write_index(&dir, &entries)?;

        if path.exists() {
            fs::remove_file(&path)?;
        }
        log::info!("Deleted history entry {} for {}", id, username);
        Ok(())
    }
}
