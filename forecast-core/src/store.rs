use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde_json::Value;

use crate::{error::PipelineError, model::IconPayload};

/// Logical name of the annotated forecast document.
pub const FORECAST_DOCUMENT: &str = "Forecast_data";

/// Logical name of the description -> icon summary document.
pub const CONDITIONS_DOCUMENT: &str = "weather_conditions";

/// Logical name of the hourly temperature archive document.
pub const HISTORY_DOCUMENT: &str = "History_data";

/// JSON documents addressed by logical name.
pub trait DocumentStore: Send + Sync {
    fn load_document(&self, name: &str) -> Result<Value, PipelineError>;
    fn store_document(&self, name: &str, value: &Value) -> Result<(), PipelineError>;
}

/// Stores each document as `<dir>/<name>.json`.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, name: &str) -> PathBuf {
        if name.ends_with(".json") {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{name}.json"))
        }
    }
}

impl DocumentStore for JsonFileStore {
    fn load_document(&self, name: &str) -> Result<Value, PipelineError> {
        let path = self.document_path(name);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map_err(|e| PipelineError::persistence(name, e))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
            .map_err(|e| PipelineError::persistence(name, e))
    }

    fn store_document(&self, name: &str, value: &Value) -> Result<(), PipelineError> {
        let path = self.document_path(name);
        serde_json::to_vec_pretty(value)
            .context("Failed to serialize document")
            .and_then(|bytes| write_atomic(&self.dir, &path, &bytes))
            .map_err(|e| PipelineError::persistence(name, e))?;
        tracing::debug!(document = name, path = %path.display(), "Stored document");
        Ok(())
    }
}

/// Writes fetched icons as `<dir>/{code}_day.png` and `<dir>/{code}_night.png`.
#[derive(Debug, Clone)]
pub struct IconFileSink {
    dir: PathBuf,
}

impl IconFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The `icons` directory next to the store's data directory.
    pub fn beside(store: &JsonFileStore) -> Self {
        let data_dir = store.dir();
        Self::new(data_dir.parent().unwrap_or(data_dir).join("icons"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn icon_paths(&self, icon_code: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{icon_code}_day.png")),
            self.dir.join(format!("{icon_code}_night.png")),
        )
    }

    /// Write both images of every payload; returns the number of files written.
    pub fn write_icons(&self, icons: &BTreeMap<String, IconPayload>) -> Result<usize, PipelineError> {
        for (code, payload) in icons {
            let (day, night) = self.icon_paths(code);
            for (path, bytes) in [(&day, &payload.day_bytes), (&night, &payload.night_bytes)] {
                write_atomic(&self.dir, path, bytes)
                    .map_err(|e| PipelineError::persistence(path.display().to_string(), e))?;
            }
        }

        tracing::info!(dir = %self.dir.display(), icons = icons.len(), "Wrote icon files");
        Ok(icons.len() * 2)
    }
}

/// Write `bytes` to a temp file in `dir`, then rename it over `path`.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write temp file")?;
    tmp.flush().context("Failed to flush temp file")?;
    tmp.as_file().sync_all().context("Failed to sync temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::{collections::HashMap, sync::Mutex};

    /// Keeps documents in memory; names listed in `failing` refuse writes.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub docs: Mutex<HashMap<String, Value>>,
        pub writes: Mutex<Vec<String>>,
        pub failing: Vec<String>,
    }

    impl MemoryStore {
        pub(crate) fn get(&self, name: &str) -> Option<Value> {
            self.docs.lock().unwrap().get(name).cloned()
        }
    }

    impl DocumentStore for MemoryStore {
        fn load_document(&self, name: &str) -> Result<Value, PipelineError> {
            self.get(name).ok_or_else(|| PipelineError::persistence(name, "not found"))
        }

        fn store_document(&self, name: &str, value: &Value) -> Result<(), PipelineError> {
            if self.failing.iter().any(|n| n == name) {
                return Err(PipelineError::persistence(name, "read-only"));
            }
            self.writes.lock().unwrap().push(name.to_string());
            self.docs.lock().unwrap().insert(name.to_string(), value.clone());
            Ok(())
        }
    }

    #[test]
    fn store_then_load_by_logical_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data_files"));
        let doc = json!({"Clear Sky": {"Icon Code": "01d"}});

        store.store_document("weather_conditions", &doc).unwrap();

        assert!(dir.path().join("data_files/weather_conditions.json").is_file());
        assert_eq!(store.load_document("weather_conditions").unwrap(), doc);
        assert_eq!(store.load_document("weather_conditions.json").unwrap(), doc);
    }

    #[test]
    fn overwrite_replaces_whole_document_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.store_document(FORECAST_DOCUMENT, &json!([1, 2, 3])).unwrap();
        store.store_document(FORECAST_DOCUMENT, &json!([4])).unwrap();

        assert_eq!(store.load_document(FORECAST_DOCUMENT).unwrap(), json!([4]));
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_document_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let err = store.load_document("nope").unwrap_err();
        assert!(matches!(err, PipelineError::PersistenceError { ref document, .. } if document == "nope"));
    }

    fn payload(code: &str, description: &str) -> IconPayload {
        IconPayload {
            description: description.into(),
            icon_code: code.into(),
            day_bytes: format!("png:{code}").into_bytes(),
            night_bytes: format!("png:{}", crate::model::night_variant(code)).into_bytes(),
        }
    }

    #[test]
    fn icon_files_land_next_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data_files"));
        let sink = IconFileSink::beside(&store);
        let icons: BTreeMap<_, _> = [("01d", "Clear Sky"), ("10d", "Rain")]
            .into_iter()
            .map(|(c, d)| (c.to_string(), payload(c, d)))
            .collect();

        assert_eq!(sink.write_icons(&icons).unwrap(), 4);

        assert_eq!(sink.dir(), dir.path().join("icons"));
        assert_eq!(fs::read(dir.path().join("icons/01d_day.png")).unwrap(), b"png:01d");
        assert_eq!(fs::read(dir.path().join("icons/10d_night.png")).unwrap(), b"png:10n");
        assert_eq!(fs::read_dir(sink.dir()).unwrap().count(), 4);
    }

    #[test]
    fn rewriting_icons_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let sink = IconFileSink::new(dir.path());
        let mut icons = BTreeMap::from([("04d".to_string(), payload("04d", "Broken Clouds"))]);
        sink.write_icons(&icons).unwrap();

        icons.get_mut("04d").unwrap().day_bytes = b"new".to_vec();
        sink.write_icons(&icons).unwrap();

        let (day, _) = sink.icon_paths("04d");
        assert_eq!(fs::read(day).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn unwritable_icon_dir_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("icons");
        fs::write(&blocker, "not a directory").unwrap();
        let sink = IconFileSink::new(&blocker);
        let icons = BTreeMap::from([("13d".to_string(), payload("13d", "Snow"))]);

        let err = sink.write_icons(&icons).unwrap_err();
        assert!(matches!(err, PipelineError::PersistenceError { ref document, .. } if document.ends_with("13d_day.png")));
    }

    #[test]
    fn corrupt_document_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path());

        let err = store.load_document("broken").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
