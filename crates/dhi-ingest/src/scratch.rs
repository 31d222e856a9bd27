//! Scratch persistence of intermediate datasets.
//!
//! Datasets are saved as CSV under their canonical column names and loaded
//! back through the normalizer, so values come back with the same types
//! and identity strings keep their leading zeros.

use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tracing::debug;

use dhi_model::{DhiError, HerdConfig, HerdDataset, Result};

use crate::normalize::Normalizer;
use crate::reader::{RawTable, read_raw_table};

/// A directory of saved datasets keyed by identifier.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| DhiError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `id`. Characters unsafe in file names become `_`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let safe: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.csv"))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.path_for(id).is_file()
    }

    /// Saves `dataset` under `id`, replacing any earlier save.
    pub fn save(&self, id: &str, dataset: &HerdDataset) -> Result<PathBuf> {
        let path = self.path_for(id);
        let table = RawTable::from_frame(&dataset.data)?;
        let mut writer = WriterBuilder::new()
            .flexible(false)
            .from_path(&path)
            .map_err(|source| DhiError::Csv {
                path: path.clone(),
                source,
            })?;
        for row in &table.rows {
            writer.write_record(row).map_err(|source| DhiError::Csv {
                path: path.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|e| DhiError::io(&path, e))?;
        debug!(id, rows = dataset.height(), path = %path.display(), "saved scratch dataset");
        Ok(path)
    }

    /// Loads the dataset saved under `id`.
    pub fn load(&self, id: &str, config: &HerdConfig) -> Result<HerdDataset> {
        let path = self.path_for(id);
        let table = read_raw_table(&path)?;
        let mut dataset = Normalizer::new(config).normalize_with_header(&table, 0, id)?;
        dataset.source_file = id.to_string();
        debug!(id, rows = dataset.height(), "loaded scratch dataset");
        Ok(dataset)
    }

    /// Deletes the dataset saved under `id`; a missing save is not an error.
    pub fn remove(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DhiError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use dhi_model::keys;

    use super::*;

    #[test]
    fn round_trip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::open(dir.path().join("scratch")).unwrap();
        let config = HerdConfig::default();
        let raw = RawTable::new(vec![
            vec!["牛场编号", "管理号", "胎次", "采样日期", "蛋白率", "日产奶量"]
                .into_iter()
                .map(String::from)
                .collect(),
            vec!["F1", "007", "2", "2024-03-05", "3.41", ""]
                .into_iter()
                .map(String::from)
                .collect(),
        ]);
        let original = Normalizer::new(&config).normalize_with_header(&raw, 0, "march.csv").unwrap();

        store.save("session/1", &original).unwrap();
        assert!(store.contains("session/1"));
        let loaded = store.load("session/1", &config).unwrap();
        assert!(original.data.equals_missing(&loaded.data));
        assert_eq!(
            loaded.text_values(keys::MANAGEMENT_ID).unwrap(),
            vec![Some("007".to_string())]
        );

        store.remove("session/1").unwrap();
        assert!(!store.contains("session/1"));
        store.remove("session/1").unwrap();
    }

    #[test]
    fn loading_unknown_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::open(dir.path()).unwrap();
        assert!(store.load("nope", &HerdConfig::default()).is_err());
    }
}
