//! On-disk label index
//!
//! Maps each class label to the ordered dataset indices carrying it. The
//! index is built once by a full pass over the labels and cached as JSON
//! next to the data, so later runs skip the scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;

const INDEX_FILE: &str = "labels.json";

/// Label -> ordered dataset indices
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LabelIndex {
    map: BTreeMap<i64, Vec<usize>>,
}

impl LabelIndex {
    /// Build the index from a label-per-sample slice
    pub fn build(labels: &[i64]) -> Self {
        let mut map: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            map.entry(label).or_default().push(idx);
        }
        Self { map }
    }

    /// Load the cached index from `data_dir`, or build and cache it
    pub fn load_or_build(data_dir: &str, labels: &[i64]) -> Result<Self> {
        let path = Self::index_path(data_dir);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let index: LabelIndex = serde_json::from_str(&content)?;
            return Ok(index);
        }

        info!("Label index not found, scanning {} samples", labels.len());
        let index = Self::build(labels);
        index.save(data_dir)?;
        info!("Label index saved to {}", path.display());
        Ok(index)
    }

    /// Persist the index as JSON under `data_dir`
    pub fn save(&self, data_dir: &str) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string(self)?;
        std::fs::write(Self::index_path(data_dir), content)?;
        Ok(())
    }

    /// Dataset indices for `label`; empty when the label is absent
    pub fn indices(&self, label: i64) -> &[usize] {
        self.map.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct labels
    pub fn num_labels(&self) -> usize {
        self.map.len()
    }

    fn index_path(data_dir: &str) -> PathBuf {
        Path::new(data_dir).join(INDEX_FILE)
    }
}
