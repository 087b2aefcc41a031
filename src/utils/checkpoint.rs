//! Checkpoint save/load utilities
//!
//! Weight blobs are written as `{prefix}generator.pt` and
//! `{prefix}discriminator.pt`, where the prefix is `{epoch}_` for
//! epoch-tagged saves and empty for the rolling "latest" pair. Writes go
//! through a temporary file and a rename so a crash never leaves a
//! half-written checkpoint behind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tch::nn::VarStore;
use tracing::info;

use crate::error::Result;

/// Which network a weight blob belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Generator,
    Discriminator,
}

impl Role {
    fn stem(self) -> &'static str {
        match self {
            Role::Generator => "generator",
            Role::Discriminator => "discriminator",
        }
    }
}

/// File name for a weight blob, e.g. `7_generator.pt` or `generator.pt`
pub fn weight_file(role: Role, epoch: Option<usize>) -> String {
    match epoch {
        Some(e) => format!("{}_{}.pt", e, role.stem()),
        None => format!("{}.pt", role.stem()),
    }
}

/// Persist a variable store under `dir` with the epoch-derived prefix
pub fn save_var_store(vs: &VarStore, dir: &str, role: Role, epoch: Option<usize>) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = Path::new(dir).join(weight_file(role, epoch));
    let tmp = path.with_extension("pt.tmp");
    vs.save(&tmp)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Load a variable store saved with the same prefix from `dir`
pub fn load_var_store(
    vs: &mut VarStore,
    dir: &str,
    role: Role,
    epoch: Option<usize>,
) -> Result<()> {
    let path = Path::new(dir).join(weight_file(role, epoch));
    vs.load(&path)?;
    Ok(())
}

/// Checkpoint metadata written next to the weight blobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Epoch the snapshot was taken in
    pub epoch: usize,
    /// Batch index within the epoch
    pub batch: usize,
    /// Timestamp of the save
    pub timestamp: String,
}

/// Write snapshot metadata as `meta.json` under `dir`
pub fn save_meta(dir: &str, epoch: usize, batch: usize) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let meta = CheckpointMeta {
        epoch,
        batch,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    let path = Path::new(dir).join("meta.json");
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(&meta)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Read snapshot metadata from `dir`
pub fn load_meta(dir: &str) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(Path::new(dir).join("meta.json"))?;
    Ok(serde_json::from_str(&content)?)
}

/// Highest epoch tag among the saved generator blobs in `dir`
pub fn latest_epoch(dir: &str) -> Option<usize> {
    let entries = std::fs::read_dir(Path::new(dir)).ok()?;
    let mut latest: Option<usize> = None;
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let name = name.to_str()?;
        if let Some(prefix) = name.strip_suffix("_generator.pt") {
            if let Ok(epoch) = prefix.parse::<usize>() {
                latest = Some(latest.map_or(epoch, |l: usize| l.max(epoch)));
            }
        }
    }
    if latest.is_some() {
        info!("Latest epoch checkpoint in {dir}: {}", latest.unwrap());
    }
    latest
}

/// Paths of both weight blobs for a given prefix
pub fn weight_paths(dir: &str, epoch: Option<usize>) -> (PathBuf, PathBuf) {
    (
        Path::new(dir).join(weight_file(Role::Generator, epoch)),
        Path::new(dir).join(weight_file(Role::Discriminator, epoch)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn, Device};

    #[test]
    fn test_weight_file_names() {
        assert_eq!(weight_file(Role::Generator, None), "generator.pt");
        assert_eq!(weight_file(Role::Generator, Some(4)), "4_generator.pt");
        assert_eq!(
            weight_file(Role::Discriminator, Some(12)),
            "12_discriminator.pt"
        );
    }

    #[test]
    fn test_var_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().to_str().unwrap();

        let vs = nn::VarStore::new(Device::Cpu);
        let w = vs.root().randn("w", &[4, 4], 0.0, 1.0);
        save_var_store(&vs, dir, Role::Generator, Some(2)).unwrap();

        let mut vs2 = nn::VarStore::new(Device::Cpu);
        let w2 = vs2.root().zeros("w", &[4, 4]);
        load_var_store(&mut vs2, dir, Role::Generator, Some(2)).unwrap();

        let diff: f64 = (&w - &w2).abs().sum(tch::Kind::Float).double_value(&[]);
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_load_missing_prefix_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().to_str().unwrap();

        let vs = nn::VarStore::new(Device::Cpu);
        vs.root().zeros("w", &[2]);
        save_var_store(&vs, dir, Role::Generator, None).unwrap();

        let mut vs2 = nn::VarStore::new(Device::Cpu);
        vs2.root().zeros("w", &[2]);
        assert!(load_var_store(&mut vs2, dir, Role::Generator, Some(9)).is_err());
    }

    #[test]
    fn test_latest_epoch_scan() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().to_str().unwrap();

        let vs = nn::VarStore::new(Device::Cpu);
        vs.root().zeros("w", &[2]);
        save_var_store(&vs, dir, Role::Generator, None).unwrap();
        save_var_store(&vs, dir, Role::Generator, Some(1)).unwrap();
        save_var_store(&vs, dir, Role::Generator, Some(10)).unwrap();

        assert_eq!(latest_epoch(dir), Some(10));
    }

    #[test]
    fn test_meta_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().to_str().unwrap();

        save_meta(dir, 3, 250).unwrap();
        let meta = load_meta(dir).unwrap();
        assert_eq!(meta.epoch, 3);
        assert_eq!(meta.batch, 250);
    }
}
