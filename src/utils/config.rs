//! Configuration management
//!
//! One validated configuration struct for the entire training pipeline,
//! constructed once and passed by reference, never mutated afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Adversarial objective variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Binary cross-entropy on real/fake logits
    Standard,
    /// Wasserstein critic loss with gradient penalty
    WganGp,
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" | "gan" => Ok(Algorithm::Standard),
            "wgan-gp" | "wgan_gp" => Ok(Algorithm::WganGp),
            other => Err(Error::Config(format!("unknown algorithm: {other}"))),
        }
    }
}

/// Noise distribution for the latent vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZDistribution {
    /// Mean 0, std 1
    Normal,
    /// Range [-1, 1)
    Uniform,
}

impl FromStr for ZDistribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(ZDistribution::Normal),
            "uniform" => Ok(ZDistribution::Uniform),
            other => Err(Error::Config(format!(
                "z_distribution has unknown value: {other}"
            ))),
        }
    }
}

impl fmt::Display for ZDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZDistribution::Normal => write!(f, "normal"),
            ZDistribution::Uniform => write!(f, "uniform"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Class labels used for the first domain (duplicate-free)
    pub labels1: Vec<i64>,
    /// Class labels used for the second domain (duplicate-free)
    pub labels2: Vec<i64>,
    /// Reweight label draws so the union of the two sets stays balanced
    pub balance: bool,
    /// Mini-batch size
    pub mini_batch_size: i64,
    /// Sampled batches per epoch
    pub batches_per_epoch: usize,
    /// Directory holding the dataset and the cached label index
    pub data_dir: String,
}

/// Model-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Architecture registry key
    pub architecture: String,
    /// Adversarial objective
    pub algorithm: Algorithm,
    /// Auxiliary classification heads on the discriminator
    pub auxclas: bool,
    /// Feed conditioning vectors to both networks
    pub conditional: bool,
    /// Two domain branches with a shared trunk
    pub coupled: bool,
    /// Merge both domains into one uncoupled stream
    pub combined: bool,
    /// Category cardinality per auxiliary classification head
    pub categories: Vec<i64>,
    /// Latent vector length
    pub z_len: i64,
    /// Latent noise distribution
    pub z_distribution: ZDistribution,
    /// Square image side length
    pub img_size: i64,
    /// Image channels (1 for digits)
    pub img_channels: i64,
    /// Base width of the generator
    pub g_dim: i64,
    /// Base width of the discriminator
    pub d_dim: i64,
}

/// Training-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of epochs
    pub epochs: usize,
    /// Discriminator steps per generator cycle
    pub k: usize,
    /// Generator updates per cycle
    pub g_updates: usize,
    /// Retries allowed when a generator update reports non-finite loss
    pub max_g_retries: usize,
    /// Snapshot every N batches
    pub snap_step: usize,
    /// Generator learning rate
    pub gen_lr: f64,
    /// Discriminator learning rate
    pub disc_lr: f64,
    /// Gradient penalty coefficient (wgan-gp only)
    pub gp_weight: f64,
    /// Output directory for checkpoints, error history and images
    pub save_dir: String,
    /// Directory to load weights from when resuming
    pub load_dir: Option<String>,
    /// Epoch tag of the checkpoint to resume from; None means "latest"
    pub load_epoch: Option<usize>,
    /// Render image grids and the error plot at snapshots
    pub visualize: bool,
    /// Side length of the visualization grid
    pub vis_dim: i64,
    /// Device: "cpu" or "cuda"
    pub device: String,
    /// Seed for the process-wide random generator
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                labels1: (0..10).collect(),
                labels2: (0..10).collect(),
                balance: false,
                mini_batch_size: 64,
                batches_per_epoch: 500,
                data_dir: "data".to_string(),
            },
            model: ModelConfig {
                architecture: "cogan".to_string(),
                algorithm: Algorithm::Standard,
                auxclas: false,
                conditional: false,
                coupled: true,
                combined: false,
                categories: vec![10],
                z_len: 100,
                z_distribution: ZDistribution::Normal,
                img_size: 28,
                img_channels: 1,
                g_dim: 64,
                d_dim: 10,
            },
            training: TrainConfig {
                epochs: 25,
                k: 1,
                g_updates: 1,
                max_g_retries: 5,
                snap_step: 100,
                gen_lr: 2e-4,
                disc_lr: 2e-4,
                gp_weight: 10.0,
                save_dir: "out".to_string(),
                load_dir: None,
                load_epoch: None,
                visualize: true,
                vis_dim: 8,
                device: "cpu".to_string(),
                seed: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from TOML or JSON depending on the extension
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        if path.ends_with(".toml") {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Total width of the one-hot conditioning vector
    pub fn cond_len(&self) -> i64 {
        self.model.categories.iter().sum()
    }

    /// Validate configuration
    ///
    /// Every rejection here is fatal; nothing is logged-and-continued.
    pub fn validate(&self) -> Result<()> {
        let d = &self.data;
        let m = &self.model;
        let t = &self.training;

        if d.labels1.len() != d.labels1.iter().collect::<HashSet<_>>().len() {
            return Err(Error::Config("labels1 must not contain duplicates".into()));
        }
        if d.labels2.len() != d.labels2.iter().collect::<HashSet<_>>().len() {
            return Err(Error::Config("labels2 must not contain duplicates".into()));
        }
        if d.labels1.is_empty() || d.labels2.is_empty() {
            return Err(Error::Config("label sets must not be empty".into()));
        }
        if d.balance && d.labels1 != d.labels2 && d.labels1.len().abs_diff(d.labels2.len()) != 1 {
            return Err(Error::NotImplemented(
                "balancing for multiple missing labels is not implemented yet".into(),
            ));
        }
        if d.mini_batch_size <= 0 {
            return Err(Error::Config("mini_batch_size must be > 0".into()));
        }
        if d.batches_per_epoch == 0 {
            return Err(Error::Config("batches_per_epoch must be > 0".into()));
        }

        if m.coupled && m.combined {
            return Err(Error::Config(
                "invalid combination: coupled and combined are both set".into(),
            ));
        }
        if (m.auxclas || m.conditional)
            && (m.categories.is_empty() || m.categories.iter().any(|&c| c <= 0))
        {
            return Err(Error::Config(
                "auxclas/conditional require a non-empty list of positive category counts".into(),
            ));
        }
        if m.z_len <= 0 {
            return Err(Error::Config("z_len must be > 0".into()));
        }
        if m.img_channels <= 0 {
            return Err(Error::Config("img_channels must be > 0".into()));
        }
        // The conv stacks need the geometry to survive two stride-2
        // upsamplings on the generator side and two conv-then-pool stages
        // on the discriminator side.
        if m.img_size % 4 != 0 || (m.img_size - 4) % 2 != 0 || ((m.img_size - 4) / 2 - 4) / 2 < 1 {
            return Err(Error::Config(format!(
                "img_size {} is incompatible with the {} architecture",
                m.img_size, m.architecture
            )));
        }

        if t.epochs == 0 {
            return Err(Error::Config("epochs must be > 0".into()));
        }
        if t.k == 0 {
            return Err(Error::Config("k must be >= 1".into()));
        }
        if t.g_updates == 0 {
            return Err(Error::Config("g_updates must be >= 1".into()));
        }
        if t.snap_step == 0 {
            return Err(Error::Config("snap_step must be > 0".into()));
        }
        if t.max_g_retries == 0 {
            return Err(Error::Config("max_g_retries must be >= 1".into()));
        }

        Ok(())
    }
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists(path: &str) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Config::from_path(path)
    } else {
        let config = Config::default();
        if path.ends_with(".toml") {
            config.save_toml(path)?;
        } else {
            config.save_json(path)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.z_len, 100);
        assert!(config.model.coupled);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.data.labels1, loaded.data.labels1);
        assert_eq!(config.model.algorithm, loaded.model.algorithm);
        assert_eq!(config.model.z_distribution, loaded.model.z_distribution);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let mut config = Config::default();
        config.data.labels1 = vec![0, 1, 1];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_balance_gap_of_two_rejected() {
        let mut config = Config::default();
        config.data.balance = true;
        config.data.labels1 = vec![0, 1];
        config.data.labels2 = vec![0, 1, 2, 3];
        assert!(matches!(config.validate(), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_balance_gap_of_one_accepted() {
        let mut config = Config::default();
        config.data.balance = true;
        config.data.labels1 = vec![0, 1];
        config.data.labels2 = vec![0, 1, 2];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_coupled_combined_rejected() {
        let mut config = Config::default();
        config.model.coupled = true;
        config.model.combined = true;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_auxclas_requires_categories() {
        let mut config = Config::default();
        config.model.auxclas = true;
        config.model.categories = vec![];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_z_distribution_rejected() {
        let err = "triangular".parse::<ZDistribution>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            "uniform".parse::<ZDistribution>().unwrap(),
            ZDistribution::Uniform
        );
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        assert!("began".parse::<Algorithm>().is_err());
        assert_eq!("wgan-gp".parse::<Algorithm>().unwrap(), Algorithm::WganGp);
    }
}
