//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling and validation
//! - Checkpoint save/load utilities

pub mod checkpoint;
mod config;

pub use config::{ensure_config_exists, Algorithm, Config, DataConfig, ModelConfig, TrainConfig, ZDistribution};
