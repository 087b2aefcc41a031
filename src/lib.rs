//! # Coupled GAN training for paired digit domains
//!
//! This crate provides a modular implementation of coupled and
//! conditional generative adversarial training on paired image domains,
//! such as digit images and their edge-detected counterparts.
//!
//! ## Modules
//!
//! - `data`: label-balanced sampling, the cached label index and the
//!   paired dataset/loader
//! - `model`: coupled generator/discriminator with shared trunks, the
//!   GAN container and the architecture registry
//! - `training`: the adversarial update engine, cadence policy, losses,
//!   input assembly and the epoch driver
//! - `vis`: snapshot image grids and the error plot
//! - `utils`: configuration and checkpoint handling

pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;
pub mod vis;

pub use data::{CondBatch, CondPair, LabelProbs, PairedBatch, PairedDataset, PairedLoader};
pub use error::{Error, Result};
pub use model::{GanModel, Generator, Discriminator};
pub use training::{ErrorStorage, GanTrainer, TrainingDriver, UpdateCadence};
pub use utils::{Algorithm, Config, ZDistribution};
pub use vis::Visualizer;
