//! Data module for paired-domain sampling
//!
//! This module provides:
//! - Label probability tables with optional cross-domain balancing
//! - The cached label -> indices lookup
//! - The paired dataset and its per-epoch batch loader

mod dataset;
mod index;
mod loader;
mod sampler;

pub use dataset::{CondBatch, CondPair, PairedBatch, PairedDataset};
pub use index::LabelIndex;
pub use loader::PairedLoader;
pub use sampler::{balanced_label_probs, uniform_label_probs, LabelProbs};
