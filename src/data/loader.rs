//! Loader yielding sampled mini-batches for one epoch
//!
//! The dataset draws random label-directed combinations, so the loader
//! does not shuffle indices; it just counts out the configured number of
//! batches per epoch and resets.

use rand::rngs::StdRng;

use super::dataset::{PairedBatch, PairedDataset};

/// Per-epoch batch source over a [`PairedDataset`]
pub struct PairedLoader<'a> {
    dataset: &'a PairedDataset,
    current: usize,
}

impl<'a> PairedLoader<'a> {
    /// Create a loader positioned at the start of an epoch
    pub fn new(dataset: &'a PairedDataset) -> Self {
        Self {
            dataset,
            current: 0,
        }
    }

    /// Number of batches per epoch
    pub fn num_batches(&self) -> usize {
        self.dataset.batches_per_epoch()
    }

    /// Reset for a new epoch
    pub fn reset(&mut self) {
        self.current = 0;
    }

    /// Next batch, or None when the epoch is complete
    pub fn next_batch(&mut self, rng: &mut StdRng) -> Option<PairedBatch> {
        if self.current >= self.dataset.batches_per_epoch() {
            return None;
        }
        self.current += 1;
        Some(self.dataset.sample_batch(rng))
    }
}
