//! Paired-domain dataset
//!
//! Owns the image tensors for one or two domains over the same underlying
//! sample pool, the cached label index, and the per-domain label
//! probability tables. Batches are random label-directed combinations
//! rather than a fixed traversal order, so an epoch is simply a configured
//! number of sampled batches.
//!
//! Loading the raw tensors from disk and any edge-detection preprocessing
//! happen outside this crate; this type receives ready tensors scaled to
//! [-1, 1].

use rand::Rng;
use tch::Tensor;

use super::index::LabelIndex;
use super::sampler::{balanced_label_probs, uniform_label_probs, LabelProbs};
use crate::error::{Error, Result};
use crate::utils::Config;

/// One training mini-batch: real images and their labels per domain
#[derive(Debug)]
pub struct PairedBatch {
    /// Domain-1 images, shape (n, c, h, w)
    pub x1: Tensor,
    /// Domain-2 images when training two branches
    pub x2: Option<Tensor>,
    /// Domain-1 labels, shape (n,), int64
    pub c1: Tensor,
    /// Domain-2 labels when training two branches
    pub c2: Option<Tensor>,
}

/// Conditioning batch for the generator, one per domain
///
/// Categorical labels get one-hot encoded by the input assembler; raw
/// attribute vectors pass through as floats.
#[derive(Debug)]
pub enum CondBatch {
    /// Class labels, shape (n,) or (n, heads), int64
    Classes(Tensor),
    /// Raw multi-attribute float vectors, shape (n, width)
    Attributes(Tensor),
}

impl CondBatch {
    /// Underlying tensor, whichever variant
    pub fn tensor(&self) -> &Tensor {
        match self {
            CondBatch::Classes(t) | CondBatch::Attributes(t) => t,
        }
    }
}

/// Conditioning pair sampled once per batch and reused for both the
/// discriminator and generator updates of that batch
#[derive(Debug)]
pub struct CondPair {
    pub c1: CondBatch,
    pub c2: Option<CondBatch>,
}

/// Dataset over one or two image domains sharing a sample pool
pub struct PairedDataset {
    images1: Tensor,
    images2: Option<Tensor>,
    index: LabelIndex,
    probs1: LabelProbs,
    probs2: LabelProbs,
    mini_batch_size: i64,
    batches_per_epoch: usize,
}

impl PairedDataset {
    /// Create a dataset for the configured domain setup
    ///
    /// `images2` carries the second-domain rendition of the same samples
    /// (e.g. edge maps) and must be present when `coupled` is set. The
    /// label index is read from the cache in `data_dir` or built once.
    pub fn new(
        config: &Config,
        images1: Tensor,
        images2: Option<Tensor>,
        labels: Vec<i64>,
    ) -> Result<Self> {
        let n = images1.size()[0];
        if n as usize != labels.len() {
            return Err(Error::Config(format!(
                "image count {} does not match label count {}",
                n,
                labels.len()
            )));
        }
        if config.model.coupled && images2.is_none() {
            return Err(Error::Config(
                "coupled training requires second-domain images".into(),
            ));
        }

        let d = &config.data;
        let (probs1, probs2) = if d.balance && d.labels1 != d.labels2 {
            balanced_label_probs(&d.labels1, &d.labels2)?
        } else {
            (
                uniform_label_probs(&d.labels1),
                uniform_label_probs(&d.labels2),
            )
        };

        let index = LabelIndex::load_or_build(&d.data_dir, &labels)?;
        for &label in probs1.labels().iter().chain(probs2.labels()) {
            if index.indices(label).is_empty() {
                return Err(Error::Config(format!(
                    "configured label {label} has no samples in the dataset"
                )));
            }
        }

        Ok(Self {
            images1,
            images2,
            index,
            probs1,
            probs2,
            mini_batch_size: d.mini_batch_size,
            batches_per_epoch: d.batches_per_epoch,
        })
    }

    /// Merge two single-domain datasets into one uncoupled stream
    ///
    /// Both image tensors are concatenated along the sample axis and the
    /// label draw becomes uniform over the merged pool.
    pub fn combined(
        config: &Config,
        images_a: Tensor,
        labels_a: Vec<i64>,
        images_b: Tensor,
        labels_b: Vec<i64>,
    ) -> Result<Self> {
        let images1 = Tensor::cat(&[images_a, images_b], 0);
        let mut labels = labels_a;
        labels.extend(labels_b);

        let mut merged: Vec<i64> = config.data.labels1.clone();
        for &l in &config.data.labels2 {
            if !merged.contains(&l) {
                merged.push(l);
            }
        }
        let probs = uniform_label_probs(&merged);

        let index = LabelIndex::build(&labels);
        for &label in probs.labels() {
            if index.indices(label).is_empty() {
                return Err(Error::Config(format!(
                    "configured label {label} has no samples in the dataset"
                )));
            }
        }

        Ok(Self {
            images1,
            images2: None,
            index,
            probs1: probs.clone(),
            probs2: probs,
            mini_batch_size: config.data.mini_batch_size,
            batches_per_epoch: config.data.batches_per_epoch,
        })
    }

    /// Number of sampled batches that make up one epoch
    pub fn batches_per_epoch(&self) -> usize {
        self.batches_per_epoch
    }

    /// Configured mini-batch size
    pub fn mini_batch_size(&self) -> i64 {
        self.mini_batch_size
    }

    /// Whether batches carry a second domain
    pub fn has_second_domain(&self) -> bool {
        self.images2.is_some()
    }

    /// Domain-1 probability table
    pub fn probs1(&self) -> &LabelProbs {
        &self.probs1
    }

    /// Domain-2 probability table
    pub fn probs2(&self) -> &LabelProbs {
        &self.probs2
    }

    fn draw_indices<R: Rng + ?Sized>(
        &self,
        probs: &LabelProbs,
        n: usize,
        rng: &mut R,
    ) -> (Vec<i64>, Vec<i64>) {
        let mut indices = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let label = probs.sample(rng);
            let pool = self.index.indices(label);
            let idx = pool[rng.gen_range(0..pool.len())];
            indices.push(idx as i64);
            labels.push(label);
        }
        (indices, labels)
    }

    /// Sample one mini-batch of random label-directed combinations
    pub fn sample_batch<R: Rng + ?Sized>(&self, rng: &mut R) -> PairedBatch {
        let n = self.mini_batch_size as usize;

        let (idcs1, labels1) = self.draw_indices(&self.probs1, n, rng);
        let x1 = self.images1.index_select(0, &Tensor::from_slice(&idcs1));
        let c1 = Tensor::from_slice(&labels1);

        let (x2, c2) = match &self.images2 {
            Some(images2) => {
                let (idcs2, labels2) = self.draw_indices(&self.probs2, n, rng);
                let x2 = images2.index_select(0, &Tensor::from_slice(&idcs2));
                (Some(x2), Some(Tensor::from_slice(&labels2)))
            }
            None => (None, None),
        };

        PairedBatch { x1, x2, c1, c2 }
    }

    /// Sample conditioning labels for generated data, one draw per domain
    pub fn random_label_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> CondPair {
        let c1 = CondBatch::Classes(Tensor::from_slice(&self.probs1.sample_batch(n, rng)));
        let c2 = self
            .images2
            .is_some()
            .then(|| CondBatch::Classes(Tensor::from_slice(&self.probs2.sample_batch(n, rng))));
        CondPair { c1, c2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tch::Kind;

    fn test_config(dir: &str) -> Config {
        let mut config = Config::default();
        config.data.labels1 = vec![0, 1];
        config.data.labels2 = vec![0, 1];
        config.data.mini_batch_size = 4;
        config.data.batches_per_epoch = 3;
        config.data.data_dir = dir.to_string();
        config
    }

    fn toy_images(n: i64) -> Tensor {
        Tensor::zeros([n, 1, 28, 28], (Kind::Float, tch::Device::Cpu))
    }

    #[test]
    fn test_sample_batch_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap());
        let labels = vec![0, 1, 0, 1, 0, 1];
        let dataset = PairedDataset::new(
            &config,
            toy_images(6),
            Some(toy_images(6)),
            labels,
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let batch = dataset.sample_batch(&mut rng);
        assert_eq!(batch.x1.size(), vec![4, 1, 28, 28]);
        assert_eq!(batch.x2.as_ref().unwrap().size(), vec![4, 1, 28, 28]);
        assert_eq!(batch.c1.size(), vec![4]);
    }

    #[test]
    fn test_sampled_labels_respect_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap());
        let labels = vec![0, 1, 0, 1];
        let dataset =
            PairedDataset::new(&config, toy_images(4), Some(toy_images(4)), labels).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let cond = dataset.random_label_batch(64, &mut rng);
        let drawn: Vec<i64> = cond.c1.tensor().try_into().unwrap();
        assert!(drawn.iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_missing_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_str().unwrap());
        config.data.labels1 = vec![0, 1, 5];
        // no sample carries label 5
        let result = PairedDataset::new(&config, toy_images(4), Some(toy_images(4)), vec![0, 1, 0, 1]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_coupled_requires_second_domain() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap());
        let result = PairedDataset::new(&config, toy_images(4), None, vec![0, 1, 0, 1]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_combined_merges_pools() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_str().unwrap());
        config.model.coupled = false;
        config.model.combined = true;
        config.data.labels1 = vec![0];
        config.data.labels2 = vec![1];

        let dataset = PairedDataset::combined(
            &config,
            toy_images(2),
            vec![0, 0],
            toy_images(3),
            vec![1, 1, 1],
        )
        .unwrap();

        assert!(!dataset.has_second_domain());
        let mut rng = StdRng::seed_from_u64(5);
        let batch = dataset.sample_batch(&mut rng);
        assert_eq!(batch.x1.size()[0], 4);
        assert!(batch.x2.is_none());
    }
}
