//! Auxiliary classifier evaluation
//!
//! Measures how well the discriminator's class heads predict the labels
//! of real samples, per domain branch and per category head. Only
//! meaningful when `auxclas` is set.

use rand::rngs::StdRng;
use tracing::info;

use crate::data::PairedDataset;
use crate::error::{Error, Result};
use crate::model::{DiscInput, GanModel};
use crate::utils::Config;

/// Per-class hit counts for one category head
#[derive(Debug, Clone)]
pub struct HeadAccuracy {
    /// Samples seen per class
    pub counts: Vec<usize>,
    /// Correct predictions per class
    pub correct: Vec<usize>,
}

impl HeadAccuracy {
    fn new(classes: usize) -> Self {
        Self {
            counts: vec![0; classes],
            correct: vec![0; classes],
        }
    }

    /// Accuracy over all classes of this head
    pub fn total_accuracy(&self) -> f64 {
        let seen: usize = self.counts.iter().sum();
        if seen == 0 {
            return 0.0;
        }
        let hit: usize = self.correct.iter().sum();
        hit as f64 / seen as f64
    }

    /// Accuracy for one class, or None when it never occurred
    pub fn class_accuracy(&self, class: usize) -> Option<f64> {
        let seen = *self.counts.get(class)?;
        if seen == 0 {
            return None;
        }
        Some(self.correct[class] as f64 / seen as f64)
    }
}

/// Evaluate the discriminator's class heads on real samples
///
/// Draws `batches_per_epoch` batches and tallies predictions against the
/// true labels. Returns one [`HeadAccuracy`] per category head and
/// domain branch, domain-major.
pub fn evaluate_classifier(
    config: &Config,
    model: &GanModel,
    dataset: &PairedDataset,
    rng: &mut StdRng,
) -> Result<Vec<Vec<HeadAccuracy>>> {
    if !config.model.auxclas {
        return Err(Error::Config(
            "classifier evaluation requires auxclas".into(),
        ));
    }

    let categories = &config.model.categories;
    let num_domains = if dataset.has_second_domain() { 2 } else { 1 };
    let mut results: Vec<Vec<HeadAccuracy>> = (0..num_domains)
        .map(|_| {
            categories
                .iter()
                .map(|&c| HeadAccuracy::new(c as usize))
                .collect()
        })
        .collect();

    for _ in 0..dataset.batches_per_epoch() {
        let batch = dataset.sample_batch(rng);

        for domain in 0..num_domains {
            let (x, labels) = if domain == 0 {
                (&batch.x1, &batch.c1)
            } else {
                (
                    batch.x2.as_ref().expect("second domain present"),
                    batch.c2.as_ref().expect("second domain present"),
                )
            };
            let x = x.to_device(model.device());

            let out = if domain == 0 {
                model.discriminator.forward(DiscInput::A { x: &x, c: None })
            } else {
                model.discriminator.forward(DiscInput::B { x: &x, c: None })
            };
            let branch = out
                .branches()
                .into_iter()
                .next()
                .expect("requested branch ran");
            let class_logits = branch
                .class
                .as_ref()
                .expect("auxclas discriminator has class heads");

            let labels: Vec<i64> = labels.try_into()?;
            for (head, logits) in class_logits.iter().enumerate() {
                let preds: Vec<i64> = logits.argmax(1, false).try_into()?;
                let tally = &mut results[domain][head];
                for (&label, &pred) in labels.iter().zip(preds.iter()) {
                    let class = label as usize;
                    if class < tally.counts.len() {
                        tally.counts[class] += 1;
                        if pred == label {
                            tally.correct[class] += 1;
                        }
                    }
                }
            }
        }
    }

    for (domain, heads) in results.iter().enumerate() {
        for (head, tally) in heads.iter().enumerate() {
            info!(
                "Domain {domain} head {head}: accuracy {:.2}% over {} samples",
                100.0 * tally.total_accuracy(),
                tally.counts.iter().sum::<usize>()
            );
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tch::{Device, Kind, Tensor};

    #[test]
    fn test_evaluation_counts_all_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.labels1 = vec![0, 1];
        config.data.labels2 = vec![0, 1];
        config.data.mini_batch_size = 2;
        config.data.batches_per_epoch = 4;
        config.data.data_dir = dir.path().to_str().unwrap().to_string();
        config.model.auxclas = true;
        config.model.categories = vec![10];
        config.model.g_dim = 4;
        config.model.d_dim = 2;
        config.model.z_len = 8;

        let images = Tensor::zeros([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        let edges = Tensor::zeros([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        let dataset =
            PairedDataset::new(&config, images, Some(edges), vec![0, 1, 0, 1]).unwrap();
        let model = GanModel::new(&config, Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        let results = evaluate_classifier(&config, &model, &dataset, &mut rng).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].len(), 1);
        // 4 batches of 2 samples per domain
        assert_eq!(results[0][0].counts.iter().sum::<usize>(), 8);
    }

    #[test]
    fn test_evaluation_requires_auxclas() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.data_dir = dir.path().to_str().unwrap().to_string();
        config.model.g_dim = 4;
        config.model.d_dim = 2;

        let images = Tensor::zeros([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let edges = Tensor::zeros([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let mut labels_config = config.clone();
        labels_config.data.labels1 = vec![0, 1];
        labels_config.data.labels2 = vec![0, 1];
        let dataset =
            PairedDataset::new(&labels_config, images, Some(edges), vec![0, 1]).unwrap();
        let model = GanModel::new(&config, Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        assert!(evaluate_classifier(&config, &model, &dataset, &mut rng).is_err());
    }
}
