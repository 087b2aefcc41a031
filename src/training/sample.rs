//! Noise sampling and generator input assembly
//!
//! Builds the ordered input tuple for the generator: always the latent
//! noise, then the conditioning vector(s) when the configuration asks for
//! them. Categorical labels are one-hot encoded per category head; raw
//! attribute vectors pass through as floats.

use tch::{Device, Kind, Tensor};

use crate::data::{CondBatch, CondPair};
use crate::model::GeneratorInput;
use crate::utils::{Config, ZDistribution};

/// Fill `z` in place from the configured noise distribution
pub fn sample_z(distribution: ZDistribution, z: &mut Tensor) {
    match distribution {
        ZDistribution::Normal => {
            let _ = z.normal_(0.0, 1.0);
        }
        ZDistribution::Uniform => {
            let _ = z.uniform_(-1.0, 1.0);
        }
    }
}

/// Concatenated one-hot encoding over all category heads
///
/// `labels` has shape (n,) for a single head or (n, heads); the result is
/// (n, sum(categories)) float.
pub fn to_one_hot(categories: &[i64], labels: &Tensor) -> Tensor {
    let labels = if labels.dim() == 1 {
        labels.unsqueeze(1)
    } else {
        labels.shallow_clone()
    };

    let encoded: Vec<Tensor> = categories
        .iter()
        .enumerate()
        .map(|(head, &cats)| labels.select(1, head as i64).onehot(cats))
        .collect();
    Tensor::cat(&encoded, 1).to_kind(Kind::Float)
}

fn encode(config: &Config, cond: &CondBatch, device: Device) -> Tensor {
    match cond {
        CondBatch::Classes(labels) => {
            to_one_hot(&config.model.categories, labels).to_device(device)
        }
        CondBatch::Attributes(attrs) => attrs.to_kind(Kind::Float).to_device(device),
    }
}

/// Assemble the generator input for one update step
///
/// Noise is freshly sampled on every call; the conditioning pair is
/// whatever the caller sampled for the current batch. The tuple layout is
/// (z), (z, c1) or (z, c1, c2) depending on `auxclas`/`conditional` and
/// `coupled`.
pub fn sample_generator_input(
    config: &Config,
    batch_size: i64,
    c_fake: Option<&CondPair>,
    device: Device,
) -> GeneratorInput {
    let mut z = Tensor::zeros([batch_size, config.model.z_len], (Kind::Float, device));
    sample_z(config.model.z_distribution, &mut z);

    let mut cond1 = None;
    let mut cond2 = None;
    if config.model.auxclas || config.model.conditional {
        let pair = c_fake.expect("conditional input requested without a conditioning batch");
        cond1 = Some(encode(config, &pair.c1, device));
        if config.model.coupled {
            let c2 = pair
                .c2
                .as_ref()
                .expect("coupled conditional input requires a second conditioning batch");
            cond2 = Some(encode(config, c2, device));
        }
    }

    GeneratorInput { z, cond1, cond2 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[i64]) -> Tensor {
        Tensor::from_slice(v)
    }

    #[test]
    fn test_one_hot_single_head() {
        let encoded = to_one_hot(&[4], &labels(&[0, 3, 1]));
        assert_eq!(encoded.size(), vec![3, 4]);

        let row: Vec<f32> = encoded.get(1).try_into().unwrap();
        assert_eq!(row, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_one_hot_multi_head_width() {
        let stacked = Tensor::stack(&[labels(&[1, 0]), labels(&[2, 1])], 0);
        let encoded = to_one_hot(&[3, 2], &stacked);
        assert_eq!(encoded.size(), vec![2, 5]);
    }

    #[test]
    fn test_uncoupled_auxclas_tuple_len() {
        let mut config = Config::default();
        config.model.coupled = false;
        config.model.auxclas = true;
        config.model.categories = vec![4];

        let pair = CondPair {
            c1: CondBatch::Classes(labels(&[0, 1])),
            c2: None,
        };
        let input = sample_generator_input(&config, 2, Some(&pair), Device::Cpu);

        assert_eq!(input.len(), 2);
        assert_eq!(input.cond1.as_ref().unwrap().size(), vec![2, 4]);
    }

    #[test]
    fn test_coupled_auxclas_tuple_len() {
        let mut config = Config::default();
        config.model.auxclas = true;
        config.model.categories = vec![4];

        let pair = CondPair {
            c1: CondBatch::Classes(labels(&[0, 1])),
            c2: Some(CondBatch::Classes(labels(&[2, 3]))),
        };
        let input = sample_generator_input(&config, 2, Some(&pair), Device::Cpu);

        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_unconditional_tuple_is_noise_only() {
        let config = Config::default();
        let input = sample_generator_input(&config, 3, None, Device::Cpu);
        assert_eq!(input.len(), 1);
        assert_eq!(input.z.size(), vec![3, 100]);
    }

    #[test]
    fn test_attribute_conditioning_passes_through() {
        let mut config = Config::default();
        config.model.coupled = false;
        config.model.conditional = true;

        let attrs = Tensor::from_slice(&[1.0f32, 0.0, 1.0, 0.0]).view([2, 2]);
        let pair = CondPair {
            c1: CondBatch::Attributes(attrs),
            c2: None,
        };
        let input = sample_generator_input(&config, 2, Some(&pair), Device::Cpu);
        assert_eq!(input.cond1.as_ref().unwrap().size(), vec![2, 2]);
    }

    #[test]
    fn test_uniform_noise_range() {
        let mut z = Tensor::zeros([64, 16], (Kind::Float, Device::Cpu));
        sample_z(ZDistribution::Uniform, &mut z);

        let min: f64 = z.min().double_value(&[]);
        let max: f64 = z.max().double_value(&[]);
        assert!(min >= -1.0 && max < 1.0);
        // Untouched zeros would leave min == max
        assert!(min < max);
    }
}
