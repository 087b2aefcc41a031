//! Coupled discriminator network
//!
//! Classifies images as real or fake and, when auxiliary classification
//! is enabled, predicts the class label per category head. Each domain
//! owns its first convolution; the rest of the stack is shared. Outputs
//! are raw logits; the losses decide what to do with them.

use tch::{nn, nn::Module, Tensor};

use crate::error::Result;
use crate::utils::Config;

/// Which domain branch(es) a forward pass runs, with optional conditioning
#[derive(Debug)]
pub enum DiscInput<'a> {
    A {
        x: &'a Tensor,
        c: Option<&'a Tensor>,
    },
    B {
        x: &'a Tensor,
        c: Option<&'a Tensor>,
    },
    Both {
        x_a: &'a Tensor,
        x_b: &'a Tensor,
        c_a: Option<&'a Tensor>,
        c_b: Option<&'a Tensor>,
    },
}

/// Per-domain discriminator output
#[derive(Debug)]
pub struct DomainOutput {
    /// Real/fake logit, shape (n, 1)
    pub src: Tensor,
    /// Class logits per auxiliary head, each (n, categories[i])
    pub class: Option<Vec<Tensor>>,
}

/// Full forward output, one entry per requested domain
#[derive(Debug)]
pub struct DiscOutput {
    pub a: Option<DomainOutput>,
    pub b: Option<DomainOutput>,
}

impl DiscOutput {
    /// Outputs of the domains that ran, in domain order
    pub fn branches(&self) -> Vec<&DomainOutput> {
        self.a.iter().chain(self.b.iter()).collect()
    }
}

/// Coupled discriminator with per-domain first layers and a shared trunk
#[derive(Debug)]
pub struct Discriminator {
    conv0_a: nn::Conv2D,
    conv0_b: Option<nn::Conv2D>,
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    src_head: nn::Conv2D,
    class_heads: Vec<nn::Conv2D>,
    cond_len: i64,
    img_size: i64,
}

impl Discriminator {
    /// Build the discriminator for the configured domain setup
    pub fn new(vs: &nn::Path, config: &Config) -> Result<Self> {
        let m = &config.model;
        let base = m.d_dim;

        let cond_len = if m.conditional { config.cond_len() } else { 0 };
        let in_channels = m.img_channels + cond_len;

        let plain = nn::ConvConfig {
            stride: 1,
            padding: 0,
            ..Default::default()
        };

        let conv0_a = nn::conv2d(vs / "conv0_a", in_channels, base * 2, 5, plain);
        let conv0_b = m
            .coupled
            .then(|| nn::conv2d(vs / "conv0_b", in_channels, base * 2, 5, plain));

        let conv1 = nn::conv2d(vs / "conv1", base * 2, base * 5, 5, plain);

        // Feature map side length after conv/pool/conv/pool; the last
        // convolution collapses it to 1x1.
        let final_side = ((m.img_size - 4) / 2 - 4) / 2;
        let conv2 = nn::conv2d(vs / "conv2", base * 5, base * 50, final_side, plain);

        let src_head = nn::conv2d(vs / "src", base * 50, 1, 1, plain);
        let class_heads = if m.auxclas {
            m.categories
                .iter()
                .enumerate()
                .map(|(i, &cats)| {
                    nn::conv2d(vs / format!("class_{i}"), base * 50, cats, 1, plain)
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            conv0_a,
            conv0_b,
            conv1,
            conv2,
            src_head,
            class_heads,
            cond_len,
            img_size: m.img_size,
        })
    }

    fn single_forward(&self, x: &Tensor, c: Option<&Tensor>, first: &nn::Conv2D) -> DomainOutput {
        let x = match c {
            Some(c) => {
                // Broadcast the conditioning vector over the image plane
                let n = x.size()[0];
                let c = c
                    .view([n, self.cond_len, 1, 1])
                    .expand([n, self.cond_len, self.img_size, self.img_size], false);
                Tensor::cat(&[x.shallow_clone(), c], 1)
            }
            None => x.shallow_clone(),
        };

        let h0 = first.forward(&x).max_pool2d_default(2);
        let h1 = self.conv1.forward(&h0).max_pool2d_default(2);
        let h2 = self.conv2.forward(&h1).leaky_relu();

        let n = h2.size()[0];
        let src = self.src_head.forward(&h2).view([n, 1]);
        let class = (!self.class_heads.is_empty()).then(|| {
            self.class_heads
                .iter()
                .map(|head| {
                    let cats = head.ws.size()[0];
                    head.forward(&h2).view([n, cats])
                })
                .collect()
        });

        DomainOutput { src, class }
    }

    /// Forward pass over the requested domain branch(es)
    pub fn forward(&self, input: DiscInput<'_>) -> DiscOutput {
        match input {
            DiscInput::A { x, c } => DiscOutput {
                a: Some(self.single_forward(x, c, &self.conv0_a)),
                b: None,
            },
            DiscInput::B { x, c } => {
                let first = self
                    .conv0_b
                    .as_ref()
                    .expect("domain B requested on an uncoupled discriminator");
                DiscOutput {
                    a: None,
                    b: Some(self.single_forward(x, c, first)),
                }
            }
            DiscInput::Both { x_a, x_b, c_a, c_b } => {
                let first_b = self
                    .conv0_b
                    .as_ref()
                    .expect("domain B requested on an uncoupled discriminator");
                DiscOutput {
                    a: Some(self.single_forward(x_a, c_a, &self.conv0_a)),
                    b: Some(self.single_forward(x_b, c_b, first_b)),
                }
            }
        }
    }

    /// Probability of being real (after sigmoid), single domain
    pub fn classify(&self, x: &Tensor) -> Tensor {
        let out = self.forward(DiscInput::A { x, c: None });
        out.a.expect("domain A always runs").src.sigmoid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    fn small_config() -> Config {
        let mut config = Config::default();
        config.model.d_dim = 2;
        config
    }

    #[test]
    fn test_discriminator_output_shape() {
        let config = small_config();
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), &config).unwrap();

        let x = Tensor::randn([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        let out = disc.forward(DiscInput::A { x: &x, c: None });

        assert_eq!(out.a.unwrap().src.size(), vec![4, 1]);
        assert!(out.b.is_none());
    }

    #[test]
    fn test_both_domains_run() {
        let config = small_config();
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), &config).unwrap();

        let x_a = Tensor::randn([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let x_b = Tensor::randn([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let out = disc.forward(DiscInput::Both {
            x_a: &x_a,
            x_b: &x_b,
            c_a: None,
            c_b: None,
        });

        assert_eq!(out.branches().len(), 2);
        assert_eq!(out.b.unwrap().src.size(), vec![2, 1]);
    }

    #[test]
    fn test_class_heads_shapes() {
        let mut config = small_config();
        config.model.auxclas = true;
        config.model.categories = vec![10, 4];
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), &config).unwrap();

        let x = Tensor::randn([3, 1, 28, 28], (Kind::Float, Device::Cpu));
        let out = disc.forward(DiscInput::A { x: &x, c: None });
        let class = out.a.unwrap().class.unwrap();

        assert_eq!(class.len(), 2);
        assert_eq!(class[0].size(), vec![3, 10]);
        assert_eq!(class[1].size(), vec![3, 4]);
    }

    #[test]
    fn test_classify_returns_probabilities() {
        let config = small_config();
        let vs = VarStore::new(Device::Cpu);
        let disc = Discriminator::new(&vs.root(), &config).unwrap();

        let x = Tensor::randn([2, 1, 28, 28], (Kind::Float, Device::Cpu));
        let probs = disc.classify(&x);

        let min_val: f64 = probs.min().double_value(&[]);
        let max_val: f64 = probs.max().double_value(&[]);
        assert!(min_val >= 0.0 && max_val <= 1.0);
    }
}
