//! Coupled generator network
//!
//! Transforms latent noise (plus optional conditioning vectors) into
//! images for one or two domains. The fully connected projection and the
//! first transposed convolution are shared between domains; each domain
//! owns its final transposed convolution, so high-level structure is
//! learned jointly while low-level rendering stays domain-specific.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use crate::error::Result;
use crate::utils::Config;

/// Assembled generator input: noise plus per-domain conditioning
#[derive(Debug)]
pub struct GeneratorInput {
    /// Latent noise, shape (n, z_len)
    pub z: Tensor,
    /// Domain-1 conditioning vector, shape (n, cond_len)
    pub cond1: Option<Tensor>,
    /// Domain-2 conditioning vector when coupled
    pub cond2: Option<Tensor>,
}

impl GeneratorInput {
    /// Number of tensors in the input tuple
    pub fn len(&self) -> usize {
        1 + self.cond1.is_some() as usize + self.cond2.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Generated images, one tensor per trained domain branch
#[derive(Debug)]
pub struct GenOutput {
    pub a: Tensor,
    pub b: Option<Tensor>,
}

impl GenOutput {
    /// Branch outputs in domain order
    pub fn branches(&self) -> Vec<&Tensor> {
        match &self.b {
            Some(b) => vec![&self.a, b],
            None => vec![&self.a],
        }
    }
}

/// Coupled generator with a shared trunk and per-domain output heads
#[derive(Debug)]
pub struct Generator {
    fc: nn::Linear,
    bn0: nn::BatchNorm,
    deconv1: nn::ConvTranspose2D,
    bn1: nn::BatchNorm,
    head_a: nn::ConvTranspose2D,
    head_b: Option<nn::ConvTranspose2D>,
    base: i64,
    init_size: i64,
}

impl Generator {
    /// Build the generator for the configured domain setup
    pub fn new(vs: &nn::Path, config: &Config) -> Result<Self> {
        let m = &config.model;
        let base = m.g_dim;
        let init_size = m.img_size / 4;

        let cond_len = if m.auxclas || m.conditional {
            config.cond_len()
        } else {
            0
        };

        let fc = nn::linear(
            vs / "fc",
            m.z_len + cond_len,
            base * 4 * init_size * init_size,
            Default::default(),
        );
        let bn0 = nn::batch_norm2d(vs / "bn0", base * 4, Default::default());

        let deconv_config = nn::ConvTransposeConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };
        let deconv1 = nn::conv_transpose2d(vs / "deconv1", base * 4, base * 2, 4, deconv_config);
        let bn1 = nn::batch_norm2d(vs / "bn1", base * 2, Default::default());

        let head_a =
            nn::conv_transpose2d(vs / "head_a", base * 2, m.img_channels, 4, deconv_config);
        let head_b = m.coupled.then(|| {
            nn::conv_transpose2d(vs / "head_b", base * 2, m.img_channels, 4, deconv_config)
        });

        Ok(Self {
            fc,
            bn0,
            deconv1,
            bn1,
            head_a,
            head_b,
            base,
            init_size,
        })
    }

    fn trunk(&self, z: &Tensor, cond: Option<&Tensor>, train: bool) -> Tensor {
        let x = match cond {
            Some(c) => Tensor::cat(&[z.shallow_clone(), c.shallow_clone()], 1),
            None => z.shallow_clone(),
        };
        let n = x.size()[0];
        let x = self.fc.forward(&x);
        let x = x.view([n, self.base * 4, self.init_size, self.init_size]);
        let x = self.bn0.forward_t(&x, train).leaky_relu();
        let x = self.deconv1.forward(&x);
        self.bn1.forward_t(&x, train).leaky_relu()
    }

    /// Generate images for every trained branch
    ///
    /// Output shape per branch: (n, img_channels, img_size, img_size),
    /// values in [-1, 1].
    pub fn forward_t(&self, input: &GeneratorInput, train: bool) -> GenOutput {
        let h_a = self.trunk(&input.z, input.cond1.as_ref(), train);
        let a = self.head_a.forward(&h_a).tanh();

        let b = self.head_b.as_ref().map(|head| {
            let h_b = self.trunk(&input.z, input.cond2.as_ref().or(input.cond1.as_ref()), train);
            head.forward(&h_b).tanh()
        });

        GenOutput { a, b }
    }

    /// Generate in inference mode
    pub fn generate(&self, input: &GeneratorInput) -> GenOutput {
        self.forward_t(input, false)
    }
}
