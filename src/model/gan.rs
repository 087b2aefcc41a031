//! GAN container combining generator and discriminator
//!
//! Owns the two variable stores and the device; the trainer borrows the
//! networks and the optimizers step the stores. Weight persistence goes
//! through the checkpoint utilities so file naming and atomicity live in
//! one place.

use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device};

use super::discriminator::Discriminator;
use super::generator::Generator;
use super::registry::ModelRegistry;
use crate::error::Result;
use crate::utils::{checkpoint, Config};

/// Complete GAN model: both networks plus their parameter stores
pub struct GanModel {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    gen_vs: VarStore,
    disc_vs: VarStore,
    device: Device,
}

impl GanModel {
    /// Build both networks for the configured architecture
    ///
    /// The architecture name is resolved through the registry; an unknown
    /// name fails here, before any parameters are allocated.
    pub fn new(config: &Config, device: Device) -> Result<Self> {
        let registry = ModelRegistry::with_defaults();
        let build_g = registry.generator(&config.model.architecture)?;
        let build_d = registry.discriminator(&config.model.architecture)?;

        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = build_g(&gen_vs.root(), config)?;
        let discriminator = build_d(&disc_vs.root(), config)?;

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        })
    }

    /// Device the model lives on
    pub fn device(&self) -> Device {
        self.device
    }

    /// Generator optimizer (Adam with the usual GAN betas)
    pub fn gen_optimizer(&self, lr: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam {
            beta1: 0.5,
            beta2: 0.999,
            wd: 0.0,
            ..Default::default()
        }
        .build(&self.gen_vs, lr)?)
    }

    /// Discriminator optimizer
    pub fn disc_optimizer(&self, lr: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam {
            beta1: 0.5,
            beta2: 0.999,
            wd: 0.0,
            ..Default::default()
        }
        .build(&self.disc_vs, lr)?)
    }

    /// Save both weight blobs under `dir`
    ///
    /// `epoch` selects the `{epoch}_` file prefix; None writes the
    /// unprefixed "latest" pair.
    pub fn save(&self, dir: &str, epoch: Option<usize>) -> Result<()> {
        checkpoint::save_var_store(&self.gen_vs, dir, checkpoint::Role::Generator, epoch)?;
        checkpoint::save_var_store(&self.disc_vs, dir, checkpoint::Role::Discriminator, epoch)?;
        Ok(())
    }

    /// Load both weight blobs from `dir`
    ///
    /// The prefix (epoch or none) must match a prior save exactly.
    pub fn load(&mut self, dir: &str, epoch: Option<usize>) -> Result<()> {
        checkpoint::load_var_store(&mut self.gen_vs, dir, checkpoint::Role::Generator, epoch)?;
        checkpoint::load_var_store(&mut self.disc_vs, dir, checkpoint::Role::Discriminator, epoch)?;
        Ok(())
    }

    /// Freeze both stores for an evaluation window
    pub fn freeze(&mut self) {
        self.gen_vs.freeze();
        self.disc_vs.freeze();
    }

    /// Unfreeze both stores to resume training
    pub fn unfreeze(&mut self) {
        self.gen_vs.unfreeze();
        self.disc_vs.unfreeze();
    }

    /// Borrow the generator variable store
    pub fn gen_vs(&self) -> &VarStore {
        &self.gen_vs
    }

    /// Borrow the discriminator variable store
    pub fn disc_vs(&self) -> &VarStore {
        &self.disc_vs
    }
}
