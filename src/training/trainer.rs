//! Adversarial update engine
//!
//! Owns the per-step working state and the optimizers. One cycle per
//! mini-batch: `next_step` records the incoming real batch and the
//! conditioning sampled for it, `update_discriminator` runs one D
//! optimization step, and `update_generator` runs one G step once the
//! driver decides the cadence allows it. A generator step that produces a
//! non-finite loss is reported as a failure so the driver can retry it
//! with fresh noise; everything else steps unconditionally.

use tch::{nn, Device, Tensor};
use tracing::warn;

use super::losses;
use super::metrics::{ErrorStorage, RunningMean};
use super::sample::{sample_generator_input, to_one_hot};
use crate::data::{CondBatch, CondPair, PairedBatch};
use crate::error::Result;
use crate::model::{DiscInput, DiscOutput, GanModel};
use crate::utils::{Algorithm, Config};

struct StepState {
    x1: Tensor,
    x2: Option<Tensor>,
    c1: Tensor,
    c2: Option<Tensor>,
    c_fake: Option<CondPair>,
}

#[derive(Default)]
struct ErrorAccumulators {
    d_real: RunningMean,
    d_fake: RunningMean,
    d_class: RunningMean,
    g_adv: RunningMean,
    g_class: RunningMean,
}

/// Runs the discriminator and generator optimization steps
pub struct GanTrainer {
    config: Config,
    device: Device,
    gen_opt: nn::Optimizer,
    disc_opt: nn::Optimizer,
    state: Option<StepState>,
    acc: ErrorAccumulators,
    storage: ErrorStorage,
}

impl GanTrainer {
    /// Create a trainer with optimizers bound to the model's stores
    pub fn new(config: &Config, model: &GanModel) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            device: model.device(),
            gen_opt: model.gen_optimizer(config.training.gen_lr)?,
            disc_opt: model.disc_optimizer(config.training.disc_lr)?,
            state: None,
            acc: ErrorAccumulators::default(),
            storage: ErrorStorage::new(),
        })
    }

    /// Record the working state for this mini-batch
    ///
    /// The same conditioning pair serves both the discriminator and the
    /// generator updates of this batch.
    pub fn next_step(&mut self, batch: PairedBatch, c_fake: Option<CondPair>) {
        self.state = Some(StepState {
            x1: batch.x1.to_device(self.device),
            x2: batch.x2.map(|x| x.to_device(self.device)),
            c1: batch.c1.to_device(self.device),
            c2: batch.c2.map(|c| c.to_device(self.device)),
            c_fake,
        });
    }

    /// One-hot conditioning for the discriminator input, real batch side
    fn real_disc_conds(&self, state: &StepState) -> (Option<Tensor>, Option<Tensor>) {
        if !self.config.model.conditional {
            return (None, None);
        }
        let cats = &self.config.model.categories;
        let c1 = to_one_hot(cats, &state.c1).to_device(self.device);
        let c2 = state
            .c2
            .as_ref()
            .map(|c| to_one_hot(cats, c).to_device(self.device));
        (Some(c1), c2)
    }

    /// Labels the generator was asked to produce, per domain
    fn fake_class_labels(state: &StepState) -> (Option<&Tensor>, Option<&Tensor>) {
        match &state.c_fake {
            Some(pair) => {
                let c1 = match &pair.c1 {
                    CondBatch::Classes(t) => Some(t),
                    CondBatch::Attributes(_) => None,
                };
                let c2 = pair.c2.as_ref().and_then(|c| match c {
                    CondBatch::Classes(t) => Some(t),
                    CondBatch::Attributes(_) => None,
                });
                (c1, c2)
            }
            None => (None, None),
        }
    }

    /// Run one discriminator optimization step
    ///
    /// Fake samples come from the generator without gradient flow back to
    /// it. Returns whether the update happened; the driver counts these
    /// against the cadence threshold.
    pub fn update_discriminator(&mut self, model: &GanModel) -> Result<bool> {
        let m = &self.config.model;
        let t = &self.config.training;
        let state = self
            .state
            .take()
            .expect("next_step must run before update_discriminator");
        let batch_size = state.x1.size()[0];

        let g_inp = sample_generator_input(&self.config, batch_size, state.c_fake.as_ref(), self.device);
        let fake = model.generator.forward_t(&g_inp, true);
        let fake_a = fake.a.detach();
        let fake_b = fake.b.as_ref().map(|b| b.detach());

        let (c_real1, c_real2) = self.real_disc_conds(&state);
        let (c_fake1, c_fake2) = if m.conditional {
            (g_inp.cond1.as_ref(), g_inp.cond2.as_ref())
        } else {
            (None, None)
        };

        let real_out = forward_domains(model, &state.x1, state.x2.as_ref(), c_real1.as_ref(), c_real2.as_ref());
        let fake_out = forward_domains(model, &fake_a, fake_b.as_ref(), c_fake1, c_fake2);

        let mut loss = Tensor::from(0f32).to_device(self.device);
        let mut real_err = 0.0;
        let mut fake_err = 0.0;
        let mut class_err = 0.0;

        let real_imgs: Vec<&Tensor> = std::iter::once(&state.x1).chain(state.x2.as_ref()).collect();
        let fake_imgs: Vec<&Tensor> = std::iter::once(&fake_a).chain(fake_b.as_ref()).collect();
        let real_conds = [c_real1.as_ref(), c_real2.as_ref()];
        let real_labels: Vec<&Tensor> = std::iter::once(&state.c1).chain(state.c2.as_ref()).collect();
        let (fl1, fl2) = Self::fake_class_labels(&state);
        let fake_labels = [fl1, fl2];

        for (idx, (real_branch, fake_branch)) in real_out
            .branches()
            .iter()
            .zip(fake_out.branches().iter())
            .enumerate()
        {
            let (real_loss, fake_loss) = match m.algorithm {
                Algorithm::Standard => (
                    losses::discriminator_real_loss(&real_branch.src),
                    losses::discriminator_fake_loss(&fake_branch.src),
                ),
                Algorithm::WganGp => (
                    losses::critic_real_loss(&real_branch.src),
                    losses::critic_fake_loss(&fake_branch.src),
                ),
            };
            real_err += real_loss.double_value(&[]);
            fake_err += fake_loss.double_value(&[]);
            loss = loss + real_loss + fake_loss;

            if m.algorithm == Algorithm::WganGp {
                let penalty = losses::gradient_penalty(
                    &model.discriminator,
                    real_imgs[idx],
                    fake_imgs[idx],
                    real_conds[idx],
                    idx == 1,
                    t.gp_weight,
                );
                loss = loss + penalty;
            }

            if m.auxclas {
                if let Some(class_logits) = &real_branch.class {
                    let class_loss = losses::auxiliary_class_loss(class_logits, real_labels[idx]);
                    class_err += class_loss.double_value(&[]);
                    loss = loss + class_loss;
                }
                if let (Some(class_logits), Some(labels)) = (&fake_branch.class, fake_labels[idx]) {
                    let class_loss = losses::auxiliary_class_loss(class_logits, labels);
                    class_err += class_loss.double_value(&[]);
                    loss = loss + class_loss;
                }
            }
        }

        self.disc_opt.zero_grad();
        loss.backward();
        self.disc_opt.step();

        self.acc.d_real.push(real_err);
        self.acc.d_fake.push(fake_err);
        self.acc.d_class.push(class_err);

        self.state = Some(state);
        Ok(true)
    }

    /// Run one generator optimization step
    ///
    /// Fresh noise is sampled on every call, so a retry after a reported
    /// failure sees a new draw. Returns false without stepping when the
    /// loss comes out non-finite; the driver bounds how often that may
    /// happen in a row.
    pub fn update_generator(&mut self, model: &GanModel) -> Result<bool> {
        let m = &self.config.model;
        let state = self
            .state
            .take()
            .expect("next_step must run before update_generator");
        let batch_size = state.x1.size()[0];

        let g_inp = sample_generator_input(&self.config, batch_size, state.c_fake.as_ref(), self.device);
        let fake = model.generator.forward_t(&g_inp, true);

        let (c_fake1, c_fake2) = if m.conditional {
            (g_inp.cond1.as_ref(), g_inp.cond2.as_ref())
        } else {
            (None, None)
        };
        let out = forward_domains(model, &fake.a, fake.b.as_ref(), c_fake1, c_fake2);

        let mut loss = Tensor::from(0f32).to_device(self.device);
        let mut adv_err = 0.0;
        let mut class_err = 0.0;

        let (fl1, fl2) = Self::fake_class_labels(&state);
        let fake_labels = [fl1, fl2];

        for (idx, branch) in out.branches().iter().enumerate() {
            let adv = match m.algorithm {
                Algorithm::Standard => losses::generator_loss(&branch.src),
                Algorithm::WganGp => losses::generator_loss_wasserstein(&branch.src),
            };
            adv_err += adv.double_value(&[]);
            loss = loss + adv;

            if m.auxclas {
                if let (Some(class_logits), Some(labels)) = (&branch.class, fake_labels[idx]) {
                    let class_loss = losses::auxiliary_class_loss(class_logits, labels);
                    class_err += class_loss.double_value(&[]);
                    loss = loss + class_loss;
                }
            }
        }

        let loss_value = loss.double_value(&[]);
        if !loss_value.is_finite() {
            warn!("Generator loss is not finite ({loss_value}), skipping step");
            self.state = Some(state);
            return Ok(false);
        }

        self.gen_opt.zero_grad();
        loss.backward();
        self.gen_opt.step();

        self.acc.g_adv.push(adv_err);
        self.acc.g_class.push(class_err);
        self.state = Some(state);
        Ok(true)
    }

    /// Flush the loss means accumulated since the last snapshot into the
    /// error history
    ///
    /// A snapshot taken before any step records nothing.
    pub fn save_error(&mut self) {
        if !self.acc.d_real.has_samples() && !self.acc.g_adv.has_samples() {
            return;
        }
        self.storage.record(
            self.acc.d_real.take(),
            self.acc.d_fake.take(),
            self.acc.d_class.take(),
            self.acc.g_adv.take(),
            self.acc.g_class.take(),
        );
    }

    /// Full error history recorded so far
    pub fn get_error_storage(&self) -> &ErrorStorage {
        &self.storage
    }
}

/// Run the discriminator over whichever domains the batch carries
fn forward_domains(
    model: &GanModel,
    x1: &Tensor,
    x2: Option<&Tensor>,
    c1: Option<&Tensor>,
    c2: Option<&Tensor>,
) -> DiscOutput {
    match x2 {
        Some(x2) => model.discriminator.forward(DiscInput::Both {
            x_a: x1,
            x_b: x2,
            c_a: c1,
            c_b: c2,
        }),
        None => model.discriminator.forward(DiscInput::A { x: x1, c: c1 }),
    }
}
