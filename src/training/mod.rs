//! Training module
//!
//! This module provides:
//! - The adversarial update engine (discriminator and generator steps)
//! - The update cadence state machine
//! - The epoch/batch driver with snapshot scheduling
//! - Loss functions for the supported objectives
//! - Noise sampling and generator input assembly
//! - Error history tracking and auxiliary classifier evaluation

mod cadence;
mod driver;
mod evaluate;
mod losses;
mod metrics;
mod sample;
mod trainer;

pub use cadence::UpdateCadence;
pub use driver::TrainingDriver;
pub use evaluate::{evaluate_classifier, HeadAccuracy};
pub use losses::{
    auxiliary_class_loss, critic_fake_loss, critic_real_loss, discriminator_fake_loss,
    discriminator_real_loss, generator_loss, generator_loss_wasserstein, gradient_penalty,
};
pub use metrics::{moving_average, ErrorStorage, RunningMean, SERIES_NAMES};
pub use sample::{sample_generator_input, sample_z, to_one_hot};
pub use trainer::GanTrainer;
