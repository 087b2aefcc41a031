//! Model module containing the GAN architecture components
//!
//! This module provides:
//! - Coupled generator with shared trunk and per-domain heads
//! - Coupled discriminator with per-domain first layers
//! - The GAN container owning both parameter stores
//! - The architecture name registry

mod discriminator;
mod gan;
mod generator;
mod registry;

pub use discriminator::{DiscInput, DiscOutput, Discriminator, DomainOutput};
pub use gan::GanModel;
pub use generator::{GenOutput, Generator, GeneratorInput};
pub use registry::{DiscriminatorBuilder, GeneratorBuilder, ModelRegistry};
