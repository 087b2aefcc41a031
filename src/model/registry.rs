//! Architecture registry
//!
//! Maps architecture names to network builders. Populated at startup;
//! looking up an unknown key is a fatal configuration error rather than a
//! silent fallback.

use std::collections::HashMap;

use tch::nn;

use super::discriminator::Discriminator;
use super::generator::Generator;
use crate::error::{Error, Result};
use crate::utils::Config;

/// Builder for a generator variant
pub type GeneratorBuilder = fn(&nn::Path<'_>, &Config) -> Result<Generator>;
/// Builder for a discriminator variant
pub type DiscriminatorBuilder = fn(&nn::Path<'_>, &Config) -> Result<Discriminator>;

/// Name -> builder tables for both networks
pub struct ModelRegistry {
    generators: HashMap<&'static str, GeneratorBuilder>,
    discriminators: HashMap<&'static str, DiscriminatorBuilder>,
}

impl ModelRegistry {
    /// Registry with all built-in architectures
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            generators: HashMap::new(),
            discriminators: HashMap::new(),
        };
        registry.register("cogan", Generator::new, Discriminator::new);
        registry
    }

    /// Register an architecture under `name`
    pub fn register(
        &mut self,
        name: &'static str,
        generator: GeneratorBuilder,
        discriminator: DiscriminatorBuilder,
    ) {
        self.generators.insert(name, generator);
        self.discriminators.insert(name, discriminator);
    }

    /// Generator builder for `name`
    pub fn generator(&self, name: &str) -> Result<GeneratorBuilder> {
        self.generators
            .get(name)
            .copied()
            .ok_or_else(|| Error::Config(format!("unknown generator architecture: {name}")))
    }

    /// Discriminator builder for `name`
    pub fn discriminator(&self, name: &str) -> Result<DiscriminatorBuilder> {
        self.discriminators
            .get(name)
            .copied()
            .ok_or_else(|| Error::Config(format!("unknown discriminator architecture: {name}")))
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_architecture_resolves() {
        let registry = ModelRegistry::with_defaults();
        assert!(registry.generator("cogan").is_ok());
        assert!(registry.discriminator("cogan").is_ok());
    }

    #[test]
    fn test_unknown_architecture_is_fatal() {
        let registry = ModelRegistry::with_defaults();
        let err = registry.generator("stylegan").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
