//! Update cadence between discriminator and generator
//!
//! The discriminator trains every batch; the generator only trains after
//! `k` consecutive discriminator-only steps, and then runs `g_updates`
//! cycles before the counter resets. Keeping this as its own little state
//! machine makes the ratio testable without touching any tensors.

/// Tracks discriminator steps taken since the last generator cycle
#[derive(Debug, Clone, Copy)]
pub struct UpdateCadence {
    k: usize,
    g_updates: usize,
    steps_without_g: usize,
}

impl UpdateCadence {
    /// Create a cadence with `k` discriminator steps per generator cycle
    /// and `g_updates` generator updates per cycle
    pub fn new(k: usize, g_updates: usize) -> Self {
        assert!(k >= 1 && g_updates >= 1);
        Self {
            k,
            g_updates,
            steps_without_g: 0,
        }
    }

    /// Record one completed discriminator step
    ///
    /// Returns the number of generator updates now due: `g_updates` when
    /// the counter reached `k` (the counter resets), 0 otherwise.
    pub fn record_discriminator_step(&mut self) -> usize {
        self.steps_without_g += 1;
        if self.steps_without_g >= self.k {
            self.steps_without_g = 0;
            self.g_updates
        } else {
            0
        }
    }

    /// Discriminator steps since the last generator cycle
    pub fn steps_without_g(&self) -> usize {
        self.steps_without_g
    }
}
