//! Error history tracking
//!
//! The trainer accumulates per-step loss values and flushes their means
//! into an append-only history at every snapshot. The history feeds the
//! error plot and persists as CSV alongside the checkpoints.

use crate::error::Result;

/// Append-only loss history, one entry per snapshot
#[derive(Debug, Clone, Default)]
pub struct ErrorStorage {
    /// Discriminator loss on real samples
    pub d_real: Vec<f64>,
    /// Discriminator loss on fake samples
    pub d_fake: Vec<f64>,
    /// Discriminator auxiliary classification loss
    pub d_class: Vec<f64>,
    /// Generator adversarial loss
    pub g_adv: Vec<f64>,
    /// Generator auxiliary classification loss
    pub g_class: Vec<f64>,
}

/// Series names in CSV column order
pub const SERIES_NAMES: [&str; 5] = ["d_real", "d_fake", "d_class", "g_adv", "g_class"];

impl ErrorStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value per tracked quantity
    pub fn record(&mut self, d_real: f64, d_fake: f64, d_class: f64, g_adv: f64, g_class: f64) {
        self.d_real.push(d_real);
        self.d_fake.push(d_fake);
        self.d_class.push(d_class);
        self.g_adv.push(g_adv);
        self.g_class.push(g_class);
    }

    /// Number of recorded snapshots
    pub fn len(&self) -> usize {
        self.d_real.len()
    }

    /// Whether anything has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.d_real.is_empty()
    }

    /// Series in declaration order, parallel to [`SERIES_NAMES`]
    pub fn series(&self) -> [&[f64]; 5] {
        [
            &self.d_real,
            &self.d_fake,
            &self.d_class,
            &self.g_adv,
            &self.g_class,
        ]
    }

    /// Latest generator adversarial loss
    pub fn latest_g_adv(&self) -> Option<f64> {
        self.g_adv.last().copied()
    }

    /// Latest total discriminator loss
    pub fn latest_d_total(&self) -> Option<f64> {
        match (self.d_real.last(), self.d_fake.last()) {
            (Some(r), Some(f)) => Some(r + f),
            _ => None,
        }
    }

    /// Heuristic divergence check over the last `window` snapshots
    ///
    /// A discriminator that wins outright while the generator loss climbs
    /// usually means the adversarial game has collapsed.
    pub fn check_divergence(&self, window: usize) -> bool {
        if self.len() < window {
            return false;
        }
        let d_total = moving_average(&self.d_real, window) + moving_average(&self.d_fake, window);
        let g = moving_average(&self.g_adv, window);
        d_total < 0.1 && g > 5.0
    }

    /// Save the history to a CSV file
    pub fn save_csv(&self, path: &str) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["snapshot"];
        header.extend(SERIES_NAMES);
        writer.write_record(&header)?;

        for i in 0..self.len() {
            writer.write_record([
                i.to_string(),
                self.d_real[i].to_string(),
                self.d_fake[i].to_string(),
                self.d_class[i].to_string(),
                self.g_adv[i].to_string(),
                self.g_class[i].to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load a history saved by [`save_csv`](Self::save_csv)
    pub fn load_csv(path: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut storage = Self::new();

        for result in reader.records() {
            let record = result?;
            storage.d_real.push(record[1].parse().unwrap_or(0.0));
            storage.d_fake.push(record[2].parse().unwrap_or(0.0));
            storage.d_class.push(record[3].parse().unwrap_or(0.0));
            storage.g_adv.push(record[4].parse().unwrap_or(0.0));
            storage.g_class.push(record[5].parse().unwrap_or(0.0));
        }

        Ok(storage)
    }
}

/// Mean accumulator flushed at snapshot boundaries
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    /// Add one measurement
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Whether any measurement arrived since the last flush
    pub fn has_samples(&self) -> bool {
        self.count > 0
    }

    /// Mean of the measurements since the last flush, then reset
    pub fn take(&mut self) -> f64 {
        let mean = if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        };
        self.sum = 0.0;
        self.count = 0;
        mean
    }
}

/// Moving average of the last `window` values
pub fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}
