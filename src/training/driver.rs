//! Epoch/batch loop and snapshot scheduling
//!
//! The driver owns the cadence policy: the discriminator trains on every
//! batch, the generator only after `k` discriminator steps, `g_updates`
//! times per cycle, retrying a failed update with fresh noise up to
//! `max_g_retries` times. Snapshots fire before every `snap_step`-th
//! batch (including batch 0) and once more at the end of each epoch,
//! followed by an epoch-tagged weight save.

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use tracing::{info, warn};

use super::cadence::UpdateCadence;
use super::metrics::ErrorStorage;
use super::trainer::GanTrainer;
use crate::data::{PairedDataset, PairedLoader};
use crate::error::{Error, Result};
use crate::model::GanModel;
use crate::utils::Config;
use crate::vis::{save_error_plot, Visualizer};

/// Drives the full training run
pub struct TrainingDriver {
    config: Config,
}

impl TrainingDriver {
    /// Create a driver for a validated configuration
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Take one snapshot: persist the error history, optionally render
    /// the image grids and the plot, and save the latest weights
    fn snapshot(
        &self,
        epoch: usize,
        batch: usize,
        model: &mut GanModel,
        trainer: &mut GanTrainer,
        visualizer: Option<&Visualizer>,
    ) -> Result<()> {
        let t = &self.config.training;
        model.freeze();

        trainer.save_error();
        let storage = trainer.get_error_storage();
        std::fs::create_dir_all(&t.save_dir)?;
        storage.save_csv(&format!("{}/errors.csv", t.save_dir))?;

        if let Some(vis) = visualizer {
            vis.save_training_imgs(epoch, batch, &model.generator)?;
            save_error_plot(storage, &t.save_dir)?;
        }

        model.save(&t.save_dir, None)?;
        crate::utils::checkpoint::save_meta(&t.save_dir, epoch, batch)?;

        model.unfreeze();
        Ok(())
    }

    /// Run the configured number of epochs
    ///
    /// Returns the full error history for inspection.
    pub fn train(
        &self,
        model: &mut GanModel,
        dataset: &PairedDataset,
        rng: &mut StdRng,
    ) -> Result<ErrorStorage> {
        let t = &self.config.training;
        let auxclas = self.config.model.auxclas;

        let start_epoch = match &t.load_dir {
            Some(dir) => {
                model.load(dir, t.load_epoch)?;
                let resumed = t.load_epoch.map(|e| e + 1).unwrap_or(0);
                info!("Resumed weights from {dir}, continuing at epoch {resumed}");
                resumed
            }
            None => 0,
        };
        if start_epoch >= t.epochs {
            warn!(
                "Nothing to do: resumed epoch {start_epoch} is past the configured {} epochs",
                t.epochs
            );
            return Ok(ErrorStorage::new());
        }

        let mut trainer = GanTrainer::new(&self.config, model)?;
        let mut cadence = UpdateCadence::new(t.k, t.g_updates);
        let visualizer = t
            .visualize
            .then(|| Visualizer::new(&self.config, model.device()));

        let mut loader = PairedLoader::new(dataset);
        let batch_size = dataset.mini_batch_size() as usize;

        for epoch in start_epoch..t.epochs {
            info!("Epoch {}/{}", epoch + 1, t.epochs);

            let pb = ProgressBar::new(loader.num_batches() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );

            loader.reset();
            let mut batch_idx = 0;
            while let Some(batch) = loader.next_batch(rng) {
                if batch_idx % t.snap_step == 0 {
                    self.snapshot(epoch, batch_idx, model, &mut trainer, visualizer.as_ref())?;
                    let storage = trainer.get_error_storage();
                    if let (Some(g), Some(d)) = (storage.latest_g_adv(), storage.latest_d_total())
                    {
                        pb.set_message(format!("G: {g:.4}, D: {d:.4}"));
                    }
                }

                // One conditioning draw per batch, shared by the
                // discriminator and generator updates below.
                let c_fake = auxclas.then(|| dataset.random_label_batch(batch_size, rng));
                trainer.next_step(batch, c_fake);

                if trainer.update_discriminator(model)? {
                    let cycles = cadence.record_discriminator_step();
                    for _ in 0..cycles {
                        let mut failures = 0;
                        while !trainer.update_generator(model)? {
                            failures += 1;
                            if failures >= t.max_g_retries {
                                return Err(Error::NumericInstability { retries: failures });
                            }
                            warn!("Retrying generator update ({failures}/{})", t.max_g_retries);
                        }
                    }
                }

                pb.inc(1);
                batch_idx += 1;
            }
            pb.finish_with_message("done");

            // Forced end-of-epoch snapshot covering the trailing batches
            self.snapshot(epoch, batch_idx, model, &mut trainer, visualizer.as_ref())?;
            model.save(&t.save_dir, Some(epoch))?;

            if trainer.get_error_storage().check_divergence(10) {
                warn!("Possible mode collapse detected, consider adjusting learning rates");
            }
        }

        Ok(trainer.get_error_storage().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tch::{Device, Kind, Tensor};

    fn tiny_config(data_dir: &str, save_dir: &str) -> Config {
        let mut config = Config::default();
        config.data.labels1 = vec![0, 1];
        config.data.labels2 = vec![0, 1];
        config.data.mini_batch_size = 2;
        config.data.batches_per_epoch = 3;
        config.data.data_dir = data_dir.to_string();
        config.model.g_dim = 4;
        config.model.d_dim = 2;
        config.model.z_len = 8;
        config.training.epochs = 1;
        config.training.k = 2;
        config.training.snap_step = 2;
        config.training.visualize = false;
        config.training.save_dir = save_dir.to_string();
        config
    }

    fn toy_dataset(config: &Config) -> PairedDataset {
        let images = Tensor::zeros([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        let edges = Tensor::zeros([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        PairedDataset::new(config, images, Some(edges), vec![0, 1, 0, 1]).unwrap()
    }

    #[test]
    fn test_one_epoch_writes_checkpoints_and_history() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        let config = tiny_config(
            data_dir.path().to_str().unwrap(),
            save_dir.path().to_str().unwrap(),
        );
        config.validate().unwrap();

        let mut model = GanModel::new(&config, Device::Cpu).unwrap();
        let dataset = toy_dataset(&config);
        let mut rng = StdRng::seed_from_u64(1);

        let driver = TrainingDriver::new(&config);
        let storage = driver.train(&mut model, &dataset, &mut rng).unwrap();

        assert!(!storage.is_empty());
        assert!(save_dir.path().join("generator.pt").exists());
        assert!(save_dir.path().join("discriminator.pt").exists());
        assert!(save_dir.path().join("0_generator.pt").exists());
        assert!(save_dir.path().join("0_discriminator.pt").exists());
        assert!(save_dir.path().join("errors.csv").exists());
    }

    #[test]
    fn test_resume_skips_completed_epochs() {
        let data_dir = tempfile::tempdir().unwrap();
        let save_dir = tempfile::tempdir().unwrap();
        let mut config = tiny_config(
            data_dir.path().to_str().unwrap(),
            save_dir.path().to_str().unwrap(),
        );

        let mut model = GanModel::new(&config, Device::Cpu).unwrap();
        let dataset = toy_dataset(&config);
        let mut rng = StdRng::seed_from_u64(2);

        TrainingDriver::new(&config)
            .train(&mut model, &dataset, &mut rng)
            .unwrap();

        // Resuming from the last finished epoch with the same epoch count
        // leaves nothing to run.
        config.training.load_dir = Some(save_dir.path().to_str().unwrap().to_string());
        config.training.load_epoch = Some(0);
        let storage = TrainingDriver::new(&config)
            .train(&mut model, &dataset, &mut rng)
            .unwrap();
        assert!(storage.is_empty());
    }
}
