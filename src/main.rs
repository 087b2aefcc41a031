//! Coupled GAN training on paired digit domains
//!
//! Main entry point providing a CLI for:
//! - Writing a default configuration file
//! - Training the coupled/conditional GAN
//! - Rendering test grids and evaluating the auxiliary classifier

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::Tensor;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_cogan_digits::{
    data::PairedDataset,
    model::GanModel,
    training::{evaluate_classifier, TrainingDriver},
    utils::{checkpoint, Config},
    vis::Visualizer,
};

/// Coupled/conditional GAN training for paired digit image domains
#[derive(Parser)]
#[command(name = "cogan_digits")]
#[command(version = "0.1.0")]
#[command(about = "Train coupled GANs on digit images and their edge maps")]
struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the model
    Train {
        /// Tensor file with second-domain images scaled to [-1, 1]
        #[arg(long)]
        edges: Option<String>,

        /// Resume from the newest epoch-tagged checkpoint in save_dir
        #[arg(long)]
        resume: bool,
    },

    /// Render test grids and evaluate the auxiliary classifier
    Test {
        /// Tensor file with second-domain images scaled to [-1, 1]
        #[arg(long)]
        edges: Option<String>,

        /// Epoch tag of the checkpoint to load; omitted loads "latest"
        #[arg(long)]
        epoch: Option<usize>,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train { edges, resume } => train(&cli.config, edges.as_deref(), resume),
        Commands::Test { edges, epoch } => test(&cli.config, edges.as_deref(), epoch),
        Commands::Init { output } => init_config(&output),
    }
}

/// Build the dataset for the configured domain setup
fn load_dataset(config: &Config, edges_path: Option<&str>) -> Result<PairedDataset> {
    info!("Loading digit data from {}", config.data.data_dir);
    let mnist = tch::vision::mnist::load_dir(&config.data.data_dir)?;

    let images = mnist.train_images.view([-1, 1, 28, 28]) * 2.0 - 1.0;
    let labels: Vec<i64> = mnist.train_labels.try_into()?;
    info!("Loaded {} samples", labels.len());

    let edges = match edges_path {
        Some(path) => {
            let edges = Tensor::load(path)
                .with_context(|| format!("failed to load second-domain tensor from {path}"))?;
            if edges.size()[0] != images.size()[0] {
                bail!(
                    "second-domain tensor has {} samples, expected {}",
                    edges.size()[0],
                    images.size()[0]
                );
            }
            Some(edges)
        }
        None => None,
    };

    if config.model.combined {
        let edges = edges.context("combined training requires --edges")?;
        let dataset =
            PairedDataset::combined(config, images, labels.clone(), edges, labels)?;
        return Ok(dataset);
    }
    if config.model.coupled && edges.is_none() {
        bail!("coupled training requires --edges");
    }
    // A second domain only makes sense with a second discriminator branch
    let edges = if config.model.coupled { edges } else { None };

    Ok(PairedDataset::new(config, images, edges, labels)?)
}

fn make_rng(config: &Config) -> StdRng {
    match config.training.seed {
        Some(seed) => {
            tch::manual_seed(seed as i64);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    }
}

/// Train the model
fn train(config_path: &str, edges: Option<&str>, resume: bool) -> Result<()> {
    let mut config = Config::from_path(config_path)?;

    if resume {
        let dir = config.training.save_dir.clone();
        let epoch = checkpoint::latest_epoch(&dir);
        match epoch {
            Some(e) => info!("Resuming from epoch {e} checkpoint in {dir}"),
            None => bail!("no epoch-tagged checkpoint found in {dir}"),
        }
        config.training.load_dir = Some(dir);
        config.training.load_epoch = epoch;
    }
    config.validate()?;

    let device = config.get_device();
    info!("Using device: {device:?}");

    let dataset = load_dataset(&config, edges)?;
    let mut model = GanModel::new(&config, device)?;
    let mut rng = make_rng(&config);

    info!(
        "Starting training: {} epochs, {} batches per epoch, k={}, G updates={}",
        config.training.epochs,
        config.data.batches_per_epoch,
        config.training.k,
        config.training.g_updates
    );

    let driver = TrainingDriver::new(&config);
    let storage = driver.train(&mut model, &dataset, &mut rng)?;

    info!("Training complete");
    if let (Some(g), Some(d)) = (storage.latest_g_adv(), storage.latest_d_total()) {
        info!("Final losses: G={g:.4}, D={d:.4}");
    }
    info!("Weights saved under {}", config.training.save_dir);

    Ok(())
}

/// Render test grids and evaluate the auxiliary classifier
fn test(config_path: &str, edges: Option<&str>, epoch: Option<usize>) -> Result<()> {
    let config = Config::from_path(config_path)?;
    config.validate()?;

    let device = config.get_device();
    let mut model = GanModel::new(&config, device)?;

    let load_dir = config
        .training
        .load_dir
        .clone()
        .unwrap_or_else(|| config.training.save_dir.clone());
    model.load(&load_dir, epoch)?;
    info!("Loaded weights from {load_dir}");

    model.freeze();

    let visualizer = Visualizer::new(&config, device);
    visualizer.save_test_imgs(&model.generator)?;
    info!("Test grids written under {}/test_imgs", config.training.save_dir);

    if config.model.auxclas {
        let dataset = load_dataset(&config, edges)?;
        let mut rng = make_rng(&config);
        evaluate_classifier(&config, &model, &dataset, &mut rng)?;
    }

    Ok(())
}

/// Initialize default configuration file
fn init_config(output: &str) -> Result<()> {
    let config = Config::default();
    if output.ends_with(".toml") {
        config.save_toml(output)?;
    } else {
        config.save_json(output)?;
    }
    info!("Created default configuration at {output}");
    Ok(())
}
