//! Snapshot image grids
//!
//! A fixed noise/conditioning batch is drawn once at construction so
//! successive snapshots render the same latent points and progress is
//! visible across training. With auxiliary classification the grid puts
//! one class per row block; otherwise it is a plain square of samples.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use ndarray::Array3;
use tch::{Device, Kind, Tensor};

use crate::error::Result;
use crate::model::{GenOutput, Generator, GeneratorInput};
use crate::training::{sample_z, to_one_hot};
use crate::utils::Config;

/// Renders generator output grids at snapshot time
pub struct Visualizer {
    generator_input: GeneratorInput,
    x_dim: i64,
    y_dim: i64,
    save_dir: String,
    coupled: bool,
}

impl Visualizer {
    /// Build the fixed evaluation input for the configured grid
    pub fn new(config: &Config, device: Device) -> Self {
        let m = &config.model;
        let vis_dim = config.training.vis_dim;
        let conditioned = m.auxclas || m.conditional;

        let noise_len = if conditioned { vis_dim } else { vis_dim * vis_dim };
        let mut z = Tensor::zeros([noise_len, m.z_len], (Kind::Float, device));
        sample_z(m.z_distribution, &mut z);

        let mut x_dim = vis_dim;
        let y_dim = vis_dim;
        let mut cond = None;

        if conditioned {
            // One row block per class of the first head, the same noise
            // repeated for every class.
            let classes = m.categories[0];
            let labels: Vec<i64> = (0..classes)
                .flat_map(|c| std::iter::repeat(c).take(noise_len as usize))
                .collect();
            let heads = m.categories.len() as i64;
            let label_cols: Vec<Tensor> = (0..heads)
                .map(|h| {
                    let cats = m.categories[h as usize];
                    Tensor::from_slice(&labels.iter().map(|&l| l % cats).collect::<Vec<_>>())
                })
                .collect();
            let stacked = Tensor::stack(&label_cols, 1);
            cond = Some(to_one_hot(&m.categories, &stacked).to_device(device));

            z = z.repeat([classes, 1]);
            x_dim = classes;
        }

        let generator_input = GeneratorInput {
            z,
            cond1: cond.as_ref().map(|c| c.shallow_clone()),
            cond2: (m.coupled && conditioned).then(|| {
                cond.as_ref()
                    .map(|c| c.shallow_clone())
                    .expect("conditioning exists when conditioning is requested")
            }),
        };

        Self {
            generator_input,
            x_dim,
            y_dim,
            save_dir: config.training.save_dir.clone(),
            coupled: m.coupled,
        }
    }

    /// Tile a (n, c, h, w) output batch into one (c, rows, cols) grid
    fn output_to_grid(&self, output: &Tensor) -> Result<Array3<f32>> {
        let size = output.size();
        let (channels, h, w) = (size[1] as usize, size[2] as usize, size[3] as usize);
        let x_dim = self.x_dim as usize;
        let y_dim = self.y_dim as usize;

        let data: Vec<f32> = output.to_device(Device::Cpu).flatten(0, -1).try_into()?;

        let mut grid = Array3::<f32>::zeros((channels, x_dim * h, y_dim * w));
        for ity in 0..y_dim {
            for itx in 0..x_dim {
                let sample = ity + y_dim * itx;
                let base = sample * channels * h * w;
                for ch in 0..channels {
                    for i in 0..h {
                        for j in 0..w {
                            grid[(ch, itx * h + i, ity * w + j)] =
                                data[base + ch * h * w + i * w + j];
                        }
                    }
                }
            }
        }
        Ok(grid)
    }

    /// Write one grid image, mapping values from [-1, 1] to [0, 255]
    fn save_img(&self, path: &Path, output: &Tensor) -> Result<()> {
        let grid = self.output_to_grid(output)?;
        let (channels, rows, cols) = grid.dim();

        let to_u8 = |v: f32| ((v + 1.0) / 2.0 * 255.0).clamp(0.0, 255.0) as u8;

        if channels == 1 {
            let img = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
                image::Luma([to_u8(grid[(0, y as usize, x as usize)])])
            });
            img.save(path)?;
        } else {
            let img = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
                image::Rgb([
                    to_u8(grid[(0, y as usize, x as usize)]),
                    to_u8(grid[(1, y as usize, x as usize)]),
                    to_u8(grid[(2, y as usize, x as usize)]),
                ])
            });
            img.save(path)?;
        }
        Ok(())
    }

    fn branch_path(dir: &Path, stem: &str, branch: Option<usize>) -> PathBuf {
        match branch {
            Some(nr) => dir.join(format!("{stem}_{nr}.png")),
            None => dir.join(format!("{stem}.png")),
        }
    }

    fn save_output(&self, subdir: &str, stem: &str, fake: &GenOutput) -> Result<()> {
        let dir = Path::new(&self.save_dir).join(subdir);
        std::fs::create_dir_all(&dir)?;

        if self.coupled {
            self.save_img(&Self::branch_path(&dir, stem, Some(0)), &fake.a)?;
            if let Some(b) = &fake.b {
                self.save_img(&Self::branch_path(&dir, stem, Some(1)), b)?;
            }
        } else {
            self.save_img(&Self::branch_path(&dir, stem, None), &fake.a)?;
        }
        Ok(())
    }

    /// Render the training grid(s) for the current weights
    pub fn save_training_imgs(&self, epoch: usize, batch: usize, generator: &Generator) -> Result<()> {
        let fake = generator.generate(&self.generator_input);
        self.save_output("train_imgs", &format!("{epoch}_{batch}"), &fake)
    }

    /// Render the test grid(s) for the current weights
    pub fn save_test_imgs(&self, generator: &Generator) -> Result<()> {
        let fake = generator.generate(&self.generator_input);
        self.save_output("test_imgs", "test", &fake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GanModel;

    fn small_config(dir: &str) -> Config {
        let mut config = Config::default();
        config.model.g_dim = 4;
        config.model.d_dim = 2;
        config.model.z_len = 8;
        config.training.vis_dim = 2;
        config.training.save_dir = dir.to_string();
        config
    }

    #[test]
    fn test_training_grid_files_per_branch() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path().to_str().unwrap());
        let model = GanModel::new(&config, Device::Cpu).unwrap();

        let vis = Visualizer::new(&config, Device::Cpu);
        vis.save_training_imgs(0, 0, &model.generator).unwrap();

        assert!(dir.path().join("train_imgs/0_0_0.png").exists());
        assert!(dir.path().join("train_imgs/0_0_1.png").exists());
    }

    #[test]
    fn test_uncoupled_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().to_str().unwrap());
        config.model.coupled = false;
        let model = GanModel::new(&config, Device::Cpu).unwrap();

        let vis = Visualizer::new(&config, Device::Cpu);
        vis.save_test_imgs(&model.generator).unwrap();

        assert!(dir.path().join("test_imgs/test.png").exists());
        assert!(!dir.path().join("test_imgs/test_0.png").exists());
    }

    #[test]
    fn test_auxclas_grid_has_one_block_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().to_str().unwrap());
        config.model.auxclas = true;
        config.model.categories = vec![10];
        let model = GanModel::new(&config, Device::Cpu).unwrap();

        let vis = Visualizer::new(&config, Device::Cpu);
        vis.save_training_imgs(1, 50, &model.generator).unwrap();

        let img = image::open(dir.path().join("train_imgs/1_50_0.png")).unwrap();
        // 10 class columns of 28px, vis_dim rows of 28px
        assert_eq!(img.height(), 10 * 28);
        assert_eq!(img.width(), 2 * 28);
    }
}
