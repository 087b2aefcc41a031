//! Error history plot
//!
//! Renders the tracked loss series as polylines into one PNG next to the
//! checkpoints. Deliberately plain: fixed canvas, one color per series,
//! shared value axis.

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::error::Result;
use crate::training::ErrorStorage;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const MARGIN: f32 = 40.0;

const COLORS: [Rgb<u8>; 5] = [
    Rgb([220, 60, 60]),   // d_real
    Rgb([230, 150, 40]),  // d_fake
    Rgb([150, 90, 200]),  // d_class
    Rgb([50, 110, 220]),  // g_adv
    Rgb([60, 170, 100]),  // g_class
];

/// Write the error plot as `errors.png` under `save_dir`
///
/// Nothing is written while the history holds fewer than two snapshots.
pub fn save_error_plot(storage: &ErrorStorage, save_dir: &str) -> Result<()> {
    if storage.len() < 2 {
        return Ok(());
    }

    let series = storage.series();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for values in series.iter() {
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return Ok(());
    }
    if (max - min).abs() < 1e-12 {
        max = min + 1.0;
    }

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

    // Axes
    let axis = Rgb([0, 0, 0]);
    draw_line_segment_mut(
        &mut img,
        (MARGIN, HEIGHT as f32 - MARGIN),
        (WIDTH as f32 - MARGIN, HEIGHT as f32 - MARGIN),
        axis,
    );
    draw_line_segment_mut(
        &mut img,
        (MARGIN, MARGIN),
        (MARGIN, HEIGHT as f32 - MARGIN),
        axis,
    );

    let plot_w = WIDTH as f32 - 2.0 * MARGIN;
    let plot_h = HEIGHT as f32 - 2.0 * MARGIN;
    let n = storage.len();

    let to_xy = |i: usize, v: f64| {
        let x = MARGIN + plot_w * i as f32 / (n - 1) as f32;
        let frac = ((v - min) / (max - min)) as f32;
        let y = HEIGHT as f32 - MARGIN - plot_h * frac;
        (x, y)
    };

    for (values, color) in series.iter().zip(COLORS.iter()) {
        for i in 1..values.len() {
            if !values[i - 1].is_finite() || !values[i].is_finite() {
                continue;
            }
            draw_line_segment_mut(
                &mut img,
                to_xy(i - 1, values[i - 1]),
                to_xy(i, values[i]),
                *color,
            );
        }
    }

    std::fs::create_dir_all(save_dir)?;
    img.save(Path::new(save_dir).join("errors.png"))?;
    Ok(())
}
