//
// imaging.rs
// PDT-Tools-rs
//
// Reads fluorescence photographs from disk and flattens one channel into an intensity sample.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;

use crate::models::{Background, FluorescenceSample};

/// Channel used as the fluorescence signal. PpIX emits around 635 nm, so red is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntensityChannel {
    #[default]
    Red,
    Green,
    Blue,
    Luma,
}

/// Row-major 8-bit intensities of the selected channel.
pub fn intensity_from_image(image: &DynamicImage, channel: IntensityChannel) -> Vec<f64> {
    let index = match channel {
        IntensityChannel::Red => 0,
        IntensityChannel::Green => 1,
        IntensityChannel::Blue => 2,
        IntensityChannel::Luma => {
            return image
                .to_luma8()
                .pixels()
                .map(|p| f64::from(p.0[0]))
                .collect();
        }
    };

    image
        .to_rgb8()
        .pixels()
        .map(|p| f64::from(p.0[index]))
        .collect()
}

pub fn load_intensity(path: &Path, channel: IntensityChannel) -> Result<Vec<f64>> {
    let image = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;
    Ok(intensity_from_image(&image, channel))
}

/// Builds a sample from an image, optionally subtracting a dark-frame image of the same size.
pub fn load_sample(
    path: &Path,
    background: Option<&Path>,
    channel: IntensityChannel,
) -> Result<FluorescenceSample> {
    let intensity = load_intensity(path, channel)?;
    let background = background
        .map(|bg| load_intensity(bg, channel))
        .transpose()?
        .map(Background::PerPixel);

    Ok(FluorescenceSample {
        intensity,
        background,
        ..Default::default()
    })
}
