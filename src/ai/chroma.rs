//! Background removal for generated images.
//!
//! The image model is asked for a solid `#3100FF` background but never paints it
//! perfectly uniform, so pixels are keyed out by distance rather than equality.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};

use crate::error::Result;

/// The background colour requested from the image model.
pub const BACKGROUND_KEY: [u8; 3] = [49, 0, 255];

/// Pixels strictly closer than this to the key become transparent.
pub const KEY_THRESHOLD: u32 = 45;

/// Sum of absolute per-channel differences.
pub fn chroma_distance(pixel: [u8; 3], key: [u8; 3]) -> u32 {
    pixel
        .iter()
        .zip(key.iter())
        .map(|(&p, &k)| u32::from(p.abs_diff(k)))
        .sum()
}

/// Clears the alpha of every pixel within `threshold` of `key`. Returns how many
/// pixels were cleared.
pub fn chroma_key(image: &mut RgbaImage, key: [u8; 3], threshold: u32) -> usize {
    let mut cleared = 0;
    for pixel in image.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if chroma_distance([r, g, b], key) < threshold {
            pixel.0[3] = 0;
            cleared += 1;
        }
    }
    cleared
}

/// Decodes model output and keys out the background colour.
pub fn remove_background(bytes: &[u8]) -> Result<RgbaImage> {
    let mut image = image::load_from_memory(bytes)?.to_rgba8();
    let cleared = chroma_key(&mut image, BACKGROUND_KEY, KEY_THRESHOLD);
    tracing::debug!(
        "Keyed out {} of {} pixels",
        cleared,
        u64::from(image.width()) * u64::from(image.height())
    );
    Ok(image)
}

/// Writes `image` as PNG. The file only appears at `destination` once encoding has
/// fully succeeded.
pub fn write_png(image: &RgbaImage, destination: &Path) -> Result<()> {
    let file_name = destination
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid image destination: {}", destination.display()))?;
    let staging = destination.with_file_name(format!(".{}.part", file_name.to_string_lossy()));

    if let Err(e) = image.save_with_format(&staging, ImageFormat::Png) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }

    if let Err(e) = std::fs::rename(&staging, destination) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }

    Ok(())
}

/// Decodes, keys and writes the image on the blocking pool so the runtime thread
/// stays free.
pub async fn save_transparent_png(bytes: Vec<u8>, destination: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        let image = remove_background(&bytes)?;
        write_png(&image, &destination)
    })
    .await?
}
