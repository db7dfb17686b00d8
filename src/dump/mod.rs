mod progress;

use std::time::Instant;

use log::info;

use crate::error::ConvertError;
use crate::raster::{PixelType, Raster};

pub use progress::Progress;


/// Reads the single byte band of `raster` into a row-major buffer.
pub fn read_pixels(raster: &mut dyn Raster) -> Result<Vec<u8>, ConvertError> {
    let band_count = raster.band_count();
    if band_count != 1 {
        return Err(ConvertError::BandCount(band_count));
    }

    let band_type = raster.band_type();
    if band_type != PixelType::Byte {
        return Err(ConvertError::PixelType(band_type));
    }

    let (width, height) = raster.size();
    let mut pixels = vec![0u8; width * height];
    let mut progress = Progress::new("Reading data", width * height, true);

    for (row, buf) in pixels.chunks_exact_mut(width.max(1)).enumerate().take(height) {
        progress.advance_to(row * width);
        raster.read_row(row, buf)?;
    }

    Ok(pixels)
}

/// Renders the row-major `pixels` as a JSON array of `width` columns with
/// `height` values each, so `data[x][y]` is the pixel at column `x`, row `y`.
pub fn pixels_to_json(pixels: &[u8], width: usize, height: usize) -> String {
    let numbers: Vec<String> = (0..=255u8).map(|v| v.to_string()).collect();
    let mut progress = Progress::new("Building data JSON", width * height, false);

    let mut result = String::with_capacity(width * height * 4 + width * 3 + 2);
    result.push('[');

    for x in 0..width {
        result.push('[');

        for y in 0..height {
            progress.advance_to(x * height + y);

            result.push_str(&numbers[pixels[y * width + x] as usize]);
            if y + 1 < height {
                result.push(',');
            }
        }

        result.push(']');
        if x + 1 < width {
            result.push_str(",\n");
        }
    }

    result.push(']');
    result
}

/// Reads the band and renders it, logging how long each phase took.
pub fn dump_data(raster: &mut dyn Raster) -> Result<String, ConvertError> {
    let now = Instant::now();
    let pixels = read_pixels(raster)?;
    info!("Reading data took {} ms", now.elapsed().as_millis());

    let (width, height) = raster.size();

    let now = Instant::now();
    let json = pixels_to_json(&pixels, width, height);
    info!("Data JSON building took {} ms", now.elapsed().as_millis());

    Ok(json)
}
