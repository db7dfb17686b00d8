use std::io::{Read, Seek, SeekFrom};

use log::debug;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::TiffResult;

use super::chunks::ChunkLayout;
use super::geokeys::{GeoKeyDirectory, TAG_GEO_ASCII_PARAMS, TAG_GEO_KEY_DIRECTORY};
use super::{GeoTransform, PixelType, Raster, IDENTITY_TRANSFORM};
use crate::error::ConvertError;

const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const PHOTOMETRIC_PALETTE: u16 = 3;


/// A GeoTIFF read through the `tiff` crate.
///
/// Header and georeferencing are read up front, pixels are decoded on the first
/// `read_row`. Palette images keep their index bytes.
pub struct GeoTiffRaster<R: Read + Seek> {
    reader: R,
    width: usize,
    height: usize,
    samples_per_pixel: usize,
    pixel_type: PixelType,
    projection_ref: String,
    geo_transform: GeoTransform,
    palette_chunks: Option<ChunkLayout>,
    pixels: Option<Vec<u8>>,
}

impl<R: Read + Seek> GeoTiffRaster<R> {
    pub fn new(mut reader: R) -> TiffResult<Self> {
        let mut decoder = Decoder::new(&mut reader)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;

        let samples_per_pixel = decoder
            .find_tag(Tag::SamplesPerPixel)?
            .map(|v| v.into_u16())
            .transpose()?
            .unwrap_or(1) as usize;

        let bits = uniform(decoder.find_tag(Tag::BitsPerSample)?.map(|v| v.into_u16_vec()).transpose()?, 1);
        let format = uniform(decoder.find_tag(Tag::SampleFormat)?.map(|v| v.into_u16_vec()).transpose()?, 1);
        let pixel_type = match (format, bits) {
            (Some(format), Some(bits)) => PixelType::from_tiff(format, bits),
            (format, bits) => PixelType::Unknown(format.unwrap_or(0), bits.unwrap_or(0)),
        };

        let photometric = decoder
            .find_tag(Tag::PhotometricInterpretation)?
            .map(|v| v.into_u16())
            .transpose()?;
        let palette_chunks = match photometric {
            Some(PHOTOMETRIC_PALETTE) => Some(ChunkLayout::from_decoder(&mut decoder, width, height)?),
            _ => None,
        };

        let keys = match decoder.find_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))? {
            Some(dir) => {
                let ascii = decoder
                    .find_tag(Tag::from_u16_exhaustive(TAG_GEO_ASCII_PARAMS))?
                    .map(|v| v.into_string())
                    .transpose()?;
                GeoKeyDirectory::parse(&dir.into_u16_vec()?, ascii)
            }
            None => GeoKeyDirectory::default(),
        };

        let transformation = find_f64_vec(&mut decoder, Tag::from_u16_exhaustive(TAG_MODEL_TRANSFORMATION))?;
        let tiepoint = find_f64_vec(&mut decoder, Tag::ModelTiepointTag)?;
        let pixel_scale = find_f64_vec(&mut decoder, Tag::ModelPixelScaleTag)?;
        let geo_transform = geo_transform_from_tags(transformation, tiepoint, pixel_scale, keys.is_pixel_is_point());

        let projection_ref = keys.projection_ref();

        debug!(
            "GeoTIFF {}x{}, {} sample(s) of {}{}, projection '{}'",
            width,
            height,
            samples_per_pixel,
            pixel_type,
            if palette_chunks.is_some() { " (palette)" } else { "" },
            projection_ref
        );

        drop(decoder);

        Ok(GeoTiffRaster {
            reader,
            width: width as usize,
            height: height as usize,
            samples_per_pixel,
            pixel_type,
            projection_ref,
            geo_transform,
            palette_chunks,
            pixels: None,
        })
    }

    fn decode(&mut self) -> Result<&[u8], ConvertError> {
        if self.pixels.is_none() {
            let pixels = match &self.palette_chunks {
                Some(layout) => layout.read(&mut self.reader, self.width, self.height)?,
                None => self.decode_image()?,
            };

            if pixels.len() < self.width * self.height {
                return Err(ConvertError::RasterRead(format!(
                    "expected {} pixels, decoded {}",
                    self.width * self.height,
                    pixels.len()
                )));
            }

            self.pixels = Some(pixels);
        }

        Ok(self.pixels.as_deref().unwrap_or(&[]))
    }

    fn decode_image(&mut self) -> Result<Vec<u8>, ConvertError> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| ConvertError::RasterRead(e.to_string()))?;
        let decoded = Decoder::new(&mut self.reader)
            .and_then(|decoder| decoder.with_limits(Limits::unlimited()).read_image())
            .map_err(|e| ConvertError::RasterRead(e.to_string()))?;

        match decoded {
            DecodingResult::U8(pixels) => Ok(pixels),
            _ => Err(ConvertError::RasterRead(
                "decoder returned non-byte samples".to_string(),
            )),
        }
    }
}

impl<R: Read + Seek> Raster for GeoTiffRaster<R> {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn band_count(&self) -> usize {
        self.samples_per_pixel
    }

    fn band_type(&self) -> PixelType {
        self.pixel_type
    }

    fn projection_ref(&self) -> String {
        self.projection_ref.clone()
    }

    fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    fn read_row(&mut self, row: usize, buf: &mut [u8]) -> Result<(), ConvertError> {
        let width = self.width;
        if row >= self.height {
            return Err(ConvertError::RasterRead(format!(
                "row {} is outside of a raster with {} rows",
                row, self.height
            )));
        }

        let pixels = self.decode()?;
        let start = row * width;
        buf.copy_from_slice(&pixels[start..start + width]);

        Ok(())
    }
}

/// Returns the common value of a per-sample tag, `None` if samples disagree.
fn uniform(values: Option<Vec<u16>>, default: u16) -> Option<u16> {
    match values {
        None => Some(default),
        Some(values) => {
            let first = *values.first()?;
            values.iter().all(|v| *v == first).then(|| first)
        }
    }
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<Vec<f64>>> {
    decoder.find_tag(tag)?.map(|v| v.into_f64_vec()).transpose()
}

/// Builds a GDAL style geotransform from the GeoTIFF model tags.
fn geo_transform_from_tags(
    transformation: Option<Vec<f64>>,
    tiepoint: Option<Vec<f64>>,
    pixel_scale: Option<Vec<f64>>,
    pixel_is_point: bool,
) -> GeoTransform {
    let mut gt = match (transformation, tiepoint, pixel_scale) {
        (Some(m), _, _) if m.len() >= 8 => [m[3], m[0], m[1], m[7], m[4], m[5]],
        (_, Some(tp), Some(scale)) if tp.len() >= 6 && scale.len() >= 2 => {
            let (sx, sy) = (scale[0], scale[1]);
            [tp[3] - tp[0] * sx, sx, 0.0, tp[4] + tp[1] * sy, 0.0, -sy]
        }
        _ => return IDENTITY_TRANSFORM,
    };

    // GeoTIFF anchors PixelIsPoint rasters at pixel centres, GDAL at corners.
    if pixel_is_point {
        gt[0] -= 0.5 * gt[1] + 0.5 * gt[2];
        gt[3] -= 0.5 * gt[4] + 0.5 * gt[5];
    }

    gt
}
