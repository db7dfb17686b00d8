mod chunks;
mod geokeys;
mod geotiff;
mod reporter;

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::info;

use crate::error::ConvertError;

pub use geotiff::GeoTiffRaster;
pub use reporter::{ErrorReporter, StderrReporter};

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::path::Path;

    use crate::error::ConvertError;
    use crate::raster::{open, PixelType};
    use crate::test::{gzip_file, with_temp_dir, write_geotiff, GeoTiffFixture, RecordingReporter};

    #[rstest]
    #[case(1, 8, PixelType::Byte)]
    #[case(2, 8, PixelType::Int8)]
    #[case(1, 16, PixelType::UInt16)]
    #[case(2, 16, PixelType::Int16)]
    #[case(1, 32, PixelType::UInt32)]
    #[case(2, 32, PixelType::Int32)]
    #[case(1, 64, PixelType::UInt64)]
    #[case(2, 64, PixelType::Int64)]
    #[case(3, 32, PixelType::Float32)]
    #[case(3, 64, PixelType::Float64)]
    #[case(1, 1, PixelType::Unknown(1, 1))]
    #[case(3, 16, PixelType::Unknown(3, 16))]
    #[case(4, 8, PixelType::Unknown(4, 8))]
    fn pixel_type_from_tiff_sample_layout(#[case] format: u16, #[case] bits: u16, #[case] expected: PixelType) {
        assert_eq!(expected, PixelType::from_tiff(format, bits));
    }

    #[test]
    fn pixel_type_displays_gdal_name() {
        assert_eq!("Byte", PixelType::Byte.to_string());
        assert_eq!("Float64", PixelType::Float64.to_string());
    }

    #[test]
    fn unknown_pixel_type_displays_sample_layout() {
        assert_eq!("Unknown (SampleFormat 3, 16 bits)", PixelType::Unknown(3, 16).to_string());
        assert_eq!("Unknown (SampleFormat 1, 4 bits)", PixelType::from_tiff(1, 4).to_string());
    }

    #[test]
    fn open_missing_file_reports_and_fails() {
        let reporter = RecordingReporter::default();
        let res = open(Path::new("./does/not/exist.tif"), &reporter);

        assert!(matches!(res, Err(ConvertError::RasterOpen { .. })));
        assert_eq!(1, reporter.messages().len());
    }

    #[test]
    fn open_garbage_reports_and_fails() {
        with_temp_dir(|dir| {
            let path = dir.join("garbage.tif");
            std::fs::write(&path, b"this is not a tiff").unwrap();

            let reporter = RecordingReporter::default();
            assert!(open(&path, &reporter).is_err());
            assert_eq!(1, reporter.messages().len());
        });
    }

    #[test]
    fn open_corrupt_gzip_reports_and_fails() {
        with_temp_dir(|dir| {
            let path = dir.join("broken.tif.gz");
            std::fs::write(&path, b"\x1f\x8b\x08\x00 definitely not deflate").unwrap();

            let reporter = RecordingReporter::default();
            assert!(open(&path, &reporter).is_err());
            assert_eq!(1, reporter.messages().len());
        });
    }

    #[test]
    fn open_reads_plain_and_compressed_alike() {
        with_temp_dir(|dir| {
            let fixture = GeoTiffFixture::gradient(3, 2);
            let plain = dir.join("grid.tif");
            write_geotiff(&plain, &fixture).unwrap();
            let compressed = gzip_file(&plain).unwrap();

            let reporter = RecordingReporter::default();
            let a = open(&plain, &reporter).unwrap();
            let b = open(&compressed, &reporter).unwrap();

            assert_eq!(a.size(), b.size());
            assert_eq!(a.projection_ref(), b.projection_ref());
            assert_eq!(a.geo_transform(), b.geo_transform());
            assert!(reporter.messages().is_empty());
        });
    }
}

/// The six GDAL geotransform coefficients:
/// origin x, pixel width, row rotation, origin y, column rotation, pixel height.
pub type GeoTransform = [f64; 6];

/// Transform reported for rasters without any georeferencing.
pub const IDENTITY_TRANSFORM: GeoTransform = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Sample data type of a band, named the way GDAL names them.
///
/// Layouts without a GDAL counterpart keep their TIFF `SampleFormat` and
/// `BitsPerSample` so errors can name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Byte,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
    Unknown(u16, u16),
}

impl PixelType {
    /// Maps TIFF `SampleFormat` and `BitsPerSample` onto a data type.
    pub fn from_tiff(sample_format: u16, bits_per_sample: u16) -> Self {
        match (sample_format, bits_per_sample) {
            (1, 8) => PixelType::Byte,
            (2, 8) => PixelType::Int8,
            (1, 16) => PixelType::UInt16,
            (2, 16) => PixelType::Int16,
            (1, 32) => PixelType::UInt32,
            (2, 32) => PixelType::Int32,
            (1, 64) => PixelType::UInt64,
            (2, 64) => PixelType::Int64,
            (3, 32) => PixelType::Float32,
            (3, 64) => PixelType::Float64,
            (format, bits) => PixelType::Unknown(format, bits),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelType::Byte => "Byte",
            PixelType::Int8 => "Int8",
            PixelType::UInt16 => "UInt16",
            PixelType::Int16 => "Int16",
            PixelType::UInt32 => "UInt32",
            PixelType::Int32 => "Int32",
            PixelType::UInt64 => "UInt64",
            PixelType::Int64 => "Int64",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
            PixelType::Unknown(..) => "Unknown",
        }
    }
}

impl Display for PixelType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PixelType::Unknown(format, bits) => write!(f, "Unknown (SampleFormat {}, {} bits)", format, bits),
            _ => f.write_str(self.name()),
        }
    }
}

/// An opened raster dataset.
pub trait Raster {
    /// `(width, height)` in pixels.
    fn size(&self) -> (usize, usize);
    fn band_count(&self) -> usize;
    fn band_type(&self) -> PixelType;
    fn projection_ref(&self) -> String;
    fn geo_transform(&self) -> GeoTransform;

    /// Copies row `row` of the first band into `buf`, which must be `width` bytes long.
    fn read_row(&mut self, row: usize, buf: &mut [u8]) -> Result<(), ConvertError>;
}

/// Opens `path` read-only. Paths ending in `.gz` are inflated in memory first.
///
/// Every failure is handed to `reporter` before it is returned.
pub fn open(path: &Path, reporter: &dyn ErrorReporter) -> Result<Box<dyn Raster>, ConvertError> {
    let display = path.display().to_string();

    match open_geotiff(path, &display) {
        Ok(raster) => Ok(raster),
        Err(message) => {
            reporter.report(&message);
            Err(ConvertError::RasterOpen {
                path: display,
                message,
            })
        }
    }
}

fn open_geotiff(path: &Path, display: &str) -> Result<Box<dyn Raster>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;

    if display.ends_with(".gz") {
        info!("Reading in (compressed) {}", display);
        let mut bytes = Vec::new();
        GzDecoder::new(BufReader::new(file))
            .read_to_end(&mut bytes)
            .map_err(|e| format!("Couldn't decompress: {}", e))?;

        let raster = GeoTiffRaster::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
        Ok(Box::new(raster))
    } else {
        info!("Reading in {}", display);
        let raster = GeoTiffRaster::new(BufReader::new(file)).map_err(|e| e.to_string())?;
        Ok(Box::new(raster))
    }
}
