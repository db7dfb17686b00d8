use crate::raster::PixelType;


/// Everything that can abort a conversion. None of these are recoverable.
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("Error parsing additional metadata from stdin: {0}")]
    MalformedMetadata(String),

    #[error("Couldn't open raster {path}: {message}")]
    RasterOpen { path: String, message: String },

    #[error("Couldn't read raster data: {0}")]
    RasterRead(String),

    #[error("Expected exactly one raster band; got {0}")]
    BandCount(usize),

    #[error("Can only handle Byte data; got {0}")]
    PixelType(PixelType),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
