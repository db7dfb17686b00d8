use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;

use log::info;

use crate::dump::dump_data;
use crate::error::ConvertError;
use crate::metadata::{dump_metadata, read_metadata};
use crate::raster::{self, ErrorReporter};


/// Runs the whole conversion for `path`.
///
/// `input` must hold the extra metadata object and is consumed before the raster
/// is touched. Nothing is written to `output` until both halves of the document
/// have been built.
pub fn run<R: Read, W: Write>(
    path: &Path,
    input: &mut R,
    output: &mut W,
    reporter: &dyn ErrorReporter,
) -> Result<(), ConvertError> {
    let start = Instant::now();

    let additional = read_metadata(input)?;

    let mut raster = raster::open(path, reporter)?;

    let metadata = dump_metadata(raster.as_ref(), &additional)?;
    let data = dump_data(raster.as_mut()).map_err(|e| {
        if let ConvertError::RasterRead(message) = &e {
            reporter.report(message);
        }
        e
    })?;

    info!("Writing data...");
    write!(output, "{{\"metadata\":{},\n\"data\": {}}}", metadata, data)?;
    output.flush()?;

    info!("Done in {} ms.", start.elapsed().as_millis());

    Ok(())
}
