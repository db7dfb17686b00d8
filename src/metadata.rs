use std::io::Read;

use log::info;
use serde_json::{json, Map, Value};

use crate::error::ConvertError;
use crate::raster::Raster;


/// Parses the extra metadata object supplied on `reader` (stdin).
pub fn read_metadata<R: Read>(reader: R) -> Result<Map<String, Value>, ConvertError> {
    let value: Value = serde_json::from_reader(reader)
        .map_err(|e| ConvertError::MalformedMetadata(e.to_string()))?;

    let metadata = match value {
        Value::Object(map) => map,
        other => {
            return Err(ConvertError::MalformedMetadata(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            )))
        }
    };

    info!("Read a JSON object with {} metadata keys from stdin.", metadata.len());

    Ok(metadata)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Merges `additional` with the raster derived fields and renders the result compactly.
///
/// Derived fields are assigned last and therefore replace external keys of the same name.
pub fn dump_metadata(raster: &dyn Raster, additional: &Map<String, Value>) -> Result<String, ConvertError> {
    let mut metadata = additional.clone();

    let (width, height) = raster.size();
    metadata.insert("width".to_string(), json!(width));
    metadata.insert("height".to_string(), json!(height));
    metadata.insert("projectionRef".to_string(), json!(raster.projection_ref()));
    metadata.insert("affineTransform".to_string(), json!(raster.geo_transform()));

    let output = serde_json::to_string(&Value::Object(metadata))
        .map_err(|e| ConvertError::Io(e.into()))?;
    let output = output.trim_end().to_string();

    info!("Metadata: {}", output);

    Ok(output)
}
