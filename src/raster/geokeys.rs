//! Minimal reader for the GeoTIFF key directory (tag 34735).
//!
//! Layout: a four short header `[version, revision, minor, key_count]` followed by
//! `key_count` entries of `[key_id, tag_location, count, value_or_offset]`.
//! A `tag_location` of 0 means the value is stored inline, 34737 points into
//! `GeoAsciiParamsTag`.

pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GEO_ASCII_PARAMS: u16 = 34737;

const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const GEOG_CITATION: u16 = 2049;
const PROJECTED_CS_TYPE: u16 = 3072;
const PCS_CITATION: u16 = 3073;

const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

#[cfg(test)]
mod tests {
    use super::GeoKeyDirectory;

    fn directory(keys: &[[u16; 4]]) -> Vec<u16> {
        let mut raw = vec![1, 1, 0, keys.len() as u16];
        keys.iter().for_each(|k| raw.extend_from_slice(k));
        raw
    }

    #[test]
    fn projected_code_wins_over_geographic() {
        let raw = directory(&[[2048, 0, 1, 4326], [3072, 0, 1, 3067]]);
        let keys = GeoKeyDirectory::parse(&raw, None);
        assert_eq!("EPSG:3067", keys.projection_ref());
    }

    #[test]
    fn geographic_code_is_used_without_projection() {
        let raw = directory(&[[2048, 0, 1, 4326]]);
        let keys = GeoKeyDirectory::parse(&raw, None);
        assert_eq!("EPSG:4326", keys.projection_ref());
    }

    #[test]
    fn user_defined_falls_back_to_citation() {
        let ascii = "ETRS89 / TM35FIN|".to_string();
        let raw = directory(&[[3072, 0, 1, 32767], [3073, 34737, 17, 0]]);
        let keys = GeoKeyDirectory::parse(&raw, Some(ascii));
        assert_eq!("ETRS89 / TM35FIN", keys.projection_ref());
    }

    #[test]
    fn citation_offsets_into_shared_ascii_block() {
        let ascii = "first|second|".to_string();
        let raw = directory(&[[1026, 34737, 7, 6]]);
        let keys = GeoKeyDirectory::parse(&raw, Some(ascii));
        assert_eq!("second", keys.projection_ref());
    }

    #[test]
    fn empty_directory_has_no_projection() {
        let keys = GeoKeyDirectory::parse(&[], None);
        assert_eq!("", keys.projection_ref());
        assert!(!keys.is_pixel_is_point());
    }

    #[test]
    fn truncated_directory_keeps_complete_entries() {
        let mut raw = directory(&[[1025, 0, 1, 2], [3072, 0, 1, 3067]]);
        raw.truncate(10);
        let keys = GeoKeyDirectory::parse(&raw, None);
        assert!(keys.is_pixel_is_point());
        assert_eq!("", keys.projection_ref());
    }
}

#[derive(Debug, Clone, Copy)]
struct GeoKeyEntry {
    id: u16,
    location: u16,
    count: u16,
    value: u16,
}

#[derive(Debug, Default)]
pub struct GeoKeyDirectory {
    entries: Vec<GeoKeyEntry>,
    ascii: String,
}

impl GeoKeyDirectory {
    pub fn parse(raw: &[u16], ascii: Option<String>) -> Self {
        let declared = raw.get(3).copied().unwrap_or(0) as usize;

        let entries = raw
            .get(4..)
            .unwrap_or(&[])
            .chunks_exact(4)
            .take(declared)
            .map(|e| GeoKeyEntry {
                id: e[0],
                location: e[1],
                count: e[2],
                value: e[3],
            })
            .collect();

        GeoKeyDirectory {
            entries,
            ascii: ascii.unwrap_or_default(),
        }
    }

    fn entry(&self, id: u16) -> Option<&GeoKeyEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn short(&self, id: u16) -> Option<u16> {
        self.entry(id)
            .filter(|e| e.location == 0)
            .map(|e| e.value)
    }

    fn ascii(&self, id: u16) -> Option<&str> {
        let entry = self
            .entry(id)
            .filter(|e| e.location == TAG_GEO_ASCII_PARAMS)?;

        let start = entry.value as usize;
        let end = start + entry.count as usize;
        let text = self.ascii.get(start..end.min(self.ascii.len()))?;
        let text = text.trim_end_matches(|c: char| c == '|' || c == '\0').trim();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn epsg(&self, id: u16) -> Option<String> {
        self.short(id)
            .filter(|code| *code != 0 && *code != USER_DEFINED)
            .map(|code| format!("EPSG:{}", code))
    }

    /// Best textual description of the spatial reference, or `""` if there is none.
    pub fn projection_ref(&self) -> String {
        self.epsg(PROJECTED_CS_TYPE)
            .or_else(|| self.epsg(GEOGRAPHIC_TYPE))
            .or_else(|| {
                [PCS_CITATION, GT_CITATION, GEOG_CITATION]
                    .iter()
                    .find_map(|id| self.ascii(*id))
                    .map(|s| s.to_string())
            })
            .unwrap_or_default()
    }

    pub fn is_pixel_is_point(&self) -> bool {
        self.short(GT_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT)
    }
}
