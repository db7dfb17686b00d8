use std::io::{Read, Seek, SeekFrom};

use flate2::read::ZlibDecoder;
use log::debug;
use tiff::decoder::ifd::Value;
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::error::ConvertError;

const COMPRESSION_NONE: u16 = 1;
const COMPRESSION_LZW: u16 = 5;
const COMPRESSION_DEFLATE: u16 = 8;
const COMPRESSION_OLD_DEFLATE: u16 = 32946;
const COMPRESSION_PACKBITS: u16 = 32773;

const PREDICTOR_NONE: u16 = 1;
const PREDICTOR_HORIZONTAL: u16 = 2;


/// Strip or tile layout of an image with one byte per pixel.
///
/// Used for images the `tiff` decoder opens but won't expand, such as palette
/// images: the stored index bytes are read and decompressed as they are.
pub struct ChunkLayout {
    compression: u16,
    predictor: u16,
    chunk_width: usize,
    chunk_height: usize,
    tiled: bool,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl ChunkLayout {
    pub fn from_decoder<R: Read + Seek>(decoder: &mut Decoder<R>, width: u32, height: u32) -> TiffResult<Self> {
        let compression = find_u16(decoder, Tag::Compression)?.unwrap_or(COMPRESSION_NONE);
        let predictor = find_u16(decoder, Tag::Predictor)?.unwrap_or(PREDICTOR_NONE);

        let layout = match find_u64_vec(decoder, Tag::TileOffsets)? {
            Some(offsets) => ChunkLayout {
                compression,
                predictor,
                chunk_width: find_u64(decoder, Tag::TileWidth)?.unwrap_or(width.into()) as usize,
                chunk_height: find_u64(decoder, Tag::TileLength)?.unwrap_or(height.into()) as usize,
                tiled: true,
                offsets,
                byte_counts: find_u64_vec(decoder, Tag::TileByteCounts)?.unwrap_or_default(),
            },
            None => ChunkLayout {
                compression,
                predictor,
                chunk_width: width as usize,
                chunk_height: find_u64(decoder, Tag::RowsPerStrip)?
                    .unwrap_or(height.into())
                    .min(height.into()) as usize,
                tiled: false,
                offsets: find_u64_vec(decoder, Tag::StripOffsets)?.unwrap_or_default(),
                byte_counts: find_u64_vec(decoder, Tag::StripByteCounts)?.unwrap_or_default(),
            },
        };

        Ok(layout)
    }

    /// Reads every chunk from `reader` into a row-major `width * height` buffer.
    pub fn read<R: Read + Seek>(&self, reader: &mut R, width: usize, height: usize) -> Result<Vec<u8>, ConvertError> {
        let (cw, ch) = (self.chunk_width.max(1), self.chunk_height.max(1));
        let across = (width + cw - 1) / cw;
        let down = (height + ch - 1) / ch;
        let expected = across * down;
        let kind = if self.tiled { "tiles" } else { "strips" };

        if self.offsets.len() < expected || self.byte_counts.len() < expected {
            return Err(ConvertError::RasterRead(format!(
                "expected {} {}, found {} offsets and {} byte counts",
                expected,
                kind,
                self.offsets.len(),
                self.byte_counts.len()
            )));
        }

        debug!(
            "Reading {} raw {} of {}x{} (compression {}, predictor {})",
            expected, kind, cw, ch, self.compression, self.predictor
        );

        let mut pixels = vec![0u8; width * height];

        for index in 0..expected {
            let (x0, y0) = ((index % across) * cw, (index / across) * ch);
            let cols = cw.min(width - x0);
            let rows = ch.min(height - y0);

            let mut data = self.read_chunk(reader, index)?;
            if data.len() < cw * rows {
                return Err(ConvertError::RasterRead(format!(
                    "chunk {} holds {} bytes, expected at least {}",
                    index,
                    data.len(),
                    cw * rows
                )));
            }

            match self.predictor {
                PREDICTOR_NONE => {}
                PREDICTOR_HORIZONTAL => undo_horizontal_predictor(&mut data[..cw * rows], cw),
                other => {
                    return Err(ConvertError::RasterRead(format!(
                        "predictor {} is unsupported for byte samples",
                        other
                    )))
                }
            }

            for r in 0..rows {
                let target = (y0 + r) * width + x0;
                pixels[target..target + cols].copy_from_slice(&data[r * cw..r * cw + cols]);
            }
        }

        Ok(pixels)
    }

    fn read_chunk<R: Read + Seek>(&self, reader: &mut R, index: usize) -> Result<Vec<u8>, ConvertError> {
        let mut raw = vec![0u8; self.byte_counts[index] as usize];
        reader
            .seek(SeekFrom::Start(self.offsets[index]))
            .and_then(|_| reader.read_exact(&mut raw))
            .map_err(|e| ConvertError::RasterRead(format!("Couldn't read chunk {}: {}", index, e)))?;

        match self.compression {
            COMPRESSION_NONE => Ok(raw),
            COMPRESSION_DEFLATE | COMPRESSION_OLD_DEFLATE => {
                let mut data = Vec::with_capacity(self.chunk_width * self.chunk_height);
                ZlibDecoder::new(&raw[..])
                    .read_to_end(&mut data)
                    .map_err(|e| ConvertError::RasterRead(format!("Couldn't inflate chunk {}: {}", index, e)))?;
                Ok(data)
            }
            COMPRESSION_LZW => weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                .decode(&raw)
                .map_err(|e| ConvertError::RasterRead(format!("Couldn't decode LZW chunk {}: {}", index, e))),
            COMPRESSION_PACKBITS => unpack_bits(&raw),
            other => Err(ConvertError::RasterRead(format!(
                "compression {} is unsupported for palette images",
                other
            ))),
        }
    }
}

fn find_u16<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<u16>> {
    decoder.find_tag(tag)?.map(|v| v.into_u16()).transpose()
}

fn find_u64<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<u64>> {
    decoder.find_tag(tag)?.map(|v| v.into_u64()).transpose()
}

// A lone SHORT isn't accepted by `into_u64_vec`.
fn find_u64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> TiffResult<Option<Vec<u64>>> {
    decoder
        .find_tag(tag)?
        .map(|v| match v {
            Value::Short(v) => Ok(vec![v.into()]),
            v => v.into_u64_vec(),
        })
        .transpose()
}

fn undo_horizontal_predictor(data: &mut [u8], row_len: usize) {
    for row in data.chunks_mut(row_len) {
        for i in 1..row.len() {
            row[i] = row[i].wrapping_add(row[i - 1]);
        }
    }
}

fn unpack_bits(mut input: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let truncated = || ConvertError::RasterRead("truncated PackBits run".to_string());
    let mut out = Vec::with_capacity(input.len() * 2);

    while let Some((&header, rest)) = input.split_first() {
        let n = header as i8;
        input = if n >= 0 {
            let count = n as usize + 1;
            let literal = rest.get(..count).ok_or_else(truncated)?;
            out.extend_from_slice(literal);
            &rest[count..]
        } else if n != -128 {
            let count = (1 - n as isize) as usize;
            let (&value, rest) = rest.split_first().ok_or_else(truncated)?;
            out.extend(std::iter::repeat(value).take(count));
            rest
        } else {
            rest
        };
    }

    Ok(out)
}
