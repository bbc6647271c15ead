//! Flat element decoding for binary payloads.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::trace;

use crate::nanonis::types::error::{NanonisError, Result};
use crate::nanonis::types::filetypes::ElementEncoding;

/// Decodes `bytes` into exactly `expected` elements, widened to `f64`.
///
/// Fails with [`NanonisError::PayloadSizeMismatch`] when the byte count is not
/// `expected * encoding.size()`; the payload is never truncated or padded.
pub fn decode(bytes: &[u8], encoding: ElementEncoding, expected: usize) -> Result<Vec<f64>> {
    let size = encoding.size();
    let actual = bytes.len() / size;
    let trailing_bytes = bytes.len() % size;
    if actual != expected || trailing_bytes != 0 {
        return Err(NanonisError::PayloadSizeMismatch {
            expected,
            actual,
            trailing_bytes,
        });
    }
    trace!("Decoding {} elements as {}", actual, encoding);

    let values = match encoding {
        ElementEncoding::BigEndianF32 => widen(bytes, actual, BigEndian::read_f32_into),
        ElementEncoding::LittleEndianF32 => widen(bytes, actual, LittleEndian::read_f32_into),
        ElementEncoding::BigEndianF64 => {
            let mut values = vec![0f64; actual];
            BigEndian::read_f64_into(bytes, &mut values);
            values
        }
        ElementEncoding::LittleEndianF64 => {
            let mut values = vec![0f64; actual];
            LittleEndian::read_f64_into(bytes, &mut values);
            values
        }
    };
    Ok(values)
}

fn widen(bytes: &[u8], count: usize, read_into: fn(&[u8], &mut [f32])) -> Vec<f64> {
    let mut narrow = vec![0f32; count];
    read_into(bytes, &mut narrow);
    narrow.into_iter().map(f64::from).collect()
}
