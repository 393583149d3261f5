//! Decompression for mythrec replay files.
//!
//! Replays are wrapped in a "l33t" container: a four-byte ASCII magic,
//! four reserved bytes, then a single zlib stream holding the replay
//! blob. The container may additionally be gzipped on disk
//! (`.mythrec.gz`), in which case the gzip layer is removed first.
//!
//! # Example
//!
//! ```no_run
//! use mythrec_parser::decompress::{decompress_gzip, decompress_l33t};
//!
//! let raw = std::fs::read("replay.mythrec.gz").unwrap();
//! let raw = decompress_gzip(&raw).unwrap();
//! let blob = decompress_l33t(&raw).unwrap();
//! println!("Decompressed {} bytes", blob.len());
//! ```

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use tracing::debug;

use crate::error::{ParserError, Result};

/// The four-byte ASCII magic of the l33t container.
pub const L33T_MAGIC: &[u8; 4] = b"l33t";

/// Bytes to skip past the magic before the zlib stream begins
/// (4 magic + 4 reserved).
const L33T_HEADER_SIZE: usize = 8;

/// Removes the gzip framing from a `.mythrec.gz` file.
///
/// # Errors
///
/// Returns `ParserError::DecompressionFailed` if the gzip stream is
/// malformed.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ParserError::DecompressionFailed {
            reason: format!("gzip decompression failed: {e}"),
        })?;

    Ok(decompressed)
}

/// Decompresses a l33t-wrapped replay.
///
/// Locates the `l33t` magic by byte scan, skips the 8-byte container
/// header (the 4 reserved bytes are not validated), and inflates the
/// remaining zlib stream to end-of-stream.
///
/// # Errors
///
/// - `ParserError::NotL33t` if the magic is absent
/// - `ParserError::DecompressionFailed` if the zlib stream is malformed
pub fn decompress_l33t(data: &[u8]) -> Result<Vec<u8>> {
    let offset = find_l33t_offset(data).ok_or(ParserError::NotL33t)?;
    debug!(compressed_size = data.len(), offset, "decompressing l33t data");

    let compressed = &data[offset + L33T_HEADER_SIZE..];
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ParserError::DecompressionFailed {
            reason: format!("l33t zlib decompression failed: {e}"),
        })?;

    Ok(decompressed)
}

/// Scans for the l33t magic, returning its offset when present.
fn find_l33t_offset(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(L33T_MAGIC.len() - 1))
        .find(|&i| &data[i..i + L33T_MAGIC.len()] == L33T_MAGIC)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;

    use super::*;

    /// Wraps a payload in the l33t container layout.
    pub(crate) fn l33t_wrap(payload: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = Vec::new();
        out.extend_from_slice(L33T_MAGIC);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&compressed);
        out
    }

    #[test]
    fn test_decompress_l33t_round_trip() {
        let payload = b"BG header bytes follow here";
        let wrapped = l33t_wrap(payload);
        let result = decompress_l33t(&wrapped).unwrap();
        assert_eq!(result, payload);
    }

    #[test]
    fn test_decompress_l33t_magic_not_at_start() {
        let payload = b"offset magic";
        let mut wrapped = vec![0xAA, 0xBB, 0xCC];
        wrapped.extend_from_slice(&l33t_wrap(payload));
        let result = decompress_l33t(&wrapped).unwrap();
        assert_eq!(result, payload);
    }

    #[test]
    fn test_decompress_l33t_missing_magic() {
        let data = b"no magic here at all";
        assert!(matches!(
            decompress_l33t(data),
            Err(ParserError::NotL33t)
        ));
    }

    #[test]
    fn test_decompress_l33t_bad_zlib() {
        let mut data = Vec::new();
        data.extend_from_slice(L33T_MAGIC);
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            decompress_l33t(&data),
            Err(ParserError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn test_decompress_gzip_round_trip() {
        let payload = l33t_wrap(b"inner payload");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let gzipped = encoder.finish().unwrap();

        let result = decompress_gzip(&gzipped).unwrap();
        assert_eq!(result, payload);
    }

    #[test]
    fn test_decompress_gzip_malformed() {
        let data = [0x00, 0x01, 0x02, 0x03];
        assert!(matches!(
            decompress_gzip(&data),
            Err(ParserError::DecompressionFailed { .. })
        ));
    }

    #[test]
    fn test_find_l33t_offset() {
        assert_eq!(find_l33t_offset(b"l33t...."), Some(0));
        assert_eq!(find_l33t_offset(b"xxl33t.."), Some(2));
        assert_eq!(find_l33t_offset(b"l33"), None);
        assert_eq!(find_l33t_offset(b""), None);
    }
}
