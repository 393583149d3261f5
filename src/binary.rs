//! Binary reading utilities for parsing mythrec replay files.
//!
//! This module provides functions for reading little-endian primitives,
//! three-component vectors, and length-prefixed UTF-16LE strings from
//! byte buffers. All functions perform bounds checking and return
//! [`ParserError::UnexpectedEof`] for truncated data.
//!
//! # Endianness
//!
//! All multi-byte values in the mythrec format are little-endian. The
//! functions in this module handle the conversion automatically.
//!
//! # Strings
//!
//! Strings are encoded as a u16 character count, two bytes of padding,
//! then `2 * count` bytes of UTF-16LE code units:
//!
//! ```text
//! \x05\x00\x00\x00H\x00e\x00l\x00l\x00o\x00
//! ```
//!
//! [`read_string`] returns the decoded string together with the offset
//! immediately after it, since callers continue reading from there.

use serde::Serialize;

use crate::error::{ParserError, Result};

/// A three-component integer vector, as stored in command payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vec3 {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component.
    pub z: i32,
}

/// Reads a little-endian u16 at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if fewer than 2 bytes are
/// available at `offset`.
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16> {
    const SIZE: usize = 2;

    if offset + SIZE > bytes.len() {
        return Err(ParserError::unexpected_eof(offset + SIZE, bytes.len()));
    }

    let slice = &bytes[offset..offset + SIZE];
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

/// Reads a little-endian i16 at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if fewer than 2 bytes are
/// available at `offset`.
pub fn read_i16_le(bytes: &[u8], offset: usize) -> Result<i16> {
    Ok(read_u16_le(bytes, offset)? as i16)
}

/// Reads a little-endian u32 at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if fewer than 4 bytes are
/// available at `offset`.
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    const SIZE: usize = 4;

    if offset + SIZE > bytes.len() {
        return Err(ParserError::unexpected_eof(offset + SIZE, bytes.len()));
    }

    let slice = &bytes[offset..offset + SIZE];
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Reads a little-endian i32 at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if fewer than 4 bytes are
/// available at `offset`.
pub fn read_i32_le(bytes: &[u8], offset: usize) -> Result<i32> {
    Ok(read_u32_le(bytes, offset)? as i32)
}

/// Reads an IEEE-754 f32 from the little-endian bit pattern at the
/// given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if fewer than 4 bytes are
/// available at `offset`.
pub fn read_f32_le(bytes: &[u8], offset: usize) -> Result<f32> {
    Ok(f32::from_bits(read_u32_le(bytes, offset)?))
}

/// Reads a single byte as a boolean (nonzero is `true`).
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if `offset` is beyond the
/// buffer.
pub fn read_bool(bytes: &[u8], offset: usize) -> Result<bool> {
    let byte = bytes
        .get(offset)
        .ok_or_else(|| ParserError::unexpected_eof(offset + 1, bytes.len()))?;
    Ok(*byte != 0)
}

/// Reads a single byte at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if `offset` is beyond the
/// buffer.
pub fn read_u8(bytes: &[u8], offset: usize) -> Result<u8> {
    bytes
        .get(offset)
        .copied()
        .ok_or_else(|| ParserError::unexpected_eof(offset + 1, bytes.len()))
}

/// Reads a [`Vec3`] (three consecutive little-endian i32 values, 12
/// bytes) at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if fewer than 12 bytes are
/// available at `offset`.
pub fn read_vec3(bytes: &[u8], offset: usize) -> Result<Vec3> {
    Ok(Vec3 {
        x: read_i32_le(bytes, offset)?,
        y: read_i32_le(bytes, offset + 4)?,
        z: read_i32_le(bytes, offset + 8)?,
    })
}

/// Reads a length-prefixed UTF-16LE string at the given offset.
///
/// Layout: u16 character count, u16 padding, then `2 * count` bytes of
/// code units. Returns the decoded string and the offset immediately
/// after the last code unit. Invalid surrogates are replaced with
/// U+FFFD.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if the prefix or the code units
/// extend past the buffer.
pub fn read_string(bytes: &[u8], offset: usize) -> Result<(String, usize)> {
    let num_chars = read_u16_le(bytes, offset)? as usize;
    let start = offset + 4;
    let end = start + num_chars * 2;

    if end > bytes.len() {
        return Err(ParserError::unexpected_eof(end, bytes.len()));
    }

    let units: Vec<u16> = (0..num_chars)
        .map(|i| u16::from_le_bytes([bytes[start + i * 2], bytes[start + i * 2 + 1]]))
        .collect();

    Ok((String::from_utf16_lossy(&units), end))
}
