//! Profile-key table decoding.
//!
//! The game stores its match configuration as a flat table of typed
//! key/value pairs under the `MP/ST` header node: map name, random
//! seed, boolean game options, and per-player metadata
//! (`gameplayer{N}name`, `gameplayer{N}teamid`, ...).
//!
//! Each record is a length-prefixed string key, a u32 type code, four
//! reserved bytes, then a type-dispatched value.

use std::collections::HashMap;

use tracing::debug;

use crate::binary::{read_bool, read_i16_le, read_i32_le, read_string, read_u32_le};
use crate::error::{ParserError, Result};
use crate::header::HeaderTree;

/// Bytes between an `ST` node's offset and its first record: the
/// 6-byte node header plus 4 padding bytes.
const TABLE_START_OFFSET: usize = 10;

/// Width of an opaque game-sync-state value.
const GAME_SYNC_STATE_SIZE: usize = 8;

/// A typed profile-table value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileKey {
    /// A 32-bit integer (type codes 1 and 2).
    Int32(i32),
    /// A 16-bit integer (type code 4).
    Int16(i16),
    /// A boolean (type code 6).
    Bool(bool),
    /// A UTF-16 string (type code 10).
    String(String),
    /// An opaque 8-byte game-sync state (type code 3). The payload is
    /// skipped, not decoded.
    GameSyncState,
}

impl ProfileKey {
    /// The string value, or `""` for non-string keys.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProfileKey::String(value) => value,
            _ => "",
        }
    }

    /// The integer value, or 0 for non-integer keys.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            ProfileKey::Int32(value) => *value,
            ProfileKey::Int16(value) => i32::from(*value),
            _ => 0,
        }
    }

    /// The boolean value, or `false` for non-boolean keys.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(self, ProfileKey::Bool(true))
    }
}

/// The decoded profile-key table.
pub type ProfileKeys = HashMap<String, ProfileKey>;

/// Decodes the profile-key table under `MP/ST`.
///
/// # Errors
///
/// - `ParserError::NoChildNodes` / `MultipleChildNodes` if the `MP/ST`
///   lookup surprises
/// - `ParserError::UnknownProfileKeyType` for an unsupported type code
/// - `ParserError::UnexpectedEof` for truncation
pub fn parse_profile_keys(data: &[u8], tree: &HeaderTree) -> Result<ProfileKeys> {
    debug!("parsing profile keys from MP/ST node");
    let st = tree.node(tree.find_single(&["MP", "ST"])?);

    let mut position = st.offset + TABLE_START_OFFSET;
    let num_keys = read_i32_le(data, position)?;
    position += 4;

    let mut profile_keys = HashMap::with_capacity(num_keys.max(0) as usize);
    for _ in 0..num_keys {
        let (key, key_end) = read_string(data, position)?;
        let key_type = read_u32_le(data, key_end)?;
        // Type code plus four reserved bytes precede the value.
        let value_start = key_end + 8;

        let (value, value_end) = parse_value(data, value_start, key_type)?;
        profile_keys.insert(key, value);
        position = value_end;
    }

    Ok(profile_keys)
}

/// Decodes one value by its type code, returning the value and the
/// offset after it.
fn parse_value(data: &[u8], position: usize, key_type: u32) -> Result<(ProfileKey, usize)> {
    match key_type {
        1 | 2 => Ok((ProfileKey::Int32(read_i32_le(data, position)?), position + 4)),
        3 => Ok((ProfileKey::GameSyncState, position + GAME_SYNC_STATE_SIZE)),
        4 => Ok((ProfileKey::Int16(read_i16_le(data, position)?), position + 2)),
        6 => Ok((ProfileKey::Bool(read_bool(data, position)?), position + 1)),
        10 => {
            let (value, end) = read_string(data, position)?;
            Ok((ProfileKey::String(value), end))
        }
        code => Err(ParserError::UnknownProfileKeyType { code }),
    }
}
