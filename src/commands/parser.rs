//! Base game-command parsing.
//!
//! Every game command shares a common prefix layout regardless of its
//! type: a framing byte, the type byte, fixed skips with embedded
//! integrity markers, the owning player, the source unit list, the
//! source vector list, and an opaque pre-argument region. The
//! type-specific payload follows and is handed to the refiner table.
//!
//! # Layout (offsets relative to the command start)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | framing byte |
//! | 1 | 1 | command type |
//! | 2..10 | 8 | skipped |
//! | 10 | 8 or 28 | skipped (28 for type 14) |
//! | .. | 4 | u32, must equal 3 |
//! | .. | | player id block (type-dependent) |
//! | .. | | source units, source vectors, pre-arguments |
//! | .. | width | type-specific payload |

use crate::binary::{read_u16_le, read_u32_le, read_u8, read_vec3};
use crate::commands::refiners::{refine, RefineContext};
use crate::commands::{GameCommand, TICKS_PER_SECOND};
use crate::error::{ParserError, Result};

/// Fixed pre-argument bytes present ahead of the counted ones.
const PRE_ARGUMENT_BASE_LEN: usize = 13;

/// Parses one game command starting at `offset`.
///
/// `tick_index` is the tick of the containing command list; it becomes
/// the command's `game_time_secs` at 20 ticks per second.
///
/// # Errors
///
/// - `ParserError::ExpectedThree` / `ExpectedOne` when an integrity
///   marker is missing
/// - `ParserError::PlayerIdOutOfRange` when the player id exceeds 12
/// - `ParserError::RefinerMissing` for an unsupported type code
/// - `ParserError::UnexpectedEof` for truncation
pub fn parse_game_command(data: &[u8], offset: usize, tick_index: u32) -> Result<GameCommand> {
    let base = offset;
    let command_type = read_u8(data, offset + 1)?;

    let mut cursor = offset + 10;
    if command_type == 14 {
        cursor += 20;
    } else {
        cursor += 8;
    }

    let three = read_u32_le(data, cursor)?;
    if three != 3 {
        return Err(ParserError::ExpectedThree {
            offset: cursor,
            got: three,
        });
    }
    cursor += 4;

    // Type 19 stores its player id inside the skipped prefix instead of
    // the standard id block.
    let player_id = if command_type == 19 {
        let id = u16::from(read_u8(data, base + 7)?);
        cursor += 4;
        id
    } else {
        let one = read_u16_le(data, cursor)?;
        if one != 1 {
            return Err(ParserError::ExpectedOne {
                offset: cursor,
                got: one,
            });
        }
        cursor += 4;

        let id = read_u16_le(data, cursor)?;
        if id > 12 {
            return Err(ParserError::PlayerIdOutOfRange { id });
        }
        cursor += 4;
        id
    };
    cursor += 4;

    let num_units = read_u16_le(data, cursor)?;
    cursor += 4;
    let mut source_units = Vec::with_capacity(num_units as usize);
    for _ in 0..num_units {
        source_units.push(read_u32_le(data, cursor)?);
        cursor += 4;
    }

    let num_vectors = read_u16_le(data, cursor)?;
    cursor += 4;
    let mut source_vectors = Vec::with_capacity(num_vectors as usize);
    for _ in 0..num_vectors {
        source_vectors.push(read_vec3(data, cursor)?);
        cursor += 12;
    }

    let num_pre_args = PRE_ARGUMENT_BASE_LEN + read_u16_le(data, cursor)? as usize;
    cursor += 4;
    if cursor + num_pre_args > data.len() {
        return Err(ParserError::unexpected_eof(cursor + num_pre_args, data.len()));
    }
    let pre_argument_bytes = data[cursor..cursor + num_pre_args].to_vec();
    cursor += num_pre_args;

    let ctx = RefineContext {
        source_vectors: &source_vectors,
        pre_argument_bytes: &pre_argument_bytes,
    };
    let refined = refine(command_type, data, cursor, &ctx)?;

    Ok(GameCommand {
        command_type,
        player_id: player_id as u8,
        offset: cursor,
        offset_end: cursor + refined.byte_length,
        byte_length: refined.byte_length,
        game_time_secs: f64::from(tick_index) / TICKS_PER_SECOND,
        affects_eapm: refined.affects_eapm,
        source_units,
        source_vectors,
        pre_argument_bytes,
        payload: refined.payload,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builder for synthetic game-command byte layouts.

    use crate::binary::Vec3;

    /// Source form of a command for fixture encoding.
    pub struct CommandSpec {
        /// The command's type code.
        pub command_type: u8,
        /// The owning player.
        pub player_id: u16,
        /// Source unit ids.
        pub source_units: Vec<u32>,
        /// Source vectors.
        pub source_vectors: Vec<Vec3>,
        /// Counted pre-argument bytes beyond the fixed 13.
        pub extra_pre_args: Vec<u8>,
        /// Raw payload bytes; must match the type's declared width
        /// (plus the trailing count byte for type 2).
        pub payload: Vec<u8>,
    }

    impl CommandSpec {
        /// A command with no units, vectors, or extra pre-arguments,
        /// and a zeroed payload of the type's width.
        pub fn simple(command_type: u8, player_id: u16) -> Self {
            let width = crate::commands::refiners::payload_width(command_type)
                .unwrap_or_else(|| panic!("no width for type {command_type}"));
            CommandSpec {
                command_type,
                player_id,
                source_units: Vec::new(),
                source_vectors: Vec::new(),
                extra_pre_args: Vec::new(),
                payload: vec![0u8; width],
            }
        }
    }

    /// Encodes one command in the base layout the parser expects.
    ///
    /// The returned bytes end exactly at the payload's declared width;
    /// the caller appends whatever follows the command in the stream.
    pub fn encode_command(spec: &CommandSpec) -> Vec<u8> {
        let mut out = Vec::new();

        // Framing byte + type byte + 8 skipped bytes.
        out.push(0);
        out.push(spec.command_type);
        let mut prefix = [0u8; 8];
        if spec.command_type == 19 {
            // Type 19 reads its player id from command offset 7.
            prefix[5] = spec.player_id as u8;
        }
        out.extend_from_slice(&prefix);

        // Type-dependent skip region.
        let skip = if spec.command_type == 14 { 20 } else { 8 };
        out.extend_from_slice(&vec![0u8; skip]);

        // The `3` marker.
        out.extend_from_slice(&3u32.to_le_bytes());

        if spec.command_type == 19 {
            out.extend_from_slice(&[0u8; 4]);
        } else {
            out.extend_from_slice(&1u16.to_le_bytes());
            out.extend_from_slice(&[0u8; 2]);
            out.extend_from_slice(&spec.player_id.to_le_bytes());
            out.extend_from_slice(&[0u8; 2]);
        }
        out.extend_from_slice(&[0u8; 4]);

        out.extend_from_slice(&(spec.source_units.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 2]);
        for unit in &spec.source_units {
            out.extend_from_slice(&unit.to_le_bytes());
        }

        out.extend_from_slice(&(spec.source_vectors.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 2]);
        for vector in &spec.source_vectors {
            out.extend_from_slice(&vector.x.to_le_bytes());
            out.extend_from_slice(&vector.y.to_le_bytes());
            out.extend_from_slice(&vector.z.to_le_bytes());
        }

        out.extend_from_slice(&(spec.extra_pre_args.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 2]);
        out.extend_from_slice(&[0u8; 13]);
        out.extend_from_slice(&spec.extra_pre_args);

        out.extend_from_slice(&spec.payload);
        out
    }
}
