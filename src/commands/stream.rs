//! Outer framing of the game-command stream.
//!
//! The stream has no length prefix. Command lists are separated by an
//! 8-byte footer marker; each list carries a u32 bitmask that frames
//! its contents, then an entry index that must ascend by one per list.
//! The stream ends either at the end of the raw buffer or when a list
//! contains a resignation, which short-circuits without a trailing
//! footer.
//!
//! All offsets here are into the **raw** replay buffer (after the
//! optional gzip unwrap, before the l33t unwrap): the command region
//! lives outside the l33t payload. Its location is advertised by a
//! two-byte `sv` marker followed by a u32 offset.

use tracing::debug;

use crate::binary::{read_u16_le, read_u32_le, read_u8};
use crate::commands::parser::parse_game_command;
use crate::commands::GameCommand;
use crate::error::{ParserError, Result};

/// The 8-byte separator between command lists.
pub const FOOTER: [u8; 8] = [0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// The marker preceding the u32 command-region offset in the raw
/// buffer.
pub const COMMAND_REGION_MARKER: [u8; 2] = [b's', b'v'];

/// Bitmask bit: one-byte (rather than four-byte) gap after the
/// reserved byte.
const ENTRY_SHORT_GAP: u32 = 1;

/// Bitmask bit: u8 command count follows.
const ENTRY_COMMANDS_U8: u32 = 32;

/// Bitmask bit: u32 command count follows.
const ENTRY_COMMANDS_U32: u32 = 64;

/// Bitmask bit: selected-unit list follows the commands.
const ENTRY_SELECTED_UNITS: u32 = 128;

/// All valid bitmask bits.
const ENTRY_VALID_MASK: u32 =
    ENTRY_SHORT_GAP | ENTRY_COMMANDS_U8 | ENTRY_COMMANDS_U32 | ENTRY_SELECTED_UNITS;

/// One decoded command list: a batch of commands for a single
/// simulation tick.
#[derive(Debug)]
pub struct CommandList {
    /// The list's entry index; 0 when the list short-circuited on a
    /// resignation and the index was never read.
    pub entry_idx: u32,
    /// Absolute offset one past the list.
    pub offset_end: usize,
    /// Whether a resignation inside this list terminated the stream.
    pub final_command: bool,
    /// The decoded commands, in stream order.
    pub commands: Vec<GameCommand>,
}

/// Locates the command region via the `sv` marker.
///
/// Returns the offset (within the same raw buffer) from which the
/// first footer is searched.
///
/// # Errors
///
/// - `ParserError::CommandRegionNotFound` if the marker is absent
/// - `ParserError::UnexpectedEof` if the offset u32 is truncated
pub fn find_command_offset(raw: &[u8]) -> Result<usize> {
    let sv = (0..raw.len().saturating_sub(1))
        .find(|&i| raw[i] == COMMAND_REGION_MARKER[0] && raw[i + 1] == COMMAND_REGION_MARKER[1])
        .ok_or(ParserError::CommandRegionNotFound)?;

    let offset = read_u32_le(raw, sv + 2)?;
    debug!(command_offset = offset, "located command region");
    Ok(offset as usize)
}

/// Decodes the whole command stream into a flat command list.
///
/// Scans forward from `header_end_offset` for the first footer, then
/// alternates command lists and footers until the raw buffer ends or a
/// resignation short-circuits the stream.
///
/// # Errors
///
/// Any framing or command-level error aborts decoding; partial output
/// is never returned.
pub fn parse_game_commands(data: &[u8], header_end_offset: usize) -> Result<Vec<GameCommand>> {
    let first_footer = find_footer(data, header_end_offset).ok_or(ParserError::FooterNotFound {
        offset: header_end_offset,
    })?;
    debug!(offset = first_footer, "parsing command stream");

    let first_footer_end = footer_end(data, first_footer)?;
    let mut offset = first_footer_end + 5;
    let mut tick_index: u32 = 1;
    let mut commands = Vec::new();

    loop {
        if offset >= data.len().saturating_sub(1) {
            // Reached the end of the raw buffer.
            break;
        }

        let item = parse_command_list(data, offset, tick_index)?;
        commands.extend(item.commands);

        if item.final_command {
            debug!("resign command issued, stream complete");
            break;
        }

        tick_index += 1;
        if item.entry_idx != tick_index {
            return Err(ParserError::EntryIdxNonSequential {
                expected: tick_index,
                got: item.entry_idx,
            });
        }
        offset = item.offset_end;
    }

    Ok(commands)
}

/// Scans forward for the next [`FOOTER`] marker.
fn find_footer(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    (from..data.len().saturating_sub(FOOTER.len() - 1))
        .find(|&i| data[i..i + FOOTER.len()] == FOOTER)
}

/// Consumes a footer at `offset`, returning the offset one past it.
///
/// The leading count byte announces "extra" bytes that are captured
/// for logging only; the cursor does not advance past them. The byte
/// at `offset + 1` must equal 1, the u16 at `offset + 10` is a quarter
/// of the footer tail length.
///
/// # Errors
///
/// - `ParserError::UnkNotEqualTo1` when the integrity byte is wrong
/// - `ParserError::UnexpectedEof` for truncation
pub(crate) fn footer_end(data: &[u8], offset: usize) -> Result<usize> {
    let extra_byte_count = read_u8(data, offset)? as usize;
    let offset = offset + 1;

    if extra_byte_count > 0 {
        let available = data.len().min(offset + extra_byte_count);
        debug!(
            extra_byte_count,
            bytes = ?&data[offset..available],
            "footer has extra bytes"
        );
    }

    let unk = read_u8(data, offset)?;
    if unk != 1 {
        return Err(ParserError::UnkNotEqualTo1 { offset });
    }

    let offset = offset + 9;
    let one_fourth_len = read_u16_le(data, offset)?;
    let offset = offset + 4;
    Ok(offset + 4 * one_fourth_len as usize)
}

/// Parses one command list at `offset`.
///
/// `tick_index` is the tick the previous list established; commands in
/// this list are stamped with it.
fn parse_command_list(data: &[u8], offset: usize, tick_index: u32) -> Result<CommandList> {
    let entry_type = read_u32_le(data, offset)?;
    let mut offset = offset + 4;
    offset += 1;

    if entry_type & ENTRY_VALID_MASK != entry_type {
        return Err(ParserError::BadEntryType { value: entry_type });
    }
    if entry_type & (ENTRY_COMMANDS_U8 | ENTRY_COMMANDS_U32)
        == (ENTRY_COMMANDS_U8 | ENTRY_COMMANDS_U32)
    {
        return Err(ParserError::BadEntryType { value: entry_type });
    }

    if entry_type & ENTRY_SHORT_GAP == 0 {
        offset += 4;
    } else {
        offset += 1;
    }

    let mut commands = Vec::new();
    if entry_type & (ENTRY_COMMANDS_U8 | ENTRY_COMMANDS_U32) != 0 {
        let num_commands = if entry_type & ENTRY_COMMANDS_U8 != 0 {
            let count = read_u8(data, offset)? as usize;
            offset += 1;
            count
        } else {
            let count = read_u32_le(data, offset)? as usize;
            offset += 4;
            count
        };

        for _ in 0..num_commands {
            let command = parse_game_command(data, offset, tick_index)?;
            offset = command.offset_end;
            commands.push(command);
        }
    }

    if entry_type & ENTRY_SELECTED_UNITS != 0 {
        let num_selected = read_u8(data, offset)? as usize;
        offset += 1;
        offset += 4 * num_selected;
    }

    // A resignation terminates the stream without a trailing footer.
    if commands.iter().any(GameCommand::is_resign) {
        return Ok(CommandList {
            entry_idx: 0,
            offset_end: offset,
            final_command: true,
            commands,
        });
    }

    let offset = footer_end(data, offset)?;
    let entry_idx = read_u32_le(data, offset)?;
    let offset = offset + 4;

    let final_byte = read_u8(data, offset)?;
    if final_byte != 0 {
        return Err(ParserError::FinalByteNotZero { value: final_byte });
    }

    Ok(CommandList {
        entry_idx,
        offset_end: offset + 1,
        final_command: false,
        commands,
    })
}
