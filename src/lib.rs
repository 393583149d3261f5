//! # mythrec-parser
//!
//! A parser for Age of Mythology: Retold replay files (`.mythrec`,
//! optionally gzipped as `.mythrec.gz`).
//!
//! Replays are an opaque binary container: an optional gzip wrap, a
//! `l33t`-tagged zlib stream, and inside it a layered set of formats —
//! a tagged header tree, embedded compact-binary XML ("XMB") files, a
//! typed profile-key table, and a tick-batched game-command stream.
//! This crate decodes all of them one way (bytes to records) and joins
//! the results into a single JSON-shaped [`ReplayRecord`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use mythrec_parser::{parse_file, ParseOptions};
//!
//! let options = ParseOptions::default();
//! let record = parse_file(Path::new("replay.mythrec"), &options).unwrap();
//!
//! println!("Map: {}", record.map_name);
//! println!("Game length: {:.1}s", record.game_length_secs);
//! for player in &record.players {
//!     println!("{} ({}) eAPM {:.2}", player.name, player.god, player.eapm);
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Error types and result alias for parser operations
//! - [`binary`] - Low-level little-endian reads and UTF-16 strings
//! - [`decompress`] - Gzip and l33t container unwrapping
//! - [`header`] - The two-letter-token header tree
//! - [`xmb`] - The compact-binary XML subformat
//! - [`profile`] - The typed profile-key table
//! - [`commands`] - The game-command stream (framing, base parse,
//!   per-type refiners)
//! - [`replay`] - The output record and the top-level parse pipeline
//! - [`stats`] - Opt-in per-player statistics
//! - [`rename`] - Bulk renaming of replays by player names
//!
//! All multi-byte integers in the format are little-endian. Decoding is
//! deterministic and strictly one-way: no gameplay state is
//! reconstructed and no encoder exists.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod binary;
pub mod commands;
pub mod decompress;
pub mod error;
pub mod header;
pub mod profile;
pub mod rename;
pub mod replay;
pub mod stats;
pub mod xmb;

/// The parser's version string, emitted in every output record.
pub const PARSER_VERSION: &str = "v0.3.1";

// Re-export commonly used types at the crate root.
pub use commands::{CommandPayload, GameCommand};
pub use error::{ParserError, Result};
pub use replay::{parse_bytes, parse_file, ParseOptions, ReplayPlayer, ReplayRecord};
