//! Replay assembly and the top-level parse API.
//!
//! This module joins the decoded pieces — header tree, profile-key
//! table, XMB files, and the game-command stream — into the single
//! output record emitted as JSON. It is also home to [`parse_file`]
//! and [`parse_bytes`], the entry points that run the full pipeline:
//!
//! 1. Optional gzip unwrap, then the l33t container unwrap.
//! 2. Header tree over the decompressed blob.
//! 3. XMB map and profile-key table over the same blob.
//! 4. Command stream over the **raw** (pre-l33t) buffer, located via
//!    the `sv` marker.
//! 5. Assembly into a [`ReplayRecord`].
//!
//! The serialized field names (`MapName`, `PlayerNum`, ...) are part of
//! the external contract and must not change.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::binary::{read_string, Vec3};
use crate::commands::stream::{find_command_offset, parse_game_commands};
use crate::commands::{CommandPayload, GameCommand, Resource, TradeAction};
use crate::decompress::{decompress_gzip, decompress_l33t};
use crate::error::{ParserError, Result};
use crate::header::{HeaderTree, DATA_OFFSET};
use crate::profile::{parse_profile_keys, ProfileKeys};
use crate::stats::{calc_stats, ReplayStats};
use crate::xmb::{parse_xmb, parse_xmb_map, XmbFile, XmbNode};
use crate::PARSER_VERSION;

/// Tech-name prefixes marking an age advancement; the suffix is the
/// minor god chosen for that age.
const MINOR_GOD_PREFIXES: [&str; 3] = ["ClassicalAge", "HeroicAge", "MythicAge"];

/// The power whose use marks a titan gate placement.
const TITAN_GATE_POWER: &str = "TitanGate";

/// The proto building marking a wonder.
const WONDER_PROTO: &str = "Wonder";

/// The boolean game options surfaced in the output record.
const GAME_OPTION_KEYS: [&str; 28] = [
    "gameaivsai",
    "gameallowaiassist",
    "gameallowcheats",
    "gameallowtitans",
    "gameblockade",
    "gameconquest",
    "gamecontrolleronly",
    "gamefreeforall",
    "gameismpcoop",
    "gameismpscenario",
    "gamekoth",
    "gameludicrousmode",
    "gamemaprecommendedsettings",
    "gamemilitaryautoqueue",
    "gamenomadstart",
    "gameonevsall",
    "gameregicide",
    "gamerestored",
    "gamerestrictpause",
    "gamermdebug",
    "gamestorymode",
    "gamesuddendeath",
    "gameteambalanced",
    "gameteamlock",
    "gameteamsharepop",
    "gameteamshareres",
    "gameteamvictory",
    "gameusedenforcedagesettings",
];

/// Options controlling a parse run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Suppress the formatted command list (`GameCommands = null`).
    pub slim: bool,
    /// Compute per-player statistics.
    pub stats: bool,
    /// The input carries an outer gzip wrap (`.mythrec.gz`).
    pub is_gzip: bool,
}

/// The parsed replay, shaped for JSON emission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplayRecord {
    /// Map name from the profile table.
    pub map_name: String,
    /// Build number extracted from the build string, -1 when absent.
    pub build_number: i32,
    /// The raw build string from the `FH` node.
    pub build_string: String,
    /// When this record was produced.
    pub parsed_at: DateTime<Utc>,
    /// The parser's version string.
    pub parser_version: String,
    /// Game length in seconds, from the last command's game time.
    pub game_length_secs: f64,
    /// The match's random seed.
    pub game_seed: i32,
    /// Team id of the winning team.
    pub winning_team: i32,
    /// The fixed set of boolean game options.
    pub game_options: BTreeMap<String, bool>,
    /// Player records, in player-number order.
    pub players: Vec<ReplayPlayer>,
    /// Per-player statistics, populated on request.
    pub stats: Option<BTreeMap<u8, ReplayStats>>,
    /// Formatted commands; `null` in slim mode.
    pub game_commands: Option<Vec<ReplayGameCommand>>,
}

/// One player of the match.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplayPlayer {
    /// Player number, 1..=12.
    pub player_num: i32,
    /// The player's team id.
    pub team_id: i32,
    /// Display name.
    pub name: String,
    /// Online profile id.
    pub profile_id: i64,
    /// Player color id.
    pub color: i32,
    /// Whether the god was picked at random.
    pub random_god: bool,
    /// The major god's name.
    pub god: String,
    /// Whether the player's team won.
    pub winner: bool,
    /// Effective actions per minute.
    #[serde(rename = "EAPM")]
    pub eapm: f64,
    /// Minor gods in age order: classical, heroic, mythic.
    pub minor_gods: [String; 3],
    /// Whether the player placed a titan gate.
    pub titan: bool,
    /// Whether the player built a wonder.
    pub wonder: bool,
    /// The player's civ rotation, when recorded.
    pub civ_list: Vec<String>,
}

/// One formatted command, with a payload shaped by its type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplayGameCommand {
    /// Game time in seconds.
    pub game_time_secs: f64,
    /// The issuing player.
    pub player_num: i32,
    /// The command's wire name.
    pub command_type: String,
    /// Type-dependent payload; `null` for commands with none.
    pub payload: Option<CommandValue>,
}

/// The polymorphic payload of a formatted command.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandValue {
    /// A resolved name (tech, proto unit, formation).
    Name(String),
    /// A bare numeric id (taunt).
    Id(i32),
    /// A build command's payload.
    Build(BuildPayload),
    /// A god-power command's payload.
    GodPower(ProtoPowerPayload),
    /// A market trade's payload.
    Trade(BuySellPayload),
}

/// Payload of a formatted `build` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildPayload {
    /// The building's proto name.
    pub name: String,
    /// Placement location.
    pub location: Vec3,
    /// Whether the building was shift-queued.
    pub queued: bool,
}

/// Payload of a formatted `godPower` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtoPowerPayload {
    /// The power's name.
    pub name: String,
}

/// Payload of a formatted `marketBuySell` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuySellPayload {
    /// The traded resource.
    pub resource_type: Resource,
    /// Buy or sell.
    pub action: TradeAction,
    /// Trade quantity, always positive.
    pub quantity: f32,
}

/// Parses a replay file from disk.
///
/// # Errors
///
/// Any I/O or decoding error aborts the parse.
pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<ReplayRecord> {
    let raw = std::fs::read(path)?;
    parse_bytes(&raw, options)
}

/// Parses a replay from its raw bytes.
///
/// # Errors
///
/// Any decoding error aborts the parse; partial records are never
/// returned.
pub fn parse_bytes(raw: &[u8], options: &ParseOptions) -> Result<ReplayRecord> {
    let unzipped;
    let raw = if options.is_gzip {
        unzipped = decompress_gzip(raw)?;
        &unzipped[..]
    } else {
        raw
    };

    let data = decompress_l33t(raw)?;
    let tree = HeaderTree::parse(&data)?;

    // The XMB files are large; only their locations are mapped here and
    // each file is parsed when the assembler needs it.
    let xmb_map = parse_xmb_map(&data, &tree)?;
    let profile_keys = parse_profile_keys(&data, &tree)?;

    let command_offset = find_command_offset(raw)?;
    let command_list = parse_game_commands(raw, command_offset)?;

    assemble(options, &data, &tree, &profile_keys, &xmb_map, &command_list)
}

/// Joins the decoded pieces into the output record.
fn assemble(
    options: &ParseOptions,
    data: &[u8],
    tree: &HeaderTree,
    profile_keys: &ProfileKeys,
    xmb_map: &HashMap<String, XmbFile>,
    commands: &[GameCommand],
) -> Result<ReplayRecord> {
    let proto_root = require_xmb(data, xmb_map, "proto")?;
    let gods_root = require_xmb(data, xmb_map, "civs")?;
    let tech_root = require_xmb(data, xmb_map, "techtree")?;
    let powers_root = require_xmb(data, xmb_map, "powers")?;

    let build_string = read_build_string(data, tree)?;
    debug!(%build_string, "read build string");
    let build_number = parse_build_number(&build_string);

    let god_map = build_god_map(&gods_root);
    let losing_teams = losing_teams(profile_keys, commands);
    debug!(?losing_teams, "determined losing teams");

    let game_length_secs = commands.last().map_or(0.0, |c| c.game_time_secs);
    let players = build_players(
        profile_keys,
        &god_map,
        &losing_teams,
        commands,
        &tech_root,
        &proto_root,
        &powers_root,
        game_length_secs,
    );

    let winning_team = players
        .iter()
        .find(|p| p.winner)
        .map_or(0, |p| p.team_id);

    let formatted = if options.slim && !options.stats {
        Vec::new()
    } else {
        format_commands(commands, &tech_root, &proto_root, &powers_root)
    };

    let stats = options.stats.then(|| calc_stats(&formatted, commands));
    let game_commands = (!options.slim).then_some(formatted);

    Ok(ReplayRecord {
        map_name: profile_keys
            .get("gamemapname")
            .map_or_else(String::new, |k| k.as_str().to_string()),
        build_number,
        build_string,
        parsed_at: Utc::now(),
        parser_version: PARSER_VERSION.to_string(),
        game_length_secs,
        game_seed: profile_keys.get("gamerandomseed").map_or(0, |k| k.as_i32()),
        winning_team,
        game_options: game_options(profile_keys),
        players,
        stats,
        game_commands,
    })
}

/// Parses a named XMB file out of the map.
fn require_xmb(
    data: &[u8],
    xmb_map: &HashMap<String, XmbFile>,
    name: &str,
) -> Result<XmbNode> {
    let file = xmb_map.get(name).ok_or_else(|| ParserError::XmbFileMissing {
        name: name.to_string(),
    })?;
    parse_xmb(data, file)
}

/// Reads the build string from the `FH` node.
fn read_build_string(data: &[u8], tree: &HeaderTree) -> Result<String> {
    let fh = tree.node(tree.find_single(&["FH"])?);
    let (value, _) = read_string(data, fh.offset + DATA_OFFSET)?;
    Ok(value)
}

/// Extracts the build number from a build string such as
/// `AoMRT_s.exe 512899 //stream/Athens/stable`. Returns -1 when the
/// string has no parseable second field.
fn parse_build_number(build_string: &str) -> i32 {
    build_string
        .split_whitespace()
        .nth(1)
        .and_then(|part| part.parse().ok())
        .unwrap_or(-1)
}

/// Builds the god id → god name map from the `civs` XMB.
///
/// Ids are positional over `civ/name` entries, starting at 1; id 0 is
/// reserved for Nature.
fn build_god_map(gods_root: &XmbNode) -> BTreeMap<i32, String> {
    let mut god_map = BTreeMap::new();
    god_map.insert(0, "Nature".to_string());

    let mut god_id = 1;
    for civ in &gods_root.children {
        if civ.element_name != "civ" {
            continue;
        }
        for elem in &civ.children {
            if elem.element_name == "name" {
                god_map.insert(god_id, elem.value.clone());
                god_id += 1;
            }
        }
    }
    god_map
}

/// The set of team ids that lost: every team with a resigning player.
fn losing_teams(profile_keys: &ProfileKeys, commands: &[GameCommand]) -> HashSet<i32> {
    commands
        .iter()
        .filter(|c| c.is_resign())
        .map(|c| team_of(profile_keys, i32::from(c.player_id)))
        .collect()
}

/// The team id of a player number, from the profile table.
fn team_of(profile_keys: &ProfileKeys, player_num: i32) -> i32 {
    profile_keys
        .get(&format!("gameplayer{player_num}teamid"))
        .map_or(-1, |k| k.as_i32())
}

/// Enumerates the players recorded in the profile table.
#[allow(clippy::too_many_arguments)]
fn build_players(
    profile_keys: &ProfileKeys,
    god_map: &BTreeMap<i32, String>,
    losing_teams: &HashSet<i32>,
    commands: &[GameCommand],
    tech_root: &XmbNode,
    proto_root: &XmbNode,
    powers_root: &XmbNode,
    game_length_secs: f64,
) -> Vec<ReplayPlayer> {
    let mut players = Vec::new();

    for player_num in 1..=12 {
        let prefix = format!("gameplayer{player_num}");
        let name = profile_keys
            .get(&format!("{prefix}name"))
            .map_or("", |k| k.as_str());
        if name.is_empty() {
            continue;
        }
        debug!(player_num, name, "parsing player");

        let rlink = profile_keys
            .get(&format!("{prefix}rlinkid"))
            .map_or("", |k| k.as_str());
        let profile_id = match rlink.parse::<i64>() {
            Ok(id) => id,
            Err(error) => {
                warn!(player_num, rlink, %error, "could not parse profile id, skipping player");
                continue;
            }
        };

        let team_id = team_of(profile_keys, player_num);
        let player_commands: Vec<&GameCommand> = commands
            .iter()
            .filter(|c| i32::from(c.player_id) == player_num)
            .collect();

        let eapm_count = player_commands.iter().filter(|c| c.affects_eapm).count();
        let eapm = if game_length_secs > 0.0 {
            eapm_count as f64 / (game_length_secs / 60.0)
        } else {
            0.0
        };

        players.push(ReplayPlayer {
            player_num,
            team_id,
            name: name.to_string(),
            profile_id,
            color: profile_keys
                .get(&format!("{prefix}color"))
                .map_or(0, |k| k.as_i32()),
            random_god: profile_keys
                .get(&format!("{prefix}civwasrandom"))
                .is_some_and(|k| k.as_bool()),
            god: god_map
                .get(&profile_keys.get(&format!("{prefix}civ")).map_or(0, |k| k.as_i32()))
                .cloned()
                .unwrap_or_default(),
            winner: !losing_teams.contains(&team_id),
            eapm,
            minor_gods: minor_gods(&player_commands, tech_root),
            titan: placed_titan_gate(&player_commands, powers_root),
            wonder: built_wonder(&player_commands, proto_root),
            civ_list: civ_list(profile_keys, &prefix),
        });
    }

    players
}

/// The minor god chosen for each age, in age order. The last
/// advancement of an age wins when several were queued.
fn minor_gods(player_commands: &[&GameCommand], tech_root: &XmbNode) -> [String; 3] {
    let mut gods: [String; 3] = Default::default();

    for command in player_commands {
        let tech_id = match &command.payload {
            CommandPayload::Research { tech_id } | CommandPayload::PrequeueTech { tech_id } => {
                *tech_id
            }
            _ => continue,
        };
        let Some(tech_name) = tech_root.child_name(tech_id) else {
            continue;
        };

        for (slot, prefix) in MINOR_GOD_PREFIXES.iter().enumerate() {
            if let Some(god) = tech_name.strip_prefix(prefix) {
                gods[slot] = god.to_string();
            }
        }
    }

    gods
}

/// Whether any of the player's god powers resolves to the titan gate.
fn placed_titan_gate(player_commands: &[&GameCommand], powers_root: &XmbNode) -> bool {
    player_commands.iter().any(|command| match &command.payload {
        CommandPayload::UseProtoPower { proto_power_id, .. } => {
            powers_root.child_name(*proto_power_id) == Some(TITAN_GATE_POWER)
        }
        _ => false,
    })
}

/// Whether any of the player's build commands resolves to a wonder.
fn built_wonder(player_commands: &[&GameCommand], proto_root: &XmbNode) -> bool {
    player_commands.iter().any(|command| match &command.payload {
        CommandPayload::Build {
            proto_building_id, ..
        } => proto_root.child_name(*proto_building_id) == Some(WONDER_PROTO),
        _ => false,
    })
}

/// The player's civ rotation from the profile table, when recorded.
fn civ_list(profile_keys: &ProfileKeys, prefix: &str) -> Vec<String> {
    profile_keys
        .get(&format!("{prefix}civlist"))
        .map_or("", |k| k.as_str())
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// The fixed game-option set; options absent from the table are false.
fn game_options(profile_keys: &ProfileKeys) -> BTreeMap<String, bool> {
    GAME_OPTION_KEYS
        .iter()
        .map(|&key| {
            let value = profile_keys.get(key).is_some_and(|k| k.as_bool());
            (key.to_string(), value)
        })
        .collect()
}

/// Formats the semantically resolved commands for output.
///
/// Command types without a resolvable payload are omitted, matching
/// the analytics consumers' expectations; the raw command list remains
/// the source of truth for EAPM.
fn format_commands(
    commands: &[GameCommand],
    tech_root: &XmbNode,
    proto_root: &XmbNode,
    powers_root: &XmbNode,
) -> Vec<ReplayGameCommand> {
    let mut formatted = Vec::new();

    for command in commands {
        let resolved: Option<(&'static str, Option<CommandValue>)> = match &command.payload {
            CommandPayload::Research { tech_id } => Some((
                "research",
                Some(CommandValue::Name(resolve_name(tech_root, *tech_id))),
            )),
            CommandPayload::PrequeueTech { tech_id } => Some((
                "prequeueTech",
                Some(CommandValue::Name(resolve_name(tech_root, *tech_id))),
            )),
            CommandPayload::Train { proto_unit_id, .. } => Some((
                "train",
                Some(CommandValue::Name(resolve_name(proto_root, *proto_unit_id))),
            )),
            CommandPayload::Autoqueue { proto_unit_id } => Some((
                "autoqueue",
                Some(CommandValue::Name(resolve_name(proto_root, *proto_unit_id))),
            )),
            CommandPayload::Build {
                proto_building_id,
                location,
                queued,
            } => Some((
                "build",
                Some(CommandValue::Build(BuildPayload {
                    name: resolve_name(proto_root, *proto_building_id),
                    location: *location,
                    queued: *queued,
                })),
            )),
            CommandPayload::UseProtoPower { proto_power_id, .. } => Some((
                "godPower",
                Some(CommandValue::GodPower(ProtoPowerPayload {
                    name: resolve_name(powers_root, *proto_power_id),
                })),
            )),
            CommandPayload::MarketBuySell {
                resource,
                action,
                quantity,
            } => Some((
                "marketBuySell",
                Some(CommandValue::Trade(BuySellPayload {
                    resource_type: *resource,
                    action: *action,
                    quantity: *quantity,
                })),
            )),
            CommandPayload::SetFormation { formation } => Some((
                "setFormation",
                Some(CommandValue::Name(formation.as_str().to_string())),
            )),
            CommandPayload::Taunt { taunt_id } => {
                Some(("taunt", Some(CommandValue::Id(*taunt_id))))
            }
            CommandPayload::Resign => Some(("resign", None)),
            _ => None,
        };

        if let Some((command_type, payload)) = resolved {
            formatted.push(ReplayGameCommand {
                game_time_secs: command.game_time_secs,
                player_num: i32::from(command.player_id),
                command_type: command_type.to_string(),
                payload,
            });
        }
    }

    formatted
}

/// Resolves a positional id through an XMB root's `name` attributes.
fn resolve_name(root: &XmbNode, id: i32) -> String {
    root.child_name(id).unwrap_or_default().to_string()
}
