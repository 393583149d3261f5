//! Game-command stream decoding.
//!
//! The command stream is a tick-batched, type-dispatched binary
//! protocol: command lists are separated by footer markers, each list
//! carries a bitmask-framed batch of game commands, and every command
//! has a type-dependent payload layout described by the refiner table.
//!
//! - [`stream`] handles the outer framing: footers, command lists, the
//!   entry-index sequence, and the resign short-circuit.
//! - [`parser`] decodes the shared base layout of a single command.
//! - [`refiners`] holds the per-type payload table.
//!
//! The game simulation ticks at 20 Hz and batches the commands issued
//! within a tick into one command list, so a command's game time is its
//! list's tick index divided by 20.

pub mod parser;
pub mod refiners;
pub mod stream;

use serde::Serialize;

use crate::binary::Vec3;

/// Simulation tick rate: command lists are emitted 20 times per second.
pub const TICKS_PER_SECOND: f64 = 20.0;

/// A resource tradable at the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Resource id 1.
    Wood,
    /// Resource id 2.
    Food,
    /// Any other resource id.
    Unknown,
}

impl Resource {
    /// Maps a raw resource id to its known resource.
    #[must_use]
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => Resource::Wood,
            2 => Resource::Food,
            _ => Resource::Unknown,
        }
    }

    /// The resource's lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Wood => "wood",
            Resource::Food => "food",
            Resource::Unknown => "unknown",
        }
    }
}

/// Direction of a market trade, derived from the quantity's sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    /// Positive quantity.
    Buy,
    /// Negative quantity.
    Sell,
}

/// A unit formation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Formation {
    /// Formation id 0.
    Line,
    /// Formation id 1.
    Box,
    /// Formation id 2.
    Spread,
    /// Any other formation id.
    Unknown,
}

impl Formation {
    /// Maps a raw formation id to its known formation.
    #[must_use]
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => Formation::Line,
            1 => Formation::Box,
            2 => Formation::Spread,
            _ => Formation::Unknown,
        }
    }

    /// The formation's lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Formation::Line => "line",
            Formation::Box => "box",
            Formation::Spread => "spread",
            Formation::Unknown => "unknown",
        }
    }
}

/// Type-specific fields of a game command, one variant per supported
/// type code.
///
/// The set is closed: a type code outside it fails decoding with
/// `RefinerMissing`. Variants without fields are commands whose payload
/// bytes carry nothing the parser extracts (or nothing whose meaning is
/// known, for `Unknown18` and `Unknown55`).
#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    /// Type 0.
    Task,
    /// Type 1.
    Research {
        /// Positional id into the techtree XMB children.
        tech_id: i32,
    },
    /// Type 2.
    Train {
        /// Positional id into the proto XMB children.
        proto_unit_id: i32,
        /// Number of units queued by the click.
        num_units: i8,
    },
    /// Type 3.
    Build {
        /// Positional id into the proto XMB children.
        proto_building_id: i32,
        /// Placement location.
        location: Vec3,
        /// Whether the building was shift-queued.
        queued: bool,
    },
    /// Type 4.
    SetGatherPoint,
    /// Type 7.
    Delete,
    /// Type 9.
    Stop,
    /// Type 12.
    UseProtoPower {
        /// First target location.
        location1: Vec3,
        /// Second target location.
        location2: Vec3,
        /// Positional id into the powers XMB children.
        proto_power_id: i32,
    },
    /// Type 13.
    MarketBuySell {
        /// The traded resource.
        resource: Resource,
        /// Buy or sell, from the quantity's sign.
        action: TradeAction,
        /// Trade quantity, always positive.
        quantity: f32,
    },
    /// Type 14.
    Ungarrison,
    /// Type 16.
    Resign,
    /// Type 18; layout known, semantics not.
    Unknown18,
    /// Type 19.
    Tribute,
    /// Type 23.
    FinishUnitTransform,
    /// Type 25.
    SetUnitStance,
    /// Type 26.
    ChangeDiplomacy,
    /// Type 34.
    TownBell,
    /// Type 35.
    AutoScoutEvent,
    /// Type 37.
    ChangeControlGroupContents,
    /// Type 38.
    Repair,
    /// Type 41.
    Taunt {
        /// The taunt's numeric id.
        taunt_id: i32,
    },
    /// Type 44.
    Cheat {
        /// The cheat's numeric id.
        cheat_id: i32,
    },
    /// Type 45.
    CancelQueuedItem,
    /// Type 48.
    SetFormation {
        /// The selected formation.
        formation: Formation,
    },
    /// Type 53.
    StartUnitTransform,
    /// Type 55; layout known, semantics not.
    Unknown55,
    /// Type 66.
    Autoqueue {
        /// Positional id into the proto XMB children.
        proto_unit_id: i32,
    },
    /// Type 67.
    ToggleAutoUnitAbility,
    /// Type 68.
    Timeshift {
        /// Target location, taken from the command's first source
        /// vector.
        location: Vec3,
    },
    /// Type 69.
    BuildWallConnector,
    /// Type 71.
    SeekShelter,
    /// Type 72.
    PrequeueTech {
        /// Positional id into the techtree XMB children.
        tech_id: i32,
    },
    /// Type 75.
    PrebuyGodPower,
}

impl CommandPayload {
    /// The command's wire name, as emitted in formatted output.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            CommandPayload::Task => "task",
            CommandPayload::Research { .. } => "research",
            CommandPayload::Train { .. } => "train",
            CommandPayload::Build { .. } => "build",
            CommandPayload::SetGatherPoint => "setGatherPoint",
            CommandPayload::Delete => "delete",
            CommandPayload::Stop => "stop",
            CommandPayload::UseProtoPower { .. } => "useProtoPower",
            CommandPayload::MarketBuySell { .. } => "marketBuySell",
            CommandPayload::Ungarrison => "ungarrison",
            CommandPayload::Resign => "resign",
            CommandPayload::Unknown18 => "unknown18",
            CommandPayload::Tribute => "tribute",
            CommandPayload::FinishUnitTransform => "finishUnitTransform",
            CommandPayload::SetUnitStance => "setUnitStance",
            CommandPayload::ChangeDiplomacy => "changeDiplomacy",
            CommandPayload::TownBell => "townBell",
            CommandPayload::AutoScoutEvent => "autoScoutEvent",
            CommandPayload::ChangeControlGroupContents => "changeControlGroupContents",
            CommandPayload::Repair => "repair",
            CommandPayload::Taunt { .. } => "taunt",
            CommandPayload::Cheat { .. } => "cheat",
            CommandPayload::CancelQueuedItem => "cancelQueuedItem",
            CommandPayload::SetFormation { .. } => "setFormation",
            CommandPayload::StartUnitTransform => "startUnitTransform",
            CommandPayload::Unknown55 => "unknown55",
            CommandPayload::Autoqueue { .. } => "autoqueue",
            CommandPayload::ToggleAutoUnitAbility => "toggleAutoUnitAbility",
            CommandPayload::Timeshift { .. } => "timeshift",
            CommandPayload::BuildWallConnector => "buildWallConnector",
            CommandPayload::SeekShelter => "seekShelter",
            CommandPayload::PrequeueTech { .. } => "prequeueTech",
            CommandPayload::PrebuyGodPower => "prebuyGodPower",
        }
    }
}

/// One decoded game command: the shared base fields plus the
/// type-specific payload.
#[derive(Debug, Clone)]
pub struct GameCommand {
    /// The command's numeric type code.
    pub command_type: u8,
    /// The owning player, 1..=12 (type 19 uses its own encoding).
    pub player_id: u8,
    /// Absolute offset of the type-specific payload.
    pub offset: usize,
    /// Absolute offset one past the payload.
    pub offset_end: usize,
    /// Payload width in bytes; `offset_end - offset`.
    pub byte_length: usize,
    /// Game time in seconds, derived from the command list's tick
    /// index.
    pub game_time_secs: f64,
    /// Whether the command counts toward effective APM.
    pub affects_eapm: bool,
    /// Unit ids the command was issued with.
    pub source_units: Vec<u32>,
    /// Vectors carried before the payload.
    pub source_vectors: Vec<Vec3>,
    /// The opaque pre-argument region, captured verbatim.
    pub pre_argument_bytes: Vec<u8>,
    /// The type-specific fields.
    pub payload: CommandPayload,
}

impl GameCommand {
    /// The command's wire name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }

    /// Whether this command is a resignation.
    #[must_use]
    pub fn is_resign(&self) -> bool {
        self.command_type == 16
    }
}
