//! Per-player statistics aggregation over decoded commands.
//!
//! Statistics are computed from the formatted command list (for
//! semantically resolved names) together with the raw command list
//! (for the per-minute EAPM series). They are opt-in: the CLI's
//! `--stats` flag populates the record's `Stats` field.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::commands::GameCommand;
use crate::replay::{CommandValue, ReplayGameCommand};

/// Resources traded at the market, keyed by resource name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TradeStats {
    /// Total quantity sold per resource.
    pub resources_sold: BTreeMap<String, f32>,
    /// Total quantity bought per resource.
    pub resources_bought: BTreeMap<String, f32>,
}

/// A tech with the game time it was queued or researched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TechItem {
    /// The tech's name.
    pub name: String,
    /// Game time in seconds.
    pub game_time_secs: f64,
}

/// A god power with the game time it was invoked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GodPowerItem {
    /// The power's name.
    pub name: String,
    /// Game time in seconds.
    pub game_time_secs: f64,
}

/// Minute-bucketed timelines of a player's activity.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Timelines {
    /// Units trained per minute bucket.
    pub unit_counts: Vec<BTreeMap<String, i32>>,
    /// Buildings placed per minute bucket.
    pub building_counts: Vec<BTreeMap<String, i32>>,
    /// Techs prequeued over the game.
    pub techs_prequeued: Vec<TechItem>,
    /// Techs researched over the game.
    pub techs_researched: Vec<TechItem>,
    /// God powers invoked over the game.
    pub god_powers: Vec<GodPowerItem>,
}

/// The statistics computed for one player.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplayStats {
    /// Market trade totals.
    pub trade: TradeStats,
    /// Total units trained, by proto name.
    pub unit_counts: BTreeMap<String, i32>,
    /// Total buildings placed, by proto name.
    pub building_counts: BTreeMap<String, i32>,
    /// Total god powers invoked, by name.
    pub god_power_counts: BTreeMap<String, i32>,
    /// Techs in first-seen order.
    pub techs_researched: Vec<String>,
    /// Formation selections, by formation name.
    pub formation_counts: BTreeMap<String, i32>,
    /// Commands issued per minute of game time.
    #[serde(rename = "EAPM")]
    pub eapm: Vec<f64>,
    /// Minute-bucketed timelines.
    pub timelines: Timelines,
}

/// Computes statistics for every player present in the command lists.
#[must_use]
pub fn calc_stats(
    commands: &[ReplayGameCommand],
    raw_commands: &[GameCommand],
) -> BTreeMap<u8, ReplayStats> {
    let mut commands_by_player: BTreeMap<u8, Vec<&ReplayGameCommand>> = BTreeMap::new();
    for command in commands {
        commands_by_player
            .entry(command.player_num as u8)
            .or_default()
            .push(command);
    }

    let mut raw_by_player: BTreeMap<u8, Vec<&GameCommand>> = BTreeMap::new();
    for command in raw_commands {
        raw_by_player
            .entry(command.player_id)
            .or_default()
            .push(command);
    }

    commands_by_player
        .into_iter()
        .map(|(player_num, player_commands)| {
            let raw = raw_by_player.get(&player_num).map_or(&[][..], Vec::as_slice);
            (player_num, stats_for_player(&player_commands, raw))
        })
        .collect()
}

/// Computes one player's statistics.
fn stats_for_player(commands: &[&ReplayGameCommand], raw_commands: &[&GameCommand]) -> ReplayStats {
    let mut stats = ReplayStats {
        eapm: eapm_over_time(raw_commands),
        timelines: timelines(commands),
        ..ReplayStats::default()
    };

    let mut seen_techs: Vec<&str> = Vec::new();
    for command in commands {
        match (command.command_type.as_str(), &command.payload) {
            ("marketBuySell", Some(CommandValue::Trade(trade))) => {
                let resources = match trade.action {
                    crate::commands::TradeAction::Sell => &mut stats.trade.resources_sold,
                    crate::commands::TradeAction::Buy => &mut stats.trade.resources_bought,
                };
                *resources
                    .entry(trade.resource_type.as_str().to_string())
                    .or_insert(0.0) += trade.quantity;
            }
            ("train", Some(CommandValue::Name(name))) => {
                *stats.unit_counts.entry(name.clone()).or_insert(0) += 1;
            }
            ("build", Some(CommandValue::Build(build))) => {
                *stats.building_counts.entry(build.name.clone()).or_insert(0) += 1;
            }
            ("godPower", Some(CommandValue::GodPower(power))) => {
                *stats
                    .god_power_counts
                    .entry(power.name.clone())
                    .or_insert(0) += 1;
            }
            ("setFormation", Some(CommandValue::Name(name))) => {
                *stats.formation_counts.entry(name.clone()).or_insert(0) += 1;
            }
            ("research" | "prequeueTech", Some(CommandValue::Name(name))) => {
                if !seen_techs.contains(&name.as_str()) {
                    seen_techs.push(name);
                    stats.techs_researched.push(name.clone());
                }
            }
            _ => {}
        }
    }

    stats
}

/// Buckets a game time into a 1-based minute index.
fn minute_of(game_time_secs: f64) -> usize {
    ((game_time_secs / 60.0).ceil() as usize).max(1)
}

/// Minute-bucketed timelines over the formatted commands.
fn timelines(commands: &[&ReplayGameCommand]) -> Timelines {
    let Some(last) = commands.last() else {
        return Timelines::default();
    };
    let minutes = minute_of(last.game_time_secs);

    let mut timelines = Timelines {
        unit_counts: vec![BTreeMap::new(); minutes],
        building_counts: vec![BTreeMap::new(); minutes],
        ..Timelines::default()
    };

    for command in commands {
        let bucket = minute_of(command.game_time_secs).min(minutes) - 1;

        match (command.command_type.as_str(), &command.payload) {
            ("train", Some(CommandValue::Name(name))) => {
                *timelines.unit_counts[bucket].entry(name.clone()).or_insert(0) += 1;
            }
            ("build", Some(CommandValue::Build(build))) => {
                *timelines.building_counts[bucket]
                    .entry(build.name.clone())
                    .or_insert(0) += 1;
            }
            ("prequeueTech", Some(CommandValue::Name(name))) => {
                timelines.techs_prequeued.push(TechItem {
                    name: name.clone(),
                    game_time_secs: command.game_time_secs,
                });
            }
            ("research", Some(CommandValue::Name(name))) => {
                timelines.techs_researched.push(TechItem {
                    name: name.clone(),
                    game_time_secs: command.game_time_secs,
                });
            }
            ("godPower", Some(CommandValue::GodPower(power))) => {
                timelines.god_powers.push(GodPowerItem {
                    name: power.name.clone(),
                    game_time_secs: command.game_time_secs,
                });
            }
            _ => {}
        }
    }

    timelines
}

/// Commands issued per minute, over the raw command list.
fn eapm_over_time(raw_commands: &[&GameCommand]) -> Vec<f64> {
    let Some(last) = raw_commands.last() else {
        return Vec::new();
    };
    let minutes = minute_of(last.game_time_secs);

    let mut eapm = vec![0.0; minutes];
    for command in raw_commands {
        let bucket = minute_of(command.game_time_secs).min(minutes) - 1;
        eapm[bucket] += 1.0;
    }
    eapm
}
