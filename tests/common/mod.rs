//! Shared builders for synthetic replay fixtures.
//!
//! Real `.mythrec` captures are large and unwieldy; these helpers
//! assemble byte-exact miniature replays instead: a l33t-wrapped header
//! tree with profile table and XMB files, an `sv`-advertised command
//! region, and a tick-batched command stream.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

// ============================================================================
// Primitive encoders
// ============================================================================

/// Encodes a string in the replay's length-prefixed UTF-16LE layout.
pub fn encode_string(value: &str) -> Vec<u8> {
    let units: Vec<u16> = value.encode_utf16().collect();
    let mut out = Vec::with_capacity(4 + units.len() * 2);
    out.extend_from_slice(&(units.len() as u16).to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Encodes a header node: token + u32 length + data.
pub fn encode_node(token: &str, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + data.len());
    out.extend_from_slice(token.as_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

// ============================================================================
// Profile table
// ============================================================================

/// A typed profile value in source form.
pub enum ProfileValue {
    Int32(i32),
    Bool(bool),
    Str(&'static str),
    String(String),
}

/// Encodes the body of an `ST` node: 4 padding bytes, key count, then
/// records of key, type code, 4 reserved bytes, value.
pub fn encode_profile_table(entries: &[(String, ProfileValue)]) -> Vec<u8> {
    let mut out = vec![0u8; 4];
    out.extend_from_slice(&(entries.len() as i32).to_le_bytes());
    for (key, value) in entries {
        out.extend_from_slice(&encode_string(key));
        let (code, payload): (u32, Vec<u8>) = match value {
            ProfileValue::Int32(v) => (1, v.to_le_bytes().to_vec()),
            ProfileValue::Bool(v) => (6, vec![u8::from(*v)]),
            ProfileValue::Str(v) => (10, encode_string(v)),
            ProfileValue::String(v) => (10, encode_string(v)),
        };
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&payload);
    }
    out
}

// ============================================================================
// XMB
// ============================================================================

/// An XMB node under construction.
pub struct XmbSpec {
    /// Index into the element-name pool.
    pub element: u32,
    /// The node's value string.
    pub value: String,
    /// (attribute pool index, value) pairs.
    pub attributes: Vec<(u32, String)>,
    /// Child nodes.
    pub children: Vec<XmbSpec>,
}

impl XmbSpec {
    /// A childless node with a single `name` attribute at pool index 0.
    pub fn named(element: u32, name: &str) -> Self {
        XmbSpec {
            element,
            value: String::new(),
            attributes: vec![(0, name.to_string())],
            children: Vec::new(),
        }
    }

    /// A childless node carrying only a value.
    pub fn valued(element: u32, value: &str) -> Self {
        XmbSpec {
            element,
            value: value.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A container node.
    pub fn parent(element: u32, children: Vec<XmbSpec>) -> Self {
        XmbSpec {
            element,
            value: String::new(),
            attributes: Vec::new(),
            children,
        }
    }
}

fn encode_xmb_node(spec: &XmbSpec) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&20056u16.to_le_bytes()); // XN
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&encode_string(&spec.value));
    out.extend_from_slice(&spec.element.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(spec.attributes.len() as u32).to_le_bytes());
    for (idx, value) in &spec.attributes {
        out.extend_from_slice(&idx.to_le_bytes());
        out.extend_from_slice(&encode_string(value));
    }
    out.extend_from_slice(&(spec.children.len() as u32).to_le_bytes());
    for child in &spec.children {
        out.extend_from_slice(&encode_xmb_node(child));
    }
    out
}

/// Encodes a full XMB file: magics, string pools, then the root node.
///
/// The first element-pool entry doubles as the file's name: single-file
/// `gd` regions read their name 20 bytes in, which lands exactly on the
/// first pool string.
pub fn encode_xmb(elements: &[&str], attributes: &[&str], root: &XmbSpec) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&12632u16.to_le_bytes()); // X1
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&21080u16.to_le_bytes()); // XR
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(elements.len() as u32).to_le_bytes());
    for element in elements {
        out.extend_from_slice(&encode_string(element));
    }
    out.extend_from_slice(&(attributes.len() as u32).to_le_bytes());
    for attribute in attributes {
        out.extend_from_slice(&encode_string(attribute));
    }
    out.extend_from_slice(&encode_xmb_node(root));
    out
}

/// Wraps one XMB file in a `gd` region body: 1 reserved byte, u32 file
/// count of 1, then the XMB bytes.
pub fn encode_gd_region(xmb: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8];
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(xmb);
    out
}

// ============================================================================
// Commands
// ============================================================================

/// One game command in source form.
pub struct CommandSpec {
    pub command_type: u8,
    pub player_id: u16,
    pub source_units: Vec<u32>,
    pub source_vectors: Vec<[i32; 3]>,
    pub first_pre_arg: u8,
    pub extra_pre_args: Vec<u8>,
    pub payload: Vec<u8>,
}

impl CommandSpec {
    /// A command with empty unit/vector lists and a zeroed payload of
    /// the given width.
    pub fn simple(command_type: u8, player_id: u16, width: usize) -> Self {
        CommandSpec {
            command_type,
            player_id,
            source_units: Vec::new(),
            source_vectors: Vec::new(),
            first_pre_arg: 0,
            extra_pre_args: Vec::new(),
            payload: vec![0u8; width],
        }
    }

    pub fn research(player_id: u16, tech_id: i32) -> Self {
        let mut spec = Self::simple(1, player_id, 12);
        spec.payload[8..12].copy_from_slice(&tech_id.to_le_bytes());
        spec
    }

    pub fn prequeue_tech(player_id: u16, tech_id: i32) -> Self {
        let mut spec = Self::simple(72, player_id, 13);
        spec.payload[8..12].copy_from_slice(&tech_id.to_le_bytes());
        spec
    }

    pub fn train(player_id: u16, proto_unit_id: i32) -> Self {
        let mut spec = Self::simple(2, player_id, 18);
        spec.payload[8..12].copy_from_slice(&proto_unit_id.to_le_bytes());
        spec
    }

    pub fn build(player_id: u16, proto_building_id: i32, location: [i32; 3]) -> Self {
        let mut spec = Self::simple(3, player_id, 52);
        spec.payload[8..12].copy_from_slice(&proto_building_id.to_le_bytes());
        spec.payload[12..16].copy_from_slice(&location[0].to_le_bytes());
        spec.payload[16..20].copy_from_slice(&location[1].to_le_bytes());
        spec.payload[20..24].copy_from_slice(&location[2].to_le_bytes());
        spec
    }

    pub fn market(player_id: u16, resource_id: i32, quantity: f32) -> Self {
        let mut spec = Self::simple(13, player_id, 20);
        spec.payload[8..12].copy_from_slice(&resource_id.to_le_bytes());
        spec.payload[16..20].copy_from_slice(&quantity.to_le_bytes());
        spec
    }

    pub fn god_power(player_id: u16, proto_power_id: i32) -> Self {
        let mut spec = Self::simple(12, player_id, 57);
        spec.payload[52..56].copy_from_slice(&proto_power_id.to_le_bytes());
        spec
    }

    pub fn resign(player_id: u16) -> Self {
        Self::simple(16, player_id, 21)
    }
}

/// Encodes one command in the base layout.
pub fn encode_command(spec: &CommandSpec) -> Vec<u8> {
    let mut out = Vec::new();

    out.push(0);
    out.push(spec.command_type);
    let mut prefix = [0u8; 8];
    if spec.command_type == 19 {
        prefix[5] = spec.player_id as u8;
    }
    out.extend_from_slice(&prefix);

    let skip = if spec.command_type == 14 { 20 } else { 8 };
    out.extend_from_slice(&vec![0u8; skip]);

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
        for component in vector {
            out.extend_from_slice(&component.to_le_bytes());
        }
    }

    out.extend_from_slice(&(spec.extra_pre_args.len() as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 2]);
    out.push(spec.first_pre_arg);
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&spec.extra_pre_args);

    out.extend_from_slice(&spec.payload);
    out
}

/// A minimal footer block: the 8 marker bytes plus a zeroed tail.
pub fn encode_footer() -> Vec<u8> {
    let mut out = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    out.extend_from_slice(&[0u8; 6]);
    out
}

/// Encodes one command list (entry type 32: u8 command count).
pub fn encode_command_list(commands: &[CommandSpec], entry_idx: u32, final_list: bool) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&32u32.to_le_bytes());
    out.push(0);
    out.extend_from_slice(&[0u8; 4]);
    out.push(commands.len() as u8);
    for spec in commands {
        out.extend_from_slice(&encode_command(spec));
    }
    if !final_list {
        out.extend_from_slice(&encode_footer());
        out.extend_from_slice(&entry_idx.to_le_bytes());
        out.push(0);
    }
    out
}

/// Encodes a command stream: leading noise, first footer, the +5 gap,
/// then the lists. Unless the last list resigned, a single trailing
/// byte marks the end of the buffer.
pub fn encode_stream(lists: &[Vec<u8>], ends_with_resign: bool) -> Vec<u8> {
    let mut out = vec![0xEE; 16];
    out.extend_from_slice(&encode_footer());
    out.extend_from_slice(&[0u8; 5]);
    for list in lists {
        out.extend_from_slice(list);
    }
    if ends_with_resign {
        out.extend_from_slice(&[0u8; 2]);
    } else {
        out.push(0);
    }
    out
}

// ============================================================================
// Full replay assembly
// ============================================================================

/// Compresses a payload into the l33t container layout.
pub fn l33t_wrap(payload: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut out = Vec::new();
    out.extend_from_slice(b"l33t");
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&compressed);
    out
}

/// Wraps raw bytes in gzip framing.
pub fn gzip_wrap(raw: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).unwrap();
    encoder.finish().unwrap()
}

/// The profile entries for one player slot.
pub fn player_entries(
    player_num: u32,
    name: &'static str,
    rlink_id: &'static str,
    team_id: i32,
    color: i32,
    civ: i32,
) -> Vec<(String, ProfileValue)> {
    vec![
        (format!("gameplayer{player_num}name"), ProfileValue::Str(name)),
        (
            format!("gameplayer{player_num}rlinkid"),
            ProfileValue::Str(rlink_id),
        ),
        (
            format!("gameplayer{player_num}teamid"),
            ProfileValue::Int32(team_id),
        ),
        (
            format!("gameplayer{player_num}color"),
            ProfileValue::Int32(color),
        ),
        (
            format!("gameplayer{player_num}civwasrandom"),
            ProfileValue::Bool(false),
        ),
        (format!("gameplayer{player_num}civ"), ProfileValue::Int32(civ)),
    ]
}

/// The four XMB files every fixture carries.
///
/// - `proto` children: 0 Villager, 1 Temple, 2 Wonder, 3 Hoplite
/// - `civs` gods: 1 Zeus, 2 Gaia
/// - `techtree` children: 0 HuntingDogs, 1 ClassicalAgeOceanus,
///   2 HeroicAgeTheia, 3 MythicAgeAtlas, 4 ClassicalAgeAthena,
///   5 HeroicAgeApollo, 6 MythicAgeHera
/// - `powers` children: 0 Bolt, 1 TitanGate
pub fn standard_xmb_files() -> Vec<Vec<u8>> {
    let proto = encode_xmb(
        &["proto", "unit"],
        &["name"],
        &XmbSpec::parent(
            0,
            vec![
                XmbSpec::named(1, "Villager"),
                XmbSpec::named(1, "Temple"),
                XmbSpec::named(1, "Wonder"),
                XmbSpec::named(1, "Hoplite"),
            ],
        ),
    );

    let civs = encode_xmb(
        &["civs", "civ", "name"],
        &[],
        &XmbSpec::parent(
            0,
            vec![
                XmbSpec::parent(1, vec![XmbSpec::valued(2, "Zeus")]),
                XmbSpec::parent(1, vec![XmbSpec::valued(2, "Gaia")]),
            ],
        ),
    );

    let techtree = encode_xmb(
        &["techtree", "tech"],
        &["name"],
        &XmbSpec::parent(
            0,
            vec![
                XmbSpec::named(1, "HuntingDogs"),
                XmbSpec::named(1, "ClassicalAgeOceanus"),
                XmbSpec::named(1, "HeroicAgeTheia"),
                XmbSpec::named(1, "MythicAgeAtlas"),
                XmbSpec::named(1, "ClassicalAgeAthena"),
                XmbSpec::named(1, "HeroicAgeApollo"),
                XmbSpec::named(1, "MythicAgeHera"),
            ],
        ),
    );

    let powers = encode_xmb(
        &["powers", "power"],
        &["name"],
        &XmbSpec::parent(
            0,
            vec![XmbSpec::named(1, "Bolt"), XmbSpec::named(1, "TitanGate")],
        ),
    );

    vec![proto, civs, techtree, powers]
}

/// Assembles a complete raw replay: header tree (build string, profile
/// table, XMB files) l33t-wrapped, the `sv` marker, and the command
/// stream.
pub fn build_replay(
    profile_entries: Vec<(String, ProfileValue)>,
    lists: &[Vec<u8>],
    ends_with_resign: bool,
) -> Vec<u8> {
    // Header blob: BG { FH, MP { ST }, GM { GD { gd* } } }.
    let fh = encode_node(
        "FH",
        &encode_string("AoMRT_s.exe 512899 //stream/Athens/stable"),
    );
    let st = encode_node("ST", &encode_profile_table(&profile_entries));
    let mp = encode_node("MP", &st);

    let mut gd_body = Vec::new();
    for xmb in standard_xmb_files() {
        gd_body.extend_from_slice(&encode_node("gd", &encode_gd_region(&xmb)));
    }
    let gd = encode_node("GD", &gd_body);
    let gm = encode_node("GM", &gd);

    let mut bg_body = fh;
    bg_body.extend_from_slice(&mp);
    bg_body.extend_from_slice(&gm);
    let blob = encode_node("BG", &bg_body);

    let wrapped = l33t_wrap(&blob);
    let stream = encode_stream(lists, ends_with_resign);

    // Raw layout: 8 prefix bytes, "sv" + u32 command offset, the l33t
    // container, then the command region the offset points at.
    let mut raw = vec![0x01u8; 8];
    raw.extend_from_slice(b"sv");
    let command_offset = (raw.len() + 4 + wrapped.len()) as u32;
    raw.extend_from_slice(&command_offset.to_le_bytes());
    raw.extend_from_slice(&wrapped);
    raw.extend_from_slice(&stream);
    raw
}

/// The standard two-player fixture: IamMagic (Gaia, team 0) against
/// TAG_RecoN (Zeus, team 1); player 1 ages up through Oceanus, Theia,
/// and Atlas, sells 50 food, builds a Wonder, and casts TitanGate;
/// player 2 ages up through Athena, Apollo, and Hera and resigns.
pub fn standard_replay() -> Vec<u8> {
    let mut entries = vec![
        (
            "gamemapname".to_string(),
            ProfileValue::Str("alfheim"),
        ),
        ("gamerandomseed".to_string(), ProfileValue::Int32(987_654)),
        ("gameallowtitans".to_string(), ProfileValue::Bool(true)),
        ("gameconquest".to_string(), ProfileValue::Bool(true)),
    ];
    entries.extend(player_entries(1, "IamMagic", "1001", 0, 1, 2));
    entries.extend(player_entries(2, "TAG_RecoN", "1002", 1, 2, 1));

    let lists = vec![
        encode_command_list(
            &[CommandSpec::research(1, 1), CommandSpec::research(2, 4)],
            2,
            false,
        ),
        encode_command_list(
            &[
                CommandSpec::research(1, 2),
                CommandSpec::research(2, 5),
                CommandSpec::market(1, 2, -50.0),
            ],
            3,
            false,
        ),
        encode_command_list(
            &[
                CommandSpec::research(1, 3),
                CommandSpec::research(2, 6),
                CommandSpec::build(1, 2, [100, 200, 300]),
                CommandSpec::god_power(1, 1),
            ],
            4,
            false,
        ),
        encode_command_list(&[CommandSpec::resign(2)], 0, true),
    ];

    build_replay(entries, &lists, true)
}
