//! XMB decoding for mythrec replay data.
//!
//! XMB is a compact binary representation of an XML-like document,
//! embedded in the replay blob under header nodes at `GM/GD/gd`. The
//! decoder has two layers:
//!
//! 1. A **map layer** that walks the `gd` regions and records where
//!    each named XMB file starts, without parsing it. XMB files are
//!    large, so parsing is deferred until a file is actually needed.
//! 2. A **node layer** that parses one XMB tree: magic checks, an
//!    element-name string pool, an attribute-name string pool, then a
//!    recursive node structure.
//!
//! Nodes are identified positionally: downstream code resolves "tech id
//! 37" as `root.children[37]`.

use std::collections::HashMap;

use tracing::debug;

use crate::binary::{read_string, read_u16_le, read_u32_le};
use crate::error::{ParserError, Result};
use crate::header::{HeaderTree, DATA_OFFSET};

/// `u16` magic at the start of an XMB file ("X1").
pub const XMB_MAGIC_X1: u16 = 12632;

/// `u16` magic after the X1 block ("XR").
pub const XMB_MAGIC_XR: u16 = 21080;

/// `u16` magic at the start of every XMB node ("XN").
pub const XMB_MAGIC_XN: u16 = 20056;

/// Expected constant after the XR magic.
const XMB_UNK1: u32 = 4;

/// Expected XMB format version.
const XMB_VERSION: u32 = 8;

/// Offset of an XMB file's name when a `gd` region holds a single file.
/// Empirical; multi-file regions carry name strings inline instead.
const SINGLE_FILE_NAME_OFFSET: usize = 20;

/// Location of one named XMB file within the replay blob.
#[derive(Debug, Clone)]
pub struct XmbFile {
    /// The file's name, e.g. `techtree` or `civs`.
    pub name: String,
    /// Absolute offset where the XMB data starts.
    pub offset: usize,
}

/// A decoded XMB tree node.
#[derive(Debug, Clone, Default)]
pub struct XmbNode {
    /// Element name, resolved through the element-name pool.
    pub element_name: String,
    /// The node's value string (often empty).
    pub value: String,
    /// Attribute name → attribute value.
    pub attributes: HashMap<String, String>,
    /// Child nodes in document order.
    pub children: Vec<XmbNode>,
    /// Absolute offset where this node starts.
    pub offset: usize,
    /// Absolute offset one past this node.
    pub end_offset: usize,
}

impl XmbNode {
    /// Resolves the `name` attribute of the positionally indexed child.
    ///
    /// Returns `None` when the index is out of range or the child has
    /// no `name` attribute. Downstream ids (tech ids, proto ids, power
    /// ids) resolve through this.
    #[must_use]
    pub fn child_name(&self, index: i32) -> Option<&str> {
        if index < 0 {
            return None;
        }
        self.children
            .get(index as usize)?
            .attributes
            .get("name")
            .map(String::as_str)
    }
}

/// Walks the `GM/GD/gd` header nodes and maps XMB file names to their
/// start offsets.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` when a region is truncated.
pub fn parse_xmb_map(data: &[u8], tree: &HeaderTree) -> Result<HashMap<String, XmbFile>> {
    debug!("parsing XMB data set from nodes GM/GD/gd");
    let mut xmb_map = HashMap::new();

    for id in tree.get_children(&["GM", "GD", "gd"]) {
        let node = tree.node(id);
        let mut offset = node.offset + DATA_OFFSET;

        // One reserved byte, then the number of XMB files in the region.
        offset += 1;
        let num_files = read_u32_le(data, offset)?;
        offset += 4;

        for _ in 0..num_files {
            let name = if num_files > 1 {
                // Two consecutive strings; the second is the file name.
                let (_, first_end) = read_string(data, offset)?;
                let (name, name_end) = read_string(data, first_end)?;
                offset = name_end;
                name
            } else {
                let (name, _) = read_string(data, offset + SINGLE_FILE_NAME_OFFSET)?;
                name
            };

            xmb_map.insert(
                name.clone(),
                XmbFile {
                    name,
                    offset,
                },
            );
        }

        // The region length would advance the cursor past the XMB
        // payload; each `gd` node restarts the cursor, so only the read
        // is kept as a framing sanity check.
        let region_length = read_u32_le(data, offset + 2)?;
        let _region_end = offset + region_length as usize + DATA_OFFSET;
    }

    Ok(xmb_map)
}

/// Parses one XMB file into its tree.
///
/// # Errors
///
/// Returns `ParserError::XmbInvalid` for any magic or constant
/// mismatch, `ParserError::UnexpectedEof` for truncation.
pub fn parse_xmb(data: &[u8], file: &XmbFile) -> Result<XmbNode> {
    let mut offset = file.offset;

    let x1 = read_u16_le(data, offset)?;
    if x1 != XMB_MAGIC_X1 {
        return Err(ParserError::XmbInvalid {
            offset,
            found: u32::from(x1),
            expected: u32::from(XMB_MAGIC_X1),
        });
    }
    offset += 6;

    let xr = read_u16_le(data, offset)?;
    if xr != XMB_MAGIC_XR {
        return Err(ParserError::XmbInvalid {
            offset,
            found: u32::from(xr),
            expected: u32::from(XMB_MAGIC_XR),
        });
    }
    offset += 2;

    let unk1 = read_u32_le(data, offset)?;
    if unk1 != XMB_UNK1 {
        return Err(ParserError::XmbInvalid {
            offset,
            found: unk1,
            expected: XMB_UNK1,
        });
    }
    offset += 4;

    let version = read_u32_le(data, offset)?;
    if version != XMB_VERSION {
        return Err(ParserError::XmbInvalid {
            offset,
            found: version,
            expected: XMB_VERSION,
        });
    }
    offset += 4;

    let (elements, after_elements) = read_string_pool(data, offset)?;
    let (attributes, after_attributes) = read_string_pool(data, after_elements)?;
    debug!(
        name = %file.name,
        elements = elements.len(),
        attributes = attributes.len(),
        "parsing XMB tree"
    );

    parse_xmb_node(data, after_attributes, &elements, &attributes)
}

/// Reads a u32-counted list of length-prefixed strings.
fn read_string_pool(data: &[u8], offset: usize) -> Result<(Vec<String>, usize)> {
    let count = read_u32_le(data, offset)?;
    let mut offset = offset + 4;

    let mut pool = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (value, end) = read_string(data, offset)?;
        pool.push(value);
        offset = end;
    }

    Ok((pool, offset))
}

/// Recursively parses one XMB node and its children.
fn parse_xmb_node(
    data: &[u8],
    offset: usize,
    elements: &[String],
    attributes: &[String],
) -> Result<XmbNode> {
    let initial_offset = offset;

    let xn = read_u16_le(data, offset)?;
    if xn != XMB_MAGIC_XN {
        return Err(ParserError::XmbInvalid {
            offset,
            found: u32::from(xn),
            expected: u32::from(XMB_MAGIC_XN),
        });
    }
    let mut offset = offset + 2;
    offset += 4;

    let (value, value_end) = read_string(data, offset)?;
    offset = value_end;

    let name_idx = read_u32_le(data, offset)?;
    let element_name = elements
        .get(name_idx as usize)
        .cloned()
        .ok_or(ParserError::XmbInvalid {
            offset,
            found: name_idx,
            expected: elements.len() as u32,
        })?;
    offset += 4;
    offset += 4;

    let num_attributes = read_u32_le(data, offset)?;
    offset += 4;

    let mut attribute_map = HashMap::with_capacity(num_attributes as usize);
    for _ in 0..num_attributes {
        let attr_idx = read_u32_le(data, offset)?;
        let attribute_name = attributes
            .get(attr_idx as usize)
            .cloned()
            .ok_or(ParserError::XmbInvalid {
                offset,
                found: attr_idx,
                expected: attributes.len() as u32,
            })?;
        offset += 4;

        let (attribute_value, value_end) = read_string(data, offset)?;
        offset = value_end;
        attribute_map.insert(attribute_name, attribute_value);
    }

    let num_children = read_u32_le(data, offset)?;
    offset += 4;

    let mut children = Vec::with_capacity(num_children as usize);
    for _ in 0..num_children {
        let child = parse_xmb_node(data, offset, elements, attributes)?;
        offset = child.end_offset;
        children.push(child);
    }

    Ok(XmbNode {
        element_name,
        value,
        attributes: attribute_map,
        children,
        offset: initial_offset,
        end_offset: offset,
    })
}
