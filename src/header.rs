//! Header tree parsing for decompressed mythrec replay data.
//!
//! The decompressed blob begins with a framed tree of nodes, each
//! identified by a two-character ASCII token followed by a u32 data
//! length. Children are not length-prefixed individually; they are
//! inferred by scanning a node's data region for the next pair of
//! alphanumeric ASCII bytes and validated by a length-fit check.
//!
//! The tree is stored as an arena: nodes live in a flat `Vec` and refer
//! to each other by index, so parent back-references never create
//! ownership cycles.
//!
//! # Structure
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | ASCII token |
//! | 2 | 4 | u32 LE data length |
//! | 6 | length | data region (children for container tokens) |
//!
//! A node's end offset is `offset + length + 6`. The root is always at
//! offset 0 with token `BG`.

use tracing::debug;

use crate::binary::read_u32_le;
use crate::error::{ParserError, Result};

/// Token + length header size that precedes each node's data region.
pub const DATA_OFFSET: usize = 6;

/// The token of the root header node.
pub const ROOT_NODE_TOKEN: &str = "BG";

/// Maximum bytes the child scanner advances before giving up.
pub const MAX_SCAN_OFFSET: usize = 50;

/// Tokens whose data region contains further nodes. All other tokens
/// are terminal leaves.
const NODES_WITH_SUBSTRUCTURE: &[&str] = &["BG", "J1", "PL", "BP", "MP", "GM", "GD"];

/// A byte pair that passes the alphanumeric check but is known to
/// appear at a non-node position.
const REJECTED_PAIR: &[u8; 2] = b"kL";

/// A path that looks like a node but is not one; candidates at this
/// path are skipped.
const SKIPPED_PATH: &str = "BG/GM/GD/uI";

/// Index of a node within a [`HeaderTree`] arena.
pub type NodeId = usize;

/// A single node of the header tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Two-character ASCII token identifying the node type.
    pub token: String,
    /// Absolute offset of the node header in the blob.
    pub offset: usize,
    /// Length of the node's data region.
    pub size: u32,
    /// Arena index of the parent, `None` for the root.
    pub parent: Option<NodeId>,
    /// Arena indices of the children, in blob order.
    pub children: Vec<NodeId>,
}

impl Node {
    /// Absolute offset one past the node's data region.
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.offset + self.size as usize + DATA_OFFSET
    }
}

/// The parsed header tree, rooted at offset 0.
#[derive(Debug, Clone)]
pub struct HeaderTree {
    nodes: Vec<Node>,
}

impl HeaderTree {
    /// Parses the header tree from the decompressed replay blob.
    ///
    /// # Errors
    ///
    /// - `ParserError::NotRootNode` if the blob does not start with the
    ///   `BG` root token
    /// - `ParserError::UnexpectedEof` if the blob is too short for a
    ///   node header
    pub fn parse(data: &[u8]) -> Result<Self> {
        debug!("parsing header tree");
        let root = read_node(data, 0, None)?;
        if root.token != ROOT_NODE_TOKEN {
            return Err(ParserError::NotRootNode { token: root.token });
        }

        let mut nodes = vec![root];
        build_children(data, &mut nodes, 0)?;
        Ok(HeaderTree { nodes })
    }

    /// The arena index of the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        0
    }

    /// Returns the node at the given arena index.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// The number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes. Always false for a parsed tree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The `/`-joined token path of a node, e.g. `BG/GM/GD`.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        match self.nodes[id].parent {
            None => self.nodes[id].token.clone(),
            Some(parent) => format!("{}/{}", self.path(parent), self.nodes[id].token),
        }
    }

    /// Collects all descendants of the root matching a token path.
    ///
    /// Some paths legitimately match more than one node, so the result
    /// is a list in blob order.
    #[must_use]
    pub fn get_children(&self, path: &[&str]) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_children(self.root(), path, &mut out);
        out
    }

    /// Finds exactly one descendant of the root matching a token path.
    ///
    /// # Errors
    ///
    /// - `ParserError::NoChildNodes` if nothing matched
    /// - `ParserError::MultipleChildNodes` if more than one node matched
    pub fn find_single(&self, path: &[&str]) -> Result<NodeId> {
        let matches = self.get_children(path);
        match matches.len() {
            0 => Err(ParserError::NoChildNodes {
                path: path.join("/"),
            }),
            1 => Ok(matches[0]),
            _ => Err(ParserError::MultipleChildNodes {
                path: path.join("/"),
            }),
        }
    }

    fn collect_children(&self, id: NodeId, path: &[&str], out: &mut Vec<NodeId>) {
        let Some((first, rest)) = path.split_first() else {
            out.push(id);
            return;
        };

        for &child in &self.nodes[id].children {
            if self.nodes[child].token == *first {
                self.collect_children(child, rest, out);
            }
        }
    }
}

/// Reads a node header (token + length) at the given offset.
fn read_node(data: &[u8], offset: usize, parent: Option<NodeId>) -> Result<Node> {
    if offset + DATA_OFFSET > data.len() {
        return Err(ParserError::unexpected_eof(offset + DATA_OFFSET, data.len()));
    }

    let token = String::from_utf8_lossy(&data[offset..offset + 2]).into_owned();
    let size = read_u32_le(data, offset + 2)?;

    Ok(Node {
        token,
        offset,
        size,
        parent,
        children: Vec::new(),
    })
}

/// Recursively builds the subtree under `parent`, breadth-within-node.
fn build_children(data: &[u8], nodes: &mut Vec<Node>, parent: NodeId) -> Result<()> {
    let parent_end = nodes[parent].end_offset();
    let parent_path = {
        // Inline path computation to avoid borrowing a HeaderTree that
        // does not exist yet.
        let mut segments = Vec::new();
        let mut current = Some(parent);
        while let Some(id) = current {
            segments.push(nodes[id].token.clone());
            current = nodes[id].parent;
        }
        segments.reverse();
        segments.join("/")
    };

    let mut position = nodes[parent].offset + DATA_OFFSET;
    while position < parent_end {
        let Some(location) = find_token_pair(data, position, parent_end) else {
            break;
        };

        if location + DATA_OFFSET > data.len() {
            break;
        }

        let child = read_node(data, location, Some(parent))?;
        let child_path = format!("{parent_path}/{}", child.token);

        // A candidate that would overrun its parent, or that sits at the
        // known false-positive path, is not a real node.
        if child.end_offset() > parent_end || child_path == SKIPPED_PATH {
            position = location + 1;
            continue;
        }

        let end = child.end_offset();
        let id = nodes.len();
        nodes.push(child);
        nodes[parent].children.push(id);
        position = end;
    }

    let children = nodes[parent].children.clone();
    for id in children {
        if NODES_WITH_SUBSTRUCTURE.contains(&nodes[id].token.as_str()) {
            build_children(data, nodes, id)?;
        }
    }

    Ok(())
}

/// Scans for the next position where two consecutive bytes are both
/// alphanumeric ASCII, advancing at most [`MAX_SCAN_OFFSET`] bytes.
fn find_token_pair(data: &[u8], offset: usize, upper_bound: usize) -> Option<usize> {
    let upper = upper_bound.min(data.len());
    if offset >= data.len() || upper.saturating_sub(offset) < 2 {
        return None;
    }

    let mut position = offset;
    while position < upper && position + 1 < data.len() {
        if position > offset + MAX_SCAN_OFFSET {
            break;
        }

        let pair = [data[position], data[position + 1]];
        if pair[0].is_ascii_alphanumeric()
            && pair[1].is_ascii_alphanumeric()
            && &pair != REJECTED_PAIR
        {
            return Some(position);
        }

        position += 1;
    }

    None
}
