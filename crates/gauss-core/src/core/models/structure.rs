use super::curve::{Curve, Segment};
use super::node::Node;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Duplicate node id {id} in structure '{structure}'")]
    DuplicateNode { structure: String, id: usize },

    #[error(
        "Segment {segment} of curve {curve} in structure '{structure}' references unknown node {id}"
    )]
    UnknownNode {
        structure: String,
        curve: usize,
        segment: usize,
        id: usize,
    },
}

/// A named, validated collection of nodes and curves.
///
/// Structures are produced by [`StructureBuilder`](super::builder::StructureBuilder)
/// and are read-only afterwards: every segment end that carries a node id is
/// guaranteed to reference a node of the same structure.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    name: String,
    nodes: Vec<Node>,
    curves: Vec<Curve>,
    metadata: BTreeMap<String, String>,
    /// Maps a node id to its position in `nodes` (the matrix row/column index).
    node_index: HashMap<usize, usize>,
}

impl Structure {
    /// Assembles and validates a structure from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::DuplicateNode`] if two nodes share an id, or
    /// [`StructureError::UnknownNode`] if a segment references a missing node.
    pub(crate) fn from_parts(
        name: String,
        nodes: Vec<Node>,
        curves: Vec<Curve>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self, StructureError> {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id, idx).is_some() {
                return Err(StructureError::DuplicateNode {
                    structure: name,
                    id: node.id,
                });
            }
        }

        for (curve_idx, curve) in curves.iter().enumerate() {
            for (segment_idx, segment) in curve.segments.iter().enumerate() {
                if let Some(id) = segment.node_refs().find(|id| !node_index.contains_key(id)) {
                    return Err(StructureError::UnknownNode {
                        structure: name,
                        curve: curve_idx,
                        segment: segment_idx,
                        id,
                    });
                }
            }
        }

        Ok(Self {
            name,
            nodes,
            curves,
            metadata,
            node_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by its id.
    pub fn node(&self, id: usize) -> Option<&Node> {
        self.node_index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// Returns the dense index (row or column in the linking matrix) of a node id.
    pub fn node_position(&self, id: usize) -> Option<usize> {
        self.node_index.get(&id).copied()
    }

    /// Iterates over every segment of every curve, in curve order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.curves.iter().flat_map(|c| c.segments.iter())
    }

    pub fn num_segments(&self) -> usize {
        self.curves.iter().map(|c| c.segments.len()).sum()
    }
}
