use super::models::node::Node;
use super::models::structure::Structure;
use phf::{Map, phf_map};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

static RESIDUE_CLASSES: Map<&'static str, &'static str> = phf_map! {
    // Amino acids
    "ALA" => "hydrophobic",
    "VAL" => "hydrophobic",
    "LEU" => "hydrophobic",
    "ILE" => "hydrophobic",
    "MET" => "hydrophobic",
    "PHE" => "aromatic",
    "TRP" => "aromatic",
    "TYR" => "aromatic",
    "SER" => "polar",
    "THR" => "polar",
    "ASN" => "polar",
    "GLN" => "polar",
    "CYS" => "polar",
    "LYS" => "positive",
    "ARG" => "positive",
    "HIS" => "positive",
    "HSE" => "positive",
    "HSD" => "positive",
    "HSP" => "positive",
    "ASP" => "negative",
    "GLU" => "negative",
    "GLY" => "special",
    "PRO" => "special",
    // Nucleotides
    "A" => "purine",
    "G" => "purine",
    "DA" => "purine",
    "DG" => "purine",
    "C" => "pyrimidine",
    "U" => "pyrimidine",
    "T" => "pyrimidine",
    "DC" => "pyrimidine",
    "DT" => "pyrimidine",
    "DU" => "pyrimidine",
};

/// Label given to residue names missing from the residue-class table.
pub const UNKNOWN_RESIDUE_CLASS: &str = "other";
/// Label given to nodes that carry no residue name at all.
pub const NO_RESIDUE_CLASS: &str = "ligand";

/// Physico-chemical class of a residue name (case-insensitive).
pub fn residue_class(residue_name: &str) -> &'static str {
    let key = residue_name.trim().to_ascii_uppercase();
    RESIDUE_CLASSES
        .get(key.as_str())
        .copied()
        .unwrap_or(UNKNOWN_RESIDUE_CLASS)
}

/// How nodes of one structure are partitioned into groups for pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupMode {
    #[default]
    Element,
    ResidueClass,
    Custom,
}

impl GroupMode {
    /// The group label of `node` under this mode.
    pub fn label_of<'a>(&self, node: &'a Node) -> &'a str {
        match self {
            GroupMode::Element => &node.element,
            GroupMode::ResidueClass => match node.residue_name.as_deref() {
                Some(name) => residue_class(name),
                None => NO_RESIDUE_CLASS,
            },
            GroupMode::Custom => node.group.as_deref().unwrap_or(&node.element),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGroupModeError(String);

impl fmt::Display for ParseGroupModeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unknown group mode '{}' (expected element, residue_class or custom)",
            self.0
        )
    }
}

impl std::error::Error for ParseGroupModeError {}

impl FromStr for GroupMode {
    type Err = ParseGroupModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "element" => Ok(GroupMode::Element),
            "residue_class" | "residue-class" => Ok(GroupMode::ResidueClass),
            "custom" | "group" => Ok(GroupMode::Custom),
            _ => Err(ParseGroupModeError(s.to_string())),
        }
    }
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            GroupMode::Element => "element",
            GroupMode::ResidueClass => "residue_class",
            GroupMode::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Ordered group labels of one structure plus each node's position on that axis.
///
/// `membership[i]` is the group index of the i-th node (insertion order), or `None`
/// when a fixed vocabulary is in use and the node's label is not in it.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAxis {
    labels: Vec<String>,
    membership: Vec<Option<usize>>,
}

impl GroupAxis {
    /// Resolves the group axis of `structure`.
    ///
    /// Without a vocabulary the axis is the sorted set of labels present. With one,
    /// the axis is the vocabulary in its given order, which may include labels absent
    /// from this structure.
    pub fn resolve(structure: &Structure, mode: GroupMode, vocabulary: Option<&[String]>) -> Self {
        let node_labels: Vec<&str> = structure.nodes().iter().map(|n| mode.label_of(n)).collect();

        let labels: Vec<String> = match vocabulary {
            Some(vocab) => vocab.to_vec(),
            None => node_labels
                .iter()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        let membership = node_labels
            .iter()
            .map(|label| labels.iter().position(|l| l == label))
            .collect();

        Self { labels, membership }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Node indices (row/column indices of the linking matrix) belonging to group `g`.
    pub fn members(&self, g: usize) -> Vec<usize> {
        self.membership
            .iter()
            .enumerate()
            .filter_map(|(i, m)| (*m == Some(g)).then_some(i))
            .collect()
    }
}
