use nalgebra::Point3;

/// A single atom of a structure, as seen by the linking kernel.
///
/// Nodes are created by the reading layer and never mutated once the owning
/// [`Structure`](super::structure::Structure) has been built.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Identifier, unique within the owning structure.
    pub id: usize,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Element symbol (e.g., "C", "N", "Fe").
    pub element: String,
    /// Name of the residue this atom belongs to, if any (e.g., "ALA", "DG").
    pub residue_name: Option<String>,
    /// Caller-supplied group label used by the custom grouping mode.
    pub group: Option<String>,
}

impl Node {
    /// Creates a node with no residue and no custom group label.
    ///
    /// # Arguments
    ///
    /// * `id` - The node identifier.
    /// * `position` - The 3D coordinates of the atom.
    /// * `element` - The element symbol.
    pub fn new(id: usize, position: Point3<f64>, element: &str) -> Self {
        Self {
            id,
            position,
            element: element.to_string(),
            residue_name: None,
            group: None,
        }
    }

    pub fn with_residue(mut self, residue_name: &str) -> Self {
        self.residue_name = Some(residue_name.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }
}
