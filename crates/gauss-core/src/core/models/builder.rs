use super::curve::Curve;
use super::node::Node;
use super::structure::{Structure, StructureError};
use std::collections::{BTreeMap, HashMap};

enum PendingCurve {
    Explicit(Curve),
    HalfBond(usize, usize),
}

/// Incrementally assembles a [`Structure`].
///
/// Node references are only checked in [`build`](Self::build), so nodes and
/// curves may be added in any order.
pub struct StructureBuilder {
    name: String,
    nodes: Vec<Node>,
    curves: Vec<PendingCurve>,
    metadata: BTreeMap<String, String>,
}

impl StructureBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            curves: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn add_curve(&mut self, curve: Curve) -> &mut Self {
        self.curves.push(PendingCurve::Explicit(curve));
        self
    }

    /// Adds a bond between two node ids, split into two half-bond segments.
    pub fn add_bond(&mut self, id_a: usize, id_b: usize) -> &mut Self {
        self.curves.push(PendingCurve::HalfBond(id_a, id_b));
        self
    }

    pub fn insert_metadata(&mut self, key: &str, value: &str) -> &mut Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Resolves pending bonds and validates every node reference.
    ///
    /// # Errors
    ///
    /// Returns a [`StructureError`] for duplicate node ids or for any segment
    /// (explicit or bond-derived) that references a node id not in the structure.
    pub fn build(self) -> Result<Structure, StructureError> {
        let positions: HashMap<usize, _> = self.nodes.iter().map(|n| (n.id, n.position)).collect();

        let mut curves = Vec::with_capacity(self.curves.len());
        for (curve_idx, pending) in self.curves.into_iter().enumerate() {
            match pending {
                PendingCurve::Explicit(curve) => curves.push(curve),
                PendingCurve::HalfBond(a, b) => {
                    let missing = [(0, a), (1, b)]
                        .into_iter()
                        .find(|(_, id)| !positions.contains_key(id));
                    if let Some((segment, id)) = missing {
                        return Err(StructureError::UnknownNode {
                            structure: self.name,
                            curve: curve_idx,
                            segment,
                            id,
                        });
                    }
                    curves.push(Curve::half_bond(a, positions[&a], b, positions[&b]));
                }
            }
        }

        Structure::from_parts(self.name, self.nodes, curves, self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::curve::{CurveKind, Segment};
    use nalgebra::Point3;

    #[test]
    fn build_creates_half_bond_curves_for_bonds() {
        let mut builder = StructureBuilder::new("ethane-ish");
        builder
            .add_node(Node::new(0, Point3::origin(), "C"))
            .add_node(Node::new(1, Point3::new(1.5, 0.0, 0.0), "C"))
            .add_bond(0, 1)
            .insert_metadata("source", "test");
        let s = builder.build().unwrap();

        assert_eq!(s.name(), "ethane-ish");
        assert_eq!(s.curves().len(), 1);
        assert_eq!(s.curves()[0].kind, CurveKind::Bond);
        assert_eq!(s.curves()[0].segments[0].end, Point3::new(0.75, 0.0, 0.0));
        assert_eq!(s.metadata().get("source").map(String::as_str), Some("test"));
    }

    #[test]
    fn bond_may_be_declared_before_its_nodes() {
        let mut builder = StructureBuilder::new("late");
        builder
            .add_bond(0, 1)
            .add_node(Node::new(0, Point3::origin(), "O"))
            .add_node(Node::new(1, Point3::new(0.0, 1.0, 0.0), "H"));
        assert!(builder.build().is_ok());
    }

    #[test]
    fn build_fails_for_bond_to_missing_node() {
        let mut builder = StructureBuilder::new("broken");
        builder
            .add_node(Node::new(0, Point3::origin(), "C"))
            .add_bond(0, 5);
        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            StructureError::UnknownNode {
                structure: "broken".into(),
                curve: 0,
                segment: 1,
                id: 5,
            }
        );
    }

    #[test]
    fn build_fails_for_explicit_segment_with_missing_node() {
        let mut builder = StructureBuilder::new("explicit");
        builder.add_node(Node::new(0, Point3::origin(), "C")).add_curve(Curve::new(
            CurveKind::Other("backbone".into()),
            vec![Segment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0), Some(2), None)],
        ));
        assert!(matches!(
            builder.build(),
            Err(StructureError::UnknownNode { id: 2, .. })
        ));
    }

    #[test]
    fn unowned_segments_are_accepted() {
        let mut builder = StructureBuilder::new("free");
        builder.add_curve(Curve::new(
            CurveKind::Bond,
            vec![Segment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0), None, None)],
        ));
        let s = builder.build().unwrap();
        assert_eq!(s.num_segments(), 1);
        assert!(s.is_empty());
    }
}
