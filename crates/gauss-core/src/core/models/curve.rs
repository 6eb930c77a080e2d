use nalgebra::Point3;
use std::fmt;

/// A directed straight-line piece of a curve.
///
/// A bond between two atoms is stored as two segments, each running from an atom
/// to the bond midpoint. The end lying on the midpoint carries no node id, so the
/// linking contribution of a half-bond can be attributed to exactly one atom.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub start_node: Option<usize>,
    pub end_node: Option<usize>,
}

impl Segment {
    pub fn new(
        start: Point3<f64>,
        end: Point3<f64>,
        start_node: Option<usize>,
        end_node: Option<usize>,
    ) -> Self {
        Self {
            start,
            end,
            start_node,
            end_node,
        }
    }

    /// Returns the node this segment's contributions are attributed to.
    ///
    /// The start node wins when both ends carry an id.
    #[inline]
    pub fn owner(&self) -> Option<usize> {
        self.start_node.or(self.end_node)
    }

    /// Iterates over the node ids referenced by either end.
    pub fn node_refs(&self) -> impl Iterator<Item = usize> + '_ {
        self.start_node.into_iter().chain(self.end_node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CurveKind {
    #[default]
    Bond,
    Other(String),
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveKind::Bond => write!(f, "bond"),
            CurveKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// An ordered run of segments describing one connectivity edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub kind: CurveKind,
    pub segments: Vec<Segment>,
}

impl Curve {
    pub fn new(kind: CurveKind, segments: Vec<Segment>) -> Self {
        Self { kind, segments }
    }

    /// Splits the bond `a`–`b` at its midpoint into two half-bond segments.
    ///
    /// Each segment starts at its atom and ends at the midpoint, which is unowned.
    pub fn half_bond(a_id: usize, a: Point3<f64>, b_id: usize, b: Point3<f64>) -> Self {
        let midpoint = nalgebra::center(&a, &b);
        Self {
            kind: CurveKind::Bond,
            segments: vec![
                Segment::new(a, midpoint, Some(a_id), None),
                Segment::new(b, midpoint, Some(b_id), None),
            ],
        }
    }
}
