use super::kernel::linking_between;
use crate::core::models::structure::Structure;
use nalgebra::{DMatrix, Vector3};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How multiple segment-pair contributions landing on the same node pair are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aggregation {
    /// Linking integrals are additive over curve pieces.
    #[default]
    Sum,
    Mean,
    Max,
    Min,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAggregationError(String);

impl fmt::Display for ParseAggregationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown aggregation '{}'", self.0)
    }
}

impl std::error::Error for ParseAggregationError {}

impl FromStr for Aggregation {
    type Err = ParseAggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "max" => Ok(Aggregation::Max),
            "min" => Ok(Aggregation::Min),
            _ => Err(ParseAggregationError(s.to_string())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
        };
        f.write_str(name)
    }
}

/// Flat coordinate table of the segments that are attributed to a node.
struct SegmentTable {
    starts: Vec<Vector3<f64>>,
    ends: Vec<Vector3<f64>>,
    /// Dense node index (matrix row or column) owning each segment.
    owners: Vec<usize>,
}

impl SegmentTable {
    fn from_structure(structure: &Structure) -> Self {
        let capacity = structure.num_segments();
        let mut table = Self {
            starts: Vec::with_capacity(capacity),
            ends: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
        };
        for segment in structure.segments() {
            // Unowned segments cannot land in any cell; skipping them here keeps
            // them out of the inner loop entirely.
            let Some(owner) = segment.owner().and_then(|id| structure.node_position(id)) else {
                continue;
            };
            table.starts.push(segment.start.coords);
            table.ends.push(segment.end.coords);
            table.owners.push(owner);
        }
        table
    }

    fn len(&self) -> usize {
        self.owners.len()
    }

    /// Segment indices grouped by owning row, preserving segment order within a row.
    fn by_owner(&self, num_nodes: usize) -> Vec<Vec<usize>> {
        let mut rows = vec![Vec::new(); num_nodes];
        for (idx, &owner) in self.owners.iter().enumerate() {
            rows[owner].push(idx);
        }
        rows
    }
}

/// Per-cell running state for one row of the linking matrix.
struct RowAccumulator {
    sum: Vec<f64>,
    count: Vec<u32>,
    max: Vec<f64>,
    min: Vec<f64>,
}

impl RowAccumulator {
    fn new(width: usize) -> Self {
        Self {
            sum: vec![0.0; width],
            count: vec![0; width],
            max: vec![f64::NEG_INFINITY; width],
            min: vec![f64::INFINITY; width],
        }
    }

    #[inline]
    fn push(&mut self, col: usize, value: f64) {
        self.sum[col] += value;
        self.count[col] += 1;
        self.max[col] = self.max[col].max(value);
        self.min[col] = self.min[col].min(value);
    }

    fn finish(self, agg: Aggregation) -> Vec<f64> {
        (0..self.sum.len())
            .map(|col| {
                if self.count[col] == 0 {
                    return 0.0;
                }
                match agg {
                    Aggregation::Sum => self.sum[col],
                    Aggregation::Mean => self.sum[col] / self.count[col] as f64,
                    Aggregation::Max => self.max[col],
                    Aggregation::Min => self.min[col],
                }
            })
            .collect()
    }
}

/// Computes the node-by-node linking matrix `gij` and distance matrix `rij`.
///
/// Every segment of `a` owned by a node is paired with every owned segment of `b`;
/// each contribution lands in the cell (owner in `a`, owner in `b`). Segments with no
/// owning node take no part. Rows are accumulated independently and in a fixed order,
/// so the output is bit-identical regardless of thread count.
///
/// # Return
///
/// `(gij, rij)`, both of shape `(a.num_nodes(), b.num_nodes())`. Rows follow the node
/// order of `a`, columns the node order of `b`. Either dimension may be zero.
#[instrument(skip_all, name = "pairwise_node_gli")]
pub fn pairwise_node_gli(
    a: &Structure,
    b: &Structure,
    signed: bool,
    agg: Aggregation,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let n_a = a.num_nodes();
    let n_b = b.num_nodes();

    let segs_a = SegmentTable::from_structure(a);
    let segs_b = SegmentTable::from_structure(b);
    debug!(
        nodes_a = n_a,
        nodes_b = n_b,
        segments_a = segs_a.len(),
        segments_b = segs_b.len(),
        "Computing pairwise linking matrix."
    );

    let row_segments = segs_a.by_owner(n_a);

    let compute_row = |row: &Vec<usize>| -> Vec<f64> {
        let mut acc = RowAccumulator::new(n_b);
        for &ia in row {
            let p1 = &segs_a.starts[ia];
            let p2 = &segs_a.ends[ia];
            for ib in 0..segs_b.len() {
                let value =
                    linking_between(p1, p2, &segs_b.starts[ib], &segs_b.ends[ib], signed);
                acc.push(segs_b.owners[ib], value);
            }
        }
        acc.finish(agg)
    };

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<f64>> = row_segments.iter().map(compute_row).collect();

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<f64>> = row_segments.par_iter().map(compute_row).collect();

    let gij = DMatrix::from_fn(n_a, n_b, |i, j| rows[i][j]);
    let rij = distance_matrix(a, b);

    (gij, rij)
}

/// Euclidean distances between every node of `a` and every node of `b`.
pub fn distance_matrix(a: &Structure, b: &Structure) -> DMatrix<f64> {
    let nodes_a = a.nodes();
    let nodes_b = b.nodes();
    DMatrix::from_fn(nodes_a.len(), nodes_b.len(), |i, j| {
        nalgebra::distance(&nodes_a[i].position, &nodes_b[j].position)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::builder::StructureBuilder;
    use crate::core::models::curve::{Curve, CurveKind, Segment};
    use crate::core::models::node::Node;
    use nalgebra::Point3;

    fn two_atom(name: &str, p0: [f64; 3], p1: [f64; 3]) -> Structure {
        let mut builder = StructureBuilder::new(name);
        builder
            .add_node(Node::new(0, Point3::from(p0), "C"))
            .add_node(Node::new(1, Point3::from(p1), "C"))
            .add_bond(0, 1);
        builder.build().unwrap()
    }

    fn crossing_pair() -> (Structure, Structure) {
        (
            two_atom("A", [-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
            two_atom("B", [0.0, -1.0, 1.0], [0.0, 1.0, 1.0]),
        )
    }

    #[test]
    fn aggregation_parses_names_case_insensitively() {
        assert_eq!("SUM".parse::<Aggregation>(), Ok(Aggregation::Sum));
        assert_eq!("mean".parse::<Aggregation>(), Ok(Aggregation::Mean));
        assert_eq!(" Max ".parse::<Aggregation>(), Ok(Aggregation::Max));
        assert_eq!("min".parse::<Aggregation>(), Ok(Aggregation::Min));
        let err = "median".parse::<Aggregation>().unwrap_err();
        assert_eq!(err.to_string(), "unknown aggregation 'median'");
        assert_eq!(Aggregation::Mean.to_string(), "mean");
    }

    #[test]
    fn crossing_half_bonds_split_linking_into_quarters() {
        let (a, b) = crossing_pair();
        let (gij, rij) = pairwise_node_gli(&a, &b, true, Aggregation::Sum);

        assert_eq!(gij.shape(), (2, 2));
        let q = 1.0 / 24.0;
        assert!((gij[(0, 0)] + q).abs() < 1e-12);
        assert!((gij[(0, 1)] - q).abs() < 1e-12);
        assert!((gij[(1, 0)] - q).abs() < 1e-12);
        assert!((gij[(1, 1)] + q).abs() < 1e-12);

        for value in rij.iter() {
            assert!((value - 3.0f64.sqrt()).abs() < 1e-12);
        }
    }

    #[test]
    fn unsigned_matrix_is_elementwise_absolute() {
        let (a, b) = crossing_pair();
        let (signed, _) = pairwise_node_gli(&a, &b, true, Aggregation::Sum);
        let (unsigned, _) = pairwise_node_gli(&a, &b, false, Aggregation::Sum);
        assert_eq!(unsigned, signed.abs());
    }

    #[test]
    fn parallel_two_atom_structures_give_deterministic_zero_matrix() {
        let a = two_atom("A", [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let b = two_atom("B", [0.0, 0.0, 5.0], [1.0, 0.0, 5.0]);
        let (g1, r1) = pairwise_node_gli(&a, &b, false, Aggregation::Mean);
        let (g2, r2) = pairwise_node_gli(&a, &b, false, Aggregation::Mean);

        assert_eq!(g1.shape(), (2, 2));
        assert!(g1.iter().all(|v| *v == 0.0));
        assert!((r1[(0, 0)] - 5.0).abs() < 1e-12);
        assert!((r1[(0, 1)] - 26.0f64.sqrt()).abs() < 1e-12);
        let bits = |m: &DMatrix<f64>| m.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&g1), bits(&g2));
        assert_eq!(bits(&r1), bits(&r2));
    }

    #[test]
    fn aggregation_modes_combine_multiple_contributions() {
        // Two explicit segments owned by node 0 of A, both crossing B's node-0 half bond.
        let mut builder = StructureBuilder::new("A");
        builder
            .add_node(Node::new(0, Point3::new(-1.0, 0.0, 0.0), "C"))
            .add_curve(Curve::new(
                CurveKind::Bond,
                vec![
                    Segment::new(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Some(0), None),
                    Segment::new(Point3::new(-1.0, 0.0, 0.5), Point3::new(1.0, 0.0, 0.5), Some(0), None),
                ],
            ));
        let a = builder.build().unwrap();
        let mut builder = StructureBuilder::new("B");
        builder
            .add_node(Node::new(0, Point3::new(0.0, -1.0, 1.0), "C"))
            .add_curve(Curve::new(
                CurveKind::Bond,
                vec![Segment::new(Point3::new(0.0, -1.0, 1.0), Point3::new(0.0, 1.0, 1.0), Some(0), None)],
            ));
        let b = builder.build().unwrap();

        let near = crate::core::linking::kernel::segment_linking(&a.curves()[0].segments[1], &b.curves()[0].segments[0], true);
        let far = crate::core::linking::kernel::segment_linking(&a.curves()[0].segments[0], &b.curves()[0].segments[0], true);
        assert!(near.abs() > far.abs());

        let (sum, _) = pairwise_node_gli(&a, &b, true, Aggregation::Sum);
        let (mean, _) = pairwise_node_gli(&a, &b, true, Aggregation::Mean);
        let (max, _) = pairwise_node_gli(&a, &b, true, Aggregation::Max);
        let (min, _) = pairwise_node_gli(&a, &b, true, Aggregation::Min);

        assert!((sum[(0, 0)] - (near + far)).abs() < 1e-12);
        assert!((mean[(0, 0)] - (near + far) / 2.0).abs() < 1e-12);
        assert!((max[(0, 0)] - near.max(far)).abs() < 1e-12);
        assert!((min[(0, 0)] - near.min(far)).abs() < 1e-12);
    }

    #[test]
    fn unowned_segments_contribute_to_no_cell() {
        let mut builder = StructureBuilder::new("A");
        builder
            .add_node(Node::new(0, Point3::new(5.0, 5.0, 5.0), "C"))
            .add_curve(Curve::new(
                CurveKind::Bond,
                vec![Segment::new(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), None, None)],
            ));
        let a = builder.build().unwrap();
        let (_, b) = crossing_pair();
        let (gij, _) = pairwise_node_gli(&a, &b, false, Aggregation::Sum);
        assert_eq!(gij.shape(), (1, 2));
        assert!(gij.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn empty_structure_yields_zero_sized_matrices() {
        let empty = StructureBuilder::new("empty").build().unwrap();
        let (_, b) = crossing_pair();

        let (gij, rij) = pairwise_node_gli(&empty, &b, true, Aggregation::Sum);
        assert_eq!(gij.shape(), (0, 2));
        assert_eq!(rij.shape(), (0, 2));

        let (gij, rij) = pairwise_node_gli(&b, &empty, true, Aggregation::Sum);
        assert_eq!(gij.shape(), (2, 0));
        assert_eq!(rij.shape(), (2, 0));
    }

    #[test]
    fn swapping_structures_transposes_signed_matrix() {
        let a = two_atom("A", [0.0, 0.0, 0.0], [1.0, 0.2, -0.3]);
        let b = two_atom("B", [0.3, -0.5, 0.7], [0.8, 1.2, -0.4]);
        let (ab, _) = pairwise_node_gli(&a, &b, true, Aggregation::Sum);
        let (ba, _) = pairwise_node_gli(&b, &a, true, Aggregation::Sum);
        assert!((ab - ba.transpose()).abs().max() < 1e-12);
    }
}
