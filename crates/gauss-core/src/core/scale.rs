//! Multiscale distance weighting of linking matrices.
//!
//! A scale scheme turns one `(N_A, N_B)` linking matrix into `K` layers, one per
//! distance scale, by weighting each cell with a kernel of the node-pair distance.
//! Two schemes are provided: hard distance bins ([`BinningScheme`]) and Gaussian
//! radial basis functions ([`RbfScheme`]). [`Scales`] selects one of them at runtime.

use nalgebra::DMatrix;
use thiserror::Error;

/// `K` weighted copies of a linking matrix, one per distance scale.
pub type ScaledStack = Vec<DMatrix<f64>>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("At least 2 bin edges are required, got {0}")]
    TooFewEdges(usize),
    #[error("Bin edges must be finite and strictly increasing (edge {index} = {value})")]
    UnorderedEdges { index: usize, value: f64 },
    #[error("At least one RBF center is required")]
    NoCenters,
    #[error("RBF center {0} is not finite")]
    NonFiniteCenter(f64),
    #[error("RBF sigma must be finite and positive, got {0}")]
    InvalidSigma(f64),
}

/// The capability shared by every scale scheme: weight a linking matrix by distance.
pub trait ScaleScheme {
    /// Number of layers `K` produced by [`apply`](Self::apply).
    fn num_scales(&self) -> usize;

    /// Weight of layer `k` for a node pair at `distance`.
    fn weight(&self, k: usize, distance: f64) -> f64;

    /// Produces the `(K, N_A, N_B)` stack. Neither input is modified.
    fn apply(&self, gij: &DMatrix<f64>, rij: &DMatrix<f64>) -> ScaledStack {
        (0..self.num_scales())
            .map(|k| gij.zip_map(rij, |g, r| g * self.weight(k, r)))
            .collect()
    }
}

/// Hard distance bins over half-open intervals `[edges[k], edges[k + 1])`.
///
/// A distance equal to the last edge falls outside every bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningScheme {
    edges: Vec<f64>,
}

impl BinningScheme {
    /// # Errors
    ///
    /// Returns [`ScaleError::TooFewEdges`] for fewer than two edges and
    /// [`ScaleError::UnorderedEdges`] for non-finite or non-increasing edges.
    pub fn new(edges: Vec<f64>) -> Result<Self, ScaleError> {
        if edges.len() < 2 {
            return Err(ScaleError::TooFewEdges(edges.len()));
        }
        for (index, &value) in edges.iter().enumerate() {
            let ordered = index == 0 || value > edges[index - 1];
            if !value.is_finite() || !ordered {
                return Err(ScaleError::UnorderedEdges { index, value });
            }
        }
        Ok(Self { edges })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Index of the bin containing `distance`, if any.
    pub fn bin_of(&self, distance: f64) -> Option<usize> {
        let last = *self.edges.last()?;
        if !(distance >= self.edges[0] && distance < last) {
            return None;
        }
        // Number of edges <= distance, minus one, is the bin whose lower edge it meets.
        Some(self.edges.partition_point(|&e| e <= distance) - 1)
    }
}

impl ScaleScheme for BinningScheme {
    fn num_scales(&self) -> usize {
        self.edges.len() - 1
    }

    fn weight(&self, k: usize, distance: f64) -> f64 {
        if self.edges[k] <= distance && distance < self.edges[k + 1] {
            1.0
        } else {
            0.0
        }
    }

    fn apply(&self, gij: &DMatrix<f64>, rij: &DMatrix<f64>) -> ScaledStack {
        let mut stack = vec![DMatrix::zeros(gij.nrows(), gij.ncols()); self.num_scales()];
        for ((g, r), idx) in gij.iter().zip(rij.iter()).zip(0..) {
            if let Some(k) = self.bin_of(*r) {
                stack[k][idx] = *g;
            }
        }
        stack
    }
}

/// Gaussian radial basis weighting `exp(-(r - c_k)² / 2σ²)` around `K` centers.
#[derive(Debug, Clone, PartialEq)]
pub struct RbfScheme {
    centers: Vec<f64>,
    sigma: f64,
}

impl RbfScheme {
    /// Builds an RBF scheme, deriving sigma when not given.
    ///
    /// Without an explicit sigma: a single center uses 1.0, otherwise the mean gap
    /// between sorted centers is used, falling back to 1.0 if that mean is zero.
    ///
    /// # Errors
    ///
    /// Returns a [`ScaleError`] for an empty or non-finite center list, or for a
    /// sigma that is not finite and strictly positive.
    pub fn new(centers: Vec<f64>, sigma: Option<f64>) -> Result<Self, ScaleError> {
        if centers.is_empty() {
            return Err(ScaleError::NoCenters);
        }
        if let Some(&bad) = centers.iter().find(|c| !c.is_finite()) {
            return Err(ScaleError::NonFiniteCenter(bad));
        }
        let sigma = match sigma {
            Some(s) if s.is_finite() && s > 0.0 => s,
            Some(s) => return Err(ScaleError::InvalidSigma(s)),
            None => default_sigma(&centers),
        };
        Ok(Self { centers, sigma })
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

fn default_sigma(centers: &[f64]) -> f64 {
    if centers.len() == 1 {
        return 1.0;
    }
    let mut sorted = centers.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mean_gap = sorted.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (sorted.len() - 1) as f64;
    if mean_gap == 0.0 { 1.0 } else { mean_gap }
}

impl ScaleScheme for RbfScheme {
    fn num_scales(&self) -> usize {
        self.centers.len()
    }

    fn weight(&self, k: usize, distance: f64) -> f64 {
        let d = distance - self.centers[k];
        (-(d * d) / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Runtime selection between the two scale schemes.
#[derive(Debug, Clone, PartialEq)]
pub enum Scales {
    Bins(BinningScheme),
    Rbf(RbfScheme),
}

impl Scales {
    pub fn bins(edges: Vec<f64>) -> Result<Self, ScaleError> {
        BinningScheme::new(edges).map(Scales::Bins)
    }

    pub fn rbf(centers: Vec<f64>, sigma: Option<f64>) -> Result<Self, ScaleError> {
        RbfScheme::new(centers, sigma).map(Scales::Rbf)
    }

    pub fn is_rbf(&self) -> bool {
        matches!(self, Scales::Rbf(_))
    }
}

impl ScaleScheme for Scales {
    fn num_scales(&self) -> usize {
        match self {
            Scales::Bins(s) => s.num_scales(),
            Scales::Rbf(s) => s.num_scales(),
        }
    }

    fn weight(&self, k: usize, distance: f64) -> f64 {
        match self {
            Scales::Bins(s) => s.weight(k, distance),
            Scales::Rbf(s) => s.weight(k, distance),
        }
    }

    fn apply(&self, gij: &DMatrix<f64>, rij: &DMatrix<f64>) -> ScaledStack {
        match self {
            Scales::Bins(s) => s.apply(gij, rij),
            Scales::Rbf(s) => s.apply(gij, rij),
        }
    }
}
