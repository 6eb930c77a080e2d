use nalgebra::{DMatrix, DVector, RowDVector};
use thiserror::Error;

/// Explained variances at or below this value are not whitened.
const WHITEN_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("PCA needs at least 2 samples, got {0}")]
    TooFewSamples(usize),
    #[error("At least one principal component must be requested")]
    ZeroComponents,
    #[error("Requested {requested} components, but at most {max} are available")]
    TooManyComponents { requested: usize, max: usize },
    #[error("Feature matrix contains non-finite values")]
    NonFinite,
    #[error("Singular value decomposition did not converge")]
    SvdFailed,
    #[error("Projection was fitted on {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Unfitted principal component analysis settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaProjector {
    pub n_components: usize,
    pub whiten: bool,
}

impl PcaProjector {
    pub fn new(n_components: usize, whiten: bool) -> Self {
        Self {
            n_components,
            whiten,
        }
    }

    /// Fits principal axes to the rows of `x` (one sample per row).
    ///
    /// Columns are centred, then decomposed by SVD. Components are ordered by
    /// decreasing singular value, and each is oriented so that its largest-magnitude
    /// loading is positive, which makes the fit independent of the SVD's sign choice.
    ///
    /// # Errors
    ///
    /// Fails for fewer than two samples, zero components, more components than
    /// `min(n_samples, n_features)`, non-finite input, or a non-converging SVD.
    pub fn fit(&self, x: &DMatrix<f64>) -> Result<FittedPca, ProjectionError> {
        let (n, d) = x.shape();
        if self.n_components == 0 {
            return Err(ProjectionError::ZeroComponents);
        }
        if n < 2 {
            return Err(ProjectionError::TooFewSamples(n));
        }
        let max = n.min(d);
        if self.n_components > max {
            return Err(ProjectionError::TooManyComponents {
                requested: self.n_components,
                max,
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ProjectionError::NonFinite);
        }

        let mean = RowDVector::from_fn(d, |_, j| x.column(j).mean());
        let centered = center(x, &mean);

        let svd = centered
            .try_svd(false, true, f64::EPSILON, 0)
            .ok_or(ProjectionError::SvdFailed)?;
        let v_t = svd.v_t.ok_or(ProjectionError::SvdFailed)?;
        let singular = svd.singular_values;

        let mut order: Vec<usize> = (0..singular.len()).collect();
        order.sort_by(|&i, &j| singular[j].total_cmp(&singular[i]));
        order.truncate(self.n_components);

        let mut components = DMatrix::from_fn(order.len(), d, |c, j| v_t[(order[c], j)]);
        for mut row in components.row_iter_mut() {
            let pivot = row.iter().copied().fold(0.0f64, |best, v| {
                if v.abs() > best.abs() { v } else { best }
            });
            if pivot < 0.0 {
                row.neg_mut();
            }
        }

        let denom = (n - 1) as f64;
        let explained_variance =
            DVector::from_iterator(order.len(), order.iter().map(|&i| singular[i].powi(2) / denom));

        Ok(FittedPca {
            mean,
            components,
            explained_variance,
            whiten: self.whiten,
        })
    }
}

fn center(x: &DMatrix<f64>, mean: &RowDVector<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - mean[j])
}

/// A fitted PCA: column means, principal axes (one per row) and their variances.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPca {
    mean: RowDVector<f64>,
    components: DMatrix<f64>,
    explained_variance: DVector<f64>,
    whiten: bool,
}

impl FittedPca {
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    pub fn components(&self) -> &DMatrix<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &DVector<f64> {
        &self.explained_variance
    }

    /// Projects the rows of `x` onto the principal axes.
    ///
    /// With whitening, each output column is divided by the square root of its
    /// explained variance unless that variance is numerically zero.
    pub fn transform(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ProjectionError> {
        if x.ncols() != self.input_dim() {
            return Err(ProjectionError::DimensionMismatch {
                expected: self.input_dim(),
                found: x.ncols(),
            });
        }
        let mut projected = center(x, &self.mean) * self.components.transpose();
        if self.whiten {
            for (k, mut column) in projected.column_iter_mut().enumerate() {
                let variance = self.explained_variance[k];
                if variance > WHITEN_TOLERANCE {
                    column /= variance.sqrt();
                }
            }
        }
        Ok(projected)
    }
}
