use super::projection::{FittedPca, PcaProjector};
use crate::core::models::structure::Structure;
use crate::engine::config::MgliConfig;
use crate::engine::descriptor::global_descriptor;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A structure and its optional partner; without a partner the structure is linked
/// against itself.
pub type StructurePair<'s> = (&'s Structure, Option<&'s Structure>);

/// The dimensionality reduction applied after featurization.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    None,
    Pca(PcaProjector),
}

/// What [`MgliPipeline::transform`] applies to the stacked descriptors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionState {
    NoProjection,
    Fitted(FittedPca),
}

/// Result of [`MgliPipeline::fit`].
#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    /// No projection is configured.
    Unprojected,
    Projected { components: usize },
    /// The projection could not be fitted; transforms return raw descriptors.
    Degraded { reason: String },
}

/// Featurizes batches of structure pairs into a stacked descriptor matrix, with an
/// optional fitted projection.
#[derive(Debug, Clone)]
pub struct MgliPipeline {
    config: MgliConfig,
    projection: Projection,
    state: ProjectionState,
}

impl MgliPipeline {
    pub fn new(config: MgliConfig, projection: Projection) -> Self {
        Self {
            config,
            projection,
            state: ProjectionState::NoProjection,
        }
    }

    pub fn config(&self) -> &MgliConfig {
        &self.config
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn state(&self) -> &ProjectionState {
        &self.state
    }

    /// Computes the global descriptor of every pair and stacks them into an
    /// `(n_pairs, width)` matrix in input order. No projection is applied.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FeatureWidthMismatch`] when descriptors differ in width,
    /// which happens when pairs have different group sets and no vocabulary is fixed.
    /// Pairs with an empty structure are not affected: they become all-zero rows.
    #[instrument(skip_all, name = "pipeline_featurize", fields(pairs = pairs.len()))]
    pub fn featurize(
        &self,
        pairs: &[StructurePair],
        reporter: &ProgressReporter,
    ) -> Result<DMatrix<f64>, EngineError> {
        if pairs.is_empty() {
            return Ok(DMatrix::zeros(0, 0));
        }
        reporter.report(Progress::PairsStart {
            total: pairs.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = pairs.iter().enumerate();

        #[cfg(feature = "parallel")]
        let iterator = pairs.par_iter().enumerate();

        let rows: Vec<Result<DVector<f64>, EngineError>> = iterator
            .map(|(index, &(a, b))| {
                let b = b.unwrap_or(a);
                let row = global_descriptor(a, b, &self.config);
                reporter.report(Progress::PairDone {
                    index,
                    nodes_a: a.num_nodes(),
                    nodes_b: b.num_nodes(),
                });
                row
            })
            .collect();

        reporter.report(Progress::PairsFinish);
        let rows = rows.into_iter().collect::<Result<Vec<_>, _>>()?;
        stack_rows(&rows)
    }

    /// Featurizes `pairs` and fits the configured projection on the result.
    ///
    /// A projection that cannot be fitted is not an error: it is logged and reported
    /// as [`FitOutcome::Degraded`], and later transforms return raw descriptors.
    #[instrument(skip_all, name = "pipeline_fit")]
    pub fn fit(
        &mut self,
        pairs: &[StructurePair],
        reporter: &ProgressReporter,
    ) -> Result<FitOutcome, EngineError> {
        reporter.report(Progress::StageStart { name: "Fit" });
        let features = self.featurize(pairs, reporter)?;
        let outcome = self.fit_features(&features, reporter);
        reporter.report(Progress::StageFinish);
        Ok(outcome)
    }

    /// Featurizes `pairs` and applies the fitted projection, if any.
    ///
    /// An empty pair list yields a `0 × 0` matrix.
    ///
    /// # Errors
    ///
    /// Returns an error for descriptors of differing widths, or when the descriptor
    /// width differs from the one the projection was fitted on.
    #[instrument(skip_all, name = "pipeline_transform")]
    pub fn transform(
        &self,
        pairs: &[StructurePair],
        reporter: &ProgressReporter,
    ) -> Result<DMatrix<f64>, EngineError> {
        reporter.report(Progress::StageStart { name: "Transform" });
        let features = self.featurize(pairs, reporter)?;
        let projected = self.project(features)?;
        reporter.report(Progress::StageFinish);
        Ok(projected)
    }

    /// Fits on `pairs` and transforms the same pairs, featurizing them only once.
    #[instrument(skip_all, name = "pipeline_fit_transform")]
    pub fn fit_transform(
        &mut self,
        pairs: &[StructurePair],
        reporter: &ProgressReporter,
    ) -> Result<(DMatrix<f64>, FitOutcome), EngineError> {
        reporter.report(Progress::StageStart {
            name: "Fit & transform",
        });
        let features = self.featurize(pairs, reporter)?;
        let outcome = self.fit_features(&features, reporter);
        let projected = self.project(features)?;
        reporter.report(Progress::StageFinish);
        Ok((projected, outcome))
    }

    fn fit_features(
        &mut self,
        features: &DMatrix<f64>,
        reporter: &ProgressReporter,
    ) -> FitOutcome {
        self.state = ProjectionState::NoProjection;
        let Projection::Pca(projector) = &self.projection else {
            return FitOutcome::Unprojected;
        };

        match projector.fit(features) {
            Ok(fitted) => {
                let components = fitted.n_components();
                info!(
                    components,
                    samples = features.nrows(),
                    features = features.ncols(),
                    "PCA projection fitted."
                );
                self.state = ProjectionState::Fitted(fitted);
                FitOutcome::Projected { components }
            }
            Err(e) => {
                warn!(
                    samples = features.nrows(),
                    features = features.ncols(),
                    "PCA fit failed, descriptors will be returned unprojected: {}",
                    e
                );
                let reason = e.to_string();
                reporter.report(Progress::ProjectionDegraded {
                    reason: reason.clone(),
                });
                FitOutcome::Degraded { reason }
            }
        }
    }

    fn project(&self, features: DMatrix<f64>) -> Result<DMatrix<f64>, EngineError> {
        match &self.state {
            _ if features.nrows() == 0 => Ok(features),
            ProjectionState::NoProjection => Ok(features),
            ProjectionState::Fitted(pca) => Ok(pca.transform(&features)?),
        }
    }
}

/// Stacks descriptors into rows. A pair with an empty structure has a length-0
/// descriptor and becomes an all-zero row of the common width.
fn stack_rows(rows: &[DVector<f64>]) -> Result<DMatrix<f64>, EngineError> {
    let width = rows.iter().map(|r| r.len()).find(|&len| len > 0).unwrap_or(0);
    if let Some((pair, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, r)| !r.is_empty() && r.len() != width)
    {
        return Err(EngineError::FeatureWidthMismatch {
            pair,
            expected: width,
            found: row.len(),
        });
    }

    let empty = rows.iter().filter(|r| r.is_empty()).count();
    if empty > 0 && width > 0 {
        debug!(pairs = empty, width, "Padding descriptors of empty structures with zeros.");
    }
    debug!(rows = rows.len(), width, "Stacking descriptors.");
    Ok(DMatrix::from_fn(rows.len(), width, |i, j| {
        rows[i].get(j).copied().unwrap_or(0.0)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::builder::StructureBuilder;
    use crate::core::models::node::Node;
    use crate::engine::config::MgliConfigBuilder;
    use nalgebra::Point3;
    use std::sync::Mutex;

    fn chain(name: &str, element: &str, points: &[[f64; 3]]) -> Structure {
        let mut builder = StructureBuilder::new(name);
        for (i, p) in points.iter().enumerate() {
            builder.add_node(Node::new(i, Point3::from(*p), element));
            if i > 0 {
                builder.add_bond(i - 1, i);
            }
        }
        builder.build().unwrap()
    }

    fn twisted(offset: f64) -> Structure {
        chain(
            "twisted",
            "C",
            &[
                [0.0, 0.0, 0.0],
                [1.5, 0.2 + offset, 0.3],
                [2.1, 1.4, -0.5 * offset],
                [1.0, 2.2 + offset, 1.1],
            ],
        )
    }

    fn partner() -> Structure {
        chain("partner", "C", &[[0.5, -1.0, 1.0], [0.7, 1.0, 1.2], [1.9, 1.5, 2.0]])
    }

    #[test]
    fn empty_pair_list_yields_empty_matrix() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let mut pipeline = MgliPipeline::new(config, Projection::Pca(PcaProjector::new(2, true)));
        let reporter = ProgressReporter::new();
        assert_eq!(pipeline.transform(&[], &reporter).unwrap().shape(), (0, 0));
        let (x, _) = pipeline.fit_transform(&[], &reporter).unwrap();
        assert_eq!(x.shape(), (0, 0));
    }

    #[test]
    fn rows_follow_input_order() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let pipeline = MgliPipeline::new(config.clone(), Projection::None);
        let (s0, s1, p) = (twisted(0.0), twisted(0.4), partner());
        let pairs: Vec<StructurePair> = vec![(&s0, Some(&p)), (&s1, Some(&p)), (&s0, Some(&p))];

        let x = pipeline.transform(&pairs, &ProgressReporter::new()).unwrap();

        assert_eq!(x.nrows(), 3);
        let d1 = global_descriptor(&s1, &p, &config).unwrap();
        assert_eq!(x.row(1).transpose(), d1);
        assert_eq!(x.row(0), x.row(2));
    }

    #[test]
    fn missing_partner_links_structure_with_itself() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let pipeline = MgliPipeline::new(config.clone(), Projection::None);
        let s = twisted(0.2);
        let x = pipeline.transform(&[(&s, None)], &ProgressReporter::new()).unwrap();
        let expected = global_descriptor(&s, &s, &config).unwrap();
        assert_eq!(x.row(0).transpose(), expected);
    }

    #[test]
    fn differing_group_sets_without_vocabulary_are_rejected() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let pipeline = MgliPipeline::new(config, Projection::None);
        let carbon = partner();
        let nitrogen = chain("n", "N", &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
        let mixed = {
            let mut b = StructureBuilder::new("mixed");
            b.add_node(Node::new(0, Point3::origin(), "C"))
                .add_node(Node::new(1, Point3::new(1.0, 0.0, 0.0), "O"))
                .add_bond(0, 1);
            b.build().unwrap()
        };
        let pairs: Vec<StructurePair> = vec![(&carbon, Some(&nitrogen)), (&mixed, Some(&nitrogen))];
        let err = pipeline.transform(&pairs, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::FeatureWidthMismatch {
                pair: 1,
                expected: 20,
                found: 40
            }
        ));
    }

    #[test]
    fn empty_structures_become_zero_rows_in_a_batch() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let pipeline = MgliPipeline::new(config.clone(), Projection::None);
        let (s, p) = (twisted(0.0), partner());
        let empty = StructureBuilder::new("empty").build().unwrap();
        let pairs: Vec<StructurePair> =
            vec![(&s, Some(&p)), (&empty, Some(&p)), (&p, Some(&empty)), (&empty, None)];

        let x = pipeline.transform(&pairs, &ProgressReporter::new()).unwrap();

        assert_eq!(x.shape(), (4, 20));
        assert_eq!(x.row(0).transpose(), global_descriptor(&s, &p, &config).unwrap());
        for i in 1..4 {
            assert!(x.row(i).iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn batch_of_only_empty_structures_has_zero_width() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let pipeline = MgliPipeline::new(config, Projection::None);
        let empty = StructureBuilder::new("empty").build().unwrap();
        let pairs: Vec<StructurePair> = vec![(&empty, None), (&empty, None)];
        let x = pipeline.transform(&pairs, &ProgressReporter::new()).unwrap();
        assert_eq!(x.shape(), (2, 0));
    }

    #[test]
    fn vocabularies_make_descriptors_stackable() {
        let config = MgliConfigBuilder::new()
            .groups_a(vec!["C".into(), "O".into()])
            .groups_b(vec!["N".into()])
            .build()
            .unwrap();
        let pipeline = MgliPipeline::new(config, Projection::None);
        let carbon = partner();
        let nitrogen = chain("n", "N", &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
        let pairs: Vec<StructurePair> = vec![(&carbon, Some(&nitrogen)), (&nitrogen, Some(&nitrogen))];
        let x = pipeline.transform(&pairs, &ProgressReporter::new()).unwrap();
        assert_eq!(x.shape(), (2, 40));
    }

    #[test]
    fn fit_without_projection_is_unprojected() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let mut pipeline = MgliPipeline::new(config, Projection::None);
        let (s, p) = (twisted(0.0), partner());
        let outcome = pipeline.fit(&[(&s, Some(&p))], &ProgressReporter::new()).unwrap();
        assert_eq!(outcome, FitOutcome::Unprojected);
        assert_eq!(pipeline.state(), &ProjectionState::NoProjection);
    }

    #[test]
    fn pca_fit_degrades_with_too_few_samples() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let mut pipeline =
            MgliPipeline::new(config.clone(), Projection::Pca(PcaProjector::new(256, true)));
        let (s, p) = (twisted(0.0), partner());
        let pairs: Vec<StructurePair> = vec![(&s, Some(&p))];
        let reasons = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::ProjectionDegraded { reason } = event {
                reasons.lock().unwrap().push(reason);
            }
        }));

        let (x, outcome) = pipeline.fit_transform(&pairs, &reporter).unwrap();
        drop(reporter);

        let FitOutcome::Degraded { reason } = outcome else {
            panic!("expected a degraded fit, got {outcome:?}");
        };
        assert_eq!(reasons.into_inner().unwrap(), vec![reason]);
        assert_eq!(x.shape(), (1, 20));
        assert_eq!(x.row(0).transpose(), global_descriptor(&s, &p, &config).unwrap());
    }

    #[test]
    fn pca_projects_onto_requested_components() {
        let config = MgliConfigBuilder::new()
            .rbf(vec![1.0, 2.0, 3.0], None)
            .signed(true)
            .build()
            .unwrap();
        let mut pipeline = MgliPipeline::new(config, Projection::Pca(PcaProjector::new(2, false)));
        let structures: Vec<Structure> = (0..5).map(|i| twisted(0.15 * i as f64)).collect();
        let p = partner();
        let pairs: Vec<StructurePair> = structures.iter().map(|s| (s, Some(&p))).collect();
        let reporter = ProgressReporter::new();

        let outcome = pipeline.fit(&pairs, &reporter).unwrap();
        assert_eq!(outcome, FitOutcome::Projected { components: 2 });
        let x = pipeline.transform(&pairs, &reporter).unwrap();
        assert_eq!(x.shape(), (5, 2));
        // Scores of the training set are centred.
        for column in x.column_iter() {
            assert!(column.sum().abs() < 1e-9);
        }
    }

    #[test]
    fn reporter_sees_every_pair() {
        let config = MgliConfigBuilder::new().build().unwrap();
        let pipeline = MgliPipeline::new(config, Projection::None);
        let (s, p) = (twisted(0.0), partner());
        let done = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PairDone {
                index,
                nodes_a,
                nodes_b,
            } = event
            {
                done.lock().unwrap().push((index, nodes_a, nodes_b));
            }
        }));
        let pairs: Vec<StructurePair> = vec![(&s, Some(&p)), (&p, None), (&s, Some(&p)), (&s, None)];
        pipeline.transform(&pairs, &reporter).unwrap();
        drop(reporter);

        let mut done = done.into_inner().unwrap();
        done.sort_unstable();
        assert_eq!(done, vec![(0, 4, 3), (1, 3, 3), (2, 4, 3), (3, 4, 4)]);
    }
}
