use crate::core::grouping::{GroupMode, ParseGroupModeError};
use crate::core::linking::pairwise::{Aggregation, ParseAggregationError};
use crate::core::scale::{ScaleError, ScaleScheme, Scales};
use crate::core::stats::{ParseStatisticError, Statistic};
use thiserror::Error;

pub const DEFAULT_DISTANCE_BINS: [f64; 5] = [0.0, 3.0, 6.0, 10.0, 20.0];
pub const DEFAULT_STATS: [Statistic; 5] = [
    Statistic::Sum,
    Statistic::Mean,
    Statistic::Max,
    Statistic::Min,
    Statistic::Median,
];

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid scale scheme: {0}")]
    Scale(#[from] ScaleError),
    #[error("At least one pooling statistic is required")]
    NoStatistics,
    #[error("Unknown statistic: {0}")]
    UnknownStatistic(String),
    #[error("Unknown group mode: {0}")]
    UnknownGroupMode(String),
    #[error("Unknown aggregation mode: {0}")]
    UnknownAggregation(String),
    #[error("Group vocabulary for side {side} is empty")]
    EmptyVocabulary { side: char },
    #[error("Group vocabulary for side {side} lists '{label}' more than once")]
    DuplicateGroupLabel { side: char, label: String },
    #[error("Maximum distance must be finite and positive, got {0}")]
    InvalidMaxDistance(f64),
}

impl From<ParseStatisticError> for ConfigError {
    fn from(err: ParseStatisticError) -> Self {
        ConfigError::UnknownStatistic(err.to_string())
    }
}

impl From<ParseAggregationError> for ConfigError {
    fn from(err: ParseAggregationError) -> Self {
        ConfigError::UnknownAggregation(err.to_string())
    }
}

impl From<ParseGroupModeError> for ConfigError {
    fn from(err: ParseGroupModeError) -> Self {
        ConfigError::UnknownGroupMode(err.to_string())
    }
}

/// Parses a list of statistic names, failing on the first unknown one.
pub fn parse_statistics<S: AsRef<str>>(names: &[S]) -> Result<Vec<Statistic>, ConfigError> {
    names
        .iter()
        .map(|n| n.as_ref().parse::<Statistic>().map_err(ConfigError::from))
        .collect()
}

pub fn parse_aggregation(name: &str) -> Result<Aggregation, ConfigError> {
    Ok(name.parse::<Aggregation>()?)
}

/// Immutable parameters of one descriptor computation.
///
/// Only obtainable through [`MgliConfigBuilder`], so every instance is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct MgliConfig {
    pub scales: Scales,
    pub signed: bool,
    pub aggregation: Aggregation,
    pub stats: Vec<Statistic>,
    pub group_mode_a: GroupMode,
    pub group_mode_b: GroupMode,
    pub groups_a: Option<Vec<String>>,
    pub groups_b: Option<Vec<String>>,
    /// Carried for presets and reporting; the kernel never applies it.
    pub max_distance: Option<f64>,
}

impl MgliConfig {
    pub fn num_scales(&self) -> usize {
        self.scales.num_scales()
    }

    pub fn num_stats(&self) -> usize {
        self.stats.len()
    }
}

#[derive(Debug, Clone)]
enum ScaleSpec {
    Bins(Vec<f64>),
    Rbf {
        centers: Vec<f64>,
        sigma: Option<f64>,
    },
    Ready(Scales),
}

#[derive(Default)]
pub struct MgliConfigBuilder {
    scales: Option<ScaleSpec>,
    signed: Option<bool>,
    aggregation: Option<Aggregation>,
    stats: Option<Vec<Statistic>>,
    group_mode_a: Option<GroupMode>,
    group_mode_b: Option<GroupMode>,
    groups_a: Option<Vec<String>>,
    groups_b: Option<Vec<String>>,
    max_distance: Option<f64>,
}

impl MgliConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance_bins(mut self, edges: Vec<f64>) -> Self {
        self.scales = Some(ScaleSpec::Bins(edges));
        self
    }
    pub fn rbf(mut self, centers: Vec<f64>, sigma: Option<f64>) -> Self {
        self.scales = Some(ScaleSpec::Rbf { centers, sigma });
        self
    }
    pub fn scales(mut self, scales: Scales) -> Self {
        self.scales = Some(ScaleSpec::Ready(scales));
        self
    }
    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = Some(signed);
        self
    }
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }
    pub fn stats(mut self, stats: Vec<Statistic>) -> Self {
        self.stats = Some(stats);
        self
    }
    pub fn group_mode_a(mut self, mode: GroupMode) -> Self {
        self.group_mode_a = Some(mode);
        self
    }
    pub fn group_mode_b(mut self, mode: GroupMode) -> Self {
        self.group_mode_b = Some(mode);
        self
    }
    pub fn groups_a(mut self, labels: Vec<String>) -> Self {
        self.groups_a = Some(labels);
        self
    }
    pub fn groups_b(mut self, labels: Vec<String>) -> Self {
        self.groups_b = Some(labels);
        self
    }
    pub fn max_distance(mut self, distance: f64) -> Self {
        self.max_distance = Some(distance);
        self
    }

    /// Validates every parameter and produces the configuration.
    ///
    /// Unset parameters take the defaults: bins `[0, 3, 6, 10, 20]`, unsigned, `sum`
    /// aggregation, statistics `[sum, mean, max, min, median]`, element grouping on
    /// both sides, no vocabularies and no distance cutoff.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid scale scheme, an empty statistic list,
    /// an empty or repeating group vocabulary, or a non-positive maximum distance.
    pub fn build(self) -> Result<MgliConfig, ConfigError> {
        let scales = match self
            .scales
            .unwrap_or_else(|| ScaleSpec::Bins(DEFAULT_DISTANCE_BINS.to_vec()))
        {
            ScaleSpec::Bins(edges) => Scales::bins(edges)?,
            ScaleSpec::Rbf { centers, sigma } => Scales::rbf(centers, sigma)?,
            ScaleSpec::Ready(scales) => scales,
        };

        let stats = self.stats.unwrap_or_else(|| DEFAULT_STATS.to_vec());
        if stats.is_empty() {
            return Err(ConfigError::NoStatistics);
        }

        if let Some(vocab) = &self.groups_a {
            validate_vocabulary(vocab, 'A')?;
        }
        if let Some(vocab) = &self.groups_b {
            validate_vocabulary(vocab, 'B')?;
        }

        if let Some(d) = self.max_distance {
            if !d.is_finite() || d <= 0.0 {
                return Err(ConfigError::InvalidMaxDistance(d));
            }
        }

        Ok(MgliConfig {
            scales,
            signed: self.signed.unwrap_or(false),
            aggregation: self.aggregation.unwrap_or_default(),
            stats,
            group_mode_a: self.group_mode_a.unwrap_or_default(),
            group_mode_b: self.group_mode_b.unwrap_or_default(),
            groups_a: self.groups_a,
            groups_b: self.groups_b,
            max_distance: self.max_distance,
        })
    }
}

fn validate_vocabulary(vocab: &[String], side: char) -> Result<(), ConfigError> {
    if vocab.is_empty() {
        return Err(ConfigError::EmptyVocabulary { side });
    }
    for (i, label) in vocab.iter().enumerate() {
        if vocab[..i].contains(label) {
            return Err(ConfigError::DuplicateGroupLabel {
                side,
                label: label.clone(),
            });
        }
    }
    Ok(())
}
