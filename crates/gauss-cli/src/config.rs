use crate::cli::{ConfigArgs, Preset, ProjectionArgs};
use crate::error::{CliError, Result};
use gaussbio3d::core::grouping::GroupMode;
use gaussbio3d::core::scale::Scales;
use gaussbio3d::engine::config::{self as core_config, MgliConfig, MgliConfigBuilder};
use gaussbio3d::workflows::pipeline::Projection;
use gaussbio3d::workflows::presets;
use gaussbio3d::workflows::projection::PcaProjector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type")]
enum PartialScales {
    Bins {
        edges: Vec<f64>,
    },
    Rbf {
        centers: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sigma: Option<f64>,
    },
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
struct PartialLinkingConfig {
    signed: Option<bool>,
    aggregation: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
struct PartialPoolingConfig {
    stats: Option<Vec<String>>,
    #[serde(rename = "group-mode-a")]
    group_mode_a: Option<String>,
    #[serde(rename = "group-mode-b")]
    group_mode_b: Option<String>,
    #[serde(rename = "groups-a", skip_serializing_if = "Option::is_none")]
    groups_a: Option<Vec<String>>,
    #[serde(rename = "groups-b", skip_serializing_if = "Option::is_none")]
    groups_b: Option<Vec<String>>,
    #[serde(rename = "max-distance", skip_serializing_if = "Option::is_none")]
    max_distance: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type")]
enum PartialProjection {
    None,
    Pca {
        #[serde(rename = "n-components")]
        n_components: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        whiten: Option<bool>,
    },
}

/// A possibly incomplete configuration, as read from a TOML file.
///
/// The same schema is written back into `summary.json`, so a summary's `config`
/// section can be reused as a configuration file.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    scales: Option<PartialScales>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linking: Option<PartialLinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pooling: Option<PartialPoolingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projection: Option<PartialProjection>,
}

/// A validated descriptor configuration plus the projection used by `batch`.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub config: MgliConfig,
    pub projection: Projection,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Describes a complete configuration in the partial schema.
    pub fn describe(config: &MgliConfig, projection: &Projection) -> Self {
        let scales = match &config.scales {
            Scales::Bins(bins) => PartialScales::Bins {
                edges: bins.edges().to_vec(),
            },
            Scales::Rbf(rbf) => PartialScales::Rbf {
                centers: rbf.centers().to_vec(),
                sigma: Some(rbf.sigma()),
            },
        };
        let projection = match projection {
            Projection::None => PartialProjection::None,
            Projection::Pca(pca) => PartialProjection::Pca {
                n_components: pca.n_components,
                whiten: Some(pca.whiten),
            },
        };
        Self {
            scales: Some(scales),
            linking: Some(PartialLinkingConfig {
                signed: Some(config.signed),
                aggregation: Some(config.aggregation.to_string()),
            }),
            pooling: Some(PartialPoolingConfig {
                stats: Some(config.stats.iter().map(|s| s.name().to_string()).collect()),
                group_mode_a: Some(config.group_mode_a.to_string()),
                group_mode_b: Some(config.group_mode_b.to_string()),
                groups_a: config.groups_a.clone(),
                groups_b: config.groups_b.clone(),
                max_distance: config.max_distance,
            }),
            projection: Some(projection),
        }
    }

    pub fn from_preset(preset: Preset) -> Result<Self> {
        let pipeline = match preset {
            Preset::Dti => presets::dti_pipeline(None),
            Preset::Flexibility => presets::flexibility_pipeline(),
        }
        .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(Self::describe(pipeline.config(), pipeline.projection()))
    }

    /// Layers preset, config file, `-S` overrides and flags, in that order.
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let mut partial = match args.preset {
            Some(preset) => {
                debug!("Starting from preset {:?}.", preset);
                Self::from_preset(preset)?
            }
            None => Self::default(),
        };
        if let Some(path) = &args.config {
            partial = partial.overlay(Self::from_file(path)?);
        }
        partial.apply_set_values(&args.set_values)?;
        partial.apply_cli(args);
        Ok(partial)
    }

    /// Returns `self` with every value that `other` sets replaced by `other`'s.
    pub fn overlay(self, other: PartialConfig) -> Self {
        let linking = match (self.linking, other.linking) {
            (Some(base), Some(top)) => Some(PartialLinkingConfig {
                signed: top.signed.or(base.signed),
                aggregation: top.aggregation.or(base.aggregation),
            }),
            (base, top) => top.or(base),
        };
        let pooling = match (self.pooling, other.pooling) {
            (Some(base), Some(top)) => Some(PartialPoolingConfig {
                stats: top.stats.or(base.stats),
                group_mode_a: top.group_mode_a.or(base.group_mode_a),
                group_mode_b: top.group_mode_b.or(base.group_mode_b),
                groups_a: top.groups_a.or(base.groups_a),
                groups_b: top.groups_b.or(base.groups_b),
                max_distance: top.max_distance.or(base.max_distance),
            }),
            (base, top) => top.or(base),
        };
        Self {
            scales: other.scales.or(self.scales),
            linking,
            pooling,
            projection: other.projection.or(self.projection),
        }
    }

    fn linking_mut(&mut self) -> &mut PartialLinkingConfig {
        self.linking.get_or_insert_with(Default::default)
    }

    fn pooling_mut(&mut self) -> &mut PartialPoolingConfig {
        self.pooling.get_or_insert_with(Default::default)
    }

    fn apply_cli(&mut self, args: &ConfigArgs) {
        if let Some(edges) = &args.bins {
            self.scales = Some(PartialScales::Bins {
                edges: edges.clone(),
            });
        }
        if let Some(centers) = &args.rbf_centers {
            self.scales = Some(PartialScales::Rbf {
                centers: centers.clone(),
                sigma: args.sigma,
            });
        }
        if args.signed.signed {
            self.linking_mut().signed = Some(true);
        } else if args.signed.unsigned {
            self.linking_mut().signed = Some(false);
        }
        if let Some(stats) = &args.stats {
            self.pooling_mut().stats = Some(stats.clone());
        }
        if let Some(mode) = &args.group_mode_a {
            self.pooling_mut().group_mode_a = Some(mode.clone());
        }
        if let Some(mode) = &args.group_mode_b {
            self.pooling_mut().group_mode_b = Some(mode.clone());
        }
    }

    pub fn apply_projection_args(&mut self, args: &ProjectionArgs) {
        if args.no_projection {
            self.projection = Some(PartialProjection::None);
            return;
        }
        if let Some(n_components) = args.pca {
            self.projection = Some(PartialProjection::Pca {
                n_components,
                whiten: Some(!args.no_whiten),
            });
        } else if args.no_whiten {
            if let Some(PartialProjection::Pca { whiten, .. }) = &mut self.projection {
                *whiten = Some(false);
            }
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "scales.edges" => {
                    self.scales = Some(PartialScales::Bins {
                        edges: parse_float_list(key, value_str)?,
                    });
                }
                "scales.centers" => {
                    let sigma = match &self.scales {
                        Some(PartialScales::Rbf { sigma, .. }) => *sigma,
                        _ => None,
                    };
                    self.scales = Some(PartialScales::Rbf {
                        centers: parse_float_list(key, value_str)?,
                        sigma,
                    });
                }
                "scales.sigma" => {
                    let value = parse_value(key, value_str, "float")?;
                    match &mut self.scales {
                        Some(PartialScales::Rbf { sigma, .. }) => *sigma = Some(value),
                        _ => {
                            return Err(CliError::Config(
                                "`scales.sigma` requires RBF scales; set `scales.centers` first."
                                    .to_string(),
                            ));
                        }
                    }
                }
                "linking.signed" => {
                    self.linking_mut().signed = Some(parse_value(key, value_str, "boolean")?);
                }
                "linking.aggregation" => {
                    self.linking_mut().aggregation = Some(value_str.to_string());
                }
                "pooling.stats" => {
                    self.pooling_mut().stats = Some(parse_string_list(value_str));
                }
                "pooling.group-mode-a" => {
                    self.pooling_mut().group_mode_a = Some(value_str.to_string());
                }
                "pooling.group-mode-b" => {
                    self.pooling_mut().group_mode_b = Some(value_str.to_string());
                }
                "pooling.groups-a" => {
                    self.pooling_mut().groups_a = Some(parse_string_list(value_str));
                }
                "pooling.groups-b" => {
                    self.pooling_mut().groups_b = Some(parse_string_list(value_str));
                }
                "pooling.max-distance" => {
                    self.pooling_mut().max_distance = Some(parse_value(key, value_str, "float")?);
                }
                "projection.n-components" => {
                    let n_components = parse_value(key, value_str, "integer")?;
                    let whiten = match &self.projection {
                        Some(PartialProjection::Pca { whiten, .. }) => *whiten,
                        _ => None,
                    };
                    self.projection = Some(PartialProjection::Pca {
                        n_components,
                        whiten,
                    });
                }
                "projection.whiten" => {
                    let value = parse_value(key, value_str, "boolean")?;
                    match &mut self.projection {
                        Some(PartialProjection::Pca { whiten, .. }) => *whiten = Some(value),
                        _ => {
                            return Err(CliError::Config(
                                "`projection.whiten` requires a PCA projection; set `projection.n-components` first."
                                    .to_string(),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validates the layered values into a core configuration and projection.
    pub fn resolve(self) -> Result<ResolvedSettings> {
        self.resolve_inner()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn resolve_inner(self) -> std::result::Result<ResolvedSettings, core_config::ConfigError> {
        let mut builder = MgliConfigBuilder::new();

        builder = match self.scales {
            Some(PartialScales::Bins { edges }) => builder.distance_bins(edges),
            Some(PartialScales::Rbf { centers, sigma }) => builder.rbf(centers, sigma),
            None => builder,
        };

        let linking = self.linking.unwrap_or_default();
        if let Some(signed) = linking.signed {
            builder = builder.signed(signed);
        }
        if let Some(name) = &linking.aggregation {
            builder = builder.aggregation(core_config::parse_aggregation(name)?);
        }

        let pooling = self.pooling.unwrap_or_default();
        if let Some(names) = &pooling.stats {
            builder = builder.stats(core_config::parse_statistics(names)?);
        }
        if let Some(mode) = &pooling.group_mode_a {
            builder = builder.group_mode_a(mode.parse::<GroupMode>()?);
        }
        if let Some(mode) = &pooling.group_mode_b {
            builder = builder.group_mode_b(mode.parse::<GroupMode>()?);
        }
        if let Some(labels) = pooling.groups_a {
            builder = builder.groups_a(labels);
        }
        if let Some(labels) = pooling.groups_b {
            builder = builder.groups_b(labels);
        }
        if let Some(distance) = pooling.max_distance {
            builder = builder.max_distance(distance);
        }

        let projection = match self.projection {
            None | Some(PartialProjection::None) => Projection::None,
            Some(PartialProjection::Pca {
                n_components,
                whiten,
            }) => Projection::Pca(PcaProjector::new(n_components, whiten.unwrap_or(true))),
        };

        Ok(ResolvedSettings {
            config: builder.build()?,
            projection,
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn parse_float_list(key: &str, value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_value(key, s, "float"))
        .collect()
}

fn parse_string_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use gaussbio3d::core::linking::Aggregation;
    use gaussbio3d::core::scale::ScaleScheme;
    use gaussbio3d::core::stats::Statistic;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    fn write_config_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn compute_args(extra: &[&str]) -> ConfigArgs {
        let mut argv = vec!["gaussbio3d", "compute", "-a", "a.sdf", "-o", "out"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Compute(args) => args.config,
            Commands::Batch(_) => panic!("expected 'compute' subcommand"),
        }
    }

    #[test]
    fn empty_layers_resolve_to_library_defaults() {
        let settings = PartialConfig::load(&compute_args(&[])).unwrap().resolve().unwrap();
        assert_eq!(settings.config, MgliConfigBuilder::new().build().unwrap());
        assert_eq!(settings.projection, Projection::None);
    }

    #[test]
    fn file_values_are_loaded() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "config.toml",
            r#"
            [scales]
            type = "rbf"
            centers = [2.0, 4.0, 6.0]

            [linking]
            signed = true
            aggregation = "mean"

            [pooling]
            stats = ["sum", "std"]
            group-mode-a = "residue_class"
            groups-b = ["C", "N", "O"]
            max-distance = 12.0
            "#,
        );
        let args = compute_args(&["-c", path.to_str().unwrap()]);
        let settings = PartialConfig::load(&args).unwrap().resolve().unwrap();

        let config = settings.config;
        assert!(config.scales.is_rbf());
        assert_eq!(config.num_scales(), 3);
        assert!(config.signed);
        assert_eq!(config.aggregation, Aggregation::Mean);
        assert_eq!(config.stats, vec![Statistic::Sum, Statistic::Std]);
        assert_eq!(config.group_mode_a, GroupMode::ResidueClass);
        assert_eq!(config.group_mode_b, GroupMode::Element);
        assert_eq!(config.groups_b.as_deref().map(|g| g.len()), Some(3));
        assert_eq!(config.max_distance, Some(12.0));
    }

    #[test]
    fn unknown_fields_in_file_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config_file(&dir, "bad.toml", "[pooling]\nstatistics = [\"sum\"]\n");
        let err = PartialConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn set_values_override_file_and_flags_override_set_values() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "config.toml",
            "[linking]\nsigned = false\n\n[pooling]\nstats = [\"sum\"]\n",
        );
        let args = compute_args(&[
            "-c",
            path.to_str().unwrap(),
            "-S",
            "linking.signed=true",
            "-S",
            "pooling.stats=mean,max",
            "--stats",
            "median",
        ]);
        let config = PartialConfig::load(&args).unwrap().resolve().unwrap().config;
        assert!(config.signed);
        assert_eq!(config.stats, vec![Statistic::Median]);
    }

    #[test]
    fn preset_is_the_lowest_layer() {
        let args = compute_args(&["--preset", "dti", "--bins", "0,5,10"]);
        let settings = PartialConfig::load(&args).unwrap().resolve().unwrap();
        let preset = presets::dti_config().unwrap();
        assert_eq!(settings.config.stats, preset.stats);
        assert_eq!(settings.config.max_distance, preset.max_distance);
        assert_eq!(settings.config.scales.num_scales(), 2);
        assert_eq!(settings.projection, Projection::Pca(PcaProjector::new(256, true)));
    }

    #[test]
    fn described_config_round_trips_through_toml() {
        let settings = PartialConfig::from_preset(Preset::Flexibility)
            .unwrap()
            .resolve()
            .unwrap();
        let described = PartialConfig::describe(&settings.config, &settings.projection);
        let text = toml::to_string(&described).unwrap();
        let reparsed: PartialConfig = toml::from_str(&text).unwrap();
        let again = reparsed.resolve().unwrap();
        assert_eq!(again.config, settings.config);
        assert_eq!(again.projection, Projection::None);
    }

    #[test]
    fn projection_args_override_preset_projection() {
        let mut partial = PartialConfig::from_preset(Preset::Dti).unwrap();
        partial.apply_projection_args(&ProjectionArgs {
            pca: None,
            no_whiten: true,
            no_projection: false,
        });
        assert_eq!(
            partial.clone().resolve().unwrap().projection,
            Projection::Pca(PcaProjector::new(256, false))
        );

        partial.apply_projection_args(&ProjectionArgs {
            pca: Some(4),
            no_whiten: false,
            no_projection: false,
        });
        assert_eq!(
            partial.clone().resolve().unwrap().projection,
            Projection::Pca(PcaProjector::new(4, true))
        );

        partial.apply_projection_args(&ProjectionArgs {
            pca: None,
            no_whiten: false,
            no_projection: true,
        });
        assert_eq!(partial.resolve().unwrap().projection, Projection::None);
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let mut partial = PartialConfig::default();
        for bad in [
            "pooling.stats",
            "pooling.unknown=1",
            "linking.signed=maybe",
            "scales.sigma=1.0",
            "projection.whiten=true",
        ] {
            let err = partial.apply_set_values(&[bad.to_string()]).unwrap_err();
            assert!(matches!(err, CliError::Config(_)), "{bad} was accepted");
        }
    }

    #[test]
    fn set_values_build_rbf_scales_step_by_step() {
        let mut partial = PartialConfig::default();
        partial
            .apply_set_values(&[
                "scales.centers=1,2,3,4".to_string(),
                "scales.sigma=0.5".to_string(),
            ])
            .unwrap();
        let config = partial.resolve().unwrap().config;
        match config.scales {
            Scales::Rbf(rbf) => {
                assert_eq!(rbf.centers(), &[1.0, 2.0, 3.0, 4.0]);
                assert!((rbf.sigma() - 0.5).abs() < 1e-12);
            }
            Scales::Bins(_) => panic!("expected RBF scales"),
        }
    }

    #[test]
    fn invalid_values_surface_as_config_errors() {
        let args = compute_args(&["--bins", "5", "--stats", "sum"]);
        let err = PartialConfig::load(&args).unwrap().resolve().unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("scale")));

        let args = compute_args(&["--group-mode-b", "atom_type"]);
        let err = PartialConfig::load(&args).unwrap().resolve().unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
