use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "GaussBio3D contributors",
    version,
    about = "GaussBio3D CLI - multiscale Gauss linking integral descriptors for pairs of 3D molecular structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute global, per-node and pairwise descriptors for one structure pair.
    Compute(ComputeArgs),
    /// Featurize many structure pairs listed in a manifest, with optional PCA.
    Batch(BatchArgs),
}

/// Built-in configuration bundles.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Protein-ligand interaction descriptors (bins 3-15 Å, PCA in batch mode).
    Dti,
    /// Protein flexibility descriptors (1 Å bins from 5 to 27 Å, self-linking).
    Flexibility,
}

/// Descriptor configuration shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Start from a built-in preset; the config file and other flags override it.
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Override the hard distance-bin edges (comma separated, in Å).
    #[arg(long, value_name = "EDGES", value_delimiter = ',', conflicts_with = "rbf_centers")]
    pub bins: Option<Vec<f64>>,

    /// Use Gaussian RBF scales with these centers (comma separated, in Å).
    #[arg(long, value_name = "CENTERS", value_delimiter = ',')]
    pub rbf_centers: Option<Vec<f64>>,

    /// Width of the RBF scales; derived from the center spacing if omitted.
    #[arg(long, value_name = "FLOAT", requires = "rbf_centers")]
    pub sigma: Option<f64>,

    /// Override the pooling statistics (comma separated: sum,mean,max,min,median,std).
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub stats: Option<Vec<String>>,

    /// Override the group mode of structure A (element, residue_class, custom).
    #[arg(long, value_name = "MODE")]
    pub group_mode_a: Option<String>,

    /// Override the group mode of structure B (element, residue_class, custom).
    #[arg(long, value_name = "MODE")]
    pub group_mode_b: Option<String>,

    /// Override `linking.signed` from the config file.
    #[command(flatten)]
    pub signed: SignedFlags,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S pooling.stats=sum,std
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// A group to handle mutually exclusive flags for the linking sign.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct SignedFlags {
    /// Keep the orientation sign of each linking integral.
    #[arg(long)]
    pub signed: bool,
    /// Use absolute linking integrals.
    #[arg(long)]
    pub unsigned: bool,
}

/// Arguments for the `compute` subcommand.
#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// Path to structure A (SDF/MOL or BGF).
    #[arg(short = 'a', long = "structure-a", required = true, value_name = "PATH")]
    pub structure_a: PathBuf,

    /// Path to structure B. Structure A is linked with itself if omitted.
    #[arg(short = 'b', long = "structure-b", value_name = "PATH")]
    pub structure_b: Option<PathBuf>,

    /// Directory receiving the CSV arrays and `summary.json`.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the `batch` subcommand.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// CSV manifest with `structure_a` and optional `structure_b` columns.
    /// Relative paths are resolved against the manifest's directory.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub manifest: PathBuf,

    /// Path for the stacked feature matrix (CSV). A JSON summary with the same file
    /// stem is written next to it.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub projection: ProjectionArgs,
}

/// Projection overrides for batch featurization.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ProjectionArgs {
    /// Fit a PCA with this many components on the batch.
    #[arg(long, value_name = "INT", conflicts_with = "no_projection")]
    pub pca: Option<usize>,

    /// Do not whiten PCA scores.
    #[arg(long)]
    pub no_whiten: bool,

    /// Disable any projection, even one set by a preset or the config file.
    #[arg(long)]
    pub no_projection: bool,
}
