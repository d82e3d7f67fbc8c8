use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use kira_celltyper::error::{ReferenceError, RunError};
use kira_celltyper::input::labels::load_labels;
use kira_celltyper::input::normalize::normalize_cp10k;
use kira_celltyper::input::{InputError, load_tenx};
use kira_celltyper::logging;
use kira_celltyper::model::config::{
    ClassifierConfig, CorrelationMethod, ProfileScale, ProfileWeighting,
};
use kira_celltyper::model::matrix::ExpressionMatrix;
use kira_celltyper::model::reference::ReferenceBundle;
use kira_celltyper::pipeline::build_reference;
use kira_celltyper::pipeline::stage1_profiles::ReferenceSet;
use kira_celltyper::pipeline::stage3_flat::run_flat;
use kira_celltyper::pipeline::stage5_hierarchy::run_hierarchical;
use kira_celltyper::pipeline::stage7_report::{ReportInput, ScoreCache, write_reports};
use kira_celltyper::pipeline::workers::CancelToken;

#[derive(Parser)]
#[command(name = "kira-celltyper")]
#[command(about = "Reference-based cell type annotation for 10x scRNA-seq matrices")]
#[command(version)]
struct Cli {
    /// Debug-level logging unless RUST_LOG is set.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build a reference bundle from labelled 10x matrices")]
    Build(BuildArgs),
    #[command(about = "Classify the cells of a 10x matrix against reference bundles")]
    Classify(ClassifyArgs),
    #[command(about = "Re-threshold a saved score table without recomputing scores")]
    Relabel(RelabelArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// 10x directory; repeat together with --labels for several batches.
    #[arg(long, required = true)]
    reference: Vec<PathBuf>,

    /// Label table per --reference, in the same order.
    #[arg(long, required = true)]
    labels: Vec<PathBuf>,

    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    label_column: Option<String>,

    #[arg(long)]
    normalize: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Flat,
    Hierarchical,
    Both,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Reference bundle; flat calls are made against each, hierarchical against the first.
    #[arg(long, required = true)]
    bundle: Vec<PathBuf>,

    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Both)]
    mode: Mode,

    #[arg(long)]
    normalize: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct RelabelArgs {
    #[arg(long)]
    bundle: PathBuf,

    #[arg(long)]
    scores: PathBuf,

    #[arg(long)]
    threshold: f32,

    #[arg(long)]
    out: PathBuf,
}

/// Command-line overrides applied on top of `--config` (or the defaults).
#[derive(Args, Default)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    method: Option<CorrelationMethod>,

    #[arg(long)]
    n_genes: Option<usize>,

    #[arg(long)]
    threshold: Option<f32>,

    #[arg(long)]
    no_fine_tune: bool,

    #[arg(long)]
    min_shared_genes: Option<usize>,

    #[arg(long, value_enum)]
    scale: Option<ProfileScale>,

    #[arg(long, value_enum)]
    weighting: Option<ProfileWeighting>,

    /// Worker threads; 0 uses every core.
    #[arg(long)]
    threads: Option<usize>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<ClassifierConfig, ReferenceError> {
        let mut config = match &self.config {
            Some(path) => ClassifierConfig::load(path)?,
            None => ClassifierConfig::default(),
        };
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(n) = self.n_genes {
            config.n_genes = n;
        }
        if let Some(t) = self.threshold {
            config.threshold = t;
        }
        if self.no_fine_tune {
            config.fine_tune = false;
        }
        if let Some(n) = self.min_shared_genes {
            config.min_shared_genes = n;
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        if let Some(weighting) = self.weighting {
            config.weighting = weighting;
        }
        if let Some(threads) = self.threads {
            config.workers = threads;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Build(args) => run_build(&args),
        Commands::Classify(args) => run_classify(&args),
        Commands::Relabel(args) => run_relabel(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn load_matrix(dir: &Path, normalize: bool) -> Result<ExpressionMatrix, InputError> {
    let matrix = load_tenx(dir)?;
    Ok(if normalize {
        normalize_cp10k(&matrix)
    } else {
        matrix
    })
}

fn run_build(args: &BuildArgs) -> Result<(), CliError> {
    if args.reference.len() != args.labels.len() {
        return Err(CliError::Usage(format!(
            "{} --reference directories but {} --labels tables",
            args.reference.len(),
            args.labels.len()
        )));
    }
    let config = args.config.resolve()?;

    let mut matrices = Vec::with_capacity(args.reference.len());
    let mut label_tables = Vec::with_capacity(args.labels.len());
    for (dir, labels) in args.reference.iter().zip(&args.labels) {
        matrices.push(load_matrix(dir, args.normalize)?);
        label_tables.push(load_labels(labels, args.label_column.as_deref())?);
    }
    let sets: Vec<ReferenceSet<'_>> = matrices
        .iter()
        .zip(&label_tables)
        .map(|(matrix, labels)| ReferenceSet { matrix, labels })
        .collect();

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .out
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reference".to_string()),
    };
    let bundle = build_reference(&name, &sets, &config)?;
    bundle.save(&args.out)?;
    tracing::info!(
        name = %bundle.name,
        types = bundle.profiles.len(),
        genes = bundle.profiles.n_genes(),
        nodes = bundle.taxonomy.len(),
        "reference bundle written to {}",
        args.out.display()
    );
    Ok(())
}

fn run_classify(args: &ClassifyArgs) -> Result<(), CliError> {
    let config = args.config.resolve()?;
    let bundles = args
        .bundle
        .iter()
        .map(|path| ReferenceBundle::load(path))
        .collect::<Result<Vec<_>, _>>()?;
    let query = load_matrix(&args.input, args.normalize)?;
    let cancel = CancelToken::new();

    let flat = if matches!(args.mode, Mode::Flat | Mode::Both) {
        bundles
            .iter()
            .map(|b| run_flat(&b.name, &b.profiles, &query, &config, &cancel))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    let primary = &bundles[0];
    let hierarchical = if matches!(args.mode, Mode::Hierarchical | Mode::Both) {
        Some(run_hierarchical(
            &primary.name,
            &primary.profiles,
            &primary.taxonomy,
            &query,
            &config,
            &cancel,
        )?)
    } else {
        None
    };

    let query_name = args.input.display().to_string();
    let input = ReportInput {
        query: &query_name,
        n_cells: query.n_cells(),
        normalize: args.normalize,
        config: &config,
        flat: &flat,
        hierarchical: hierarchical.as_ref().map(|h| (h, &primary.taxonomy)),
    };
    write_reports(&input, &args.out)?;
    Ok(())
}

fn run_relabel(args: &RelabelArgs) -> Result<(), CliError> {
    let bundle = ReferenceBundle::load(&args.bundle)?;
    let cache = ScoreCache::load(&args.scores)?;
    let config = cache.config_at(args.threshold);
    config.validate()?;
    if cache.reference != bundle.name {
        tracing::warn!(
            scores = %cache.reference,
            bundle = %bundle.name,
            "score table was computed against a differently named reference"
        );
    }
    let output = cache.relabel(&bundle.taxonomy, args.threshold)?;

    let scores_name = args.scores.display().to_string();
    let input = ReportInput {
        query: &scores_name,
        n_cells: output.cells.len(),
        normalize: false,
        config: &config,
        flat: &[],
        hierarchical: Some((&output, &bundle.taxonomy)),
    };
    write_reports(&input, &args.out)?;
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
