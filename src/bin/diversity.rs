//! diversity - microbiome diversity analysis CLI
//!
//! Loads a feature table (and optional metadata / configuration), runs one
//! analysis and prints the `{data, visualization_spec}` response as JSON.

use clap::{Args, Parser, Subcommand};
use microbiome_diversity::alpha::AlphaMetric;
use microbiome_diversity::beta::{DistanceMatrix, DistanceMetric};
use microbiome_diversity::config::EngineConfig;
use microbiome_diversity::data::{FeatureTable, Metadata};
use microbiome_diversity::engine::{
    run_precomputed, run_request, AnalysisRequest, AnalysisResponse, RequestBatch,
};
use microbiome_diversity::error::{DiversityError, Result};
use microbiome_diversity::taxonomy::TaxonomicRank;
use microbiome_diversity::test::TestKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Microbiome diversity analysis
#[derive(Parser)]
#[command(name = "diversity")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every analysis command.
#[derive(Args)]
struct Inputs {
    /// Path to feature table TSV (features as rows, samples as columns)
    #[arg(short = 't', long)]
    table: PathBuf,

    /// Path to sample metadata TSV
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Path to engine configuration YAML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the JSON response here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Alpha diversity per sample, optionally compared between groups
    Alpha {
        #[command(flatten)]
        inputs: Inputs,

        /// Metric: shannon, simpson, observed, chao1
        #[arg(long, default_value = "shannon")]
        metric: String,

        /// Metadata column to compare groups by
        #[arg(short, long)]
        group: Option<String>,

        /// Test: kruskal_wallis or mann_whitney
        #[arg(long)]
        test: Option<String>,
    },

    /// Beta diversity distances and PCoA
    Beta {
        #[command(flatten)]
        inputs: Inputs,

        /// Metric: bray_curtis or jaccard
        #[arg(long, default_value = "bray_curtis")]
        metric: String,

        /// Number of ordination axes (2 or 3)
        #[arg(long, default_value = "2")]
        axes: usize,

        /// Metadata column used to colour samples
        #[arg(short, long)]
        group: Option<String>,
    },

    /// PCoA of a precomputed distance matrix TSV
    Ordination {
        /// Path to a square distance matrix TSV
        #[arg(short, long)]
        distances: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Path to engine configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the JSON response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of ordination axes (2 or 3)
        #[arg(long, default_value = "2")]
        axes: usize,

        /// Metadata column used to colour samples
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Pairwise distance matrix only
    Distances {
        #[command(flatten)]
        inputs: Inputs,

        /// Metric: bray_curtis or jaccard
        #[arg(long, default_value = "bray_curtis")]
        metric: String,
    },

    /// Rarefaction curves and recommended sequencing depth
    Rarefaction {
        #[command(flatten)]
        inputs: Inputs,

        /// Comma-separated depths (default: geometric progression)
        #[arg(long, value_delimiter = ',')]
        depths: Option<Vec<u64>>,
    },

    /// Compare per-sample values from a two-column TSV between groups
    Compare {
        #[command(flatten)]
        inputs: Inputs,

        /// TSV with sample id and value columns
        #[arg(long)]
        values: PathBuf,

        /// Metadata column with group labels
        #[arg(short, long)]
        group: String,

        /// Test: kruskal_wallis or mann_whitney
        #[arg(long, default_value = "kruskal_wallis")]
        test: String,
    },

    /// Taxonomic composition from the table's taxonomy column
    Taxonomy {
        #[command(flatten)]
        inputs: Inputs,

        /// Rank: kingdom, phylum, class, order, family, genus, species
        #[arg(long, default_value = "phylum")]
        rank: String,

        /// Number of taxa to keep
        #[arg(long, default_value = "10")]
        top_n: usize,

        /// Per-sample stacked composition instead of a summary
        #[arg(long)]
        per_sample: bool,
    },

    /// Run every request of a YAML batch file
    Run {
        #[command(flatten)]
        inputs: Inputs,

        /// Path to request batch YAML
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Write the default engine configuration as YAML
    Config {
        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Alpha {
            inputs,
            metric,
            group,
            test,
        } => cmd_alpha(&inputs, &metric, group, test.as_deref()),

        Commands::Beta {
            inputs,
            metric,
            axes,
            group,
        } => cmd_analysis(&inputs, || {
            Ok(AnalysisRequest::Beta {
                metric: metric.parse()?,
                axes,
                group_column: group,
            })
        }),

        Commands::Ordination {
            distances,
            metadata,
            config,
            output,
            axes,
            group,
        } => cmd_ordination(
            &distances,
            metadata.as_deref(),
            config.as_deref(),
            output.as_deref(),
            axes,
            group.as_deref(),
        ),

        Commands::Distances { inputs, metric } => cmd_analysis(&inputs, || {
            Ok(AnalysisRequest::Distances {
                metric: metric.parse::<DistanceMetric>()?,
            })
        }),

        Commands::Rarefaction { inputs, depths } => {
            cmd_analysis(&inputs, || Ok(AnalysisRequest::Rarefaction { depths }))
        }

        Commands::Compare {
            inputs,
            values,
            group,
            test,
        } => cmd_analysis(&inputs, || {
            Ok(AnalysisRequest::Compare {
                values: load_values(&values)?,
                group_column: group,
                test: test.parse()?,
            })
        }),

        Commands::Taxonomy {
            inputs,
            rank,
            top_n,
            per_sample,
        } => cmd_analysis(&inputs, || {
            Ok(AnalysisRequest::Taxonomy {
                lineages: None,
                rank: rank.parse::<TaxonomicRank>()?,
                top_n,
                per_sample,
            })
        }),

        Commands::Run { inputs, batch } => cmd_run(&inputs, &batch),

        Commands::Config { output } => cmd_config(output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.kind(), e);
        std::process::exit(1);
    }
}

/// Load the table, attach metadata, and read the configuration.
fn load_inputs(inputs: &Inputs) -> Result<(FeatureTable, EngineConfig)> {
    let mut table = FeatureTable::from_tsv(&inputs.table)?;
    if let Some(path) = &inputs.metadata {
        table = table.with_metadata(Metadata::from_tsv(path)?)?;
    }
    let config = load_config(inputs.config.as_deref())?;
    info!(
        n_samples = table.n_samples(),
        n_features = table.n_features(),
        "loaded feature table"
    );
    Ok((table, config))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_yaml(&std::fs::read_to_string(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn write_output(output: Option<&Path>, json: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = %path.display(), "wrote response");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_analysis<F>(inputs: &Inputs, build: F) -> Result<()>
where
    F: FnOnce() -> Result<AnalysisRequest>,
{
    let request = build()?;
    let (table, config) = load_inputs(inputs)?;
    let response: AnalysisResponse = run_request(&table, &request, &config)?;
    write_output(inputs.output.as_deref(), &serde_json::to_string_pretty(&response)?)
}

fn cmd_alpha(inputs: &Inputs, metric: &str, group: Option<String>, test: Option<&str>) -> Result<()> {
    let metric: AlphaMetric = metric.parse()?;
    let test = test.map(str::parse::<TestKind>).transpose()?;
    cmd_analysis(inputs, || {
        Ok(AnalysisRequest::Alpha {
            metric,
            group_column: group,
            test,
        })
    })
}

fn cmd_ordination(
    distances: &Path,
    metadata: Option<&Path>,
    config: Option<&Path>,
    output: Option<&Path>,
    axes: usize,
    group: Option<&str>,
) -> Result<()> {
    let matrix = DistanceMatrix::from_tsv(distances)?;
    let metadata = metadata.map(Metadata::from_tsv).transpose()?;
    let config = load_config(config)?;
    info!(n_samples = matrix.len(), "loaded distance matrix");
    let response = run_precomputed(matrix, axes, group, metadata.as_ref(), &config)?;
    write_output(output, &serde_json::to_string_pretty(&response)?)
}

/// Run a batch; failed requests are reported as `{error, kind}` entries.
fn cmd_run(inputs: &Inputs, batch_path: &Path) -> Result<()> {
    let batch = RequestBatch::from_yaml(&std::fs::read_to_string(batch_path)?)?;
    let (table, config) = load_inputs(inputs)?;
    info!(batch = %batch.name, n_requests = batch.requests.len(), "running batch");

    let entries: Vec<serde_json::Value> = batch
        .run(&table, &config)
        .into_iter()
        .map(|result| match result {
            Ok(response) => serde_json::to_value(response).map_err(DiversityError::from),
            Err(e) => Ok(serde_json::json!({ "error": e.to_string(), "kind": e.kind() })),
        })
        .collect::<Result<_>>()?;

    let failed = entries.iter().filter(|e| e.get("error").is_some()).count();
    if failed > 0 {
        warn!(failed, total = entries.len(), "some requests failed");
    }
    write_output(inputs.output.as_deref(), &serde_json::to_string_pretty(&entries)?)
}

fn cmd_config(output: Option<&Path>) -> Result<()> {
    let yaml = EngineConfig::default().to_yaml()?;
    match output {
        Some(path) => {
            std::fs::write(path, &yaml)?;
            info!(path = %path.display(), "wrote default configuration");
        }
        None => println!("{}", yaml),
    }
    Ok(())
}

/// Read `sample<TAB>value` rows; a non-numeric first row is treated as a header.
fn load_values(path: &Path) -> Result<BTreeMap<String, f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    let mut values = BTreeMap::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let sample = record.get(0).unwrap_or("").trim();
        let raw = record.get(1).unwrap_or("").trim();
        match raw.parse::<f64>() {
            Ok(v) => {
                values.insert(sample.to_string(), v);
            }
            Err(_) if i == 0 => continue,
            Err(_) => {
                return Err(DiversityError::MalformedInput(format!(
                    "Invalid value '{}' for sample '{}'",
                    raw, sample
                )));
            }
        }
    }
    Ok(values)
}
