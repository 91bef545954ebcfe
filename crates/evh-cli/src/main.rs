//! evh CLI

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use evh_analysis::{Analysis, combine_documents};
use evh_config::{Config, HistogramSetSpec, HistogramSpec};
use evh_root::{JsonSink, MemoryFile, ResultDocument};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "evh")]
#[command(about = "evh - per-entry and simple histograms from event-structured data")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis configuration over one input file
    Run {
        /// Analysis configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Input data (JSON trees). Overrides `InputFilePath`.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Result file (pretty JSON). Overrides `OutputFileName`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a configuration and print what it declares
    Check {
        /// Analysis configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge result files: per-entry means are averaged per file, simple fills are summed
    Combine {
        /// Merged result file
        #[arg(short, long)]
        output: PathBuf,

        /// Result files to merge
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, input, output } => cmd_run(&config, input, output),
        Commands::Check { config, output } => cmd_check(&config, output.as_deref()),
        Commands::Combine { output, inputs } => cmd_combine(&inputs, &output),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("failed to load configuration {}", path.display()))
}

fn cmd_run(config_path: &Path, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let input = match input {
        Some(p) => p,
        // relative to the configuration file, not the working directory
        None if !config.options.input_file_path.is_empty() => {
            config.base_dir().join(&config.options.input_file_path)
        }
        None => bail!("no input file: pass --input or set InputFilePath in {}", config_path.display()),
    };
    let output = output.unwrap_or_else(|| PathBuf::from(&config.options.output_file_name));

    let mut file = MemoryFile::open(&input)
        .with_context(|| format!("failed to read input {}", input.display()))?;
    let mut sink = JsonSink::new(&output);
    let summary = Analysis::new(&config).run(&mut file, &mut sink)?;
    let document = sink.finish().with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        histograms = document.len(),
        "run complete"
    );
    for tree in &summary.trees {
        tracing::debug!(tree = %tree.tree, records = tree.records, "tree summary");
    }
    println!("{} histogram(s) written to {}", summary.histograms(), output.display());
    Ok(())
}

fn spec_json(spec: &HistogramSpec) -> serde_json::Value {
    serde_json::json!({
        "kind": spec.to_kind_string(),
        "name": spec.name(),
        "binning": spec.to_binning_string(),
        "variable": spec.variable(),
        "selection": spec.selection(),
    })
}

fn set_json(set: &HistogramSetSpec) -> serde_json::Value {
    let species: Vec<String> = set.explicit_species.iter().map(ToString::to_string).collect();
    let histograms: Vec<&str> = set.materialized().values().map(|s| s.name()).collect();
    let policy = set.is_dynamic().then_some(set.policy);
    let top_n = set.policy.is_top_n().then_some(set.top_n);
    serde_json::json!({
        "name": set.name(),
        "branch": set.branch,
        "base": spec_json(&set.base),
        "species": species,
        "policy": policy,
        "top_n": top_n,
        "histograms": histograms,
    })
}

fn cmd_check(config_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    let mut trees = serde_json::Map::new();
    for (tree, hists) in config.trees() {
        if hists.is_empty() {
            continue;
        }
        let list: Vec<serde_json::Value> = hists.all().iter().map(spec_json).collect();
        trees.insert(tree.to_string(), serde_json::Value::Array(list));
    }
    let branches: serde_json::Map<String, serde_json::Value> = config
        .trees()
        .filter_map(|(tree, _)| {
            config.branches(tree).map(|b| (tree.to_string(), serde_json::json!(b)))
        })
        .collect();

    let output_json = serde_json::json!({
        "config": config.path().display().to_string(),
        "options": config.options,
        "histograms": trees,
        "per_entry_sets": config.per_entry_sets().iter().map(set_json).collect::<Vec<_>>(),
        "simple_sets": config.simple_sets().iter().map(set_json).collect::<Vec<_>>(),
        "particle_sets": {
            "per_entry": config.particle_sets_per_entry(),
            "simple": config.particle_sets_simple(),
        },
        "branches": branches,
    });
    write_json(output, output_json)
}

fn cmd_combine(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let documents = inputs
        .iter()
        .map(|p| ResultDocument::open(p).with_context(|| format!("failed to read {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    let combined = combine_documents(&documents)?;
    combined.save(output).with_context(|| format!("failed to write {}", output.display()))?;
    println!("{} histogram(s) from {} file(s) written to {}", combined.len(), inputs.len(), output.display());
    Ok(())
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
