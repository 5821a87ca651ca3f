//! microval CLI: cross-validated ROC AUC for metadata-annotated abundance tables.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use microval_core::{Predictor, Result, Summarizable};
use microval_io::{
    create_output, parse_row_list, read_table, write_curve_tsv, write_summary, AucLogWriter,
    PlotStyle,
};
use microval_ml::{
    build_dataset, entropy_seed, AggregateCurve, CvReport, DatasetConfig, ForestPredictor,
    RandomForestConfig, SplitCriterion, Transform, TrialConfig, TrialRunner,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "microval")]
#[command(about = "Estimate ROC AUC from a MetaPhlAn-style table with metadata rows inserted")]
#[command(version)]
struct Cli {
    /// Log progress (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Repeated stratified k-fold evaluation with a random forest
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Tab-delimited table: metadata rows followed by abundance rows
    #[arg(long)]
    table: PathBuf,

    /// Zero-based metadata row numbers, header excluded, comma delimited
    #[arg(long)]
    md_rows: String,

    /// Metadata row holding the class of each sample
    #[arg(long)]
    target_row: usize,

    /// Target-row value labelled positive, e.g. CRC
    #[arg(long)]
    pos_label: String,

    /// Target-row value labelled negative, e.g. Healthy
    #[arg(long)]
    neg_label: String,

    /// Folds per repeat
    #[arg(long, default_value = "10")]
    folds: usize,

    /// Number of times the dataset is re-split
    #[arg(long, default_value = "1")]
    repeats: usize,

    /// Abundance transform: none, arcsin_sqrt or binary
    #[arg(long, default_value = "none")]
    transform: Transform,

    /// Points on the mean-curve FPR grid
    #[arg(long, default_value = "100")]
    grid_size: usize,

    /// Worker threads for fold evaluation
    #[arg(long, default_value = "4")]
    nproc: usize,

    /// Random seed for fold shuffles and forests
    #[arg(long)]
    seed: Option<u64>,

    /// Trees per forest
    #[arg(long, default_value = "1000")]
    n_trees: usize,

    /// Maximum tree depth (unlimited when omitted)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Split criterion: gini or entropy
    #[arg(long, default_value = "entropy")]
    criterion: SplitCriterion,

    /// Per-fold AUC log (TSV)
    #[arg(long)]
    output_values: Option<PathBuf>,

    /// Mean ROC curve with its std band (TSV)
    #[arg(long)]
    output_curve: Option<PathBuf>,

    /// Run summary (JSON)
    #[arg(long)]
    output_summary: Option<PathBuf>,

    /// Font family recorded for the ROC figure
    #[arg(long, default_value = "Arial")]
    font_family: String,

    /// Font size recorded for the ROC figure
    #[arg(long, default_value = "11")]
    font_size: f64,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Evaluate(args) => cmd_evaluate(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_evaluate(args: &EvaluateArgs) -> Result<()> {
    let (report, curve) = run_evaluate(args)?;
    println!("ROC AUC: {:.4} \u{b1} {:.4}", curve.mean_auc, curve.std_auc);
    println!(
        "Folds:   {} evaluated, {} skipped",
        report.results.len(),
        report.skipped.len()
    );
    Ok(())
}

fn run_evaluate(args: &EvaluateArgs) -> Result<(CvReport, AggregateCurve)> {
    let seed = args.seed.unwrap_or_else(entropy_seed);
    let forest = RandomForestConfig {
        n_trees: args.n_trees,
        max_depth: args.max_depth,
        criterion: args.criterion,
        seed,
        ..Default::default()
    };
    evaluate_with(args, seed, || ForestPredictor::new(forest.clone()))
}

/// Load the table, open every requested output, then cross-validate.
///
/// Output files are created before the first predictor is built, so an
/// unwritable path costs no training time.
fn evaluate_with<P, F>(args: &EvaluateArgs, seed: u64, factory: F) -> Result<(CvReport, AggregateCurve)>
where
    P: Predictor,
    F: Fn() -> P + Sync,
{
    let table = read_table(&args.table)?;
    let dataset_config = DatasetConfig {
        metadata_rows: parse_row_list(&args.md_rows)?,
        target_row: args.target_row,
        positive_label: args.pos_label.clone(),
        negative_label: args.neg_label.clone(),
        transform: args.transform,
    };
    let dataset = build_dataset(&table, &dataset_config)?;
    info!(table = %args.table.display(), "{}", dataset.summary());

    let values_log = args.output_values.as_ref().map(AucLogWriter::create).transpose()?;
    let curve_file = args.output_curve.as_ref().map(create_output).transpose()?;
    let summary_file = args.output_summary.as_ref().map(create_output).transpose()?;

    let runner = TrialRunner::new(TrialConfig {
        n_folds: args.folds,
        n_trials: args.repeats,
        grid_size: args.grid_size,
        seed: Some(seed),
        n_jobs: args.nproc,
    });
    let report = runner.run(&dataset, factory)?;

    // The log holds whatever folds were evaluated, even if none aggregate.
    if let Some(mut log) = values_log {
        log.write_report(&report)?;
        log.finish()?;
    }

    let curve = report.aggregate(args.grid_size)?;
    info!("{}", curve.summary());

    if let Some(file) = curve_file {
        write_curve_tsv(file, &curve)?;
    }
    if let Some(file) = summary_file {
        let style = PlotStyle {
            font_family: args.font_family.clone(),
            font_size: args.font_size,
        };
        write_summary(file, &curve, &report, &style)?;
    }

    Ok((report, curve))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use microval_core::MicrovalError;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn evaluate_args(argv: &[&str]) -> EvaluateArgs {
        let mut full = vec!["microval", "evaluate"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Evaluate(args) => args,
        }
    }

    /// 20 CRC and 20 healthy samples; the first species separates them.
    fn write_profile(dir: &std::path::Path) -> PathBuf {
        let n = 40;
        let mut text = String::from("clade_name");
        for i in 0..n {
            text.push_str(&format!("\tS{}", i));
        }
        text.push_str("\nstudy");
        for _ in 0..n {
            text.push_str("\tsynthetic");
        }
        text.push_str("\nstatus");
        for i in 0..n {
            text.push_str(if i % 2 == 0 { "\tCRC" } else { "\tHealthy" });
        }
        for species in 0..4 {
            text.push_str(&format!("\ns__species_{}", species));
            for i in 0..n {
                let value = match (species, i % 2 == 0) {
                    (0, true) => 20.0 + (i % 7) as f64,
                    (0, false) => 1.0 + (i % 5) as f64,
                    _ => ((i * 31 + species * 17) % 13) as f64,
                };
                text.push_str(&format!("\t{}", value));
            }
        }
        text.push('\n');

        let path = dir.join("profile.tsv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = evaluate_args(&[
            "--table", "t.tsv", "--md-rows", "0,1", "--target-row", "1",
            "--pos-label", "CRC", "--neg-label", "Healthy",
        ]);
        assert_eq!(args.folds, 10);
        assert_eq!(args.repeats, 1);
        assert_eq!(args.transform, Transform::None);
        assert_eq!(args.grid_size, 100);
        assert_eq!(args.nproc, 4);
        assert_eq!(args.n_trees, 1000);
        assert_eq!(args.criterion, SplitCriterion::Entropy);
        assert!(args.seed.is_none());
        assert!(args.output_values.is_none());
    }

    #[test]
    fn parses_transform_and_criterion() {
        let args = evaluate_args(&[
            "--table", "t.tsv", "--md-rows", "0", "--target-row", "0",
            "--pos-label", "1", "--neg-label", "0",
            "--transform", "arcsin_sqrt", "--criterion", "gini", "--seed", "9",
        ]);
        assert_eq!(args.transform, Transform::ArcsinSqrt);
        assert_eq!(args.criterion, SplitCriterion::Gini);
        assert_eq!(args.seed, Some(9));
    }

    #[test]
    fn rejects_unknown_transform() {
        let result = Cli::try_parse_from([
            "microval", "evaluate", "--table", "t.tsv", "--md-rows", "0",
            "--target-row", "0", "--pos-label", "1", "--neg-label", "0",
            "--transform", "log",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_flag() {
        let result = Cli::try_parse_from(["microval", "evaluate", "--table", "t.tsv"]);
        assert!(result.is_err());
    }

    #[test]
    fn evaluate_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_profile(dir.path());
        let values = dir.path().join("roc_auc.tsv");
        let curve_path = dir.path().join("curve.tsv");
        let summary = dir.path().join("summary.json");

        let table_arg = table.to_str().unwrap();
        let values_arg = values.to_str().unwrap();
        let curve_arg = curve_path.to_str().unwrap();
        let summary_arg = summary.to_str().unwrap();
        let args = evaluate_args(&[
            "--table", table_arg, "--md-rows", "0,1", "--target-row", "1",
            "--pos-label", "CRC", "--neg-label", "Healthy",
            "--folds", "5", "--repeats", "2", "--n-trees", "15", "--seed", "3",
            "--grid-size", "20", "--nproc", "2",
            "--output-values", values_arg, "--output-curve", curve_arg,
            "--output-summary", summary_arg,
        ]);

        let (report, curve) = run_evaluate(&args).unwrap();
        assert_eq!(report.results.len(), 10);
        assert!(report.skipped.is_empty());
        assert!(curve.mean_auc > 0.8, "mean AUC {} too low", curve.mean_auc);
        assert_eq!(curve.fpr.len(), 20);

        let log = std::fs::read_to_string(&values).unwrap();
        assert_eq!(log.lines().count(), 11);
        assert!(log.starts_with("repeat\tfold\troc_auc\n"));
        assert_eq!(std::fs::read_to_string(&curve_path).unwrap().lines().count(), 21);
        assert!(std::fs::read_to_string(&summary).unwrap().contains("\"mean_auc\""));
    }

    #[test]
    fn unwritable_output_fails_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_profile(dir.path());
        let table_arg = table.to_str().unwrap();
        let base = [
            "--table", table_arg, "--md-rows", "0,1", "--target-row", "1",
            "--pos-label", "CRC", "--neg-label", "Healthy", "--folds", "5", "--seed", "1",
        ];
        for flag in ["--output-values", "--output-curve", "--output-summary"] {
            let mut argv = base.to_vec();
            argv.extend_from_slice(&[flag, "/nonexistent/dir/out.tsv"]);
            let args = evaluate_args(&argv);

            let built = AtomicUsize::new(0);
            let result = evaluate_with(&args, 1, || {
                built.fetch_add(1, Ordering::SeqCst);
                ForestPredictor::new(RandomForestConfig {
                    n_trees: 2,
                    ..Default::default()
                })
            });
            assert!(matches!(result, Err(MicrovalError::Io(_))), "{} accepted", flag);
            assert_eq!(built.load(Ordering::SeqCst), 0, "{} opened after training", flag);
        }
    }

    #[test]
    fn unknown_label_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_profile(dir.path());
        let args = evaluate_args(&[
            "--table", table.to_str().unwrap(), "--md-rows", "0,1", "--target-row", "1",
            "--pos-label", "CRC", "--neg-label", "Adenoma", "--folds", "2",
            "--n-trees", "2",
        ]);
        assert!(matches!(
            run_evaluate(&args),
            Err(MicrovalError::UnmappedLabel { .. })
        ));
    }

    #[test]
    fn too_many_folds_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_profile(dir.path());
        let args = evaluate_args(&[
            "--table", table.to_str().unwrap(), "--md-rows", "0,1", "--target-row", "1",
            "--pos-label", "CRC", "--neg-label", "Healthy", "--folds", "25",
            "--n-trees", "2",
        ]);
        assert!(matches!(
            run_evaluate(&args),
            Err(MicrovalError::InsufficientSamples { .. })
        ));
    }
}
