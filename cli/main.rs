#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use tumorgate::config::GateConfig;
use tumorgate::data::load_records;
use tumorgate::gate::{GateSummary, InferenceGate, PredictionOutcome};
use tumorgate::naive_bayes::GaussianNaiveBayes;
use tumorgate::record::FeatureRecord;
use tumorgate::report::write_outcomes;
use tumorgate::validate::{ValidationResult, check_schema, validate};

#[derive(Parser)]
#[command(
    name = "tumorgate",
    version,
    about = "Range-checked inference for tumor-measurement classifiers",
    long_about = "Validates tumor-measurement records against the feature ranges a classifier \
                 was trained on, and only asks the classifier for a diagnosis when every \
                 feature is inside its trusted range."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Gate a single record given on the command line
    Predict(PredictArgs),
    /// Gate every record of a TSV file and write a report
    Infer(InferArgs),
    /// Validate every record of a TSV file without loading a model
    Check(CheckArgs),
}

#[derive(Args)]
struct GateArgs {
    /// Path to the gate configuration (.toml) with trusted ranges and label table
    #[arg(long)]
    config: String,

    /// Path to the trained model file (.toml); overrides the configuration's `model`
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args)]
struct PredictArgs {
    #[command(flatten)]
    gate: GateArgs,

    /// One measurement as NAME=VALUE; repeat for every feature
    #[arg(long = "feature", value_name = "NAME=VALUE", value_parser = parse_feature, required = true)]
    features: Vec<(String, f64)>,
}

#[derive(Args)]
struct InferArgs {
    #[command(flatten)]
    gate: GateArgs,

    /// Path to a TSV file with one feature per column and an optional sample_id column
    input: String,

    /// Where to write the per-record report
    #[arg(long, default_value = "predictions.tsv")]
    output: String,
}

#[derive(Args)]
struct CheckArgs {
    /// Path to the gate configuration (.toml)
    #[arg(long)]
    config: String,

    /// Path to a TSV file with one feature per column and an optional sample_id column
    input: String,
}

fn parse_feature(arg: &str) -> Result<(String, f64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{arg}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{arg}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    Ok((name.to_string(), value))
}

fn load_gate(
    args: &GateArgs,
) -> Result<InferenceGate<GaussianNaiveBayes>, Box<dyn std::error::Error>> {
    println!("Loading gate configuration from: {}", args.config);
    let config = GateConfig::load(&args.config)?;

    let model_path = args
        .model
        .as_ref()
        .map(PathBuf::from)
        .or(config.model)
        .ok_or("No model given. Pass --model or set `model` in the configuration.")?;
    println!("Loading model from: {}", model_path.display());
    let model = GaussianNaiveBayes::load(&model_path)?;

    Ok(InferenceGate::new(model, config.ranges, config.labels)?)
}

fn predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let gate = load_gate(&args.gate)?;
    let record = FeatureRecord::new(args.features)?;

    match gate.gated_predict(&record)? {
        PredictionOutcome::Skipped { reason } => {
            println!("Prediction withheld: the record is outside the model's trusted range.");
            for violation in &reason.violations {
                println!(
                    "  {}: {} is {} ({})",
                    violation.feature,
                    violation.observed,
                    violation.bound.as_str(),
                    violation.limit
                );
            }
        }
        PredictionOutcome::Predicted { label, probability } => {
            println!("The model predicts: {}", label.headline());
            match probability {
                Some(probability) => {
                    for (diagnosis, p) in probability.iter() {
                        println!("  P({diagnosis}) = {p:.2}");
                    }
                }
                None => println!("  The model does not report class probabilities."),
            }
        }
    }
    Ok(())
}

fn infer(args: InferArgs) -> Result<(), Box<dyn std::error::Error>> {
    let gate = load_gate(&args.gate)?;

    println!("Loading records from: {}", args.input);
    let batch = load_records(&args.input)?;
    println!("Loaded {} records", batch.len());

    // The header is shared by every row, so a mismatch is checked once up front.
    let record_features: Vec<&str> = batch.feature_names().collect();
    let table_features: Vec<&str> = gate.ranges().features().collect();
    check_schema(&record_features, &table_features)?;

    let results = gate.gated_predict_many(&batch.records);
    write_outcomes(&args.output, &batch.sample_ids, &results)?;

    let summary = GateSummary::from_results(&results);
    println!(
        "Predicted {} benign, {} malignant; skipped {} out-of-range; {} failed.",
        summary.benign, summary.malignant, summary.skipped, summary.failed
    );
    println!("Predictions saved to: {}", args.output);

    if let Some(fatal) = results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .find(|err| err.is_fatal())
    {
        return Err(fatal.clone().into());
    }
    Ok(())
}

fn check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading gate configuration from: {}", args.config);
    let config = GateConfig::load(&args.config)?;
    let batch = load_records(&args.input)?;

    let mut out_of_range = 0usize;
    for (sample_id, record) in batch.sample_ids.iter().zip(&batch.records) {
        if let ValidationResult::OutOfRange(reason) = validate(record, &config.ranges)? {
            out_of_range += 1;
            println!("{sample_id}\t{reason}");
        }
    }
    println!(
        "{out_of_range} of {} records are outside the trusted range.",
        batch.len()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Predict(args)) => predict(args),
        Some(Commands::Infer(args)) => infer(args),
        Some(Commands::Check(args)) => check(args),
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;
    use tumorgate::label::RawLabel;
    use tumorgate::naive_bayes::ClassParameters;

    #[test]
    fn parses_feature_arguments() {
        assert_eq!(
            parse_feature("radius_mean=14.5"),
            Ok(("radius_mean".to_string(), 14.5))
        );
        assert_eq!(
            parse_feature(" texture_mean = 19 "),
            Ok(("texture_mean".to_string(), 19.0))
        );
        assert!(parse_feature("radius_mean").is_err());
        assert!(parse_feature("=3.0").is_err());
        assert!(parse_feature("radius_mean=big").is_err());
    }

    fn write_gate_files(dir: &std::path::Path, malignant_label: i64) -> String {
        let model = GaussianNaiveBayes::new(
            vec!["radius_mean".to_string()],
            vec![
                ClassParameters {
                    label: RawLabel::Integer(0),
                    prior: 0.6,
                    means: array![12.0],
                    variances: array![3.0],
                },
                ClassParameters {
                    label: RawLabel::Integer(malignant_label),
                    prior: 0.4,
                    means: array![18.0],
                    variances: array![10.0],
                },
            ],
        )
        .unwrap();
        model.save(dir.join("nb.toml")).unwrap();

        let config_path = dir.join("gate.toml");
        std::fs::write(
            &config_path,
            "model = \"nb.toml\"\n[ranges.radius_mean]\nmin = 6.0\nmax = 30.0\n",
        )
        .unwrap();
        config_path.to_str().unwrap().to_string()
    }

    fn infer_args(dir: &std::path::Path, config: String, input: &str) -> InferArgs {
        let input_path = dir.join("input.tsv");
        std::fs::write(&input_path, input).unwrap();
        InferArgs {
            gate: GateArgs {
                config,
                model: None,
            },
            input: input_path.to_str().unwrap().to_string(),
            output: dir.join("predictions.tsv").to_str().unwrap().to_string(),
        }
    }

    #[test]
    fn infer_loads_the_model_next_to_its_configuration() {
        let dir = tempdir().unwrap();
        let config = write_gate_files(dir.path(), 1);
        let args = infer_args(dir.path(), config, "sample_id\tradius_mean\np1\t12.5\np2\t45.0\n");

        infer(args).unwrap();
        let report = std::fs::read_to_string(dir.path().join("predictions.tsv")).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("p1\tpredicted\tBenign\t"));
        assert!(lines[2].starts_with("p2\tskipped\t"));
    }

    #[test]
    fn infer_stops_on_a_header_that_disagrees_with_the_ranges() {
        let dir = tempdir().unwrap();
        let config = write_gate_files(dir.path(), 1);
        let args = infer_args(dir.path(), config, "sample_id\ttexture_mean\np1\t19.0\n");

        let err = infer(args).unwrap_err();
        assert!(err.to_string().contains("Feature schema mismatch"));
        assert!(!dir.path().join("predictions.tsv").exists());
    }

    #[test]
    fn infer_writes_the_report_then_fails_on_an_unmapped_label() {
        let dir = tempdir().unwrap();
        let config = write_gate_files(dir.path(), 5);
        let args = infer_args(dir.path(), config, "sample_id\tradius_mean\np1\t12.0\np2\t20.0\n");

        let err = infer(args).unwrap_err();
        assert!(err.to_string().contains("raw label 5"));

        let report = std::fs::read_to_string(dir.path().join("predictions.tsv")).unwrap();
        assert_eq!(report.lines().count(), 3);
        assert!(report.contains("p2\tfailed"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
