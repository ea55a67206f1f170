use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use licensekit_core::{
    match_requirements, BusinessProfile, DocumentProcessor, LicensekitConfig, MatchReport,
    RulesStore,
};

#[derive(Parser)]
#[command(name = "licensekit", version)]
#[command(about = "Build regulation paragraph indexes and match business profiles against them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, normalize, parse and map a regulation document into artifacts
    Build(BuildArgs),
    /// Check that two encodings of the same document carry the same text
    Verify(VerifyArgs),
    /// Match a business profile against previously built artifacts
    Match(MatchArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Regulation document (.pdf or .docx)
    input: PathBuf,

    /// Feature rule file (JSON or YAML)
    features: PathBuf,

    /// Directory for paragraphs.json, mappings.json and manifest.json
    out_dir: PathBuf,

    /// Other encoding of the same document; the build fails if the texts disagree
    #[arg(long)]
    verify_other: Option<PathBuf>,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable detailed profiling of all pipeline steps
    #[arg(long)]
    profile: bool,

    /// Dump all intermediate pipeline stage outputs to a directory
    /// Captures: raw text, normalized text, paragraph tree and mappings
    #[arg(long)]
    dump_stages: bool,

    /// Directory for stage dump output
    #[arg(long, default_value = "test_outputs/stages")]
    stages_dir: PathBuf,
}

#[derive(Args)]
struct VerifyArgs {
    a: PathBuf,
    b: PathBuf,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Args)]
struct MatchArgs {
    /// Directory holding the built artifacts
    #[arg(long)]
    data_dir: PathBuf,

    /// Feature rule file; defaults to the copy stored with the artifacts
    #[arg(long)]
    features: Option<PathBuf>,

    /// Questionnaire answers: a JSON file or an inline JSON object
    #[arg(long)]
    answers: Option<String>,

    #[arg(long)]
    size_m2: Option<f64>,

    #[arg(long)]
    seats: Option<f64>,

    /// Selected business attribute (repeatable)
    #[arg(long = "attribute")]
    attributes: Vec<String>,

    /// Minimum relevance score in [0, 1]
    #[arg(long)]
    min_relevance: Option<f64>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("licensekit CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build(args) => run_build(&args),
        Command::Verify(args) => run_verify(&args),
        Command::Match(args) => run_match(&args),
    };

    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> LicensekitConfig {
    match path {
        Some(p) => println!("📋 Loaded config from: {}", p),
        None => println!("📋 Using default config"),
    }
    LicensekitConfig::load_with_fallback(path)
}

fn run_build(args: &BuildArgs) -> Result<()> {
    println!("🦀 Licensekit regulation builder");
    if !args.input.exists() {
        bail!("input document not found: {}", args.input.display());
    }

    let processor = DocumentProcessor::new(load_config(args.config.as_deref()));

    let verified_against = match &args.verify_other {
        Some(other) => {
            let report = processor.verify_sources(&args.input, other)?;
            println!(
                "✅ Sources agree ({} chars, {} paragraphs)",
                report.chars_compared, report.paragraph_count
            );
            if !report.is_identical() {
                println!("⚠️  {} structural differences:", report.differences.len());
                for difference in &report.differences {
                    println!("   - {}", difference);
                }
            }
            Some(other.to_string_lossy().to_string())
        }
        None => None,
    };

    let mut artifacts = if args.dump_stages {
        println!("\n🔬 Pipeline stage dump mode");
        let (artifacts, stages) =
            processor.process_document_capture_stages(&args.input, &args.features, args.profile)?;
        stages.dump_to(&args.stages_dir)?;
        artifacts
    } else {
        processor.process_document_with_profiling(&args.input, &args.features, args.profile)?
    };
    artifacts.manifest.verified_against = verified_against;

    println!("✅ Successfully processed document");
    println!("📊 Artifact metrics:");
    println!("   - Categories: {}", artifacts.manifest.category_count);
    println!("   - Paragraphs: {}", artifacts.manifest.paragraph_count);
    println!("   - Features: {}", artifacts.manifest.feature_count);
    if !artifacts.manifest.skipped_rules.is_empty() {
        println!(
            "⚠️  Skipped rules: {}",
            artifacts.manifest.skipped_rules.join(", ")
        );
    }

    processor.write_outputs(&artifacts, &args.out_dir)?;
    Ok(())
}

fn run_verify(args: &VerifyArgs) -> Result<()> {
    let processor = DocumentProcessor::new(load_config(args.config.as_deref()));
    let report = processor.verify_sources(&args.a, &args.b)?;
    println!(
        "✅ Sources agree: {} chars, {} categories, {} paragraphs",
        report.chars_compared, report.category_count, report.paragraph_count
    );
    for difference in &report.differences {
        println!("⚠️  {}", difference);
    }
    Ok(())
}

fn run_match(args: &MatchArgs) -> Result<()> {
    let config = LicensekitConfig::load_with_fallback(args.config.as_deref());

    let mut store = RulesStore::from_dir(&args.data_dir);
    if let Some(features) = &args.features {
        store = store.with_rules_file(features);
    }

    let answers = build_answers(args)?;
    let profile = BusinessProfile::from_answers(&answers);
    let report = match_requirements(&store, &profile, &config.matching, args.min_relevance)
        .with_context(|| format!("Failed to load artifacts from {}", args.data_dir.display()))?;

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_summary(&report, &profile);
            println!("💾 Match report saved to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Merge the answers document with command-line overrides.
fn build_answers(args: &MatchArgs) -> Result<Value> {
    let mut answers = match &args.answers {
        Some(raw) => read_answers(raw)?,
        None => Map::new(),
    };

    if let Some(size) = args.size_m2 {
        answers.insert("size_m2".to_string(), Value::from(size));
    }
    if let Some(seats) = args.seats {
        answers.insert("seats".to_string(), Value::from(seats));
    }
    if !args.attributes.is_empty() {
        let mut attributes: Vec<Value> = match answers.remove("attributes") {
            Some(Value::Array(items)) => items,
            Some(single @ Value::String(_)) => vec![single],
            _ => Vec::new(),
        };
        attributes.extend(args.attributes.iter().cloned().map(Value::from));
        answers.insert("attributes".to_string(), Value::Array(attributes));
    }
    Ok(Value::Object(answers))
}

fn read_answers(raw: &str) -> Result<Map<String, Value>> {
    let content = if Path::new(raw).is_file() {
        std::fs::read_to_string(raw).with_context(|| format!("Failed to read answers {}", raw))?
    } else {
        raw.to_string()
    };
    match serde_json::from_str(&content).context("answers are not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("answers must be a JSON object"),
    }
}

fn print_summary(report: &MatchReport, profile: &BusinessProfile) {
    println!("✅ {} matching requirements", report.total_matches);
    println!(
        "📊 Priority: {} high / {} medium / {} low (avg relevance {:.2})",
        report.priority_breakdown.high,
        report.priority_breakdown.medium,
        report.priority_breakdown.low,
        report.avg_relevance
    );
    for (category, count) in report.category_counts() {
        println!("   - {}: {}", category, count);
    }
    let special = profile.special_requirements();
    if !special.is_empty() {
        println!("🔥 Special requirements: {}", special.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "licensekit",
            "build",
            "rules.pdf",
            "features.json",
            "out",
            "--verify-other",
            "rules.docx",
            "--profile",
        ])
        .unwrap();
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.input, PathBuf::from("rules.pdf"));
                assert_eq!(args.verify_other, Some(PathBuf::from("rules.docx")));
                assert!(args.profile);
                assert!(!args.dump_stages);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_match_overrides_answers() {
        let cli = Cli::try_parse_from([
            "licensekit",
            "match",
            "--data-dir",
            "out",
            "--answers",
            r#"{"size_m2": 80, "attributes": ["גז"]}"#,
            "--size-m2",
            "120",
            "--attribute",
            "משלוחים",
        ])
        .unwrap();
        let Command::Match(args) = cli.command else {
            panic!("expected match");
        };
        let answers = build_answers(&args).unwrap();
        assert_eq!(answers["size_m2"], serde_json::json!(120.0));
        assert_eq!(answers["attributes"], serde_json::json!(["גז", "משלוחים"]));

        let profile = BusinessProfile::from_answers(&answers);
        assert_eq!(profile.size_m2, Some(120.0));
        assert!(profile.uses_gas);
    }

    #[test]
    fn test_answers_must_be_object() {
        assert!(read_answers("[1, 2]").is_err());
        assert!(read_answers("not json").is_err());
    }
}
