use crate::artifacts::{features_file_for, ArtifactSet, Manifest};
use crate::config::LicensekitConfig;
use crate::error::Error;
use crate::extractors::verify::collapse_whitespace;
use crate::extractors::{extract_file, verify_text};
use crate::features::{map_features, RuleSet};
use crate::normalizer::normalize;
use crate::parser::ParagraphParser;
use crate::storage::{calculate_config_hash, calculate_source_hash, FileStorage};
use crate::types::{FeatureMappings, ParagraphTree};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// Captured intermediate outputs from each pipeline stage
/// Used for diagnostics: lets you inspect/compare each boundary
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStages {
    pub raw_text: String,
    pub normalized_text: String,
    pub tree: ParagraphTree,
    pub mappings: FeatureMappings,
}

impl PipelineStages {
    /// Write each stage to its own numbered file under `dir`.
    pub fn dump_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create stages dir {}", dir.display()))?;
        std::fs::write(dir.join("01_raw.txt"), &self.raw_text)?;
        std::fs::write(dir.join("02_normalized.txt"), &self.normalized_text)?;
        std::fs::write(
            dir.join("03_paragraphs.json"),
            serde_json::to_string_pretty(&self.tree)?,
        )?;
        std::fs::write(
            dir.join("04_mappings.json"),
            serde_json::to_string_pretty(&self.mappings)?,
        )?;
        println!("💾 Saved pipeline stages to {}", dir.display());
        Ok(())
    }
}

/// Pipeline boundaries, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RuleLoading,
    Extraction,
    Normalization,
    Parsing,
    FeatureMapping,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::RuleLoading => "Rule loading",
            Stage::Extraction => "Extraction",
            Stage::Normalization => "Normalization",
            Stage::Parsing => "Parsing",
            Stage::FeatureMapping => "Feature mapping",
        }
    }

    /// What the stage's output is counted in.
    pub fn unit(self) -> &'static str {
        match self {
            Stage::RuleLoading => "rules",
            Stage::Extraction | Stage::Normalization => "chars",
            Stage::Parsing => "paragraphs",
            Stage::FeatureMapping => "mapped paragraphs",
        }
    }
}

/// Size of a stage's output, reported next to its timing.
pub trait StageOutput {
    fn volume(&self) -> usize;
}

impl StageOutput for String {
    fn volume(&self) -> usize {
        self.chars().count()
    }
}

impl StageOutput for RuleSet {
    fn volume(&self) -> usize {
        self.len()
    }
}

impl StageOutput for ParagraphTree {
    fn volume(&self) -> usize {
        self.paragraph_count()
    }
}

impl StageOutput for FeatureMappings {
    fn volume(&self) -> usize {
        self.names()
            .filter_map(|name| self.get(name))
            .map(|mapping| mapping.paragraphs.len())
            .sum()
    }
}

impl<A: StageOutput, B> StageOutput for (A, B) {
    fn volume(&self) -> usize {
        self.0.volume()
    }
}

impl<T: StageOutput, E> StageOutput for std::result::Result<T, E> {
    fn volume(&self) -> usize {
        self.as_ref().map_or(0, StageOutput::volume)
    }
}

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed: Duration,
    pub volume: usize,
}

/// Times each pipeline stage inside a `tracing` span and records its output size.
pub struct StageProfiler {
    enabled: bool,
    timings: Vec<StageTiming>,
}

impl StageProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn run<F, R>(&mut self, stage: Stage, f: F) -> R
    where
        F: FnOnce() -> R,
        R: StageOutput,
    {
        let span = info_span!("stage", stage = stage.label());
        let _guard = span.enter();

        let start = Instant::now();
        let result = f();
        let timing = StageTiming {
            stage,
            elapsed: start.elapsed(),
            volume: result.volume(),
        };
        debug!(
            "{} produced {} {} in {:?}",
            stage.label(),
            timing.volume,
            stage.unit(),
            timing.elapsed
        );

        if self.enabled {
            println!(
                "⏱️  {}: {}ms → {} {}",
                stage.label(),
                timing.elapsed.as_millis(),
                timing.volume,
                stage.unit()
            );
            self.timings.push(timing);
        }
        result
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    pub fn timing(&self, stage: Stage) -> Option<&StageTiming> {
        self.timings.iter().find(|t| t.stage == stage)
    }

    pub fn print_summary(&self) {
        if self.timings.is_empty() {
            return;
        }

        let total: Duration = self.timings.iter().map(|t| t.elapsed).sum();
        println!("\n📊 Stage summary:");
        for timing in &self.timings {
            let share = if total.is_zero() {
                0.0
            } else {
                timing.elapsed.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            println!(
                "   {:<16} {:>6}ms {:>5.1}%  {} {}",
                timing.stage.label(),
                timing.elapsed.as_millis(),
                share,
                timing.volume,
                timing.stage.unit()
            );
        }
        println!("   {:<16} {:>6}ms", "Total", total.as_millis());
    }
}

/// Outcome of a dual-source check.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    /// Characters compared after whitespace collapsing
    pub chars_compared: usize,
    pub category_count: usize,
    pub paragraph_count: usize,
    /// Structural differences between the two parsed trees
    pub differences: Vec<String>,
}

impl VerificationReport {
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Runs extract → normalize → parse → map for one regulation document.
pub struct DocumentProcessor {
    config: LicensekitConfig,
    parser: ParagraphParser,
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(LicensekitConfig::default())
    }
}

impl DocumentProcessor {
    pub fn new(config: LicensekitConfig) -> Self {
        let parser = ParagraphParser::new(&config.parser);
        Self { config, parser }
    }

    /// Processor with config loaded from file (defaults when it can't be read)
    pub fn with_config_file(config_path: Option<&str>) -> Self {
        Self::new(LicensekitConfig::load_with_fallback(config_path))
    }

    pub fn config(&self) -> &LicensekitConfig {
        &self.config
    }

    pub fn extract(&self, input: &Path) -> Result<String> {
        let text = extract_file(input, None, &self.config.extraction)?;
        Ok(text)
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw)
    }

    /// Normalize, parse and map already-extracted text.
    pub fn process_text(&self, raw: &str, rules: &RuleSet) -> (ParagraphTree, FeatureMappings) {
        let normalized = self.normalize(raw);
        let tree = self.parser.parse(&normalized);
        let mappings = map_features(&tree, rules);
        (tree, mappings)
    }

    /// Process document using the configured pipeline
    pub fn process_document(&self, input: &Path, rules_path: &Path) -> Result<ArtifactSet> {
        self.process_document_with_profiling(input, rules_path, false)
    }

    pub fn process_document_with_profiling(
        &self,
        input: &Path,
        rules_path: &Path,
        enable_profiling: bool,
    ) -> Result<ArtifactSet> {
        let start_time = Instant::now();
        let mut profiler = StageProfiler::new(enable_profiling);
        let (artifacts, _) = self.process_with_profiler(input, rules_path, &mut profiler)?;
        profiler.print_summary();
        println!(
            "⏱️  Total processing time: {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(artifacts)
    }

    /// Process document and capture all intermediate stage outputs
    pub fn process_document_capture_stages(
        &self,
        input: &Path,
        rules_path: &Path,
        enable_profiling: bool,
    ) -> Result<(ArtifactSet, PipelineStages)> {
        let mut profiler = StageProfiler::new(enable_profiling);
        let (artifacts, stages) = self.process_with_profiler(input, rules_path, &mut profiler)?;
        profiler.print_summary();
        println!(
            "📋 Stages captured: {} raw chars, {} normalized chars, {} paragraphs, {} features",
            stages.raw_text.chars().count(),
            stages.normalized_text.chars().count(),
            stages.tree.paragraph_count(),
            stages.mappings.len()
        );
        Ok((artifacts, stages))
    }

    fn process_with_profiler(
        &self,
        input: &Path,
        rules_path: &Path,
        profiler: &mut StageProfiler,
    ) -> Result<(ArtifactSet, PipelineStages)> {
        println!("📄 Processing document: {}", input.display());

        let source_bytes = std::fs::read(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let source_hash = calculate_source_hash(&source_bytes);

        let rules_label = rules_path.to_string_lossy().to_string();
        let rules_content = std::fs::read_to_string(rules_path)
            .with_context(|| format!("Failed to read feature rules {}", rules_label))?;
        let (rules, rules_hash) = profiler.run(Stage::RuleLoading, || {
            load_rules(&rules_content, &rules_label)
        })?;

        let raw_text = profiler.run(Stage::Extraction, || self.extract(input))?;
        let normalized_text = profiler.run(Stage::Normalization, || self.normalize(&raw_text));
        let tree = profiler.run(Stage::Parsing, || self.parser.parse(&normalized_text));
        let mappings = profiler.run(Stage::FeatureMapping, || map_features(&tree, &rules));

        if tree.is_empty() {
            warn!("No chapters found in {}", input.display());
        }
        info!(
            "Parsed {} categories / {} paragraphs, mapped {} features",
            tree.categories.len(),
            tree.paragraph_count(),
            mappings.len()
        );

        let mut manifest = Manifest::new(&input.to_string_lossy(), source_hash, rules_hash)
            .with_counts(&tree, &mappings);
        manifest.skipped_rules = skipped_rule_names(&rules);

        let artifacts = ArtifactSet {
            tree: tree.clone(),
            mappings: mappings.clone(),
            manifest,
            rules: Some((features_file_for(&rules_label).to_string(), rules_content)),
        };
        let stages = PipelineStages {
            raw_text,
            normalized_text,
            tree,
            mappings,
        };
        Ok((artifacts, stages))
    }

    /// Extract both encodings of one document and check they agree.
    ///
    /// A text mismatch is a `Verification` error; structural differences in
    /// the parsed trees are reported without failing.
    pub fn verify_sources(&self, left: &Path, right: &Path) -> Result<VerificationReport> {
        println!("🔍 Verifying {} against {}", left.display(), right.display());
        let left_text = self.normalize(&self.extract(left)?);
        let right_text = self.normalize(&self.extract(right)?);

        verify_text(&left_text, &right_text, self.config.extraction.excerpt_chars)?;

        let left_tree = self.parser.parse(&left_text);
        let right_tree = self.parser.parse(&right_text);
        let empty = FeatureMappings::new();
        let differences = compare_outputs((&left_tree, &empty), (&right_tree, &empty));
        for difference in &differences {
            warn!("Structure differs: {}", difference);
        }

        Ok(VerificationReport {
            chars_compared: collapse_whitespace(&left_text).chars().count(),
            category_count: left_tree.categories.len(),
            paragraph_count: left_tree.paragraph_count(),
            differences,
        })
    }

    /// Persist a run's artifacts under `out_dir`.
    pub fn write_outputs(&self, artifacts: &ArtifactSet, out_dir: &Path) -> Result<()> {
        let storage = FileStorage::new(out_dir);
        artifacts
            .write_to(&storage)
            .with_context(|| format!("Failed to write artifacts to {}", out_dir.display()))?;
        println!("💾 Saved artifacts to {}", out_dir.display());
        Ok(())
    }
}

fn load_rules(content: &str, label: &str) -> Result<(RuleSet, String)> {
    let rules = RuleSet::from_content(content, label)
        .with_context(|| format!("Failed to decode feature rules {}", label))?;
    let value: Value = if crate::features::rule::is_yaml(label) {
        serde_yaml::from_str(content)?
    } else {
        serde_json::from_str(content)?
    };
    let rules_hash = calculate_config_hash(&value)?;
    info!(
        "Loaded {} feature rules ({} skipped) from {}",
        rules.len(),
        rules.warnings.len(),
        label
    );
    Ok((rules, rules_hash))
}

fn skipped_rule_names(rules: &RuleSet) -> Vec<String> {
    rules
        .warnings
        .iter()
        .filter_map(|e| match e {
            Error::Configuration { rule, .. } => Some(rule.clone()),
            _ => None,
        })
        .collect()
}

/// Differences between two pipeline outputs, one line each.
///
/// Compares category names and order, paragraph numbers per category,
/// paragraph text (whitespace-collapsed), and each feature's matched numbers.
pub fn compare_outputs(
    left: (&ParagraphTree, &FeatureMappings),
    right: (&ParagraphTree, &FeatureMappings),
) -> Vec<String> {
    let (left_tree, left_mappings) = left;
    let (right_tree, right_mappings) = right;
    let mut differences = Vec::new();

    let left_names: Vec<&str> = left_tree.categories.iter().map(|c| c.name.as_str()).collect();
    let right_names: Vec<&str> = right_tree.categories.iter().map(|c| c.name.as_str()).collect();
    if left_names != right_names {
        differences.push(format!(
            "categories: [{}] vs [{}]",
            left_names.join(", "),
            right_names.join(", ")
        ));
    }

    for category in &left_tree.categories {
        let Some(other) = right_tree.category(&category.name) else {
            continue;
        };
        let left_numbers: Vec<&str> = category.paragraphs().map(|p| p.number.as_str()).collect();
        let right_numbers: Vec<&str> = other.paragraphs().map(|p| p.number.as_str()).collect();
        if left_numbers != right_numbers {
            let only_left = set_difference(&left_numbers, &right_numbers);
            let only_right = set_difference(&right_numbers, &left_numbers);
            differences.push(format!(
                "{}: paragraphs only on the left [{}], only on the right [{}]",
                category.name,
                only_left.join(", "),
                only_right.join(", ")
            ));
        }
        for paragraph in category.paragraphs() {
            let Some(counterpart) = other.paragraph(&paragraph.number) else {
                continue;
            };
            if collapse_whitespace(&paragraph.text) != collapse_whitespace(&counterpart.text) {
                differences.push(format!("{}/{}: text differs", category.name, paragraph.number));
            }
        }
    }

    let features: BTreeSet<&str> = left_mappings.names().chain(right_mappings.names()).collect();
    for feature in features {
        let left_set = mapping_numbers(left_mappings, feature);
        let right_set = mapping_numbers(right_mappings, feature);
        if left_set != right_set {
            differences.push(format!(
                "feature '{}': {} vs {} matched paragraphs",
                feature,
                left_set.len(),
                right_set.len()
            ));
        }
    }

    differences
}

fn set_difference<'a>(a: &[&'a str], b: &[&str]) -> Vec<&'a str> {
    a.iter().copied().filter(|n| !b.contains(n)).collect()
}

fn mapping_numbers<'a>(mappings: &'a FeatureMappings, feature: &str) -> BTreeSet<(&'a str, &'a str)> {
    mappings
        .get(feature)
        .map(|m| {
            m.categories
                .iter()
                .flat_map(|(category, numbers)| {
                    numbers.iter().map(move |n| (category.as_str(), n.as_str()))
                })
                .collect()
        })
        .unwrap_or_default()
}
