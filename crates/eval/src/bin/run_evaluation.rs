use anyhow::{Context, Result};
use clap::Parser;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use eval::{Dimension, ErrorSheet, EvaluationReport, Evaluator, generate_plots, load_labels};
use extract::{ExtractionConfig, ExtractionSummary, Extractor};

#[derive(Parser, Debug)]
#[command(name = "run_evaluation")]
#[command(about = "Extract grid references from intel reports and score them against tagged labels")]
struct Args {
    /// Cleaned report records (.json array or .jsonl)
    #[arg(long)]
    reports: PathBuf,

    /// Tagged ground-truth labels (.json array or .jsonl)
    #[arg(long)]
    labels: PathBuf,

    /// Extraction rules and normalization settings; built-in rules when omitted
    #[arg(long, env = "EXTRACTION_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for reports and charts
    #[arg(long, default_value = "evaluation")]
    out_dir: PathBuf,

    /// Skip chart rendering
    #[arg(long)]
    no_plots: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExtractionConfig::from_json_file(path)
            .with_context(|| format!("Failed to load extraction config {}", path.display()))?,
        None => ExtractionConfig::default(),
    };
    let extractor = Extractor::new(&config).context("Invalid pattern registry")?;
    let evaluator = Evaluator::new(config.suspect_threshold()?);

    let (reports, labels) = tokio::try_join!(
        ingest::load_reports(&args.reports),
        load_labels(&args.labels, extractor.normalizer()),
    )?;

    let predictions = extractor.extract_batch(&reports);
    let summary = extractor.summarize(&predictions);
    let report = evaluator
        .evaluate(&predictions, &labels)
        .context("Predictions and labels do not join one-to-one")?;
    let sheet = ErrorSheet::build(&report, &reports);

    print_results(&summary, &report);

    tokio::fs::create_dir_all(&args.out_dir).await?;
    write_json(&args.out_dir.join("extractions.json"), &predictions).await?;
    write_json(&args.out_dir.join("evaluation_report.json"), &report).await?;
    sheet.write_json(args.out_dir.join("error_cases.json")).await?;

    let markdown = generate_markdown(&summary, &report, &sheet, !args.no_plots);
    tokio::fs::write(args.out_dir.join("EVALUATION.md"), markdown).await?;
    println!("\n✅ Results saved to {}", args.out_dir.display());

    if !args.no_plots {
        let plots_dir = args.out_dir.join("plots");
        generate_plots(&report, &plots_dir.to_string_lossy())?;
        println!("✅ Plots saved to {}", plots_dir.display());
    }

    Ok(())
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn print_results(summary: &ExtractionSummary, report: &EvaluationReport) {
    println!("\n=== EXTRACTION ===\n");
    println!("  Reports: {}", summary.total_reports);
    println!("  With coordinate: {}", summary.with_coordinate);
    println!("  Suspect: {}", summary.suspect);
    for (rule, wins) in &summary.wins_by_rule {
        println!("  Rule {}: {}", rule, wins);
    }

    println!("\n=== EVALUATION ({} labeled) ===\n", report.total);
    let c = &report.confusion;
    println!("  TP: {}  FP: {}  TN: {}  FN: {}", c.tp, c.fp, c.tn, c.fn_);
    for (name, metric) in report.metrics.named() {
        println!("  {}: {}", name, metric);
    }

    for strat in &report.stratified {
        if let Some(worst) = strat.worst() {
            println!(
                "\n📊 {}: worst stratum {} ({} errors of {})",
                strat.dimension.label(),
                worst.value,
                worst.counts.errors(),
                worst.counts.total()
            );
        }
    }

    let cmp = &report.reliability_comparison;
    println!(
        "\n🔎 Error rate at or below {}: {} vs {} for the rest",
        cmp.threshold, cmp.low.error_rate, cmp.rest.error_rate
    );
}

fn generate_markdown(
    summary: &ExtractionSummary,
    report: &EvaluationReport,
    sheet: &ErrorSheet,
    with_plots: bool,
) -> String {
    let c = &report.confusion;
    let m = &report.metrics;
    let mut out = format!(
        r#"# Coordinate Extraction Evaluation

Run `{}`, registry `{}`.

## Extraction

| Reports | With coordinate | Without | Suspect |
|---------|-----------------|---------|---------|
| {} | {} | {} | {} |

## Confusion Matrix

|                | Found | Not found |
|----------------|-------|-----------|
| Has coordinate | TP {} | FN {} |
| No coordinate  | FP {} | TN {} |

## Metrics

| Accuracy | Precision | Recall | F1 | Specificity |
|----------|-----------|--------|----|-------------|
| {} | {} | {} | {} | {} |
"#,
        report.run_id,
        summary.registry_fingerprint,
        summary.total_reports,
        summary.with_coordinate,
        summary.without_coordinate,
        summary.suspect,
        c.tp,
        c.fn_,
        c.fp,
        c.tn,
        m.accuracy,
        m.precision,
        m.recall,
        m.f1,
        m.specificity,
    );

    for strat in &report.stratified {
        let _ = writeln!(out, "\n## By {}\n", strat.dimension.label());
        let _ = writeln!(out, "| {} | TP | FP | TN | FN | Accuracy | F1 |", strat.dimension.label());
        let _ = writeln!(out, "|---|---|---|---|---|---|---|");
        for s in &strat.strata {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} |",
                s.value, s.counts.tp, s.counts.fp, s.counts.tn, s.counts.fn_, s.metrics.accuracy, s.metrics.f1
            );
        }
    }

    let cmp = &report.reliability_comparison;
    let _ = writeln!(out, "\n## Error Analysis\n");
    let _ = writeln!(
        out,
        "- Reliability {} or lower: {} errors in {} reports ({})",
        cmp.threshold, cmp.low.errors, cmp.low.reports, cmp.low.error_rate
    );
    let _ = writeln!(
        out,
        "- Everyone else: {} errors in {} reports ({})",
        cmp.rest.errors, cmp.rest.reports, cmp.rest.error_rate
    );
    if let Some(worst) = report.stratification(Dimension::Sector).and_then(|s| s.worst()) {
        let _ = writeln!(out, "- Worst sector: {} ({} errors)", worst.value, worst.counts.errors());
    }
    let _ = writeln!(out, "- {} error cases in `error_cases.json`", sheet.len());

    let grades: Vec<String> = sheet.by_reliability.keys().map(ToString::to_string).collect();
    if !grades.is_empty() {
        let _ = writeln!(out, "\n### Errors by Sector and Reliability (FP/FN)\n");
        let _ = writeln!(out, "| Sector | {} |", grades.join(" | "));
        let _ = writeln!(out, "|---|{}", "---|".repeat(grades.len()));
        for sector in report.cross_tab.cells.keys() {
            let cells: Vec<String> = grades
                .iter()
                .map(|grade| {
                    let tally = report.cross_tab.get(sector, grade);
                    format!("{}/{}", tally.fp, tally.fn_)
                })
                .collect();
            let _ = writeln!(out, "| {} | {} |", sector, cells.join(" | "));
        }
    }

    if with_plots {
        let _ = writeln!(out, "\n![Confusion Matrix](plots/confusion_matrix.png)");
        let _ = writeln!(out, "\n![Metrics](plots/metrics.png)");
        let _ = writeln!(out, "\n![Errors by Sector](plots/sector_errors.png)");
    }

    out
}
