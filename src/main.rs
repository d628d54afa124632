mod checks;
mod classpath;
mod descriptor;
mod engine;
mod hierarchy;
mod ir;
mod printer;
mod problem;
mod query;
mod scan;
mod telemetry;
#[cfg(test)]
mod test_harness;
mod visit;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use opentelemetry::KeyValue;
use serde_json::json;
use serde_sarif::sarif::{
    Artifact, Invocation, PropertyBag, ReportingDescriptor, Result as SarifResult, Run, SCHEMA_URL,
    Sarif, Tool, ToolComponent,
};
use tracing::{info, warn};

use crate::classpath::resolve_references;
use crate::engine::{Engine, build_context_with_timings};
use crate::problem::ProblemType;
use crate::scan::scan_input;
use crate::telemetry::{Telemetry, current_trace_id, init_logging, with_span};

/// CLI arguments for autograde execution.
#[derive(Parser, Debug)]
#[command(
    name = "autograde",
    about = "Resolve method overrides in a JVM program model and report code-quality problems as SARIF.",
    version
)]
struct Cli {
    /// JSON program model to analyze.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// SARIF destination; `-` or absent writes to stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Report only these problem types; repeat to select several.
    #[arg(long = "problem-type", value_name = "TYPE")]
    problem_types: Vec<ProblemType>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
    /// OTLP/HTTP collector receiving analysis spans.
    #[arg(long, value_name = "URL")]
    otel: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    let telemetry = match cli.otel.as_deref() {
        Some(endpoint) => Some(Arc::new(Telemetry::connect(endpoint)?)),
        None => None,
    };
    let result = with_span(
        telemetry.as_deref(),
        "autograde",
        &[KeyValue::new("autograde.input", cli.input.display().to_string())],
        || run(&cli, telemetry.clone()),
    );
    if let Some(telemetry) = &telemetry {
        if let Err(err) = telemetry.shutdown() {
            warn!("{err:#}");
        }
    }
    result
}

fn run(cli: &Cli, telemetry: Option<Arc<Telemetry>>) -> Result<()> {
    if !cli.input.exists() {
        bail!("input not found: {}", cli.input.display());
    }
    if let Some(trace_id) = current_trace_id() {
        info!(trace_id = %trace_id, "exporting analysis spans");
    }
    let engine = Engine::new().select(&cli.problem_types)?;

    let started_at = Instant::now();
    let scan_started_at = Instant::now();
    let scan = scan_input(&cli.input, telemetry.as_deref())?;
    let scan_duration_ms = scan_started_at.elapsed().as_millis();
    let references = resolve_references(&scan.model)?;
    let artifact_count = scan.artifacts.len();
    let type_count = scan.type_count;

    let (context, context_timings) = build_context_with_timings(scan.model, telemetry.clone());
    let analysis_started_at = Instant::now();
    let output = with_span(
        telemetry.as_deref(),
        "analysis",
        &[KeyValue::new("autograde.phase", "analysis")],
        || engine.analyze(&context),
    )?;
    let analysis_duration_ms = analysis_started_at.elapsed().as_millis();
    info!(
        problems = output.problems.len(),
        types = type_count,
        "analysis finished"
    );

    let invocation_stats = InvocationStats {
        scan_duration_ms,
        hierarchy_duration_ms: context_timings.hierarchy_duration_ms,
        analysis_duration_ms,
        type_count,
        artifact_count,
        referenced_type_count: references.referenced.len(),
        missing_type_count: references.missing.len(),
        problem_count: output.problems.len(),
    };
    let invocation = build_invocation(&invocation_stats);
    let sarif = build_sarif(scan.artifacts, invocation, output.rules, output.results);

    let mut writer = output_writer(cli.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &sarif)
        .context("failed to serialize SARIF output")?;
    writer
        .write_all(b"\n")
        .context("failed to write SARIF output")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} scan_ms={} hierarchy_ms={} hierarchy_types_ms={} hierarchy_methods_ms={} hierarchy_lambdas_ms={} analysis_ms={} types={} artifacts={}",
            started_at.elapsed().as_millis(),
            scan_duration_ms,
            context_timings.hierarchy_duration_ms,
            context_timings.hierarchy_types_duration_ms,
            context_timings.hierarchy_methods_duration_ms,
            context_timings.hierarchy_lambdas_duration_ms,
            analysis_duration_ms,
            type_count,
            artifact_count
        );
    }

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

/// Metadata captured for SARIF invocation properties.
struct InvocationStats {
    scan_duration_ms: u128,
    hierarchy_duration_ms: u128,
    analysis_duration_ms: u128,
    type_count: usize,
    artifact_count: usize,
    referenced_type_count: usize,
    missing_type_count: usize,
    problem_count: usize,
}

fn build_invocation(stats: &InvocationStats) -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");
    let mut properties = BTreeMap::new();
    properties.insert("autograde.scan_ms".to_string(), json!(stats.scan_duration_ms));
    properties.insert(
        "autograde.hierarchy_ms".to_string(),
        json!(stats.hierarchy_duration_ms),
    );
    properties.insert(
        "autograde.analysis_ms".to_string(),
        json!(stats.analysis_duration_ms),
    );
    properties.insert("autograde.type_count".to_string(), json!(stats.type_count));
    properties.insert(
        "autograde.artifact_count".to_string(),
        json!(stats.artifact_count),
    );
    properties.insert(
        "autograde.referenced_type_count".to_string(),
        json!(stats.referenced_type_count),
    );
    properties.insert(
        "autograde.missing_type_count".to_string(),
        json!(stats.missing_type_count),
    );
    properties.insert(
        "autograde.problem_count".to_string(),
        json!(stats.problem_count),
    );

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .properties(PropertyBag::builder().additional_properties(properties).build())
        .build()
}

fn build_sarif(
    artifacts: Vec<Artifact>,
    invocation: Invocation,
    rules: Vec<ReportingDescriptor>,
    results: Vec<SarifResult>,
) -> Sarif {
    let driver = if rules.is_empty() {
        ToolComponent::builder()
            .name("autograde")
            .version(env!("CARGO_PKG_VERSION"))
            .build()
    } else {
        ToolComponent::builder()
            .name("autograde")
            .version(env!("CARGO_PKG_VERSION"))
            .rules(rules)
            .build()
    };
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn stats() -> InvocationStats {
        InvocationStats {
            scan_duration_ms: 0,
            hierarchy_duration_ms: 0,
            analysis_duration_ms: 0,
            type_count: 0,
            artifact_count: 0,
            referenced_type_count: 0,
            missing_type_count: 0,
            problem_count: 0,
        }
    }

    fn cli(arguments: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("autograde").chain(arguments.iter().copied()))
            .expect("parse arguments")
    }

    #[test]
    fn sarif_is_minimal_and_valid_shape() {
        let sarif = build_sarif(Vec::new(), build_invocation(&stats()), Vec::new(), Vec::new());
        let value = serde_json::to_value(&sarif).expect("serialize SARIF");

        assert_eq!(value["version"], "2.1.0");
        assert_eq!(value["$schema"], SCHEMA_URL);
        assert_eq!(value["runs"][0]["tool"]["driver"]["name"], "autograde");
        assert_eq!(value["runs"][0]["tool"]["driver"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(value["runs"][0]["tool"]["driver"].get("informationUri").is_none());
        assert!(
            value["runs"][0]["results"]
                .as_array()
                .expect("results array")
                .is_empty()
        );
        assert_eq!(
            value["runs"][0]["invocations"][0]["executionSuccessful"],
            true
        );
        assert_eq!(
            value["runs"][0]["invocations"][0]["properties"]["autograde.problem_count"],
            0
        );
    }

    #[test]
    fn problem_types_parse_case_insensitively() {
        let cli = cli(&[
            "--input",
            "model.json",
            "--problem-type",
            "use_format_string",
            "--problem-type",
            "MISSING_OVERRIDE_ANNOTATION",
        ]);

        assert_eq!(
            cli.problem_types,
            vec![
                ProblemType::UseFormatString,
                ProblemType::MissingOverrideAnnotation
            ]
        );
    }

    #[test]
    fn unknown_problem_types_are_rejected() {
        let result = Cli::try_parse_from([
            "autograde",
            "--input",
            "model.json",
            "--problem-type",
            "NOT_A_TYPE",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn run_writes_selected_results() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let input = temp_dir.path().join("model.json");
        let output = temp_dir.path().join("out.sarif");
        let model = json!({
            "files": [{
                "path": "Dog.java",
                "types": [
                    {
                        "name": "Dog",
                        "kind": "class",
                        "superclass": "Animal",
                        "methods": [{
                            "name": "speak",
                            "descriptor": "()V",
                            "span": { "start_line": 4, "end_line": 6 },
                            "body": []
                        }]
                    },
                    {
                        "name": "Animal",
                        "kind": "class",
                        "methods": [{ "name": "speak", "descriptor": "()V", "body": [] }]
                    }
                ]
            }]
        });
        fs::write(&input, model.to_string()).expect("write model");
        let cli = cli(&[
            "--input",
            input.to_str().expect("utf-8 path"),
            "--output",
            output.to_str().expect("utf-8 path"),
            "--problem-type",
            "MISSING_OVERRIDE_ANNOTATION",
        ]);

        run(&cli, None).expect("run");

        let sarif: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).expect("read SARIF"))
                .expect("parse SARIF");
        let results = sarif["runs"][0]["results"].as_array().expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["ruleId"], "MISSING_OVERRIDE_ANNOTATION");
        assert_eq!(results[0]["message"]["arguments"][0], "Dog.speak()");
        assert_eq!(
            sarif["runs"][0]["tool"]["driver"]["rules"]
                .as_array()
                .expect("rules")
                .len(),
            1
        );
    }

    #[test]
    fn run_rejects_missing_input() {
        let cli = cli(&["--input", "definitely/missing/model.json"]);

        assert!(run(&cli, None).is_err());
    }
}
