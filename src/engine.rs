use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use opentelemetry::KeyValue;
use rayon::prelude::*;
use serde_json::json;
use serde_sarif::sarif::{
    MultiformatMessageString, PropertyBag, ReportingDescriptor, Result as SarifResult,
};
use tracing::debug;

use crate::checks::{
    Check, CheckMetadata, Reporter, all_checks, problem_location, result_message,
};
use crate::hierarchy::{MethodHierarchy, build_method_hierarchy_with_timings};
use crate::ir::Model;
use crate::problem::{Problem, ProblemType};
use crate::telemetry::{Telemetry, with_span};

/// Inputs shared by checks: the model and its override hierarchy.
pub(crate) struct AnalysisContext {
    model: Model,
    hierarchy: MethodHierarchy,
    telemetry: Option<Arc<Telemetry>>,
}

/// Timing breakdown for context construction.
pub(crate) struct ContextTimings {
    pub(crate) hierarchy_duration_ms: u128,
    pub(crate) hierarchy_types_duration_ms: u128,
    pub(crate) hierarchy_methods_duration_ms: u128,
    pub(crate) hierarchy_lambdas_duration_ms: u128,
}

/// Analysis engine that executes the selected checks.
pub(crate) struct Engine {
    checks: Vec<Box<dyn Check>>,
    problem_types: Option<Vec<ProblemType>>,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Self::with_checks(all_checks())
    }

    pub(crate) fn with_checks(mut checks: Vec<Box<dyn Check>>) -> Self {
        checks.sort_by_key(|check| check.metadata().id);
        Self {
            checks,
            problem_types: None,
        }
    }

    /// Restrict the run to `problem_types`. Every requested type must be
    /// declared by some check; an empty selection keeps everything.
    pub(crate) fn select(mut self, problem_types: &[ProblemType]) -> Result<Self> {
        if problem_types.is_empty() {
            return Ok(self);
        }
        for problem_type in problem_types {
            let declared = self
                .checks
                .iter()
                .any(|check| check.metadata().problem_types.contains(problem_type));
            if !declared {
                bail!("no check reports problem type {problem_type}");
            }
        }
        self.checks.retain(|check| {
            check
                .metadata()
                .problem_types
                .iter()
                .any(|declared| problem_types.contains(declared))
        });
        self.problem_types = Some(problem_types.to_vec());
        Ok(self)
    }

    /// Run every check once on the rayon pool. Problems keep each check's
    /// discovery order and are merged in check-id order.
    pub(crate) fn analyze(self, context: &AnalysisContext) -> Result<EngineOutput> {
        let outcomes: Vec<Result<CheckOutcome>> = self
            .checks
            .into_par_iter()
            .map(|mut check| execute(context, check.as_mut()))
            .collect();

        let mut rules = Vec::new();
        let mut results = Vec::new();
        let mut problems = Vec::new();
        for outcome in outcomes {
            let outcome = outcome?;
            rules.push(rule_descriptor(&outcome.metadata));
            for problem in outcome.problems {
                let enabled = self
                    .problem_types
                    .as_ref()
                    .is_none_or(|types| types.contains(&problem.problem_type()));
                if enabled {
                    results.push(sarif_result(&problem));
                    problems.push(problem);
                }
            }
        }

        Ok(EngineOutput {
            rules,
            results,
            problems,
        })
    }
}

/// Aggregated output of check execution.
pub(crate) struct EngineOutput {
    pub(crate) rules: Vec<ReportingDescriptor>,
    pub(crate) results: Vec<SarifResult>,
    pub(crate) problems: Vec<Problem>,
}

struct CheckOutcome {
    metadata: CheckMetadata,
    problems: Vec<Problem>,
}

fn execute(context: &AnalysisContext, check: &mut dyn Check) -> Result<CheckOutcome> {
    let metadata = check.metadata();
    let mut reporter = Reporter::new(&metadata);
    let check_span_attributes = [KeyValue::new("autograde.check_id", metadata.id)];
    context
        .with_span(
            &format!("check:{}", metadata.id),
            &check_span_attributes,
            || check.run(context, &mut reporter),
        )
        .with_context(|| format!("check {} failed", metadata.id))?;
    if reporter.dropped() > 0 {
        debug!(
            check = metadata.id,
            dropped = reporter.dropped(),
            "dropped findings beyond maximum"
        );
    }
    let problems = reporter.into_problems();
    for problem in &problems {
        debug!(
            check = metadata.id,
            location = %problem.display_location(),
            "problem found"
        );
    }
    if let Some(problem) = problems
        .iter()
        .find(|problem| !metadata.problem_types.contains(&problem.problem_type()))
    {
        bail!(
            "check {} reported undeclared problem type {}",
            metadata.id,
            problem.problem_type()
        );
    }
    Ok(CheckOutcome { metadata, problems })
}

/// Run `checks` against `model` and return their problems.
#[cfg_attr(not(test), allow(dead_code))]
pub(crate) fn run_checks(model: Model, checks: Vec<Box<dyn Check>>) -> Result<Vec<Problem>> {
    let (context, _) = build_context_with_timings(model, None);
    let output = Engine::with_checks(checks).analyze(&context)?;
    Ok(output.problems)
}

#[cfg(test)]
pub(crate) fn build_context(model: Model) -> AnalysisContext {
    let (context, _) = build_context_with_timings(model, None);
    context
}

pub(crate) fn build_context_with_timings(
    model: Model,
    telemetry: Option<Arc<Telemetry>>,
) -> (AnalysisContext, ContextTimings) {
    let hierarchy_started_at = Instant::now();
    let (hierarchy, hierarchy_timings) = with_span(
        telemetry.as_deref(),
        "method_hierarchy",
        &[KeyValue::new("autograde.phase", "method_hierarchy")],
        || build_method_hierarchy_with_timings(&model),
    );
    let timings = ContextTimings {
        hierarchy_duration_ms: hierarchy_started_at.elapsed().as_millis(),
        hierarchy_types_duration_ms: hierarchy_timings.types_duration_ms,
        hierarchy_methods_duration_ms: hierarchy_timings.methods_duration_ms,
        hierarchy_lambdas_duration_ms: hierarchy_timings.lambdas_duration_ms,
    };
    let context = AnalysisContext {
        model,
        hierarchy,
        telemetry,
    };
    (context, timings)
}

fn rule_descriptor(metadata: &CheckMetadata) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(metadata.id)
        .name(metadata.name)
        .short_description(
            MultiformatMessageString::builder()
                .text(metadata.description)
                .build(),
        )
        .build()
}

fn sarif_result(problem: &Problem) -> SarifResult {
    let mut properties = BTreeMap::new();
    properties.insert(
        "problemType".to_string(),
        json!(problem.problem_type().as_str()),
    );
    properties.insert("parameters".to_string(), json!(problem.message().params()));
    SarifResult::builder()
        .rule_id(problem.check())
        .message(result_message(problem.message()))
        .locations(vec![problem_location(problem.position())])
        .properties(
            PropertyBag::builder()
                .additional_properties(properties)
                .build(),
        )
        .build()
}

impl AnalysisContext {
    pub(crate) fn model(&self) -> &Model {
        &self.model
    }

    pub(crate) fn hierarchy(&self) -> &MethodHierarchy {
        &self.hierarchy
    }

    pub(crate) fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_deref()
    }

    pub(crate) fn with_span<T, F>(&self, name: &str, attributes: &[KeyValue], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        with_span(self.telemetry(), name, attributes, f)
    }
}
