use anyhow::Result;
use serde_sarif::sarif::{
    ArtifactLocation, Location, Message as SarifMessage, PhysicalLocation, Region,
};
use tracing::debug;

use crate::engine::AnalysisContext;
use crate::problem::{CodePosition, Message, Problem, ProblemType};
use crate::visit::{Cursor, Node};

// Check modules are auto-discovered by build.rs; do not edit manually.
include!(concat!(env!("OUT_DIR"), "/check_modules.rs"));

/// Metadata describing a check.
#[derive(Clone, Debug)]
pub(crate) struct CheckMetadata {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    /// Problem types the check may emit.
    pub(crate) problem_types: &'static [ProblemType],
    /// Findings beyond this count are dropped silently.
    pub(crate) maximum_problems: Option<usize>,
}

/// Check interface for analysis execution. Each instance serves one run, so
/// accumulator state lives in the instance.
pub(crate) trait Check: Send {
    fn metadata(&self) -> CheckMetadata;
    fn run(&mut self, context: &AnalysisContext, reporter: &mut Reporter) -> Result<()>;
}

/// Wrapper struct for check factory functions to enable inventory collection.
pub(crate) struct CheckFactory(pub fn() -> Box<dyn Check>);

inventory::collect!(CheckFactory);

/// Macro to register a check implementation.
///
/// Usage: `register_check!(CheckName);`
/// This macro creates a factory function and registers it with inventory.
#[macro_export]
macro_rules! register_check {
    ($check_type:ty) => {
        inventory::submit! {
            $crate::checks::CheckFactory(|| Box::new(<$check_type>::default()))
        }
    };
}

/// Fresh instances of every registered check, ordered by id.
pub(crate) fn all_checks() -> Vec<Box<dyn Check>> {
    let mut checks: Vec<Box<dyn Check>> = inventory::iter::<CheckFactory>
        .into_iter()
        .map(|factory| (factory.0)())
        .collect();
    checks.sort_by_key(|check| check.metadata().id);
    checks
}

/// Collects the findings of one check run and enforces its cap.
pub(crate) struct Reporter {
    check: &'static str,
    maximum_problems: Option<usize>,
    problems: Vec<Problem>,
    dropped: usize,
}

impl Reporter {
    pub(crate) fn new(metadata: &CheckMetadata) -> Self {
        Self {
            check: metadata.id,
            maximum_problems: metadata.maximum_problems,
            problems: Vec::new(),
            dropped: 0,
        }
    }

    /// Report a finding at `node` and return whether it was recorded. Nodes
    /// without any positioned ancestor cannot be reported and are skipped.
    pub(crate) fn emit(
        &mut self,
        cursor: &Cursor<'_>,
        node: Node<'_>,
        message: Message,
        problem_type: ProblemType,
    ) -> bool {
        match cursor.position(node) {
            Some(position) => self.emit_at(position, message, problem_type),
            None => {
                debug!(check = self.check, "skipping finding without source position");
                false
            }
        }
    }

    /// Record a finding unless the cap is reached.
    pub(crate) fn emit_at(
        &mut self,
        position: CodePosition,
        message: Message,
        problem_type: ProblemType,
    ) -> bool {
        if self.is_full() {
            self.dropped += 1;
            return false;
        }
        self.problems
            .push(Problem::new(self.check, position, message, problem_type));
        true
    }

    pub(crate) fn is_full(&self) -> bool {
        self.maximum_problems
            .is_some_and(|maximum| self.problems.len() >= maximum)
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped
    }

    pub(crate) fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

pub(crate) fn problem_location(position: &CodePosition) -> Location {
    let artifact_location = ArtifactLocation::builder()
        .uri(position.file.clone())
        .build();
    let region = Region::builder()
        .start_line(i64::from(position.start_line))
        .end_line(i64::from(position.end_line))
        .build();
    let physical = PhysicalLocation::builder()
        .artifact_location(artifact_location)
        .region(region)
        .build();
    Location::builder().physical_location(physical).build()
}

/// SARIF message carrying the template id, its argument values and a
/// plain-text fallback.
pub(crate) fn result_message(message: &Message) -> SarifMessage {
    let arguments: Vec<String> = message.params().values().cloned().collect();
    let text = if message.params().is_empty() {
        message.key().to_string()
    } else {
        let rendered = message
            .params()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} ({rendered})", message.key())
    };
    SarifMessage::builder()
        .id(message.key())
        .text(text)
        .arguments(arguments)
        .build()
}
