use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use opentelemetry::KeyValue;
use serde_json::Value;
use serde_sarif::sarif::{Artifact, ArtifactLocation, ArtifactRoles};

use crate::ir::Model;
use crate::telemetry::{Telemetry, with_span};

/// Loaded model plus the SARIF artifacts describing where it came from.
pub(crate) struct ScanOutput {
    pub(crate) artifacts: Vec<Artifact>,
    pub(crate) type_count: usize,
    pub(crate) model: Model,
}

/// Load a JSON model file. The model file is the analysis target; every
/// source file it describes becomes a child artifact.
pub(crate) fn scan_input(input: &Path, telemetry: Option<&Telemetry>) -> Result<ScanOutput> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let model = with_span(
        telemetry,
        "scan.model",
        &[
            KeyValue::new("autograde.input", input.display().to_string()),
            KeyValue::new("autograde.input_bytes", text.len() as i64),
        ],
        || parse_model(&text),
    )
    .with_context(|| format!("failed to load model from {}", input.display()))?;

    let roles = vec![
        serde_json::to_value(ArtifactRoles::AnalysisTarget)
            .context("serialize artifact role")?,
    ];
    let mut artifacts = Vec::new();
    let model_index = push_artifact(
        path_to_uri(input),
        Some(text.len() as u64),
        None,
        Some(roles),
        &mut artifacts,
    );
    for file in &model.files {
        push_artifact(file.path.clone(), None, Some(model_index), None, &mut artifacts);
    }

    Ok(ScanOutput {
        artifacts,
        type_count: model.type_count(),
        model,
    })
}

/// Deserialize and index a model. Errors name the JSON path of the offending element.
pub(crate) fn parse_model(text: &str) -> Result<Model> {
    let deserializer = &mut serde_json::Deserializer::from_str(text);
    let model: Model = serde_path_to_error::deserialize(deserializer)
        .map_err(|err| anyhow!("invalid model at {}: {}", err.path(), err.inner()))?;
    model.indexed()
}

fn push_artifact(
    uri: String,
    len: Option<u64>,
    parent_index: Option<i64>,
    roles: Option<Vec<Value>>,
    artifacts: &mut Vec<Artifact>,
) -> i64 {
    let location = ArtifactLocation::builder().uri(uri).build();
    let artifact = match (len, parent_index, roles) {
        (Some(len), None, Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .roles(roles)
            .build(),
        (Some(len), None, None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .build(),
        (_, Some(parent_index), _) => Artifact::builder()
            .location(location)
            .parent_index(parent_index)
            .build(),
        (None, None, _) => Artifact::builder().location(location).build(),
    };
    let index = artifacts.len() as i64;
    artifacts.push(artifact);
    index
}

fn path_to_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("file://{}", absolute.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::test_harness::analyze_json;

    fn sample_model() -> Value {
        json!({
            "files": [{
                "path": "com/example/Greeter.java",
                "types": [
                    {
                        "name": "com/example/Greeter",
                        "kind": "class",
                        "interfaces": ["com/example/Speaker"],
                        "span": { "start_line": 3, "end_line": 20 },
                        "methods": [{
                            "name": "speak",
                            "descriptor": "(Ljava/lang/String;I)V",
                            "span": { "start_line": 5, "end_line": 9 },
                            "body": [{
                                "stmt": "expression",
                                "span": { "start_line": 7 },
                                "expr": {
                                    "expr": "binary",
                                    "op": "plus",
                                    "type": "Ljava/lang/String;",
                                    "lhs": {
                                        "expr": "binary",
                                        "op": "plus",
                                        "type": "Ljava/lang/String;",
                                        "lhs": {
                                            "expr": "binary",
                                            "op": "plus",
                                            "type": "Ljava/lang/String;",
                                            "lhs": {
                                                "expr": "literal",
                                                "value": { "kind": "string", "value": "Hi " }
                                            },
                                            "rhs": {
                                                "expr": "local",
                                                "name": "name",
                                                "type": "Ljava/lang/String;"
                                            }
                                        },
                                        "rhs": {
                                            "expr": "literal",
                                            "value": { "kind": "string", "value": ", you are " }
                                        }
                                    },
                                    "rhs": { "expr": "local", "name": "age", "type": "I" }
                                }
                            }]
                        }]
                    },
                    {
                        "name": "com/example/Speaker",
                        "kind": "interface",
                        "methods": [{ "name": "speak", "descriptor": "(Ljava/lang/String;I)V" }]
                    }
                ]
            }]
        })
    }

    #[test]
    fn scan_input_records_model_and_source_artifacts() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("model.json");
        fs::write(&path, sample_model().to_string()).expect("write model");

        let scan = scan_input(&path, None).expect("scan");

        assert_eq!(scan.type_count, 2);
        let artifacts = serde_json::to_value(&scan.artifacts).expect("serialize artifacts");
        assert_eq!(artifacts[0]["roles"][0], "analysisTarget");
        assert!(
            artifacts[0]["location"]["uri"]
                .as_str()
                .expect("uri")
                .ends_with("model.json")
        );
        assert_eq!(artifacts[1]["location"]["uri"], "com/example/Greeter.java");
        assert_eq!(artifacts[1]["parentIndex"], 0);
    }

    #[test]
    fn parse_errors_name_the_offending_path() {
        let text = json!({
            "files": [{
                "path": "A.java",
                "types": [{ "name": "A", "kind": "struct" }]
            }]
        })
        .to_string();

        let error = parse_model(&text).err().expect("invalid kind");

        assert!(error.to_string().contains("files[0].types[0].kind"), "{error}");
    }

    #[test]
    fn duplicate_types_are_rejected() {
        let text = json!({
            "files": [
                { "path": "A.java", "types": [{ "name": "A", "kind": "class" }] },
                { "path": "B.java", "types": [{ "name": "A", "kind": "class" }] }
            ]
        })
        .to_string();

        assert!(parse_model(&text).is_err());
    }

    #[test]
    fn missing_input_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");

        assert!(scan_input(&temp_dir.path().join("absent.json"), None).is_err());
    }

    #[test]
    fn analysis_of_loaded_model_reports_all_checks() {
        let output = analyze_json(&sample_model()).expect("analyze");

        let mut rule_ids: Vec<_> = output.rules.iter().map(|rule| rule.id.clone()).collect();
        rule_ids.sort();
        assert_eq!(
            rule_ids,
            vec![
                "COMMON_REIMPLEMENTATION_ARRAYS_FILL",
                "DO_NOT_HAVE_CONSTANTS_CLASS",
                "MISSING_OVERRIDE_ANNOTATION",
                "USE_FORMAT_STRING",
            ]
        );
        let found: Vec<(&str, String)> = output
            .problems
            .iter()
            .map(|problem| (problem.check(), problem.display_location()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("MISSING_OVERRIDE_ANNOTATION", "com/example/Greeter.java:5-9".to_string()),
                ("USE_FORMAT_STRING", "com/example/Greeter.java:7".to_string()),
            ]
        );
        assert_eq!(
            output.problems[1].message().param("formatted"),
            Some("\"Hi %s, you are %d\".formatted(name, age)")
        );
    }
}
