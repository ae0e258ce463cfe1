use crate::error::{ParseError, ValidationError};
use crate::types::{Settings, StepDescriptor, WorkflowDefinition};
use crate::workflow::dag::DependencyGraph;
use crate::workflow::tokens::TokenTable;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDescriptor>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse a definition from its structured representation.
    pub fn load(raw: &Value) -> Result<Self, ParseError> {
        let object = raw.as_object().ok_or(ParseError::NotAnObject {
            found: json_type_name(raw),
        })?;

        let name = match object.get("name") {
            None | Some(Value::Null) => return Err(ParseError::MissingField { field: "name" }),
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: "name",
                    expected: "a string",
                })
            }
        };

        let description = match object.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(description)) => Some(description.clone()),
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: "description",
                    expected: "a string",
                })
            }
        };

        let raw_steps = match object.get("steps") {
            None | Some(Value::Null) => return Err(ParseError::MissingField { field: "steps" }),
            Some(Value::Array(steps)) => steps,
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: "steps",
                    expected: "an array",
                })
            }
        };

        let steps = raw_steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                if !step.is_object() {
                    return Err(ParseError::InvalidStep {
                        index,
                        reason: format!("expected an object, found {}", json_type_name(step)),
                    });
                }
                StepDescriptor::deserialize(step).map_err(|e| ParseError::InvalidStep {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(workflow = %name, steps = steps.len(), "Loaded workflow definition");

        Ok(Self {
            name,
            description,
            steps,
        })
    }

    /// Parse a definition from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ParseError> {
        let raw: Value = serde_json::from_str(text)?;
        Self::load(&raw)
    }

    /// Read and parse a definition file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Return a copy with placeholder tokens replaced in every settings string.
    ///
    /// Tokens missing from `replacements` are left as they are.
    pub fn substitute_tokens(&self, replacements: &HashMap<String, String>) -> Self {
        let tokens = TokenTable::new(replacements);
        if tokens.is_empty() {
            return self.clone();
        }

        let steps = self
            .steps
            .iter()
            .map(|step| {
                step.with_settings(
                    step.settings()
                        .iter()
                        .map(|(key, value)| (key.clone(), tokens.replace_value(value)))
                        .collect(),
                )
            })
            .collect();

        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            steps,
        }
    }

    /// Build and check the dependency graph, reporting every issue found.
    pub fn validate(&self) -> Result<DependencyGraph<'_>, ValidationError> {
        DependencyGraph::build(self)
    }

    /// Look up a step by its unique name. With duplicate names the first
    /// match is returned.
    pub fn step(&self, unique_name: &str) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.unique_name() == unique_name)
    }

    /// Wire representation used by the remote service.
    pub fn to_value(&self) -> Value {
        let steps: Vec<Value> = self
            .steps
            .iter()
            .map(|step| {
                json!({
                    "step_key": step.step_key(),
                    "unique_name": step.unique_name(),
                    "settings": step.settings(),
                    "depends_on": step.depends_on(),
                })
            })
            .collect();

        let mut value = json!({
            "name": self.name,
            "steps": steps,
        });
        if let Some(description) = &self.description {
            value["description"] = Value::String(description.clone());
        }
        value
    }

    /// Two-step "parse then extract" definition used when none is supplied.
    pub fn builtin_simple() -> Result<Self, ValidationError> {
        let mut parse_settings = Settings::new();
        parse_settings.insert("max_pages".to_string(), json!(10));
        parse_settings.insert("output_format".to_string(), json!("json"));

        let mut extract_settings = Settings::new();
        extract_settings.insert(
            "page_schema".to_string(),
            json!({
                "title": {"type": "string"},
                "author": {"type": "string"},
                "summary": {"type": "string"}
            }),
        );

        let steps = vec![
            StepDescriptor::new(
                "marker_parse",
                "parse_document",
                parse_settings,
                Vec::<String>::new(),
            )?,
            StepDescriptor::new(
                "marker_extract",
                "extract_metadata",
                extract_settings,
                ["parse_document"],
            )?,
        ];

        Ok(Self::new("Simple Parse and Extract", steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Value {
        json!({
            "name": "Compare segmentation",
            "description": "Parse once, segment twice",
            "steps": [
                {
                    "step_key": "marker_parse",
                    "unique_name": "parse",
                    "settings": {"max_pages": 10, "api_key": "YOUR_API_KEY"},
                    "depends_on": []
                },
                {
                    "step_key": "marker_segment",
                    "unique_name": "segment",
                    "settings": {
                        "segmentation_schema": "{\"Intro\": \"YOUR_SCHEMA\"}",
                        "headers": ["Bearer YOUR_API_KEY"]
                    },
                    "depends_on": ["parse"]
                }
            ]
        })
    }

    #[test]
    fn test_load_definition() {
        let def = WorkflowDefinition::load(&sample()).unwrap();

        assert_eq!(def.name, "Compare segmentation");
        assert_eq!(def.description.as_deref(), Some("Parse once, segment twice"));
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[1].depends_on(), vec!["parse"]);
        assert_eq!(def.step("parse").unwrap().step_key(), "marker_parse");
    }

    #[test]
    fn test_load_missing_fields() {
        let err = WorkflowDefinition::load(&json!({"steps": []})).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "name" }));

        let err = WorkflowDefinition::load(&json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "steps" }));

        let err = WorkflowDefinition::load(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject { found: "an array" }));
    }

    #[test]
    fn test_load_wrong_field_types() {
        let err = WorkflowDefinition::load(&json!({"name": 5, "steps": []})).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "name", .. }));

        let err = WorkflowDefinition::load(&json!({"name": "x", "steps": {}})).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "steps", .. }));
    }

    #[test]
    fn test_load_invalid_step_names_index() {
        let raw = json!({
            "name": "x",
            "steps": [
                {"step_key": "marker_parse", "unique_name": "parse"},
                {"step_key": "", "unique_name": "segment"}
            ]
        });

        match WorkflowDefinition::load(&raw).unwrap_err() {
            ParseError::InvalidStep { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("step_key"));
            }
            other => panic!("unexpected error: {}", other),
        }

        let raw = json!({"name": "x", "steps": ["parse"]});
        assert!(matches!(
            WorkflowDefinition::load(&raw).unwrap_err(),
            ParseError::InvalidStep { index: 0, .. }
        ));

        let raw = json!({"name": "x", "steps": [{"unique_name": "parse"}]});
        assert!(matches!(
            WorkflowDefinition::load(&raw).unwrap_err(),
            ParseError::InvalidStep { index: 0, .. }
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", sample()).unwrap();

        let def = WorkflowDefinition::from_path(file.path()).unwrap();
        assert_eq!(def.steps.len(), 2);

        let err = WorkflowDefinition::from_path("/nonexistent/definition.json").unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_from_json_str_rejects_bad_json() {
        let err = WorkflowDefinition::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_substitute_tokens() {
        let def = WorkflowDefinition::load(&sample()).unwrap();
        let replacements: HashMap<String, String> =
            [("YOUR_API_KEY".to_string(), "sk-live".to_string())]
                .into_iter()
                .collect();

        let substituted = def.substitute_tokens(&replacements);

        assert_eq!(substituted.steps[0].settings()["api_key"], "sk-live");
        assert_eq!(substituted.steps[1].settings()["headers"][0], "Bearer sk-live");
        // Unmapped tokens stay verbatim
        assert_eq!(
            substituted.steps[1].settings()["segmentation_schema"],
            "{\"Intro\": \"YOUR_SCHEMA\"}"
        );
        assert_eq!(substituted.steps[0].settings()["max_pages"], 10);
    }

    #[test]
    fn test_substitute_tokens_leaves_input_untouched() {
        let def = WorkflowDefinition::load(&sample()).unwrap();
        let before = def.clone();
        let replacements: HashMap<String, String> =
            [("YOUR_API_KEY".to_string(), "sk-live".to_string())]
                .into_iter()
                .collect();

        let _ = def.substitute_tokens(&replacements);
        assert_eq!(def, before);
    }

    #[test]
    fn test_substitute_unknown_tokens_is_identity() {
        let def = WorkflowDefinition::load(&sample()).unwrap();
        let replacements: HashMap<String, String> =
            [("NOT_PRESENT".to_string(), "x".to_string())]
                .into_iter()
                .collect();

        assert_eq!(def.substitute_tokens(&replacements), def);
        assert_eq!(def.substitute_tokens(&HashMap::new()), def);
    }

    #[test]
    fn test_to_value_round_trips() {
        let def = WorkflowDefinition::load(&sample()).unwrap();
        let value = def.to_value();

        assert_eq!(value["steps"][1]["depends_on"], json!(["parse"]));
        assert_eq!(WorkflowDefinition::load(&value).unwrap(), def);
        assert_eq!(serde_json::to_value(&def).unwrap(), value);
    }

    #[test]
    fn test_builtin_simple_is_valid() {
        let def = WorkflowDefinition::builtin_simple().unwrap();
        let graph = def.validate().unwrap();
        assert_eq!(
            graph.layers(),
            vec![vec!["parse_document"], vec!["extract_metadata"]]
        );
    }

    #[test]
    fn test_builtin_simple_survives_decoding() {
        let def = WorkflowDefinition::builtin_simple().unwrap();
        assert_eq!(WorkflowDefinition::load(&def.to_value()).unwrap(), def);
        assert_eq!(def.steps[0].settings()["max_pages"], 10);
        assert!(!def.steps[0].has_dependencies());
    }

    #[test]
    fn test_substitute_tokens_keeps_step_identity() {
        let def = WorkflowDefinition::load(&sample()).unwrap();
        let replacements: HashMap<String, String> =
            [("YOUR_API_KEY".to_string(), "sk-live".to_string())]
                .into_iter()
                .collect();

        let substituted = def.substitute_tokens(&replacements);
        for (before, after) in def.steps.iter().zip(&substituted.steps) {
            assert_eq!(before.step_key(), after.step_key());
            assert_eq!(before.unique_name(), after.unique_name());
            assert_eq!(before.depends_on(), after.depends_on());
        }
    }
}
