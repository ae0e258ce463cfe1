// Placeholder token substitution over settings values

use serde_json::Value;
use std::collections::HashMap;

/// Prepared replacement table. Longer tokens win when several match at the
/// same position.
pub(crate) struct TokenTable<'a> {
    entries: Vec<(&'a str, &'a str)>,
}

impl<'a> TokenTable<'a> {
    pub(crate) fn new(replacements: &'a HashMap<String, String>) -> Self {
        let mut entries: Vec<(&str, &str)> = replacements
            .iter()
            .filter(|(token, _)| !token.is_empty())
            .map(|(token, value)| (token.as_str(), value.as_str()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        Self { entries }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace tokens in a string in a single left-to-right pass.
    ///
    /// Inserted values are never re-scanned.
    pub(crate) fn replace_str(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        'outer: while !rest.is_empty() {
            for &(token, value) in &self.entries {
                if let Some(tail) = rest.strip_prefix(token) {
                    result.push_str(value);
                    rest = tail;
                    continue 'outer;
                }
            }

            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                result.push(c);
            }
            rest = chars.as_str();
        }

        result
    }

    /// Copy of `value` with every leaf string rewritten.
    pub(crate) fn replace_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.replace_str(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.replace_value(item)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.replace_value(item)))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }
}
