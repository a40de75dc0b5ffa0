// src/pipeline/fields.rs

use serde_json::Value;

use crate::data_model::{GeocodeRecord, GeocodeResult};

/// A nested object inside a result record, addressed by its key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    path: Vec<String>,
}

impl FieldGroup {
    /// The record itself.
    pub fn top_level() -> Self {
        FieldGroup { path: Vec::new() }
    }

    /// Parses a dotted path such as `annotations.FIPS`. `""` is the top level.
    pub fn parse(dotted: &str) -> Self {
        let path = dotted
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        FieldGroup { path }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}

/// Ordered list of field groups probed when resolving a derived column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookup {
    groups: Vec<FieldGroup>,
}

impl Default for FieldLookup {
    fn default() -> Self {
        FieldLookup::from_paths(["", "components", "geometry", "annotations.FIPS"])
    }
}

impl FieldLookup {
    pub fn new(groups: Vec<FieldGroup>) -> Self {
        FieldLookup { groups }
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        FieldLookup {
            groups: paths
                .into_iter()
                .map(|p| FieldGroup::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// First group containing `name` wins. A miss is an empty string.
    pub fn lookup(&self, record: &GeocodeRecord, name: &str) -> String {
        self.groups
            .iter()
            .filter_map(|group| record.group(group.path()))
            .find_map(|fields| fields.get(name))
            .map(render_value)
            .unwrap_or_default()
    }

    /// One value per requested column; all empty for a not-found result.
    pub fn derive(&self, result: &GeocodeResult, columns: &[String]) -> Vec<String> {
        match result.record() {
            Some(record) => columns.iter().map(|c| self.lookup(record, c)).collect(),
            None => vec![String::new(); columns.len()],
        }
    }
}

/// Renders a JSON value as a single CSV cell.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
