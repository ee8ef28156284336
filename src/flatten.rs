//! JSON response flattening
//!
//! Turns a nested OData response into one record per scalar leaf, with a
//! dot/bracket path such as `d.results[0].userId`.

use serde_json::Value;

/// Array elements sampled per array
pub const SAMPLE_ARRAY_LIMIT: usize = 3;

/// One leaf value of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedField {
    pub path: String,
    pub name: String,
    /// `None` for JSON null
    pub sample: Option<String>,
    /// Number of keys and indices between the root and the leaf
    pub depth: usize,
    pub entity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Flattener {
    root_entity: Option<String>,
    skip_keys: Vec<String>,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            root_entity: None,
            skip_keys: Vec::new(),
        }
    }
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity guessed for top-level fields
    pub fn root_entity(mut self, entity: impl Into<String>) -> Self {
        self.root_entity = Some(entity.into());
        self
    }

    /// Ignore a key and everything below it
    pub fn skip_key(mut self, key: impl Into<String>) -> Self {
        self.skip_keys.push(key.into());
        self
    }

    pub fn flatten(&self, value: &Value) -> Vec<FlattenedField> {
        let mut fields = Vec::new();
        self.visit(value, "", "", 0, self.root_entity.as_deref(), &mut fields);
        fields
    }

    fn visit<'a>(
        &'a self,
        value: &'a Value,
        path: &str,
        name: &str,
        depth: usize,
        entity: Option<&'a str>,
        out: &mut Vec<FlattenedField>,
    ) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if self.skip_keys.iter().any(|k| k == key) {
                        continue;
                    }
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    // Descending into `fooNav` moves to entity `foo`
                    let child_entity = match child {
                        Value::Object(_) | Value::Array(_) => navigation_entity(key).or(entity),
                        _ => entity,
                    };
                    self.visit(child, &child_path, key, depth + 1, child_entity, out);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().take(SAMPLE_ARRAY_LIMIT).enumerate() {
                    let child_path = format!("{}[{}]", path, index);
                    self.visit(item, &child_path, name, depth + 1, entity, out);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                // A bare scalar document has no field name to report
                if depth == 0 {
                    return;
                }
                out.push(FlattenedField {
                    path: path.to_string(),
                    name: name.to_string(),
                    sample: sample_text(value),
                    depth,
                    entity: entity.map(str::to_string),
                });
            }
        }
    }
}

fn navigation_entity(key: &str) -> Option<&str> {
    key.strip_suffix("Nav").filter(|entity| !entity.is_empty())
}

fn sample_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Flatten with default options
pub fn flatten(value: &Value) -> Vec<FlattenedField> {
    Flattener::new().flatten(value)
}

/// Copy of `value` with every array cut to its first `limit` elements
pub fn limit_sample(value: &Value, limit: usize) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), limit_sample(v, limit)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(limit)
                .map(|v| limit_sample(v, limit))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}
