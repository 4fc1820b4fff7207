//! Environment variable overrides of configuration leaves.
//!
//! Every leaf of a section tree may be replaced by a variable named after
//! the section and the path to the leaf, upper-cased and joined with `_`.
//! `-` and `.` in either part become `_`.
//!
//! ```text
//! section "config", key nested.age   →  CONFIG_NESTED_AGE
//! section "health-check", key timeout_secs → HEALTH_CHECK_TIMEOUT_SECS
//! ```
//!
//! The replacement string is coerced to the type of the value it replaces,
//! so overriding a number with `"18"` still deserializes into an integer
//! field. Arrays take a comma-separated list whose items are coerced like
//! the array's first element. Keys that exist only in the environment are
//! not added.

use serde_json::{Map, Number, Value};

fn normalize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Name of the variable overriding `path` inside `section`.
pub fn override_name(section: &str, path: &[&str]) -> String {
    let mut name = normalize(section);
    for part in path {
        name.push('_');
        name.push_str(&normalize(part));
    }
    name
}

/// Apply overrides from the process environment. Returns how many leaves
/// were replaced.
pub(crate) fn apply_overrides(section: &str, tree: &mut Map<String, Value>) -> usize {
    apply_with(section, tree, |name| std::env::var(name).ok())
}

pub(crate) fn apply_with<F>(section: &str, tree: &mut Map<String, Value>, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    walk(&normalize(section), tree, &lookup, &mut applied);
    applied
}

fn walk<F>(prefix: &str, map: &mut Map<String, Value>, lookup: &F, applied: &mut usize)
where
    F: Fn(&str) -> Option<String>,
{
    for (key, value) in map.iter_mut() {
        let name = format!("{}_{}", prefix, normalize(key));
        match value {
            Value::Object(child) if !child.is_empty() => walk(&name, child, lookup, applied),
            leaf => {
                if let Some(raw) = lookup(&name) {
                    *leaf = coerce(raw, leaf);
                    *applied += 1;
                }
            }
        }
    }
}

/// Convert `raw` to the JSON type of `current`, falling back to a string.
pub(crate) fn coerce(raw: String, current: &Value) -> Value {
    let trimmed = raw.trim();
    match current {
        Value::Bool(_) => match trimmed.parse::<bool>() {
            Ok(b) => Value::Bool(b),
            Err(_) => Value::String(raw),
        },
        Value::Number(n) if n.is_f64() => match parse_float(trimmed) {
            Some(n) => Value::Number(n),
            None => Value::String(raw),
        },
        Value::Number(_) => {
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::from(i)
            } else if let Ok(u) = trimmed.parse::<u64>() {
                Value::from(u)
            } else if let Some(n) = parse_float(trimmed) {
                Value::Number(n)
            } else {
                Value::String(raw)
            }
        }
        Value::Array(items) => {
            // Items take the type of the existing first element.
            let template = items.first().cloned().unwrap_or_else(|| Value::String(String::new()));
            Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| coerce(item.to_owned(), &template))
                    .collect(),
            )
        }
        _ => Value::String(raw),
    }
}

fn parse_float(s: &str) -> Option<Number> {
    s.parse::<f64>().ok().and_then(Number::from_f64)
}
