//! `${{VAR_NAME}}` placeholder scanning and substitution.
//!
//! Placeholders appear in the string values of a step's `with`
//! configuration and are resolved against the accumulated environment
//! before that step runs. Unknown placeholders are left intact by
//! [`substitute`] so the executor can report them by name.

use crate::environment::EnvMap;
use regex::Regex;
use std::sync::OnceLock;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::unwrap_used)] // the pattern is a literal and always compiles
fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\$\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap())
}

/// Returns the placeholder names referenced anywhere in a configuration
/// tree, in first-occurrence order, de-duplicated.
#[must_use]
pub fn referenced(value: &serde_json::Value) -> Vec<String> {
    let mut names = Vec::new();
    collect(value, &mut names);
    names
}

/// Returns the referenced placeholder names with no binding in `env`.
#[must_use]
pub fn unresolved(value: &serde_json::Value, env: &EnvMap) -> Vec<String> {
    referenced(value)
        .into_iter()
        .filter(|name| !env.contains_key(name))
        .collect()
}

/// Substitutes every bound placeholder in a configuration tree.
///
/// String values are rewritten in place; placeholders with no binding are
/// left intact. Object keys and non-string values are untouched.
#[must_use]
pub fn substitute(value: &serde_json::Value, env: &EnvMap) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => {
            let replaced = placeholder_re().replace_all(s, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                env.get(name)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            });
            serde_json::Value::String(replaced.into_owned())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute(v, env)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, env)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn collect(value: &serde_json::Value, names: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            for caps in placeholder_re().captures_iter(s) {
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect(item, names);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect(item, names);
            }
        }
        _ => {}
    }
}
