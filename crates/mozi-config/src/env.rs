//! Environment variable fallback and `${VAR}` reference resolution.
//!
//! Mirrors the teacher's two-phase approach: (1) after file layering, fill
//! in any still-unset leaf with an `MOZI_*`-prefixed env var named after its
//! dotted path; (2) resolve `${VAR}` placeholders inside string values
//! against the full process environment.

use std::collections::HashMap;

/// Collect the process environment into a lookup map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Apply `MOZI_<DOTTED_PATH>` fallbacks for any leaf not already set.
/// Returns the number of fields filled in this way.
pub fn apply_env_fallbacks(merged: &mut toml::Value, env_vars: &HashMap<String, String>) -> usize {
    let mut count = 0;
    apply_env_fallbacks_inner(merged, "", env_vars, &mut count);
    count
}

fn apply_env_fallbacks_inner(
    value: &mut toml::Value,
    prefix: &str,
    env_vars: &HashMap<String, String>,
    count: &mut usize,
) {
    if let toml::Value::Table(table) = value {
        let keys: Vec<String> = table.keys().cloned().collect();
        for key in keys {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if let Some(child) = table.get_mut(&key) {
                if matches!(child, toml::Value::Table(_)) {
                    apply_env_fallbacks_inner(child, &path, env_vars, count);
                    continue;
                }
            }
            let env_name = format!("MOZI_{}", path.to_uppercase().replace('.', "_"));
            if let Some(raw) = env_vars.get(&env_name) {
                let parsed = parse_scalar(raw);
                table.insert(key, parsed);
                *count += 1;
            }
        }
    }
}

fn parse_scalar(raw: &str) -> toml::Value {
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    toml::Value::String(raw.to_owned())
}

/// Resolve `${VAR}` placeholders in every string leaf against `env_vars`.
/// A reference to an unset variable is left untouched rather than erroring.
pub fn resolve_env_references(value: &mut toml::Value, env_vars: &HashMap<String, String>) {
    match value {
        toml::Value::String(s) => {
            if s.contains("${") {
                *s = substitute(s, env_vars);
            }
        },
        toml::Value::Table(table) => {
            for v in table.values_mut() {
                resolve_env_references(v, env_vars);
            }
        },
        toml::Value::Array(arr) => {
            for v in arr.iter_mut() {
                resolve_env_references(v, env_vars);
            }
        },
        _ => {},
    }
}

fn substitute(input: &str, env_vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            let var_name = &after[..end];
            if let Some(val) = env_vars.get(var_name) {
                out.push_str(val);
            } else {
                out.push_str("${");
                out.push_str(var_name);
                out.push('}');
            }
            rest = &after[end + 1..];
        } else {
            out.push_str("${");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_fallback_fills_unset_leaf() {
        let mut merged: toml::Value = toml::from_str("[storage]\npath = \"mozi.db\"\n").unwrap();
        let mut env = HashMap::new();
        env.insert("MOZI_STORAGE_BUSY_TIMEOUT_MS".to_owned(), "9000".to_owned());
        let count = apply_env_fallbacks(&mut merged, &env);
        assert_eq!(count, 1);
        assert_eq!(merged["storage"]["busy_timeout_ms"].as_integer(), Some(9000));
    }

    #[test]
    fn env_fallback_does_not_override_existing() {
        let mut merged: toml::Value = toml::from_str("[storage]\npath = \"mozi.db\"\n").unwrap();
        let mut env = HashMap::new();
        env.insert("MOZI_STORAGE_PATH".to_owned(), "other.db".to_owned());
        apply_env_fallbacks(&mut merged, &env);
        assert_eq!(merged["storage"]["path"].as_str(), Some("mozi.db"));
    }

    #[test]
    fn resolves_var_reference() {
        let mut value = toml::Value::String("${HOME}/.mozi/mozi.db".to_owned());
        let mut env = HashMap::new();
        env.insert("HOME".to_owned(), "/root".to_owned());
        resolve_env_references(&mut value, &env);
        assert_eq!(value.as_str(), Some("/root/.mozi/mozi.db"));
    }

    #[test]
    fn unset_reference_left_untouched() {
        let mut value = toml::Value::String("${NOT_SET}/db".to_owned());
        let env = HashMap::new();
        resolve_env_references(&mut value, &env);
        assert_eq!(value.as_str(), Some("${NOT_SET}/db"));
    }
}
