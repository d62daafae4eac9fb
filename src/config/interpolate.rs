//! Environment-variable interpolation over the merged tree.
//!
//! One pass, after merging: every string leaf has its `${VAR}` and
//! `${VAR:-default}` tokens substituted from the given environment
//! snapshot. A token with no binding and no default turns the whole leaf
//! into [`ConfigValue::Unresolved`]. Downstream readers see "secret not
//! configured", never a silent empty string or the literal token text.
//!
//! The pass reads the environment snapshot it is handed; it never mutates
//! the process environment.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::value::ConfigValue;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap()
});

/// Environment snapshot used for substitution.
pub type EnvSnapshot = BTreeMap<String, String>;

/// Capture the current process environment.
pub fn process_env() -> EnvSnapshot {
    std::env::vars().collect()
}

/// Substitute placeholders in every string leaf of `value`.
pub fn interpolate(value: ConfigValue, env: &EnvSnapshot) -> ConfigValue {
    match value {
        ConfigValue::String(s) => interpolate_leaf(s, env),
        ConfigValue::Sequence(seq) => {
            ConfigValue::Sequence(seq.into_iter().map(|v| interpolate(v, env)).collect())
        }
        ConfigValue::Mapping(map) => ConfigValue::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, interpolate(v, env)))
                .collect(),
        ),
        other => other,
    }
}

fn interpolate_leaf(leaf: String, env: &EnvSnapshot) -> ConfigValue {
    if !TOKEN.is_match(&leaf) {
        return ConfigValue::String(leaf);
    }

    let mut unresolved: Option<String> = None;
    let substituted = TOKEN.replace_all(&leaf, |caps: &regex::Captures<'_>| {
        let var = &caps[1];
        match env.get(var) {
            Some(bound) => bound.clone(),
            None => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    unresolved.get_or_insert_with(|| var.to_string());
                    String::new()
                }
            },
        }
    });

    match unresolved {
        Some(var) => ConfigValue::Unresolved(var),
        None => ConfigValue::String(substituted.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ConfigValue {
        ConfigValue::from_yaml(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> EnvSnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bound_token_substitutes() {
        let tree = parse("token: ${API_TOKEN}");
        let out = interpolate(tree, &env(&[("API_TOKEN", "abc123")]));
        assert_eq!(out.at(&["token"]).unwrap().as_str(), Some("abc123"));
    }

    #[test]
    fn embedded_tokens_substitute_in_place() {
        let tree = parse("url: http://${PROXY_HOST}:${PROXY_PORT}");
        let out = interpolate(
            tree,
            &env(&[("PROXY_HOST", "127.0.0.1"), ("PROXY_PORT", "8080")]),
        );
        assert_eq!(
            out.at(&["url"]).unwrap().as_str(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn unbound_token_with_default_uses_default() {
        let tree = parse("wait: ${RATE_WAIT:-60}");
        let out = interpolate(tree, &env(&[]));
        assert_eq!(out.at(&["wait"]).unwrap().as_str(), Some("60"));
    }

    #[test]
    fn unbound_token_without_default_becomes_unresolved() {
        let tree = parse("token: ${NO_SUCH_VAR_SET}");
        let out = interpolate(tree, &env(&[]));
        assert_eq!(
            out.at(&["token"]),
            Some(&ConfigValue::Unresolved("NO_SUCH_VAR_SET".to_string()))
        );
    }

    #[test]
    fn plain_strings_pass_through_untouched() {
        let tree = parse("url: http://example.com/$path\nname: plain");
        let out = interpolate(tree, &env(&[]));
        assert_eq!(
            out.at(&["url"]).unwrap().as_str(),
            Some("http://example.com/$path")
        );
        assert_eq!(out.at(&["name"]).unwrap().as_str(), Some("plain"));
    }

    #[test]
    fn sequences_and_nested_mappings_are_walked() {
        let tree = parse("queries:\n  - org:${ORG_NAME}\n  - user:${ORG_NAME}");
        let out = interpolate(tree, &env(&[("ORG_NAME", "example")]));
        let seq = out.at(&["queries"]).unwrap().as_sequence().unwrap();
        assert_eq!(seq[0].as_str(), Some("org:example"));
        assert_eq!(seq[1].as_str(), Some("user:example"));
    }
}
