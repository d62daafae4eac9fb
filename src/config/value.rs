//! The immutable configuration value tree.
//!
//! Configuration sources are YAML documents; each parses into a
//! [`ConfigValue`] tree before merging. The tree carries one variant YAML
//! does not have: [`ConfigValue::Unresolved`], the explicit absence marker
//! left behind when a `${VAR}` placeholder has no binding and no default.
//! Consumers can therefore distinguish "secret not configured" from a
//! literal string at the type level instead of by string comparison.

use std::collections::BTreeMap;

use crate::errors::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(BTreeMap<String, ConfigValue>),
    /// A `${VAR}` token that interpolation could not resolve.
    Unresolved(String),
}

impl ConfigValue {
    /// Short type name used in merge-conflict diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::Sequence(_) => "sequence",
            ConfigValue::Mapping(_) => "mapping",
            ConfigValue::Unresolved(_) => "unresolved placeholder",
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, ConfigValue::Mapping(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ConfigValue::Integer(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Walk a key path through nested mappings.
    pub fn at<'a>(&'a self, path: &[&str]) -> Option<&'a ConfigValue> {
        let mut current = self;
        for key in path {
            current = current.as_mapping()?.get(*key)?;
        }
        Some(current)
    }

    /// Convert a parsed YAML document into a [`ConfigValue`] tree.
    ///
    /// Mapping keys must be strings; anything else is a malformed source.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<ConfigValue, String> {
        Ok(match value {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    ConfigValue::Float(f)
                } else {
                    return Err(format!("unrepresentable number: {n}"));
                }
            }
            serde_yaml::Value::String(s) => ConfigValue::String(s),
            serde_yaml::Value::Sequence(seq) => ConfigValue::Sequence(
                seq.into_iter()
                    .map(ConfigValue::from_yaml)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            serde_yaml::Value::Mapping(map) => {
                let mut out = BTreeMap::new();
                for (key, val) in map {
                    let key = key
                        .as_str()
                        .ok_or_else(|| format!("non-string mapping key: {key:?}"))?
                        .to_string();
                    out.insert(key, ConfigValue::from_yaml(val)?);
                }
                ConfigValue::Mapping(out)
            }
            serde_yaml::Value::Tagged(tagged) => ConfigValue::from_yaml(tagged.value)?,
        })
    }
}

/// The merged, interpolated configuration for one run.
///
/// Built once at startup and shared read-only with every component. The
/// typed read methods convert missing keys, wrong shapes, and unresolved
/// placeholders into [`ConfigError`] at the point a consumer demands the
/// value.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    root: ConfigValue,
}

impl EffectiveConfig {
    pub(crate) fn new(root: ConfigValue) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &ConfigValue {
        &self.root
    }

    pub fn get(&self, path: &[&str]) -> Option<&ConfigValue> {
        self.root.at(path)
    }

    /// Required string read. `Unresolved` surfaces the placeholder error.
    pub fn require_str(&self, path: &[&str]) -> Result<&str, ConfigError> {
        let joined = path.join(".");
        match self.root.at(path) {
            None | Some(ConfigValue::Null) => Err(ConfigError::MissingSetting { path: joined }),
            Some(ConfigValue::Unresolved(var)) => Err(ConfigError::UnresolvedPlaceholder {
                path: joined,
                var: var.clone(),
            }),
            Some(value) => value.as_str().ok_or(ConfigError::WrongType {
                path: joined,
                expected: "string",
            }),
        }
    }

    /// Optional string read; an unresolved placeholder reads as absent,
    /// which is how "secret not configured" is observed downstream.
    pub fn opt_str(&self, path: &[&str]) -> Option<&str> {
        match self.root.at(path) {
            Some(ConfigValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn u64_or(&self, path: &[&str], default: u64) -> u64 {
        self.root.at(path).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    pub fn bool_or(&self, path: &[&str], default: bool) -> bool {
        self.root
            .at(path)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn str_or<'a>(&'a self, path: &[&str], default: &'a str) -> &'a str {
        self.opt_str(path).unwrap_or(default)
    }

    /// String-sequence read; non-string elements are skipped.
    pub fn str_seq(&self, path: &[&str]) -> Vec<String> {
        self.root
            .at(path)
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ConfigValue {
        ConfigValue::from_yaml(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn yaml_conversion_covers_all_shapes() {
        let value = parse("a: 1\nb: [x, y]\nc:\n  d: true\ne: 1.5\nf: null");
        assert_eq!(
            value.at(&["a"]),
            Some(&ConfigValue::Integer(1))
        );
        assert_eq!(value.at(&["c", "d"]), Some(&ConfigValue::Bool(true)));
        assert_eq!(value.at(&["e"]), Some(&ConfigValue::Float(1.5)));
        assert_eq!(value.at(&["f"]), Some(&ConfigValue::Null));
        assert_eq!(value.at(&["b"]).unwrap().as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn require_str_distinguishes_missing_from_unresolved() {
        let mut map = BTreeMap::new();
        map.insert(
            "token".to_string(),
            ConfigValue::Unresolved("GITHUB_TOKEN".to_string()),
        );
        let config = EffectiveConfig::new(ConfigValue::Mapping(map));

        match config.require_str(&["token"]) {
            Err(ConfigError::UnresolvedPlaceholder { var, .. }) => {
                assert_eq!(var, "GITHUB_TOKEN")
            }
            other => panic!("expected unresolved placeholder, got {other:?}"),
        }
        assert!(matches!(
            config.require_str(&["absent"]),
            Err(ConfigError::MissingSetting { .. })
        ));
        // The optional read treats unresolved as "not configured".
        assert_eq!(config.opt_str(&["token"]), None);
    }

    #[test]
    fn defaulted_reads_fall_through_on_wrong_type() {
        let config = EffectiveConfig::new(parse("timeouts:\n  command: fast"));
        assert_eq!(config.u64_or(&["timeouts", "command"], 300), 300);
        assert_eq!(config.u64_or(&["timeouts", "missing"], 60), 60);
    }
}
