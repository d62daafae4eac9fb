//! Deep merge of configuration layers.
//!
//! The rule is fixed: mappings merge key-by-key recursively, every other
//! shape (scalars, sequences) replaces the accumulator's value outright.
//! A mapping on exactly one side of a non-null pair is a type conflict:
//! two layers disagreeing on the shape of a key is a configuration defect,
//! not something to paper over.

use crate::config::value::ConfigValue;
use crate::errors::ConfigError;

/// Merge `overlay` into `base`, consuming both.
pub fn deep_merge(base: ConfigValue, overlay: ConfigValue) -> Result<ConfigValue, ConfigError> {
    merge_at(base, overlay, &mut Vec::new())
}

fn merge_at(
    base: ConfigValue,
    overlay: ConfigValue,
    path: &mut Vec<String>,
) -> Result<ConfigValue, ConfigError> {
    match (base, overlay) {
        // Null on either side is "no opinion" / "unset": overlay wins.
        (ConfigValue::Null, overlay) => Ok(overlay),
        (_, ConfigValue::Null) => Ok(ConfigValue::Null),

        (ConfigValue::Mapping(mut base_map), ConfigValue::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => {
                        path.push(key.clone());
                        let merged = merge_at(base_value, overlay_value, path)?;
                        path.pop();
                        merged
                    }
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Ok(ConfigValue::Mapping(base_map))
        }

        (base @ ConfigValue::Mapping(_), overlay) | (base, overlay @ ConfigValue::Mapping(_)) => {
            Err(ConfigError::TypeConflict {
                path: path.join("."),
                base: base.type_name(),
                overlay: overlay.type_name(),
            })
        }

        // Scalars and sequences replace wholesale.
        (_, overlay) => Ok(overlay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> ConfigValue {
        ConfigValue::from_yaml(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn later_scalar_wins() {
        let merged = deep_merge(parse("timeout: 300"), parse("timeout: 60")).unwrap();
        assert_eq!(merged.at(&["timeout"]), Some(&ConfigValue::Integer(60)));
    }

    #[test]
    fn sequences_replace_wholesale() {
        let merged = deep_merge(parse("tools: [gau, katana]"), parse("tools: [httpx]")).unwrap();
        assert_eq!(
            merged.at(&["tools"]).unwrap().as_sequence().unwrap().len(),
            1
        );
    }

    #[test]
    fn mappings_merge_without_losing_siblings() {
        let merged = deep_merge(
            parse("timeouts:\n  command: 300\n  verify: 10"),
            parse("timeouts:\n  command: 600"),
        )
        .unwrap();
        assert_eq!(
            merged.at(&["timeouts", "command"]),
            Some(&ConfigValue::Integer(600))
        );
        assert_eq!(
            merged.at(&["timeouts", "verify"]),
            Some(&ConfigValue::Integer(10))
        );
    }

    #[test]
    fn merge_is_pairwise_associative() {
        let a = parse("x:\n  p: 1\n  q: 1");
        let b = parse("x:\n  q: 2\ny: [1, 2]");
        let c = parse("x:\n  r: 3\ny: [9]");

        let all_at_once = deep_merge(deep_merge(a.clone(), b.clone()).unwrap(), c.clone()).unwrap();
        let pairwise = {
            let ab = deep_merge(a, b).unwrap();
            deep_merge(ab, c).unwrap()
        };
        assert_eq!(all_at_once, pairwise);
        assert_eq!(all_at_once.at(&["x", "p"]), Some(&ConfigValue::Integer(1)));
        assert_eq!(all_at_once.at(&["x", "q"]), Some(&ConfigValue::Integer(2)));
        assert_eq!(all_at_once.at(&["x", "r"]), Some(&ConfigValue::Integer(3)));
        assert_eq!(
            all_at_once.at(&["y"]).unwrap().as_sequence().unwrap().len(),
            1
        );
    }

    #[test]
    fn mapping_versus_scalar_is_a_conflict() {
        let err = deep_merge(parse("proxy:\n  url: x"), parse("proxy: off")).unwrap_err();
        match err {
            ConfigError::TypeConflict { path, base, overlay } => {
                assert_eq!(path, "proxy");
                assert_eq!(base, "mapping");
                assert_eq!(overlay, "bool");
            }
            other => panic!("expected type conflict, got {other:?}"),
        }
    }

    #[test]
    fn null_sides_do_not_conflict() {
        let merged = deep_merge(parse("proxy: null"), parse("proxy:\n  url: x")).unwrap();
        assert!(merged.at(&["proxy"]).unwrap().is_mapping());

        let merged = deep_merge(parse("proxy:\n  url: x"), parse("proxy: null")).unwrap();
        assert!(merged.at(&["proxy"]).unwrap().is_null());
    }
}
