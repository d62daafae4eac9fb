//! Layered configuration loading.
//!
//! Layers merge in fixed precedence order: embedded baseline defaults,
//! `defaults.yaml`, the selected profile subtree of `environments.yaml`,
//! per-scanner files, `secrets.yaml`, and finally the call-time override
//! mapping built from CLI flags. A missing file is an empty layer (the
//! secrets source in particular is routinely absent), while an unparsable
//! file aborts the run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::interpolate::{interpolate, EnvSnapshot};
use crate::config::merge::deep_merge;
use crate::config::value::{ConfigValue, EffectiveConfig};
use crate::errors::ConfigError;

/// Scanner-specific sources, merged under their own top-level key.
const SCANNER_FILES: &[(&str, &str)] = &[
    ("github_scanner", "github_scanner.yaml"),
    ("gitlab_scanner", "gitlab_scanner.yaml"),
    ("bitbucket_scanner", "bitbucket_scanner.yaml"),
    ("gitea_scanner", "gitea_scanner.yaml"),
];

/// Baseline defaults compiled into the binary, so a bare checkout runs
/// without any config directory at all.
const BASELINE: &str = include_str!("baseline.yaml");

/// Build the effective configuration for one run.
///
/// `overrides` is the call-time layer (CLI flags); pass
/// [`ConfigValue::Null`] when there are none. The process environment is
/// only read, never written.
pub fn resolve(
    config_dir: &Path,
    environment: &str,
    overrides: ConfigValue,
    env: &EnvSnapshot,
) -> Result<EffectiveConfig, ConfigError> {
    let mut merged = parse_source(BASELINE, Path::new("<baseline>"))?;

    merged = merge_layer(merged, load_file(&config_dir.join("defaults.yaml"))?)?;

    // Environment profiles live in one file keyed by profile name; only the
    // selected profile's subtree participates in the merge.
    if let Some(profiles) = load_file(&config_dir.join("environments.yaml"))? {
        if let Some(profile) = profiles.at(&[environment]) {
            merged = deep_merge(merged, profile.clone())?;
        } else {
            log::debug!("no `{environment}` profile in environments.yaml");
        }
    }

    for (key, file) in SCANNER_FILES {
        if let Some(scanner) = load_file(&config_dir.join(file))? {
            let mut wrapper = std::collections::BTreeMap::new();
            wrapper.insert(key.to_string(), scanner);
            merged = deep_merge(merged, ConfigValue::Mapping(wrapper))?;
        }
    }

    match load_file(&config_dir.join("secrets.yaml"))? {
        Some(secrets) => merged = deep_merge(merged, secrets)?,
        None => log::debug!("no secrets.yaml found, relying on environment variables"),
    }

    merged = merge_layer(merged, Some(overrides))?;

    Ok(EffectiveConfig::new(interpolate(merged, env)))
}

fn merge_layer(
    base: ConfigValue,
    layer: Option<ConfigValue>,
) -> Result<ConfigValue, ConfigError> {
    match layer {
        Some(ConfigValue::Null) | None => Ok(base),
        Some(layer) => deep_merge(base, layer),
    }
}

/// Read and parse one optional source file.
fn load_file(path: &PathBuf) -> Result<Option<ConfigValue>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.clone(),
                source,
            })
        }
    };
    log::debug!("loaded configuration layer {}", path.display());
    parse_source(&contents, path).map(Some)
}

fn parse_source(contents: &str, path: &Path) -> Result<ConfigValue, ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    // An empty document parses as null; treat it as an empty layer.
    if yaml.is_null() {
        return Ok(ConfigValue::Mapping(Default::default()));
    }
    ConfigValue::from_yaml(yaml).map_err(|message| ConfigError::Malformed {
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::collections::BTreeMap;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn empty_env() -> EnvSnapshot {
        BTreeMap::new()
    }

    #[test]
    fn baseline_parses_and_carries_core_sections() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve(dir.path(), "development", ConfigValue::Null, &empty_env()).unwrap();
        assert_eq!(config.u64_or(&["timeouts", "command"], 0), 300);
        assert_eq!(config.u64_or(&["timeouts", "scan"], 0), 600);
        assert_eq!(config.u64_or(&["download", "max_concurrent"], 0), 20);
        assert!(!config.bool_or(&["proxy", "enabled"], true));
    }

    #[test]
    fn environment_profile_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "environments.yaml",
            indoc! {"
                production:
                  timeouts:
                    command: 7200
                testing:
                  timeouts:
                    command: 5
            "},
        );
        let config = resolve(dir.path(), "production", ConfigValue::Null, &empty_env()).unwrap();
        assert_eq!(config.u64_or(&["timeouts", "command"], 0), 7200);
        // Sibling keys from the baseline survive.
        assert_eq!(config.u64_or(&["timeouts", "download"], 0), 300);

        let config = resolve(dir.path(), "testing", ConfigValue::Null, &empty_env()).unwrap();
        assert_eq!(config.u64_or(&["timeouts", "command"], 0), 5);
    }

    #[test]
    fn scanner_files_merge_under_their_key() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "github_scanner.yaml",
            "max_repos_to_scan: 12\n",
        );
        let config = resolve(dir.path(), "development", ConfigValue::Null, &empty_env()).unwrap();
        assert_eq!(
            config.u64_or(&["github_scanner", "max_repos_to_scan"], 0),
            12
        );
        // Baseline scanner settings not overridden remain in place.
        assert_eq!(config.u64_or(&["github_scanner", "clone_timeout"], 0), 300);
    }

    #[test]
    fn absent_secrets_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve(dir.path(), "development", ConfigValue::Null, &empty_env()).is_ok());
    }

    #[test]
    fn secrets_interpolate_against_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "secrets.yaml",
            indoc! {"
                github_scanner:
                  api_token: ${MJSRECON_TEST_GH_TOKEN}
            "},
        );
        let mut env = empty_env();
        env.insert("MJSRECON_TEST_GH_TOKEN".to_string(), "tok".to_string());
        let config = resolve(dir.path(), "development", ConfigValue::Null, &env).unwrap();
        assert_eq!(
            config.opt_str(&["github_scanner", "api_token"]),
            Some("tok")
        );

        // Without the binding the value is an explicit absence marker.
        let config =
            resolve(dir.path(), "development", ConfigValue::Null, &empty_env()).unwrap();
        assert_eq!(config.opt_str(&["github_scanner", "api_token"]), None);
        assert!(matches!(
            config.require_str(&["github_scanner", "api_token"]),
            Err(ConfigError::UnresolvedPlaceholder { .. })
        ));
    }

    #[test]
    fn malformed_layer_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "defaults.yaml", "timeouts: [unclosed");
        assert!(matches!(
            resolve(dir.path(), "development", ConfigValue::Null, &empty_env()),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn cli_override_layer_wins_last() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "defaults.yaml",
            "timeouts:\n  command: 900\n",
        );
        let overrides = ConfigValue::from_yaml(
            serde_yaml::from_str("timeouts:\n  command: 60\n").unwrap(),
        )
        .unwrap();
        let config = resolve(dir.path(), "development", overrides, &empty_env()).unwrap();
        assert_eq!(config.u64_or(&["timeouts", "command"], 0), 60);
    }
}
