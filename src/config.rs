//! Worker and content configuration.
//!
//! `WorkerConfig` is the INI-backed process config, the direct descendant of
//! the teacher's plain-struct `BDCSConfig`, generalized from five
//! hardcoded fields to the batch-size/concurrency knobs spec 4/5 name.
//! `ContentConfig` and `ConfigResolver` are new, grounded on
//! `original_source`'s `UbiConfigLoader`/`Config`: the version-fallback
//! lookup (`X.Y.Z` -> `X.Y` -> `X`) is ported as-is since it is part of the
//! observable contract (spec 4, "Config resolution").

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DepsolveError, Result};

/// Process-wide tunables, loaded from an INI file the way the teacher never
/// did but `original_source`'s `make_config` does via `configparser`.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub batch_size_rpm: usize,
    pub batch_size_rpm_specific: usize,
    pub batch_size_resolver: usize,
    pub batch_size_srpm_specific: usize,
    pub max_workers: usize,
    pub result_ttl_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            batch_size_rpm: crate::query::BATCH_SIZE_RPM,
            batch_size_rpm_specific: crate::query::BATCH_SIZE_RPM_SPECIFIC,
            batch_size_resolver: crate::query::BATCH_SIZE_RESOLVER,
            batch_size_srpm_specific: 500,
            max_workers: 8,
            result_ttl_secs: 60 * 60 * 24 * 7,
        }
    }
}

impl WorkerConfig {
    /// Reads `[depsolver]` section keys out of an INI file, falling back to
    /// `Default::default()` for anything missing, matching
    /// `make_config`'s `int(cfg.get(section, key, fallback=...))` style.
    pub fn from_ini_str(raw: &str) -> Result<WorkerConfig> {
        let ini = ini::Ini::load_from_str(raw).map_err(|e| DepsolveError::Parse(e.to_string()))?;
        let defaults = WorkerConfig::default();
        let section = ini.section(Some("depsolver"));

        fn read_usize(section: Option<&ini::Properties>, key: &str, default: usize) -> Result<usize> {
            match section.and_then(|s| s.get(key)) {
                Some(v) => v
                    .parse()
                    .map_err(|_| DepsolveError::Parse(format!("{}: not an integer: {}", key, v))),
                None => Ok(default),
            }
        }

        Ok(WorkerConfig {
            batch_size_rpm: read_usize(section, "batch_size_rpm", defaults.batch_size_rpm)?,
            batch_size_rpm_specific: read_usize(
                section,
                "batch_size_rpm_specific",
                defaults.batch_size_rpm_specific,
            )?,
            batch_size_resolver: read_usize(section, "batch_size_resolver", defaults.batch_size_resolver)?,
            batch_size_srpm_specific: read_usize(
                section,
                "batch_size_srpm_specific",
                defaults.batch_size_srpm_specific,
            )?,
            max_workers: read_usize(section, "max_workers", defaults.max_workers)?,
            result_ttl_secs: read_usize(section, "result_ttl_secs", defaults.result_ttl_secs as usize)?
                as u64,
        })
    }
}

/// Flags governing one content set's depsolve behavior (spec 4.2 step 5,
/// 4.5 step 8, S5/S6): `base_pkgs_only` skips the RPM depsolver's fixpoint
/// closure pass and the debuginfo synthesis/pass that depends on it,
/// resolving only the seeded whitelist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub base_pkgs_only: bool,
}

/// One `(input_cs, output_cs, version)` config row, loaded from the content
/// config YAML (spec 4, "Config resolution").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentConfig {
    pub input_content_set: String,
    pub output_content_set: String,
    pub version: String,
    pub flags: Flags,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<BlacklistRow>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlacklistRow {
    pub name: String,
    #[serde(default)]
    pub arch: Option<String>,
}

/// A trailing-version-component fallback: `"8.6.0"` yields `"8.6.0"`,
/// `"8.6"`, `"8"` in that order, mirroring `UbiConfigLoader.get_config`'s
/// dotted-prefix fallback chain.
fn version_fallbacks(version: &str) -> Vec<String> {
    let re = Regex::new(r"^[0-9]+(\.[0-9]+){0,2}$").unwrap();
    if !re.is_match(version) {
        return vec![version.to_string()];
    }
    let parts: Vec<&str> = version.split('.').collect();
    (1..=parts.len()).rev().map(|n| parts[..n].join(".")).collect()
}

/// Resolves `(input_cs, output_cs, version)` triples against a loaded table
/// of `ContentConfig`s, caching lookups the way `UbiConfigLoader._config_map`
/// does so repeated resolution within one coordinator run is O(1) after the
/// first miss.
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    configs: Vec<ContentConfig>,
    cache: HashMap<(String, String, String), usize>,
}

impl ConfigResolver {
    pub fn from_yaml_str(raw: &str) -> Result<ConfigResolver> {
        let configs: Vec<ContentConfig> =
            serde_yaml::from_str(raw).map_err(|e| DepsolveError::Parse(e.to_string()))?;
        Ok(ConfigResolver {
            configs,
            cache: HashMap::new(),
        })
    }

    pub fn new(configs: Vec<ContentConfig>) -> ConfigResolver {
        ConfigResolver {
            configs,
            cache: HashMap::new(),
        }
    }

    /// Looks up `(input_cs, output_cs, version)`, falling back through
    /// shorter version prefixes before giving up with
    /// `ContentConfigMissing`.
    pub fn get_config(
        &mut self,
        input_cs: &str,
        output_cs: &str,
        version: &str,
    ) -> Result<&ContentConfig> {
        let cache_key = (input_cs.to_string(), output_cs.to_string(), version.to_string());
        if let Some(&idx) = self.cache.get(&cache_key) {
            return Ok(&self.configs[idx]);
        }

        for candidate in version_fallbacks(version) {
            if let Some(idx) = self.configs.iter().position(|c| {
                c.input_content_set == input_cs && c.output_content_set == output_cs && c.version == candidate
            }) {
                self.cache.insert(cache_key, idx);
                return Ok(&self.configs[idx]);
            }
        }

        Err(DepsolveError::ContentConfigMissing {
            input_cs: input_cs.to_string(),
            output_cs: output_cs.to_string(),
            version: version.to_string(),
        })
    }

    /// Validates that every config in `configs` agrees on `flags`, the
    /// cross-config sanity check the coordinator runs before a multi-repo
    /// job starts (spec 4, "InconsistentDepsolverConfig").
    pub fn validate_consistent_flags(configs: &[&ContentConfig]) -> Result<Flags> {
        let mut flags_seen: Option<Flags> = None;
        for config in configs {
            match flags_seen {
                None => flags_seen = Some(config.flags),
                Some(seen) if seen != config.flags => {
                    return Err(DepsolveError::InconsistentDepsolverConfig {
                        detail: format!(
                            "{}->{} v{} disagrees with earlier config in this job",
                            config.input_content_set, config.output_content_set, config.version
                        ),
                    })
                }
                _ => {}
            }
        }
        flags_seen.ok_or_else(|| DepsolveError::InconsistentDepsolverConfig {
            detail: "no configs supplied".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_fallbacks_walks_dotted_prefixes() {
        assert_eq!(version_fallbacks("8.6.0"), vec!["8.6.0", "8.6", "8"]);
    }

    #[test]
    fn worker_config_reads_ini_overrides() {
        let cfg = WorkerConfig::from_ini_str("[depsolver]\nmax_workers = 4\n").unwrap();
        assert_eq!(cfg.max_workers, 4);
        assert_eq!(cfg.batch_size_rpm, WorkerConfig::default().batch_size_rpm);
    }

    #[test]
    fn resolver_falls_back_through_version_prefixes() {
        let configs = vec![ContentConfig {
            input_content_set: "rhel8-in".to_string(),
            output_content_set: "ubi8-out".to_string(),
            version: "8".to_string(),
            flags: Flags::default(),
            whitelist: vec![],
            blacklist: vec![],
        }];
        let mut resolver = ConfigResolver::new(configs);
        let resolved = resolver.get_config("rhel8-in", "ubi8-out", "8.6.0").unwrap();
        assert_eq!(resolved.version, "8");
    }

    #[test]
    fn resolver_reports_missing_config() {
        let mut resolver = ConfigResolver::new(vec![]);
        let err = resolver.get_config("a", "b", "1.0").unwrap_err();
        assert!(matches!(err, DepsolveError::ContentConfigMissing { .. }));
    }
}
