//! Top-level job coordinator: turns a batch of output-repo requests into a
//! validated, flag-consistent pipeline of module, binary, debuginfo, and
//! source depsolves, merges their results, and persists the manifest.
//!
//! Grounded on `original_source/ubi_manifest/worker/tasks/depsolve.py`'s
//! Celery `depsolve_task` — `_filter_whitelist`, `_make_depsolver_item`, and
//! `_get_population_sources` are ported as the free functions below, kept
//! synchronous since they're pure data transforms with no content-store
//! round trip.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use slog::warn;

use crate::config::{ConfigResolver, ContentConfig, Flags};
use crate::error::{DepsolveError, Result};
use crate::model::{DepsolverItem, ManifestEntry, ModularDepsolverItem, PackageToExclude, RepoGroup, Unit};
use crate::modulemd_depsolver::ModulemdDepsolver;
use crate::persistence::{manifest_to_json, Manifest, ResultStore};
use crate::query::ContentStore;
use crate::rpm_depsolver::RpmDepsolver;
use crate::srpm_depsolver::{SrpmDepsolver, SrpmDepsolverItem};
use crate::util::{is_blacklisted, parse_blacklist_config};

/// One output repo's full job request: which input repos feed it, what it
/// wants, and the content-config coordinates used to resolve its flags.
#[derive(Clone, Debug)]
pub struct RepoRequest {
    pub repos: RepoGroup,
    pub input_repos: Vec<String>,
    pub input_content_set: String,
    pub output_content_set: String,
    pub version: String,
    pub requested_modules: Vec<crate::model::RequestedModule>,
}

/// Splits `raw_whitelist` into `(kept, blacklisted)`, applying the output
/// repo's own blacklist during partitioning rather than after — matching
/// `common.filter_whitelist`'s behavior of never letting a blacklisted name
/// occupy a whitelist slot in the first place (spec's supplemented
/// "whitelist/blacklist interaction" behavior).
pub fn filter_whitelist(
    raw_whitelist: &[String],
    blacklist: &[PackageToExclude],
    arch_hint: &str,
) -> (HashSet<String>, HashSet<String>) {
    let mut kept = HashSet::new();
    let mut dropped = HashSet::new();
    for name in raw_whitelist {
        if is_blacklisted(name, arch_hint, blacklist) {
            dropped.insert(name.clone());
        } else {
            kept.insert(name.clone());
        }
    }
    (kept, dropped)
}

/// Builds the binary `DepsolverItem` for one repo request from its resolved
/// content config plus the module units already resolved for it: modular
/// artifact filenames are excluded from the base-package seed (spec 4.2 step
/// 2) while `modulemd_dependencies` filenames are pinned in unconditionally
/// (spec 4.2 step 3), the Rust shape of `_make_depsolver_item`.
fn make_depsolver_item(
    req: &RepoRequest,
    config: &ContentConfig,
    modular_rpm_filenames: HashSet<String>,
    modulemd_pin_filenames: HashSet<String>,
) -> DepsolverItem {
    let blacklist = parse_blacklist_config(
        &config
            .blacklist
            .iter()
            .map(|b| (b.name.clone(), b.arch.clone()))
            .collect::<Vec<_>>(),
    );
    let (whitelist, _dropped) = filter_whitelist(&config.whitelist, &blacklist, "x86_64");
    DepsolverItem {
        output_repo_id: req.repos.binary_repo_id.clone(),
        whitelist,
        blacklist,
        in_pulp_repos: req.input_repos.clone(),
        modular_rpm_filenames,
        modulemd_pin_filenames,
        base_pkgs_only: config.flags.base_pkgs_only,
    }
}

/// Synthesizes the debuginfo depsolver's item from the binary item plus the
/// binary-RPM closure already resolved for it: every `{name}-debuginfo` and
/// `{name}-debugsource` package for a package that made the binary closure
/// (spec supplemented feature, "debuginfo whitelist synthesis" — debuginfo
/// is never in the content config's own whitelist since it's derived, not
/// requested).
fn synthesize_debuginfo_item(binary_item: &DepsolverItem, binary_repo_id: &str, binary_closure: &HashSet<Unit>) -> DepsolverItem {
    let mut whitelist = HashSet::new();
    for unit in binary_closure {
        if let Some(rpm) = unit.as_rpm() {
            whitelist.insert(format!("{}-debuginfo", rpm.name));
            whitelist.insert(format!("{}-debugsource", rpm.name));
        }
    }
    DepsolverItem {
        output_repo_id: binary_repo_id.to_string(),
        whitelist,
        blacklist: binary_item.blacklist.clone(),
        in_pulp_repos: binary_item.in_pulp_repos.clone(),
        base_pkgs_only: binary_item.base_pkgs_only,
        ..Default::default()
    }
}

/// Merges `additions` into `base` without ever overwriting an entry already
/// present for a key (spec's "merge-without-overwrite" rule — a repo's
/// manifest only ever grows across pipeline stages, never loses an entry a
/// previous stage contributed).
fn merge_without_overwrite(base: &mut HashMap<String, HashSet<Unit>>, additions: HashMap<String, HashSet<Unit>>) {
    for (key, units) in additions {
        base.entry(key).or_default().extend(units);
    }
}

/// Runs the full {modules, binary, debuginfo, source} pipeline for a batch
/// of `RepoRequest`s against one content store, persisting the merged
/// manifest per output repo.
pub struct Coordinator<'a> {
    store: &'a dyn ContentStore,
    config: &'a crate::config::WorkerConfig,
    resolver: &'a mut ConfigResolver,
    log: slog::Logger,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        config: &'a crate::config::WorkerConfig,
        resolver: &'a mut ConfigResolver,
        log: slog::Logger,
    ) -> Self {
        Coordinator {
            store,
            config,
            resolver,
            log,
        }
    }

    /// Validates that every repo request in `requests` resolves to a
    /// consistent `Flags` value and returns it, the precondition the rest of
    /// `run` relies on (spec 4, `InconsistentDepsolverConfig`).
    fn resolve_and_validate_flags(&mut self, requests: &[RepoRequest]) -> Result<(Vec<ContentConfig>, Flags)> {
        let mut configs = Vec::new();
        for req in requests {
            let config = self
                .resolver
                .get_config(&req.input_content_set, &req.output_content_set, &req.version)?
                .clone();
            configs.push(config);
        }
        let refs: Vec<&ContentConfig> = configs.iter().collect();
        let flags = ConfigResolver::validate_consistent_flags(&refs)?;
        Ok((configs, flags))
    }

    /// Runs the full pipeline, returning `output_repo_id -> merged resolved
    /// units` ready for manifest conversion. Modulemd resolution always runs
    /// for requests that name modules; the binary/debuginfo/SRPM RPM passes
    /// always run too, with `base_pkgs_only` (validated consistent across the
    /// whole batch) skipping the RPM depsolver's fixpoint closure pass and
    /// the debuginfo pass that depends on it (spec 4.2 step 5, 4.5 step 8).
    pub async fn run(&mut self, requests: Vec<RepoRequest>) -> Result<HashMap<String, HashSet<Unit>>> {
        let (configs, flags) = self.resolve_and_validate_flags(&requests)?;

        let mut merged: HashMap<String, HashSet<Unit>> = HashMap::new();

        let module_items: Vec<ModularDepsolverItem> = requests
            .iter()
            .filter(|r| !r.requested_modules.is_empty())
            .map(|r| ModularDepsolverItem {
                output_repo_id: r.repos.binary_repo_id.clone(),
                modulelist: r.requested_modules.clone(),
                in_pulp_repos: r.input_repos.clone(),
            })
            .collect();

        // output_repo_id -> filenames of every resolved module artifact (step
        // 2's exclusion set) and output_repo_id -> filenames the requested
        // profiles actually pin in (step 3's bring-in set).
        let mut modular_rpm_filenames: HashMap<String, HashSet<String>> = HashMap::new();
        let mut modulemd_pin_filenames: HashMap<String, HashSet<String>> = HashMap::new();

        if !module_items.is_empty() {
            let module_solver = ModulemdDepsolver::new(self.store, module_items.clone());
            let resolved_modules = module_solver.run().await?;
            for item in &module_items {
                if let Some(modules) = resolved_modules.get(&item.output_repo_id) {
                    let all_filenames: HashSet<String> =
                        modules.iter().flat_map(|m| m.artifact_filenames()).collect();
                    modular_rpm_filenames.insert(item.output_repo_id.clone(), all_filenames);

                    let pinned_filenames: HashSet<String> =
                        ModulemdDepsolver::profile_artifacts(item, modules)
                            .into_iter()
                            .map(|artifact| format!("{}.rpm", artifact))
                            .collect();
                    modulemd_pin_filenames.insert(item.output_repo_id.clone(), pinned_filenames);
                }
            }
            let as_units: HashMap<String, HashSet<Unit>> = resolved_modules
                .into_iter()
                .map(|(repo, modules)| (repo.clone(), ModulemdDepsolver::to_units(&repo, &modules)))
                .collect();
            merge_without_overwrite(&mut merged, as_units);
        }

        let binary_items: Vec<DepsolverItem> = requests
            .iter()
            .zip(configs.iter())
            .map(|(req, config)| {
                make_depsolver_item(
                    req,
                    config,
                    modular_rpm_filenames
                        .get(&req.repos.binary_repo_id)
                        .cloned()
                        .unwrap_or_default(),
                    modulemd_pin_filenames
                        .get(&req.repos.binary_repo_id)
                        .cloned()
                        .unwrap_or_default(),
                )
            })
            .collect();

        let binary_solver = RpmDepsolver::new(self.store, self.config, binary_items.clone(), self.log.clone());
        let binary_closures = binary_solver.run().await?;
        let as_units: HashMap<String, HashSet<Unit>> = binary_closures
            .iter()
            .map(|(repo, units)| (repo.clone(), units.clone()))
            .collect();
        merge_without_overwrite(&mut merged, as_units);

        if !flags.base_pkgs_only {
            let debug_items: Vec<DepsolverItem> = requests
                .iter()
                .zip(binary_items.iter())
                .filter_map(|(req, binary_item)| {
                    binary_closures
                        .get(&req.repos.binary_repo_id)
                        .map(|closure| synthesize_debuginfo_item(binary_item, &req.repos.debug_repo_id, closure))
                })
                .collect();

            if !debug_items.is_empty() {
                let debug_solver = RpmDepsolver::new(self.store, self.config, debug_items, self.log.clone());
                let debug_closures = debug_solver.run().await?;
                merge_without_overwrite(&mut merged, debug_closures);
            }
        }

        let srpm_items: Vec<SrpmDepsolverItem> = requests
            .iter()
            .zip(binary_items.iter())
            .filter_map(|(req, binary_item)| {
                binary_closures
                    .get(&req.repos.binary_repo_id)
                    .map(|closure| SrpmDepsolverItem {
                        output_repo_id: req.repos.source_repo_id.clone(),
                        binary_units: closure.clone(),
                        blacklist: binary_item.blacklist.clone(),
                        in_pulp_repos: req.input_repos.clone(),
                    })
            })
            .collect();

        if !srpm_items.is_empty() {
            let srpm_solver = SrpmDepsolver::new(self.store, self.config, srpm_items);
            let srpm_closures = srpm_solver.run().await?;
            merge_without_overwrite(&mut merged, srpm_closures);
        }

        let mut audited_repo_ids: HashSet<&str> = HashSet::new();
        for req in &requests {
            audited_repo_ids.insert(req.repos.binary_repo_id.as_str());
            audited_repo_ids.insert(req.repos.source_repo_id.as_str());
            if !flags.base_pkgs_only {
                audited_repo_ids.insert(req.repos.debug_repo_id.as_str());
            }
        }
        for repo_id in audited_repo_ids {
            if let Some(msg) = Self::audit_repo(repo_id, &merged) {
                warn!(self.log, "{}", msg);
            }
        }

        Ok(merged)
    }

    /// Persists `merged` into `result_store` keyed by `task_id` with the
    /// configured TTL, converting each repo's resolved set into manifest
    /// entries first (spec 6).
    pub async fn persist(
        &self,
        result_store: &dyn ResultStore,
        task_id: &str,
        merged: &HashMap<String, HashSet<Unit>>,
    ) -> Result<()> {
        let entries: HashMap<String, Vec<ManifestEntry>> = merged
            .iter()
            .map(|(repo, units)| (repo.clone(), units.iter().map(ManifestEntry::from).collect()))
            .collect();

        let manifest = Manifest {
            entries,
            written_at: std::time::SystemTime::now(),
        };
        let _ = manifest_to_json(&manifest)?;

        result_store
            .put(task_id, manifest, Duration::from_secs(self.config.result_ttl_secs))
            .await
            .map_err(|e| DepsolveError::Persistence(e.to_string()))
    }

    /// A post-resolve sanity hook run before persistence: flags any output
    /// repo whose merged set is empty, so an operator can distinguish "truly
    /// empty content set" from "something upstream silently produced
    /// nothing" (supplemented from `original_source`'s coordinator logging
    /// every empty `export()` result at warning level).
    pub fn audit_repo(output_repo_id: &str, merged: &HashMap<String, HashSet<Unit>>) -> Option<String> {
        match merged.get(output_repo_id) {
            Some(units) if units.is_empty() => {
                Some(format!("{}: resolved to an empty unit set", output_repo_id))
            }
            None => Some(format!("{}: no units were ever merged for this repo", output_repo_id)),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_whitelist_drops_blacklisted_names_up_front() {
        let blacklist = parse_blacklist_config(&[("bar".to_string(), None)]);
        let (kept, dropped) = filter_whitelist(&["foo".to_string(), "bar".to_string()], &blacklist, "x86_64");
        assert_eq!(kept, HashSet::from(["foo".to_string()]));
        assert_eq!(dropped, HashSet::from(["bar".to_string()]));
    }

    #[test]
    fn audit_repo_flags_empty_and_missing_repos() {
        let mut merged = HashMap::new();
        merged.insert("empty-repo".to_string(), HashSet::new());
        assert!(Coordinator::audit_repo("empty-repo", &merged).is_some());
        assert!(Coordinator::audit_repo("missing-repo", &merged).is_some());
        merged.insert(
            "populated-repo".to_string(),
            HashSet::from([Unit::rpm(
                "in-repo",
                crate::model::RpmUnit {
                    name: "foo".to_string(),
                    epoch: None,
                    version: "1.0".to_string(),
                    release: "1".to_string(),
                    arch: "x86_64".to_string(),
                    filename: "foo-1.0-1.x86_64.rpm".to_string(),
                    sourcerpm: None,
                    content_type: crate::model::ContentType::Rpm,
                    provides: vec![],
                    requires: vec![],
                    files: vec![],
                },
            )]),
        );
        assert!(Coordinator::audit_repo("populated-repo", &merged).is_none());
    }
}
