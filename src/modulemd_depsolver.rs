//! Module (modulemd) depsolving: expands a list of requested
//! `name[:stream][/profile]` pins into the transitive closure of module
//! dependencies and their profile-filtered RPM artifacts.
//!
//! Grounded on `original_source/ubi_manifest/worker/tasks/depsolver/
//! modulemd_depsolver.py`'s `ModularDepsolver`: the `_searched_modules`
//! `with_stream`/`without_stream` bookkeeping that makes recursive module
//! dependency expansion cycle-safe is ported directly, since it is the part
//! of that algorithm with no obvious idiomatic substitute.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::model::{ModularDepsolverItem, ModuleDep, ModulemdUnit, RequestedModule, Unit};
use crate::query::{ContentStore, Criteria, UnitKind};

/// Per-name record of which streams have already been searched (`with`) and
/// which are known to need no further expansion (`without`) — lets a module
/// graph with cycles or diamond dependencies terminate without resolving the
/// same `(name, stream)` pair twice.
#[derive(Default)]
struct SearchedModules {
    with_stream: HashMap<String, HashSet<String>>,
    without_stream: HashSet<String>,
}

impl SearchedModules {
    fn already_searched(&self, name: &str, stream: Option<&str>) -> bool {
        match stream {
            Some(s) => self
                .with_stream
                .get(name)
                .map(|streams| streams.contains(s))
                .unwrap_or(false),
            None => self.without_stream.contains(name),
        }
    }

    fn mark_searched(&mut self, name: &str, stream: Option<&str>) {
        match stream {
            Some(s) => {
                self.with_stream
                    .entry(name.to_string())
                    .or_default()
                    .insert(s.to_string());
            }
            None => {
                self.without_stream.insert(name.to_string());
            }
        }
    }
}

pub struct ModulemdDepsolver<'a> {
    store: &'a dyn ContentStore,
    items: Vec<ModularDepsolverItem>,
}

impl<'a> ModulemdDepsolver<'a> {
    pub fn new(store: &'a dyn ContentStore, items: Vec<ModularDepsolverItem>) -> Self {
        ModulemdDepsolver { store, items }
    }

    async fn find_modules(
        &self,
        repos: &[String],
        name: &str,
        stream: Option<&str>,
    ) -> Result<HashSet<ModulemdUnit>> {
        let mut fields = vec![("name".to_string(), crate::query::FieldMatch::Equals(name.to_string()))];
        if let Some(s) = stream {
            fields.push(("stream".to_string(), crate::query::FieldMatch::Equals(s.to_string())));
        }
        let criteria = vec![Criteria::and(fields)];
        let units = self.store.search(repos, &criteria, UnitKind::Modulemd, 1).await?;
        Ok(units.into_iter().filter_map(|u| u.as_modulemd().cloned()).collect())
    }

    /// Recursively expands `dep` into itself plus every module it depends
    /// on, skipping `(name, stream)` pairs already visited this run — the
    /// Rust shape of `_depsolve_modules`.
    async fn depsolve_module(
        &self,
        repos: &[String],
        name: &str,
        stream: Option<&str>,
        searched: &mut SearchedModules,
        found: &mut HashSet<ModulemdUnit>,
    ) -> Result<()> {
        if searched.already_searched(name, stream) {
            return Ok(());
        }
        searched.mark_searched(name, stream);

        let modules = self.find_modules(repos, name, stream).await?;
        for module in modules {
            let deps: Vec<ModuleDep> = module.dependencies.clone();
            found.insert(module);
            for dep in deps {
                Box::pin(self.depsolve_module(
                    repos,
                    &dep.name,
                    dep.stream.as_deref(),
                    searched,
                    found,
                ))
                .await?;
            }
        }
        Ok(())
    }

    /// Resolves every `ModularDepsolverItem`, returning
    /// `output_repo_id -> resolved modules` (pre profile-artifact
    /// expansion).
    pub async fn run(&self) -> Result<HashMap<String, HashSet<ModulemdUnit>>> {
        let mut out = HashMap::new();
        for item in &self.items {
            let mut searched = SearchedModules::default();
            let mut found = HashSet::new();
            for requested in &item.modulelist {
                self.depsolve_module(
                    &item.in_pulp_repos,
                    &requested.name,
                    requested.stream.as_deref(),
                    &mut searched,
                    &mut found,
                )
                .await?;
            }
            out.insert(item.output_repo_id.clone(), found);
        }
        Ok(out)
    }

    /// Expands resolved modules for `item.modulelist`'s profile pins into the
    /// RPM artifact filenames those profiles name (spec 4.3, "Profile
    /// filtering"); modules requested with no profile contribute all their
    /// artifacts.
    pub fn profile_artifacts(item: &ModularDepsolverItem, resolved: &HashSet<ModulemdUnit>) -> HashSet<String> {
        let pinned: HashMap<&str, &RequestedModule> =
            item.modulelist.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut artifacts = HashSet::new();
        for module in resolved {
            match pinned.get(module.name.as_str()) {
                Some(req) if !req.profiles.is_empty() => {
                    for profile in &req.profiles {
                        if let Some(pkgs) = module.profiles.get(profile) {
                            artifacts.extend(pkgs.iter().cloned());
                        }
                    }
                }
                _ => artifacts.extend(module.artifacts.iter().cloned()),
            }
        }
        artifacts
    }

    /// Dedupes resolved modules by NSVCA before they're wrapped into
    /// manifest `Unit`s, the Rust shape of `export()`'s per-`nsvca`
    /// dedupe.
    pub fn to_units(repo_id: &str, resolved: &HashSet<ModulemdUnit>) -> HashSet<Unit> {
        let mut seen = HashSet::new();
        let mut out = HashSet::new();
        for module in resolved {
            if seen.insert(module.nsvca()) {
                out.insert(Unit::modulemd(repo_id, module.clone()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MockContentStore;

    fn module(name: &str, stream: &str, deps: Vec<ModuleDep>) -> ModulemdUnit {
        ModulemdUnit {
            name: name.to_string(),
            stream: stream.to_string(),
            version: 1,
            context: "c0".to_string(),
            arch: "x86_64".to_string(),
            artifacts: vec![format!("{}-1.0-1.x86_64", name)],
            dependencies: deps,
            profiles: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn follows_transitive_module_dependencies() {
        let mut store = MockContentStore::new();
        store.add_modulemd(
            "in-repo",
            module(
                "app",
                "1.0",
                vec![ModuleDep {
                    name: "platform".to_string(),
                    stream: Some("el9".to_string()),
                }],
            ),
        );
        store.add_modulemd("in-repo", module("platform", "el9", vec![]));

        let item = ModularDepsolverItem {
            output_repo_id: "out-repo".to_string(),
            modulelist: vec![RequestedModule {
                name: "app".to_string(),
                stream: Some("1.0".to_string()),
                profiles: vec![],
            }],
            in_pulp_repos: vec!["in-repo".to_string()],
        };

        let solver = ModulemdDepsolver::new(&store, vec![item]);
        let result = solver.run().await.unwrap();
        let names: HashSet<&str> = result["out-repo"].iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["app", "platform"]));
    }

    #[tokio::test]
    async fn cyclic_module_graph_terminates() {
        let mut store = MockContentStore::new();
        store.add_modulemd(
            "in-repo",
            module(
                "a",
                "s",
                vec![ModuleDep {
                    name: "b".to_string(),
                    stream: Some("s".to_string()),
                }],
            ),
        );
        store.add_modulemd(
            "in-repo",
            module(
                "b",
                "s",
                vec![ModuleDep {
                    name: "a".to_string(),
                    stream: Some("s".to_string()),
                }],
            ),
        );

        let item = ModularDepsolverItem {
            output_repo_id: "out-repo".to_string(),
            modulelist: vec![RequestedModule {
                name: "a".to_string(),
                stream: Some("s".to_string()),
                profiles: vec![],
            }],
            in_pulp_repos: vec!["in-repo".to_string()],
        };

        let solver = ModulemdDepsolver::new(&store, vec![item]);
        let result = solver.run().await.unwrap();
        assert_eq!(result["out-repo"].len(), 2);
    }
}
