//! SRPM depsolving: backfills one source RPM per resolved binary RPM,
//! matched by `sourcerpm` filename, plus a "merged blacklist" top-up pass for
//! packages no binary depsolver run touched.
//!
//! Grounded on `original_source/ubi_manifest/worker/tasks/depsolver/
//! srpm_depsolver.py`'s `SrpmDepsolver`: the `srpm_filenames` grouping (one
//! set of wanted source filenames per output repo) and the blacklist-driven
//! backfill pass are kept as that module structures them.

use std::collections::{HashMap, HashSet};

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::model::{PackageToExclude, Unit};
use crate::query::{create_or_criteria_for_names, ContentStore, UnitKind};
use crate::util::is_blacklisted;

/// One output repo's demand on the source depsolver: the binary RPMs
/// already resolved for it (whose `sourcerpm` filenames need backfilling)
/// plus its own blacklist and input repos.
pub struct SrpmDepsolverItem {
    pub output_repo_id: String,
    pub binary_units: HashSet<Unit>,
    pub blacklist: Vec<PackageToExclude>,
    pub in_pulp_repos: Vec<String>,
}

pub struct SrpmDepsolver<'a> {
    store: &'a dyn ContentStore,
    config: &'a WorkerConfig,
    items: Vec<SrpmDepsolverItem>,
}

impl<'a> SrpmDepsolver<'a> {
    pub fn new(store: &'a dyn ContentStore, config: &'a WorkerConfig, items: Vec<SrpmDepsolverItem>) -> Self {
        SrpmDepsolver { store, config, items }
    }

    /// The set of `sourcerpm` filenames the item's binary units reference,
    /// the `srpm_filenames` this repo wants backfilled.
    fn wanted_filenames(item: &SrpmDepsolverItem) -> HashSet<String> {
        item.binary_units
            .iter()
            .filter_map(|u| u.as_rpm())
            .filter_map(|r| r.sourcerpm.clone())
            .collect()
    }

    /// Searches `repos` for SRPMs whose filename is in `filenames`, in
    /// windows of `batch_size_srpm_specific` per query, dropping anything
    /// the output repo's blacklist covers.
    async fn fetch_srpms(
        &self,
        repos: &[String],
        filenames: &HashSet<String>,
        blacklist: &[PackageToExclude],
    ) -> Result<HashSet<Unit>> {
        if filenames.is_empty() {
            return Ok(HashSet::new());
        }
        let filenames: Vec<String> = filenames.iter().cloned().collect();
        let mut out = HashSet::new();
        for window in filenames.chunks(self.config.batch_size_srpm_specific) {
            let criteria = create_or_criteria_for_names("filename", window);
            let found = crate::query::search_units_per_repos(
                self.store,
                repos,
                &criteria,
                UnitKind::Srpm,
                self.config.batch_size_rpm_specific,
                self.config.max_workers,
            )
            .await?;
            out.extend(found.into_iter().filter(|u| {
                u.as_rpm()
                    .map(|r| !is_blacklisted(&r.name, "src", blacklist))
                    .unwrap_or(false)
            }));
        }
        Ok(out)
    }

    /// Resolves every item: fetch the sourcerpm backfill set keyed by the
    /// item's own blacklist (spec 4.4, "Source backfill"), returning
    /// `output_repo_id -> resolved source units`.
    pub async fn run(&self) -> Result<HashMap<String, HashSet<Unit>>> {
        let mut out = HashMap::new();
        for item in &self.items {
            let wanted = Self::wanted_filenames(item);
            let resolved = self.fetch_srpms(&item.in_pulp_repos, &wanted, &item.blacklist).await?;
            out.insert(item.output_repo_id.clone(), resolved);
        }
        Ok(out)
    }

    /// The "merged blacklist" top-up pass (spec 4.4): given the union of
    /// every output repo's blacklist that targets source packages, fetch
    /// anything in `repos` matching those specific names so a later
    /// blacklist-aware re-run can still find and exclude units that were
    /// never pulled in as a `sourcerpm` backfill target.
    pub async fn merged_blacklist_candidates(
        &self,
        repos: &[String],
        merged_blacklist: &[PackageToExclude],
    ) -> Result<HashSet<Unit>> {
        let names: Vec<String> = merged_blacklist
            .iter()
            .filter(|e| e.arch.as_deref() == Some("src"))
            .map(|e| e.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(HashSet::new());
        }
        let criteria = create_or_criteria_for_names("name", &names);
        crate::query::search_units_per_repos(
            self.store,
            repos,
            &criteria,
            UnitKind::Srpm,
            self.config.batch_size_rpm_specific,
            self.config.max_workers,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, RpmUnit};
    use crate::query::MockContentStore;

    fn binary(name: &str, sourcerpm: &str) -> RpmUnit {
        RpmUnit {
            name: name.to_string(),
            epoch: None,
            version: "1.0".to_string(),
            release: "1".to_string(),
            arch: "x86_64".to_string(),
            filename: format!("{}-1.0-1.x86_64.rpm", name),
            sourcerpm: Some(sourcerpm.to_string()),
            content_type: ContentType::Rpm,
            provides: vec![],
            requires: vec![],
            files: vec![],
        }
    }

    fn srpm(name: &str, filename: &str) -> RpmUnit {
        RpmUnit {
            name: name.to_string(),
            epoch: None,
            version: "1.0".to_string(),
            release: "1".to_string(),
            arch: "src".to_string(),
            filename: filename.to_string(),
            sourcerpm: None,
            content_type: ContentType::Srpm,
            provides: vec![],
            requires: vec![],
            files: vec![],
        }
    }

    #[tokio::test]
    async fn backfills_sourcerpm_for_resolved_binaries() {
        let mut store = MockContentStore::new();
        store.add_rpm("in-repo", srpm("foo", "foo-1.0-1.src.rpm"));

        let config = WorkerConfig::default();
        let mut binary_units = HashSet::new();
        binary_units.insert(Unit::rpm("out-repo", binary("foo", "foo-1.0-1.src.rpm")));

        let item = SrpmDepsolverItem {
            output_repo_id: "out-repo".to_string(),
            binary_units,
            blacklist: vec![],
            in_pulp_repos: vec!["in-repo".to_string()],
        };

        let solver = SrpmDepsolver::new(&store, &config, vec![item]);
        let result = solver.run().await.unwrap();
        assert_eq!(result["out-repo"].len(), 1);
    }
}
