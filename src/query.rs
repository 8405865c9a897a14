//! The Query Layer: the contract through which every depsolver talks to the
//! remote, Pulp-backed content store.
//!
//! The store itself is out of scope (spec 1); this module only defines the
//! shape callers need — paged, criteria-driven searches that return sets of
//! `Unit`s tagged with the repo they were found in — plus an in-memory
//! `MockContentStore` for tests, in the spirit of the teacher's
//! `src/test_helper.rs` and `src/api/mock.rs` stand-ins.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::error::{DepsolveError, Result};
use crate::model::{ModulemdDefaultsUnit, ModulemdUnit, RpmUnit, Unit};

/// Default batch size for general RPM name/provides/requires searches
/// (spec 4.1, 5 — kept small to avoid content-store OOM on wide scans).
pub const BATCH_SIZE_RPM: usize = 25;
/// Default batch size for filename-pinned lookups (SRPM backfill, modular
/// pin-in).
pub const BATCH_SIZE_RPM_SPECIFIC: usize = 500;
/// Default number of new requirements resolved per fixpoint sweep.
pub const BATCH_SIZE_RESOLVER: usize = 150;
/// Default content-store page size.
pub const PAGE_SIZE: usize = 250;

/// A conjunction of field predicates. A `Vec<Criteria>` is read as a
/// disjunction ("OR") of such conjunctions, matching spec 4.1's
/// `create_or_criteria`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Criteria {
    pub fields: Vec<(String, FieldMatch)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldMatch {
    Equals(String),
    Exists,
    True,
}

impl Criteria {
    pub fn and(fields: Vec<(String, FieldMatch)>) -> Criteria {
        Criteria { fields }
    }

    /// Matches every unit unconditionally (used to enumerate all modulemds
    /// in a set of repos, spec 4.2 step 1).
    pub fn true_() -> Criteria {
        Criteria {
            fields: vec![("*".to_string(), FieldMatch::True)],
        }
    }
}

/// Builds one `Criteria` per value, each asserting `field == value` — the
/// single-field specialization of `util::create_or_criteria` used whenever
/// the depsolvers only need to OR together matches on one field (a name or a
/// provides/requires name).
pub fn create_or_criteria_for_names(field: &str, values: &[String]) -> Vec<Criteria> {
    values
        .iter()
        .map(|v| Criteria::and(vec![(field.to_string(), FieldMatch::Equals(v.clone()))]))
        .collect()
}

/// The kind of content a search targets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnitKind {
    Rpm,
    Srpm,
    Modulemd,
    ModulemdDefaults,
}

/// The async contract the depsolvers use to reach the content store.
///
/// A real implementation issues paged criteria searches against Pulp and
/// streams pages into the returned set as each page's future resolves (spec
/// 4.1); the mock below just filters an in-memory fixture.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn search(
        &self,
        repos: &[String],
        criteria: &[Criteria],
        kind: UnitKind,
        batch_size: usize,
    ) -> Result<HashSet<Unit>>;
}

/// Partitions `criteria` into windows of `batch_size` and runs one search per
/// window concurrently, bounded by `max_workers`, folding all pages into one
/// set — the Rust shape of spec 4.1's "partitions into windows... issues one
/// paged search per window; pages are streamed and folded".
pub async fn search_units_per_repos(
    store: &dyn ContentStore,
    repos: &[String],
    criteria: &[Criteria],
    kind: UnitKind,
    batch_size: usize,
    max_workers: usize,
) -> Result<HashSet<Unit>> {
    if criteria.is_empty() {
        return Ok(HashSet::new());
    }

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let windows: Vec<Vec<Criteria>> = criteria.chunks(batch_size).map(|c| c.to_vec()).collect();

    let tasks = windows.into_iter().map(|window| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| DepsolveError::ContentStore(e.to_string()))?;
            store.search(repos, &window, kind, batch_size).await
        }
    });

    let mut out = HashSet::new();
    for result in join_all(tasks).await {
        out.extend(result?);
    }
    Ok(out)
}

/// An in-memory stand-in for the Pulp content store, used by tests and by
/// the CLI demo binary.
#[derive(Clone, Debug, Default)]
pub struct MockContentStore {
    /// repo_id -> units observed in that repo
    repos: HashMap<String, Vec<Unit>>,
}

impl MockContentStore {
    pub fn new() -> MockContentStore {
        MockContentStore::default()
    }

    pub fn add_rpm(&mut self, repo_id: &str, rpm: RpmUnit) -> &mut Self {
        self.repos
            .entry(repo_id.to_string())
            .or_default()
            .push(Unit::rpm(repo_id, rpm));
        self
    }

    pub fn add_modulemd(&mut self, repo_id: &str, md: ModulemdUnit) -> &mut Self {
        self.repos
            .entry(repo_id.to_string())
            .or_default()
            .push(Unit::modulemd(repo_id, md));
        self
    }

    pub fn add_modulemd_defaults(&mut self, repo_id: &str, md: ModulemdDefaultsUnit) -> &mut Self {
        self.repos
            .entry(repo_id.to_string())
            .or_default()
            .push(Unit::modulemd_defaults(repo_id, md));
        self
    }

    fn field_value<'a>(unit: &'a Unit, field: &str) -> Vec<String> {
        match (&unit.payload, field) {
            (crate::model::Payload::Rpm(r), "name") => vec![r.name.clone()],
            (crate::model::Payload::Rpm(r), "filename") => vec![r.filename.clone()],
            (crate::model::Payload::Rpm(r), "provides.name") => {
                r.provides.iter().map(|p| p.name.clone()).collect()
            }
            (crate::model::Payload::Rpm(r), "requires.name") => {
                r.requires.iter().map(|p| p.name.clone()).collect()
            }
            (crate::model::Payload::Rpm(r), "files") => r.files.clone(),
            (crate::model::Payload::Modulemd(m), "name") => vec![m.name.clone()],
            (crate::model::Payload::Modulemd(m), "stream") => vec![m.stream.clone()],
            (crate::model::Payload::ModulemdDefaults(m), "name") => vec![m.name.clone()],
            (crate::model::Payload::ModulemdDefaults(m), "stream") => vec![m.stream.clone()],
            _ => vec![],
        }
    }

    fn matches_criterion(unit: &Unit, criterion: &Criteria) -> bool {
        criterion.fields.iter().all(|(field, matcher)| match matcher {
            FieldMatch::True => true,
            FieldMatch::Exists => !Self::field_value(unit, field).is_empty(),
            FieldMatch::Equals(v) => Self::field_value(unit, field).iter().any(|x| x == v),
        })
    }

    fn kind_matches(unit: &Unit, kind: UnitKind) -> bool {
        match (&unit.payload, kind) {
            (crate::model::Payload::Rpm(r), UnitKind::Rpm) => {
                r.content_type == crate::model::ContentType::Rpm
            }
            (crate::model::Payload::Rpm(r), UnitKind::Srpm) => {
                r.content_type == crate::model::ContentType::Srpm
            }
            (crate::model::Payload::Modulemd(_), UnitKind::Modulemd) => true,
            (crate::model::Payload::ModulemdDefaults(_), UnitKind::ModulemdDefaults) => true,
            _ => false,
        }
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    async fn search(
        &self,
        repos: &[String],
        criteria: &[Criteria],
        kind: UnitKind,
        _batch_size: usize,
    ) -> Result<HashSet<Unit>> {
        let mut out = HashSet::new();
        for repo_id in repos {
            let Some(units) = self.repos.get(repo_id) else {
                continue;
            };
            for unit in units {
                if !Self::kind_matches(unit, kind) {
                    continue;
                }
                if criteria.is_empty() || criteria.iter().any(|c| Self::matches_criterion(unit, c)) {
                    out.insert(unit.clone());
                }
            }
        }
        Ok(out)
    }
}
