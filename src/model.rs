//! Core data model: tagged content units, depsolver inputs, and manifest
//! entries.
//!
//! `Unit` generalizes the teacher's `DepAtom`/`DepCell` tagged-union style
//! (`depclose.rs`) into the spec's content-store-native wrapper: a payload
//! (`Rpm`, `Modulemd`, or `ModulemdDefaults`) plus the source repository id
//! it was observed in, mirroring `original_source`'s `UbiUnit`.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::rpm::RpmDependency;

/// One resolved RPM, as seen from the content store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RpmUnit {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub filename: String,
    pub sourcerpm: Option<String>,
    pub content_type: ContentType,
    pub provides: Vec<RpmDependency>,
    pub requires: Vec<RpmDependency>,
    pub files: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ContentType {
    Rpm,
    Srpm,
}

/// A dependency on another module, name plus optional stream.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct ModuleDep {
    pub name: String,
    pub stream: Option<String>,
}

/// A resolved modulemd stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModulemdUnit {
    pub name: String,
    pub stream: String,
    pub version: i64,
    pub context: String,
    pub arch: String,
    pub artifacts: Vec<String>,
    pub dependencies: Vec<ModuleDep>,
    pub profiles: HashMap<String, Vec<String>>,
}

impl Hash for ModulemdUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.stream.hash(state);
        self.version.hash(state);
        self.context.hash(state);
        self.arch.hash(state);
        self.artifacts.hash(state);
        self.dependencies.hash(state);
        hash_profiles(&self.profiles, state);
    }
}

impl ModulemdUnit {
    /// "name:stream:version:context:arch", the dedup key used for output
    /// manifests (spec 3, Manifest Entry `unit_attr`).
    pub fn nsvca(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.name, self.stream, self.version, self.context, self.arch
        )
    }

    /// Filenames of artifact NEVRAs, as derived via `split_filename`-style
    /// parsing of each artifact NEVRA string (`name-[epoch:]version-release.arch`).
    pub fn artifact_filenames(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .map(|nevra| format!("{}.rpm", nevra))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModulemdDefaultsUnit {
    pub name: String,
    pub stream: String,
    pub repo_id: String,
    /// stream -> list of default profile names
    pub profiles: HashMap<String, Vec<String>>,
}

impl Hash for ModulemdDefaultsUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.stream.hash(state);
        self.repo_id.hash(state);
        hash_profiles(&self.profiles, state);
    }
}

/// Order-independent hash of a `name -> profiles` map, consistent with its
/// derived `PartialEq`/`Eq`.
fn hash_profiles<H: Hasher>(profiles: &HashMap<String, Vec<String>>, state: &mut H) {
    let mut entries: Vec<(&String, &Vec<String>)> = profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.hash(state);
}

/// The polymorphic payload a `Unit` carries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Payload {
    Rpm(RpmUnit),
    Modulemd(ModulemdUnit),
    ModulemdDefaults(ModulemdDefaultsUnit),
}

/// A content-store unit tagged with the repository it was observed in.
///
/// Equality and hashing are `(payload, source_repo_id)`: two units wrapping
/// identical content but distinct source repositories are distinct, which is
/// what lets the merge step in the coordinator keep one copy per source repo
/// (spec 4.2 "Output shape").
#[derive(Clone, Debug)]
pub struct Unit {
    pub source_repo_id: String,
    pub payload: Payload,
}

impl Unit {
    pub fn rpm(source_repo_id: impl Into<String>, rpm: RpmUnit) -> Unit {
        Unit {
            source_repo_id: source_repo_id.into(),
            payload: Payload::Rpm(rpm),
        }
    }

    pub fn modulemd(source_repo_id: impl Into<String>, md: ModulemdUnit) -> Unit {
        Unit {
            source_repo_id: source_repo_id.into(),
            payload: Payload::Modulemd(md),
        }
    }

    pub fn modulemd_defaults(source_repo_id: impl Into<String>, md: ModulemdDefaultsUnit) -> Unit {
        Unit {
            source_repo_id: source_repo_id.into(),
            payload: Payload::ModulemdDefaults(md),
        }
    }

    pub fn as_rpm(&self) -> Option<&RpmUnit> {
        match &self.payload {
            Payload::Rpm(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_modulemd(&self) -> Option<&ModulemdUnit> {
        match &self.payload {
            Payload::Modulemd(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_modulemd_defaults(&self) -> Option<&ModulemdDefaultsUnit> {
        match &self.payload {
            Payload::ModulemdDefaults(m) => Some(m),
            _ => None,
        }
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload && self.source_repo_id == other.source_repo_id
    }
}
impl Eq for Unit {}

impl Hash for Unit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.hash(state);
        self.source_repo_id.hash(state);
    }
}

/// A blacklist entry. `arch = None` matches every arch; `arch = Some("src")`
/// applies only to source RPMs, the bucket kept separate at parse time (spec
/// 4.6, 9).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageToExclude {
    pub name: String,
    pub globbing: bool,
    pub arch: Option<String>,
}

impl PackageToExclude {
    pub fn matches(&self, name: &str, arch: &str) -> bool {
        if let Some(ref want_arch) = self.arch {
            if want_arch != arch {
                return false;
            }
        }
        if self.globbing {
            name.starts_with(self.name.as_str())
        } else {
            name == self.name
        }
    }
}

/// One output repo's demand on the RPM depsolver.
#[derive(Clone, Debug, Default)]
pub struct DepsolverItem {
    pub output_repo_id: String,
    pub whitelist: std::collections::HashSet<String>,
    pub blacklist: Vec<PackageToExclude>,
    pub in_pulp_repos: Vec<String>,
    /// Filenames already claimed by a resolved module artifact (spec 4.2
    /// step 2): excluded from the base-package seed so a package pulled in
    /// through a module isn't duplicated as a non-modular base package.
    pub modular_rpm_filenames: std::collections::HashSet<String>,
    /// Filenames named by a module's `modulemd_dependencies` (spec 4.2 step
    /// 3): unioned into the output set unconditionally, bypassing both the
    /// modular-filename exclusion and the blacklist.
    pub modulemd_pin_filenames: std::collections::HashSet<String>,
    /// Skips the fixpoint closure pass (spec 4.2 step 5): only the seeded
    /// base/pinned packages are resolved, no transitive requirement walk.
    pub base_pkgs_only: bool,
}

/// A requested module, with optional stream and profile pins.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestedModule {
    pub name: String,
    pub stream: Option<String>,
    pub profiles: Vec<String>,
}

/// One output repo's demand on the modulemd depsolver.
#[derive(Clone, Debug)]
pub struct ModularDepsolverItem {
    pub output_repo_id: String,
    pub modulelist: Vec<RequestedModule>,
    pub in_pulp_repos: Vec<String>,
}

/// The correlated {binary, debug, source} output triple for one UBI repo,
/// plus each leg's input repositories.
#[derive(Clone, Debug)]
pub struct RepoGroup {
    pub binary_repo_id: String,
    pub debug_repo_id: String,
    pub source_repo_id: String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ManifestUnitType {
    RpmUnit,
    ModulemdUnit,
    ModulemdDefaultsUnit,
}

/// One entry in a persisted manifest (spec 6, "Persisted result layout").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub src_repo_id: String,
    pub unit_type: ManifestUnitType,
    pub unit_attr: String,
    pub value: String,
}

impl From<&Unit> for ManifestEntry {
    fn from(unit: &Unit) -> Self {
        match &unit.payload {
            Payload::Rpm(r) => ManifestEntry {
                src_repo_id: unit.source_repo_id.clone(),
                unit_type: ManifestUnitType::RpmUnit,
                unit_attr: "filename".to_string(),
                value: r.filename.clone(),
            },
            Payload::Modulemd(m) => ManifestEntry {
                src_repo_id: unit.source_repo_id.clone(),
                unit_type: ManifestUnitType::ModulemdUnit,
                unit_attr: "nsvca".to_string(),
                value: m.nsvca(),
            },
            Payload::ModulemdDefaults(m) => ManifestEntry {
                src_repo_id: unit.source_repo_id.clone(),
                unit_type: ManifestUnitType::ModulemdDefaultsUnit,
                unit_attr: "name:stream".to_string(),
                value: format!("{}:{}", m.name, m.stream),
            },
        }
    }
}
