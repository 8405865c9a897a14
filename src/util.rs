//! Stand-alone helpers shared by every depsolver: NEVRA parsing, blacklist
//! matching, rich-dependency-clause flattening, and latest-N selection.
//!
//! Grounded on `original_source/ubi_manifest/worker/utils.py`, the
//! authoritative helper module behind all three Python depsolvers — ported
//! function-for-function rather than rewritten from scratch, since its
//! exact tie-breaking and bucketing behavior is part of the observable
//! contract (spec 3, 5, 9).

use std::collections::{HashMap, HashSet};

use crate::model::{ModulemdDefaultsUnit, ModulemdUnit, PackageToExclude, RpmUnit};
use crate::query::{Criteria, FieldMatch};
use crate::rpm::{vercmp, RpmDependency, EVR};

/// A filename split into its NEVRA parts, per RPM's
/// `name-[epoch:]version-release.arch.rpm` convention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nevra {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub arch: String,
}

/// Splits `"bash-5.1.8-6.el9.x86_64.rpm"` into its NEVRA parts. Strips a
/// trailing `.rpm` if present, then reads the arch and release/version off
/// the end, leaving the name as everything left over — the same
/// right-to-left scan `split_filename` uses so names containing hyphens
/// don't trip it up.
pub fn split_filename(filename: &str) -> Result<Nevra, String> {
    let trimmed = filename.strip_suffix(".rpm").unwrap_or(filename);

    // epoch, if present, prefixes the whole NEVRA ("32:bind-9.10.2-..."),
    // not the version token, so it has to be pulled off before the
    // name/version/release scan starts (`utils.py::split_filename` does the
    // equivalent `filename.find(":")` against the full string up front).
    let (epoch, trimmed) = match trimmed.split_once(':') {
        Some((e, rest)) => (
            Some(e.parse::<u32>().map_err(|_| format!("{}: bad epoch", filename))?),
            rest,
        ),
        None => (None, trimmed),
    };

    let (rest, arch) = trimmed
        .rsplit_once('.')
        .ok_or_else(|| format!("{}: missing arch component", filename))?;

    let (name_version, release) = rest
        .rsplit_once('-')
        .ok_or_else(|| format!("{}: missing release component", filename))?;

    let (name, version) = name_version
        .rsplit_once('-')
        .ok_or_else(|| format!("{}: missing version component", filename))?;

    Ok(Nevra {
        name: name.to_string(),
        epoch,
        version: version.to_string(),
        release: release.to_string(),
        arch: arch.to_string(),
    })
}

/// Whether `(name, arch)` is covered by any entry in `blacklist` (spec 4.6,
/// 9): an arch-scoped entry only fires for that arch, a global entry fires
/// for every arch including `src`, and matching is exact or glob-prefix per
/// entry.
pub fn is_blacklisted(name: &str, arch: &str, blacklist: &[PackageToExclude]) -> bool {
    blacklist.iter().any(|entry| entry.matches(name, arch))
}

/// Whether `name` matches any blacklist entry regardless of arch — used when
/// diagnosing an unresolved requirement, where no providing unit (and so no
/// arch) was ever found (spec 4.2 step 7).
pub fn is_name_blacklisted(name: &str, blacklist: &[PackageToExclude]) -> bool {
    blacklist.iter().any(|entry| {
        if entry.globbing {
            name.starts_with(entry.name.as_str())
        } else {
            name == entry.name
        }
    })
}

/// A logger that discards everything, for callers (tests, one-off CLI
/// fixtures) that don't care where a depsolver's diagnostics go.
pub fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// Parses one blacklist config row into a `PackageToExclude`. `raw_name`
/// ending in `*` becomes a glob-prefix match with the star stripped; `arch`
/// of `None` matches every architecture.
pub fn parse_blacklist_config(rows: &[(String, Option<String>)]) -> Vec<PackageToExclude> {
    rows.iter()
        .map(|(raw_name, arch)| {
            let globbing = raw_name.ends_with('*');
            let name = if globbing {
                raw_name.trim_end_matches('*').to_string()
            } else {
                raw_name.clone()
            };
            PackageToExclude {
                name,
                globbing,
                arch: arch.clone(),
            }
        })
        .collect()
}

/// Builds an OR-of-ANDs criteria list: `fields` names the columns, each
/// entry of `rows` is one tuple of values aligned to `fields`, producing one
/// `Criteria` (AND of equals) per row — the content-store query shape spec
/// 4.1 calls "one criteria conjunction per candidate tuple, unioned".
pub fn create_or_criteria(fields: &[&str], rows: &[Vec<String>]) -> Vec<Criteria> {
    rows.iter()
        .map(|row| {
            let conjunction = fields
                .iter()
                .zip(row.iter())
                .map(|(field, value)| (field.to_string(), FieldMatch::Equals(value.clone())))
                .collect();
            Criteria::and(conjunction)
        })
        .collect()
}

const BOOL_KEYWORDS: &[&str] = &["if", "else", "and", "or", "unless", "with", "without"];
const COMPARISON_OPERATORS: &[&str] = &["<=", ">=", "<", ">", "="];

/// Flattens a rich/boolean RPM dependency clause down to the set of atom
/// names it mentions, deliberately discarding the if/else/and/or/unless/
/// with/without structure (spec Non-goals: no boolean-clause evaluation,
/// only a conservative over-approximation of "names this clause touches").
///
/// `"(foo if bar else baz >= 1.0)"` yields `{"foo", "bar", "baz"}`.
pub fn parse_bool_deps(expr: &str) -> HashSet<String> {
    let stripped: String = expr.chars().filter(|c| *c != '(' && *c != ')').collect();

    let mut names = HashSet::new();
    let mut tokens = stripped.split_whitespace().peekable();

    while let Some(tok) = tokens.next() {
        if BOOL_KEYWORDS.contains(&tok) {
            continue;
        }
        if COMPARISON_OPERATORS.contains(&tok) {
            tokens.next(); // skip the version value that follows
            continue;
        }
        names.insert(tok.to_string());
    }

    names
}

/// Whether `provider` (acting as a `Provides`) resolves `requirement` (a
/// `Requires`) — a thin, named wrapper over `RpmDependency::resolves`
/// matching the original `RELATION_CMP_MAP`-driven `is_requirement_resolved`
/// entry point other modules call by name.
pub fn is_requirement_resolved(provider: &RpmDependency, requirement: &RpmDependency) -> bool {
    provider.resolves(requirement)
}

/// Selects the latest `n` distinct `(version, release)` pairs from `rpms`,
/// then re-buckets survivors into per-arch FIFOs capped at `n` each (spec 5,
/// "Latest-N-per-arch").
///
/// Two passes, matching `keep_n_latest_rpms`: first a version-level cut
/// (ignoring arch) picks which `(version, release)`s make the window at
/// all; second, within that window, each arch keeps at most its own `n`
/// newest, since one version/release can appear in several arches and
/// blacklisted names/arches never occupy a slot.
pub fn keep_n_latest_rpms<'a>(
    rpms: &'a [RpmUnit],
    n: usize,
    blacklist: &[PackageToExclude],
) -> HashSet<&'a RpmUnit> {
    if n == 0 || rpms.is_empty() {
        return HashSet::new();
    }

    let eligible: Vec<&RpmUnit> = rpms
        .iter()
        .filter(|r| !is_blacklisted(&r.name, &r.arch, blacklist))
        .collect();

    let mut sorted = eligible.clone();
    sorted.sort_by(|a, b| {
        let evr_a = EVR::new(a.epoch, a.version.clone(), a.release.clone());
        let evr_b = EVR::new(b.epoch, b.version.clone(), b.release.clone());
        evr_b.cmp(&evr_a)
    });

    let mut allowed_versions: HashSet<(String, String)> = HashSet::new();
    for rpm in &sorted {
        let key = (rpm.version.clone(), rpm.release.clone());
        if allowed_versions.len() >= n && !allowed_versions.contains(&key) {
            break;
        }
        allowed_versions.insert(key);
    }

    let mut per_arch_counts: HashMap<String, usize> = HashMap::new();
    let mut kept = HashSet::new();
    for rpm in sorted {
        if !allowed_versions.contains(&(rpm.version.clone(), rpm.release.clone())) {
            continue;
        }
        let count = per_arch_counts.entry(rpm.arch.clone()).or_insert(0);
        if *count >= n {
            continue;
        }
        *count += 1;
        kept.insert(rpm);
    }

    kept
}

/// Groups `modules` by `(name, stream, context, arch)` and keeps the `n`
/// highest-versioned entries per group (spec 4.2, "latest N module
/// versions"). Ties on version keep input order, the only deterministic
/// answer available without a secondary key.
pub fn keep_n_latest_modules(modules: &[ModulemdUnit], n: usize) -> HashSet<ModulemdUnit> {
    let mut groups: HashMap<(String, String, String, String), Vec<&ModulemdUnit>> = HashMap::new();
    for m in modules {
        groups
            .entry((m.name.clone(), m.stream.clone(), m.context.clone(), m.arch.clone()))
            .or_default()
            .push(m);
    }

    let mut kept = HashSet::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| b.version.cmp(&a.version));
        for m in group.into_iter().take(n.max(1)) {
            kept.insert(m.clone());
        }
    }
    kept
}

/// Keeps at most `n` `modulemd_defaults` entries per `(name, stream)` pair,
/// preferring entries encountered earlier (higher-priority input repos are
/// expected to be passed first, mirroring the Python helper's reliance on
/// caller-side repo-priority ordering rather than a field on the unit
/// itself).
pub fn keep_n_latest_modulemd_defaults(
    defaults: &[ModulemdDefaultsUnit],
    n: usize,
) -> HashSet<ModulemdDefaultsUnit> {
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let mut kept = HashSet::new();
    for d in defaults {
        let key = (d.name.clone(), d.stream.clone());
        let count = seen.entry(key).or_insert(0);
        if *count >= n.max(1) {
            continue;
        }
        *count += 1;
        kept.insert(d.clone());
    }
    kept
}

/// Folds a slice of `HashSet`s into one, the Rust shape of
/// `flatten_list_of_sets`.
pub fn flatten_sets<T: std::hash::Hash + Eq + Clone>(sets: &[HashSet<T>]) -> HashSet<T> {
    sets.iter().flat_map(|s| s.iter().cloned()).collect()
}

/// Renames the keys of a map according to `mapping`, dropping any key with
/// no entry in `mapping` — the Rust shape of `remap_keys`, used by the
/// coordinator to translate input-repo ids to output-repo ids before
/// merging.
pub fn remap_keys<V>(map: HashMap<String, V>, mapping: &HashMap<String, String>) -> HashMap<String, V> {
    map.into_iter()
        .filter_map(|(k, v)| mapping.get(&k).map(|nk| (nk.clone(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpm(name: &str, version: &str, release: &str, arch: &str) -> RpmUnit {
        RpmUnit {
            name: name.to_string(),
            epoch: None,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
            filename: format!("{}-{}-{}.{}.rpm", name, version, release, arch),
            sourcerpm: None,
            content_type: crate::model::ContentType::Rpm,
            provides: vec![],
            requires: vec![],
            files: vec![],
        }
    }

    #[test]
    fn splits_simple_filename() {
        let nevra = split_filename("bash-5.1.8-6.el9.x86_64.rpm").unwrap();
        assert_eq!(nevra.name, "bash");
        assert_eq!(nevra.version, "5.1.8");
        assert_eq!(nevra.release, "6.el9");
        assert_eq!(nevra.arch, "x86_64");
        assert_eq!(nevra.epoch, None);
    }

    #[test]
    fn splits_filename_with_epoch() {
        // spec's own Testable Property 10 example: epoch prefixes the whole
        // NEVRA, not the version token.
        let nevra = split_filename("32:bind-9.10.2-2.P1.fc22.x86_64.rpm").unwrap();
        assert_eq!(nevra.name, "bind");
        assert_eq!(nevra.epoch, Some(32));
        assert_eq!(nevra.version, "9.10.2");
        assert_eq!(nevra.release, "2.P1.fc22");
        assert_eq!(nevra.arch, "x86_64");
    }

    #[test]
    fn blacklist_glob_matches_prefix() {
        let list = parse_blacklist_config(&[("kernel*".to_string(), None)]);
        assert!(is_blacklisted("kernel-devel", "x86_64", &list));
        assert!(!is_blacklisted("bash", "x86_64", &list));
    }

    #[test]
    fn blacklist_arch_scoped_entry_ignores_other_arch() {
        let list = parse_blacklist_config(&[("foo".to_string(), Some("src".to_string()))]);
        assert!(is_blacklisted("foo", "src", &list));
        assert!(!is_blacklisted("foo", "x86_64", &list));
    }

    #[test]
    fn bool_deps_flattens_rich_clause() {
        let names = parse_bool_deps("(foo if bar else baz >= 1.0)");
        assert_eq!(
            names,
            HashSet::from(["foo".to_string(), "bar".to_string(), "baz".to_string()])
        );
    }

    #[test]
    fn keep_n_latest_rpms_picks_latest_window_per_arch() {
        let rpms = vec![
            rpm("foo", "3.0", "1", "x86_64"),
            rpm("foo", "2.0", "1", "x86_64"),
            rpm("foo", "1.0", "1", "x86_64"),
            rpm("foo", "2.0", "1", "aarch64"),
        ];
        let kept = keep_n_latest_rpms(&rpms, 2, &[]);
        let versions: HashSet<&str> = kept.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, HashSet::from(["3.0", "2.0"]));
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn keep_n_latest_rpms_drops_blacklisted_names() {
        let rpms = vec![rpm("foo", "1.0", "1", "x86_64")];
        let blacklist = parse_blacklist_config(&[("foo".to_string(), None)]);
        let kept = keep_n_latest_rpms(&rpms, 5, &blacklist);
        assert!(kept.is_empty());
    }
}
