//! Crate-wide error types.
//!
//! Replaces the teacher's `Result<_, String>` / `try!` idiom with typed,
//! `thiserror`-derived variants, one enum per concern, the way `recipe.rs`
//! kept a dedicated `RecipeError` alongside the rest of the crate.

use thiserror::Error;

/// Errors raised while resolving or running a single depsolve job.
#[derive(Debug, Error)]
pub enum DepsolveError {
    /// No `Config` matches `(input_cs, output_cs, version)` after falling back
    /// from `X.Y.Z` to `X.Y` to `X`.
    #[error("no content config found for content set {input_cs}->{output_cs} version {version}")]
    ContentConfigMissing {
        input_cs: String,
        output_cs: String,
        version: String,
    },

    /// Two or more configs consumed by one coordinator run disagree on flags.
    #[error("inconsistent depsolver config: flags differ across configs in job ({detail})")]
    InconsistentDepsolverConfig { detail: String },

    /// The content store reported a transport-level failure. The whole job
    /// fails and no partial manifest is persisted (spec 7).
    #[error("content store query failed: {0}")]
    ContentStore(String),

    /// A requirement string, EVR string, or NEVRA filename failed to parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// Writing the resolved manifest to the result store failed.
    #[error("result store write failed: {0}")]
    Persistence(String),

    /// A repo id referenced in a job has no corresponding population-source
    /// mapping (binary/debug/source triplet could not be built).
    #[error("unknown repo class for repo id {0}")]
    UnknownRepo(String),
}

pub type Result<T> = std::result::Result<T, DepsolveError>;
