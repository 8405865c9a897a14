//! ubi-manifest-depsolver
//!
// Copyright (C) 2016
// Red Hat, Inc.  All rights reserved.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//
//! ## Overview
//!
//! Resolves UBI output repo manifests against Pulp-backed input
//! repositories: [rpm_depsolver](rpm_depsolver/index.html) and
//! [srpm_depsolver](srpm_depsolver/index.html) close binary/source RPM
//! dependency graphs, [modulemd_depsolver](modulemd_depsolver/index.html)
//! closes module dependency graphs, and
//! [coordinator](coordinator/index.html) orchestrates all three into one
//! persisted manifest per output repo. [api](api/index.html) exposes the
//! same pipeline over HTTP.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod modulemd_depsolver;
pub mod persistence;
pub mod query;
pub mod rpm;
pub mod rpm_depsolver;
pub mod srpm_depsolver;
pub mod util;

pub use config::WorkerConfig;
pub use error::{DepsolveError, Result};
