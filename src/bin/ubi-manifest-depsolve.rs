//! CLI entry point.
//!
//! Replaces the teacher's `getopts`-based `main.rs` with `clap` derive, the
//! stack `archlinux-alpm` and `mjcarson-thorium` both reach for. Two
//! subcommands: `serve` launches the Rocket API (spec 6), `resolve` runs one
//! depsolve job from a JSON request file against a JSON content-store
//! fixture and prints the resulting manifest, for local testing without a
//! live Pulp instance.

use std::fs;
use std::process::exit;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use slog::{error, info, o, Drain};

use ubi_manifest_depsolver::api::{self, AppState};
use ubi_manifest_depsolver::config::{ConfigResolver, WorkerConfig};
use ubi_manifest_depsolver::coordinator::{Coordinator, RepoRequest};
use ubi_manifest_depsolver::model::RepoGroup;
use ubi_manifest_depsolver::query::MockContentStore;

#[derive(Parser)]
#[command(name = "ubi-manifest-depsolve", about = "Resolve UBI manifest content sets")]
struct Cli {
    /// Path to the worker INI config; falls back to built-in defaults.
    #[arg(long)]
    config: Option<String>,
    /// Path to the content config YAML (input/output content set flags).
    #[arg(long)]
    content_config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the HTTP API.
    Serve,
    /// Resolve one job from a request file against a fixture content store.
    Resolve {
        /// JSON-encoded `Vec<RepoRequest>`-shaped job file.
        job_file: String,
        /// JSON-encoded content-store fixture.
        fixture_file: String,
    },
}

/// Human-readable terminal output for interactive use, newline-delimited
/// JSON for anything consuming this binary's stderr as a log stream (spec
/// B's ambient logging requirement); both async-buffered so a slow consumer
/// on either drain never blocks depsolve work.
fn build_logger() -> slog::Logger {
    let term_decorator = slog_term::TermDecorator::new().stderr().build();
    let term_drain = slog_term::FullFormat::new(term_decorator).build().fuse();
    let term_drain = slog_async::Async::new(term_drain).build().fuse();

    let json_drain = slog_json::Json::default(std::io::stderr()).fuse();
    let json_drain = slog_async::Async::new(json_drain).build().fuse();

    let drain = slog::Duplicate::new(term_drain, json_drain).fuse();
    slog::Logger::root(drain, o!("service" => "ubi-manifest-depsolve"))
}

fn load_worker_config(path: Option<&str>) -> WorkerConfig {
    match path {
        Some(p) => match fs::read_to_string(p).map(|raw| WorkerConfig::from_ini_str(&raw)) {
            Ok(Ok(cfg)) => cfg,
            _ => WorkerConfig::default(),
        },
        None => WorkerConfig::default(),
    }
}

fn load_config_resolver(path: Option<&str>) -> ConfigResolver {
    match path {
        Some(p) => match fs::read_to_string(p).map(|raw| ConfigResolver::from_yaml_str(&raw)) {
            Ok(Ok(resolver)) => resolver,
            _ => ConfigResolver::new(vec![]),
        },
        None => ConfigResolver::new(vec![]),
    }
}

#[rocket::main]
async fn main() {
    let cli = Cli::parse();
    let log = build_logger();
    let worker_config = load_worker_config(cli.config.as_deref());

    match cli.command {
        Command::Serve => {
            let resolver = load_config_resolver(cli.content_config.as_deref());
            let store: Arc<dyn ubi_manifest_depsolver::query::ContentStore> = Arc::new(MockContentStore::new());
            let state = AppState::new(store, resolver, worker_config, log.clone());

            info!(log, "starting API"; "routes" => 4);
            let result = rocket::build()
                .manage(state)
                .mount(
                    "/",
                    rocket::routes![
                        api::submit_manifest,
                        api::get_task,
                        api::get_manifest,
                        api::status
                    ],
                )
                .launch()
                .await;

            if let Err(e) = result {
                error!(log, "server exited with error"; "error" => e.to_string());
                exit(1);
            }
        }
        Command::Resolve { job_file, fixture_file } => {
            let job_raw = fs::read_to_string(&job_file).unwrap_or_else(|e| {
                error!(log, "failed to read job file"; "path" => &job_file, "error" => e.to_string());
                exit(1);
            });
            let requests: Vec<RepoRequestJson> = match serde_json::from_str(&job_raw) {
                Ok(r) => r,
                Err(e) => {
                    error!(log, "failed to parse job file"; "error" => e.to_string());
                    exit(1);
                }
            };

            let fixture_raw = fs::read_to_string(&fixture_file).unwrap_or_else(|e| {
                error!(log, "failed to read fixture file"; "path" => &fixture_file, "error" => e.to_string());
                exit(1);
            });
            let store: MockContentStore = match serde_json::from_str::<FixtureJson>(&fixture_raw) {
                Ok(fixture) => fixture.into_store(),
                Err(e) => {
                    error!(log, "failed to parse fixture file"; "error" => e.to_string());
                    exit(1);
                }
            };

            let mut resolver = load_config_resolver(cli.content_config.as_deref());
            let mut coordinator = Coordinator::new(&store, &worker_config, &mut resolver, log.clone());
            let requests: Vec<RepoRequest> = requests.into_iter().map(RepoRequestJson::into_request).collect();

            match coordinator.run(requests).await {
                Ok(merged) => {
                    let entries: std::collections::HashMap<_, _> = merged
                        .iter()
                        .map(|(repo, units)| {
                            (
                                repo.clone(),
                                units
                                    .iter()
                                    .map(ubi_manifest_depsolver::model::ManifestEntry::from)
                                    .collect::<Vec<_>>(),
                            )
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&entries).unwrap());
                }
                Err(e) => {
                    error!(log, "depsolve failed"; "error" => e.to_string());
                    exit(1);
                }
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct RepoRequestJson {
    binary_repo_id: String,
    debug_repo_id: String,
    source_repo_id: String,
    input_repos: Vec<String>,
    input_content_set: String,
    output_content_set: String,
    version: String,
    #[serde(default)]
    requested_modules: Vec<ubi_manifest_depsolver::model::RequestedModule>,
}

impl RepoRequestJson {
    fn into_request(self) -> RepoRequest {
        RepoRequest {
            repos: RepoGroup {
                binary_repo_id: self.binary_repo_id,
                debug_repo_id: self.debug_repo_id,
                source_repo_id: self.source_repo_id,
            },
            input_repos: self.input_repos,
            input_content_set: self.input_content_set,
            output_content_set: self.output_content_set,
            version: self.version,
            requested_modules: self.requested_modules,
        }
    }
}

#[derive(serde::Deserialize)]
struct FixtureJson {
    #[serde(default)]
    rpms: Vec<(String, ubi_manifest_depsolver::model::RpmUnit)>,
}

impl FixtureJson {
    fn into_store(self) -> MockContentStore {
        let mut store = MockContentStore::new();
        for (repo_id, rpm) in self.rpms {
            store.add_rpm(&repo_id, rpm);
        }
        store
    }
}
