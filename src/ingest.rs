//! Import orchestration.
//!
//! Runs discovery and grouping once, then loads every type group, either one
//! after another or with one tokio task per type. Concurrent tasks share
//! nothing mutable: each owns its [`TypeGroup`] and opens its own cluster
//! session. The run waits for every task before reporting.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cluster::{ClusterConnector, RestConnector};
use crate::config::Config;
use crate::discovery::discover_files;
use crate::grouping::{group_files_with, Grouping};
use crate::loader::load_type_group;
use crate::models::{CollectionReport, SchemaState, TypeGroup};
use crate::progress::{ImportProgressEvent, ImportProgressReporter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    Sequential,
    Parallel,
}

impl ImportMode {
    pub fn from_flag(parallel: bool) -> Self {
        if parallel {
            ImportMode::Parallel
        } else {
            ImportMode::Sequential
        }
    }
}

/// Files and type groups found in the data directory.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub files: Vec<PathBuf>,
    pub grouping: Grouping,
}

/// Outcome of a whole import run.
///
/// `reports` are in type discovery order regardless of mode.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub files_found: usize,
    pub types: Vec<String>,
    pub reports: Vec<CollectionReport>,
    pub elapsed: Duration,
}

impl ImportSummary {
    pub fn failed_collections(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.collection.as_str())
            .collect()
    }
}

/// Discover and group the input files.
pub fn scan(config: &Config, progress: &dyn ImportProgressReporter) -> Result<ScanResult> {
    progress.report(ImportProgressEvent::Discovering {
        dir: config.import.data_dir.display().to_string(),
    });
    let files = discover_files(&config.import)?;

    let grouping = group_files_with(&files, &config.import.default_type, |n, total| {
        progress.report(ImportProgressEvent::Grouping {
            n: n as u64,
            total: total as u64,
        })
    });

    if !grouping.unreadable.is_empty() {
        warn!(count = grouping.unreadable.len(), "skipped unreadable files");
    }
    if !grouping.missing_id.is_empty() {
        warn!(count = grouping.missing_id.len(), "skipped documents without id");
    }

    Ok(ScanResult { files, grouping })
}

/// Load every group through `connector` and wait for all of them.
///
/// Per-step failures end up in the returned reports. An error is returned
/// only when a session could not be opened (or a task panicked); in parallel
/// mode the remaining tasks still run to completion first.
pub async fn import_groups(
    config: Arc<Config>,
    connector: Arc<dyn ClusterConnector>,
    groups: Vec<TypeGroup>,
    mode: ImportMode,
    progress: Arc<dyn ImportProgressReporter>,
) -> Result<Vec<CollectionReport>> {
    match mode {
        ImportMode::Sequential => {
            let mut reports = Vec::with_capacity(groups.len());
            for group in &groups {
                let report = load_one(&config, connector.as_ref(), group, progress.as_ref()).await?;
                reports.push(report);
            }
            Ok(reports)
        }
        ImportMode::Parallel => {
            let mut tasks = JoinSet::new();
            for (position, group) in groups.into_iter().enumerate() {
                let config = Arc::clone(&config);
                let connector = Arc::clone(&connector);
                let progress = Arc::clone(&progress);
                tasks.spawn(async move {
                    let report =
                        load_one(&config, connector.as_ref(), &group, progress.as_ref()).await;
                    (position, report)
                });
            }

            let mut finished = Vec::new();
            let mut first_error = None;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((position, Ok(report))) => finished.push((position, report)),
                    Ok((_, Err(e))) => {
                        first_error.get_or_insert(e);
                    }
                    Err(e) => {
                        first_error.get_or_insert(anyhow!("import task failed: {}", e));
                    }
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
            finished.sort_by_key(|(position, _)| *position);
            Ok(finished.into_iter().map(|(_, report)| report).collect())
        }
    }
}

async fn load_one(
    config: &Config,
    connector: &dyn ClusterConnector,
    group: &TypeGroup,
    progress: &dyn ImportProgressReporter,
) -> Result<CollectionReport> {
    progress.report(ImportProgressEvent::Loading {
        collection: group.doc_type.clone(),
        documents: group.len() as u64,
    });
    let report = load_type_group(connector, config, group).await?;
    progress.report(ImportProgressEvent::Loaded {
        collection: report.collection.clone(),
        ok: report.succeeded(),
    });
    Ok(report)
}

/// Scan the data directory and load it through `connector`.
pub async fn run_import_with(
    config: Arc<Config>,
    connector: Arc<dyn ClusterConnector>,
    mode: ImportMode,
    progress: Arc<dyn ImportProgressReporter>,
) -> Result<ImportSummary> {
    let start = Instant::now();
    let scanned = scan(&config, progress.as_ref())?;
    import_scanned(config, connector, scanned, mode, progress, start).await
}

/// Load the groups of an earlier [`scan`]; `start` is when the run began.
pub async fn import_scanned(
    config: Arc<Config>,
    connector: Arc<dyn ClusterConnector>,
    scanned: ScanResult,
    mode: ImportMode,
    progress: Arc<dyn ImportProgressReporter>,
    start: Instant,
) -> Result<ImportSummary> {
    let types: Vec<String> = scanned
        .grouping
        .types()
        .into_iter()
        .map(str::to_string)
        .collect();
    info!(
        files = scanned.files.len(),
        types = types.len(),
        ?mode,
        "importing data into collections"
    );

    let reports = import_groups(
        config,
        connector,
        scanned.grouping.into_groups(),
        mode,
        progress,
    )
    .await?;

    Ok(ImportSummary {
        files_found: scanned.files.len(),
        types,
        reports,
        elapsed: start.elapsed(),
    })
}

/// `seed import`: load the data directory into the configured cluster.
pub async fn run_import(
    config: &Config,
    mode: ImportMode,
    dry_run: bool,
    progress: Arc<dyn ImportProgressReporter>,
) -> Result<()> {
    let start = Instant::now();
    let scanned = scan(config, progress.as_ref())?;

    if dry_run {
        println!("import (dry-run)");
        print_scan(&scanned);
        return Ok(());
    }

    println!(
        "Importing sample data into {} ({}.{})",
        config.cluster.host, config.cluster.bucket, config.cluster.scope
    );
    println!("  json files found: {}", scanned.files.len());
    println!("  types found: {}", scanned.grouping.types().len());
    for doc_type in scanned.grouping.types() {
        println!("    {}", doc_type);
    }
    println!(
        "  mode: {}",
        match mode {
            ImportMode::Parallel => "parallel",
            ImportMode::Sequential => "sequential",
        }
    );

    let connector: Arc<dyn ClusterConnector> = Arc::new(RestConnector::new(&config.cluster)?);
    let summary = import_scanned(
        Arc::new(config.clone()),
        connector,
        scanned,
        mode,
        progress,
        start,
    )
    .await?;

    for report in &summary.reports {
        println!(
            "  {:<20} {:>7} docs  schema: {:<8} upsert: {:<8} index: {}",
            report.collection,
            report.documents,
            schema_label(report),
            report.upsert,
            report.index
        );
    }
    println!("Finished in {:.2} second(s)", summary.elapsed.as_secs_f64());

    let failed = summary.failed_collections();
    if !failed.is_empty() {
        println!("  collections with errors: {}", failed.join(", "));
    }
    println!("ok");
    Ok(())
}

/// `seed scan`: discovery and grouping only, no cluster access.
pub fn run_scan(config: &Config, progress: &dyn ImportProgressReporter) -> Result<()> {
    let scanned = scan(config, progress)?;
    println!("scan {}", config.import.data_dir.display());
    print_scan(&scanned);
    println!("ok");
    Ok(())
}

fn print_scan(scan: &ScanResult) {
    println!("  json files found: {}", scan.files.len());
    println!("  types found: {}", scan.grouping.types().len());
    for group in scan.grouping.groups() {
        println!("    {:<20} {:>7} docs", group.doc_type, group.len());
    }
    println!("  documents: {}", scan.grouping.document_count());
    println!("  skipped (unreadable): {}", scan.grouping.unreadable.len());
    println!("  skipped (missing id): {}", scan.grouping.missing_id.len());
    if scan.grouping.defaulted > 0 {
        println!("  default type used: {}", scan.grouping.defaulted);
    }
    if scan.grouping.overwritten > 0 {
        println!("  duplicate keys overwritten: {}", scan.grouping.overwritten);
    }
}

fn schema_label(report: &CollectionReport) -> &'static str {
    match report.schema {
        SchemaState::Present => "present",
        SchemaState::Created => "created",
        SchemaState::CreateFailed(_) => "failed",
    }
}
