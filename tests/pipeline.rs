//! End-to-end tests of the import pipeline against an in-memory cluster.
//!
//! The fake cluster records every call so the tests can check what the
//! loader asked for, in which order, and how often.

use anyhow::{bail, Result};
use async_trait::async_trait;
use couch_seed::cluster::{
    BucketTopology, ClusterConnector, ClusterSession, CollectionInfo, ScopeInfo,
};
use couch_seed::config::Config;
use couch_seed::ingest::{run_import_with, ImportMode};
use couch_seed::models::{SchemaState, SchemaTarget, StepOutcome};
use couch_seed::progress::NoProgress;
use couch_seed::schema::ensure_schema;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Fake cluster ───────────────────────────────────────────────────

#[derive(Default)]
struct ClusterState {
    topology: BucketTopology,
    /// collection → key → document
    data: BTreeMap<String, Map<String, Value>>,
    connects: usize,
    scope_creates: usize,
    collection_creates: usize,
    statements: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
    fail_upsert: bool,
    refuse_connect: bool,
}

impl FakeCluster {
    fn with_collections(scope: &str, collections: &[&str]) -> Self {
        let cluster = Self::default();
        cluster.state.lock().unwrap().topology.scopes.push(ScopeInfo {
            name: scope.to_string(),
            collections: collections
                .iter()
                .map(|c| CollectionInfo {
                    name: c.to_string(),
                })
                .collect(),
        });
        cluster
    }

    fn data(&self) -> BTreeMap<String, Map<String, Value>> {
        self.state.lock().unwrap().data.clone()
    }
}

#[async_trait]
impl ClusterConnector for FakeCluster {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
        if self.refuse_connect {
            bail!("authentication failure");
        }
        self.state.lock().unwrap().connects += 1;
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl ClusterSession for FakeCluster {
    async fn scope_topology(&self, _bucket: &str) -> Result<BucketTopology> {
        Ok(self.state.lock().unwrap().topology.clone())
    }

    async fn create_scope(&self, _bucket: &str, scope: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.scope_creates += 1;
        if state.topology.scopes.iter().any(|s| s.name == scope) {
            bail!("Scope with name \"{}\" already exists", scope);
        }
        state.topology.scopes.push(ScopeInfo {
            name: scope.to_string(),
            collections: Vec::new(),
        });
        Ok(())
    }

    async fn create_collection(&self, target: &SchemaTarget) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.collection_creates += 1;
        let Some(scope) = state
            .topology
            .scopes
            .iter_mut()
            .find(|s| s.name == target.scope)
        else {
            bail!("Scope not found");
        };
        if scope.collections.iter().any(|c| c.name == target.collection) {
            bail!("Collection already exists");
        }
        scope.collections.push(CollectionInfo {
            name: target.collection.clone(),
        });
        Ok(())
    }

    async fn upsert_multi(
        &self,
        target: &SchemaTarget,
        docs: &Map<String, Value>,
    ) -> Result<usize> {
        if self.fail_upsert {
            bail!("timeout after 30s");
        }
        let mut state = self.state.lock().unwrap();
        let collection = state.data.entry(target.collection.clone()).or_default();
        for (key, doc) in docs {
            collection.insert(key.clone(), doc.clone());
        }
        Ok(docs.len())
    }

    async fn query(&self, statement: &str) -> Result<Vec<Value>> {
        self.state
            .lock()
            .unwrap()
            .statements
            .push(statement.to_string());
        Ok(Vec::new())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn write_docs(dir: &Path, docs: &[(&str, &str)]) {
    for (name, body) in docs {
        fs::write(dir.join(name), body).unwrap();
    }
}

fn sample_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_docs(
        tmp.path(),
        &[
            ("a.json", r#"{"id": 1, "type": "airline"}"#),
            ("b.json", r#"{"id": 2, "type": "airline"}"#),
            ("c.json", r#"{"id": 3}"#),
        ],
    );
    tmp
}

fn config_for(dir: &Path) -> Arc<Config> {
    let mut config: Config = toml::from_str(
        r#"
[cluster]
host = "localhost"
username = "Administrator"
password = "password"
bucket = "travel-sample"
scope = "inventory"
settle_delay_secs = 0

[import]
data_dir = "."
"#,
    )
    .unwrap();
    config.import.data_dir = dir.to_path_buf();
    Arc::new(config)
}

async fn run(cluster: &FakeCluster, dir: &Path, mode: ImportMode) -> Result<Vec<String>> {
    let summary = run_import_with(
        config_for(dir),
        Arc::new(cluster.clone()),
        mode,
        Arc::new(NoProgress),
    )
    .await?;
    Ok(summary.types)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn sample_scenario_loads_two_collections() {
    let tmp = sample_dir();
    let cluster = FakeCluster::default();

    let types = run(&cluster, tmp.path(), ImportMode::Sequential).await.unwrap();
    assert_eq!(types, vec!["airline", "_default"]);

    let data = cluster.data();
    let airline: Vec<&String> = data["airline"].keys().collect();
    assert_eq!(airline, vec!["airline_1", "airline_2"]);
    let default: Vec<&String> = data["_default"].keys().collect();
    assert_eq!(default, vec!["_default_3"]);

    let state = cluster.state.lock().unwrap();
    assert_eq!(state.connects, 2);
    assert_eq!(state.collection_creates, 2);
    assert_eq!(
        state.statements,
        vec![
            "CREATE PRIMARY INDEX IF NOT EXISTS ON `travel-sample`.`inventory`.`airline`",
            "CREATE PRIMARY INDEX IF NOT EXISTS ON `travel-sample`.`inventory`.`_default`",
        ]
    );
}

#[tokio::test]
async fn sequential_and_parallel_load_the_same_groups() {
    let tmp = TempDir::new().unwrap();
    for i in 0..30 {
        let doc_type = ["airline", "airport", "route", "hotel"][i % 4];
        fs::write(
            tmp.path().join(format!("doc_{:02}.json", i)),
            format!(r#"{{"id": {}, "type": "{}", "n": {}}}"#, i % 7, doc_type, i),
        )
        .unwrap();
    }

    let sequential = FakeCluster::default();
    let parallel = FakeCluster::default();
    let seq_types = run(&sequential, tmp.path(), ImportMode::Sequential)
        .await
        .unwrap();
    let par_types = run(&parallel, tmp.path(), ImportMode::Parallel)
        .await
        .unwrap();

    assert_eq!(seq_types, par_types);
    assert_eq!(sequential.data(), parallel.data());
    assert_eq!(parallel.state.lock().unwrap().connects, 4);
}

#[tokio::test]
async fn parallel_reports_follow_discovery_order() {
    let tmp = sample_dir();
    let cluster = FakeCluster::default();
    let summary = run_import_with(
        config_for(tmp.path()),
        Arc::new(cluster.clone()),
        ImportMode::Parallel,
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    let names: Vec<&str> = summary
        .reports
        .iter()
        .map(|r| r.collection.as_str())
        .collect();
    assert_eq!(names, vec!["airline", "_default"]);
    assert!(summary.failed_collections().is_empty());
}

#[tokio::test]
async fn existing_collection_is_not_recreated() {
    let tmp = sample_dir();
    let cluster = FakeCluster::with_collections("inventory", &["airline", "_default"]);

    let summary = run_import_with(
        config_for(tmp.path()),
        Arc::new(cluster.clone()),
        ImportMode::Sequential,
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    assert!(summary
        .reports
        .iter()
        .all(|r| r.schema == SchemaState::Present));
    let state = cluster.state.lock().unwrap();
    assert_eq!(state.scope_creates, 0);
    assert_eq!(state.collection_creates, 0);
}

#[tokio::test]
async fn ensure_schema_twice_creates_once() {
    let cluster = FakeCluster::default();
    let target = SchemaTarget::new("travel-sample", "inventory", "hotel");

    assert_eq!(ensure_schema(&cluster, &target).await, SchemaState::Created);
    assert_eq!(ensure_schema(&cluster, &target).await, SchemaState::Present);

    let state = cluster.state.lock().unwrap();
    assert_eq!(state.collection_creates, 1);
    assert_eq!(state.topology.collections_in("inventory"), vec!["hotel"]);
}

#[tokio::test]
async fn upsert_failure_does_not_abort_the_run() {
    let tmp = sample_dir();
    let cluster = FakeCluster {
        fail_upsert: true,
        ..Default::default()
    };

    let summary = run_import_with(
        config_for(tmp.path()),
        Arc::new(cluster.clone()),
        ImportMode::Parallel,
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    assert_eq!(summary.reports.len(), 2);
    for report in &summary.reports {
        assert!(report.upsert.is_failed());
        assert_eq!(report.index, StepOutcome::Done);
    }
    assert_eq!(summary.failed_collections(), vec!["airline", "_default"]);
    assert_eq!(cluster.state.lock().unwrap().statements.len(), 2);
    assert!(cluster.data().is_empty());
}

#[tokio::test]
async fn connection_failure_is_fatal() {
    let tmp = sample_dir();
    let cluster = FakeCluster {
        refuse_connect: true,
        ..Default::default()
    };

    for mode in [ImportMode::Sequential, ImportMode::Parallel] {
        let err = run(&cluster, tmp.path(), mode).await.unwrap_err();
        assert!(err.to_string().contains("authentication failure"));
    }
}

#[tokio::test]
async fn missing_data_dir_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let cluster = FakeCluster::default();
    let err = run(&cluster, &tmp.path().join("absent"), ImportMode::Sequential)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(cluster.state.lock().unwrap().connects, 0);
}

#[tokio::test]
async fn empty_directory_imports_nothing() {
    let tmp = TempDir::new().unwrap();
    let cluster = FakeCluster::default();
    let types = run(&cluster, tmp.path(), ImportMode::Parallel).await.unwrap();
    assert!(types.is_empty());
    assert_eq!(cluster.state.lock().unwrap().connects, 0);
}
