//! Cluster access.
//!
//! The loader only needs a handful of capabilities from the cluster: read the
//! scope/collection topology of a bucket, create scopes and collections,
//! upsert a batch of keyed documents, and run a SQL++ statement. They are
//! expressed by the [`ClusterSession`] trait so the pipeline can be driven
//! against a fake in tests. [`ClusterConnector`] opens sessions; each
//! concurrent import opens its own.
//!
//! [`RestConnector`] / [`RestSession`] implement both traits over the
//! Couchbase Server REST interfaces:
//!
//! | Capability | Endpoint |
//! |------------|----------|
//! | ready check | `GET {admin}/pools/default` |
//! | topology | `GET {data}/pools/default/buckets/{bucket}/scopes` |
//! | create scope | `POST {admin}/pools/default/buckets/{bucket}/scopes` |
//! | create collection | `POST {admin}/pools/default/buckets/{bucket}/scopes/{scope}/collections` |
//! | statements & bulk upsert | `POST {query}/query/service` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ClusterConfig;
use crate::models::SchemaTarget;

/// Scope/collection layout of one bucket, as returned by
/// `GET /pools/default/buckets/{bucket}/scopes`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BucketTopology {
    #[serde(default)]
    pub scopes: Vec<ScopeInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScopeInfo {
    pub name: String,
    #[serde(default)]
    pub collections: Vec<CollectionInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
}

impl BucketTopology {
    /// Collection names under `scope`; empty when the scope is absent.
    pub fn collections_in(&self, scope: &str) -> Vec<&str> {
        self.scopes
            .iter()
            .find(|s| s.name == scope)
            .map(|s| s.collections.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn has_collection(&self, scope: &str, collection: &str) -> bool {
        self.collections_in(scope).contains(&collection)
    }
}

/// An open session against a cluster.
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// Fetch the scope/collection topology of `bucket`.
    async fn scope_topology(&self, bucket: &str) -> Result<BucketTopology>;

    async fn create_scope(&self, bucket: &str, scope: &str) -> Result<()>;

    async fn create_collection(&self, target: &SchemaTarget) -> Result<()>;

    /// Insert-or-replace every `key → document` pair in one request.
    ///
    /// Returns the number of mutations the cluster reported.
    async fn upsert_multi(
        &self,
        target: &SchemaTarget,
        docs: &Map<String, Value>,
    ) -> Result<usize>;

    /// Run a SQL++ statement and return its `results` array.
    async fn query(&self, statement: &str) -> Result<Vec<Value>>;
}

/// Opens authenticated cluster sessions.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    /// Open a session and wait for the cluster to be ready.
    ///
    /// Failure here is fatal for the run.
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>>;
}

// ═══════════════════════════════════════════════════════════════════════
// REST implementation
// ═══════════════════════════════════════════════════════════════════════

/// Connector that opens [`RestSession`]s from a [`ClusterConfig`].
pub struct RestConnector {
    config: ClusterConfig,
    password: String,
}

impl RestConnector {
    /// Resolves the password up front so a missing credential fails early.
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            password: config.resolve_password()?,
        })
    }
}

#[async_trait]
impl ClusterConnector for RestConnector {
    async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
        let session = RestSession::new(&self.config, &self.password)?;
        session.wait_until_ready().await?;
        Ok(Arc::new(session))
    }
}

pub struct RestSession {
    client: reqwest::Client,
    username: String,
    password: String,
    admin_url: String,
    data_url: String,
    query_url: String,
    kv_timeout: Duration,
    ready_timeout: Duration,
}

impl RestSession {
    pub fn new(config: &ClusterConfig, password: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            username: config.username.clone(),
            password: password.to_string(),
            admin_url: config.admin_url(),
            data_url: config.data_url(),
            query_url: config.query_url(),
            kv_timeout: config.kv_timeout(),
            ready_timeout: config.ready_timeout(),
        })
    }

    /// Check the cluster answers authenticated requests within the ready timeout.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let url = format!("{}/pools/default", self.admin_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(self.ready_timeout)
            .send()
            .await
            .with_context(|| format!("Cluster not reachable at {}", self.admin_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Cluster not ready ({}): {}", status, body);
        }
        debug!(url = %self.admin_url, "cluster ready");
        Ok(())
    }

    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<()> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} {}: {}", url, status, body);
        }
        Ok(())
    }

    async fn run_statement(&self, statement: &str, timeout: Option<Duration>) -> Result<Value> {
        let url = format!("{}/query/service", self.query_url);
        let mut request = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password));

        let mut params = vec![("statement", statement.to_string())];
        if let Some(timeout) = timeout {
            params.push(("timeout", format!("{}s", timeout.as_secs())));
            request = request.timeout(timeout + Duration::from_secs(5));
        }

        let response = request.form(&params).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        let succeeded = json.get("status").and_then(Value::as_str) == Some("success");
        if !status.is_success() || !succeeded {
            bail!("query failed ({}): {}", status, query_error_text(&json, &text));
        }
        Ok(json)
    }
}

/// Join the `errors[].msg` fields of a query response, or fall back to the raw body.
fn query_error_text(json: &Value, raw: &str) -> String {
    let messages: Vec<&str> = json
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        raw.to_string()
    } else {
        messages.join("; ")
    }
}

/// Build one `UPSERT INTO ... VALUES (...), (...)` statement for a whole group.
pub fn upsert_statement(target: &SchemaTarget, docs: &Map<String, Value>) -> Result<String> {
    let mut values = Vec::with_capacity(docs.len());
    for (key, doc) in docs {
        values.push(format!(
            "({}, {})",
            serde_json::to_string(key)?,
            serde_json::to_string(doc)?
        ));
    }
    Ok(format!(
        "UPSERT INTO {} (KEY, VALUE) VALUES {}",
        target.keyspace(),
        values.join(", ")
    ))
}

#[async_trait]
impl ClusterSession for RestSession {
    async fn scope_topology(&self, bucket: &str) -> Result<BucketTopology> {
        let url = format!("{}/pools/default/buckets/{}/scopes", self.data_url, bucket);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Topology request failed {}: {}", status, body);
        }

        let topology: BucketTopology = response
            .json()
            .await
            .with_context(|| format!("Invalid topology response from {}", url))?;
        Ok(topology)
    }

    async fn create_scope(&self, bucket: &str, scope: &str) -> Result<()> {
        let url = format!("{}/pools/default/buckets/{}/scopes", self.admin_url, bucket);
        self.post_form(&url, &[("name", scope)]).await
    }

    async fn create_collection(&self, target: &SchemaTarget) -> Result<()> {
        let url = format!(
            "{}/pools/default/buckets/{}/scopes/{}/collections",
            self.admin_url, target.bucket, target.scope
        );
        self.post_form(&url, &[("name", target.collection.as_str())])
            .await
    }

    async fn upsert_multi(
        &self,
        target: &SchemaTarget,
        docs: &Map<String, Value>,
    ) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let statement = upsert_statement(target, docs)?;
        let json = self.run_statement(&statement, Some(self.kv_timeout)).await?;

        let mutations = json
            .pointer("/metrics/mutationCount")
            .and_then(Value::as_u64)
            .unwrap_or(docs.len() as u64);
        Ok(mutations as usize)
    }

    async fn query(&self, statement: &str) -> Result<Vec<Value>> {
        let json = self.run_statement(statement, None).await?;
        Ok(json
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}
