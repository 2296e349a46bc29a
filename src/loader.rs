//! Bulk loader.
//!
//! Loads one [`TypeGroup`] into its collection: provision the schema, upsert
//! every document in a single request, then create a primary index. Each
//! step is attempted exactly once and its failure is recorded in the
//! [`CollectionReport`] rather than returned, so one bad collection never
//! stops the others. Only failing to open a session at all is an error.

use anyhow::Result;
use tracing::{info, warn};

use crate::cluster::{ClusterConnector, ClusterSession};
use crate::config::Config;
use crate::models::{CollectionReport, SchemaState, SchemaTarget, StepOutcome, TypeGroup};
use crate::schema::ensure_schema;

/// Open a dedicated session and load `group` through it.
pub async fn load_type_group(
    connector: &dyn ClusterConnector,
    config: &Config,
    group: &TypeGroup,
) -> Result<CollectionReport> {
    let session = connector.connect().await?;
    Ok(import_collection(session.as_ref(), config, group).await)
}

/// Load `group` using an already open session.
pub async fn import_collection(
    session: &dyn ClusterSession,
    config: &Config,
    group: &TypeGroup,
) -> CollectionReport {
    let cluster = &config.cluster;
    let target = SchemaTarget::new(&cluster.bucket, &cluster.scope, &group.doc_type);
    info!(keyspace = %target, documents = group.len(), "importing into collection");

    let schema = ensure_schema(session, &target).await;
    if schema == SchemaState::Created {
        tokio::time::sleep(cluster.settle_delay()).await;
    }

    let upsert = upsert_group(session, &target, group).await;

    let index = if config.import.create_primary_index {
        create_primary_index(session, &target).await
    } else {
        StepOutcome::Skipped
    };

    CollectionReport {
        collection: group.doc_type.clone(),
        documents: group.len(),
        schema,
        upsert,
        index,
    }
}

async fn upsert_group(
    session: &dyn ClusterSession,
    target: &SchemaTarget,
    group: &TypeGroup,
) -> StepOutcome {
    if group.is_empty() {
        return StepOutcome::Skipped;
    }
    match session.upsert_multi(target, &group.docs).await {
        Ok(mutations) => {
            info!(keyspace = %target, mutations, "upserted documents");
            StepOutcome::Done
        }
        Err(e) => {
            warn!(keyspace = %target, error = %e, "exception while inserting documents");
            StepOutcome::Failed(e.to_string())
        }
    }
}

pub fn primary_index_statement(target: &SchemaTarget) -> String {
    format!("CREATE PRIMARY INDEX IF NOT EXISTS ON {}", target.keyspace())
}

async fn create_primary_index(session: &dyn ClusterSession, target: &SchemaTarget) -> StepOutcome {
    match session.query(&primary_index_statement(target)).await {
        Ok(_) => StepOutcome::Done,
        Err(e) if e.to_string().contains("already exists") => StepOutcome::Done,
        Err(e) => {
            warn!(keyspace = %target, error = %e, "exception while creating primary index");
            StepOutcome::Failed(e.to_string())
        }
    }
}
