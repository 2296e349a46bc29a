//! Schema provisioning.
//!
//! Makes sure the scope and collection a type group is loaded into exist
//! before the bulk write. Provisioning is best effort: creation failures are
//! logged and reported, never raised, and a write against a collection that
//! still does not exist is what ultimately fails that type's import.
//!
//! ```text
//! Unknown ──check──▶ Present
//!    │
//!    └──────check──▶ Absent ──create──▶ Created (assumed present, not re-checked)
//! ```

use tracing::{debug, info, warn};

use crate::cluster::ClusterSession;
use crate::models::{SchemaState, SchemaTarget};

/// Check the bucket topology for `target` and create what is missing.
///
/// When this returns [`SchemaState::Created`], the caller must wait the
/// configured settle delay before writing so the new collection has
/// propagated across the cluster.
pub async fn ensure_schema(session: &dyn ClusterSession, target: &SchemaTarget) -> SchemaState {
    if collection_exists(session, target).await {
        debug!(keyspace = %target, "collection already present");
        return SchemaState::Present;
    }

    // Scope creation fails when the scope already exists; that is expected.
    if let Err(e) = session.create_scope(&target.bucket, &target.scope).await {
        debug!(keyspace = %target, error = %e, "scope not created");
    }

    match session.create_collection(target).await {
        Ok(()) => {
            info!(keyspace = %target, "created collection");
            SchemaState::Created
        }
        Err(e) => {
            warn!(keyspace = %target, error = %e, "error while creating collection");
            SchemaState::CreateFailed(e.to_string())
        }
    }
}

/// Whether the topology lists the target collection.
///
/// A failed topology request counts as "absent" so creation is attempted.
pub async fn collection_exists(session: &dyn ClusterSession, target: &SchemaTarget) -> bool {
    match session.scope_topology(&target.bucket).await {
        Ok(topology) => topology.has_collection(&target.scope, &target.collection),
        Err(e) => {
            warn!(keyspace = %target, error = %e, "could not read bucket topology");
            false
        }
    }
}
