//! Core data models used throughout the seeder.
//!
//! These types represent the documents, per-type groups, and per-step
//! outcomes that flow through the discovery → grouping → load pipeline.

use serde_json::{Map, Value};
use std::fmt;

/// One parsed input file. The payload is kept opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub doc_type: String,
    pub body: Value,
}

impl Document {
    /// Key under which the document is upserted: `"{type}_{id}"`.
    pub fn key(&self) -> String {
        document_key(&self.doc_type, &self.id)
    }
}

pub fn document_key(doc_type: &str, id: &str) -> String {
    format!("{}_{}", doc_type, id)
}

/// All documents of one type, keyed by document key.
///
/// Insertion order is preserved; re-inserting an existing key replaces
/// the value in place (last file wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeGroup {
    pub doc_type: String,
    pub docs: Map<String, Value>,
}

impl TypeGroup {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            docs: Map::new(),
        }
    }

    /// Insert a document, returning `true` when it replaced an earlier one.
    pub fn insert(&mut self, doc: Document) -> bool {
        self.docs.insert(doc.key(), doc.body).is_some()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Destination of a type group: `bucket.scope.collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaTarget {
    pub bucket: String,
    pub scope: String,
    pub collection: String,
}

impl SchemaTarget {
    pub fn new(bucket: &str, scope: &str, collection: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            scope: scope.to_string(),
            collection: collection.to_string(),
        }
    }

    /// Backtick-quoted keyspace path for SQL++ statements.
    pub fn keyspace(&self) -> String {
        format!("`{}`.`{}`.`{}`", self.bucket, self.scope, self.collection)
    }
}

impl fmt::Display for SchemaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.bucket, self.scope, self.collection)
    }
}

/// What schema provisioning found (and did) for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaState {
    /// Collection was already listed in the topology.
    Present,
    /// Collection was missing and creation was requested; not re-checked.
    Created,
    /// Collection was missing and creation failed.
    CreateFailed(String),
}

/// Result of one best-effort step of a collection import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Done => f.write_str("ok"),
            StepOutcome::Skipped => f.write_str("skipped"),
            StepOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Outcome of importing one type group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub documents: usize,
    pub schema: SchemaState,
    pub upsert: StepOutcome,
    pub index: StepOutcome,
}

impl CollectionReport {
    pub fn succeeded(&self) -> bool {
        !self.upsert.is_failed() && !self.index.is_failed()
    }
}
