//! # Couch Seed
//!
//! Loads a directory of JSON documents into a Couchbase bucket, one
//! collection per document `type`, creating the scope, collections, and
//! primary indexes they need along the way. Meant for seeding development
//! and test clusters with sample data.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌──────────────────────────────┐
//! │ Discovery │──▶│ Grouping │──▶│ Loader (one per type)        │
//! │ glob+seed │   │ by type  │   │ schema → bulk upsert → index │
//! └───────────┘   └──────────┘   └──────────────┬───────────────┘
//!                                               ▼
//!                                    ┌─────────────────────┐
//!                                    │ Cluster (REST/SQL++)│
//!                                    └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! seed scan                     # list files and types, no cluster access
//! seed import                   # load everything, one task per collection
//! seed import --sequential      # load collections one after another
//! seed status                   # show scopes and collections of the bucket
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`discovery`] | Input file discovery and sampling |
//! | [`grouping`] | Parsing and grouping documents by type |
//! | [`cluster`] | Cluster session traits and REST implementation |
//! | [`schema`] | Scope/collection provisioning |
//! | [`loader`] | Per-collection bulk load |
//! | [`ingest`] | Import orchestration |
//! | [`progress`] | Progress reporting |
//! | [`status`] | Bucket topology listing |

pub mod cluster;
pub mod config;
pub mod discovery;
pub mod grouping;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod progress;
pub mod schema;
pub mod status;
