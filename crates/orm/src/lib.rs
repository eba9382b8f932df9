//! # fetchgraph-orm: entity-graph loading without N+1
//!
//! Declares entity types and the relationships between them, plans which
//! relationship paths to fetch for a query, merges compatible paths into as
//! few statements as possible and assembles the rows back into an entity
//! graph. Relationships left out of a plan stay deferred and can be resolved
//! later at the cost of one round trip each.
//!
//! Statement execution sits behind [`StatementExecutor`]: a PostgreSQL
//! executor built on sqlx and an in-memory store used by tests and the demo.
//! [`CountingExecutor`] wraps either and counts every statement dispatched.

pub mod backends;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod instrumentation;
pub mod loading;
pub mod path;
pub mod relationships;
pub mod schema;
pub mod statement;
pub mod value;

pub use backends::{MemoryStore, PostgresExecutor, PostgresPoolConfig, Row, SqlDialect, StatementExecutor};
pub use config::LoaderConfig;
pub use error::{OrmError, OrmResult};
pub use instrumentation::{Checkpoint, CountingExecutor, RoundTripCounter, RoundTripRecord};
pub use loading::{FetchMode, FetchPlan, FetchPlanner, GraphLoader, LoadOutcome, LoadStats, NodeOrigin};
pub use path::RelationshipPath;
pub use relationships::{Entity, LazyHandle, Related, Relation};
pub use schema::{Cardinality, EntityType, FetchType, PivotConfig, RelationshipMetadata, RelationshipType, Schema};
pub use statement::{Filter, SelectStatement, StatementPurpose, StatementShape};
pub use value::{DatabaseValue, KeyValue};
