//! Database Backend Abstractions
//!
//! Backends execute structured statements. [`MemoryStore`] evaluates them
//! in-process; [`PostgresExecutor`] renders them to SQL and runs them on a
//! sqlx pool.

pub mod core;
pub mod memory;
pub mod postgres;

pub use self::core::{Row, SqlDialect, StatementExecutor};
pub use memory::MemoryStore;
pub use postgres::{PostgresExecutor, PostgresPoolConfig};
