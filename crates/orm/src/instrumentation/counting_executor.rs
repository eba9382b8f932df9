//! Executor decorator that reports every dispatched statement to a counter

use std::sync::Arc;

use async_trait::async_trait;

use super::counter::RoundTripCounter;
use crate::backends::{Row, SqlDialect, StatementExecutor};
use crate::error::OrmResult;
use crate::statement::SelectStatement;

/// Wraps any [`StatementExecutor`] and records one round trip per call.
///
/// A statement is recorded when it is dispatched, so a statement that fails
/// in the store still counts.
pub struct CountingExecutor<E> {
    inner: E,
    counter: Arc<RoundTripCounter>,
}

impl<E: StatementExecutor> CountingExecutor<E> {
    pub fn new(inner: E, counter: Arc<RoundTripCounter>) -> Self {
        Self { inner, counter }
    }

    pub fn counter(&self) -> &Arc<RoundTripCounter> {
        &self.counter
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: StatementExecutor> StatementExecutor for CountingExecutor<E> {
    async fn fetch_all(&self, statement: &SelectStatement) -> OrmResult<Vec<Row>> {
        self.counter.record_statement(statement.shape());
        self.inner.fetch_all(statement).await
    }

    fn dialect(&self) -> SqlDialect {
        self.inner.dialect()
    }
}
