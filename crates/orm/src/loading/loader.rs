//! Graph loader - executes fetch plans and resolves deferred relationships

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backends::StatementExecutor;
use crate::config::LoaderConfig;
use crate::error::{OrmError, OrmResult};
use crate::relationships::{Entity, Related, Relation};
use crate::schema::{Cardinality, Schema};
use crate::statement::{Filter, SelectStatement, StatementPurpose, StatementShape};
use crate::value::{DatabaseValue, KeyValue};

use super::builder::StatementBuilder;
use super::plan::{FetchMode, FetchPlan};
use super::planner::FetchPlanner;
use super::state::LoadState;

/// Statistics about one executed statement
#[derive(Debug, Clone, PartialEq)]
pub struct StatementStats {
    pub shape: StatementShape,
    /// Raw rows returned, before deduplication
    pub rows: usize,
}

/// Statistics about one plan execution
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub statements: Vec<StatementStats>,
    /// Raw rows over all statements
    pub raw_rows: usize,
    /// Distinct root entities returned
    pub roots: usize,
    pub elapsed: Duration,
}

impl LoadStats {
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Largest row count returned by any single statement
    pub fn max_rows(&self) -> usize {
        self.statements.iter().map(|s| s.rows).max().unwrap_or(0)
    }
}

/// Result of [`GraphLoader::execute_with_stats`]
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub entities: Vec<Entity>,
    pub stats: LoadStats,
}

/// Loads entity graphs through a statement executor
#[derive(Clone)]
pub struct GraphLoader {
    schema: Arc<Schema>,
    executor: Arc<dyn StatementExecutor>,
    config: LoaderConfig,
}

impl GraphLoader {
    pub fn new(schema: Arc<Schema>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self::with_config(schema, executor, LoaderConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, executor: Arc<dyn StatementExecutor>, config: LoaderConfig) -> Self {
        Self {
            schema,
            executor,
            config,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn planner(&self) -> FetchPlanner<'_> {
        FetchPlanner::new(&self.schema, &self.config)
    }

    /// Build a fetch plan; see [`FetchPlanner::plan`]
    pub fn plan<P: AsRef<str>>(&self, root: &str, paths: &[P], mode: FetchMode) -> OrmResult<FetchPlan> {
        self.planner().plan(root, paths, mode)
    }

    /// Render the plan's statements in the configured dialect
    pub fn explain(&self, plan: &FetchPlan, filter: Option<&Filter>) -> OrmResult<Vec<String>> {
        plan.explain(&self.schema, filter, self.config.dialect)
    }

    /// Execute a plan and return the root entities
    pub async fn execute(&self, plan: &FetchPlan, filter: Option<&Filter>) -> OrmResult<Vec<Entity>> {
        Ok(self.execute_with_stats(plan, filter).await?.entities)
    }

    /// Load every root of `root` (optionally filtered), honouring each
    /// relationship's default fetch policy
    pub async fn find_all(&self, root: &str, filter: Option<&Filter>) -> OrmResult<Vec<Entity>> {
        let plan = self.plan::<&str>(root, &[], FetchMode::Load)?;
        self.execute(&plan, filter).await
    }

    /// Execute a plan and report per-statement statistics.
    ///
    /// Statements run one after another: the primary group first, then every
    /// secondary group in plan order, each scoped by the join values of the
    /// parent rows already loaded. An invalid configuration is rejected before
    /// anything is dispatched.
    pub async fn execute_with_stats(&self, plan: &FetchPlan, filter: Option<&Filter>) -> OrmResult<LoadOutcome> {
        self.config.validate()?;
        if plan.root_type.is_empty() || !self.schema.contains(&plan.root_type) {
            return Err(OrmError::UnknownEntity(plan.root_type.clone()));
        }
        if let Some(filter) = filter {
            filter.validate(self.schema.entity(&plan.root_type)?)?;
        }

        let started = Instant::now();
        let mut stats = LoadStats::default();
        let mut state = LoadState::new(plan);
        let mut builder = StatementBuilder::new(&self.schema, plan);

        for group in plan.groups() {
            if group.is_primary() {
                let (statement, layout) = builder.primary(filter)?;
                let rows = self.dispatch(&statement, &mut stats).await?;
                state.absorb(&self.schema, plan, group, &layout, &rows)?;
                continue;
            }

            let keys = state.parent_keys(plan, group.anchor);
            if keys.is_empty() {
                tracing::debug!(
                    path = %plan.node(group.anchor).path,
                    "no parent keys, batch statement skipped"
                );
                continue;
            }

            for chunk in keys.chunks(self.config.max_batch_size) {
                let values = chunk.iter().cloned().map(DatabaseValue::from).collect();
                let (statement, layout) = builder.secondary(group, values, StatementPurpose::Batch)?;
                let rows = self.dispatch(&statement, &mut stats).await?;
                state.absorb(&self.schema, plan, group, &layout, &rows)?;
            }
        }

        let entities = state.assemble(&self.schema, plan)?;
        stats.roots = state.root_count();
        stats.elapsed = started.elapsed();

        tracing::debug!(
            root = %plan.root_type,
            statements = stats.statement_count(),
            raw_rows = stats.raw_rows,
            roots = stats.roots,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "fetch plan executed"
        );

        Ok(LoadOutcome { entities, stats })
    }

    /// Load a deferred relationship of `entity` in place and return it.
    ///
    /// Costs one round trip, scoped to this entity. An already loaded
    /// relationship is returned as-is, and a NULL join value resolves to
    /// nothing without touching the store. Entities loaded this way have all
    /// of their own relationships deferred.
    pub async fn resolve<'e>(&self, entity: &'e mut Entity, relationship: &str) -> OrmResult<&'e Related> {
        let handle = match entity.relation(relationship) {
            None => {
                return Err(OrmError::UnknownRelationship {
                    entity: entity.entity_type().to_string(),
                    relationship: relationship.to_string(),
                })
            }
            Some(Relation::Loaded(_)) => None,
            Some(Relation::Deferred(handle)) => Some(handle.clone()),
        };

        if let Some(handle) = handle {
            let related = match &handle.join_value {
                Some(join_value) => self.load_relationship(&handle.owner_type, &handle.relationship, join_value).await?,
                None => {
                    let metadata = self.schema.relationship(&handle.owner_type, &handle.relationship)?;
                    empty(metadata.cardinality())
                }
            };
            entity.set_relation(relationship, Relation::Loaded(related));
        }

        entity.related(relationship)
    }

    async fn load_relationship(&self, owner: &str, relationship: &str, join_value: &KeyValue) -> OrmResult<Related> {
        let plan = self.planner().plan_relationship(owner, relationship)?;
        let group = &plan.groups()[1];

        let mut builder = StatementBuilder::new(&self.schema, &plan);
        let (statement, layout) =
            builder.secondary(group, vec![DatabaseValue::from(join_value.clone())], StatementPurpose::Lazy)?;

        let mut stats = LoadStats::default();
        let rows = self.dispatch(&statement, &mut stats).await?;

        let mut state = LoadState::new(&plan);
        state.absorb(&self.schema, &plan, group, &layout, &rows)?;

        tracing::debug!(owner = %owner, relationship = %relationship, key = %join_value, "lazy relationship loaded");
        state.related(&self.schema, &plan, group.anchor, Some(join_value))
    }

    async fn dispatch(&self, statement: &SelectStatement, stats: &mut LoadStats) -> OrmResult<Vec<crate::backends::Row>> {
        let shape = statement.shape();
        let rows = self.executor.fetch_all(statement).await?;

        stats.raw_rows += rows.len();
        stats.statements.push(StatementStats {
            shape,
            rows: rows.len(),
        });
        Ok(rows)
    }
}

fn empty(cardinality: Cardinality) -> Related {
    match cardinality {
        Cardinality::ToMany => Related::Many(Vec::new()),
        Cardinality::ToOne => Related::One(None),
    }
}
