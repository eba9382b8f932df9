pub mod fetch;
pub mod plan;
pub mod scenario;
pub mod schema;

use std::sync::Arc;

use fetchgraph_orm::fixtures::university;
use fetchgraph_orm::{CountingExecutor, FetchMode, GraphLoader, LoaderConfig, RoundTripCounter, Schema};

/// Loader over a freshly seeded in-memory university dataset, counting
/// every statement it dispatches
pub fn memory_loader(schema: Schema, config: LoaderConfig) -> anyhow::Result<(GraphLoader, Arc<RoundTripCounter>)> {
    let counter = Arc::new(RoundTripCounter::new().with_n_plus_one_threshold(config.n_plus_one_threshold));
    let executor = CountingExecutor::new(university::store()?, counter.clone());
    let loader = GraphLoader::with_config(Arc::new(schema), Arc::new(executor), config);
    Ok((loader, counter))
}

pub fn fetch_mode(load: bool) -> FetchMode {
    if load {
        FetchMode::Load
    } else {
        FetchMode::Fetch
    }
}
