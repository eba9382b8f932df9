use std::sync::Arc;

use fetchgraph_orm::fixtures::university;
use fetchgraph_orm::{
    CountingExecutor, Entity, GraphLoader, LoadOutcome, LoaderConfig, PostgresExecutor, PostgresPoolConfig,
    RoundTripCounter,
};

use super::{fetch_mode, memory_loader};

pub async fn run(
    root: &str,
    paths: &[String],
    load: bool,
    database_url: Option<&str>,
    config: LoaderConfig,
) -> anyhow::Result<()> {
    let schema = university::schema()?;

    let (loader, counter) = match database_url {
        Some(url) => {
            let counter = Arc::new(RoundTripCounter::new().with_n_plus_one_threshold(config.n_plus_one_threshold));
            let executor = PostgresExecutor::connect(url, PostgresPoolConfig::default()).await?;
            let executor = CountingExecutor::new(executor, counter.clone());
            (GraphLoader::with_config(Arc::new(schema), Arc::new(executor), config), counter)
        }
        None => memory_loader(schema, config)?,
    };

    let plan = loader.plan(root, paths, fetch_mode(load))?;
    let LoadOutcome { entities, stats } = loader.execute_with_stats(&plan, None).await?;

    let json: Vec<_> = entities.iter().map(Entity::to_json).collect();
    println!("{}", serde_json::to_string_pretty(&json)?);

    eprintln!(
        "{} root(s) from {} raw row(s) in {} round trip(s), {:?}",
        stats.roots,
        stats.raw_rows,
        counter.count(),
        stats.elapsed
    );
    for statement in &stats.statements {
        eprintln!("  {} -> {} row(s)", statement.shape, statement.rows);
    }
    Ok(())
}
