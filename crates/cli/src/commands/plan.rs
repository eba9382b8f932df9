use std::sync::Arc;

use fetchgraph_orm::fixtures::university;
use fetchgraph_orm::{GraphLoader, LoaderConfig, MemoryStore};

use super::fetch_mode;

pub fn run(root: &str, paths: &[String], load: bool, config: LoaderConfig) -> anyhow::Result<()> {
    let dialect = config.dialect;
    // planning never touches the store
    let loader = GraphLoader::with_config(Arc::new(university::schema()?), Arc::new(MemoryStore::new()), config);
    let plan = loader.plan(root, paths, fetch_mode(load))?;

    print!("{}", plan);
    for node in plan.nodes().iter().filter(|n| !n.is_root()) {
        println!("    {:<28} {:?} ({})", node.path, node.origin, node.entity_type);
    }

    println!();
    println!("SQL ({}):", dialect);
    for (index, sql) in loader.explain(&plan, None)?.iter().enumerate() {
        println!("  [{}] {}", index, sql);
    }
    Ok(())
}
