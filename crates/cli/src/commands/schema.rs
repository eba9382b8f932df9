use fetchgraph_orm::fixtures::university;

pub fn run() -> anyhow::Result<()> {
    let schema = university::schema()?;

    for entity in schema.entities() {
        println!("{} (table {}, key {})", entity.name, entity.table, entity.primary_key);
        for relationship in &entity.relationships {
            println!(
                "  {:<10} {:?} -> {} [{:?}]",
                relationship.name, relationship.relationship_type, relationship.related_model, relationship.fetch
            );
        }
    }
    Ok(())
}
