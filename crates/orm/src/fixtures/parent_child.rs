//! Three parents with 4, 3 and 3 children

use crate::backends::MemoryStore;
use crate::error::OrmResult;
use crate::schema::{EntityType, RelationshipMetadata, Schema};
use crate::value::DatabaseValue;

pub const CHILDREN_PER_PARENT: [usize; 3] = [4, 3, 3];

pub fn schema() -> OrmResult<Schema> {
    Schema::builder()
        .entity(
            EntityType::new("Parent", "parents")
                .column("name")
                .relationship(RelationshipMetadata::has_many("children", "Child", "parent_id").with_inverse("parent")),
        )
        .entity(
            EntityType::new("Child", "children")
                .columns(["name", "parent_id"])
                .relationship(RelationshipMetadata::belongs_to("parent", "Parent", "parent_id")),
        )
        .build()
}

pub fn seed(store: &MemoryStore) -> OrmResult<()> {
    store.create_table("parents", ["id", "name"]);
    store.create_table("children", ["id", "name", "parent_id"]);

    let mut child_id = 1i64;
    for (index, &count) in CHILDREN_PER_PARENT.iter().enumerate() {
        let parent_id = index as i64 + 1;
        store.insert(
            "parents",
            [("id", DatabaseValue::from(parent_id)), ("name", format!("parent-{}", parent_id).into())],
        )?;

        for n in 0..count {
            store.insert(
                "children",
                [
                    ("id", DatabaseValue::from(child_id)),
                    ("name", format!("child-{}-{}", parent_id, n + 1).into()),
                    ("parent_id", parent_id.into()),
                ],
            )?;
            child_id += 1;
        }
    }
    Ok(())
}

pub fn store() -> OrmResult<MemoryStore> {
    let store = MemoryStore::new();
    seed(&store)?;
    Ok(store)
}
