//! Schema registry - the static entity-type graph the planner works against
//!
//! Built once at startup through [`SchemaBuilder`], validated as a whole and
//! then shared read-only (usually behind an `Arc`).

use std::collections::HashMap;

use super::entity::EntityType;
use super::metadata::{OwningSide, RelationshipMetadata};
use crate::error::{OrmError, OrmResult};

/// Validated set of entity types
#[derive(Debug, Clone)]
pub struct Schema {
    entities: HashMap<String, EntityType>,
    /// Registration order, for stable iteration
    order: Vec<String>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Get an entity type by name
    pub fn entity(&self, name: &str) -> OrmResult<&EntityType> {
        self.entities
            .get(name)
            .ok_or_else(|| OrmError::UnknownEntity(name.to_string()))
    }

    /// Get relationship metadata by entity and relationship name
    pub fn relationship(&self, entity: &str, relationship: &str) -> OrmResult<&RelationshipMetadata> {
        self.entity(entity)?
            .get_relationship(relationship)
            .ok_or_else(|| OrmError::UnknownRelationship {
                entity: entity.to_string(),
                relationship: relationship.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// All entity types in registration order
    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    /// Find the relationship on the related type that points back
    pub fn find_inverse(&self, entity: &str, relationship: &str) -> Option<&RelationshipMetadata> {
        let metadata = self.relationship(entity, relationship).ok()?;
        let related = self.entities.get(&metadata.related_model)?;

        if let Some(inverse) = &metadata.inverse {
            return related.get_relationship(inverse);
        }

        related.relationships.iter().find(|candidate| {
            candidate.related_model == entity
                && candidate.inverse.as_deref() == Some(relationship)
        })
    }
}

/// Collects entity types and validates them into a [`Schema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityType>,
}

impl SchemaBuilder {
    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn build(self) -> OrmResult<Schema> {
        let mut entities = HashMap::new();
        let mut order = Vec::new();

        for entity in self.entities {
            if !entity.has_column(&entity.primary_key) {
                return Err(OrmError::Configuration(format!(
                    "Entity '{}' does not list its primary key '{}' as a column",
                    entity.name, entity.primary_key
                )));
            }
            if entities.contains_key(&entity.name) {
                return Err(OrmError::Configuration(format!(
                    "Entity '{}' registered twice",
                    entity.name
                )));
            }
            order.push(entity.name.clone());
            entities.insert(entity.name.clone(), entity);
        }

        let schema = Schema { entities, order };
        for entity in schema.entities() {
            validate_relationships(&schema, entity)?;
        }

        tracing::debug!("Schema built with {} entity types", schema.order.len());
        Ok(schema)
    }
}

fn validate_relationships(schema: &Schema, entity: &EntityType) -> OrmResult<()> {
    let mut seen = Vec::new();

    for relationship in &entity.relationships {
        relationship.validate()?;

        if seen.contains(&relationship.name.as_str()) {
            return Err(OrmError::Configuration(format!(
                "Relationship '{}' declared twice on '{}'",
                relationship.name, entity.name
            )));
        }
        seen.push(relationship.name.as_str());

        let related = schema.entities.get(&relationship.related_model).ok_or_else(|| {
            OrmError::Configuration(format!(
                "Relationship '{}.{}' targets unknown entity '{}'",
                entity.name, relationship.name, relationship.related_model
            ))
        })?;

        let (fk_owner, key_owner) = match relationship.relationship_type.owning_side() {
            OwningSide::Local => (Some(entity), related),
            OwningSide::Related => (Some(related), entity),
            OwningSide::Pivot => (None, entity),
        };

        if let Some(fk_owner) = fk_owner {
            require_column(fk_owner, &relationship.foreign_key, entity, relationship)?;
        }
        require_column(key_owner, &relationship.referenced_key, entity, relationship)?;

        if let Some(inverse) = &relationship.inverse {
            if related.get_relationship(inverse).is_none() {
                return Err(OrmError::Configuration(format!(
                    "Relationship '{}.{}' names inverse '{}' which '{}' does not declare",
                    entity.name, relationship.name, inverse, related.name
                )));
            }
        }
    }

    Ok(())
}

fn require_column(
    owner: &EntityType,
    column: &str,
    entity: &EntityType,
    relationship: &RelationshipMetadata,
) -> OrmResult<()> {
    if owner.has_column(column) {
        Ok(())
    } else {
        Err(OrmError::Configuration(format!(
            "Relationship '{}.{}' uses column '{}' missing from '{}'",
            entity.name, relationship.name, column, owner.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::metadata::PivotConfig;

    fn department() -> EntityType {
        EntityType::new("Department", "departments")
            .column("name")
            .relationship(
                RelationshipMetadata::has_many("courses", "Course", "department_id")
                    .with_inverse("department"),
            )
    }

    fn course() -> EntityType {
        EntityType::new("Course", "courses")
            .columns(["title", "department_id"])
            .relationship(RelationshipMetadata::belongs_to("department", "Department", "department_id"))
    }

    #[test]
    fn test_build_and_lookup() {
        let schema = Schema::builder().entity(department()).entity(course()).build().unwrap();

        assert_eq!(schema.entity("Course").unwrap().table, "courses");
        assert!(schema.relationship("Department", "courses").is_ok());
        assert!(matches!(
            schema.relationship("Department", "instructors"),
            Err(OrmError::UnknownRelationship { .. })
        ));
        assert!(matches!(schema.entity("Teacher"), Err(OrmError::UnknownEntity(_))));

        let names: Vec<_> = schema.entities().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Department", "Course"]);
    }

    #[test]
    fn test_inverse_lookup_both_directions() {
        let schema = Schema::builder().entity(department()).entity(course()).build().unwrap();

        let inverse = schema.find_inverse("Department", "courses").unwrap();
        assert_eq!(inverse.name, "department");

        let back = schema.find_inverse("Course", "department").unwrap();
        assert_eq!(back.name, "courses");
    }

    #[test]
    fn test_missing_target_entity_rejected() {
        let result = Schema::builder().entity(department()).build();
        assert!(matches!(result, Err(OrmError::Configuration(_))));
    }

    #[test]
    fn test_missing_foreign_key_column_rejected() {
        let course = EntityType::new("Course", "courses")
            .column("title")
            .relationship(RelationshipMetadata::belongs_to("department", "Department", "department_id"));

        let result = Schema::builder().entity(department()).entity(course).build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("department_id"));
    }

    #[test]
    fn test_many_to_many_needs_no_foreign_key_column() {
        let student = EntityType::new("Student", "students").column("email");
        let course = EntityType::new("Course", "courses").column("title").relationship(
            RelationshipMetadata::many_to_many(
                "students",
                "Student",
                PivotConfig::new("course_students", "course_id", "student_id"),
            ),
        );

        assert!(Schema::builder().entity(course).entity(student).build().is_ok());
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let result = Schema::builder()
            .entity(EntityType::new("A", "a"))
            .entity(EntityType::new("A", "a2"))
            .build();
        assert!(result.is_err());
    }
}
