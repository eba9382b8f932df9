//! Entity type definitions

use serde::{Deserialize, Serialize};

use super::metadata::RelationshipMetadata;

/// A named record type stored in one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    /// Every stored column, primary and foreign keys included
    pub columns: Vec<String>,
    /// Relationship attributes in declaration order
    pub relationships: Vec<RelationshipMetadata>,
}

impl EntityType {
    /// Create an entity type whose primary key column is `id`
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            columns: vec!["id".to_string()],
            relationships: Vec::new(),
        }
    }

    /// Replace the primary key column
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.columns.retain(|c| c != &self.primary_key);
        self.columns.insert(0, column.clone());
        self.primary_key = column;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
        self
    }

    pub fn columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns.into_iter().fold(self, |entity, column| entity.column(column))
    }

    pub fn relationship(mut self, metadata: RelationshipMetadata) -> Self {
        self.relationships.push(metadata);
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Look up a relationship attribute by name
    pub fn get_relationship(&self, name: &str) -> Option<&RelationshipMetadata> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Relationships whose default fetch policy is eager
    pub fn eager_relationships(&self) -> impl Iterator<Item = &RelationshipMetadata> {
        self.relationships.iter().filter(|r| r.is_eager())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::metadata::FetchType;

    #[test]
    fn test_entity_builder_keeps_columns_unique() {
        let entity = EntityType::new("Course", "courses")
            .columns(["title", "credits", "title"])
            .column("department_id");

        assert_eq!(entity.columns, vec!["id", "title", "credits", "department_id"]);
        assert!(entity.has_column("credits"));
        assert!(!entity.has_column("name"));
    }

    #[test]
    fn test_custom_primary_key_replaces_id() {
        let entity = EntityType::new("Profile", "profiles")
            .column("bio")
            .with_primary_key("student_id");

        assert_eq!(entity.primary_key, "student_id");
        assert_eq!(entity.columns, vec!["student_id", "bio"]);
    }

    #[test]
    fn test_eager_relationships_filter() {
        let entity = EntityType::new("Department", "departments")
            .relationship(RelationshipMetadata::has_many("courses", "Course", "department_id"))
            .relationship(
                RelationshipMetadata::has_one("details", "DepartmentDetails", "department_id")
                    .with_fetch(FetchType::Eager),
            );

        let eager: Vec<_> = entity.eager_relationships().map(|r| r.name.as_str()).collect();
        assert_eq!(eager, vec!["details"]);
        assert!(entity.get_relationship("courses").is_some());
        assert!(entity.get_relationship("students").is_none());
    }
}
