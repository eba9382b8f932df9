//! Relationship paths such as `courses.students`

use std::fmt;

use crate::error::{OrmError, OrmResult};
use crate::schema::{RelationshipMetadata, Schema};

/// A dot-separated chain of relationship names rooted at a query's root type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipPath {
    segments: Vec<String>,
}

impl RelationshipPath {
    /// Split a path into segments. Empty segments are kept so that
    /// [`resolve`](Self::resolve) reports them against the entity they were
    /// looked up on.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.trim().split('.').map(|s| s.trim().to_string()).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path against the schema starting at `root`, returning the
    /// relationship reached by each segment.
    pub fn resolve<'s>(&self, schema: &'s Schema, root: &str) -> OrmResult<Vec<&'s RelationshipMetadata>> {
        let mut current = schema.entity(root)?;
        let mut steps = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            let relationship = current.get_relationship(segment).ok_or_else(|| OrmError::InvalidPath {
                path: self.to_string(),
                segment: segment.clone(),
                entity: current.name.clone(),
            })?;
            current = schema.entity(&relationship.related_model)?;
            steps.push(relationship);
        }

        Ok(steps)
    }
}

impl fmt::Display for RelationshipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for RelationshipPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::university;

    #[test]
    fn test_parse_segments() {
        let path = RelationshipPath::parse(" courses.students ");
        assert_eq!(path.segments(), &["courses".to_string(), "students".to_string()]);
        assert_eq!(path.to_string(), "courses.students");
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_empty_segments_fail_resolution() {
        let schema = university::schema().unwrap();

        for raw in ["", "courses..students", "courses."] {
            let result = RelationshipPath::parse(raw).resolve(&schema, "Department");
            assert!(matches!(result, Err(OrmError::InvalidPath { .. })), "{raw:?}");
        }
    }

    #[test]
    fn test_resolve_walks_entity_graph() {
        let schema = university::schema().unwrap();
        let path = RelationshipPath::from("courses.reviews.student");

        let steps = path.resolve(&schema, "Department").unwrap();
        let targets: Vec<_> = steps.iter().map(|r| r.related_model.as_str()).collect();
        assert_eq!(targets, vec!["Course", "Review", "Student"]);
    }

    #[test]
    fn test_resolve_names_first_bad_segment() {
        let schema = university::schema().unwrap();
        let path = RelationshipPath::parse("courses.instructors.name");

        match path.resolve(&schema, "Department") {
            Err(OrmError::InvalidPath { segment, entity, .. }) => {
                assert_eq!(segment, "instructors");
                assert_eq!(entity, "Course");
            }
            other => panic!("expected InvalidPath, got {:?}", other),
        }
    }
}
