//! Error types for the fetch planner and graph loader
//!
//! Plan-time errors (bad paths, bad filters) are reported before any statement
//! is dispatched. Store errors pass through unchanged.

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for planning and loading entity graphs
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrmError {
    /// A relationship path names a segment that does not exist on the entity
    /// type reached by the previous segments
    #[error("Invalid relationship path '{path}': '{segment}' is not a relationship of '{entity}'")]
    InvalidPath {
        path: String,
        segment: String,
        entity: String,
    },

    /// The planner produced a merge group that would multiply rows across
    /// independent to-many branches. Indicates a planner defect.
    #[error("Ambiguous merge: {0}")]
    AmbiguousMerge(String),

    /// Entity type is not registered in the schema
    #[error("Unknown entity type '{0}'")]
    UnknownEntity(String),

    /// Relationship is not declared on the entity type
    #[error("Unknown relationship '{relationship}' on '{entity}'")]
    UnknownRelationship { entity: String, relationship: String },

    /// Relationship was accessed while still deferred
    #[error("Relationship '{relationship}' on '{entity}' is not loaded")]
    NotLoaded { entity: String, relationship: String },

    /// Schema or loader configuration is inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied filter is invalid for the root entity type
    #[error("Query error: {0}")]
    Query(String),

    /// Error reported by the storage backend
    #[error("Database error: {0}")]
    Database(String),

    /// Row data could not be converted
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrmError {
    /// Returns true if the error was raised while building a plan, before
    /// any round trip happened
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            OrmError::InvalidPath { .. }
                | OrmError::UnknownEntity(_)
                | OrmError::AmbiguousMerge(_)
                | OrmError::Configuration(_)
        )
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_message_names_segment() {
        let err = OrmError::InvalidPath {
            path: "courses.instructors".to_string(),
            segment: "instructors".to_string(),
            entity: "Course".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid relationship path 'courses.instructors': 'instructors' is not a relationship of 'Course'"
        );
        assert!(err.is_plan_error());
    }

    #[test]
    fn test_database_error_is_not_plan_error() {
        let err = OrmError::Database("connection refused".to_string());
        assert!(!err.is_plan_error());
    }
}
