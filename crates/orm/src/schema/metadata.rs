//! Relationship metadata - static description of how two entity types relate

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// Defines the type of relationship between entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// One-to-one, foreign key on the related row
    HasOne,
    /// One-to-many, foreign key on the related rows
    HasMany,
    /// Many-to-one (or owning one-to-one), foreign key on this row
    BelongsTo,
    /// Many-to-many through a pivot table
    ManyToMany,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }

    pub fn cardinality(self) -> Cardinality {
        if self.is_collection() {
            Cardinality::ToMany
        } else {
            Cardinality::ToOne
        }
    }

    /// Which storage row carries the foreign key
    pub fn owning_side(self) -> OwningSide {
        match self {
            Self::BelongsTo => OwningSide::Local,
            Self::HasOne | Self::HasMany => OwningSide::Related,
            Self::ManyToMany => OwningSide::Pivot,
        }
    }
}

/// How many related entities a relationship yields per owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Location of the foreign key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwningSide {
    /// On the declaring entity's own row
    Local,
    /// On the related entity's row
    Related,
    /// On a separate pivot table
    Pivot,
}

/// Default fetch policy of a relationship when no plan mentions it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchType {
    Eager,
    #[default]
    Lazy,
}

/// Pivot table configuration for many-to-many relationships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotConfig {
    /// The pivot table name
    pub table: String,
    /// Pivot column pointing at the declaring entity
    pub local_key: String,
    /// Pivot column pointing at the related entity
    pub foreign_key: String,
}

impl PivotConfig {
    pub fn new(table: impl Into<String>, local_key: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Validate the pivot configuration
    pub fn validate(&self) -> OrmResult<()> {
        if self.table.is_empty() {
            return Err(OrmError::Configuration("Pivot table name cannot be empty".to_string()));
        }

        if self.local_key.is_empty() || self.foreign_key.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Pivot table '{}' needs both key columns",
                self.table
            )));
        }

        if self.local_key == self.foreign_key {
            return Err(OrmError::Configuration(format!(
                "Pivot table '{}': local key and foreign key must be different",
                self.table
            )));
        }

        Ok(())
    }
}

/// Everything the planner needs to know about one relationship attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// The type of relationship
    pub relationship_type: RelationshipType,

    /// Name of the relationship attribute
    pub name: String,

    /// Name of the related entity type
    pub related_model: String,

    /// Foreign key column. Lives on the declaring row for `BelongsTo`, on the
    /// related row for `HasOne`/`HasMany`, and is unused for `ManyToMany`
    pub foreign_key: String,

    /// Column the foreign key points at: on the related row for `BelongsTo`,
    /// on the declaring row otherwise. Defaults to `id`
    pub referenced_key: String,

    /// Pivot table configuration for many-to-many relationships
    pub pivot_config: Option<PivotConfig>,

    /// Default fetch policy
    pub fetch: FetchType,

    /// Inverse relationship name on the related entity type
    pub inverse: Option<String>,
}

impl RelationshipMetadata {
    fn new(
        relationship_type: RelationshipType,
        name: impl Into<String>,
        related_model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            relationship_type,
            name: name.into(),
            related_model: related_model.into(),
            foreign_key: foreign_key.into(),
            referenced_key: "id".to_string(),
            pivot_config: None,
            fetch: FetchType::default(),
            inverse: None,
        }
    }

    pub fn has_one(name: impl Into<String>, related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationshipType::HasOne, name, related, foreign_key)
    }

    pub fn has_many(name: impl Into<String>, related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationshipType::HasMany, name, related, foreign_key)
    }

    pub fn belongs_to(name: impl Into<String>, related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(RelationshipType::BelongsTo, name, related, foreign_key)
    }

    pub fn many_to_many(name: impl Into<String>, related: impl Into<String>, pivot: PivotConfig) -> Self {
        let mut metadata = Self::new(RelationshipType::ManyToMany, name, related, String::new());
        metadata.pivot_config = Some(pivot);
        metadata
    }

    /// Set the column the foreign key references
    pub fn with_referenced_key(mut self, key: impl Into<String>) -> Self {
        self.referenced_key = key.into();
        self
    }

    /// Set the default fetch policy
    pub fn with_fetch(mut self, fetch: FetchType) -> Self {
        self.fetch = fetch;
        self
    }

    /// Set the inverse relationship name
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn cardinality(&self) -> Cardinality {
        self.relationship_type.cardinality()
    }

    pub fn is_eager(&self) -> bool {
        self.fetch == FetchType::Eager
    }

    /// Column on the declaring entity's row used to match related rows
    pub fn local_join_column(&self) -> &str {
        match self.relationship_type {
            RelationshipType::BelongsTo => &self.foreign_key,
            _ => &self.referenced_key,
        }
    }

    /// Validate the relationship metadata for internal consistency
    pub fn validate(&self) -> OrmResult<()> {
        if self.name.is_empty() {
            return Err(OrmError::Configuration("Relationship name cannot be empty".to_string()));
        }

        if self.name.contains('.') {
            return Err(OrmError::Configuration(format!(
                "Relationship name '{}' cannot contain '.'",
                self.name
            )));
        }

        if self.referenced_key.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Relationship '{}' needs a referenced key",
                self.name
            )));
        }

        match (&self.relationship_type, &self.pivot_config) {
            (RelationshipType::ManyToMany, Some(pivot)) => pivot.validate(),
            (RelationshipType::ManyToMany, None) => Err(OrmError::Configuration(format!(
                "Relationship '{}' of type ManyToMany requires pivot configuration",
                self.name
            ))),
            (_, Some(_)) => Err(OrmError::Configuration(format!(
                "Relationship '{}' of type {:?} cannot use a pivot table",
                self.name, self.relationship_type
            ))),
            (_, None) if self.foreign_key.is_empty() => Err(OrmError::Configuration(format!(
                "Relationship '{}' needs a foreign key column",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}
