//! Relationship containers - the loading state of one relationship attribute

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::entity::Entity;
use crate::value::KeyValue;

/// Everything needed to load a deferred relationship later
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LazyHandle {
    /// Entity type declaring the relationship
    pub owner_type: String,
    pub relationship: String,
    /// Value of the owner's join column; `None` when it is NULL, in which case
    /// nothing can be related
    pub join_value: Option<KeyValue>,
}

/// Loaded related entities
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<Entity>>),
    Many(Vec<Entity>),
}

impl Related {
    pub fn len(&self) -> usize {
        match self {
            Related::One(one) => usize::from(one.is_some()),
            Related::Many(many) => many.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Related::One(one) => one.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Entity]> {
        match self {
            Related::Many(many) => Some(many),
            Related::One(_) => None,
        }
    }

    /// Iterate over the related entities regardless of cardinality
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Entity> + '_> {
        match self {
            Related::One(one) => Box::new(one.as_deref().into_iter()),
            Related::Many(many) => Box::new(many.iter()),
        }
    }

    pub fn iter_mut(&mut self) -> Box<dyn Iterator<Item = &mut Entity> + '_> {
        match self {
            Related::One(one) => Box::new(one.as_deref_mut().into_iter()),
            Related::Many(many) => Box::new(many.iter_mut()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Related::One(one) => one.as_ref().map(|e| e.to_json()).unwrap_or(JsonValue::Null),
            Related::Many(many) => JsonValue::Array(many.iter().map(Entity::to_json).collect()),
        }
    }
}

/// A relationship attribute is either loaded or deferred
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    Loaded(Related),
    Deferred(LazyHandle),
}

impl Relation {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Relation::Loaded(_))
    }

    pub fn loaded(&self) -> Option<&Related> {
        match self {
            Relation::Loaded(related) => Some(related),
            Relation::Deferred(_) => None,
        }
    }

    pub fn handle(&self) -> Option<&LazyHandle> {
        match self {
            Relation::Deferred(handle) => Some(handle),
            Relation::Loaded(_) => None,
        }
    }
}
