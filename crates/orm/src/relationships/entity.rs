//! Materialised entities

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use super::containers::{Relation, Related};
use crate::error::{OrmError, OrmResult};
use crate::value::{DatabaseValue, KeyValue};

/// One loaded row of an entity type together with its relationship
/// attributes. Entities are plain values; loading further relationships goes
/// through [`GraphLoader::resolve`](crate::loading::GraphLoader::resolve).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    entity_type: String,
    key: KeyValue,
    attributes: BTreeMap<String, DatabaseValue>,
    relations: BTreeMap<String, Relation>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, key: KeyValue, attributes: BTreeMap<String, DatabaseValue>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key,
            attributes,
            relations: BTreeMap::new(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Primary key value
    pub fn key(&self) -> &KeyValue {
        &self.key
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.attributes.get(column)
    }

    pub fn attributes(&self) -> &BTreeMap<String, DatabaseValue> {
        &self.attributes
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn set_relation(&mut self, name: impl Into<String>, relation: Relation) {
        self.relations.insert(name.into(), relation);
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.relations.get(name).map(Relation::is_loaded).unwrap_or(false)
    }

    /// Loaded related entities. Accessing a deferred relationship here is an
    /// error; resolve it through the loader first.
    pub fn related(&self, name: &str) -> OrmResult<&Related> {
        match self.relations.get(name) {
            Some(Relation::Loaded(related)) => Ok(related),
            Some(Relation::Deferred(_)) => Err(OrmError::NotLoaded {
                entity: self.entity_type.clone(),
                relationship: name.to_string(),
            }),
            None => Err(self.unknown(name)),
        }
    }

    pub fn related_mut(&mut self, name: &str) -> OrmResult<&mut Related> {
        let entity_type = self.entity_type.clone();
        match self.relations.get_mut(name) {
            Some(Relation::Loaded(related)) => Ok(related),
            Some(Relation::Deferred(_)) => Err(OrmError::NotLoaded {
                entity: entity_type,
                relationship: name.to_string(),
            }),
            None => Err(OrmError::UnknownRelationship {
                entity: entity_type,
                relationship: name.to_string(),
            }),
        }
    }

    /// Loaded to-many relationship
    pub fn many(&self, name: &str) -> OrmResult<&[Entity]> {
        self.related(name)?.as_many().ok_or_else(|| {
            OrmError::Query(format!("Relationship '{}' on '{}' is not a collection", name, self.entity_type))
        })
    }

    /// Loaded to-one relationship
    pub fn one(&self, name: &str) -> OrmResult<Option<&Entity>> {
        match self.related(name)? {
            Related::One(one) => Ok(one.as_deref()),
            Related::Many(_) => Err(OrmError::Query(format!(
                "Relationship '{}' on '{}' is a collection",
                name, self.entity_type
            ))),
        }
    }

    fn unknown(&self, name: &str) -> OrmError {
        OrmError::UnknownRelationship {
            entity: self.entity_type.clone(),
            relationship: name.to_string(),
        }
    }

    /// Attributes plus every loaded relationship; deferred ones are omitted
    pub fn to_json(&self) -> JsonValue {
        let mut map: serde_json::Map<String, JsonValue> =
            self.attributes.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();

        for (name, relation) in &self.relations {
            if let Relation::Loaded(related) = relation {
                map.insert(name.clone(), related.to_json());
            }
        }

        JsonValue::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::containers::LazyHandle;

    fn course(id: i64, title: &str) -> Entity {
        let attributes = BTreeMap::from([
            ("id".to_string(), DatabaseValue::Int64(id)),
            ("title".to_string(), DatabaseValue::from(title)),
        ]);
        Entity::new("Course", KeyValue::Int(id), attributes)
    }

    #[test]
    fn test_loaded_and_deferred_access() {
        let mut department = Entity::new(
            "Department",
            KeyValue::Int(1),
            BTreeMap::from([("id".to_string(), DatabaseValue::Int64(1))]),
        );
        department.set_relation("courses", Relation::Loaded(Related::Many(vec![course(10, "Algorithms")])));
        department.set_relation(
            "details",
            Relation::Deferred(LazyHandle {
                owner_type: "Department".to_string(),
                relationship: "details".to_string(),
                join_value: Some(KeyValue::Int(1)),
            }),
        );

        assert!(department.is_loaded("courses"));
        assert!(!department.is_loaded("details"));
        assert_eq!(department.many("courses").unwrap().len(), 1);
        assert!(matches!(department.related("details"), Err(OrmError::NotLoaded { .. })));
        assert!(matches!(department.related("instructors"), Err(OrmError::UnknownRelationship { .. })));
        assert!(department.one("courses").is_err());
    }

    #[test]
    fn test_to_json_skips_deferred_relations() {
        let mut review = Entity::new(
            "Review",
            KeyValue::Int(5),
            BTreeMap::from([("id".to_string(), DatabaseValue::Int64(5))]),
        );
        review.set_relation("course", Relation::Loaded(Related::One(Some(Box::new(course(3, "Databases"))))));
        review.set_relation(
            "student",
            Relation::Deferred(LazyHandle {
                owner_type: "Review".to_string(),
                relationship: "student".to_string(),
                join_value: None,
            }),
        );

        let json = review.to_json();
        assert_eq!(json["id"], 5);
        assert_eq!(json["course"]["title"], "Databases");
        assert!(json.get("student").is_none());
    }
}
