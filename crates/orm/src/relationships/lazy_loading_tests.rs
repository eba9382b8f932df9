//! Deferred relationship resolution
//!
//! Every resolution costs exactly one round trip scoped to the owning
//! entity, except when the relationship is already loaded or the owner's
//! join value is NULL.

#[cfg(test)]
pub mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::error::OrmError;
    use crate::fixtures::university;
    use crate::instrumentation::{CountingExecutor, RoundTripCounter};
    use crate::loading::{FetchMode, GraphLoader};
    use crate::relationships::{Entity, LazyHandle, Related, Relation};
    use crate::statement::{Filter, StatementPurpose};
    use crate::value::{DatabaseValue, KeyValue};

    fn loader() -> (GraphLoader, Arc<RoundTripCounter>) {
        let counter = Arc::new(RoundTripCounter::new());
        let executor = CountingExecutor::new(university::store().unwrap(), counter.clone());
        let schema = Arc::new(university::schema().unwrap());
        (GraphLoader::new(schema, Arc::new(executor)), counter)
    }

    async fn course(loader: &GraphLoader, id: i64) -> Entity {
        let plan = loader.plan::<&str>("Course", &[], FetchMode::Fetch).unwrap();
        let filter = Filter::new().where_eq("id", id);
        loader.execute(&plan, Some(&filter)).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_resolve_costs_one_round_trip_then_nothing() {
        let (loader, counter) = loader();
        let mut course = course(&loader, 1).await;
        counter.reset();

        let reviews = loader.resolve(&mut course, "reviews").await.unwrap().len();
        assert_eq!(reviews, 3);
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.count_by_purpose(StatementPurpose::Lazy), 1);

        let again = loader.resolve(&mut course, "reviews").await.unwrap().len();
        assert_eq!(again, 3);
        assert_eq!(counter.count(), 1);
        assert!(course.is_loaded("reviews"));
    }

    #[tokio::test]
    async fn test_resolve_belongs_to() {
        let (loader, counter) = loader();
        let mut course = course(&loader, 9).await;
        counter.reset();

        let related = loader.resolve(&mut course, "department").await.unwrap();
        let department = related.as_one().unwrap();

        assert_eq!(department.key(), &KeyValue::Int(3));
        assert_eq!(department.get("name"), Some(&DatabaseValue::from("Physics")));
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_has_one() {
        let (loader, counter) = loader();
        let plan = loader.plan::<&str>("Department", &[], FetchMode::Fetch).unwrap();
        let mut departments = loader.execute(&plan, None).await.unwrap();
        counter.reset();

        let details = loader.resolve(&mut departments[1], "details").await.unwrap();

        assert_eq!(details.len(), 1);
        let details = details.as_one().unwrap();
        assert_eq!(details.get("building"), Some(&DatabaseValue::from("Euler Building")));
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_many_to_many_defers_nested_relationships() {
        let (loader, counter) = loader();
        let mut course = course(&loader, 1).await;
        counter.reset();

        let students = match loader.resolve(&mut course, "students").await.unwrap() {
            Related::Many(students) => students.clone(),
            other => panic!("expected a collection, got {:?}", other),
        };

        assert_eq!(counter.count(), 1);
        let keys: Vec<_> = students.iter().map(|s| s.key().clone()).collect();
        assert_eq!(keys, vec![KeyValue::Int(1), KeyValue::Int(2), KeyValue::Int(3)]);

        let first = &students[0];
        assert!(!first.is_loaded("courses"));
        assert!(matches!(first.related("profile"), Err(OrmError::NotLoaded { .. })));
        let handle = first.relation("profile").and_then(Relation::handle).unwrap();
        assert_eq!(handle.owner_type, "Student");
        assert_eq!(handle.join_value, Some(KeyValue::Int(1)));
    }

    #[tokio::test]
    async fn test_resolve_empty_collection_still_costs_a_round_trip() {
        let (loader, counter) = loader();
        let mut course = course(&loader, 13).await;
        counter.reset();

        let reviews = loader.resolve(&mut course, "reviews").await.unwrap();

        assert!(reviews.is_empty());
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test]
    async fn test_null_join_value_resolves_without_round_trip() {
        let (loader, counter) = loader();
        let attributes = BTreeMap::from([
            ("id".to_string(), DatabaseValue::Int64(99)),
            ("course_id".to_string(), DatabaseValue::Null),
        ]);
        let mut review = Entity::new("Review", KeyValue::Int(99), attributes);
        review.set_relation(
            "course",
            Relation::Deferred(LazyHandle {
                owner_type: "Review".to_string(),
                relationship: "course".to_string(),
                join_value: None,
            }),
        );

        let course = loader.resolve(&mut review, "course").await.unwrap();

        assert!(matches!(course, Related::One(None)));
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_unknown_relationship() {
        let (loader, counter) = loader();
        let mut course = course(&loader, 1).await;
        counter.reset();

        let error = loader.resolve(&mut course, "instructors").await.unwrap_err();

        assert!(matches!(error, OrmError::UnknownRelationship { .. }));
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test]
    async fn test_planned_relationship_needs_no_resolution() {
        let (loader, counter) = loader();
        let plan = loader.plan("Course", &["reviews"], FetchMode::Fetch).unwrap();
        let mut courses = loader.execute(&plan, None).await.unwrap();
        counter.reset();

        for course in courses.iter_mut() {
            loader.resolve(course, "reviews").await.unwrap();
        }

        assert_eq!(counter.count(), 0);
    }
}
