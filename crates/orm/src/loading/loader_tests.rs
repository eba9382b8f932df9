use std::sync::Arc;

use super::*;
use crate::backends::MemoryStore;
use crate::config::LoaderConfig;
use crate::error::OrmError;
use crate::fixtures::{parent_child, university};
use crate::instrumentation::{CountingExecutor, RoundTripCounter};
use crate::relationships::Entity;
use crate::schema::{FetchType, Schema};
use crate::statement::{Filter, StatementPurpose};
use crate::value::{DatabaseValue, KeyValue};

fn counted_loader(schema: Schema, store: MemoryStore, config: LoaderConfig) -> (GraphLoader, Arc<RoundTripCounter>) {
    let counter = Arc::new(RoundTripCounter::new());
    let executor = CountingExecutor::new(store, counter.clone());
    let loader = GraphLoader::with_config(Arc::new(schema), Arc::new(executor), config);
    (loader, counter)
}

fn university_loader() -> (GraphLoader, Arc<RoundTripCounter>) {
    counted_loader(
        university::schema().unwrap(),
        university::store().unwrap(),
        LoaderConfig::default(),
    )
}

fn sizes(entities: &[Entity], relationship: &str) -> Vec<usize> {
    entities
        .iter()
        .map(|e| e.related(relationship).unwrap().len())
        .collect()
}

#[tokio::test]
async fn test_one_to_many_path_costs_one_round_trip() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Department", &["courses"], FetchMode::Fetch).unwrap();

    let departments = loader.execute(&plan, None).await.unwrap();

    assert_eq!(counter.count(), 1);
    assert_eq!(departments.len(), university::DEPARTMENT_COUNT);
    assert_eq!(sizes(&departments, "courses"), university::courses_per_department());
}

#[tokio::test]
async fn test_unplanned_access_costs_one_plus_n() {
    let (loader, counter) = university_loader();
    let plan = loader.plan::<&str>("Department", &[], FetchMode::Fetch).unwrap();

    let mut departments = loader.execute(&plan, None).await.unwrap();
    assert_eq!(counter.count(), 1);
    assert!(departments.iter().all(|d| !d.is_loaded("courses")));

    let mut loaded = Vec::new();
    for department in departments.iter_mut() {
        loaded.push(loader.resolve(department, "courses").await.unwrap().len());
    }

    assert_eq!(counter.count(), 1 + university::DEPARTMENT_COUNT as u64);
    assert_eq!(counter.count_by_purpose(StatementPurpose::Lazy), university::DEPARTMENT_COUNT as u64);
    assert_eq!(loaded, university::courses_per_department());
}

#[tokio::test]
async fn test_parent_children_planned_vs_unplanned() {
    let (loader, counter) = counted_loader(
        parent_child::schema().unwrap(),
        parent_child::store().unwrap(),
        LoaderConfig::default(),
    );

    let plan = loader.plan("Parent", &["children"], FetchMode::Fetch).unwrap();
    let parents = loader.execute(&plan, None).await.unwrap();
    assert_eq!(counter.count(), 1);
    assert_eq!(sizes(&parents, "children"), parent_child::CHILDREN_PER_PARENT.to_vec());

    counter.reset();
    let plan = loader.plan::<&str>("Parent", &[], FetchMode::Fetch).unwrap();
    let mut parents = loader.execute(&plan, None).await.unwrap();
    for parent in parents.iter_mut() {
        loader.resolve(parent, "children").await.unwrap();
    }
    assert_eq!(counter.count(), 4);
    assert_eq!(sizes(&parents, "children"), parent_child::CHILDREN_PER_PARENT.to_vec());
}

#[tokio::test]
async fn test_sibling_collections_never_multiply_rows() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Course", &["reviews", "students"], FetchMode::Fetch).unwrap();

    let outcome = loader.execute_with_stats(&plan, None).await.unwrap();
    let courses = &outcome.entities;

    assert!(outcome.stats.statement_count() >= 2);
    assert_eq!(counter.count(), outcome.stats.statement_count() as u64);

    let max_reviews = university::reviews_per_course().into_iter().max().unwrap();
    let max_students = university::students_per_course().into_iter().max().unwrap();
    let bound = university::COURSE_COUNT * max_reviews.max(max_students);
    assert!(outcome.stats.max_rows() <= bound, "{} rows > {}", outcome.stats.max_rows(), bound);

    assert_eq!(courses.len(), university::COURSE_COUNT);
    assert_eq!(sizes(courses, "reviews"), university::reviews_per_course());
    assert_eq!(sizes(courses, "students"), university::students_per_course());
}

#[tokio::test]
async fn test_duplicate_rows_collapse_to_distinct_roots() {
    let (loader, _) = university_loader();
    let plan = loader.plan("Course", &["students"], FetchMode::Fetch).unwrap();

    let outcome = loader.execute_with_stats(&plan, None).await.unwrap();

    // every course has at least one student, so one row per enrollment
    assert_eq!(outcome.stats.raw_rows, 24);
    assert_eq!(outcome.stats.roots, university::COURSE_COUNT);
    assert_eq!(outcome.entities.len(), university::COURSE_COUNT);

    let ids: Vec<KeyValue> = outcome.entities.iter().map(|c| c.key().clone()).collect();
    let expected: Vec<KeyValue> = (1..=university::COURSE_COUNT as i64).map(KeyValue::Int).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_execution_is_idempotent() {
    let (loader, counter) = university_loader();
    let plan = loader
        .plan("Department", &["courses.reviews", "courses.students", "details"], FetchMode::Fetch)
        .unwrap();

    let first = loader.execute(&plan, None).await.unwrap();
    let after_first = counter.count();
    let second = loader.execute(&plan, None).await.unwrap();

    assert_eq!(counter.count(), after_first * 2);
    let first: Vec<_> = first.iter().map(Entity::to_json).collect();
    let second: Vec<_> = second.iter().map(Entity::to_json).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_nested_to_many_chain_is_one_statement() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Department", &["courses.students"], FetchMode::Fetch).unwrap();

    let departments = loader.execute(&plan, None).await.unwrap();

    assert_eq!(counter.count(), 1);
    let per_course: Vec<usize> = departments
        .iter()
        .flat_map(|d| d.many("courses").unwrap())
        .map(|c| c.many("students").unwrap().len())
        .collect();
    assert_eq!(per_course, university::students_per_course());
}

#[tokio::test]
async fn test_student_courses_through_pivot() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Student", &["courses", "profile"], FetchMode::Fetch).unwrap();

    let students = loader.execute(&plan, None).await.unwrap();

    assert_eq!(counter.count(), 1);
    assert_eq!(students.len(), university::STUDENT_COUNT);
    assert!(students.iter().all(|s| s.many("courses").unwrap().len() == 3));
    assert!(students.iter().all(|s| s.one("profile").unwrap().is_some()));
}

#[tokio::test]
async fn test_reviews_with_course_and_department() {
    let (loader, counter) = university_loader();

    let plan = loader.plan::<&str>("Review", &[], FetchMode::Fetch).unwrap();
    let mut reviews = loader.execute(&plan, None).await.unwrap();
    for review in reviews.iter_mut() {
        loader.resolve(review, "course").await.unwrap();
        for course in review.related_mut("course").unwrap().iter_mut() {
            loader.resolve(course, "department").await.unwrap();
        }
    }
    assert_eq!(counter.count(), 1 + 2 * university::REVIEW_COUNT as u64);

    counter.reset();
    let plan = loader.plan("Review", &["course.department"], FetchMode::Fetch).unwrap();
    let planned = loader.execute(&plan, None).await.unwrap();
    assert_eq!(counter.count(), 1);

    let lazy: Vec<_> = reviews.iter().map(Entity::to_json).collect();
    let planned_json: Vec<_> = planned.iter().map(Entity::to_json).collect();
    assert_eq!(lazy, planned_json);
}

#[tokio::test]
async fn test_fetch_ignores_eager_defaults_and_load_honours_them() {
    let (loader, counter) = counted_loader(
        university::schema_with_details_fetch(FetchType::Eager).unwrap(),
        university::store().unwrap(),
        LoaderConfig::default(),
    );

    let fetch = loader.plan("Department", &["courses"], FetchMode::Fetch).unwrap();
    let fetched = loader.execute(&fetch, None).await.unwrap();
    assert!(fetched.iter().all(|d| !d.is_loaded("details")));
    assert!(matches!(fetched[0].related("details"), Err(OrmError::NotLoaded { .. })));

    let load = loader.plan("Department", &["courses"], FetchMode::Load).unwrap();
    let loaded = loader.execute(&load, None).await.unwrap();
    assert!(loaded.iter().all(|d| d.one("details").unwrap().is_some()));
    assert_eq!(sizes(&loaded, "courses"), university::courses_per_department());

    assert_eq!(counter.count(), 2);
}

#[tokio::test]
async fn test_find_all_uses_default_fetch_policies() {
    let (loader, counter) = counted_loader(
        university::schema_with_details_fetch(FetchType::Eager).unwrap(),
        university::store().unwrap(),
        LoaderConfig::default(),
    );

    let departments = loader.find_all("Department", None).await.unwrap();

    assert_eq!(counter.count(), 1);
    let computer_science = &departments[0];
    assert!(!computer_science.is_loaded("courses"));
    let details = computer_science.one("details").unwrap().unwrap();
    assert_eq!(details.get("building"), Some(&DatabaseValue::from("Turing Hall")));
}

#[tokio::test]
async fn test_empty_parent_key_set_skips_the_statement() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Course", &["reviews", "students"], FetchMode::Fetch).unwrap();
    let filter = Filter::new().where_eq("id", 9999i64);

    let outcome = loader.execute_with_stats(&plan, Some(&filter)).await.unwrap();

    assert!(outcome.entities.is_empty());
    assert_eq!(outcome.stats.statement_count(), 1);
    assert_eq!(counter.count(), 1);
}

#[tokio::test]
async fn test_parent_keys_are_chunked_by_batch_size() {
    let (loader, counter) = counted_loader(
        university::schema().unwrap(),
        university::store().unwrap(),
        LoaderConfig::default().with_max_batch_size(5),
    );
    let plan = loader.plan("Course", &["reviews", "students"], FetchMode::Fetch).unwrap();

    let courses = loader.execute(&plan, None).await.unwrap();

    assert_eq!(counter.count(), 5);
    let record = counter.snapshot();
    let scopes: Vec<Option<usize>> = record
        .shapes
        .iter()
        .filter(|s| s.purpose == StatementPurpose::Batch)
        .map(|s| s.scope_keys)
        .collect();
    assert_eq!(scopes, vec![Some(5), Some(5), Some(5), Some(1)]);
    assert_eq!(sizes(&courses, "students"), university::students_per_course());
}

#[tokio::test]
async fn test_zero_batch_size_is_a_configuration_error() {
    let (loader, counter) = counted_loader(
        university::schema().unwrap(),
        university::store().unwrap(),
        LoaderConfig::default().with_max_batch_size(0),
    );
    let plan = loader.plan("Course", &["reviews", "students"], FetchMode::Fetch).unwrap();

    let error = loader.execute(&plan, None).await.unwrap_err();

    assert!(matches!(error, OrmError::Configuration(_)));
    assert_eq!(counter.count(), 0);
}

#[tokio::test]
async fn test_filter_restricts_roots() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Course", &["reviews"], FetchMode::Fetch).unwrap();
    let filter = Filter::new().where_eq("department_id", 1i64).where_gte("credits", 4);

    let courses = loader.execute(&plan, Some(&filter)).await.unwrap();

    assert_eq!(counter.count(), 1);
    let titles: Vec<_> = courses.iter().filter_map(|c| c.get("title")).cloned().collect();
    assert_eq!(
        titles,
        vec![
            DatabaseValue::from("Data Structures"),
            DatabaseValue::from("Operating Systems"),
            DatabaseValue::from("Compilers"),
        ]
    );
    assert_eq!(sizes(&courses, "reviews"), vec![3, 2, 1]);
}

#[tokio::test]
async fn test_invalid_filter_fails_before_any_round_trip() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Course", &["reviews"], FetchMode::Fetch).unwrap();
    let filter = Filter::new().where_eq("instructor", "Knuth");

    let error = loader.execute(&plan, Some(&filter)).await.unwrap_err();

    assert!(matches!(error, OrmError::Query(_)));
    assert_eq!(counter.count(), 0);
}

#[tokio::test]
async fn test_courses_with_department_is_one_statement() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Course", &["department"], FetchMode::Fetch).unwrap();

    let courses = loader.execute(&plan, None).await.unwrap();

    assert_eq!(counter.count(), 1);
    let last = courses.last().unwrap();
    let department = last.one("department").unwrap().unwrap();
    assert_eq!(department.get("name"), Some(&DatabaseValue::from("History")));
    assert!(!department.is_loaded("courses"));
}

#[tokio::test]
async fn test_json_omits_deferred_relationships() {
    let (loader, _) = university_loader();
    let plan = loader.plan("Department", &["courses"], FetchMode::Fetch).unwrap();
    let filter = Filter::new().where_eq("name", "Physics");

    let departments = loader.execute(&plan, Some(&filter)).await.unwrap();
    let json = departments[0].to_json();

    assert_eq!(json["name"], "Physics");
    assert_eq!(json["courses"].as_array().unwrap().len(), 3);
    assert!(json.get("details").is_none());
    assert!(json["courses"][0].get("reviews").is_none());
}

#[tokio::test]
async fn test_checkpoint_scopes_a_unit_of_work() {
    let (loader, counter) = university_loader();
    let plan = loader.plan("Course", &["reviews", "students"], FetchMode::Fetch).unwrap();

    loader.execute(&plan, None).await.unwrap();
    let checkpoint = counter.checkpoint();

    let plan = loader.plan::<&str>("Department", &[], FetchMode::Fetch).unwrap();
    let mut departments = loader.execute(&plan, None).await.unwrap();
    loader.resolve(&mut departments[0], "courses").await.unwrap();

    let unit = counter.since(checkpoint);
    assert_eq!(unit.count, 2);
    assert_eq!(unit.count_by_purpose(StatementPurpose::Primary), 1);
    assert_eq!(unit.count_by_purpose(StatementPurpose::Lazy), 1);
    assert_eq!(counter.count(), 4);
}
