//! Round-trip comparisons on the university dataset
//!
//! Each scenario loads the same graph twice: once with no plan, touching
//! every relationship afterwards so each one resolves lazily, and once with a
//! plan naming the same paths.

use std::future::Future;
use std::pin::Pin;

use clap::ValueEnum;
use fetchgraph_orm::fixtures::university;
use fetchgraph_orm::{Entity, FetchMode, FetchType, GraphLoader, LoaderConfig, OrmResult, StatementPurpose};

use super::memory_loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioName {
    DepartmentsCourses,
    DepartmentsDetails,
    CoursesDepartment,
    Reviews,
    StudentsCourses,
    Nested,
    FetchVsLoad,
    All,
}

const COMPARISONS: [(ScenarioName, &str, &[&str]); 6] = [
    (ScenarioName::DepartmentsCourses, "Department", &["courses"]),
    (ScenarioName::DepartmentsDetails, "Department", &["courses", "details"]),
    (ScenarioName::CoursesDepartment, "Course", &["department"]),
    (ScenarioName::Reviews, "Review", &["course", "student"]),
    (ScenarioName::StudentsCourses, "Student", &["courses"]),
    (ScenarioName::Nested, "Department", &["courses.students"]),
];

pub async fn run(name: ScenarioName, config: LoaderConfig) -> anyhow::Result<()> {
    for (scenario, root, paths) in COMPARISONS {
        if name == scenario || name == ScenarioName::All {
            compare(root, paths, config.clone()).await?;
        }
    }

    if matches!(name, ScenarioName::FetchVsLoad | ScenarioName::All) {
        fetch_vs_load(config).await?;
    }
    Ok(())
}

async fn compare(root: &str, paths: &[&str], config: LoaderConfig) -> anyhow::Result<()> {
    let (loader, counter) = memory_loader(university::schema()?, config)?;
    println!("{} with {}", root, paths.join(", "));

    let plan = loader.plan::<&str>(root, &[], FetchMode::Fetch)?;
    let mut entities = loader.execute(&plan, None).await?;
    for entity in entities.iter_mut() {
        for path in paths {
            let segments: Vec<&str> = path.split('.').collect();
            resolve_path(&loader, entity, &segments).await?;
        }
    }
    let unplanned = counter.snapshot();
    println!(
        "  without plan: {:>3} round trip(s) ({} lazy)",
        unplanned.count,
        unplanned.count_by_purpose(StatementPurpose::Lazy)
    );

    counter.reset();
    let plan = loader.plan(root, paths, FetchMode::Fetch)?;
    let planned = loader.execute(&plan, None).await?;
    println!("  with plan:    {:>3} round trip(s)", counter.count());
    for shape in counter.snapshot().shapes {
        println!("    {}", shape);
    }

    let same = entities.iter().map(Entity::to_json).eq(planned.iter().map(Entity::to_json));
    println!("  same graph:   {}", same);
    println!();
    Ok(())
}

/// Resolve a dot path below `entity`, one lazy load per entity per segment
fn resolve_path<'a>(
    loader: &'a GraphLoader,
    entity: &'a mut Entity,
    segments: &'a [&'a str],
) -> Pin<Box<dyn Future<Output = OrmResult<()>> + 'a>> {
    Box::pin(async move {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(());
        };

        loader.resolve(entity, first).await?;
        if !rest.is_empty() {
            for child in entity.related_mut(first)?.iter_mut() {
                resolve_path(loader, child, rest).await?;
            }
        }
        Ok(())
    })
}

async fn fetch_vs_load(config: LoaderConfig) -> anyhow::Result<()> {
    let (loader, counter) = memory_loader(university::schema_with_details_fetch(FetchType::Eager)?, config)?;
    println!("Department with courses, details eager by default");

    for mode in [FetchMode::Fetch, FetchMode::Load] {
        counter.reset();
        let plan = loader.plan("Department", &["courses"], mode)?;
        let departments = loader.execute(&plan, None).await?;
        let with_details = departments.iter().filter(|d| d.is_loaded("details")).count();

        println!(
            "  {:<5} {} round trip(s), details loaded on {}/{} department(s)",
            mode.to_string(),
            counter.count(),
            with_details,
            departments.len()
        );
    }
    println!();
    Ok(())
}
