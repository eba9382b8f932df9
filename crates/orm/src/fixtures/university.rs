//! University dataset: departments, courses, students, reviews and their
//! one-to-one detail records.
//!
//! Every relationship is lazy by default; [`schema_with_details_fetch`] flips
//! `Department.details` to exercise LOAD-mode defaults.

use chrono::NaiveDate;

use crate::backends::MemoryStore;
use crate::error::OrmResult;
use crate::schema::{EntityType, FetchType, PivotConfig, RelationshipMetadata, Schema};
use crate::value::DatabaseValue;

pub const DEPARTMENT_COUNT: usize = 5;
pub const COURSE_COUNT: usize = 16;
pub const STUDENT_COUNT: usize = 8;
pub const REVIEW_COUNT: usize = 20;

const DEPARTMENTS: [(i64, &str, &str); DEPARTMENT_COUNT] = [
    (1, "Computer Science", "Algorithms, systems and software"),
    (2, "Mathematics", "Pure and applied mathematics"),
    (3, "Physics", "From particles to galaxies"),
    (4, "Biology", "Life sciences and genetics"),
    (5, "History", "Ancient to modern history"),
];

const DETAILS: [(i64, &str, f64, &str); DEPARTMENT_COUNT] = [
    (1, "Turing Hall", 1_250_000.0, "Dr. Ada Byron"),
    (2, "Euler Building", 640_000.0, "Dr. Emmy Noether"),
    (3, "Curie Center", 980_000.0, "Dr. Richard Feynman"),
    (4, "Darwin Wing", 720_000.0, "Dr. Rosalind Franklin"),
    (5, "Herodotus House", 310_000.0, "Dr. Mary Beard"),
];

// (id, department_id, title, credits)
const COURSES: [(i64, i64, &str, i32); COURSE_COUNT] = [
    (1, 1, "Data Structures", 4),
    (2, 1, "Operating Systems", 4),
    (3, 1, "Databases", 3),
    (4, 1, "Compilers", 4),
    (5, 2, "Linear Algebra", 3),
    (6, 2, "Real Analysis", 4),
    (7, 2, "Probability", 3),
    (8, 3, "Classical Mechanics", 4),
    (9, 3, "Quantum Mechanics", 4),
    (10, 3, "Thermodynamics", 3),
    (11, 4, "Cell Biology", 3),
    (12, 4, "Genetics", 4),
    (13, 4, "Ecology", 3),
    (14, 5, "Ancient Rome", 3),
    (15, 5, "Medieval Europe", 3),
    (16, 5, "Modern China", 3),
];

const STUDENTS: [(i64, &str, &str); STUDENT_COUNT] = [
    (1, "Alice", "Martin"),
    (2, "Bruno", "Silva"),
    (3, "Chloe", "Nguyen"),
    (4, "Daniel", "Okafor"),
    (5, "Elena", "Petrova"),
    (6, "Farid", "Haddad"),
    (7, "Grace", "Kim"),
    (8, "Hugo", "Lefebvre"),
];

// (course_id, student_id)
const ENROLLMENTS: [(i64, i64); 24] = [
    (1, 1),
    (1, 2),
    (1, 3),
    (2, 1),
    (2, 4),
    (3, 2),
    (3, 5),
    (4, 6),
    (5, 1),
    (5, 7),
    (6, 3),
    (7, 8),
    (8, 4),
    (8, 5),
    (9, 6),
    (10, 7),
    (11, 8),
    (11, 2),
    (12, 3),
    (13, 4),
    (14, 5),
    (14, 6),
    (15, 7),
    (16, 8),
];

// (id, course_id, student_id, rating, content)
const REVIEWS: [(i64, i64, i64, i32, &str); REVIEW_COUNT] = [
    (1, 1, 1, 5, "Clear lectures and great exercises"),
    (2, 1, 2, 4, "Hard but fair"),
    (3, 1, 3, 5, "Best course this year"),
    (4, 2, 1, 4, "Loved the scheduler project"),
    (5, 2, 4, 3, "Too much material"),
    (6, 3, 2, 5, "Finally understood joins"),
    (7, 3, 5, 4, "Useful labs"),
    (8, 4, 6, 5, "Challenging and rewarding"),
    (9, 5, 1, 4, "Solid foundations"),
    (10, 5, 7, 3, "Fast paced"),
    (11, 6, 3, 4, "Rigorous proofs"),
    (12, 7, 8, 5, "Great examples"),
    (13, 8, 4, 4, "Good problem sets"),
    (14, 8, 5, 3, "Dry lectures"),
    (15, 9, 6, 5, "Mind bending"),
    (16, 10, 7, 4, "Well organised"),
    (17, 11, 8, 4, "Interesting labs"),
    (18, 12, 3, 5, "Fascinating topic"),
    (19, 14, 5, 5, "Wonderful storyteller"),
    (20, 16, 8, 4, "Eye opening"),
];

/// Schema with every relationship lazy
pub fn schema() -> OrmResult<Schema> {
    schema_with_details_fetch(FetchType::Lazy)
}

/// Schema with `Department.details` using the given default fetch policy
pub fn schema_with_details_fetch(details_fetch: FetchType) -> OrmResult<Schema> {
    Schema::builder()
        .entity(
            EntityType::new("Department", "departments")
                .columns(["name", "description"])
                .relationship(RelationshipMetadata::has_many("courses", "Course", "department_id").with_inverse("department"))
                .relationship(
                    RelationshipMetadata::has_one("details", "DepartmentDetails", "department_id")
                        .with_fetch(details_fetch)
                        .with_inverse("department"),
                ),
        )
        .entity(
            EntityType::new("DepartmentDetails", "department_details")
                .with_primary_key("department_id")
                .columns(["building", "budget", "head_of_department"])
                .relationship(RelationshipMetadata::belongs_to("department", "Department", "department_id")),
        )
        .entity(
            EntityType::new("Course", "courses")
                .columns(["title", "description", "credits", "department_id"])
                .relationship(RelationshipMetadata::belongs_to("department", "Department", "department_id"))
                .relationship(RelationshipMetadata::has_many("reviews", "Review", "course_id").with_inverse("course"))
                .relationship(RelationshipMetadata::many_to_many(
                    "students",
                    "Student",
                    PivotConfig::new("course_students", "course_id", "student_id"),
                )),
        )
        .entity(
            EntityType::new("Student", "students")
                .columns(["first_name", "last_name", "email"])
                .relationship(
                    RelationshipMetadata::many_to_many(
                        "courses",
                        "Course",
                        PivotConfig::new("course_students", "student_id", "course_id"),
                    )
                    .with_inverse("students"),
                )
                .relationship(RelationshipMetadata::has_one("profile", "StudentProfile", "student_id")),
        )
        .entity(
            EntityType::new("StudentProfile", "student_profiles")
                .with_primary_key("student_id")
                .columns(["bio", "date_of_birth", "phone_number", "address"])
                .relationship(RelationshipMetadata::belongs_to("student", "Student", "student_id")),
        )
        .entity(
            EntityType::new("Review", "reviews")
                .columns(["content", "rating", "created_at", "course_id", "student_id"])
                .relationship(RelationshipMetadata::belongs_to("course", "Course", "course_id"))
                .relationship(RelationshipMetadata::belongs_to("student", "Student", "student_id")),
        )
        .build()
}

/// Create the university tables in `store` and fill them
pub fn seed(store: &MemoryStore) -> OrmResult<()> {
    store.create_table("departments", ["id", "name", "description"]);
    store.create_table("department_details", ["department_id", "building", "budget", "head_of_department"]);
    store.create_table("courses", ["id", "title", "description", "credits", "department_id"]);
    store.create_table("students", ["id", "first_name", "last_name", "email"]);
    store.create_table("student_profiles", ["student_id", "bio", "date_of_birth", "phone_number", "address"]);
    store.create_table("course_students", ["course_id", "student_id"]);
    store.create_table("reviews", ["id", "content", "rating", "created_at", "course_id", "student_id"]);

    for (id, name, description) in DEPARTMENTS {
        store.insert(
            "departments",
            [("id", DatabaseValue::from(id)), ("name", name.into()), ("description", description.into())],
        )?;
    }

    for (department_id, building, budget, head) in DETAILS {
        store.insert(
            "department_details",
            [
                ("department_id", DatabaseValue::from(department_id)),
                ("building", building.into()),
                ("budget", budget.into()),
                ("head_of_department", head.into()),
            ],
        )?;
    }

    for (id, department_id, title, credits) in COURSES {
        store.insert(
            "courses",
            [
                ("id", DatabaseValue::from(id)),
                ("title", title.into()),
                ("description", format!("An introduction to {}", title.to_lowercase()).into()),
                ("credits", credits.into()),
                ("department_id", department_id.into()),
            ],
        )?;
    }

    for (id, first_name, last_name) in STUDENTS {
        let email = format!("{}.{}@university.edu", first_name.to_lowercase(), last_name.to_lowercase());
        store.insert(
            "students",
            [
                ("id", DatabaseValue::from(id)),
                ("first_name", first_name.into()),
                ("last_name", last_name.into()),
                ("email", email.into()),
            ],
        )?;
        store.insert(
            "student_profiles",
            [
                ("student_id", DatabaseValue::from(id)),
                ("bio", format!("{} {} studies here", first_name, last_name).into()),
                ("date_of_birth", NaiveDate::from_ymd_opt(2000 + id as i32 % 4, (id as u32 % 12) + 1, 15).into()),
                ("phone_number", format!("+1-555-010{}", id).into()),
                ("address", format!("{} Campus Road", id * 10).into()),
            ],
        )?;
    }

    for (course_id, student_id) in ENROLLMENTS {
        store.insert(
            "course_students",
            [("course_id", DatabaseValue::from(course_id)), ("student_id", student_id.into())],
        )?;
    }

    for (id, course_id, student_id, rating, content) in REVIEWS {
        let created_at = NaiveDate::from_ymd_opt(2024, 3, id as u32)
            .and_then(|day| day.and_hms_opt(9, 30, 0))
            .map(|moment| moment.and_utc());
        store.insert(
            "reviews",
            [
                ("id", DatabaseValue::from(id)),
                ("content", content.into()),
                ("rating", rating.into()),
                ("created_at", created_at.into()),
                ("course_id", course_id.into()),
                ("student_id", student_id.into()),
            ],
        )?;
    }

    tracing::debug!(
        departments = DEPARTMENT_COUNT,
        courses = COURSE_COUNT,
        students = STUDENT_COUNT,
        reviews = REVIEW_COUNT,
        "university dataset seeded"
    );
    Ok(())
}

/// A fresh memory store holding the university dataset
pub fn store() -> OrmResult<MemoryStore> {
    let store = MemoryStore::new();
    seed(&store)?;
    Ok(store)
}

/// Courses per department, in department order
pub fn courses_per_department() -> Vec<usize> {
    DEPARTMENTS
        .iter()
        .map(|(id, _, _)| COURSES.iter().filter(|(_, department, _, _)| department == id).count())
        .collect()
}

/// Reviews per course, in course order
pub fn reviews_per_course() -> Vec<usize> {
    COURSES
        .iter()
        .map(|(id, _, _, _)| REVIEWS.iter().filter(|(_, course, _, _, _)| course == id).count())
        .collect()
}

/// Students per course, in course order
pub fn students_per_course() -> Vec<usize> {
    COURSES
        .iter()
        .map(|(id, _, _, _)| ENROLLMENTS.iter().filter(|(course, _)| course == id).count())
        .collect()
}
