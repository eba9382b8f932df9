//! Entity-type graph: entity definitions, relationship metadata and the
//! registry that validates them as a whole.

pub mod entity;
pub mod metadata;
pub mod registry;

pub use entity::EntityType;
pub use metadata::{Cardinality, FetchType, OwningSide, PivotConfig, RelationshipMetadata, RelationshipType};
pub use registry::{Schema, SchemaBuilder};
