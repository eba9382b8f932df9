//! Relationships Module - loaded entities and the state of their relationship attributes

pub mod containers;
pub mod entity;

#[cfg(test)]
pub mod lazy_loading_tests;

pub use containers::{LazyHandle, Related, Relation};
pub use entity::Entity;
