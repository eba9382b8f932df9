//! Seed datasets for the memory store, shared by tests and the CLI demo

pub mod parent_child;
pub mod university;
