//! Core domain types and the storage seams the services depend on.

pub mod entities;
pub mod repositories;
pub mod value_objects;
