//! Storegate Core: domain models, error types and repository traits.

pub mod error;
pub mod models;
pub mod repository;
