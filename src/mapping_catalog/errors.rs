//! # Mapping Catalog Error Types
//!
//! Errors raised while loading mapping files and resolving entity names,
//! collection roles and attributes against the catalog.
//!
//! Use the context helpers when the caller knows which operation failed:
//!
//! ```ignore
//! MappingError::entity_error_with_context("com.acme.Order", "While resolving fetch path customer")
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    #[error("No entity mapping found for `{entity_name}`")]
    UnknownEntity { entity_name: String },
    #[error("No collection mapping found for role `{role}`")]
    UnknownCollectionRole { role: String },
    #[error("Entity `{entity_name}` has no association `{attribute}`")]
    UnknownAttribute {
        entity_name: String,
        attribute: String,
    },
    #[error("Duplicate mapping for `{name}`")]
    DuplicateMapping { name: String },
    #[error("Failed to read mapping file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse mapping file: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid mapping: {message}")]
    InvalidMapping { message: String },
}

impl MappingError {
    /// An UnknownEntity error whose name carries the operation that needed it
    pub fn entity_error_with_context(entity_name: &str, context: &str) -> Self {
        MappingError::UnknownEntity {
            entity_name: format!("{entity_name} ({context})"),
        }
    }

    /// An InvalidMapping error naming the mapping it was found in
    pub fn invalid_with_context(owner: &str, message: &str) -> Self {
        MappingError::InvalidMapping {
            message: format!("{owner}: {message}"),
        }
    }
}
