use thiserror::Error;

use super::query_space::QuerySpaceUid;
use crate::mapping_catalog::MappingError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadPlanBuildError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Query space {0} is not part of this load plan")]
    UnknownQuerySpace(QuerySpaceUid),

    #[error("Query space {uid} cannot own fetches: {reason}")]
    NotAFetchSource { uid: QuerySpaceUid, reason: String },

    #[error("No association `{attribute}` on {owner}")]
    UnknownAttribute { owner: String, attribute: String },

    #[error("Attribute `{attribute}` of {owner} cannot be fetched: {reason}")]
    UnsupportedFetch {
        owner: String,
        attribute: String,
        reason: String,
    },

    #[error("Join columns do not line up: {lhs} left-hand columns vs {rhs} right-hand columns")]
    JoinColumnMismatch { lhs: usize, rhs: usize },

    #[error("Failed to read load plan definition: {0}")]
    DefinitionReadError(String),

    #[error("Failed to parse load plan definition: {0}")]
    DefinitionParseError(String),

    #[error("Invalid load plan definition: {0}")]
    InvalidDefinition(String),
}
