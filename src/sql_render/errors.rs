use thiserror::Error;

use crate::load_plan::QuerySpaceUid;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadPlanCompileError {
    #[error("Query space {uid} has no table alias yet; its left-hand side must be rendered first")]
    UnresolvedAlias { uid: QuerySpaceUid },

    #[error(
        "Query space {uid} is already aliased as `{existing}`, cannot re-alias as `{attempted}`"
    )]
    AliasConflict {
        uid: QuerySpaceUid,
        existing: String,
        attempted: String,
    },

    #[error("Could not locate the element join of collection {role} ({uid})")]
    MissingElementJoin { uid: QuerySpaceUid, role: String },

    #[error("Could not locate the index join of collection {role} ({uid})")]
    MissingIndexJoin { uid: QuerySpaceUid, role: String },

    #[error("More than one {join_role} join defined for collection {role} ({uid})")]
    DuplicateCollectionJoin {
        uid: QuerySpaceUid,
        role: String,
        join_role: String,
    },

    #[error("Join's right-hand table alias for {uid} cannot be empty")]
    EmptyTableAlias { uid: QuerySpaceUid },

    #[error("Query space {uid} is not part of the load plan")]
    UnknownQuerySpace { uid: QuerySpaceUid },

    #[error("Query space {uid} is a {found}, expected a {expected}")]
    UnexpectedQuerySpaceKind {
        uid: QuerySpaceUid,
        expected: &'static str,
        found: &'static str,
    },
}
