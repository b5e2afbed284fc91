//! Load plans: what a load must retrieve.
//!
//! A [`LoadPlan`] pairs the query-space graph (tables and the joins between them)
//! with the returns and fetches that say which of those spaces are materialized
//! into objects. Plans are built once, then compiled any number of times.

pub mod builder;
pub mod definition;
pub mod errors;
pub mod fetch;
pub mod query_space;

pub use builder::LoadPlanBuilder;
pub use definition::{FetchDefinition, LoadPlanDefinition, ReturnDefinition};
pub use errors::LoadPlanBuildError;
pub use fetch::{
    CollectionFetch, CollectionGraph, CollectionGraphKind, CollectionReturn, CompositeFetch,
    EntityFetch, EntityReturn, Fetch, FetchSource, FetchStrategy, FetchStyle, FetchTiming, Return,
};
pub use query_space::{
    Join, JoinId, JoinRole, QuerySpace, QuerySpaceKind, QuerySpaceUid, QuerySpaces,
};

#[derive(Debug, Clone)]
pub struct LoadPlan {
    query_spaces: QuerySpaces,
    returns: Vec<Return>,
}

impl LoadPlan {
    pub fn new(query_spaces: QuerySpaces, returns: Vec<Return>) -> Self {
        Self {
            query_spaces,
            returns,
        }
    }

    pub fn query_spaces(&self) -> &QuerySpaces {
        &self.query_spaces
    }

    pub fn returns(&self) -> &[Return] {
        &self.returns
    }

    /// Query spaces of the returns, in declaration order.
    pub fn root_uids(&self) -> impl Iterator<Item = QuerySpaceUid> + '_ {
        self.returns.iter().map(Return::query_space_uid)
    }
}
