//! Returns and fetches.
//!
//! Returns are the roots of a load; fetches are the associations that must be
//! materialized into object attributes along with them. Each fetch references the
//! query space it selects from. Only fetches with the `join` style contribute SQL
//! to the statement being compiled; the rest are loaded by follow-up statements.

use serde::{Deserialize, Serialize};

use super::query_space::QuerySpaceUid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStyle {
    /// Fetched in the same statement through an outer join.
    #[default]
    Join,
    /// Fetched by a separate select per owner.
    Select,
    /// Fetched by one select re-running the owning query as a subquery.
    Subselect,
    /// Fetched by a select over a batch of owner keys.
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTiming {
    #[default]
    Immediate,
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchStrategy {
    #[serde(default)]
    pub style: FetchStyle,
    #[serde(default)]
    pub timing: FetchTiming,
}

impl FetchStrategy {
    pub const fn new(style: FetchStyle, timing: FetchTiming) -> Self {
        Self { style, timing }
    }

    /// Immediate join fetch.
    pub const fn joined() -> Self {
        Self::new(FetchStyle::Join, FetchTiming::Immediate)
    }

    pub fn is_join_fetched(&self) -> bool {
        self.style == FetchStyle::Join
    }

    /// Subselect fetch that runs after the owning statement.
    pub fn is_deferred_subselect(&self) -> bool {
        self.style == FetchStyle::Subselect && self.timing != FetchTiming::Immediate
    }
}

/// Anything that owns fetches.
pub trait FetchSource {
    fn query_space_uid(&self) -> QuerySpaceUid;

    /// Attribute path from the load's root (empty for a root return).
    fn property_path(&self) -> &str;

    fn fetches(&self) -> &[Fetch];

    /// Fetches of associations inside a composite identifier.
    fn identifier_fetches(&self) -> &[Fetch] {
        &[]
    }
}

#[derive(Debug, Clone)]
pub enum Fetch {
    Entity(EntityFetch),
    Collection(CollectionFetch),
    Composite(CompositeFetch),
}

impl Fetch {
    pub fn attribute_name(&self) -> &str {
        match self {
            Fetch::Entity(fetch) => &fetch.attribute,
            Fetch::Collection(fetch) => &fetch.attribute,
            Fetch::Composite(fetch) => &fetch.attribute,
        }
    }

    pub fn query_space_uid(&self) -> QuerySpaceUid {
        match self {
            Fetch::Entity(fetch) => fetch.uid,
            Fetch::Collection(fetch) => fetch.uid,
            Fetch::Composite(fetch) => fetch.uid,
        }
    }

    pub fn strategy(&self) -> FetchStrategy {
        match self {
            Fetch::Entity(fetch) => fetch.strategy,
            Fetch::Collection(fetch) => fetch.strategy,
            Fetch::Composite(fetch) => fetch.strategy,
        }
    }

    pub fn property_path(&self) -> &str {
        match self {
            Fetch::Entity(fetch) => &fetch.path,
            Fetch::Collection(fetch) => &fetch.path,
            Fetch::Composite(fetch) => &fetch.path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityFetch {
    pub attribute: String,
    pub uid: QuerySpaceUid,
    pub strategy: FetchStrategy,
    pub path: String,
    pub identifier_fetches: Vec<Fetch>,
    pub fetches: Vec<Fetch>,
}

impl FetchSource for EntityFetch {
    fn query_space_uid(&self) -> QuerySpaceUid {
        self.uid
    }

    fn property_path(&self) -> &str {
        &self.path
    }

    fn fetches(&self) -> &[Fetch] {
        &self.fetches
    }

    fn identifier_fetches(&self) -> &[Fetch] {
        &self.identifier_fetches
    }
}

/// Embedded value; selects nothing itself, only carries nested fetches.
#[derive(Debug, Clone)]
pub struct CompositeFetch {
    pub attribute: String,
    pub uid: QuerySpaceUid,
    pub strategy: FetchStrategy,
    pub path: String,
    pub fetches: Vec<Fetch>,
}

impl FetchSource for CompositeFetch {
    fn query_space_uid(&self) -> QuerySpaceUid {
        self.uid
    }

    fn property_path(&self) -> &str {
        &self.path
    }

    fn fetches(&self) -> &[Fetch] {
        &self.fetches
    }
}

#[derive(Debug, Clone)]
pub struct CollectionFetch {
    pub attribute: String,
    pub uid: QuerySpaceUid,
    pub strategy: FetchStrategy,
    pub path: String,
    pub element_graph: Option<CollectionGraph>,
    pub index_graph: Option<CollectionGraph>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionGraphKind {
    Entity,
    Composite,
}

/// The element (or index) side of a collection: an entity or a composite value.
#[derive(Debug, Clone)]
pub struct CollectionGraph {
    pub uid: QuerySpaceUid,
    pub kind: CollectionGraphKind,
    pub path: String,
    pub fetches: Vec<Fetch>,
}

impl FetchSource for CollectionGraph {
    fn query_space_uid(&self) -> QuerySpaceUid {
        self.uid
    }

    fn property_path(&self) -> &str {
        &self.path
    }

    fn fetches(&self) -> &[Fetch] {
        &self.fetches
    }
}

#[derive(Debug, Clone)]
pub struct EntityReturn {
    pub uid: QuerySpaceUid,
    pub identifier_fetches: Vec<Fetch>,
    pub fetches: Vec<Fetch>,
}

impl FetchSource for EntityReturn {
    fn query_space_uid(&self) -> QuerySpaceUid {
        self.uid
    }

    fn property_path(&self) -> &str {
        ""
    }

    fn fetches(&self) -> &[Fetch] {
        &self.fetches
    }

    fn identifier_fetches(&self) -> &[Fetch] {
        &self.identifier_fetches
    }
}

/// Root collection, used when initializing one collection (by owner key).
#[derive(Debug, Clone)]
pub struct CollectionReturn {
    pub uid: QuerySpaceUid,
    pub element_graph: Option<CollectionGraph>,
    pub index_graph: Option<CollectionGraph>,
}

#[derive(Debug, Clone)]
pub enum Return {
    Entity(EntityReturn),
    Collection(CollectionReturn),
}

impl Return {
    pub fn query_space_uid(&self) -> QuerySpaceUid {
        match self {
            Return::Entity(entity) => entity.uid,
            Return::Collection(collection) => collection.uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_yaml() {
        let strategy: FetchStrategy =
            serde_yaml::from_str("style: subselect\ntiming: delayed").unwrap();
        assert!(strategy.is_deferred_subselect());
        assert!(!strategy.is_join_fetched());

        let defaulted: FetchStrategy = serde_yaml::from_str("{}").unwrap();
        assert_eq!(defaulted, FetchStrategy::joined());
    }

    #[test]
    fn test_immediate_subselect_is_not_deferred() {
        let strategy = FetchStrategy::new(FetchStyle::Subselect, FetchTiming::Immediate);
        assert!(!strategy.is_deferred_subselect());
    }
}
