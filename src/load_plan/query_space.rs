//! Query-space graph.
//!
//! Every table-backed (or embedded) node a load touches is a [`QuerySpace`]; the
//! edges between them are [`Join`]s. Spaces and joins live in one arena
//! ([`QuerySpaces`]) and refer to each other by index, so the graph can be shared
//! read-only with the compiler without reference cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::errors::LoadPlanBuildError;
use crate::mapping_catalog::{CollectionMapping, EntityMapping};
use crate::utils::sql_naming::{qualify, render_alias_template};

/// Identifier of a query space within one load plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySpaceUid(usize);

impl QuerySpaceUid {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for QuerySpaceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<gen:{}>", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(usize);

#[derive(Debug, Clone)]
pub enum QuerySpaceKind {
    Entity(Arc<dyn EntityMapping>),
    Collection(Arc<dyn CollectionMapping>),
    /// Embedded value or composite identifier; shares its owner's table.
    Composite,
}

impl QuerySpaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuerySpaceKind::Entity(_) => "entity",
            QuerySpaceKind::Collection(_) => "collection",
            QuerySpaceKind::Composite => "composite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuerySpace {
    uid: QuerySpaceUid,
    kind: QuerySpaceKind,
    joins: Vec<JoinId>,
}

impl QuerySpace {
    pub fn uid(&self) -> QuerySpaceUid {
        self.uid
    }

    pub fn kind(&self) -> &QuerySpaceKind {
        &self.kind
    }

    pub fn entity_mapping(&self) -> Option<&Arc<dyn EntityMapping>> {
        match &self.kind {
            QuerySpaceKind::Entity(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn collection_mapping(&self) -> Option<&Arc<dyn CollectionMapping>> {
        match &self.kind {
            QuerySpaceKind::Collection(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// Entity name, collection role, or `composite`; for log and error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            QuerySpaceKind::Entity(mapping) => format!("{} {}", mapping.entity_name(), self.uid),
            QuerySpaceKind::Collection(mapping) => format!("{} {}", mapping.role(), self.uid),
            QuerySpaceKind::Composite => format!("composite {}", self.uid),
        }
    }
}

/// What a join reaches from its left-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRole {
    /// A named association of an entity or composite.
    Association(String),
    /// The element rows of a collection.
    CollectionElements,
    /// The index (map key) of a collection.
    CollectionIndex,
    /// An association inside a composite identifier.
    Identifier(String),
}

impl fmt::Display for JoinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinRole::Association(attribute) => write!(f, "{attribute}"),
            JoinRole::CollectionElements => write!(f, "<elements>"),
            JoinRole::CollectionIndex => write!(f, "<index>"),
            JoinRole::Identifier(attribute) => write!(f, "<id>.{attribute}"),
        }
    }
}

/// Directed edge between two query spaces.
#[derive(Debug, Clone)]
pub struct Join {
    pub lhs: QuerySpaceUid,
    pub rhs: QuerySpaceUid,
    pub role: JoinRole,
    /// Inner join when true, left outer join otherwise.
    pub required: bool,
    /// Columns of the left-hand table, unqualified.
    pub lhs_columns: Vec<String>,
    /// Columns of the right-hand table, unqualified.
    pub rhs_columns: Vec<String>,
    /// Extra `with` conditions; `{alias}` resolves to the right-hand alias.
    pub with_conditions: Vec<String>,
}

impl Join {
    pub fn resolve_aliased_lhs_columns(&self, lhs_alias: &str) -> Vec<String> {
        qualify(lhs_alias, &self.lhs_columns)
    }

    pub fn rhs_columns(&self) -> &[String] {
        &self.rhs_columns
    }

    /// All `with` conditions rendered for the right-hand alias, conjoined.
    pub fn additional_conditions(&self, rhs_alias: &str) -> String {
        self.with_conditions
            .iter()
            .map(|template| render_alias_template(template, rhs_alias))
            .collect::<Vec<_>>()
            .join(" and ")
    }

    pub fn is_collection_elements(&self) -> bool {
        self.role == JoinRole::CollectionElements
    }

    pub fn is_collection_index(&self) -> bool {
        self.role == JoinRole::CollectionIndex
    }
}

/// Arena of the query spaces and joins of one load plan.
#[derive(Debug, Clone, Default)]
pub struct QuerySpaces {
    spaces: Vec<QuerySpace>,
    joins: Vec<Join>,
}

impl QuerySpaces {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_space(&mut self, kind: QuerySpaceKind) -> QuerySpaceUid {
        let uid = QuerySpaceUid(self.spaces.len());
        log::trace!("New {} query space {uid}", kind.name());
        self.spaces.push(QuerySpace {
            uid,
            kind,
            joins: Vec::new(),
        });
        uid
    }

    pub fn add_entity_space(&mut self, mapping: Arc<dyn EntityMapping>) -> QuerySpaceUid {
        self.add_space(QuerySpaceKind::Entity(mapping))
    }

    pub fn add_collection_space(&mut self, mapping: Arc<dyn CollectionMapping>) -> QuerySpaceUid {
        self.add_space(QuerySpaceKind::Collection(mapping))
    }

    pub fn add_composite_space(&mut self) -> QuerySpaceUid {
        self.add_space(QuerySpaceKind::Composite)
    }

    /// Add a join edge; both ends must already exist and the columns must pair up.
    pub fn add_join(
        &mut self,
        lhs: QuerySpaceUid,
        rhs: QuerySpaceUid,
        role: JoinRole,
        required: bool,
        lhs_columns: Vec<String>,
        rhs_columns: Vec<String>,
    ) -> Result<JoinId, LoadPlanBuildError> {
        self.get(rhs)
            .ok_or(LoadPlanBuildError::UnknownQuerySpace(rhs))?;
        if lhs_columns.len() != rhs_columns.len() {
            return Err(LoadPlanBuildError::JoinColumnMismatch {
                lhs: lhs_columns.len(),
                rhs: rhs_columns.len(),
            });
        }

        let id = JoinId(self.joins.len());
        let lhs_space = self
            .spaces
            .get_mut(lhs.0)
            .ok_or(LoadPlanBuildError::UnknownQuerySpace(lhs))?;
        lhs_space.joins.push(id);
        self.joins.push(Join {
            lhs,
            rhs,
            role,
            required,
            lhs_columns,
            rhs_columns,
            with_conditions: Vec::new(),
        });
        Ok(id)
    }

    /// Attach a `with` condition to the join that reaches `rhs`.
    pub fn add_with_condition(
        &mut self,
        rhs: QuerySpaceUid,
        condition: impl Into<String>,
    ) -> Result<(), LoadPlanBuildError> {
        let join = self
            .joins
            .iter_mut()
            .find(|join| join.rhs == rhs)
            .ok_or(LoadPlanBuildError::UnknownQuerySpace(rhs))?;
        join.with_conditions.push(condition.into());
        Ok(())
    }

    pub fn get(&self, uid: QuerySpaceUid) -> Option<&QuerySpace> {
        self.spaces.get(uid.0)
    }

    /// Outgoing joins of a space, in insertion order.
    pub fn joins_of(&self, uid: QuerySpaceUid) -> impl Iterator<Item = &Join> + '_ {
        self.get(uid)
            .map(|space| space.joins.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.joins.get(id.0))
    }

    /// The join whose right-hand side is `rhs`, if any.
    pub fn join_into(&self, rhs: QuerySpaceUid) -> Option<&Join> {
        self.joins.iter().find(|join| join.rhs == rhs)
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuerySpace> {
        self.spaces.iter()
    }
}
