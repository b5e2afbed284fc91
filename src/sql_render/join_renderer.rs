//! Join rendering.
//!
//! Walks the joins of a query space depth-first, allocating aliases through the
//! [`AliasRegistry`] and emitting one SQL join per rendered edge into a dialect
//! [`JoinFragment`]:
//! - composite spaces emit nothing and delegate to their owner's alias
//! - the element join of a one-to-many collection is skipped, the collection
//!   join already reaches the element table
//! - many-to-many element joins and entity index joins reuse the aliases the
//!   collection join pre-registered
//! - collection joins are always left outer joins

use super::alias_resolver::AliasRegistry;
use super::errors::LoadPlanCompileError;
use crate::dialect::{Dialect, JoinFragment, JoinType};
use crate::load_plan::{Join, JoinRole, QuerySpace, QuerySpaceKind, QuerySpaceUid, QuerySpaces};
use crate::mapping_catalog::{CollectionMapping, EnabledFilters, EntityMapping};

/// Merge a mapping's restriction with a join's explicit `with` conditions.
pub fn merge_additional_conditions(filter: &str, with_clause: &str) -> String {
    match (filter.is_empty(), with_clause.is_empty()) {
        (true, true) => String::new(),
        (false, true) => filter.to_string(),
        (true, false) => with_clause.to_string(),
        (false, false) => format!("{filter} and {with_clause}"),
    }
}

/// The right-hand side of an emitted join.
#[derive(Clone, Copy)]
enum Joinable<'m> {
    Entity(&'m dyn EntityMapping),
    Collection(&'m dyn CollectionMapping),
}

impl Joinable<'_> {
    fn table_name(&self) -> &str {
        match self {
            Joinable::Entity(mapping) => mapping.table_name(),
            Joinable::Collection(mapping) => mapping.table_name(),
        }
    }

    fn filter_fragment(&self, alias: &str, enabled_filters: &EnabledFilters) -> String {
        match self {
            Joinable::Entity(mapping) => mapping.filter_fragment(alias, enabled_filters),
            Joinable::Collection(mapping) => mapping.filter_fragment(alias, enabled_filters),
        }
    }

    fn from_join_fragment(&self, alias: &str) -> String {
        match self {
            Joinable::Entity(mapping) => mapping.from_join_fragment(alias, false, true),
            Joinable::Collection(mapping) => mapping.from_join_fragment(alias, false, true),
        }
    }

    fn where_join_fragment(&self, alias: &str) -> String {
        match self {
            Joinable::Entity(mapping) => mapping.where_join_fragment(alias, false, true),
            Joinable::Collection(mapping) => mapping.where_join_fragment(alias, false, true),
        }
    }
}

/// Which filter restricts the joined rows.
#[derive(Clone, Copy)]
enum Restriction<'m> {
    /// The joined mapping's own `where` and filters.
    Own,
    /// The many-to-many filter of the collection owning the element join.
    ManyToMany(&'m dyn CollectionMapping),
}

pub(crate) fn require_space(
    query_spaces: &QuerySpaces,
    uid: QuerySpaceUid,
) -> Result<&QuerySpace, LoadPlanCompileError> {
    query_spaces
        .get(uid)
        .ok_or(LoadPlanCompileError::UnknownQuerySpace { uid })
}

pub struct JoinRenderer<'a> {
    query_spaces: &'a QuerySpaces,
    enabled_filters: &'a EnabledFilters,
}

impl<'a> JoinRenderer<'a> {
    pub fn new(query_spaces: &'a QuerySpaces, enabled_filters: &'a EnabledFilters) -> Self {
        Self {
            query_spaces,
            enabled_filters,
        }
    }

    /// Render every join reachable from `root`; returns the FROM and WHERE fragments.
    ///
    /// The root itself must already be aliased.
    pub fn render(
        &self,
        root: QuerySpaceUid,
        registry: &mut AliasRegistry,
        dialect: &dyn Dialect,
    ) -> Result<(String, String), LoadPlanCompileError> {
        log::debug!(
            "Processing query space {}",
            require_space(self.query_spaces, root)?.describe()
        );
        let mut fragment = dialect.create_outer_join_fragment();
        self.render_into(root, registry, fragment.as_mut())?;
        Ok((
            fragment.to_from_fragment_string(),
            fragment.to_where_fragment_string(),
        ))
    }

    /// Render the joins of `uid` and, depth-first, of everything they reach.
    pub fn render_into(
        &self,
        uid: QuerySpaceUid,
        registry: &mut AliasRegistry,
        fragment: &mut dyn JoinFragment,
    ) -> Result<(), LoadPlanCompileError> {
        require_space(self.query_spaces, uid)?;
        for join in self.query_spaces.joins_of(uid) {
            self.render_join(join, registry, fragment)?;
            self.render_into(join.rhs, registry, fragment)?;
        }
        Ok(())
    }

    fn render_join(
        &self,
        join: &'a Join,
        registry: &mut AliasRegistry,
        fragment: &mut dyn JoinFragment,
    ) -> Result<(), LoadPlanCompileError> {
        let lhs_alias = registry.require_table_alias(join.lhs)?.to_string();
        let rhs = require_space(self.query_spaces, join.rhs)?;

        match rhs.kind() {
            QuerySpaceKind::Composite => {
                log::debug!("Composite {} ({}) resolves to {lhs_alias}", join.rhs, join.role);
                registry.register_composite_delegation(join.rhs, &lhs_alias)
            }
            QuerySpaceKind::Entity(entity) => {
                let lhs = require_space(self.query_spaces, join.lhs)?;
                match lhs.collection_mapping() {
                    Some(collection)
                        if collection.is_many_to_many() || join.is_collection_index() =>
                    {
                        self.render_collection_entity_join(
                            join,
                            collection.as_ref(),
                            entity.as_ref(),
                            &lhs_alias,
                            registry,
                            fragment,
                        )
                    }
                    Some(collection) => {
                        log::debug!(
                            "Skipping element join of {}: the collection join reaches {}",
                            collection.role(),
                            entity.table_name()
                        );
                        Ok(())
                    }
                    None => {
                        registry.resolve_or_create_entity_aliases(join.rhs, entity.as_ref())?;
                        self.add_join(
                            join,
                            Joinable::Entity(entity.as_ref()),
                            JoinType::for_required(join.required),
                            Restriction::Own,
                            &lhs_alias,
                            registry,
                            fragment,
                        )
                    }
                }
            }
            QuerySpaceKind::Collection(collection) => {
                let collection = collection.as_ref();
                self.render_collection_join(join, collection, &lhs_alias, registry, fragment)
            }
        }
    }

    /// Element entity of a many-to-many collection, or an entity map key.
    ///
    /// The aliases were registered when the collection join was rendered. The
    /// element join is restricted by the collection's many-to-many filter rather
    /// than by the element entity's own filter.
    fn render_collection_entity_join(
        &self,
        join: &Join,
        collection: &dyn CollectionMapping,
        entity: &dyn EntityMapping,
        lhs_alias: &str,
        registry: &mut AliasRegistry,
        fragment: &mut dyn JoinFragment,
    ) -> Result<(), LoadPlanCompileError> {
        let restriction = if join.role == JoinRole::CollectionElements {
            Restriction::ManyToMany(collection)
        } else {
            Restriction::Own
        };
        self.add_join(
            join,
            Joinable::Entity(entity),
            JoinType::for_required(join.required),
            restriction,
            lhs_alias,
            registry,
            fragment,
        )
    }

    fn render_collection_join(
        &self,
        join: &Join,
        collection: &dyn CollectionMapping,
        lhs_alias: &str,
        registry: &mut AliasRegistry,
        fragment: &mut dyn JoinFragment,
    ) -> Result<(), LoadPlanCompileError> {
        let (element_join, index_join) = self.locate_collection_joins(join.rhs, collection)?;

        let element_uid = if collection.is_one_to_many() || collection.is_many_to_many() {
            let element_join = element_join.ok_or_else(|| LoadPlanCompileError::MissingElementJoin {
                uid: join.rhs,
                role: collection.role().to_string(),
            })?;
            Some(element_join.rhs)
        } else {
            None
        };
        registry.resolve_or_create_collection_aliases(join.rhs, collection, element_uid)?;

        if collection.has_entity_index() {
            let index_join = index_join.ok_or_else(|| LoadPlanCompileError::MissingIndexJoin {
                uid: join.rhs,
                role: collection.role().to_string(),
            })?;
            let index_space = require_space(self.query_spaces, index_join.rhs)?;
            let index_entity = index_space.entity_mapping().ok_or(
                LoadPlanCompileError::UnexpectedQuerySpaceKind {
                    uid: index_join.rhs,
                    expected: "entity",
                    found: index_space.kind().name(),
                },
            )?;
            registry.resolve_or_create_entity_aliases(index_join.rhs, index_entity.as_ref())?;
        }

        self.add_join(
            join,
            Joinable::Collection(collection),
            JoinType::LeftOuter,
            Restriction::Own,
            lhs_alias,
            registry,
            fragment,
        )
    }

    /// The element and index joins under a collection space; at most one of each.
    fn locate_collection_joins(
        &self,
        collection_uid: QuerySpaceUid,
        collection: &dyn CollectionMapping,
    ) -> Result<(Option<&'a Join>, Option<&'a Join>), LoadPlanCompileError> {
        let mut element_join = None;
        let mut index_join = None;
        for join in self.query_spaces.joins_of(collection_uid) {
            let (slot, name) = match join.role {
                JoinRole::CollectionElements => (&mut element_join, "element"),
                JoinRole::CollectionIndex => (&mut index_join, "index"),
                _ => continue,
            };
            if slot.is_some() {
                return Err(LoadPlanCompileError::DuplicateCollectionJoin {
                    uid: collection_uid,
                    role: collection.role().to_string(),
                    join_role: name.to_string(),
                });
            }
            *slot = Some(join);
        }
        Ok((element_join, index_join))
    }

    #[allow(clippy::too_many_arguments)]
    fn add_join(
        &self,
        join: &Join,
        joinable: Joinable<'_>,
        join_type: JoinType,
        restriction: Restriction<'_>,
        lhs_alias: &str,
        registry: &AliasRegistry,
        fragment: &mut dyn JoinFragment,
    ) -> Result<(), LoadPlanCompileError> {
        let rhs_alias = registry
            .lookup_table_alias(join.rhs)
            .filter(|alias| !alias.is_empty())
            .ok_or(LoadPlanCompileError::EmptyTableAlias { uid: join.rhs })?;

        let filter = match restriction {
            Restriction::Own => joinable.filter_fragment(rhs_alias, self.enabled_filters),
            Restriction::ManyToMany(collection) => {
                collection.many_to_many_filter_fragment(rhs_alias, self.enabled_filters)
            }
        };
        let with_conditions = join.additional_conditions(rhs_alias);
        let additional = merge_additional_conditions(&filter, &with_conditions);

        log::debug!(
            "{join_type} {} {rhs_alias} for {} ({})",
            joinable.table_name(),
            require_space(self.query_spaces, join.rhs)?.describe(),
            join.role
        );
        fragment.add_join(
            joinable.table_name(),
            rhs_alias,
            &join.resolve_aliased_lhs_columns(lhs_alias),
            join.rhs_columns(),
            join_type,
            &additional,
        );
        fragment.add_joins(
            &joinable.from_join_fragment(rhs_alias),
            &joinable.where_join_fragment(rhs_alias),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", "", ""; "both empty")]
    #[test_case("a.X = 1", "", "a.X = 1"; "filter only")]
    #[test_case("", "a.Y = 2", "a.Y = 2"; "with only")]
    #[test_case("a.X = 1", "a.Y = 2", "a.X = 1 and a.Y = 2"; "filter then with")]
    fn test_merge_additional_conditions(filter: &str, with_clause: &str, expected: &str) {
        assert_eq!(merge_additional_conditions(filter, with_clause), expected);
    }
}
