//! Fetch processing.
//!
//! Walks the fetch graph of a return after join rendering and contributes, for
//! every joined fetch, its SELECT columns, its ORDER BY entries and a reader
//! descriptor. Aliases are only looked up here; a fetch whose query space was
//! never aliased by the join renderer is a compile error.
//!
//! Per fetch kind:
//! - composite: nothing of its own, its nested fetches are processed
//! - entity: entity columns, identifier fetches, reader, then nested fetches
//! - collection: collection reader, collection columns (and element entity
//!   columns), orderings, then the element graph's fetches

use super::alias_resolver::{AliasRegistry, CollectionReferenceAliases, EntityReferenceAliases};
use super::errors::LoadPlanCompileError;
use super::join_renderer::require_space;
use super::reader::{CollectionReader, EntityReader, ReaderCollector, ReaderDescriptor};
use super::select_statement::SelectStatementBuilder;
use crate::load_plan::{
    CollectionFetch, CollectionGraph, CollectionGraphKind, EntityFetch, Fetch, FetchSource,
    QuerySpaceUid, QuerySpaces,
};
use crate::mapping_catalog::{CollectionMapping, EntityMapping};
use std::sync::Arc;

/// Facts gathered while processing fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// A skipped fetch will be loaded later by a subselect re-running this query.
    pub has_deferred_subselect_fetch: bool,
    /// Roles of the collections fetched by this statement, in visitation order.
    pub joined_collection_roles: Vec<String>,
}

impl FetchStats {
    fn absorb(&mut self, other: FetchStats) {
        self.has_deferred_subselect_fetch |= other.has_deferred_subselect_fetch;
        self.joined_collection_roles.extend(other.joined_collection_roles);
    }
}

/// Result of processing one fetch source on its own.
#[derive(Debug, Clone, Default)]
pub struct ProcessedFetches {
    pub select_fragment: String,
    pub order_by_fragment: String,
    pub readers: Vec<ReaderDescriptor>,
    pub stats: FetchStats,
}

/// Where a collection's own reader goes and what it attaches to.
pub(crate) struct CollectionTarget<'g> {
    pub uid: QuerySpaceUid,
    pub owner: Option<QuerySpaceUid>,
    pub path: &'g str,
    pub element_graph: Option<&'g CollectionGraph>,
    pub index_graph: Option<&'g CollectionGraph>,
}

pub struct FetchProcessor<'a> {
    query_spaces: &'a QuerySpaces,
    joined_fetches_only: bool,
}

impl<'a> FetchProcessor<'a> {
    /// With `joined_fetches_only` unset, non-join fetches whose space was
    /// nevertheless joined in the query space graph are read from this statement
    /// as well.
    pub fn new(query_spaces: &'a QuerySpaces, joined_fetches_only: bool) -> Self {
        Self {
            query_spaces,
            joined_fetches_only,
        }
    }

    /// Process the fetches of `source` into fresh fragments.
    pub fn process(
        &self,
        source: &dyn FetchSource,
        registry: &mut AliasRegistry,
    ) -> Result<ProcessedFetches, LoadPlanCompileError> {
        let mut statement = SelectStatementBuilder::new();
        let mut readers = ReaderCollector::new();
        let stats = self.process_into(source, registry, &mut statement, &mut readers)?;
        Ok(ProcessedFetches {
            select_fragment: statement.select_fragment().to_string(),
            order_by_fragment: statement.order_by_fragment().to_string(),
            readers: readers.into_readers(),
            stats,
        })
    }

    /// Process identifier fetches, then fetches, of `source` into `statement` and `readers`.
    pub fn process_into(
        &self,
        source: &dyn FetchSource,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
    ) -> Result<FetchStats, LoadPlanCompileError> {
        let mut stats = FetchStats::default();
        for fetch in source.identifier_fetches() {
            self.process_fetch(source, fetch, registry, statement, readers, &mut stats)?;
        }
        for fetch in source.fetches() {
            self.process_fetch(source, fetch, registry, statement, readers, &mut stats)?;
        }
        Ok(stats)
    }

    fn process_fetch(
        &self,
        source: &dyn FetchSource,
        fetch: &Fetch,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
        stats: &mut FetchStats,
    ) -> Result<(), LoadPlanCompileError> {
        let strategy = fetch.strategy();
        if !strategy.is_join_fetched() {
            let joined_anyway =
                !self.joined_fetches_only && registry.is_aliased(fetch.query_space_uid());
            if !joined_anyway {
                if strategy.is_deferred_subselect() {
                    stats.has_deferred_subselect_fetch = true;
                }
                log::debug!(
                    "Skipping {:?} fetch {} of {}",
                    strategy.style,
                    fetch.property_path(),
                    source.query_space_uid()
                );
                return Ok(());
            }
            log::warn!(
                "{:?} fetch {} has a joined space {}; reading it from this statement",
                strategy.style,
                fetch.property_path(),
                fetch.query_space_uid()
            );
        }

        match fetch {
            Fetch::Composite(composite) => {
                let nested = self.process_into(composite, registry, statement, readers)?;
                stats.absorb(nested);
                Ok(())
            }
            Fetch::Entity(entity) => {
                self.process_entity_fetch(source, entity, registry, statement, readers, stats)
            }
            Fetch::Collection(collection) => {
                self.process_collection_fetch(
                    source, collection, registry, statement, readers, stats,
                )
            }
        }
    }

    fn entity_mapping(
        &self,
        uid: QuerySpaceUid,
    ) -> Result<&'a Arc<dyn EntityMapping>, LoadPlanCompileError> {
        let space = require_space(self.query_spaces, uid)?;
        space
            .entity_mapping()
            .ok_or(LoadPlanCompileError::UnexpectedQuerySpaceKind {
                uid,
                expected: "entity",
                found: space.kind().name(),
            })
    }

    pub(crate) fn collection_mapping(
        &self,
        uid: QuerySpaceUid,
    ) -> Result<&'a Arc<dyn CollectionMapping>, LoadPlanCompileError> {
        let space = require_space(self.query_spaces, uid)?;
        space
            .collection_mapping()
            .ok_or(LoadPlanCompileError::UnexpectedQuerySpaceKind {
                uid,
                expected: "collection",
                found: space.kind().name(),
            })
    }

    fn process_entity_fetch(
        &self,
        source: &dyn FetchSource,
        fetch: &EntityFetch,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
        stats: &mut FetchStats,
    ) -> Result<(), LoadPlanCompileError> {
        let mapping = self.entity_mapping(fetch.uid)?;
        let aliases = registry.require_entity_aliases(fetch.uid)?.clone();
        statement.append_select_clause_fragment(
            &mapping.select_fragment(&aliases.table_alias, &aliases.column_suffix),
        );

        for identifier_fetch in &fetch.identifier_fetches {
            self.process_fetch(fetch, identifier_fetch, registry, statement, readers, stats)?;
        }

        readers.add(ReaderDescriptor::Entity(EntityReader {
            uid: fetch.uid,
            entity_name: mapping.entity_name().to_string(),
            owner: Some(source.query_space_uid()),
            attribute_path: fetch.path.clone(),
            aliases,
        }));

        for nested in &fetch.fetches {
            self.process_fetch(fetch, nested, registry, statement, readers, stats)?;
        }
        Ok(())
    }

    fn process_collection_fetch(
        &self,
        source: &dyn FetchSource,
        fetch: &CollectionFetch,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
        stats: &mut FetchStats,
    ) -> Result<(), LoadPlanCompileError> {
        let target = CollectionTarget {
            uid: fetch.uid,
            owner: Some(source.query_space_uid()),
            path: &fetch.path,
            element_graph: fetch.element_graph.as_ref(),
            index_graph: fetch.index_graph.as_ref(),
        };
        let aliases = registry.require_collection_aliases(fetch.uid)?.clone();
        readers.add(self.collection_reader(&target, aliases.clone())?);
        self.process_collection_body(&target, &aliases, registry, statement, readers, stats)
    }

    pub(crate) fn collection_reader(
        &self,
        target: &CollectionTarget<'_>,
        aliases: CollectionReferenceAliases,
    ) -> Result<ReaderDescriptor, LoadPlanCompileError> {
        let collection = self.collection_mapping(target.uid)?;
        Ok(ReaderDescriptor::Collection(CollectionReader {
            uid: target.uid,
            role: collection.role().to_string(),
            owner: target.owner,
            attribute_path: target.path.to_string(),
            aliases,
        }))
    }

    /// Everything of a collection except its own reader: columns, orderings,
    /// element (and index) readers and the element graph's fetches.
    pub(crate) fn process_collection_body(
        &self,
        target: &CollectionTarget<'_>,
        aliases: &CollectionReferenceAliases,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
        stats: &mut FetchStats,
    ) -> Result<(), LoadPlanCompileError> {
        let collection = self.collection_mapping(target.uid)?;
        stats.joined_collection_roles.push(collection.role().to_string());

        let entity_element = match target.element_graph {
            Some(graph) if graph.kind == CollectionGraphKind::Entity => {
                let element_aliases = aliases.entity_element_aliases.clone().ok_or(
                    LoadPlanCompileError::UnresolvedAlias { uid: graph.uid },
                )?;
                Some((graph, element_aliases))
            }
            _ => None,
        };
        let needs_element_join = collection.is_one_to_many() || collection.is_many_to_many();
        if needs_element_join && entity_element.is_none() {
            return Err(LoadPlanCompileError::MissingElementJoin {
                uid: target.uid,
                role: collection.role().to_string(),
            });
        }

        if collection.is_many_to_many() {
            let junction_alias = aliases.collection_table_alias();
            let element_alias = aliases.element_table_alias();
            statement.append_select_clause_fragment(
                &collection.select_fragment(junction_alias, &aliases.collection_suffix),
            );
            if let Some((graph, element_aliases)) = &entity_element {
                self.append_element_entity(
                    graph,
                    element_aliases,
                    target.uid,
                    registry,
                    statement,
                    readers,
                )?;
            }
            statement
                .append_order_by_fragment(&collection.many_to_many_order_by_string(element_alias));
            statement.append_order_by_fragment(&collection.order_by_string(junction_alias));
        } else {
            let element_alias = aliases.element_table_alias();
            statement.append_select_clause_fragment(
                &collection.select_fragment(element_alias, &aliases.collection_suffix),
            );
            if let Some((graph, element_aliases)) = &entity_element {
                self.append_element_entity(
                    graph,
                    element_aliases,
                    target.uid,
                    registry,
                    statement,
                    readers,
                )?;
            }
            statement.append_order_by_fragment(&collection.order_by_string(element_alias));
        }

        if let Some(graph) = target.element_graph {
            let nested = self.process_into(graph, registry, statement, readers)?;
            stats.absorb(nested);
        }
        if let Some(graph) = target.index_graph {
            self.process_index_graph(graph, target.uid, registry, statement, readers, stats)?;
        }
        Ok(())
    }

    fn append_element_entity(
        &self,
        graph: &CollectionGraph,
        element_aliases: &EntityReferenceAliases,
        collection_uid: QuerySpaceUid,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
    ) -> Result<(), LoadPlanCompileError> {
        let element = self.entity_mapping(graph.uid)?;
        statement.append_select_clause_fragment(
            &element.select_fragment(&element_aliases.table_alias, &element_aliases.column_suffix),
        );
        registry.register_entity_aliases(graph.uid, element_aliases.clone())?;
        readers.add(ReaderDescriptor::Entity(EntityReader {
            uid: graph.uid,
            entity_name: element.entity_name().to_string(),
            owner: Some(collection_uid),
            attribute_path: graph.path.clone(),
            aliases: element_aliases.clone(),
        }));
        Ok(())
    }

    /// Entity map keys: columns and reader, then their own fetches.
    fn process_index_graph(
        &self,
        graph: &CollectionGraph,
        collection_uid: QuerySpaceUid,
        registry: &mut AliasRegistry,
        statement: &mut SelectStatementBuilder,
        readers: &mut ReaderCollector,
        stats: &mut FetchStats,
    ) -> Result<(), LoadPlanCompileError> {
        if graph.kind != CollectionGraphKind::Entity {
            return Ok(());
        }
        let index = self.entity_mapping(graph.uid)?;
        let aliases = registry.require_entity_aliases(graph.uid)?.clone();
        statement.append_select_clause_fragment(
            &index.select_fragment(&aliases.table_alias, &aliases.column_suffix),
        );
        readers.add(ReaderDescriptor::Entity(EntityReader {
            uid: graph.uid,
            entity_name: index.entity_name().to_string(),
            owner: Some(collection_uid),
            attribute_path: graph.path.clone(),
            aliases,
        }));
        let nested = self.process_into(graph, registry, statement, readers)?;
        stats.absorb(nested);
        Ok(())
    }
}
