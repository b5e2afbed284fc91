//! Load query compilation.
//!
//! Drives one compilation of a [`LoadPlan`]: root tables and restrictions, join
//! rendering per root, then fetch processing, and finally statement assembly.
//! The alias registry is owned by the caller for the duration of the call and
//! holds every alias handed out.

use serde::{Deserialize, Serialize};

use super::alias_resolver::AliasRegistry;
use super::errors::LoadPlanCompileError;
use super::fetch_processor::{CollectionTarget, FetchProcessor, FetchStats};
use super::join_renderer::{require_space, JoinRenderer};
use super::reader::{EntityReader, ReaderCollector, ReaderDescriptor};
use super::select_statement::SelectStatementBuilder;
use crate::dialect::Dialect;
use crate::load_plan::{CollectionGraphKind, CollectionReturn, EntityReturn, LoadPlan, Return};
use crate::mapping_catalog::EnabledFilters;

/// Upper bound for `batch_size`; larger key lists should be split by the caller.
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBuildingParameters {
    pub enabled_filters: EnabledFilters,
    /// Number of root keys bound as parameters; `0` loads without key restriction.
    pub batch_size: usize,
    pub joined_fetches_only: bool,
}

impl Default for QueryBuildingParameters {
    fn default() -> Self {
        Self {
            enabled_filters: EnabledFilters::new(),
            batch_size: 0,
            joined_fetches_only: true,
        }
    }
}

impl QueryBuildingParameters {
    pub fn with_filter(mut self, name: impl Into<String>) -> Self {
        self.enabled_filters.insert(name.into());
        self
    }

    /// Capped at [`MAX_BATCH_SIZE`].
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.min(MAX_BATCH_SIZE);
        self
    }

    pub fn with_joined_fetches_only(mut self, joined_fetches_only: bool) -> Self {
        self.joined_fetches_only = joined_fetches_only;
        self
    }
}

/// The compiled SELECT with everything needed to read its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledLoadQuery {
    pub sql: String,
    pub select_fragment: String,
    pub from_fragment: String,
    pub where_fragment: String,
    pub order_by_fragment: String,
    /// One reader per return, in plan order.
    pub returns: Vec<ReaderDescriptor>,
    /// Fetch readers in visitation order.
    pub readers: Vec<ReaderDescriptor>,
    pub has_deferred_subselect_fetch: bool,
    pub joined_collection_roles: Vec<String>,
}

/// Key restriction for `batch_size` keys: `a.ID=?`, `a.ID in (?, ?)`, or
/// `(a.A=? and a.B=?)` groups joined with `or` for composite keys.
/// `batch_size` is capped at [`MAX_BATCH_SIZE`].
pub fn render_key_restriction(
    alias: &str,
    key_columns: &[String],
    batch_size: usize,
) -> Option<String> {
    if batch_size == 0 || key_columns.is_empty() {
        return None;
    }
    let batch_size = batch_size.min(MAX_BATCH_SIZE);
    if let [column] = key_columns {
        return Some(if batch_size == 1 {
            format!("{alias}.{column}=?")
        } else {
            format!("{alias}.{column} in ({})", vec!["?"; batch_size].join(", "))
        });
    }

    let group = format!(
        "({})",
        key_columns
            .iter()
            .map(|column| format!("{alias}.{column}=?"))
            .collect::<Vec<_>>()
            .join(" and ")
    );
    Some(if batch_size == 1 {
        group
    } else {
        format!("({})", vec![group.as_str(); batch_size].join(" or "))
    })
}

/// Compile `plan` with a fresh alias registry.
pub fn compile(
    plan: &LoadPlan,
    params: &QueryBuildingParameters,
    dialect: &dyn Dialect,
) -> Result<CompiledLoadQuery, LoadPlanCompileError> {
    let mut registry = AliasRegistry::new();
    compile_load_query(plan, &mut registry, params, dialect)
}

pub fn compile_load_query(
    plan: &LoadPlan,
    registry: &mut AliasRegistry,
    params: &QueryBuildingParameters,
    dialect: &dyn Dialect,
) -> Result<CompiledLoadQuery, LoadPlanCompileError> {
    let mut compiler = LoadQueryCompiler {
        plan,
        params,
        dialect,
        renderer: JoinRenderer::new(plan.query_spaces(), &params.enabled_filters),
        processor: FetchProcessor::new(plan.query_spaces(), params.joined_fetches_only),
        statement: SelectStatementBuilder::new(),
        returns: ReaderCollector::new(),
        readers: ReaderCollector::new(),
        stats: FetchStats::default(),
    };

    for root in plan.returns() {
        match root {
            Return::Entity(entity_return) => {
                compiler.compile_entity_return(entity_return, registry)?
            }
            Return::Collection(collection_return) => {
                compiler.compile_collection_return(collection_return, registry)?
            }
        }
    }

    let compiled = compiler.finish();
    log::debug!("Compiled load query: {}", compiled.sql);
    Ok(compiled)
}

struct LoadQueryCompiler<'a> {
    plan: &'a LoadPlan,
    params: &'a QueryBuildingParameters,
    dialect: &'a dyn Dialect,
    renderer: JoinRenderer<'a>,
    processor: FetchProcessor<'a>,
    statement: SelectStatementBuilder,
    returns: ReaderCollector,
    readers: ReaderCollector,
    stats: FetchStats,
}

impl LoadQueryCompiler<'_> {
    fn compile_entity_return(
        &mut self,
        root: &EntityReturn,
        registry: &mut AliasRegistry,
    ) -> Result<(), LoadPlanCompileError> {
        let space = require_space(self.plan.query_spaces(), root.uid)?;
        let mapping = space
            .entity_mapping()
            .ok_or(LoadPlanCompileError::UnexpectedQuerySpaceKind {
                uid: root.uid,
                expected: "entity",
                found: space.kind().name(),
            })?;
        let aliases = registry.resolve_or_create_entity_aliases(root.uid, mapping.as_ref())?;
        let alias = aliases.table_alias.as_str();
        log::debug!("Root {} {} as {alias}", mapping.entity_name(), root.uid);

        self.statement
            .append_from_clause(&format!("{} {alias}", mapping.table_name()));
        self.statement.append_outer_joins(
            &mapping.from_join_fragment(alias, true, true),
            &mapping.where_join_fragment(alias, true, true),
        );
        let batch_size = self.params.batch_size;
        if let Some(restriction) = render_key_restriction(alias, mapping.key_columns(), batch_size)
        {
            self.statement.append_restriction(&restriction);
        }
        self.statement
            .append_restriction(&mapping.filter_fragment(alias, &self.params.enabled_filters));
        self.statement
            .append_select_clause_fragment(&mapping.select_fragment(alias, &aliases.column_suffix));
        self.returns.add(ReaderDescriptor::Entity(EntityReader {
            uid: root.uid,
            entity_name: mapping.entity_name().to_string(),
            owner: None,
            attribute_path: String::new(),
            aliases: aliases.clone(),
        }));

        let (from_joins, where_joins) = self.renderer.render(root.uid, registry, self.dialect)?;
        self.statement.append_outer_joins(&from_joins, &where_joins);

        let stats = self
            .processor
            .process_into(root, registry, &mut self.statement, &mut self.readers)?;
        self.absorb(stats);
        Ok(())
    }

    fn compile_collection_return(
        &mut self,
        root: &CollectionReturn,
        registry: &mut AliasRegistry,
    ) -> Result<(), LoadPlanCompileError> {
        let collection = self.processor.collection_mapping(root.uid)?;
        let element_uid = root
            .element_graph
            .as_ref()
            .filter(|graph| graph.kind == CollectionGraphKind::Entity)
            .map(|graph| graph.uid);
        let aliases = registry.resolve_or_create_collection_aliases(
            root.uid,
            collection.as_ref(),
            element_uid,
        )?;
        if let Some(index_graph) = root
            .index_graph
            .as_ref()
            .filter(|graph| graph.kind == CollectionGraphKind::Entity)
        {
            let index_space = require_space(self.plan.query_spaces(), index_graph.uid)?;
            if let Some(index_entity) = index_space.entity_mapping() {
                registry.resolve_or_create_entity_aliases(index_graph.uid, index_entity.as_ref())?;
            }
        }

        let alias = aliases.collection_table_alias();
        log::debug!("Root collection {} {} as {alias}", collection.role(), root.uid);
        self.statement
            .append_from_clause(&format!("{} {alias}", collection.table_name()));
        self.statement.append_outer_joins(
            &collection.from_join_fragment(alias, true, true),
            &collection.where_join_fragment(alias, true, true),
        );
        let batch_size = self.params.batch_size;
        if let Some(restriction) =
            render_key_restriction(alias, collection.key_columns(), batch_size)
        {
            self.statement.append_restriction(&restriction);
        }
        self.statement
            .append_restriction(&collection.filter_fragment(alias, &self.params.enabled_filters));

        let target = CollectionTarget {
            uid: root.uid,
            owner: None,
            path: "",
            element_graph: root.element_graph.as_ref(),
            index_graph: root.index_graph.as_ref(),
        };
        self.returns
            .add(self.processor.collection_reader(&target, aliases.clone())?);

        let (from_joins, where_joins) = self.renderer.render(root.uid, registry, self.dialect)?;
        self.statement.append_outer_joins(&from_joins, &where_joins);

        let mut stats = FetchStats::default();
        self.processor.process_collection_body(
            &target,
            &aliases,
            registry,
            &mut self.statement,
            &mut self.readers,
            &mut stats,
        )?;
        self.absorb(stats);
        Ok(())
    }

    fn absorb(&mut self, stats: FetchStats) {
        self.stats.has_deferred_subselect_fetch |= stats.has_deferred_subselect_fetch;
        self.stats
            .joined_collection_roles
            .extend(stats.joined_collection_roles);
    }

    fn finish(self) -> CompiledLoadQuery {
        CompiledLoadQuery {
            sql: self.statement.to_statement_string(),
            select_fragment: self.statement.select_fragment().to_string(),
            from_fragment: self.statement.from_fragment().to_string(),
            where_fragment: self.statement.where_fragment(),
            order_by_fragment: self.statement.order_by_fragment().to_string(),
            returns: self.returns.into_readers(),
            readers: self.readers.into_readers(),
            has_deferred_subselect_fetch: self.stats.has_deferred_subselect_fetch,
            joined_collection_roles: self.stats.joined_collection_roles,
        }
    }
}
