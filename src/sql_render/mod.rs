//! Load plan to SQL compilation.
//!
//! One compilation walks a [`LoadPlan`](crate::load_plan::LoadPlan) twice:
//! 1. the join renderer allocates aliases and emits the FROM/WHERE join text
//! 2. the fetch processor emits SELECT columns, ORDER BY entries and readers
//!
//! Both share a single [`AliasRegistry`], owned by the compilation.

pub mod alias_resolver;
pub mod errors;
pub mod fetch_processor;
pub mod join_renderer;
pub mod load_query;
pub mod reader;
pub mod select_statement;

#[cfg(test)]
pub(crate) mod tests;

pub use alias_resolver::{AliasRegistry, CollectionReferenceAliases, EntityReferenceAliases};
pub use errors::LoadPlanCompileError;
pub use fetch_processor::{FetchProcessor, FetchStats, ProcessedFetches};
pub use join_renderer::{merge_additional_conditions, JoinRenderer};
pub use load_query::{
    compile, compile_load_query, render_key_restriction, CompiledLoadQuery, QueryBuildingParameters,
};
pub use reader::{CollectionReader, EntityReader, ReaderCollector, ReaderDescriptor};
pub use select_statement::SelectStatementBuilder;
