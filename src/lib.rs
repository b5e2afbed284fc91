//! Loadplan - load plan to SQL compiler for an object-relational mapper
//!
//! This crate turns a description of what to load into one SELECT statement through:
//! - Mapping catalogs describing entity tables, collections and filters
//! - Load plans: query spaces joined by associations, plus returns and fetches
//! - Alias allocation for every table and column in the statement
//! - Join rendering in ANSI or Oracle syntax
//! - Fetch processing into select columns, orderings and readers

pub mod utils;

pub mod config;
pub mod dialect;
pub mod load_plan;
pub mod mapping_catalog;
pub mod sql_render;
