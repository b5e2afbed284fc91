//! SQL dialect adapter.
//!
//! The compiler never writes join or CASE syntax itself; it asks the dialect for a
//! builder and feeds it structured calls. Two dialects ship with the crate:
//! - `ansi`: `inner join` / `left outer join ... on ...`
//! - `oracle`: legacy comma joins with `(+)` outer-join markers in WHERE

pub mod case_fragment;
pub mod join_fragment;

use std::fmt;

pub use case_fragment::{AnsiCaseFragment, CaseFragment};
pub use join_fragment::{AnsiJoinFragment, JoinFragment, JoinType, OracleJoinFragment};

/// Factory for dialect-specific SQL fragment builders.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn create_outer_join_fragment(&self) -> Box<dyn JoinFragment>;

    fn create_case_fragment(&self) -> Box<dyn CaseFragment>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn create_outer_join_fragment(&self) -> Box<dyn JoinFragment> {
        Box::new(AnsiJoinFragment::new())
    }

    fn create_case_fragment(&self) -> Box<dyn CaseFragment> {
        Box::new(AnsiCaseFragment::new())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn create_outer_join_fragment(&self) -> Box<dyn JoinFragment> {
        Box::new(OracleJoinFragment::new())
    }

    fn create_case_fragment(&self) -> Box<dyn CaseFragment> {
        Box::new(AnsiCaseFragment::new())
    }
}
