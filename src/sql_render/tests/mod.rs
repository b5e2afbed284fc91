//! Scenario tests for load query compilation.

pub(crate) mod fixtures;
