//! Row-level filters.
//!
//! A filter is a named condition template attached to an entity or collection
//! mapping. It only applies when its name is enabled for the load being compiled.
//! Templates use `{alias}` for the table alias and `:param` for named parameters;
//! parameters are qualified with the filter name (`:tenant` in filter `tenancy`
//! becomes `:tenancy.tenant`) so that two filters may share parameter names.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::utils::sql_naming::render_alias_template;

/// Names of the filters enabled for one compilation.
pub type EnabledFilters = BTreeSet<String>;

lazy_static! {
    // `:name` not preceded by another colon (leaves `::type` casts alone)
    static ref NAMED_PARAMETER: Regex = Regex::new(r"(^|[^:]):([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    pub condition: String,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: condition.into(),
        }
    }

    /// Render the condition for a table alias with qualified parameter names.
    pub fn render(&self, alias: &str) -> String {
        let with_alias = render_alias_template(&self.condition, alias);
        let replacement = format!("${{1}}:{}.${{2}}", self.name);
        NAMED_PARAMETER
            .replace_all(&with_alias, replacement.as_str())
            .into_owned()
    }
}

/// Render every enabled filter, conjoined with ` and `, in declaration order.
pub fn render_enabled_filters(
    filters: &[FilterDefinition],
    alias: &str,
    enabled_filters: &EnabledFilters,
) -> String {
    filters
        .iter()
        .filter(|filter| enabled_filters.contains(&filter.name))
        .map(|filter| filter.render(alias))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Conjoin non-empty SQL conditions with ` and `.
pub fn conjoin<'a>(conditions: impl IntoIterator<Item = &'a str>) -> String {
    conditions
        .into_iter()
        .map(str::trim)
        .filter(|condition| !condition.is_empty())
        .collect::<Vec<_>>()
        .join(" and ")
}
