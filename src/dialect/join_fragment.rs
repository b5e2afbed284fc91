//! Join fragment builders.
//!
//! A join fragment accumulates `add_join` calls made while walking a load plan and
//! renders two strings at the end: text to append after the driving table in the
//! FROM clause, and text to append to the WHERE clause. The WHERE text always starts
//! with ` and ` when non-empty; the statement builder strips the leading conjunction.

use std::fmt;

/// SQL join type used when rendering a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
}

impl JoinType {
    /// Inner join for a required association, left outer join otherwise.
    pub fn for_required(required: bool) -> Self {
        if required {
            JoinType::Inner
        } else {
            JoinType::LeftOuter
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "inner join"),
            JoinType::LeftOuter => write!(f, "left outer join"),
        }
    }
}

/// Dialect-specific join syntax accumulator.
pub trait JoinFragment: fmt::Debug {
    /// Join `table alias` on `fk_columns[i] = alias.pk_columns[i]`, plus an optional
    /// extra condition (`on`, may be empty).
    ///
    /// `fk_columns` are already qualified with the left-hand alias; `pk_columns`
    /// are unqualified columns of the joined table.
    fn add_join(
        &mut self,
        table_name: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
        on: &str,
    );

    /// Append raw FROM and WHERE text produced by a mapping descriptor
    /// (secondary tables, subclass tables, discriminator restrictions).
    fn add_joins(&mut self, from_fragment: &str, where_fragment: &str);

    /// Conjoin a condition into the WHERE text. Returns false for an empty condition.
    fn add_condition(&mut self, condition: &str) -> bool;

    fn to_from_fragment_string(&self) -> String;

    fn to_where_fragment_string(&self) -> String;
}

/// Append `condition` to `buffer`, prefixed with ` and ` unless it already has one.
fn append_condition(buffer: &mut String, condition: &str) -> bool {
    if condition.trim().is_empty() {
        return false;
    }
    if !condition.starts_with(" and ") {
        buffer.push_str(" and ");
    }
    buffer.push_str(condition);
    true
}

fn append_column_equalities(
    buffer: &mut String,
    alias: &str,
    fk_columns: &[String],
    pk_columns: &[String],
    rhs_marker: &str,
    separator: &str,
) {
    for (idx, (fk, pk)) in fk_columns.iter().zip(pk_columns).enumerate() {
        if idx > 0 {
            buffer.push_str(separator);
        }
        buffer.push_str(&format!("{fk}={alias}.{pk}{rhs_marker}"));
    }
}

/// ANSI `inner join` / `left outer join ... on ...` syntax.
#[derive(Debug, Default, Clone)]
pub struct AnsiJoinFragment {
    buffer: String,
    conditions: String,
}

impl AnsiJoinFragment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JoinFragment for AnsiJoinFragment {
    fn add_join(
        &mut self,
        table_name: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
        on: &str,
    ) {
        self.buffer
            .push_str(&format!(" {join_type} {table_name} {alias} on "));
        append_column_equalities(&mut self.buffer, alias, fk_columns, pk_columns, "", " and ");
        append_condition(&mut self.buffer, on);
    }

    fn add_joins(&mut self, from_fragment: &str, where_fragment: &str) {
        self.buffer.push_str(from_fragment);
        self.conditions.push_str(where_fragment);
    }

    fn add_condition(&mut self, condition: &str) -> bool {
        append_condition(&mut self.conditions, condition)
    }

    fn to_from_fragment_string(&self) -> String {
        self.buffer.clone()
    }

    fn to_where_fragment_string(&self) -> String {
        self.conditions.clone()
    }
}

/// Operators before which the Oracle outer-join marker is inserted in extra conditions.
const ORACLE_OUTER_JOIN_OPERATORS: &[char] = &['=', '<', '>', '!'];

/// Legacy Oracle syntax: tables listed in FROM, join conditions in WHERE with `(+)`.
#[derive(Debug, Default, Clone)]
pub struct OracleJoinFragment {
    after_from: String,
    after_where: String,
}

impl OracleJoinFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every comparison of an extra condition as outer: `b.X = 1` → `b.X(+) = 1`.
    fn add_left_outer_join_condition(&mut self, on: &str) {
        if on.trim().is_empty() {
            return;
        }
        let chars: Vec<char> = on.chars().collect();
        let mut marked = String::with_capacity(on.len() + 8);
        let mut idx = 0;
        while idx < chars.len() {
            let ch = chars[idx];
            let is_operator = ORACLE_OUTER_JOIN_OPERATORS.contains(&ch)
                && !(idx > 0 && ORACLE_OUTER_JOIN_OPERATORS.contains(&chars[idx - 1]));
            let is_null_check = ch == ' '
                && chars.len() > idx + 3
                && chars[idx + 1..idx + 4].iter().collect::<String>() == "is ";
            if is_operator || is_null_check {
                let trimmed_len = marked.trim_end().len();
                let trailing = marked.split_off(trimmed_len);
                marked.push_str("(+)");
                marked.push_str(&trailing);
            }
            marked.push(ch);
            idx += 1;
        }
        append_condition(&mut self.after_where, &marked);
    }
}

impl JoinFragment for OracleJoinFragment {
    fn add_join(
        &mut self,
        table_name: &str,
        alias: &str,
        fk_columns: &[String],
        pk_columns: &[String],
        join_type: JoinType,
        on: &str,
    ) {
        self.after_from.push_str(&format!(", {table_name} {alias}"));
        let marker = match join_type {
            JoinType::Inner => "",
            JoinType::LeftOuter => "(+)",
        };
        for (fk, pk) in fk_columns.iter().zip(pk_columns) {
            self.after_where
                .push_str(&format!(" and {fk}={alias}.{pk}{marker}"));
        }
        match join_type {
            JoinType::Inner => {
                append_condition(&mut self.after_where, on);
            }
            JoinType::LeftOuter => self.add_left_outer_join_condition(on),
        }
    }

    fn add_joins(&mut self, from_fragment: &str, where_fragment: &str) {
        self.after_from.push_str(from_fragment);
        self.after_where.push_str(where_fragment);
    }

    fn add_condition(&mut self, condition: &str) -> bool {
        append_condition(&mut self.after_where, condition)
    }

    fn to_from_fragment_string(&self) -> String {
        self.after_from.clone()
    }

    fn to_where_fragment_string(&self) -> String {
        self.after_where.clone()
    }
}
