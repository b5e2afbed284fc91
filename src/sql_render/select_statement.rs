//! SELECT statement assembly.
//!
//! Fragments are accumulated while the plan is walked and rendered once at the
//! end. Outer-join WHERE text produced by join fragments starts with `and`; the
//! builder strips it and places it before the other restrictions.

#[derive(Debug, Clone, Default)]
pub struct SelectStatementBuilder {
    select_clause: String,
    from_clause: String,
    outer_joins_after_where: String,
    where_clause: String,
    order_by_clause: String,
}

fn append_separated(buffer: &mut String, fragment: &str, separator: &str) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push_str(separator);
    }
    buffer.push_str(fragment);
}

impl SelectStatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_select_clause_fragment(&mut self, fragment: &str) {
        append_separated(&mut self.select_clause, fragment, ", ");
    }

    /// Add a driving table (`TABLE alias`); several are comma separated.
    pub fn append_from_clause(&mut self, table_fragment: &str) {
        append_separated(&mut self.from_clause, table_fragment, ", ");
    }

    /// Join text goes straight after the FROM clause built so far; its WHERE
    /// text is kept for the WHERE clause.
    pub fn append_outer_joins(&mut self, from_fragment: &str, where_fragment: &str) {
        self.from_clause.push_str(from_fragment);
        self.outer_joins_after_where.push_str(where_fragment);
    }

    pub fn append_restriction(&mut self, restriction: &str) {
        append_separated(&mut self.where_clause, restriction, " and ");
    }

    pub fn append_order_by_fragment(&mut self, ordering: &str) {
        append_separated(&mut self.order_by_clause, ordering, ", ");
    }

    pub fn select_fragment(&self) -> &str {
        &self.select_clause
    }

    pub fn from_fragment(&self) -> &str {
        &self.from_clause
    }

    pub fn order_by_fragment(&self) -> &str {
        &self.order_by_clause
    }

    /// Outer-join conditions (leading `and` removed) followed by the restrictions.
    pub fn where_fragment(&self) -> String {
        let trimmed = self.outer_joins_after_where.trim();
        let outer_joins = trimmed.strip_prefix("and ").unwrap_or(trimmed);
        let mut where_fragment = outer_joins.to_string();
        append_separated(&mut where_fragment, &self.where_clause, " and ");
        where_fragment
    }

    pub fn to_statement_string(&self) -> String {
        let mut sql = format!("select {} from {}", self.select_clause, self.from_clause);
        let where_fragment = self.where_fragment();
        if !where_fragment.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&where_fragment);
        }
        if !self.order_by_clause.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&self.order_by_clause);
        }
        sql
    }
}
