//! CASE expression builders used for discriminator resolution of joined-subclass
//! hierarchies: the first subclass table whose key column is not null decides the
//! concrete type of a row.

use std::fmt;

pub trait CaseFragment: fmt::Debug {
    /// Name the resulting column (`... end as clazz_1_`).
    fn set_return_column_name(&mut self, column_name: &str);

    /// Add `when alias.column is not null then value`.
    fn add_when_column_not_null(&mut self, alias: &str, column_name: &str, value: &str);

    fn to_fragment_string(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct AnsiCaseFragment {
    return_column_name: Option<String>,
    cases: Vec<(String, String)>,
}

impl AnsiCaseFragment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaseFragment for AnsiCaseFragment {
    fn set_return_column_name(&mut self, column_name: &str) {
        self.return_column_name = Some(column_name.to_string());
    }

    fn add_when_column_not_null(&mut self, alias: &str, column_name: &str, value: &str) {
        let qualified = format!("{alias}.{column_name}");
        // first registration of a column wins
        if !self.cases.iter().any(|(column, _)| *column == qualified) {
            self.cases.push((qualified, value.to_string()));
        }
    }

    fn to_fragment_string(&self) -> String {
        let mut sql = String::from("case");
        for (column, value) in &self.cases {
            sql.push_str(&format!(" when {column} is not null then {value}"));
        }
        sql.push_str(" end");
        if let Some(name) = &self.return_column_name {
            sql.push_str(&format!(" as {name}"));
        }
        sql
    }
}
