//! Unit tests for the SQL text helpers exposed by the crate

#[cfg(test)]
mod sql_text_helper_tests {
    use loadplan::dialect::{AnsiJoinFragment, JoinFragment, JoinType};
    use loadplan::sql_render::{
        merge_additional_conditions, render_key_restriction, SelectStatementBuilder,
    };
    use loadplan::utils::sql_naming::{column_alias, generate_alias, generate_suffix};
    use test_case::test_case;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test_case("com.acme.Customer", 0, "customer0_" ; "qualified entity name")]
    #[test_case("com.acme.Order.lineItems", 4, "lineitems4_" ; "collection role")]
    #[test_case("com.acme.Account2", 1, "account2x1_" ; "trailing digit")]
    #[test_case("com.acme.VeryLongEntityName", 12, "verylongen12_" ; "truncated root")]
    fn test_generated_aliases(description: &str, unique: u32, expected: &str) {
        assert_eq!(generate_alias(description, unique), expected);
    }

    #[test]
    fn test_column_aliases_use_suffixes() {
        assert_eq!(generate_suffix(7), "7_");
        assert_eq!(column_alias("ID", &generate_suffix(7)), "ID7_");
    }

    #[test_case("", "", "" ; "both empty")]
    #[test_case("f.A = 1", "", "f.A = 1" ; "filter only")]
    #[test_case("", "w.B = 2", "w.B = 2" ; "with only")]
    #[test_case("f.A = 1", "w.B = 2", "f.A = 1 and w.B = 2" ; "filter then with")]
    fn test_merge_additional_conditions(filter: &str, with_clause: &str, expected: &str) {
        assert_eq!(merge_additional_conditions(filter, with_clause), expected);
    }

    #[test]
    fn test_key_restrictions() {
        let id = cols(&["ID"]);
        let composite = cols(&["A", "B"]);
        assert_eq!(render_key_restriction("o0_", &id, 0), None);
        assert_eq!(render_key_restriction("o0_", &id, 2).as_deref(), Some("o0_.ID in (?, ?)"));
        assert_eq!(
            render_key_restriction("o0_", &composite, 2).as_deref(),
            Some("((o0_.A=? and o0_.B=?) or (o0_.A=? and o0_.B=?))")
        );
    }

    #[test]
    fn test_statement_from_dialect_fragment() {
        let mut joins = AnsiJoinFragment::new();
        joins.add_join(
            "CUSTOMER",
            "customer1_",
            &cols(&["order0_.CUSTOMER_ID"]),
            &cols(&["ID"]),
            JoinType::for_required(false),
            "",
        );

        let mut statement = SelectStatementBuilder::new();
        statement.append_select_clause_fragment("order0_.ID as ID0_");
        statement.append_select_clause_fragment("customer1_.ID as ID1_");
        statement.append_from_clause("ORDERS order0_");
        statement.append_outer_joins(
            &joins.to_from_fragment_string(),
            &joins.to_where_fragment_string(),
        );
        statement.append_restriction("order0_.ID=?");
        statement.append_order_by_fragment("order0_.ID");

        assert_eq!(
            statement.to_statement_string(),
            "select order0_.ID as ID0_, customer1_.ID as ID1_ \
from ORDERS order0_ left outer join CUSTOMER customer1_ on order0_.CUSTOMER_ID=customer1_.ID \
where order0_.ID=? order by order0_.ID"
        );
    }
}
