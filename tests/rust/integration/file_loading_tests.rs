//! Integration tests for file-based compilation
//!
//! Mapping, plan and configuration files are written to temporary files and
//! loaded through the same entry points the CLI uses.

#[cfg(test)]
mod file_loading_integration_tests {
    use std::io::Write;
    use std::path::Path;

    use loadplan::config::{CompilerConfig, DialectName};
    use loadplan::load_plan::{LoadPlanBuildError, LoadPlanDefinition};
    use loadplan::mapping_catalog::{MappingCatalog, MappingError};
    use loadplan::sql_render::{compile, CompiledLoadQuery};
    use tempfile::NamedTempFile;

    const ORDER_MAPPINGS: &str = r#"
entities:
  - name: com.acme.Order
    table: ORDERS
    id_columns: [ID]
    columns: [TOTAL]
    where: "{alias}.DELETED = 0"
    filters:
      - name: tenancy
        condition: "{alias}.TENANT_ID = :tenant"
    associations:
      customer: { type: many_to_one, entity: com.acme.Customer, columns: [CUSTOMER_ID] }
  - name: com.acme.Customer
    table: CUSTOMER
    id_columns: [ID]
    columns: [NAME]
    filters:
      - name: tenancy
        condition: "{alias}.TENANT_ID = :tenant"
"#;

    const ORDER_PLAN: &str = r#"
returns:
  - entity: com.acme.Order
    fetches:
      - attribute: customer
"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn compile_files(
        mappings: &Path,
        plan: &Path,
        config: &CompilerConfig,
    ) -> anyhow::Result<CompiledLoadQuery> {
        let catalog = MappingCatalog::from_yaml_file(mappings, config.dialect())?;
        let plan = LoadPlanDefinition::from_yaml_file(plan)?.build(&catalog)?;
        Ok(compile(&plan, &config.query_building_parameters(), config.dialect().as_ref())?)
    }

    #[test]
    fn test_compile_from_files_with_configured_filters() {
        let mappings = write_temp(ORDER_MAPPINGS);
        let plan = write_temp(ORDER_PLAN);
        let config_file = write_temp("dialect: ansi\nenabled_filters: [tenancy]\nbatch_size: 1\n");

        let config = CompilerConfig::from_yaml_file(config_file.path()).unwrap();
        let compiled = compile_files(mappings.path(), plan.path(), &config).unwrap();

        assert_eq!(
            compiled.sql,
            "select order0_.ID as ID0_, order0_.TOTAL as TOTAL0_, customer1_.ID as ID1_, customer1_.NAME as NAME1_ \
from ORDERS order0_ left outer join CUSTOMER customer1_ on order0_.CUSTOMER_ID=customer1_.ID \
and customer1_.TENANT_ID = :tenancy.tenant \
where order0_.ID=? and order0_.DELETED = 0 and order0_.TENANT_ID = :tenancy.tenant"
        );
    }

    #[test]
    fn test_disabled_filters_leave_only_mapping_restrictions() {
        let mappings = write_temp(ORDER_MAPPINGS);
        let plan = write_temp(ORDER_PLAN);

        let compiled =
            compile_files(mappings.path(), plan.path(), &CompilerConfig::default()).unwrap();
        assert_eq!(
            compiled.from_fragment,
            "ORDERS order0_ left outer join CUSTOMER customer1_ on order0_.CUSTOMER_ID=customer1_.ID"
        );
        assert_eq!(compiled.where_fragment, "order0_.DELETED = 0");
    }

    #[test]
    fn test_oracle_config_changes_join_syntax() {
        let mappings = write_temp(ORDER_MAPPINGS);
        let plan = write_temp(ORDER_PLAN);
        let config = CompilerConfig {
            dialect: DialectName::Oracle,
            ..Default::default()
        };

        let compiled = compile_files(mappings.path(), plan.path(), &config).unwrap();
        assert_eq!(compiled.from_fragment, "ORDERS order0_, CUSTOMER customer1_");
        assert_eq!(
            compiled.where_fragment,
            "order0_.CUSTOMER_ID=customer1_.ID(+) and order0_.DELETED = 0"
        );
    }

    #[test]
    fn test_compiled_query_json_names_readers() {
        let mappings = write_temp(ORDER_MAPPINGS);
        let plan = write_temp(ORDER_PLAN);
        let compiled =
            compile_files(mappings.path(), plan.path(), &CompilerConfig::default()).unwrap();

        let json: serde_json::Value = serde_json::to_value(&compiled).unwrap();
        assert_eq!(json["readers"][0]["kind"], "entity");
        assert_eq!(json["readers"][0]["entity_name"], "com.acme.Customer");
        assert_eq!(json["readers"][0]["attribute_path"], "customer");
        assert_eq!(json["returns"][0]["entity_name"], "com.acme.Order");
    }

    #[test]
    fn test_missing_mapping_file() {
        let err = MappingCatalog::from_yaml_file(
            "/nonexistent/mappings.yaml",
            CompilerConfig::default().dialect(),
        )
        .unwrap_err();
        assert!(matches!(err, MappingError::ConfigReadError { .. }));
    }

    #[test]
    fn test_mapping_with_unknown_target_entity() {
        let mappings = write_temp(
            r#"
entities:
  - name: com.acme.Order
    table: ORDERS
    id_columns: [ID]
    associations:
      customer: { type: many_to_one, entity: com.acme.Missing, columns: [CUSTOMER_ID] }
"#,
        );
        let dialect = CompilerConfig::default().dialect();
        let result = MappingCatalog::from_yaml_file(mappings.path(), dialect);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("com.acme.Missing"), "{err}");
    }

    #[test]
    fn test_plan_with_unknown_attribute() {
        let mappings = write_temp(ORDER_MAPPINGS);
        let plan = write_temp(
            "returns:\n  - entity: com.acme.Order\n    fetches:\n      - attribute: lines\n",
        );
        let config = CompilerConfig::default();

        let catalog = MappingCatalog::from_yaml_file(mappings.path(), config.dialect()).unwrap();
        let err = LoadPlanDefinition::from_yaml_file(plan.path())
            .and_then(|definition| definition.build(&catalog))
            .unwrap_err();
        assert!(matches!(
            err,
            LoadPlanBuildError::UnknownAttribute { .. }
                | LoadPlanBuildError::Mapping(MappingError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_unparseable_plan_file() {
        let plan = write_temp("returns: {not: [a list");
        let err = LoadPlanDefinition::from_yaml_file(plan.path()).unwrap_err();
        assert!(matches!(err, LoadPlanBuildError::DefinitionParseError(_)));
    }
}
