//! Integration tests for secondary tables and inheritance hierarchies
//!
//! Joined-subclass and secondary tables ride along with the join that brings
//! their entity into the statement; single-table subtypes restrict the rows.

#[cfg(test)]
mod inheritance_integration_tests {
    use std::sync::Arc;

    use loadplan::dialect::{AnsiDialect, Dialect, OracleDialect};
    use loadplan::load_plan::LoadPlanDefinition;
    use loadplan::mapping_catalog::MappingCatalog;
    use loadplan::sql_render::{
        compile, CompiledLoadQuery, QueryBuildingParameters, ReaderDescriptor,
    };

    const GARAGE_MAPPINGS: &str = r#"
entities:
  - name: com.acme.Garage
    table: GARAGE
    id_columns: [ID]
    columns: [CITY]
    associations:
      owner: { type: many_to_one, entity: com.acme.Person, columns: [OWNER_ID], required: true }
      vehicles: { type: collection, role: com.acme.Garage.vehicles }
  - name: com.acme.Person
    table: PERSON
    id_columns: [ID]
    columns: [NAME]
    secondary_tables:
      - { table: PERSON_DETAIL, key_columns: [PERSON_ID], columns: [BIO] }
  - name: com.acme.Vehicle
    table: VEHICLE
    id_columns: [ID]
    columns: [PLATE]
    inheritance:
      strategy: joined
      root_value: "0"
      subclass_tables:
        - { table: CAR, key_columns: [VEHICLE_ID], columns: [SEATS], discriminator_value: "1" }
  - name: com.acme.Car
    table: VEHICLE
    id_columns: [ID]
    columns: [PLATE]
    inheritance:
      strategy: single_table
      discriminator_column: KIND
      restrict_to: ["'CAR'"]
collections:
  - role: com.acme.Garage.vehicles
    key_columns: [GARAGE_ID]
    elements: { type: one_to_many, entity: com.acme.Vehicle }
"#;

    const GARAGE_PLAN: &str = r#"
returns:
  - entity: com.acme.Garage
    fetches:
      - attribute: owner
      - attribute: vehicles
"#;

    fn compile_garage(
        plan: &str,
        dialect: Arc<dyn Dialect>,
        params: &QueryBuildingParameters,
    ) -> CompiledLoadQuery {
        let catalog = MappingCatalog::from_yaml_str(GARAGE_MAPPINGS, dialect.clone()).unwrap();
        let plan = LoadPlanDefinition::from_yaml_str(plan)
            .unwrap()
            .build(&catalog)
            .unwrap();
        compile(&plan, params, dialect.as_ref()).unwrap()
    }

    #[test]
    fn test_secondary_and_subclass_tables_follow_their_joins() {
        let compiled = compile_garage(
            GARAGE_PLAN,
            Arc::new(AnsiDialect),
            &QueryBuildingParameters::default().with_batch_size(1),
        );

        assert_eq!(
            compiled.from_fragment,
            "GARAGE garage0_ \
inner join PERSON person1_ on garage0_.OWNER_ID=person1_.ID \
left outer join PERSON_DETAIL person1_1_ on person1_.ID=person1_1_.PERSON_ID \
left outer join VEHICLE vehicles2_ on garage0_.ID=vehicles2_.GARAGE_ID \
left outer join CAR vehicles2_1_ on vehicles2_.ID=vehicles2_1_.VEHICLE_ID"
        );
        assert_eq!(compiled.where_fragment, "garage0_.ID=?");
        assert_eq!(
            compiled.select_fragment,
            "garage0_.ID as ID0_, garage0_.CITY as CITY0_, \
person1_.ID as ID1_, person1_.NAME as NAME1_, person1_1_.BIO as BIO1_, \
vehicles2_.GARAGE_ID as GARAGE_ID2_, vehicles2_.ID as ID2_, \
vehicles2_.ID as ID3_, vehicles2_.PLATE as PLATE3_, vehicles2_1_.SEATS as SEATS3_, \
case when vehicles2_1_.VEHICLE_ID is not null then 1 \
when vehicles2_.ID is not null then 0 end as clazz_3_"
        );
        assert_eq!(compiled.order_by_fragment, "");
    }

    #[test]
    fn test_readers_name_hierarchy_roots() {
        let params = QueryBuildingParameters::default();
        let compiled = compile_garage(GARAGE_PLAN, Arc::new(AnsiDialect), &params);

        let names: Vec<String> = compiled
            .readers
            .iter()
            .map(|reader| match reader {
                ReaderDescriptor::Entity(entity) => entity.entity_name.clone(),
                ReaderDescriptor::Collection(collection) => collection.role.clone(),
            })
            .collect();
        assert_eq!(
            names,
            vec!["com.acme.Person", "com.acme.Garage.vehicles", "com.acme.Vehicle"]
        );
        assert_eq!(compiled.joined_collection_roles, vec!["com.acme.Garage.vehicles"]);
    }

    #[test]
    fn test_oracle_garage_moves_every_join_to_where() {
        let compiled = compile_garage(
            GARAGE_PLAN,
            Arc::new(OracleDialect),
            &QueryBuildingParameters::default().with_batch_size(1),
        );

        assert_eq!(
            compiled.from_fragment,
            "GARAGE garage0_, PERSON person1_, PERSON_DETAIL person1_1_, VEHICLE vehicles2_, CAR vehicles2_1_"
        );
        assert_eq!(
            compiled.where_fragment,
            "garage0_.OWNER_ID=person1_.ID \
and person1_.ID=person1_1_.PERSON_ID(+) \
and garage0_.ID=vehicles2_.GARAGE_ID(+) \
and vehicles2_.ID=vehicles2_1_.VEHICLE_ID(+) \
and garage0_.ID=?"
        );
    }

    #[test]
    fn test_single_table_subtype_restricts_rows() {
        let compiled = compile_garage(
            "returns:\n  - entity: com.acme.Car\n",
            Arc::new(AnsiDialect),
            &QueryBuildingParameters::default().with_batch_size(2),
        );
        assert_eq!(
            compiled.sql,
            "select car0_.ID as ID0_, car0_.PLATE as PLATE0_, car0_.KIND as clazz_0_ \
from VEHICLE car0_ where car0_.ID in (?, ?) and car0_.KIND in ('CAR')"
        );
    }
}
