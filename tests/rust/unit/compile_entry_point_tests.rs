//! Unit tests for the compilation entry points and the caller-owned alias registry

#[cfg(test)]
mod compile_entry_point_tests {
    use std::sync::Arc;

    use loadplan::dialect::AnsiDialect;
    use loadplan::load_plan::{FetchStrategy, LoadPlan, LoadPlanBuilder, Return};
    use loadplan::mapping_catalog::MappingCatalog;
    use loadplan::sql_render::{compile, compile_load_query, AliasRegistry, QueryBuildingParameters};

    const MAPPINGS: &str = r#"
entities:
  - name: com.acme.Post
    table: POST
    id_columns: [ID]
    columns: [TITLE]
    associations:
      tags: { type: collection, role: com.acme.Post.tags }
  - name: com.acme.Tag
    table: TAG
    id_columns: [ID]
    columns: [LABEL]
collections:
  - role: com.acme.Post.tags
    table: POST_TAG
    key_columns: [POST_ID]
    elements: { type: many_to_many, entity: com.acme.Tag, columns: [TAG_ID] }
"#;

    fn catalog() -> MappingCatalog {
        MappingCatalog::from_yaml_str(MAPPINGS, Arc::new(AnsiDialect)).unwrap()
    }

    fn post_with_tags(catalog: &MappingCatalog) -> LoadPlan {
        let mut builder = LoadPlanBuilder::new(catalog);
        let mut post = builder.entity_return("com.acme.Post").unwrap();
        let tags = builder.fetch(&post, "tags", FetchStrategy::joined()).unwrap();
        post.fetches.push(tags);
        builder.build(vec![Return::Entity(post)]).unwrap()
    }

    #[test]
    fn test_registry_outlives_compilation() {
        let catalog = catalog();
        let plan = post_with_tags(&catalog);
        let mut registry = AliasRegistry::new();

        let params = QueryBuildingParameters::default();
        let compiled = compile_load_query(&plan, &mut registry, &params, &AnsiDialect).unwrap();

        let root = plan.returns()[0].query_space_uid();
        assert_eq!(registry.lookup_table_alias(root), Some("post0_"));
        assert_eq!(
            compiled.from_fragment,
            "POST post0_ left outer join POST_TAG tags1_ on post0_.ID=tags1_.POST_ID \
left outer join TAG tag2_ on tags1_.TAG_ID=tag2_.ID"
        );
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let catalog = catalog();
        let plan = post_with_tags(&catalog);
        let params = QueryBuildingParameters::default().with_batch_size(4);

        let first = compile(&plan, &params, &AnsiDialect).unwrap();
        let second = compile(&plan, &params, &AnsiDialect).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.where_fragment, "post0_.ID in (?, ?, ?, ?)");
    }

    #[test]
    fn test_many_to_many_aliases_are_distinct() {
        let catalog = catalog();
        let plan = post_with_tags(&catalog);
        let mut registry = AliasRegistry::new();
        let params = QueryBuildingParameters::default();
        compile_load_query(&plan, &mut registry, &params, &AnsiDialect).unwrap();

        let tags_uid = match &plan.returns()[0] {
            Return::Entity(post) => post.fetches[0].query_space_uid(),
            Return::Collection(_) => unreachable!(),
        };
        let aliases = registry.require_collection_aliases(tags_uid).unwrap();
        assert_eq!(aliases.collection_table_alias(), "tags1_");
        assert_eq!(aliases.element_table_alias(), "tag2_");
        assert_eq!(aliases.collection_suffix, "1_");
        assert_eq!(
            aliases.entity_element_aliases.as_ref().map(|element| element.column_suffix.as_str()),
            Some("2_")
        );
    }
}
