//! Shared mappings and plan helpers for compiler tests.

use std::sync::Arc;

use crate::dialect::{AnsiDialect, Dialect, OracleDialect};
use crate::load_plan::{LoadPlan, LoadPlanDefinition};
use crate::mapping_catalog::MappingCatalog;
use crate::sql_render::{compile, CompiledLoadQuery, LoadPlanCompileError, QueryBuildingParameters};

/// `A` owns a required `b`, an optional self reference, a component with an
/// association, a one-to-many, a many-to-many, a value collection and an
/// entity-keyed map. `Line` has a composite identifier referencing `Order` and
/// a collection of composite elements that reference `Part`.
pub(crate) const MAPPINGS: &str = r#"
entities:
  - name: A
    table: A
    id_columns: [ID]
    columns: [NAME, B_ID]
    filters:
      - name: tenancy
        condition: "{alias}.TENANT_ID = :tenant"
    associations:
      b: { type: many_to_one, entity: B, columns: [B_ID], required: true }
      parent: { type: many_to_one, entity: A, columns: [PARENT_ID] }
      items: { type: collection, role: A.items }
      tags: { type: collection, role: A.tags }
      notes: { type: collection, role: A.notes }
      ratings: { type: collection, role: A.ratings }
      address:
        type: component
        associations:
          country: { type: many_to_one, entity: Country, columns: [COUNTRY_CODE] }
  - name: B
    table: B_TABLE
    id_columns: [ID]
    columns: [LABEL]
  - name: Item
    table: ITEMS
    id_columns: [ID]
    columns: [SKU, PRODUCT_ID]
    associations:
      product: { type: many_to_one, entity: Product, columns: [PRODUCT_ID] }
  - name: Product
    table: PRODUCT
    id_columns: [ID]
    columns: [TITLE]
  - name: Tag
    table: TAG
    id_columns: [ID]
    columns: [TEXT]
    where: "{alias}.ACTIVE = 1"
  - name: Country
    table: COUNTRY
    id_columns: [CODE]
  - name: Line
    table: LINE
    id_columns: [ORDER_ID, LINE_NO]
    columns: [QTY]
    identifier_associations:
      order: { type: many_to_one, entity: Order, columns: [ORDER_ID] }
    associations:
      parts: { type: collection, role: Line.parts }
  - name: Order
    table: ORDERS
    id_columns: [ID]
    columns: [TOTAL]
  - name: Part
    table: PART
    id_columns: [ID]
    columns: [NAME]
collections:
  - role: A.items
    key_columns: [A_ID]
    elements: { type: one_to_many, entity: Item }
    order_by: "{alias}.SKU asc"
  - role: A.tags
    table: A_TAG
    key_columns: [A_ID]
    elements: { type: many_to_many, entity: Tag, columns: [TAG_ID] }
    order_by: "{alias}.POSITION"
    many_to_many_order_by: "{alias}.TEXT"
    many_to_many_where: "{alias}.VISIBLE = 1"
  - role: A.notes
    table: A_NOTE
    key_columns: [A_ID]
    elements: { type: basic, columns: [NOTE] }
  - role: A.ratings
    table: A_RATING
    key_columns: [A_ID]
    index: { columns: [PRODUCT_ID], entity: Product }
    elements: { type: basic, columns: [SCORE] }
  - role: Line.parts
    table: LINE_PART
    key_columns: [ORDER_ID, LINE_NO]
    elements:
      type: composite
      columns: [PART_ID, AMOUNT]
      associations:
        part: { type: many_to_one, entity: Part, columns: [PART_ID] }
    order_by: "{alias}.AMOUNT desc"
"#;

pub(crate) fn catalog() -> MappingCatalog {
    catalog_for(Arc::new(AnsiDialect))
}

pub(crate) fn catalog_for(dialect: Arc<dyn Dialect>) -> MappingCatalog {
    MappingCatalog::from_yaml_str(MAPPINGS, dialect).expect("fixture mappings load")
}

pub(crate) fn plan(catalog: &MappingCatalog, definition: &str) -> LoadPlan {
    LoadPlanDefinition::from_yaml_str(definition)
        .and_then(|definition| definition.build(catalog))
        .expect("fixture plan builds")
}

/// A plan with one entity return and a single fetch.
pub(crate) fn single_fetch(entity: &str, attribute: &str) -> String {
    format!("returns:\n  - entity: {entity}\n    fetches:\n      - attribute: {attribute}\n")
}

/// Compile a YAML plan against the ANSI fixture catalog.
pub(crate) fn compile_ansi(
    definition: &str,
    params: &QueryBuildingParameters,
) -> Result<CompiledLoadQuery, LoadPlanCompileError> {
    let catalog = catalog();
    compile(&plan(&catalog, definition), params, &AnsiDialect)
}

/// Compile a YAML plan against the Oracle fixture catalog.
pub(crate) fn compile_oracle(
    definition: &str,
    params: &QueryBuildingParameters,
) -> Result<CompiledLoadQuery, LoadPlanCompileError> {
    let catalog = catalog_for(Arc::new(OracleDialect));
    compile(&plan(&catalog, definition), params, &OracleDialect)
}
