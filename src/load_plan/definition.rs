//! YAML load plan definitions.
//!
//! A definition names the roots of a load and the attributes to fetch, by
//! attribute name, nested the way the object graph is:
//!
//! ```yaml
//! returns:
//!   - entity: com.acme.Order
//!     fetches:
//!       - attribute: customer
//!       - attribute: items
//!         style: join
//!         with: "{alias}.QUANTITY > 0"
//!         fetches:            # fetched from the element entity
//!           - attribute: product
//!       - attribute: invoices
//!         style: subselect
//!         timing: delayed
//! ```
//!
//! Omitted fetch strategies default to an immediate join fetch.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::builder::LoadPlanBuilder;
use super::errors::LoadPlanBuildError;
use super::fetch::{CollectionGraph, Fetch, FetchSource, FetchStrategy, Return};
use super::LoadPlan;
use crate::mapping_catalog::MappingCatalog;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadPlanDefinition {
    pub returns: Vec<ReturnDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnDefinition {
    /// Root entity name; exclusive with `collection`.
    #[serde(default)]
    pub entity: Option<String>,
    /// Root collection role; exclusive with `entity`.
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub identifier_fetches: Vec<FetchDefinition>,
    /// Entity fetches, or element fetches for a collection root.
    #[serde(default)]
    pub fetches: Vec<FetchDefinition>,
    #[serde(default)]
    pub index_fetches: Vec<FetchDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchDefinition {
    pub attribute: String,
    #[serde(flatten)]
    pub strategy: FetchStrategy,
    #[serde(default, rename = "with")]
    pub with_condition: Option<String>,
    #[serde(default)]
    pub identifier_fetches: Vec<FetchDefinition>,
    /// Nested fetches; for collections these are fetched from the elements.
    #[serde(default)]
    pub fetches: Vec<FetchDefinition>,
    /// Fetches from the index entity of an entity-keyed map.
    #[serde(default)]
    pub index_fetches: Vec<FetchDefinition>,
}

impl LoadPlanDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, LoadPlanBuildError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LoadPlanBuildError::DefinitionParseError(e.to_string()))
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadPlanBuildError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LoadPlanBuildError::DefinitionReadError(format!("{}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Resolve every attribute against the catalog and build the plan.
    pub fn build(&self, catalog: &MappingCatalog) -> Result<LoadPlan, LoadPlanBuildError> {
        let mut builder = LoadPlanBuilder::new(catalog);
        let mut returns = Vec::with_capacity(self.returns.len());

        for definition in &self.returns {
            let root = match (&definition.entity, &definition.collection) {
                (Some(entity_name), None) => {
                    if !definition.index_fetches.is_empty() {
                        return Err(LoadPlanBuildError::InvalidDefinition(format!(
                            "entity return {entity_name} cannot have index fetches"
                        )));
                    }
                    let mut root = builder.entity_return(entity_name)?;
                    root.identifier_fetches = build_identifier_fetches(
                        &mut builder,
                        &root,
                        &definition.identifier_fetches,
                    )?;
                    root.fetches = build_fetches(&mut builder, &root, &definition.fetches)?;
                    Return::Entity(root)
                }
                (None, Some(role)) => {
                    if !definition.identifier_fetches.is_empty() {
                        return Err(LoadPlanBuildError::InvalidDefinition(format!(
                            "collection return {role} cannot have identifier fetches"
                        )));
                    }
                    let mut root = builder.collection_return(role)?;
                    attach_graph_fetches(
                        &mut builder,
                        role,
                        root.element_graph.as_mut(),
                        &definition.fetches,
                    )?;
                    attach_graph_fetches(
                        &mut builder,
                        role,
                        root.index_graph.as_mut(),
                        &definition.index_fetches,
                    )?;
                    Return::Collection(root)
                }
                _ => {
                    return Err(LoadPlanBuildError::InvalidDefinition(
                        "each return needs exactly one of `entity` or `collection`".to_string(),
                    ))
                }
            };
            returns.push(root);
        }

        builder.build(returns)
    }
}

fn build_fetches(
    builder: &mut LoadPlanBuilder<'_>,
    owner: &dyn FetchSource,
    definitions: &[FetchDefinition],
) -> Result<Vec<Fetch>, LoadPlanBuildError> {
    definitions
        .iter()
        .map(|definition| {
            let fetch = builder.fetch(owner, &definition.attribute, definition.strategy)?;
            complete_fetch(builder, fetch, definition)
        })
        .collect()
}

fn build_identifier_fetches(
    builder: &mut LoadPlanBuilder<'_>,
    owner: &dyn FetchSource,
    definitions: &[FetchDefinition],
) -> Result<Vec<Fetch>, LoadPlanBuildError> {
    definitions
        .iter()
        .map(|definition| {
            let fetch =
                builder.identifier_fetch(owner, &definition.attribute, definition.strategy)?;
            complete_fetch(builder, fetch, definition)
        })
        .collect()
}

/// Apply the `with` condition and build the nested fetches of a new fetch.
fn complete_fetch(
    builder: &mut LoadPlanBuilder<'_>,
    mut fetch: Fetch,
    definition: &FetchDefinition,
) -> Result<Fetch, LoadPlanBuildError> {
    if let Some(condition) = &definition.with_condition {
        builder.with_condition(&fetch, condition.as_str())?;
    }

    match &mut fetch {
        Fetch::Entity(entity) => {
            ensure_no_index_fetches(definition)?;
            let identifier_fetches =
                build_identifier_fetches(builder, &*entity, &definition.identifier_fetches)?;
            let fetches = build_fetches(builder, &*entity, &definition.fetches)?;
            entity.identifier_fetches = identifier_fetches;
            entity.fetches = fetches;
        }
        Fetch::Composite(composite) => {
            ensure_no_index_fetches(definition)?;
            ensure_no_identifier_fetches(definition)?;
            let fetches = build_fetches(builder, &*composite, &definition.fetches)?;
            composite.fetches = fetches;
        }
        Fetch::Collection(collection) => {
            ensure_no_identifier_fetches(definition)?;
            let path = collection.path.clone();
            attach_graph_fetches(
                builder,
                &path,
                collection.element_graph.as_mut(),
                &definition.fetches,
            )?;
            attach_graph_fetches(
                builder,
                &path,
                collection.index_graph.as_mut(),
                &definition.index_fetches,
            )?;
        }
    }
    Ok(fetch)
}

fn attach_graph_fetches(
    builder: &mut LoadPlanBuilder<'_>,
    collection: &str,
    graph: Option<&mut CollectionGraph>,
    definitions: &[FetchDefinition],
) -> Result<(), LoadPlanBuildError> {
    if definitions.is_empty() {
        return Ok(());
    }
    match graph {
        Some(graph) => {
            let fetches = build_fetches(builder, &*graph, definitions)?;
            graph.fetches = fetches;
            Ok(())
        }
        None => Err(LoadPlanBuildError::InvalidDefinition(format!(
            "{collection} has no entity or composite graph to fetch from"
        ))),
    }
}

fn ensure_no_index_fetches(definition: &FetchDefinition) -> Result<(), LoadPlanBuildError> {
    if definition.index_fetches.is_empty() {
        Ok(())
    } else {
        Err(LoadPlanBuildError::InvalidDefinition(format!(
            "`{}` is not a collection and cannot have index fetches",
            definition.attribute
        )))
    }
}

fn ensure_no_identifier_fetches(definition: &FetchDefinition) -> Result<(), LoadPlanBuildError> {
    if definition.identifier_fetches.is_empty() {
        Ok(())
    } else {
        Err(LoadPlanBuildError::InvalidDefinition(format!(
            "`{}` is not an entity and cannot have identifier fetches",
            definition.attribute
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::AnsiDialect;
    use crate::load_plan::fetch::{FetchStyle, FetchTiming};
    use std::sync::Arc;

    const MAPPINGS: &str = r#"
entities:
  - name: com.acme.Order
    table: ORDERS
    id_columns: [ID]
    associations:
      customer: { type: many_to_one, entity: com.acme.Customer, columns: [CUSTOMER_ID] }
      items: { type: collection, role: com.acme.Order.items }
      notes: { type: collection, role: com.acme.Order.notes }
  - name: com.acme.Customer
    table: CUSTOMER
    id_columns: [ID]
  - name: com.acme.Item
    table: ITEMS
    id_columns: [ID]
    associations:
      product: { type: many_to_one, entity: com.acme.Product, columns: [PRODUCT_ID] }
  - name: com.acme.Product
    table: PRODUCT
    id_columns: [ID]
collections:
  - role: com.acme.Order.items
    key_columns: [ORDER_ID]
    elements: { type: one_to_many, entity: com.acme.Item }
  - role: com.acme.Order.notes
    table: ORDER_NOTE
    key_columns: [ORDER_ID]
    elements: { type: basic, columns: [TEXT] }
"#;

    fn catalog() -> MappingCatalog {
        MappingCatalog::from_yaml_str(MAPPINGS, Arc::new(AnsiDialect)).unwrap()
    }

    #[test]
    fn test_nested_definition_builds_plan() {
        let definition = LoadPlanDefinition::from_yaml_str(
            r#"
returns:
  - entity: com.acme.Order
    fetches:
      - attribute: customer
        style: select
      - attribute: items
        with: "{alias}.QUANTITY > 0"
        fetches:
          - attribute: product
"#,
        )
        .unwrap();
        let plan = definition.build(&catalog()).unwrap();
        let Return::Entity(order) = &plan.returns()[0] else {
            panic!("expected an entity return");
        };
        assert_eq!(order.fetches.len(), 2);
        assert_eq!(order.fetches[0].strategy().style, FetchStyle::Select);
        assert_eq!(order.fetches[1].strategy().timing, FetchTiming::Immediate);

        let Fetch::Collection(items) = &order.fetches[1] else {
            panic!("expected a collection fetch");
        };
        let elements = items.element_graph.as_ref().unwrap();
        assert_eq!(elements.fetches[0].property_path(), "items.<elements>.product");

        let join = plan.query_spaces().join_into(items.uid).unwrap();
        assert_eq!(join.with_conditions, vec!["{alias}.QUANTITY > 0".to_string()]);
    }

    #[test]
    fn test_collection_return_definition() {
        let definition = LoadPlanDefinition::from_yaml_str(
            "returns:\n  - collection: com.acme.Order.items\n    fetches:\n      - attribute: product\n",
        )
        .unwrap();
        let plan = definition.build(&catalog()).unwrap();
        let Return::Collection(items) = &plan.returns()[0] else {
            panic!("expected a collection return");
        };
        assert_eq!(items.element_graph.as_ref().unwrap().fetches.len(), 1);
    }

    #[test]
    fn test_fetch_from_basic_collection_rejected() {
        let definition = LoadPlanDefinition::from_yaml_str(
            r#"
returns:
  - entity: com.acme.Order
    fetches:
      - attribute: notes
        fetches:
          - attribute: anything
"#,
        )
        .unwrap();
        assert!(matches!(
            definition.build(&catalog()),
            Err(LoadPlanBuildError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_return_needs_exactly_one_root() {
        let definition = LoadPlanDefinition::from_yaml_str(
            "returns:\n  - entity: com.acme.Order\n    collection: com.acme.Order.items\n",
        )
        .unwrap();
        assert!(matches!(
            definition.build(&catalog()),
            Err(LoadPlanBuildError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_unreadable_definition() {
        assert!(matches!(
            LoadPlanDefinition::from_yaml_file("/nonexistent/plan.yaml"),
            Err(LoadPlanBuildError::DefinitionReadError(_))
        ));
        assert!(matches!(
            LoadPlanDefinition::from_yaml_str("returns: 3"),
            Err(LoadPlanBuildError::DefinitionParseError(_))
        ));
    }
}
