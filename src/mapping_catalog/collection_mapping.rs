//! Table-backed collection mapping.
//!
//! Key responsibilities:
//! - Resolve the collection table (junction table, value table, or the element
//!   entity's table for one-to-many)
//! - Render the key/index/element column SELECT fragment
//! - Render collection and many-to-many restrictions and orderings
//! - Delegate subclass joins and row restrictions of one-to-many collections to
//!   the element entity

use std::sync::Arc;

use super::config::{CollectionDefinition, ElementDefinition, IndexDefinition};
use super::errors::MappingError;
use super::filter::{conjoin, render_enabled_filters, EnabledFilters, FilterDefinition};
use super::mapping::{select_columns, AssociationMapping, CollectionMapping, EntityMapping};
use crate::utils::sql_naming::render_alias_template;

#[derive(Debug)]
pub struct TableCollectionMapping {
    role: String,
    table: String,
    key_columns: Vec<String>,
    elements: ElementDefinition,
    element_columns: Vec<String>,
    element_entity: Option<Arc<dyn EntityMapping>>,
    index: Option<IndexDefinition>,
    order_by: Option<String>,
    many_to_many_order_by: Option<String>,
    where_clause: Option<String>,
    many_to_many_where: Option<String>,
    filters: Vec<FilterDefinition>,
    many_to_many_filters: Vec<FilterDefinition>,
}

impl TableCollectionMapping {
    /// Build the mapping; `element_entity` must be the resolved element entity for
    /// one-to-many and many-to-many collections.
    pub fn from_definition(
        definition: CollectionDefinition,
        element_entity: Option<Arc<dyn EntityMapping>>,
    ) -> Result<Self, MappingError> {
        let role = definition.role;
        if definition.key_columns.is_empty() {
            return Err(MappingError::invalid_with_context(
                &role,
                "collection must declare key columns",
            ));
        }

        let (table, element_columns) = match &definition.elements {
            ElementDefinition::OneToMany { .. } => {
                let entity = element_entity.as_ref().ok_or_else(|| {
                    MappingError::invalid_with_context(
                        &role,
                        "one-to-many element entity not resolved",
                    )
                })?;
                // the element rows live in the entity's own table
                let table = definition
                    .table
                    .clone()
                    .unwrap_or_else(|| entity.table_name().to_string());
                (table, entity.key_columns().to_vec())
            }
            ElementDefinition::ManyToMany { columns, .. } => {
                if element_entity.is_none() {
                    return Err(MappingError::invalid_with_context(
                        &role,
                        "many-to-many element entity not resolved",
                    ));
                }
                (Self::require_table(&role, &definition.table)?, columns.clone())
            }
            ElementDefinition::Basic { columns } | ElementDefinition::Composite { columns, .. } => {
                (Self::require_table(&role, &definition.table)?, columns.clone())
            }
        };

        Ok(Self {
            role,
            table,
            key_columns: definition.key_columns,
            elements: definition.elements,
            element_columns,
            element_entity,
            index: definition.index,
            order_by: definition.order_by,
            many_to_many_order_by: definition.many_to_many_order_by,
            where_clause: definition.where_clause,
            many_to_many_where: definition.many_to_many_where,
            filters: definition.filters,
            many_to_many_filters: definition.many_to_many_filters,
        })
    }

    fn require_table(role: &str, table: &Option<String>) -> Result<String, MappingError> {
        match table {
            Some(table) if !table.trim().is_empty() => Ok(table.clone()),
            _ => Err(MappingError::invalid_with_context(
                role,
                "collection table is required unless elements are one-to-many",
            )),
        }
    }

    fn own_restriction(&self, alias: &str, enabled_filters: &EnabledFilters) -> String {
        let where_clause = self
            .where_clause
            .as_deref()
            .map(|template| render_alias_template(template, alias))
            .unwrap_or_default();
        let filters = render_enabled_filters(&self.filters, alias, enabled_filters);
        conjoin([where_clause.as_str(), filters.as_str()])
    }
}

impl CollectionMapping for TableCollectionMapping {
    fn role(&self) -> &str {
        &self.role
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    fn is_many_to_many(&self) -> bool {
        matches!(self.elements, ElementDefinition::ManyToMany { .. })
    }

    fn is_one_to_many(&self) -> bool {
        matches!(self.elements, ElementDefinition::OneToMany { .. })
    }

    fn element_entity_name(&self) -> Option<&str> {
        match &self.elements {
            ElementDefinition::OneToMany { entity }
            | ElementDefinition::ManyToMany { entity, .. } => Some(entity.as_str()),
            _ => None,
        }
    }

    fn element_column_names(&self) -> &[String] {
        &self.element_columns
    }

    fn element_association(&self, attribute: &str) -> Option<&AssociationMapping> {
        match &self.elements {
            ElementDefinition::Composite { associations, .. } => associations.get(attribute),
            _ => None,
        }
    }

    fn has_composite_elements(&self) -> bool {
        matches!(self.elements, ElementDefinition::Composite { .. })
    }

    fn has_entity_index(&self) -> bool {
        self.index_entity_name().is_some()
    }

    fn index_entity_name(&self) -> Option<&str> {
        self.index.as_ref().and_then(|index| index.entity.as_deref())
    }

    fn index_column_names(&self) -> &[String] {
        self.index
            .as_ref()
            .map(|index| index.columns.as_slice())
            .unwrap_or(&[])
    }

    fn select_fragment(&self, alias: &str, suffix: &str) -> String {
        let mut columns: Vec<String> = Vec::new();
        for column in self
            .key_columns
            .iter()
            .chain(self.index_column_names())
            .chain(&self.element_columns)
        {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        select_columns(alias, &columns, suffix).join(", ")
    }

    fn filter_fragment(&self, alias: &str, enabled_filters: &EnabledFilters) -> String {
        let own = self.own_restriction(alias, enabled_filters);
        match (&self.elements, &self.element_entity) {
            (ElementDefinition::OneToMany { .. }, Some(entity)) => {
                let entity_filter = entity.filter_fragment(alias, enabled_filters);
                conjoin([entity_filter.as_str(), own.as_str()])
            }
            _ => own,
        }
    }

    fn many_to_many_filter_fragment(
        &self,
        alias: &str,
        enabled_filters: &EnabledFilters,
    ) -> String {
        if !self.is_many_to_many() {
            return String::new();
        }
        let entity_filter = self
            .element_entity
            .as_ref()
            .map(|entity| entity.filter_fragment(alias, enabled_filters))
            .unwrap_or_default();
        let where_clause = self
            .many_to_many_where
            .as_deref()
            .map(|template| render_alias_template(template, alias))
            .unwrap_or_default();
        let filters = render_enabled_filters(&self.many_to_many_filters, alias, enabled_filters);
        conjoin([
            entity_filter.as_str(),
            where_clause.as_str(),
            filters.as_str(),
        ])
    }

    fn many_to_many_order_by_string(&self, alias: &str) -> String {
        self.many_to_many_order_by
            .as_deref()
            .map(|template| render_alias_template(template, alias))
            .unwrap_or_default()
    }

    fn order_by_string(&self, alias: &str) -> String {
        self.order_by
            .as_deref()
            .map(|template| render_alias_template(template, alias))
            .unwrap_or_default()
    }

    fn from_join_fragment(
        &self,
        alias: &str,
        inner_join: bool,
        include_subclasses: bool,
    ) -> String {
        match (&self.elements, &self.element_entity) {
            (ElementDefinition::OneToMany { .. }, Some(entity)) => {
                entity.from_join_fragment(alias, inner_join, include_subclasses)
            }
            _ => String::new(),
        }
    }

    fn where_join_fragment(
        &self,
        alias: &str,
        inner_join: bool,
        include_subclasses: bool,
    ) -> String {
        match (&self.elements, &self.element_entity) {
            (ElementDefinition::OneToMany { .. }, Some(entity)) => {
                entity.where_join_fragment(alias, inner_join, include_subclasses)
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::AnsiDialect;
    use crate::mapping_catalog::config::EntityDefinition;
    use crate::mapping_catalog::entity_mapping::TableEntityMapping;
    use std::collections::BTreeMap;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn item_entity() -> Arc<dyn EntityMapping> {
        let definition = EntityDefinition {
            name: "com.acme.Item".to_string(),
            table: "ITEMS".to_string(),
            id_columns: cols(&["ID"]),
            columns: cols(&["SKU"]),
            where_clause: Some("{alias}.ACTIVE = 1".to_string()),
            filters: vec![],
            inheritance: Default::default(),
            secondary_tables: vec![],
            associations: BTreeMap::new(),
            identifier_associations: BTreeMap::new(),
        };
        Arc::new(TableEntityMapping::from_definition(definition, Arc::new(AnsiDialect)).unwrap())
    }

    fn collection(
        role: &str,
        table: Option<&str>,
        elements: ElementDefinition,
    ) -> CollectionDefinition {
        CollectionDefinition {
            role: role.to_string(),
            table: table.map(str::to_string),
            key_columns: cols(&["OWNER_ID"]),
            elements,
            index: None,
            order_by: None,
            many_to_many_order_by: None,
            where_clause: None,
            many_to_many_where: None,
            filters: vec![],
            many_to_many_filters: vec![],
        }
    }

    #[test]
    fn test_one_to_many_uses_element_table() {
        let mut def = collection(
            "com.acme.Order.items",
            None,
            ElementDefinition::OneToMany {
                entity: "com.acme.Item".to_string(),
            },
        );
        def.order_by = Some("{alias}.POSITION asc".to_string());
        let mapping = TableCollectionMapping::from_definition(def, Some(item_entity())).unwrap();

        assert_eq!(mapping.table_name(), "ITEMS");
        assert!(mapping.is_one_to_many());
        assert!(!mapping.is_many_to_many());
        assert_eq!(mapping.element_column_names(), &cols(&["ID"])[..]);
        assert_eq!(
            mapping.select_fragment("items1_", "1_"),
            "items1_.OWNER_ID as OWNER_ID1_, items1_.ID as ID1_"
        );
        assert_eq!(
            mapping.filter_fragment("items1_", &EnabledFilters::new()),
            "items1_.ACTIVE = 1"
        );
        assert_eq!(mapping.order_by_string("items1_"), "items1_.POSITION asc");
    }

    #[test]
    fn test_many_to_many_restrictions() {
        let mut def = collection(
            "com.acme.Order.tags",
            Some("ORDER_TAG"),
            ElementDefinition::ManyToMany {
                entity: "com.acme.Item".to_string(),
                columns: cols(&["ITEM_ID"]),
            },
        );
        def.where_clause = Some("{alias}.LINKED = 1".to_string());
        def.many_to_many_where = Some("{alias}.VISIBLE = 1".to_string());
        def.many_to_many_order_by = Some("{alias}.SKU".to_string());
        let mapping = TableCollectionMapping::from_definition(def, Some(item_entity())).unwrap();

        assert_eq!(mapping.table_name(), "ORDER_TAG");
        assert_eq!(
            mapping.filter_fragment("tags1_", &EnabledFilters::new()),
            "tags1_.LINKED = 1"
        );
        assert_eq!(
            mapping.many_to_many_filter_fragment("item2_", &EnabledFilters::new()),
            "item2_.ACTIVE = 1 and item2_.VISIBLE = 1"
        );
        assert_eq!(mapping.many_to_many_order_by_string("item2_"), "item2_.SKU");
        assert_eq!(mapping.from_join_fragment("tags1_", false, true), "");
    }

    #[test]
    fn test_basic_collection_with_index() {
        let mut def = collection(
            "com.acme.Order.notes",
            Some("ORDER_NOTE"),
            ElementDefinition::Basic {
                columns: cols(&["TEXT"]),
            },
        );
        def.index = Some(IndexDefinition {
            columns: cols(&["IDX"]),
            entity: None,
        });
        let mapping = TableCollectionMapping::from_definition(def, None).unwrap();
        assert!(!mapping.has_entity_index());
        assert_eq!(mapping.element_entity_name(), None);
        assert_eq!(
            mapping.select_fragment("notes1_", "1_"),
            "notes1_.OWNER_ID as OWNER_ID1_, notes1_.IDX as IDX1_, notes1_.TEXT as TEXT1_"
        );
    }

    #[test]
    fn test_value_collection_requires_table() {
        let def = collection(
            "com.acme.Order.notes",
            None,
            ElementDefinition::Basic {
                columns: cols(&["TEXT"]),
            },
        );
        assert!(matches!(
            TableCollectionMapping::from_definition(def, None),
            Err(MappingError::InvalidMapping { .. })
        ));
    }
}
