//! Table-backed entity mapping.
//!
//! Key responsibilities:
//! - Render the SELECT fragment of an entity: key, property and secondary/subclass
//!   table columns, plus a discriminator column for polymorphic hierarchies
//! - Render row restrictions (mapping `where`, single-table discriminator, filters)
//! - Render joins to secondary and joined-subclass tables through the dialect

use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::{EntityDefinition, InheritanceDefinition, SecondaryTableDefinition};
use super::errors::MappingError;
use super::filter::{conjoin, render_enabled_filters, EnabledFilters, FilterDefinition};
use super::mapping::{select_columns, AssociationMapping, EntityMapping, DISCRIMINATOR_ALIAS};
use crate::dialect::{Dialect, JoinFragment, JoinType};
use crate::utils::sql_naming::{column_alias, generate_table_alias, qualify, render_alias_template};

/// Entity mapped onto a driving table with optional secondary and subclass tables.
#[derive(Debug)]
pub struct TableEntityMapping {
    name: String,
    table: String,
    id_columns: Vec<String>,
    columns: Vec<String>,
    where_clause: Option<String>,
    filters: Vec<FilterDefinition>,
    inheritance: InheritanceDefinition,
    secondary_tables: Vec<SecondaryTableDefinition>,
    associations: BTreeMap<String, AssociationMapping>,
    identifier_associations: BTreeMap<String, AssociationMapping>,
    dialect: Arc<dyn Dialect>,
}

impl TableEntityMapping {
    pub fn from_definition(
        definition: EntityDefinition,
        dialect: Arc<dyn Dialect>,
    ) -> Result<Self, MappingError> {
        if definition.id_columns.is_empty() {
            return Err(MappingError::invalid_with_context(
                &definition.name,
                "entity must declare at least one id column",
            ));
        }
        if definition.table.trim().is_empty() {
            return Err(MappingError::invalid_with_context(
                &definition.name,
                "entity table name is empty",
            ));
        }
        let key_arity = definition.id_columns.len();
        for secondary in &definition.secondary_tables {
            if secondary.key_columns.len() != key_arity {
                return Err(MappingError::invalid_with_context(
                    &definition.name,
                    &format!(
                        "secondary table {} has {} key columns, expected {key_arity}",
                        secondary.table,
                        secondary.key_columns.len()
                    ),
                ));
            }
        }
        if let InheritanceDefinition::Joined { subclass_tables, .. } = &definition.inheritance {
            if let Some(subclass) = subclass_tables
                .iter()
                .find(|subclass| subclass.key_columns.len() != key_arity)
            {
                return Err(MappingError::invalid_with_context(
                    &definition.name,
                    &format!("subclass table {} key columns do not match the id", subclass.table),
                ));
            }
        }

        Ok(Self {
            name: definition.name,
            table: definition.table,
            id_columns: definition.id_columns,
            columns: definition.columns,
            where_clause: definition.where_clause,
            filters: definition.filters,
            inheritance: definition.inheritance,
            secondary_tables: definition.secondary_tables,
            associations: definition.associations,
            identifier_associations: definition.identifier_associations,
            dialect,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn associations(&self) -> &BTreeMap<String, AssociationMapping> {
        &self.associations
    }

    pub fn identifier_associations(&self) -> &BTreeMap<String, AssociationMapping> {
        &self.identifier_associations
    }

    fn subclass_table_offset(&self) -> usize {
        self.secondary_tables.len() + 1
    }

    /// Alias of the discriminator column for one entity reference.
    fn discriminator_column_alias(suffix: &str) -> String {
        column_alias(DISCRIMINATOR_ALIAS, suffix)
    }

    fn discriminator_restriction(&self, alias: &str) -> Option<String> {
        match &self.inheritance {
            InheritanceDefinition::SingleTable {
                discriminator_column,
                restrict_to,
            } if !restrict_to.is_empty() => Some(format!(
                "{alias}.{discriminator_column} in ({})",
                restrict_to.join(", ")
            )),
            _ => None,
        }
    }

    fn build_join_fragment(
        &self,
        alias: &str,
        inner_join: bool,
        include_subclasses: bool,
    ) -> Box<dyn JoinFragment> {
        let mut fragment = self.dialect.create_outer_join_fragment();
        let lhs_columns = qualify(alias, &self.id_columns);

        for (idx, secondary) in self.secondary_tables.iter().enumerate() {
            let join_type = JoinType::for_required(inner_join && !secondary.optional);
            fragment.add_join(
                &secondary.table,
                &generate_table_alias(alias, idx + 1),
                &lhs_columns,
                &secondary.key_columns,
                join_type,
                "",
            );
        }

        if include_subclasses {
            if let InheritanceDefinition::Joined { subclass_tables, .. } = &self.inheritance {
                let offset = self.subclass_table_offset();
                for (idx, subclass) in subclass_tables.iter().enumerate() {
                    fragment.add_join(
                        &subclass.table,
                        &generate_table_alias(alias, offset + idx),
                        &lhs_columns,
                        &subclass.key_columns,
                        JoinType::LeftOuter,
                        "",
                    );
                }
            }
        }
        fragment
    }

    fn discriminator_case(&self, alias: &str, return_column: Option<&str>) -> Option<String> {
        match &self.inheritance {
            InheritanceDefinition::None => None,
            InheritanceDefinition::SingleTable {
                discriminator_column,
                ..
            } => Some(match return_column {
                Some(name) => format!("{alias}.{discriminator_column} as {name}"),
                None => format!("{alias}.{discriminator_column}"),
            }),
            InheritanceDefinition::Joined {
                root_value,
                subclass_tables,
            } => {
                let mut case = self.dialect.create_case_fragment();
                if let Some(name) = return_column {
                    case.set_return_column_name(name);
                }
                // most specific table first, the driving table last
                let offset = self.subclass_table_offset();
                for (idx, subclass) in subclass_tables.iter().enumerate().rev() {
                    case.add_when_column_not_null(
                        &generate_table_alias(alias, offset + idx),
                        &subclass.key_columns[0],
                        &subclass.discriminator_value,
                    );
                }
                case.add_when_column_not_null(alias, &self.id_columns[0], root_value);
                Some(case.to_fragment_string())
            }
        }
    }
}

impl EntityMapping for TableEntityMapping {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn key_columns(&self) -> &[String] {
        &self.id_columns
    }

    fn select_fragment(&self, alias: &str, suffix: &str) -> String {
        let mut parts = select_columns(alias, &self.id_columns, suffix);
        parts.extend(select_columns(alias, &self.columns, suffix));

        for (idx, secondary) in self.secondary_tables.iter().enumerate() {
            let table_alias = generate_table_alias(alias, idx + 1);
            parts.extend(select_columns(&table_alias, &secondary.columns, suffix));
        }
        if let InheritanceDefinition::Joined { subclass_tables, .. } = &self.inheritance {
            let offset = self.subclass_table_offset();
            for (idx, subclass) in subclass_tables.iter().enumerate() {
                let table_alias = generate_table_alias(alias, offset + idx);
                parts.extend(select_columns(&table_alias, &subclass.columns, suffix));
            }
        }

        let discriminator_alias = Self::discriminator_column_alias(suffix);
        if let Some(discriminator) = self.discriminator_case(alias, Some(&discriminator_alias)) {
            parts.push(discriminator);
        }
        parts.join(", ")
    }

    fn filter_fragment(&self, alias: &str, enabled_filters: &EnabledFilters) -> String {
        let where_clause = self
            .where_clause
            .as_deref()
            .map(|template| render_alias_template(template, alias))
            .unwrap_or_default();
        let discriminator = self.discriminator_restriction(alias).unwrap_or_default();
        let filters = render_enabled_filters(&self.filters, alias, enabled_filters);
        conjoin([where_clause.as_str(), discriminator.as_str(), filters.as_str()])
    }

    fn from_join_fragment(
        &self,
        alias: &str,
        inner_join: bool,
        include_subclasses: bool,
    ) -> String {
        self.build_join_fragment(alias, inner_join, include_subclasses)
            .to_from_fragment_string()
    }

    fn where_join_fragment(
        &self,
        alias: &str,
        inner_join: bool,
        include_subclasses: bool,
    ) -> String {
        self.build_join_fragment(alias, inner_join, include_subclasses)
            .to_where_fragment_string()
    }

    fn discriminator_fragment(&self, alias: &str) -> Option<String> {
        self.discriminator_case(alias, None)
    }

    fn association(&self, attribute: &str) -> Option<&AssociationMapping> {
        self.associations.get(attribute)
    }

    fn identifier_association(&self, attribute: &str) -> Option<&AssociationMapping> {
        self.identifier_associations.get(attribute)
    }
}
