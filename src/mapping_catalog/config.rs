//! Mapping file definitions.
//!
//! Mappings are defined in YAML with the following structure:
//!
//! ```yaml
//! entities:
//!   - name: com.acme.Order
//!     table: ORDERS
//!     id_columns: [ID]
//!     columns: [PLACED_AT, CUSTOMER_ID]
//!     where: "{alias}.DELETED = 0"
//!     filters:
//!       - name: tenancy
//!         condition: "{alias}.TENANT_ID = :tenant"
//!     associations:
//!       customer: { type: many_to_one, entity: com.acme.Customer, columns: [CUSTOMER_ID] }
//!       items: { type: collection, role: com.acme.Order.items }
//! collections:
//!   - role: com.acme.Order.items
//!     key_columns: [ORDER_ID]
//!     elements: { type: one_to_many, entity: com.acme.LineItem }
//!     order_by: "{alias}.POSITION asc"
//! ```
//!
//! Templates (`where`, filters, orderings) use `{alias}` for the table alias.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::errors::MappingError;
use super::filter::FilterDefinition;
use super::mapping::AssociationMapping;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,
}

impl MappingConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MappingError> {
        serde_yaml::from_str(yaml).map_err(|e| MappingError::ConfigParseError {
            error: e.to_string(),
        })
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, MappingError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| MappingError::ConfigReadError {
            error: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    pub table: String,
    pub id_columns: Vec<String>,
    /// Non-key columns of the driving table.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub inheritance: InheritanceDefinition,
    #[serde(default)]
    pub secondary_tables: Vec<SecondaryTableDefinition>,
    #[serde(default)]
    pub associations: BTreeMap<String, AssociationMapping>,
    #[serde(default)]
    pub identifier_associations: BTreeMap<String, AssociationMapping>,
}

/// Inheritance strategy of an entity hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum InheritanceDefinition {
    #[default]
    None,
    /// All subclasses share one table; a column holds the type.
    SingleTable {
        discriminator_column: String,
        /// When non-empty, rows are restricted to these discriminator values
        /// (mapping of a subtype).
        #[serde(default)]
        restrict_to: Vec<String>,
    },
    /// Each subclass adds a table joined on the primary key.
    Joined {
        /// Discriminator value reported for rows of the root class.
        root_value: String,
        #[serde(default)]
        subclass_tables: Vec<SubclassTableDefinition>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassTableDefinition {
    pub table: String,
    pub key_columns: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    pub discriminator_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryTableDefinition {
    pub table: String,
    pub key_columns: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Optional secondary rows are always outer joined.
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDefinition {
    pub role: String,
    /// Defaults to the element entity's table for one-to-many collections.
    #[serde(default)]
    pub table: Option<String>,
    pub key_columns: Vec<String>,
    pub elements: ElementDefinition,
    #[serde(default)]
    pub index: Option<IndexDefinition>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub many_to_many_order_by: Option<String>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub many_to_many_where: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub many_to_many_filters: Vec<FilterDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementDefinition {
    /// Values stored directly in the collection table.
    Basic { columns: Vec<String> },
    /// Embedded values stored in the collection table, possibly with associations.
    Composite {
        columns: Vec<String>,
        #[serde(default)]
        associations: BTreeMap<String, AssociationMapping>,
    },
    /// Elements are rows of the entity's own table.
    OneToMany { entity: String },
    /// Elements are referenced from a junction table.
    ManyToMany { entity: String, columns: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub columns: Vec<String>,
    /// Set for maps keyed by an entity.
    #[serde(default)]
    pub entity: Option<String>,
}
