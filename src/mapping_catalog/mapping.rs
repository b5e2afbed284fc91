//! Mapping descriptor capabilities consumed by the compiler.
//!
//! The compiler only talks to mappings through these traits: table and key
//! metadata, plus the ability to render their own SELECT, filter and join
//! fragments for a given alias. Association metadata is used by the load plan
//! builder to turn attribute paths into joins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::filter::EnabledFilters;

/// Column alias of the discriminator value in entity SELECT fragments.
pub const DISCRIMINATOR_ALIAS: &str = "clazz_";

/// How an entity attribute reaches another query space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssociationMapping {
    /// Foreign key on the owning table referencing another entity.
    ManyToOne {
        entity: String,
        /// Foreign key columns on the owning side.
        columns: Vec<String>,
        /// Referenced columns; defaults to the target's key columns.
        #[serde(default)]
        target_columns: Vec<String>,
        /// A required association is rendered as an inner join.
        #[serde(default)]
        required: bool,
    },
    /// Shared or foreign-key one-to-one. Never required: the other side may be absent.
    OneToOne {
        entity: String,
        columns: Vec<String>,
        #[serde(default)]
        target_columns: Vec<String>,
    },
    /// A mapped collection, by role.
    Collection { role: String },
    /// Embedded value stored in the owner's table.
    Component {
        #[serde(default)]
        associations: BTreeMap<String, AssociationMapping>,
    },
}

/// Capabilities of an entity mapping.
pub trait EntityMapping: fmt::Debug + Send + Sync {
    fn entity_name(&self) -> &str;

    /// The driving (root) table of the entity.
    fn table_name(&self) -> &str;

    /// Primary key columns of the driving table.
    fn key_columns(&self) -> &[String];

    /// `alias.COL as COL{suffix}, ...` for every selected column.
    fn select_fragment(&self, alias: &str, suffix: &str) -> String;

    /// Conditions restricting rows of this entity: mapping `where` clause,
    /// discriminator restriction and enabled filters. Empty when unrestricted.
    fn filter_fragment(&self, alias: &str, enabled_filters: &EnabledFilters) -> String;

    /// Joins to secondary/subclass tables, appended after the driving table.
    fn from_join_fragment(
        &self,
        _alias: &str,
        _inner_join: bool,
        _include_subclasses: bool,
    ) -> String {
        String::new()
    }

    /// WHERE text accompanying `from_join_fragment` (dialects with WHERE-style joins).
    fn where_join_fragment(
        &self,
        _alias: &str,
        _inner_join: bool,
        _include_subclasses: bool,
    ) -> String {
        String::new()
    }

    /// CASE expression resolving the concrete subclass of a row, for polymorphic hierarchies.
    fn discriminator_fragment(&self, _alias: &str) -> Option<String> {
        None
    }

    fn association(&self, _attribute: &str) -> Option<&AssociationMapping> {
        None
    }

    /// Associations that are part of a composite identifier (key-many-to-one).
    fn identifier_association(&self, _attribute: &str) -> Option<&AssociationMapping> {
        None
    }
}

/// Capabilities of a collection mapping.
pub trait CollectionMapping: fmt::Debug + Send + Sync {
    /// Fully qualified role, e.g. `com.acme.Order.items`.
    fn role(&self) -> &str;

    /// Collection table: the junction table for many-to-many, the element
    /// entity's table for one-to-many.
    fn table_name(&self) -> &str;

    /// Columns of the collection table referencing the owner.
    fn key_columns(&self) -> &[String];

    fn is_many_to_many(&self) -> bool;

    fn is_one_to_many(&self) -> bool;

    /// Element entity for one-to-many and many-to-many collections.
    fn element_entity_name(&self) -> Option<&str>;

    /// Columns of the collection table holding the element (foreign key for
    /// entity elements).
    fn element_column_names(&self) -> &[String];

    /// Associations declared inside composite elements.
    fn element_association(&self, _attribute: &str) -> Option<&AssociationMapping> {
        None
    }

    fn has_composite_elements(&self) -> bool {
        false
    }

    /// True for maps keyed by an entity.
    fn has_entity_index(&self) -> bool {
        false
    }

    fn index_entity_name(&self) -> Option<&str> {
        None
    }

    fn index_column_names(&self) -> &[String] {
        &[]
    }

    /// Key, element and index columns of the collection table.
    fn select_fragment(&self, alias: &str, suffix: &str) -> String;

    fn filter_fragment(&self, alias: &str, enabled_filters: &EnabledFilters) -> String;

    /// Restriction applied to the element table of a many-to-many collection.
    fn many_to_many_filter_fragment(
        &self,
        _alias: &str,
        _enabled_filters: &EnabledFilters,
    ) -> String {
        String::new()
    }

    fn many_to_many_order_by_string(&self, _alias: &str) -> String {
        String::new()
    }

    fn order_by_string(&self, _alias: &str) -> String {
        String::new()
    }

    fn from_join_fragment(
        &self,
        _alias: &str,
        _inner_join: bool,
        _include_subclasses: bool,
    ) -> String {
        String::new()
    }

    fn where_join_fragment(
        &self,
        _alias: &str,
        _inner_join: bool,
        _include_subclasses: bool,
    ) -> String {
        String::new()
    }
}

/// Render `alias.COL as COL{suffix}` for each column.
pub fn select_columns(alias: &str, columns: &[String], suffix: &str) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            format!(
                "{alias}.{column} as {}",
                crate::utils::sql_naming::column_alias(column, suffix)
            )
        })
        .collect()
}
