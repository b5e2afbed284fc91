//! Reader descriptors.
//!
//! Every entity or collection materialized from a result row gets one reader: it
//! names the query space, the aliases its columns were selected under, and where
//! the materialized value attaches (owner space + attribute path). Readers are
//! appended in plan visitation order.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::alias_resolver::{CollectionReferenceAliases, EntityReferenceAliases};
use crate::load_plan::QuerySpaceUid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReader {
    pub uid: QuerySpaceUid,
    pub entity_name: String,
    /// Query space the entity attaches to; `None` for a root return.
    pub owner: Option<QuerySpaceUid>,
    pub attribute_path: String,
    pub aliases: EntityReferenceAliases,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReader {
    pub uid: QuerySpaceUid,
    pub role: String,
    pub owner: Option<QuerySpaceUid>,
    pub attribute_path: String,
    pub aliases: CollectionReferenceAliases,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaderDescriptor {
    Entity(EntityReader),
    Collection(CollectionReader),
}

impl ReaderDescriptor {
    pub fn query_space_uid(&self) -> QuerySpaceUid {
        match self {
            ReaderDescriptor::Entity(reader) => reader.uid,
            ReaderDescriptor::Collection(reader) => reader.uid,
        }
    }

    pub fn attribute_path(&self) -> &str {
        match self {
            ReaderDescriptor::Entity(reader) => &reader.attribute_path,
            ReaderDescriptor::Collection(reader) => &reader.attribute_path,
        }
    }
}

impl fmt::Display for ReaderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self.attribute_path() {
            "" => "<root>",
            path => path,
        };
        match self {
            ReaderDescriptor::Entity(reader) => write!(
                f,
                "entity {} {} as {} (suffix {}) at {path}",
                reader.entity_name,
                reader.uid,
                reader.aliases.table_alias,
                reader.aliases.column_suffix
            ),
            ReaderDescriptor::Collection(reader) => write!(
                f,
                "collection {} {} as {} (suffix {}) at {path}",
                reader.role,
                reader.uid,
                reader.aliases.collection_table_alias(),
                reader.aliases.collection_suffix
            ),
        }
    }
}

/// Ordered reader list built during fetch processing.
#[derive(Debug, Clone, Default)]
pub struct ReaderCollector {
    readers: Vec<ReaderDescriptor>,
}

impl ReaderCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reader: ReaderDescriptor) {
        log::trace!("Reader: {reader}");
        self.readers.push(reader);
    }

    pub fn readers(&self) -> &[ReaderDescriptor] {
        &self.readers
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn into_readers(self) -> Vec<ReaderDescriptor> {
        self.readers
    }
}
