//! Alias registry for one load query compilation.
//!
//! Allocates, and afterwards remembers, the SQL table alias(es) and column suffix
//! used for each query space. Aliases are created lazily the first time the join
//! renderer reaches a space and never change afterwards; the fetch processor only
//! ever looks them up.
//!
//! Key responsibilities:
//! - Unique table aliases (`order0_`, `items1_`, ...) and column suffixes (`0_`, `1_`, ...)
//! - Typed alias bundles for entity and collection spaces
//! - Coarse uid → table alias resolution, including composite spaces that
//!   delegate to the alias of their owning table

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::errors::LoadPlanCompileError;
use crate::load_plan::QuerySpaceUid;
use crate::mapping_catalog::{CollectionMapping, EntityMapping};
use crate::utils::sql_naming::{generate_alias, generate_suffix};

/// Aliases of an entity reference: its table alias and column suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReferenceAliases {
    pub table_alias: String,
    pub column_suffix: String,
}

/// Aliases of a collection reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReferenceAliases {
    /// The collection table, or the element entity table for many-to-many.
    pub table_alias: String,
    /// Junction table alias, many-to-many only.
    pub many_to_many_table_alias: Option<String>,
    pub collection_suffix: String,
    /// Aliases of the element entity, for entity-valued elements.
    pub entity_element_aliases: Option<EntityReferenceAliases>,
}

impl CollectionReferenceAliases {
    /// Alias of the table holding the collection key columns.
    pub fn collection_table_alias(&self) -> &str {
        self.many_to_many_table_alias
            .as_deref()
            .unwrap_or(&self.table_alias)
    }

    /// Alias of the table holding the element values.
    pub fn element_table_alias(&self) -> &str {
        &self.table_alias
    }
}

#[derive(Debug, Default)]
pub struct AliasRegistry {
    table_alias_counter: u32,
    suffix_counter: u32,
    table_aliases: HashMap<QuerySpaceUid, String>,
    composite_delegations: HashMap<QuerySpaceUid, String>,
    entity_aliases: HashMap<QuerySpaceUid, EntityReferenceAliases>,
    collection_aliases: HashMap<QuerySpaceUid, CollectionReferenceAliases>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_table_alias(&mut self, description: &str) -> String {
        let alias = generate_alias(description, self.table_alias_counter);
        self.table_alias_counter += 1;
        alias
    }

    fn create_suffix(&mut self) -> String {
        let suffix = generate_suffix(self.suffix_counter);
        self.suffix_counter += 1;
        suffix
    }

    /// Existing entity aliases of `uid`, or a new table alias and suffix.
    pub fn resolve_or_create_entity_aliases(
        &mut self,
        uid: QuerySpaceUid,
        mapping: &dyn EntityMapping,
    ) -> Result<EntityReferenceAliases, LoadPlanCompileError> {
        if let Some(existing) = self.entity_aliases.get(&uid) {
            return Ok(existing.clone());
        }
        let aliases = EntityReferenceAliases {
            table_alias: self.create_table_alias(mapping.entity_name()),
            column_suffix: self.create_suffix(),
        };
        log::trace!(
            "Aliased {} {uid} as {} (suffix {})",
            mapping.entity_name(),
            aliases.table_alias,
            aliases.column_suffix
        );
        self.register_entity_aliases(uid, aliases.clone())?;
        Ok(aliases)
    }

    /// Existing collection aliases of `uid`, or new ones. Entity-element aliases
    /// are also registered under `element_uid` when given.
    pub fn resolve_or_create_collection_aliases(
        &mut self,
        uid: QuerySpaceUid,
        mapping: &dyn CollectionMapping,
        element_uid: Option<QuerySpaceUid>,
    ) -> Result<CollectionReferenceAliases, LoadPlanCompileError> {
        if let Some(existing) = self.collection_aliases.get(&uid) {
            return Ok(existing.clone());
        }

        let (table_alias, many_to_many_table_alias) = if mapping.is_many_to_many() {
            let junction = self.create_table_alias(mapping.role());
            let element_name = mapping.element_entity_name().unwrap_or(mapping.role());
            let element = self.create_table_alias(element_name);
            (element, Some(junction))
        } else {
            (self.create_table_alias(mapping.role()), None)
        };
        let collection_suffix = self.create_suffix();
        let entity_element_aliases = match mapping.element_entity_name() {
            Some(_) => Some(EntityReferenceAliases {
                table_alias: table_alias.clone(),
                column_suffix: self.create_suffix(),
            }),
            None => None,
        };

        let aliases = CollectionReferenceAliases {
            table_alias,
            many_to_many_table_alias,
            collection_suffix,
            entity_element_aliases,
        };
        log::trace!(
            "Aliased {} {uid} as {} (suffix {})",
            mapping.role(),
            aliases.collection_table_alias(),
            aliases.collection_suffix
        );

        self.register_table_alias(uid, aliases.collection_table_alias())?;
        if let (Some(element_uid), Some(element_aliases)) =
            (element_uid, aliases.entity_element_aliases.as_ref())
        {
            self.register_entity_aliases(element_uid, element_aliases.clone())?;
        }
        self.collection_aliases.insert(uid, aliases.clone());
        Ok(aliases)
    }

    /// Register the coarse table alias of a space. Re-registering the same alias is a no-op.
    pub fn register_table_alias(
        &mut self,
        uid: QuerySpaceUid,
        alias: &str,
    ) -> Result<(), LoadPlanCompileError> {
        match self.table_aliases.get(&uid) {
            Some(existing) if existing == alias => Ok(()),
            Some(existing) => Err(LoadPlanCompileError::AliasConflict {
                uid,
                existing: existing.clone(),
                attempted: alias.to_string(),
            }),
            None => {
                self.table_aliases.insert(uid, alias.to_string());
                Ok(())
            }
        }
    }

    /// Register a complete entity alias bundle (collection elements, index entities).
    pub fn register_entity_aliases(
        &mut self,
        uid: QuerySpaceUid,
        aliases: EntityReferenceAliases,
    ) -> Result<(), LoadPlanCompileError> {
        if let Some(existing) = self.entity_aliases.get(&uid) {
            if *existing == aliases {
                return Ok(());
            }
            return Err(LoadPlanCompileError::AliasConflict {
                uid,
                existing: format!("{} ({})", existing.table_alias, existing.column_suffix),
                attempted: format!("{} ({})", aliases.table_alias, aliases.column_suffix),
            });
        }
        self.register_table_alias(uid, &aliases.table_alias)?;
        self.entity_aliases.insert(uid, aliases);
        Ok(())
    }

    /// A composite space resolves to the alias of the table it is embedded in.
    pub fn register_composite_delegation(
        &mut self,
        composite_uid: QuerySpaceUid,
        ancestor_alias: &str,
    ) -> Result<(), LoadPlanCompileError> {
        match self.composite_delegations.get(&composite_uid) {
            Some(existing) if existing != ancestor_alias => {
                Err(LoadPlanCompileError::AliasConflict {
                    uid: composite_uid,
                    existing: existing.clone(),
                    attempted: ancestor_alias.to_string(),
                })
            }
            _ => {
                self.composite_delegations
                    .insert(composite_uid, ancestor_alias.to_string());
                Ok(())
            }
        }
    }

    pub fn lookup_table_alias(&self, uid: QuerySpaceUid) -> Option<&str> {
        self.table_aliases
            .get(&uid)
            .or_else(|| self.composite_delegations.get(&uid))
            .map(String::as_str)
    }

    pub fn lookup_entity_aliases(&self, uid: QuerySpaceUid) -> Option<&EntityReferenceAliases> {
        self.entity_aliases.get(&uid)
    }

    pub fn lookup_collection_aliases(
        &self,
        uid: QuerySpaceUid,
    ) -> Option<&CollectionReferenceAliases> {
        self.collection_aliases.get(&uid)
    }

    pub fn require_table_alias(&self, uid: QuerySpaceUid) -> Result<&str, LoadPlanCompileError> {
        self.lookup_table_alias(uid)
            .ok_or(LoadPlanCompileError::UnresolvedAlias { uid })
    }

    pub fn require_entity_aliases(
        &self,
        uid: QuerySpaceUid,
    ) -> Result<&EntityReferenceAliases, LoadPlanCompileError> {
        self.lookup_entity_aliases(uid)
            .ok_or(LoadPlanCompileError::UnresolvedAlias { uid })
    }

    pub fn require_collection_aliases(
        &self,
        uid: QuerySpaceUid,
    ) -> Result<&CollectionReferenceAliases, LoadPlanCompileError> {
        self.lookup_collection_aliases(uid)
            .ok_or(LoadPlanCompileError::UnresolvedAlias { uid })
    }

    /// Whether join rendering has aliased this space (entity, collection or composite).
    pub fn is_aliased(&self, uid: QuerySpaceUid) -> bool {
        self.lookup_table_alias(uid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_plan::QuerySpaces;
    use crate::sql_render::tests::fixtures;
    use std::collections::HashSet;

    /// Distinct uids for registry tests; the spaces themselves are not inspected.
    fn uids(count: usize) -> Vec<QuerySpaceUid> {
        let mut spaces = QuerySpaces::new();
        (0..count).map(|_| spaces.add_composite_space()).collect()
    }

    #[test]
    fn test_entity_aliases_are_sequential_and_idempotent() {
        let catalog = fixtures::catalog();
        let a = catalog.entity("A").unwrap();
        let b = catalog.entity("B").unwrap();
        let ids = uids(2);
        let mut registry = AliasRegistry::new();

        let first = registry.resolve_or_create_entity_aliases(ids[0], a.as_ref()).unwrap();
        let second = registry.resolve_or_create_entity_aliases(ids[1], b.as_ref()).unwrap();
        assert_eq!(first.table_alias, "a0_");
        assert_eq!(first.column_suffix, "0_");
        assert_eq!(second.table_alias, "b1_");
        assert_eq!(second.column_suffix, "1_");

        let again = registry.resolve_or_create_entity_aliases(ids[0], a.as_ref()).unwrap();
        assert_eq!(again, first);
        assert_eq!(registry.lookup_table_alias(ids[1]), Some("b1_"));
    }

    #[test]
    fn test_self_association_gets_distinct_aliases() {
        let catalog = fixtures::catalog();
        let a = catalog.entity("A").unwrap();
        let ids = uids(3);
        let mut registry = AliasRegistry::new();
        let aliases: HashSet<String> = ids
            .iter()
            .map(|uid| {
                registry
                    .resolve_or_create_entity_aliases(*uid, a.as_ref())
                    .unwrap()
                    .table_alias
            })
            .collect();
        assert_eq!(aliases.len(), 3);
    }

    #[test]
    fn test_one_to_many_collection_aliases() {
        let catalog = fixtures::catalog();
        let items = catalog.collection("A.items").unwrap();
        let ids = uids(2);
        let mut registry = AliasRegistry::new();

        let aliases = registry
            .resolve_or_create_collection_aliases(ids[0], items.as_ref(), Some(ids[1]))
            .unwrap();
        assert_eq!(aliases.table_alias, "items0_");
        assert_eq!(aliases.many_to_many_table_alias, None);
        assert_eq!(aliases.collection_suffix, "0_");
        assert_eq!(aliases.collection_table_alias(), "items0_");

        let element = registry.require_entity_aliases(ids[1]).unwrap();
        assert_eq!(element.table_alias, "items0_");
        assert_eq!(element.column_suffix, "1_");
    }

    #[test]
    fn test_many_to_many_collection_aliases() {
        let catalog = fixtures::catalog();
        let tags = catalog.collection("A.tags").unwrap();
        let ids = uids(2);
        let mut registry = AliasRegistry::new();

        let aliases = registry
            .resolve_or_create_collection_aliases(ids[0], tags.as_ref(), Some(ids[1]))
            .unwrap();
        assert_eq!(aliases.many_to_many_table_alias.as_deref(), Some("tags0_"));
        assert_eq!(aliases.element_table_alias(), "tag1_");
        assert_eq!(registry.lookup_table_alias(ids[0]), Some("tags0_"));
        assert_eq!(registry.lookup_table_alias(ids[1]), Some("tag1_"));
    }

    #[test]
    fn test_basic_collection_has_no_element_aliases() {
        let catalog = fixtures::catalog();
        let notes = catalog.collection("A.notes").unwrap();
        let ids = uids(1);
        let mut registry = AliasRegistry::new();
        let aliases = registry
            .resolve_or_create_collection_aliases(ids[0], notes.as_ref(), None)
            .unwrap();
        assert!(aliases.entity_element_aliases.is_none());
    }

    #[test]
    fn test_conflicting_registration() {
        let ids = uids(1);
        let mut registry = AliasRegistry::new();
        registry.register_table_alias(ids[0], "a0_").unwrap();
        registry.register_table_alias(ids[0], "a0_").unwrap();
        assert_eq!(
            registry.register_table_alias(ids[0], "b1_").unwrap_err(),
            LoadPlanCompileError::AliasConflict {
                uid: ids[0],
                existing: "a0_".to_string(),
                attempted: "b1_".to_string(),
            }
        );
    }

    #[test]
    fn test_composite_delegation_and_unresolved() {
        let ids = uids(2);
        let mut registry = AliasRegistry::new();
        assert_eq!(
            registry.require_table_alias(ids[0]).unwrap_err(),
            LoadPlanCompileError::UnresolvedAlias { uid: ids[0] }
        );
        registry.register_composite_delegation(ids[0], "a0_").unwrap();
        assert_eq!(registry.require_table_alias(ids[0]).unwrap(), "a0_");
        assert!(registry.lookup_entity_aliases(ids[0]).is_none());
        assert!(!registry.is_aliased(ids[1]));
    }
}
