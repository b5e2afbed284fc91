//! Mapping catalog: entity and collection descriptors by name.
//!
//! The compiler consumes mappings only through the [`EntityMapping`] and
//! [`CollectionMapping`] traits. This module also provides the table-backed
//! implementations loaded from a YAML mapping file (see [`config`]).

pub mod collection_mapping;
pub mod config;
pub mod entity_mapping;
pub mod errors;
pub mod filter;
pub mod mapping;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub use collection_mapping::TableCollectionMapping;
pub use config::{
    CollectionDefinition, ElementDefinition, EntityDefinition, IndexDefinition,
    InheritanceDefinition, MappingConfig, SecondaryTableDefinition, SubclassTableDefinition,
};
pub use entity_mapping::TableEntityMapping;
pub use errors::MappingError;
pub use filter::{EnabledFilters, FilterDefinition};
pub use mapping::{AssociationMapping, CollectionMapping, EntityMapping};

use crate::dialect::Dialect;

/// Registry of entity mappings by entity name and collection mappings by role.
#[derive(Debug, Clone, Default)]
pub struct MappingCatalog {
    entities: BTreeMap<String, Arc<dyn EntityMapping>>,
    collections: BTreeMap<String, Arc<dyn CollectionMapping>>,
}

impl MappingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity(&mut self, mapping: Arc<dyn EntityMapping>) -> Result<(), MappingError> {
        let name = mapping.entity_name().to_string();
        if self.entities.contains_key(&name) {
            return Err(MappingError::DuplicateMapping { name });
        }
        self.entities.insert(name, mapping);
        Ok(())
    }

    pub fn register_collection(
        &mut self,
        mapping: Arc<dyn CollectionMapping>,
    ) -> Result<(), MappingError> {
        let role = mapping.role().to_string();
        if self.collections.contains_key(&role) {
            return Err(MappingError::DuplicateMapping { name: role });
        }
        self.collections.insert(role, mapping);
        Ok(())
    }

    pub fn entity(&self, entity_name: &str) -> Result<Arc<dyn EntityMapping>, MappingError> {
        self.entities
            .get(entity_name)
            .cloned()
            .ok_or_else(|| MappingError::UnknownEntity {
                entity_name: entity_name.to_string(),
            })
    }

    pub fn collection(&self, role: &str) -> Result<Arc<dyn CollectionMapping>, MappingError> {
        self.collections
            .get(role)
            .cloned()
            .ok_or_else(|| MappingError::UnknownCollectionRole {
                role: role.to_string(),
            })
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn collection_roles(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Build table-backed mappings for every definition and validate cross references.
    pub fn from_config(
        config: MappingConfig,
        dialect: Arc<dyn Dialect>,
    ) -> Result<Self, MappingError> {
        let mut catalog = Self::new();
        let mut declared_associations: Vec<(String, Vec<AssociationMapping>)> = Vec::new();

        for definition in config.entities {
            declared_associations.push((
                definition.name.clone(),
                definition
                    .associations
                    .values()
                    .chain(definition.identifier_associations.values())
                    .cloned()
                    .collect(),
            ));
            let mapping = TableEntityMapping::from_definition(definition, dialect.clone())?;
            catalog.register_entity(Arc::new(mapping))?;
        }

        for definition in config.collections {
            let element_entity = match &definition.elements {
                ElementDefinition::OneToMany { entity }
                | ElementDefinition::ManyToMany { entity, .. } => {
                    Some(catalog.entity(entity).map_err(|_| {
                        MappingError::entity_error_with_context(
                            entity,
                            &format!("element of collection {}", definition.role),
                        )
                    })?)
                }
                _ => None,
            };
            if let ElementDefinition::Composite { associations, .. } = &definition.elements {
                declared_associations
                    .push((definition.role.clone(), associations.values().cloned().collect()));
            }
            let mapping = TableCollectionMapping::from_definition(definition, element_entity)?;
            catalog.register_collection(Arc::new(mapping))?;
        }

        for (owner, associations) in &declared_associations {
            for association in associations {
                catalog.validate_association(owner, association)?;
            }
        }
        catalog.validate_index_entities()?;

        log::info!(
            "✓ Loaded mapping catalog: {} entities, {} collections ({} dialect)",
            catalog.entities.len(),
            catalog.collections.len(),
            dialect.name()
        );
        Ok(catalog)
    }

    pub fn from_yaml_str(yaml: &str, dialect: Arc<dyn Dialect>) -> Result<Self, MappingError> {
        Self::from_config(MappingConfig::from_yaml_str(yaml)?, dialect)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(
        path: P,
        dialect: Arc<dyn Dialect>,
    ) -> Result<Self, MappingError> {
        log::debug!("Loading mappings from {}", path.as_ref().display());
        Self::from_config(MappingConfig::from_yaml_file(path)?, dialect)
    }

    fn validate_index_entities(&self) -> Result<(), MappingError> {
        for (role, collection) in &self.collections {
            if let Some(index_entity) = collection.index_entity_name() {
                self.entity(index_entity).map_err(|_| {
                    MappingError::entity_error_with_context(
                        index_entity,
                        &format!("index of collection {role}"),
                    )
                })?;
            }
        }
        Ok(())
    }

    /// Associations must point at a mapped entity (with matching key arity) or role.
    fn validate_association(
        &self,
        owner: &str,
        association: &AssociationMapping,
    ) -> Result<(), MappingError> {
        match association {
            AssociationMapping::ManyToOne {
                entity,
                columns,
                target_columns,
                ..
            }
            | AssociationMapping::OneToOne {
                entity,
                columns,
                target_columns,
            } => {
                let target = self.entity(entity).map_err(|_| {
                    MappingError::entity_error_with_context(
                        entity,
                        &format!("referenced from {owner}"),
                    )
                })?;
                let expected = if target_columns.is_empty() {
                    target.key_columns().len()
                } else {
                    target_columns.len()
                };
                if columns.len() != expected {
                    return Err(MappingError::invalid_with_context(
                        owner,
                        &format!(
                            "association to {entity} has {} columns, expected {expected}",
                            columns.len()
                        ),
                    ));
                }
                Ok(())
            }
            AssociationMapping::Collection { role } => self.collection(role).map(|_| ()),
            AssociationMapping::Component { associations } => associations
                .values()
                .try_for_each(|nested| self.validate_association(owner, nested)),
        }
    }
}
