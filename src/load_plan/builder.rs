//! Load plan builder.
//!
//! Turns attribute names into query spaces, joins and fetches using the mapping
//! catalog, so that every join's columns and role agree with the mappings the
//! compiler will later render against.
//!
//! ```ignore
//! let mut builder = LoadPlanBuilder::new(&catalog);
//! let mut order = builder.entity_return("com.acme.Order")?;
//! let customer = builder.fetch(&order, "customer", FetchStrategy::joined())?;
//! order.fetches.push(customer);
//! let plan = builder.build(vec![Return::Entity(order)])?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::errors::LoadPlanBuildError;
use super::fetch::{
    CollectionFetch, CollectionGraph, CollectionGraphKind, CollectionReturn, CompositeFetch,
    EntityFetch, EntityReturn, Fetch, FetchSource, FetchStrategy, Return,
};
use super::query_space::{JoinRole, QuerySpaceKind, QuerySpaceUid, QuerySpaces};
use super::LoadPlan;
use crate::mapping_catalog::{AssociationMapping, CollectionMapping, MappingCatalog, MappingError};

/// Path segment of a collection's element graph.
pub const ELEMENTS_PATH: &str = "<elements>";
/// Path segment of a collection's index graph.
pub const INDEX_PATH: &str = "<index>";

/// What a composite query space resolves its associations against.
#[derive(Debug, Clone)]
enum CompositeOwner {
    /// Embedded component of an entity: its own associations, stored in the
    /// owning entity's table.
    Component {
        label: String,
        associations: BTreeMap<String, AssociationMapping>,
        owner_key_columns: Vec<String>,
    },
    /// Composite elements of a collection.
    CollectionElements(Arc<dyn CollectionMapping>),
}

pub struct LoadPlanBuilder<'a> {
    catalog: &'a MappingCatalog,
    query_spaces: QuerySpaces,
    composites: HashMap<QuerySpaceUid, CompositeOwner>,
}

/// Association metadata resolved for one fetch owner.
struct ResolvedAssociation {
    owner_label: String,
    association: AssociationMapping,
    owner_key_columns: Vec<String>,
}

fn child_path(owner_path: &str, attribute: &str) -> String {
    if owner_path.is_empty() {
        attribute.to_string()
    } else {
        format!("{owner_path}.{attribute}")
    }
}

impl<'a> LoadPlanBuilder<'a> {
    pub fn new(catalog: &'a MappingCatalog) -> Self {
        Self {
            catalog,
            query_spaces: QuerySpaces::new(),
            composites: HashMap::new(),
        }
    }

    pub fn entity_return(&mut self, entity_name: &str) -> Result<EntityReturn, LoadPlanBuildError> {
        let mapping = self.catalog.entity(entity_name)?;
        let uid = self.query_spaces.add_entity_space(mapping);
        log::debug!("Root entity return {entity_name} {uid}");
        Ok(EntityReturn {
            uid,
            identifier_fetches: Vec::new(),
            fetches: Vec::new(),
        })
    }

    pub fn collection_return(
        &mut self,
        role: &str,
    ) -> Result<CollectionReturn, LoadPlanBuildError> {
        let collection = self.catalog.collection(role)?;
        let uid = self.query_spaces.add_collection_space(collection.clone());
        log::debug!("Root collection return {role} {uid}");
        let (element_graph, index_graph) = self.collection_graphs(uid, &collection, "")?;
        Ok(CollectionReturn {
            uid,
            element_graph,
            index_graph,
        })
    }

    /// Create the fetch of `attribute` owned by `owner`, with its query space and join.
    pub fn fetch(
        &mut self,
        owner: &dyn FetchSource,
        attribute: &str,
        strategy: FetchStrategy,
    ) -> Result<Fetch, LoadPlanBuildError> {
        let resolved = self.resolve_association(owner.query_space_uid(), attribute, false)?;
        self.create_fetch(
            owner,
            attribute,
            strategy,
            resolved,
            JoinRole::Association(attribute.to_string()),
        )
    }

    /// Fetch of an association that is part of the owner entity's composite identifier.
    pub fn identifier_fetch(
        &mut self,
        owner: &dyn FetchSource,
        attribute: &str,
        strategy: FetchStrategy,
    ) -> Result<Fetch, LoadPlanBuildError> {
        let resolved = self.resolve_association(owner.query_space_uid(), attribute, true)?;
        if !matches!(
            resolved.association,
            AssociationMapping::ManyToOne { .. } | AssociationMapping::OneToOne { .. }
        ) {
            return Err(LoadPlanBuildError::UnsupportedFetch {
                owner: resolved.owner_label,
                attribute: attribute.to_string(),
                reason: "identifier fetches must reference an entity".to_string(),
            });
        }
        self.create_fetch(
            owner,
            attribute,
            strategy,
            resolved,
            JoinRole::Identifier(attribute.to_string()),
        )
    }

    /// Add a `with` condition (`{alias}` = the fetched table) to the join of a fetch.
    pub fn with_condition(
        &mut self,
        fetch: &Fetch,
        condition: impl Into<String>,
    ) -> Result<(), LoadPlanBuildError> {
        if !fetch.strategy().is_join_fetched() {
            return Err(LoadPlanBuildError::InvalidDefinition(format!(
                "`{}` is not join fetched and cannot carry a with condition",
                fetch.property_path()
            )));
        }
        self.query_spaces
            .add_with_condition(fetch.query_space_uid(), condition)
    }

    pub fn build(self, returns: Vec<Return>) -> Result<LoadPlan, LoadPlanBuildError> {
        if returns.is_empty() {
            return Err(LoadPlanBuildError::InvalidDefinition(
                "a load plan needs at least one return".to_string(),
            ));
        }
        log::debug!(
            "Built load plan: {} returns over {} query spaces",
            returns.len(),
            self.query_spaces.len()
        );
        Ok(LoadPlan::new(self.query_spaces, returns))
    }

    fn resolve_association(
        &self,
        owner_uid: QuerySpaceUid,
        attribute: &str,
        identifier: bool,
    ) -> Result<ResolvedAssociation, LoadPlanBuildError> {
        let space = self
            .query_spaces
            .get(owner_uid)
            .ok_or(LoadPlanBuildError::UnknownQuerySpace(owner_uid))?;

        match space.kind() {
            QuerySpaceKind::Entity(mapping) => {
                let association = if identifier {
                    mapping.identifier_association(attribute)
                } else {
                    mapping.association(attribute)
                };
                let association = association.cloned().ok_or_else(|| {
                    LoadPlanBuildError::Mapping(MappingError::UnknownAttribute {
                        entity_name: mapping.entity_name().to_string(),
                        attribute: attribute.to_string(),
                    })
                })?;
                Ok(ResolvedAssociation {
                    owner_label: mapping.entity_name().to_string(),
                    association,
                    owner_key_columns: mapping.key_columns().to_vec(),
                })
            }
            QuerySpaceKind::Composite if !identifier => match self.composites.get(&owner_uid) {
                Some(CompositeOwner::Component {
                    label,
                    associations,
                    owner_key_columns,
                }) => {
                    let association = associations.get(attribute).cloned().ok_or_else(|| {
                        LoadPlanBuildError::UnknownAttribute {
                            owner: label.clone(),
                            attribute: attribute.to_string(),
                        }
                    })?;
                    Ok(ResolvedAssociation {
                        owner_label: label.clone(),
                        association,
                        owner_key_columns: owner_key_columns.clone(),
                    })
                }
                Some(CompositeOwner::CollectionElements(collection)) => {
                    let label = format!("{}.{ELEMENTS_PATH}", collection.role());
                    let association = collection
                        .element_association(attribute)
                        .cloned()
                        .ok_or_else(|| LoadPlanBuildError::UnknownAttribute {
                            owner: label.clone(),
                            attribute: attribute.to_string(),
                        })?;
                    Ok(ResolvedAssociation {
                        owner_label: label,
                        association,
                        owner_key_columns: Vec::new(),
                    })
                }
                None => Err(LoadPlanBuildError::UnknownQuerySpace(owner_uid)),
            },
            other => Err(LoadPlanBuildError::NotAFetchSource {
                uid: owner_uid,
                reason: if identifier {
                    format!("a {} has no composite identifier", other.name())
                } else {
                    format!("a {} owns no attributes", other.name())
                },
            }),
        }
    }

    fn create_fetch(
        &mut self,
        owner: &dyn FetchSource,
        attribute: &str,
        strategy: FetchStrategy,
        resolved: ResolvedAssociation,
        role: JoinRole,
    ) -> Result<Fetch, LoadPlanBuildError> {
        let owner_uid = owner.query_space_uid();
        let path = child_path(owner.property_path(), attribute);

        match resolved.association {
            AssociationMapping::ManyToOne {
                entity,
                columns,
                target_columns,
                required,
            } => {
                let uid = self.add_entity_join(
                    owner_uid,
                    &entity,
                    role,
                    required,
                    columns,
                    target_columns,
                    strategy.is_join_fetched(),
                )?;
                Ok(Fetch::Entity(EntityFetch {
                    attribute: attribute.to_string(),
                    uid,
                    strategy,
                    path,
                    identifier_fetches: Vec::new(),
                    fetches: Vec::new(),
                }))
            }
            AssociationMapping::OneToOne {
                entity,
                columns,
                target_columns,
            } => {
                let uid = self.add_entity_join(
                    owner_uid,
                    &entity,
                    role,
                    false,
                    columns,
                    target_columns,
                    strategy.is_join_fetched(),
                )?;
                Ok(Fetch::Entity(EntityFetch {
                    attribute: attribute.to_string(),
                    uid,
                    strategy,
                    path,
                    identifier_fetches: Vec::new(),
                    fetches: Vec::new(),
                }))
            }
            AssociationMapping::Collection { role: collection_role } => {
                if resolved.owner_key_columns.is_empty() {
                    return Err(LoadPlanBuildError::UnsupportedFetch {
                        owner: resolved.owner_label,
                        attribute: attribute.to_string(),
                        reason: "collections inside collection elements are not supported"
                            .to_string(),
                    });
                }
                let collection = self.catalog.collection(&collection_role)?;
                let uid = self.query_spaces.add_collection_space(collection.clone());
                self.link(
                    owner_uid,
                    uid,
                    role,
                    false,
                    resolved.owner_key_columns,
                    collection.key_columns().to_vec(),
                    strategy.is_join_fetched(),
                )?;
                let (element_graph, index_graph) = self.collection_graphs(uid, &collection, &path)?;
                Ok(Fetch::Collection(CollectionFetch {
                    attribute: attribute.to_string(),
                    uid,
                    strategy,
                    path,
                    element_graph,
                    index_graph,
                }))
            }
            AssociationMapping::Component { associations } => {
                let uid = self.query_spaces.add_composite_space();
                self.composites.insert(
                    uid,
                    CompositeOwner::Component {
                        label: format!("{}.{attribute}", resolved.owner_label),
                        associations,
                        owner_key_columns: resolved.owner_key_columns,
                    },
                );
                self.link(
                    owner_uid,
                    uid,
                    role,
                    false,
                    Vec::new(),
                    Vec::new(),
                    strategy.is_join_fetched(),
                )?;
                Ok(Fetch::Composite(CompositeFetch {
                    attribute: attribute.to_string(),
                    uid,
                    strategy,
                    path,
                    fetches: Vec::new(),
                }))
            }
        }
    }

    /// Join `lhs` to `rhs`. Spaces of fetches loaded by a follow-up select are
    /// created but left unjoined, so the owning statement never reaches them.
    #[allow(clippy::too_many_arguments)]
    fn link(
        &mut self,
        lhs: QuerySpaceUid,
        rhs: QuerySpaceUid,
        role: JoinRole,
        required: bool,
        lhs_columns: Vec<String>,
        rhs_columns: Vec<String>,
        joined: bool,
    ) -> Result<(), LoadPlanBuildError> {
        if joined {
            self.query_spaces
                .add_join(lhs, rhs, role, required, lhs_columns, rhs_columns)?;
        } else if lhs_columns.len() != rhs_columns.len() {
            return Err(LoadPlanBuildError::JoinColumnMismatch {
                lhs: lhs_columns.len(),
                rhs: rhs_columns.len(),
            });
        } else {
            log::debug!("{rhs} ({role}) is loaded separately; not joined to {lhs}");
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_entity_join(
        &mut self,
        lhs: QuerySpaceUid,
        entity_name: &str,
        role: JoinRole,
        required: bool,
        columns: Vec<String>,
        target_columns: Vec<String>,
        joined: bool,
    ) -> Result<QuerySpaceUid, LoadPlanBuildError> {
        let target = self.catalog.entity(entity_name)?;
        let rhs_columns = if target_columns.is_empty() {
            target.key_columns().to_vec()
        } else {
            target_columns
        };
        let uid = self.query_spaces.add_entity_space(target);
        self.link(lhs, uid, role, required, columns, rhs_columns, joined)?;
        Ok(uid)
    }

    /// Element and index graphs of a collection space, joined from it.
    fn collection_graphs(
        &mut self,
        collection_uid: QuerySpaceUid,
        collection: &Arc<dyn CollectionMapping>,
        path: &str,
    ) -> Result<(Option<CollectionGraph>, Option<CollectionGraph>), LoadPlanBuildError> {
        let element_path = child_path(path, ELEMENTS_PATH);
        let element_graph = if let Some(element_entity) = collection.element_entity_name() {
            let uid = self.add_entity_join(
                collection_uid,
                element_entity,
                JoinRole::CollectionElements,
                false,
                collection.element_column_names().to_vec(),
                Vec::new(),
                true,
            )?;
            Some(CollectionGraph {
                uid,
                kind: CollectionGraphKind::Entity,
                path: element_path,
                fetches: Vec::new(),
            })
        } else if collection.has_composite_elements() {
            let uid = self.query_spaces.add_composite_space();
            self.composites
                .insert(uid, CompositeOwner::CollectionElements(collection.clone()));
            self.query_spaces.add_join(
                collection_uid,
                uid,
                JoinRole::CollectionElements,
                false,
                Vec::new(),
                Vec::new(),
            )?;
            Some(CollectionGraph {
                uid,
                kind: CollectionGraphKind::Composite,
                path: element_path,
                fetches: Vec::new(),
            })
        } else {
            None
        };

        let index_graph = match collection.index_entity_name() {
            Some(index_entity) => {
                let uid = self.add_entity_join(
                    collection_uid,
                    index_entity,
                    JoinRole::CollectionIndex,
                    false,
                    collection.index_column_names().to_vec(),
                    Vec::new(),
                    true,
                )?;
                Some(CollectionGraph {
                    uid,
                    kind: CollectionGraphKind::Entity,
                    path: child_path(path, INDEX_PATH),
                    fetches: Vec::new(),
                })
            }
            None => None,
        };

        Ok((element_graph, index_graph))
    }
}
