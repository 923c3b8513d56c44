// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resource conversion and `included` bookkeeping for one serialize call.

use std::any::Any;
use std::collections::HashSet;

use tracing::trace;

use super::{
    DocumentSerializer, IncludableData, IncludableIdentifier, SerializeError, SerializeOptions,
};
use crate::json_api::{
    Attributes, Relationship, RelationshipData, Relationships, Resource, ResourceIdentifier,
};

/// Collects side-loaded resources while the primary data is serialized.
///
/// Resources land in `included` in completion order: a resource is appended
/// after every resource it pulls in itself.
pub(super) struct IncludeCollection<'r> {
    registry: &'r DocumentSerializer,
    options: &'r SerializeOptions,
    resources: Vec<Resource>,
    already_included: HashSet<(String, String)>,
}

impl<'r> IncludeCollection<'r> {
    pub(super) fn new(registry: &'r DocumentSerializer, options: &'r SerializeOptions) -> Self {
        Self {
            registry,
            options,
            resources: Vec::new(),
            already_included: HashSet::new(),
        }
    }

    /// Convert one entity into a resource object, recursing into its
    /// includable relationships below `parent_path`.
    pub(super) fn serialize_resource(
        &mut self,
        resource_type: &str,
        entity: &dyn Any,
        parent_path: &str,
    ) -> Result<Resource, SerializeError> {
        let registry = self.registry;
        let serializer = registry.get(resource_type)?;
        let serialized = serializer.erased_serialize(
            resource_type,
            entity,
            self.options.context_for(resource_type),
        )?;
        let id = serializer.erased_id(resource_type, entity)?;

        let mut relationships = Relationships::new();
        for (name, relationship) in serialized.relationships.unwrap_or_default() {
            let path = if parent_path.is_empty() {
                name.clone()
            } else {
                format!("{parent_path}.{name}")
            };
            let data = relationship
                .data
                .map(|data| self.link(data, &path))
                .transpose()?;
            relationships.insert(
                name,
                Relationship {
                    data,
                    links: relationship.links,
                    meta: relationship.meta,
                },
            );
        }

        let allowed = self.options.fields_for(resource_type);

        Ok(Resource {
            id,
            r#type: resource_type.to_owned(),
            attributes: serialized
                .attributes
                .and_then(|attributes| filter_attributes(attributes, allowed)),
            relationships: filter_relationships(relationships, allowed),
            links: serialized.links,
            meta: serialized.meta,
        })
    }

    fn link(
        &mut self,
        data: IncludableData<'_>,
        path: &str,
    ) -> Result<RelationshipData, SerializeError> {
        Ok(match data {
            IncludableData::Null => RelationshipData::Null,
            IncludableData::One(identifier) => {
                RelationshipData::One(self.identify(identifier, path)?)
            }
            IncludableData::Many(identifiers) => RelationshipData::Many(
                identifiers
                    .into_iter()
                    .map(|identifier| self.identify(identifier, path))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn identify(
        &mut self,
        identifier: IncludableIdentifier<'_>,
        path: &str,
    ) -> Result<ResourceIdentifier, SerializeError> {
        if let Some(entity) = identifier.entity {
            self.add(&identifier.r#type, entity, path)?;
        }

        Ok(ResourceIdentifier {
            r#type: identifier.r#type,
            id: identifier.id,
            meta: identifier.meta,
        })
    }

    fn add(
        &mut self,
        resource_type: &str,
        entity: &dyn Any,
        path: &str,
    ) -> Result<(), SerializeError> {
        if !self.should_include(path) {
            return Ok(());
        }

        let id = self.registry.get(resource_type)?.erased_id(resource_type, entity)?;
        let key = (resource_type.to_owned(), id);

        if self.already_included.contains(&key) {
            return Ok(());
        }

        trace!(resource_type, id = %key.1, path, "including resource");
        // Mark before recursing so cycles terminate.
        self.already_included.insert(key);

        let resource = self.serialize_resource(resource_type, entity, path)?;
        self.resources.push(resource);
        Ok(())
    }

    fn should_include(&self, path: &str) -> bool {
        let Some(include) = self.options.include.as_deref() else {
            return false;
        };

        include.iter().any(|requested| {
            requested == path
                || requested
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// The `included` member; `None` unless inclusion was requested.
    pub(super) fn into_included(self) -> Option<Vec<Resource>> {
        match self.options.include.as_deref() {
            None | Some([]) => None,
            Some(_) => Some(self.resources),
        }
    }
}

fn filter_attributes(attributes: Attributes, allowed: Option<&[String]>) -> Option<Attributes> {
    let filtered: Attributes = match allowed {
        None => attributes,
        Some(allowed) => attributes
            .into_iter()
            .filter(|(name, _)| allowed.contains(name))
            .collect(),
    };

    (!filtered.is_empty()).then_some(filtered)
}

fn filter_relationships(
    relationships: Relationships,
    allowed: Option<&[String]>,
) -> Option<Relationships> {
    let filtered: Relationships = match allowed {
        None => relationships,
        Some(allowed) => relationships
            .into_iter()
            .filter(|(name, _)| allowed.contains(name))
            .collect(),
    };

    (!filtered.is_empty()).then_some(filtered)
}
