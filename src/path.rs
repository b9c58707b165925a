use crate::errors::IndexError;
use crate::index::{ResourceIndex, ResourceIndexEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Declares where an entity type's parent lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSpec {
    /// Resource type of the parent entity
    pub resource_type: String,
    /// Column on the child holding the parent's identifier
    pub local_field: String,
    /// When true a missing parent entry indexes the child at the root
    #[serde(default)]
    pub optional: bool,
}

impl ParentSpec {
    pub fn required(resource_type: impl Into<String>, local_field: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            local_field: local_field.into(),
            optional: false,
        }
    }

    pub fn optional(resource_type: impl Into<String>, local_field: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            local_field: local_field.into(),
            optional: true,
        }
    }
}

/// A child's parent declaration together with the parent identifier read
/// from the child, if any.
#[derive(Debug, Clone, Copy)]
pub struct ParentLink<'a> {
    pub spec: &'a ParentSpec,
    pub reference: Option<&'a str>,
}

/// Read access to already indexed parents.
#[async_trait]
pub trait ParentLookup: Send + Sync {
    async fn lookup(
        &self,
        reference: &str,
        resource_type: &str,
    ) -> Result<Option<ResourceIndexEntry>, IndexError>;
}

#[async_trait]
impl ParentLookup for ResourceIndex {
    async fn lookup(
        &self,
        reference: &str,
        resource_type: &str,
    ) -> Result<Option<ResourceIndexEntry>, IndexError> {
        self.find(reference, resource_type).await
    }
}

/// `/<resource_type>/<reference>`
pub fn base_path(resource_type: &str, reference: &str) -> String {
    format!("/{resource_type}/{reference}")
}

/// Compute the materialized path of an entity.
///
/// Without a parent the path is the base path. With a parent the stored path
/// of the parent entry is prepended. A parent that is unset or not indexed
/// fails with [`IndexError::ParentNotFound`], unless the parent is optional,
/// in which case the entity is indexed at the root.
pub async fn compute_path<L>(
    lookup: &L,
    reference: &str,
    resource_type: &str,
    parent: Option<ParentLink<'_>>,
) -> Result<String, IndexError>
where
    L: ParentLookup + ?Sized,
{
    let path = base_path(resource_type, reference);

    let Some(link) = parent else {
        return Ok(path);
    };

    let parent_entry = match link.reference {
        Some(parent_ref) => lookup.lookup(parent_ref, &link.spec.resource_type).await?,
        None => None,
    };

    match parent_entry {
        Some(entry) => Ok(format!("{}{}", entry.path, path)),
        None if link.spec.optional => Ok(path),
        None => Err(IndexError::ParentNotFound {
            resource_type: resource_type.to_string(),
            parent_resource_type: link.spec.resource_type.clone(),
            parent_reference: link.reference.map(str::to_string),
        }),
    }
}
