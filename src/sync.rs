use crate::errors::IndexError;
use crate::index::{ResourceIndex, ResourceIndexEntry};
use crate::path::{self, ParentLink, ParentSpec};
use async_trait::async_trait;
use sea_orm::sea_query::Condition;
use sea_orm::{
    ColumnTrait, EntityTrait, IdenStatic, Iterable, ModelTrait, PrimaryKeyToColumn, QueryFilter,
    Value,
};
use std::fmt;

/// Lifecycle notifications a host mutation pathway delivers to subscribers.
///
/// `after_*` hooks run once the mutation has been applied; filters passed to
/// them select the affected rows in their new state. `before_*` hooks run
/// while the rows about to be deleted can still be resolved.
#[async_trait]
pub trait LifecycleHooks<E: EntityTrait>: Send + Sync {
    async fn after_save(&self, model: E::Model) -> Result<(), IndexError>;

    async fn after_insert_many(&self, models: Vec<E::Model>) -> Result<SyncReport, IndexError>;

    async fn after_update_one(&self, filter: Condition) -> Result<(), IndexError>;

    async fn after_update_many(&self, filter: Condition) -> Result<SyncReport, IndexError>;

    async fn before_delete_one(&self, filter: Condition) -> Result<(), IndexError>;

    async fn before_delete_many(&self, filter: Condition) -> Result<SyncReport, IndexError>;
}

/// An element of a bulk operation whose index write was skipped.
#[derive(Debug)]
pub struct SyncFailure {
    pub reference: String,
    pub error: IndexError,
}

/// Outcome of a bulk synchronization.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub indexed: usize,
    pub removed: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.indexed += other.indexed;
        self.removed += other.removed;
        self.failures.extend(other.failures);
    }
}

struct ParentColumn<E: EntityTrait> {
    spec: ParentSpec,
    column: E::Column,
}

/// Keeps the index entries of one entity type in step with its rows.
pub struct ResourceSync<E: EntityTrait> {
    index: ResourceIndex,
    resource_type: String,
    id_column: E::Column,
    parent: Option<ParentColumn<E>>,
}

impl<E: EntityTrait> fmt::Debug for ResourceSync<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSync")
            .field("resource_type", &self.resource_type)
            .field("table", &E::default().table_name())
            .field("parent", &self.parent.as_ref().map(|p| &p.spec))
            .finish()
    }
}

impl<E> ResourceSync<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    /// Validate the registration of `E` under `resource_type`.
    pub fn register(
        index: ResourceIndex,
        resource_type: &str,
        parent: Option<ParentSpec>,
    ) -> Result<Self, IndexError> {
        let entity = E::default();
        let table = entity.table_name();

        if resource_type.trim().is_empty() {
            return Err(IndexError::Configuration(format!(
                "resource type is required for table `{table}`"
            )));
        }

        let mut keys = E::PrimaryKey::iter();
        let id_column = match (keys.next(), keys.next()) {
            (Some(pk), None) => pk.into_column(),
            _ => {
                return Err(IndexError::Configuration(format!(
                    "`{table}` must have exactly one primary key column to be indexed as {resource_type}"
                )))
            }
        };

        let parent = match parent {
            Some(spec) => {
                if spec.resource_type.trim().is_empty() {
                    return Err(IndexError::Configuration(format!(
                        "parent resource type is required for {resource_type}"
                    )));
                }
                let column = E::Column::iter()
                    .find(|c| c.as_str() == spec.local_field)
                    .ok_or_else(|| {
                        IndexError::Configuration(format!(
                            "`{table}` has no column `{}` for the {} parent of {resource_type}",
                            spec.local_field, spec.resource_type
                        ))
                    })?;
                Some(ParentColumn { spec, column })
            }
            None => None,
        };

        tracing::debug!(
            resource_type,
            table,
            parent = parent.as_ref().map(|p| p.spec.resource_type.as_str()),
            "Registered resource type"
        );

        Ok(Self {
            index,
            resource_type: resource_type.to_string(),
            id_column,
            parent,
        })
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn parent(&self) -> Option<&ParentSpec> {
        self.parent.as_ref().map(|p| &p.spec)
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    pub(crate) fn id_column(&self) -> E::Column {
        self.id_column
    }

    /// Identifier of `model` as stored in the index.
    pub fn reference_of(&self, model: &E::Model) -> Result<String, IndexError> {
        reference_from_value(&model.get(self.id_column)).ok_or_else(|| {
            IndexError::Configuration(format!(
                "primary key `{}` of {} is not a string or integer",
                self.id_column.as_str(),
                self.resource_type
            ))
        })
    }

    /// Compute the entry `model` should have right now.
    pub async fn entry_for(&self, model: &E::Model) -> Result<ResourceIndexEntry, IndexError> {
        let reference = self.reference_of(model)?;
        let parent_ref = self
            .parent
            .as_ref()
            .and_then(|p| reference_from_value(&model.get(p.column)));
        let link = self.parent.as_ref().map(|p| ParentLink {
            spec: &p.spec,
            reference: parent_ref.as_deref(),
        });

        let path = path::compute_path(&self.index, &reference, &self.resource_type, link).await?;
        Ok(ResourceIndexEntry::new(reference, &self.resource_type, path))
    }

    /// Recompute and upsert the entry of one entity.
    pub async fn sync_model(&self, model: &E::Model) -> Result<ResourceIndexEntry, IndexError> {
        let entry = self.entry_for(model).await?;
        self.index.upsert(&entry).await?;
        Ok(entry)
    }

    /// Upsert every model one at a time, isolating missing parents.
    pub(crate) async fn sync_each(&self, models: &[E::Model]) -> Result<SyncReport, IndexError> {
        let mut report = SyncReport::default();
        for model in models {
            match self.sync_model(model).await {
                Ok(_) => report.indexed += 1,
                Err(e) if e.is_parent_not_found() => {
                    let reference = self.reference_of(model)?;
                    tracing::warn!(
                        resource_type = %self.resource_type,
                        %reference,
                        error = %e,
                        "Skipped index entry"
                    );
                    report.failures.push(SyncFailure {
                        reference,
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    async fn remove(&self, models: &[E::Model]) -> Result<SyncReport, IndexError> {
        let mut report = SyncReport::default();
        for model in models {
            let reference = self.reference_of(model)?;
            self.index.delete(&reference, &self.resource_type).await?;
            report.removed += 1;
        }
        Ok(report)
    }
}

#[async_trait]
impl<E> LifecycleHooks<E> for ResourceSync<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    async fn after_save(&self, model: E::Model) -> Result<(), IndexError> {
        self.sync_model(&model).await?;
        Ok(())
    }

    async fn after_insert_many(&self, models: Vec<E::Model>) -> Result<SyncReport, IndexError> {
        let mut report = SyncReport::default();
        let mut entries = Vec::with_capacity(models.len());

        for model in &models {
            match self.entry_for(model).await {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_parent_not_found() => {
                    let reference = self.reference_of(model)?;
                    tracing::warn!(
                        resource_type = %self.resource_type,
                        %reference,
                        error = %e,
                        "Skipped index entry"
                    );
                    report.failures.push(SyncFailure {
                        reference,
                        error: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.index.bulk_insert(&entries).await?;
        report.indexed = entries.len();

        tracing::info!(
            resource_type = %self.resource_type,
            indexed = report.indexed,
            skipped = report.failures.len(),
            "Indexed bulk insert"
        );
        Ok(report)
    }

    async fn after_update_one(&self, filter: Condition) -> Result<(), IndexError> {
        let found = E::find()
            .filter(filter)
            .one(self.index.connection())
            .await?;
        if let Some(model) = found {
            self.sync_model(&model).await?;
        }
        Ok(())
    }

    async fn after_update_many(&self, filter: Condition) -> Result<SyncReport, IndexError> {
        let models = E::find()
            .filter(filter)
            .all(self.index.connection())
            .await?;
        let report = self.sync_each(&models).await?;

        tracing::info!(
            resource_type = %self.resource_type,
            indexed = report.indexed,
            skipped = report.failures.len(),
            "Reindexed updated entities"
        );
        Ok(report)
    }

    async fn before_delete_one(&self, filter: Condition) -> Result<(), IndexError> {
        let found = E::find()
            .filter(filter)
            .one(self.index.connection())
            .await?;
        if let Some(model) = found {
            self.remove(std::slice::from_ref(&model)).await?;
        }
        Ok(())
    }

    async fn before_delete_many(&self, filter: Condition) -> Result<SyncReport, IndexError> {
        let models = E::find()
            .filter(filter)
            .all(self.index.connection())
            .await?;
        let report = self.remove(&models).await?;

        tracing::info!(
            resource_type = %self.resource_type,
            removed = report.removed,
            "Removed index entries"
        );
        Ok(report)
    }
}

/// Text form of an identifier column value; `None` for NULL and for types
/// that cannot serve as a reference.
pub fn reference_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(Some(s)) => Some(s.to_string()),
        Value::Char(Some(c)) => Some(c.to_string()),
        Value::TinyInt(Some(n)) => Some(n.to_string()),
        Value::SmallInt(Some(n)) => Some(n.to_string()),
        Value::Int(Some(n)) => Some(n.to_string()),
        Value::BigInt(Some(n)) => Some(n.to_string()),
        Value::TinyUnsigned(Some(n)) => Some(n.to_string()),
        Value::SmallUnsigned(Some(n)) => Some(n.to_string()),
        Value::Unsigned(Some(n)) => Some(n.to_string()),
        Value::BigUnsigned(Some(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Filter selecting rows of `E` by their identifier column.
pub(crate) fn by_ids<E: EntityTrait>(column: E::Column, ids: Vec<Value>) -> Condition {
    Condition::all().add(column.is_in(ids))
}
