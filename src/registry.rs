use crate::backfill::{Backfill, BackfillReport};
use crate::errors::IndexError;
use crate::index::ResourceIndex;
use crate::path::ParentSpec;
use crate::sync::ResourceSync;
use sea_orm::EntityTrait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Every resource type indexed into one [`ResourceIndex`].
pub struct ResourceRegistry {
    index: ResourceIndex,
    entries: Vec<Arc<dyn Backfill>>,
}

impl ResourceRegistry {
    pub fn new(index: ResourceIndex) -> Self {
        Self {
            index,
            entries: Vec::new(),
        }
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    /// Register `E` as `resource_type`. The returned synchronizer is what the
    /// entity's repository subscribes to.
    pub fn register<E>(
        &mut self,
        resource_type: &str,
        parent: Option<ParentSpec>,
    ) -> Result<Arc<ResourceSync<E>>, IndexError>
    where
        E: EntityTrait,
        E::Model: Sync,
    {
        if self.entries.iter().any(|e| e.resource_type() == resource_type) {
            return Err(IndexError::Configuration(format!(
                "resource type {resource_type} is already registered"
            )));
        }

        let sync = Arc::new(ResourceSync::<E>::register(
            self.index.clone(),
            resource_type,
            parent,
        )?);
        self.entries.push(sync.clone());
        Ok(sync)
    }

    pub fn resource_types(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.resource_type()).collect()
    }

    /// Registrations with every parent type ahead of its children.
    ///
    /// Parents that are not registered here are assumed to be indexed
    /// already. A type naming itself as parent is kept; its entities are
    /// ordered by [`ResourceRegistry::recreate_all`] instead.
    pub fn ordered(&self) -> Result<Vec<Arc<dyn Backfill>>, IndexError> {
        let registered: HashSet<&str> = self.entries.iter().map(|e| e.resource_type()).collect();
        let mut done: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.entries.len());

        while ordered.len() < self.entries.len() {
            let ready: Vec<&Arc<dyn Backfill>> = self
                .entries
                .iter()
                .filter(|e| !done.contains(e.resource_type()))
                .filter(|e| match e.parent_type() {
                    None => true,
                    Some(p) => p == e.resource_type() || !registered.contains(p) || done.contains(p),
                })
                .collect();

            if ready.is_empty() {
                let pending: Vec<&str> = self
                    .entries
                    .iter()
                    .map(|e| e.resource_type())
                    .filter(|t| !done.contains(t))
                    .collect();
                return Err(IndexError::Configuration(format!(
                    "parent cycle between resource types: {}",
                    pending.join(", ")
                )));
            }

            for entry in ready {
                done.insert(entry.resource_type());
                ordered.push(entry.clone());
            }
        }

        Ok(ordered)
    }

    /// Recreate the entries of every registered type, parents first.
    pub async fn recreate_all(&self, batch_size: u64) -> Result<Vec<BackfillReport>, IndexError> {
        let mut reports = Vec::with_capacity(self.entries.len());

        for entry in self.ordered()? {
            let mut report = entry.recreate(batch_size).await?;

            // Self-parented types: repeat while each pass resolves more children
            if entry.parent_type() == Some(entry.resource_type()) {
                while !report.skipped.is_empty() {
                    let again = entry.recreate(batch_size).await?;
                    if again.skipped.len() >= report.skipped.len() {
                        report = again;
                        break;
                    }
                    report = again;
                }
            }

            reports.push(report);
        }

        let indexed: u64 = reports.iter().map(|r| r.indexed).sum();
        let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();
        tracing::info!(
            types = reports.len(),
            indexed,
            skipped,
            "Recreated resource index"
        );
        Ok(reports)
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parents: HashMap<&str, Option<&str>> = self
            .entries
            .iter()
            .map(|e| (e.resource_type(), e.parent_type()))
            .collect();
        f.debug_struct("ResourceRegistry")
            .field("collection", &self.index.config().collection)
            .field("types", &parents)
            .finish()
    }
}
