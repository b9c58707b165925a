use crate::errors::IndexError;
use crate::sync::{ResourceSync, SyncFailure};
use async_trait::async_trait;
use sea_orm::{EntityTrait, PaginatorTrait, QueryOrder};
use serde::Serialize;

/// Outcome of recreating the entries of one resource type.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub resource_type: String,
    /// Entities read from the host table
    pub processed: u64,
    /// Entries written
    pub indexed: u64,
    /// Entities left unindexed because a required parent was missing
    pub skipped: Vec<SyncFailure>,
}

impl BackfillReport {
    pub fn summary(&self) -> BackfillSummary {
        BackfillSummary {
            resource_type: self.resource_type.clone(),
            processed: self.processed,
            indexed: self.indexed,
            skipped: self.skipped.len() as u64,
        }
    }
}

/// Serializable totals of a [`BackfillReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub resource_type: String,
    pub processed: u64,
    pub indexed: u64,
    pub skipped: u64,
}

/// A registered resource type that can rebuild its index entries.
#[async_trait]
pub trait Backfill: Send + Sync {
    fn resource_type(&self) -> &str;

    fn parent_type(&self) -> Option<&str>;

    async fn recreate(&self, batch_size: u64) -> Result<BackfillReport, IndexError>;
}

impl<E> ResourceSync<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    /// Upsert the entry of every existing entity, page by page in key order.
    ///
    /// Entries are upserted, so running it again yields the same index.
    /// Entities whose required parent is not indexed are reported and skipped.
    pub async fn recreate(&self, batch_size: u64) -> Result<BackfillReport, IndexError> {
        if batch_size == 0 {
            return Err(IndexError::Configuration(
                "backfill batch size must be positive".to_string(),
            ));
        }

        let mut report = BackfillReport {
            resource_type: self.resource_type().to_string(),
            ..Default::default()
        };

        let mut pages = E::find()
            .order_by_asc(self.id_column())
            .paginate(self.index().connection(), batch_size);

        while let Some(models) = pages.fetch_and_next().await? {
            report.processed += models.len() as u64;
            let page = self.sync_each(&models).await?;
            report.indexed += page.indexed as u64;
            report.skipped.extend(page.failures);
        }

        tracing::info!(
            resource_type = %report.resource_type,
            processed = report.processed,
            indexed = report.indexed,
            skipped = report.skipped.len(),
            "Recreated resource entries"
        );
        Ok(report)
    }
}

#[async_trait]
impl<E> Backfill for ResourceSync<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    fn resource_type(&self) -> &str {
        ResourceSync::resource_type(self)
    }

    fn parent_type(&self) -> Option<&str> {
        self.parent().map(|p| p.resource_type.as_str())
    }

    async fn recreate(&self, batch_size: u64) -> Result<BackfillReport, IndexError> {
        ResourceSync::recreate(self, batch_size).await
    }
}
