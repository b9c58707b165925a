use crate::errors::IndexError;
use crate::settings::IndexConfig;
use sea_orm::sea_query::{
    Alias, ColumnDef, Expr, Func, Index, OnConflict, Order, Query, SelectStatement,
    SimpleExpr, Table,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, QueryResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Materialized position of one entity in the resource hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIndexEntry {
    pub reference: String,
    pub resource_type: String,
    pub path: String,
}

impl ResourceIndexEntry {
    pub fn new(
        reference: impl Into<String>,
        resource_type: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            resource_type: resource_type.into(),
            path: path.into(),
        }
    }
}

/// Selection over index entries. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct ResourceCriteria {
    pub resource_type: Option<String>,
    pub references: Option<Vec<String>>,
    pub path_prefix: Option<String>,
}

impl ResourceCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = Some(references.into_iter().map(Into::into).collect());
        self
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }
}

/// Resource index store addressed by `(reference, resource_type)`.
///
/// Statements are built with sea-query against the table and column names of
/// the [`IndexConfig`] it was created with, so several differently named
/// indexes can live side by side on one connection.
#[derive(Debug, Clone)]
pub struct ResourceIndex {
    db: DatabaseConnection,
    config: Arc<IndexConfig>,
}

impl ResourceIndex {
    pub fn new(db: DatabaseConnection, config: IndexConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// A second index over the user-resource names, sharing this connection.
    pub fn user_resources(&self) -> Option<ResourceIndex> {
        self.config
            .user_variant()
            .map(|config| ResourceIndex::new(self.db.clone(), config))
    }

    pub(crate) fn table(&self) -> Alias {
        Alias::new(self.config.collection.as_str())
    }

    pub(crate) fn reference_col(&self) -> Alias {
        Alias::new(self.config.reference_field.as_str())
    }

    pub(crate) fn resource_type_col(&self) -> Alias {
        Alias::new(self.config.resource_type_field.as_str())
    }

    pub(crate) fn path_col(&self) -> Alias {
        Alias::new(self.config.path_field.as_str())
    }

    fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    /// Create the index table for this configuration if it does not exist.
    /// The default layout is also created by the migrations.
    pub async fn ensure_schema(&self) -> Result<(), IndexError> {
        let table = Table::create()
            .table(self.table())
            .if_not_exists()
            .col(ColumnDef::new(self.reference_col()).string().not_null())
            .col(ColumnDef::new(self.resource_type_col()).string().not_null())
            .col(ColumnDef::new(self.path_col()).string().not_null())
            .primary_key(
                Index::create()
                    .col(self.reference_col())
                    .col(self.resource_type_col()),
            )
            .to_owned();
        self.db.execute(self.backend().build(&table)).await?;

        let path_index = Index::create()
            .if_not_exists()
            .name(format!(
                "idx_{}_{}",
                self.config.collection, self.config.path_field
            ))
            .table(self.table())
            .col(self.path_col())
            .to_owned();
        self.db.execute(self.backend().build(&path_index)).await?;

        Ok(())
    }

    /// Point lookup.
    pub async fn find(
        &self,
        reference: &str,
        resource_type: &str,
    ) -> Result<Option<ResourceIndexEntry>, IndexError> {
        let stmt = self
            .select_entries()
            .and_where(Expr::col(self.reference_col()).eq(reference))
            .and_where(Expr::col(self.resource_type_col()).eq(resource_type))
            .to_owned();

        let row = self.db.query_one(self.backend().build(&stmt)).await?;
        row.map(|r| self.entry_from_row(&r)).transpose()
    }

    pub async fn find_many(
        &self,
        criteria: &ResourceCriteria,
    ) -> Result<Vec<ResourceIndexEntry>, IndexError> {
        let mut stmt = self.select_entries();
        self.apply_criteria(&mut stmt, criteria);
        stmt.order_by(self.path_col(), Order::Asc);

        let rows = self.db.query_all(self.backend().build(&stmt)).await?;
        rows.iter().map(|r| self.entry_from_row(r)).collect()
    }

    pub async fn count(&self, criteria: &ResourceCriteria) -> Result<u64, IndexError> {
        let mut stmt = Query::select()
            .expr_as(Func::count(Expr::col(self.reference_col())), Alias::new("n"))
            .from(self.table())
            .to_owned();
        self.apply_criteria(&mut stmt, criteria);

        let n: i64 = match self.db.query_one(self.backend().build(&stmt)).await? {
            Some(row) => row.try_get("", "n")?,
            None => 0,
        };
        Ok(n.max(0) as u64)
    }

    /// Create or replace the entry for `(reference, resource_type)`.
    pub async fn upsert(&self, entry: &ResourceIndexEntry) -> Result<(), IndexError> {
        let mut stmt = Query::insert();
        stmt.into_table(self.table()).columns([
            self.reference_col(),
            self.resource_type_col(),
            self.path_col(),
        ]);
        stmt.values(entry_values(entry)).map_err(query_error)?;
        stmt.on_conflict(
            OnConflict::columns([self.reference_col(), self.resource_type_col()])
                .update_column(self.path_col())
                .to_owned(),
        );

        self.db.execute(self.backend().build(&stmt)).await?;
        tracing::debug!(
            reference = %entry.reference,
            resource_type = %entry.resource_type,
            path = %entry.path,
            "Upserted resource entry"
        );
        Ok(())
    }

    /// Insert many fresh entries in one statement.
    ///
    /// Plain insert semantics: the keys must not exist yet. Use [`upsert`]
    /// for entries that may already be indexed.
    ///
    /// [`upsert`]: ResourceIndex::upsert
    pub async fn bulk_insert(&self, entries: &[ResourceIndexEntry]) -> Result<u64, IndexError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut stmt = Query::insert();
        stmt.into_table(self.table()).columns([
            self.reference_col(),
            self.resource_type_col(),
            self.path_col(),
        ]);
        for entry in entries {
            stmt.values(entry_values(entry)).map_err(query_error)?;
        }

        let result = self.db.execute(self.backend().build(&stmt)).await?;
        Ok(result.rows_affected())
    }

    /// Remove the entry; removing an absent entry is not an error.
    pub async fn delete(&self, reference: &str, resource_type: &str) -> Result<u64, IndexError> {
        let stmt = Query::delete()
            .from_table(self.table())
            .and_where(Expr::col(self.reference_col()).eq(reference))
            .and_where(Expr::col(self.resource_type_col()).eq(resource_type))
            .to_owned();

        let result = self.db.execute(self.backend().build(&stmt)).await?;
        Ok(result.rows_affected())
    }

    fn select_entries(&self) -> SelectStatement {
        Query::select()
            .columns([
                self.reference_col(),
                self.resource_type_col(),
                self.path_col(),
            ])
            .from(self.table())
            .to_owned()
    }

    fn apply_criteria(&self, stmt: &mut SelectStatement, criteria: &ResourceCriteria) {
        if let Some(resource_type) = &criteria.resource_type {
            stmt.and_where(Expr::col(self.resource_type_col()).eq(resource_type.as_str()));
        }
        if let Some(references) = &criteria.references {
            stmt.and_where(Expr::col(self.reference_col()).is_in(references.iter().cloned()));
        }
        if let Some(prefix) = &criteria.path_prefix {
            stmt.and_where(crate::access::prefix_test(
                Expr::col(self.path_col()).into(),
                prefix,
            ));
        }
    }

    fn entry_from_row(&self, row: &QueryResult) -> Result<ResourceIndexEntry, IndexError> {
        Ok(ResourceIndexEntry {
            reference: row.try_get("", &self.config.reference_field)?,
            resource_type: row.try_get("", &self.config.resource_type_field)?,
            path: row.try_get("", &self.config.path_field)?,
        })
    }
}

fn entry_values(entry: &ResourceIndexEntry) -> [SimpleExpr; 3] {
    [
        entry.reference.clone().into(),
        entry.resource_type.clone().into(),
        entry.path.clone().into(),
    ]
}

fn query_error(e: sea_orm::sea_query::error::Error) -> IndexError {
    IndexError::Storage(DbErr::Custom(e.to_string()))
}
