use crate::errors::IndexError;
use crate::sync::{by_ids, LifecycleHooks, SyncReport};
use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, EntityName, EntityTrait,
    IdenStatic, IntoActiveModel, Iterable, ModelTrait, PrimaryKeyToColumn, QueryFilter, Value,
};
use std::sync::Arc;

/// Mutation pathway for one entity type that notifies its subscribers.
///
/// Each operation applies the mutation and awaits every subscriber before
/// returning. Filters handed to subscribers are narrowed to the primary keys
/// of the affected rows, so a mutation that rewrites the fields of the
/// caller's filter still reaches the right rows afterwards.
pub struct Repository<E: EntityTrait> {
    db: DatabaseConnection,
    hooks: Vec<Arc<dyn LifecycleHooks<E>>>,
}

impl<E: EntityTrait> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<E> Repository<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            hooks: Vec::new(),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn subscribe(&mut self, hooks: Arc<dyn LifecycleHooks<E>>) {
        self.hooks.push(hooks);
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks<E>>) -> Self {
        self.subscribe(hooks);
        self
    }

    fn key_column() -> Result<E::Column, IndexError> {
        E::PrimaryKey::iter()
            .next()
            .map(PrimaryKeyToColumn::into_column)
            .ok_or_else(|| IndexError::Configuration("entity has no primary key".to_string()))
    }

    /// Key column for a bulk update. Rewriting the key would orphan the
    /// index entries of the affected rows, so such changes are refused.
    fn update_key(changes: &E::ActiveModel) -> Result<E::Column, IndexError> {
        let key = Self::key_column()?;
        if !changes.is_not_set(key) {
            return Err(IndexError::Configuration(format!(
                "primary key `{}` of `{}` cannot be changed by an update",
                key.as_str(),
                E::default().table_name()
            )));
        }
        Ok(key)
    }

    pub async fn insert(&self, model: E::ActiveModel) -> Result<E::Model, IndexError> {
        let model = model.insert(&self.db).await?;
        for hooks in &self.hooks {
            hooks.after_save(model.clone()).await?;
        }
        Ok(model)
    }

    /// Persist changes to an existing row identified by its primary key.
    pub async fn save(&self, model: E::ActiveModel) -> Result<E::Model, IndexError> {
        let model = model.update(&self.db).await?;
        for hooks in &self.hooks {
            hooks.after_save(model.clone()).await?;
        }
        Ok(model)
    }

    /// Bulk insert. Rows must carry their primary key; the inserted models
    /// are read back by key and handed to subscribers in one notification.
    pub async fn insert_many(
        &self,
        models: Vec<E::ActiveModel>,
    ) -> Result<(Vec<E::Model>, SyncReport), IndexError> {
        if models.is_empty() {
            return Ok((Vec::new(), SyncReport::default()));
        }

        let key = Self::key_column()?;
        let ids = models
            .iter()
            .map(|m| m.get(key).into_value())
            .collect::<Option<Vec<Value>>>()
            .ok_or_else(|| {
                IndexError::Configuration("bulk insert requires primary keys to be set".to_string())
            })?;

        E::insert_many(models)
            .exec_without_returning(&self.db)
            .await?;
        let inserted = E::find()
            .filter(by_ids::<E>(key, ids))
            .all(&self.db)
            .await?;

        let mut report = SyncReport::default();
        for hooks in &self.hooks {
            report.merge(hooks.after_insert_many(inserted.clone()).await?);
        }
        Ok((inserted, report))
    }

    /// Apply `changes` to the first row matching `filter`.
    /// Returns the updated row, or `None` if nothing matched.
    /// `changes` must leave the primary key unset.
    pub async fn update_one(
        &self,
        filter: Condition,
        changes: E::ActiveModel,
    ) -> Result<Option<E::Model>, IndexError> {
        let key = Self::update_key(&changes)?;
        let Some(existing) = E::find().filter(filter).one(&self.db).await? else {
            return Ok(None);
        };
        let affected = by_ids::<E>(key, vec![existing.get(key)]);

        E::update_many()
            .set(changes)
            .filter(affected.clone())
            .exec(&self.db)
            .await?;

        for hooks in &self.hooks {
            hooks.after_update_one(affected.clone()).await?;
        }
        Ok(E::find().filter(affected).one(&self.db).await?)
    }

    /// Apply `changes` to every row matching `filter`.
    /// `changes` must leave the primary key unset.
    pub async fn update_many(
        &self,
        filter: Condition,
        changes: E::ActiveModel,
    ) -> Result<(u64, SyncReport), IndexError> {
        let key = Self::update_key(&changes)?;
        let ids = self.matching_ids(key, filter).await?;
        if ids.is_empty() {
            return Ok((0, SyncReport::default()));
        }
        let affected = by_ids::<E>(key, ids);

        let result = E::update_many()
            .set(changes)
            .filter(affected.clone())
            .exec(&self.db)
            .await?;

        let mut report = SyncReport::default();
        for hooks in &self.hooks {
            report.merge(hooks.after_update_many(affected.clone()).await?);
        }
        Ok((result.rows_affected, report))
    }

    /// Delete the first row matching `filter`. Subscribers run first; if one
    /// fails the row is kept.
    pub async fn delete_one(&self, filter: Condition) -> Result<u64, IndexError> {
        let key = Self::key_column()?;
        let Some(existing) = E::find().filter(filter).one(&self.db).await? else {
            return Ok(0);
        };
        let affected = by_ids::<E>(key, vec![existing.get(key)]);

        for hooks in &self.hooks {
            hooks.before_delete_one(affected.clone()).await?;
        }

        let result = E::delete_many().filter(affected).exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    /// Delete every row matching `filter`.
    pub async fn delete_many(&self, filter: Condition) -> Result<(u64, SyncReport), IndexError> {
        let key = Self::key_column()?;
        let ids = self.matching_ids(key, filter).await?;
        if ids.is_empty() {
            return Ok((0, SyncReport::default()));
        }
        let affected = by_ids::<E>(key, ids);

        let mut report = SyncReport::default();
        for hooks in &self.hooks {
            report.merge(hooks.before_delete_many(affected.clone()).await?);
        }

        let result = E::delete_many().filter(affected).exec(&self.db).await?;
        Ok((result.rows_affected, report))
    }

    async fn matching_ids(&self, key: E::Column, filter: Condition) -> Result<Vec<Value>, IndexError> {
        let models = E::find().filter(filter).all(&self.db).await?;
        Ok(models.iter().map(|m| m.get(key)).collect())
    }
}
