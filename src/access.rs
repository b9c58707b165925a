//! Prefix-based access checks over the resource index.
//!
//! Keys are path prefixes: `/` grants everything, `/Company/C1` grants the
//! company and everything indexed beneath it. Matching is a literal string
//! prefix test, so `/Company/C1` also matches `/Company/C10`; callers that
//! need segment boundaries must end their keys accordingly.

use crate::errors::IndexError;
use crate::index::{ResourceIndex, ResourceIndexEntry};
use crate::settings::IndexConfig;
use sea_orm::sea_query::{
    Alias, Condition, Expr, Func, IntoColumnRef, JoinType, SelectStatement, SimpleExpr,
};
use sea_orm::{
    DbErr, EntityTrait, FromQueryResult, Iterable, PrimaryKeyToColumn, QueryResult, QueryTrait,
    Select,
};

/// Alias of the joined index table inside an annotated query.
pub const MATCH_ALIAS: &str = "resource";
pub const MATCH_REFERENCE: &str = "matched_reference";
pub const MATCH_RESOURCE_TYPE: &str = "matched_resource_type";
pub const MATCH_PATH: &str = "matched_path";

/// True iff `path` starts with any of `keys`.
pub fn path_matches<K: AsRef<str>>(path: &str, keys: &[K]) -> bool {
    keys.iter().any(|key| path.starts_with(key.as_ref()))
}

/// SQL form of a single literal prefix test.
///
/// `substr(path, 1, n) = key` instead of `LIKE`, which would treat `_` and
/// `%` in keys as wildcards and is case-insensitive on SQLite.
pub(crate) fn prefix_test(path: SimpleExpr, key: &str) -> SimpleExpr {
    let len = i32::try_from(key.chars().count()).unwrap_or(i32::MAX);
    Expr::expr(
        Func::cust(Alias::new("substr"))
            .arg(path)
            .arg(1)
            .arg(len),
    )
    .eq(key)
}

/// Disjunction of prefix tests; an empty key set matches nothing.
pub(crate) fn any_prefix<K: AsRef<str>>(path: SimpleExpr, keys: &[K]) -> Condition {
    if keys.is_empty() {
        return Condition::all().add(Expr::cust("1 = 0"));
    }
    keys.iter().fold(Condition::any(), |cond, key| {
        cond.add(prefix_test(path.clone(), key.as_ref()))
    })
}

impl ResourceIndex {
    /// The entry for `(reference, resource_type)` if its path is covered by
    /// any of `keys`. Absence and denial both yield `None`.
    pub async fn get_resource<K: AsRef<str>>(
        &self,
        reference: &str,
        resource_type: &str,
        keys: &[K],
    ) -> Result<Option<ResourceIndexEntry>, IndexError> {
        let entry = self.find(reference, resource_type).await?;
        Ok(entry.filter(|e| path_matches(&e.path, keys)))
    }

    pub async fn check_access<K: AsRef<str>>(
        &self,
        reference: &str,
        resource_type: &str,
        keys: &[K],
    ) -> Result<bool, IndexError> {
        let granted = self
            .get_resource(reference, resource_type, keys)
            .await?
            .is_some();
        tracing::debug!(reference, resource_type, granted, "Checked resource access");
        Ok(granted)
    }

    /// Filter stage for candidates of `resource_type` against `keys`.
    pub fn filter<K: AsRef<str>>(&self, resource_type: &str, keys: &[K]) -> ResourceFilter {
        ResourceFilter::new(self.config().clone(), resource_type, keys)
    }
}

/// Query stage that annotates candidate rows with their matching index entry.
///
/// Applying the stage adds a `LEFT JOIN` on the index table keyed by the
/// candidate's identifier, the resource type and the authorized prefixes, and
/// selects the joined columns as [`MATCH_REFERENCE`], [`MATCH_RESOURCE_TYPE`]
/// and [`MATCH_PATH`]. Candidates without a match are kept with null columns;
/// add [`ResourceFilter::matched`] to drop them.
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    config: IndexConfig,
    resource_type: String,
    keys: Vec<String>,
}

impl ResourceFilter {
    pub fn new<K: AsRef<str>>(config: IndexConfig, resource_type: &str, keys: &[K]) -> Self {
        Self {
            config,
            resource_type: resource_type.to_string(),
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
        }
    }

    fn joined(&self, column: &str) -> SimpleExpr {
        Expr::col((Alias::new(MATCH_ALIAS), Alias::new(column))).into()
    }

    /// Join condition between the index and the candidate key column.
    ///
    /// References are stored as text, so the candidate key is cast before
    /// comparing. PostgreSQL has no implicit integer/text equality.
    pub fn join_condition<C: IntoColumnRef>(&self, candidate: C) -> Condition {
        Condition::all()
            .add(
                Expr::col((
                    Alias::new(MATCH_ALIAS),
                    Alias::new(self.config.reference_field.as_str()),
                ))
                .eq(Expr::col(candidate).cast_as(Alias::new("text"))),
            )
            .add(
                Expr::col((
                    Alias::new(MATCH_ALIAS),
                    Alias::new(self.config.resource_type_field.as_str()),
                ))
                .eq(self.resource_type.as_str()),
            )
            .add(any_prefix(self.joined(&self.config.path_field), &self.keys))
    }

    /// Splice the stage into a select whose candidates are keyed by `candidate`.
    pub fn apply<C: IntoColumnRef>(&self, stmt: &mut SelectStatement, candidate: C) {
        stmt.join_as(
            JoinType::LeftJoin,
            Alias::new(self.config.collection.as_str()),
            Alias::new(MATCH_ALIAS),
            self.join_condition(candidate),
        )
        .expr_as(
            self.joined(&self.config.reference_field),
            Alias::new(MATCH_REFERENCE),
        )
        .expr_as(
            self.joined(&self.config.resource_type_field),
            Alias::new(MATCH_RESOURCE_TYPE),
        )
        .expr_as(self.joined(&self.config.path_field), Alias::new(MATCH_PATH));
    }

    /// Apply the stage to a sea-orm select, keyed by the entity's primary key.
    pub fn annotate<E: EntityTrait>(&self, mut select: Select<E>) -> Select<E> {
        if let Some(pk) = E::PrimaryKey::iter().next() {
            self.apply(QueryTrait::query(&mut select), (E::default(), pk.into_column()));
        }
        select
    }

    /// Condition keeping only candidates that found a matching entry.
    pub fn matched(&self) -> SimpleExpr {
        Expr::col((
            Alias::new(MATCH_ALIAS),
            Alias::new(self.config.path_field.as_str()),
        ))
        .is_not_null()
    }
}

/// A candidate row together with the entry the filter stage attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated<M> {
    pub candidate: M,
    pub resource: Option<ResourceIndexEntry>,
}

impl<M> Annotated<M> {
    pub fn is_authorized(&self) -> bool {
        self.resource.is_some()
    }
}

impl<M: FromQueryResult> FromQueryResult for Annotated<M> {
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        let candidate = M::from_query_result(res, pre)?;
        let reference: Option<String> = res.try_get(pre, MATCH_REFERENCE)?;
        let resource_type: Option<String> = res.try_get(pre, MATCH_RESOURCE_TYPE)?;
        let path: Option<String> = res.try_get(pre, MATCH_PATH)?;

        let resource = match (reference, resource_type, path) {
            (Some(reference), Some(resource_type), Some(path)) => Some(ResourceIndexEntry {
                reference,
                resource_type,
                path,
            }),
            _ => None,
        };

        Ok(Self {
            candidate,
            resource,
        })
    }
}
