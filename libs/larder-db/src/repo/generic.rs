//! Generic aggregate repository.
//!
//! Every operation takes the connection to run on (a pooled connection or the
//! transaction of a [`UnitOfWork`](crate::repo::UnitOfWork)) and never commits.
//! Only aggregate roots go in and out: owned collections are written and read
//! together with their root and cannot be queried on their own.

use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, Order, Query, SelectStatement, SimpleExpr};
use sea_orm::{ConnectionTrait, DbErr, QueryResult, SqlErr, Statement, StatementBuilder};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::{ConfigError, LimitCfg};
use crate::error::RepoError;
use crate::query::{
    FieldKind, FilterClause, FilterMapper, QueryBuilder, QueryPlan, QueryRequest, ROOT_ID, TOTAL,
};
use crate::repo::mapper::EntityMapper;
use crate::repo::page::Page;
use crate::repo::record::{
    AggregateRecord, ChildTable, Children, Column, DeletePolicy, EntityDescriptor, MappingError,
    RecordRow,
};

pub struct GenericRepository<M: EntityMapper> {
    mapper: M,
    filters: Arc<FilterMapper>,
    limits: LimitCfg,
}

impl<M: EntityMapper> GenericRepository<M> {
    /// Wire a mapper with its filter table.
    ///
    /// # Errors
    /// `ConfigError::InvalidRepository` when the filter table belongs to another
    /// entity or the primary key is not a UUID column.
    pub fn new(mapper: M, filters: Arc<FilterMapper>, limits: LimitCfg) -> Result<Self, ConfigError> {
        let d = mapper.descriptor();
        if filters.entity() != d.table || filters.primary_key() != d.primary_key {
            return Err(ConfigError::InvalidRepository(format!(
                "filter table for {}.{} used with entity {}.{}",
                filters.entity(),
                filters.primary_key(),
                d.table,
                d.primary_key
            )));
        }
        let pk_is_uuid = d
            .columns
            .iter()
            .any(|c| c.name == d.primary_key && c.kind == FieldKind::Uuid);
        if !pk_is_uuid {
            return Err(ConfigError::InvalidRepository(format!(
                "{}.{} must be declared as a Uuid column",
                d.table, d.primary_key
            )));
        }
        Ok(Self {
            mapper,
            filters,
            limits,
        })
    }

    #[must_use]
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    #[must_use]
    pub fn filters(&self) -> &FilterMapper {
        &self.filters
    }

    fn desc(&self) -> &'static EntityDescriptor {
        self.mapper.descriptor()
    }

    /// Insert a new aggregate with version 1.
    ///
    /// # Errors
    /// `DuplicateIdentity` if the id is taken, `MappingIntegrity` if the aggregate
    /// cannot be flattened, `Storage` on driver failure.
    #[instrument(skip_all, fields(entity = self.desc().table))]
    pub async fn add<C: ConnectionTrait>(
        &self,
        runner: &C,
        aggregate: &M::Aggregate,
    ) -> Result<(), RepoError> {
        let d = self.desc();
        let record = self.mapper.to_record(aggregate)?;
        let children = self.mapper.to_children(aggregate)?;
        let id = record.id(d)?;

        let mut values = root_values(d, &record.root)?;
        values.push(1_i64.into());
        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(d.table))
            .columns(
                d.column_names()
                    .chain(iter::once(d.version_column))
                    .map(Alias::new),
            )
            .values(values)
            .map_err(build_failure)?;

        match exec(runner, &insert).await {
            Ok(_) => {}
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(%id, "identity already taken");
                return Err(RepoError::DuplicateIdentity {
                    entity: d.table,
                    id,
                });
            }
            Err(e) => return Err(RepoError::storage(e)),
        }

        self.insert_children(runner, id, &children).await?;
        debug!(%id, "aggregate added");
        Ok(())
    }

    /// Load one aggregate with all owned collections.
    ///
    /// # Errors
    /// `NotFound` if no visible root has this id.
    #[instrument(skip_all, fields(entity = self.desc().table, id = %id))]
    pub async fn get<C: ConnectionTrait>(
        &self,
        runner: &C,
        id: Uuid,
    ) -> Result<M::Aggregate, RepoError> {
        let d = self.desc();
        let mut q = self.root_select();
        q.and_where(self.root_col(d.primary_key).eq(id));
        if let Some(hidden) = self.visible() {
            q.and_where(hidden);
        }
        let row = runner
            .query_one(build(runner, &q))
            .await
            .map_err(RepoError::storage)?
            .ok_or(RepoError::NotFound {
                entity: d.table,
                id,
            })?;
        let record = read_record(d, &row)?;
        let mut children = self.load_children(runner, &[id]).await?;
        let aggregate = self
            .mapper
            .to_aggregate(record, children.remove(&id).unwrap_or_default())?;
        Ok(aggregate)
    }

    /// # Errors
    /// `Storage` on driver failure.
    #[instrument(skip_all, fields(entity = self.desc().table, id = %id))]
    pub async fn exists<C: ConnectionTrait>(&self, runner: &C, id: Uuid) -> Result<bool, RepoError> {
        let d = self.desc();
        let mut q = Query::select();
        q.column((Alias::new(d.table), Alias::new(d.primary_key)))
            .from(Alias::new(d.table))
            .and_where(self.root_col(d.primary_key).eq(id))
            .limit(1);
        if let Some(hidden) = self.visible() {
            q.and_where(hidden);
        }
        let row = runner
            .query_one(build(runner, &q))
            .await
            .map_err(RepoError::storage)?;
        Ok(row.is_some())
    }

    /// Optimistic-concurrency write of the root and a full replace of owned rows.
    ///
    /// The write only applies when the stored version equals the aggregate's
    /// version. Returns the new version.
    ///
    /// # Errors
    /// `ConcurrentModification` if another writer got there first, `NotFound` if the
    /// root is gone, `MappingIntegrity` or `Storage` otherwise.
    #[instrument(skip_all, fields(entity = self.desc().table))]
    pub async fn update<C: ConnectionTrait>(
        &self,
        runner: &C,
        aggregate: &M::Aggregate,
    ) -> Result<i64, RepoError> {
        let d = self.desc();
        let record = self.mapper.to_record(aggregate)?;
        let children = self.mapper.to_children(aggregate)?;
        let id = record.id(d)?;
        let expected = record.version;

        let mut assignments = Vec::with_capacity(d.columns.len());
        for column in d.column_names().filter(|c| *c != d.primary_key) {
            let value = record.root.raw(column)?.clone();
            assignments.push((Alias::new(column), SimpleExpr::from(value)));
        }
        let mut update = Query::update();
        update
            .table(Alias::new(d.table))
            .values(assignments)
            .value(
                Alias::new(d.version_column),
                Expr::col(Alias::new(d.version_column)).add(1),
            )
            .and_where(Expr::col(Alias::new(d.primary_key)).eq(id))
            .and_where(Expr::col(Alias::new(d.version_column)).eq(expected));
        if let Some(column) = d.soft_delete_column() {
            update.and_where(Expr::col(Alias::new(column)).is_null());
        }

        let affected = exec(runner, &update).await.map_err(RepoError::storage)?;
        if affected == 0 {
            if self.exists(runner, id).await? {
                warn!(%id, expected_version = expected, "stale update rejected");
                return Err(RepoError::ConcurrentModification {
                    entity: d.table,
                    id,
                    expected_version: expected,
                });
            }
            debug!(%id, "update target not found");
            return Err(RepoError::NotFound {
                entity: d.table,
                id,
            });
        }

        self.delete_children(runner, id).await?;
        self.insert_children(runner, id, &children).await?;
        debug!(%id, version = expected + 1, "aggregate updated");
        Ok(expected + 1)
    }

    /// Delete per the entity's policy: hard deletes remove owned rows too, soft
    /// deletes stamp the marker column and hide the root from then on.
    ///
    /// # Errors
    /// `NotFound` if no visible root has this id.
    #[instrument(skip_all, fields(entity = self.desc().table, id = %id))]
    pub async fn delete<C: ConnectionTrait>(&self, runner: &C, id: Uuid) -> Result<(), RepoError> {
        let d = self.desc();
        let affected = match d.delete_policy {
            DeletePolicy::Hard => {
                self.delete_children(runner, id).await?;
                let mut delete = Query::delete();
                delete
                    .from_table(Alias::new(d.table))
                    .and_where(Expr::col(Alias::new(d.primary_key)).eq(id));
                exec(runner, &delete).await
            }
            DeletePolicy::Soft { column } => {
                let mut update = Query::update();
                update
                    .table(Alias::new(d.table))
                    .value(Alias::new(column), Utc::now())
                    .and_where(Expr::col(Alias::new(d.primary_key)).eq(id))
                    .and_where(Expr::col(Alias::new(column)).is_null());
                exec(runner, &update).await
            }
        }
        .map_err(RepoError::storage)?;

        if affected == 0 {
            debug!("delete target not found");
            return Err(RepoError::NotFound {
                entity: d.table,
                id,
            });
        }
        Ok(())
    }

    /// Validate a request and build its plan without touching storage.
    ///
    /// # Errors
    /// `Validation` or `Plan`.
    pub fn plan(&self, request: &QueryRequest) -> Result<QueryPlan, RepoError> {
        Ok(QueryBuilder::new(&self.filters, self.limits).build_request(request)?)
    }

    /// Filtered, sorted, paged query over roots.
    ///
    /// # Errors
    /// `Validation`/`Plan` before any storage access, then `MappingIntegrity` or
    /// `Storage`.
    #[instrument(skip_all, fields(entity = self.desc().table, offset = request.offset))]
    pub async fn query<C: ConnectionTrait>(
        &self,
        runner: &C,
        request: &QueryRequest,
    ) -> Result<Page<M::Aggregate>, RepoError> {
        let plan = self.plan(request)?;
        self.execute(runner, plan, request.with_total).await
    }

    /// Run a plan built by [`GenericRepository::plan`].
    ///
    /// # Errors
    /// `MappingIntegrity` or `Storage`.
    pub async fn execute<C: ConnectionTrait>(
        &self,
        runner: &C,
        plan: QueryPlan,
        with_total: bool,
    ) -> Result<Page<M::Aggregate>, RepoError> {
        let total = if with_total {
            Some(self.count_plan(runner, &plan).await?)
        } else {
            None
        };
        if plan.limit() == 0 {
            debug!("zero limit, items not fetched");
            return Ok(Page::empty(total));
        }

        let records = if plan.requires_deduplication() {
            self.fetch_distinct(runner, &plan).await?
        } else {
            self.fetch_direct(runner, &plan).await?
        };
        let items = self.assemble(runner, records).await?;
        debug!(items = items.len(), "query executed");
        Ok(Page { items, total })
    }

    /// Number of visible roots matching `filters`.
    ///
    /// # Errors
    /// `Validation`/`Plan` or `Storage`.
    #[instrument(skip_all, fields(entity = self.desc().table))]
    pub async fn count<C: ConnectionTrait>(
        &self,
        runner: &C,
        filters: &[FilterClause],
    ) -> Result<u64, RepoError> {
        let plan = QueryBuilder::new(&self.filters, self.limits).build(filters, &[], Some(0), 0)?;
        self.count_plan(runner, &plan).await
    }

    /* ---------- statements ---------- */

    fn root_col(&self, column: &'static str) -> Expr {
        Expr::col((Alias::new(self.desc().table), Alias::new(column)))
    }

    fn visible(&self) -> Option<SimpleExpr> {
        self.desc()
            .soft_delete_column()
            .map(|column| self.root_col(column).is_null())
    }

    fn root_select(&self) -> SelectStatement {
        let d = self.desc();
        let mut q = Query::select();
        q.from(Alias::new(d.table));
        for column in d.column_names().chain(iter::once(d.version_column)) {
            q.column((Alias::new(d.table), Alias::new(column)));
        }
        q
    }

    /* ---------- fetch strategies ---------- */

    async fn fetch_direct<C: ConnectionTrait>(
        &self,
        runner: &C,
        plan: &QueryPlan,
    ) -> Result<Vec<AggregateRecord>, RepoError> {
        let d = self.desc();
        let columns: Vec<&str> = d
            .column_names()
            .chain(iter::once(d.version_column))
            .collect();
        let stmt = plan.rows_statement(&columns, d.soft_delete_column());
        let rows = runner
            .query_all(build(runner, &stmt))
            .await
            .map_err(RepoError::storage)?;
        rows.iter().map(|row| read_record(d, row)).collect()
    }

    async fn fetch_distinct<C: ConnectionTrait>(
        &self,
        runner: &C,
        plan: &QueryPlan,
    ) -> Result<Vec<AggregateRecord>, RepoError> {
        let d = self.desc();
        let stmt = plan.id_page_statement(d.soft_delete_column());
        let ids: Vec<Uuid> = runner
            .query_all(build(runner, &stmt))
            .await
            .and_then(|rows| rows.iter().map(|r| r.try_get("", ROOT_ID)).collect())
            .map_err(RepoError::storage)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut q = self.root_select();
        q.and_where(self.root_col(d.primary_key).is_in(ids.iter().copied()));
        let rows = runner
            .query_all(build(runner, &q))
            .await
            .map_err(RepoError::storage)?;
        let mut by_id = HashMap::with_capacity(rows.len());
        for row in &rows {
            let record = read_record(d, row)?;
            by_id.insert(record.id(d)?, record);
        }
        // Restore the id page order.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn count_plan<C: ConnectionTrait>(
        &self,
        runner: &C,
        plan: &QueryPlan,
    ) -> Result<u64, RepoError> {
        let stmt = plan.count_statement(self.desc().soft_delete_column());
        let row = runner
            .query_one(build(runner, &stmt))
            .await
            .map_err(RepoError::storage)?;
        let total: i64 = match row {
            Some(r) => r.try_get("", TOTAL).map_err(RepoError::storage)?,
            None => 0,
        };
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn assemble<C: ConnectionTrait>(
        &self,
        runner: &C,
        records: Vec<AggregateRecord>,
    ) -> Result<Vec<M::Aggregate>, RepoError> {
        let d = self.desc();
        let ids = records
            .iter()
            .map(|r| r.id(d))
            .collect::<Result<Vec<_>, _>>()?;
        let mut children = self.load_children(runner, &ids).await?;
        records
            .into_iter()
            .zip(ids)
            .map(|(record, id)| {
                let owned = children.remove(&id).unwrap_or_default();
                Ok(self.mapper.to_aggregate(record, owned)?)
            })
            .collect()
    }

    /* ---------- owned collections ---------- */

    /// One statement per child table for all `ids`, grouped by owner in memory.
    async fn load_children<C: ConnectionTrait>(
        &self,
        runner: &C,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Children>, RepoError> {
        let mut out: HashMap<Uuid, Children> = HashMap::new();
        if ids.is_empty() {
            return Ok(out);
        }
        for child in self.desc().children {
            let mut q = Query::select();
            q.from(Alias::new(child.table));
            for column in child_columns(child) {
                q.column(Alias::new(column.name));
            }
            q.and_where(Expr::col(Alias::new(child.foreign_key)).is_in(ids.iter().copied()))
                .order_by(Alias::new(child.foreign_key), Order::Asc);
            for column in child.order_by {
                q.order_by(Alias::new(*column), Order::Asc);
            }
            let rows = runner
                .query_all(build(runner, &q))
                .await
                .map_err(RepoError::storage)?;
            for row in &rows {
                let record = RecordRow::read(child.table, row, child_columns(child))
                    .map_err(RepoError::storage)?;
                let owner: Uuid = record.get(child.foreign_key)?;
                out.entry(owner).or_default().push(record);
            }
        }
        Ok(out)
    }

    async fn insert_children<C: ConnectionTrait>(
        &self,
        runner: &C,
        id: Uuid,
        children: &Children,
    ) -> Result<(), RepoError> {
        for child in self.desc().children {
            let rows = children.rows(child.table);
            if rows.is_empty() {
                continue;
            }
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(child.table))
                .columns(child_columns(child).map(|c| Alias::new(c.name)));
            for row in rows {
                if row.get::<Uuid>(child.foreign_key)? != id {
                    return Err(MappingError::OrphanChild {
                        table: child.table,
                        root: id,
                    }
                    .into());
                }
                let mut values = Vec::with_capacity(child.columns.len() + 1);
                for column in child_columns(child) {
                    values.push(SimpleExpr::from(row.raw(column.name)?.clone()));
                }
                insert.values(values).map_err(build_failure)?;
            }
            exec(runner, &insert).await.map_err(RepoError::storage)?;
        }
        Ok(())
    }

    async fn delete_children<C: ConnectionTrait>(
        &self,
        runner: &C,
        id: Uuid,
    ) -> Result<(), RepoError> {
        for child in self.desc().children {
            let mut delete = Query::delete();
            delete
                .from_table(Alias::new(child.table))
                .and_where(Expr::col(Alias::new(child.foreign_key)).eq(id));
            exec(runner, &delete).await.map_err(RepoError::storage)?;
        }
        Ok(())
    }
}

/* ---------- helpers ---------- */

fn build<C: ConnectionTrait, S: StatementBuilder>(runner: &C, stmt: &S) -> Statement {
    runner.get_database_backend().build(stmt)
}

async fn exec<C: ConnectionTrait, S: StatementBuilder>(runner: &C, stmt: &S) -> Result<u64, DbErr> {
    let res = runner.execute(build(runner, stmt)).await?;
    Ok(res.rows_affected())
}

#[allow(clippy::needless_pass_by_value)]
fn build_failure(e: sea_orm::sea_query::error::Error) -> RepoError {
    RepoError::Storage {
        message: e.to_string(),
    }
}

fn root_values(d: &EntityDescriptor, root: &RecordRow) -> Result<Vec<SimpleExpr>, MappingError> {
    d.column_names()
        .map(|column| Ok(SimpleExpr::from(root.raw(column)?.clone())))
        .collect()
}

fn child_columns(child: &ChildTable) -> impl Iterator<Item = Column> {
    iter::once(Column::new(child.foreign_key, FieldKind::Uuid)).chain(child.columns.iter().copied())
}

fn read_record(d: &EntityDescriptor, row: &QueryResult) -> Result<AggregateRecord, RepoError> {
    let root = RecordRow::read(d.table, row, d.columns.iter().copied()).map_err(RepoError::storage)?;
    let version: i64 = row
        .try_get("", d.version_column)
        .map_err(RepoError::storage)?;
    Ok(AggregateRecord::new(root, version))
}
