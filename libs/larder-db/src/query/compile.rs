//! Lowering of a [`QueryPlan`] into `sea_query` statements.
//!
//! Two fetch strategies exist. Without one-to-many joins the root rows are read
//! directly in plan order. With them, a `DISTINCT` page of root ids is selected
//! first (sort columns ride along so ordering and paging happen in storage) and the
//! roots are loaded by id afterwards.

use sea_orm::Condition;
use sea_orm::sea_query::{
    Alias, Asterisk, Expr, Func, JoinType, Query, SelectStatement, SimpleExpr,
};

use crate::query::mapping::ColumnPath;
use crate::query::plan::QueryPlan;

/// Result column carrying the root id in id-page and count statements.
pub const ROOT_ID: &str = "__root_id";
/// Result column of the count statement.
pub const TOTAL: &str = "total";

impl QueryPlan {
    fn qualify(&self, path: ColumnPath) -> SimpleExpr {
        path.expr(self.base_entity)
    }

    /// `FROM base LEFT JOIN ... WHERE predicate [AND soft_delete IS NULL]` with an
    /// empty projection.
    fn filtered_select(&self, soft_delete: Option<&str>) -> SelectStatement {
        let mut q = Query::select();
        q.from(Alias::new(self.base_entity));
        for join in &self.joins {
            let from = join.from.relation.unwrap_or(self.base_entity);
            q.join_as(
                JoinType::LeftJoin,
                Alias::new(join.target_table),
                Alias::new(join.alias),
                Expr::col((Alias::new(from), Alias::new(join.from.column)))
                    .equals((Alias::new(join.alias), Alias::new(join.to_column))),
            );
        }

        let mut cond = Condition::all();
        if let Some(pred) = &self.predicate {
            cond = cond.add(pred.to_condition());
        }
        if let Some(column) = soft_delete {
            cond = cond.add(
                Expr::col((Alias::new(self.base_entity), Alias::new(column))).is_null(),
            );
        }
        if !cond.is_empty() {
            q.cond_where(cond);
        }
        q
    }

    /// Page of distinct root ids in plan order.
    #[must_use]
    pub fn id_page_statement(&self, soft_delete: Option<&str>) -> SelectStatement {
        let mut q = self.filtered_select(soft_delete);
        q.distinct()
            .expr_as(self.qualify(ColumnPath::root(self.primary_key)), Alias::new(ROOT_ID));
        for (i, s) in self.sort.iter().enumerate() {
            let alias = format!("__sort{i}");
            q.expr_as(self.qualify(s.path), Alias::new(&alias));
            q.order_by(Alias::new(&alias), s.direction.to_order());
        }
        q.limit(self.limit).offset(self.offset);
        q
    }

    /// Page of root rows in plan order, selecting `columns` of the root table.
    ///
    /// Only valid when the plan does not require deduplication.
    #[must_use]
    pub fn rows_statement(&self, columns: &[&str], soft_delete: Option<&str>) -> SelectStatement {
        let mut q = self.filtered_select(soft_delete);
        for column in columns {
            q.column((Alias::new(self.base_entity), Alias::new(*column)));
        }
        for s in &self.sort {
            q.order_by_expr(self.qualify(s.path), s.direction.to_order());
        }
        q.limit(self.limit).offset(self.offset);
        q
    }

    /// `SELECT COUNT(*) AS total` over the distinct matching roots, ignoring paging.
    #[must_use]
    pub fn count_statement(&self, soft_delete: Option<&str>) -> SelectStatement {
        let mut inner = self.filtered_select(soft_delete);
        if self.requires_deduplication {
            inner.distinct();
        }
        inner.expr_as(self.qualify(ColumnPath::root(self.primary_key)), Alias::new(ROOT_ID));

        Query::select()
            .expr_as(Func::count(Expr::col(Asterisk)), Alias::new(TOTAL))
            .from_subquery(inner, Alias::new("roots"))
            .to_owned()
    }
}
