use crate::error::{DbError, DbResult};
use crate::query_builder::{LikeSide, TableBuilder};
use crate::types::RowValues;

use super::Model;

/// Every builder call a model passes through to its builder.
///
/// The read and bulk-write terminals are listed too so that callers reaching for them get
/// an error naming the model method to use instead.
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderCall {
    Select(String),
    SelectRaw(String),
    SelectMax { column: String, alias: Option<String> },
    SelectMin { column: String, alias: Option<String> },
    SelectAvg { column: String, alias: Option<String> },
    SelectSum { column: String, alias: Option<String> },
    SelectCount { column: String, alias: Option<String> },
    Distinct,
    Join { table: String, condition: String, join_type: String },
    JoinRaw { sql: String, params: Vec<RowValues> },
    Where { column: String, op: String, value: RowValues },
    OrWhere { column: String, op: String, value: RowValues },
    WhereRaw { sql: String, params: Vec<RowValues> },
    OrWhereRaw { sql: String, params: Vec<RowValues> },
    WhereColumn { left: String, op: String, right: String },
    WhereIn { column: String, values: Vec<RowValues> },
    OrWhereIn { column: String, values: Vec<RowValues> },
    WhereNotIn { column: String, values: Vec<RowValues> },
    OrWhereNotIn { column: String, values: Vec<RowValues> },
    WhereNull(String),
    OrWhereNull(String),
    WhereNotNull(String),
    OrWhereNotNull(String),
    WhereBetween { column: String, low: RowValues, high: RowValues },
    OrWhereBetween { column: String, low: RowValues, high: RowValues },
    Like { column: String, value: String, side: LikeSide },
    OrLike { column: String, value: String, side: LikeSide },
    NotLike { column: String, value: String, side: LikeSide },
    OrNotLike { column: String, value: String, side: LikeSide },
    GroupStart,
    OrGroupStart,
    NotGroupStart,
    OrNotGroupStart,
    GroupEnd,
    Having { column: String, op: String, value: RowValues },
    OrHaving { column: String, op: String, value: RowValues },
    HavingRaw { sql: String, params: Vec<RowValues> },
    OrHavingRaw { sql: String, params: Vec<RowValues> },
    HavingGroupStart,
    OrHavingGroupStart,
    HavingGroupEnd,
    GroupBy(String),
    OrderBy { columns: String, direction: String },
    OrderByRaw(String),
    Limit(u64),
    Offset(u64),
    ForUpdate,
    Set { column: String, value: RowValues },
    SetRaw { column: String, expression: String },
    Get,
    GetRowArray,
    GetResultArray,
    InsertBulk,
    UpdateBulk,
    Upsert,
    UpsertBulk,
}

impl BuilderCall {
    /// Builder method name the call maps to.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            BuilderCall::Select(_) => "select",
            BuilderCall::SelectRaw(_) => "select_raw",
            BuilderCall::SelectMax { .. } => "select_max",
            BuilderCall::SelectMin { .. } => "select_min",
            BuilderCall::SelectAvg { .. } => "select_avg",
            BuilderCall::SelectSum { .. } => "select_sum",
            BuilderCall::SelectCount { .. } => "select_count",
            BuilderCall::Distinct => "distinct",
            BuilderCall::Join { .. } => "join",
            BuilderCall::JoinRaw { .. } => "join_raw",
            BuilderCall::Where { .. } => "where",
            BuilderCall::OrWhere { .. } => "or_where",
            BuilderCall::WhereRaw { .. } => "where_raw",
            BuilderCall::OrWhereRaw { .. } => "or_where_raw",
            BuilderCall::WhereColumn { .. } => "where_column",
            BuilderCall::WhereIn { .. } => "where_in",
            BuilderCall::OrWhereIn { .. } => "or_where_in",
            BuilderCall::WhereNotIn { .. } => "where_not_in",
            BuilderCall::OrWhereNotIn { .. } => "or_where_not_in",
            BuilderCall::WhereNull(_) => "where_null",
            BuilderCall::OrWhereNull(_) => "or_where_null",
            BuilderCall::WhereNotNull(_) => "where_not_null",
            BuilderCall::OrWhereNotNull(_) => "or_where_not_null",
            BuilderCall::WhereBetween { .. } => "where_between",
            BuilderCall::OrWhereBetween { .. } => "or_where_between",
            BuilderCall::Like { .. } => "like",
            BuilderCall::OrLike { .. } => "or_like",
            BuilderCall::NotLike { .. } => "not_like",
            BuilderCall::OrNotLike { .. } => "or_not_like",
            BuilderCall::GroupStart => "group_start",
            BuilderCall::OrGroupStart => "or_group_start",
            BuilderCall::NotGroupStart => "not_group_start",
            BuilderCall::OrNotGroupStart => "or_not_group_start",
            BuilderCall::GroupEnd => "group_end",
            BuilderCall::Having { .. } => "having",
            BuilderCall::OrHaving { .. } => "or_having",
            BuilderCall::HavingRaw { .. } => "having_raw",
            BuilderCall::OrHavingRaw { .. } => "or_having_raw",
            BuilderCall::HavingGroupStart => "having_group_start",
            BuilderCall::OrHavingGroupStart => "or_having_group_start",
            BuilderCall::HavingGroupEnd => "having_group_end",
            BuilderCall::GroupBy(_) => "group_by",
            BuilderCall::OrderBy { .. } => "order_by",
            BuilderCall::OrderByRaw(_) => "order_by_raw",
            BuilderCall::Limit(_) => "limit",
            BuilderCall::Offset(_) => "offset",
            BuilderCall::ForUpdate => "for_update",
            BuilderCall::Set { .. } => "set",
            BuilderCall::SetRaw { .. } => "set_raw",
            BuilderCall::Get => "get",
            BuilderCall::GetRowArray => "get_row_array",
            BuilderCall::GetResultArray => "get_result_array",
            BuilderCall::InsertBulk => "insert_bulk",
            BuilderCall::UpdateBulk => "update_bulk",
            BuilderCall::Upsert => "upsert",
            BuilderCall::UpsertBulk => "upsert_bulk",
        }
    }

    /// Model method to use instead, for calls a model refuses to forward.
    #[must_use]
    pub fn model_equivalent(&self) -> Option<&'static str> {
        match self {
            BuilderCall::Get | BuilderCall::GetResultArray => Some("find_all"),
            BuilderCall::GetRowArray => Some("first"),
            BuilderCall::InsertBulk => Some("insert"),
            BuilderCall::UpdateBulk => Some("update"),
            BuilderCall::Upsert | BuilderCall::UpsertBulk => Some("upsert"),
            _ => None,
        }
    }

    /// True for calls that add a WHERE predicate.
    #[must_use]
    pub fn adds_where(&self) -> bool {
        self.name().contains("where")
            || matches!(
                self,
                BuilderCall::Like { .. }
                    | BuilderCall::OrLike { .. }
                    | BuilderCall::NotLike { .. }
                    | BuilderCall::OrNotLike { .. }
            )
    }
}

impl Model<'_> {
    /// Forward one call to the builder.
    ///
    /// A WHERE-adding call made while no group is open first opens a group that is closed
    /// before the next terminal call. The group attaches with OR when the call itself is
    /// an `or_` call. Before the soft-delete filter is added, a WHERE list with a top-level
    /// OR is wrapped once more so the filter applies to every branch.
    ///
    /// # Errors
    /// Returns `DbError::UnsupportedMethod` for the raw read and bulk-write terminals.
    pub fn call(&mut self, call: BuilderCall) -> DbResult<&mut Self> {
        if let Some(equivalent) = call.model_equivalent() {
            return Err(DbError::UnsupportedMethod(format!(
                "{} cannot be called through a model; use {equivalent} instead",
                call.name()
            )));
        }
        Ok(self.apply(call))
    }

    fn apply(&mut self, call: BuilderCall) -> &mut Self {
        if call.adds_where() && !self.auto_group && !self.builder.fragments().has_open_group() {
            if call.name().starts_with("or_") {
                self.builder.or_group_start();
            } else {
                self.builder.group_start();
            }
            self.auto_group = true;
        }
        let b = &mut self.builder;
        match call {
            BuilderCall::Select(columns) => {
                b.select(&columns);
            }
            BuilderCall::SelectRaw(expression) => {
                b.select_raw(&expression);
            }
            BuilderCall::SelectMax { column, alias } => {
                b.select_max(&column, alias.as_deref());
            }
            BuilderCall::SelectMin { column, alias } => {
                b.select_min(&column, alias.as_deref());
            }
            BuilderCall::SelectAvg { column, alias } => {
                b.select_avg(&column, alias.as_deref());
            }
            BuilderCall::SelectSum { column, alias } => {
                b.select_sum(&column, alias.as_deref());
            }
            BuilderCall::SelectCount { column, alias } => {
                b.select_count(&column, alias.as_deref());
            }
            BuilderCall::Distinct => {
                b.distinct();
            }
            BuilderCall::Join {
                table,
                condition,
                join_type,
            } => {
                b.join(&table, &condition, &join_type);
            }
            BuilderCall::JoinRaw { sql, params } => {
                b.join_raw(&sql, params);
            }
            BuilderCall::Where { column, op, value } => {
                b.where_(&column, &op, value);
            }
            BuilderCall::OrWhere { column, op, value } => {
                b.or_where(&column, &op, value);
            }
            BuilderCall::WhereRaw { sql, params } => {
                b.where_raw(&sql, params);
            }
            BuilderCall::OrWhereRaw { sql, params } => {
                b.or_where_raw(&sql, params);
            }
            BuilderCall::WhereColumn { left, op, right } => {
                b.where_column(&left, &op, &right);
            }
            BuilderCall::WhereIn { column, values } => {
                b.where_in(&column, values);
            }
            BuilderCall::OrWhereIn { column, values } => {
                b.or_where_in(&column, values);
            }
            BuilderCall::WhereNotIn { column, values } => {
                b.where_not_in(&column, values);
            }
            BuilderCall::OrWhereNotIn { column, values } => {
                b.or_where_not_in(&column, values);
            }
            BuilderCall::WhereNull(column) => {
                b.where_null(&column);
            }
            BuilderCall::OrWhereNull(column) => {
                b.or_where_null(&column);
            }
            BuilderCall::WhereNotNull(column) => {
                b.where_not_null(&column);
            }
            BuilderCall::OrWhereNotNull(column) => {
                b.or_where_not_null(&column);
            }
            BuilderCall::WhereBetween { column, low, high } => {
                b.where_between(&column, low, high);
            }
            BuilderCall::OrWhereBetween { column, low, high } => {
                b.or_where_between(&column, low, high);
            }
            BuilderCall::Like {
                column,
                value,
                side,
            } => {
                b.like(&column, &value, side);
            }
            BuilderCall::OrLike {
                column,
                value,
                side,
            } => {
                b.or_like(&column, &value, side);
            }
            BuilderCall::NotLike {
                column,
                value,
                side,
            } => {
                b.not_like(&column, &value, side);
            }
            BuilderCall::OrNotLike {
                column,
                value,
                side,
            } => {
                b.or_not_like(&column, &value, side);
            }
            BuilderCall::GroupStart => {
                b.group_start();
            }
            BuilderCall::OrGroupStart => {
                b.or_group_start();
            }
            BuilderCall::NotGroupStart => {
                b.not_group_start();
            }
            BuilderCall::OrNotGroupStart => {
                b.or_not_group_start();
            }
            BuilderCall::GroupEnd => {
                b.group_end();
            }
            BuilderCall::Having { column, op, value } => {
                b.having(&column, &op, value);
            }
            BuilderCall::OrHaving { column, op, value } => {
                b.or_having(&column, &op, value);
            }
            BuilderCall::HavingRaw { sql, params } => {
                b.having_raw(&sql, params);
            }
            BuilderCall::OrHavingRaw { sql, params } => {
                b.or_having_raw(&sql, params);
            }
            BuilderCall::HavingGroupStart => {
                b.having_group_start();
            }
            BuilderCall::OrHavingGroupStart => {
                b.or_having_group_start();
            }
            BuilderCall::HavingGroupEnd => {
                b.having_group_end();
            }
            BuilderCall::GroupBy(columns) => {
                b.group_by(&columns);
            }
            BuilderCall::OrderBy { columns, direction } => {
                b.order_by(&columns, &direction);
            }
            BuilderCall::OrderByRaw(expression) => {
                b.order_by_raw(&expression);
            }
            BuilderCall::Limit(limit) => {
                b.limit(limit);
            }
            BuilderCall::Offset(offset) => {
                b.offset(offset);
            }
            BuilderCall::ForUpdate => {
                b.for_update();
            }
            BuilderCall::Set { column, value } => {
                b.set(&column, value);
            }
            BuilderCall::SetRaw { column, expression } => {
                b.set_raw(&column, &expression);
            }
            // rejected by `call`
            BuilderCall::Get
            | BuilderCall::GetRowArray
            | BuilderCall::GetResultArray
            | BuilderCall::InsertBulk
            | BuilderCall::UpdateBulk
            | BuilderCall::Upsert
            | BuilderCall::UpsertBulk => {}
        }
        self
    }

    /// Close the group opened for the caller's WHERE calls, if any.
    pub(crate) fn close_auto_group(&mut self) {
        if self.auto_group {
            self.builder.group_end();
            self.auto_group = false;
        }
    }

    // ---- typed forwarding ----

    pub fn select(&mut self, columns: &str) -> &mut Self {
        self.apply(BuilderCall::Select(columns.to_string()))
    }

    pub fn where_(&mut self, column: &str, op: &str, value: impl Into<RowValues>) -> &mut Self {
        self.apply(BuilderCall::Where {
            column: column.to_string(),
            op: op.to_string(),
            value: value.into(),
        })
    }

    pub fn or_where(&mut self, column: &str, op: &str, value: impl Into<RowValues>) -> &mut Self {
        self.apply(BuilderCall::OrWhere {
            column: column.to_string(),
            op: op.to_string(),
            value: value.into(),
        })
    }

    pub fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        self.apply(BuilderCall::WhereIn {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn where_null(&mut self, column: &str) -> &mut Self {
        self.apply(BuilderCall::WhereNull(column.to_string()))
    }

    pub fn like(&mut self, column: &str, value: &str, side: LikeSide) -> &mut Self {
        self.apply(BuilderCall::Like {
            column: column.to_string(),
            value: value.to_string(),
            side,
        })
    }

    pub fn or_like(&mut self, column: &str, value: &str, side: LikeSide) -> &mut Self {
        self.apply(BuilderCall::OrLike {
            column: column.to_string(),
            value: value.to_string(),
            side,
        })
    }

    pub fn join(&mut self, table: &str, condition: &str, join_type: &str) -> &mut Self {
        self.apply(BuilderCall::Join {
            table: table.to_string(),
            condition: condition.to_string(),
            join_type: join_type.to_string(),
        })
    }

    pub fn group_start(&mut self) -> &mut Self {
        self.apply(BuilderCall::GroupStart)
    }

    pub fn group_end(&mut self) -> &mut Self {
        self.apply(BuilderCall::GroupEnd)
    }

    pub fn order_by(&mut self, columns: &str, direction: &str) -> &mut Self {
        self.apply(BuilderCall::OrderBy {
            columns: columns.to_string(),
            direction: direction.to_string(),
        })
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.apply(BuilderCall::Limit(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_family_counts_as_where() {
        let like = BuilderCall::OrNotLike {
            column: "name".into(),
            value: "x".into(),
            side: LikeSide::Both,
        };
        assert!(like.adds_where());
        assert!(BuilderCall::WhereColumn {
            left: "a".into(),
            op: "=".into(),
            right: "b".into()
        }
        .adds_where());
        assert!(!BuilderCall::OrderByRaw("id".into()).adds_where());
        assert!(!BuilderCall::Having {
            column: "n".into(),
            op: ">".into(),
            value: 1.into()
        }
        .adds_where());
    }

    #[test]
    fn denylisted_calls_name_their_replacement() {
        assert_eq!(BuilderCall::GetRowArray.model_equivalent(), Some("first"));
        assert_eq!(BuilderCall::UpdateBulk.model_equivalent(), Some("update"));
        assert_eq!(BuilderCall::Limit(3).model_equivalent(), None);
    }
}
