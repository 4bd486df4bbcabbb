use crate::error::DbResult;
use crate::types::QueryAndParams;

use super::fragments::{Clause, Fragments};

/// Column alias the row count is returned under.
pub(crate) const COUNT_ALIAS: &str = "numrows";

impl Fragments {
    fn select_list(&self) -> String {
        if self.select.is_empty() {
            format!("{}.*", self.table)
        } else {
            self.select.join(", ")
        }
    }

    /// Everything after the select list: FROM, joins, predicates, grouping.
    fn select_body(&self, sql: &mut String) {
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.wheres.is_empty() {
            sql.push(' ');
            sql.push_str(&self.wheres.render());
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.havings.is_empty() {
            sql.push(' ');
            sql.push_str(&self.havings.render());
        }
    }

    fn paging(&self, sql: &mut String) {
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => match self.dialect.offset_only_limit() {
                Some(max) => sql.push_str(&format!(" LIMIT {max} OFFSET {offset}")),
                None => sql.push_str(&format!(" OFFSET {offset}")),
            },
            (None, None) => {}
        }
    }

    fn select_params(&self) -> Vec<crate::types::RowValues> {
        let mut params = Vec::with_capacity(
            self.join_params.len() + self.wheres.params.len() + self.havings.params.len(),
        );
        params.extend(self.join_params.iter().cloned());
        params.extend(self.wheres.params.iter().cloned());
        params.extend(self.havings.params.iter().cloned());
        params
    }

    fn unseeded_select(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select_list());
        self.select_body(&mut sql);
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        self.paging(&mut sql);
        if self.lock {
            sql.push_str(" FOR UPDATE");
        }
        sql
    }

    /// Compile the accumulated state into a SELECT.
    ///
    /// # Errors
    /// Returns the first deferred builder error, or `DbError::InvalidInput` for an
    /// unbalanced group.
    pub fn compile_select(&self) -> DbResult<QueryAndParams> {
        self.check()?;
        let sql = self.unseeded_select();
        Ok(QueryAndParams::new(
            self.dialect.seed_placeholders(&sql),
            self.select_params(),
        ))
    }

    /// Compile a row count of what [`Fragments::compile_select`] would return.
    ///
    /// Grouped, filtered-by-HAVING or DISTINCT selects are counted through a subquery;
    /// plain selects are rewritten to `COUNT(*)` without ordering or paging.
    ///
    /// # Errors
    /// Same as [`Fragments::compile_select`].
    pub fn compile_count(&self) -> DbResult<QueryAndParams> {
        self.check()?;
        let alias = self.dialect.quote_identifier(COUNT_ALIAS);
        let sql = if self.distinct || !self.group_by.is_empty() || !self.havings.is_empty() {
            format!(
                "SELECT COUNT(*) AS {alias} FROM ({}) {}",
                self.unseeded_select(),
                self.dialect.quote_identifier("count_source")
            )
        } else {
            let mut sql = format!("SELECT COUNT(*) AS {alias}");
            self.select_body(&mut sql);
            sql
        };
        Ok(QueryAndParams::new(
            self.dialect.seed_placeholders(&sql),
            self.select_params(),
        ))
    }

    /// Rendered WHERE predicates without the keyword, for embedding in other statements.
    pub(crate) fn where_body(&self) -> String {
        self.wheres.body(Clause::Where)
    }
}
