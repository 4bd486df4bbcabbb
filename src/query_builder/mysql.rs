use async_trait::async_trait;

use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::types::{QueryAndParams, Record, RowValues};

use super::{ColumnTypes, Fragments, InsertResult, TableBuilder, cell_text};

/// Builder for the MySQL family (MySQL, MariaDB).
pub struct MySqlBuilder<'d> {
    driver: &'d mut dyn Driver,
    fragments: Fragments,
}

impl<'d> MySqlBuilder<'d> {
    pub fn new(driver: &'d mut dyn Driver, table: &str) -> Self {
        let config = driver.config();
        let fragments = Fragments::new(
            Dialect::MySql,
            &config.table_prefix,
            table,
            config.allow_truncate,
        );
        Self { driver, fragments }
    }

    fn stage_table(&self) -> String {
        Dialect::MySql.quote_identifier(&format!("{}_bulk_stage", self.fragments.physical_table()))
    }

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> DbResult<usize> {
        let call_site = format!("{}::update_bulk", self.fragments.table_name());
        self.driver.annotate(&call_site);
        self.driver.prepared_query(sql, params).await
    }

    /// Stage the chunk, then join it against the target table.
    async fn stage_and_update(
        &mut self,
        stage: &str,
        rows: &[Record],
        key: &str,
        columns: &[String],
    ) -> DbResult<usize> {
        let quoted: Vec<String> = columns
            .iter()
            .map(|c| Dialect::MySql.quote_identifier(c))
            .collect();
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut params = Vec::with_capacity(rows.len() * columns.len());
        for row in rows {
            for column in columns {
                params.push(row.get(column).cloned().unwrap_or(RowValues::Null));
            }
        }
        let insert = format!(
            "INSERT INTO {stage} ({}) VALUES {}",
            quoted.join(", "),
            vec![tuple; rows.len()].join(", ")
        );
        self.exec(&insert, &params).await?;

        let table = &self.fragments.table;
        let assignments: Vec<String> = quoted
            .iter()
            .filter(|q| **q != Dialect::MySql.quote_identifier(key))
            .map(|q| format!("{table}.{q} = {stage}.{q}"))
            .collect();
        let key = Dialect::MySql.quote_identifier(key);
        let mut update = format!(
            "UPDATE {table} INNER JOIN {stage} ON {table}.{key} = {stage}.{key} SET {}",
            assignments.join(", ")
        );
        let mut params = Vec::new();
        if !self.fragments.wheres.is_empty() {
            update.push(' ');
            update.push_str(&self.fragments.wheres.render());
            params.extend(self.fragments.wheres.params.iter().cloned());
        }
        self.exec(&update, &params).await
    }
}

/// `ON DUPLICATE KEY UPDATE`, or a no-op assignment of the key when every column is
/// excluded.
fn duplicate_key_clause(columns: &[String], key: &str, excluded: &[&str]) -> String {
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != key && !excluded.contains(&c.as_str()))
        .map(|c| {
            let c = Dialect::MySql.quote_identifier(c);
            format!("{c} = VALUES({c})")
        })
        .collect();
    if updates.is_empty() {
        let key = Dialect::MySql.quote_identifier(key);
        format!(" ON DUPLICATE KEY UPDATE {key} = {key}")
    } else {
        format!(" ON DUPLICATE KEY UPDATE {}", updates.join(", "))
    }
}

#[async_trait]
impl TableBuilder for MySqlBuilder<'_> {
    fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    fn fragments_mut(&mut self) -> &mut Fragments {
        &mut self.fragments
    }

    fn driver(&mut self) -> &mut dyn Driver {
        &mut *self.driver
    }

    async fn insert(&mut self, record: Record, reset: bool) -> DbResult<InsertResult> {
        let outcome = match self.fragments.compile_insert(&record, "") {
            Ok(query) => self.insert_once(query).await,
            Err(e) => Err(e),
        };
        if reset {
            self.fragments.reset();
        }
        outcome
    }

    fn upsert_clause(&self, columns: &[String], key: &str, excluded: &[&str]) -> String {
        duplicate_key_clause(columns, key, excluded)
    }

    async fn column_types(&mut self) -> DbResult<ColumnTypes> {
        let sql = format!("SHOW COLUMNS FROM {}", self.fragments.table);
        self.driver
            .raw_query(&sql)
            .await
            .map_err(|e| DbError::SchemaIntrospection(e.to_string()))?;
        let result = self.driver.get_result_array()?;
        let mut types = ColumnTypes::new();
        for row in &result.results {
            let field = row.get("Field").and_then(cell_text);
            let ty = row.get("Type").and_then(cell_text);
            if let (Some(field), Some(ty)) = (field, ty) {
                types.insert(field, ty);
            }
        }
        if types.is_empty() {
            return Err(DbError::SchemaIntrospection(format!(
                "no columns reported for {}",
                self.fragments.physical_table()
            )));
        }
        Ok(types)
    }

    async fn update_bulk_chunk(
        &mut self,
        rows: &[Record],
        key: &str,
        columns: &[String],
        types: &ColumnTypes,
    ) -> DbResult<usize> {
        let mut definitions = Vec::with_capacity(columns.len());
        for column in columns {
            let ty = types.get(column).ok_or_else(|| {
                DbError::SchemaIntrospection(format!(
                    "column {column} not found on {}",
                    self.fragments.physical_table()
                ))
            })?;
            definitions.push(format!("{} {ty}", Dialect::MySql.quote_identifier(column)));
        }

        let stage = self.stage_table();
        let create = format!(
            "CREATE TEMPORARY TABLE {stage} ({})",
            definitions.join(", ")
        );
        let created = self.exec(&create, &[]).await;
        let outcome = match created {
            Ok(_) => self.stage_and_update(&stage, rows, key, columns).await,
            Err(e) => Err(e),
        };

        let drop = format!("DROP TEMPORARY TABLE IF EXISTS {stage}");
        if let Err(err) = self.exec(&drop, &[]).await {
            tracing::warn!(table = %stage, error = %err, "failed to drop bulk update staging table");
        }
        outcome
    }
}

impl MySqlBuilder<'_> {
    async fn insert_once(&mut self, query: QueryAndParams) -> DbResult<InsertResult> {
        let call_site = format!("{}::insert", self.fragments.table_name());
        self.driver.annotate(&call_site);
        self.driver
            .prepared_query(&query.query, &query.params)
            .await?;
        let insert_id = self
            .driver
            .get_result_array()
            .ok()
            .and_then(|result| result.insert_id)
            .map(RowValues::Int);
        Ok(InsertResult {
            status: true,
            insert_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_clause_falls_back_to_key_noop() {
        let columns = vec!["id".to_string(), "created_at".to_string()];
        assert_eq!(
            duplicate_key_clause(&columns, "id", &["created_at"]),
            " ON DUPLICATE KEY UPDATE `id` = `id`"
        );

        let columns = vec!["id".to_string(), "name".to_string()];
        assert_eq!(
            duplicate_key_clause(&columns, "id", &[]),
            " ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
        );
    }
}
