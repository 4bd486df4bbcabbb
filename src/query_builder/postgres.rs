use async_trait::async_trait;

use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::types::{QueryAndParams, Record, RowValues};

use super::{ColumnTypes, Fragments, InsertResult, TableBuilder, cell_text};

const COLUMN_TYPES_SQL: &str = "SELECT column_name, data_type, udt_name \
     FROM information_schema.columns \
     WHERE table_name = $1::text AND table_schema = ANY (current_schemas(false))";

/// Alias of the VALUES list a bulk update joins against.
const STAGE_ALIAS: &str = "_u";

/// Builder for PostgreSQL.
pub struct PgBuilder<'d> {
    driver: &'d mut dyn Driver,
    fragments: Fragments,
}

impl<'d> PgBuilder<'d> {
    pub fn new(driver: &'d mut dyn Driver, table: &str) -> Self {
        let config = driver.config();
        let fragments = Fragments::new(
            Dialect::Postgres,
            &config.table_prefix,
            table,
            config.allow_truncate,
        );
        Self { driver, fragments }
    }

    async fn insert_returning(&mut self, query: QueryAndParams) -> DbResult<InsertResult> {
        let call_site = format!("{}::insert", self.fragments.table_name());
        self.driver.annotate(&call_site);
        self.driver
            .prepared_query(&query.query, &query.params)
            .await?;
        let insert_id = self
            .driver
            .get_row_array()?
            .and_then(|row| row.get(&self.fragments.key).cloned());
        Ok(InsertResult {
            status: true,
            insert_id,
        })
    }
}

/// Catalog type spelled so it can be used in a cast.
fn cast_type(data_type: &str, udt_name: Option<&str>) -> String {
    match (data_type, udt_name) {
        ("USER-DEFINED", Some(udt)) => Dialect::Postgres.quote_identifier(udt),
        ("ARRAY", Some(udt)) => format!("{}[]", udt.trim_start_matches('_')),
        _ => data_type.to_string(),
    }
}

/// `ON CONFLICT (key) DO UPDATE SET c = EXCLUDED.c`, or `DO NOTHING` when every
/// column is excluded.
fn on_conflict_clause(columns: &[String], key: &str, excluded: &[&str]) -> String {
    let key_ident = Dialect::Postgres.quote_identifier(key);
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != key && !excluded.contains(&c.as_str()))
        .map(|c| {
            let c = Dialect::Postgres.quote_identifier(c);
            format!("{c} = EXCLUDED.{c}")
        })
        .collect();
    if updates.is_empty() {
        format!(" ON CONFLICT ({key_ident}) DO NOTHING")
    } else {
        format!(
            " ON CONFLICT ({key_ident}) DO UPDATE SET {}",
            updates.join(", ")
        )
    }
}

#[async_trait]
impl TableBuilder for PgBuilder<'_> {
    fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    fn fragments_mut(&mut self) -> &mut Fragments {
        &mut self.fragments
    }

    fn driver(&mut self) -> &mut dyn Driver {
        &mut *self.driver
    }

    /// Inserts with `RETURNING *` and reads the key column back from the new row.
    async fn insert(&mut self, record: Record, reset: bool) -> DbResult<InsertResult> {
        let outcome = match self.fragments.compile_insert(&record, " RETURNING *") {
            Ok(query) => self.insert_returning(query).await,
            Err(e) => Err(e),
        };
        if reset {
            self.fragments.reset();
        }
        outcome
    }

    fn upsert_clause(&self, columns: &[String], key: &str, excluded: &[&str]) -> String {
        on_conflict_clause(columns, key, excluded)
    }

    async fn column_types(&mut self) -> DbResult<ColumnTypes> {
        let table = self.fragments.physical_table();
        let table_only = table.rsplit('.').next().unwrap_or(&table).to_string();
        self.driver
            .prepared_query(COLUMN_TYPES_SQL, &[RowValues::Text(table_only)])
            .await
            .map_err(|e| DbError::SchemaIntrospection(e.to_string()))?;
        let result = self.driver.get_result_array()?;
        let mut types = ColumnTypes::new();
        for row in &result.results {
            let name = row.get("column_name").and_then(cell_text);
            let data_type = row.get("data_type").and_then(cell_text);
            let udt = row.get("udt_name").and_then(cell_text);
            if let (Some(name), Some(data_type)) = (name, data_type) {
                types.insert(name, cast_type(&data_type, udt.as_deref()));
            }
        }
        if types.is_empty() {
            return Err(DbError::SchemaIntrospection(format!(
                "no columns reported for {table}"
            )));
        }
        Ok(types)
    }

    /// One `UPDATE ... FROM (VALUES ...)` per chunk, each value cast to its column type.
    async fn update_bulk_chunk(
        &mut self,
        rows: &[Record],
        key: &str,
        columns: &[String],
        types: &ColumnTypes,
    ) -> DbResult<usize> {
        let mark = self.fragments.placeholder();
        let mut casts = Vec::with_capacity(columns.len());
        for column in columns {
            let ty = types.get(column).ok_or_else(|| {
                DbError::SchemaIntrospection(format!(
                    "column {column} not found on {}",
                    self.fragments.physical_table()
                ))
            })?;
            casts.push(format!("{mark}::{ty}"));
        }
        let tuple = format!("({})", casts.join(", "));

        let mut params = Vec::with_capacity(rows.len() * columns.len());
        for row in rows {
            for column in columns {
                params.push(row.get(column).cloned().unwrap_or(RowValues::Null));
            }
        }

        let stage = Dialect::Postgres.quote_identifier(STAGE_ALIAS);
        let quoted: Vec<String> = columns
            .iter()
            .map(|c| Dialect::Postgres.quote_identifier(c))
            .collect();
        let key_ident = Dialect::Postgres.quote_identifier(key);
        let assignments: Vec<String> = quoted
            .iter()
            .filter(|q| **q != key_ident)
            .map(|q| format!("{q} = {stage}.{q}"))
            .collect();
        let table = &self.fragments.table;
        let mut sql = format!(
            "UPDATE {table} SET {} FROM (VALUES {}) AS {stage} ({}) \
             WHERE {table}.{key_ident} = {stage}.{key_ident}",
            assignments.join(", "),
            vec![tuple; rows.len()].join(", "),
            quoted.join(", ")
        );
        if !self.fragments.wheres.is_empty() {
            sql.push_str(&format!(" AND ({})", self.fragments.where_body()));
            params.extend(self.fragments.wheres.params.iter().cloned());
        }

        let sql = Dialect::Postgres.seed_placeholders(&sql);
        let call_site = format!("{}::update_bulk", self.fragments.table_name());
        self.driver.annotate(&call_site);
        self.driver.prepared_query(&sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_clause_excludes_columns() {
        let columns = vec![
            "id".to_string(),
            "email".to_string(),
            "created_at".to_string(),
        ];
        assert_eq!(
            on_conflict_clause(&columns, "id", &["created_at"]),
            " ON CONFLICT (\"id\") DO UPDATE SET \"email\" = EXCLUDED.\"email\""
        );
        assert_eq!(
            on_conflict_clause(&columns[..1], "id", &[]),
            " ON CONFLICT (\"id\") DO NOTHING"
        );
    }

    #[test]
    fn catalog_types_become_casts() {
        assert_eq!(cast_type("integer", Some("int4")), "integer");
        assert_eq!(cast_type("ARRAY", Some("_text")), "text[]");
        assert_eq!(cast_type("USER-DEFINED", Some("mood")), "\"mood\"");
    }
}
