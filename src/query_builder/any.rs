use async_trait::async_trait;

use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::DbResult;
use crate::types::Record;

use super::{ColumnTypes, Fragments, InsertResult, MySqlBuilder, PgBuilder, TableBuilder};

/// A builder for whichever dialect the driver speaks.
pub enum Builder<'d> {
    MySql(MySqlBuilder<'d>),
    Postgres(PgBuilder<'d>),
}

impl<'d> Builder<'d> {
    /// Bind `table` on `driver`, applying the connection's table prefix.
    pub fn new(driver: &'d mut dyn Driver, table: &str) -> Self {
        match driver.dialect() {
            Dialect::MySql => Builder::MySql(MySqlBuilder::new(driver, table)),
            Dialect::Postgres => Builder::Postgres(PgBuilder::new(driver, table)),
        }
    }
}

#[async_trait]
impl TableBuilder for Builder<'_> {
    fn fragments(&self) -> &Fragments {
        match self {
            Builder::MySql(b) => b.fragments(),
            Builder::Postgres(b) => b.fragments(),
        }
    }

    fn fragments_mut(&mut self) -> &mut Fragments {
        match self {
            Builder::MySql(b) => b.fragments_mut(),
            Builder::Postgres(b) => b.fragments_mut(),
        }
    }

    fn driver(&mut self) -> &mut dyn Driver {
        match self {
            Builder::MySql(b) => b.driver(),
            Builder::Postgres(b) => b.driver(),
        }
    }

    async fn insert(&mut self, record: Record, reset: bool) -> DbResult<InsertResult> {
        match self {
            Builder::MySql(b) => b.insert(record, reset).await,
            Builder::Postgres(b) => b.insert(record, reset).await,
        }
    }

    fn upsert_clause(&self, columns: &[String], key: &str, excluded: &[&str]) -> String {
        match self {
            Builder::MySql(b) => b.upsert_clause(columns, key, excluded),
            Builder::Postgres(b) => b.upsert_clause(columns, key, excluded),
        }
    }

    async fn column_types(&mut self) -> DbResult<ColumnTypes> {
        match self {
            Builder::MySql(b) => b.column_types().await,
            Builder::Postgres(b) => b.column_types().await,
        }
    }

    async fn update_bulk_chunk(
        &mut self,
        rows: &[Record],
        key: &str,
        columns: &[String],
        types: &ColumnTypes,
    ) -> DbResult<usize> {
        match self {
            Builder::MySql(b) => b.update_bulk_chunk(rows, key, columns, types).await,
            Builder::Postgres(b) => b.update_bulk_chunk(rows, key, columns, types).await,
        }
    }
}
