//! A thin model layer over a table builder.
//!
//! A [`Model`] binds one table, its primary key and an allow-list of writable fields to a
//! builder on a driver, and layers soft deletes, automatic timestamps and lifecycle
//! callbacks on top:
//! ```rust,no_run
//! use querykit::model::{Model, ModelConfig};
//! use querykit::prelude::*;
//!
//! # async fn demo(driver: &mut dyn Driver) -> DbResult<()> {
//! let config = ModelConfig::new("users")
//!     .with_allowed_fields(["name", "email"])
//!     .with_timestamps(true)
//!     .with_soft_deletes(true);
//! let mut users = Model::new(driver, config)?;
//!
//! let created = users.insert(Record::from([("name", "Ann"), ("email", "ann@example.com")])).await?;
//! let ann = users.find(created.insert_id.unwrap_or(RowValues::Null)).await?;
//! users.where_("email", "LIKE", "%@example.com").delete(Vec::new()).await?;
//! # let _ = ann;
//! # Ok(())
//! # }
//! ```

mod callbacks;
mod config;
mod forward;

pub use callbacks::{Callback, Callbacks, EventData, ModelEvent};
pub use config::{DateFormat, ModelConfig};
pub use forward::BuilderCall;

use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::query_builder::{Builder, InsertResult, TableBuilder, UpdateResult};
use crate::results::DbRow;
use crate::types::{Payload, Record, RowValues};

/// Which rows the soft-delete filter lets through on the next find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DeletedScope {
    #[default]
    Live,
    All,
    OnlyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Insert,
    Update,
    Upsert,
}

impl WriteKind {
    fn method(self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Upsert => "upsert",
        }
    }

    fn stamps_created(self) -> bool {
        self != WriteKind::Update
    }

    /// Whether the primary key survives the allow-list.
    fn keeps_key(self, batch: bool) -> bool {
        match self {
            WriteKind::Insert => false,
            WriteKind::Update => batch,
            WriteKind::Upsert => true,
        }
    }
}

/// Outcome of a model write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteResult {
    pub status: bool,
    pub insert_id: Option<RowValues>,
    pub affected_rows: usize,
}

impl From<InsertResult> for WriteResult {
    fn from(result: InsertResult) -> Self {
        Self {
            status: result.status,
            insert_id: result.insert_id,
            affected_rows: usize::from(result.status),
        }
    }
}

impl From<UpdateResult> for WriteResult {
    fn from(result: UpdateResult) -> Self {
        Self {
            status: result.status,
            insert_id: None,
            affected_rows: result.affected_rows,
        }
    }
}

/// One table bound to a builder, with soft deletes, timestamps and callbacks.
///
/// A model owns its builder for its whole life and is meant for one logical operation at
/// a time.
pub struct Model<'d> {
    config: ModelConfig,
    builder: Builder<'d>,
    callbacks: Callbacks,
    scope: DeletedScope,
    auto_group: bool,
}

impl<'d> Model<'d> {
    /// # Errors
    /// Returns `DbError::Config` when the declaration has no table or primary key.
    pub fn new(driver: &'d mut dyn Driver, config: ModelConfig) -> DbResult<Self> {
        config.validate()?;
        let mut builder = Builder::new(driver, &config.table);
        builder.key(&config.primary_key);
        Ok(Self {
            config,
            builder,
            callbacks: Callbacks::new(),
            scope: DeletedScope::Live,
            auto_group: false,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Read-only view of the underlying builder.
    #[must_use]
    pub fn builder(&self) -> &Builder<'d> {
        &self.builder
    }

    /// Append a callback to the chain for `event`.
    pub fn on<F>(&mut self, event: ModelEvent, callback: F) -> &mut Self
    where
        F: Fn(EventData) -> DbResult<EventData> + Send + Sync + 'static,
    {
        self.callbacks.register(event, callback);
        self
    }

    /// Include soft-deleted rows in the next find.
    pub fn with_deleted(&mut self) -> &mut Self {
        self.scope = DeletedScope::All;
        self
    }

    /// Return only soft-deleted rows from the next find.
    pub fn only_deleted(&mut self) -> &mut Self {
        self.scope = DeletedScope::OnlyDeleted;
        self
    }

    /// Drop accumulated conditions and restore the default scope.
    pub fn reset_query(&mut self) -> &mut Self {
        self.builder.reset_query();
        self.auto_group = false;
        self.scope = DeletedScope::Live;
        self
    }

    fn trigger(&self, event: ModelEvent, data: EventData) -> DbResult<EventData> {
        if self.config.use_callbacks {
            self.callbacks.trigger(event, data)
        } else {
            Ok(data)
        }
    }

    fn apply_deleted_scope(&mut self) {
        if !self.config.use_soft_deletes {
            return;
        }
        let field = self.config.deleted_field.clone();
        if self.scope != DeletedScope::All {
            self.builder.fragments_mut().enclose_where();
        }
        match self.scope {
            DeletedScope::Live => {
                self.builder.where_null(&field);
            }
            DeletedScope::OnlyDeleted => {
                self.builder.where_not_null(&field);
            }
            DeletedScope::All => {}
        }
    }

    // ---- finds ----

    async fn fetch(&mut self, method: &'static str, ids: Vec<RowValues>) -> DbResult<Vec<DbRow>> {
        self.close_auto_group();
        let mut data = self.trigger(ModelEvent::BeforeFind, EventData::new(method).with_ids(ids))?;
        if data.rows.is_none() {
            self.apply_deleted_scope();
            data.rows = Some(self.builder.get_result_array(true).await?);
        }
        let data = self.trigger(ModelEvent::AfterFind, data)?;
        Ok(data.rows.unwrap_or_default())
    }

    async fn find_rows(&mut self, method: &'static str, ids: Vec<RowValues>) -> DbResult<Vec<DbRow>> {
        let outcome = self.fetch(method, ids).await;
        self.reset_query();
        outcome
    }

    /// The row whose primary key is `id`.
    ///
    /// # Errors
    /// Returns a callback error or the builder's execution error.
    pub async fn find(&mut self, id: impl Into<RowValues>) -> DbResult<Option<DbRow>> {
        let id = id.into();
        self.close_auto_group();
        let key = self.config.primary_key.clone();
        self.builder.where_(&key, "=", id.clone());
        Ok(self.find_rows("find", vec![id]).await?.into_iter().next())
    }

    /// Rows whose primary key is any of `ids`.
    ///
    /// # Errors
    /// Same as [`Model::find`].
    pub async fn find_many<I, V>(&mut self, ids: I) -> DbResult<Vec<DbRow>>
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let ids: Vec<RowValues> = ids.into_iter().map(Into::into).collect();
        self.close_auto_group();
        let key = self.config.primary_key.clone();
        self.builder.where_in(&key, ids.clone());
        self.find_rows("find_many", ids).await
    }

    /// # Errors
    /// Same as [`Model::find`].
    pub async fn find_all(&mut self, limit: Option<u64>, offset: Option<u64>) -> DbResult<Vec<DbRow>> {
        if let Some(limit) = limit {
            self.builder.limit(limit);
        }
        if let Some(offset) = offset {
            self.builder.offset(offset);
        }
        self.find_rows("find_all", Vec::new()).await
    }

    /// First matching row, ordered by primary key unless an order was given.
    ///
    /// # Errors
    /// Same as [`Model::find`].
    pub async fn first(&mut self) -> DbResult<Option<DbRow>> {
        let fragments = self.builder.fragments();
        if fragments.order_by.is_empty() && fragments.group_by.is_empty() {
            let key = self.config.primary_key.clone();
            self.builder.order_by(&key, "ASC");
        }
        self.builder.limit(1);
        Ok(self.find_rows("first", Vec::new()).await?.into_iter().next())
    }

    /// One column of every matching row.
    ///
    /// # Errors
    /// Same as [`Model::find`].
    pub async fn find_column(&mut self, column: &str) -> DbResult<Vec<RowValues>> {
        self.builder.select(column);
        let rows = self.find_rows("find_column", Vec::new()).await?;
        Ok(rows
            .iter()
            .map(|row| row.get_by_index(0).cloned().unwrap_or(RowValues::Null))
            .collect())
    }

    /// Row count under the current conditions and soft-delete scope.
    ///
    /// # Errors
    /// Returns the builder's execution error.
    pub async fn count_all(&mut self) -> DbResult<u64> {
        self.close_auto_group();
        self.apply_deleted_scope();
        let outcome = self.builder.count_all_results(true).await;
        self.reset_query();
        outcome
    }

    // ---- writes ----

    fn sanitize(&self, mut record: Record, keep_key: bool) -> DbResult<Record> {
        if self.config.protect_fields && self.config.allowed_fields.is_empty() {
            return Err(DbError::InvalidInput(format!(
                "model for {} has no allowed fields",
                self.config.table
            )));
        }
        let key = &self.config.primary_key;
        record.retain(|column| self.config.allows(column) || (keep_key && column == key.as_str()));
        Ok(record)
    }

    fn stamp(&self, record: &mut Record, created: bool) {
        if !self.config.use_timestamps {
            return;
        }
        let now = self.config.date_format.now();
        if created && !record.contains(&self.config.created_field) {
            record.set(&self.config.created_field, now.clone());
        }
        if !record.contains(&self.config.updated_field) {
            record.set(&self.config.updated_field, now);
        }
    }

    fn prepare_row(&self, record: Record, kind: WriteKind, batch: bool) -> DbResult<Record> {
        let mut record = self.sanitize(record, kind.keeps_key(batch))?;
        if record.is_empty() {
            return Err(DbError::InvalidInput(format!(
                "no allowed fields left to {}",
                kind.method()
            )));
        }
        self.stamp(&mut record, kind.stamps_created());
        Ok(record)
    }

    /// Strip disallowed fields and inject timestamps.
    fn prepare(&self, payload: Payload, kind: WriteKind) -> DbResult<Payload> {
        if payload.is_empty() {
            return Err(DbError::InvalidInput(format!(
                "there is no data to {}",
                kind.method()
            )));
        }
        Ok(match payload {
            Payload::Single(record) => Payload::Single(self.prepare_row(record, kind, false)?),
            Payload::Batch(rows) => Payload::Batch(
                rows.into_iter()
                    .map(|row| self.prepare_row(row, kind, true))
                    .collect::<DbResult<_>>()?,
            ),
        })
    }

    fn payload_of(data: &EventData) -> DbResult<Payload> {
        data.data.clone().ok_or_else(|| {
            DbError::InvalidInput(format!("callbacks removed the data to {}", data.method))
        })
    }

    async fn insert_payload(&mut self, payload: Payload) -> DbResult<WriteResult> {
        let payload = self.prepare(payload, WriteKind::Insert)?;
        let mut data = self.trigger(
            ModelEvent::BeforeInsert,
            EventData::new("insert").with_data(payload),
        )?;
        let result: WriteResult = match Self::payload_of(&data)? {
            Payload::Single(record) => self.builder.insert(record, true).await?.into(),
            Payload::Batch(rows) => self.builder.insert_bulk(rows, true).await?.into(),
        };
        data.insert_id.clone_from(&result.insert_id);
        data.affected_rows = result.affected_rows;
        self.trigger(ModelEvent::AfterInsert, data)?;
        Ok(result)
    }

    async fn update_payload(&mut self, ids: Vec<RowValues>, payload: Payload) -> DbResult<WriteResult> {
        let payload = self.prepare(payload, WriteKind::Update)?;
        let mut data = self.trigger(
            ModelEvent::BeforeUpdate,
            EventData::new("update").with_ids(ids).with_data(payload),
        )?;
        let key = self.config.primary_key.clone();
        let result: WriteResult = match Self::payload_of(&data)? {
            Payload::Single(record) => {
                if !data.ids.is_empty() {
                    self.builder.where_in(&key, data.ids.clone());
                } else if !self.builder.fragments().has_conditions() {
                    return Err(DbError::InvalidInput(
                        "update requires ids or conditions".to_string(),
                    ));
                }
                self.apply_deleted_scope();
                self.builder.update(record, true).await?.into()
            }
            Payload::Batch(rows) => {
                self.apply_deleted_scope();
                self.builder.update_bulk(rows, &key, true).await?.into()
            }
        };
        data.affected_rows = result.affected_rows;
        self.trigger(ModelEvent::AfterUpdate, data)?;
        Ok(result)
    }

    async fn upsert_payload(&mut self, payload: Payload) -> DbResult<WriteResult> {
        let payload = self.prepare(payload, WriteKind::Upsert)?;
        let mut data = self.trigger(
            ModelEvent::BeforeInsert,
            EventData::new("upsert").with_data(payload),
        )?;
        let key = self.config.primary_key.clone();
        let created = self.config.created_field.clone();
        let excluded: Vec<&str> = if self.config.use_timestamps {
            vec![created.as_str()]
        } else {
            Vec::new()
        };
        let result: WriteResult = match Self::payload_of(&data)? {
            Payload::Single(record) => {
                self.builder.upsert(record, &key, &excluded, true).await?.into()
            }
            Payload::Batch(rows) => {
                self.builder
                    .upsert_bulk(rows, &key, &excluded, true)
                    .await?
                    .into()
            }
        };
        data.affected_rows = result.affected_rows;
        self.trigger(ModelEvent::AfterInsert, data)?;
        Ok(result)
    }

    async fn save_payload(&mut self, payload: Payload) -> DbResult<WriteResult> {
        if payload.is_empty() {
            return Err(DbError::InvalidInput("there is no data to save".to_string()));
        }
        let data = self.trigger(
            ModelEvent::BeforeSave,
            EventData::new("save").with_data(payload),
        )?;
        let key = self.config.primary_key.clone();
        let result = match Self::payload_of(&data)? {
            Payload::Single(mut record) => match record.remove(&key) {
                Some(id) if !id.is_null() => {
                    self.update_payload(vec![id], Payload::Single(record)).await?
                }
                _ => self.insert_payload(Payload::Single(record)).await?,
            },
            batch @ Payload::Batch(_) => self.upsert_payload(batch).await?,
        };
        let mut data = data;
        data.insert_id.clone_from(&result.insert_id);
        data.affected_rows = result.affected_rows;
        self.trigger(ModelEvent::AfterSave, data)?;
        Ok(result)
    }

    async fn delete_rows(&mut self, ids: Vec<RowValues>, purge: bool) -> DbResult<WriteResult> {
        let method = if purge { "purge" } else { "delete" };
        let mut event = EventData::new(method).with_ids(ids);
        event.purge = purge;
        let mut data = self.trigger(ModelEvent::BeforeDelete, event)?;

        let key = self.config.primary_key.clone();
        if !data.ids.is_empty() {
            self.builder.where_in(&key, data.ids.clone());
        } else if !self.builder.fragments().has_conditions() {
            return Err(DbError::InvalidInput(
                "delete requires ids or conditions".to_string(),
            ));
        }

        let result: WriteResult = if self.config.use_soft_deletes && !data.purge {
            let now = self.config.date_format.now();
            let mut record = Record::new();
            record.set(&self.config.deleted_field, now.clone());
            if self.config.use_timestamps {
                record.set(&self.config.updated_field, now);
            }
            self.builder.update(record, true).await?.into()
        } else {
            self.builder.delete(true).await?.into()
        };
        data.affected_rows = result.affected_rows;
        self.trigger(ModelEvent::AfterDelete, data)?;
        Ok(result)
    }

    /// Insert one row (`Payload::Single`) or many (`Payload::Batch`).
    ///
    /// Fields outside the allow-list are dropped and timestamps injected first.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for empty input, a callback error, or the builder's
    /// execution error.
    pub async fn insert(&mut self, data: impl Into<Payload>) -> DbResult<WriteResult> {
        self.close_auto_group();
        let outcome = self.insert_payload(data.into()).await;
        self.reset_query();
        outcome
    }

    /// Update the rows with the given ids, or those matching the current conditions.
    ///
    /// A batch updates each row by its primary key and ignores `ids`.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for empty input or when neither ids nor conditions
    /// restrict a single-row update, a callback error, or the builder's execution error.
    pub async fn update(&mut self, ids: Vec<RowValues>, data: impl Into<Payload>) -> DbResult<WriteResult> {
        self.close_auto_group();
        let outcome = self.update_payload(ids, data.into()).await;
        self.reset_query();
        outcome
    }

    /// Update when the row carries a non-null primary key, insert otherwise; a batch is
    /// upserted.
    ///
    /// # Errors
    /// Same as [`Model::insert`] and [`Model::update`].
    pub async fn save(&mut self, data: impl Into<Payload>) -> DbResult<WriteResult> {
        self.close_auto_group();
        let outcome = self.save_payload(data.into()).await;
        self.reset_query();
        outcome
    }

    /// Insert, or update on primary-key conflict. The created field is never overwritten.
    ///
    /// # Errors
    /// Same as [`Model::insert`].
    pub async fn upsert(&mut self, data: impl Into<Payload>) -> DbResult<WriteResult> {
        self.close_auto_group();
        let outcome = self.upsert_payload(data.into()).await;
        self.reset_query();
        outcome
    }

    /// Delete by ids or current conditions; with soft deletes this stamps the deleted
    /// field instead.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` when neither ids nor conditions are given, a
    /// callback error, or the builder's execution error.
    pub async fn delete(&mut self, ids: Vec<RowValues>) -> DbResult<WriteResult> {
        self.close_auto_group();
        let outcome = self.delete_rows(ids, false).await;
        self.reset_query();
        outcome
    }

    /// Hard delete, whatever the soft-delete setting.
    ///
    /// # Errors
    /// Same as [`Model::delete`].
    pub async fn purge(&mut self, ids: Vec<RowValues>) -> DbResult<WriteResult> {
        self.close_auto_group();
        let outcome = self.delete_rows(ids, true).await;
        self.reset_query();
        outcome
    }

    /// Hard delete every soft-deleted row.
    ///
    /// # Errors
    /// Returns the builder's execution error.
    pub async fn purge_deleted(&mut self) -> DbResult<WriteResult> {
        if !self.config.use_soft_deletes {
            return Ok(WriteResult {
                status: true,
                ..WriteResult::default()
            });
        }
        self.reset_query();
        let field = self.config.deleted_field.clone();
        self.builder.where_not_null(&field);
        let outcome = self.builder.delete(true).await.map(WriteResult::from);
        self.reset_query();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_survives_only_where_needed() {
        assert!(!WriteKind::Insert.keeps_key(true));
        assert!(!WriteKind::Update.keeps_key(false));
        assert!(WriteKind::Update.keeps_key(true));
        assert!(WriteKind::Upsert.keeps_key(false));
        assert!(!WriteKind::Update.stamps_created());
    }

    #[test]
    fn insert_result_counts_one_row() {
        let result = WriteResult::from(InsertResult {
            status: true,
            insert_id: Some(RowValues::Int(9)),
        });
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.insert_id, Some(RowValues::Int(9)));
    }
}
