use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DbResult;
use crate::results::DbRow;
use crate::types::{Payload, RowValues};

/// Points in a model operation where callback chains run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    BeforeFind,
    AfterFind,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

/// The payload handed down a callback chain.
///
/// Each callback receives the previous callback's output. Before-callbacks may rewrite
/// `data` (writes) or fill `rows` (finds, which then skip the query); after-callbacks see
/// the outcome.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventData {
    /// Model operation that fired the event, e.g. `find_all` or `insert`
    pub method: &'static str,
    pub ids: Vec<RowValues>,
    pub data: Option<Payload>,
    pub rows: Option<Vec<DbRow>>,
    pub purge: bool,
    pub insert_id: Option<RowValues>,
    pub affected_rows: usize,
}

impl EventData {
    #[must_use]
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Vec<RowValues>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }
}

/// One link of a chain. Returning an error aborts the operation.
pub type Callback = Arc<dyn Fn(EventData) -> DbResult<EventData> + Send + Sync>;

/// Ordered callback chains per event.
#[derive(Clone, Default)]
pub struct Callbacks {
    chains: HashMap<ModelEvent, Vec<Callback>>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (event, chain) in &self.chains {
            map.entry(event, &chain.len());
        }
        map.finish()
    }
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the chain for `event`.
    pub fn register<F>(&mut self, event: ModelEvent, callback: F)
    where
        F: Fn(EventData) -> DbResult<EventData> + Send + Sync + 'static,
    {
        self.chains.entry(event).or_default().push(Arc::new(callback));
    }

    #[must_use]
    pub fn len(&self, event: ModelEvent) -> usize {
        self.chains.get(&event).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chains.values().all(Vec::is_empty)
    }

    /// Run the chain for `event`; with no chain the data comes back unchanged.
    ///
    /// # Errors
    /// Returns the first callback error.
    pub fn trigger(&self, event: ModelEvent, data: EventData) -> DbResult<EventData> {
        let Some(chain) = self.chains.get(&event) else {
            return Ok(data);
        };
        chain.iter().try_fold(data, |data, callback| callback(data))
    }
}
