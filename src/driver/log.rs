use std::sync::{Arc, Mutex, MutexGuard};

/// One executed statement as seen by the query log.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    /// Statement with parameters substituted as literals
    pub sql: String,
    pub elapsed_ms: f64,
    /// `table::operation` label supplied by the builder that issued the statement
    pub call_site: Option<String>,
}

/// Shared, append-only log of executed statements.
///
/// Cloning shares the underlying buffer; drivers only append when their connection runs
/// in debug mode.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    entries: Arc<Mutex<Vec<QueryLogEntry>>>,
}

impl QueryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueryLogEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            // a panicking writer cannot leave a half-pushed entry behind
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, entry: QueryLogEntry) {
        self.lock().push(entry);
    }

    /// Snapshot of every entry recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
