// Store contract shared by the CSV accessor and the reconciliation engine.

use std::fmt;

use crate::table::StoreTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store exists but is not a table with an id column.
    Corrupt { location: String, reason: String },
    /// Read or write failure. A failed write never leaves a partial file.
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { location, reason } => {
                write!(f, "store '{location}' is corrupt: {reason}")
            }
            Self::Io(msg) => write!(f, "store IO error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Whole-table persistence. No partial reads or appends.
pub trait RecordStore {
    fn exists(&self) -> bool;

    /// Full contents, or an empty table when the store does not exist.
    fn load(&self) -> Result<StoreTable, StoreError>;

    /// Replace the stored contents with `table`.
    fn save(&mut self, table: &StoreTable) -> Result<(), StoreError>;
}

/// In-process store, used where no file is wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Option<StoreTable>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&StoreTable> {
        self.table.as_ref()
    }

    /// Number of completed `save` calls.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl RecordStore for MemoryStore {
    fn exists(&self) -> bool {
        self.table.is_some()
    }

    fn load(&self) -> Result<StoreTable, StoreError> {
        Ok(self.table.clone().unwrap_or_default())
    }

    fn save(&mut self, table: &StoreTable) -> Result<(), StoreError> {
        self.table = Some(table.clone());
        self.saves += 1;
        Ok(())
    }
}
