//! Catalog - resolves table ids to their storage files.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Error, Result, TableId};
use crate::storage::DbFile;

/// Registry of the files backing each table.
///
/// The buffer pool consults the catalog to find the file that owns a page
/// when it needs to read, flush or reread that page.
#[derive(Default)]
pub struct Catalog {
    files: RwLock<HashMap<TableId, Arc<dyn DbFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table's file under its own id.
    ///
    /// # Errors
    /// `Error::DuplicateTable` if the id is already registered.
    pub fn add_table(&self, file: Arc<dyn DbFile>) -> Result<TableId> {
        let id = file.id();
        let mut files = self.files.write();
        if files.contains_key(&id) {
            return Err(Error::DuplicateTable(id));
        }
        files.insert(id, file);
        log::debug!("registered {}", id);
        Ok(id)
    }

    /// Look up the file backing `table_id`.
    pub fn get_database_file(&self, table_id: TableId) -> Result<Arc<dyn DbFile>> {
        self.files
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::UnknownTable(table_id))
    }

    /// Registered table ids in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.files.read().keys().copied().collect();
        ids.sort();
        ids
    }
}
