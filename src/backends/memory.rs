use super::{Record, RecordStore, StoreError, StoreResult, UpdateExpression};
use log::trace;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Tables = HashMap<String, HashMap<String, Record>>;

/// Process-local store. Nothing survives a restart; used for tests and
/// throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for MemoryBackend {
    fn get(&self, table: &str, id: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .read()?
            .get(table)
            .and_then(|items| items.get(id))
            .cloned())
    }

    fn put(&self, table: &str, record: &Record) -> StoreResult<()> {
        self.write()?
            .entry(table.to_string())
            .or_default()
            .insert(record.id().to_string(), record.clone());
        trace!("Stored '{}' in '{table}'", record.id());
        Ok(())
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .read()?
            .get(table)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    fn update(&self, table: &str, id: &str, expression: &UpdateExpression) -> StoreResult<()> {
        let mut tables = self.write()?;
        let record = tables
            .entry(table.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| Record::new(id));
        expression.apply(record);
        Ok(())
    }

    fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        if let Some(items) = self.write()?.get_mut(table) {
            items.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tables_are_isolated() {
        let store = MemoryBackend::new();
        store.put("notes", &Record::new("1")).unwrap();

        assert!(store.get("users", "1").unwrap().is_none());
        assert!(store.scan("users").unwrap().is_empty());
        assert_eq!(store.scan("notes").unwrap().len(), 1);
    }

    #[test]
    fn update_creates_missing_item() {
        let store = MemoryBackend::new();
        let partial = Record::new("9").with("name", json!("fresh"));
        let expression = UpdateExpression::from_partial(&partial).unwrap();

        store.update("notes", "9", &expression).unwrap();
        assert_eq!(store.get("notes", "9").unwrap(), Some(partial));
    }

    #[test]
    fn delete_of_unknown_table_succeeds() {
        let store = MemoryBackend::new();
        store.delete("nowhere", "1").unwrap();
    }
}
