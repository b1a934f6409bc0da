use crate::request::{Collection, Operation};
use crate::response::Outcome;
use crate::{Record, RecordStore, Result, ServiceError, UpdateExpression};
use log::{debug, error, info, warn};
use serde_json::Value;

/// Attribute on a note that references its owning user
pub const OWNER_ATTRIBUTE: &str = "userId";

/// Names of the backing tables. Users are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub notes: String,
    pub users: Option<String>,
}

pub struct RecordService {
    store: Box<dyn RecordStore>,
    tables: Tables,
}

impl RecordService {
    pub fn new(store: Box<dyn RecordStore>, tables: Tables) -> Self {
        Self { store, tables }
    }

    #[must_use]
    pub const fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Runs one decoded operation against the store
    ///
    /// # Errors
    ///
    /// Forwards the classified failure of the selected operation
    pub fn handle(&self, operation: Operation) -> Result<Outcome> {
        debug!("Handling {operation:?}");
        let result = self.dispatch(operation);
        if let Err(e) = &result {
            match e {
                ServiceError::StoreUnavailable(_) => error!("{e}"),
                _ => warn!("{e}"),
            }
        }
        result
    }

    fn dispatch(&self, operation: Operation) -> Result<Outcome> {
        match operation {
            Operation::FetchById { collection, id } => self
                .fetch_by_id(self.table(collection)?, &id)
                .map(Outcome::Record),
            Operation::Create { collection, record } => self
                .create(self.table(collection)?, record)
                .map(Outcome::Record),
            Operation::List { collection } => {
                self.list(self.table(collection)?).map(Outcome::Records)
            }
            Operation::Update { collection, record } => self
                .update(self.table(collection)?, record)
                .map(Outcome::Record),
            Operation::Delete { collection, id } => {
                self.delete(self.table(collection)?, id).map(Outcome::Id)
            }
            Operation::ListByOwner { user_id } => {
                self.list_by_owner(&user_id).map(Outcome::Records)
            }
        }
    }

    /// Resolves a collection to its configured table name
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidOperation` for user operations when no users table is configured
    pub fn table(&self, collection: Collection) -> Result<&str> {
        match collection {
            Collection::Notes => Ok(&self.tables.notes),
            Collection::Users => self.tables.users.as_deref().ok_or_else(|| {
                ServiceError::InvalidOperation("user operations need a users table".into())
            }),
        }
    }

    /// Looks up a single record by primary key
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` when the key is absent, or `ServiceError::StoreUnavailable` if the store fails
    pub fn fetch_by_id(&self, table: &str, id: &str) -> Result<Record> {
        self.store
            .get(table, id)?
            .ok_or_else(|| ServiceError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    /// Writes the record, replacing any record with the same key
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::StoreUnavailable` if the store fails
    pub fn create(&self, table: &str, record: Record) -> Result<Record> {
        self.store.put(table, &record)?;
        info!("Created '{}' in '{table}'", record.id());
        Ok(record)
    }

    /// Full unordered scan of the table
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::StoreUnavailable` if the store fails
    pub fn list(&self, table: &str) -> Result<Vec<Record>> {
        let records = self.store.scan(table)?;
        debug!("Scanned {} records from '{table}'", records.len());
        Ok(records)
    }

    /// Merges the attributes of `partial` into the stored record with the same `id`.
    /// Returns `partial` as supplied, not the stored image.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::MalformedRequest` if `partial` has no attribute besides `id`
    /// (nothing reaches the store), or `ServiceError::StoreUnavailable` if the store fails
    pub fn update(&self, table: &str, partial: Record) -> Result<Record> {
        let expression = UpdateExpression::from_partial(&partial)?;
        debug!(
            "Update '{}' in '{table}': {} names={} values={}",
            partial.id(),
            expression.expression(),
            Value::Object(expression.attribute_names()),
            Value::Object(expression.attribute_values()),
        );
        self.store.update(table, partial.id(), &expression)?;
        info!("Updated '{}' in '{table}'", partial.id());
        Ok(partial)
    }

    /// Removes the record; succeeds whether or not it existed
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::StoreUnavailable` if the store fails
    pub fn delete(&self, table: &str, id: String) -> Result<String> {
        self.store.delete(table, &id)?;
        info!("Deleted '{id}' from '{table}'");
        Ok(id)
    }

    /// Notes owned by the given user
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::StoreUnavailable` if the store fails
    pub fn list_by_owner(&self, user_id: &str) -> Result<Vec<Record>> {
        let owner = Value::String(user_id.to_string());
        Ok(self
            .store
            .query_by(&self.tables.notes, OWNER_ATTRIBUTE, &owner)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::{StoreError, StoreResult};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn service() -> RecordService {
        RecordService::new(
            Box::new(MemoryBackend::new()),
            Tables {
                notes: "notes".into(),
                users: Some("users".into()),
            },
        )
    }

    fn note(id: &str, name: &str, completed: bool) -> Record {
        Record::new(id)
            .with("name", json!(name))
            .with("completed", json!(completed))
    }

    // Fails every call and counts how many reached it
    #[derive(Default)]
    struct BrokenStore {
        calls: Arc<AtomicUsize>,
    }

    impl BrokenStore {
        fn fail<T>(&self) -> StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout)
        }
    }

    impl RecordStore for BrokenStore {
        fn get(&self, _: &str, _: &str) -> StoreResult<Option<Record>> {
            self.fail()
        }
        fn put(&self, _: &str, _: &Record) -> StoreResult<()> {
            self.fail()
        }
        fn scan(&self, _: &str) -> StoreResult<Vec<Record>> {
            self.fail()
        }
        fn update(&self, _: &str, _: &str, _: &UpdateExpression) -> StoreResult<()> {
            self.fail()
        }
        fn delete(&self, _: &str, _: &str) -> StoreResult<()> {
            self.fail()
        }
    }

    #[test]
    fn create_then_fetch_round_trips() {
        let service = service();
        let created = service.create("notes", note("1", "a", false)).unwrap();
        assert_eq!(service.fetch_by_id("notes", "1").unwrap(), created);
    }

    #[test]
    fn fetch_after_delete_is_not_found() {
        let service = service();
        service.create("notes", note("1", "a", false)).unwrap();
        assert_eq!(service.delete("notes", "1".into()).unwrap(), "1");

        let err = service.fetch_by_id("notes", "1").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { ref id, .. } if id == "1"));
    }

    #[test]
    fn update_merges_fields_and_returns_partial() {
        let service = service();
        service.create("notes", note("1", "a", false)).unwrap();

        let partial = Record::new("1").with("completed", json!(true));
        let returned = service.update("notes", partial.clone()).unwrap();
        assert_eq!(returned, partial);
        assert_eq!(service.fetch_by_id("notes", "1").unwrap(), note("1", "a", true));
    }

    #[test]
    fn empty_update_never_reaches_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = RecordService::new(
            Box::new(BrokenStore {
                calls: Arc::clone(&calls),
            }),
            Tables {
                notes: "notes".into(),
                users: None,
            },
        );

        let err = service.update("notes", Record::new("1")).unwrap_err();
        assert!(matches!(err, ServiceError::MalformedRequest(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn list_returns_exactly_created_ids() {
        let service = service();
        service.create("notes", note("1", "a", false)).unwrap();
        service.create("notes", note("2", "b", true)).unwrap();

        let ids: HashSet<String> = service
            .list("notes")
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, HashSet::from(["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn delete_of_unknown_id_succeeds() {
        let service = service();
        for id in ["never", "created", ""] {
            assert_eq!(service.delete("notes", id.to_string()).unwrap(), id);
        }
    }

    #[test]
    fn store_failures_are_unavailable() {
        let service = RecordService::new(
            Box::<BrokenStore>::default(),
            Tables {
                notes: "notes".into(),
                users: None,
            },
        );

        let failures = [
            service.fetch_by_id("notes", "1").map(|_| ()),
            service.create("notes", Record::new("1")).map(|_| ()),
            service.list("notes").map(|_| ()),
            service
                .update("notes", Record::new("1").with("name", json!("x")))
                .map(|_| ()),
            service.delete("notes", "1".into()).map(|_| ()),
            service.list_by_owner("u1").map(|_| ()),
        ];
        for failure in failures {
            assert_eq!(failure.unwrap_err().kind(), "StoreUnavailable");
        }
    }

    #[test]
    fn list_by_owner_filters_notes() {
        let service = service();
        service
            .create("notes", note("1", "a", false).with("userId", json!("u1")))
            .unwrap();
        service
            .create("notes", note("2", "b", false).with("userId", json!("u2")))
            .unwrap();
        service.create("notes", note("3", "c", false)).unwrap();

        let owned = service.list_by_owner("u1").unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id(), "1");
    }

    #[test]
    fn users_table_is_required_for_user_operations() {
        let service = RecordService::new(
            Box::new(MemoryBackend::new()),
            Tables {
                notes: "notes".into(),
                users: None,
            },
        );
        let err = service
            .handle(Operation::List {
                collection: Collection::Users,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOperation(_)));
    }
}
