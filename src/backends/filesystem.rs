use super::{Record, RecordStore, StoreError, StoreResult, UpdateExpression};
use log::{trace, warn};
use sha2::{Digest, Sha256};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Longest file name most filesystems accept, in bytes
const MAX_FILE_NAME: usize = 255;

/// Stores every item as one JSON document: `<base>/<table>/<id>.json`
///
/// Updates hold a store-wide lock across their read-modify-write, so
/// concurrent updates of one item never drop each other's fields.
#[derive(Debug)]
pub struct FilesystemBackend {
    base_path: PathBuf,
    update_lock: Mutex<()>,
}

impl FilesystemBackend {
    /// Creates a new `FilesystemBackend` rooted at the given base directory
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DirectoryCreationError` if the base directory cannot be created
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = path.into();
        create_dir(&base_path)?;
        trace!("Using directory for records: {}", base_path.display());
        Ok(Self {
            base_path,
            update_lock: Mutex::new(()),
        })
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.base_path.join(file_name(table, ""))
    }

    /// Constructs a filesystem path for the item file based on its ID
    fn item_path(&self, table: &str, id: &str) -> PathBuf {
        self.table_path(table).join(file_name(id, ".json"))
    }

    /// Lists all item files in a table directory. A missing directory is an empty table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DirectoryReadError` if the directory cannot be read or a file entry cannot be processed
    fn list_item_files(&self, table: &str) -> StoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(self.table_path(table)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::DirectoryReadError(e)),
        };

        let mut files = Vec::new();
        for entry_result in entries {
            let entry = entry_result.map_err(StoreError::DirectoryReadError)?;
            let file_type = entry.file_type().map_err(StoreError::DirectoryReadError)?;

            let path = entry.path();
            if file_type.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        trace!("Found {} items in '{table}'", files.len());
        Ok(files)
    }

    fn read_item(path: &Path) -> StoreResult<Option<Record>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::FileReadError(e)),
        }
    }

    fn write_item(&self, table: &str, record: &Record) -> StoreResult<()> {
        create_dir(&self.table_path(table))?;
        let path = self.item_path(table, record.id());
        let data = serde_json::to_vec_pretty(record)?;
        fs::write(&path, data).map_err(StoreError::FileWriteError)?;
        trace!("Wrote item to file: {}", path.display());
        Ok(())
    }
}

impl RecordStore for FilesystemBackend {
    fn get(&self, table: &str, id: &str) -> StoreResult<Option<Record>> {
        Self::read_item(&self.item_path(table, id))
    }

    fn put(&self, table: &str, record: &Record) -> StoreResult<()> {
        self.write_item(table, record)
    }

    /// Reads every item file of the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any item file cannot be read,
    /// or if an item file does not hold a valid record
    fn scan(&self, table: &str) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        for file_path in self.list_item_files(table)? {
            // Files can vanish between listing and reading under concurrent deletes
            if let Some(record) = Self::read_item(&file_path)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Read-modify-write under the store's update lock
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Poisoned` if a previous update panicked while
    /// holding the lock, or an error if the item cannot be read or written
    fn update(&self, table: &str, id: &str, expression: &UpdateExpression) -> StoreResult<()> {
        let _guard = self.update_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut record = self
            .get(table, id)?
            .unwrap_or_else(|| Record::new(id));
        expression.apply(&mut record);
        self.write_item(table, &record)
    }

    /// Deletes an item file; a missing file is not an error
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `StoreError::PermissionDenied` if the file can't be deleted due to missing privileges
    /// - `StoreError::FileRemoveError` for other unexpected errors
    fn delete(&self, table: &str, id: &str) -> StoreResult<()> {
        match fs::remove_file(self.item_path(table, id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("Nothing to delete for '{id}' in '{table}'");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!("Permission denied deleting '{id}' in '{table}'");
                Err(StoreError::PermissionDenied)
            }
            Err(e) => Err(StoreError::FileRemoveError(e)),
        }
    }
}

fn create_dir(path: &Path) -> StoreResult<()> {
    fs::create_dir_all(path).map_err(|source| StoreError::DirectoryCreationError {
        path: path.to_path_buf(),
        source,
    })
}

// Keeps ids like "../x" or "a/b" inside their table directory
fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// File name for a table or item. Names whose encoding would not fit in
/// one path component use the SHA-256 of the raw name instead; `~` is
/// always encoded, so hashed names never collide with encoded ones.
fn file_name(raw: &str, suffix: &str) -> String {
    let encoded = encode_component(raw);
    if encoded.len() + suffix.len() <= MAX_FILE_NAME {
        return format!("{encoded}{suffix}");
    }
    let digest = Sha256::digest(raw.as_bytes());
    format!("~{}{suffix}", hex::encode(digest))
}
