//! Storage layer for alertrelay.
//!
//! This module provides `SQLite`-based persistent storage for vehicle owner
//! accounts and their push subscriptions. [`Storage`] is the synchronous
//! engine; [`Database`] shares one engine across async request handlers.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::user::{NewUser, User};

/// Columns selected for every user query, in [`Storage::row_to_user`] order.
const USER_COLUMNS: &str =
    "id, name, phone, vehicle_number, password, subscription, created_at";

/// Storage engine for user accounts.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Registration with phone / vehicle number uniqueness
/// - Lookup by id, phone and vehicle number
/// - Setting and clearing the push subscription
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new user and return the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserExists`] if the phone or vehicle number is
    /// already registered, or another error if the database operation fails.
    pub fn insert_user(&self, user: &NewUser) -> Result<i64> {
        let created_at = Utc::now().to_rfc3339();

        let result = self.conn.execute(
            r"
            INSERT INTO users (name, phone, vehicle_number, password, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                user.name,
                user.phone,
                user.vehicle_number,
                user.password_hash,
                created_at,
            ],
        );

        match result {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                debug!("Inserted user with id {}", id);
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(Error::UserExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<User>> {
        self.find_one("id = ?1", params![id])
    }

    /// Find the user registered with this phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.find_one("phone = ?1", params![phone])
    }

    /// Find the user registered with this vehicle number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_vehicle(&self, vehicle_number: &str) -> Result<Option<User>> {
        self.find_one("vehicle_number = ?1", params![vehicle_number])
    }

    /// Find a user holding either the phone or the vehicle number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_phone_or_vehicle(
        &self,
        phone: &str,
        vehicle_number: &str,
    ) -> Result<Option<User>> {
        self.find_one(
            "phone = ?1 OR vehicle_number = ?2",
            params![phone, vehicle_number],
        )
    }

    fn find_one(&self, predicate: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate} LIMIT 1");
        let user = self
            .conn
            .query_row(&sql, params, Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Store the push subscription JSON for a user.
    ///
    /// Returns `true` if the user exists and was updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_subscription(&self, id: i64, subscription: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE users SET subscription = ?1 WHERE id = ?2",
            params![subscription, id],
        )?;
        Ok(affected > 0)
    }

    /// Remove the push subscription of a user.
    ///
    /// Returns `true` if the user exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear_subscription(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("UPDATE users SET subscription = NULL WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Count registered users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count users with a push subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_subscribed(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE subscription IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Cheap liveness query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not answer.
    pub fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_users = self.count()?;
        let subscribed_users = self.count_subscribed()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_users,
            subscribed_users,
            db_size_bytes,
        })
    }

    /// Convert a database row to a User struct.
    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at_str: String = row.get(6)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str).map_or_else(
            |_| {
                warn!("Unparseable created_at {}, using now", created_at_str);
                Utc::now()
            },
            |dt| dt.with_timezone(&Utc),
        );

        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            vehicle_number: row.get(3)?,
            password_hash: row.get(4)?,
            subscription: row.get(5)?,
            created_at,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of registered users.
    pub total_users: i64,
    /// Users with a push subscription.
    pub subscribed_users: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Shared async handle to a [`Storage`].
///
/// `rusqlite` is synchronous, so every call runs on the blocking thread pool
/// while holding the connection lock.
#[derive(Debug, Clone)]
pub struct Database {
    storage: Arc<Mutex<Storage>>,
}

impl Database {
    /// Wrap a storage engine.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Run `f` against the storage on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or an internal error if the lock is
    /// poisoned or the blocking task panicked.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|_| Error::internal("storage lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|err| Error::internal(format!("storage task failed: {err}")))?
    }
}
