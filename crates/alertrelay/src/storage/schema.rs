//! `SQLite` schema definitions for alertrelay.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the users table.
///
/// Phone and vehicle number are each unique: the phone is the login name
/// and the vehicle number routes webhook alerts to exactly one owner.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    phone TEXT NOT NULL UNIQUE,
    vehicle_number TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    subscription TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_USERS_TABLE, CREATE_METADATA_TABLE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_create_users_table_contains_required_columns() {
        assert!(CREATE_USERS_TABLE.contains("id INTEGER PRIMARY KEY"));
        assert!(CREATE_USERS_TABLE.contains("phone TEXT NOT NULL UNIQUE"));
        assert!(CREATE_USERS_TABLE.contains("vehicle_number TEXT NOT NULL UNIQUE"));
        assert!(CREATE_USERS_TABLE.contains("password TEXT NOT NULL"));
        assert!(CREATE_USERS_TABLE.contains("subscription TEXT,"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
