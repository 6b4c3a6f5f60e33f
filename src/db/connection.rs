use std::fs;
use std::path::PathBuf;

use directories::BaseDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".library-store";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "library.sqlite";

/// Ensure the database file exists, create any missing tables, and return a
/// live connection. The function also toggles `PRAGMA foreign_keys = ON` so
/// the referential integrity checks in our schema behave the same during
/// tests and production runs.
pub fn ensure_schema() -> Result<Connection> {
    let db_path = db_path()?;

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            tracing::error!(error = %err, "failed to create data directory");
            StoreError::Storage("failed to create data directory".to_string())
        })?;
    }

    let conn = Connection::open(&db_path)?;
    apply_schema(&conn)?;
    Ok(conn)
}

/// Run the idempotent schema statements against an already-open connection.
/// Split out of [`ensure_schema`] so tests can apply the exact production
/// schema to an in-memory database.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS authors (
            author_id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            category_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS main_books (
            book_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES authors(author_id),
            isbn TEXT NOT NULL UNIQUE,
            publisher TEXT,
            published_year INTEGER,
            category_id TEXT NOT NULL REFERENCES categories(category_id),
            language TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS book_copies (
            copy_id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL REFERENCES main_books(book_id),
            status TEXT NOT NULL DEFAULT 'available',
            copy_number INTEGER NOT NULL,
            UNIQUE (book_id, copy_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes (
            class_id TEXT PRIMARY KEY,
            academic_level INTEGER NOT NULL,
            label TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            student_id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            class_id TEXT REFERENCES classes(class_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff (
            staff_id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            prefix TEXT,
            class_id TEXT REFERENCES classes(class_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS borrowings (
            borrowing_id TEXT PRIMARY KEY,
            copy_id TEXT NOT NULL REFERENCES book_copies(copy_id),
            borrower_id TEXT NOT NULL REFERENCES students(student_id),
            borrow_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            return_date TEXT,
            is_returned INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // At most one open borrowing may exist per copy. The lending code
    // enforces this through the status check, but the index makes the
    // invariant hold even against direct writes.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_borrowings_open_copy
         ON borrowings (copy_id) WHERE is_returned = 0",
        [],
    )?;

    Ok(())
}

/// Resolve the absolute path to the SQLite database inside the user's home.
fn db_path() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new()
        .ok_or_else(|| StoreError::Storage("could not locate home directory".to_string()))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME).join(DB_FILE_NAME))
}
