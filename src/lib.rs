//! Data-access and domain-consistency layer for a school library manager.
//!
//! The crate owns every persisted entity (books, copies, authors,
//! categories, students, staff, classes, borrowings) and enforces the
//! invariants that cut across them: copy numbering at book creation, the
//! borrow/return state machine, one open borrowing per copy, and overdue
//! derivation. The hosting application's command shim and UI sit on top and
//! only ever talk to storage through the functions exposed here.
pub mod db;
pub mod error;
pub mod models;

/// Persistence entry points, typically used by the hosting app to open the
/// store and dispatch commands.
pub use db::{ensure_schema, lend_copy, list_books, list_overdue, return_copy, OverdueFilter};

/// The error taxonomy every operation reports through.
pub use error::{Result, StoreError};
