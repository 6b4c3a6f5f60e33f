//! Domain models that mirror the SQLite schema and get passed across the
//! store boundary. These types stay light-weight data holders so the
//! persistence layer can focus on queries and invariants; joined query
//! results get explicit composite structs instead of ad hoc maps.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

/// Someone who wrote a book. Duplicate names are permitted; identity is the
/// opaque id only.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Catalog entry. Physical lending happens against [`BookCopy`] rows, never
/// against the book itself.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: String,
    pub title: String,
    /// Canonical author relationship; display layers join for the name.
    pub author_id: String,
    pub isbn: String,
    pub publisher: Option<String>,
    pub published_year: Option<i64>,
    pub category_id: String,
    pub language: Option<String>,
}

/// Lifecycle of a physical copy. Lend and return only ever move between
/// `Available` and `Borrowed`; `Reserved` and `Damaged` are set manually by
/// catalog maintenance and the lending state machine leaves them alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    Available,
    Borrowed,
    Reserved,
    Damaged,
}

impl CopyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CopyStatus::Available => "available",
            CopyStatus::Borrowed => "borrowed",
            CopyStatus::Reserved => "reserved",
            CopyStatus::Damaged => "damaged",
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CopyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(CopyStatus::Available),
            "borrowed" => Ok(CopyStatus::Borrowed),
            "reserved" => Ok(CopyStatus::Reserved),
            "damaged" => Ok(CopyStatus::Damaged),
            other => Err(format!("unknown copy status: {other}")),
        }
    }
}

impl ToSql for CopyStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CopyStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|msg: String| FromSqlError::Other(msg.into()))
    }
}

/// One physical instance of a [`Book`], the unit of lending.
#[derive(Debug, Clone)]
pub struct BookCopy {
    pub id: String,
    pub book_id: String,
    pub status: CopyStatus,
    /// 1-based sequence assigned at creation, unique within the book.
    pub copy_number: i64,
}

/// A grade/section grouping that students and staff may belong to.
#[derive(Debug, Clone)]
pub struct Class {
    pub id: String,
    pub academic_level: i64,
    /// Free-text section name, e.g. "B" or "Blue".
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Staff {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Title such as "Mr." or "Dr.".
    pub prefix: Option<String>,
    /// Homeroom assignment, if any.
    pub class_id: Option<String>,
}

/// One copy lent to one student, open until returned.
#[derive(Debug, Clone)]
pub struct Borrowing {
    pub id: String,
    pub copy_id: String,
    pub borrower_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub is_returned: bool,
}

// ---------------------------------------------------------------------------
// Creation requests. Ids are generated by the store unless supplied.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

/// Everything needed to create a catalog entry plus its initial copies.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author_id: String,
    pub isbn: String,
    pub category_id: String,
    pub publisher: Option<String>,
    pub published_year: Option<i64>,
    pub language: Option<String>,
    /// Number of physical copies to register, numbered 1..=copies.
    pub copies: u32,
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub id: Option<String>,
    pub academic_level: i64,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewStaff {
    pub first_name: String,
    pub last_name: String,
    pub prefix: Option<String>,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LendRequest {
    pub copy_id: String,
    pub borrower_id: String,
    pub due_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Joined query results for display.
// ---------------------------------------------------------------------------

/// Book row denormalized for list views. `author` and `category` carry the
/// joined names, falling back to the raw foreign-key id when the join is
/// unmatched; the canonical relationship is always by id.
#[derive(Debug, Clone)]
pub struct BookListing {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: Option<String>,
    pub published_year: Option<i64>,
    pub category: String,
    pub language: Option<String>,
}

/// Borrowing enriched with the borrower's full name for the detail view.
#[derive(Debug, Clone)]
pub struct BorrowingRecord {
    pub borrowing: Borrowing,
    pub borrower_name: String,
}

/// Everything the book detail screen needs in one fetch.
#[derive(Debug, Clone)]
pub struct BookDetail {
    pub book: BookListing,
    pub copies: Vec<BookCopy>,
    pub borrowings: Vec<BorrowingRecord>,
}

/// One overdue loan joined across copy, book, and student.
#[derive(Debug, Clone)]
pub struct OverdueBorrowing {
    pub borrowing_id: String,
    pub copy_id: String,
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub student_id: String,
    pub student_name: String,
}

/// Student left-joined with their class (nullable) for roster lists.
#[derive(Debug, Clone)]
pub struct StudentRow {
    pub student: Student,
    pub class: Option<Class>,
}

/// Staff left-joined with their assigned class (nullable).
#[derive(Debug, Clone)]
pub struct StaffRow {
    pub staff: Staff,
    pub class: Option<Class>,
}
