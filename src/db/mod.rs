//! Persistence module split across logical submodules.

mod catalog;
mod connection;
mod lending;
mod roster;

pub use catalog::{
    add_author, add_book, add_category, book_detail, list_authors, list_books, list_categories,
    update_book,
};
pub use connection::{apply_schema, ensure_schema};
pub use lending::{lend_copy, list_overdue, return_copy, OverdueFilter};
pub use roster::{
    add_class, add_staff, add_student, delete_class, delete_staff, delete_student, get_class,
    get_staff, get_student, list_classes, list_staff, list_students, update_class, update_staff,
    update_student,
};

/// Fresh opaque id for a new row. Ids are never reused; deleting a row
/// retires its id for good.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;

    use super::catalog::{add_author, add_book, add_category, book_detail};
    use super::connection::apply_schema;
    use super::roster::add_student;
    use crate::models::{NewAuthor, NewBook, NewCategory, NewStudent};

    /// In-memory database carrying the exact production schema.
    pub fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    pub fn seed_author(conn: &Connection, name: &str) -> String {
        add_author(
            conn,
            &NewAuthor {
                id: None,
                name: name.to_string(),
            },
        )
        .unwrap()
        .id
    }

    pub fn seed_category(conn: &Connection, name: &str) -> String {
        add_category(
            conn,
            &NewCategory {
                id: None,
                name: name.to_string(),
                description: None,
            },
        )
        .unwrap()
        .id
    }

    pub fn seed_student(conn: &Connection, first: &str, last: &str) -> String {
        add_student(
            conn,
            &NewStudent {
                first_name: first.to_string(),
                last_name: last.to_string(),
                class_id: None,
            },
        )
        .unwrap()
        .id
    }

    /// Book with `copies` available copies; returns the book id and the copy
    /// ids in copy-number order.
    pub fn seed_book_with_copies(
        conn: &mut Connection,
        isbn: &str,
        copies: u32,
    ) -> (String, Vec<String>) {
        let author = seed_author(conn, "Seed Author");
        let category = seed_category(conn, "Seed Category");
        let book = add_book(
            conn,
            &NewBook {
                title: format!("Book {isbn}"),
                author_id: author,
                isbn: isbn.to_string(),
                category_id: category,
                publisher: None,
                published_year: None,
                language: None,
                copies,
            },
        )
        .unwrap();

        let copy_ids = book_detail(conn, &book.id)
            .unwrap()
            .copies
            .into_iter()
            .map(|copy| copy.id)
            .collect();
        (book.id, copy_ids)
    }
}
