use rusqlite::{params, Connection, OptionalExtension};

use crate::db::new_id;
use crate::error::{Result, StoreError};
use crate::models::{
    Author, Book, BookCopy, BookDetail, BookListing, Borrowing, BorrowingRecord, Category,
    CopyStatus, NewAuthor, NewBook, NewCategory,
};

/// Insert a new author, returning the hydrated struct so the caller can push
/// it straight into the in-memory list. Duplicate names are allowed; authors
/// are only ever identified by id.
pub fn add_author(conn: &Connection, author: &NewAuthor) -> Result<Author> {
    if author.name.trim().is_empty() {
        return Err(StoreError::Validation("author name is required".to_string()));
    }

    let id = author.id.clone().unwrap_or_else(new_id);
    conn.execute(
        "INSERT INTO authors (author_id, name) VALUES (?1, ?2)",
        params![id, author.name],
    )?;

    Ok(Author {
        id,
        name: author.name.clone(),
    })
}

/// Retrieve every author sorted by name. The query doubles as the single
/// source of truth for how the author picker orders its options.
pub fn list_authors(conn: &Connection) -> Result<Vec<Author>> {
    let mut stmt =
        conn.prepare("SELECT author_id, name FROM authors ORDER BY name COLLATE NOCASE")?;

    let authors = stmt
        .query_map([], |row| {
            Ok(Author {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(authors)
}

pub fn add_category(conn: &Connection, category: &NewCategory) -> Result<Category> {
    if category.name.trim().is_empty() {
        return Err(StoreError::Validation(
            "category name is required".to_string(),
        ));
    }

    let id = category.id.clone().unwrap_or_else(new_id);
    conn.execute(
        "INSERT INTO categories (category_id, name, description) VALUES (?1, ?2, ?3)",
        params![id, category.name, category.description],
    )?;

    Ok(Category {
        id,
        name: category.name.clone(),
        description: category.description.clone(),
    })
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT category_id, name, description FROM categories ORDER BY name COLLATE NOCASE",
    )?;

    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(categories)
}

/// Create a catalog entry together with its physical copies, numbered
/// 1..=copies and all available. The book row and the copy rows go in as one
/// transaction; a half-created catalog entry must never be observable.
///
/// Whatever goes wrong, the caller sees a flat "book creation failed" —
/// the underlying cause (duplicate ISBN, dangling author id, I/O) is logged
/// for operators rather than leaked to the UI.
pub fn add_book(conn: &mut Connection, book: &NewBook) -> Result<Book> {
    if book.title.trim().is_empty() {
        return Err(StoreError::Validation("book title is required".to_string()));
    }
    if book.isbn.trim().is_empty() {
        return Err(StoreError::Validation("book isbn is required".to_string()));
    }

    insert_book_with_copies(conn, book).map_err(|err| {
        tracing::error!(error = %err, isbn = %book.isbn, "book creation failed");
        if err.is_conflict() {
            StoreError::Conflict("book creation failed".to_string())
        } else {
            StoreError::Storage("book creation failed".to_string())
        }
    })
}

fn insert_book_with_copies(conn: &mut Connection, book: &NewBook) -> Result<Book> {
    let tx = conn.transaction()?;
    let book_id = new_id();

    tx.execute(
        "INSERT INTO main_books
            (book_id, title, author_id, isbn, publisher, published_year, category_id, language)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            book_id,
            book.title,
            book.author_id,
            book.isbn,
            book.publisher,
            book.published_year,
            book.category_id,
            book.language,
        ],
    )?;

    for number in 1..=i64::from(book.copies) {
        tx.execute(
            "INSERT INTO book_copies (copy_id, book_id, status, copy_number)
             VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), book_id, CopyStatus::Available, number],
        )?;
    }

    tx.commit()?;

    Ok(Book {
        id: book_id,
        title: book.title.clone(),
        author_id: book.author_id.clone(),
        isbn: book.isbn.clone(),
        publisher: book.publisher.clone(),
        published_year: book.published_year,
        category_id: book.category_id.clone(),
        language: book.language.clone(),
    })
}

/// Replace every mutable field of an existing book. We surface an explicit
/// error when nothing was updated so the UI can show a friendly message
/// instead of silently continuing.
pub fn update_book(conn: &Connection, book: &Book) -> Result<()> {
    let updated = conn.execute(
        "UPDATE main_books
         SET title = ?1, author_id = ?2, isbn = ?3, publisher = ?4,
             published_year = ?5, category_id = ?6, language = ?7
         WHERE book_id = ?8",
        params![
            book.title,
            book.author_id,
            book.isbn,
            book.publisher,
            book.published_year,
            book.category_id,
            book.language,
            book.id,
        ],
    )?;

    if updated == 0 {
        Err(StoreError::NotFound("book"))
    } else {
        Ok(())
    }
}

/// Every book joined with its author and category names for the list view.
/// COALESCE falls back to the raw foreign-key id when a join is unmatched;
/// display should degrade, not error, on a dangling reference.
pub fn list_books(conn: &Connection) -> Result<Vec<BookListing>> {
    let mut stmt = conn.prepare(
        "SELECT b.book_id, b.title, COALESCE(a.name, b.author_id), b.isbn,
                b.publisher, b.published_year, COALESCE(c.name, b.category_id), b.language
         FROM main_books b
         LEFT JOIN authors a ON a.author_id = b.author_id
         LEFT JOIN categories c ON c.category_id = b.category_id
         ORDER BY b.title COLLATE NOCASE",
    )?;

    let books = stmt
        .query_map([], |row| {
            Ok(BookListing {
                id: row.get(0)?,
                title: row.get(1)?,
                author: row.get(2)?,
                isbn: row.get(3)?,
                publisher: row.get(4)?,
                published_year: row.get(5)?,
                category: row.get(6)?,
                language: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(books)
}

/// Everything the detail screen needs for one book: the joined catalog row,
/// its copies, and the borrowing history across those copies with each
/// borrower's full name attached.
pub fn book_detail(conn: &Connection, book_id: &str) -> Result<BookDetail> {
    let book = conn
        .query_row(
            "SELECT b.book_id, b.title, COALESCE(a.name, b.author_id), b.isbn,
                    b.publisher, b.published_year, COALESCE(c.name, b.category_id), b.language
             FROM main_books b
             LEFT JOIN authors a ON a.author_id = b.author_id
             LEFT JOIN categories c ON c.category_id = b.category_id
             WHERE b.book_id = ?1",
            params![book_id],
            |row| {
                Ok(BookListing {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    author: row.get(2)?,
                    isbn: row.get(3)?,
                    publisher: row.get(4)?,
                    published_year: row.get(5)?,
                    category: row.get(6)?,
                    language: row.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or(StoreError::NotFound("book"))?;

    let mut stmt = conn.prepare(
        "SELECT copy_id, book_id, status, copy_number
         FROM book_copies WHERE book_id = ?1 ORDER BY copy_number",
    )?;
    let copies = stmt
        .query_map(params![book_id], |row| {
            Ok(BookCopy {
                id: row.get(0)?,
                book_id: row.get(1)?,
                status: row.get(2)?,
                copy_number: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT br.borrowing_id, br.copy_id, br.borrower_id, br.borrow_date,
                br.due_date, br.return_date, br.is_returned,
                s.first_name || ' ' || s.last_name
         FROM borrowings br
         INNER JOIN book_copies bc ON bc.copy_id = br.copy_id
         INNER JOIN students s ON s.student_id = br.borrower_id
         WHERE bc.book_id = ?1
         ORDER BY br.borrow_date, br.borrowing_id",
    )?;
    let borrowings = stmt
        .query_map(params![book_id], |row| {
            Ok(BorrowingRecord {
                borrowing: Borrowing {
                    id: row.get(0)?,
                    copy_id: row.get(1)?,
                    borrower_id: row.get(2)?,
                    borrow_date: row.get(3)?,
                    due_date: row.get(4)?,
                    return_date: row.get(5)?,
                    is_returned: row.get(6)?,
                },
                borrower_name: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(BookDetail {
        book,
        copies,
        borrowings,
    })
}
