use std::str::FromStr;

use chrono::{Duration, Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::new_id;
use crate::error::{Result, StoreError};
use crate::models::{Borrowing, CopyStatus, LendRequest, OverdueBorrowing};

/// Threshold applied on top of the base overdue condition
/// (open borrowing, due date in the past).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverdueFilter {
    /// Everything past due.
    All,
    /// Only borrowings overdue by more than this many days.
    OlderThanDays(u32),
}

impl OverdueFilter {
    /// Latest due date (exclusive) that still counts as overdue under this
    /// filter, relative to `today`.
    fn cutoff(self, today: NaiveDate) -> NaiveDate {
        match self {
            OverdueFilter::All => today,
            OverdueFilter::OlderThanDays(days) => today - Duration::days(i64::from(days)),
        }
    }
}

impl FromStr for OverdueFilter {
    type Err = StoreError;

    /// The command shim hands the filter through as a string: the literal
    /// "all", or a day count.
    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(OverdueFilter::All);
        }
        s.trim()
            .parse::<u32>()
            .map(OverdueFilter::OlderThanDays)
            .map_err(|_| StoreError::Validation(format!("invalid overdue filter: {s:?}")))
    }
}

/// Lend one copy to one student. The status flip and the borrowing insert
/// commit together or not at all, and the status flip is conditional on the
/// copy still being available, so two lends can never both succeed against
/// the same copy.
pub fn lend_copy(conn: &mut Connection, request: &LendRequest) -> Result<Borrowing> {
    let tx = conn.transaction()?;

    let flipped = tx.execute(
        "UPDATE book_copies SET status = ?1 WHERE copy_id = ?2 AND status = ?3",
        params![CopyStatus::Borrowed, request.copy_id, CopyStatus::Available],
    )?;
    if flipped == 0 {
        // Either the copy does not exist or it is not available; the caller
        // gets the same answer for both.
        return Err(StoreError::Conflict("copy unavailable".to_string()));
    }

    let borrowing = Borrowing {
        id: new_id(),
        copy_id: request.copy_id.clone(),
        borrower_id: request.borrower_id.clone(),
        borrow_date: Local::now().date_naive(),
        due_date: request.due_date,
        return_date: None,
        is_returned: false,
    };
    tx.execute(
        "INSERT INTO borrowings
            (borrowing_id, copy_id, borrower_id, borrow_date, due_date, return_date, is_returned)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0)",
        params![
            borrowing.id,
            borrowing.copy_id,
            borrowing.borrower_id,
            borrowing.borrow_date,
            borrowing.due_date,
        ],
    )?;

    tx.commit()?;
    Ok(borrowing)
}

/// Close out a borrowing and free its copy. The copy is resolved through the
/// borrowing row rather than trusted from the caller.
pub fn return_copy(conn: &mut Connection, borrowing_id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let open: Option<(String, bool)> = tx
        .query_row(
            "SELECT copy_id, is_returned FROM borrowings WHERE borrowing_id = ?1",
            params![borrowing_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let copy_id = match open {
        None => return Err(StoreError::NotFound("borrowing")),
        Some((_, true)) => {
            return Err(StoreError::Conflict("borrowing already returned".to_string()))
        }
        Some((copy_id, false)) => copy_id,
    };

    tx.execute(
        "UPDATE borrowings SET is_returned = 1, return_date = ?1 WHERE borrowing_id = ?2",
        params![Local::now().date_naive(), borrowing_id],
    )?;
    tx.execute(
        "UPDATE book_copies SET status = ?1 WHERE copy_id = ?2",
        params![CopyStatus::Available, copy_id],
    )?;

    tx.commit()?;
    Ok(())
}

/// Open borrowings whose due date has passed, joined across copy, book, and
/// student, earliest due date first so the most overdue loans surface at the
/// top of the report.
pub fn list_overdue(conn: &Connection, filter: OverdueFilter) -> Result<Vec<OverdueBorrowing>> {
    let cutoff = filter.cutoff(Local::now().date_naive());

    let mut stmt = conn.prepare(
        "SELECT br.borrowing_id, bc.copy_id, b.book_id, b.title,
                COALESCE(a.name, b.author_id), br.borrow_date, br.due_date,
                s.student_id, s.first_name || ' ' || s.last_name
         FROM borrowings br
         INNER JOIN book_copies bc ON bc.copy_id = br.copy_id
         INNER JOIN main_books b ON b.book_id = bc.book_id
         LEFT JOIN authors a ON a.author_id = b.author_id
         INNER JOIN students s ON s.student_id = br.borrower_id
         WHERE br.is_returned = 0 AND br.due_date < ?1
         ORDER BY br.due_date",
    )?;

    let overdue = stmt
        .query_map(params![cutoff], |row| {
            Ok(OverdueBorrowing {
                borrowing_id: row.get(0)?,
                copy_id: row.get(1)?,
                book_id: row.get(2)?,
                title: row.get(3)?,
                author: row.get(4)?,
                borrow_date: row.get(5)?,
                due_date: row.get(6)?,
                student_id: row.get(7)?,
                student_name: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(overdue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::{seed_book_with_copies, seed_student, test_conn};
    use crate::models::LendRequest;

    fn due_in(days: i64) -> NaiveDate {
        Local::now().date_naive() + Duration::days(days)
    }

    fn lend(conn: &mut Connection, copy_id: &str, borrower_id: &str, due: NaiveDate) -> Result<Borrowing> {
        lend_copy(
            conn,
            &LendRequest {
                copy_id: copy_id.to_string(),
                borrower_id: borrower_id.to_string(),
                due_date: due,
            },
        )
    }

    fn copy_status(conn: &Connection, copy_id: &str) -> CopyStatus {
        conn.query_row(
            "SELECT status FROM book_copies WHERE copy_id = ?1",
            params![copy_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn open_borrowings_for(conn: &Connection, copy_id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM borrowings WHERE copy_id = ?1 AND is_returned = 0",
            params![copy_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn lend_then_double_lend_then_return() {
        let mut conn = test_conn();
        let (_, copies) = seed_book_with_copies(&mut conn, "1111111111", 2);
        let student = seed_student(&conn, "S", "One");

        let borrowing = lend(&mut conn, &copies[0], &student, due_in(14)).unwrap();
        assert_eq!(copy_status(&conn, &copies[0]), CopyStatus::Borrowed);
        assert_eq!(copy_status(&conn, &copies[1]), CopyStatus::Available);
        assert_eq!(open_borrowings_for(&conn, &copies[0]), 1);
        assert!(!borrowing.is_returned);
        assert_eq!(borrowing.borrow_date, Local::now().date_naive());

        // Second lend of the same copy must fail without touching anything.
        let err = lend(&mut conn, &copies[0], &student, due_in(14)).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(copy_status(&conn, &copies[0]), CopyStatus::Borrowed);
        assert_eq!(open_borrowings_for(&conn, &copies[0]), 1);

        return_copy(&mut conn, &borrowing.id).unwrap();
        assert_eq!(copy_status(&conn, &copies[0]), CopyStatus::Available);
        assert_eq!(open_borrowings_for(&conn, &copies[0]), 0);

        let (returned, return_date): (bool, Option<NaiveDate>) = conn
            .query_row(
                "SELECT is_returned, return_date FROM borrowings WHERE borrowing_id = ?1",
                params![borrowing.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(returned);
        assert_eq!(return_date, Some(Local::now().date_naive()));
    }

    #[test]
    fn lending_unknown_copy_is_a_conflict_with_no_writes() {
        let mut conn = test_conn();
        let student = seed_student(&conn, "S", "One");

        let err = lend(&mut conn, "no-such-copy", &student, due_in(7)).unwrap_err();
        assert!(err.is_conflict());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM borrowings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn lending_a_reserved_copy_fails() {
        let mut conn = test_conn();
        let (_, copies) = seed_book_with_copies(&mut conn, "22", 1);
        let student = seed_student(&conn, "S", "One");

        conn.execute(
            "UPDATE book_copies SET status = ?1 WHERE copy_id = ?2",
            params![CopyStatus::Reserved, copies[0]],
        )
        .unwrap();

        let err = lend(&mut conn, &copies[0], &student, due_in(7)).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(copy_status(&conn, &copies[0]), CopyStatus::Reserved);
    }

    #[test]
    fn returning_unknown_or_closed_borrowings() {
        let mut conn = test_conn();
        let (_, copies) = seed_book_with_copies(&mut conn, "33", 1);
        let student = seed_student(&conn, "S", "One");

        assert!(matches!(
            return_copy(&mut conn, "missing"),
            Err(StoreError::NotFound("borrowing"))
        ));

        let borrowing = lend(&mut conn, &copies[0], &student, due_in(7)).unwrap();
        return_copy(&mut conn, &borrowing.id).unwrap();

        // Second return of the same borrowing is a conflict, and the copy
        // stays available.
        let err = return_copy(&mut conn, &borrowing.id).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(copy_status(&conn, &copies[0]), CopyStatus::Available);
    }

    #[test]
    fn copy_is_lendable_again_after_return() {
        let mut conn = test_conn();
        let (_, copies) = seed_book_with_copies(&mut conn, "44", 1);
        let student = seed_student(&conn, "S", "One");

        let first = lend(&mut conn, &copies[0], &student, due_in(7)).unwrap();
        return_copy(&mut conn, &first.id).unwrap();
        let second = lend(&mut conn, &copies[0], &student, due_in(7)).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(open_borrowings_for(&conn, &copies[0]), 1);
    }

    #[test]
    fn overdue_report_filters_and_orders_by_due_date() {
        let mut conn = test_conn();
        let (_, copies) = seed_book_with_copies(&mut conn, "55", 3);
        let student = seed_student(&conn, "Pat", "Reader");

        // Three open loans: 20 days overdue, 3 days overdue, not yet due.
        let very_late = lend(&mut conn, &copies[0], &student, due_in(-20)).unwrap();
        let late = lend(&mut conn, &copies[1], &student, due_in(-3)).unwrap();
        lend(&mut conn, &copies[2], &student, due_in(10)).unwrap();

        let all = list_overdue(&conn, OverdueFilter::All).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].borrowing_id, very_late.id);
        assert_eq!(all[1].borrowing_id, late.id);
        assert_eq!(all[0].student_name, "Pat Reader");

        let week_plus = list_overdue(&conn, OverdueFilter::OlderThanDays(7)).unwrap();
        assert_eq!(week_plus.len(), 1);
        assert_eq!(week_plus[0].borrowing_id, very_late.id);

        // A returned loan drops out of the report even when past due.
        return_copy(&mut conn, &very_late.id).unwrap();
        let all = list_overdue(&conn, OverdueFilter::All).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].borrowing_id, late.id);
    }

    #[test]
    fn overdue_filter_parses_shim_strings() {
        assert_eq!("all".parse::<OverdueFilter>().unwrap(), OverdueFilter::All);
        assert_eq!("All".parse::<OverdueFilter>().unwrap(), OverdueFilter::All);
        assert_eq!(
            "7".parse::<OverdueFilter>().unwrap(),
            OverdueFilter::OlderThanDays(7)
        );
        assert!(matches!(
            "soon".parse::<OverdueFilter>(),
            Err(StoreError::Validation(_))
        ));
    }
}
