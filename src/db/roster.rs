use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::new_id;
use crate::error::{Result, StoreError};
use crate::models::{Class, NewClass, NewStaff, NewStudent, Staff, StaffRow, Student, StudentRow};

/// Create a class, or hand back the existing row when one already matches on
/// (academic_level, label) case-insensitively. Forms submit the same class
/// over and over (every student row in a CSV names its class), so creation
/// has to be idempotent rather than pile up duplicates.
///
/// The read-then-insert pair is not atomic; under the single-writer
/// assumption that is fine, but it becomes a race the day a second writer
/// appears.
pub fn add_class(conn: &Connection, class: &NewClass) -> Result<Class> {
    if class.academic_level < 1 {
        return Err(StoreError::Validation(
            "academic level must be at least 1".to_string(),
        ));
    }

    let label = class.label.clone().unwrap_or_default();
    let existing = conn
        .query_row(
            "SELECT class_id, academic_level, label FROM classes
             WHERE academic_level = ?1 AND LOWER(COALESCE(label, '')) = LOWER(?2)",
            params![class.academic_level, label],
            class_from_row,
        )
        .optional()?;
    if let Some(found) = existing {
        return Ok(found);
    }

    let id = class.id.clone().unwrap_or_else(new_id);
    conn.execute(
        "INSERT INTO classes (class_id, academic_level, label) VALUES (?1, ?2, ?3)",
        params![id, class.academic_level, class.label],
    )?;

    Ok(Class {
        id,
        academic_level: class.academic_level,
        label: class.label.clone(),
    })
}

pub fn list_classes(conn: &Connection) -> Result<Vec<Class>> {
    let mut stmt = conn.prepare(
        "SELECT class_id, academic_level, label FROM classes
         ORDER BY academic_level, label COLLATE NOCASE",
    )?;

    let classes = stmt
        .query_map([], class_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(classes)
}

/// Single-row getter; a missing id is `None`, not an error.
pub fn get_class(conn: &Connection, id: &str) -> Result<Option<Class>> {
    let class = conn
        .query_row(
            "SELECT class_id, academic_level, label FROM classes WHERE class_id = ?1",
            params![id],
            class_from_row,
        )
        .optional()?;
    Ok(class)
}

pub fn update_class(conn: &Connection, class: &Class) -> Result<()> {
    let updated = conn.execute(
        "UPDATE classes SET academic_level = ?1, label = ?2 WHERE class_id = ?3",
        params![class.academic_level, class.label, class.id],
    )?;

    if updated == 0 {
        Err(StoreError::NotFound("class"))
    } else {
        Ok(())
    }
}

/// Hard delete, restricted: a class still referenced by students or staff
/// cannot be removed.
pub fn delete_class(conn: &Connection, id: &str) -> Result<()> {
    let referenced: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM students WHERE class_id = ?1)
              + (SELECT COUNT(*) FROM staff WHERE class_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if referenced > 0 {
        return Err(StoreError::Conflict(
            "class is still assigned to students or staff".to_string(),
        ));
    }

    let deleted = conn.execute("DELETE FROM classes WHERE class_id = ?1", params![id])?;
    if deleted == 0 {
        Err(StoreError::NotFound("class"))
    } else {
        Ok(())
    }
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get(0)?,
        academic_level: row.get(1)?,
        label: row.get(2)?,
    })
}

/// Insert a student. `class_id` stays null when the caller leaves it unset;
/// a class id that does not resolve is rejected by the foreign key.
pub fn add_student(conn: &Connection, student: &NewStudent) -> Result<Student> {
    require_name(&student.first_name, &student.last_name)?;

    let id = new_id();
    conn.execute(
        "INSERT INTO students (student_id, first_name, last_name, class_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, student.first_name, student.last_name, student.class_id],
    )?;

    Ok(Student {
        id,
        first_name: student.first_name.clone(),
        last_name: student.last_name.clone(),
        class_id: student.class_id.clone(),
    })
}

pub fn update_student(conn: &Connection, student: &Student) -> Result<()> {
    let updated = conn.execute(
        "UPDATE students SET first_name = ?1, last_name = ?2, class_id = ?3
         WHERE student_id = ?4",
        params![
            student.first_name,
            student.last_name,
            student.class_id,
            student.id
        ],
    )?;

    if updated == 0 {
        Err(StoreError::NotFound("student"))
    } else {
        Ok(())
    }
}

/// Hard delete, restricted: a student with open borrowings keeps their row
/// until the books come back.
pub fn delete_student(conn: &Connection, id: &str) -> Result<()> {
    let open: i64 = conn.query_row(
        "SELECT COUNT(*) FROM borrowings WHERE borrower_id = ?1 AND is_returned = 0",
        params![id],
        |row| row.get(0),
    )?;
    if open > 0 {
        return Err(StoreError::Conflict(
            "student still has open borrowings".to_string(),
        ));
    }

    let deleted = conn.execute("DELETE FROM students WHERE student_id = ?1", params![id])?;
    if deleted == 0 {
        Err(StoreError::NotFound("student"))
    } else {
        Ok(())
    }
}

/// Every student with their class left-joined in; students without a class
/// come back with `class: None` rather than dropping out of the list.
pub fn list_students(conn: &Connection) -> Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.student_id, s.first_name, s.last_name, s.class_id,
                c.class_id, c.academic_level, c.label
         FROM students s
         LEFT JOIN classes c ON c.class_id = s.class_id
         ORDER BY s.last_name COLLATE NOCASE, s.first_name COLLATE NOCASE",
    )?;

    let students = stmt
        .query_map([], |row| {
            Ok(StudentRow {
                student: Student {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    class_id: row.get(3)?,
                },
                class: joined_class(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(students)
}

pub fn get_student(conn: &Connection, id: &str) -> Result<Option<Student>> {
    let student = conn
        .query_row(
            "SELECT student_id, first_name, last_name, class_id
             FROM students WHERE student_id = ?1",
            params![id],
            |row| {
                Ok(Student {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    class_id: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(student)
}

pub fn add_staff(conn: &Connection, staff: &NewStaff) -> Result<Staff> {
    require_name(&staff.first_name, &staff.last_name)?;

    let id = new_id();
    conn.execute(
        "INSERT INTO staff (staff_id, first_name, last_name, prefix, class_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            staff.first_name,
            staff.last_name,
            staff.prefix,
            staff.class_id
        ],
    )?;

    Ok(Staff {
        id,
        first_name: staff.first_name.clone(),
        last_name: staff.last_name.clone(),
        prefix: staff.prefix.clone(),
        class_id: staff.class_id.clone(),
    })
}

pub fn update_staff(conn: &Connection, staff: &Staff) -> Result<()> {
    let updated = conn.execute(
        "UPDATE staff SET first_name = ?1, last_name = ?2, prefix = ?3, class_id = ?4
         WHERE staff_id = ?5",
        params![
            staff.first_name,
            staff.last_name,
            staff.prefix,
            staff.class_id,
            staff.id
        ],
    )?;

    if updated == 0 {
        Err(StoreError::NotFound("staff"))
    } else {
        Ok(())
    }
}

/// Hard delete. Nothing else references staff rows, so no restrict check.
pub fn delete_staff(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM staff WHERE staff_id = ?1", params![id])?;
    if deleted == 0 {
        Err(StoreError::NotFound("staff"))
    } else {
        Ok(())
    }
}

pub fn list_staff(conn: &Connection) -> Result<Vec<StaffRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.staff_id, s.first_name, s.last_name, s.prefix, s.class_id,
                c.class_id, c.academic_level, c.label
         FROM staff s
         LEFT JOIN classes c ON c.class_id = s.class_id
         ORDER BY s.last_name COLLATE NOCASE, s.first_name COLLATE NOCASE",
    )?;

    let staff = stmt
        .query_map([], |row| {
            Ok(StaffRow {
                staff: Staff {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    prefix: row.get(3)?,
                    class_id: row.get(4)?,
                },
                class: joined_class(row, 5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(staff)
}

pub fn get_staff(conn: &Connection, id: &str) -> Result<Option<Staff>> {
    let staff = conn
        .query_row(
            "SELECT staff_id, first_name, last_name, prefix, class_id
             FROM staff WHERE staff_id = ?1",
            params![id],
            |row| {
                Ok(Staff {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    prefix: row.get(3)?,
                    class_id: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(staff)
}

fn require_name(first: &str, last: &str) -> Result<()> {
    if first.trim().is_empty() || last.trim().is_empty() {
        return Err(StoreError::Validation(
            "first and last name are required".to_string(),
        ));
    }
    Ok(())
}

/// Read an optional joined class starting at `offset`. A null class_id in
/// the joined columns means the left join found nothing.
fn joined_class(row: &Row<'_>, offset: usize) -> rusqlite::Result<Option<Class>> {
    let id: Option<String> = row.get(offset)?;
    match id {
        None => Ok(None),
        Some(id) => Ok(Some(Class {
            id,
            academic_level: row.get(offset + 1)?,
            label: row.get(offset + 2)?,
        })),
    }
}
