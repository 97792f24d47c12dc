// Attendance - at most one entry per (student, course, day)
// Marking twice on the same day updates the existing entry.

use crate::db::record_event;
use crate::error::{RecordsResult, ValidationError};
use crate::validators::{validate_date, DATE_FORMAT};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

// ============================================================================
// ATTENDANCE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_lowercase();
        AttendanceStatus::ALL.into_iter().find(|s| s.as_str() == lower)
    }

    /// Menu choice 1-4; anything else counts as present
    pub fn from_choice(choice: &str) -> Self {
        match choice.trim() {
            "2" => AttendanceStatus::Absent,
            "3" => AttendanceStatus::Late,
            "4" => AttendanceStatus::Excused,
            _ => AttendanceStatus::Present,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub date: String,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

/// Attendance joined with its course, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceView {
    pub date: String,
    pub course_code: String,
    pub course_name: String,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Inserted,
    /// An entry already existed for that day and was overwritten
    Updated,
}

/// Today's date in the operator's timezone
pub fn today() -> String {
    chrono::Local::now().date_naive().format(DATE_FORMAT).to_string()
}

fn parse_status(raw: String) -> AttendanceStatus {
    AttendanceStatus::parse(&raw).unwrap_or(AttendanceStatus::Present)
}

// ============================================================================
// REPOSITORY
// ============================================================================

pub fn mark_attendance(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    date: &str,
    status: AttendanceStatus,
    remarks: &str,
) -> RecordsResult<MarkOutcome> {
    if !validate_date(date) {
        return Err(ValidationError::new("date", "expected YYYY-MM-DD").into());
    }
    let remarks = Some(remarks.trim()).filter(|r| !r.is_empty());

    // Existence check and write commit together
    let tx = conn.unchecked_transaction()?;
    let existing = get_attendance_entry(&tx, student_id, course_id, date)?;

    let outcome = match existing {
        Some(entry) => {
            tx.execute(
                "UPDATE attendance SET status = ?1, remarks = ?2 WHERE attendance_id = ?3",
                params![status.as_str(), remarks, entry.id],
            )?;
            MarkOutcome::Updated
        }
        None => {
            tx.execute(
                "INSERT INTO attendance (student_id, course_id, attendance_date, status, remarks)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![student_id, course_id, date, status.as_str(), remarks],
            )?;
            MarkOutcome::Inserted
        }
    };

    record_event(
        &tx,
        "attendance_marked",
        "student",
        student_id,
        serde_json::json!({
            "course_id": course_id,
            "date": date,
            "status": status.as_str(),
        }),
    );
    tx.commit()?;

    info!(student_id, course_id, date, status = status.as_str(), ?outcome, "attendance marked");
    Ok(outcome)
}

/// Mark the same status for many students. Returns how many succeeded.
pub fn mark_bulk_attendance(
    conn: &Connection,
    course_id: i64,
    student_ids: &[i64],
    date: &str,
    status: AttendanceStatus,
    remarks: &str,
) -> RecordsResult<usize> {
    let mut marked = 0;
    for &student_id in student_ids {
        match mark_attendance(conn, student_id, course_id, date, status, remarks) {
            Ok(_) => marked += 1,
            Err(e) => warn!(student_id, course_id, error = %e, "bulk attendance skipped student"),
        }
    }
    Ok(marked)
}

pub fn get_attendance_entry(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    date: &str,
) -> RecordsResult<Option<AttendanceEntry>> {
    let entry = conn
        .query_row(
            "SELECT attendance_id, student_id, course_id, attendance_date, status, remarks
             FROM attendance
             WHERE student_id = ?1 AND course_id = ?2 AND attendance_date = ?3",
            params![student_id, course_id, date],
            |row| {
                Ok(AttendanceEntry {
                    id: row.get("attendance_id")?,
                    student_id: row.get("student_id")?,
                    course_id: row.get("course_id")?,
                    date: row.get("attendance_date")?,
                    status: parse_status(row.get("status")?),
                    remarks: row.get("remarks")?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

/// A student's attendance, optionally limited to one course
pub fn get_attendance(
    conn: &Connection,
    student_id: i64,
    course_id: Option<i64>,
) -> RecordsResult<Vec<AttendanceView>> {
    let mut stmt = conn.prepare(
        "SELECT a.attendance_date, c.course_code, c.course_name, a.status, a.remarks
         FROM attendance a
         JOIN courses c ON a.course_id = c.course_id
         WHERE a.student_id = ?1 AND (?2 IS NULL OR a.course_id = ?2)
         ORDER BY a.attendance_date DESC, c.course_code",
    )?;

    let rows = stmt
        .query_map(params![student_id, course_id], |row| {
            Ok(AttendanceView {
                date: row.get("attendance_date")?,
                course_code: row.get("course_code")?,
                course_name: row.get("course_name")?,
                status: parse_status(row.get("status")?),
                remarks: row.get("remarks")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_rows, setup_database, Table};
    use crate::entities::{course, student, NewCourse, NewStudent};

    fn seeded_db() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let sid = student::add_student(
            &conn,
            &NewStudent {
                first_name: "Alan".to_string(),
                last_name: "Turing".to_string(),
                email: "alan@example.com".to_string(),
                phone: None,
                date_of_birth: None,
            },
        )
        .unwrap();
        let cid = course::add_course(
            &conn,
            &NewCourse {
                course_code: "CS101".to_string(),
                course_name: "Intro".to_string(),
                credits: None,
                description: None,
            },
        )
        .unwrap();
        (conn, sid, cid)
    }

    #[test]
    fn test_mark_twice_same_day_updates() {
        let (conn, sid, cid) = seeded_db();

        let first = mark_attendance(&conn, sid, cid, "2024-09-02", AttendanceStatus::Absent, "").unwrap();
        let second =
            mark_attendance(&conn, sid, cid, "2024-09-02", AttendanceStatus::Late, "bus").unwrap();

        assert_eq!(first, MarkOutcome::Inserted);
        assert_eq!(second, MarkOutcome::Updated);
        assert_eq!(count_rows(&conn, Table::Attendance).unwrap(), 1);

        let entry = get_attendance_entry(&conn, sid, cid, "2024-09-02").unwrap().unwrap();
        assert_eq!(entry.status, AttendanceStatus::Late);
        assert_eq!(entry.remarks.as_deref(), Some("bus"));
    }

    #[test]
    fn test_unique_index_backs_one_entry_per_day() {
        let (conn, sid, cid) = seeded_db();
        mark_attendance(&conn, sid, cid, "2024-09-02", AttendanceStatus::Present, "").unwrap();

        let raw = conn.execute(
            "INSERT INTO attendance (student_id, course_id, attendance_date, status)
             VALUES (?1, ?2, '2024-09-02', 'absent')",
            params![sid, cid],
        );
        assert!(raw.is_err());
    }

    #[test]
    fn test_bulk_marking_counts_successes() {
        let (conn, sid, cid) = seeded_db();
        let marked =
            mark_bulk_attendance(&conn, cid, &[sid, 999], "2024-09-03", AttendanceStatus::Present, "")
                .unwrap();
        assert_eq!(marked, 1);
    }

    #[test]
    fn test_list_attendance_newest_first() {
        let (conn, sid, cid) = seeded_db();
        mark_attendance(&conn, sid, cid, "2024-09-02", AttendanceStatus::Present, "").unwrap();
        mark_attendance(&conn, sid, cid, "2024-09-04", AttendanceStatus::Excused, "").unwrap();

        let all = get_attendance(&conn, sid, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].date, "2024-09-04");

        let filtered = get_attendance(&conn, sid, Some(cid + 1)).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(AttendanceStatus::parse("LATE"), Some(AttendanceStatus::Late));
        assert_eq!(AttendanceStatus::from_choice("4"), AttendanceStatus::Excused);
        assert_eq!(AttendanceStatus::from_choice("9"), AttendanceStatus::Present);
        assert!(mark_attendance(
            &Connection::open_in_memory().unwrap(),
            1,
            1,
            "yesterday",
            AttendanceStatus::Present,
            ""
        )
        .is_err());
    }
}
