use crate::entities::{course, student, NewCourse, NewStudent};
use crate::error::{RecordsError, RecordsResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Actor recorded on audit events for changes made by the operator
pub const OPERATOR: &str = "operator";

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Students,
    Courses,
    AcademicRecords,
    Attendance,
    Documents,
    LearningOutcomes,
    Events,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Students,
        Table::Courses,
        Table::AcademicRecords,
        Table::Attendance,
        Table::Documents,
        Table::LearningOutcomes,
        Table::Events,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Students => "students",
            Table::Courses => "courses",
            Table::AcademicRecords => "academic_records",
            Table::Attendance => "attendance",
            Table::Documents => "documents",
            Table::LearningOutcomes => "learning_outcomes",
            Table::Events => "events",
        }
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// One row of the audit trail: every create/update/delete is an event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// CONNECTION + SCHEMA
// ============================================================================

/// Open (or create) the database file and make sure the schema exists.
pub fn open_database(path: &Path, wal: bool) -> RecordsResult<Connection> {
    let conn = Connection::open(path)?;
    if wal {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    setup_database(&conn)?;
    info!(path = %path.display(), wal, "database opened");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> RecordsResult<()> {
    // Cascade deletes depend on this
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS students (
            student_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            phone TEXT,
            date_of_birth TEXT,
            enrollment_date TEXT NOT NULL DEFAULT (date('now')),
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'inactive', 'graduated')),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS courses (
            course_id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_code TEXT UNIQUE NOT NULL,
            course_name TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 3,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS academic_records (
            record_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
            course_id INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
            semester TEXT NOT NULL,
            grade TEXT NOT NULL,
            score REAL NOT NULL,
            year INTEGER NOT NULL,
            remarks TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS attendance (
            attendance_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
            course_id INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
            attendance_date TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('present', 'absent', 'late', 'excused')),
            remarks TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS documents (
            document_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
            document_type TEXT NOT NULL,
            document_name TEXT NOT NULL,
            file_path TEXT,
            upload_date TEXT NOT NULL DEFAULT (date('now')),
            description TEXT,
            checksum TEXT
        );

        CREATE TABLE IF NOT EXISTS learning_outcomes (
            outcome_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
            course_id INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
            outcome_description TEXT NOT NULL,
            achievement_level TEXT NOT NULL
                CHECK (achievement_level IN ('not_met', 'partially_met', 'met', 'exceeded')),
            assessment_date TEXT,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- One attendance entry per student, course and day
        CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_day
            ON attendance(student_id, course_id, attendance_date);

        CREATE INDEX IF NOT EXISTS idx_records_student ON academic_records(student_id);
        CREATE INDEX IF NOT EXISTS idx_records_course ON academic_records(course_id);
        CREATE INDEX IF NOT EXISTS idx_records_term ON academic_records(year, semester);
        CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(attendance_date);
        CREATE INDEX IF NOT EXISTS idx_outcomes_student ON learning_outcomes(student_id);
        CREATE INDEX IF NOT EXISTS idx_outcomes_course ON learning_outcomes(course_id);
        CREATE INDEX IF NOT EXISTS idx_documents_student ON documents(student_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);",
    )?;

    debug!("schema ready");
    Ok(())
}

pub fn count_rows(conn: &Connection, table: Table) -> RecordsResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> RecordsResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Record an operator change. A failed audit write never fails the change itself.
pub fn record_event(
    conn: &Connection,
    event_type: &str,
    entity_type: &str,
    entity_id: i64,
    data: serde_json::Value,
) {
    let event = Event::new(event_type, entity_type, &entity_id.to_string(), data, OPERATOR);
    if let Err(e) = insert_event(conn, &event) {
        warn!(error = %e, event_type, entity_type, entity_id, "failed to write audit event");
    }
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> RecordsResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Audit trail of one entity as printable lines, newest first
pub fn render_history(
    conn: &Connection,
    entity_type: &str,
    entity_id: i64,
) -> RecordsResult<String> {
    let events = get_events_for_entity(conn, entity_type, &entity_id.to_string())?;
    if events.is_empty() {
        return Ok(format!("No history for {entity_type} {entity_id}\n"));
    }

    let mut out = format!("History for {entity_type} {entity_id}\n");
    for event in &events {
        out.push_str(&format!(
            "{}  {:<20} {:<10} {}\n",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.actor,
            event.data
        ));
    }
    Ok(out)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Columns: first_name,last_name,email,phone,date_of_birth
pub fn load_students_csv(csv_path: &Path) -> RecordsResult<Vec<NewStudent>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;
    let mut students = Vec::new();
    for result in rdr.deserialize() {
        let student: NewStudent = result?;
        students.push(student);
    }
    Ok(students)
}

/// Columns: course_code,course_name,credits,description
pub fn load_courses_csv(csv_path: &Path) -> RecordsResult<Vec<NewCourse>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;
    let mut courses = Vec::new();
    for result in rdr.deserialize() {
        let course: NewCourse = result?;
        courses.push(course);
    }
    Ok(courses)
}

/// Insert students, skipping duplicate emails and rows that fail validation.
pub fn import_students(conn: &Connection, students: &[NewStudent]) -> RecordsResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for new in students {
        match student::add_student(conn, new) {
            Ok(_) => summary.inserted += 1,
            Err(RecordsError::Constraint(_)) => summary.duplicates += 1,
            Err(RecordsError::Validation(e)) => {
                warn!(email = %new.email, error = %e, "skipping invalid student row");
                summary.invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(?summary, "student import finished");
    Ok(summary)
}

/// Insert courses, skipping duplicate codes and rows that fail validation.
pub fn import_courses(conn: &Connection, courses: &[NewCourse]) -> RecordsResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for new in courses {
        match course::add_course(conn, new) {
            Ok(_) => summary.inserted += 1,
            Err(RecordsError::Constraint(_)) => summary.duplicates += 1,
            Err(RecordsError::Validation(e)) => {
                warn!(code = %new.course_code, error = %e, "skipping invalid course row");
                summary.invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(?summary, "course import finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = memory_db();
        setup_database(&conn).unwrap();

        for table in Table::ALL {
            assert_eq!(count_rows(&conn, table).unwrap(), 0, "{}", table.name());
        }
    }

    #[test]
    fn test_event_log() {
        let conn = memory_db();

        let event = Event::new(
            "test_event",
            "student",
            "42",
            serde_json::json!({"test": "data"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "student", "42").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["test"], "data");
    }

    #[test]
    fn test_render_history() {
        let conn = memory_db();
        assert_eq!(
            render_history(&conn, "student", 7).unwrap(),
            "No history for student 7\n"
        );

        let added = serde_json::json!({"email": "ada@example.com"});
        record_event(&conn, "student_added", "student", 7, added);
        let updated = serde_json::json!({"field": "phone"});
        record_event(&conn, "student_updated", "student", 7, updated);
        record_event(&conn, "course_added", "course", 7, serde_json::json!({}));

        let text = render_history(&conn, "student", 7).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "History for student 7");
        assert!(lines[1].contains("student_updated"));
        assert!(lines[2].contains("student_added"));
        assert!(lines[2].contains("ada@example.com"));
        assert!(!text.contains("course_added"));
    }

    #[test]
    fn test_academic_records_require_score_and_year() {
        let conn = memory_db();
        conn.execute_batch(
            "INSERT INTO students (first_name, last_name, email) VALUES ('Ada', 'Lovelace', 'ada@example.com');
             INSERT INTO courses (course_code, course_name) VALUES ('CS101', 'Intro');",
        )
        .unwrap();

        let missing_score = conn.execute(
            "INSERT INTO academic_records (student_id, course_id, semester, year, grade)
             VALUES (1, 1, 'Fall', 2023, 'A')",
            [],
        );
        assert!(missing_score.is_err());

        let missing_year = conn.execute(
            "INSERT INTO academic_records (student_id, course_id, semester, grade, score)
             VALUES (1, 1, 'Fall', 'A', 90.0)",
            [],
        );
        assert!(missing_year.is_err());
        assert_eq!(count_rows(&conn, Table::AcademicRecords).unwrap(), 0);
    }

    #[test]
    fn test_open_database_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("school.db");

        {
            let conn = open_database(&path, true).unwrap();
            conn.execute(
                "INSERT INTO courses (course_code, course_name) VALUES ('CS101', 'Intro')",
                [],
            )
            .unwrap();
        }

        let reopened = open_database(&path, true).unwrap();
        assert_eq!(count_rows(&reopened, Table::Courses).unwrap(), 1);
    }

    #[test]
    fn test_import_students_twice_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("students.csv");
        let mut file = std::fs::File::create(&csv_path).unwrap();
        writeln!(file, "first_name,last_name,email,phone,date_of_birth").unwrap();
        writeln!(file, "Ada,Lovelace,ada@example.com,5551234567,1815-12-10").unwrap();
        writeln!(file, "Alan,Turing,alan@example.com,,1912-06-23").unwrap();
        writeln!(file, "Bad,Row,not-an-email,,").unwrap();
        drop(file);

        let conn = memory_db();
        let students = load_students_csv(&csv_path).unwrap();
        assert_eq!(students.len(), 3);
        assert_eq!(students[1].phone, None);

        let first = import_students(&conn, &students).unwrap();
        assert_eq!(
            first,
            ImportSummary { inserted: 2, duplicates: 0, invalid: 1 }
        );

        let second = import_students(&conn, &students).unwrap();
        assert_eq!(
            second,
            ImportSummary { inserted: 0, duplicates: 2, invalid: 1 }
        );
        assert_eq!(count_rows(&conn, Table::Students).unwrap(), 2);
    }

    #[test]
    fn test_import_courses_defaults_credits() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("courses.csv");
        std::fs::write(
            &csv_path,
            "course_code,course_name,credits,description\ncs101,Intro to CS,4,Basics\nma201,Calculus,,\n",
        )
        .unwrap();

        let conn = memory_db();
        let courses = load_courses_csv(&csv_path).unwrap();
        let summary = import_courses(&conn, &courses).unwrap();
        assert_eq!(summary.inserted, 2);

        let all = course::get_all_courses(&conn).unwrap();
        assert_eq!(all[0].code, "CS101");
        assert_eq!(all[0].credits, 4);
        assert_eq!(all[1].code, "MA201");
        assert_eq!(all[1].credits, 3);
    }
}
