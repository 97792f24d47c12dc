// Record Store - the read interface the reporting engine folds over
//
// Every read the engine makes is one variant of `Query`, carrying its own
// parameters. A store answers with ordered rows (column -> value) and knows
// nothing about grades or GPAs.

use crate::error::StoreError;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// ROW
// ============================================================================

/// One result row. Column order follows the query's projection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    /// Builder used by tests and in-memory stores
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push((column.to_string(), value.into()));
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    fn require(&self, column: &str) -> Result<&Value, StoreError> {
        self.get(column)
            .ok_or_else(|| StoreError::MissingColumn(column.to_string()))
    }

    fn invalid(column: &str, expected: &'static str) -> StoreError {
        StoreError::InvalidValue {
            column: column.to_string(),
            expected,
        }
    }

    pub fn i64(&self, column: &str) -> Result<i64, StoreError> {
        self.require(column)?
            .as_i64()
            .ok_or_else(|| Row::invalid(column, "integer"))
    }

    /// Integers are widened; SQLite hands back whole-number averages as either
    pub fn f64(&self, column: &str) -> Result<f64, StoreError> {
        self.require(column)?
            .as_f64()
            .ok_or_else(|| Row::invalid(column, "number"))
    }

    /// NULL (e.g. AVG over nothing) reads as None
    pub fn opt_f64(&self, column: &str) -> Result<Option<f64>, StoreError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            other => other
                .as_f64()
                .map(Some)
                .ok_or_else(|| Row::invalid(column, "number")),
        }
    }

    pub fn str(&self, column: &str) -> Result<&str, StoreError> {
        self.require(column)?
            .as_str()
            .ok_or_else(|| Row::invalid(column, "text"))
    }

    pub fn opt_str(&self, column: &str) -> Result<Option<&str>, StoreError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            other => other
                .as_str()
                .map(Some)
                .ok_or_else(|| Row::invalid(column, "text")),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ============================================================================
// QUERIES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Real(f64),
    Text(String),
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Param::Int(v) => ToSqlOutput::from(*v),
            Param::Real(v) => ToSqlOutput::from(*v),
            Param::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

/// Present count per attendance group, shared by every attendance rate query
const PRESENT: &str = "SUM(CASE WHEN a.status = 'present' THEN 1 ELSE 0 END)";

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    StudentById { student_id: i64 },
    CourseById { course_id: i64 },

    // Scores
    StudentScores { student_id: i64 },
    CourseScores { course_id: i64 },
    SemesterScores { semester: String, year: i64 },
    AllScores,
    /// A student's records joined with course, in transcript order
    TranscriptRecords { student_id: i64 },

    // Attendance status counts
    AttendanceStatusCounts { student_id: i64, course_id: i64 },
    StudentAttendanceStatusCounts { student_id: i64 },
    CourseAttendanceStatusCounts { course_id: i64 },
    AllAttendanceStatusCounts,

    // Achievement level counts
    StudentOutcomeLevels { student_id: i64 },
    CourseOutcomeLevels { course_id: i64 },
    StudentCourseOutcomeLevels { student_id: i64, course_id: i64 },

    // Counts
    StudentDocumentCount { student_id: i64 },
    CourseEnrollment { course_id: i64 },
    SemesterEnrollment { semester: String, year: i64 },
    StudentStatusCounts,
    CourseCount,
    DocumentCount,

    // Listings
    SemesterCourseBreakdown { semester: String, year: i64 },
    TopPerformers { min_courses: i64, limit: i64 },
    LowPerformers { threshold: f64, limit: i64 },
    ActiveAttendanceSummary { limit: i64 },
    LowAttendanceStudents { threshold: f64 },
    CourseAttendanceByStudent { course_id: i64 },
    StudentAttendanceByCourse { student_id: i64 },
    AttendanceByDate { date: String },
}

impl Query {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Query::StudentById { .. } => "student_by_id",
            Query::CourseById { .. } => "course_by_id",
            Query::StudentScores { .. } => "student_scores",
            Query::CourseScores { .. } => "course_scores",
            Query::SemesterScores { .. } => "semester_scores",
            Query::AllScores => "all_scores",
            Query::TranscriptRecords { .. } => "transcript_records",
            Query::AttendanceStatusCounts { .. } => "attendance_status_counts",
            Query::StudentAttendanceStatusCounts { .. } => "student_attendance_status_counts",
            Query::CourseAttendanceStatusCounts { .. } => "course_attendance_status_counts",
            Query::AllAttendanceStatusCounts => "all_attendance_status_counts",
            Query::StudentOutcomeLevels { .. } => "student_outcome_levels",
            Query::CourseOutcomeLevels { .. } => "course_outcome_levels",
            Query::StudentCourseOutcomeLevels { .. } => "student_course_outcome_levels",
            Query::StudentDocumentCount { .. } => "student_document_count",
            Query::CourseEnrollment { .. } => "course_enrollment",
            Query::SemesterEnrollment { .. } => "semester_enrollment",
            Query::StudentStatusCounts => "student_status_counts",
            Query::CourseCount => "course_count",
            Query::DocumentCount => "document_count",
            Query::SemesterCourseBreakdown { .. } => "semester_course_breakdown",
            Query::TopPerformers { .. } => "top_performers",
            Query::LowPerformers { .. } => "low_performers",
            Query::ActiveAttendanceSummary { .. } => "active_attendance_summary",
            Query::LowAttendanceStudents { .. } => "low_attendance_students",
            Query::CourseAttendanceByStudent { .. } => "course_attendance_by_student",
            Query::StudentAttendanceByCourse { .. } => "student_attendance_by_course",
            Query::AttendanceByDate { .. } => "attendance_by_date",
        }
    }

    pub fn sql(&self) -> String {
        match self {
            Query::StudentById { .. } => "SELECT student_id, first_name, last_name, email, phone,
                    date_of_birth, enrollment_date, status
                 FROM students WHERE student_id = ?1"
                .to_string(),
            Query::CourseById { .. } => {
                "SELECT course_id, course_code, course_name, credits, description
                 FROM courses WHERE course_id = ?1"
                    .to_string()
            }

            Query::StudentScores { .. } => {
                "SELECT score FROM academic_records WHERE student_id = ?1 AND score IS NOT NULL"
                    .to_string()
            }
            Query::CourseScores { .. } => {
                "SELECT score FROM academic_records WHERE course_id = ?1 AND score IS NOT NULL"
                    .to_string()
            }
            Query::SemesterScores { .. } => "SELECT score FROM academic_records
                 WHERE semester = ?1 AND year = ?2 AND score IS NOT NULL"
                .to_string(),
            Query::AllScores => {
                "SELECT score FROM academic_records WHERE score IS NOT NULL".to_string()
            }
            Query::TranscriptRecords { .. } => "SELECT ar.semester, ar.year, c.course_code,
                    c.course_name, c.credits, ar.grade, ar.score
                 FROM academic_records ar
                 JOIN courses c ON ar.course_id = c.course_id
                 WHERE ar.student_id = ?1 AND ar.score IS NOT NULL
                 ORDER BY ar.year, ar.semester, c.course_code"
                .to_string(),

            Query::AttendanceStatusCounts { .. } => "SELECT status, COUNT(*) AS count
                 FROM attendance WHERE student_id = ?1 AND course_id = ?2
                 GROUP BY status ORDER BY status"
                .to_string(),
            Query::StudentAttendanceStatusCounts { .. } => "SELECT status, COUNT(*) AS count
                 FROM attendance WHERE student_id = ?1
                 GROUP BY status ORDER BY status"
                .to_string(),
            Query::CourseAttendanceStatusCounts { .. } => "SELECT status, COUNT(*) AS count
                 FROM attendance WHERE course_id = ?1
                 GROUP BY status ORDER BY status"
                .to_string(),
            Query::AllAttendanceStatusCounts => "SELECT status, COUNT(*) AS count
                 FROM attendance GROUP BY status ORDER BY status"
                .to_string(),

            Query::StudentOutcomeLevels { .. } => "SELECT achievement_level, COUNT(*) AS count
                 FROM learning_outcomes WHERE student_id = ?1
                 GROUP BY achievement_level"
                .to_string(),
            Query::CourseOutcomeLevels { .. } => "SELECT achievement_level, COUNT(*) AS count
                 FROM learning_outcomes WHERE course_id = ?1
                 GROUP BY achievement_level"
                .to_string(),
            Query::StudentCourseOutcomeLevels { .. } => "SELECT achievement_level, COUNT(*) AS count
                 FROM learning_outcomes WHERE student_id = ?1 AND course_id = ?2
                 GROUP BY achievement_level"
                .to_string(),

            Query::StudentDocumentCount { .. } => {
                "SELECT COUNT(*) AS count FROM documents WHERE student_id = ?1".to_string()
            }
            Query::CourseEnrollment { .. } => "SELECT COUNT(DISTINCT student_id) AS count
                 FROM academic_records WHERE course_id = ?1"
                .to_string(),
            Query::SemesterEnrollment { .. } => "SELECT COUNT(DISTINCT student_id) AS count
                 FROM academic_records WHERE semester = ?1 AND year = ?2"
                .to_string(),
            Query::StudentStatusCounts => {
                "SELECT status, COUNT(*) AS count FROM students GROUP BY status".to_string()
            }
            Query::CourseCount => "SELECT COUNT(*) AS count FROM courses".to_string(),
            Query::DocumentCount => "SELECT COUNT(*) AS count FROM documents".to_string(),

            Query::SemesterCourseBreakdown { .. } => "SELECT c.course_code, c.course_name,
                    COUNT(*) AS students, AVG(ar.score) AS avg_score
                 FROM academic_records ar
                 JOIN courses c ON ar.course_id = c.course_id
                 WHERE ar.semester = ?1 AND ar.year = ?2
                 GROUP BY c.course_id, c.course_code, c.course_name
                 ORDER BY c.course_code"
                .to_string(),
            Query::TopPerformers { .. } => "SELECT s.student_id, s.first_name, s.last_name,
                    COUNT(ar.record_id) AS courses_taken, AVG(ar.score) AS avg_score
                 FROM students s
                 JOIN academic_records ar ON s.student_id = ar.student_id
                 GROUP BY s.student_id, s.first_name, s.last_name
                 HAVING COUNT(ar.record_id) >= ?1
                 ORDER BY avg_score DESC, s.student_id
                 LIMIT ?2"
                .to_string(),
            Query::LowPerformers { .. } => "SELECT s.student_id, s.first_name, s.last_name,
                    s.email, COUNT(ar.record_id) AS courses_taken, AVG(ar.score) AS avg_score
                 FROM students s
                 JOIN academic_records ar ON s.student_id = ar.student_id
                 WHERE s.status = 'active'
                 GROUP BY s.student_id, s.first_name, s.last_name, s.email
                 HAVING AVG(ar.score) < ?1
                 ORDER BY avg_score ASC, s.student_id
                 LIMIT ?2"
                .to_string(),
            Query::ActiveAttendanceSummary { .. } => format!(
                "SELECT s.student_id, s.first_name, s.last_name,
                    COUNT(a.attendance_id) AS total_classes,
                    {PRESENT} AS present,
                    100.0 * {PRESENT} / COUNT(*) AS percentage
                 FROM students s
                 JOIN attendance a ON s.student_id = a.student_id
                 WHERE s.status = 'active'
                 GROUP BY s.student_id, s.first_name, s.last_name
                 ORDER BY percentage ASC, s.student_id
                 LIMIT ?1"
            ),
            Query::LowAttendanceStudents { .. } => format!(
                "SELECT s.student_id, s.first_name, s.last_name, s.email,
                    COUNT(*) AS total_classes,
                    {PRESENT} AS present,
                    100.0 * {PRESENT} / COUNT(*) AS percentage
                 FROM students s
                 JOIN attendance a ON s.student_id = a.student_id
                 GROUP BY s.student_id, s.first_name, s.last_name, s.email
                 HAVING 100.0 * {PRESENT} / COUNT(*) < ?1
                 ORDER BY percentage ASC, s.student_id"
            ),
            Query::CourseAttendanceByStudent { .. } => format!(
                "SELECT s.student_id, s.first_name, s.last_name,
                    COUNT(*) AS total_classes,
                    {PRESENT} AS present,
                    100.0 * {PRESENT} / COUNT(*) AS percentage
                 FROM students s
                 JOIN attendance a ON s.student_id = a.student_id
                 WHERE a.course_id = ?1
                 GROUP BY s.student_id, s.first_name, s.last_name
                 ORDER BY percentage DESC, s.student_id"
            ),
            Query::StudentAttendanceByCourse { .. } => format!(
                "SELECT c.course_code, c.course_name,
                    COUNT(*) AS total,
                    {PRESENT} AS present,
                    100.0 * {PRESENT} / COUNT(*) AS percentage
                 FROM attendance a
                 JOIN courses c ON a.course_id = c.course_id
                 WHERE a.student_id = ?1
                 GROUP BY c.course_id, c.course_code, c.course_name
                 ORDER BY percentage DESC, c.course_code"
            ),
            Query::AttendanceByDate { .. } => "SELECT s.student_id, s.first_name, s.last_name,
                    c.course_code, c.course_name, a.status, a.remarks
                 FROM attendance a
                 JOIN students s ON a.student_id = s.student_id
                 JOIN courses c ON a.course_id = c.course_id
                 WHERE a.attendance_date = ?1
                 ORDER BY c.course_code, s.last_name"
                .to_string(),
        }
    }

    pub fn params(&self) -> Vec<Param> {
        match self {
            Query::StudentById { student_id }
            | Query::StudentScores { student_id }
            | Query::TranscriptRecords { student_id }
            | Query::StudentAttendanceStatusCounts { student_id }
            | Query::StudentOutcomeLevels { student_id }
            | Query::StudentDocumentCount { student_id }
            | Query::StudentAttendanceByCourse { student_id } => vec![Param::Int(*student_id)],

            Query::CourseById { course_id }
            | Query::CourseScores { course_id }
            | Query::CourseAttendanceStatusCounts { course_id }
            | Query::CourseOutcomeLevels { course_id }
            | Query::CourseEnrollment { course_id }
            | Query::CourseAttendanceByStudent { course_id } => vec![Param::Int(*course_id)],

            Query::AttendanceStatusCounts { student_id, course_id }
            | Query::StudentCourseOutcomeLevels { student_id, course_id } => {
                vec![Param::Int(*student_id), Param::Int(*course_id)]
            }

            Query::SemesterScores { semester, year }
            | Query::SemesterEnrollment { semester, year }
            | Query::SemesterCourseBreakdown { semester, year } => {
                vec![Param::Text(semester.clone()), Param::Int(*year)]
            }

            Query::TopPerformers { min_courses, limit } => {
                vec![Param::Int(*min_courses), Param::Int(*limit)]
            }
            Query::LowPerformers { threshold, limit } => {
                vec![Param::Real(*threshold), Param::Int(*limit)]
            }
            Query::ActiveAttendanceSummary { limit } => vec![Param::Int(*limit)],
            Query::LowAttendanceStudents { threshold } => vec![Param::Real(*threshold)],
            Query::AttendanceByDate { date } => vec![Param::Text(date.clone())],

            Query::AllScores
            | Query::AllAttendanceStatusCounts
            | Query::StudentStatusCounts
            | Query::CourseCount
            | Query::DocumentCount => Vec::new(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

pub trait RecordStore {
    /// All matching rows; empty when nothing matches
    fn fetch_all(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// First matching row, if any
    fn fetch_one(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        Ok(self.fetch_all(query)?.into_iter().next())
    }
}

/// SQLite-backed store borrowing an open connection
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore { conn }
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

impl RecordStore for SqliteStore<'_> {
    fn fetch_all(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let sql = query.sql();
        let params = query.params();

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let mut out = Row::new();
                for (i, name) in names.iter().enumerate() {
                    out.columns.push((name.clone(), to_json(row.get_ref(i)?)));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(query = query.kind(), rows = rows.len(), "fetched");
        Ok(rows)
    }
}
