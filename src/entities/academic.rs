// Academic records - one graded course attempt per row

use crate::db::record_event;
use crate::error::{RecordsError, RecordsResult, ValidationError};
use crate::validators::{validate_grade, validate_score, validate_year};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub semester: String,
    pub year: i64,
    pub grade: String,
    pub score: f64,
    pub remarks: Option<String>,
}

/// A student's grade joined with its course, as listed to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentGrade {
    pub record_id: i64,
    pub course_code: String,
    pub course_name: String,
    pub semester: String,
    pub year: i64,
    pub grade: String,
    pub score: f64,
    pub credits: i64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAcademicRecord {
    pub student_id: i64,
    pub course_id: i64,
    pub semester: String,
    pub year: i64,
    pub grade: String,
    pub score: f64,
    pub remarks: Option<String>,
}

impl NewAcademicRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.semester.trim().is_empty() {
            return Err(ValidationError::new("semester", "required"));
        }
        if !validate_year(&self.year.to_string()) {
            return Err(ValidationError::new("year", "expected 1900-2100"));
        }
        if !validate_grade(&self.grade) {
            return Err(ValidationError::new("grade", "expected A+ through F"));
        }
        if !self.score.is_finite() || !(0.0..=100.0).contains(&self.score) {
            return Err(ValidationError::new("score", "expected 0-100"));
        }
        Ok(())
    }
}

// ============================================================================
// UPDATABLE FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcademicRecordField {
    Grade,
    Score,
    Remarks,
    Semester,
    Year,
}

impl AcademicRecordField {
    pub const ALL: [AcademicRecordField; 5] = [
        AcademicRecordField::Grade,
        AcademicRecordField::Score,
        AcademicRecordField::Remarks,
        AcademicRecordField::Semester,
        AcademicRecordField::Year,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            AcademicRecordField::Grade => "grade",
            AcademicRecordField::Score => "score",
            AcademicRecordField::Remarks => "remarks",
            AcademicRecordField::Semester => "semester",
            AcademicRecordField::Year => "year",
        }
    }

    /// Validate and convert to the stored SQL value.
    pub fn normalize(&self, value: &str) -> Result<Value, ValidationError> {
        let value = value.trim();
        match self {
            AcademicRecordField::Grade if validate_grade(value) => {
                Ok(Value::Text(value.to_uppercase()))
            }
            AcademicRecordField::Grade => {
                Err(ValidationError::new("grade", "expected A+ through F"))
            }
            AcademicRecordField::Score if validate_score(value) => value
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| ValidationError::new("score", "expected 0-100")),
            AcademicRecordField::Score => Err(ValidationError::new("score", "expected 0-100")),
            AcademicRecordField::Year if validate_year(value) => value
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| ValidationError::new("year", "expected 1900-2100")),
            AcademicRecordField::Year => Err(ValidationError::new("year", "expected 1900-2100")),
            AcademicRecordField::Semester if value.is_empty() => {
                Err(ValidationError::new("semester", "required"))
            }
            AcademicRecordField::Remarks if value.is_empty() => Ok(Value::Null),
            AcademicRecordField::Semester | AcademicRecordField::Remarks => {
                Ok(Value::Text(value.to_string()))
            }
        }
    }
}

impl FromStr for AcademicRecordField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AcademicRecordField::ALL
            .into_iter()
            .find(|field| field.column() == s.trim())
            .ok_or_else(|| ValidationError::new("field", "allowed: grade, score, remarks, semester, year"))
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

pub fn add_academic_record(conn: &Connection, new: &NewAcademicRecord) -> RecordsResult<i64> {
    new.validate()?;

    conn.execute(
        "INSERT INTO academic_records (student_id, course_id, semester, grade, score, year, remarks)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.student_id,
            new.course_id,
            new.semester.trim(),
            new.grade.trim().to_uppercase(),
            new.score,
            new.year,
            new.remarks.as_deref().filter(|r| !r.is_empty()),
        ],
    )?;
    let id = conn.last_insert_rowid();

    record_event(
        conn,
        "record_added",
        "academic_record",
        id,
        serde_json::json!({
            "student_id": new.student_id,
            "course_id": new.course_id,
            "score": new.score,
        }),
    );
    info!(record_id = id, student_id = new.student_id, "academic record added");
    Ok(id)
}

pub fn get_academic_record(conn: &Connection, id: i64) -> RecordsResult<Option<AcademicRecord>> {
    let record = conn
        .query_row(
            "SELECT record_id, student_id, course_id, semester, year, grade, score, remarks
             FROM academic_records WHERE record_id = ?1",
            [id],
            |row| {
                Ok(AcademicRecord {
                    id: row.get("record_id")?,
                    student_id: row.get("student_id")?,
                    course_id: row.get("course_id")?,
                    semester: row.get::<_, Option<String>>("semester")?.unwrap_or_default(),
                    year: row.get::<_, Option<i64>>("year")?.unwrap_or_default(),
                    grade: row.get::<_, Option<String>>("grade")?.unwrap_or_default(),
                    score: row.get::<_, Option<f64>>("score")?.unwrap_or_default(),
                    remarks: row.get("remarks")?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// All grades for one student, latest term first
pub fn get_student_grades(conn: &Connection, student_id: i64) -> RecordsResult<Vec<StudentGrade>> {
    let mut stmt = conn.prepare(
        "SELECT ar.record_id, c.course_code, c.course_name, ar.semester, ar.year,
                ar.grade, ar.score, c.credits, ar.remarks
         FROM academic_records ar
         JOIN courses c ON ar.course_id = c.course_id
         WHERE ar.student_id = ?1
         ORDER BY ar.year DESC, ar.semester DESC, c.course_code",
    )?;

    let grades = stmt
        .query_map([student_id], |row| {
            Ok(StudentGrade {
                record_id: row.get("record_id")?,
                course_code: row.get("course_code")?,
                course_name: row.get("course_name")?,
                semester: row.get::<_, Option<String>>("semester")?.unwrap_or_default(),
                year: row.get::<_, Option<i64>>("year")?.unwrap_or_default(),
                grade: row.get::<_, Option<String>>("grade")?.unwrap_or_default(),
                score: row.get::<_, Option<f64>>("score")?.unwrap_or_default(),
                credits: row.get("credits")?,
                remarks: row.get("remarks")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(grades)
}

pub fn update_academic_record(
    conn: &Connection,
    id: i64,
    field: AcademicRecordField,
    value: &str,
) -> RecordsResult<()> {
    let stored = field.normalize(value)?;

    let sql = format!(
        "UPDATE academic_records SET {} = ?1 WHERE record_id = ?2",
        field.column()
    );
    let changed = conn.execute(&sql, params![stored, id])?;
    if changed == 0 {
        return Err(RecordsError::NotFound { entity: "Academic record", id });
    }

    record_event(
        conn,
        "record_updated",
        "academic_record",
        id,
        serde_json::json!({ "field": field.column(), "value": value.trim() }),
    );
    info!(record_id = id, field = field.column(), "academic record updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{course, student, NewCourse, NewStudent};

    fn seeded_db() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let sid = student::add_student(
            &conn,
            &NewStudent {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
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
                credits: Some(4),
                description: None,
            },
        )
        .unwrap();
        (conn, sid, cid)
    }

    fn record(student_id: i64, course_id: i64, semester: &str, year: i64, score: f64) -> NewAcademicRecord {
        NewAcademicRecord {
            student_id,
            course_id,
            semester: semester.to_string(),
            year,
            grade: "b".to_string(),
            score,
            remarks: None,
        }
    }

    #[test]
    fn test_add_record_and_list_grades() {
        let (conn, sid, cid) = seeded_db();
        add_academic_record(&conn, &record(sid, cid, "Fall", 2023, 85.0)).unwrap();
        add_academic_record(&conn, &record(sid, cid, "Spring", 2024, 91.5)).unwrap();

        let grades = get_student_grades(&conn, sid).unwrap();
        assert_eq!(grades.len(), 2);
        // Latest year first
        assert_eq!(grades[0].year, 2024);
        assert_eq!(grades[0].grade, "B");
        assert_eq!(grades[0].credits, 4);
        assert_eq!(grades[1].semester, "Fall");
    }

    #[test]
    fn test_record_validation() {
        let (conn, sid, cid) = seeded_db();

        let err = add_academic_record(&conn, &record(sid, cid, "Fall", 2023, 100.5)).unwrap_err();
        assert!(matches!(err, RecordsError::Validation(ref v) if v.field == "score"));

        let err = add_academic_record(&conn, &record(sid, cid, "Fall", 1850, 80.0)).unwrap_err();
        assert!(matches!(err, RecordsError::Validation(ref v) if v.field == "year"));
    }

    #[test]
    fn test_record_for_unknown_student_violates_foreign_key() {
        let (conn, _, cid) = seeded_db();
        let err = add_academic_record(&conn, &record(999, cid, "Fall", 2023, 80.0)).unwrap_err();
        assert!(matches!(err, RecordsError::Constraint(_)));
    }

    #[test]
    fn test_update_record_fields() {
        let (conn, sid, cid) = seeded_db();
        let id = add_academic_record(&conn, &record(sid, cid, "Fall", 2023, 85.0)).unwrap();

        update_academic_record(&conn, id, AcademicRecordField::Score, "92").unwrap();
        update_academic_record(&conn, id, AcademicRecordField::Grade, "a-").unwrap();
        update_academic_record(&conn, id, AcademicRecordField::Year, "2024").unwrap();

        let updated = get_academic_record(&conn, id).unwrap().unwrap();
        assert_eq!(updated.score, 92.0);
        assert_eq!(updated.grade, "A-");
        assert_eq!(updated.year, 2024);

        assert!(update_academic_record(&conn, id, AcademicRecordField::Score, "abc").is_err());
        assert!("student_id".parse::<AcademicRecordField>().is_err());
        assert!(matches!(
            update_academic_record(&conn, 999, AcademicRecordField::Remarks, "x"),
            Err(RecordsError::NotFound { .. })
        ));
    }
}
