// Student entity - the root every other record hangs off
// Deleting a student cascades to grades, attendance, documents and outcomes.

use crate::db::record_event;
use crate::error::{RecordsError, RecordsResult, ValidationError};
use crate::validators::{validate_date, validate_email, validate_phone};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

// ============================================================================
// STUDENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 3] = [
        StudentStatus::Active,
        StudentStatus::Inactive,
        StudentStatus::Graduated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Graduated => "graduated",
        }
    }

    /// Case-insensitive parse
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(StudentStatus::Active),
            "inactive" => Some(StudentStatus::Inactive),
            "graduated" => Some(StudentStatus::Graduated),
            _ => None,
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STUDENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub enrollment_date: String,
    pub status: StudentStatus,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get("status")?;
        Ok(Student {
            id: row.get("student_id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            date_of_birth: row.get("date_of_birth")?,
            enrollment_date: row.get("enrollment_date")?,
            // CHECK constraint keeps this in range
            status: StudentStatus::parse(&status).unwrap_or(StudentStatus::Active),
        })
    }
}

/// Input for a new student (also the CSV import row shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
}

impl NewStudent {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::new("first_name", "required"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::new("last_name", "required"));
        }
        if !validate_email(&self.email) {
            return Err(ValidationError::new("email", "invalid email format"));
        }
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.is_empty()) {
            if !validate_phone(phone) {
                return Err(ValidationError::new("phone", "invalid phone number"));
            }
        }
        if let Some(dob) = self.date_of_birth.as_deref().filter(|d| !d.is_empty()) {
            if !validate_date(dob) {
                return Err(ValidationError::new("date_of_birth", "expected YYYY-MM-DD"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// UPDATABLE FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentField {
    FirstName,
    LastName,
    Email,
    Phone,
    Status,
}

impl StudentField {
    pub const ALL: [StudentField; 5] = [
        StudentField::FirstName,
        StudentField::LastName,
        StudentField::Email,
        StudentField::Phone,
        StudentField::Status,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            StudentField::FirstName => "first_name",
            StudentField::LastName => "last_name",
            StudentField::Email => "email",
            StudentField::Phone => "phone",
            StudentField::Status => "status",
        }
    }

    /// Check the new value and return it in its stored form.
    pub fn normalize(&self, value: &str) -> Result<String, ValidationError> {
        let value = value.trim();
        match self {
            StudentField::FirstName | StudentField::LastName if value.is_empty() => {
                Err(ValidationError::new(self.column(), "required"))
            }
            StudentField::Email if !validate_email(value) => {
                Err(ValidationError::new("email", "invalid email format"))
            }
            StudentField::Phone if !value.is_empty() && !validate_phone(value) => {
                Err(ValidationError::new("phone", "invalid phone number"))
            }
            StudentField::Status => StudentStatus::parse(value)
                .map(|s| s.as_str().to_string())
                .ok_or_else(|| {
                    ValidationError::new("status", "expected active, inactive or graduated")
                }),
            _ => Ok(value.to_string()),
        }
    }
}

impl FromStr for StudentField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudentField::ALL
            .into_iter()
            .find(|field| field.column() == s.trim())
            .ok_or_else(|| {
                let allowed: Vec<&str> = StudentField::ALL.iter().map(|f| f.column()).collect();
                ValidationError::new("field", format!("allowed: {}", allowed.join(", ")))
            })
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const SELECT_STUDENT: &str = "SELECT student_id, first_name, last_name, email, phone,
        date_of_birth, enrollment_date, status
     FROM students";

pub fn add_student(conn: &Connection, new: &NewStudent) -> RecordsResult<i64> {
    new.validate()?;

    conn.execute(
        "INSERT INTO students (first_name, last_name, email, phone, date_of_birth)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.first_name.trim(),
            new.last_name.trim(),
            new.email.trim(),
            new.phone.as_deref().filter(|p| !p.is_empty()),
            new.date_of_birth.as_deref().filter(|d| !d.is_empty()),
        ],
    )?;
    let id = conn.last_insert_rowid();

    record_event(
        conn,
        "student_added",
        "student",
        id,
        serde_json::json!({ "email": new.email }),
    );
    info!(student_id = id, "student added");
    Ok(id)
}

pub fn get_all_students(conn: &Connection) -> RecordsResult<Vec<Student>> {
    let mut stmt = conn.prepare(&format!("{SELECT_STUDENT} ORDER BY student_id"))?;
    let students = stmt
        .query_map([], Student::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

pub fn get_student(conn: &Connection, id: i64) -> RecordsResult<Option<Student>> {
    let student = conn
        .query_row(
            &format!("{SELECT_STUDENT} WHERE student_id = ?1"),
            [id],
            Student::from_row,
        )
        .optional()?;
    Ok(student)
}

pub fn update_student(
    conn: &Connection,
    id: i64,
    field: StudentField,
    value: &str,
) -> RecordsResult<()> {
    let value = field.normalize(value)?;
    let stored: Option<&str> = if field == StudentField::Phone && value.is_empty() {
        None
    } else {
        Some(value.as_str())
    };

    // Column name comes from the closed enum, never from input
    let sql = format!("UPDATE students SET {} = ?1 WHERE student_id = ?2", field.column());
    let changed = conn.execute(&sql, params![stored, id])?;
    if changed == 0 {
        return Err(RecordsError::NotFound { entity: "Student", id });
    }

    record_event(
        conn,
        "student_updated",
        "student",
        id,
        serde_json::json!({ "field": field.column(), "value": value }),
    );
    info!(student_id = id, field = field.column(), "student updated");
    Ok(())
}

/// Returns false when no such student existed.
pub fn delete_student(conn: &Connection, id: i64) -> RecordsResult<bool> {
    let changed = conn.execute("DELETE FROM students WHERE student_id = ?1", [id])?;
    if changed > 0 {
        record_event(conn, "student_deleted", "student", id, serde_json::json!({}));
        info!(student_id = id, "student deleted");
    }
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_rows, get_events_for_entity, setup_database, Table};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn new_student(email: &str) -> NewStudent {
        NewStudent {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: email.to_string(),
            phone: Some("5551234567".to_string()),
            date_of_birth: Some("1906-12-09".to_string()),
        }
    }

    #[test]
    fn test_add_and_get_student() {
        let conn = memory_db();
        let id = add_student(&conn, &new_student("grace@navy.mil")).unwrap();

        let student = get_student(&conn, id).unwrap().unwrap();
        assert_eq!(student.full_name(), "Grace Hopper");
        assert_eq!(student.status, StudentStatus::Active);
        assert!(!student.enrollment_date.is_empty());

        assert!(get_student(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_constraint_error() {
        let conn = memory_db();
        add_student(&conn, &new_student("grace@navy.mil")).unwrap();

        let err = add_student(&conn, &new_student("grace@navy.mil")).unwrap_err();
        assert!(matches!(err, RecordsError::Constraint(_)));
    }

    #[test]
    fn test_invalid_student_is_rejected_before_insert() {
        let conn = memory_db();
        let mut bad = new_student("grace@navy.mil");
        bad.date_of_birth = Some("09/12/1906".to_string());

        let err = add_student(&conn, &bad).unwrap_err();
        assert!(matches!(err, RecordsError::Validation(ref v) if v.field == "date_of_birth"));
        assert_eq!(count_rows(&conn, Table::Students).unwrap(), 0);
    }

    #[test]
    fn test_field_parsing_is_closed() {
        assert_eq!("email".parse::<StudentField>().unwrap(), StudentField::Email);
        assert_eq!(" status ".parse::<StudentField>().unwrap(), StudentField::Status);

        let err = "student_id".parse::<StudentField>().unwrap_err();
        assert!(err.message.contains("first_name"));
        assert!("email; DROP TABLE students".parse::<StudentField>().is_err());
    }

    #[test]
    fn test_update_student_fields() {
        let conn = memory_db();
        let id = add_student(&conn, &new_student("grace@navy.mil")).unwrap();

        update_student(&conn, id, StudentField::Status, "Graduated").unwrap();
        update_student(&conn, id, StudentField::Phone, "").unwrap();

        let student = get_student(&conn, id).unwrap().unwrap();
        assert_eq!(student.status, StudentStatus::Graduated);
        assert_eq!(student.phone, None);

        let err = update_student(&conn, id, StudentField::Status, "suspended").unwrap_err();
        assert!(matches!(err, RecordsError::Validation(_)));

        let err = update_student(&conn, 999, StudentField::FirstName, "X").unwrap_err();
        assert!(matches!(err, RecordsError::NotFound { id: 999, .. }));
    }

    #[test]
    fn test_delete_student_logs_events() {
        let conn = memory_db();
        let id = add_student(&conn, &new_student("grace@navy.mil")).unwrap();

        assert!(delete_student(&conn, id).unwrap());
        assert!(!delete_student(&conn, id).unwrap());

        let events = get_events_for_entity(&conn, "student", &id.to_string()).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"student_added"));
        assert!(types.contains(&"student_deleted"));
    }
}
