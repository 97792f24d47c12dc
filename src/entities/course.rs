// Course entity - codes are stored upper-case and unique

use crate::db::record_event;
use crate::error::{RecordsResult, ValidationError};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_CREDITS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub credits: i64,
    pub description: Option<String>,
}

impl Course {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get("course_id")?,
            code: row.get("course_code")?,
            name: row.get("course_name")?,
            credits: row.get("credits")?,
            description: row.get("description")?,
        })
    }
}

/// Input for a new course (also the CSV import row shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub course_code: String,
    pub course_name: String,
    /// Missing credits fall back to DEFAULT_CREDITS
    #[serde(default)]
    pub credits: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCourse {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.course_code.trim().is_empty() {
            return Err(ValidationError::new("course_code", "required"));
        }
        if self.course_name.trim().is_empty() {
            return Err(ValidationError::new("course_name", "required"));
        }
        if matches!(self.credits, Some(c) if c <= 0) {
            return Err(ValidationError::new("credits", "must be a positive integer"));
        }
        Ok(())
    }

    pub fn normalized_code(&self) -> String {
        self.course_code.trim().to_uppercase()
    }
}

const SELECT_COURSE: &str =
    "SELECT course_id, course_code, course_name, credits, description FROM courses";

pub fn add_course(conn: &Connection, new: &NewCourse) -> RecordsResult<i64> {
    new.validate()?;
    let code = new.normalized_code();

    conn.execute(
        "INSERT INTO courses (course_code, course_name, credits, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            code,
            new.course_name.trim(),
            new.credits.unwrap_or(DEFAULT_CREDITS),
            new.description.as_deref().filter(|d| !d.is_empty()),
        ],
    )?;
    let id = conn.last_insert_rowid();

    record_event(conn, "course_added", "course", id, serde_json::json!({ "code": code }));
    info!(course_id = id, %code, "course added");
    Ok(id)
}

pub fn get_all_courses(conn: &Connection) -> RecordsResult<Vec<Course>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COURSE} ORDER BY course_code"))?;
    let courses = stmt
        .query_map([], Course::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(courses)
}

pub fn get_course(conn: &Connection, id: i64) -> RecordsResult<Option<Course>> {
    let course = conn
        .query_row(
            &format!("{SELECT_COURSE} WHERE course_id = ?1"),
            [id],
            Course::from_row,
        )
        .optional()?;
    Ok(course)
}

/// Returns false when no such course existed. Cascades to its records.
pub fn delete_course(conn: &Connection, id: i64) -> RecordsResult<bool> {
    let changed = conn.execute("DELETE FROM courses WHERE course_id = ?1", [id])?;
    if changed > 0 {
        record_event(conn, "course_deleted", "course", id, serde_json::json!({}));
        info!(course_id = id, "course deleted");
    }
    Ok(changed > 0)
}
