// Learning outcomes - per-course achievement assessments

use crate::db::record_event;
use crate::error::{RecordsError, RecordsResult, ValidationError};
use crate::validators::validate_date;
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

// ============================================================================
// ACHIEVEMENT LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementLevel {
    NotMet,
    PartiallyMet,
    Met,
    Exceeded,
}

impl AchievementLevel {
    /// Highest first, the order reports list levels in
    pub const ALL: [AchievementLevel; 4] = [
        AchievementLevel::Exceeded,
        AchievementLevel::Met,
        AchievementLevel::PartiallyMet,
        AchievementLevel::NotMet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementLevel::NotMet => "not_met",
            AchievementLevel::PartiallyMet => "partially_met",
            AchievementLevel::Met => "met",
            AchievementLevel::Exceeded => "exceeded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_lowercase();
        AchievementLevel::ALL.into_iter().find(|l| l.as_str() == lower)
    }

    /// Scoring weight used by achievement summaries
    pub fn weight(&self) -> u32 {
        match self {
            AchievementLevel::Exceeded => 4,
            AchievementLevel::Met => 3,
            AchievementLevel::PartiallyMet => 2,
            AchievementLevel::NotMet => 1,
        }
    }

    /// Menu choice 1-4 (not met .. exceeded)
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(AchievementLevel::NotMet),
            "2" => Some(AchievementLevel::PartiallyMet),
            "3" => Some(AchievementLevel::Met),
            "4" => Some(AchievementLevel::Exceeded),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AchievementLevel::Met | AchievementLevel::Exceeded)
    }
}

impl fmt::Display for AchievementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub description: String,
    pub level: AchievementLevel,
    pub assessment_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLearningOutcome {
    pub student_id: i64,
    pub course_id: i64,
    pub description: String,
    pub level: AchievementLevel,
    pub assessment_date: Option<String>,
    pub notes: Option<String>,
}

impl NewLearningOutcome {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::new("outcome_description", "required"));
        }
        if let Some(date) = &self.assessment_date {
            if !validate_date(date) {
                return Err(ValidationError::new("assessment_date", "expected YYYY-MM-DD"));
            }
        }
        Ok(())
    }
}

/// One student's outcome joined with its course
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentOutcomeView {
    pub outcome_id: i64,
    pub course_code: String,
    pub course_name: String,
    pub description: String,
    pub level: String,
    pub assessment_date: Option<String>,
    pub notes: Option<String>,
}

/// One course's outcome joined with its student
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOutcomeView {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub description: String,
    pub level: String,
    pub assessment_date: Option<String>,
}

// ============================================================================
// UPDATABLE FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeField {
    Description,
    AchievementLevel,
    AssessmentDate,
    Notes,
}

impl OutcomeField {
    pub const ALL: [OutcomeField; 4] = [
        OutcomeField::Description,
        OutcomeField::AchievementLevel,
        OutcomeField::AssessmentDate,
        OutcomeField::Notes,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            OutcomeField::Description => "outcome_description",
            OutcomeField::AchievementLevel => "achievement_level",
            OutcomeField::AssessmentDate => "assessment_date",
            OutcomeField::Notes => "notes",
        }
    }

    pub fn normalize(&self, value: &str) -> Result<Value, ValidationError> {
        let value = value.trim();
        match self {
            OutcomeField::Description if value.is_empty() => {
                Err(ValidationError::new("outcome_description", "required"))
            }
            OutcomeField::Description => Ok(Value::Text(value.to_string())),
            OutcomeField::AchievementLevel => AchievementLevel::parse(value)
                .map(|l| Value::Text(l.as_str().to_string()))
                .ok_or_else(|| {
                    ValidationError::new(
                        "achievement_level",
                        "expected not_met, partially_met, met or exceeded",
                    )
                }),
            OutcomeField::AssessmentDate | OutcomeField::Notes if value.is_empty() => {
                Ok(Value::Null)
            }
            OutcomeField::AssessmentDate if !validate_date(value) => {
                Err(ValidationError::new("assessment_date", "expected YYYY-MM-DD"))
            }
            OutcomeField::AssessmentDate | OutcomeField::Notes => {
                Ok(Value::Text(value.to_string()))
            }
        }
    }
}

impl FromStr for OutcomeField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutcomeField::ALL
            .into_iter()
            .find(|field| field.column() == s.trim())
            .ok_or_else(|| {
                ValidationError::new(
                    "field",
                    "allowed: outcome_description, achievement_level, assessment_date, notes",
                )
            })
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

pub fn add_learning_outcome(conn: &Connection, new: &NewLearningOutcome) -> RecordsResult<i64> {
    new.validate()?;

    conn.execute(
        "INSERT INTO learning_outcomes
            (student_id, course_id, outcome_description, achievement_level, assessment_date, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.student_id,
            new.course_id,
            new.description.trim(),
            new.level.as_str(),
            new.assessment_date,
            new.notes.as_deref().filter(|n| !n.is_empty()),
        ],
    )?;
    let id = conn.last_insert_rowid();

    record_event(
        conn,
        "outcome_added",
        "learning_outcome",
        id,
        serde_json::json!({
            "student_id": new.student_id,
            "course_id": new.course_id,
            "level": new.level.as_str(),
        }),
    );
    info!(outcome_id = id, student_id = new.student_id, "learning outcome added");
    Ok(id)
}

/// A student's outcomes, most recent assessment first
pub fn get_student_outcomes(
    conn: &Connection,
    student_id: i64,
) -> RecordsResult<Vec<StudentOutcomeView>> {
    let mut stmt = conn.prepare(
        "SELECT lo.outcome_id, c.course_code, c.course_name, lo.outcome_description,
                lo.achievement_level, lo.assessment_date, lo.notes
         FROM learning_outcomes lo
         JOIN courses c ON lo.course_id = c.course_id
         WHERE lo.student_id = ?1
         ORDER BY lo.assessment_date DESC, lo.outcome_id DESC",
    )?;

    let rows = stmt
        .query_map([student_id], |row| {
            Ok(StudentOutcomeView {
                outcome_id: row.get("outcome_id")?,
                course_code: row.get("course_code")?,
                course_name: row.get("course_name")?,
                description: row.get("outcome_description")?,
                level: row.get("achievement_level")?,
                assessment_date: row.get("assessment_date")?,
                notes: row.get("notes")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Every student's outcomes in a course, grouped by surname
pub fn get_course_outcomes(
    conn: &Connection,
    course_id: i64,
) -> RecordsResult<Vec<CourseOutcomeView>> {
    let mut stmt = conn.prepare(
        "SELECT s.student_id, s.first_name, s.last_name, lo.outcome_description,
                lo.achievement_level, lo.assessment_date
         FROM learning_outcomes lo
         JOIN students s ON lo.student_id = s.student_id
         WHERE lo.course_id = ?1
         ORDER BY s.last_name, lo.assessment_date DESC",
    )?;

    let rows = stmt
        .query_map([course_id], |row| {
            Ok(CourseOutcomeView {
                student_id: row.get("student_id")?,
                first_name: row.get("first_name")?,
                last_name: row.get("last_name")?,
                description: row.get("outcome_description")?,
                level: row.get("achievement_level")?,
                assessment_date: row.get("assessment_date")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn update_learning_outcome(
    conn: &Connection,
    id: i64,
    field: OutcomeField,
    value: &str,
) -> RecordsResult<()> {
    let stored = field.normalize(value)?;

    let sql = format!(
        "UPDATE learning_outcomes SET {} = ?1 WHERE outcome_id = ?2",
        field.column()
    );
    let changed = conn.execute(&sql, params![stored, id])?;
    if changed == 0 {
        return Err(RecordsError::NotFound { entity: "Learning outcome", id });
    }

    record_event(
        conn,
        "outcome_updated",
        "learning_outcome",
        id,
        serde_json::json!({ "field": field.column(), "value": value.trim() }),
    );
    info!(outcome_id = id, field = field.column(), "learning outcome updated");
    Ok(())
}

pub fn delete_learning_outcome(conn: &Connection, id: i64) -> RecordsResult<bool> {
    let changed = conn.execute("DELETE FROM learning_outcomes WHERE outcome_id = ?1", [id])?;
    if changed > 0 {
        record_event(conn, "outcome_deleted", "learning_outcome", id, serde_json::json!({}));
        info!(outcome_id = id, "learning outcome deleted");
    }
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{course, student, NewCourse, NewStudent};
    use rstest::rstest;

    fn seeded_db() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let sid = student::add_student(
            &conn,
            &NewStudent {
                first_name: "Edsger".to_string(),
                last_name: "Dijkstra".to_string(),
                email: "ewd@example.com".to_string(),
                phone: None,
                date_of_birth: None,
            },
        )
        .unwrap();
        let cid = course::add_course(
            &conn,
            &NewCourse {
                course_code: "CS301".to_string(),
                course_name: "Algorithms".to_string(),
                credits: None,
                description: None,
            },
        )
        .unwrap();
        (conn, sid, cid)
    }

    fn outcome(sid: i64, cid: i64, level: AchievementLevel, date: &str) -> NewLearningOutcome {
        NewLearningOutcome {
            student_id: sid,
            course_id: cid,
            description: "Shortest paths".to_string(),
            level,
            assessment_date: Some(date.to_string()),
            notes: None,
        }
    }

    #[rstest]
    #[case(AchievementLevel::Exceeded, 4)]
    #[case(AchievementLevel::Met, 3)]
    #[case(AchievementLevel::PartiallyMet, 2)]
    #[case(AchievementLevel::NotMet, 1)]
    fn test_level_weights(#[case] level: AchievementLevel, #[case] weight: u32) {
        assert_eq!(level.weight(), weight);
        assert_eq!(AchievementLevel::parse(level.as_str()), Some(level));
    }

    #[test]
    fn test_add_and_list_outcomes() {
        let (conn, sid, cid) = seeded_db();
        add_learning_outcome(&conn, &outcome(sid, cid, AchievementLevel::Met, "2024-03-01")).unwrap();
        add_learning_outcome(&conn, &outcome(sid, cid, AchievementLevel::Exceeded, "2024-05-01"))
            .unwrap();

        let mine = get_student_outcomes(&conn, sid).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].level, "exceeded");
        assert_eq!(mine[0].course_code, "CS301");

        let course_view = get_course_outcomes(&conn, cid).unwrap();
        assert_eq!(course_view.len(), 2);
        assert_eq!(course_view[0].last_name, "Dijkstra");
    }

    #[test]
    fn test_update_and_delete_outcome() {
        let (conn, sid, cid) = seeded_db();
        let id = add_learning_outcome(&conn, &outcome(sid, cid, AchievementLevel::NotMet, "2024-03-01"))
            .unwrap();

        update_learning_outcome(&conn, id, OutcomeField::AchievementLevel, "MET").unwrap();
        assert_eq!(get_student_outcomes(&conn, sid).unwrap()[0].level, "met");

        assert!(update_learning_outcome(&conn, id, OutcomeField::AchievementLevel, "great").is_err());
        assert!(update_learning_outcome(&conn, id, OutcomeField::AssessmentDate, "March").is_err());
        assert!("level".parse::<OutcomeField>().is_err());
        assert_eq!("notes".parse::<OutcomeField>().unwrap(), OutcomeField::Notes);

        assert!(delete_learning_outcome(&conn, id).unwrap());
        assert!(matches!(
            update_learning_outcome(&conn, id, OutcomeField::Notes, "x"),
            Err(RecordsError::NotFound { .. })
        ));
    }
}
