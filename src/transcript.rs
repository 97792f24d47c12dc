// Transcript folding - records in (year, semester, code) order become semester blocks
//
// A semester boundary is wherever the "semester year" key changes between
// neighbouring records. Each block carries a credit-weighted GPA.

use crate::error::StoreError;
use crate::grading::grade_point;
use crate::store::Row;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub semester: String,
    pub year: i64,
    pub course_code: String,
    pub course_name: String,
    pub credits: i64,
    pub grade: String,
    pub score: f64,
}

impl TranscriptEntry {
    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(TranscriptEntry {
            semester: row.opt_str("semester")?.unwrap_or_default().to_string(),
            year: row.i64("year")?,
            course_code: row.str("course_code")?.to_string(),
            course_name: row.str("course_name")?.to_string(),
            credits: row.i64("credits")?,
            grade: row.opt_str("grade")?.unwrap_or_default().to_string(),
            score: row.f64("score")?,
        })
    }

    pub fn semester_key(&self) -> String {
        format!("{} {}", self.semester, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterBlock {
    pub key: String,
    pub entries: Vec<TranscriptEntry>,
    pub credits: i64,
    pub points: f64,
}

impl SemesterBlock {
    fn open(key: String) -> Self {
        SemesterBlock {
            key,
            entries: Vec::new(),
            credits: 0,
            points: 0.0,
        }
    }

    fn push(&mut self, entry: TranscriptEntry) {
        self.credits += entry.credits;
        self.points += grade_point(entry.score) * entry.credits as f64;
        self.entries.push(entry);
    }

    /// Credit-weighted grade points; 0 for a semester with no credits
    pub fn gpa(&self) -> f64 {
        if self.credits > 0 {
            self.points / self.credits as f64
        } else {
            0.0
        }
    }
}

/// Group already-sorted entries by adjacency of their semester key.
/// Every block is closed, including the last one.
pub fn group_semesters(entries: impl IntoIterator<Item = TranscriptEntry>) -> Vec<SemesterBlock> {
    let mut blocks: Vec<SemesterBlock> = Vec::new();

    for entry in entries {
        let key = entry.semester_key();
        match blocks.last_mut() {
            Some(current) if current.key == key => current.push(entry),
            _ => {
                let mut block = SemesterBlock::open(key);
                block.push(entry);
                blocks.push(block);
            }
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(semester: &str, year: i64, code: &str, score: f64, credits: i64) -> TranscriptEntry {
        TranscriptEntry {
            semester: semester.to_string(),
            year,
            course_code: code.to_string(),
            course_name: format!("Course {code}"),
            credits,
            grade: "B".to_string(),
            score,
        }
    }

    #[test]
    fn test_two_semesters_weighted_by_credits() {
        let blocks = group_semesters(vec![
            entry("Fall", 2023, "CS101", 90.0, 3),
            entry("Fall", 2023, "CS102", 80.0, 4),
            entry("Spring", 2024, "CS201", 70.0, 3),
        ]);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].key, "Fall 2023");
        assert_eq!(blocks[0].credits, 7);
        assert_eq!(format!("{:.2}", blocks[0].gpa()), "3.43");
        assert_eq!(blocks[1].key, "Spring 2024");
        assert_eq!(format!("{:.2}", blocks[1].gpa()), "2.00");
    }

    #[test]
    fn test_same_semester_name_different_year_splits() {
        let blocks = group_semesters(vec![
            entry("Fall", 2023, "CS101", 90.0, 3),
            entry("Fall", 2024, "CS102", 90.0, 3),
        ]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_zero_credit_semester_still_closed() {
        let blocks = group_semesters(vec![entry("Summer", 2024, "SEM0", 95.0, 0)]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].gpa(), 0.0);
    }

    #[test]
    fn test_no_entries_no_blocks() {
        assert!(group_semesters(Vec::new()).is_empty());
    }

    #[test]
    fn test_entry_from_row() {
        let row = Row::new()
            .with("semester", "Fall")
            .with("year", 2023)
            .with("course_code", "CS101")
            .with("course_name", "Intro")
            .with("credits", 3)
            .with("grade", "A")
            .with("score", 91.5);
        let entry = TranscriptEntry::from_row(&row).unwrap();
        assert_eq!(entry.semester_key(), "Fall 2023");
        assert_eq!(entry.score, 91.5);
    }
}
