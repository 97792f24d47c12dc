// Interactive shell - numbered menus over every records and report operation
//
// Input arrives through a `Prompt`: rustyline at a terminal, a scripted list
// of lines in tests. End of input (Ctrl-C, Ctrl-D or an exhausted script)
// leaves the shell cleanly. Failed operations print a message and the loop
// carries on.

use crate::config::ReportConfig;
use crate::entities::attendance::{self, today};
use crate::entities::{
    academic, course, document, outcome, student, AcademicRecordField, AchievementLevel,
    AttendanceStatus, DocumentType, MarkOutcome, NewAcademicRecord, NewCourse, NewDocument,
    NewLearningOutcome, NewStudent, OutcomeField, StudentField,
};
use crate::error::{RecordsError, RecordsResult, ReportResult};
use crate::output::render_grid;
use crate::reports::ReportEngine;
use crate::store::SqliteStore;
use crate::validators::{parse_id, validate_date};
use rusqlite::Connection;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::VecDeque;
use std::io::{self, Write};
use tracing::{debug, warn};

// ============================================================================
// INPUT
// ============================================================================

/// Line source for the shell
pub trait Prompt {
    /// Next line of input, `None` once input has ended.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Terminal input with history
pub struct LinePrompt {
    editor: DefaultEditor,
}

impl LinePrompt {
    pub fn new() -> Result<Self, ReadlineError> {
        Ok(LinePrompt {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Prompt for LinePrompt {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    // History is a convenience; a failed entry is not worth stopping for
                    if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                        debug!(error = %e, "history entry dropped");
                    }
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

/// Pre-recorded answers, consumed in order
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    lines: VecDeque<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompt {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

// ============================================================================
// MENUS
// ============================================================================

const MAIN_MENU: [&str; 7] = [
    "Student Management",
    "Course Management",
    "Academic Records",
    "Attendance Management",
    "Document Management",
    "Learning Outcomes",
    "Reports & Analytics",
];

const STUDENT_MENU: [&str; 5] = [
    "Add Student",
    "View All Students",
    "View Student Details",
    "Update Student",
    "Delete Student",
];

const COURSE_MENU: [&str; 4] = [
    "Add Course",
    "View All Courses",
    "View Course Details",
    "Delete Course",
];

const ACADEMIC_MENU: [&str; 5] = [
    "Add Academic Record",
    "View Student Grades",
    "Calculate GPA",
    "Generate Transcript",
    "Update Academic Record",
];

const ATTENDANCE_MENU: [&str; 7] = [
    "Mark Attendance",
    "Mark Bulk Attendance",
    "View Student Attendance",
    "Attendance Percentage",
    "Course Attendance Report",
    "Attendance by Date",
    "Low Attendance Alert",
];

const DOCUMENT_MENU: [&str; 3] = ["Add Document", "View Student Documents", "Delete Document"];

const OUTCOME_MENU: [&str; 8] = [
    "Add Learning Outcome",
    "View Student Outcomes",
    "View Course Outcomes",
    "Update Learning Outcome",
    "Delete Learning Outcome",
    "Student Achievement Summary",
    "Course Achievement Summary",
    "Compare Student Performance",
];

const REPORT_MENU: [&str; 9] = [
    "Student Report",
    "Course Report",
    "Course Statistics",
    "Overall Statistics",
    "Top Performers",
    "Low Performers",
    "Attendance Summary",
    "Semester Report",
    "Student Attendance Summary",
];

/// Why the menu loop stopped early
enum Stop {
    Ended,
    Io(io::Error),
}

impl From<io::Error> for Stop {
    fn from(err: io::Error) -> Self {
        Stop::Io(err)
    }
}

type Step<T = ()> = Result<T, Stop>;

// ============================================================================
// SHELL
// ============================================================================

pub struct Shell<'c, P, W> {
    conn: &'c Connection,
    reports: ReportConfig,
    prompt: P,
    out: W,
}

impl<'c, P: Prompt, W: Write> Shell<'c, P, W> {
    pub fn new(conn: &'c Connection, reports: ReportConfig, prompt: P, out: W) -> Self {
        Shell {
            conn,
            reports,
            prompt,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until the operator exits or input ends.
    pub fn run(&mut self) -> io::Result<()> {
        match self.main_menu() {
            Ok(()) | Err(Stop::Ended) => {
                writeln!(self.out, "\nGoodbye!")?;
                self.out.flush()
            }
            Err(Stop::Io(e)) => Err(e),
        }
    }

    fn main_menu(&mut self) -> Step {
        loop {
            self.menu("LEARNTRACK - MAIN MENU", &MAIN_MENU, "Exit")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.student_menu()?,
                "2" => self.course_menu()?,
                "3" => self.academic_menu()?,
                "4" => self.attendance_menu()?,
                "5" => self.document_menu()?,
                "6" => self.outcome_menu()?,
                "7" => self.report_menu()?,
                "0" => return Ok(()),
                _ => self.say("Invalid choice! Please try again.")?,
            }
        }
    }

    fn student_menu(&mut self) -> Step {
        loop {
            self.menu("STUDENT MANAGEMENT", &STUDENT_MENU, "Back to Main Menu")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.add_student()?,
                "2" => self.list_students()?,
                "3" => self.show_student()?,
                "4" => self.update_student()?,
                "5" => self.delete_student()?,
                "0" => return Ok(()),
                _ => self.say("Invalid choice!")?,
            }
        }
    }

    fn course_menu(&mut self) -> Step {
        loop {
            self.menu("COURSE MANAGEMENT", &COURSE_MENU, "Back to Main Menu")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.add_course()?,
                "2" => self.list_courses()?,
                "3" => self.show_course()?,
                "4" => self.delete_course()?,
                "0" => return Ok(()),
                _ => self.say("Invalid choice!")?,
            }
        }
    }

    fn academic_menu(&mut self) -> Step {
        loop {
            self.menu("ACADEMIC RECORDS", &ACADEMIC_MENU, "Back to Main Menu")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.add_record()?,
                "2" => self.list_grades()?,
                "3" => {
                    if let Some(id) = self.ask_id("Enter student ID: ", "student ID")? {
                        let result = self.engine().render_gpa(id);
                        self.report(result)?;
                    }
                }
                "4" => {
                    if let Some(id) = self.ask_id("Enter student ID: ", "student ID")? {
                        let result = self.engine().render_transcript(id);
                        self.report(result)?;
                    }
                }
                "5" => self.update_record()?,
                "0" => return Ok(()),
                _ => self.say("Invalid choice!")?,
            }
        }
    }

    fn attendance_menu(&mut self) -> Step {
        loop {
            self.menu("ATTENDANCE MANAGEMENT", &ATTENDANCE_MENU, "Back to Main Menu")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.mark_attendance()?,
                "2" => self.mark_bulk_attendance()?,
                "3" => self.list_attendance()?,
                "4" => {
                    let Some(student_id) = self.ask_id("Enter student ID: ", "student ID")? else {
                        continue;
                    };
                    let Some(course_id) = self.ask_id("Enter course ID: ", "course ID")? else {
                        continue;
                    };
                    let result = self
                        .engine()
                        .render_attendance_percentage(student_id, course_id);
                    self.report(result)?;
                }
                "5" => {
                    if let Some(id) = self.ask_id("Enter course ID: ", "course ID")? {
                        let result = self.engine().render_course_attendance(id);
                        self.report(result)?;
                    }
                }
                "6" => {
                    let date = self.ask("Enter date (YYYY-MM-DD): ")?;
                    if validate_date(&date) {
                        let result = self.engine().render_attendance_by_date(&date);
                        self.report(result)?;
                    } else {
                        self.say("Invalid date format! Use YYYY-MM-DD")?;
                    }
                }
                "7" => {
                    let result = self.engine().render_low_attendance();
                    self.report(result)?;
                }
                "0" => return Ok(()),
                _ => self.say("Invalid choice!")?,
            }
        }
    }

    fn document_menu(&mut self) -> Step {
        loop {
            self.menu("DOCUMENT MANAGEMENT", &DOCUMENT_MENU, "Back to Main Menu")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.add_document()?,
                "2" => self.list_documents()?,
                "3" => self.delete_document()?,
                "0" => return Ok(()),
                _ => self.say("Invalid choice!")?,
            }
        }
    }

    fn outcome_menu(&mut self) -> Step {
        loop {
            self.menu("LEARNING OUTCOMES", &OUTCOME_MENU, "Back to Main Menu")?;
            match self.ask("Enter your choice: ")?.as_str() {
                "1" => self.add_outcome()?,
                "2" => self.list_student_outcomes()?,
                "3" => self.list_course_outcomes()?,
                "4" => self.update_outcome()?,
                "5" => self.delete_outcome()?,
                "6" => {
                    if let Some(id) = self.ask_id("Enter student ID: ", "student ID")? {
                        let result = self.engine().render_achievement_summary(id);
                        self.report(result)?;
                    }
                }
                "7" => {
                    if let Some(id) = self.ask_id("Enter course ID: ", "course ID")? {
                        let result = self.engine().render_course_achievement(id);
                        self.report(result)?;
                    }
                }
                "8" => {
                    let Some(student_id) = self.ask_id("Enter student ID: ", "student ID")? else {
                        continue;
                    };
                    let Some(course_id) = self.ask_id("Enter course ID: ", "course ID")? else {
                        continue;
                    };
                    let result = self.engine().render_comparison(student_id, course_id);
                    self.report(result)?;
                }
                "0" => return Ok(()),
                _ => self.say("Invalid choice!")?,
            }
        }
    }

    fn report_menu(&mut self) -> Step {
        loop {
            self.menu("REPORTS & ANALYTICS", &REPORT_MENU, "Back to Main Menu")?;
            let choice = self.ask("Enter your choice: ")?;
            let result = match choice.as_str() {
                "1" => match self.ask_id("Enter student ID: ", "student ID")? {
                    Some(id) => self.engine().render_student_report(id),
                    None => continue,
                },
                "2" => match self.ask_id("Enter course ID: ", "course ID")? {
                    Some(id) => self.engine().render_course_report(id),
                    None => continue,
                },
                "3" => match self.ask_id("Enter course ID: ", "course ID")? {
                    Some(id) => self.engine().render_course_statistics(id),
                    None => continue,
                },
                "4" => self.engine().render_overall_statistics(),
                "5" => self.engine().render_top_performers(),
                "6" => self.engine().render_low_performers(),
                "7" => self.engine().render_attendance_summary(),
                "8" => {
                    let semester = self.ask("Enter semester (e.g., Fall, Spring): ")?;
                    let Some(year) = self.ask_year()? else {
                        continue;
                    };
                    self.engine().render_semester_report(&semester, year)
                }
                "9" => match self.ask_id("Enter student ID: ", "student ID")? {
                    Some(id) => self.engine().render_student_attendance(id),
                    None => continue,
                },
                "0" => return Ok(()),
                _ => {
                    self.say("Invalid choice!")?;
                    continue;
                }
            };
            self.report(result)?;
        }
    }

    // Students
    // ------------------------------------------------------------------------

    fn add_student(&mut self) -> Step {
        self.heading("ADD NEW STUDENT")?;
        let new = NewStudent {
            first_name: self.ask("First Name: ")?,
            last_name: self.ask("Last Name: ")?,
            email: self.ask("Email: ")?,
            phone: self.ask_optional("Phone (optional): ")?,
            date_of_birth: self.ask_optional("Date of Birth (YYYY-MM-DD, optional): ")?,
        };
        let result = student::add_student(self.conn, &new);
        self.records(result, |id| format!("Student added successfully! ID: {id}"))
    }

    fn list_students(&mut self) -> Step {
        let students = match student::get_all_students(self.conn) {
            Ok(students) => students,
            Err(e) => return self.failed(e),
        };
        if students.is_empty() {
            return self.say("No students found.");
        }
        let rows: Vec<Vec<String>> = students
            .iter()
            .map(|s| {
                vec![
                    s.id.to_string(),
                    s.full_name(),
                    s.email.clone(),
                    s.phone.clone().unwrap_or_default(),
                    s.enrollment_date.clone(),
                    s.status.to_string(),
                ]
            })
            .collect();
        let grid = render_grid(&["ID", "Name", "Email", "Phone", "Enrolled", "Status"], &rows);
        self.say(&grid)
    }

    fn show_student(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter student ID: ", "student ID")? else {
            return Ok(());
        };
        match student::get_student(self.conn, id) {
            Ok(Some(s)) => {
                let rows = vec![
                    vec!["ID".to_string(), s.id.to_string()],
                    vec!["Name".to_string(), s.full_name()],
                    vec!["Email".to_string(), s.email.clone()],
                    vec!["Phone".to_string(), s.phone.clone().unwrap_or_default()],
                    vec![
                        "Date of Birth".to_string(),
                        s.date_of_birth.clone().unwrap_or_default(),
                    ],
                    vec!["Enrolled".to_string(), s.enrollment_date.clone()],
                    vec!["Status".to_string(), s.status.to_string()],
                ];
                let grid = render_grid(&["Field", "Value"], &rows);
                self.say(&grid)
            }
            Ok(None) => self.say("Student not found!"),
            Err(e) => self.failed(e),
        }
    }

    fn update_student(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter student ID to update: ", "student ID")? else {
            return Ok(());
        };
        if !self.student_exists(id)? {
            return Ok(());
        }
        let Some(field) = self.pick_field(&StudentField::ALL, StudentField::column)? else {
            return Ok(());
        };
        let value = self.ask(&format!("New {}: ", field.column()))?;
        let result = student::update_student(self.conn, id, field, &value);
        self.records(result, |()| "Student updated successfully!".to_string())
    }

    fn delete_student(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter student ID to delete: ", "student ID")? else {
            return Ok(());
        };
        if !self.confirm(
            "Are you sure you want to delete this student? This will delete all related records. (yes/no): ",
        )? {
            return self.say("Deletion cancelled.");
        }
        let result = student::delete_student(self.conn, id);
        self.records(result, |deleted| deleted_message("Student", deleted))
    }

    // Courses
    // ------------------------------------------------------------------------

    fn add_course(&mut self) -> Step {
        self.heading("ADD NEW COURSE")?;
        let course_code = self.ask("Course Code: ")?;
        let course_name = self.ask("Course Name: ")?;
        let credits = match self.ask_optional(&format!(
            "Credits (default {}): ",
            course::DEFAULT_CREDITS
        ))? {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(credits) => Some(credits),
                Err(_) => return self.say("Invalid credits!"),
            },
        };
        let new = NewCourse {
            course_code,
            course_name,
            credits,
            description: self.ask_optional("Description (optional): ")?,
        };
        let result = course::add_course(self.conn, &new);
        self.records(result, |id| format!("Course added successfully! ID: {id}"))
    }

    fn list_courses(&mut self) -> Step {
        let courses = match course::get_all_courses(self.conn) {
            Ok(courses) => courses,
            Err(e) => return self.failed(e),
        };
        if courses.is_empty() {
            return self.say("No courses found.");
        }
        let rows: Vec<Vec<String>> = courses
            .iter()
            .map(|c| {
                vec![
                    c.id.to_string(),
                    c.code.clone(),
                    c.name.clone(),
                    c.credits.to_string(),
                ]
            })
            .collect();
        let grid = render_grid(&["ID", "Code", "Name", "Credits"], &rows);
        self.say(&grid)
    }

    fn show_course(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter course ID: ", "course ID")? else {
            return Ok(());
        };
        match course::get_course(self.conn, id) {
            Ok(Some(c)) => {
                let rows = vec![
                    vec!["ID".to_string(), c.id.to_string()],
                    vec!["Code".to_string(), c.code.clone()],
                    vec!["Name".to_string(), c.name.clone()],
                    vec!["Credits".to_string(), c.credits.to_string()],
                    vec![
                        "Description".to_string(),
                        c.description.clone().unwrap_or_default(),
                    ],
                ];
                let grid = render_grid(&["Field", "Value"], &rows);
                self.say(&grid)
            }
            Ok(None) => self.say("Course not found!"),
            Err(e) => self.failed(e),
        }
    }

    fn delete_course(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter course ID to delete: ", "course ID")? else {
            return Ok(());
        };
        if !self.confirm(
            "Are you sure you want to delete this course? This will delete all related records. (yes/no): ",
        )? {
            return self.say("Deletion cancelled.");
        }
        let result = course::delete_course(self.conn, id);
        self.records(result, |deleted| deleted_message("Course", deleted))
    }

    // Academic records
    // ------------------------------------------------------------------------

    fn add_record(&mut self) -> Step {
        self.heading("ADD ACADEMIC RECORD")?;
        let Some(student_id) = self.ask_id("Student ID: ", "student ID")? else {
            return Ok(());
        };
        if !self.student_exists(student_id)? {
            return Ok(());
        }
        let Some(course_id) = self.ask_id("Course ID: ", "course ID")? else {
            return Ok(());
        };
        if !self.course_exists(course_id)? {
            return Ok(());
        }
        let semester = self.ask("Semester (e.g., Fall, Spring): ")?;
        let Some(year) = self.ask_year()? else {
            return Ok(());
        };
        let grade = self.ask("Grade (A+, A, A-, B+, ..., F): ")?;
        let score = match self.ask("Score (0-100): ")?.parse::<f64>() {
            Ok(score) => score,
            Err(_) => return self.say("Invalid score!"),
        };
        let new = NewAcademicRecord {
            student_id,
            course_id,
            semester,
            year,
            grade,
            score,
            remarks: self.ask_optional("Remarks (optional): ")?,
        };
        let result = academic::add_academic_record(self.conn, &new);
        self.records(result, |id| format!("Academic record added successfully! ID: {id}"))
    }

    fn list_grades(&mut self) -> Step {
        let Some(student_id) = self.ask_id("Enter student ID: ", "student ID")? else {
            return Ok(());
        };
        let grades = match academic::get_student_grades(self.conn, student_id) {
            Ok(grades) => grades,
            Err(e) => return self.failed(e),
        };
        if grades.is_empty() {
            return self.say("No grades found for this student.");
        }
        let rows: Vec<Vec<String>> = grades
            .iter()
            .map(|g| {
                vec![
                    g.record_id.to_string(),
                    g.course_code.clone(),
                    g.course_name.clone(),
                    g.semester.clone(),
                    g.year.to_string(),
                    g.grade.clone(),
                    format!("{:.2}", g.score),
                    g.credits.to_string(),
                ]
            })
            .collect();
        let grid = render_grid(
            &["Record", "Code", "Course", "Semester", "Year", "Grade", "Score", "Credits"],
            &rows,
        );
        self.say(&grid)
    }

    fn update_record(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter record ID to update: ", "record ID")? else {
            return Ok(());
        };
        match academic::get_academic_record(self.conn, id) {
            Ok(Some(_)) => {}
            Ok(None) => return self.say("Record not found!"),
            Err(e) => return self.failed(e),
        }
        let Some(field) =
            self.pick_field(&AcademicRecordField::ALL, AcademicRecordField::column)?
        else {
            return Ok(());
        };
        let value = self.ask(&format!("New {}: ", field.column()))?;
        let result = academic::update_academic_record(self.conn, id, field, &value);
        self.records(result, |()| "Academic record updated successfully!".to_string())
    }

    // Attendance
    // ------------------------------------------------------------------------

    fn mark_attendance(&mut self) -> Step {
        self.heading("MARK ATTENDANCE")?;
        let Some(student_id) = self.ask_id("Student ID: ", "student ID")? else {
            return Ok(());
        };
        if !self.student_exists(student_id)? {
            return Ok(());
        }
        let Some(course_id) = self.ask_id("Course ID: ", "course ID")? else {
            return Ok(());
        };
        if !self.course_exists(course_id)? {
            return Ok(());
        }
        let date = self.ask_date_or_today("Date (YYYY-MM-DD, press Enter for today): ")?;
        let status = self.ask_status()?;
        let remarks = self.ask("Remarks (optional): ")?;

        let result = attendance::mark_attendance(
            self.conn, student_id, course_id, &date, status, &remarks,
        );
        self.records(result, |outcome| match outcome {
            MarkOutcome::Inserted => "Attendance marked successfully!".to_string(),
            MarkOutcome::Updated => format!("Attendance updated for {date}."),
        })
    }

    fn mark_bulk_attendance(&mut self) -> Step {
        self.heading("MARK BULK ATTENDANCE")?;
        let Some(course_id) = self.ask_id("Course ID: ", "course ID")? else {
            return Ok(());
        };
        if !self.course_exists(course_id)? {
            return Ok(());
        }
        let raw = self.ask("Student IDs (comma separated): ")?;
        let parsed: Option<Vec<i64>> = raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(parse_id)
            .collect();
        let student_ids = match parsed {
            Some(ids) if !ids.is_empty() => ids,
            _ => return self.say("Invalid student IDs!"),
        };
        let date = self.ask_date_or_today("Date (YYYY-MM-DD, press Enter for today): ")?;
        let status = self.ask_status()?;
        let remarks = self.ask("Remarks (optional): ")?;

        let total = student_ids.len();
        let result = attendance::mark_bulk_attendance(
            self.conn,
            course_id,
            &student_ids,
            &date,
            status,
            &remarks,
        );
        self.records(result, |marked| {
            format!("Marked attendance for {marked} of {total} students.")
        })
    }

    fn list_attendance(&mut self) -> Step {
        let Some(student_id) = self.ask_id("Enter student ID: ", "student ID")? else {
            return Ok(());
        };
        let course_id = match self.ask_optional("Course ID (press Enter for all courses): ")? {
            None => None,
            Some(raw) => match parse_id(&raw) {
                Some(id) => Some(id),
                None => return self.say("Invalid course ID!"),
            },
        };
        let entries = match attendance::get_attendance(self.conn, student_id, course_id) {
            Ok(entries) => entries,
            Err(e) => return self.failed(e),
        };
        if entries.is_empty() {
            return self.say("No attendance records found.");
        }
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|a| {
                vec![
                    a.date.clone(),
                    a.course_code.clone(),
                    a.course_name.clone(),
                    a.status.to_string(),
                    a.remarks.clone().unwrap_or_default(),
                ]
            })
            .collect();
        let grid = render_grid(&["Date", "Code", "Course", "Status", "Remarks"], &rows);
        self.say(&grid)
    }

    // Documents
    // ------------------------------------------------------------------------

    fn add_document(&mut self) -> Step {
        self.heading("ADD DOCUMENT")?;
        let Some(student_id) = self.ask_id("Student ID: ", "student ID")? else {
            return Ok(());
        };
        if !self.student_exists(student_id)? {
            return Ok(());
        }
        self.say("Document Types:")?;
        for (index, kind) in DocumentType::ALL.iter().enumerate() {
            self.say(&format!("{}. {kind}", index + 1))?;
        }
        let document_type = DocumentType::from_choice(&self.ask("Select type (1-5): ")?);
        let new = NewDocument {
            student_id,
            document_type,
            name: self.ask("Document Name: ")?,
            file_path: self.ask_optional("File Path (optional): ")?,
            description: self.ask_optional("Description (optional): ")?,
            upload_date: None,
        };
        let result = document::add_document(self.conn, &new);
        self.records(result, |id| format!("Document added successfully! ID: {id}"))
    }

    fn list_documents(&mut self) -> Step {
        let Some(student_id) = self.ask_id("Enter student ID: ", "student ID")? else {
            return Ok(());
        };
        let documents = match document::get_student_documents(self.conn, student_id) {
            Ok(documents) => documents,
            Err(e) => return self.failed(e),
        };
        if documents.is_empty() {
            return self.say("No documents found for this student.");
        }
        let rows: Vec<Vec<String>> = documents
            .iter()
            .map(|d| {
                vec![
                    d.id.to_string(),
                    d.document_type.clone(),
                    d.name.clone(),
                    d.upload_date.clone(),
                    d.file_path.clone().unwrap_or_default(),
                    d.checksum
                        .as_deref()
                        .map(|sum| sum.chars().take(12).collect())
                        .unwrap_or_default(),
                ]
            })
            .collect();
        let grid = render_grid(&["ID", "Type", "Name", "Uploaded", "Path", "Checksum"], &rows);
        self.say(&grid)
    }

    fn delete_document(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter document ID to delete: ", "document ID")? else {
            return Ok(());
        };
        if !self.confirm("Are you sure you want to delete this document? (yes/no): ")? {
            return self.say("Deletion cancelled.");
        }
        let result = document::delete_document(self.conn, id);
        self.records(result, |deleted| deleted_message("Document", deleted))
    }

    // Learning outcomes
    // ------------------------------------------------------------------------

    fn add_outcome(&mut self) -> Step {
        self.heading("ADD LEARNING OUTCOME")?;
        let Some(student_id) = self.ask_id("Student ID: ", "student ID")? else {
            return Ok(());
        };
        if !self.student_exists(student_id)? {
            return Ok(());
        }
        let Some(course_id) = self.ask_id("Course ID: ", "course ID")? else {
            return Ok(());
        };
        if !self.course_exists(course_id)? {
            return Ok(());
        }
        let description = self.ask("Outcome Description: ")?;
        self.say("Achievement Levels:")?;
        self.say("1. Not Met\n2. Partially Met\n3. Met\n4. Exceeded")?;
        let Some(level) = AchievementLevel::from_choice(&self.ask("Select level (1-4): ")?)
        else {
            return self.say("Invalid achievement level!");
        };
        let assessment_date =
            self.ask_date_or_today("Assessment Date (YYYY-MM-DD, press Enter for today): ")?;
        let new = NewLearningOutcome {
            student_id,
            course_id,
            description,
            level,
            assessment_date: Some(assessment_date),
            notes: self.ask_optional("Notes (optional): ")?,
        };
        let result = outcome::add_learning_outcome(self.conn, &new);
        self.records(result, |id| format!("Learning outcome added successfully! ID: {id}"))
    }

    fn list_student_outcomes(&mut self) -> Step {
        let Some(student_id) = self.ask_id("Enter student ID: ", "student ID")? else {
            return Ok(());
        };
        let outcomes = match outcome::get_student_outcomes(self.conn, student_id) {
            Ok(outcomes) => outcomes,
            Err(e) => return self.failed(e),
        };
        if outcomes.is_empty() {
            return self.say("No learning outcomes found for this student.");
        }
        let rows: Vec<Vec<String>> = outcomes
            .iter()
            .map(|o| {
                vec![
                    o.outcome_id.to_string(),
                    o.course_code.clone(),
                    o.description.clone(),
                    o.level.clone(),
                    o.assessment_date.clone().unwrap_or_default(),
                ]
            })
            .collect();
        let grid = render_grid(&["ID", "Course", "Outcome", "Level", "Assessed"], &rows);
        self.say(&grid)
    }

    fn list_course_outcomes(&mut self) -> Step {
        let Some(course_id) = self.ask_id("Enter course ID: ", "course ID")? else {
            return Ok(());
        };
        let outcomes = match outcome::get_course_outcomes(self.conn, course_id) {
            Ok(outcomes) => outcomes,
            Err(e) => return self.failed(e),
        };
        if outcomes.is_empty() {
            return self.say("No learning outcomes found for this course.");
        }
        let rows: Vec<Vec<String>> = outcomes
            .iter()
            .map(|o| {
                vec![
                    o.student_id.to_string(),
                    format!("{} {}", o.first_name, o.last_name),
                    o.description.clone(),
                    o.level.clone(),
                    o.assessment_date.clone().unwrap_or_default(),
                ]
            })
            .collect();
        let grid = render_grid(&["Student", "Name", "Outcome", "Level", "Assessed"], &rows);
        self.say(&grid)
    }

    fn update_outcome(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter outcome ID to update: ", "outcome ID")? else {
            return Ok(());
        };
        let Some(field) = self.pick_field(&OutcomeField::ALL, OutcomeField::column)? else {
            return Ok(());
        };
        let value = self.ask(&format!("New {}: ", field.column()))?;
        let result = outcome::update_learning_outcome(self.conn, id, field, &value);
        self.records(result, |()| "Learning outcome updated successfully!".to_string())
    }

    fn delete_outcome(&mut self) -> Step {
        let Some(id) = self.ask_id("Enter outcome ID to delete: ", "outcome ID")? else {
            return Ok(());
        };
        if !self.confirm("Are you sure you want to delete this outcome? (yes/no): ")? {
            return self.say("Deletion cancelled.");
        }
        let result = outcome::delete_learning_outcome(self.conn, id);
        self.records(result, |deleted| deleted_message("Learning outcome", deleted))
    }

    // Plumbing
    // ------------------------------------------------------------------------

    fn engine(&self) -> ReportEngine<SqliteStore<'c>> {
        ReportEngine::with_config(SqliteStore::new(self.conn), self.reports.clone())
    }

    fn menu(&mut self, title: &str, items: &[&str], exit_label: &str) -> Step {
        self.heading(title)?;
        for (index, item) in items.iter().enumerate() {
            writeln!(self.out, "{}. {item}", index + 1)?;
        }
        writeln!(self.out, "0. {exit_label}")?;
        writeln!(self.out, "{}", "=".repeat(60))?;
        Ok(())
    }

    fn heading(&mut self, title: &str) -> Step {
        writeln!(self.out, "\n{}", "=".repeat(60))?;
        writeln!(self.out, "{title:^60}")?;
        writeln!(self.out, "{}", "=".repeat(60))?;
        Ok(())
    }

    fn say(&mut self, message: &str) -> Step {
        writeln!(self.out, "{message}")?;
        Ok(())
    }

    fn ask(&mut self, label: &str) -> Step<String> {
        self.out.flush()?;
        match self.prompt.read_line(label)? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(Stop::Ended),
        }
    }

    fn ask_optional(&mut self, label: &str) -> Step<Option<String>> {
        let answer = self.ask(label)?;
        Ok(Some(answer).filter(|a| !a.is_empty()))
    }

    /// A positive id, or `None` after telling the operator it was invalid
    fn ask_id(&mut self, label: &str, what: &str) -> Step<Option<i64>> {
        let answer = self.ask(label)?;
        match parse_id(&answer) {
            Some(id) => Ok(Some(id)),
            None => {
                self.say(&format!("Invalid {what}!"))?;
                Ok(None)
            }
        }
    }

    fn ask_year(&mut self) -> Step<Option<i64>> {
        match self.ask("Year: ")?.parse::<i64>() {
            Ok(year) => Ok(Some(year)),
            Err(_) => {
                self.say("Invalid year!")?;
                Ok(None)
            }
        }
    }

    fn ask_date_or_today(&mut self, label: &str) -> Step<String> {
        let answer = self.ask(label)?;
        Ok(if answer.is_empty() { today() } else { answer })
    }

    fn ask_status(&mut self) -> Step<AttendanceStatus> {
        self.say("Status:")?;
        for (index, status) in AttendanceStatus::ALL.iter().enumerate() {
            self.say(&format!("{}. {status}", index + 1))?;
        }
        let choice = self.ask("Select status (1-4, default 1): ")?;
        Ok(AttendanceStatus::from_choice(&choice))
    }

    fn pick_field<F: Copy>(&mut self, fields: &[F], name: fn(&F) -> &'static str) -> Step<Option<F>> {
        self.say("Available fields:")?;
        for (index, field) in fields.iter().enumerate() {
            self.say(&format!("{}. {}", index + 1, name(field)))?;
        }
        let choice = self.ask("Select field: ")?;
        let picked = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| fields.get(index).copied());
        if picked.is_none() {
            self.say("Invalid field!")?;
        }
        Ok(picked)
    }

    fn confirm(&mut self, label: &str) -> Step<bool> {
        Ok(self.ask(label)?.eq_ignore_ascii_case("yes"))
    }

    fn student_exists(&mut self, id: i64) -> Step<bool> {
        match student::get_student(self.conn, id) {
            Ok(Some(_)) => Ok(true),
            Ok(None) => {
                self.say("Student not found!")?;
                Ok(false)
            }
            Err(e) => {
                self.failed(e)?;
                Ok(false)
            }
        }
    }

    fn course_exists(&mut self, id: i64) -> Step<bool> {
        match course::get_course(self.conn, id) {
            Ok(Some(_)) => Ok(true),
            Ok(None) => {
                self.say("Course not found!")?;
                Ok(false)
            }
            Err(e) => {
                self.failed(e)?;
                Ok(false)
            }
        }
    }

    fn report(&mut self, result: ReportResult<String>) -> Step {
        match result {
            Ok(text) => self.say(&text),
            Err(e) if e.is_recoverable() => self.say(&capitalize(&e.to_string())),
            Err(e) => {
                warn!(error = %e, "report failed");
                self.say(&format!("Error: {e}"))
            }
        }
    }

    fn records<T>(&mut self, result: RecordsResult<T>, done: impl FnOnce(T) -> String) -> Step {
        match result {
            Ok(value) => self.say(&done(value)),
            Err(e) => self.failed(e),
        }
    }

    fn failed(&mut self, err: RecordsError) -> Step {
        match &err {
            RecordsError::Store(_) | RecordsError::Io(_) => {
                warn!(error = %err, "operation failed")
            }
            _ => debug!(error = %err, "operation rejected"),
        }
        self.say(&format!("Error: {err}"))
    }
}

fn deleted_message(entity: &str, deleted: bool) -> String {
    if deleted {
        format!("{entity} deleted successfully!")
    } else {
        format!("{entity} not found!")
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_rows, setup_database, Table};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn run_script(conn: &Connection, lines: &[&str]) -> String {
        let prompt = ScriptedPrompt::new(lines.iter().copied());
        let mut shell = Shell::new(conn, ReportConfig::default(), prompt, Vec::new());
        shell.run().unwrap();
        String::from_utf8(shell.into_output()).unwrap()
    }

    #[test]
    fn test_exit_from_main_menu() {
        let conn = memory_db();
        let out = run_script(&conn, &["0"]);
        assert!(out.contains("LEARNTRACK - MAIN MENU"));
        assert!(out.contains("7. Reports & Analytics"));
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[test]
    fn test_end_of_input_leaves_cleanly() {
        let conn = memory_db();
        let out = run_script(&conn, &["1", "1", "Ada"]);
        assert!(out.ends_with("Goodbye!\n"));
        assert_eq!(count_rows(&conn, Table::Students).unwrap(), 0);
    }

    #[test]
    fn test_add_and_list_student() {
        let conn = memory_db();
        let out = run_script(
            &conn,
            &[
                "1", "1", "Ada", "Lovelace", "ada@example.com", "", "1815-12-10", "2", "0", "0",
            ],
        );
        assert!(out.contains("Student added successfully! ID: 1"));
        assert!(out.contains("| Ada Lovelace |"));
    }

    #[test]
    fn test_invalid_email_reports_and_continues() {
        let conn = memory_db();
        let out = run_script(&conn, &["1", "1", "Ada", "Lovelace", "not-an-email", "", "", "0", "0"]);
        assert!(out.contains("Error: validation failed: email: invalid email format"));
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[test]
    fn test_invalid_choice_and_id() {
        let conn = memory_db();
        let out = run_script(&conn, &["9", "7", "1", "abc", "0", "0"]);
        assert!(out.contains("Invalid choice! Please try again."));
        assert!(out.contains("Invalid student ID!"));
    }

    #[test]
    fn test_report_for_missing_student_is_a_message() {
        let conn = memory_db();
        let out = run_script(&conn, &["7", "1", "42", "0", "0"]);
        assert!(out.contains("Student 42 not found"));
    }

    #[test]
    fn test_update_student_by_field_number() {
        let conn = memory_db();
        run_script(&conn, &["1", "1", "Ada", "Lovelace", "ada@example.com", "", "", "0", "0"]);
        let out = run_script(&conn, &["1", "4", "1", "5", "graduated", "0", "0"]);
        assert!(out.contains("Student updated successfully!"));

        let student = student::get_student(&conn, 1).unwrap().unwrap();
        assert_eq!(student.status.as_str(), "graduated");
    }

    #[test]
    fn test_delete_needs_yes() {
        let conn = memory_db();
        run_script(&conn, &["1", "1", "Ada", "Lovelace", "ada@example.com", "", "", "0", "0"]);

        let out = run_script(&conn, &["1", "5", "1", "no", "0", "0"]);
        assert!(out.contains("Deletion cancelled."));
        assert_eq!(count_rows(&conn, Table::Students).unwrap(), 1);

        let out = run_script(&conn, &["1", "5", "1", "yes", "0", "0"]);
        assert!(out.contains("Student deleted successfully!"));
        assert_eq!(count_rows(&conn, Table::Students).unwrap(), 0);
    }

    #[test]
    fn test_mark_attendance_twice_updates() {
        let conn = memory_db();
        run_script(&conn, &["1", "1", "Ada", "Lovelace", "ada@example.com", "", "", "0", "0"]);
        run_script(&conn, &["2", "1", "CS101", "Intro", "", "", "0", "0"]);

        let mark = ["4", "1", "1", "1", "2024-03-01", "2", "", "0", "0"];
        let first = run_script(&conn, &mark);
        let second = run_script(&conn, &mark);

        assert!(first.contains("Attendance marked successfully!"));
        assert!(second.contains("Attendance updated for 2024-03-01."));
        assert_eq!(count_rows(&conn, Table::Attendance).unwrap(), 1);
    }

    #[test]
    fn test_bulk_attendance_counts_successes() {
        let conn = memory_db();
        run_script(&conn, &["1", "1", "Ada", "Lovelace", "ada@example.com", "", "", "0", "0"]);
        run_script(&conn, &["2", "1", "CS101", "Intro", "", "", "0", "0"]);

        let out = run_script(&conn, &["4", "2", "1", "1, 99", "2024-03-01", "1", "", "0", "0"]);
        assert!(out.contains("Marked attendance for 1 of 2 students."));
    }

    #[test]
    fn test_gpa_and_transcript_from_menu() {
        let conn = memory_db();
        run_script(&conn, &["1", "1", "Ada", "Lovelace", "ada@example.com", "", "", "0", "0"]);
        run_script(&conn, &["2", "1", "CS101", "Intro", "4", "", "0", "0"]);
        run_script(&conn, &["3", "1", "1", "1", "Fall", "2023", "A", "92", "", "0", "0"]);

        let out = run_script(&conn, &["3", "3", "1", "4", "1", "0", "0"]);
        assert!(out.contains("3.68"));
        assert!(out.contains("Fall 2023"));
        assert!(out.contains("Semester GPA: 4.00"));
    }
}
