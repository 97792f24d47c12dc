// Reporting engine - every report is a stateless fold over rows from a RecordStore
//
// The engine owns no state besides its injected store and limits. Rendering
// the same report twice against an unchanged store gives the same text.

use crate::config::ReportConfig;
use crate::entities::AttendanceStatus;
use crate::error::{ReportError, ReportResult};
use crate::grading::{
    attendance_summary, flat_gpa, share_bar, AchievementBand, AchievementCounts,
    AttendanceCounts, AttendanceSummary, GpaSummary, OverallAssessment, PerformanceComparison,
    ScoreStats, Standing,
};
use crate::output::render_rows;
use crate::store::{Query, RecordStore, Row};
use crate::transcript::{group_semesters, SemesterBlock, TranscriptEntry};
use serde::Serialize;
use std::fmt::Write;
use tracing::debug;

const REPORT_WIDTH: usize = 80;
const TRANSCRIPT_WIDTH: usize = 70;

// ============================================================================
// REPORT MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentHeader {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: String,
    pub enrollment_date: String,
}

impl StudentHeader {
    fn from_row(row: &Row) -> ReportResult<Self> {
        Ok(StudentHeader {
            id: row.i64("student_id")?,
            name: format!("{} {}", row.str("first_name")?, row.str("last_name")?),
            email: row.str("email")?.to_string(),
            status: row.str("status")?.to_string(),
            enrollment_date: row.opt_str("enrollment_date")?.unwrap_or_default().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseHeader {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub credits: i64,
}

impl CourseHeader {
    fn from_row(row: &Row) -> ReportResult<Self> {
        Ok(CourseHeader {
            id: row.i64("course_id")?,
            code: row.str("course_code")?.to_string(),
            name: row.str("course_name")?.to_string(),
            credits: row.i64("credits")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub student: StudentHeader,
    pub semesters: Vec<SemesterBlock>,
    /// Flat-average GPA over every record; None without records
    pub overall: Option<GpaSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallStatistics {
    pub students_total: i64,
    pub students_active: i64,
    pub students_inactive: i64,
    pub students_graduated: i64,
    pub courses: i64,
    pub scores: Option<ScoreStats>,
    pub attendance_records: u64,
    pub attendance_rate: Option<f64>,
    pub documents: i64,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ReportEngine<S: RecordStore> {
    store: S,
    config: ReportConfig,
}

impl<S: RecordStore> ReportEngine<S> {
    pub fn new(store: S) -> Self {
        ReportEngine {
            store,
            config: ReportConfig::default(),
        }
    }

    pub fn with_config(store: S, config: ReportConfig) -> Self {
        ReportEngine { store, config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Fetch helpers
    // ------------------------------------------------------------------------

    fn student(&self, student_id: i64) -> ReportResult<StudentHeader> {
        let row = self
            .store
            .fetch_one(&Query::StudentById { student_id })?
            .ok_or(ReportError::NotFound { entity: "Student", id: student_id })?;
        StudentHeader::from_row(&row)
    }

    fn course(&self, course_id: i64) -> ReportResult<CourseHeader> {
        let row = self
            .store
            .fetch_one(&Query::CourseById { course_id })?
            .ok_or(ReportError::NotFound { entity: "Course", id: course_id })?;
        CourseHeader::from_row(&row)
    }

    fn scores(&self, query: &Query) -> ReportResult<Vec<f64>> {
        self.store
            .fetch_all(query)?
            .iter()
            .map(|row| row.f64("score").map_err(ReportError::from))
            .collect()
    }

    fn count(&self, query: &Query) -> ReportResult<i64> {
        match self.store.fetch_one(query)? {
            Some(row) => Ok(row.i64("count")?),
            None => Ok(0),
        }
    }

    fn attendance_counts(&self, query: &Query) -> ReportResult<AttendanceCounts> {
        let mut counts = AttendanceCounts::default();
        for row in self.store.fetch_all(query)? {
            let status = row.str("status")?;
            match AttendanceStatus::parse(status) {
                Some(status) => counts.add(status, row.i64("count")?.max(0) as u64),
                None => debug!(status, "ignoring unknown attendance status"),
            }
        }
        Ok(counts)
    }

    fn achievement_counts(&self, query: &Query) -> ReportResult<AchievementCounts> {
        let mut counts = AchievementCounts::default();
        for row in self.store.fetch_all(query)? {
            counts.add(row.str("achievement_level")?, row.i64("count")?.max(0) as u64);
        }
        Ok(counts)
    }

    // ------------------------------------------------------------------------
    // Computations
    // ------------------------------------------------------------------------

    /// Flat GPA (average score / 100 * 4) over all of a student's records
    pub fn compute_gpa(&self, student_id: i64) -> ReportResult<GpaSummary> {
        self.student(student_id)?;
        let scores = self.scores(&Query::StudentScores { student_id })?;
        flat_gpa(&scores)
    }

    pub fn compute_attendance_percentage(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> ReportResult<AttendanceSummary> {
        self.student(student_id)?;
        self.course(course_id)?;
        let counts = self.attendance_counts(&Query::AttendanceStatusCounts { student_id, course_id })?;
        attendance_summary(counts)
    }

    pub fn transcript(&self, student_id: i64) -> ReportResult<Transcript> {
        let student = self.student(student_id)?;
        let entries = self
            .store
            .fetch_all(&Query::TranscriptRecords { student_id })?
            .iter()
            .map(TranscriptEntry::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let scores: Vec<f64> = entries.iter().map(|e| e.score).collect();
        let overall = flat_gpa(&scores).ok();

        Ok(Transcript {
            student,
            semesters: group_semesters(entries),
            overall,
        })
    }

    pub fn achievement_summary(&self, student_id: i64) -> ReportResult<AchievementCounts> {
        self.student(student_id)?;
        let counts = self.achievement_counts(&Query::StudentOutcomeLevels { student_id })?;
        if counts.is_empty() {
            return Err(ReportError::NoData("no learning outcomes found"));
        }
        Ok(counts)
    }

    pub fn course_achievement(&self, course_id: i64) -> ReportResult<AchievementCounts> {
        self.course(course_id)?;
        let counts = self.achievement_counts(&Query::CourseOutcomeLevels { course_id })?;
        if counts.is_empty() {
            return Err(ReportError::NoData("no learning outcome data for this course"));
        }
        Ok(counts)
    }

    /// Student's achievement score in a course against the whole course
    pub fn compare_student_performance(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> ReportResult<PerformanceComparison> {
        self.student(student_id)?;
        self.course(course_id)?;
        let mine = self
            .achievement_counts(&Query::StudentCourseOutcomeLevels { student_id, course_id })?
            .average_score();
        let course = self
            .achievement_counts(&Query::CourseOutcomeLevels { course_id })?
            .average_score();

        match (mine, course) {
            (Some(student_score), Some(course_score)) => {
                Ok(PerformanceComparison::new(student_score, course_score))
            }
            _ => Err(ReportError::NoData("insufficient data for comparison")),
        }
    }

    pub fn course_statistics(&self, course_id: i64) -> ReportResult<ScoreStats> {
        self.course(course_id)?;
        let scores = self.scores(&Query::CourseScores { course_id })?;
        ScoreStats::from_scores(&scores).ok_or(ReportError::NoData("no grades for this course"))
    }

    pub fn overall_statistics(&self) -> ReportResult<OverallStatistics> {
        let mut stats = OverallStatistics::default();

        for row in self.store.fetch_all(&Query::StudentStatusCounts)? {
            let count = row.i64("count")?;
            stats.students_total += count;
            match row.str("status")? {
                "active" => stats.students_active += count,
                "inactive" => stats.students_inactive += count,
                "graduated" => stats.students_graduated += count,
                _ => {}
            }
        }

        stats.courses = self.count(&Query::CourseCount)?;
        stats.scores = ScoreStats::from_scores(&self.scores(&Query::AllScores)?);

        let attendance = self.attendance_counts(&Query::AllAttendanceStatusCounts)?;
        stats.attendance_records = attendance.total();
        stats.attendance_rate = attendance_summary(attendance).ok().map(|s| s.percentage);

        stats.documents = self.count(&Query::DocumentCount)?;
        Ok(stats)
    }

    // ------------------------------------------------------------------------
    // Student-level reports
    // ------------------------------------------------------------------------

    pub fn render_transcript(&self, student_id: i64) -> ReportResult<String> {
        let transcript = self.transcript(student_id)?;
        let student = &transcript.student;
        let mut out = String::new();

        banner(&mut out, "OFFICIAL TRANSCRIPT", TRANSCRIPT_WIDTH)?;
        writeln!(out)?;
        writeln!(out, "Student Name: {}", student.name)?;
        writeln!(out, "Student ID: {}", student.id)?;
        writeln!(out, "Email: {}", student.email)?;
        writeln!(out, "Enrollment Date: {}", student.enrollment_date)?;
        writeln!(out, "Status: {}", student.status)?;
        writeln!(out)?;
        rule(&mut out, '-', TRANSCRIPT_WIDTH)?;

        let Some(overall) = transcript.overall else {
            writeln!(out)?;
            writeln!(out, "No academic records found.")?;
            rule(&mut out, '=', TRANSCRIPT_WIDTH)?;
            return Ok(out);
        };

        for block in &transcript.semesters {
            writeln!(out)?;
            writeln!(out, "{}", block.key)?;
            rule(&mut out, '-', TRANSCRIPT_WIDTH)?;
            for entry in &block.entries {
                writeln!(
                    out,
                    "{:<10} {:<30} Credits: {:<3} Grade: {:<5} Score: {:.1}",
                    entry.course_code, entry.course_name, entry.credits, entry.grade, entry.score
                )?;
            }
            writeln!(out)?;
            writeln!(
                out,
                "Semester Credits: {} | Semester GPA: {:.2}",
                block.credits,
                block.gpa()
            )?;
            rule(&mut out, '-', TRANSCRIPT_WIDTH)?;
        }

        writeln!(out)?;
        rule(&mut out, '=', TRANSCRIPT_WIDTH)?;
        write_gpa_block(&mut out, student.id, &overall)?;
        rule(&mut out, '=', TRANSCRIPT_WIDTH)?;
        Ok(out)
    }

    pub fn render_gpa(&self, student_id: i64) -> ReportResult<String> {
        let summary = self.compute_gpa(student_id)?;
        let mut out = String::new();
        write_gpa_block(&mut out, student_id, &summary)?;
        Ok(out)
    }

    pub fn render_attendance_percentage(
        &self,
        student_id: i64,
        course_id: i64,
    ) -> ReportResult<String> {
        let summary = self.compute_attendance_percentage(student_id, course_id)?;
        let counts = summary.counts;
        let mut out = String::new();

        writeln!(out, "=== Attendance Summary ===")?;
        writeln!(out, "Student ID: {student_id}")?;
        writeln!(out, "Course ID: {course_id}")?;
        writeln!(out, "Total Classes: {}", counts.total())?;
        writeln!(out, "Present: {}", counts.present)?;
        writeln!(out, "Absent: {}", counts.absent)?;
        writeln!(out, "Late: {}", counts.late)?;
        writeln!(out, "Excused: {}", counts.excused)?;
        writeln!(out, "Attendance Percentage: {:.2}%", summary.percentage)?;
        writeln!(out, "Status: {}", summary.band)?;
        Ok(out)
    }

    pub fn render_student_report(&self, student_id: i64) -> ReportResult<String> {
        let student = self.student(student_id)?;
        let scores = self.scores(&Query::StudentScores { student_id })?;
        let stats = ScoreStats::from_scores(&scores);
        let attendance = attendance_summary(
            self.attendance_counts(&Query::StudentAttendanceStatusCounts { student_id })?,
        )
        .ok();
        let outcomes = self.achievement_counts(&Query::StudentOutcomeLevels { student_id })?;
        let documents = self.count(&Query::StudentDocumentCount { student_id })?;

        let mut out = String::new();
        banner(&mut out, "STUDENT PERFORMANCE REPORT", REPORT_WIDTH)?;
        writeln!(out)?;
        writeln!(out, "Student ID: {}", student.id)?;
        writeln!(out, "Name: {}", student.name)?;
        writeln!(out, "Email: {}", student.email)?;
        writeln!(out, "Status: {}", student.status)?;
        writeln!(out, "Enrollment Date: {}", student.enrollment_date)?;
        writeln!(out)?;
        rule(&mut out, '-', REPORT_WIDTH)?;

        writeln!(out)?;
        writeln!(out, "ACADEMIC PERFORMANCE")?;
        match &stats {
            Some(s) => {
                writeln!(out, "Total Courses Completed: {}", s.count)?;
                writeln!(out, "Average Score: {:.2}%", s.average)?;
                writeln!(out, "GPA (4.0 scale): {:.2}", s.gpa())?;
                writeln!(out, "Highest Score: {:.2}%", s.max)?;
                writeln!(out, "Lowest Score: {:.2}%", s.min)?;
            }
            None => writeln!(out, "No academic records available")?,
        }

        writeln!(out)?;
        writeln!(out, "ATTENDANCE")?;
        match &attendance {
            Some(a) => {
                writeln!(out, "Total Classes: {}", a.counts.total())?;
                writeln!(out, "Classes Attended: {}", a.counts.present)?;
                writeln!(out, "Attendance Rate: {:.2}%", a.percentage)?;
                writeln!(out, "Status: {}", a.band)?;
            }
            None => writeln!(out, "No attendance records available")?,
        }

        writeln!(out)?;
        writeln!(out, "LEARNING OUTCOMES")?;
        if outcomes.is_empty() {
            writeln!(out, "No learning outcomes assessed")?;
        } else {
            writeln!(out, "Total Outcomes Assessed: {}", outcomes.total())?;
            for (level, count) in outcomes.levels() {
                writeln!(out, "  {level}: {count} ({:.1}%)", outcomes.share(*count))?;
            }
        }

        writeln!(out)?;
        writeln!(out, "DOCUMENTS")?;
        writeln!(out, "Total Documents on File: {documents}")?;
        writeln!(out)?;
        rule(&mut out, '=', REPORT_WIDTH)?;

        writeln!(out)?;
        writeln!(out, "OVERALL ASSESSMENT")?;
        match &stats {
            Some(s) => {
                let rate = attendance.map_or(0.0, |a| a.percentage);
                writeln!(out, "{}", OverallAssessment::assess(s.gpa(), rate).label())?;
            }
            None => writeln!(out, "Insufficient data for overall assessment")?,
        }
        rule(&mut out, '=', REPORT_WIDTH)?;
        Ok(out)
    }

    pub fn render_achievement_summary(&self, student_id: i64) -> ReportResult<String> {
        let counts = self.achievement_summary(student_id)?;
        let mut out = String::new();

        writeln!(out, "=== Achievement Summary for Student {student_id} ===")?;
        write_level_bars(&mut out, &counts)?;
        writeln!(out)?;
        writeln!(out, "Total Outcomes Assessed: {}", counts.total())?;

        let avg = counts.average_score().unwrap_or_default();
        writeln!(out, "Average Achievement Score: {avg:.2}/4.0")?;
        writeln!(out, "Overall Performance: {}", AchievementBand::classify(avg).label())?;
        Ok(out)
    }

    pub fn render_comparison(&self, student_id: i64, course_id: i64) -> ReportResult<String> {
        let cmp = self.compare_student_performance(student_id, course_id)?;
        let mut out = String::new();

        writeln!(out, "=== Performance Comparison ===")?;
        writeln!(out, "Student {student_id} Average: {:.2}/4.0", cmp.student_score)?;
        writeln!(out, "Course Average: {:.2}/4.0", cmp.course_score)?;
        match cmp.standing {
            Standing::Above => writeln!(
                out,
                "Performing {:.2} points above course average",
                cmp.difference
            )?,
            Standing::Below => writeln!(
                out,
                "Performing {:.2} points below course average",
                cmp.difference.abs()
            )?,
            Standing::AtAverage => writeln!(out, "Performing at course average")?,
        }
        Ok(out)
    }

    /// Per-course attendance for one student, with the mean of course rates
    pub fn render_student_attendance(&self, student_id: i64) -> ReportResult<String> {
        self.student(student_id)?;
        let rows = self
            .store
            .fetch_all(&Query::StudentAttendanceByCourse { student_id })?;
        if rows.is_empty() {
            return Err(ReportError::NoData("no attendance records found"));
        }

        let mut out = String::new();
        writeln!(out, "=== Attendance Summary for Student {student_id} ===")?;
        writeln!(out, "{}", render_rows(&rows))?;
        writeln!(out)?;
        writeln!(out, "Overall Attendance: {:.2}%", mean_percentage(&rows)?)?;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Course-level reports
    // ------------------------------------------------------------------------

    pub fn render_course_report(&self, course_id: i64) -> ReportResult<String> {
        let course = self.course(course_id)?;
        let enrolled = self.count(&Query::CourseEnrollment { course_id })?;
        let stats = ScoreStats::from_scores(&self.scores(&Query::CourseScores { course_id })?);
        let attendance = attendance_summary(
            self.attendance_counts(&Query::CourseAttendanceStatusCounts { course_id })?,
        )
        .ok();

        let mut out = String::new();
        banner(&mut out, "COURSE REPORT", REPORT_WIDTH)?;
        writeln!(out)?;
        writeln!(out, "Course ID: {}", course.id)?;
        writeln!(out, "Course Code: {}", course.code)?;
        writeln!(out, "Course Name: {}", course.name)?;
        writeln!(out, "Credits: {}", course.credits)?;
        writeln!(out)?;
        rule(&mut out, '-', REPORT_WIDTH)?;

        writeln!(out)?;
        writeln!(out, "ENROLLMENT")?;
        writeln!(out, "Total Students Enrolled: {enrolled}")?;

        writeln!(out)?;
        writeln!(out, "ACADEMIC PERFORMANCE")?;
        match &stats {
            Some(s) => {
                writeln!(out, "Average Score: {:.2}%", s.average)?;
                writeln!(out, "Highest Score: {:.2}%", s.max)?;
                writeln!(out, "Lowest Score: {:.2}%", s.min)?;
                writeln!(out)?;
                writeln!(out, "GRADE DISTRIBUTION")?;
                let total = s.histogram.total() as f64;
                for (label, count) in s.histogram.buckets() {
                    writeln!(out, "  {label:<11} {count} ({:.1}%)", count as f64 / total * 100.0)?;
                }
            }
            None => writeln!(out, "No grades recorded")?,
        }

        if let Some(a) = attendance {
            writeln!(out)?;
            writeln!(out, "ATTENDANCE")?;
            writeln!(out, "Average Attendance Rate: {:.2}%", a.percentage)?;
        }

        writeln!(out)?;
        rule(&mut out, '=', REPORT_WIDTH)?;
        Ok(out)
    }

    pub fn render_course_statistics(&self, course_id: i64) -> ReportResult<String> {
        let stats = self.course_statistics(course_id)?;
        let mut out = String::new();

        writeln!(out, "=== Course Statistics ===")?;
        writeln!(out, "Total Students: {}", stats.count)?;
        writeln!(out, "Average Score: {:.2}%", stats.average)?;
        writeln!(out, "Highest Score: {:.2}%", stats.max)?;
        writeln!(out, "Lowest Score: {:.2}%", stats.min)?;
        writeln!(out)?;
        writeln!(out, "Grade Distribution:")?;
        for (label, count) in stats.histogram.buckets() {
            writeln!(out, "  {label:<11} {count} students")?;
        }
        Ok(out)
    }

    pub fn render_course_achievement(&self, course_id: i64) -> ReportResult<String> {
        let counts = self.course_achievement(course_id)?;
        let mut out = String::new();

        writeln!(out, "=== Achievement Statistics for Course {course_id} ===")?;
        write_level_bars(&mut out, &counts)?;
        writeln!(out)?;
        writeln!(out, "Total Assessments: {}", counts.total())?;
        writeln!(out, "Success Rate (Met/Exceeded): {:.1}%", counts.success_rate())?;
        Ok(out)
    }

    /// Per-student attendance in one course, with the mean of student rates
    pub fn render_course_attendance(&self, course_id: i64) -> ReportResult<String> {
        self.course(course_id)?;
        let rows = self
            .store
            .fetch_all(&Query::CourseAttendanceByStudent { course_id })?;
        if rows.is_empty() {
            return Err(ReportError::NoData("no attendance records found for this course"));
        }

        let mut out = String::new();
        writeln!(out, "=== Course Attendance Report ===")?;
        writeln!(out, "{}", render_rows(&rows))?;
        writeln!(out)?;
        writeln!(out, "Course Average Attendance: {:.2}%", mean_percentage(&rows)?)?;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // School-wide reports
    // ------------------------------------------------------------------------

    pub fn render_semester_report(&self, semester: &str, year: i64) -> ReportResult<String> {
        let semester = semester.trim().to_string();
        let scores = self.scores(&Query::SemesterScores { semester: semester.clone(), year })?;
        let stats = ScoreStats::from_scores(&scores)
            .ok_or(ReportError::NoData("no grades recorded for this semester"))?;
        let enrolled = self.count(&Query::SemesterEnrollment { semester: semester.clone(), year })?;
        let breakdown = self
            .store
            .fetch_all(&Query::SemesterCourseBreakdown { semester: semester.clone(), year })?;

        let mut out = String::new();
        banner(&mut out, &format!("SEMESTER REPORT: {semester} {year}"), REPORT_WIDTH)?;
        writeln!(out)?;
        writeln!(out, "Students Enrolled: {enrolled}")?;
        writeln!(out)?;
        writeln!(out, "ACADEMIC PERFORMANCE")?;
        writeln!(out, "Total Grades Issued: {}", stats.count)?;
        writeln!(out, "Semester Average: {:.2}%", stats.average)?;
        writeln!(out, "Semester GPA: {:.2}/4.0", stats.gpa())?;

        if !breakdown.is_empty() {
            writeln!(out)?;
            writeln!(out, "COURSE-WISE BREAKDOWN")?;
            writeln!(out, "{}", render_rows(&breakdown))?;
        }

        writeln!(out)?;
        rule(&mut out, '=', REPORT_WIDTH)?;
        Ok(out)
    }

    pub fn render_overall_statistics(&self) -> ReportResult<String> {
        let stats = self.overall_statistics()?;
        let mut out = String::new();

        banner(&mut out, "OVERALL SYSTEM STATISTICS", REPORT_WIDTH)?;
        writeln!(out)?;
        writeln!(out, "STUDENTS")?;
        writeln!(out, "Total Students: {}", stats.students_total)?;
        writeln!(out, "  Active: {}", stats.students_active)?;
        writeln!(out, "  Inactive: {}", stats.students_inactive)?;
        writeln!(out, "  Graduated: {}", stats.students_graduated)?;

        writeln!(out)?;
        writeln!(out, "COURSES")?;
        writeln!(out, "Total Courses: {}", stats.courses)?;

        writeln!(out)?;
        writeln!(out, "ACADEMIC RECORDS")?;
        match &stats.scores {
            Some(s) => {
                writeln!(out, "Total Grade Records: {}", s.count)?;
                writeln!(out, "System-wide Average Score: {:.2}%", s.average)?;
                writeln!(out, "System-wide GPA: {:.2}/4.0", s.gpa())?;
            }
            None => writeln!(out, "No data available")?,
        }

        writeln!(out)?;
        writeln!(out, "ATTENDANCE")?;
        match stats.attendance_rate {
            Some(rate) => {
                writeln!(out, "Total Attendance Records: {}", stats.attendance_records)?;
                writeln!(out, "System-wide Attendance Rate: {rate:.2}%")?;
            }
            None => writeln!(out, "No data available")?,
        }

        writeln!(out)?;
        writeln!(out, "DOCUMENTS")?;
        writeln!(out, "Total Documents: {}", stats.documents)?;
        writeln!(out)?;
        rule(&mut out, '=', REPORT_WIDTH)?;
        Ok(out)
    }

    pub fn render_top_performers(&self) -> ReportResult<String> {
        let limit = i64::from(self.config.top_limit);
        let rows = with_gpa(self.store.fetch_all(&Query::TopPerformers {
            min_courses: i64::from(self.config.top_min_courses),
            limit,
        })?)?;
        if rows.is_empty() {
            return Err(ReportError::NoData("no students with enough graded courses"));
        }

        let mut out = String::new();
        writeln!(out, "TOP {limit} PERFORMERS")?;
        rule(&mut out, '=', REPORT_WIDTH)?;
        writeln!(out, "{}", render_rows(&rows))?;
        Ok(out)
    }

    pub fn render_low_performers(&self) -> ReportResult<String> {
        let threshold = self.config.low_score_threshold;
        let rows = with_gpa(self.store.fetch_all(&Query::LowPerformers {
            threshold,
            limit: i64::from(self.config.top_limit),
        })?)?;

        let mut out = String::new();
        if rows.is_empty() {
            writeln!(out, "No students with average score below {threshold}%")?;
            return Ok(out);
        }
        writeln!(out, "STUDENTS NEEDING SUPPORT (Score < {threshold}%)")?;
        rule(&mut out, '=', REPORT_WIDTH)?;
        writeln!(out, "{}", render_rows(&rows))?;
        writeln!(out)?;
        writeln!(out, "{} student(s) may need additional academic support", rows.len())?;
        Ok(out)
    }

    pub fn render_attendance_summary(&self) -> ReportResult<String> {
        let limit = i64::from(self.config.attendance_summary_limit);
        let rows = self.store.fetch_all(&Query::ActiveAttendanceSummary { limit })?;
        if rows.is_empty() {
            return Err(ReportError::NoData("no attendance data available"));
        }

        let threshold = self.config.low_attendance_threshold;
        let mut below = 0;
        for row in &rows {
            if row.f64("percentage")? < threshold {
                below += 1;
            }
        }

        let mut out = String::new();
        writeln!(out, "ATTENDANCE SUMMARY (Bottom {limit} Students)")?;
        rule(&mut out, '=', REPORT_WIDTH)?;
        writeln!(out, "{}", render_rows(&rows))?;
        if below > 0 {
            writeln!(out)?;
            writeln!(out, "{below} student(s) have attendance below {threshold}%")?;
        }
        Ok(out)
    }

    pub fn render_low_attendance(&self) -> ReportResult<String> {
        let threshold = self.config.low_attendance_threshold;
        let rows = self
            .store
            .fetch_all(&Query::LowAttendanceStudents { threshold })?;

        let mut out = String::new();
        if rows.is_empty() {
            writeln!(out, "No students with attendance below {threshold}%")?;
            return Ok(out);
        }
        writeln!(out, "=== Students with Attendance Below {threshold}% ===")?;
        writeln!(out, "{}", render_rows(&rows))?;
        writeln!(out)?;
        writeln!(out, "{} student(s) need attention", rows.len())?;
        Ok(out)
    }

    pub fn render_attendance_by_date(&self, date: &str) -> ReportResult<String> {
        let rows = self
            .store
            .fetch_all(&Query::AttendanceByDate { date: date.trim().to_string() })?;
        if rows.is_empty() {
            return Err(ReportError::NoData("no attendance records for that date"));
        }

        let mut present = 0;
        let mut absent = 0;
        for row in &rows {
            match AttendanceStatus::parse(row.str("status")?) {
                Some(AttendanceStatus::Present) => present += 1,
                Some(AttendanceStatus::Absent) => absent += 1,
                _ => {}
            }
        }

        let mut out = String::new();
        writeln!(out, "=== Attendance for {} ===", date.trim())?;
        writeln!(out, "{}", render_rows(&rows))?;
        writeln!(out)?;
        writeln!(
            out,
            "Summary: Total: {} | Present: {present} | Absent: {absent}",
            rows.len()
        )?;
        Ok(out)
    }
}

// ============================================================================
// RENDER HELPERS
// ============================================================================

fn rule(out: &mut String, ch: char, width: usize) -> std::fmt::Result {
    writeln!(out, "{}", ch.to_string().repeat(width))
}

fn banner(out: &mut String, title: &str, width: usize) -> std::fmt::Result {
    rule(out, '=', width)?;
    writeln!(out, "{}", format!("{title:^width$}").trim_end())?;
    rule(out, '=', width)
}

fn write_gpa_block(out: &mut String, student_id: i64, summary: &GpaSummary) -> std::fmt::Result {
    writeln!(out, "=== GPA Summary ===")?;
    writeln!(out, "Student ID: {student_id}")?;
    writeln!(out, "Total Courses: {}", summary.courses)?;
    writeln!(out, "Average Score: {:.2}%", summary.average_score)?;
    writeln!(out, "GPA (4.0 scale): {:.2}", summary.gpa)
}

fn write_level_bars(out: &mut String, counts: &AchievementCounts) -> std::fmt::Result {
    for (level, count) in counts.levels() {
        let share = counts.share(*count);
        writeln!(out, "{level:<20} {count:>3} ({share:>5.1}%) {}", share_bar(share))?;
    }
    Ok(())
}

/// Append a flat `gpa` column derived from `avg_score`
fn with_gpa(rows: Vec<Row>) -> ReportResult<Vec<Row>> {
    rows.into_iter()
        .map(|row| {
            let gpa = row.f64("avg_score")? / 100.0 * 4.0;
            Ok(row.with("gpa", (gpa * 100.0).round() / 100.0))
        })
        .collect()
}

fn mean_percentage(rows: &[Row]) -> ReportResult<f64> {
    let mut sum = 0.0;
    for row in rows {
        sum += row.f64("percentage")?;
    }
    Ok(sum / rows.len().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::grading::AttendanceBand;
    use crate::store::SqliteStore;
    use pretty_assertions::assert_eq;
    use rusqlite::Connection;

    /// Store answering from canned rows, for driving the engine without SQL
    struct FixedStore {
        answers: Vec<(Query, Vec<Row>)>,
    }

    impl RecordStore for FixedStore {
        fn fetch_all(&self, query: &Query) -> Result<Vec<Row>, crate::error::StoreError> {
            Ok(self
                .answers
                .iter()
                .find(|(q, _)| q == query)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }
    }

    fn student_row(id: i64) -> Row {
        Row::new()
            .with("student_id", id)
            .with("first_name", "Ada")
            .with("last_name", "Lovelace")
            .with("email", "ada@example.com")
            .with("phone", serde_json::Value::Null)
            .with("date_of_birth", serde_json::Value::Null)
            .with("enrollment_date", "2023-09-01")
            .with("status", "active")
    }

    fn record_row(semester: &str, year: i64, code: &str, credits: i64, score: f64) -> Row {
        Row::new()
            .with("semester", semester)
            .with("year", year)
            .with("course_code", code)
            .with("course_name", format!("Course {code}"))
            .with("credits", credits)
            .with("grade", "B")
            .with("score", score)
    }

    /// Ada: 3 records over two semesters, attendance 3/4 in CS101, 4 outcomes.
    /// Alan: no records at all.
    fn seeded_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO students (first_name, last_name, email, enrollment_date, status) VALUES
                ('Ada', 'Lovelace', 'ada@example.com', '2023-09-01', 'active'),
                ('Alan', 'Turing', 'alan@example.com', '2023-09-01', 'graduated');
             INSERT INTO courses (course_code, course_name, credits) VALUES
                ('CS101', 'Intro to CS', 3),
                ('CS102', 'Data Structures', 4),
                ('CS201', 'Algorithms', 3);
             INSERT INTO academic_records (student_id, course_id, semester, year, grade, score) VALUES
                (1, 1, 'Fall', 2023, 'A', 90.0),
                (1, 2, 'Fall', 2023, 'B', 80.0),
                (1, 3, 'Spring', 2024, 'C', 70.0);
             INSERT INTO attendance (student_id, course_id, attendance_date, status) VALUES
                (1, 1, '2023-09-04', 'present'),
                (1, 1, '2023-09-05', 'present'),
                (1, 1, '2023-09-06', 'present'),
                (1, 1, '2023-09-07', 'absent');
             INSERT INTO learning_outcomes (student_id, course_id, outcome_description, achievement_level) VALUES
                (1, 1, 'Loops', 'met'),
                (1, 1, 'Recursion', 'met'),
                (1, 1, 'Sorting', 'exceeded'),
                (1, 1, 'Proofs', 'not_met');
             INSERT INTO documents (student_id, document_type, document_name) VALUES
                (1, 'Transcript', 'Official transcript');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_transcript_semester_gpas() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let transcript = engine.transcript(1).unwrap();
        assert_eq!(transcript.semesters.len(), 2);
        assert_eq!(format!("{:.2}", transcript.semesters[0].gpa()), "3.43");
        assert_eq!(format!("{:.2}", transcript.semesters[1].gpa()), "2.00");

        let text = engine.render_transcript(1).unwrap();
        assert!(text.contains("Fall 2023"));
        assert!(text.contains("Semester Credits: 7 | Semester GPA: 3.43"));
        // The last semester is flushed too
        assert!(text.contains("Semester Credits: 3 | Semester GPA: 2.00"));
        assert!(text.contains("GPA (4.0 scale): 3.20"));
    }

    #[test]
    fn test_transcript_without_records() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let text = engine.render_transcript(2).unwrap();
        assert!(text.contains("Student Name: Alan Turing"));
        assert!(text.contains("No academic records found."));
        assert!(!text.contains("Semester GPA"));
    }

    #[test]
    fn test_unknown_student_is_not_found() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        assert!(matches!(
            engine.render_transcript(99),
            Err(ReportError::NotFound { entity: "Student", id: 99 })
        ));
        assert!(matches!(
            engine.render_student_report(99),
            Err(ReportError::NotFound { .. })
        ));
        assert!(matches!(
            engine.render_course_report(42),
            Err(ReportError::NotFound { entity: "Course", .. })
        ));
    }

    #[test]
    fn test_gpa_and_no_data() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let gpa = engine.compute_gpa(1).unwrap();
        assert_eq!(gpa.courses, 3);
        assert!((gpa.gpa - 3.2).abs() < 1e-9);

        assert!(matches!(engine.compute_gpa(2), Err(ReportError::NoData(_))));
    }

    #[test]
    fn test_attendance_percentage_good_at_75() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let summary = engine.compute_attendance_percentage(1, 1).unwrap();
        assert_eq!(summary.percentage, 75.0);
        assert_eq!(summary.band, AttendanceBand::Good);

        assert!(matches!(
            engine.compute_attendance_percentage(1, 2),
            Err(ReportError::NoData(_))
        ));
        let text = engine.render_attendance_percentage(1, 1).unwrap();
        assert!(text.contains("Attendance Percentage: 75.00%"));
        assert!(text.contains("Status: Good"));
    }

    #[test]
    fn test_achievement_summary_satisfactory() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let text = engine.render_achievement_summary(1).unwrap();
        let expected = "\
=== Achievement Summary for Student 1 ===
exceeded               1 ( 25.0%) █████
met                    2 ( 50.0%) ██████████
not_met                1 ( 25.0%) █████

Total Outcomes Assessed: 4
Average Achievement Score: 2.75/4.0
Overall Performance: Satisfactory
";
        assert_eq!(text, expected);

        assert!(matches!(
            engine.render_achievement_summary(2),
            Err(ReportError::NoData(_))
        ));
    }

    #[test]
    fn test_course_achievement_and_comparison() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let text = engine.render_course_achievement(1).unwrap();
        assert!(text.contains("Success Rate (Met/Exceeded): 75.0%"));

        // Only student in the course, so exactly at the average
        let cmp = engine.compare_student_performance(1, 1).unwrap();
        assert_eq!(cmp.standing, Standing::AtAverage);
        assert!(engine
            .render_comparison(1, 1)
            .unwrap()
            .contains("Performing at course average"));

        assert!(matches!(
            engine.compare_student_performance(2, 1),
            Err(ReportError::NoData(_))
        ));
    }

    #[test]
    fn test_student_report_sections() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let text = engine.render_student_report(1).unwrap();
        assert!(text.contains("Total Courses Completed: 3"));
        assert!(text.contains("GPA (4.0 scale): 3.20"));
        assert!(text.contains("Attendance Rate: 75.00%"));
        assert!(text.contains("Status: Good"));
        assert!(text.contains("Total Outcomes Assessed: 4"));
        assert!(text.contains("Total Documents on File: 1"));
        assert!(text.contains("GOOD - Student is performing well"));

        let empty = engine.render_student_report(2).unwrap();
        assert!(empty.contains("No academic records available"));
        assert!(empty.contains("Insufficient data for overall assessment"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        assert_eq!(engine.render_student_report(1).unwrap(), engine.render_student_report(1).unwrap());
        assert_eq!(engine.render_transcript(1).unwrap(), engine.render_transcript(1).unwrap());
        assert_eq!(
            engine.render_overall_statistics().unwrap(),
            engine.render_overall_statistics().unwrap()
        );
    }

    #[test]
    fn test_course_report_histogram() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let text = engine.render_course_report(1).unwrap();
        assert!(text.contains("Total Students Enrolled: 1"));
        assert!(text.contains("A (90-100)  1 (100.0%)"));
        assert!(text.contains("Average Attendance Rate: 75.00%"));

        let stats = engine.course_statistics(1).unwrap();
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_semester_and_overall_statistics() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let text = engine.render_semester_report("Fall", 2023).unwrap();
        assert!(text.contains("SEMESTER REPORT: Fall 2023"));
        assert!(text.contains("Total Grades Issued: 2"));
        assert!(text.contains("Semester Average: 85.00%"));
        assert!(text.contains("CS102"));
        assert!(matches!(
            engine.render_semester_report("Winter", 1999),
            Err(ReportError::NoData(_))
        ));

        let stats = engine.overall_statistics().unwrap();
        assert_eq!(stats.students_total, 2);
        assert_eq!(stats.students_graduated, 1);
        assert_eq!(stats.courses, 3);
        assert_eq!(stats.attendance_rate, Some(75.0));
        assert_eq!(stats.documents, 1);
    }

    #[test]
    fn test_leaderboards_respect_config() {
        let conn = seeded_db();
        let mut config = ReportConfig::default();
        config.low_score_threshold = 85.0;
        let engine = ReportEngine::with_config(SqliteStore::new(&conn), config);

        let top = engine.render_top_performers().unwrap();
        assert!(top.contains("Lovelace"));
        assert!(top.contains("3.20"));

        let low = engine.render_low_performers().unwrap();
        assert!(low.contains("1 student(s) may need additional academic support"));

        let summary = engine.render_attendance_summary().unwrap();
        assert!(!summary.contains("below"));

        let low_att = engine.render_low_attendance().unwrap();
        assert!(low_att.starts_with("No students with attendance below 75%"));
    }

    #[test]
    fn test_attendance_listings() {
        let conn = seeded_db();
        let engine = ReportEngine::new(SqliteStore::new(&conn));

        let by_course = engine.render_course_attendance(1).unwrap();
        assert!(by_course.contains("Course Average Attendance: 75.00%"));

        let by_student = engine.render_student_attendance(1).unwrap();
        assert!(by_student.contains("Overall Attendance: 75.00%"));

        let by_date = engine.render_attendance_by_date("2023-09-07").unwrap();
        assert!(by_date.contains("Summary: Total: 1 | Present: 0 | Absent: 1"));

        assert!(matches!(
            engine.render_attendance_by_date("2000-01-01"),
            Err(ReportError::NoData(_))
        ));
    }

    #[test]
    fn test_engine_over_injected_store() {
        let store = FixedStore {
            answers: vec![
                (Query::StudentById { student_id: 7 }, vec![student_row(7)]),
                (
                    Query::TranscriptRecords { student_id: 7 },
                    vec![
                        record_row("Fall", 2023, "CS101", 3, 90.0),
                        record_row("Fall", 2023, "CS102", 4, 80.0),
                        record_row("Spring", 2024, "CS201", 3, 70.0),
                    ],
                ),
                (
                    Query::StudentOutcomeLevels { student_id: 7 },
                    vec![
                        Row::new().with("achievement_level", "exceeded").with("count", 1),
                        Row::new().with("achievement_level", "mystery").with("count", 1),
                    ],
                ),
            ],
        };
        let engine = ReportEngine::new(store);

        let transcript = engine.transcript(7).unwrap();
        let keys: Vec<&str> = transcript.semesters.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["Fall 2023", "Spring 2024"]);

        // Unknown level weighs nothing: (4 + 0) / 2
        let counts = engine.achievement_summary(7).unwrap();
        assert_eq!(counts.average_score(), Some(2.0));
    }
}
