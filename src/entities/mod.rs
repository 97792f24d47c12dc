// Entity models - one module per table
//
// Each entity has:
// - a typed row struct (snapshot read from the store)
// - a New* struct validated before insert
// - a closed enum of updatable fields where the table supports updates
// - repository functions over a rusqlite Connection

pub mod student;
pub mod course;
pub mod academic;
pub mod attendance;
pub mod document;
pub mod outcome;

pub use student::{NewStudent, Student, StudentField, StudentStatus};
pub use course::{Course, NewCourse};
pub use academic::{AcademicRecord, AcademicRecordField, NewAcademicRecord, StudentGrade};
pub use attendance::{AttendanceEntry, AttendanceStatus, AttendanceView, MarkOutcome};
pub use document::{Document, DocumentType, NewDocument};
pub use outcome::{
    AchievementLevel, CourseOutcomeView, LearningOutcome, NewLearningOutcome, OutcomeField,
    StudentOutcomeView,
};
