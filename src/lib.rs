// LearnTrack - Core Library
// Exposes all modules for use in the CLI, the report server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod grading;
pub mod output;
pub mod reports;
pub mod shell;
pub mod store;
pub mod transcript;
pub mod validators;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError, DatabaseConfig, ReportConfig, ServerConfig};
pub use db::{
    count_rows, import_courses, import_students, load_courses_csv, load_students_csv,
    open_database, render_history, setup_database, ImportSummary, Table,
};
pub use error::{
    RecordsError, RecordsResult, ReportError, ReportResult, StoreError, ValidationError,
};
pub use grading::{
    grade_point, flat_gpa, AchievementBand, AchievementCounts, AttendanceBand, AttendanceCounts,
    AttendanceSummary, GpaSummary, OverallAssessment, PerformanceComparison, ScoreStats,
};
pub use reports::{ReportEngine, Transcript};
pub use store::{Query, RecordStore, Row, SqliteStore};
pub use transcript::{group_semesters, SemesterBlock, TranscriptEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
