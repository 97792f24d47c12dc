// LearnTrack CLI
//
// `learntrack` with no subcommand opens the interactive shell.

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use learntrack::shell::{LinePrompt, Shell};
use learntrack::{
    count_rows, import_courses, import_students, load_courses_csv, load_students_csv,
    open_database, render_history, AppConfig, ImportSummary, ReportEngine, ReportResult,
    SqliteStore, Table,
};
use rusqlite::Connection;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "learntrack", version, about = "Student records and academic reporting")]
struct Cli {
    /// Config file (defaults to ./learntrack.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database schema.
    Init,
    /// Interactive menu (default).
    Shell,
    /// Import rows from a CSV file.
    Import {
        #[command(subcommand)]
        kind: ImportKind,
    },
    /// Print a report.
    Report {
        #[command(subcommand)]
        report: ReportCommand,
    },
    /// Browse students, courses and grades in the terminal.
    Browse,
    /// Audit trail of one record, newest first.
    History {
        #[arg(value_enum)]
        entity: HistoryEntity,
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HistoryEntity {
    Student,
    Course,
    AcademicRecord,
    Document,
    LearningOutcome,
}

impl HistoryEntity {
    fn entity_type(self) -> &'static str {
        match self {
            HistoryEntity::Student => "student",
            HistoryEntity::Course => "course",
            HistoryEntity::AcademicRecord => "academic_record",
            HistoryEntity::Document => "document",
            HistoryEntity::LearningOutcome => "learning_outcome",
        }
    }
}

#[derive(Debug, Subcommand)]
enum ImportKind {
    /// Columns: first_name,last_name,email,phone,date_of_birth
    Students { file: PathBuf },
    /// Columns: course_code,course_name,credits,description
    Courses { file: PathBuf },
}

#[derive(Debug, Subcommand)]
enum ReportCommand {
    /// Semester-by-semester transcript.
    Transcript { student_id: i64 },
    /// Student performance report.
    Student { student_id: i64 },
    /// Course report.
    Course { course_id: i64 },
    /// Flat GPA over every graded course.
    Gpa { student_id: i64 },
    /// Attendance percentage for one student in one course.
    Attendance { student_id: i64, course_id: i64 },
    /// Institution-wide statistics.
    Overall,
    /// Every grade recorded in a semester.
    Semester { name: String, year: i64 },
    /// Highest average scores.
    Top,
    /// Students below the low-score threshold.
    Low,
    /// Attendance rate per active student.
    AttendanceSummary,
    /// Learning outcome achievement summary.
    Achievements { student_id: i64 },
}

fn main() {
    if let Err(error) = run() {
        eprintln!("learntrack error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    let conn = open_database(&config.database.path, config.database.wal).with_context(|| {
        format!("failed to open database {}", config.database.path.display())
    })?;

    match cli.command.unwrap_or(Command::Shell) {
        Command::Init => {
            println!("Database ready at {}", config.database.path.display());
            for table in Table::ALL {
                println!("  {:<18} {}", table.name(), count_rows(&conn, table)?);
            }
            Ok(())
        }
        Command::Shell => run_shell(&conn, &config),
        Command::Import { kind } => run_import(&conn, kind),
        Command::Report { report } => run_report(&conn, &config, report),
        Command::Browse => run_browser(&conn, &config),
        Command::History { entity, id } => {
            print!("{}", render_history(&conn, entity.entity_type(), id)?);
            Ok(())
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("LEARNTRACK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // stderr keeps log lines out of menus and reports
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run_shell(conn: &Connection, config: &AppConfig) -> Result<()> {
    let prompt = LinePrompt::new().context("failed to open terminal input")?;
    let mut shell = Shell::new(conn, config.reports.clone(), prompt, std::io::stdout());
    shell.run().context("shell I/O failed")
}

fn run_import(conn: &Connection, kind: ImportKind) -> Result<()> {
    let (label, summary): (&str, ImportSummary) = match kind {
        ImportKind::Students { file } => {
            let rows = load_students_csv(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            ("students", import_students(conn, &rows)?)
        }
        ImportKind::Courses { file } => {
            let rows = load_courses_csv(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            ("courses", import_courses(conn, &rows)?)
        }
    };

    println!("Imported {} {label}", summary.inserted);
    if summary.duplicates > 0 {
        println!("Skipped {} duplicates", summary.duplicates);
    }
    if summary.invalid > 0 {
        println!("Skipped {} invalid rows", summary.invalid);
    }
    Ok(())
}

fn run_report(conn: &Connection, config: &AppConfig, report: ReportCommand) -> Result<()> {
    let engine = ReportEngine::with_config(SqliteStore::new(conn), config.reports.clone());

    let rendered: ReportResult<String> = match report {
        ReportCommand::Transcript { student_id } => engine.render_transcript(student_id),
        ReportCommand::Student { student_id } => engine.render_student_report(student_id),
        ReportCommand::Course { course_id } => engine.render_course_report(course_id),
        ReportCommand::Gpa { student_id } => engine.render_gpa(student_id),
        ReportCommand::Attendance {
            student_id,
            course_id,
        } => engine.render_attendance_percentage(student_id, course_id),
        ReportCommand::Overall => engine.render_overall_statistics(),
        ReportCommand::Semester { name, year } => engine.render_semester_report(&name, year),
        ReportCommand::Top => engine.render_top_performers(),
        ReportCommand::Low => engine.render_low_performers(),
        ReportCommand::AttendanceSummary => engine.render_attendance_summary(),
        ReportCommand::Achievements { student_id } => engine.render_achievement_summary(student_id),
    };

    print!("{}", rendered?);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_browser(conn: &Connection, config: &AppConfig) -> Result<()> {
    let mut app = ui::App::new(conn, config.reports.clone()).context("failed to load records")?;
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_browser(_conn: &Connection, _config: &AppConfig) -> Result<()> {
    anyhow::bail!("browse needs the `tui` feature: cargo build --features tui")
}
