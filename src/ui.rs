// Read-only terminal browser over students, courses and grades
//
// Students and Courses list everything; Grades follows the student selected
// on the Students page. Enter opens a detail panel with the full student or
// course report.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use learntrack::entities::{academic, course, student, Course, Student, StudentGrade};
use learntrack::{RecordsResult, ReportConfig, ReportEngine, SqliteStore};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;
use tracing::warn;

const PAGE_JUMP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Students,
    Courses,
    Grades,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Students, Page::Courses, Page::Grades];

    pub fn next(&self) -> Self {
        match self {
            Page::Students => Page::Courses,
            Page::Courses => Page::Grades,
            Page::Grades => Page::Students,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Students => Page::Grades,
            Page::Courses => Page::Students,
            Page::Grades => Page::Courses,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Students => "Students",
            Page::Courses => "Courses",
            Page::Grades => "Grades",
        }
    }
}

pub struct App<'c> {
    conn: &'c Connection,
    engine: ReportEngine<SqliteStore<'c>>,
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    /// Grades of the selected student
    pub grades: Vec<StudentGrade>,
    pub current_page: Page,
    pub student_state: TableState,
    pub course_state: TableState,
    pub grade_state: TableState,
    pub show_detail: bool,
    pub detail: String,
    pub detail_scroll: u16,
}

impl<'c> App<'c> {
    pub fn new(conn: &'c Connection, reports: ReportConfig) -> RecordsResult<Self> {
        let students = student::get_all_students(conn)?;
        let courses = course::get_all_courses(conn)?;

        let mut app = Self {
            conn,
            engine: ReportEngine::with_config(SqliteStore::new(conn), reports),
            student_state: first_selected(students.len()),
            course_state: first_selected(courses.len()),
            grade_state: TableState::default(),
            students,
            courses,
            grades: Vec::new(),
            current_page: Page::Students,
            show_detail: false,
            detail: String::new(),
            detail_scroll: 0,
        };
        app.refresh_grades();
        Ok(app)
    }

    pub fn selected_student(&self) -> Option<&Student> {
        self.student_state.selected().and_then(|i| self.students.get(i))
    }

    pub fn selected_course(&self) -> Option<&Course> {
        self.course_state.selected().and_then(|i| self.courses.get(i))
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
        if self.show_detail {
            self.refresh_detail();
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.after_move();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.after_move();
    }

    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
        self.after_move();
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
        self.after_move();
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| (i + PAGE_JUMP).min(len - 1));
        state.select(Some(i));
        self.after_move();
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_JUMP));
        state.select(Some(i));
        self.after_move();
    }

    pub fn first(&mut self) {
        let (state, len) = self.active();
        if len > 0 {
            state.select(Some(0));
            self.after_move();
        }
    }

    pub fn last(&mut self) {
        let (state, len) = self.active();
        if len > 0 {
            state.select(Some(len - 1));
            self.after_move();
        }
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Students => (&mut self.student_state, self.students.len()),
            Page::Courses => (&mut self.course_state, self.courses.len()),
            Page::Grades => (&mut self.grade_state, self.grades.len()),
        }
    }

    fn after_move(&mut self) {
        if self.current_page == Page::Students {
            self.refresh_grades();
        }
        if self.show_detail {
            self.refresh_detail();
        }
    }

    fn refresh_grades(&mut self) {
        let Some(student_id) = self.selected_student().map(|s| s.id) else {
            self.grades.clear();
            self.grade_state.select(None);
            return;
        };
        self.grades = match academic::get_student_grades(self.conn, student_id) {
            Ok(grades) => grades,
            Err(e) => {
                warn!(student_id, error = %e, "failed to load grades");
                Vec::new()
            }
        };
        self.grade_state = first_selected(self.grades.len());
    }

    /// Students and Grades show the student report, Courses the course report
    fn refresh_detail(&mut self) {
        self.detail_scroll = 0;
        let rendered = match self.current_page {
            Page::Students | Page::Grades => self
                .selected_student()
                .map(|s| self.engine.render_student_report(s.id)),
            Page::Courses => self
                .selected_course()
                .map(|c| self.engine.render_course_report(c.id)),
        };
        self.detail = match rendered {
            Some(Ok(text)) => text,
            Some(Err(e)) => e.to_string(),
            None => "Nothing selected".to_string(),
        };
    }

    pub fn scroll_detail(&mut self, down: bool) {
        self.detail_scroll = if down {
            self.detail_scroll.saturating_add(1)
        } else {
            self.detail_scroll.saturating_sub(1)
        };
    }
}

fn first_selected(len: usize) -> TableState {
    let mut state = TableState::default();
    if len > 0 {
        state.select(Some(0));
    }
    state
}

pub fn run_ui(app: &mut App<'_>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::Char('J') if app.show_detail => app.scroll_detail(true),
                KeyCode::Char('K') if app.show_detail => app.scroll_detail(false),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content = if app.show_detail {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        render_detail_panel(f, split[1], app);
        split[0]
    } else {
        chunks[1]
    };

    match app.current_page {
        Page::Students => render_students(f, content, app),
        Page::Courses => render_courses(f, content, app),
        Page::Grades => render_grades(f, content, app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App<'_>) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Students: {}", app.students.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Courses: {}", app.courses.len()),
        Style::default().fg(Color::White),
    ));
    if let Some(student) = app.selected_student() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            student.full_name(),
            Style::default().fg(Color::Green),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn listing<'a>(rows: Vec<Row<'a>>, widths: &[Constraint], header: Row<'a>, title: &'a str) -> Table<'a> {
    Table::new(rows, widths.to_vec())
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ")
}

fn render_students(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let rows = app
        .students
        .iter()
        .map(|s| {
            let color = match s.status.as_str() {
                "active" => Color::Green,
                "graduated" => Color::Cyan,
                _ => Color::DarkGray,
            };
            Row::new(vec![
                Cell::from(s.id.to_string()),
                Cell::from(truncate(&s.full_name(), 28)),
                Cell::from(truncate(&s.email, 30)),
                Cell::from(s.enrollment_date.clone()),
                Cell::from(s.status.to_string()).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let table = listing(
        rows,
        &[
            Constraint::Length(6),
            Constraint::Length(30),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(10),
        ],
        header_row(&["ID", "Name", "Email", "Enrolled", "Status"]),
        " Students ",
    );
    f.render_stateful_widget(table, area, &mut app.student_state);
}

fn render_courses(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let rows = app
        .courses
        .iter()
        .map(|c| {
            Row::new(vec![
                Cell::from(c.id.to_string()),
                Cell::from(c.code.clone()),
                Cell::from(truncate(&c.name, 36)),
                Cell::from(c.credits.to_string()),
            ])
        })
        .collect();

    let table = listing(
        rows,
        &[
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(38),
            Constraint::Length(8),
        ],
        header_row(&["ID", "Code", "Name", "Credits"]),
        " Courses ",
    );
    f.render_stateful_widget(table, area, &mut app.course_state);
}

fn render_grades(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let rows = app
        .grades
        .iter()
        .map(|g| {
            let color = if g.score >= 80.0 {
                Color::Green
            } else if g.score >= 60.0 {
                Color::Yellow
            } else {
                Color::Red
            };
            Row::new(vec![
                Cell::from(format!("{} {}", g.semester, g.year)),
                Cell::from(g.course_code.clone()),
                Cell::from(truncate(&g.course_name, 30)),
                Cell::from(g.grade.clone()).style(Style::default().fg(color)),
                Cell::from(format!("{:.1}", g.score)).style(Style::default().fg(color)),
                Cell::from(g.credits.to_string()),
            ])
        })
        .collect();

    let table = listing(
        rows,
        &[
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(32),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(8),
        ],
        header_row(&["Semester", "Code", "Course", "Grade", "Score", "Credits"]),
        " Grades ",
    );
    f.render_stateful_widget(table, area, &mut app.grade_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App<'_>) {
    let title = match app.current_page {
        Page::Courses => " Course Report ",
        Page::Students | Page::Grades => " Student Report ",
    };
    let panel = Paragraph::new(app.detail.as_str())
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(title),
        );
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App<'_>) {
    let (selected, total) = match app.current_page {
        Page::Students => (app.student_state.selected(), app.students.len()),
        Page::Courses => (app.course_state.selected(), app.courses.len()),
        Page::Grades => (app.grade_state.selected(), app.grades.len()),
    };
    let selected = selected.map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {selected}/{total} "),
        Style::default().fg(Color::Cyan),
    )];
    let keys = [
        ("Enter", " Report | "),
        ("Tab", " Page | "),
        ("↑/↓", " Nav | "),
        ("PgUp/PgDn", " Fast | "),
        ("J/K", " Scroll | "),
    ];
    status_spans.push(Span::raw(" | "));
    for (key, label) in keys {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
