// Grading rules - pure functions over already-fetched numbers
//
// Two GPA methods live side by side and are never unified:
//   flat_gpa        average score / 100 * 4   (GPA summaries, reports)
//   SemesterBlock   credit-weighted grade points (transcripts, see transcript.rs)

use crate::entities::{AchievementLevel, AttendanceStatus};
use crate::error::{ReportError, ReportResult};
use serde::Serialize;
use std::fmt;

// ============================================================================
// GRADE POINTS + FLAT GPA
// ============================================================================

/// Score to 4-point scale. Out-of-range scores go through the same thresholds.
pub fn grade_point(score: f64) -> f64 {
    if score >= 90.0 {
        4.0
    } else if score >= 80.0 {
        3.0
    } else if score >= 70.0 {
        2.0
    } else if score >= 60.0 {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpaSummary {
    pub courses: usize,
    pub average_score: f64,
    pub gpa: f64,
}

pub fn flat_gpa(scores: &[f64]) -> ReportResult<GpaSummary> {
    if scores.is_empty() {
        return Err(ReportError::NoData("no grades available to calculate GPA"));
    }
    let average_score = scores.iter().sum::<f64>() / scores.len() as f64;
    Ok(GpaSummary {
        courses: scores.len(),
        average_score,
        gpa: average_score / 100.0 * 4.0,
    })
}

// ============================================================================
// SCORE STATISTICS
// ============================================================================

/// Letter buckets: A >= 90, B [80,90), C [70,80), D [60,70), F < 60
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeHistogram {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub d: usize,
    pub f: usize,
}

impl GradeHistogram {
    fn add(&mut self, score: f64) {
        match score {
            s if s >= 90.0 => self.a += 1,
            s if s >= 80.0 => self.b += 1,
            s if s >= 70.0 => self.c += 1,
            s if s >= 60.0 => self.d += 1,
            _ => self.f += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d + self.f
    }

    /// (label, count) in A..F order
    pub fn buckets(&self) -> [(&'static str, usize); 5] {
        [
            ("A (90-100)", self.a),
            ("B (80-89)", self.b),
            ("C (70-79)", self.c),
            ("D (60-69)", self.d),
            ("F (0-59)", self.f),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreStats {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub histogram: GradeHistogram,
}

impl ScoreStats {
    /// One pass over the scores. None for an empty set.
    pub fn from_scores(scores: &[f64]) -> Option<ScoreStats> {
        let (&first, _) = scores.split_first()?;
        let mut stats = ScoreStats {
            count: 0,
            average: 0.0,
            min: first,
            max: first,
            histogram: GradeHistogram::default(),
        };
        let mut sum = 0.0;
        for &score in scores {
            stats.count += 1;
            sum += score;
            stats.min = stats.min.min(score);
            stats.max = stats.max.max(score);
            stats.histogram.add(score);
        }
        stats.average = sum / stats.count as f64;
        Some(stats)
    }

    pub fn gpa(&self) -> f64 {
        self.average / 100.0 * 4.0
    }
}

// ============================================================================
// ATTENDANCE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub excused: u64,
}

impl AttendanceCounts {
    pub fn add(&mut self, status: AttendanceStatus, count: u64) {
        match status {
            AttendanceStatus::Present => self.present += count,
            AttendanceStatus::Absent => self.absent += count,
            AttendanceStatus::Late => self.late += count,
            AttendanceStatus::Excused => self.excused += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.present + self.absent + self.late + self.excused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceBand {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl AttendanceBand {
    /// Bands are checked high to low; each lower edge is inclusive
    pub fn classify(percentage: f64) -> Self {
        if percentage >= 90.0 {
            AttendanceBand::Excellent
        } else if percentage >= 75.0 {
            AttendanceBand::Good
        } else if percentage >= 60.0 {
            AttendanceBand::Warning
        } else {
            AttendanceBand::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceBand::Excellent => "Excellent",
            AttendanceBand::Good => "Good",
            AttendanceBand::Warning => "Warning - Low Attendance",
            AttendanceBand::Critical => "Critical - Very Low Attendance",
        }
    }
}

impl fmt::Display for AttendanceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub counts: AttendanceCounts,
    pub percentage: f64,
    pub band: AttendanceBand,
}

pub fn attendance_summary(counts: AttendanceCounts) -> ReportResult<AttendanceSummary> {
    let total = counts.total();
    if total == 0 {
        return Err(ReportError::NoData("no attendance records found"));
    }
    let percentage = counts.present as f64 / total as f64 * 100.0;
    Ok(AttendanceSummary {
        counts,
        percentage,
        band: AttendanceBand::classify(percentage),
    })
}

// ============================================================================
// ACHIEVEMENT
// ============================================================================

/// Weight of a stored level name; unrecognised names weigh 0
pub fn level_weight(level: &str) -> u32 {
    AchievementLevel::parse(level).map_or(0, |l| l.weight())
}

/// One glyph per full 5% share
pub fn share_bar(percentage: f64) -> String {
    let blocks = (percentage / 5.0).floor().max(0.0) as usize;
    "█".repeat(blocks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AchievementBand {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
}

impl AchievementBand {
    pub fn classify(avg_score: f64) -> Self {
        if avg_score >= 3.5 {
            AchievementBand::Excellent
        } else if avg_score >= 3.0 {
            AchievementBand::Good
        } else if avg_score >= 2.5 {
            AchievementBand::Satisfactory
        } else {
            AchievementBand::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AchievementBand::Excellent => "Excellent",
            AchievementBand::Good => "Good",
            AchievementBand::Satisfactory => "Satisfactory",
            AchievementBand::NeedsImprovement => "Needs Improvement",
        }
    }
}

/// Counts per stored achievement level, in a stable display order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AchievementCounts {
    levels: Vec<(String, u64)>,
}

impl AchievementCounts {
    pub fn add(&mut self, level: &str, count: u64) {
        match self.levels.iter_mut().find(|(name, _)| name == level) {
            Some((_, existing)) => *existing += count,
            None => self.levels.push((level.to_string(), count)),
        }
        // Known levels highest first, unknown names after them alphabetically
        self.levels.sort_by(|(a, _), (b, _)| {
            let rank = |name: &str| std::cmp::Reverse(level_weight(name));
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        });
    }

    pub fn total(&self) -> u64 {
        self.levels.iter().map(|(_, c)| c).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn levels(&self) -> &[(String, u64)] {
        &self.levels
    }

    /// Share of a level in percent; 0 when nothing was counted
    pub fn share(&self, count: u64) -> f64 {
        match self.total() {
            0 => 0.0,
            total => count as f64 / total as f64 * 100.0,
        }
    }

    /// Weighted mean of level weights, None when empty
    pub fn average_score(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted: u64 = self
            .levels
            .iter()
            .map(|(level, count)| level_weight(level) as u64 * count)
            .sum();
        Some(weighted as f64 / total as f64)
    }

    /// Share of met + exceeded, in percent
    pub fn success_rate(&self) -> f64 {
        let success: u64 = self
            .levels
            .iter()
            .filter(|(level, _)| AchievementLevel::parse(level).is_some_and(|l| l.is_success()))
            .map(|(_, count)| count)
            .sum();
        self.share(success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standing {
    Above,
    Below,
    AtAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceComparison {
    pub student_score: f64,
    pub course_score: f64,
    pub difference: f64,
    pub standing: Standing,
}

impl PerformanceComparison {
    pub fn new(student_score: f64, course_score: f64) -> Self {
        let difference = student_score - course_score;
        let standing = if difference > 0.5 {
            Standing::Above
        } else if difference < -0.5 {
            Standing::Below
        } else {
            Standing::AtAverage
        };
        PerformanceComparison {
            student_score,
            course_score,
            difference,
            standing,
        }
    }
}

// ============================================================================
// OVERALL ASSESSMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallAssessment {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
}

impl OverallAssessment {
    /// `attendance` is the student's rate, 0 when nothing was recorded
    pub fn assess(gpa: f64, attendance: f64) -> Self {
        if gpa >= 3.5 && attendance >= 90.0 {
            OverallAssessment::Excellent
        } else if gpa >= 3.0 && attendance >= 75.0 {
            OverallAssessment::Good
        } else if gpa >= 2.5 && attendance >= 60.0 {
            OverallAssessment::Satisfactory
        } else {
            OverallAssessment::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OverallAssessment::Excellent => "EXCELLENT - Student is performing exceptionally well",
            OverallAssessment::Good => "GOOD - Student is performing well",
            OverallAssessment::Satisfactory => "SATISFACTORY - Student meets minimum requirements",
            OverallAssessment::NeedsImprovement => {
                "NEEDS IMPROVEMENT - Student requires additional support"
            }
        }
    }
}
