// Grid tables for listings printed to the operator

use crate::store::Row;
use serde_json::Value;

/// Render rows as a boxed grid with a header row.
/// Cells that look numeric are right-aligned.
#[must_use]
pub fn render_grid(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            rows.iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.chars().count())
        })
        .collect();

    let border = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{border}+");
    let header_border = border.replace('-', "=");

    let line = |cells: Vec<String>| -> String {
        let inner = widths
            .iter()
            .enumerate()
            .map(|(index, width)| {
                let value = cells.get(index).map(String::as_str).unwrap_or("");
                format_cell(value, *width, looks_numeric(value))
            })
            .collect::<Vec<_>>()
            .join(" | ");
        format!("| {inner} |")
    };

    let mut lines = Vec::with_capacity(rows.len() * 2 + 3);
    lines.push(border.clone());
    lines.push(line(headers.iter().map(|h| h.to_string()).collect()));
    lines.push(header_border);
    for row in rows {
        lines.push(line(row.clone()));
        lines.push(border.clone());
    }
    if rows.is_empty() {
        lines.push(border);
    }
    lines.join("\n")
}

/// Grid over store rows, headers taken from the first row's columns
#[must_use]
pub fn render_rows(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<&str> = first.columns().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|col| row.get(col).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    render_grid(&headers, &cells)
}

/// Floats print with two decimals, NULL prints empty
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| format!("{f:.2}")).unwrap_or_default(),
        other => other.to_string(),
    }
}

fn format_cell(value: &str, width: usize, right_align: bool) -> String {
    if right_align {
        format!("{value:>width$}")
    } else {
        format!("{value:<width$}")
    }
}

fn looks_numeric(value: &str) -> bool {
    !value.is_empty() && value.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_layout() {
        let out = render_grid(
            &["id", "name"],
            &[
                vec!["1".to_string(), "Ada".to_string()],
                vec!["12".to_string(), "Grace".to_string()],
            ],
        );
        let expected = "\
+----+-------+
| id | name  |
+====+=======+
|  1 | Ada   |
+----+-------+
| 12 | Grace |
+----+-------+";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_render_rows_formats_values() {
        let rows = vec![Row::new()
            .with("student_id", 3)
            .with("avg_score", 87.456)
            .with("remarks", Value::Null)];
        let out = render_rows(&rows);
        assert!(out.contains("| student_id | avg_score | remarks |"));
        assert!(out.contains("87.46"));
        assert_eq!(render_rows(&[]), "");
    }
}
