//! Status report rendering
//!
//! Renders applied migrations as a boxed two-column table:
//!
//! ```text
//! +------------+----------------------+
//! | MIGRATION  | APPLIED              |
//! +------------+----------------------+
//! | 1-init.yml | 2024-03-01T12:30:00Z |
//! +------------+----------------------+
//! ```
//!
//! Column widths are terminal display widths, so wide characters in file
//! names keep the borders aligned.

use std::fmt::Write;

use chrono::SecondsFormat;
use colored::Colorize;
use unicode_width::UnicodeWidthStr;

use crate::store::MigrationRecord;

const HEADERS: [&str; 2] = ["MIGRATION", "APPLIED"];

/// Applied migrations in insertion order
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    records: Vec<MigrationRecord>,
}

impl StatusReport {
    pub fn new(records: Vec<MigrationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(name, applied_at)` cells for each row
    pub fn rows(&self) -> Vec<[String; 2]> {
        self.records
            .iter()
            .map(|r| {
                [
                    r.name.clone(),
                    r.applied_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                ]
            })
            .collect()
    }

    /// Render the table. The header is cyan when `color` is set.
    pub fn render(&self, color: bool) -> String {
        let rows = self.rows();
        let mut widths = HEADERS.map(<str as UnicodeWidthStr>::width);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.width());
            }
        }

        let rule = format!(
            "+{}+{}+\n",
            "-".repeat(widths[0] + 2),
            "-".repeat(widths[1] + 2)
        );

        let mut out = String::new();
        out.push_str(&rule);
        let header = [pad(HEADERS[0], widths[0]), pad(HEADERS[1], widths[1])];
        if color {
            let _ = writeln!(out, "| {} | {} |", header[0].cyan(), header[1].cyan());
        } else {
            let _ = writeln!(out, "| {} | {} |", header[0], header[1]);
        }
        out.push_str(&rule);

        for row in &rows {
            let _ = writeln!(
                out,
                "| {} | {} |",
                pad(&row[0], widths[0]),
                pad(&row[1], widths[1])
            );
        }
        if !rows.is_empty() {
            out.push_str(&rule);
        }
        out
    }
}

/// Left-align `cell` in `width` display columns.
fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.width());
    format!("{cell}{}", " ".repeat(fill))
}
