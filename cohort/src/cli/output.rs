//! Output formatting for CLI commands
//!
//! Commands build a JSON document themselves when `--output-format json` is
//! set; the renderers below cover the human formats only.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;

use crate::invariants::InvariantViolation;
use crate::model::{Category, Group, StudentId};
use crate::reconcile::CapacityChange;

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned, coloured tables (default)
    #[default]
    Table,
    /// One JSON document per command
    Json,
    /// Tab-separated, uncoloured; for scripts
    Plain,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "plain" => Ok(OutputFormat::Plain),
            _ => Err(format!(
                "Unknown output format '{}'. Valid options: table, json, plain",
                s
            )),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Plain => write!(f, "plain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Warning,
    Error,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Warning => "warning",
            Status::Error => "error",
        }
    }
}

/// Pad every cell to its column width. The last column is left unpadded.
fn align(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == last {
                    cell.to_string()
                } else {
                    format!("{:<width$}", cell, width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = vec![line(headers.to_vec())];
    lines.extend(
        rows.iter()
            .map(|row| line(row.iter().map(String::as_str).collect())),
    );
    lines
}

/// Output formatter for consistent CLI output
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn success(&self, message: &str) {
        self.status(Status::Success, message);
    }

    pub fn warning(&self, message: &str) {
        self.status(Status::Warning, message);
    }

    /// Errors go to stderr in every format, as JSON when requested.
    pub fn error(&self, message: &str) {
        self.status(Status::Error, message);
    }

    fn status(&self, status: Status, message: &str) {
        let line = match self.format {
            OutputFormat::Json => {
                serde_json::json!({"status": status.label(), "message": message}).to_string()
            }
            OutputFormat::Table => {
                let marker = match status {
                    Status::Success => "✓".green(),
                    Status::Warning => "⚠".yellow(),
                    Status::Error => "✗".red(),
                };
                format!("{} {}", marker, message)
            }
            OutputFormat::Plain => format!("{}\t{}", status.label(), message),
        };
        match status {
            Status::Success => println!("{}", line),
            Status::Warning | Status::Error => eprintln!("{}", line),
        }
    }

    /// Print data as JSON
    pub fn json<T: Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(json) => println!("{}", json),
            Err(e) => self.error(&format!("Failed to serialize to JSON: {}", e)),
        }
    }

    fn field(&self, key: &str, value: impl Display) {
        match self.format {
            OutputFormat::Table => println!("{:>9}: {}", key.cyan(), value),
            _ => println!("{}\t{}", key, value),
        }
    }

    fn heading(&self, title: &str) {
        if self.format == OutputFormat::Table {
            println!();
            println!("{}", title.bold().underline());
        }
    }

    fn table(&self, headers: &[&str], rows: Vec<Vec<String>>) {
        match self.format {
            OutputFormat::Table => {
                let mut lines = align(headers, &rows).into_iter();
                if let Some(header) = lines.next() {
                    println!("{}", header.bold());
                }
                for line in lines {
                    println!("{}", line);
                }
            }
            _ => {
                for row in rows {
                    println!("{}", row.join("\t"));
                }
            }
        }
    }

    pub fn category(&self, category: &Category) {
        self.field("ID", &category.id);
        self.field("Course", &category.course_id);
        self.field("Name", &category.name);
        self.field("Policy", category.policy);
        self.field("Capacity", category.capacity_per_group);
    }

    pub fn categories(&self, categories: &[Category]) {
        let rows = categories
            .iter()
            .map(|c| {
                vec![
                    c.id.clone(),
                    c.name.clone(),
                    c.policy.to_string(),
                    c.capacity_per_group.to_string(),
                ]
            })
            .collect();
        self.table(&["ID", "NAME", "POLICY", "CAPACITY"], rows);
    }

    pub fn group(&self, group: &Group) {
        self.field("ID", &group.id);
        self.field("Name", &group.name);
        self.field("Category", &group.category_id);
        self.field("Members", group.member_ids.join(", "));
    }

    pub fn groups(&self, groups: &[Group]) {
        if groups.is_empty() {
            return;
        }
        self.heading(&format!("Groups ({})", groups.len()));
        let rows = groups
            .iter()
            .map(|g| {
                vec![
                    g.id.clone(),
                    g.name.clone(),
                    g.len().to_string(),
                    g.member_ids.join(", "),
                ]
            })
            .collect();
        self.table(&["ID", "NAME", "SIZE", "MEMBERS"], rows);
    }

    /// Evictions, redistributions and the resulting groups.
    pub fn capacity_change(&self, change: &CapacityChange) {
        if !change.evicted.is_empty() {
            self.warning(&format!(
                "{} students lost their group: {}",
                change.evicted.len(),
                change.evicted.join(", ")
            ));
        }
        if !change.redistributed.is_empty() {
            self.success(&format!(
                "Moved {} students to other groups: {}",
                change.redistributed.len(),
                change.redistributed.join(", ")
            ));
        }
        self.groups(&change.groups);
    }

    pub fn violations(&self, violations: &[InvariantViolation]) {
        if violations.is_empty() {
            self.success("No invariant violations");
            return;
        }
        self.warning(&format!("{} invariant violations", violations.len()));
        for violation in violations {
            match self.format {
                OutputFormat::Table => println!("  {} {}", "•".red(), violation),
                _ => println!("{}", violation),
            }
        }
    }

    pub fn students(&self, title: &str, students: &[StudentId]) {
        self.heading(&format!("{} ({})", title, students.len()));
        for student in students {
            match self.format {
                OutputFormat::Table => println!("  {} {}", "•".cyan(), student),
                _ => println!("{}", student),
            }
        }
    }
}
