//! Terminal rendering for watcher cycles
//!
//! Tables and summaries go to stdout, diagnostics to stderr, so the
//! primary output can be redirected on its own.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use psl_lib::diagnostic::TIMESTAMP_FORMAT;
use psl_lib::{
    AggregateSummary, ClassifiedSession, Diagnostic, DiagnosticSink, KillReport, Renderer,
    SnapshotReport,
};
use serde::Serialize;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Output format for cycle results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// One JSON document per line
    Json,
}

const PROCESSES_WARN: usize = 100;
const PROCESSES_CRIT: usize = 200;
const SLEEPERS_WARN: usize = 30;
const SLEEPERS_CRIT: usize = 75;
const PROCESSING_WARN: Duration = Duration::from_secs(1);
const PROCESSING_CRIT: Duration = Duration::from_secs(5);

/// How alarming a summary number is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

fn by_thresholds(value: usize, warn: usize, crit: usize) -> Severity {
    if value >= crit {
        Severity::Critical
    } else if value >= warn {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

pub fn processes_severity(count: usize) -> Severity {
    by_thresholds(count, PROCESSES_WARN, PROCESSES_CRIT)
}

pub fn sleepers_severity(count: usize) -> Severity {
    by_thresholds(count, SLEEPERS_WARN, SLEEPERS_CRIT)
}

pub fn past_long_query_severity(count: usize) -> Severity {
    if count > 0 {
        Severity::Critical
    } else {
        Severity::Normal
    }
}

pub fn processing_time_severity(elapsed: Duration) -> Severity {
    if elapsed > PROCESSING_CRIT {
        Severity::Critical
    } else if elapsed > PROCESSING_WARN {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

fn paint(value: impl ToString, severity: Severity) -> ColoredString {
    let text = value.to_string();
    match severity {
        Severity::Normal => text.cyan(),
        Severity::Warning => text.yellow(),
        Severity::Critical => text.red(),
    }
}

/// One table row
#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "USER")]
    user: String,
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "DB")]
    db: String,
    #[tabled(rename = "COMMAND")]
    command: String,
    #[tabled(rename = "TIME")]
    time: u64,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "INFO")]
    info: String,
}

impl From<&ClassifiedSession> for SessionRow {
    fn from(classified: &ClassifiedSession) -> Self {
        let s = &classified.session;
        Self {
            id: s.id,
            user: s.principal.clone(),
            host: s.origin.clone(),
            db: s.database.clone().unwrap_or_else(|| "None".to_string()),
            command: s.command.clone(),
            time: s.elapsed_seconds,
            state: s.state.clone(),
            info: s.info.clone(),
        }
    }
}

/// Summary line, colored by severity
pub fn format_summary(host: &str, summary: &AggregateSummary) -> String {
    format!(
        "\t({}) PROCESSES: {}, SLEEPERS: {}, LOCKED: {}, READS: {}, WRITES: {}, CLOSING: {}, OPENING: {}, PAST LQT: {}",
        host.green(),
        paint(summary.num_processes, processes_severity(summary.num_processes)),
        paint(summary.num_sleeping, sleepers_severity(summary.num_sleeping)),
        paint(summary.num_locked, Severity::Normal),
        paint(summary.num_reads, Severity::Normal),
        paint(summary.num_writes, Severity::Normal),
        paint(summary.num_closing, Severity::Normal),
        paint(summary.num_opening, Severity::Normal),
        paint(
            summary.num_past_long_query_threshold,
            past_long_query_severity(summary.num_past_long_query_threshold)
        ),
    )
}

/// Principals ordered by session count, highest first
pub fn format_principals(summary: &AggregateSummary) -> String {
    let users: Vec<String> = summary
        .principal_counts
        .iter()
        .map(|(user, count)| format!("{}: {}", user, paint(count, Severity::Normal)))
        .collect();
    format!("\t({}) {}", "Users".green(), users.join(", "))
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{}", json);
    }
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Renders cycle results to the terminal
pub struct TerminalRenderer {
    format: OutputFormat,
}

impl TerminalRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl DiagnosticSink for TerminalRenderer {
    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        if self.format == OutputFormat::Json {
            if let Ok(json) = serde_json::to_string(&diagnostic) {
                eprintln!("{}", json);
            }
            return;
        }

        let line = diagnostic.to_string();
        match diagnostic {
            Diagnostic::StillLooking { .. } | Diagnostic::NothingFound { .. } => {
                eprintln!("{}", line.bold())
            }
            Diagnostic::BelowKillThreshold { .. } => {
                eprintln!("{} {}", "⚠".yellow().bold(), line)
            }
            _ => print_error(&line),
        }
    }
}

impl Renderer for TerminalRenderer {
    fn snapshot(&mut self, report: &SnapshotReport) {
        if self.format == OutputFormat::Json {
            print_json(report);
            return;
        }

        let rule = "-".repeat(40);
        println!(
            "{} {} :: {} :: Connected Threads: {} {}",
            rule.yellow(),
            report.host.green(),
            report.at.format(TIMESTAMP_FORMAT),
            report.connected_threads.to_string().green(),
            rule.yellow()
        );

        let rows: Vec<SessionRow> = report.sessions.iter().map(SessionRow::from).collect();
        println!("{}", Table::new(rows).with(Style::rounded()));

        println!();
        println!("{}", format_summary(&report.host, &report.summary));
        println!("{}", format_principals(&report.summary));

        let secs = (report.processing_time.as_secs_f64() * 1000.0).round() / 1000.0;
        println!(
            "\t({}): {}",
            "Processing time".green(),
            paint(secs, processing_time_severity(report.processing_time))
        );
        println!();
    }

    fn ids(&mut self, ids: &[u64]) {
        if self.format == OutputFormat::Json {
            print_json(ids);
            return;
        }
        for id in ids {
            println!("{}", id);
        }
    }

    fn kills(&mut self, report: &KillReport) {
        if self.format == OutputFormat::Json {
            print_json(report);
            return;
        }
        let line = format!(
            "{} :: {} :: Killed: {} (WHERE {})",
            report.at.format(TIMESTAMP_FORMAT),
            report.host,
            report.killed,
            report.criteria
        );
        println!("{}", line.red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processes_severity() {
        assert_eq!(processes_severity(99), Severity::Normal);
        assert_eq!(processes_severity(100), Severity::Warning);
        assert_eq!(processes_severity(199), Severity::Warning);
        assert_eq!(processes_severity(200), Severity::Critical);
    }

    #[test]
    fn test_sleepers_severity() {
        assert_eq!(sleepers_severity(29), Severity::Normal);
        assert_eq!(sleepers_severity(30), Severity::Warning);
        assert_eq!(sleepers_severity(75), Severity::Critical);
    }

    #[test]
    fn test_past_long_query_severity() {
        assert_eq!(past_long_query_severity(0), Severity::Normal);
        assert_eq!(past_long_query_severity(1), Severity::Critical);
    }

    #[test]
    fn test_processing_time_severity() {
        assert_eq!(processing_time_severity(Duration::from_millis(900)), Severity::Normal);
        assert_eq!(processing_time_severity(Duration::from_secs(1)), Severity::Normal);
        assert_eq!(processing_time_severity(Duration::from_millis(1500)), Severity::Warning);
        assert_eq!(processing_time_severity(Duration::from_secs(6)), Severity::Critical);
    }

    #[test]
    fn test_summary_line_contents() {
        colored::control::set_override(false);
        let summary = AggregateSummary {
            num_reads: 1,
            num_writes: 1,
            num_locked: 1,
            num_sleeping: 1,
            num_past_long_query_threshold: 1,
            num_processes: 3,
            principal_counts: vec![("app".to_string(), 2), ("etl".to_string(), 1)],
            ..Default::default()
        };

        assert_eq!(
            format_summary("db01", &summary),
            "\t(db01) PROCESSES: 3, SLEEPERS: 1, LOCKED: 1, READS: 1, WRITES: 1, CLOSING: 0, OPENING: 0, PAST LQT: 1"
        );
        assert_eq!(format_principals(&summary), "\t(Users) app: 2, etl: 1");
    }
}
