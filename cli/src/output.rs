//! Output formatting

use clap::ValueEnum;
use colored::Colorize;
use entitle_core::{Notification, NotificationSink, Severity};
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn print<T: Serialize + Tabled>(&self, data: &T) -> anyhow::Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
            OutputFormat::Table => println!("{}", Table::new([data])),
        }
        Ok(())
    }
}

/// Failure already shown to the user through a notification.
/// The process still exits non-zero but prints nothing further.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct AlreadyReported(pub String);

/// Prints notifications to stderr
pub struct TerminalNotifier;

impl NotificationSink for TerminalNotifier {
    fn notify(&self, notification: Notification) {
        let title = match notification.severity {
            Severity::Destructive => notification.title.red().bold(),
            Severity::Default => notification.title.bold(),
        };
        eprintln!("{} {}", title, notification.description);
    }
}
