use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;
use tracing_error::SpanTrace;

#[derive(Debug, Error)]
pub enum CompassError {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("clipboard error: {0}")]
    ClipboardError(#[from] arboard::Error),
    #[error("loading failed: {message}\n{context}")]
    LoadingFailed { message: String, context: SpanTrace },
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),
    #[error("cannot expand path '{0}'")]
    PathExpansion(String),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

impl CompassError {
    pub fn loading_failed(message: impl Into<String>) -> Self {
        CompassError::LoadingFailed {
            message: message.into(),
            context: SpanTrace::capture(),
        }
    }
}

/// Roles a session can hold. Pages are gated on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Doctor,
    Nurse,
    Asha,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Asha => "asha",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CompassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "asha" => Ok(Role::Asha),
            "admin" => Ok(Role::Admin),
            _ => Err(CompassError::UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct CompassConfig {
    /// Upper bound for a single terminal event poll in milliseconds.
    pub event_poll_time: u64,
    pub resize_debounce: Duration,
    /// Lines taken by title, search line, table border, table header and footer.
    pub reserved_height: usize,
    pub row_height: usize,
    pub min_rows: usize,
    pub max_column_width: usize,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Route opened before the session resolves; the landing route otherwise.
    pub start_route: Option<String>,
}

impl Default for CompassConfig {
    fn default() -> Self {
        CompassConfig {
            event_poll_time: 100,
            resize_debounce: Duration::from_millis(150),
            reserved_height: 6,
            row_height: 1,
            min_rows: 4,
            max_column_width: 32,
            data_dir: PathBuf::from("data"),
            export_dir: PathBuf::from("."),
            start_route: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Search,
    Enter,
    Exit,
    NextTab,
    PrevTab,
    CopyRow,
    Export,
    SignOut,
    Help,
    Resize(u16, u16),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
q            quit
j/k, ↑/↓     select row
n/p, →/←     next / previous page
PgDn/PgUp    next / previous page
g/G          first / last page
/            search (Enter keeps, Esc clears)
Enter        show record
Esc          close popup
Tab/BackTab  switch tab
y            copy row to clipboard
e            export filtered rows as csv
o            sign out
?            this help";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!("Nurse".parse::<Role>().unwrap(), Role::Nurse);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!(
            "janitor".parse::<Role>(),
            Err(CompassError::UnknownRole(r)) if r == "janitor"
        ));
    }

    #[test]
    fn setters_override_defaults() {
        let cfg = CompassConfig::default()
            .with_min_rows(7)
            .with_resize_debounce(Duration::from_millis(50));
        assert_eq!(cfg.min_rows, 7);
        assert_eq!(cfg.resize_debounce, Duration::from_millis(50));
        assert_eq!(cfg.row_height, 1);
    }
}
