mod comment;
mod form;
mod profile;
mod response;
mod share;
mod sheets;
mod slack;
mod template;
mod version;
mod webhook;

pub use comment::*;
pub use form::*;
pub use profile::*;
pub use response::*;
pub use share::*;
pub use sheets::*;
pub use slack::*;
pub use template::*;
pub use version::*;
pub use webhook::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors kept on an integration row.
pub const ERROR_LOG_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Appends to an integration error log, dropping the oldest entries past
/// [`ERROR_LOG_CAPACITY`].
pub fn push_error_log(log: &mut Vec<ErrorLogEntry>, message: impl Into<String>, at: DateTime<Utc>) {
    log.push(ErrorLogEntry {
        timestamp: at,
        message: message.into(),
    });
    if log.len() > ERROR_LOG_CAPACITY {
        let excess = log.len() - ERROR_LOG_CAPACITY;
        log.drain(..excess);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_keeps_the_latest_ten() {
        let mut log = Vec::new();
        for i in 0..13 {
            push_error_log(&mut log, format!("failure {i}"), Utc::now());
        }
        assert_eq!(log.len(), ERROR_LOG_CAPACITY);
        assert_eq!(log[0].message, "failure 3");
        assert_eq!(log[9].message, "failure 12");
    }
}
