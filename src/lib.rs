pub mod collect_cmd;
pub mod convert_cmd;
pub mod index_cmd;
pub mod publish_cmd;

pub mod collect;
pub mod config;
pub mod core;
pub mod formats;
pub mod history;
pub mod html;
pub mod publish;
pub mod storage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Message(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format} report: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl ReportError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ReportError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn parse(format: &'static str, message: impl ToString) -> Self {
        ReportError::Parse {
            format,
            message: message.to_string(),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Current UTC time as an RFC 3339 string.
pub fn now_string() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
