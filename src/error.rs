use std::{fmt, path::PathBuf};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::{process::PageOutcome, PageIndex};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration value for {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Couldn't send a page through a channel.")]
    RuntimeSendError,

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed writing output: {}", OutputList(.0))]
    Output(Vec<OutputError>),
}

impl From<mpsc::error::SendError<PageOutcome>> for Error {
    fn from(_value: mpsc::error::SendError<PageOutcome>) -> Self {
        Error::RuntimeSendError
    }
}

impl From<mpsc::error::SendError<PageIndex>> for Error {
    fn from(_value: mpsc::error::SendError<PageIndex>) -> Self {
        Error::RuntimeSendError
    }
}

/// A single page that couldn't be fetched. Never fatal to a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page {page}: request failed: {source}")]
    Request {
        page: PageIndex,
        #[source]
        source: reqwest::Error,
    },
    #[error("page {page}: server responded with {status}")]
    Status {
        page: PageIndex,
        status: reqwest::StatusCode,
    },
    #[error("page {page}: couldn't decode response: {source}")]
    Decode {
        page: PageIndex,
        #[source]
        source: serde_json::Error,
    },
    /// Used by fetchers that don't talk HTTP.
    #[error("page {page}: {reason}")]
    Other { page: PageIndex, reason: String },
}

impl FetchError {
    pub fn page(&self) -> PageIndex {
        match self {
            FetchError::Request { page, .. }
            | FetchError::Status { page, .. }
            | FetchError::Decode { page, .. }
            | FetchError::Other { page, .. } => *page,
        }
    }
}

#[derive(Debug, Error)]
#[error("{}: {source}", path.display())]
pub struct OutputError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

struct OutputList<'a>(&'a [OutputError]);

impl fmt::Display for OutputList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
