//! Request-level job errors

use thiserror::Error;

/// A request the job manager refused. Nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("No job_id")]
    MissingJobId,
    #[error("No query")]
    MissingQuery,
    #[error("Query too short")]
    QueryTooShort,
    #[error("Missing url")]
    MissingUrl,
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Invalid {0}")]
    InvalidParameter(&'static str),
    #[error("Job does not exist")]
    UnknownJob,
    #[error("Job already finished : {0}")]
    AlreadyFinished(String),
    #[error("No search results")]
    NoSearchResults,
    #[error("No novel selected")]
    NoNovelSelected,
    #[error("{0}")]
    InvalidSelection(String),
    #[error("Novel already updating or recently updated")]
    RecentlyUpdated,
    #[error("Invalid job_id")]
    InvalidJobId,
    #[error("Job is not finished")]
    NotFinished,
    #[error("No snapshot for this job")]
    NoSnapshot,
}

impl JobError {
    /// HTTP status code reported for this rejection
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownJob => 412,
            Self::AlreadyFinished(_) | Self::RecentlyUpdated => 409,
            Self::NoSearchResults => 404,
            _ => 400,
        }
    }
}
