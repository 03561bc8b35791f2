//! Boundary to the remote service.
//!
//! The client never speaks a wire protocol itself. It drives three
//! collaborators: job control (submit, poll, stop), the bulk transfer channel
//! (paginated download sessions) and the interactive executor (live result
//! streams). Implementations are supplied by the caller through `Backend`.

use std::fmt;
use std::future::Future;

use crate::error::Result;
use crate::settings::Settings;
use crate::types::{ColumnMetadata, RawRecord};

/// Opaque identifier of a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Wrap an identifier issued by the service.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Waiting,
    Running,
    Suspended,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Waiting => "WAITING",
            JobStatus::Running => "RUNNING",
            JobStatus::Suspended => "SUSPENDED",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Remote job control plane.
pub trait JobControl: Send + Sync {
    /// Submit a statement for asynchronous execution.
    fn submit(
        &self,
        project: &str,
        sql: &str,
        settings: &Settings,
    ) -> impl Future<Output = Result<JobId>> + Send;

    /// Current status, or `None` when the control plane has none to report yet.
    fn poll_status(&self, job: &JobId) -> impl Future<Output = Result<Option<JobStatus>>> + Send;

    /// Ask the service to stop the job.
    fn stop(&self, job: &JobId) -> impl Future<Output = Result<()>> + Send;

    /// Failure detail for a FAILED job.
    fn failure_reason(&self, job: &JobId) -> impl Future<Output = Result<String>> + Send;

    /// JSON task summary of a finished job, if the service produced one.
    fn task_summary(&self, job: &JobId) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Sign an access policy document, returning a bearer token.
    fn authorization_token(&self, policy: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Bulk transfer channel serving job output.
pub trait TransferService: Send + Sync {
    type Session: DownloadSession;

    /// Create a download session over the output of a finished job.
    ///
    /// With `limited` set the service serves a bounded subset of rows; it is
    /// requested only after a full session reported
    /// `Error::DirectDownloadUnavailable`.
    fn create_download_session(
        &self,
        project: &str,
        job: &JobId,
        endpoint: Option<&str>,
        limited: bool,
    ) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// A paginated view of one job's output.
pub trait DownloadSession: Send + Sync {
    type Reader: RecordReader;

    /// Session identifier, for logging.
    fn id(&self) -> &str;

    /// Output schema.
    fn schema(&self) -> &[ColumnMetadata];

    /// Total number of records, fixed for the life of the session.
    fn record_count(&self) -> u64;

    /// Open a reader over `[start, start + count)`.
    fn open_reader(
        &self,
        start: u64,
        count: u64,
    ) -> impl Future<Output = Result<Self::Reader>> + Send;
}

/// Sequential reader over a range of a download session.
pub trait RecordReader: Send {
    /// Next record, or `None` at end of data.
    fn read(&mut self) -> impl Future<Output = Result<Option<RawRecord>>> + Send;

    /// Bytes received so far.
    fn total_bytes(&self) -> u64;

    /// Release the reader.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Live, forward-only result of an interactive execution.
pub trait RecordStream: Send {
    /// Output schema.
    fn schema(&self) -> &[ColumnMetadata];

    /// Next record, or `None` when the stream is drained.
    fn next_record(&mut self) -> impl Future<Output = Result<Option<RawRecord>>> + Send;
}

/// Outcome of submitting a statement to the interactive executor.
pub struct InteractiveRun<S> {
    pub job_id: JobId,
    pub trace_url: String,
    pub stream: S,
}

/// Executor for the interactive (live session) mode.
pub trait InteractiveService: Send + Sync {
    type Stream: RecordStream;

    /// Run a statement and return its live result stream.
    fn run_interactive(
        &self,
        sql: &str,
        settings: &Settings,
    ) -> impl Future<Output = Result<InteractiveRun<Self::Stream>>> + Send;

    /// Cancel the running interactive query.
    fn cancel_interactive(&self, job: &JobId) -> impl Future<Output = Result<()>> + Send;
}

/// Everything a connection needs from the service.
pub trait Backend: JobControl + TransferService + InteractiveService + 'static {}

impl<T> Backend for T where T: JobControl + TransferService + InteractiveService + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Waiting.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Suspended.is_terminal());
        assert_eq!(JobStatus::Suspended.to_string(), "SUSPENDED");
    }
}
