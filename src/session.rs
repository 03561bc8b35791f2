//! Download sessions over finished jobs.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::coordinator::QueryJob;
use crate::error::{Error, Result};
use crate::remote::{DownloadSession, TransferService};
use crate::types::RowSchema;

/// An open paginated result with its schema and row count resolved.
pub struct ResultSession<S> {
    session: S,
    schema: Arc<RowSchema>,
    record_count: u64,
    limited: bool,
}

impl<S: DownloadSession> ResultSession<S> {
    /// Wrap a download session, resolving its schema.
    pub fn new(session: S, limited: bool) -> Result<Self> {
        let schema = Arc::new(RowSchema::from_metadata(session.schema())?);
        let record_count = session.record_count();
        Ok(Self {
            session,
            schema,
            record_count,
            limited,
        })
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    /// Total records, fixed at open time.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Whether this is the bounded fallback session rather than the full output.
    pub fn is_limited(&self) -> bool {
        self.limited
    }

    /// Paginated sessions can always reopen arbitrary sub-ranges.
    pub fn supports_ranges(&self) -> bool {
        true
    }

    pub fn id(&self) -> &str {
        self.session.id()
    }

    /// Open a reader over `[start, start + count)`.
    pub async fn open_reader(&self, start: u64, count: u64) -> Result<S::Reader> {
        self.session.open_reader(start, count).await
    }
}

/// Opens download sessions for finished jobs.
pub struct ResultSessionFactory<T> {
    transfer: Arc<T>,
    endpoint: Option<String>,
}

impl<T: TransferService> ResultSessionFactory<T> {
    pub fn new(transfer: Arc<T>, endpoint: Option<String>) -> Self {
        Self { transfer, endpoint }
    }

    /// Open a session over the job's output.
    ///
    /// Falls back to a limited session when the service cannot serve the
    /// full output directly. Any other failure is fatal.
    pub async fn open(&self, job: &QueryJob) -> Result<ResultSession<T::Session>> {
        if let Some(endpoint) = &self.endpoint {
            info!(endpoint = %endpoint, "using tunnel endpoint");
        }

        let endpoint = self.endpoint.as_deref();
        let (session, limited) = match self
            .transfer
            .create_download_session(job.project(), job.id(), endpoint, false)
            .await
        {
            Ok(session) => (session, false),
            Err(Error::DirectDownloadUnavailable { message }) => {
                error!(job_id = %job.id(), "create download session failed: {}", message);
                error!(job_id = %job.id(), "fallback to limit mode");
                let session = self
                    .transfer
                    .create_download_session(job.project(), job.id(), endpoint, true)
                    .await
                    .map_err(|e| session_open_failed(job, e))?;
                (session, true)
            }
            Err(e) => return Err(session_open_failed(job, e)),
        };

        debug!(
            job_id = %job.id(),
            session_id = session.id(),
            records = session.record_count(),
            limited,
            "create download session"
        );
        ResultSession::new(session, limited).map_err(|e| session_open_failed(job, e))
    }
}

fn session_open_failed(job: &QueryJob, e: Error) -> Error {
    Error::SessionOpenFailed {
        job_id: job.id().to_string(),
        message: e.to_string(),
    }
}
