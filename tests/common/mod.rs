#![allow(dead_code)]

//! Scripted in-memory service shared by the integration tests.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use odps_query_rs::{
    ColumnMetadata, ConnectParams, Connection, DownloadSession, Error, InteractiveRun,
    InteractiveService, JobControl, JobId, JobStatus, RawRecord, RecordReader, RecordStream,
    Result, ResultSession, Settings, TransferService,
};

pub const ENDPOINT: &str = "http://service.test/api";
pub const PROJECT: &str = "proj";

/// One answer of the status script.
#[derive(Debug, Clone, Copy)]
pub enum Poll {
    Status(JobStatus),
    /// The control plane has no status yet.
    Missing,
    /// The status call fails with a transient error.
    Unavailable,
}

#[derive(Debug)]
pub struct Submitted {
    pub project: String,
    pub sql: String,
    pub settings: Settings,
}

#[derive(Debug)]
struct MockState {
    schema: Vec<ColumnMetadata>,
    row_count: u64,
    served_rows: u64,
    limit_rows: u64,
    polls: VecDeque<Poll>,
    final_status: JobStatus,
    failure_reason: String,
    summary: Option<String>,
    read_failures: VecDeque<u64>,
    persistent_failure: Option<u64>,
    undecodable: Option<u64>,
    close_failure: bool,
    direct_download_unavailable: bool,
    session_error: Option<String>,
    stopped: bool,
    stops: u32,
    poll_count: u32,
    interactive_cancels: u32,
    opened: Vec<(u64, u64)>,
    sessions: Vec<bool>,
    submitted: Vec<Submitted>,
    interactive: Vec<Submitted>,
}

/// Handle to a scripted service. Clones share state.
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                schema: vec![
                    ColumnMetadata::new("id", "BIGINT"),
                    ColumnMetadata::new("name", "STRING"),
                ],
                row_count: 0,
                served_rows: 0,
                limit_rows: 10,
                polls: VecDeque::new(),
                final_status: JobStatus::Success,
                failure_reason: String::new(),
                summary: None,
                read_failures: VecDeque::new(),
                persistent_failure: None,
                undecodable: None,
                close_failure: false,
                direct_download_unavailable: false,
                session_error: None,
                stopped: false,
                stops: 0,
                poll_count: 0,
                interactive_cancels: 0,
                opened: Vec::new(),
                sessions: Vec::new(),
                submitted: Vec::new(),
                interactive: Vec::new(),
            })),
        }
    }

    /// Result of `n` rows, all of which are served.
    pub fn with_rows(self, n: u64) -> Self {
        {
            let mut state = self.state.lock();
            state.row_count = n;
            state.served_rows = n;
        }
        self
    }

    /// Serve only the first `n` rows while still claiming the full count.
    pub fn with_served_rows(self, n: u64) -> Self {
        self.state.lock().served_rows = n;
        self
    }

    /// Statuses returned by successive polls before the final status.
    pub fn with_polls(self, polls: impl IntoIterator<Item = Poll>) -> Self {
        self.state.lock().polls = polls.into_iter().collect();
        self
    }

    /// Status every poll reports once the script is used up.
    pub fn with_final_status(self, status: JobStatus) -> Self {
        self.state.lock().final_status = status;
        self
    }

    pub fn with_failure(self, reason: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.final_status = JobStatus::Failed;
            state.failure_reason = reason.to_string();
        }
        self
    }

    pub fn with_summary(self, summary: &str) -> Self {
        self.state.lock().summary = Some(summary.to_string());
        self
    }

    /// Fail one read at each listed offset.
    pub fn with_read_failures(self, offsets: impl IntoIterator<Item = u64>) -> Self {
        self.state.lock().read_failures = offsets.into_iter().collect();
        self
    }

    /// Fail every read at `offset`.
    pub fn with_persistent_read_failure(self, offset: u64) -> Self {
        self.state.lock().persistent_failure = Some(offset);
        self
    }

    /// Serve a record at `offset` whose id cell is not a number.
    pub fn with_undecodable_record(self, offset: u64) -> Self {
        self.state.lock().undecodable = Some(offset);
        self
    }

    /// Fail every reader close.
    pub fn with_close_failure(self) -> Self {
        self.state.lock().close_failure = true;
        self
    }

    /// Refuse full sessions; limited sessions serve at most `limit` rows.
    pub fn with_direct_download_unavailable(self, limit: u64) -> Self {
        {
            let mut state = self.state.lock();
            state.direct_download_unavailable = true;
            state.limit_rows = limit;
        }
        self
    }

    pub fn with_session_error(self, message: &str) -> Self {
        self.state.lock().session_error = Some(message.to_string());
        self
    }

    /// `(start, count)` of every reader opened so far.
    pub fn opened(&self) -> Vec<(u64, u64)> {
        self.state.lock().opened.clone()
    }

    pub fn clear_opened(&self) {
        self.state.lock().opened.clear();
    }

    /// The `limited` flag of every session created so far.
    pub fn sessions(&self) -> Vec<bool> {
        self.state.lock().sessions.clone()
    }

    pub fn stops(&self) -> u32 {
        self.state.lock().stops
    }

    pub fn polls(&self) -> u32 {
        self.state.lock().poll_count
    }

    pub fn interactive_cancels(&self) -> u32 {
        self.state.lock().interactive_cancels
    }

    pub fn submitted_sql(&self) -> Vec<String> {
        self.state.lock().submitted.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn last_submitted(&self) -> Option<(String, String, Settings)> {
        self.state
            .lock()
            .submitted
            .last()
            .map(|s| (s.project.clone(), s.sql.clone(), s.settings.clone()))
    }

    pub fn last_interactive(&self) -> Option<(String, Settings)> {
        self.state
            .lock()
            .interactive
            .last()
            .map(|s| (s.sql.clone(), s.settings.clone()))
    }

    /// A full download session over the scripted result.
    pub async fn result_session(&self) -> ResultSession<MockSession> {
        let session = self
            .create_download_session(PROJECT, &JobId::new("job-1"), None, false)
            .await
            .unwrap();
        ResultSession::new(session, false).unwrap()
    }
}

/// Cells of row `i`.
pub fn record(i: u64) -> RawRecord {
    RawRecord::new(vec![Some(i.to_string()), Some(format!("name-{}", i))])
}

pub fn test_params() -> ConnectParams {
    ConnectParams::new(ENDPOINT, PROJECT)
        .with_trace_host("http://console.test")
        .with_poll_interval(Duration::from_millis(100))
}

pub fn connect(backend: &MockBackend) -> Connection<MockBackend> {
    Connection::new(backend.clone(), test_params())
}

impl JobControl for MockBackend {
    async fn submit(&self, project: &str, sql: &str, settings: &Settings) -> Result<JobId> {
        let mut state = self.state.lock();
        state.submitted.push(Submitted {
            project: project.to_string(),
            sql: sql.to_string(),
            settings: settings.clone(),
        });
        state.stopped = false;
        Ok(JobId::new(format!("job-{}", state.submitted.len())))
    }

    async fn poll_status(&self, _job: &JobId) -> Result<Option<JobStatus>> {
        let mut state = self.state.lock();
        state.poll_count += 1;
        if state.stopped {
            return Ok(Some(JobStatus::Cancelled));
        }
        match state.polls.pop_front() {
            Some(Poll::Status(status)) => Ok(Some(status)),
            Some(Poll::Missing) => Ok(None),
            Some(Poll::Unavailable) => Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "control plane unavailable",
            ))),
            None => Ok(Some(state.final_status)),
        }
    }

    async fn stop(&self, _job: &JobId) -> Result<()> {
        let mut state = self.state.lock();
        state.stops += 1;
        state.stopped = true;
        Ok(())
    }

    async fn failure_reason(&self, _job: &JobId) -> Result<String> {
        Ok(self.state.lock().failure_reason.clone())
    }

    async fn task_summary(&self, _job: &JobId) -> Result<Option<String>> {
        Ok(self.state.lock().summary.clone())
    }

    async fn authorization_token(&self, _policy: &str) -> Result<String> {
        Ok("token".to_string())
    }
}

impl TransferService for MockBackend {
    type Session = MockSession;

    async fn create_download_session(
        &self,
        _project: &str,
        job: &JobId,
        _endpoint: Option<&str>,
        limited: bool,
    ) -> Result<MockSession> {
        let mut state = self.state.lock();
        if let Some(message) = &state.session_error {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                message.clone(),
            )));
        }
        if state.direct_download_unavailable && !limited {
            return Err(Error::DirectDownloadUnavailable {
                message: "instance tunnel is not enabled".to_string(),
            });
        }
        state.sessions.push(limited);

        let record_count = if limited {
            state.row_count.min(state.limit_rows)
        } else {
            state.row_count
        };
        Ok(MockSession {
            id: format!("session-{}", job),
            schema: state.schema.clone(),
            record_count,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockSession {
    id: String,
    schema: Vec<ColumnMetadata>,
    record_count: u64,
    state: Arc<Mutex<MockState>>,
}

impl DownloadSession for MockSession {
    type Reader = MockReader;

    fn id(&self) -> &str {
        &self.id
    }

    fn schema(&self) -> &[ColumnMetadata] {
        &self.schema
    }

    fn record_count(&self) -> u64 {
        self.record_count
    }

    async fn open_reader(&self, start: u64, count: u64) -> Result<MockReader> {
        self.state.lock().opened.push((start, count));
        Ok(MockReader {
            next: start,
            end: start + count,
            bytes: 0,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockReader {
    next: u64,
    end: u64,
    bytes: u64,
    state: Arc<Mutex<MockState>>,
}

impl RecordReader for MockReader {
    async fn read(&mut self) -> Result<Option<RawRecord>> {
        let mut state = self.state.lock();
        if let Some(index) = state.read_failures.iter().position(|&o| o == self.next) {
            state.read_failures.remove(index);
            return Err(Error::transient_read(self.next, "connection reset by peer"));
        }
        if state.persistent_failure == Some(self.next) {
            return Err(Error::transient_read(self.next, "connection reset by peer"));
        }
        if self.next >= self.end || self.next >= state.served_rows {
            return Ok(None);
        }

        let rec = if state.undecodable == Some(self.next) {
            RawRecord::new(vec![Some("not-a-number".to_string()), None])
        } else {
            record(self.next)
        };
        self.bytes += rec.byte_size() as u64;
        self.next += 1;
        Ok(Some(rec))
    }

    fn total_bytes(&self) -> u64 {
        self.bytes
    }

    async fn close(&mut self) -> Result<()> {
        if self.state.lock().close_failure {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "reader already torn down",
            )));
        }
        Ok(())
    }
}

pub struct MockStream {
    next: u64,
    schema: Vec<ColumnMetadata>,
    state: Arc<Mutex<MockState>>,
}

impl RecordStream for MockStream {
    fn schema(&self) -> &[ColumnMetadata] {
        &self.schema
    }

    async fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let state = self.state.lock();
        if self.next >= state.served_rows {
            return Ok(None);
        }
        let rec = record(self.next);
        self.next += 1;
        Ok(Some(rec))
    }
}

impl InteractiveService for MockBackend {
    type Stream = MockStream;

    async fn run_interactive(
        &self,
        sql: &str,
        settings: &Settings,
    ) -> Result<InteractiveRun<MockStream>> {
        let mut state = self.state.lock();
        state.interactive.push(Submitted {
            project: PROJECT.to_string(),
            sql: sql.to_string(),
            settings: settings.clone(),
        });
        Ok(InteractiveRun {
            job_id: JobId::new(format!("interactive-{}", state.interactive.len())),
            trace_url: "http://console.test/interactive".to_string(),
            stream: MockStream {
                next: 0,
                schema: state.schema.clone(),
                state: Arc::clone(&self.state),
            },
        })
    }

    async fn cancel_interactive(&self, _job: &JobId) -> Result<()> {
        self.state.lock().interactive_cancels += 1;
        Ok(())
    }
}
