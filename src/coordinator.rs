//! Submission and status polling of remote jobs.
//!
//! The service runs every statement as an asynchronous job. The coordinator
//! submits it, then polls its status at a fixed interval until it reaches a
//! terminal state, translating FAILED and CANCELLED into errors. `cancel` may
//! be called from another task while `await_terminal` is waiting.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::params::ConnectParams;
use crate::remote::{JobControl, JobId, JobStatus};
use crate::settings::Settings;
use crate::sql;
use crate::trace::TraceUrlBuilder;

/// A submitted job and its last observed state.
///
/// Shared between the task awaiting the job and any task that cancels it.
#[derive(Debug)]
pub struct QueryJob {
    id: JobId,
    project: String,
    sql: String,
    settings: Settings,
    trace_url: String,
    state: Mutex<JobState>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    failure_reason: Option<String>,
    cancel_requested: bool,
}

impl QueryJob {
    pub(crate) fn new(
        id: JobId,
        project: impl Into<String>,
        sql: impl Into<String>,
        settings: Settings,
        trace_url: impl Into<String>,
        status: JobStatus,
    ) -> Self {
        Self {
            id,
            project: project.into(),
            sql: sql.into(),
            settings,
            trace_url: trace_url.into(),
            state: Mutex::new(JobState {
                status,
                failure_reason: None,
                cancel_requested: false,
            }),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Statement text as submitted, terminator included.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Effective settings the job was submitted with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn trace_url(&self) -> &str {
        &self.trace_url
    }

    /// Last status observed by polling.
    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.state.lock().failure_reason.clone()
    }

    /// Whether a stop request has been sent for this job.
    pub fn cancel_requested(&self) -> bool {
        self.state.lock().cancel_requested
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        self.state.lock().status = status;
    }

    fn set_failure(&self, reason: String) {
        let mut state = self.state.lock();
        state.status = JobStatus::Failed;
        state.failure_reason = Some(reason);
    }

    /// Mark a stop request as in flight. Returns false if one already was.
    fn begin_cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.cancel_requested {
            return false;
        }
        state.cancel_requested = true;
        true
    }

    fn abort_cancel(&self) {
        self.state.lock().cancel_requested = false;
    }
}

/// What a successfully finished job produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Rows are available through a download session.
    ResultSet,
    /// The statement modified this many rows.
    UpdateCount(u64),
}

#[derive(Deserialize)]
struct TaskSummary {
    #[serde(rename = "Outputs", default)]
    outputs: BTreeMap<String, Vec<serde_json::Value>>,
}

/// Sum of records written to all outputs listed in a JSON task summary.
///
/// Each output maps to `[records, bytes]`. Returns `None` when the summary
/// lists no outputs.
pub fn sink_count_from_summary(summary: &str) -> Result<Option<u64>> {
    let parsed: TaskSummary = serde_json::from_str(summary).map_err(|e| Error::Decode {
        column: "Outputs".to_string(),
        message: e.to_string(),
    })?;
    if parsed.outputs.is_empty() {
        return Ok(None);
    }

    let mut total = 0u64;
    for (table, counts) in &parsed.outputs {
        let records = counts
            .first()
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| Error::Decode {
                column: "Outputs".to_string(),
                message: format!("no record count for output {}", table),
            })?;
        total += records;
    }
    Ok(Some(total))
}

/// Drives jobs from submission to a terminal state.
pub struct ExecutionCoordinator<C> {
    control: Arc<C>,
    poll_interval: Duration,
    trace: TraceUrlBuilder,
}

impl<C> Clone for ExecutionCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            poll_interval: self.poll_interval,
            trace: self.trace.clone(),
        }
    }
}

impl<C: JobControl> ExecutionCoordinator<C> {
    pub fn new(control: Arc<C>, params: &ConnectParams) -> Self {
        Self {
            control,
            poll_interval: params.poll_interval,
            trace: TraceUrlBuilder::from_params(params),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Submit a statement.
    ///
    /// `statement` settings override `connection` settings on key collision.
    /// Returns as soon as the service accepted the job.
    pub async fn run(
        &self,
        project: &str,
        sql: &str,
        connection: &Settings,
        statement: &Settings,
    ) -> Result<Arc<QueryJob>> {
        let sql = sql::ensure_terminated(sql);
        let settings = connection.overlay(statement);
        if !settings.is_empty() {
            info!(settings = %settings, "Enabled SQL task properties");
        }

        let id = self
            .control
            .submit(project, &sql, &settings)
            .await
            .map_err(|e| Error::remote("submit", "-", format!("{} (sql: {})", e, sql)))?;
        let trace_url = self
            .trace
            .generate(self.control.as_ref(), project, &id)
            .await
            .map_err(|e| Error::remote("generate trace url", id.as_str(), e.to_string()))?;

        info!(job_id = %id, trace_url = %trace_url, "Run SQL: {}", sql);

        Ok(Arc::new(QueryJob::new(
            id,
            project,
            sql,
            settings,
            trace_url,
            JobStatus::Waiting,
        )))
    }

    /// Ask the service to stop a job.
    ///
    /// No-op if the job is already terminal or a stop was already sent.
    pub async fn cancel(&self, job: &QueryJob) -> Result<()> {
        if job.is_terminal() {
            debug!(job_id = %job.id(), status = %job.status(), "cancel ignored, job finished");
            return Ok(());
        }
        if !job.begin_cancel() {
            return Ok(());
        }

        if let Err(e) = self.control.stop(job.id()).await {
            job.abort_cancel();
            return Err(Error::remote("stop", job.id().as_str(), e.to_string()));
        }
        info!(job_id = %job.id(), "submit cancel to instance");
        Ok(())
    }

    /// Poll until the job reaches a terminal state.
    pub async fn await_terminal(&self, job: &QueryJob) -> Result<ExecutionOutcome> {
        let started = Instant::now();

        loop {
            sleep(self.poll_interval).await;

            let status = match self.control.poll_status(job.id()).await {
                Ok(Some(status)) => status,
                Ok(None) => {
                    warn!(job_id = %job.id(), "no task status reported yet");
                    continue;
                }
                Err(e) if e.is_transient() => {
                    warn!(job_id = %job.id(), error = %e, "task status unavailable");
                    continue;
                }
                Err(e) => {
                    error!(job_id = %job.id(), error = %e, "Fail to get task status: {}", job.sql());
                    return Err(Error::remote(
                        "poll status",
                        job.id().as_str(),
                        format!("{} (sql: {})", e, job.sql()),
                    ));
                }
            };
            job.set_status(status);

            match status {
                JobStatus::Success => {
                    debug!(job_id = %job.id(), "sql status: success");
                    break;
                }
                JobStatus::Failed => {
                    let reason = self.control.failure_reason(job.id()).await.map_err(|e| {
                        Error::remote("get failure reason", job.id().as_str(), e.to_string())
                    })?;
                    error!(job_id = %job.id(), "execute sql [{}] failed: {}", job.sql(), reason);
                    job.set_failure(reason.clone());
                    return Err(Error::ExecutionFailed {
                        sql: job.sql().to_string(),
                        reason,
                        trace_url: job.trace_url().to_string(),
                    });
                }
                JobStatus::Cancelled => {
                    info!(job_id = %job.id(), "execute instance cancelled");
                    return Err(Error::ExecutionCancelled {
                        job_id: job.id().to_string(),
                    });
                }
                JobStatus::Waiting | JobStatus::Running | JobStatus::Suspended => {
                    debug!(job_id = %job.id(), "sql status: {}", status);
                }
            }
        }

        info!(
            job_id = %job.id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sql finished"
        );
        Ok(self.outcome(job).await)
    }

    /// Classify a finished job from its task summary.
    async fn outcome(&self, job: &QueryJob) -> ExecutionOutcome {
        let count = match self.control.task_summary(job.id()).await {
            Ok(Some(summary)) => match sink_count_from_summary(&summary) {
                Ok(count) => count,
                Err(e) => {
                    warn!(job_id = %job.id(), error = %e, "unreadable task summary");
                    None
                }
            },
            Ok(None) => {
                warn!(job_id = %job.id(), "task summary is empty");
                None
            }
            Err(e) => {
                warn!(job_id = %job.id(), error = %e, "Failed to get TaskSummary");
                None
            }
        };

        match count {
            Some(records) => {
                debug!(job_id = %job.id(), "successfully updated {} records", records);
                ExecutionOutcome::UpdateCount(records)
            }
            None if sql::is_query(job.sql()) => ExecutionOutcome::ResultSet,
            None => ExecutionOutcome::UpdateCount(0),
        }
    }
}
