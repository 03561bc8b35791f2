//! Statement execution.
//!
//! A `Statement` runs one SQL text at a time: leading `SET` clauses and `USE`
//! are handled locally, everything else goes to the service as a job. Offline
//! jobs are polled to completion and their output is opened as a paginated
//! cursor on first access; interactive runs hand back a live stream.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::connection::ConnectionContext;
use crate::coordinator::{ExecutionCoordinator, ExecutionOutcome, QueryJob};
use crate::cursor::{
    validate_fetch_size, Cursor, FetchDirection, ForwardCursor, ResultCursor, ScrollCursor,
    SessionForwardCursor,
};
use crate::error::{Error, Result};
use crate::remote::{Backend, JobId};
use crate::session::ResultSessionFactory;
use crate::settings::Settings;
use crate::sql;

/// An interactive run that may still be cancelled.
#[derive(Debug)]
struct InteractiveJob {
    id: JobId,
    cancelled: AtomicBool,
}

#[derive(Debug, Clone)]
enum ActiveJob {
    Offline(Arc<QueryJob>),
    Interactive(Arc<InteractiveJob>),
}

/// Cancels whatever a statement is currently running.
///
/// Obtained from `Statement::cancel_handle` before awaiting `execute`, it can
/// be moved to another task and used while the statement is busy.
pub struct CancelHandle<B: Backend> {
    coordinator: ExecutionCoordinator<B>,
    backend: Arc<B>,
    active: Arc<Mutex<Option<ActiveJob>>>,
}

impl<B: Backend> Clone for CancelHandle<B> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            backend: Arc::clone(&self.backend),
            active: Arc::clone(&self.active),
        }
    }
}

impl<B: Backend> CancelHandle<B> {
    /// Stop the running job. No-op when nothing runs or it already finished.
    pub async fn cancel(&self) -> Result<()> {
        let active = self.active.lock().clone();
        match active {
            None => Ok(()),
            Some(ActiveJob::Offline(job)) => self.coordinator.cancel(&job).await,
            Some(ActiveJob::Interactive(job)) => {
                if job.cancelled.swap(true, Ordering::SeqCst) {
                    return Ok(());
                }
                if let Err(e) = self.backend.cancel_interactive(&job.id).await {
                    job.cancelled.store(false, Ordering::SeqCst);
                    return Err(Error::remote("cancel", job.id.as_str(), e.to_string()));
                }
                info!(job_id = %job.id, "submit cancel query instance");
                Ok(())
            }
        }
    }
}

/// Executes SQL and hands out the resulting cursor or update count.
pub struct Statement<B: Backend> {
    conn: Arc<ConnectionContext<B>>,
    coordinator: ExecutionCoordinator<B>,
    sessions: ResultSessionFactory<B>,
    settings: Settings,
    fetch_size: u32,
    max_rows: u64,
    direction: FetchDirection,
    scrollable: bool,
    active: Arc<Mutex<Option<ActiveJob>>>,
    sql: Option<String>,
    outcome: Option<ExecutionOutcome>,
    update_count: Option<u64>,
    trace_url: Option<String>,
    cursor: Option<ResultCursor<B>>,
    closed: bool,
}

impl<B: Backend> Statement<B> {
    pub(crate) fn new(conn: Arc<ConnectionContext<B>>, scrollable: bool) -> Self {
        let coordinator = ExecutionCoordinator::new(Arc::clone(&conn.backend), &conn.params);
        let sessions = ResultSessionFactory::new(
            Arc::clone(&conn.backend),
            conn.params.tunnel_endpoint.clone(),
        );
        // live streams cannot be repositioned
        let scrollable = scrollable && !conn.params.interactive;
        Self {
            fetch_size: conn.params.fetch_size,
            coordinator,
            sessions,
            settings: Settings::new(),
            max_rows: 0,
            direction: FetchDirection::default(),
            scrollable,
            active: Arc::new(Mutex::new(None)),
            sql: None,
            outcome: None,
            update_count: None,
            trace_url: None,
            cursor: None,
            closed: false,
            conn,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::StatementClosed);
        }
        Ok(())
    }

    fn is_interactive(&self) -> bool {
        self.conn.params.interactive
    }

    /// Execute a statement.
    ///
    /// Returns `true` when the statement produced a result set, available
    /// through `result_cursor`. Returns `false` for updates (see
    /// `update_count`) and for statements handled locally: settings-only
    /// text and `USE project`.
    pub async fn execute(&mut self, sql: &str) -> Result<bool> {
        self.check_open()?;
        self.reset().await?;

        let (inline, query) = sql::split_settings(sql);
        let Some(query) = query else {
            if !inline.is_empty() {
                info!(settings = %inline, "set sql task properties");
                self.conn.apply_settings(&inline);
                self.settings.extend_from(&inline);
            }
            return Ok(false);
        };
        if let Some(project) = sql::parse_use(&query) {
            info!(project = %project, "set project");
            self.conn.set_project(project);
            return Ok(false);
        }

        self.sql = Some(query.clone());
        // inline settings in front of a query only apply to this run
        let run_settings = self.settings.overlay(&inline);

        if self.is_interactive() {
            self.run_interactive(&query, &run_settings).await?;
            return Ok(true);
        }

        let project = self.conn.project();
        let job = self
            .coordinator
            .run(&project, &query, &self.conn.settings(), &run_settings)
            .await?;
        self.trace_url = Some(job.trace_url().to_string());
        *self.active.lock() = Some(ActiveJob::Offline(Arc::clone(&job)));

        let outcome = self.coordinator.await_terminal(&job).await?;
        self.outcome = Some(outcome);
        match outcome {
            ExecutionOutcome::ResultSet => Ok(true),
            ExecutionOutcome::UpdateCount(count) => {
                self.update_count = Some(count);
                Ok(false)
            }
        }
    }

    async fn run_interactive(&mut self, query: &str, statement: &Settings) -> Result<()> {
        let sql = sql::ensure_terminated(query);
        let settings = self.conn.settings().overlay(statement);
        let run = self
            .conn
            .backend
            .run_interactive(&sql, &settings)
            .await?;
        info!(job_id = %run.job_id, trace_url = %run.trace_url, "Run SQL: {}", sql);

        self.trace_url = Some(run.trace_url);
        *self.active.lock() = Some(ActiveJob::Interactive(Arc::new(InteractiveJob {
            id: run.job_id,
            cancelled: AtomicBool::new(false),
        })));
        let cursor = SessionForwardCursor::new(run.stream, self.fetch_size, self.max_rows)?;
        self.cursor = Some(ResultCursor::Session(cursor));
        self.outcome = Some(ExecutionOutcome::ResultSet);
        Ok(())
    }

    /// Execute a statement that must produce a result set.
    pub async fn execute_query(&mut self, sql: &str) -> Result<&mut ResultCursor<B>> {
        if !self.execute(sql).await? {
            return Err(Error::NoResultSet {
                sql: sql.to_string(),
            });
        }
        self.result_cursor().await
    }

    /// Execute an update and return the number of affected rows.
    ///
    /// Settings-only text returns 0. Not available in interactive mode.
    pub async fn execute_update(&mut self, sql: &str) -> Result<u64> {
        self.check_open()?;
        let (_, query) = sql::split_settings(sql);
        if query.is_some() && self.is_interactive() {
            return Err(Error::Unsupported {
                operation: "execute_update",
                mode: "interactive",
            });
        }
        self.execute(sql).await?;
        Ok(self.update_count.take().unwrap_or(0))
    }

    /// The cursor over the last execution's result.
    ///
    /// Paginated results open their download session on the first call.
    /// Later calls return the same cursor, even once it has closed itself.
    pub async fn result_cursor(&mut self) -> Result<&mut ResultCursor<B>> {
        self.check_open()?;
        if self.cursor.is_none() {
            let cursor = self.open_cursor().await?;
            self.cursor = Some(cursor);
        }
        self.cursor.as_mut().ok_or(Error::CursorClosed)
    }

    async fn open_cursor(&mut self) -> Result<ResultCursor<B>> {
        let active = self.active.lock().clone();
        let job = match (self.outcome, active) {
            (Some(ExecutionOutcome::ResultSet), Some(ActiveJob::Offline(job))) => job,
            _ => {
                return Err(Error::NoResultSet {
                    sql: self.sql.clone().unwrap_or_default(),
                })
            }
        };

        let session = self.sessions.open(&job).await?;
        let cursor = if self.scrollable {
            ResultCursor::Scroll(ScrollCursor::new(session, self.fetch_size, self.max_rows))
        } else {
            ResultCursor::Forward(ForwardCursor::new(session, self.fetch_size, self.max_rows))
        };
        Ok(cursor)
    }

    /// Rows affected by the last execution.
    ///
    /// Reported once: later calls return `None`, as do executions that
    /// produced a result set or were handled locally.
    pub fn update_count(&mut self) -> Option<u64> {
        self.update_count.take()
    }

    /// Handle that cancels this statement's job from another task.
    pub fn cancel_handle(&self) -> CancelHandle<B> {
        CancelHandle {
            coordinator: self.coordinator.clone(),
            backend: Arc::clone(&self.conn.backend),
            active: Arc::clone(&self.active),
        }
    }

    /// Cancel the running job.
    pub fn cancel(&self) -> impl Future<Output = Result<()>> + Send {
        let closed = self.check_open();
        let handle = self.cancel_handle();
        async move {
            closed?;
            handle.cancel().await
        }
    }

    /// Trace URL of the last submitted job.
    pub fn trace_url(&self) -> Option<&str> {
        self.trace_url.as_deref()
    }

    /// The last offline job submitted by this statement.
    pub fn job(&self) -> Option<Arc<QueryJob>> {
        match &*self.active.lock() {
            Some(ActiveJob::Offline(job)) => Some(Arc::clone(job)),
            _ => None,
        }
    }

    /// Statement-level settings, layered over the connection's.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.set(key, value);
    }

    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    /// Rows per fetch for cursors opened afterwards.
    pub fn set_fetch_size(&mut self, size: u32) -> Result<()> {
        self.check_open()?;
        validate_fetch_size(size)?;
        self.fetch_size = size;
        Ok(())
    }

    pub fn max_rows(&self) -> u64 {
        self.max_rows
    }

    /// Cap on rows any cursor opened afterwards exposes. 0 means unlimited.
    pub fn set_max_rows(&mut self, max_rows: u64) -> Result<()> {
        self.check_open()?;
        self.max_rows = max_rows;
        Ok(())
    }

    pub fn fetch_direction(&self) -> FetchDirection {
        self.direction
    }

    /// Advisory access-order hint, forwarded to the open scrollable cursor.
    pub fn set_fetch_direction(&mut self, direction: FetchDirection) -> Result<()> {
        self.check_open()?;
        self.direction = direction;
        if let Some(cursor) = self.cursor.as_mut().and_then(ResultCursor::as_scroll) {
            cursor.set_fetch_direction(direction)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the previous result and stop its job if it never finished.
    async fn reset(&mut self) -> Result<()> {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close().await?;
        }
        self.cancel_unfinished().await?;
        *self.active.lock() = None;
        self.sql = None;
        self.outcome = None;
        self.update_count = None;
        self.trace_url = None;
        Ok(())
    }

    async fn cancel_unfinished(&mut self) -> Result<()> {
        let active = self.active.lock().clone();
        if let Some(ActiveJob::Offline(job)) = active {
            if !job.is_terminal() {
                debug!(job_id = %job.id(), "cancel unfinished job");
                self.coordinator.cancel(&job).await?;
            }
        }
        Ok(())
    }

    /// Close the statement and its cursor. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.reset().await?;
        self.closed = true;
        debug!("the statement has been closed");
        Ok(())
    }
}
