//! High-level Connection API.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::params::ConnectParams;
use crate::remote::Backend;
use crate::settings::Settings;
use crate::statement::Statement;

/// State shared by a connection and every statement it created.
pub(crate) struct ConnectionContext<B> {
    pub(crate) backend: Arc<B>,
    pub(crate) params: ConnectParams,
    settings: Mutex<Settings>,
    project: Mutex<String>,
}

impl<B> ConnectionContext<B> {
    pub(crate) fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    pub(crate) fn apply_settings(&self, settings: &Settings) {
        self.settings.lock().extend_from(settings);
    }

    pub(crate) fn project(&self) -> String {
        self.project.lock().clone()
    }

    pub(crate) fn set_project(&self, project: impl Into<String>) {
        *self.project.lock() = project.into();
    }
}

/// A connection to the query service.
///
/// Holds the default project and settings; all work happens through
/// statements created from it.
pub struct Connection<B: Backend> {
    inner: Arc<ConnectionContext<B>>,
}

impl<B: Backend> Connection<B> {
    /// Create a connection over `backend`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use odps_query_rs::{Backend, ConnectParams, Connection};
    ///
    /// fn connect<B: Backend>(backend: B) -> Connection<B> {
    ///     let params = ConnectParams::new("http://service.example.com/api", "analytics")
    ///         .with_setting("odps.sql.type.system.odps2", "true");
    ///     Connection::new(backend, params)
    /// }
    /// ```
    pub fn new(backend: B, params: ConnectParams) -> Self {
        Self::with_shared_backend(Arc::new(backend), params)
    }

    /// Create a connection over a backend shared with other connections.
    pub fn with_shared_backend(backend: Arc<B>, params: ConnectParams) -> Self {
        info!(
            endpoint = %params.endpoint,
            project = %params.project,
            interactive = params.interactive,
            "connect"
        );
        let settings = params.settings.clone();
        let project = params.project.clone();
        Self {
            inner: Arc::new(ConnectionContext {
                backend,
                params,
                settings: Mutex::new(settings),
                project: Mutex::new(project),
            }),
        }
    }

    /// Create a statement yielding forward-only cursors.
    pub fn create_statement(&self) -> Statement<B> {
        Statement::new(Arc::clone(&self.inner), false)
    }

    /// Create a statement yielding scrollable cursors.
    ///
    /// Interactive connections always stream forward-only.
    pub fn create_scrollable_statement(&self) -> Statement<B> {
        Statement::new(Arc::clone(&self.inner), true)
    }

    pub fn params(&self) -> &ConnectParams {
        &self.inner.params
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.inner.backend
    }

    /// Current connection-level settings.
    pub fn settings(&self) -> Settings {
        self.inner.settings()
    }

    /// Set a connection-level default. Applies to statements created afterwards.
    pub fn set_setting(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.settings.lock().set(key, value);
    }

    /// Project new jobs are submitted to.
    pub fn project(&self) -> String {
        self.inner.project()
    }

    pub fn set_project(&self, project: impl Into<String>) {
        self.inner.set_project(project);
    }

    pub fn is_interactive(&self) -> bool {
        self.inner.params.interactive
    }

    /// Close the connection.
    ///
    /// Statements already created keep working until they are closed.
    pub async fn close(self) -> Result<()> {
        debug!(project = %self.inner.project(), "close connection");
        Ok(())
    }
}
