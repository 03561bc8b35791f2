//! Connection parameters.

use std::time::Duration;

use crate::settings::Settings;

/// Host used for trace URLs when none is configured.
pub const DEFAULT_TRACE_HOST: &str = "http://logview.odps.aliyun.com";

/// Interval between two job status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Rows per download window.
pub const DEFAULT_FETCH_SIZE: u32 = 10_000;

/// Lifetime of the token embedded in trace URLs.
pub const DEFAULT_TRACE_VALID_HOURS: u32 = 7 * 24;

/// Parameters shared by every statement of a connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Service endpoint, embedded in trace URLs.
    pub endpoint: String,
    /// Default project jobs are submitted to.
    pub project: String,
    /// Bulk transfer endpoint override.
    pub tunnel_endpoint: Option<String>,
    /// Trace URL host. Empty disables trace URLs.
    pub trace_host: String,
    /// Trace token lifetime in hours.
    pub trace_valid_hours: u32,
    /// Per-connection default settings.
    pub settings: Settings,
    /// Run statements through the interactive executor.
    pub interactive: bool,
    /// Job status poll interval (default: 3 seconds).
    pub poll_interval: Duration,
    /// Default fetch size for new statements.
    pub fetch_size: u32,
}

impl ConnectParams {
    /// Create new connection parameters.
    pub fn new(endpoint: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            project: project.into(),
            tunnel_endpoint: None,
            trace_host: DEFAULT_TRACE_HOST.to_string(),
            trace_valid_hours: DEFAULT_TRACE_VALID_HOURS,
            settings: Settings::new(),
            interactive: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Route downloads through a specific transfer endpoint.
    pub fn with_tunnel_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.tunnel_endpoint = Some(endpoint.into());
        self
    }

    /// Override the trace URL host.
    ///
    /// # Example
    ///
    /// ```
    /// use odps_query_rs::ConnectParams;
    ///
    /// let params = ConnectParams::new("http://service.example.com/api", "analytics")
    ///     .with_trace_host("http://trace.example.com");
    /// assert_eq!(params.trace_host, "http://trace.example.com");
    /// ```
    pub fn with_trace_host(mut self, host: impl Into<String>) -> Self {
        self.trace_host = host.into();
        self
    }

    /// Set the trace token lifetime.
    pub fn with_trace_valid_hours(mut self, hours: u32) -> Self {
        self.trace_valid_hours = hours;
        self
    }

    /// Add one per-connection default setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.set(key, value);
        self
    }

    /// Add several per-connection default settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.settings.extend_from(settings);
        self
    }

    /// Execute through the interactive executor instead of batch jobs.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Set the job status poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default fetch size for new statements.
    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size;
        self
    }
}
