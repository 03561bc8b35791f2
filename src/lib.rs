//! Query client for an asynchronously executed SQL service
//!
//! The service runs every statement as a remote job and serves results only
//! through a separate paginated transfer channel. This crate turns that into
//! plain row iteration: submit, poll until the job finishes, then read the
//! output through a forward-only or scrollable cursor.
//!
//! The transport is supplied by the caller through the `Backend` traits in
//! [`remote`].
//!
//! # Example
//!
//! ```no_run
//! use odps_query_rs::{Backend, ConnectParams, Connection, Cursor, Result};
//!
//! async fn run<B: Backend>(backend: B) -> Result<()> {
//!     let params = ConnectParams::new("http://service.example.com/api", "analytics");
//!     let conn = Connection::new(backend, params);
//!
//!     let mut stmt = conn.create_statement();
//!     let cursor = stmt.execute_query("select id, name from users").await?;
//!     while cursor.next().await? {
//!         let row = cursor.row().await?;
//!         println!("{:?}", row.get_by_name("name"));
//!     }
//!
//!     stmt.close().await?;
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod params;
pub mod remote;
pub mod session;
pub mod settings;
pub mod sql;
pub mod statement;
pub mod trace;
pub mod types;

// Re-export main types
pub use connection::Connection;
pub use coordinator::{ExecutionCoordinator, ExecutionOutcome, QueryJob};
pub use cursor::{
    CacheWindow, Cursor, CursorStreamExt, FetchDirection, ForwardCursor, ResultCursor,
    ScrollCursor, SessionForwardCursor, MAX_READ_ATTEMPTS,
};
pub use error::{Error, Result};
pub use params::ConnectParams;
pub use remote::{
    Backend, DownloadSession, InteractiveRun, InteractiveService, JobControl, JobId, JobStatus,
    RecordReader, RecordStream, TransferService,
};
pub use session::{ResultSession, ResultSessionFactory};
pub use settings::Settings;
pub use statement::{CancelHandle, Statement};
pub use trace::TraceUrlBuilder;
pub use types::{Column, ColumnMetadata, RawRecord, Row, RowDecoder, RowSchema, TypeInfo, Value};
