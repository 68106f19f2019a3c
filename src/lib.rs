pub mod acceptor;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod http;
pub mod server;
pub mod static_files;
pub mod stats;
pub mod writer;

/// Re-exports of common components for easier access
pub use acceptor::ConnectionAcceptor;
pub use config::ServerConfig;
pub use connection::{Connection, ReadOutcome};
pub use error::{ServerError, ServerResult};
pub use handler::{ConnectionHandler, HandlerOutcome};
pub use http::{parse_request_line, Body, Method, ParsedLine, RequestLine, Response, Status};
pub use server::{Server, ServerState};
pub use static_files::{FileResolver, Resolved, StaticFiles};
pub use stats::{ServerStats, StatsSnapshot};
pub use writer::ResponseWriter;
