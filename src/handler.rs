//! Per-connection request handling.
//!
//! ```text
//!   AwaitingLine ──malformed──▶ AwaitingLine
//!        │
//!        │ well-formed
//!        ▼
//!   Responding ──▶ Closed
//! ```
//!
//! A connection serves at most one request. Garbage lines before it are
//! counted and skipped; the connection stays open for the next line.

use crate::config::ServerConfig;
use crate::connection::{Connection, ReadOutcome};
use crate::http::{parse_request_line, ParsedLine, RequestLine};
use crate::stats::ServerStats;
use crate::writer::ResponseWriter;
use log::debug;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// One request was answered
    Served,
    /// The client went away before sending a valid request line
    PeerClosed,
    /// The client stayed silent longer than the idle timeout
    IdleTimeout,
    /// The server is stopping
    Shutdown,
}

#[derive(Debug)]
enum HandlerState {
    AwaitingLine,
    Responding(RequestLine),
    Closed(HandlerOutcome),
}

/// Drives one connection from accept to close
pub struct ConnectionHandler {
    connection: Connection,
    config: Arc<ServerConfig>,
    writer: ResponseWriter,
    shutdown: Arc<AtomicBool>,
    stats: Arc<ServerStats>,
}

impl ConnectionHandler {
    pub fn new(
        mut connection: Connection,
        config: Arc<ServerConfig>,
        writer: ResponseWriter,
        shutdown: Arc<AtomicBool>,
        stats: Arc<ServerStats>,
    ) -> io::Result<Self> {
        connection.set_read_timeout(config.read_timeout)?;
        connection.set_max_line_length(config.max_line_length);

        Ok(Self {
            connection,
            config,
            writer,
            shutdown,
            stats,
        })
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Process the connection to completion. The socket is closed on every path.
    pub fn run(mut self) -> io::Result<HandlerOutcome> {
        let result = self.drive();
        let _ = self.connection.close();
        result
    }

    fn drive(&mut self) -> io::Result<HandlerOutcome> {
        let mut state = HandlerState::AwaitingLine;

        loop {
            state = match state {
                HandlerState::AwaitingLine => self.await_line()?,
                HandlerState::Responding(request) => self.respond(request)?,
                HandlerState::Closed(outcome) => return Ok(outcome),
            };
        }
    }

    fn await_line(&mut self) -> io::Result<HandlerState> {
        if self.shutting_down() {
            return Ok(HandlerState::Closed(HandlerOutcome::Shutdown));
        }

        let next = match self.connection.read_line()? {
            ReadOutcome::Line(line) => match parse_request_line(&line) {
                ParsedLine::Request(request) => HandlerState::Responding(request),
                ParsedLine::Malformed(raw) => {
                    self.skip_malformed(&raw);
                    HandlerState::AwaitingLine
                }
            },
            ReadOutcome::Overflow(raw) => {
                self.skip_malformed(&raw);
                HandlerState::AwaitingLine
            }
            ReadOutcome::Idle => self.on_idle(),
            ReadOutcome::Eof if self.shutting_down() => HandlerState::Closed(HandlerOutcome::Shutdown),
            ReadOutcome::Eof => HandlerState::Closed(HandlerOutcome::PeerClosed),
        };

        Ok(next)
    }

    fn skip_malformed(&self, raw: &str) {
        self.stats.malformed_lines.increment(1);
        let shown: String = raw.chars().take(80).collect();
        debug!(
            "[conn {}] ignoring malformed request line from {}: {:?}",
            self.connection.id(),
            self.connection.peer_addr(),
            shown
        );
    }

    fn on_idle(&self) -> HandlerState {
        if self.shutting_down() {
            return HandlerState::Closed(HandlerOutcome::Shutdown);
        }

        match self.config.idle_timeout {
            Some(limit) if self.connection.idle_for() >= limit => {
                self.stats.idle_timeouts.increment(1);
                debug!(
                    "[conn {}] idle for {:?}, closing",
                    self.connection.id(),
                    self.connection.idle_for()
                );
                HandlerState::Closed(HandlerOutcome::IdleTimeout)
            }
            _ => HandlerState::AwaitingLine,
        }
    }

    fn respond(&mut self, request: RequestLine) -> io::Result<HandlerState> {
        if request.expects_headers() && !self.discard_headers()? {
            return Ok(HandlerState::Closed(HandlerOutcome::Shutdown));
        }

        let response = self.writer.respond(&request);
        let status = response.status;
        let sent = ResponseWriter::write_to(response, self.connection.stream_mut())?;

        self.stats.requests_served.increment(1);
        debug!(
            "[conn {}] {} -> {} ({} bytes)",
            self.connection.id(),
            request,
            status.code(),
            sent
        );

        Ok(HandlerState::Closed(HandlerOutcome::Served))
    }

    /// Read and drop header lines up to the blank line.
    ///
    /// Gives up quietly on EOF or once the header timeout passes; returns
    /// `false` only when the server started shutting down meanwhile.
    fn discard_headers(&mut self) -> io::Result<bool> {
        let deadline = Instant::now() + self.config.header_timeout;

        loop {
            if self.shutting_down() {
                return Ok(false);
            }

            match self.connection.read_line()? {
                ReadOutcome::Line(line) if line.is_empty() => return Ok(true),
                ReadOutcome::Eof => return Ok(!self.shutting_down()),
                ReadOutcome::Line(_) | ReadOutcome::Overflow(_) | ReadOutcome::Idle => {}
            }

            if Instant::now() >= deadline {
                return Ok(true);
            }
        }
    }
}
