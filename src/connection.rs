use crate::buffer::{LineBuffer, LineSlice};
use std::io::{self, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// What a single bounded read attempt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line
    Line(String),
    /// An over-long line that was thrown away
    Overflow(String),
    /// Nothing arrived within the read timeout
    Idle,
    /// The peer closed its side (or the socket was force-closed)
    Eof,
}

/// Represents a TCP connection with a client
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: usize,
    buffer: LineBuffer,
    last_activity: Instant,
    max_line_length: usize,
}

impl Connection {
    /// Create a new connection from a TcpStream
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, id: usize) -> io::Result<Self> {
        // Accepted sockets may inherit non-blocking mode from the listener
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;

        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;

        Ok(Self {
            stream,
            peer_addr,
            id,
            buffer: LineBuffer::new(4 * 1024),
            last_activity: Instant::now(),
            max_line_length: 8 * 1024,
        })
    }

    /// Set how long one read attempt may block
    pub fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))
    }

    pub fn set_max_line_length(&mut self, max: usize) {
        self.max_line_length = max;
    }

    /// Try to produce one line, blocking for at most one read timeout.
    ///
    /// Bytes already buffered are served first; otherwise a single read is
    /// issued against the socket.
    pub fn read_line(&mut self) -> io::Result<ReadOutcome> {
        loop {
            match self.buffer.take_line(self.max_line_length) {
                LineSlice::Line(line) => return Ok(ReadOutcome::Line(line)),
                LineSlice::Overflow(dropped) => return Ok(ReadOutcome::Overflow(dropped)),
                LineSlice::Incomplete => {}
            }

            match self.buffer.read_from(&mut self.stream) {
                Ok(0) => return Ok(ReadOutcome::Eof),
                Ok(_) => {
                    self.last_activity = Instant::now();
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    return Ok(ReadOutcome::Idle);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the connection
    pub fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(ref e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    /// A second handle to the same socket, used to force-close it from another thread
    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }

    /// How long since the peer last sent anything
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Get the connection's peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the connection's unique ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get a mutable reference to the underlying TcpStream
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}
