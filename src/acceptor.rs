use crate::connection::Connection;
use log::warn;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of the non-blocking accept poll
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

const LISTEN_BACKLOG: i32 = 128;

/// Owns the listening socket and hands out accepted connections
pub struct ConnectionAcceptor {
    listener: TcpListener,
    address: SocketAddr,
    connection_count: AtomicUsize,
}

impl ConnectionAcceptor {
    /// Create a new connection acceptor bound to the specified address
    pub fn new<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket_addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "No socket addresses found")
        })?;

        let socket = Self::create_socket(&socket_addr)?;
        let listener: TcpListener = socket.into();
        let address = listener.local_addr()?;

        Ok(Self {
            listener,
            address,
            connection_count: AtomicUsize::new(0),
        })
    }

    /// Wait up to `timeout` for a connection.
    ///
    /// Returns `Ok(None)` when the timeout passes or `stop` is raised while waiting.
    pub fn accept_timeout(&self, timeout: Duration, stop: &AtomicBool) -> io::Result<Option<Connection>> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    let id = self.connection_count.fetch_add(1, Ordering::Relaxed);
                    match Connection::new(stream, addr, id) {
                        Ok(connection) => return Ok(Some(connection)),
                        Err(e) => warn!("Dropping connection from {}: setup failed: {}", addr, e),
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            if stop.load(Ordering::SeqCst) {
                return Ok(None);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(ACCEPT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Get the local address this acceptor is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Create a properly configured socket
    fn create_socket(addr: &SocketAddr) -> io::Result<Socket> {
        let domain = if addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

        // Accept is polled so the loop can notice a stop request
        socket.set_nonblocking(true)?;
        // Allows quick restarts over TIME_WAIT; a live listener on the port still fails the bind
        socket.set_reuse_address(true)?;

        let sock_addr = socket2::SockAddr::from(*addr);
        socket.bind(&sock_addr)?;
        socket.listen(LISTEN_BACKLOG)?;

        Ok(socket)
    }
}
