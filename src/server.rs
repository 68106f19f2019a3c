//! Server lifecycle: start, accept loop, forced stop.
//!
//! The accept loop runs on its own thread and polls the listener with a
//! bounded wait, so it notices a stop request within `accept_timeout`. Each
//! accepted connection gets its own handler thread and is recorded in a
//! registry; `stop()` shuts every registered socket down at the transport
//! level instead of waiting for clients.

use crate::acceptor::ConnectionAcceptor;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{ServerError, ServerResult};
use crate::handler::ConnectionHandler;
use crate::static_files::{FileResolver, StaticFiles};
use crate::stats::{ServerStats, StatsSnapshot};
use crate::writer::ResponseWriter;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle of a [`Server`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    /// Legal moves: Stopped → Starting → Running → Stopping → Stopped,
    /// plus Starting → Stopped when startup fails.
    pub fn can_transition_to(self, next: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (self, next),
            (Stopped, Starting) | (Starting, Running) | (Starting, Stopped) | (Running, Stopping) | (Stopping, Stopped)
        )
    }
}

/// Live connections of one run, keyed by connection id
#[derive(Debug, Default)]
struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    drained: Condvar,
}

#[derive(Debug, Default)]
struct RegistryInner {
    streams: HashMap<usize, TcpStream>,
    closed: bool,
}

impl ConnectionRegistry {
    /// Track a connection; refused once the registry has been closed
    fn register(&self, id: usize, stream: TcpStream) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.streams.insert(id, stream);
        true
    }

    fn deregister(&self, id: usize) {
        let mut inner = self.inner.lock();
        inner.streams.remove(&id);
        if inner.streams.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Refuse further registrations and shut down every tracked socket.
    /// Entries stay until their handlers deregister.
    fn close_all(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.closed = true;
        for (id, stream) in inner.streams.iter() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("[conn {}] force-close: {}", id, e);
            }
        }
        inner.streams.len()
    }

    /// Wait until every handler has deregistered; false if the deadline passed first
    fn wait_drained(&self, deadline: Instant) -> bool {
        let mut inner = self.inner.lock();
        while !inner.streams.is_empty() {
            if self.drained.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        inner.streams.is_empty()
    }

    fn len(&self) -> usize {
        self.inner.lock().streams.len()
    }
}

/// Everything that belongs to one start/stop cycle
struct ActiveRun {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
    accept_thread: JoinHandle<()>,
    accept_done: Receiver<()>,
}

/// What the accept loop hands to each connection thread
#[derive(Clone)]
struct AcceptContext {
    config: Arc<ServerConfig>,
    writer: ResponseWriter,
    shutdown: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ServerStats>,
}

/// A static-file HTTP server with a start/stop lifecycle
pub struct Server {
    config: Arc<ServerConfig>,
    resolver: Option<Arc<dyn FileResolver>>,
    state: Mutex<ServerState>,
    state_changed: Condvar,
    run: Mutex<Option<ActiveRun>>,
    stats: Arc<ServerStats>,
}

impl Server {
    /// Serve `config.root_dir` with the built-in file resolver
    pub fn new(config: ServerConfig) -> Self {
        Self::build(config, None)
    }

    /// Use a custom resolver instead of serving `config.root_dir`
    pub fn with_resolver(config: ServerConfig, resolver: Arc<dyn FileResolver>) -> Self {
        Self::build(config, Some(resolver))
    }

    fn build(config: ServerConfig, resolver: Option<Arc<dyn FileResolver>>) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
            state: Mutex::new(ServerState::Stopped),
            state_changed: Condvar::new(),
            run: Mutex::new(None),
            stats: Arc::new(ServerStats::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// The address actually bound, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.run.lock().as_ref().map(|run| run.local_addr)
    }

    /// Number of connections currently being handled
    pub fn active_connections(&self) -> usize {
        self.run.lock().as_ref().map(|run| run.registry.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn transition(&self, state: &mut ServerState, next: ServerState) {
        debug_assert!(state.can_transition_to(next), "illegal transition {:?} -> {:?}", state, next);
        debug!("Server state {:?} -> {:?}", state, next);
        *state = next;
        self.state_changed.notify_all();
    }

    /// Bind the listener and start accepting on a background thread.
    ///
    /// Returns once the socket is listening. Fails with
    /// [`ServerError::AlreadyRunning`] unless the server is stopped, and with
    /// [`ServerError::Bind`] if the address cannot be bound; after a failure
    /// the server is back in `Stopped` with nothing left open.
    pub fn start(&self) -> ServerResult<()> {
        {
            let mut state = self.state.lock();
            if *state != ServerState::Stopped {
                return Err(ServerError::AlreadyRunning);
            }
            self.transition(&mut state, ServerState::Starting);
        }

        let launched = self.launch();

        let mut state = self.state.lock();
        match launched {
            Ok(run) => {
                info!(
                    "Serving {} on http://{}",
                    self.config.root_dir.display(),
                    run.local_addr
                );
                *self.run.lock() = Some(run);
                self.transition(&mut state, ServerState::Running);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start server: {}", e);
                self.transition(&mut state, ServerState::Stopped);
                Err(e)
            }
        }
    }

    fn launch(&self) -> ServerResult<ActiveRun> {
        self.config.validate()?;

        let resolver: Arc<dyn FileResolver> = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(
                StaticFiles::new(&self.config.root_dir, &self.config.index_file).map_err(|e| {
                    ServerError::Config(format!(
                        "cannot serve {}: {}",
                        self.config.root_dir.display(),
                        e
                    ))
                })?,
            ),
        };

        let address = self.config.socket_address();
        let acceptor =
            ConnectionAcceptor::new(&address).map_err(|source| ServerError::Bind { address, source })?;
        let local_addr = acceptor.local_addr();

        let shutdown = Arc::new(AtomicBool::new(false));
        let registry = Arc::new(ConnectionRegistry::default());
        let ctx = AcceptContext {
            config: self.config.clone(),
            writer: ResponseWriter::new(resolver),
            shutdown: shutdown.clone(),
            registry: registry.clone(),
            stats: self.stats.clone(),
        };

        let (done_tx, accept_done) = channel::bounded(1);
        // If spawning fails the closure, and with it the listener, is dropped here
        let accept_thread = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || {
                accept_loop(acceptor, ctx);
                let _ = done_tx.send(());
            })?;

        Ok(ActiveRun {
            local_addr,
            shutdown,
            registry,
            accept_thread,
            accept_done,
        })
    }

    /// Stop accepting, force-close every open connection and wait (bounded)
    /// for the threads to exit. Safe to call any number of times from any
    /// thread; only one caller performs the shutdown, the others wait for it.
    pub fn stop(&self) {
        let patience = self.config.shutdown_timeout * 2 + self.config.accept_timeout;
        let deadline = Instant::now() + patience;

        let mut state = self.state.lock();
        loop {
            match *state {
                ServerState::Stopped => return,
                ServerState::Running => break,
                ServerState::Starting | ServerState::Stopping => {
                    if self.state_changed.wait_until(&mut state, deadline).timed_out() {
                        warn!("Gave up waiting for server to leave {:?}", *state);
                        return;
                    }
                }
            }
        }
        self.transition(&mut state, ServerState::Stopping);
        drop(state);

        self.shut_down();

        let mut state = self.state.lock();
        self.transition(&mut state, ServerState::Stopped);
        info!("Server stopped");
    }

    fn shut_down(&self) {
        let run = match self.run.lock().take() {
            Some(run) => run,
            None => return,
        };
        info!("Stopping server on {}", run.local_addr);

        run.shutdown.store(true, Ordering::SeqCst);

        let forced = run.registry.close_all();
        if forced > 0 {
            self.stats.forced_closes.increment(forced);
            info!("Force-closed {} open connection(s)", forced);
        }

        let deadline = Instant::now() + self.config.shutdown_timeout;
        match run.accept_done.recv_deadline(deadline) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if run.accept_thread.join().is_err() {
                    error!("Accept loop panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Accept loop did not exit within {:?}; detaching it",
                    self.config.shutdown_timeout
                );
            }
        }

        if !run.registry.wait_drained(deadline) {
            warn!(
                "{} connection thread(s) still winding down after {:?}",
                run.registry.len(),
                self.config.shutdown_timeout
            );
        }
    }
}

impl Default for Server {
    /// Default configuration: port 8000, current directory
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(acceptor: ConnectionAcceptor, ctx: AcceptContext) {
    let addr = acceptor.local_addr();
    debug!("Accept loop on {} started", addr);

    while !ctx.shutdown.load(Ordering::SeqCst) {
        match acceptor.accept_timeout(ctx.config.accept_timeout, &ctx.shutdown) {
            Ok(Some(connection)) => dispatch(connection, &ctx),
            Ok(None) => {}
            Err(e) => {
                warn!("Error accepting connection on {}: {}", addr, e);
                thread::sleep(ctx.config.accept_timeout.min(Duration::from_millis(100)));
            }
        }
    }

    // Dropping the acceptor closes the listening socket
    drop(acceptor);
    debug!("Accept loop on {} exited", addr);
}

/// Register the connection and run its handler on a fresh thread
fn dispatch(mut connection: Connection, ctx: &AcceptContext) {
    ctx.stats.connections_accepted.increment(1);
    let id = connection.id();
    let peer = connection.peer_addr();
    debug!("[conn {}] accepted from {}", id, peer);

    let stream = match connection.try_clone_stream() {
        Ok(stream) => stream,
        Err(e) => {
            warn!("[conn {}] could not track connection: {}", id, e);
            let _ = connection.close();
            return;
        }
    };
    if !ctx.registry.register(id, stream) {
        // Lost the race against stop()
        let _ = connection.close();
        return;
    }

    let handler = match ConnectionHandler::new(
        connection,
        ctx.config.clone(),
        ctx.writer.clone(),
        ctx.shutdown.clone(),
        ctx.stats.clone(),
    ) {
        Ok(handler) => handler,
        Err(e) => {
            warn!("[conn {}] setup failed: {}", id, e);
            ctx.stats.connection_errors.increment(1);
            ctx.registry.deregister(id);
            return;
        }
    };

    let registry = ctx.registry.clone();
    let stats = ctx.stats.clone();
    let spawned = thread::Builder::new()
        .name(format!("http-conn-{}", id))
        .spawn(move || {
            match handler.run() {
                Ok(outcome) => debug!("[conn {}] closed: {:?}", id, outcome),
                Err(e) => {
                    stats.connection_errors.increment(1);
                    warn!("[conn {}] I/O error with {}: {}", id, peer, e);
                }
            }
            registry.deregister(id);
        });

    if let Err(e) = spawned {
        error!("[conn {}] could not spawn handler thread: {}", id, e);
        ctx.stats.connection_errors.increment(1);
        ctx.registry.deregister(id);
    }
}
