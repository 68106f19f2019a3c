use simple_http_server::{
    Connection, ConnectionHandler, HandlerOutcome, ResponseWriter, ServerConfig, ServerStats, StaticFiles,
};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Harness {
    client: TcpStream,
    shutdown: Arc<AtomicBool>,
    stats: Arc<ServerStats>,
    handler: thread::JoinHandle<std::io::Result<HandlerOutcome>>,
    _root: tempfile::TempDir,
}

fn spawn_handler(idle_timeout: Option<Duration>) -> Harness {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), "hi").unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let (stream, peer) = listener.accept().unwrap();

    let config = Arc::new(
        ServerConfig::new(0, root.path())
            .with_read_timeout(Duration::from_millis(50))
            .with_idle_timeout(idle_timeout),
    );
    let writer = ResponseWriter::new(Arc::new(StaticFiles::new(root.path(), "index.html").unwrap()));
    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(ServerStats::new());

    let connection = Connection::new(stream, peer, 7).unwrap();
    let handler = ConnectionHandler::new(connection, config, writer, shutdown.clone(), stats.clone()).unwrap();

    Harness {
        client,
        shutdown,
        stats,
        handler: thread::spawn(move || handler.run()),
        _root: root,
    }
}

#[test]
fn test_serves_one_request_then_closes() {
    let mut h = spawn_handler(None);
    h.client.write_all(b"GET / HTTP/1.0\r\nUser-Agent: test\r\n\r\n").unwrap();

    let mut response = String::new();
    h.client.read_to_string(&mut response).unwrap();

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(response.ends_with("\r\n\r\nhi"));
    assert_eq!(h.handler.join().unwrap().unwrap(), HandlerOutcome::Served);
    assert_eq!(h.stats.snapshot().requests_served, 1);
}

#[test]
fn test_peer_hangup_is_not_an_error() {
    let h = spawn_handler(None);
    drop(h.client);

    assert_eq!(h.handler.join().unwrap().unwrap(), HandlerOutcome::PeerClosed);
}

#[test]
fn test_garbage_keeps_connection_open() {
    let mut h = spawn_handler(None);
    h.client.write_all(b"this is not a request\r\n").unwrap();
    thread::sleep(Duration::from_millis(150));

    assert!(!h.handler.is_finished());
    assert_eq!(h.stats.snapshot().malformed_lines, 1);

    h.client.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
    let mut response = String::new();
    h.client.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
    assert_eq!(h.handler.join().unwrap().unwrap(), HandlerOutcome::Served);
}

#[test]
fn test_shutdown_flag_ends_idle_wait() {
    let h = spawn_handler(None);
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    h.shutdown.store(true, Ordering::SeqCst);

    assert_eq!(h.handler.join().unwrap().unwrap(), HandlerOutcome::Shutdown);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_idle_timeout_closes_silent_client() {
    let mut h = spawn_handler(Some(Duration::from_millis(200)));

    let mut buf = [0u8; 8];
    assert_eq!(h.client.read(&mut buf).unwrap(), 0);
    assert_eq!(h.handler.join().unwrap().unwrap(), HandlerOutcome::IdleTimeout);
    assert_eq!(h.stats.snapshot().idle_timeouts, 1);
}
