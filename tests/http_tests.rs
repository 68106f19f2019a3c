use simple_http_server::http::{parse_request_line, Method, ParsedLine, RequestLine, Response, Status};
use simple_http_server::static_files::{FileResolver, Resolved};
use simple_http_server::writer::ResponseWriter;
use std::io::{self, Cursor};
use std::sync::Arc;

fn request(method: &str, path: &str) -> RequestLine {
    RequestLine {
        method: method.to_string(),
        path: path.to_string(),
        version: "HTTP/1.0".to_string(),
    }
}

/// Resolver that answers from a fixed table instead of the file system
struct FixedResolver;

impl FileResolver for FixedResolver {
    fn resolve(&self, request_path: &str) -> io::Result<Resolved> {
        match request_path {
            "/secret" => Ok(Resolved::Forbidden),
            "/broken" => Err(io::Error::new(io::ErrorKind::Other, "disk on fire")),
            "/file" => {
                let dir = tempfile::tempdir()?;
                let path = dir.path().join("file.txt");
                std::fs::write(&path, b"file contents")?;
                let file = std::fs::File::open(&path)?;
                Ok(Resolved::Found {
                    file,
                    length: 13,
                    content_type: "text/plain",
                })
            }
            _ => Ok(Resolved::NotFound),
        }
    }
}

fn render(response: Response) -> String {
    let mut out = Vec::new();
    ResponseWriter::write_to(response, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_parse_simple_get() {
    match parse_request_line("GET /index.html HTTP/1.0") {
        ParsedLine::Request(req) => {
            assert_eq!(req.method, "GET");
            assert_eq!(req.path, "/index.html");
            assert_eq!(req.version, "HTTP/1.0");
            assert_eq!(req.method(), Some(Method::Get));
            assert!(req.expects_headers());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_rejects_wrong_token_counts() {
    let bad = [
        "",
        "   ",
        "GET",
        "GET /",
        "GET / HTTP/1.0 extra",
        "Foobar!  Bah, I am not an HTTP request...",
    ];

    for line in bad {
        assert_eq!(
            parse_request_line(line),
            ParsedLine::Malformed(line.to_string()),
            "line {:?}",
            line
        );
    }
}

#[test]
fn test_parse_keeps_unknown_methods() {
    // Anything with three tokens is a request line; the method is judged later
    match parse_request_line("BREW /pot HTCPCP/1.0") {
        ParsedLine::Request(req) => {
            assert_eq!(req.method(), None);
            assert!(!req.expects_headers());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_response_headers_keep_insertion_order() {
    let mut response = Response::new(Status::Ok);
    response.set_header("X-First", "1");
    response.set_header("X-Second", "2");
    response.set_header("x-first", "replaced");
    response.set_body(b"Hello, World!");

    let text = render(response);
    assert!(text.starts_with("HTTP/1.0 200 OK\r\nServer: "));

    let names: Vec<&str> = text
        .split("\r\n\r\n")
        .next()
        .unwrap()
        .lines()
        .skip(1)
        .map(|l| l.split(':').next().unwrap())
        .collect();
    assert_eq!(
        names,
        ["Server", "Connection", "X-First", "X-Second", "Content-Type", "Content-Length"]
    );
    assert!(text.contains("X-First: replaced\r\n"));
    assert!(text.contains("Content-Length: 13\r\n"));
    assert!(text.ends_with("\r\n\r\nHello, World!"));
}

#[test]
fn test_status_lines() {
    let statuses = vec![
        (Status::Ok, 200, "OK"),
        (Status::Forbidden, 403, "Forbidden"),
        (Status::NotFound, 404, "Not Found"),
        (Status::InternalServerError, 500, "Internal Server Error"),
        (Status::NotImplemented, 501, "Not Implemented"),
    ];

    for (status, code, text) in statuses {
        let rendered = render(ResponseWriter::respond_error(status));
        assert!(rendered.starts_with(&format!("HTTP/1.0 {} {}\r\n", code, text)));
        assert!(rendered.ends_with(&format!("{} {}\n", code, text)));
    }
}

#[test]
fn test_stream_body_is_copied() {
    let mut response = Response::new(Status::Ok);
    response.set_stream(Box::new(Cursor::new(b"streamed body".to_vec())), 13);

    let text = render(response);
    assert!(text.contains("Content-Length: 13\r\n"));
    assert!(text.ends_with("\r\n\r\nstreamed body"));
}

#[test]
fn test_short_stream_is_an_error() {
    let mut response = Response::new(Status::Ok);
    response.set_stream(Box::new(Cursor::new(b"short".to_vec())), 100);

    let mut out = Vec::new();
    let err = ResponseWriter::write_to(response, &mut out).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn test_respond_maps_resolutions() {
    let writer = ResponseWriter::new(Arc::new(FixedResolver));

    assert_eq!(writer.respond(&request("GET", "/missing")).status, Status::NotFound);
    assert_eq!(writer.respond(&request("GET", "/secret")).status, Status::Forbidden);
    assert_eq!(writer.respond(&request("GET", "/broken")).status, Status::InternalServerError);
    assert_eq!(writer.respond(&request("DELETE", "/file")).status, Status::NotImplemented);

    let found = writer.respond(&request("GET", "/file"));
    assert_eq!(found.status, Status::Ok);
    assert_eq!(found.header("Content-Type"), Some("text/plain"));
    assert!(render(found).ends_with("file contents"));
}

#[test]
fn test_head_keeps_length_but_drops_body() {
    let writer = ResponseWriter::new(Arc::new(FixedResolver));

    let response = writer.respond(&request("HEAD", "/file"));
    assert_eq!(response.header("Content-Length"), Some("13"));
    assert!(response.body.is_empty());
    assert!(render(response).ends_with("\r\n\r\n"));
}
