use std::fmt;
use std::io::{self, Read, Write};

pub const HTTP_VERSION: &str = "HTTP/1.0";
pub const SERVER_NAME: &str = concat!("simple-http-server/", env!("CARGO_PKG_VERSION"));

/// HTTP Status Codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 200,

    Forbidden = 403,
    NotFound = 404,

    InternalServerError = 500,
    NotImplemented = 501,
}

impl Status {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the text description for this status code
    pub fn as_str(&self) -> &'static str {
        match *self {
            Status::Ok => "OK",

            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",

            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
        }
    }
}

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Connect,
    Patch,
}

impl Method {
    /// Parse a method token; unknown tokens yield `None`
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "OPTIONS" => Some(Method::Options),
            "TRACE" => Some(Method::Trace),
            "CONNECT" => Some(Method::Connect),
            "PATCH" => Some(Method::Patch),
            _ => None,
        }
    }

    /// Convert the method to a string
    pub fn as_str(&self) -> &'static str {
        match *self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
        }
    }
}

/// The first line of a request: `<METHOD> <PATH> <VERSION>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub version: String,
}

impl RequestLine {
    /// The method as a known verb, if it is one
    pub fn method(&self) -> Option<Method> {
        Method::from_token(&self.method)
    }

    /// True when the client speaks HTTP/1.x and will therefore send headers
    pub fn expects_headers(&self) -> bool {
        self.version.starts_with("HTTP/1.")
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.path, self.version)
    }
}

/// Outcome of parsing one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Request(RequestLine),
    /// Anything that is not exactly three tokens; carries the raw text
    Malformed(String),
}

/// Parse a request line.
///
/// Exactly three whitespace-separated tokens are accepted. Empty lines and
/// any other token count are reported as malformed.
pub fn parse_request_line(raw: &str) -> ParsedLine {
    let mut parts = raw.split_whitespace();

    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version), None) => ParsedLine::Request(RequestLine {
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
        }),
        _ => ParsedLine::Malformed(raw.to_string()),
    }
}

/// Response payload
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// A reader of known length, copied to the socket as it is read
    Stream { reader: Box<dyn Read + Send>, length: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::Stream { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Stream { length, .. } => f.debug_struct("Stream").field("length", length).finish(),
        }
    }
}

/// HTTP Response
///
/// Headers keep their insertion order on the wire.
#[derive(Debug)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Response {
    /// Create a new response
    pub fn new(status: Status) -> Self {
        let headers = vec![
            ("Server".to_string(), SERVER_NAME.to_string()),
            ("Connection".to_string(), "close".to_string()),
        ];

        Self {
            status,
            headers,
            body: Body::Empty,
        }
    }

    /// Plain-text response whose body is the reason phrase
    pub fn plain(status: Status) -> Self {
        let mut response = Self::new(status);
        response.set_body(format!("{} {}\n", status.code(), status.as_str()).as_bytes());
        response
    }

    /// Set a header, replacing an existing one with the same name in place
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Get a header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set the body and update content-length
    pub fn set_body(&mut self, body: &[u8]) {
        self.body = Body::Bytes(body.to_vec());
        if self.header("Content-Type").is_none() {
            self.set_header("Content-Type", "text/plain");
        }
        self.set_header("Content-Length", &body.len().to_string());
    }

    /// Stream the body from `reader`, which must yield exactly `length` bytes
    pub fn set_stream(&mut self, reader: Box<dyn Read + Send>, length: u64) {
        self.body = Body::Stream { reader, length };
        self.set_header("Content-Length", &length.to_string());
    }

    /// Drop the body but keep every header, Content-Length included (HEAD)
    pub fn strip_body(&mut self) {
        self.body = Body::Empty;
    }

    /// Serialize the status line and headers
    pub fn serialize_head<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(writer, "{} {} {}\r\n", HTTP_VERSION, self.status.code(), self.status.as_str())?;

        for (name, value) in &self.headers {
            write!(writer, "{}: {}\r\n", name, value)?;
        }

        write!(writer, "\r\n")
    }
}
