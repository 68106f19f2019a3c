use crate::http::{Body, Method, RequestLine, Response, Status};
use crate::static_files::{FileResolver, Resolved};
use log::{debug, warn};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;

/// Builds responses for parsed requests and puts them on the wire
#[derive(Clone)]
pub struct ResponseWriter {
    resolver: Arc<dyn FileResolver>,
}

impl ResponseWriter {
    pub fn new(resolver: Arc<dyn FileResolver>) -> Self {
        Self { resolver }
    }

    /// Map a request onto a file below the root
    pub fn respond(&self, request: &RequestLine) -> Response {
        let method = match request.method() {
            Some(m @ (Method::Get | Method::Head)) => m,
            _ => return Self::respond_error(Status::NotImplemented),
        };

        let mut response = match self.resolver.resolve(&request.path) {
            Ok(Resolved::Found { file, length, content_type }) => {
                let mut response = Response::new(Status::Ok);
                response.set_header("Content-Type", content_type);
                response.set_stream(Box::new(file), length);
                response
            }
            Ok(Resolved::NotFound) => Self::respond_error(Status::NotFound),
            Ok(Resolved::Forbidden) => {
                debug!("Refusing {} outside the served root", request.path);
                Self::respond_error(Status::Forbidden)
            }
            Err(e) => {
                warn!("Failed to resolve {}: {}", request.path, e);
                Self::respond_error(Status::InternalServerError)
            }
        };

        if method == Method::Head {
            response.strip_body();
        }
        response
    }

    /// A small plain-text error response
    pub fn respond_error(status: Status) -> Response {
        Response::plain(status)
    }

    /// Write the response and flush; returns the number of body bytes sent
    pub fn write_to<W: Write>(response: Response, writer: &mut W) -> io::Result<u64> {
        let mut head = Vec::with_capacity(256);
        response.serialize_head(&mut head)?;
        writer.write_all(&head)?;

        let sent = match response.body {
            Body::Empty => 0,
            Body::Bytes(bytes) => {
                writer.write_all(&bytes)?;
                bytes.len() as u64
            }
            Body::Stream { reader, length } => {
                let copied = io::copy(&mut reader.take(length), writer)?;
                if copied != length {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("body ended after {} of {} bytes", copied, length),
                    ));
                }
                copied
            }
        };

        writer.flush()?;
        Ok(sent)
    }
}
