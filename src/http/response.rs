//! Response buffering and completion.
//!
//! # Responsibilities
//! - Collect the status, headers and body an application writes
//! - Produce the message handed to the transport's `write_response`
//! - Synthesize the faulted form of a partially written response
//!
//! # Design Decisions
//! - Responses are buffered; nothing reaches the wire until dispatch ends,
//!   so a fault can still change the status
//! - A faulted response keeps the bytes already written and is marked 500

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Response, StatusCode};

/// The response side of an in-flight request.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Append bytes to the body.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        self.body.extend_from_slice(bytes.as_ref());
    }

    /// True once any body bytes were written.
    pub fn has_started(&self) -> bool {
        !self.body.is_empty()
    }

    /// Complete the response as written.
    pub fn finish(self) -> ResponseMessage {
        ResponseMessage {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(self.body),
        }
    }

    /// Complete the response after an application fault.
    pub fn into_faulted(mut self) -> ResponseMessage {
        self.headers.remove(header::CONTENT_LENGTH);
        ResponseMessage {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: self.headers,
            body: Bytes::from(self.body),
        }
    }
}

/// A complete response, ready for the transport.
#[derive(Debug, Clone)]
pub struct ResponseMessage {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseMessage {
    /// A bodiless response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl From<ResponseMessage> for Response<Body> {
    fn from(message: ResponseMessage) -> Self {
        let mut response = Response::new(Body::from(message.body));
        *response.status_mut() = message.status;
        *response.headers_mut() = message.headers;
        response
    }
}
