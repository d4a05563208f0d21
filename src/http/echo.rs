//! Echo application.
//!
//! Answers every request with a JSON description of its context. The
//! binary serves it so the routing and decoding can be observed over real
//! HTTP.

use axum::http::{header, HeaderValue};
use serde::Serialize;
use uuid::Uuid;

use crate::http::dispatcher::{Application, BoxError, HttpContext};
use crate::http::request::ConnectionInfo;

/// Largest request body the echo application reads.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoApplication;

/// What the echo application reports back.
#[derive(Debug, Serialize)]
pub struct EchoReport {
    pub request_id: Uuid,
    pub method: String,
    pub scheme: String,
    pub path_base: String,
    pub path: String,
    pub query_string: String,
    pub protocol: String,
    pub prefix: String,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    pub connection: ConnectionInfo,
}

impl Application for EchoApplication {
    async fn handle(&self, ctx: &mut HttpContext) -> Result<(), BoxError> {
        let body = ctx.request.body_mut().read_to_end(MAX_BODY_BYTES).await?;

        let request = &ctx.request;
        let report = EchoReport {
            request_id: request.request_id(),
            method: request.method().to_string(),
            scheme: request.scheme().to_string(),
            path_base: request.path_base().to_string(),
            path: request.path().to_string(),
            query_string: request.query_string().to_string(),
            protocol: request.protocol().to_string(),
            prefix: request.prefix().to_string(),
            headers: request
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            body_len: body.len(),
            connection: *request.connection(),
        };

        let json = serde_json::to_vec(&report)?;
        ctx.response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        ctx.response.write(json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::builder::build_context;
    use crate::http::request::RawRequest;
    use crate::routing::{PrefixTable, RequestTarget, UrlPrefix};
    use axum::http::Method;

    #[tokio::test]
    async fn reports_context_as_json() {
        let table = PrefixTable::new();
        table.add(UrlPrefix::parse("http://+:8080/api/").unwrap());
        let raw = RawRequest::new(
            Method::POST,
            "/api/items%20list?page=2",
            "127.0.0.1:8080".parse().unwrap(),
            "127.0.0.1:41000".parse().unwrap(),
        )
        .with_body("abc");
        let host = raw.host();
        let resolution = table
            .resolve(&RequestTarget {
                scheme: raw.scheme(),
                host: &host,
                port: 8080,
                raw_path: raw.raw_path(),
            })
            .unwrap();
        let mut ctx = HttpContext::new(build_context(raw, resolution, Uuid::nil()));

        EchoApplication.handle(&mut ctx).await.unwrap();

        let message = ctx.response.finish();
        assert_eq!(message.headers[header::CONTENT_TYPE], "application/json");
        let report: serde_json::Value = serde_json::from_slice(&message.body).unwrap();
        assert_eq!(report["method"], "POST");
        assert_eq!(report["scheme"], "http");
        assert_eq!(report["path_base"], "/api");
        assert_eq!(report["path"], "/items list");
        assert_eq!(report["query_string"], "?page=2");
        assert_eq!(report["protocol"], "HTTP/1.1");
        assert_eq!(report["body_len"], 3);
        assert_eq!(report["connection"]["is_local"], true);
    }
}
