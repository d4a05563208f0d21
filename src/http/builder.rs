//! Request context assembly.
//!
//! Pure function of the raw request and its resolution: the scheme comes
//! from the matched prefix, the query stays raw, and the connection facts
//! come from the endpoints the transport reported.

use uuid::Uuid;

use crate::http::request::{ConnectionInfo, RawRequest, RequestContext};
use crate::routing::Resolution;

/// Build the context handed to the application.
pub fn build_context(raw: RawRequest, resolution: Resolution, request_id: Uuid) -> RequestContext {
    let query_string = raw.raw_query().to_string();
    let connection = ConnectionInfo::new(raw.local_addr, raw.remote_addr);
    let Resolution {
        prefix,
        path_base,
        path,
    } = resolution;

    RequestContext {
        request_id,
        method: raw.method,
        scheme: prefix.scheme(),
        path_base,
        path,
        query_string,
        version: raw.version,
        headers: raw.headers,
        body: raw.body,
        connection,
        prefix,
    }
}
