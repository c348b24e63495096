//! The route table and the blocking HTTP serve loop behind the `route` and
//! `listen` builtins.
//!
//! Dispatch is serialized on the single VM (handlers are not re-entrant):
//! each request is fully handled — middleware chain, then the matched
//! handler — before the next connection is read. A handler's runtime error
//! is fatal and unwinds like any other; transport-level problems only end
//! the one connection.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};

use ahash::AHashMap;

use crate::{
    error::RuntimeError,
    value::{map_from_pairs, map_lookup_str, str_value, ValueRef},
};

use super::{ops, Vm};

/// `(method, path) → handler` as registered by the `route` builtin.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: AHashMap<(String, String), ValueRef>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: String, path: String, handler: ValueRef) {
        self.routes.insert((method, path), handler);
    }

    #[must_use]
    pub fn get(&self, method: &str, path: &str) -> Option<ValueRef> {
        self.routes.get(&(method.to_owned(), path.to_owned())).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A parsed inbound request.
struct Request {
    method: String,
    path: String,
    query: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Vm<'_> {
    /// The blocking serve loop behind `listen(port)`.
    pub(super) fn serve(&mut self, port: u16) -> Result<(), RuntimeError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| RuntimeError::new(format!("listen: cannot bind port {port}: {e}")))?;
        tracing::info!(port, routes = self.routes.len(), "http server listening");

        let mut remaining = self.serve_limit;
        for stream in listener.incoming() {
            if remaining == Some(0) {
                break;
            }
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            self.handle_connection(stream)?;
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
                if *n == 0 {
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_connection(&mut self, stream: TcpStream) -> Result<(), RuntimeError> {
        let mut reader = BufReader::new(match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                tracing::warn!(error = %e, "connection setup failed");
                return Ok(());
            }
        });
        let Some(request) = read_request(&mut reader) else {
            write_response(&stream, 400, "text/plain; charset=utf-8", "bad request");
            return Ok(());
        };
        tracing::debug!(method = %request.method, path = %request.path, "request");

        let request_map = build_request_map(&request);

        // Middleware runs in registration order; a Map result with a
        // `status` short-circuits the response.
        let chain = self.middleware.clone();
        for mw in chain {
            let result = self.call_function_value(mw, vec![request_map.clone()])?;
            if map_lookup_str(&result, "status").is_some() {
                let (status, content_type, body) = ops::response_parts(&result);
                write_response(&stream, status, &content_type, &body);
                return Ok(());
            }
        }

        match self.routes.get(&request.method, &request.path) {
            Some(handler) => {
                let result = self.call_function_value(handler, vec![request_map])?;
                let (status, content_type, body) = ops::response_parts(&result);
                write_response(&stream, status, &content_type, &body);
            }
            None => {
                write_response(&stream, 404, "text/plain; charset=utf-8", "not found");
            }
        }
        Ok(())
    }
}

/// Builds the request Map handed to middleware and handlers.
fn build_request_map(request: &Request) -> ValueRef {
    let headers = map_from_pairs(
        request
            .headers
            .iter()
            .map(|(name, value)| (str_value(name.clone()), str_value(value.clone()))),
    );
    map_from_pairs([
        (str_value("method"), str_value(request.method.clone())),
        (str_value("path"), str_value(request.path.clone())),
        (str_value("query"), str_value(request.query.clone())),
        (str_value("body"), str_value(request.body.clone())),
        (str_value("headers"), headers),
    ])
}

/// Parses one HTTP/1.1 request. Returns None on malformed input.
fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Request> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_ascii_uppercase();
    let target = parts.next()?;
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), query.to_owned()),
        None => (target.to_owned(), String::new()),
    };

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_owned();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }
    Some(Request {
        method,
        path,
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_response(mut stream: &TcpStream, status: i64, content_type: &str, body: &str) {
    let reason = reason_phrase(status);
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        tracing::warn!(error = %e, "response write failed");
    }
    let _ = stream.flush();
}

fn reason_phrase(status: i64) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::int_value;

    #[test]
    fn test_route_table_lookup() {
        let mut table = RouteTable::new();
        assert!(table.is_empty());
        table.insert("GET".into(), "/users".into(), int_value(1));
        assert_eq!(table.len(), 1);
        assert!(table.get("GET", "/users").is_some());
        assert!(table.get("POST", "/users").is_none());
        assert!(table.get("GET", "/other").is_none());
    }
}
