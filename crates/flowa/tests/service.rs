//! The `service` statement end-to-end: routes, middleware, and the blocking
//! serve loop.
//!
//! The VM is single-threaded and its values are not Send, so each test runs
//! the whole program inside one spawned thread (bounded by a serve limit)
//! and talks to it over a plain TCP client from the test thread.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use flowa::Runner;

/// Sends one HTTP/1.1 request and returns the raw response text.
fn request(port: u16, method: &str, path: &str, body: &str) -> String {
    // The server needs a moment to bind.
    let mut last_err = None;
    for _ in 0..50 {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(mut stream) => {
                let message = format!(
                    "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(message.as_bytes()).unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).unwrap();
                return response;
            }
            Err(e) => {
                last_err = Some(e);
                thread::sleep(Duration::from_millis(20));
            }
        }
    }
    panic!("could not connect to test server: {last_err:?}");
}

fn serve_in_thread(source: &'static str, requests: usize) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut runner = Runner::from_source(source, ".").expect("compile failed");
        runner.set_serve_limit(Some(requests));
        runner.run_capture().expect("server run failed")
    })
}

#[test]
fn test_service_routes_requests_to_handlers() {
    let source = "func hello(req) {\n    return \"hello \" + req[\"path\"]\n}\nservice Api on \":47311\":\n    get \"/greet\" -> hello\n";
    let server = serve_in_thread(source, 2);

    let ok = request(47311, "GET", "/greet", "");
    assert!(ok.starts_with("HTTP/1.1 200 OK"), "response: {ok}");
    assert!(ok.ends_with("hello /greet"), "response: {ok}");

    let missing = request(47311, "GET", "/nope", "");
    assert!(missing.starts_with("HTTP/1.1 404"), "response: {missing}");

    server.join().unwrap();
}

#[test]
fn test_response_module_sets_status_and_content_type() {
    let source = "func data(req) {\n    return response.json({\"ok\": True})\n}\nservice Api on \":47312\":\n    get \"/data\" -> data\n";
    let server = serve_in_thread(source, 1);

    let resp = request(47312, "GET", "/data", "");
    assert!(resp.starts_with("HTTP/1.1 200 OK"), "response: {resp}");
    assert!(resp.contains("Content-Type: application/json"), "response: {resp}");
    assert!(resp.ends_with("{\"ok\":true}"), "response: {resp}");

    server.join().unwrap();
}

#[test]
fn test_middleware_short_circuits() {
    let source = "func guard(req) {\n    return response.status(401, \"denied\")\n}\nfunc open(req) {\n    return \"never reached\"\n}\nservice Api on \":47313\":\n    use guard\n    get \"/secret\" -> open\n";
    let server = serve_in_thread(source, 1);

    let resp = request(47313, "GET", "/secret", "");
    assert!(resp.starts_with("HTTP/1.1 401"), "response: {resp}");
    assert!(resp.ends_with("denied"), "response: {resp}");

    server.join().unwrap();
}

#[test]
fn test_handler_receives_request_map() {
    let source = "func echo(req) {\n    return req[\"method\"] + \" \" + req[\"query\"] + \" \" + req[\"body\"]\n}\nservice Api on \":47314\":\n    post \"/echo\" -> echo\n";
    let server = serve_in_thread(source, 1);

    let resp = request(47314, "POST", "/echo?a=1", "payload");
    assert!(resp.ends_with("POST a=1 payload"), "response: {resp}");

    server.join().unwrap();
}

#[test]
fn test_route_builtin_direct_call() {
    // `route` and `listen` are ordinary builtins at the language level; the
    // service statement is sugar over them.
    let source = "func pong(req) { return \"pong\" }\nroute(\"GET\", \"/ping\", pong)\nlisten(47315)";
    let server = serve_in_thread(source, 1);

    let resp = request(47315, "GET", "/ping", "");
    assert!(resp.ends_with("pong"), "response: {resp}");

    server.join().unwrap();
}
