//! HTTP request handlers.
//!
//! Everything is served from the hub's latest snapshot; nothing touches
//! the disk.

use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::hub::Hub;
use crate::embed::{INDEX_HTML, IndexVars};

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";
const MARKDOWN: &str = "text/markdown; charset=utf-8";
const PLAIN: &str = "text/plain; charset=utf-8";

/// A routed response body.
#[derive(Debug, PartialEq)]
pub(super) struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: PLAIN,
            body: b"404 Not Found".to_vec(),
        }
    }
}

/// Handle a single HTTP request
pub(super) fn handle_request(request: Request, hub: &Hub, ws_port: u16) -> Result<()> {
    if crate::core::is_shutdown() {
        return send(request, Reply {
            status: 503,
            content_type: PLAIN,
            body: b"503 Service Unavailable".to_vec(),
        });
    }

    let reply = match request.method() {
        Method::Get | Method::Head => route(request.url(), hub, ws_port),
        _ => Reply::not_found(),
    };
    send(request, reply)
}

/// Map a URL to its reply.
pub(super) fn route<C: super::hub::Client>(url: &str, hub: &Hub<C>, ws_port: u16) -> Reply {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path {
        "/" | "/index.html" => Reply::ok(HTML, INDEX_HTML.render(&IndexVars { ws_port })),
        "/docs.json" => json(&hub.snapshot().docs),
        "/elm.json" => json(&hub.snapshot().manifest),
        "/README.md" => Reply::ok(MARKDOWN, hub.snapshot().readme.clone()),
        _ => Reply::not_found(),
    }
}

fn json<T: serde::Serialize>(value: &T) -> Reply {
    match serde_json::to_vec(value) {
        Ok(body) => Reply::ok(JSON, body),
        Err(e) => Reply {
            status: 500,
            content_type: PLAIN,
            body: e.to_string().into_bytes(),
        },
    }
}

fn send(request: Request, reply: Reply) -> Result<()> {
    let header = make_header("Content-Type", reply.content_type);
    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(reply.status)).with_header(header);
        request.respond(response)?;
        return Ok(());
    }

    let response = Response::from_data(reply.body)
        .with_status_code(StatusCode(reply.status))
        .with_header(header)
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::Docs;
    use crate::server::hub::tests::Recorder;
    use crate::server::message::{Snapshot, Update};
    use serde_json::{Value, json};

    fn hub() -> Hub<Recorder> {
        Hub::new(Snapshot {
            readme: "# Hello".into(),
            manifest: serde_json::from_value(
                json!({"type": "package", "name": "a/b", "exposed-modules": ["Main"]}),
            )
            .unwrap(),
            docs: Docs::Modules(vec![json!({"name": "Main"})]),
        })
    }

    #[test]
    fn test_index_has_ws_port() {
        let reply = route("/", &hub(), 40000);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, HTML);
        assert!(String::from_utf8(reply.body).unwrap().contains("40000"));
    }

    #[test]
    fn test_json_routes_follow_snapshot() {
        let hub = hub();
        let docs: Value = serde_json::from_slice(&route("/docs.json", &hub, 0).body).unwrap();
        assert_eq!(docs, json!([{"name": "Main"}]));

        hub.publish(&Update {
            docs: Some(Docs::Modules(vec![])),
            ..Default::default()
        });
        let docs: Value = serde_json::from_slice(&route("/docs.json?t=1", &hub, 0).body).unwrap();
        assert_eq!(docs, json!([]));

        let manifest: Value = serde_json::from_slice(&route("/elm.json", &hub, 0).body).unwrap();
        assert_eq!(manifest["name"], "a/b");
    }

    #[test]
    fn test_readme_and_unknown() {
        let hub = hub();
        assert_eq!(route("/README.md", &hub, 0).body, b"# Hello");
        assert_eq!(route("/src/Main.elm", &hub, 0).status, 404);
    }
}
