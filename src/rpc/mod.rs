//! Transport-agnostic protocol dispatcher. One method registry serves three
//! bindings: header-framed stdio, raw TCP (one JSON request per line), and
//! HTTP POST. All bindings rewrite wire method names into the registry's
//! internal spelling before lookup.

mod handlers;
pub mod http;

use crate::tags::scan::ScanOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, error, info, warn};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, serde::Serialize)]
pub struct RpcResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, serde::Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

fn ok_response(id: Value, result: Value) -> RpcResponse {
    RpcResponse {
        id,
        result: Some(result),
        error: None,
    }
}

fn error_response(id: Value, code: i64, message: &str) -> RpcResponse {
    RpcResponse {
        id,
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
        }),
    }
}

/// Lifecycle phase of one protocol session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    ShutDown,
}

/// Per-connection state threaded through every handler; replaces the old
/// process-wide root-path singleton. Constructed at connection-accept time.
pub struct Session {
    pub root_path: Option<String>,
    pub phase: Phase,
    pub scan: ScanOptions,
}

impl Session {
    pub fn new(scan: ScanOptions) -> Self {
        Self {
            root_path: None,
            phase: Phase::Uninitialized,
            scan,
        }
    }
}

/// Rewrite a wire method name into the registry's internal spelling: the
/// hover request keeps its historical name, everything else is title-cased
/// on the first letter.
pub fn internal_method_name(method: &str) -> String {
    match method {
        "textDocument/hover" => "HoverRequest".to_string(),
        _ => capitalize(method),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

type Handler = fn(&mut Session, Value) -> Result<Value>;

enum MethodEntry {
    Handler(Handler),
    /// Known protocol method with no implementation behind it. Answered
    /// with an explicit not-supported result so clients can tell "no data"
    /// from "unimplemented".
    NotSupported,
}

/// Protocol methods accepted but intentionally unimplemented, by internal
/// name.
const STUB_METHODS: &[&str] = &[
    "TextDocument/completion",
    "CompletionItem/resolve",
    "TextDocument/signatureHelp",
    "TextDocument/documentHighlight",
    "Workspace/symbol",
    "TextDocument/codeAction",
    "TextDocument/codeLens",
    "CodeLens/resolve",
    "TextDocument/formatting",
    "TextDocument/onTypeFormatting",
    "TextDocument/rename",
];

/// Explicit method table keyed by internal method name.
pub struct Registry {
    methods: HashMap<&'static str, MethodEntry>,
}

impl Registry {
    pub fn new() -> Self {
        let mut methods: HashMap<&'static str, MethodEntry> = HashMap::new();
        methods.insert("Initialize", MethodEntry::Handler(handlers::handle_initialize));
        methods.insert("Shutdown", MethodEntry::Handler(handlers::handle_shutdown));
        methods.insert("HoverRequest", MethodEntry::Handler(handlers::handle_hover));
        methods.insert(
            "TextDocument/documentSymbol",
            MethodEntry::Handler(handlers::handle_document_symbol),
        );
        methods.insert(
            "TextDocument/definition",
            MethodEntry::Handler(handlers::handle_definition),
        );
        methods.insert(
            "TextDocument/references",
            MethodEntry::Handler(handlers::handle_references),
        );
        for name in STUB_METHODS.iter().copied() {
            methods.insert(name, MethodEntry::NotSupported);
        }
        Self { methods }
    }

    pub fn handle_request(&self, session: &mut Session, req: RpcRequest) -> RpcResponse {
        let RpcRequest { id, method, params } = req;
        let internal = internal_method_name(&method);
        debug!(%method, %internal, "dispatch");

        let Some(entry) = self.methods.get(internal.as_str()) else {
            warn!(%method, "unrecognized method");
            return error_response(id, METHOD_NOT_FOUND, &format!("method not found: {method}"));
        };

        match entry {
            MethodEntry::NotSupported => ok_response(
                id,
                serde_json::json!({ "supported": false, "method": method }),
            ),
            MethodEntry::Handler(handler) => {
                // A fault in one handler must not take the transport down.
                match catch_unwind(AssertUnwindSafe(|| handler(session, params))) {
                    Ok(Ok(value)) => ok_response(id, value),
                    Ok(Err(err)) => {
                        warn!(%method, error = %err, "request failed");
                        error_response(id, INTERNAL_ERROR, &err.to_string())
                    }
                    Err(_) => {
                        error!(%method, "panic recovered during dispatch");
                        error_response(id, INTERNAL_ERROR, "internal error: panic during dispatch")
                    }
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

enum Inbound {
    Eof,
    Malformed(String),
    Request(RpcRequest),
}

/// Read one framed request: header lines up to the blank terminator
/// (unknown headers are skipped; `Content-Length` is honored when present),
/// then the JSON body.
fn read_frame<R: BufRead>(reader: &mut R) -> Result<Inbound> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).context("read frame header")?;
        if n == 0 {
            return Ok(Inbound::Eof);
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        match header.split_once(':') {
            Some((name, value)) if name.eq_ignore_ascii_case("content-length") => {
                content_length = value.trim().parse().ok();
            }
            _ => debug!(%header, "skipping unrecognized frame header"),
        }
    }

    if let Some(length) = content_length {
        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).context("read frame body")?;
        return Ok(match serde_json::from_slice::<RpcRequest>(&body) {
            Ok(req) => Inbound::Request(req),
            Err(err) => Inbound::Malformed(format!("invalid request: {err}")),
        });
    }

    // No length header: decode exactly one JSON value off the stream.
    let mut de = serde_json::Deserializer::from_reader(reader.by_ref());
    match RpcRequest::deserialize(&mut de) {
        Ok(req) => Ok(Inbound::Request(req)),
        Err(err) if err.is_eof() => Ok(Inbound::Eof),
        Err(err) => Ok(Inbound::Malformed(format!("invalid request: {err}"))),
    }
}

fn write_frame<W: Write>(writer: &mut W, response: &RpcResponse) -> Result<()> {
    let body = serde_json::to_string(response)?;
    write!(
        writer,
        "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf8\r\n\r\n{}",
        body.len(),
        body
    )?;
    writer.flush()?;
    Ok(())
}

/// Serve framed requests over stdin/stdout, one request fully handled
/// before the next frame is read.
pub fn serve_stdio(scan: ScanOptions) -> Result<()> {
    let registry = Registry::new();
    let mut session = Session::new(scan);
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    info!("reading framed requests on stdin, writing on stdout");
    loop {
        let response = match read_frame(&mut reader)? {
            Inbound::Eof => break,
            Inbound::Malformed(message) => error_response(Value::Null, PARSE_ERROR, &message),
            Inbound::Request(req) => registry.handle_request(&mut session, req),
        };
        write_frame(&mut writer, &response)?;
    }
    Ok(())
}

/// Serve unframed requests over TCP: one JSON request per line in, one JSON
/// response per line out, one thread and one session per connection.
pub fn serve_tcp(addr: &str, scan: ScanOptions) -> Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                std::thread::spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    if let Err(err) = serve_connection(stream, scan) {
                        warn!(%peer, error = %err, "connection closed with error");
                    }
                });
            }
            Err(err) => warn!(error = %err, "failed to accept connection"),
        }
    }
    Ok(())
}

fn serve_connection(stream: TcpStream, scan: ScanOptions) -> Result<()> {
    let registry = Registry::new();
    let mut session = Session::new(scan);
    let reader = BufReader::new(stream.try_clone().context("clone connection")?);
    let mut writer = BufWriter::new(stream);

    for line in reader.lines() {
        let line = line.context("read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(req) => registry.handle_request(&mut session, req),
            Err(err) => {
                error_response(Value::Null, PARSE_ERROR, &format!("invalid request: {err}"))
            }
        };
        writeln!(writer, "{}", serde_json::to_string(&response)?)?;
        writer.flush()?;
    }
    Ok(())
}

/// Run a single request through the registry and return the serialized
/// response. Used by the one-shot CLI subcommand.
pub fn call(method: String, params_raw: &str, id_raw: &str, scan: ScanOptions) -> Result<String> {
    let params: Value = serde_json::from_str(params_raw).context("parse params JSON")?;
    let id = parse_value(id_raw);
    let registry = Registry::new();
    let mut session = Session::new(scan);
    let response = registry.handle_request(&mut session, RpcRequest { id, method, params });
    Ok(serde_json::to_string(&response)?)
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            id: json!(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_internal_method_name_rewrite() {
        assert_eq!(internal_method_name("initialize"), "Initialize");
        assert_eq!(internal_method_name("shutdown"), "Shutdown");
        assert_eq!(internal_method_name("textDocument/hover"), "HoverRequest");
        assert_eq!(
            internal_method_name("textDocument/documentSymbol"),
            "TextDocument/documentSymbol"
        );
        assert_eq!(internal_method_name(""), "");
    }

    #[test]
    fn test_initialize_reports_capabilities() {
        let registry = Registry::new();
        let mut session = Session::new(ScanOptions::default());
        let response = registry.handle_request(
            &mut session,
            request("initialize", json!({"rootPath": "/srv/repo"})),
        );
        assert!(response.error.is_none());
        let caps = &response.result.unwrap()["capabilities"];
        assert_eq!(caps["hoverProvider"], true);
        assert_eq!(caps["documentSymbolProvider"], true);
        assert_eq!(caps["definitionProvider"], true);
        assert_eq!(caps["referencesProvider"], true);
        assert_eq!(session.root_path.as_deref(), Some("/srv/repo"));
        assert_eq!(session.phase, Phase::Initialized);
    }

    #[test]
    fn test_shutdown_idempotent() {
        let registry = Registry::new();
        let mut session = Session::new(ScanOptions::default());
        for _ in 0..2 {
            let response = registry.handle_request(&mut session, request("shutdown", Value::Null));
            assert_eq!(response.result, Some(json!(true)));
        }
        assert_eq!(session.phase, Phase::ShutDown);
    }

    #[test]
    fn test_unknown_method_yields_method_not_found() {
        let registry = Registry::new();
        let mut session = Session::new(ScanOptions::default());
        let response =
            registry.handle_request(&mut session, request("textDocument/teleport", Value::Null));
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert!(error.message.contains("textDocument/teleport"));
    }

    #[test]
    fn test_stub_method_reports_not_supported() {
        let registry = Registry::new();
        let mut session = Session::new(ScanOptions::default());
        let response =
            registry.handle_request(&mut session, request("textDocument/rename", json!({})));
        let result = response.result.unwrap();
        assert_eq!(result["supported"], false);
        assert_eq!(result["method"], "textDocument/rename");
    }

    #[test]
    fn test_hover_returns_fixed_content() {
        let registry = Registry::new();
        let mut session = Session::new(ScanOptions::default());
        let response = registry.handle_request(
            &mut session,
            request(
                "textDocument/hover",
                json!({"textDocument": {"uri": "file:///a.go"}, "position": {"line": 0, "character": 0}}),
            ),
        );
        let result = response.result.unwrap();
        assert_eq!(result["contents"][0]["language"], "markdown");
    }

    #[test]
    fn test_handler_error_keeps_id_and_code() {
        let registry = Registry::new();
        let mut session = Session::new(ScanOptions::default());
        // Malformed params: missing textDocument.
        let response = registry.handle_request(
            &mut session,
            request("textDocument/documentSymbol", json!({"bogus": true})),
        );
        assert_eq!(response.id, json!(1));
        assert_eq!(response.error.unwrap().code, INTERNAL_ERROR);
    }

    #[test]
    fn test_read_frame_skips_unknown_headers() {
        let body = r#"{"id":1,"method":"shutdown","params":null}"#;
        let frame = format!(
            "X-Custom: yes\r\nContent-Length: {}\r\nAnother: header\r\n\r\n{}",
            body.len(),
            body
        );
        let mut reader = Cursor::new(frame.into_bytes());
        match read_frame(&mut reader).unwrap() {
            Inbound::Request(req) => assert_eq!(req.method, "shutdown"),
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn test_read_frame_without_content_length() {
        let frame = "Some-Header: x\r\n\r\n{\"id\":2,\"method\":\"initialize\",\"params\":{}}";
        let mut reader = Cursor::new(frame.as_bytes().to_vec());
        match read_frame(&mut reader).unwrap() {
            Inbound::Request(req) => {
                assert_eq!(req.method, "initialize");
                assert_eq!(req.id, json!(2));
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn test_read_frame_eof() {
        let mut reader = Cursor::new(Vec::new());
        assert!(matches!(read_frame(&mut reader).unwrap(), Inbound::Eof));
    }

    #[test]
    fn test_read_frame_malformed_body() {
        let frame = "Content-Length: 9\r\n\r\nnot json!";
        let mut reader = Cursor::new(frame.as_bytes().to_vec());
        assert!(matches!(
            read_frame(&mut reader).unwrap(),
            Inbound::Malformed(_)
        ));
    }

    #[test]
    fn test_write_frame_content_length_matches_body() {
        let response = ok_response(json!(1), json!(true));
        let mut out = Vec::new();
        write_frame(&mut out, &response).unwrap();
        let text = String::from_utf8(out).unwrap();
        let (headers, body) = text.split_once("\r\n\r\n").unwrap();
        let length: usize = headers
            .lines()
            .find_map(|h| h.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(length, body.len());
        assert!(headers.contains("Content-Type: application/vscode-jsonrpc"));
    }

    #[test]
    fn test_call_one_shot() {
        let raw = call(
            "shutdown".to_string(),
            "{}",
            "7",
            ScanOptions::default(),
        )
        .unwrap();
        let response: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"], true);
    }

    #[test]
    fn test_parse_value_falls_back_to_string() {
        assert_eq!(parse_value("7"), json!(7));
        assert_eq!(parse_value("abc"), json!("abc"));
    }
}
