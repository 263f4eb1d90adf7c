//! HTTP binding tests: the JSON-RPC envelope posted to `/` must be rewritten
//! and dispatched through the same registry as the other transports.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::OnceLock;
use tagsrv::rpc::http::router;
use tagsrv::tags::scan::ScanOptions;
use tower::ServiceExt;

static FAKE_TOOL: OnceLock<PathBuf> = OnceLock::new();

fn setup_fake_tool() {
    FAKE_TOOL.get_or_init(|| {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("tagsrv-http-{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("fake-ctags");
        std::fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "out=\"\"\n",
                "prev=\"\"\n",
                "for a in \"$@\"; do\n",
                "  if [ \"$prev\" = \"-f\" ]; then out=\"$a\"; fi\n",
                "  prev=\"$a\"\n",
                "done\n",
                "printf 'doWork\\tsrc/app.go\\t/^func doWork(x, y int) {$/;\"\\tkind:function\\tlanguage:Go\\tline:5\\tsignature:(x, y int)\\n' > \"$out\"\n",
            ),
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        unsafe {
            std::env::set_var("TAGSRV_CTAGS_BIN", &script);
        }
        assert_eq!(
            tagsrv::config::Config::get().ctags_bin,
            script.to_string_lossy().as_ref()
        );
        script
    });
}

async fn post(body: &str) -> (StatusCode, Value) {
    let app = router(ScanOptions::default());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_document_symbol_method_rewritten_and_dispatched() {
    setup_fake_tool();
    let (status, value) = post(
        r#"{"id":9,"method":"textDocument/documentSymbol","params":{"textDocument":{"uri":"file:///srv/app/src/app.go"}}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["id"], 9);
    assert!(value["error"].is_null(), "response was: {value}");
    assert_eq!(value["result"][0]["name"], "doWork");
    assert_eq!(value["result"][0]["location"]["range"]["start"]["line"], 4);
}

#[tokio::test]
async fn test_initialize_over_http() {
    setup_fake_tool();
    let (status, value) =
        post(r#"{"id":1,"method":"initialize","params":{"rootPath":"/srv/repo"}}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["result"]["capabilities"]["hoverProvider"], true);
}

#[tokio::test]
async fn test_malformed_body_yields_parse_error_envelope() {
    setup_fake_tool();
    let (status, value) = post("this is not json").await;
    // Protocol errors ride in the envelope, not the HTTP status.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["error"]["code"], -32700);
}

#[tokio::test]
async fn test_unknown_method_over_http() {
    setup_fake_tool();
    let (status, value) = post(r#"{"id":3,"method":"workspace/executeCommand","params":{}}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["error"]["code"], -32601);
}
