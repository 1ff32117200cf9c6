//! Live-socket scenarios for the SSE transport pair: endpoint handshake,
//! asynchronous response delivery, session lifecycle, authentication,
//! and handshake timeout.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use url::Url;

use conduit_mcp::protocol::{CallToolResult, Content, Tool};
use conduit_mcp::server::schema::ObjectSchema;
use conduit_mcp::server::{FnToolHandler, McpServer, McpServerBuilder, ToolHandler};
use conduit_mcp::transport::sse::{
    SseClientConfig, SseClientTransportBuilder, SseParser, SseServer, SseServerConfig,
    StaticApiKeyValidator,
};
use conduit_mcp::{McpClientBuilder, TransportError};

fn add_handler() -> Arc<dyn ToolHandler> {
    Arc::new(FnToolHandler::new(|args: Value| async move {
        let sum = args["a"].as_f64().unwrap_or_default() + args["b"].as_f64().unwrap_or_default();
        Ok(CallToolResult::success(vec![Content::text(format!(
            "{sum}"
        ))]))
    }))
}

fn build_server() -> McpServer {
    McpServerBuilder::new()
        .server_info("sse-test-server", "0.1.0")
        .register_tool(
            Tool::new(
                "add",
                "Add two numbers",
                ObjectSchema::new()
                    .number("a", "First addend")
                    .number("b", "Second addend")
                    .build(),
            ),
            add_handler(),
        )
        .unwrap()
        .build()
}

fn test_config() -> SseServerConfig {
    SseServerConfig {
        port: 0,
        health_path: Some("/health".to_string()),
        ..SseServerConfig::default()
    }
}

async fn serve(server: &McpServer, config: SseServerConfig) -> (SseServer, Url) {
    let sse = server.serve_sse(config).await.unwrap();
    let addr = sse.local_addr().unwrap();
    let url = Url::parse(&format!("http://{addr}/sse")).unwrap();
    (sse, url)
}

#[tokio::test]
async fn handshake_then_add_over_sse() {
    let server = build_server();
    let (mut sse, url) = serve(&server, test_config()).await;

    let mut builder = McpClientBuilder::new().client_info("sse-test-client", "0.1.0");
    let transport = SseClientTransportBuilder::new()
        .with_config(SseClientConfig::new(url))
        .with_message_handler(builder.message_handler())
        .build()
        .unwrap();

    let client = builder.build(transport).await.unwrap();
    let init = client.initialize().await.unwrap();
    assert_eq!(init.server_info.name, "sse-test-server");

    let result = client
        .call_tool("add", Some(json!({"a": 5, "b": 3})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert!(result.content[0].as_text().unwrap().contains('8'));

    client.close().await.unwrap();
    sse.shutdown().await.unwrap();
}

/// Read SSE events from a raw reqwest byte stream until `count` events
/// arrived or the stream ended.
async fn collect_events(
    response: reqwest::Response,
    count: usize,
) -> Vec<conduit_mcp::transport::sse::SseWireEvent> {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut events = Vec::new();

    while events.len() < count {
        match stream.next().await {
            Some(Ok(bytes)) => events.extend(parser.feed(&bytes)),
            _ => break,
        }
    }
    events
}

#[tokio::test]
async fn first_event_on_the_stream_is_the_endpoint() {
    let server = build_server();
    let (mut sse, url) = serve(&server, test_config()).await;

    let response = reqwest::Client::new()
        .get(url.clone())
        .header("accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let events = collect_events(response, 1).await;
    assert_eq!(events[0].event_type(), "endpoint");
    assert!(events[0].data.starts_with("/messages?sessionId="));

    sse.shutdown().await.unwrap();
}

#[tokio::test]
async fn post_to_unknown_session_is_404_without_state() {
    let server = build_server();
    let (mut sse, url) = serve(&server, test_config()).await;
    let addr = sse.local_addr().unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/messages?sessionId=not-a-session"))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    // Missing sessionId entirely is a bad request.
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/messages"))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    drop(url);
    sse.shutdown().await.unwrap();
}

#[tokio::test]
async fn idle_session_times_out_and_forgets_the_id() {
    let server = build_server();
    let config = SseServerConfig {
        port: 0,
        session_idle_timeout: Duration::from_millis(200),
        sweep_interval: Duration::from_millis(50),
        ..SseServerConfig::default()
    };
    let (mut sse, url) = serve(&server, config).await;
    let addr = sse.local_addr().unwrap();

    // Open a stream and learn the session id from the endpoint event.
    let response = reqwest::Client::new()
        .get(url)
        .header("accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::new();
    let mut endpoint_data = None;
    while endpoint_data.is_none() {
        match stream.next().await {
            Some(Ok(bytes)) => {
                for event in parser.feed(&bytes) {
                    if event.event_type() == "endpoint" {
                        endpoint_data = Some(event.data);
                    }
                }
            }
            _ => panic!("stream ended before the endpoint event"),
        }
    }
    let endpoint_data = endpoint_data.unwrap();

    // Idle past the cutoff; the sweeper closes the session and the
    // stream ends.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let post = reqwest::Client::new()
        .post(format!("http://{addr}{endpoint_data}"))
        .header("content-type", "application/json")
        .body(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), reqwest::StatusCode::NOT_FOUND);

    sse.shutdown().await.unwrap();
}

#[tokio::test]
async fn api_key_is_required_on_both_endpoints() {
    let server = build_server();
    let validator = Arc::new(StaticApiKeyValidator::new(["sekrit"]));
    let mut sse = server
        .serve_sse_with_validator(test_config(), Some(validator))
        .await
        .unwrap();
    let addr = sse.local_addr().unwrap();
    let url = Url::parse(&format!("http://{addr}/sse")).unwrap();

    // Stream without a key: 401.
    let response = reqwest::Client::new().get(url.clone()).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    // POST without a key: 401 before any session lookup.
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/messages?sessionId=whatever"))
        .body(r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    // With the key the whole handshake works.
    let mut builder = McpClientBuilder::new();
    let transport = SseClientTransportBuilder::new()
        .with_config(SseClientConfig::new(url).with_api_key("sekrit"))
        .with_message_handler(builder.message_handler())
        .build()
        .unwrap();
    let client = builder.build(transport).await.unwrap();
    client.initialize().await.unwrap();

    client.close().await.unwrap();
    sse.shutdown().await.unwrap();
}

#[tokio::test]
async fn wrong_api_key_fails_the_connect() {
    let server = build_server();
    let validator = Arc::new(StaticApiKeyValidator::new(["sekrit"]));
    let mut sse = server
        .serve_sse_with_validator(test_config(), Some(validator))
        .await
        .unwrap();
    let addr = sse.local_addr().unwrap();
    let url = Url::parse(&format!("http://{addr}/sse")).unwrap();

    let mut builder = McpClientBuilder::new();
    let transport = SseClientTransportBuilder::new()
        .with_config(SseClientConfig::new(url).with_api_key("wrong"))
        .with_message_handler(builder.message_handler())
        .build()
        .unwrap();

    let result = builder.build(transport).await;
    assert!(matches!(
        result.unwrap_err(),
        conduit_mcp::McpError::Transport(TransportError::Auth { .. })
    ));

    sse.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_endpoint_event_times_out_the_handshake() {
    use axum::response::sse::{Event, Sse};
    use axum::routing::get;
    use axum::Router;

    // A stream that opens fine but never emits the endpoint event.
    async fn silent_stream(
    ) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
        Sse::new(futures::stream::pending())
    }

    let router = Router::new().route("/sse", get(silent_stream));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_task = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let config = SseClientConfig::new(Url::parse(&format!("http://{addr}/sse")).unwrap())
        .with_handshake_timeout(Duration::from_millis(300));

    let mut builder = McpClientBuilder::new();
    let transport = SseClientTransportBuilder::new()
        .with_config(config)
        .with_message_handler(builder.message_handler())
        .build()
        .unwrap();

    let result = builder.build(transport).await;
    assert!(matches!(
        result.unwrap_err(),
        conduit_mcp::McpError::Transport(TransportError::Timeout { .. })
    ));

    serve_task.abort();
}

#[tokio::test]
async fn health_endpoint_reports_session_count() {
    let server = build_server();
    let (mut sse, url) = serve(&server, test_config()).await;
    let addr = sse.local_addr().unwrap();

    let health: Value = reqwest::Client::new()
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["transport"], "sse");
    assert_eq!(health["sessions"], json!(0));

    drop(url);
    sse.shutdown().await.unwrap();
}
