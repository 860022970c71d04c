//! Testing utilities for the Dashflow workspace
//!
//! Shared fixtures plus tiny in-process HTTP and WebSocket servers so fetch
//! paths can be exercised without external network access.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use dashflow_types::{
    DataItem, DataRequirement, DataSourceConfig, DataSourceDefinition, FetchSpec, MergeStrategy,
    ProcessingConfig, SourceRequirement, SourceType, TriggerConfig, UserSourceInput,
};
use futures::SinkExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Requirement with one required object source `sensor` exposing `temperature`
pub fn temperature_requirement(component: &str) -> DataRequirement {
    DataRequirement::new(
        component,
        vec![SourceRequirement::new("sensor", "Sensor").with_fields(["temperature"])],
    )
}

/// Requirement with required `temp` (static) and `humidity` (http) sources, both defaulting to 0
pub fn climate_requirement(component: &str) -> DataRequirement {
    DataRequirement::new(
        component,
        vec![
            SourceRequirement::new("temp", "Temperature").with_default(json!(0)),
            SourceRequirement::new("humidity", "Humidity").with_default(json!(0)),
        ],
    )
}

/// Static user input
pub fn static_input(source: &str, value: Value) -> UserSourceInput {
    UserSourceInput::new(source, SourceType::Static, json!({ "value": value }))
}

/// HTTP user input
pub fn http_input(source: &str, url: &str) -> UserSourceInput {
    UserSourceInput::new(source, SourceType::Http, json!({ "url": url }))
}

/// Single static item with a filter path
pub fn static_item(id: &str, value: Value, filter_path: Option<&str>) -> DataItem {
    let mut processing = ProcessingConfig::default();
    processing.filter_path = filter_path.map(str::to_string);
    DataItem::new(id, FetchSpec::Static { value }).with_processing(processing)
}

/// Static definition over the given items
pub fn static_definition(id: &str, items: Vec<DataItem>, merge_strategy: MergeStrategy) -> DataSourceDefinition {
    DataSourceDefinition {
        id: id.into(),
        source_type: SourceType::Static,
        source_config: Value::Null,
        items,
        merge_strategy,
        field_mapping: Default::default(),
    }
}

/// Manual-trigger config over the given definitions
pub fn manual_config(component: &str, data_sources: Vec<DataSourceDefinition>) -> DataSourceConfig {
    DataSourceConfig {
        id: format!("dsc-{component}"),
        widget_id: component.into(),
        data_sources,
        triggers: vec![TriggerConfig::Manual],
        enabled: true,
    }
}

/// One request seen by [`TestHttpServer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Minimal HTTP/1.1 server answering every request with a fixed response
#[derive(Debug)]
pub struct TestHttpServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl TestHttpServer {
    /// Serve `body` with status 200
    pub async fn json(body: Value) -> Self {
        Self::respond(200, body.to_string()).await
    }

    /// Serve `body` with the given status
    pub async fn respond(status: u16, body: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                let body = body.clone();
                tokio::spawn(async move {
                    if let Some(request) = serve_one(stream, status, &body).await {
                        recorded.lock().push(request);
                    }
                });
            }
        });
        Self {
            url,
            requests,
            handle,
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(mut stream: TcpStream, status: u16, body: &str) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let request_body = String::from_utf8_lossy(&buffer[header_end..]).into_owned();

    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        if status < 400 { "OK" } else { "ERROR" },
        body.len()
    );
    stream.write_all(response.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()?;

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: request_body,
    })
}

/// WebSocket server sending `frames` to every client, then closing
#[derive(Debug)]
pub struct TestSocketServer {
    pub url: String,
    handle: JoinHandle<()>,
}

impl TestSocketServer {
    pub async fn frames(frames: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind socket server");
        let url = format!("ws://{}", listener.local_addr().expect("local addr"));
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let frames = frames.clone();
                tokio::spawn(async move {
                    let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    for frame in frames {
                        if socket.send(Message::Text(frame.into())).await.is_err() {
                            return;
                        }
                    }
                    let _ = socket.close(None).await;
                });
            }
        });
        Self { url, handle }
    }
}

impl Drop for TestSocketServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
