//! ==============================================================================
//! ingest.rs - realtime feed subscription and write-back
//! ==============================================================================
//!
//! purpose:
//!     adapter for the hosted realtime database. subscribing opens a
//!     long-lived event-stream request against the room entity and feeds
//!     each pushed field map into the dashboard session. control writes go
//!     back as fire-and-forget PUTs.
//!
//! protocol:
//!     GET {base_url}/{room}.json with Accept: text/event-stream.
//!     the server answers with SSE frames:
//!         event: put    | data: {"path":"/","data":{...full entity...}}
//!         event: patch  | data: {"path":"/","data":{...changed fields...}}
//!         event: put    | data: {"path":"/dust","data":42}   (child update)
//!         event: keep-alive / cancel / auth_revoked
//!     writes: PUT {base_url}/{room}/{field}.json with a JSON bool body.
//!
//! relationships:
//!     - used by: main.rs (opens the subscription, owns the handle)
//!     - used by: controls.rs (write_bool for the three toggles)
//!     - updates: session.rs (one write lock per push event)
//!
//! ==============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;

use crate::session::{clock_label, SharedSession};
use crate::telemetry::SnapshotPatch;

// ==============================================================================
// sse frame parser
// ==============================================================================
// the transport hands us arbitrary byte chunks; frames are reassembled
// incrementally. only `event:` and `data:` lines matter here, a blank line
// terminates a frame, and comment lines (leading ':') are ignored.

/// one reassembled server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

#[derive(Default)]
pub struct FrameParser {
    line_buf: String,
    event: String,
    data: String,
}

impl FrameParser {
    /// feed one chunk of stream text, returning every frame it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        let mut frames = Vec::new();
        for ch in chunk.chars() {
            if ch != '\n' {
                self.line_buf.push(ch);
                continue;
            }
            let owned = std::mem::take(&mut self.line_buf);
            let line = owned.strip_suffix('\r').unwrap_or(owned.as_str());

            if line.is_empty() {
                if !self.event.is_empty() || !self.data.is_empty() {
                    frames.push(Frame {
                        event: std::mem::take(&mut self.event),
                        data: std::mem::take(&mut self.data),
                    });
                }
            } else if let Some(rest) = line.strip_prefix("event:") {
                self.event = rest.trim_start().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                // multi-line data joins with newlines per the sse spec
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(rest.trim_start());
            }
            // anything else (comments, id:, retry:) is irrelevant to this feed
        }
        frames
    }
}

// ==============================================================================
// frame interpretation
// ==============================================================================

/// what a frame means to the dashboard.
#[derive(Debug, PartialEq)]
pub enum FeedEvent {
    /// a push carrying data for our entity
    Update(SnapshotPatch),
    /// nothing to do (keep-alive, empty payload, unknown field)
    Ignore,
    /// the server is terminating this subscription
    Closed(String),
}

pub fn interpret(frame: &Frame) -> FeedEvent {
    match frame.event.as_str() {
        "put" | "patch" => {
            let parsed: serde_json::Value = match serde_json::from_str(&frame.data) {
                Ok(v) => v,
                Err(e) => {
                    warn!("[FEED] undecodable {} frame: {}", frame.event, e);
                    return FeedEvent::Ignore;
                }
            };
            let path = parsed
                .get("path")
                .and_then(|p| p.as_str())
                .unwrap_or("/")
                .trim_matches('/')
                .to_string();
            let data = parsed.get("data").cloned().unwrap_or(serde_json::Value::Null);

            // root-path frames carry a field map; child-path frames carry a
            // single value addressed by the path. both merge field-wise.
            let patch = if path.is_empty() {
                SnapshotPatch::from_value(&data)
            } else {
                SnapshotPatch::from_field(&path, &data)
            };
            match patch {
                Some(p) => FeedEvent::Update(p),
                None => FeedEvent::Ignore,
            }
        }
        "keep-alive" => FeedEvent::Ignore,
        "cancel" | "auth_revoked" => FeedEvent::Closed(frame.event.clone()),
        other => {
            debug!("[FEED] ignoring unknown event '{}'", other);
            FeedEvent::Ignore
        }
    }
}

// ==============================================================================
// feed client
// ==============================================================================

/// http client bound to one database url and one room entity.
#[derive(Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    room: String,
}

impl FeedClient {
    pub fn new(base_url: &str, room: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            room: room.trim_matches('/').to_string(),
        }
    }

    fn stream_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.room)
    }

    fn field_url(&self, field: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, self.room, field)
    }

    /// fire-and-forget boolean write. the caller spawns this and never
    /// consumes a return value beyond logging.
    pub async fn write_bool(&self, field: &str, value: bool) -> Result<()> {
        let url = self.field_url(field);
        self.http
            .put(&url)
            .json(&value)
            .send()
            .await
            .with_context(|| format!("PUT {url}"))?
            .error_for_status()
            .with_context(|| format!("PUT {url}"))?;
        Ok(())
    }

    async fn open_stream(&self) -> Result<reqwest::Response> {
        let url = self.stream_url();
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        Ok(resp)
    }
}

// ==============================================================================
// subscription
// ==============================================================================

/// cancellable handle to the feed task. cancel (or drop) releases the
/// listener; the session keeps its last known state.
pub struct Subscription {
    task: tokio::task::JoinHandle<()>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// open the subscription: a single task owns the stream, so push events are
/// applied strictly in arrival order with no overlapping processing.
pub fn subscribe(client: FeedClient, session: SharedSession, backoff: Duration) -> Subscription {
    let task = tokio::spawn(async move {
        loop {
            match run_stream(&client, &session).await {
                Ok(reason) => info!("[FEED] stream closed ({reason}), reconnecting"),
                Err(e) => warn!("[FEED] stream error: {e:#}"),
            }
            // remain on the last known snapshot, surface a stale indicator
            session.write().await.mark_stale();
            tokio::time::sleep(backoff).await;
        }
    });
    Subscription { task }
}

/// consume one connection until the server closes it or the transport
/// fails. each completed frame is processed before the next chunk is read.
async fn run_stream(client: &FeedClient, session: &SharedSession) -> Result<String> {
    let resp = client.open_stream().await?;
    info!("[FEED] subscribed to {}", client.stream_url());

    let mut stream = resp.bytes_stream();
    let mut parser = FrameParser::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading event stream")?;
        let text = String::from_utf8_lossy(&chunk);
        for frame in parser.feed(&text) {
            match interpret(&frame) {
                FeedEvent::Update(patch) => {
                    session.write().await.apply_patch(&patch, clock_label());
                }
                FeedEvent::Ignore => {}
                FeedEvent::Closed(reason) => return Ok(reason),
            }
        }
    }
    Ok("eof".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_reassembles_frames_across_chunks() {
        let mut parser = FrameParser::default();
        assert!(parser.feed("event: put\ndata: {\"pa").is_empty());
        let frames = parser.feed("th\":\"/\",\"data\":{\"dust\":4}}\n\n");
        assert_eq!(
            frames,
            vec![Frame {
                event: "put".into(),
                data: "{\"path\":\"/\",\"data\":{\"dust\":4}}".into(),
            }]
        );
    }

    #[test]
    fn parser_handles_crlf_and_comments() {
        let mut parser = FrameParser::default();
        let frames = parser.feed(": heartbeat\r\nevent: keep-alive\r\ndata: null\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "keep-alive");
        assert_eq!(frames[0].data, "null");
    }

    #[test]
    fn parser_emits_multiple_frames_from_one_chunk() {
        let mut parser = FrameParser::default();
        let chunk = "event: put\ndata: {\"path\":\"/\",\"data\":{\"dust\":1}}\n\n\
                     event: keep-alive\ndata: null\n\n";
        let frames = parser.feed(chunk);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "put");
        assert_eq!(frames[1].event, "keep-alive");
    }

    #[test]
    fn root_put_becomes_full_patch() {
        let frame = Frame {
            event: "put".into(),
            data: r#"{"path":"/","data":{"temperature":25.05,"humidity":60.2,"dust":45}}"#.into(),
        };
        match interpret(&frame) {
            FeedEvent::Update(p) => {
                assert_eq!(p.temperature, Some(25.05));
                assert_eq!(p.humidity, Some(60.2));
                assert_eq!(p.dust, Some(45.0));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn child_put_becomes_single_field_patch() {
        let frame = Frame {
            event: "put".into(),
            data: r#"{"path":"/manual_led","data":true}"#.into(),
        };
        match interpret(&frame) {
            FeedEvent::Update(p) => {
                assert_eq!(p.manual_led, Some(true));
                assert_eq!(p.dust, None);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn null_put_and_keep_alive_are_ignored() {
        let null_put = Frame {
            event: "put".into(),
            data: r#"{"path":"/","data":null}"#.into(),
        };
        assert_eq!(interpret(&null_put), FeedEvent::Ignore);

        let keep_alive = Frame {
            event: "keep-alive".into(),
            data: "null".into(),
        };
        assert_eq!(interpret(&keep_alive), FeedEvent::Ignore);
    }

    #[test]
    fn cancel_terminates_the_connection() {
        let frame = Frame {
            event: "cancel".into(),
            data: "null".into(),
        };
        assert_eq!(interpret(&frame), FeedEvent::Closed("cancel".into()));
    }

    #[test]
    fn urls_are_built_from_trimmed_parts() {
        let client = FeedClient::new("https://rtdb.example.com/", "/room1/");
        assert_eq!(client.stream_url(), "https://rtdb.example.com/room1.json");
        assert_eq!(
            client.field_url("manual_buzzer"),
            "https://rtdb.example.com/room1/manual_buzzer.json"
        );
    }
}
